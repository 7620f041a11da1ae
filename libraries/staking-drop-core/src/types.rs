//! Primitive chain values: token amounts, account addresses and coins.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;

use crate::error::{CoreError, CoreResult};

/// Accepted account payload lengths (secp256k1 accounts and module/ICA accounts).
const ADDRESS_PAYLOAD_LENGTHS: [usize; 2] = [20, 32];

/// Non-negative token amount with 256 bits of precision.
///
/// Chain amounts travel as base-10 strings; parsing is strict and never
/// coerces signs, hex prefixes or separators.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(U256);

impl Amount {
    pub const ZERO: Amount = Amount(U256::ZERO);

    pub fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.is_zero()
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl FromStr for Amount {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidAmount(s.to_string()));
        }
        U256::from_str_radix(s, 10)
            .map(Amount)
            .map_err(|_| CoreError::InvalidAmount(s.to_string()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bech32 account address, kept in its canonical string form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    encoded: String,
    hrp_len: usize,
}

impl Address {
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Human readable prefix, e.g. `stafi`.
    pub fn prefix(&self) -> &str {
        &self.encoded[..self.hrp_len]
    }

    /// Reject addresses that belong to another chain.
    pub fn ensure_prefix(&self, expected: &str) -> CoreResult<()> {
        if self.prefix() == expected.to_ascii_lowercase() {
            return Ok(());
        }
        Err(CoreError::InvalidAddress {
            address: self.encoded.clone(),
            reason: format!("expected prefix {:?}, found {:?}", expected, self.prefix()),
        })
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| CoreError::InvalidAddress {
            address: s.to_string(),
            reason,
        };

        let (hrp, payload) = bech32::decode(s).map_err(|e| invalid(e.to_string()))?;
        if !ADDRESS_PAYLOAD_LENGTHS.contains(&payload.len()) {
            return Err(invalid(format!("unexpected payload length {}", payload.len())));
        }

        Ok(Self {
            encoded: s.to_ascii_lowercase(),
            hrp_len: hrp.as_str().len(),
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Amount of a single denomination.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Coin {
    pub denom: String,
    pub amount: Amount,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: Amount) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

#[cfg(feature = "serialize_serde")]
mod serde_impls {
    use super::{Address, Amount};
    use serde::de::{self, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::fmt;

    impl Serialize for Amount {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = Amount;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a non-negative integer or decimal string")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
            v.parse().map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
            Ok(Amount::from(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
            u64::try_from(v)
                .map(Amount::from)
                .map_err(|_| E::custom(format!("negative amount {v}")))
        }
    }

    impl<'de> Deserialize<'de> for Amount {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(AmountVisitor)
        }
    }

    impl Serialize for Address {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(self.as_str())
        }
    }

    impl<'de> Deserialize<'de> for Address {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(de::Error::custom)
        }
    }
}
