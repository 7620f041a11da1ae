//! Transaction log model and bond-event extraction.
//!
//! A block's transaction logs are scanned for `bond_executed` events.
//! Unrelated event types are ignored. A `bond_executed` event that does not
//! have exactly the expected shape is reported as an error so the caller can
//! halt on a schema mismatch instead of silently dropping a bonder.

use crate::error::{CoreError, CoreResult};
use crate::types::{Address, Amount};

/// Event type emitted by the ledger module when a liquidity bond executes.
pub const EVENT_TYPE_BOND_EXECUTED: &str = "bond_executed";

/// Number of attributes a `bond_executed` event carries.
pub const BOND_EVENT_ATTRIBUTE_COUNT: usize = 6;

// Attribute positions inside `bond_executed`
const ATTR_DENOM: usize = 0;
const ATTR_BONDER: usize = 1;
const ATTR_AMOUNT: usize = 4;

#[cfg_attr(feature = "serialize_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Structured event with ordered string attributes.
#[cfg_attr(feature = "serialize_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct StringEvent {
    #[cfg_attr(feature = "serialize_serde", serde(rename = "type"))]
    pub kind: String,
    #[cfg_attr(feature = "serialize_serde", serde(default))]
    pub attributes: Vec<Attribute>,
}

impl StringEvent {
    pub fn new(kind: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            kind: kind.into(),
            attributes,
        }
    }
}

/// Per-message log of a transaction.
#[cfg_attr(feature = "serialize_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TxLog {
    #[cfg_attr(feature = "serialize_serde", serde(default))]
    pub msg_index: u32,
    #[cfg_attr(feature = "serialize_serde", serde(default))]
    pub events: Vec<StringEvent>,
}

/// A user bonded `amount` of `denom` in block `block_height`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BondEvent {
    pub denom: String,
    pub bonder: Address,
    pub amount: Amount,
    pub block_height: i64,
}

impl BondEvent {
    /// Decode a single event.
    ///
    /// Returns `Ok(None)` for events of any other type.
    pub fn from_string_event(event: &StringEvent, block_height: i64) -> CoreResult<Option<Self>> {
        if event.kind != EVENT_TYPE_BOND_EXECUTED {
            return Ok(None);
        }
        if event.attributes.len() != BOND_EVENT_ATTRIBUTE_COUNT {
            return Err(CoreError::AttributeCountMismatch {
                expected: BOND_EVENT_ATTRIBUTE_COUNT,
                actual: event.attributes.len(),
            });
        }

        let denom = event.attributes[ATTR_DENOM].value.clone();
        let bonder: Address = event.attributes[ATTR_BONDER].value.parse()?;
        let amount: Amount = event.attributes[ATTR_AMOUNT].value.parse()?;

        Ok(Some(Self {
            denom,
            bonder,
            amount,
            block_height,
        }))
    }
}

/// Lazily extract the bond events of one block, in log order.
///
/// The iterator yields an error for the first malformed bond event it meets;
/// consumers are expected to stop there.
pub fn bond_events(
    logs: &[TxLog],
    block_height: i64,
) -> impl Iterator<Item = CoreResult<BondEvent>> + '_ {
    logs.iter()
        .flat_map(|log| log.events.iter())
        .filter_map(move |event| BondEvent::from_string_event(event, block_height).transpose())
}
