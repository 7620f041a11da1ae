//! Types shared by the chain adapters and the listener.

use serde::{Deserialize, Serialize};

pub use staking_drop_core::{Address, Amount, BondEvent, Coin, Decision, DropPolicies, DropPolicy, TxLog};

/// Result of looking up a transaction by hash.
///
/// An unknown hash is reported as the default (empty) lookup, not as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxLookup {
    pub txhash: String,
    /// Inclusion height, 0 while the transaction is not in a block
    pub height: i64,
    pub code: u32,
    pub raw_log: String,
}

impl TxLookup {
    pub fn is_empty(&self) -> bool {
        self.txhash.is_empty()
    }

    /// Found and included in a block.
    pub fn is_confirmed(&self) -> bool {
        !self.is_empty() && self.height > 0
    }
}
