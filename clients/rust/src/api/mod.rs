//! Chain access traits.
//!
//! The listener only talks to the chain through these traits so the REST
//! reader and the keyring wallet can be swapped for in-memory fakes.

use async_trait::async_trait;

use crate::{
    errors::DropResult,
    types::{Address, Amount, Coin, TxLog, TxLookup},
};

/// Read-only queries against the chain.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Height of the latest block.
    async fn current_height(&self) -> DropResult<i64>;

    /// Logs of every successful transaction in the block, in block order.
    async fn block_tx_logs(&self, height: i64) -> DropResult<Vec<TxLog>>;

    /// Balance of `denom` held by `address`. Zero when the account is unknown.
    async fn account_balance(&self, address: &Address, denom: &str) -> DropResult<Amount>;

    /// Look up a transaction. Unknown hashes yield an empty [`TxLookup`].
    async fn tx_by_hash(&self, hash: &str) -> DropResult<TxLookup>;
}

/// Signs and broadcasts transfers from the service's account.
#[async_trait]
pub trait TransferSubmitter: Send + Sync {
    /// Address the transfers are paid from.
    fn signer_address(&self) -> &Address;

    /// Broadcast a single bank send and return its transaction hash.
    ///
    /// A chain-side rejection is a [`crate::errors::DropError::Broadcast`]
    /// carrying the raw log.
    async fn submit_transfer(&self, recipient: &Address, coins: &[Coin]) -> DropResult<String>;
}
