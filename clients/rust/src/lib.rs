//! Staking Drop Client
//!
//! Watches a Cosmos chain for liquidity bonds and pays each new bonder a
//! one-time drop of the reward currency.
//!
//! # Features
//!
//! - **Chain Traits**: `ChainReader` and `TransferSubmitter` isolate all chain I/O
//! - **Rate Limiting**: Built-in token bucket rate limiting for RPC requests
//! - **Retry Logic**: Bounded fixed-interval retry for blocks, submissions and confirmations
//! - **Checkpointing**: Atomic on-disk progress, resumable after restart
//!
//! # Example
//!
//! ```ignore
//! use staking_drop_client::{ConfigOption, DropChain};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let option = ConfigOption::load("./config.json")?;
//!     let mut chain = DropChain::connect(&option).await?;
//!     chain.initialize().await?;
//!     let fatal = chain.start().await?;
//!
//!     tokio::select! {
//!         _ = tokio::signal::ctrl_c() => {}
//!         _ = fatal => {}
//!     }
//!     chain.stop();
//!     chain.join().await?;
//!     Ok(())
//! }
//! ```

// Core modules
pub mod api;
pub mod chain;
pub mod checkpoint;
pub mod config;
pub mod constants;
pub mod eligibility;
pub mod errors;
pub mod listener;
pub mod rpc;
pub mod transfer;
pub mod types;
pub mod wallet;

// Re-exports for convenient access
pub use api::{ChainReader, TransferSubmitter};
pub use chain::DropChain;
pub use checkpoint::{resolve_start_block, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use config::{ConfigOption, ListenerConfig, RateLimitConfig, RetryConfig};
pub use errors::{DropError, DropResult, ErrorCategory};
pub use listener::{is_safe_to_process, BlockOutcome, DropListener};
pub use rpc::{Attempt, RestChainReader, RetryExecutor, RetryFailure, RpcRateLimiter};
pub use transfer::{TransferAttempt, TransferExecutor};
pub use types::TxLookup;
pub use wallet::KeyringCliWallet;
