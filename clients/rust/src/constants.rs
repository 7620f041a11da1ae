//! Service defaults.

/// Backoff between block-level retries and while waiting for finality
pub const BLOCK_RETRY_INTERVAL_MS: u64 = 6_000;

/// Consecutive failures tolerated per block (and per transfer step)
pub const BLOCK_RETRY_LIMIT: u32 = 50;

/// Blocks that must separate a target block from the tip
pub const BLOCK_CONFIRM_NUMBER: u64 = 3;

/// Heights between informational progress records
pub const PROGRESS_LOG_INTERVAL: u64 = 1_000;

/// Heights between debug progress records
pub const PROGRESS_DEBUG_INTERVAL: u64 = 100;

/// Currency the drop is paid in
pub const DEFAULT_REWARD_DENOM: &str = "ufis";

/// Chain daemon used for keyring signing and broadcast
pub const DEFAULT_CHAIN_BINARY: &str = "stafihubd";

/// Environment variable holding the file keyring passphrase
pub const KEYRING_PASSWORD_ENV: &str = "STAKING_DROP_KEYRING_PASSWORD";

/// Page size for block transaction queries
pub const TX_QUERY_PAGE_LIMIT: u64 = 100;

/// Bech32 prefix of accounts on the drop chain
pub const DEFAULT_ACCOUNT_PREFIX: &str = "stafi";

/// First height of a Cosmos chain
pub const GENESIS_HEIGHT: u64 = 1;

/// Time limit for one chain daemon invocation
pub const COMMAND_TIMEOUT_SECS: u64 = 60;
