//! Configuration types for the drop service.
//!
//! `ConfigOption` is the operator-facing file format. `ListenerConfig`,
//! `RetryConfig` and `RateLimitConfig` are the runtime knobs derived from it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use staking_drop_core::DropPolicies;

use crate::constants::{
    BLOCK_CONFIRM_NUMBER, BLOCK_RETRY_INTERVAL_MS, BLOCK_RETRY_LIMIT, COMMAND_TIMEOUT_SECS,
    DEFAULT_ACCOUNT_PREFIX, DEFAULT_CHAIN_BINARY, DEFAULT_REWARD_DENOM, GENESIS_HEIGHT,
    PROGRESS_LOG_INTERVAL,
};
use crate::errors::{DropError, DropResult};

/// Rate limiting configuration for RPC requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitConfig {
    /// Maximum requests per second
    pub max_rps: u32,
    /// Burst capacity for token bucket
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_rps: 10,
            burst_size: 20,
        }
    }
}

/// Bounded, fixed-interval retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Attempts before giving up (the first attempt counts)
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds
    pub interval_ms: u64,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, interval_ms: u64) -> Self {
        Self {
            max_attempts,
            interval_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: BLOCK_RETRY_LIMIT,
            interval_ms: BLOCK_RETRY_INTERVAL_MS,
        }
    }
}

/// Configuration for the block listener.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Blocks between a target block and the tip before it is processed
    pub confirmation_depth: u64,
    /// Block-level retry budget; its interval is also the finality wait
    pub block_retry: RetryConfig,
    /// Budget for sequence-mismatch resubmissions of one transfer
    pub submit_retry: RetryConfig,
    /// Budget for confirmation lookups of one transfer
    pub confirm_retry: RetryConfig,
    /// Heights between progress records
    pub progress_interval: u64,
    /// Currency the drop is paid in
    pub reward_denom: String,
    /// Bech32 prefix every bonder address must carry
    pub account_prefix: String,
    /// Halt on the first malformed bond event instead of retrying the block
    pub escalate_structural_errors: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            confirmation_depth: BLOCK_CONFIRM_NUMBER,
            block_retry: RetryConfig::default(),
            submit_retry: RetryConfig::default(),
            confirm_retry: RetryConfig::default(),
            progress_interval: PROGRESS_LOG_INTERVAL,
            reward_denom: DEFAULT_REWARD_DENOM.to_string(),
            account_prefix: DEFAULT_ACCOUNT_PREFIX.to_string(),
            escalate_structural_errors: false,
        }
    }
}

impl ListenerConfig {
    /// Derive the listener settings from the file configuration.
    pub fn from_option(option: &ConfigOption) -> Self {
        let retry = RetryConfig::new(option.retry_limit, option.retry_interval_ms);
        Self {
            confirmation_depth: option.confirmation_depth,
            block_retry: retry,
            submit_retry: retry,
            confirm_retry: retry,
            progress_interval: option.progress_interval,
            reward_denom: option.reward_denom.clone(),
            account_prefix: option.account_prefix.clone(),
            escalate_structural_errors: option.escalate_malformed_events,
        }
    }

    /// Set the confirmation depth.
    pub fn confirmation_depth(mut self, depth: u64) -> Self {
        self.confirmation_depth = depth;
        self
    }

    /// Use the same retry configuration for blocks, submissions and confirmations.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.block_retry = config;
        self.submit_retry = config;
        self.confirm_retry = config;
        self
    }

    /// Set the block-level retry configuration.
    pub fn block_retry(mut self, config: RetryConfig) -> Self {
        self.block_retry = config;
        self
    }

    /// Set the submission retry configuration.
    pub fn submit_retry(mut self, config: RetryConfig) -> Self {
        self.submit_retry = config;
        self
    }

    /// Set the confirmation retry configuration.
    pub fn confirm_retry(mut self, config: RetryConfig) -> Self {
        self.confirm_retry = config;
        self
    }

    /// Set the reward denomination.
    pub fn reward_denom(mut self, denom: impl Into<String>) -> Self {
        self.reward_denom = denom.into();
        self
    }

    /// Set the expected bonder address prefix.
    pub fn account_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.account_prefix = prefix.into();
        self
    }

    /// Set whether malformed bond events halt the service immediately.
    pub fn escalate_structural_errors(mut self, escalate: bool) -> Self {
        self.escalate_structural_errors = escalate;
        self
    }
}

fn default_binary() -> String {
    DEFAULT_CHAIN_BINARY.to_string()
}

fn default_reward_denom() -> String {
    DEFAULT_REWARD_DENOM.to_string()
}

fn default_account_prefix() -> String {
    DEFAULT_ACCOUNT_PREFIX.to_string()
}

fn default_start_block() -> u64 {
    GENESIS_HEIGHT
}

fn default_command_timeout_secs() -> u64 {
    COMMAND_TIMEOUT_SECS
}

fn default_confirmation_depth() -> u64 {
    BLOCK_CONFIRM_NUMBER
}

fn default_retry_limit() -> u32 {
    BLOCK_RETRY_LIMIT
}

fn default_retry_interval_ms() -> u64 {
    BLOCK_RETRY_INTERVAL_MS
}

fn default_progress_interval() -> u64 {
    PROGRESS_LOG_INTERVAL
}

/// Service configuration as read from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOption {
    /// REST (gRPC-gateway) endpoint of the chain
    pub endpoint: String,
    pub keystore_path: PathBuf,
    pub blockstore_path: PathBuf,
    #[serde(default = "default_start_block")]
    pub start_block: u64,
    /// Keyring name of the signer
    pub account: String,
    #[serde(default)]
    pub gas_price: String,
    /// Bonded denom -> drop policy
    pub drop_infos: DropPolicies,

    #[serde(default)]
    pub chain_id: Option<String>,
    /// Tendermint RPC used by the keyring CLI, defaults to `endpoint`
    #[serde(default)]
    pub node_endpoint: Option<String>,
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_reward_denom")]
    pub reward_denom: String,
    #[serde(default = "default_account_prefix")]
    pub account_prefix: String,
    #[serde(default = "default_confirmation_depth")]
    pub confirmation_depth: u64,
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
    /// Time limit for one keyring CLI call
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default)]
    pub escalate_malformed_events: bool,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl ConfigOption {
    /// Load and validate a `.json` or `.yaml` configuration file.
    pub fn load(path: impl AsRef<Path>) -> DropResult<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading configuration");

        let raw = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let option: ConfigOption = match ext {
            "json" => serde_json::from_str(&raw)
                .map_err(|e| DropError::invalid_config(format!("{}: {}", path.display(), e)))?,
            "yaml" | "yml" => serde_yaml::from_str(&raw)
                .map_err(|e| DropError::invalid_config(format!("{}: {}", path.display(), e)))?,
            other => {
                return Err(DropError::invalid_config(format!(
                    "unrecognized extension: {:?}",
                    other
                )))
            }
        };

        option.validate()?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(option)
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> DropResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(DropError::invalid_config("endpoint must not be empty"));
        }
        if self.account.trim().is_empty() {
            return Err(DropError::invalid_config("account must not be empty"));
        }
        if self.blockstore_path.as_os_str().is_empty() {
            return Err(DropError::invalid_config("blockstorePath must not be empty"));
        }
        if self.reward_denom.trim().is_empty() {
            return Err(DropError::invalid_config("rewardDenom must not be empty"));
        }
        if self.start_block < GENESIS_HEIGHT {
            return Err(DropError::invalid_config(format!(
                "startBlock must be at least {}",
                GENESIS_HEIGHT
            )));
        }
        if self.account_prefix.trim().is_empty() {
            return Err(DropError::invalid_config("accountPrefix must not be empty"));
        }
        if self.command_timeout_secs == 0 {
            return Err(DropError::invalid_config("commandTimeoutSecs must be positive"));
        }
        if self.retry_limit == 0 {
            return Err(DropError::invalid_config("retryLimit must be positive"));
        }
        if self.drop_infos.is_empty() {
            tracing::warn!("dropInfos is empty, every bond event will be skipped");
        }
        Ok(())
    }

    /// Tendermint RPC node for the keyring CLI.
    pub fn node(&self) -> &str {
        self.node_endpoint.as_deref().unwrap_or(&self.endpoint)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}
