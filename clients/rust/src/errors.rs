//! Error types for the drop service.
//!
//! Provides rich error types with retry hints and categorization
//! for better error handling and observability.

use staking_drop_core::CoreError;
use thiserror::Error;

/// Broadcast failures whose raw log contains one of these are sequence races.
const SEQUENCE_MISMATCH_MARKERS: [&str; 2] = ["incorrect account sequence", "account sequence mismatch"];

/// Main error type for drop service operations.
#[derive(Error, Debug)]
pub enum DropError {
    // Network Errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error ({status}): {message}")]
    Rpc { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    // Schema Errors
    #[error("Malformed bond event in block {height}: {source}")]
    MalformedEvent {
        height: u64,
        #[source]
        source: CoreError,
    },

    // Transaction Errors
    #[error("Broadcast failed: {raw_log}")]
    Broadcast { code: Option<u32>, raw_log: String },

    #[error("Transaction {tx_hash} not yet confirmed (height {height})")]
    PendingConfirmation { tx_hash: String, height: i64 },

    #[error("Transfer to {recipient} reach retry limit after {attempts} attempts: {last_error}")]
    SubmitRetriesExhausted {
        recipient: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Transaction {tx_hash} not confirmed after {attempts} lookups: {last_error}")]
    ConfirmRetriesExhausted {
        tx_hash: String,
        attempts: u32,
        last_error: String,
    },

    // Lifecycle Errors
    #[error("Block {height} reach retry limit after {attempts} attempts: {last_error}")]
    BlockRetriesExhausted {
        height: u64,
        attempts: u32,
        last_error: String,
    },

    #[error("Starting block ({start}) is greater than latest known block ({latest})")]
    StartBeyondTip { start: u64, latest: i64 },

    #[error("Chain must be initialized before start")]
    NotInitialized,

    #[error("Chain already started")]
    AlreadyStarted,

    #[error("Stop requested")]
    Cancelled,

    // Configuration Errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // Storage Errors
    #[error("Checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt checkpoint at {path}: {content:?}")]
    CorruptCheckpoint { path: String, content: String },

    // Wallet Errors
    #[error("Wallet error: {message}")]
    Wallet { message: String },

    #[error("{command} did not finish within {timeout_ms}ms")]
    CommandTimeout { command: String, timeout_ms: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Internal Errors
    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl DropError {
    /// Whether this is a stale signing sequence number reported by the chain.
    pub fn is_sequence_mismatch(&self) -> bool {
        match self {
            DropError::Broadcast { raw_log, .. } => {
                let lower = raw_log.to_lowercase();
                SEQUENCE_MISMATCH_MARKERS.iter().any(|m| lower.contains(m))
            }
            _ => false,
        }
    }

    /// Schema errors fail deterministically: retrying the same block cannot help.
    pub fn is_structural(&self) -> bool {
        self.category() == ErrorCategory::Schema
    }

    /// Get a retry hint in milliseconds, if available.
    pub fn retry_hint_ms(&self) -> Option<u64> {
        match self {
            DropError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }

    /// Categorize the error for logging.
    pub fn category(&self) -> ErrorCategory {
        match self {
            DropError::Http(_)
            | DropError::Rpc { .. }
            | DropError::RateLimited { .. }
            | DropError::UnexpectedResponse(_) => ErrorCategory::Network,

            DropError::MalformedEvent { .. } => ErrorCategory::Schema,

            DropError::Broadcast { .. } if self.is_sequence_mismatch() => ErrorCategory::Consensus,

            DropError::Broadcast { .. }
            | DropError::PendingConfirmation { .. }
            | DropError::SubmitRetriesExhausted { .. }
            | DropError::ConfirmRetriesExhausted { .. } => ErrorCategory::Transaction,

            DropError::BlockRetriesExhausted { .. }
            | DropError::StartBeyondTip { .. }
            | DropError::NotInitialized
            | DropError::AlreadyStarted
            | DropError::Cancelled => ErrorCategory::Lifecycle,

            DropError::InvalidConfig { .. } => ErrorCategory::Config,

            DropError::Io(_) | DropError::CorruptCheckpoint { .. } => ErrorCategory::Storage,

            DropError::Wallet { .. } | DropError::CommandTimeout { .. } => ErrorCategory::Wallet,

            DropError::Serialization(_) | DropError::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        DropError::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn wallet(message: impl Into<String>) -> Self {
        DropError::Wallet {
            message: message.into(),
        }
    }

    pub fn broadcast(code: Option<u32>, raw_log: impl Into<String>) -> Self {
        DropError::Broadcast {
            code,
            raw_log: raw_log.into(),
        }
    }
}

/// Error category for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// RPC transport, HTTP status and response decoding errors
    Network,
    /// Signing sequence races
    Consensus,
    /// Tracked events that do not match the expected schema
    Schema,
    /// Transfer submission and confirmation failures
    Transaction,
    /// Startup, shutdown and retry budget exhaustion
    Lifecycle,
    /// Configuration errors
    Config,
    /// Checkpoint persistence errors
    Storage,
    /// Keyring and signer errors
    Wallet,
    /// Internal errors (unexpected failures)
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Consensus => write!(f, "consensus"),
            ErrorCategory::Schema => write!(f, "schema"),
            ErrorCategory::Transaction => write!(f, "transaction"),
            ErrorCategory::Lifecycle => write!(f, "lifecycle"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Wallet => write!(f, "wallet"),
            ErrorCategory::Internal => write!(f, "internal"),
        }
    }
}

/// Result type alias for drop service operations.
pub type DropResult<T> = Result<T, DropError>;
