//! Durable record of the highest fully processed block.
//!
//! The file store keeps one decimal height per signer under the blockstore
//! directory and replaces it atomically (temp file + rename) so a crash
//! mid-write leaves the previous checkpoint intact.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::constants::GENESIS_HEIGHT;
use crate::errors::{DropError, DropResult};
use crate::types::Address;

const CHECKPOINT_EXTENSION: &str = "block";

/// Storage for the last processed height. Only the listener writes to it.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last stored height, `None` if nothing was stored yet.
    async fn load(&self) -> DropResult<Option<u64>>;

    async fn store(&self, height: u64) -> DropResult<()>;
}

/// First height to process given the configured start and a stored checkpoint.
///
/// Never earlier than genesis.
pub fn resolve_start_block(configured: u64, checkpoint: Option<u64>) -> u64 {
    let configured = configured.max(GENESIS_HEIGHT);
    match checkpoint {
        Some(height) => configured.max(height.saturating_add(1)),
        None => configured,
    }
}

/// Checkpoint kept in `<dir>/<signer address>.block`.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl AsRef<Path>, signer: &Address) -> Self {
        let path = dir
            .as_ref()
            .join(format!("{}.{}", signer.as_str(), CHECKPOINT_EXTENSION));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> DropResult<Option<u64>> {
        if !tokio::fs::try_exists(&self.path).await? {
            tracing::info!(path = %self.path.display(), "No checkpoint found, starting fresh");
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        let height = content
            .trim()
            .parse::<u64>()
            .map_err(|_| DropError::CorruptCheckpoint {
                path: self.path.display().to_string(),
                content: content.clone(),
            })?;

        tracing::debug!(path = %self.path.display(), height, "Checkpoint loaded");
        Ok(Some(height))
    }

    async fn store(&self, height: u64) -> DropResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, height.to_string()).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        tracing::trace!(height, "Checkpoint saved");
        Ok(())
    }
}

/// In-memory store, also recording every height written to it.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    writes: Mutex<Vec<u64>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `height`.
    pub fn with_height(height: u64) -> Self {
        Self {
            writes: Mutex::new(vec![height]),
        }
    }

    /// All heights stored so far, oldest first.
    pub fn history(&self) -> Vec<u64> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn latest(&self) -> Option<u64> {
        self.history().last().copied()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> DropResult<Option<u64>> {
        Ok(self.latest())
    }

    async fn store(&self, height: u64) -> DropResult<()> {
        self.writes
            .lock()
            .map_err(|_| DropError::Internal(anyhow::anyhow!("checkpoint lock poisoned")))?
            .push(height);
        Ok(())
    }
}
