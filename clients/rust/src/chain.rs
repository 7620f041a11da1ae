//! Service lifecycle: wiring, startup checks and the background listener task.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::{ChainReader, TransferSubmitter};
use crate::checkpoint::{resolve_start_block, CheckpointStore, FileCheckpointStore};
use crate::config::{ConfigOption, ListenerConfig};
use crate::errors::{DropError, DropResult};
use crate::listener::DropListener;
use crate::rpc::RestChainReader;
use crate::types::DropPolicies;
use crate::wallet::KeyringCliWallet;

/// Owns the collaborators and the listener task of one drop service.
///
/// ```ignore
/// let mut chain = DropChain::connect(&option).await?;
/// chain.initialize().await?;
/// let fatal = chain.start().await?;
/// // ... wait for ctrl-c or `fatal`
/// chain.stop();
/// chain.join().await?;
/// ```
pub struct DropChain {
    chain: Arc<dyn ChainReader>,
    submitter: Arc<dyn TransferSubmitter>,
    checkpoint: Arc<dyn CheckpointStore>,
    policies: Arc<DropPolicies>,
    config: ListenerConfig,
    configured_start: u64,
    start_block: Option<u64>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl DropChain {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        submitter: Arc<dyn TransferSubmitter>,
        checkpoint: Arc<dyn CheckpointStore>,
        policies: DropPolicies,
        config: ListenerConfig,
        configured_start: u64,
    ) -> Self {
        Self {
            chain,
            submitter,
            checkpoint,
            policies: Arc::new(policies),
            config,
            configured_start,
            start_block: None,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    /// Build the production collaborators from `option`: the REST reader,
    /// the keyring wallet and a file checkpoint named after the signer.
    pub async fn connect(option: &ConfigOption) -> DropResult<Self> {
        let reader = RestChainReader::new(&option.endpoint, option.rate_limit.clone())?;
        let wallet = KeyringCliWallet::connect(option).await?;
        let checkpoint = FileCheckpointStore::new(&option.blockstore_path, wallet.signer_address());
        tracing::debug!(endpoint = %reader.endpoint(), checkpoint = %checkpoint.path().display(), "Chain connected");

        Ok(Self::new(
            Arc::new(reader),
            Arc::new(wallet),
            Arc::new(checkpoint),
            option.drop_infos.clone(),
            ListenerConfig::from_option(option),
            option.start_block,
        ))
    }

    /// Load the checkpoint and settle on the first height to process.
    pub async fn initialize(&mut self) -> DropResult<u64> {
        let stored = self.checkpoint.load().await?;
        let start = resolve_start_block(self.configured_start, stored);
        tracing::info!(
            configured = self.configured_start,
            checkpoint = ?stored,
            start,
            "Start block resolved"
        );
        self.start_block = Some(start);
        Ok(start)
    }

    /// Spawn the listener.
    ///
    /// Fails if the start height is above the current tip. The returned
    /// receiver yields the error that halted the listener; it closes without
    /// a value when the listener stops on request.
    pub async fn start(&mut self) -> DropResult<oneshot::Receiver<DropError>> {
        let start = self.start_block.ok_or(DropError::NotInitialized)?;
        if self.handle.is_some() {
            return Err(DropError::AlreadyStarted);
        }

        let latest = self.chain.current_height().await?;
        if i64::try_from(start).map_or(true, |s| s > latest) {
            return Err(DropError::StartBeyondTip { start, latest });
        }

        let listener = DropListener::new(
            self.chain.clone(),
            self.submitter.clone(),
            self.checkpoint.clone(),
            self.policies.clone(),
            self.config.clone(),
            self.cancel.clone(),
        );
        let (fatal_sender, fatal_receiver) = oneshot::channel();

        self.handle = Some(tokio::spawn(async move {
            match listener.poll_blocks(start).await {
                Ok(()) => tracing::info!("Listener stopped"),
                Err(e) => {
                    tracing::error!(error = %e, category = %e.category(), "Listener halted");
                    let _ = fatal_sender.send(e);
                }
            }
        }));

        tracing::info!(start, latest, "Listener started");
        Ok(fatal_receiver)
    }

    /// Request the listener to stop. Safe to call any number of times.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("Stopping listener");
        }
        self.cancel.cancel();
    }

    /// Wait for the listener task to exit.
    pub async fn join(&mut self) -> DropResult<()> {
        if let Some(handle) = self.handle.take() {
            handle.await.map_err(|e| DropError::Internal(e.into()))?;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn start_block(&self) -> Option<u64> {
        self.start_block
    }
}

impl Drop for DropChain {
    fn drop(&mut self) {
        self.cancel.cancel();
        // The task exits at its next cancellation check
    }
}
