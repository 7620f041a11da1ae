//! Block poll loop.
//!
//! The listener walks the chain one height at a time. A height is processed
//! only once it is `confirmation_depth` blocks behind the tip, and the
//! checkpoint moves past it only after every approved drop in it confirmed.
//! Failures retry the same height after a fixed interval until the per-block
//! budget runs out, which halts the listener with an error.

use std::sync::Arc;
use std::time::Duration;

use staking_drop_core::bond_events;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::api::{ChainReader, TransferSubmitter};
use crate::checkpoint::CheckpointStore;
use crate::config::ListenerConfig;
use crate::constants::PROGRESS_DEBUG_INTERVAL;
use crate::eligibility::evaluate;
use crate::errors::{DropError, DropResult};
use crate::transfer::{TransferAttempt, TransferExecutor};
use crate::types::{Decision, DropPolicies};

/// Whether `height` is at least `depth` blocks behind `tip`.
pub fn is_safe_to_process(height: u64, depth: u64, tip: i64) -> bool {
    match u64::try_from(tip) {
        Ok(tip) => height.saturating_add(depth) <= tip,
        Err(_) => false,
    }
}

/// Summary of one processed block.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BlockOutcome {
    pub bond_events: usize,
    pub transfers: usize,
}

/// Sequential bond-event processor for one signer.
pub struct DropListener {
    chain: Arc<dyn ChainReader>,
    submitter: Arc<dyn TransferSubmitter>,
    checkpoint: Arc<dyn CheckpointStore>,
    policies: Arc<DropPolicies>,
    config: ListenerConfig,
    cancel: CancellationToken,
}

impl DropListener {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        submitter: Arc<dyn TransferSubmitter>,
        checkpoint: Arc<dyn CheckpointStore>,
        policies: Arc<DropPolicies>,
        config: ListenerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            chain,
            submitter,
            checkpoint,
            policies,
            config,
            cancel,
        }
    }

    /// Process blocks from `start` until stopped or out of retries.
    ///
    /// Returns `Ok(())` when a stop was requested.
    pub async fn poll_blocks(&self, start: u64) -> DropResult<()> {
        let max_attempts = self.config.block_retry.max_attempts;
        let mut cursor = start;
        let mut retries_left = max_attempts;
        let mut last_error = String::new();

        tracing::info!(start, signer = %self.submitter.signer_address(), "Polling blocks");

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!(height = cursor, "Poll loop received stop, will stop");
                return Ok(());
            }
            if retries_left == 0 {
                return Err(DropError::BlockRetriesExhausted {
                    height: cursor,
                    attempts: max_attempts,
                    last_error,
                });
            }

            let tip = match self.chain.current_height().await {
                Ok(tip) => tip,
                Err(e) => {
                    tracing::error!(error = %e, category = %e.category(), "Failed to fetch latest block height");
                    retries_left -= 1;
                    last_error = e.to_string();
                    if !self.backoff().await {
                        return Ok(());
                    }
                    continue;
                }
            };

            if !is_safe_to_process(cursor, self.config.confirmation_depth, tip) {
                tracing::trace!(height = cursor, tip, "Waiting for confirmations");
                if !self.backoff().await {
                    return Ok(());
                }
                continue;
            }

            match self.process_block(cursor).await {
                Ok(outcome) => {
                    if outcome.bond_events > 0 {
                        tracing::debug!(
                            height = cursor,
                            bond_events = outcome.bond_events,
                            transfers = outcome.transfers,
                            "Processed block"
                        );
                    }
                }
                Err(DropError::Cancelled) => {
                    tracing::info!(height = cursor, "Stop requested mid-block, checkpoint not advanced");
                    return Ok(());
                }
                Err(e) if e.is_structural() && self.config.escalate_structural_errors => {
                    tracing::error!(height = cursor, error = %e, "Malformed bond event, halting");
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!(
                        height = cursor,
                        error = %e,
                        category = %e.category(),
                        retries_left = retries_left - 1,
                        "Failed to process events in block"
                    );
                    retries_left -= 1;
                    last_error = e.to_string();
                    if !self.backoff().await {
                        return Ok(());
                    }
                    continue;
                }
            }

            if let Err(e) = self.checkpoint.store(cursor).await {
                tracing::error!(height = cursor, error = %e, "Failed to write checkpoint");
            }
            self.log_progress(cursor);

            cursor += 1;
            retries_left = max_attempts;
        }
    }

    /// Extract, evaluate and pay out every bond event of `height`.
    pub async fn process_block(&self, height: u64) -> DropResult<BlockOutcome> {
        let block_height = i64::try_from(height)
            .map_err(|_| DropError::Internal(anyhow::anyhow!("height {} out of range", height)))?;
        let logs = self.chain.block_tx_logs(block_height).await?;

        let executor = TransferExecutor::new(
            self.chain.as_ref(),
            self.submitter.as_ref(),
            self.config.submit_retry,
            self.config.confirm_retry,
            self.cancel.clone(),
        );
        let mut outcome = BlockOutcome::default();

        for event in bond_events(&logs, block_height) {
            if self.cancel.is_cancelled() {
                return Err(DropError::Cancelled);
            }
            let event = event
                .and_then(|event| {
                    event.bonder.ensure_prefix(&self.config.account_prefix)?;
                    Ok(event)
                })
                .map_err(|source| DropError::MalformedEvent { height, source })?;
            outcome.bond_events += 1;

            let decision = evaluate(
                &event,
                &self.policies,
                &self.config.reward_denom,
                self.chain.as_ref(),
            )
            .await?;

            if let Decision::ApproveTransfer { amount } = decision {
                let attempt = TransferAttempt::new(event.bonder.clone(), self.config.reward_denom.as_str(), amount);
                executor.execute(attempt).await?;
                outcome.transfers += 1;
            }
        }

        Ok(outcome)
    }

    /// Sleep for the retry interval. Returns `false` if stopped meanwhile.
    async fn backoff(&self) -> bool {
        let interval = Duration::from_millis(self.config.block_retry.interval_ms);
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = sleep(interval) => true,
        }
    }

    fn log_progress(&self, height: u64) {
        let interval = self.config.progress_interval;
        if interval > 0 && height % interval == 0 {
            tracing::info!(height, "Have dealt block");
        } else if height % PROGRESS_DEBUG_INTERVAL == 0 {
            tracing::debug!(height, "Have dealt block");
        }
    }
}
