//! Submission and confirmation of one approved drop.

use tokio_util::sync::CancellationToken;

use crate::api::{ChainReader, TransferSubmitter};
use crate::config::RetryConfig;
use crate::errors::{DropError, DropResult};
use crate::rpc::{Attempt, RetryExecutor, RetryFailure};
use crate::types::{Address, Amount, Coin};

/// Transfer in flight for one approved event. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferAttempt {
    pub recipient: Address,
    pub denom: String,
    pub amount: Amount,
    pub tx_hash: Option<String>,
    pub confirmed: bool,
}

impl TransferAttempt {
    pub fn new(recipient: Address, denom: impl Into<String>, amount: Amount) -> Self {
        Self {
            recipient,
            denom: denom.into(),
            amount,
            tx_hash: None,
            confirmed: false,
        }
    }

    pub fn coins(&self) -> Vec<Coin> {
        vec![Coin::new(self.denom.clone(), self.amount)]
    }
}

/// Submits a transfer, resubmitting only on signing sequence races, then
/// polls until the transaction is included in a block.
pub struct TransferExecutor<'a> {
    chain: &'a dyn ChainReader,
    submitter: &'a dyn TransferSubmitter,
    submit_retry: RetryExecutor,
    confirm_retry: RetryExecutor,
}

impl<'a> TransferExecutor<'a> {
    pub fn new(
        chain: &'a dyn ChainReader,
        submitter: &'a dyn TransferSubmitter,
        submit_retry: RetryConfig,
        confirm_retry: RetryConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            chain,
            submitter,
            submit_retry: RetryExecutor::new(submit_retry, cancel.clone()),
            confirm_retry: RetryExecutor::new(confirm_retry, cancel),
        }
    }

    /// Drive `attempt` to a confirmed transaction.
    pub async fn execute(&self, mut attempt: TransferAttempt) -> DropResult<TransferAttempt> {
        let tx_hash = self.submit(&attempt).await?;
        attempt.tx_hash = Some(tx_hash.clone());

        let height = self.confirm(&tx_hash).await?;
        attempt.confirmed = true;

        tracing::info!(
            recipient = %attempt.recipient,
            amount = %attempt.amount,
            denom = %attempt.denom,
            tx_hash = %tx_hash,
            height,
            "Drop transfer confirmed"
        );
        Ok(attempt)
    }

    async fn submit(&self, attempt: &TransferAttempt) -> DropResult<String> {
        let submitter = self.submitter;
        let coins = attempt.coins();
        let recipient = &attempt.recipient;
        let coins = &coins;

        let result = self
            .submit_retry
            .run("submit_transfer", move |_| async move {
                match submitter.submit_transfer(recipient, coins).await {
                    Ok(hash) => Attempt::Done(hash),
                    Err(e) if e.is_sequence_mismatch() => Attempt::Retry(e),
                    Err(e) => Attempt::Fatal(e),
                }
            })
            .await;

        result.map_err(|failure| match failure {
            RetryFailure::Fatal(e) => e,
            RetryFailure::Cancelled => DropError::Cancelled,
            RetryFailure::Exhausted {
                attempts,
                last_error,
            } => DropError::SubmitRetriesExhausted {
                recipient: recipient.to_string(),
                attempts,
                last_error: last_error.to_string(),
            },
        })
    }

    /// Returns the inclusion height.
    async fn confirm(&self, tx_hash: &str) -> DropResult<i64> {
        let chain = self.chain;

        let result = self
            .confirm_retry
            .run("confirm_transfer", move |_| async move {
                match chain.tx_by_hash(tx_hash).await {
                    Ok(lookup) if lookup.is_confirmed() => Attempt::Done(lookup.height),
                    Ok(lookup) => Attempt::Retry(DropError::PendingConfirmation {
                        tx_hash: tx_hash.to_string(),
                        height: lookup.height,
                    }),
                    Err(e) => Attempt::Retry(e),
                }
            })
            .await;

        result.map_err(|failure| match failure {
            RetryFailure::Fatal(e) => e,
            RetryFailure::Cancelled => DropError::Cancelled,
            RetryFailure::Exhausted {
                attempts,
                last_error,
            } => DropError::ConfirmRetriesExhausted {
                tx_hash: tx_hash.to_string(),
                attempts,
                last_error: last_error.to_string(),
            },
        })
    }
}
