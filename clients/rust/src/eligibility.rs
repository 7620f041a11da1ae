//! Eligibility decision for one bond event.
//!
//! The denom and threshold checks are pure. The bonder's reward balance is
//! only queried for events that pass both, so skipped events cost no RPC.

use staking_drop_core::Screening;

use crate::api::ChainReader;
use crate::errors::DropResult;
use crate::types::{BondEvent, Decision, DropPolicies};

/// Decide what to do with `event`. A failed balance query is returned as an
/// error so the caller retries the whole block.
pub async fn evaluate(
    event: &BondEvent,
    policies: &DropPolicies,
    reward_denom: &str,
    chain: &dyn ChainReader,
) -> DropResult<Decision> {
    let decision = match policies.screen(event) {
        Screening::Settled(decision) => decision,
        Screening::NeedsBalance(policy) => {
            let balance = chain.account_balance(&event.bonder, reward_denom).await?;
            policy.settle(balance)
        }
    };

    let label = decision.label();
    match &decision {
        Decision::SkipUnsupported => tracing::info!(
            decision = label,
            bonder = %event.bonder,
            denom = %event.denom,
            "Liquidity bond in a denom without drop, will skip"
        ),
        Decision::SkipBelowThreshold { min_bond_amount } => tracing::info!(
            decision = label,
            bonder = %event.bonder,
            denom = %event.denom,
            amount = %event.amount,
            min_bond_amount = %min_bond_amount,
            "Bond amount less than minBondAmount, will skip"
        ),
        Decision::SkipAlreadyRewarded { balance } => tracing::info!(
            decision = label,
            bonder = %event.bonder,
            denom = %event.denom,
            amount = %event.amount,
            balance = %balance,
            reward_denom,
            "Bonder already holds reward currency, will skip"
        ),
        Decision::ApproveTransfer { amount } => tracing::debug!(
            decision = label,
            bonder = %event.bonder,
            denom = %event.denom,
            drop_amount = %amount,
            "Drop approved"
        ),
    }

    Ok(decision)
}
