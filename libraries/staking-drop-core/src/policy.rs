//! Drop policies and the eligibility decision.
//!
//! The decision is a pure function of the bond event, the policy table and
//! the bonder's current reward-currency balance. Holding any positive reward
//! balance is treated as "already rewarded". That guard is a best-effort
//! duplicate filter: it cannot tell a previous drop from unrelated holdings
//! and it is not atomic with the transfer that follows.

use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::events::BondEvent;
use crate::types::Amount;

/// Reward rule for one bonded denomination.
#[cfg_attr(feature = "serialize_serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize_serde", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropPolicy {
    /// Smallest bond (inclusive) that earns a drop
    pub min_bond_amount: Amount,
    /// Reward transferred to an eligible bonder
    pub drop_amount: Amount,
}

impl DropPolicy {
    pub fn new(min_bond_amount: Amount, drop_amount: Amount) -> Self {
        Self {
            min_bond_amount,
            drop_amount,
        }
    }

    /// Final step of the decision, once the bonder's balance is known.
    pub fn settle(&self, reward_balance: Amount) -> Decision {
        if reward_balance.is_positive() {
            Decision::SkipAlreadyRewarded {
                balance: reward_balance,
            }
        } else {
            Decision::ApproveTransfer {
                amount: self.drop_amount,
            }
        }
    }
}

/// Outcome of evaluating one bond event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// No policy exists for the bonded denom
    SkipUnsupported,
    /// The bond is smaller than the policy minimum
    SkipBelowThreshold { min_bond_amount: Amount },
    /// The bonder already holds the reward currency
    SkipAlreadyRewarded { balance: Amount },
    /// Send `amount` of the reward currency to the bonder
    ApproveTransfer { amount: Amount },
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::SkipUnsupported => "skip_unsupported",
            Decision::SkipBelowThreshold { .. } => "skip_below_threshold",
            Decision::SkipAlreadyRewarded { .. } => "skip_already_rewarded",
            Decision::ApproveTransfer { .. } => "approve_transfer",
        }
    }
}

/// Result of the balance-free part of the decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Screening<'a> {
    /// Decided without looking at balances
    Settled(Decision),
    /// Eligible by amount, the balance decides
    NeedsBalance(&'a DropPolicy),
}

/// Policy table keyed by denom. Loaded once, immutable afterwards.
#[cfg_attr(feature = "serialize_serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serialize_serde",
    serde(try_from = "BTreeMap<String, DropPolicy>", into = "BTreeMap<String, DropPolicy>")
)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DropPolicies {
    by_denom: BTreeMap<String, DropPolicy>,
}

impl DropPolicies {
    /// Build a table, rejecting empty denom keys.
    pub fn new(by_denom: BTreeMap<String, DropPolicy>) -> CoreResult<Self> {
        if let Some(denom) = by_denom.keys().find(|d| d.trim().is_empty()) {
            return Err(CoreError::InvalidPolicy {
                denom: denom.clone(),
                reason: "denom must not be empty".to_string(),
            });
        }
        Ok(Self { by_denom })
    }

    pub fn get(&self, denom: &str) -> Option<&DropPolicy> {
        self.by_denom.get(denom)
    }

    pub fn len(&self) -> usize {
        self.by_denom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_denom.is_empty()
    }

    pub fn denoms(&self) -> impl Iterator<Item = &str> {
        self.by_denom.keys().map(String::as_str)
    }

    /// Apply the denom and threshold rules.
    pub fn screen(&self, event: &BondEvent) -> Screening<'_> {
        let Some(policy) = self.by_denom.get(&event.denom) else {
            return Screening::Settled(Decision::SkipUnsupported);
        };
        if event.amount < policy.min_bond_amount {
            return Screening::Settled(Decision::SkipBelowThreshold {
                min_bond_amount: policy.min_bond_amount,
            });
        }
        Screening::NeedsBalance(policy)
    }

    /// Full decision for a known reward balance.
    pub fn decide(&self, event: &BondEvent, reward_balance: Amount) -> Decision {
        match self.screen(event) {
            Screening::Settled(decision) => decision,
            Screening::NeedsBalance(policy) => policy.settle(reward_balance),
        }
    }
}

impl TryFrom<BTreeMap<String, DropPolicy>> for DropPolicies {
    type Error = CoreError;

    fn try_from(by_denom: BTreeMap<String, DropPolicy>) -> Result<Self, Self::Error> {
        Self::new(by_denom)
    }
}

impl From<DropPolicies> for BTreeMap<String, DropPolicy> {
    fn from(policies: DropPolicies) -> Self {
        policies.by_denom
    }
}
