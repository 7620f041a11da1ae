//! Staking Drop Core
//!
//! Runtime-free building blocks for the staking drop service:
//!
//! - [`types`]: 256-bit amounts, bech32 addresses and coins
//! - [`events`]: transaction log model and `bond_executed` extraction
//! - [`policy`]: per-denom drop policies and the eligibility decision

pub mod error;
pub mod events;
pub mod policy;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use events::{
    bond_events, Attribute, BondEvent, StringEvent, TxLog, BOND_EVENT_ATTRIBUTE_COUNT,
    EVENT_TYPE_BOND_EXECUTED,
};
pub use policy::{Decision, DropPolicies, DropPolicy, Screening};
pub use types::{Address, Amount, Coin};
