//! RPC plumbing: the REST chain reader, rate limiting and retry logic.
//!
//! This module provides:
//! - `RestChainReader` - `ChainReader` over the Cosmos REST gateway
//! - `RpcRateLimiter` - Token bucket rate limiting for RPC requests
//! - `RetryExecutor` - Fixed-interval, cancellable retry logic

pub mod rate_limiter;
pub mod rest;
pub mod retry;

pub use rate_limiter::RpcRateLimiter;
pub use rest::RestChainReader;
pub use retry::{Attempt, RetryExecutor, RetryFailure};
