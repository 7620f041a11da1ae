//! Token bucket rate limiter for RPC requests.

use crate::config::RateLimitConfig;
use std::num::NonZeroU32;

const FALLBACK_RPS: NonZeroU32 = match NonZeroU32::new(10) {
    Some(n) => n,
    None => NonZeroU32::MIN,
};

/// A token bucket rate limiter shared by all queries against one endpoint.
///
/// Uses the `governor` crate; callers wait for a slot rather than failing.
pub struct RpcRateLimiter {
    limiter: governor::DefaultDirectRateLimiter,
}

impl RpcRateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        let rps = NonZeroU32::new(config.max_rps).unwrap_or(FALLBACK_RPS);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(rps);
        let limiter = governor::RateLimiter::direct(governor::Quota::per_second(rps).allow_burst(burst));

        Self { limiter }
    }

    /// Wait for the next available slot.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    /// Take a slot if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for RpcRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
