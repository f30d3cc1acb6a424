//! Client-side call budget.
//!
//! [`RateLimit`] is a token bucket (GCRA via `governor`) allowing a burst of
//! `n` calls and refilling at `n` per second. Callers that exceed the budget
//! wait for the next permit instead of failing. One instance is meant to be
//! shared (`Arc<RateLimit>`) by every client talking to the same merchant.

use std::num::NonZeroU32;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;

/// Calls per second Clover allows per merchant token.
pub const CLOVER_CALLS_PER_SECOND: NonZeroU32 = nonzero!(16u32);

pub struct RateLimit {
    limiter: DefaultDirectRateLimiter,
    per_second: NonZeroU32,
}

impl RateLimit {
    pub fn per_second(per_second: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            per_second,
        }
    }

    pub fn clover_default() -> Self {
        Self::per_second(CLOVER_CALLS_PER_SECOND)
    }

    pub fn calls_per_second(&self) -> NonZeroU32 {
        self.per_second
    }

    /// Wait until a call is permitted.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    /// Take a permit if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimit")
            .field("per_second", &self.per_second)
            .finish()
    }
}
