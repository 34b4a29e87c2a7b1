//! Reconnection policy: exponential backoff, jitter and a circuit breaker.
//!
//! Reconnecting immediately on every close turns a failing server into a
//! reconnect storm. Delays grow exponentially up to a cap, a random jitter
//! spreads clients apart, and after a run of consecutive failures the
//! breaker opens and the next attempt waits for a long cooldown.

use std::time::Duration;

/// Tunables for the reconnect loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for the exponential part of the delay.
    pub max_delay: Duration,
    /// Growth factor per consecutive failure.
    pub factor: f64,
    /// Upper bound for the random jitter added to every delay.
    pub max_jitter: Duration,
    /// Consecutive failures after which the breaker opens (0 = never).
    pub failures_before_cooldown: u32,
    /// Delay used once the breaker is open.
    pub cooldown: Duration,
    /// A connection that closes sooner than this counts as a failure.
    pub stable_after: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
            max_jitter: Duration::from_secs(1),
            failures_before_cooldown: 8,
            cooldown: Duration::from_secs(300),
            stable_after: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    /// Whether `attempt` consecutive failures open the breaker.
    pub fn is_tripped(&self, attempt: u32) -> bool {
        self.failures_before_cooldown > 0 && attempt > self.failures_before_cooldown
    }

    /// Exponential delay for the given attempt (1-based), without jitter.
    ///
    /// Formula: min(max_delay, base_delay * factor^(attempt - 1))
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let scaled = self.base_delay.as_secs_f64() * self.effective_factor().powi(exponent);
        // f64::min discards NaN, so the cap always wins on overflow
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Full delay before the given attempt, jitter included.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = if self.is_tripped(attempt) {
            self.cooldown
        } else {
            self.backoff(attempt)
        };
        base + random_jitter(self.max_jitter)
    }

    /// Whether a connection that stayed open for `uptime` was healthy.
    pub fn is_stable(&self, uptime: Duration) -> bool {
        uptime >= self.stable_after
    }

    fn effective_factor(&self) -> f64 {
        if self.factor.is_finite() && self.factor >= 1.0 {
            self.factor
        } else {
            2.0
        }
    }
}

/// Generate random jitter between zero and `max` (inclusive, millisecond resolution).
fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return Duration::ZERO;
    }
    let random = u64::from_le_bytes(bytes);
    Duration::from_millis(random % (max_ms + 1))
}
