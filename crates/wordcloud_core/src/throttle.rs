use serde::{Deserialize, Serialize};

use crate::{ONE_DAY_MS, ONE_SEC_MS};

/// Usage-plan style limits enforced at the gateway boundary, before any
/// compute work: a token bucket for short-term rate and a per-UTC-day quota.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ThrottleConfig {
    /// Requests admitted per UTC day.
    pub quota_per_day: u64,
    /// Steady-state admission rate in requests per second.
    pub rate_limit: f64,
    /// Token bucket capacity: requests admitted back-to-back from idle.
    pub burst_limit: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            quota_per_day: 1_000,
            rate_limit: 10.0,
            burst_limit: 20,
        }
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    Admitted,
    RateLimited,
    QuotaExhausted,
}

/// Gateway admission state. Time is supplied by the caller in epoch
/// milliseconds so tests drive the clock directly.
///
/// The rate gate is evaluated before the quota gate, and a request consumes
/// a token and a quota unit only when admitted: a rate-limited burst does
/// not burn daily quota.
#[derive(Debug, Clone)]
pub struct GatewayThrottle {
    config: ThrottleConfig,
    tokens: f64,
    refilled_at_ms: u64,
    day_index: u64,
    admitted_today: u64,
}

impl GatewayThrottle {
    pub fn new(config: ThrottleConfig, now_ms: u64) -> Self {
        Self {
            config,
            tokens: f64::from(config.burst_limit),
            refilled_at_ms: now_ms,
            day_index: now_ms / ONE_DAY_MS,
            admitted_today: 0,
        }
    }

    pub fn admit(&mut self, now_ms: u64) -> ThrottleDecision {
        self.refill(now_ms);
        self.roll_day(now_ms);

        if self.tokens < 1.0 {
            return ThrottleDecision::RateLimited;
        }
        if self.admitted_today >= self.config.quota_per_day {
            return ThrottleDecision::QuotaExhausted;
        }

        self.tokens -= 1.0;
        self.admitted_today += 1;
        ThrottleDecision::Admitted
    }

    pub fn quota_used_today(&self) -> u64 {
        self.admitted_today
    }

    fn refill(&mut self, now_ms: u64) {
        if now_ms <= self.refilled_at_ms {
            return;
        }
        let elapsed_ms = now_ms - self.refilled_at_ms;
        let refill = self.config.rate_limit * (elapsed_ms as f64) / (ONE_SEC_MS as f64);
        self.tokens = (self.tokens + refill).min(f64::from(self.config.burst_limit));
        self.refilled_at_ms = now_ms;
    }

    fn roll_day(&mut self, now_ms: u64) {
        let day_index = now_ms / ONE_DAY_MS;
        if day_index != self.day_index {
            self.day_index = day_index;
            self.admitted_today = 0;
        }
    }
}
