//! Keyed sliding-window rate limiting for the public endpoints.
//!
//! Each endpoint class gets its own named limiter with its own budget,
//! because abuse patterns differ: validation is called on every app launch
//! by legitimate devices, while creation and recovery should be rare.
//!
//! Keys carry their dimension (`ip:<addr>`, `license:<key>`, `email:<addr>`)
//! so a single license cannot be hammered from many IPs and a single IP
//! cannot probe many license keys.
//!
//! Configure via environment variables:
//! - RATE_LIMIT_ACTIVATION_RPM (default: 10)
//! - RATE_LIMIT_VALIDATION_RPM (default: 60)
//! - RATE_LIMIT_CREATION_RPM (default: 5)
//! - RATE_LIMIT_RECOVERY_RPH (default: 3)

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::http::header::HeaderName;
use chrono::{DateTime, Utc};

/// Request budgets per endpoint class.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub activation_per_minute: u32,
    pub validation_per_minute: u32,
    pub creation_per_minute: u32,
    pub recovery_per_hour: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            activation_per_minute: 10,
            validation_per_minute: 60,
            creation_per_minute: 5,
            recovery_per_hour: 3,
        }
    }
}

/// Which dimension of a request was throttled. Determines the
/// `X-RateLimit-Remaining-*` header attached to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitScope {
    Ip,
    License,
    Email,
}

impl LimitScope {
    pub fn remaining_header(&self) -> HeaderName {
        match self {
            LimitScope::Ip => HeaderName::from_static("x-ratelimit-remaining-ip"),
            LimitScope::License => HeaderName::from_static("x-ratelimit-remaining-license"),
            LimitScope::Email => HeaderName::from_static("x-ratelimit-remaining-email"),
        }
    }
}

/// Successful rate-limit check: how much budget is left in the window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub limit: u32,
    pub remaining: u32,
}

/// Rejected rate-limit check, propagated as a structured error so the
/// handler boundary can attach the reset header.
#[derive(Debug, Clone)]
pub struct RateLimitExceeded {
    pub scope: LimitScope,
    /// When the oldest hit falls out of the window and a request will be
    /// accepted again.
    pub reset: DateTime<Utc>,
}

/// Sliding-window counter over a keyed hit log.
///
/// State is in-process; a multi-instance deployment needs a shared counter
/// store instead.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    hits: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record a hit for `key` and decide whether it is within budget.
    ///
    /// The check and the increment happen under one lock so concurrent
    /// callers cannot both observe the last free slot.
    pub fn check(&self, scope: LimitScope, key: &str) -> Result<RateLimitDecision, RateLimitExceeded> {
        let now = Instant::now();
        let mut hits = self.hits.lock().expect("rate limiter mutex poisoned");
        let timestamps = hits.entry(key.to_string()).or_default();

        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests as usize {
            // Oldest surviving hit determines when a slot frees up. A zero
            // budget has no hits; it resets a full window out.
            let until_reset = match timestamps.first() {
                Some(oldest) => self.window.saturating_sub(now.duration_since(*oldest)),
                None => self.window,
            };
            let reset = Utc::now()
                + chrono::Duration::from_std(until_reset)
                    .unwrap_or_else(|_| chrono::Duration::seconds(0));
            return Err(RateLimitExceeded { scope, reset });
        }

        timestamps.push(now);
        Ok(RateLimitDecision {
            limit: self.max_requests,
            remaining: self.max_requests - timestamps.len() as u32,
        })
    }

    /// Drop keys whose hits have all aged out of the window, so the map
    /// does not grow without bound under key churn.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut hits = self.hits.lock().expect("rate limiter mutex poisoned");
        hits.retain(|_, timestamps| {
            timestamps.retain(|t| now.duration_since(*t) < self.window);
            !timestamps.is_empty()
        });
    }
}

/// The named limiters, one per endpoint class. Shared across handlers via
/// `AppState`.
pub struct RateLimiters {
    pub activation: RateLimiter,
    pub validation: RateLimiter,
    pub creation: RateLimiter,
    pub recovery: RateLimiter,
}

impl RateLimiters {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            activation: RateLimiter::new(config.activation_per_minute, 60),
            validation: RateLimiter::new(config.validation_per_minute, 60),
            creation: RateLimiter::new(config.creation_per_minute, 60),
            recovery: RateLimiter::new(config.recovery_per_hour, 3600),
        }
    }

    pub fn cleanup(&self) {
        self.activation.cleanup();
        self.validation.cleanup();
        self.creation.cleanup();
        self.recovery.cleanup();
    }
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_budget_then_rejects() {
        let limiter = RateLimiter::new(3, 60);

        for _ in 0..3 {
            assert!(limiter.check(LimitScope::Ip, "ip:1.2.3.4").is_ok());
        }
        assert!(limiter.check(LimitScope::Ip, "ip:1.2.3.4").is_err());
    }

    #[test]
    fn remaining_counts_down() {
        let limiter = RateLimiter::new(3, 60);

        let first = limiter.check(LimitScope::Ip, "ip:1.2.3.4").unwrap();
        assert_eq!(first.remaining, 2);
        let second = limiter.check(LimitScope::Ip, "ip:1.2.3.4").unwrap();
        assert_eq!(second.remaining, 1);
        let third = limiter.check(LimitScope::Ip, "ip:1.2.3.4").unwrap();
        assert_eq!(third.remaining, 0);
    }

    #[test]
    fn zero_budget_rejects_every_request() {
        let limiter = RateLimiter::new(0, 60);

        let exceeded = limiter.check(LimitScope::Ip, "ip:1.2.3.4").unwrap_err();
        assert_eq!(exceeded.scope, LimitScope::Ip);
        assert!(exceeded.reset > Utc::now());
    }

    #[test]
    fn keys_are_isolated() {
        let limiter = RateLimiter::new(1, 60);

        assert!(limiter.check(LimitScope::Ip, "ip:1.2.3.4").is_ok());
        assert!(limiter.check(LimitScope::Ip, "ip:1.2.3.4").is_err());
        assert!(limiter.check(LimitScope::License, "license:AAAA-BBBB").is_ok());
    }

    #[test]
    fn window_elapses_and_budget_returns() {
        let limiter = RateLimiter::new(1, 1);

        assert!(limiter.check(LimitScope::Ip, "ip:1.2.3.4").is_ok());
        assert!(limiter.check(LimitScope::Ip, "ip:1.2.3.4").is_err());

        std::thread::sleep(Duration::from_millis(1100));
        assert!(limiter.check(LimitScope::Ip, "ip:1.2.3.4").is_ok());
    }

    #[test]
    fn rejection_reports_future_reset() {
        let limiter = RateLimiter::new(1, 60);
        limiter.check(LimitScope::Ip, "ip:1.2.3.4").unwrap();

        let exceeded = limiter.check(LimitScope::Ip, "ip:1.2.3.4").unwrap_err();
        assert!(exceeded.reset > Utc::now());
        assert_eq!(exceeded.scope, LimitScope::Ip);
    }

    #[test]
    fn cleanup_drops_expired_keys() {
        let limiter = RateLimiter::new(2, 1);
        limiter.check(LimitScope::Ip, "ip:1.2.3.4").unwrap();

        std::thread::sleep(Duration::from_millis(1100));
        limiter.cleanup();

        let hits = limiter.hits.lock().unwrap();
        assert!(hits.is_empty());
    }
}
