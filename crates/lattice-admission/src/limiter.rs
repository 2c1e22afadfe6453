use std::collections::HashMap;
use std::sync::Arc;

use lattice_core::{AccountId, Clock, SystemClock};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Configuration for the admission limiter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// When false every check is admitted
    pub enabled: bool,
    /// Burst size: tokens a fresh bucket starts with
    pub capacity: f64,
    /// Tokens per second
    pub refill_rate: f64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        LimiterConfig {
            enabled: true,
            capacity: 20.0,
            refill_rate: 10.0,
        }
    }
}

/// Token bucket for a single account
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBucket {
    pub capacity: f64,
    pub tokens: f64,
    pub refill_rate: f64,
    /// Milliseconds; never moves backward
    pub last_refill_ms: u64,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_rate: f64, now_ms: u64) -> Self {
        TokenBucket {
            capacity,
            tokens: capacity,
            refill_rate,
            last_refill_ms: now_ms,
        }
    }

    /// Lazily add `elapsed * refill_rate` tokens, capped at capacity.
    /// A clock reading earlier than the last refill adds nothing.
    fn refill(&mut self, now_ms: u64) {
        if now_ms <= self.last_refill_ms {
            if now_ms < self.last_refill_ms {
                warn!(
                    "Clock moved backward ({} < {}), skipping refill",
                    now_ms, self.last_refill_ms
                );
            }
            return;
        }

        let elapsed_secs = (now_ms - self.last_refill_ms) as f64 / 1000.0;
        self.tokens = (self.tokens + elapsed_secs * self.refill_rate).min(self.capacity);
        self.last_refill_ms = now_ms;
    }

    /// Refill, then take one token if available
    pub fn try_consume(&mut self, now_ms: u64) -> bool {
        self.refill(now_ms);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-account rate limiter. Buckets are created lazily on first check.
pub struct AdmissionLimiter {
    config: LimiterConfig,
    clock: Arc<dyn Clock>,
    buckets: Mutex<HashMap<AccountId, TokenBucket>>,
}

impl AdmissionLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: LimiterConfig, clock: Arc<dyn Clock>) -> Self {
        AdmissionLimiter {
            config,
            clock,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Admit `account` now, consuming one token if allowed
    pub fn check_and_consume(&self, account: &AccountId) -> bool {
        self.check_and_consume_at(account, self.clock.now_millis())
    }

    pub fn check_and_consume_at(&self, account: &AccountId, now_ms: u64) -> bool {
        if !self.config.enabled {
            return true;
        }

        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(account.clone()).or_insert_with(|| {
            TokenBucket::new(self.config.capacity, self.config.refill_rate, now_ms)
        });

        let allowed = bucket.try_consume(now_ms);
        if !allowed {
            debug!("Rate limited {} ({:.2} tokens)", account, bucket.tokens);
        }
        allowed
    }

    /// Snapshot of an account's bucket, if one exists
    pub fn bucket(&self, account: &AccountId) -> Option<TokenBucket> {
        self.buckets.lock().get(account).cloned()
    }

    /// Drop all buckets
    pub fn reset(&self) {
        self.buckets.lock().clear();
    }
}
