//! Fixed-window rate limiting per (caller key, client address).
//!
//! Uses a DashMap of counters keyed by caller, client and window index. Window
//! boundaries come from the wall clock, so a burst straddling a boundary is
//! admitted twice over. Stale windows are swept inline once the map grows past
//! a high-water mark.

use std::sync::Arc;

use dashmap::DashMap;
use toolgate_core::{Clock, RateLimitSettings};
use tracing::debug;

use crate::error::{GatewayError, Result};

/// Bucket count above which an admit call sweeps stale windows
pub const SWEEP_HIGH_WATER: usize = 10_000;

/// Buckets more than this many windows behind the current one are swept
pub const STALE_WINDOWS: i64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    caller: String,
    client: String,
    window: i64,
}

/// Shared rate limiter state (clone-friendly via Arc).
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<BucketKey, u64>>,
    settings: RateLimitSettings,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings, clock: Arc<dyn Clock>) -> Self {
        if !settings.is_enabled() {
            debug!("[RateLimit] Disabled by configuration");
        }
        Self {
            buckets: Arc::new(DashMap::new()),
            settings,
            clock,
        }
    }

    /// Count one request and fail once the window's count exceeds the max.
    pub fn admit(&self, caller: &str, client: &str) -> Result<()> {
        if !self.settings.is_enabled() {
            return Ok(());
        }

        let window = self.current_window();

        // Sweep before taking an entry guard: retain() locks every shard
        if self.buckets.len() > SWEEP_HIGH_WATER {
            self.sweep(window);
        }

        let key = BucketKey {
            caller: caller.to_string(),
            client: client.to_string(),
            window,
        };
        let count = {
            let mut entry = self.buckets.entry(key).or_insert(0);
            *entry += 1;
            *entry
        };

        if count as f64 > self.settings.max_requests {
            debug!(
                "[RateLimit] Rejected client {} (count {} in window {})",
                client, count, window
            );
            return Err(GatewayError::RateLimited);
        }
        Ok(())
    }

    /// Current count for a caller in the current window
    pub fn current_count(&self, caller: &str, client: &str) -> u64 {
        let key = BucketKey {
            caller: caller.to_string(),
            client: client.to_string(),
            window: self.current_window(),
        };
        self.buckets.get(&key).map(|c| *c).unwrap_or(0)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn current_window(&self) -> i64 {
        let window_ms = self.settings.window_seconds * 1000.0;
        (self.clock.now_millis() as f64 / window_ms).floor() as i64
    }

    fn sweep(&self, current: i64) {
        let before = self.buckets.len();
        self.buckets
            .retain(|key, _| current - key.window <= STALE_WINDOWS);
        debug!(
            "[RateLimit] Swept {} stale buckets",
            before.saturating_sub(self.buckets.len())
        );
    }
}
