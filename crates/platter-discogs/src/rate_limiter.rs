// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info};

use crate::error::{DiscogsError, Result};

/// Requests per interval for anonymous clients.
pub const DEFAULT_REQUEST_LIMIT: u32 = 25;
/// Requests per interval for authenticated clients.
pub const DEFAULT_REQUEST_LIMIT_AUTH: u32 = 60;
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Upper bound on requests per refresh interval. Server feedback may lower it.
    pub max_requests: u32,
    pub refresh_interval: Duration,
    /// How many requests may be in flight at once.
    pub concurrency: usize,
}

impl RateLimiterConfig {
    pub fn new(max_requests: u32, refresh_interval: Duration) -> Self {
        Self {
            max_requests,
            refresh_interval,
            concurrency: 1,
        }
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Defaults for a client with or without credentials.
    pub fn for_auth(authenticated: bool) -> Self {
        let max_requests = if authenticated {
            DEFAULT_REQUEST_LIMIT_AUTH
        } else {
            DEFAULT_REQUEST_LIMIT
        };
        Self::new(max_requests, DEFAULT_REFRESH_INTERVAL)
    }
}

/// Point-in-time view of the token bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub ceiling: u32,
    pub remaining: u32,
    pub refresh_interval: Duration,
    pub min_interval: Duration,
}

#[derive(Debug)]
struct BucketState {
    ceiling: u32,
    remaining: u32,
    refresh_interval: Duration,
    min_interval: Duration,
    last_dispatch: Option<Instant>,
    next_refill: Instant,
}

impl BucketState {
    fn new(ceiling: u32, refresh_interval: Duration) -> Self {
        let ceiling = ceiling.max(1);
        Self {
            ceiling,
            remaining: ceiling,
            refresh_interval,
            min_interval: refresh_interval / ceiling,
            last_dispatch: None,
            next_refill: Instant::now() + refresh_interval,
        }
    }

    fn refill(&mut self, now: Instant) {
        if now >= self.next_refill {
            self.remaining = self.ceiling;
            self.next_refill = now + self.refresh_interval;
        }
    }

    /// How long the next dispatch has to wait, zero if it may go now.
    fn delay(&self, now: Instant) -> Duration {
        let spacing = self
            .last_dispatch
            .map(|last| (last + self.min_interval).saturating_duration_since(now))
            .unwrap_or_default();
        let budget = if self.remaining == 0 {
            self.next_refill.saturating_duration_since(now)
        } else {
            Duration::ZERO
        };
        spacing.max(budget)
    }

    fn lower_ceiling(&mut self, ceiling: u32) -> bool {
        if ceiling == 0 || ceiling >= self.ceiling {
            return false;
        }
        self.ceiling = ceiling;
        self.min_interval = self.refresh_interval / ceiling;
        self.remaining = self.remaining.min(ceiling);
        true
    }

    fn set_remaining(&mut self, remaining: u32) {
        self.remaining = remaining.min(self.ceiling);
    }

    fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            ceiling: self.ceiling,
            remaining: self.remaining,
            refresh_interval: self.refresh_interval,
            min_interval: self.min_interval,
        }
    }
}

/// Token-bucket rate limiter for Discogs API calls.
///
/// Dispatch is FIFO: waiters queue on a fair semaphore (in-flight slots) and
/// then on a fair gate while the bucket paces them. The bucket refills to the
/// current ceiling every refresh interval, and requests are spaced at least
/// `refresh_interval / ceiling` apart. Discogs reports its own limit in
/// response headers; a lower server limit replaces the configured ceiling for
/// the rest of the limiter's life without disturbing queued waiters.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    slots: Arc<Semaphore>,
    dispatch: Arc<tokio::sync::Mutex<()>>,
    state: Arc<Mutex<BucketState>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(config.concurrency.max(1))),
            dispatch: Arc::new(tokio::sync::Mutex::new(())),
            state: Arc::new(Mutex::new(BucketState::new(
                config.max_requests,
                config.refresh_interval,
            ))),
        }
    }

    /// Wait until a request may be dispatched. The returned permit holds one
    /// concurrency slot until dropped.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        let permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| DiscogsError::RateLimiterClosed)?;

        let _gate = self.dispatch.lock().await;
        loop {
            let wait = {
                let mut state = self.lock_state();
                let now = Instant::now();
                state.refill(now);
                let wait = state.delay(now);
                if wait.is_zero() {
                    state.remaining = state.remaining.saturating_sub(1);
                    state.last_dispatch = Some(now);
                    return Ok(permit);
                }
                wait
            };
            debug!(target: "discogs", "rate limiting: waiting {:?}", wait);
            sleep(wait).await;
        }
    }

    /// Apply the limits Discogs reported on a response.
    ///
    /// A ceiling only ever moves down. The remaining budget is taken as-is,
    /// clamped to the ceiling.
    pub fn apply_server_limits(&self, ceiling: Option<u32>, remaining: Option<u32>) {
        let mut state = self.lock_state();
        if let Some(ceiling) = ceiling {
            if state.lower_ceiling(ceiling) {
                info!(
                    target: "discogs",
                    ceiling,
                    min_interval = ?state.min_interval,
                    "server lowered request ceiling"
                );
            }
        }
        if let Some(remaining) = remaining {
            state.set_remaining(remaining);
        }
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        self.lock_state().snapshot()
    }

    /// Stop handing out permits. Pending and future `acquire` calls fail.
    pub fn close(&self) {
        self.slots.close();
    }

    fn lock_state(&self) -> MutexGuard<'_, BucketState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
