//! Per-endpoint request rate limiting.
//!
//! A [`RateLimiter`] admits at most `qps` request starts in any sliding
//! one-second window and can be put into a cooldown after the platform
//! answers 429. One limiter exists per base URL; tenants that share a URL
//! share the limiter so concurrent refreshes don't multiply the load.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::FetchError;

/// Default requests per second for one base URL.
pub const DEFAULT_QPS: usize = 3;

/// Default cooldown after an observed 429.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

const WINDOW: Duration = Duration::from_secs(1);

// ============================================================================
// Rate Limiter
// ============================================================================

#[derive(Debug, Default)]
struct LimiterState {
    starts: VecDeque<Instant>,
    cooldown_until: Option<Instant>,
}

/// Sliding-window QPS gate with cooldown.
#[derive(Debug)]
pub struct RateLimiter {
    qps: usize,
    cooldown: Duration,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Creates a limiter admitting `qps` starts per second (at least 1).
    pub fn new(qps: usize) -> Self {
        Self::with_cooldown(qps, DEFAULT_COOLDOWN)
    }

    /// Creates a limiter with a custom default cooldown.
    pub fn with_cooldown(qps: usize, cooldown: Duration) -> Self {
        Self {
            qps: qps.max(1),
            cooldown,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Returns the configured QPS.
    pub fn qps(&self) -> usize {
        self.qps
    }

    fn state(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the remaining cooldown, if any.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        self.state()
            .cooldown_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    /// Returns true while a cooldown is active.
    pub fn is_cooling_down(&self) -> bool {
        self.cooldown_remaining().is_some()
    }

    /// Starts (or extends) a cooldown. `None` uses the limiter's default.
    pub fn trigger_cooldown(&self, duration: Option<Duration>) {
        let duration = duration.unwrap_or(self.cooldown);
        let until = Instant::now() + duration;
        let mut state = self.state();
        if state.cooldown_until.is_none_or(|current| current < until) {
            state.cooldown_until = Some(until);
        }
        warn!(cooldown_secs = duration.as_secs(), "Rate limiter cooling down");
    }

    /// Ends any active cooldown.
    pub fn clear_cooldown(&self) {
        self.state().cooldown_until = None;
    }

    /// Reserves a start slot, or returns how long to wait for one.
    fn try_acquire(&self) -> Result<Option<Duration>, FetchError> {
        let now = Instant::now();
        let mut state = self.state();

        if let Some(until) = state.cooldown_until {
            if until > now {
                return Err(rate_limited(until - now));
            }
            state.cooldown_until = None;
        }

        while state.starts.front().is_some_and(|t| now.duration_since(*t) >= WINDOW) {
            state.starts.pop_front();
        }

        if state.starts.len() < self.qps {
            state.starts.push_back(now);
            return Ok(None);
        }

        let oldest = state.starts.front().copied().unwrap_or(now);
        Ok(Some(WINDOW.saturating_sub(now.duration_since(oldest))))
    }

    /// Runs `task` once a start slot is free.
    ///
    /// # Errors
    ///
    /// Fails fast with [`FetchError::RateLimited`] during a cooldown;
    /// otherwise returns whatever `task` returns.
    pub async fn execute<T, F, Fut>(&self, task: F) -> Result<T, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        // The lock is only held inside try_acquire, never across the sleep.
        while let Some(wait) = self.try_acquire()? {
            debug!(wait_ms = wait.as_millis(), "Rate limit window full, waiting");
            tokio::time::sleep(wait).await;
        }
        task().await
    }
}

fn rate_limited(remaining: Duration) -> FetchError {
    let remaining = chrono::Duration::from_std(remaining).unwrap_or(chrono::Duration::zero());
    FetchError::RateLimited {
        until: Utc::now() + remaining,
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Lazily created limiters, one per base URL.
#[derive(Debug)]
pub struct RateLimiterRegistry {
    default_qps: usize,
    cooldown: Duration,
    overrides: HashMap<String, usize>,
    limiters: Mutex<HashMap<String, Arc<RateLimiter>>>,
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_QPS)
    }
}

impl RateLimiterRegistry {
    /// Creates a registry with a default QPS.
    pub fn new(default_qps: usize) -> Self {
        Self {
            default_qps,
            cooldown: DEFAULT_COOLDOWN,
            overrides: HashMap::new(),
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the cooldown used by newly created limiters.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Sets per-URL QPS overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: HashMap<String, usize>) -> Self {
        self.overrides = overrides
            .into_iter()
            .map(|(url, qps)| (limiter_key(&url), qps))
            .collect();
        self
    }

    /// Returns the limiter for `base_url`, creating it on first use.
    pub fn get(&self, base_url: &str) -> Arc<RateLimiter> {
        let key = limiter_key(base_url);
        let mut limiters = self.limiters.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(limiters.entry(key).or_insert_with_key(|key| {
            let qps = self.overrides.get(key).copied().unwrap_or(self.default_qps);
            debug!(url = %key, qps, "Creating rate limiter");
            Arc::new(RateLimiter::with_cooldown(qps, self.cooldown))
        }))
    }

    /// Number of limiters created so far.
    pub fn len(&self) -> usize {
        self.limiters.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if no limiter has been created.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalizes a base URL into a registry key.
fn limiter_key(url: &str) -> String {
    url.trim().trim_end_matches('/').to_ascii_lowercase()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_window_admits_qps_then_delays() {
        let limiter = RateLimiter::new(2);
        let t0 = Instant::now();
        let mut started = Vec::new();

        for _ in 0..3 {
            let at = limiter.execute(|| async { Ok(Instant::now()) }).await.unwrap();
            started.push(at.duration_since(t0));
        }

        assert_eq!(started[0], Duration::ZERO);
        assert_eq!(started[1], Duration::ZERO);
        assert_eq!(started[2], Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_window() {
        let limiter = Arc::new(RateLimiter::new(3));
        let t0 = Instant::now();

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.execute(|| async { Ok(Instant::now()) }).await.unwrap()
                })
            })
            .collect();

        let mut offsets = Vec::new();
        for task in tasks {
            offsets.push(task.await.unwrap().duration_since(t0));
        }
        offsets.sort();

        assert_eq!(offsets.iter().filter(|d| d.is_zero()).count(), 3);
        assert_eq!(offsets[3], Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_fails_fast() {
        let limiter = RateLimiter::new(5);
        limiter.trigger_cooldown(None);
        assert!(limiter.is_cooling_down());

        let mut ran = false;
        let result = limiter
            .execute(|| {
                ran = true;
                async { Ok(()) }
            })
            .await;
        let err = result.unwrap_err();
        assert!(err.is_silent());
        assert!(!err.is_retryable());
        assert!(!ran);

        tokio::time::advance(DEFAULT_COOLDOWN).await;
        assert!(!limiter.is_cooling_down());
        assert!(limiter.execute(|| async { Ok(()) }).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_not_shortened() {
        let limiter = RateLimiter::new(1);
        limiter.trigger_cooldown(Some(Duration::from_secs(60)));
        limiter.trigger_cooldown(Some(Duration::from_secs(5)));
        let remaining = limiter.cooldown_remaining().unwrap();
        assert!(remaining > Duration::from_secs(50));
    }

    #[test]
    fn test_registry_caches_per_url() {
        let mut overrides = HashMap::new();
        overrides.insert("https://slow.example/".to_string(), 1);
        let registry = RateLimiterRegistry::new(4).with_overrides(overrides);

        let a = registry.get("https://api.example");
        let b = registry.get("https://API.example/");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.qps(), 4);
        assert_eq!(registry.get("https://slow.example").qps(), 1);
        assert_eq!(registry.len(), 2);
    }
}
