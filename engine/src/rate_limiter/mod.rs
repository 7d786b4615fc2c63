//! Rate limiting module
//!
//! Per-client sliding window for the generation endpoints. Each client
//! (remote IP, or the first `x-forwarded-for` hop) may make `limit` requests
//! in any `window`. State is in memory only and is lost on restart.

use sdk::errors::EngineError;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Sources tracked before idle ones are dropped
const MAX_TRACKED_SOURCES: usize = 10_000;

/// Rate limiter for tracking and enforcing request limits
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// `limit` requests per minute
    pub fn per_minute(limit: usize) -> Self {
        Self::with_window(limit, Duration::from_secs(60))
    }

    pub fn with_window(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            requests: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Check the limit for `source` and record the request when allowed.
    ///
    /// Rejected requests are not recorded, so a client that backs off
    /// regains capacity as its earlier requests leave the window.
    pub fn check_and_record(&self, source: &str) -> Result<(), EngineError> {
        let now = Instant::now();
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());

        if requests.len() >= MAX_TRACKED_SOURCES {
            Self::drop_idle(&mut requests, now, self.window);
        }

        let timestamps = requests.entry(source.to_string()).or_default();
        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        let count = timestamps.len();
        debug!("Rate limit check for {}: {}/{}", source, count, self.limit);

        if count >= self.limit {
            warn!("Rate limit exceeded for source {}: {}/{}", source, count, self.limit);
            return Err(EngineError::RateLimitExceeded {
                src: source.to_string(),
                count,
                limit: self.limit,
                window: format!("{} seconds", self.window.as_secs()),
            });
        }

        timestamps.push_back(now);
        Ok(())
    }

    /// Number of sources currently tracked
    pub fn tracked_sources(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Remove sources whose requests have all left the window
    pub fn purge_idle(&self) {
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        Self::drop_idle(&mut requests, Instant::now(), self.window);
    }

    fn drop_idle(requests: &mut HashMap<String, VecDeque<Instant>>, now: Instant, window: Duration) {
        let before = requests.len();
        requests.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|last| now.duration_since(*last) < window)
        });
        let removed = before - requests.len();
        if removed > 0 {
            debug!("Dropped {} idle rate limit sources", removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = RateLimiter::per_minute(3);
        for _ in 0..3 {
            assert!(limiter.check_and_record("10.0.0.1").is_ok());
        }

        match limiter.check_and_record("10.0.0.1") {
            Err(EngineError::RateLimitExceeded { count, limit, .. }) => {
                assert_eq!(count, 3);
                assert_eq!(limit, 3);
            }
            other => panic!("Expected rate limit error, got {:?}", other),
        }
    }

    #[test]
    fn test_sources_are_independent() {
        let limiter = RateLimiter::per_minute(1);
        assert!(limiter.check_and_record("a").is_ok());
        assert!(limiter.check_and_record("a").is_err());
        assert!(limiter.check_and_record("b").is_ok());
        assert_eq!(limiter.tracked_sources(), 2);
    }

    #[test]
    fn test_window_slides() {
        let limiter = RateLimiter::with_window(1, Duration::from_millis(30));
        assert!(limiter.check_and_record("a").is_ok());
        assert!(limiter.check_and_record("a").is_err());
        std::thread::sleep(Duration::from_millis(50));
        assert!(limiter.check_and_record("a").is_ok());
    }

    #[test]
    fn test_purge_idle() {
        let limiter = RateLimiter::with_window(5, Duration::from_millis(20));
        limiter.check_and_record("a").unwrap();
        std::thread::sleep(Duration::from_millis(40));
        limiter.purge_idle();
        assert_eq!(limiter.tracked_sources(), 0);
    }
}
