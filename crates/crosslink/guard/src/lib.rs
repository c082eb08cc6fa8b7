//! Crosslink Guard - sliding-window admission control.
//!
//! Per-key request admission over a continuously trailing window. Unlike a
//! fixed-bucket limiter, a burst cannot straddle a bucket boundary to get
//! `2 x limit` admissions: every check counts the events inside the window
//! ending now.
//!
//! State is process-local and ephemeral. It is rebuilt from empty on
//! restart and is not part of the durable data model.

#![deny(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Admission policy: at most `limit` admitted calls per trailing `window`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            limit: 5,
            window: Duration::from_secs(60),
        }
    }
}

/// Sliding-window rate limiter keyed by caller identity.
///
/// Constructed once per process and shared by reference into request
/// handling; admission checks from concurrent requests serialize on an
/// internal mutex so no update is lost.
pub struct SlidingWindowLimiter {
    policy: RateLimitPolicy,
    histories: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            histories: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Admit or reject a call for `key` at the current instant.
    pub fn admit(&self, key: &str) -> bool {
        self.admit_at(key, Instant::now())
    }

    /// Admission check against an explicit clock reading.
    ///
    /// Kept public so tests can drive the window without sleeping.
    pub fn admit_at(&self, key: &str, now: Instant) -> bool {
        if self.policy.limit == 0 {
            return false;
        }

        let mut histories = self
            .histories
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let history = histories.entry(key.to_string()).or_default();
        Self::discard_aged(history, now, self.policy.window);

        if history.len() >= self.policy.limit as usize {
            tracing::warn!(key, limit = self.policy.limit, "admission rejected");
            return false;
        }

        history.push_back(now);
        true
    }

    /// Drop keys whose entire history has aged out of the window.
    ///
    /// Safe to run on a timer or opportunistically, concurrently with
    /// `admit`; bounds the map to keys seen within the last window.
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    pub fn sweep_at(&self, now: Instant) {
        let mut histories = self
            .histories
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        histories.retain(|_, history| {
            Self::discard_aged(history, now, self.policy.window);
            !history.is_empty()
        });
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.histories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn discard_aged(history: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = history.front() {
            // `saturating_duration_since` tolerates clock readings that
            // predate the entry, which can happen in tests.
            if now.saturating_duration_since(*oldest) >= window {
                history.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn limiter(limit: u32, window_ms: u64) -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(RateLimitPolicy {
            limit,
            window: Duration::from_millis(window_ms),
        })
    }

    #[test]
    fn admits_up_to_limit_then_rejects() {
        let limiter = limiter(2, 1000);
        let t0 = Instant::now();

        assert!(limiter.admit_at("u1", t0));
        assert!(limiter.admit_at("u1", t0 + Duration::from_millis(10)));
        assert!(!limiter.admit_at("u1", t0 + Duration::from_millis(20)));
    }

    #[test]
    fn admits_again_after_window_elapses() {
        let limiter = limiter(2, 1000);
        let t0 = Instant::now();

        assert!(limiter.admit_at("u1", t0));
        assert!(limiter.admit_at("u1", t0 + Duration::from_millis(10)));
        assert!(!limiter.admit_at("u1", t0 + Duration::from_millis(20)));
        assert!(limiter.admit_at("u1", t0 + Duration::from_millis(1500)));
    }

    #[test]
    fn window_slides_rather_than_resetting() {
        let limiter = limiter(2, 1000);
        let t0 = Instant::now();

        assert!(limiter.admit_at("u1", t0));
        assert!(limiter.admit_at("u1", t0 + Duration::from_millis(900)));
        // Only the first admission has aged out by t0+1100.
        assert!(limiter.admit_at("u1", t0 + Duration::from_millis(1100)));
        assert!(!limiter.admit_at("u1", t0 + Duration::from_millis(1200)));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = limiter(1, 1000);
        let t0 = Instant::now();

        assert!(limiter.admit_at("u1", t0));
        assert!(limiter.admit_at("u2", t0));
        assert!(!limiter.admit_at("u1", t0));
    }

    #[test]
    fn zero_limit_always_rejects() {
        let limiter = limiter(0, 1000);
        assert!(!limiter.admit_at("u1", Instant::now()));
    }

    #[test]
    fn sweep_drops_fully_aged_keys_only() {
        let limiter = limiter(2, 1000);
        let t0 = Instant::now();

        limiter.admit_at("old", t0);
        limiter.admit_at("fresh", t0 + Duration::from_millis(900));
        limiter.sweep_at(t0 + Duration::from_millis(1100));

        assert_eq!(limiter.tracked_keys(), 1);
        // The surviving key still counts its in-window admission.
        assert!(limiter.admit_at("fresh", t0 + Duration::from_millis(1100)));
        assert!(!limiter.admit_at("fresh", t0 + Duration::from_millis(1150)));
    }

    proptest! {
        #[test]
        fn never_admits_more_than_limit_in_one_instant(
            limit in 0u32..16,
            attempts in 0usize..64,
        ) {
            let limiter = limiter(limit, 1000);
            let now = Instant::now();
            let admitted = (0..attempts)
                .filter(|_| limiter.admit_at("key", now))
                .count();
            prop_assert_eq!(admitted, attempts.min(limit as usize));
        }
    }
}
