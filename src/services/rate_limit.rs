//! Fixed-window rate limiter keyed by string (phone number for OTP requests).
//!
//! A window opens on the first hit for a key and lasts `window`. Within it at
//! most `max` hits are allowed; rejected hits don't count.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Prune expired windows once the map grows past this many keys
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    resets_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

pub struct RateLimiter {
    max: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut windows = self.windows.lock();

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, w| w.resets_at > now);
        }

        let window = windows
            .entry(key.to_string())
            .and_modify(|w| {
                if now >= w.resets_at {
                    *w = Window {
                        count: 0,
                        resets_at: now + self.window,
                    };
                }
            })
            .or_insert(Window {
                count: 0,
                resets_at: now + self.window,
            });

        if window.count >= self.max {
            return RateDecision::Limited {
                retry_after: window.resets_at.saturating_duration_since(now),
            };
        }

        window.count += 1;
        RateDecision::Allowed {
            remaining: self.max - window.count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixth_request_in_window_is_limited() {
        let limiter = RateLimiter::new(5, Duration::from_secs(3600));
        let start = Instant::now();

        for i in 0..5 {
            let decision = limiter.check_at("+972501234567", start + Duration::from_secs(i));
            assert_eq!(decision, RateDecision::Allowed { remaining: 4 - i as u32 });
        }

        let sixth = limiter.check_at("+972501234567", start + Duration::from_secs(10));
        assert!(!sixth.is_allowed());

        // Another phone has its own window
        assert!(limiter.check_at("+972509999999", start).is_allowed());
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.check_at("k", start).is_allowed());
        match limiter.check_at("k", start + Duration::from_secs(59)) {
            RateDecision::Limited { retry_after } => assert_eq!(retry_after, Duration::from_secs(1)),
            other => panic!("expected limit, got {:?}", other),
        }
        assert!(limiter.check_at("k", start + Duration::from_secs(60)).is_allowed());
    }
}
