use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window request limiter.
///
/// Holds no per-user state itself: each session owns its timestamp queue and
/// the limiter is applied to it under that session's lock. Timestamps are
/// recorded in non-decreasing order, so expiry is a prefix trim.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, DEFAULT_WINDOW)
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Admits the request at `now` and records it, or rejects it without
    /// recording anything.
    pub fn admit(&self, timestamps: &mut VecDeque<Instant>, now: Instant) -> bool {
        self.evict_expired(timestamps, now);

        if timestamps.len() >= self.max_requests as usize {
            return false;
        }

        timestamps.push_back(now);
        true
    }

    /// Time until the oldest recorded request leaves the window.
    pub fn retry_after(&self, timestamps: &VecDeque<Instant>, now: Instant) -> Duration {
        timestamps
            .front()
            .map(|&oldest| {
                self.window
                    .saturating_sub(now.saturating_duration_since(oldest))
            })
            .unwrap_or(Duration::ZERO)
    }

    pub fn remaining(&self, timestamps: &VecDeque<Instant>, now: Instant) -> u32 {
        let live = timestamps
            .iter()
            .filter(|&&ts| now.saturating_duration_since(ts) < self.window)
            .count();
        self.max_requests.saturating_sub(live as u32)
    }

    fn evict_expired(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = timestamps.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Whole seconds, rounded up, so a caller told to wait never retries early.
pub(crate) fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_over_limit_without_recording() {
        let limiter = RateLimiter::per_minute(2);
        let mut timestamps = VecDeque::new();
        let now = Instant::now();

        assert!(limiter.admit(&mut timestamps, now));
        assert!(limiter.admit(&mut timestamps, now + Duration::from_millis(10)));
        assert!(!limiter.admit(&mut timestamps, now + Duration::from_millis(20)));
        assert_eq!(timestamps.len(), 2);
        assert_eq!(limiter.remaining(&timestamps, now + Duration::from_millis(20)), 0);
    }

    #[test]
    fn test_window_slides() {
        let limiter = RateLimiter::per_minute(2);
        let mut timestamps = VecDeque::new();
        let start = Instant::now();

        assert!(limiter.admit(&mut timestamps, start));
        assert!(limiter.admit(&mut timestamps, start + Duration::from_secs(30)));
        assert!(!limiter.admit(&mut timestamps, start + Duration::from_secs(59)));

        // first request leaves the window, the one at +30s does not
        assert!(limiter.admit(&mut timestamps, start + Duration::from_secs(60)));
        assert!(!limiter.admit(&mut timestamps, start + Duration::from_secs(61)));
        assert_eq!(timestamps.len(), 2);
    }

    #[test]
    fn test_never_more_than_max_in_any_window() {
        let limiter = RateLimiter::per_minute(3);
        let mut timestamps = VecDeque::new();
        let start = Instant::now();
        let mut admitted = Vec::new();

        for step in 0..600u64 {
            let now = start + Duration::from_millis(step * 250);
            if limiter.admit(&mut timestamps, now) {
                admitted.push(now);
            }
        }

        for (i, &first) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .take_while(|&&t| t.duration_since(first) < DEFAULT_WINDOW)
                .count();
            assert!(in_window <= 3);
        }
    }

    #[test]
    fn test_retry_after_counts_down_from_oldest() {
        let limiter = RateLimiter::per_minute(1);
        let mut timestamps = VecDeque::new();
        let start = Instant::now();

        assert!(limiter.admit(&mut timestamps, start));
        let wait = limiter.retry_after(&timestamps, start + Duration::from_millis(45_500));
        assert_eq!(wait, Duration::from_millis(14_500));
        assert_eq!(ceil_secs(wait), 15);
        assert_eq!(limiter.retry_after(&VecDeque::new(), start), Duration::ZERO);
    }
}
