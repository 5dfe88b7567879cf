//! Admission control: per-session sliding windows and platform concurrency.
//!
//! Each session keeps timestamps of its admitted requests for the trailing
//! hour. A request that would exceed the per-minute or per-hour threshold
//! blocks the session for a fixed cooldown. Blocks are lifted lazily on the
//! next [`RateLimiter::admit`] call; no timers run per session.
//!
//! Concurrency is bounded separately by a [`SlotPool`] shared by all sessions.

mod clock;
mod slots;

#[cfg(test)]
pub use clock::MockClock;
pub use clock::{Clock, SystemClock};
pub use slots::{SlotPool, SlotToken};

use crate::config::RateLimitSettings;
use crate::error::RecapError;
use crate::security::sanitize_for_log;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Outcome of a per-session admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Blocked { retry_after: Duration },
}

/// Rolling request history for one session.
#[derive(Debug, Default)]
struct RateWindow {
    /// Admission times within the last hour, oldest first.
    requests: VecDeque<Instant>,
    blocked_until: Option<Instant>,
}

impl RateWindow {
    fn evict(&mut self, now: Instant) {
        while let Some(&oldest) = self.requests.front() {
            if now.saturating_duration_since(oldest) >= HOUR {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }

    fn count_within(&self, now: Instant, window: Duration) -> usize {
        self.requests
            .iter()
            .rev()
            .take_while(|&&t| now.saturating_duration_since(t) < window)
            .count()
    }

    fn remaining_block(&self, now: Instant) -> Option<Duration> {
        self.blocked_until
            .filter(|&until| until > now)
            .map(|until| until - now)
    }
}

/// Rate-limit status for a single session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub requests_last_minute: usize,
    pub requests_last_hour: usize,
    pub remaining_minute: usize,
    pub remaining_hour: usize,
    pub blocked: bool,
    pub block_seconds_remaining: Option<u64>,
}

/// Platform-wide admission status.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformStats {
    pub in_use: usize,
    pub max_concurrent: usize,
    pub available: usize,
    pub tracked_sessions: usize,
    pub utilization_percent: f64,
}

/// Per-session rate limiting plus the platform slot pool.
#[derive(Debug)]
pub struct RateLimiter {
    settings: RateLimitSettings,
    sessions: Mutex<HashMap<String, RateWindow>>,
    slots: Arc<SlotPool>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter driven by the system clock.
    pub fn new(settings: RateLimitSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock::new()))
    }

    /// Create a rate limiter with a custom time source.
    pub fn with_clock(settings: RateLimitSettings, clock: Arc<dyn Clock>) -> Self {
        let slots = SlotPool::new(settings.max_concurrent);
        Self {
            settings,
            sessions: Mutex::new(HashMap::new()),
            slots,
            clock,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, RateWindow>> {
        // Window state stays consistent across a panic: every mutation is a
        // single push, pop or assignment.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a video-summarization request against `session_id`.
    pub fn admit(&self, session_id: &str) -> Admission {
        let now = self.clock.now();
        let mut sessions = self.sessions();
        let window = sessions.entry(session_id.to_string()).or_default();

        if let Some(retry_after) = window.remaining_block(now) {
            debug!(
                "Session {} still blocked for {}s",
                sanitize_for_log(session_id, 64),
                retry_after.as_secs()
            );
            return Admission::Blocked { retry_after };
        }
        window.blocked_until = None;
        window.evict(now);

        let last_minute = window.count_within(now, MINUTE);
        let last_hour = window.requests.len();

        if last_minute >= self.settings.requests_per_minute
            || last_hour >= self.settings.requests_per_hour
        {
            let block = self.settings.block_duration();
            window.blocked_until = Some(now + block);
            warn!(
                "Session {} exceeded rate limit ({} in last minute, {} in last hour); blocked for {}s",
                sanitize_for_log(session_id, 64),
                last_minute,
                last_hour,
                block.as_secs()
            );
            return Admission::Blocked { retry_after: block };
        }

        window.requests.push_back(now);
        Admission::Allowed
    }

    /// Like [`admit`](Self::admit), but as a `Result` for `?` propagation.
    pub fn check(&self, session_id: &str) -> crate::error::Result<()> {
        match self.admit(session_id) {
            Admission::Allowed => Ok(()),
            Admission::Blocked { retry_after } => Err(RecapError::RateLimited { retry_after }),
        }
    }

    /// Take a platform concurrency slot without waiting.
    pub fn acquire_slot(&self) -> crate::error::Result<SlotToken> {
        self.slots.try_acquire().ok_or_else(|| {
            warn!("Platform at capacity ({} concurrent)", self.slots.max_concurrent());
            RecapError::CapacityExceeded {
                max_concurrent: self.slots.max_concurrent(),
            }
        })
    }

    /// Return a slot explicitly. Dropping the token has the same effect.
    pub fn release(&self, token: SlotToken) {
        token.release();
    }

    /// Current status for one session.
    pub fn session_stats(&self, session_id: &str) -> SessionStats {
        let now = self.clock.now();
        let sessions = self.sessions();
        let (minute, hour, block) = match sessions.get(session_id) {
            Some(window) => (
                window.count_within(now, MINUTE),
                window.count_within(now, HOUR),
                window.remaining_block(now),
            ),
            None => (0, 0, None),
        };

        SessionStats {
            session_id: session_id.to_string(),
            requests_last_minute: minute,
            requests_last_hour: hour,
            remaining_minute: self.settings.requests_per_minute.saturating_sub(minute),
            remaining_hour: self.settings.requests_per_hour.saturating_sub(hour),
            blocked: block.is_some(),
            block_seconds_remaining: block.map(|d| d.as_secs()),
        }
    }

    /// Current platform-wide status.
    pub fn platform_stats(&self) -> PlatformStats {
        let in_use = self.slots.in_use();
        let max = self.slots.max_concurrent();
        let utilization = if max == 0 {
            100.0
        } else {
            ((in_use as f64 / max as f64) * 10_000.0).round() / 100.0
        };

        PlatformStats {
            in_use,
            max_concurrent: max,
            available: max.saturating_sub(in_use),
            tracked_sessions: self.sessions().len(),
            utilization_percent: utilization,
        }
    }

    /// Forget sessions with no requests in the last hour and no active block.
    pub fn prune_idle(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions();
        let before = sessions.len();

        sessions.retain(|_, window| {
            window.evict(now);
            !window.requests.is_empty() || window.remaining_block(now).is_some()
        });

        let removed = before - sessions.len();
        if removed > 0 {
            info!("Pruned {} idle rate-limit sessions", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> (RateLimiter, MockClock) {
        let clock = MockClock::new(Instant::now());
        let limiter = RateLimiter::with_clock(RateLimitSettings::default(), Arc::new(clock.clone()));
        (limiter, clock)
    }

    #[test]
    fn test_eleventh_request_in_a_minute_is_blocked() {
        let (limiter, clock) = limiter();

        for _ in 0..10 {
            assert_eq!(limiter.admit("s1"), Admission::Allowed);
            clock.advance(Duration::from_secs(1));
        }

        match limiter.admit("s1") {
            Admission::Blocked { retry_after } => assert!(retry_after > Duration::ZERO),
            Admission::Allowed => panic!("11th request should be blocked"),
        }

        // Other sessions are unaffected.
        assert_eq!(limiter.admit("s2"), Admission::Allowed);
    }

    #[test]
    fn test_block_countdown_is_non_increasing() {
        let (limiter, clock) = limiter();
        for _ in 0..10 {
            limiter.admit("s1");
        }

        let mut last = Duration::MAX;
        for _ in 0..5 {
            match limiter.admit("s1") {
                Admission::Blocked { retry_after } => {
                    assert!(retry_after <= last);
                    last = retry_after;
                }
                Admission::Allowed => panic!("should stay blocked"),
            }
            clock.advance(Duration::from_secs(30));
        }

        // Blocked requests are not counted.
        assert_eq!(limiter.session_stats("s1").requests_last_hour, 10);
    }

    #[test]
    fn test_block_lifts_after_cooldown() {
        let (limiter, clock) = limiter();
        for _ in 0..11 {
            limiter.admit("s1");
        }
        assert!(limiter.session_stats("s1").blocked);

        clock.advance(Duration::from_secs(300));
        assert_eq!(limiter.admit("s1"), Admission::Allowed);
        assert!(!limiter.session_stats("s1").blocked);
    }

    #[test]
    fn test_window_slides() {
        let (limiter, clock) = limiter();
        for _ in 0..10 {
            limiter.admit("s1");
        }
        clock.advance(Duration::from_secs(61));
        assert_eq!(limiter.admit("s1"), Admission::Allowed);

        let stats = limiter.session_stats("s1");
        assert_eq!(stats.requests_last_minute, 1);
        assert_eq!(stats.requests_last_hour, 11);
    }

    #[test]
    fn test_hourly_threshold() {
        let (limiter, clock) = limiter();
        for _ in 0..50 {
            assert_eq!(limiter.admit("s1"), Admission::Allowed);
            clock.advance(Duration::from_secs(61));
        }
        assert!(matches!(limiter.admit("s1"), Admission::Blocked { .. }));
    }

    #[test]
    fn test_check_maps_to_error() {
        let (limiter, _clock) = limiter();
        for _ in 0..10 {
            tokio_test::assert_ok!(limiter.check("s1"));
        }
        let err = tokio_test::assert_err!(limiter.check("s1"));
        assert!(matches!(err, RecapError::RateLimited { .. }));
    }

    #[test]
    fn test_slots_reject_without_queueing() {
        let settings = RateLimitSettings {
            max_concurrent: 1,
            ..Default::default()
        };
        let limiter = RateLimiter::new(settings);

        let token = limiter.acquire_slot().unwrap();
        assert!(matches!(
            limiter.acquire_slot(),
            Err(RecapError::CapacityExceeded { max_concurrent: 1 })
        ));

        limiter.release(token);
        assert_eq!(limiter.platform_stats().in_use, 0);
        assert!(limiter.acquire_slot().is_ok());
    }

    #[test]
    fn test_prune_idle() {
        let (limiter, clock) = limiter();
        limiter.admit("idle");
        for _ in 0..11 {
            limiter.admit("blocked");
        }

        clock.advance(Duration::from_secs(3601));
        limiter.admit("fresh");

        assert_eq!(limiter.prune_idle(), 2);
        assert_eq!(limiter.platform_stats().tracked_sessions, 1);
    }

    #[test]
    fn test_platform_stats() {
        let settings = RateLimitSettings {
            max_concurrent: 4,
            ..Default::default()
        };
        let limiter = RateLimiter::new(settings);
        let _token = limiter.acquire_slot().unwrap();

        let stats = limiter.platform_stats();
        assert_eq!(stats.in_use, 1);
        assert_eq!(stats.available, 3);
        assert_eq!(stats.utilization_percent, 25.0);
    }
}
