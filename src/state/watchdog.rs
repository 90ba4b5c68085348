//! Server silence detection.
//!
//! Every push event counts as activity. If nothing arrives within the
//! threshold the watchdog reports the connection as lost, once, and stays
//! quiet until activity resumes.

use std::time::{Duration, Instant};

use crate::config::DEFAULT_INACTIVITY_THRESHOLD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogStatus {
    Healthy,
    /// Threshold crossed on this check
    ConnectionLost,
    /// Already reported, still silent
    StillLost,
}

#[derive(Debug, Clone)]
pub struct InactivityWatchdog {
    threshold: Duration,
    last_activity: Instant,
    last_activity_at: chrono::DateTime<chrono::Utc>,
    reported: bool,
}

impl InactivityWatchdog {
    pub fn new(threshold: Duration, now: Instant) -> Self {
        Self {
            threshold,
            last_activity: now,
            last_activity_at: chrono::Utc::now(),
            reported: false,
        }
    }

    pub fn with_default_threshold(now: Instant) -> Self {
        Self::new(DEFAULT_INACTIVITY_THRESHOLD, now)
    }

    /// Record server activity.
    pub fn observe(&mut self, now: Instant) {
        if self.reported {
            tracing::info!("Server activity resumed");
        }
        self.last_activity = now;
        self.last_activity_at = chrono::Utc::now();
        self.reported = false;
    }

    pub fn idle_time(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Wall-clock time of the last server activity.
    pub fn last_activity_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.last_activity_at
    }

    pub fn is_lost(&self) -> bool {
        self.reported
    }

    pub fn check(&mut self, now: Instant) -> WatchdogStatus {
        if self.idle_time(now) <= self.threshold {
            return WatchdogStatus::Healthy;
        }
        if self.reported {
            return WatchdogStatus::StillLost;
        }
        self.reported = true;
        tracing::warn!(
            idle_secs = self.idle_time(now).as_secs(),
            threshold_secs = self.threshold.as_secs(),
            "No server activity, connection considered lost"
        );
        WatchdogStatus::ConnectionLost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_within_threshold() {
        let start = Instant::now();
        let mut dog = InactivityWatchdog::new(Duration::from_secs(10), start);
        assert_eq!(dog.check(start + Duration::from_secs(10)), WatchdogStatus::Healthy);
    }

    #[test]
    fn test_reports_once() {
        let start = Instant::now();
        let mut dog = InactivityWatchdog::new(Duration::from_secs(10), start);

        assert_eq!(
            dog.check(start + Duration::from_secs(11)),
            WatchdogStatus::ConnectionLost
        );
        assert!(dog.is_lost());
        assert_eq!(dog.check(start + Duration::from_secs(30)), WatchdogStatus::StillLost);
    }

    #[test]
    fn test_activity_rearms() {
        let start = Instant::now();
        let mut dog = InactivityWatchdog::with_default_threshold(start);

        let later = start + Duration::from_secs(60);
        assert_eq!(dog.check(later), WatchdogStatus::ConnectionLost);

        dog.observe(later);
        assert!(!dog.is_lost());
        assert_eq!(dog.check(later + Duration::from_secs(5)), WatchdogStatus::Healthy);
        assert_eq!(
            dog.check(later + Duration::from_secs(46)),
            WatchdogStatus::ConnectionLost
        );
    }
}
