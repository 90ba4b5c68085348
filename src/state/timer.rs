//! Turn countdown.
//!
//! Advisory only: the server decides when a turn really times out. The
//! timer is driven by explicit instants so it can be stepped in tests.

use std::time::{Duration, Instant};

use crate::config::DEFAULT_TURN_DURATION;

/// Result of polling the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    Stopped,
    Running { remaining_secs: u32 },
    /// Reported once per start
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerPhase {
    Stopped,
    Running { deadline: Instant },
    Expired,
}

#[derive(Debug, Clone)]
pub struct TurnTimer {
    duration: Duration,
    phase: TimerPhase,
}

impl Default for TurnTimer {
    fn default() -> Self {
        Self::new(DEFAULT_TURN_DURATION)
    }
}

impl TurnTimer {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            phase: TimerPhase::Stopped,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// (Re)start the countdown from the full duration.
    ///
    /// A duration too large to place a deadline leaves the timer stopped.
    pub fn start(&mut self, now: Instant) {
        self.phase = match now.checked_add(self.duration) {
            Some(deadline) => TimerPhase::Running { deadline },
            None => {
                tracing::warn!(
                    duration_secs = self.duration.as_secs(),
                    "Turn duration out of range, timer not started"
                );
                TimerPhase::Stopped
            }
        };
    }

    /// Stop and reset to zero.
    pub fn stop(&mut self) {
        self.phase = TimerPhase::Stopped;
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, TimerPhase::Running { .. })
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        match self.phase {
            TimerPhase::Running { deadline } => deadline.saturating_duration_since(now),
            TimerPhase::Stopped | TimerPhase::Expired => Duration::ZERO,
        }
    }

    /// Whole seconds left, rounded up so the display shows 1 until expiry.
    pub fn remaining_secs(&self, now: Instant) -> u32 {
        let remaining = self.remaining(now);
        let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
        u32::try_from(secs).unwrap_or(u32::MAX)
    }

    pub fn tick(&mut self, now: Instant) -> TimerTick {
        match self.phase {
            TimerPhase::Stopped | TimerPhase::Expired => TimerTick::Stopped,
            TimerPhase::Running { deadline } if now >= deadline => {
                self.phase = TimerPhase::Expired;
                TimerTick::Expired
            }
            TimerPhase::Running { .. } => TimerTick::Running {
                remaining_secs: self.remaining_secs(now),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_by_default() {
        let mut timer = TurnTimer::default();
        let now = Instant::now();
        assert!(!timer.is_running());
        assert_eq!(timer.tick(now), TimerTick::Stopped);
        assert_eq!(timer.remaining_secs(now), 0);
    }

    #[test]
    fn test_countdown_and_single_expiry() {
        let mut timer = TurnTimer::default();
        let start = Instant::now();
        timer.start(start);

        assert_eq!(
            timer.tick(start + Duration::from_millis(500)),
            TimerTick::Running { remaining_secs: 120 }
        );
        assert_eq!(
            timer.tick(start + Duration::from_secs(100)),
            TimerTick::Running { remaining_secs: 20 }
        );

        let end = start + Duration::from_secs(120);
        assert_eq!(timer.tick(end), TimerTick::Expired);
        assert_eq!(timer.tick(end + Duration::from_secs(1)), TimerTick::Stopped);
        assert_eq!(timer.remaining_secs(end), 0);
    }

    #[test]
    fn test_unrepresentable_deadline_stays_stopped() {
        let mut timer = TurnTimer::new(Duration::MAX);
        let now = Instant::now();
        timer.start(now);

        assert!(!timer.is_running());
        assert_eq!(timer.tick(now), TimerTick::Stopped);
        assert_eq!(timer.remaining_secs(now), 0);
    }

    #[test]
    fn test_stop_resets() {
        let mut timer = TurnTimer::new(Duration::from_secs(30));
        let start = Instant::now();
        timer.start(start);
        timer.stop();

        assert_eq!(timer.remaining(start), Duration::ZERO);
        assert_eq!(timer.tick(start + Duration::from_secs(60)), TimerTick::Stopped);
    }

    #[test]
    fn test_restart_rearms_expiry() {
        let mut timer = TurnTimer::new(Duration::from_secs(10));
        let start = Instant::now();
        timer.start(start);
        assert_eq!(timer.tick(start + Duration::from_secs(10)), TimerTick::Expired);

        let again = start + Duration::from_secs(15);
        timer.start(again);
        assert_eq!(timer.remaining_secs(again), 10);
        assert_eq!(timer.tick(again + Duration::from_secs(10)), TimerTick::Expired);
    }
}
