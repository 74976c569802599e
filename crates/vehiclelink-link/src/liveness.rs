use std::time::Duration;

use tokio::time::Instant;

/// Default period of the liveness tick.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Default silence after which the link is reported lost.
pub const DEFAULT_SILENCE_THRESHOLD: Duration = Duration::from_secs(15);

/// Liveness and heartbeat settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessConfig {
    /// How often silence is checked (and heartbeats sent).
    pub check_interval: Duration,
    /// Silence longer than this reports `connection-lost`.
    pub silence_threshold: Duration,
    /// Send an empty COMMAND frame on every tick.
    pub heartbeat: bool,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            silence_threshold: DEFAULT_SILENCE_THRESHOLD,
            heartbeat: false,
        }
    }
}

impl LivenessConfig {
    pub fn with_heartbeat(mut self, heartbeat: bool) -> Self {
        self.heartbeat = heartbeat;
        self
    }
}

/// Tracks time since the last valid frame.
///
/// Pure state machine: the caller supplies the clock. Loss is reported once
/// per silence episode; the next recorded activity re-arms it.
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    threshold: Duration,
    last_activity: Instant,
    reported: bool,
}

impl LivenessMonitor {
    pub fn new(threshold: Duration, now: Instant) -> Self {
        Self {
            threshold,
            last_activity: now,
            reported: false,
        }
    }

    /// A valid frame arrived.
    pub fn record_activity(&mut self, now: Instant) {
        self.last_activity = now;
        self.reported = false;
    }

    /// Returns the silence duration the first time it exceeds the threshold.
    pub fn check(&mut self, now: Instant) -> Option<Duration> {
        let silent_for = self.silent_for(now);
        if silent_for > self.threshold && !self.reported {
            self.reported = true;
            return Some(silent_for);
        }
        None
    }

    pub fn silent_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Whether loss has been reported for the current silence episode.
    pub fn is_lost(&self) -> bool {
        self.reported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_secs(15);

    #[test]
    fn quiet_below_threshold() {
        let start = Instant::now();
        let mut monitor = LivenessMonitor::new(THRESHOLD, start);
        assert_eq!(monitor.check(start + Duration::from_secs(10)), None);
        assert_eq!(monitor.check(start + THRESHOLD), None);
        assert!(!monitor.is_lost());
    }

    #[test]
    fn reports_once_per_episode() {
        let start = Instant::now();
        let mut monitor = LivenessMonitor::new(THRESHOLD, start);

        let lost = monitor.check(start + Duration::from_secs(20));
        assert_eq!(lost, Some(Duration::from_secs(20)));
        assert!(monitor.is_lost());
        assert_eq!(monitor.check(start + Duration::from_secs(30)), None);
        assert_eq!(monitor.check(start + Duration::from_secs(40)), None);
    }

    #[test]
    fn activity_rearms_detection() {
        let start = Instant::now();
        let mut monitor = LivenessMonitor::new(THRESHOLD, start);
        assert!(monitor.check(start + Duration::from_secs(20)).is_some());

        let resumed = start + Duration::from_secs(25);
        monitor.record_activity(resumed);
        assert!(!monitor.is_lost());
        assert_eq!(monitor.last_activity(), resumed);
        assert_eq!(monitor.check(resumed + Duration::from_secs(10)), None);
        assert_eq!(
            monitor.check(resumed + Duration::from_secs(16)),
            Some(Duration::from_secs(16))
        );
    }

    #[test]
    fn clock_going_backwards_is_not_silence() {
        let start = Instant::now() + Duration::from_secs(60);
        let monitor = LivenessMonitor::new(THRESHOLD, start);
        assert_eq!(monitor.silent_for(start - Duration::from_secs(5)), Duration::ZERO);
    }
}
