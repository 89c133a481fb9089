//! Reconnection timing.
//!
//! Two independent layers, mirroring the connection wrapper's behavior:
//!
//! - [`ReconnectPolicy`]: the automatic schedule applied when an
//!   established connection drops with an error. Fixed delay table, no
//!   attempt beyond the table's end.
//! - [`StartRetry`]: the manual exponential backoff applied when
//!   `start()` fails before a connection was ever established.

use std::time::Duration;

/// Automatic reconnect schedule for error-triggered closures.
///
/// Attempt `n` waits `delays[n]`; once the table is exhausted no further
/// automatic attempt is scheduled and the connection goes terminal.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    delays: Vec<Duration>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delays: [0, 2, 10, 30, 60]
                .into_iter()
                .map(Duration::from_secs)
                .collect(),
        }
    }
}

impl ReconnectPolicy {
    /// A custom delay table.
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Delay before reconnect attempt `attempt` (0-based), or `None`
    /// once the schedule is exhausted.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        self.delays.get(attempt as usize).copied()
    }

    /// Number of automatic attempts this policy will make.
    pub fn max_attempts(&self) -> u32 {
        u32::try_from(self.delays.len()).unwrap_or(u32::MAX)
    }
}

/// Exponential backoff for failed `start()` calls.
///
/// `delay = min(base * 2^attempt, cap)`, up to `max_attempts` tries,
/// after which the failure is terminal and logged.
#[derive(Debug, Clone)]
pub struct StartRetry {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for StartRetry {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            cap: Duration::from_secs(60),
            max_attempts: 5,
        }
    }
}

impl StartRetry {
    /// Delay before retry `attempt` (0-based), or `None` when the
    /// attempt budget is spent.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let delay = self.base.checked_mul(factor).unwrap_or(self.cap);
        Some(delay.min(self.cap))
    }
}
