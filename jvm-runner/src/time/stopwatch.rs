// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stopwatch for tracking how long a process runs.
//!
//! A process run records when it started, for reporting, and how long it took. The start time uses
//! the realtime clock, while the duration is measured with the monotonic clock so that it can't go
//! backwards.

use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

pub(crate) fn stopwatch() -> StopwatchStart {
    StopwatchStart::new()
}

/// The start state of a stopwatch.
#[derive(Clone, Debug)]
pub(crate) struct StopwatchStart {
    start_time: DateTime<Local>,
    instant: Instant,
}

impl StopwatchStart {
    fn new() -> Self {
        Self {
            // These two syscalls will happen imperceptibly close to each other, which is good
            // enough for our purposes.
            start_time: Local::now(),
            instant: Instant::now(),
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }

    /// Returns true once `timeout` has passed since the stopwatch was started.
    pub(crate) fn is_past(&self, timeout: Option<Duration>) -> bool {
        timeout.is_some_and(|timeout| self.elapsed() >= timeout)
    }

    pub(crate) fn snapshot(&self) -> StopwatchSnapshot {
        StopwatchSnapshot {
            start_time: self.start_time,
            duration: self.elapsed(),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct StopwatchSnapshot {
    pub(crate) start_time: DateTime<Local>,
    pub(crate) duration: Duration,
}

impl StopwatchSnapshot {
    pub(crate) fn end_time(&self) -> DateTime<Local> {
        self.start_time + self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopwatch_timeout() {
        let start = stopwatch();
        assert!(!start.is_past(None));
        assert!(!start.is_past(Some(Duration::from_secs(3600))));

        std::thread::sleep(Duration::from_millis(50));
        assert!(start.is_past(Some(Duration::from_millis(10))));

        let snapshot = start.snapshot();
        assert!(snapshot.duration >= Duration::from_millis(50));
        assert!(snapshot.end_time() >= snapshot.start_time);
    }
}
