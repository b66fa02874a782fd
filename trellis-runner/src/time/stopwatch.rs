// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stopwatch for runs and units.
//!
//! A stopwatch records the wall-clock start time, for display, and a monotonic instant, for
//! measuring how long something took.

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
            start_time: Local::now(),
            instant: Instant::now(),
        }
    }

    pub(crate) fn snapshot(&self) -> StopwatchSnapshot {
        StopwatchSnapshot {
            start_time: self.start_time,
            duration: self.instant.elapsed(),
        }
    }
}

/// The elapsed time of a stopwatch at a point in time.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StopwatchSnapshot {
    /// When the stopwatch was started.
    pub(crate) start_time: DateTime<Local>,

    /// How long has passed since the start.
    pub(crate) duration: Duration,
}

impl StopwatchSnapshot {
    /// Returns the wall-clock time at which the snapshot was taken.
    pub(crate) fn end_time(&self) -> DateTime<Local> {
        self.start_time + self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_advances() {
        let start = stopwatch();
        std::thread::sleep(Duration::from_millis(20));
        let snapshot = start.snapshot();
        assert!(snapshot.duration >= Duration::from_millis(20));
        assert!(snapshot.end_time() >= snapshot.start_time);
    }
}
