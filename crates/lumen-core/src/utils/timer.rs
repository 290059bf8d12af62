// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::{Duration, Instant};

/// Timing information for one tick of a loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Number of ticks completed before this one.
    pub frame: u64,
    /// Time elapsed since the clock started.
    pub total: Duration,
    /// Time elapsed since the previous tick.
    pub delta: Duration,
}

impl FrameTime {
    /// The delta in seconds.
    #[inline]
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }
}

/// Counts ticks and measures the time between them.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    frame: u64,
}

impl FrameClock {
    /// Starts a new clock.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            frame: 0,
        }
    }

    /// Marks the beginning of a new tick and returns its timing.
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let time = FrameTime {
            frame: self.frame,
            total: now - self.start,
            delta: now - self.last,
        };
        self.last = now;
        self.frame += 1;
        time
    }

    /// Number of ticks so far.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frame
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_count_up_and_total_is_monotonic() {
        let mut clock = FrameClock::new();
        let first = clock.tick();
        std::thread::sleep(Duration::from_millis(2));
        let second = clock.tick();
        assert_eq!(first.frame, 0);
        assert_eq!(second.frame, 1);
        assert!(second.total >= first.total);
        assert!(second.delta >= Duration::from_millis(2));
        assert_eq!(clock.frame_count(), 2);
    }
}
