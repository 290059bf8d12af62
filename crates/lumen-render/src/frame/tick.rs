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

use crate::config::FrameRate;
use lumen_core::utils::{FrameClock, FrameTime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A poll loop running a closure at a fixed or adaptive rate until its
/// running flag is cleared.
#[derive(Debug, Clone)]
pub struct TickLoop {
    period: Option<Duration>,
    running: Arc<AtomicBool>,
}

impl TickLoop {
    /// Creates a loop with its own running flag, initially set.
    pub fn new(rate: FrameRate) -> Self {
        Self::with_flag(rate, Arc::new(AtomicBool::new(true)))
    }

    /// Creates a loop controlled by a shared flag.
    pub fn with_flag(rate: FrameRate, running: Arc<AtomicBool>) -> Self {
        Self {
            period: rate.period(),
            running,
        }
    }

    /// The flag the loop polls; clear it to stop the loop.
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Asks the loop to stop after the current tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Runs `tick` until stopped. Returns the number of ticks performed.
    ///
    /// Fixed-rate loops sleep off what is left of each period; adaptive loops
    /// yield between ticks.
    pub fn run(&self, mut tick: impl FnMut(FrameTime)) -> u64 {
        let mut clock = FrameClock::new();
        while self.running.load(Ordering::Relaxed) {
            let start = Instant::now();
            tick(clock.tick());
            match self.period {
                Some(period) => {
                    let elapsed = start.elapsed();
                    if elapsed < period {
                        thread::sleep(period - elapsed);
                    }
                }
                None => thread::yield_now(),
            }
        }
        clock.frame_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_stops_when_flag_is_cleared() {
        let tick_loop = TickLoop::new(FrameRate::Adaptive);
        let running = tick_loop.running();
        let mut frames = Vec::new();
        let count = tick_loop.run(|time| {
            frames.push(time.frame);
            if frames.len() == 5 {
                running.store(false, Ordering::SeqCst);
            }
        });
        assert_eq!(count, 5);
        assert_eq!(frames, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn fixed_rate_sleeps_off_the_period() {
        let tick_loop = TickLoop::new(FrameRate::Fixed(200));
        let stopper = tick_loop.clone();
        let start = Instant::now();
        let mut remaining = 3;
        tick_loop.run(|_| {
            remaining -= 1;
            if remaining == 0 {
                stopper.stop();
            }
        });
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
