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

use super::driver::{FrameDriver, FrameStats};
use super::passes::RenderPass;
use super::tick::TickLoop;
use crate::config::RenderConfig;
use crate::context::RenderContext;
use crate::queue::RenderCommandQueue;
use lumen_core::renderer::{GraphicsDevice, RenderError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Frame statistics kept for [`RenderThread::drain_stats`] before the oldest
/// are discarded.
const STATS_BACKLOG: usize = 256;

#[derive(Debug)]
enum Control {
    Resize(u32, u32),
}

/// Owns a [`FrameDriver`] on a dedicated thread.
///
/// The graphics device is created on the render thread itself by the factory
/// passed to [`RenderThread::spawn`], so backends bound to the thread that
/// created them work unchanged.
#[derive(Debug)]
pub struct RenderThread {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    control: flume::Sender<Control>,
    stats: flume::Receiver<FrameStats>,
}

impl RenderThread {
    /// Starts the render thread and waits until its device is created.
    ///
    /// `passes` replaces the default pipeline when not empty.
    pub fn spawn<F>(
        config: &RenderConfig,
        queue: RenderCommandQueue,
        factory: F,
        passes: Vec<Box<dyn RenderPass>>,
    ) -> Result<Self, RenderError>
    where
        F: FnOnce() -> Result<Arc<dyn GraphicsDevice>, RenderError> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let (control_tx, control_rx) = flume::unbounded::<Control>();
        let (stats_tx, stats_rx) = flume::bounded::<FrameStats>(STATS_BACKLOG);
        let (ready_tx, ready_rx) = flume::bounded::<Result<(), RenderError>>(1);

        let tick_loop = TickLoop::with_flag(config.render_rate, Arc::clone(&running));
        let config = config.clone();
        let handle = thread::Builder::new()
            .name("lumen-render".to_owned())
            .spawn(move || {
                let device = match factory() {
                    Ok(device) => device,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let context = RenderContext::new(device, &config);
                let mut driver = if passes.is_empty() {
                    FrameDriver::with_default_passes(context, queue)
                } else {
                    let mut driver = FrameDriver::new(context, queue);
                    for pass in passes {
                        driver.passes.push(pass);
                    }
                    driver
                };
                let _ = ready_tx.send(Ok(()));
                log::info!("Render thread started");

                tick_loop.run(|_| {
                    for control in control_rx.try_iter() {
                        match control {
                            Control::Resize(width, height) => driver.resize(width, height),
                        }
                    }
                    let stats = driver.tick();
                    if stats_tx.try_send(stats).is_err() {
                        log::trace!("Frame statistics backlog full, dropping a frame's stats");
                    }
                });

                driver.shutdown();
                log::info!("Render thread stopped");
            })
            .map_err(|e| {
                RenderError::InitializationFailed(format!("could not spawn the render thread: {e}"))
            })?;

        let mut this = Self {
            running,
            handle: Some(handle),
            control: control_tx,
            stats: stats_rx,
        };
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(this),
            Ok(Err(e)) => {
                this.stop()?;
                Err(e)
            }
            Err(_) => {
                this.stop()?;
                Err(RenderError::InitializationFailed(
                    "render thread exited during startup".to_owned(),
                ))
            }
        }
    }

    /// Resizes the render target at the start of the next frame.
    pub fn resize(&self, width: u32, height: u32) {
        if self.control.send(Control::Resize(width, height)).is_err() {
            log::warn!("Render thread is gone, resize to {width}x{height} ignored");
        }
    }

    /// Takes the statistics of the frames completed since the last call.
    pub fn drain_stats(&self) -> Vec<FrameStats> {
        self.stats.try_iter().collect()
    }

    /// Returns `true` until [`Self::stop`] is called or the thread exits.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the loop, releases the GPU objects and joins the thread.
    pub fn stop(&mut self) -> Result<(), RenderError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| RenderError::Internal("render thread panicked".to_owned()))?;
        }
        Ok(())
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("Failed to stop the render thread: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FrameRate;
    use crate::queue::command_channel;
    use lumen_infra::HeadlessDevice;
    use std::time::{Duration, Instant};

    fn config() -> RenderConfig {
        RenderConfig {
            render_rate: FrameRate::Fixed(500),
            ..Default::default()
        }
    }

    #[test]
    fn thread_renders_until_stopped() {
        let config = config();
        let (_sender, queue) = command_channel(config.deferral);
        let device = Arc::new(HeadlessDevice::new());
        let shared = device.clone();
        let mut thread = RenderThread::spawn(
            &config,
            queue,
            move || Ok(shared as Arc<dyn GraphicsDevice>),
            Vec::new(),
        )
        .unwrap();

        thread.resize(320, 200);
        let start = Instant::now();
        let mut frames = Vec::new();
        while frames.len() < 3 && start.elapsed() < Duration::from_secs(5) {
            frames.extend(thread.drain_stats());
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(frames.len() >= 3);
        assert_eq!(frames[0].frame, 0);
        assert!(thread.is_running());

        thread.stop().unwrap();
        assert!(!thread.is_running());
        assert_eq!(device.viewport(), (320, 200));
        assert!(device.stats().frames_finished >= 3);
    }

    #[test]
    fn failing_factory_is_reported() {
        let config = config();
        let (_sender, queue) = command_channel(config.deferral);
        let result = RenderThread::spawn(
            &config,
            queue,
            || Err(RenderError::InitializationFailed("no adapter".to_owned())),
            Vec::new(),
        );
        assert!(matches!(result, Err(RenderError::InitializationFailed(_))));
    }
}
