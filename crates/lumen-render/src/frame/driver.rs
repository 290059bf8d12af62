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

use super::passes::{DepthPrepass, FinishPass, ForwardPass, RenderPass};
use crate::camera::CameraState;
use crate::context::RenderContext;
use crate::light::ClusterStats;
use crate::queue::{QueueStats, RenderCommandQueue};
use lumen_core::utils::FrameClock;
use serde::Serialize;

/// What one frame did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameStats {
    /// Index of the frame, starting at zero.
    pub frame: u64,
    /// Command queue counters.
    pub queue: QueueStats,
    /// Cameras whose parameter block was written.
    pub cameras_uploaded: usize,
    /// Lights in the light library.
    pub lights: usize,
    /// Instance groups alive.
    pub instance_groups: usize,
    /// One entry per clustered camera, in entity order.
    pub clusters: Vec<ClusterStats>,
    /// Passes that returned an error.
    pub passes_failed: usize,
}

/// Runs render frames on a [`RenderContext`].
pub struct FrameDriver {
    context: RenderContext,
    queue: RenderCommandQueue,
    pub(super) passes: Vec<Box<dyn RenderPass>>,
    clock: FrameClock,
}

impl FrameDriver {
    /// Creates a driver with no pass.
    pub fn new(context: RenderContext, queue: RenderCommandQueue) -> Self {
        Self {
            context,
            queue,
            passes: Vec::new(),
            clock: FrameClock::new(),
        }
    }

    /// Creates a driver running the depth prepass, the forward pass and a
    /// finish.
    pub fn with_default_passes(context: RenderContext, queue: RenderCommandQueue) -> Self {
        let mut driver = Self::new(context, queue);
        driver.add_pass(DepthPrepass);
        driver.add_pass(ForwardPass);
        driver.add_pass(FinishPass);
        driver
    }

    /// Appends a pass.
    pub fn add_pass(&mut self, pass: impl RenderPass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Inserts a pass before the one named `before`. Returns `false`, leaving
    /// the passes untouched, if there is no such pass.
    pub fn insert_pass_before(&mut self, before: &str, pass: impl RenderPass + 'static) -> bool {
        match self.passes.iter().position(|p| p.name() == before) {
            Some(position) => {
                self.passes.insert(position, Box::new(pass));
                true
            }
            None => false,
        }
    }

    /// Names of the registered passes, in execution order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// The render context.
    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// The render context, mutably.
    pub fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.context
    }

    /// The command queue.
    pub fn queue(&self) -> &RenderCommandQueue {
        &self.queue
    }

    /// The command queue, mutably.
    pub fn queue_mut(&mut self) -> &mut RenderCommandQueue {
        &mut self.queue
    }

    /// Resizes the render target.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.context.resize(width, height);
    }

    /// Runs one frame.
    pub fn tick(&mut self) -> FrameStats {
        let time = self.clock.tick();
        let ctx = &mut self.context;
        let mut stats = FrameStats {
            frame: time.frame,
            queue: self.queue.execute(ctx),
            ..Default::default()
        };

        let device = ctx.device.clone();
        for (entity, camera) in ctx.states.iter_mut::<CameraState>() {
            match camera.upload(&*device) {
                Ok(true) => stats.cameras_uploaded += 1,
                Ok(false) => {}
                Err(e) => log::error!("Failed to upload camera {entity}: {e}"),
            }
        }

        if let Err(e) = ctx.lights.flush(&*device) {
            log::error!("Failed to upload the light library: {e}");
        }
        ctx.instances.flush(&*device);
        stats.lights = ctx.lights.len();
        stats.instance_groups = ctx.instances.len();

        let RenderContext {
            states,
            lights,
            clusters,
            ..
        } = ctx;
        for (entity, camera) in states.iter::<CameraState>() {
            if !camera.is_loaded() {
                continue;
            }
            match clusters.update(&*device, entity, camera, lights) {
                Ok(cluster_stats) => stats.clusters.push(cluster_stats),
                Err(e) => log::error!("Light clustering failed for camera {entity}: {e}"),
            }
        }

        for pass in &mut self.passes {
            if let Err(e) = pass.execute(&mut self.context) {
                log::error!("Render pass '{}' failed: {e}", pass.name());
                stats.passes_failed += 1;
            }
        }

        log::trace!("Frame {} done: {:?}", stats.frame, stats.queue);
        stats
    }

    /// Runs the commands still queued, then destroys every GPU object the
    /// context owns.
    pub fn shutdown(&mut self) {
        let stats = self.queue.execute(&mut self.context);
        if stats.pending > 0 {
            log::warn!("{} render commands were still pending at shutdown", stats.pending);
        }
        self.context.release();
        log::info!("Render frame driver shut down after {} frames", self.clock.frame_count());
    }
}
