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

//! Forward+ light clustering.
//!
//! View space is split into a `grid_x * grid_y * grid_z` grid. The XY cells
//! tile the screen uniformly and the depth slices are spaced exponentially
//! between the near and far planes, so that
//! `depth(s) = near * (far / near)^(s / grid_z)`. Cluster volumes only depend
//! on the projection and are cached per camera until its version changes.
//! Every frame each light is tested against the clusters its bounding sphere
//! can touch, and its index is appended to their lists.

use super::LightLibrary;
use crate::camera::CameraState;
use crate::config::ClusterConfig;
use lumen_core::asset::LightType;
use lumen_core::math::{Aabb, Mat4, Vec3, Vec4};
use lumen_core::renderer::gpu_types::{
    bindings, texture_units, CameraUniforms, ClusterUniforms, LightParameters,
};
use lumen_core::renderer::{
    BufferDescriptor, BufferHandle, BufferTarget, BufferUsage, GraphicsDevice, PixelFormat,
    RenderError, TextureHandle,
};
use lumen_core::EntityId;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// The view-space volume of one cluster.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct ClusterBounds {
    /// Bounding box of the eight cluster corners.
    pub aabb: Aabb,
    /// Center of the bounding sphere.
    pub center: Vec3,
    /// Radius of the bounding sphere.
    pub radius: f32,
}

impl ClusterBounds {
    fn from_corners(corners: &[Vec3]) -> Self {
        let aabb = Aabb::from_points(corners).unwrap_or(Aabb::INVALID);
        Self {
            aabb,
            center: aabb.center(),
            radius: aabb.bounding_radius(),
        }
    }
}

/// The point on the segment `near_point..far_point` at view depth `depth`.
///
/// Both endpoints come from unprojecting the same screen position, so they lie
/// on one view ray (perspective) or one view-axis parallel line
/// (orthographic); interpolating on `z` covers both.
fn point_at_depth(near_point: Vec3, far_point: Vec3, depth: f32) -> Vec3 {
    let span = far_point.z - near_point.z;
    if span.abs() <= f32::EPSILON {
        return near_point;
    }
    let t = (-depth - near_point.z) / span;
    near_point + (far_point - near_point) * t
}

fn unproject(proj_inv: &Mat4, x: f32, y: f32, z: f32) -> Vec3 {
    (*proj_inv * Vec4::new(x, y, z, 1.0)).project()
}

/// Depth of the near face of slice `slice`, as a positive view distance.
fn slice_depth(slice: u32, slices: u32, near: f32, far: f32) -> f32 {
    near * (far / near).powf(slice as f32 / slices as f32)
}

/// Computes the view-space volume of every cluster, indexed by
/// [`ClusterConfig::cluster_index`].
///
/// The XY cells are processed in parallel.
pub fn compute_cluster_bounds(
    config: &ClusterConfig,
    proj_inv: &Mat4,
    near: f32,
    far: f32,
) -> Vec<ClusterBounds> {
    let (gx, gy, gz) = (config.grid_x, config.grid_y, config.grid_z);
    let cells_per_slice = config.cells_per_slice();

    let columns: Vec<Vec<ClusterBounds>> = (0..cells_per_slice)
        .into_par_iter()
        .map(|cell| {
            let x = cell as u32 % gx;
            let y = cell as u32 / gx;
            let ndc = |i: u32, n: u32| i as f32 / n as f32 * 2.0 - 1.0;
            let screen = [
                (ndc(x, gx), ndc(y, gy)),
                (ndc(x + 1, gx), ndc(y, gy)),
                (ndc(x + 1, gx), ndc(y + 1, gy)),
                (ndc(x, gx), ndc(y + 1, gy)),
            ];
            let edges = screen.map(|(sx, sy)| {
                (
                    unproject(proj_inv, sx, sy, -1.0),
                    unproject(proj_inv, sx, sy, 1.0),
                )
            });

            (0..gz)
                .map(|slice| {
                    let front = slice_depth(slice, gz, near, far);
                    let back = slice_depth(slice + 1, gz, near, far);
                    let mut corners = [Vec3::ZERO; 8];
                    for (i, (near_point, far_point)) in edges.iter().enumerate() {
                        corners[i] = point_at_depth(*near_point, *far_point, front);
                        corners[i + 4] = point_at_depth(*near_point, *far_point, back);
                    }
                    ClusterBounds::from_corners(&corners)
                })
                .collect()
        })
        .collect();

    let mut bounds = vec![ClusterBounds::from_corners(&[Vec3::ZERO]); config.cluster_count()];
    for (cell, column) in columns.into_iter().enumerate() {
        for (slice, cluster) in column.into_iter().enumerate() {
            bounds[cell + slice * cells_per_slice] = cluster;
        }
    }
    bounds
}

/// Per-cluster light lists filled concurrently by [`cull_lights`].
///
/// Each cluster owns a fixed window of `max_lights_per_cluster` entries in a
/// flat index array. Appends claim a slot with an atomic fetch-add and only
/// write when the claimed slot fits; claims past the end are counted as
/// overflow. Counts read back are clamped to the capacity.
#[derive(Debug)]
pub struct ClusterAssignment {
    capacity: u32,
    counts: Vec<AtomicU32>,
    indices: Vec<AtomicU32>,
    global_count: AtomicU32,
    global: [AtomicU32; ClusterUniforms::MAX_GLOBAL_LIGHTS],
    overflow: AtomicU64,
    global_overflow: AtomicU32,
}

impl ClusterAssignment {
    /// Allocates empty lists for every cluster of `config`.
    pub fn new(config: &ClusterConfig) -> Self {
        let clusters = config.cluster_count();
        let capacity = config.max_lights_per_cluster;
        Self {
            capacity,
            counts: (0..clusters).map(|_| AtomicU32::new(0)).collect(),
            indices: (0..clusters * capacity as usize)
                .map(|_| AtomicU32::new(0))
                .collect(),
            global_count: AtomicU32::new(0),
            global: std::array::from_fn(|_| AtomicU32::new(0)),
            overflow: AtomicU64::new(0),
            global_overflow: AtomicU32::new(0),
        }
    }

    /// Empties every list. Index slots are not cleared; counts bound them.
    pub fn reset(&mut self) {
        for count in &mut self.counts {
            *count.get_mut() = 0;
        }
        *self.global_count.get_mut() = 0;
        *self.overflow.get_mut() = 0;
        *self.global_overflow.get_mut() = 0;
    }

    fn push(&self, cluster: usize, light: u32) -> bool {
        let Some(count) = self.counts.get(cluster) else {
            return false;
        };
        let slot = count.fetch_add(1, Ordering::Relaxed);
        if slot < self.capacity {
            let at = cluster * self.capacity as usize + slot as usize;
            self.indices[at].store(light, Ordering::Relaxed);
            true
        } else {
            self.overflow.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    fn push_global(&self, light: u32) {
        let slot = self.global_count.fetch_add(1, Ordering::Relaxed) as usize;
        match self.global.get(slot) {
            Some(entry) => entry.store(light, Ordering::Relaxed),
            None => {
                self.global_overflow.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Capacity of each cluster list.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of clusters.
    pub fn cluster_count(&self) -> usize {
        self.counts.len()
    }

    /// Number of lights stored for `cluster`.
    pub fn count(&self, cluster: usize) -> u32 {
        self.counts
            .get(cluster)
            .map_or(0, |c| c.load(Ordering::Relaxed).min(self.capacity))
    }

    /// The light indices stored for `cluster`, in claim order.
    pub fn lights_in(&self, cluster: usize) -> Vec<u32> {
        let start = cluster * self.capacity as usize;
        let count = self.count(cluster) as usize;
        self.indices[start..start + count]
            .iter()
            .map(|i| i.load(Ordering::Relaxed))
            .collect()
    }

    /// Stored counts of every cluster.
    pub fn counts(&self) -> Vec<u32> {
        (0..self.counts.len()).map(|c| self.count(c)).collect()
    }

    /// Indices of the lights affecting every cluster.
    pub fn global_lights(&self) -> Vec<u32> {
        let count = (self.global_count.load(Ordering::Relaxed) as usize).min(self.global.len());
        self.global[..count]
            .iter()
            .map(|i| i.load(Ordering::Relaxed))
            .collect()
    }

    /// Appends rejected because a cluster list was full.
    pub fn overflow(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }

    /// Global lights rejected because the global list was full.
    pub fn global_overflow(&self) -> u32 {
        self.global_overflow.load(Ordering::Relaxed)
    }
}

/// Logarithmic depth slicing constants, shared with the shaders.
fn slice_constants(config: &ClusterConfig, near: f32, far: f32) -> (f32, f32) {
    let multiplier = config.grid_z as f32 / (far / near).log2();
    (multiplier, near.log2() * multiplier)
}

/// Cone-versus-sphere rejection for spot lights.
fn cone_misses_sphere(origin: Vec3, direction: Vec3, range: f32, angle: f32, bounds: &ClusterBounds) -> bool {
    let v = bounds.center - origin;
    let along = v.dot(direction);
    let across = (v.length_squared() - along * along).max(0.0).sqrt();
    let closest = angle.cos() * across - along * angle.sin();
    closest > bounds.radius || along > bounds.radius + range || along < -bounds.radius
}

struct CullContext<'a> {
    config: &'a ClusterConfig,
    bounds: &'a [ClusterBounds],
    camera: &'a CameraUniforms,
    multiplier: f32,
    subtractor: f32,
}

impl CullContext<'_> {
    fn slice_of(&self, depth: f32) -> u32 {
        let slice = (depth.log2() * self.multiplier - self.subtractor).floor();
        slice.clamp(0.0, (self.config.grid_z - 1) as f32) as u32
    }

    /// Screen rectangle `[min_u, min_v, max_u, max_v]` in `[0, 1]` covered by
    /// the sphere, or `None` if it lies off screen.
    fn screen_rect(&self, center: Vec3, radius: f32) -> Option<[f32; 4]> {
        let near = self.camera.near;
        if center.z + radius > -near {
            return Some([0.0, 0.0, 1.0, 1.0]);
        }
        let mut rect = [f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY];
        for i in 0..8 {
            let offset = Vec3::new(
                if i & 1 == 0 { -radius } else { radius },
                if i & 2 == 0 { -radius } else { radius },
                if i & 4 == 0 { -radius } else { radius },
            );
            let ndc = (self.camera.proj * (center + offset).extend(1.0)).project();
            let (u, v) = (ndc.x * 0.5 + 0.5, ndc.y * 0.5 + 0.5);
            rect = [rect[0].min(u), rect[1].min(v), rect[2].max(u), rect[3].max(v)];
        }
        if rect[2] < 0.0 || rect[0] > 1.0 || rect[3] < 0.0 || rect[1] > 1.0 {
            return None;
        }
        Some(rect.map(|c| c.clamp(0.0, 1.0)))
    }

    /// Tests one light against the clusters it may touch. Returns `true` if it
    /// landed in at least one cluster list.
    fn assign(&self, assignment: &ClusterAssignment, index: u32, light: &LightParameters) -> bool {
        if light.range == f32::INFINITY {
            assignment.push_global(index);
            return false;
        }
        if light.range.is_nan() || light.range < 0.0 {
            return false;
        }
        let (near, far) = (self.camera.near, self.camera.far);
        let radius = light.range;
        let center = self.camera.view.transform_point3(light.position);
        if center.z - radius > -near || center.z + radius < -far {
            return false;
        }
        let Some([min_u, min_v, max_u, max_v]) = self.screen_rect(center, radius) else {
            return false;
        };

        let (gx, gy) = (self.config.grid_x as i64, self.config.grid_y as i64);
        let min_x = ((min_u * gx as f32).floor() as i64).clamp(0, gx - 1);
        let max_x = ((max_u * gx as f32).ceil() as i64).clamp(min_x + 1, gx);
        let min_y = ((min_v * gy as f32).floor() as i64).clamp(0, gy - 1);
        let max_y = ((max_v * gy as f32).ceil() as i64).clamp(min_y + 1, gy);
        let min_z = self.slice_of((-(center.z + radius)).max(near));
        let max_z = self.slice_of((-(center.z - radius)).min(far));

        let spot = (light.kind == LightType::Spot.gpu_code()).then(|| {
            self.camera
                .view
                .transform_vector3(light.direction)
                .normalize()
        });
        let radius_sq = radius * radius;
        let mut assigned = false;
        for z in min_z..=max_z {
            for y in min_y..max_y {
                for x in min_x..max_x {
                    let cluster = self.config.cluster_index(x as u32, y as u32, z);
                    let Some(bounds) = self.bounds.get(cluster) else {
                        continue;
                    };
                    if bounds.aabb.distance_to_point_squared(center) > radius_sq {
                        continue;
                    }
                    if let Some(direction) = spot {
                        if cone_misses_sphere(center, direction, radius, light.outer_cone_angle, bounds) {
                            continue;
                        }
                    }
                    assigned |= assignment.push(cluster, index);
                }
            }
        }
        assigned
    }
}

/// Assigns `lights` to the clusters of one camera, in parallel over lights.
///
/// Lights with infinite range go to the global list. Returns the number of
/// lights stored in at least one cluster list.
pub fn cull_lights(
    assignment: &mut ClusterAssignment,
    config: &ClusterConfig,
    bounds: &[ClusterBounds],
    lights: &[LightParameters],
    camera: &CameraUniforms,
) -> usize {
    assignment.reset();
    let (multiplier, subtractor) = slice_constants(config, camera.near, camera.far);
    let cull = CullContext {
        config,
        bounds,
        camera,
        multiplier,
        subtractor,
    };
    let assignment = &*assignment;
    lights
        .par_iter()
        .enumerate()
        .filter(|(index, light)| cull.assign(assignment, *index as u32, light))
        .count()
}

/// Counters of one clustering pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClusterStats {
    /// Whether the cluster volumes were recomputed.
    pub rebuilt_bounds: bool,
    /// Lights stored in at least one cluster.
    pub assigned: usize,
    /// Clusters holding at least one light.
    pub touched_clusters: usize,
    /// Cluster appends dropped for lack of capacity.
    pub overflow: u64,
    /// Lights in the global list.
    pub global_lights: usize,
    /// Global lights dropped for lack of capacity.
    pub global_overflow: u32,
}

/// The clusters of one camera and their GPU mirror.
#[derive(Debug)]
pub struct CameraClusters {
    version: u64,
    bounds: Vec<ClusterBounds>,
    assignment: ClusterAssignment,
    uniforms: ClusterUniforms,
    uniform_buffer: BufferHandle,
    counts_buffer: BufferHandle,
    counts_texture: TextureHandle,
    indices_buffer: BufferHandle,
    indices_texture: TextureHandle,
    counts_uploaded: bool,
    stats: ClusterStats,
}

impl CameraClusters {
    fn create(device: &dyn GraphicsDevice, config: &ClusterConfig) -> Result<Self, RenderError> {
        let buffer = |label: &'static str, target: BufferTarget, size: usize| {
            device.create_buffer(&BufferDescriptor {
                label: Some(label.into()),
                target,
                usage: BufferUsage::Stream,
                size: size as u64,
            })
        };
        let clusters = config.cluster_count();
        let word = std::mem::size_of::<u32>();
        let mut created = Self {
            version: 0,
            bounds: Vec::new(),
            assignment: ClusterAssignment::new(config),
            uniforms: ClusterUniforms::default(),
            uniform_buffer: BufferHandle::NONE,
            counts_buffer: BufferHandle::NONE,
            counts_texture: TextureHandle::NONE,
            indices_buffer: BufferHandle::NONE,
            indices_texture: TextureHandle::NONE,
            counts_uploaded: false,
            stats: ClusterStats::default(),
        };
        let result = (|| -> Result<(), RenderError> {
            created.uniform_buffer = buffer(
                "Cluster parameters",
                BufferTarget::Uniform,
                std::mem::size_of::<ClusterUniforms>(),
            )?;
            created.counts_buffer = buffer("Cluster light counts", BufferTarget::Texel, clusters * word)?;
            created.counts_texture =
                device.create_texture_buffer(created.counts_buffer, PixelFormat::R32Uint)?;
            created.indices_buffer = buffer(
                "Cluster light indices",
                BufferTarget::Texel,
                clusters * config.max_lights_per_cluster as usize * word,
            )?;
            created.indices_texture =
                device.create_texture_buffer(created.indices_buffer, PixelFormat::R32Uint)?;
            Ok(())
        })();
        match result {
            Ok(()) => {
                log::debug!("Created cluster buffers for {clusters} clusters");
                Ok(created)
            }
            Err(e) => {
                created.release(device);
                Err(e)
            }
        }
    }

    /// The camera version the cached volumes were computed for.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The cached cluster volumes.
    pub fn bounds(&self) -> &[ClusterBounds] {
        &self.bounds
    }

    /// The light lists of the last pass.
    pub fn assignment(&self) -> &ClusterAssignment {
        &self.assignment
    }

    /// The cluster parameters block of the last pass.
    pub fn uniforms(&self) -> &ClusterUniforms {
        &self.uniforms
    }

    /// Counters of the last pass.
    pub fn stats(&self) -> ClusterStats {
        self.stats
    }

    /// The cluster parameters uniform buffer.
    pub fn uniform_buffer(&self) -> BufferHandle {
        self.uniform_buffer
    }

    /// The per-cluster counts texel buffer view.
    pub fn counts_texture(&self) -> TextureHandle {
        self.counts_texture
    }

    /// The buffer backing [`Self::counts_texture`].
    pub fn counts_buffer(&self) -> BufferHandle {
        self.counts_buffer
    }

    /// The flat index array texel buffer view.
    pub fn indices_texture(&self) -> TextureHandle {
        self.indices_texture
    }

    /// The buffer backing [`Self::indices_texture`].
    pub fn indices_buffer(&self) -> BufferHandle {
        self.indices_buffer
    }

    /// Binds the parameters block and both texel buffers.
    pub fn bind(&self, device: &dyn GraphicsDevice) -> Result<(), RenderError> {
        device.bind_uniform_buffer(bindings::CLUSTERS, self.uniform_buffer)?;
        device.bind_texture(texture_units::CLUSTER_COUNTS, self.counts_texture)?;
        device.bind_texture(texture_units::CLUSTER_INDICES, self.indices_texture)?;
        Ok(())
    }

    fn upload(&mut self, device: &dyn GraphicsDevice) -> Result<usize, RenderError> {
        device.write_buffer(self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms))?;

        let counts = self.assignment.counts();
        let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();
        // A previous non-empty upload must be overwritten even when nothing
        // was assigned this frame.
        if total > 0 || self.counts_uploaded {
            device.write_buffer(self.counts_buffer, 0, bytemuck::cast_slice(&counts))?;
            self.counts_uploaded = total > 0;
        }

        let stride = u64::from(self.assignment.capacity()) * std::mem::size_of::<u32>() as u64;
        let mut touched = 0;
        for (cluster, &count) in counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let lights = self.assignment.lights_in(cluster);
            device.write_buffer(
                self.indices_buffer,
                cluster as u64 * stride,
                bytemuck::cast_slice(&lights),
            )?;
            touched += 1;
        }
        Ok(touched)
    }

    fn release(&mut self, device: &dyn GraphicsDevice) {
        for texture in [&mut self.counts_texture, &mut self.indices_texture] {
            if texture.is_valid() {
                if let Err(e) = device.destroy_texture(*texture) {
                    log::error!("Failed to destroy cluster texture {texture}: {e}");
                }
                *texture = TextureHandle::NONE;
            }
        }
        for buffer in [
            &mut self.uniform_buffer,
            &mut self.counts_buffer,
            &mut self.indices_buffer,
        ] {
            if buffer.is_valid() {
                if let Err(e) = device.destroy_buffer(*buffer) {
                    log::error!("Failed to destroy cluster buffer {buffer}: {e}");
                }
                *buffer = BufferHandle::NONE;
            }
        }
    }
}

/// Runs clustering for every loaded camera.
#[derive(Debug)]
pub struct ClusterEngine {
    config: ClusterConfig,
    cameras: BTreeMap<EntityId, CameraClusters>,
}

impl ClusterEngine {
    /// Creates an engine with no camera.
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            config,
            cameras: BTreeMap::new(),
        }
    }

    /// The grid configuration.
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Runs one clustering pass for `camera` and uploads the result.
    ///
    /// Cluster volumes are recomputed only when the camera version changed
    /// since the previous pass.
    pub fn update(
        &mut self,
        device: &dyn GraphicsDevice,
        camera: EntityId,
        state: &CameraState,
        lights: &LightLibrary,
    ) -> Result<ClusterStats, RenderError> {
        if !self.cameras.contains_key(&camera) {
            let clusters = CameraClusters::create(device, &self.config)?;
            self.cameras.insert(camera, clusters);
        }
        let config = self.config;
        let Some(clusters) = self.cameras.get_mut(&camera) else {
            return Err(RenderError::Internal(format!("clusters of {camera} vanished")));
        };

        let uniforms = state.uniforms();
        let rebuilt_bounds = clusters.version != state.version() || clusters.bounds.is_empty();
        if rebuilt_bounds {
            clusters.bounds =
                compute_cluster_bounds(&config, &uniforms.proj_inv, uniforms.near, uniforms.far);
            clusters.version = state.version();
            log::trace!("Rebuilt cluster volumes of {camera} (version {})", clusters.version);
        }

        let assigned = cull_lights(
            &mut clusters.assignment,
            &config,
            &clusters.bounds,
            lights.parameters(),
            uniforms,
        );

        let (multiplier, subtractor) = slice_constants(&config, uniforms.near, uniforms.far);
        let global = clusters.assignment.global_lights();
        let mut block = ClusterUniforms {
            depth_slice_multiplier: multiplier,
            depth_slice_subtractor: subtractor,
            global_light_count: global.len() as u32,
            ..Default::default()
        };
        for (slot, index) in block.global_light_indices.iter_mut().zip(&global) {
            slot[0] = *index;
        }
        clusters.uniforms = block;
        let touched_clusters = clusters.upload(device)?;

        let stats = ClusterStats {
            rebuilt_bounds,
            assigned,
            touched_clusters,
            overflow: clusters.assignment.overflow(),
            global_lights: global.len(),
            global_overflow: clusters.assignment.global_overflow(),
        };
        if stats.overflow > 0 || stats.global_overflow > 0 {
            log::warn!(
                "Cluster capacity exceeded for {camera}: {} cluster appends and {} global lights dropped",
                stats.overflow,
                stats.global_overflow
            );
        }
        clusters.stats = stats;
        Ok(stats)
    }

    /// The clusters of `camera`.
    pub fn get(&self, camera: EntityId) -> Option<&CameraClusters> {
        self.cameras.get(&camera)
    }

    /// Destroys the clusters of `camera`.
    pub fn remove_camera(&mut self, device: &dyn GraphicsDevice, camera: EntityId) -> bool {
        match self.cameras.remove(&camera) {
            Some(mut clusters) => {
                clusters.release(device);
                true
            }
            None => false,
        }
    }

    /// Destroys the clusters of every camera.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        for (_, mut clusters) in std::mem::take(&mut self.cameras) {
            clusters.release(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use lumen_core::asset::{Camera3D, Light3D};
    use lumen_core::math::LinearRgba;

    fn small_config() -> ClusterConfig {
        ClusterConfig {
            grid_x: 4,
            grid_y: 3,
            grid_z: 6,
            max_lights_per_cluster: 4,
        }
    }

    fn camera() -> CameraUniforms {
        Camera3D::perspective(60.0, 0.5, 50.0)
            .uniforms(&Mat4::IDENTITY, 4.0 / 3.0)
            .unwrap()
    }

    #[test]
    fn slices_span_near_to_far() {
        let config = small_config();
        let cam = camera();
        let bounds = compute_cluster_bounds(&config, &cam.proj_inv, cam.near, cam.far);
        assert_eq!(bounds.len(), config.cluster_count());

        let first = bounds[config.cluster_index(0, 0, 0)];
        let last = bounds[config.cluster_index(3, 2, 5)];
        assert_abs_diff_eq!(first.aabb.max.z, -0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(last.aabb.min.z, -50.0, epsilon = 1e-2);
        assert!(first.aabb.max.x <= 1e-4);
        assert!(last.aabb.min.x >= -1e-4);
    }

    #[test]
    fn orthographic_clusters_are_boxes() {
        let config = small_config();
        let cam = Camera3D::orthographic(8.0, 1.0, 10.0)
            .uniforms(&Mat4::IDENTITY, 2.0)
            .unwrap();
        let bounds = compute_cluster_bounds(&config, &cam.proj_inv, cam.near, cam.far);
        let cluster = bounds[config.cluster_index(0, 0, 0)];
        assert_abs_diff_eq!(cluster.aabb.min.x, -4.0, epsilon = 1e-4);
        assert_abs_diff_eq!(cluster.aabb.max.x, -2.0, epsilon = 1e-4);
        assert_abs_diff_eq!(cluster.aabb.min.y, -2.0, epsilon = 1e-4);
    }

    #[test]
    fn assignment_saturates_and_counts_overflow() {
        let config = small_config();
        let mut assignment = ClusterAssignment::new(&config);
        for light in 0..6 {
            assignment.push(0, light);
        }
        assert_eq!(assignment.count(0), 4);
        assert_eq!(assignment.lights_in(0), vec![0, 1, 2, 3]);
        assert_eq!(assignment.overflow(), 2);

        for light in 0..10 {
            assignment.push_global(light);
        }
        assert_eq!(assignment.global_lights().len(), ClusterUniforms::MAX_GLOBAL_LIGHTS);
        assert_eq!(assignment.global_overflow(), 2);

        assignment.reset();
        assert_eq!(assignment.count(0), 0);
        assert_eq!(assignment.overflow(), 0);
        assert!(assignment.global_lights().is_empty());
    }

    #[test]
    fn lights_behind_or_beyond_are_rejected() {
        let config = small_config();
        let cam = camera();
        let bounds = compute_cluster_bounds(&config, &cam.proj_inv, cam.near, cam.far);
        let at = |z: f32| {
            Light3D::point(LinearRgba::WHITE, 1.0, 1.0)
                .parameters(&Mat4::from_translation(Vec3::new(0.0, 0.0, z)))
        };
        let lights = [at(5.0), at(-80.0), at(-10.0)];
        let mut assignment = ClusterAssignment::new(&config);
        let assigned = cull_lights(&mut assignment, &config, &bounds, &lights, &cam);
        assert_eq!(assigned, 1);
        let holders: Vec<_> = (0..config.cluster_count())
            .filter(|&c| assignment.count(c) > 0)
            .collect();
        assert!(!holders.is_empty());
        for cluster in holders {
            assert_eq!(assignment.lights_in(cluster), vec![2]);
        }
    }

    #[test]
    fn malformed_ranges_are_skipped() {
        let config = small_config();
        let cam = camera();
        let bounds = compute_cluster_bounds(&config, &cam.proj_inv, cam.near, cam.far);
        let place = Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0));
        let sun = Light3D::directional(LinearRgba::WHITE, 1.0).parameters(&place);
        let mut nan = Light3D::point(LinearRgba::WHITE, 1.0, 1.0).parameters(&place);
        nan.range = f32::NAN;
        let mut negative = nan;
        negative.range = -2.0;

        let mut assignment = ClusterAssignment::new(&config);
        let assigned = cull_lights(&mut assignment, &config, &bounds, &[sun, nan, negative], &cam);
        assert_eq!(assigned, 0);
        assert_eq!(assignment.global_lights(), vec![0]);
        assert!(assignment.counts().iter().all(|&c| c == 0));
    }

    #[test]
    fn spot_cone_rejects_clusters_behind_it() {
        let config = small_config();
        let cam = camera();
        let bounds = compute_cluster_bounds(&config, &cam.proj_inv, cam.near, cam.far);
        let place = Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0));
        let point = Light3D::point(LinearRgba::WHITE, 1.0, 6.0).parameters(&place);
        let spot = Light3D::spot(LinearRgba::WHITE, 1.0, 6.0, 0.1, 0.2).parameters(&place);

        let mut assignment = ClusterAssignment::new(&config);
        cull_lights(&mut assignment, &config, &bounds, &[point], &cam);
        let point_clusters = assignment.counts().iter().filter(|&&c| c > 0).count();
        cull_lights(&mut assignment, &config, &bounds, &[spot], &cam);
        let spot_clusters = assignment.counts().iter().filter(|&&c| c > 0).count();
        assert!(spot_clusters > 0);
        assert!(spot_clusters < point_clusters);
    }
}
