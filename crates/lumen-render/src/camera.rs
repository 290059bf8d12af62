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

//! Render-side camera state.

use lumen_core::asset::Camera3D;
use lumen_core::math::{Aabb, Mat4, Vec3};
use lumen_core::renderer::gpu_types::{bindings, CameraUniforms};
use lumen_core::renderer::{
    BufferDescriptor, BufferHandle, BufferTarget, BufferUsage, GraphicsDevice, RenderError,
};

/// The GPU counterpart of a camera.
///
/// Holds the derived parameters block, mirrors it into a uniform buffer and
/// counts every change of projection or placement in a version that cluster
/// caches compare against.
#[derive(Debug, Clone)]
pub struct CameraState {
    buffer: BufferHandle,
    camera: Camera3D,
    world: Mat4,
    aspect: f32,
    uniforms: CameraUniforms,
    version: u64,
    dirty: bool,
}

impl CameraState {
    /// Creates a state for `camera` placed by `world`. The uniform buffer is
    /// created by the first [`Self::upload`].
    pub fn new(camera: Camera3D, world: Mat4, viewport_aspect: f32) -> Self {
        let aspect = camera.resolve_aspect(viewport_aspect);
        let mut state = Self {
            buffer: BufferHandle::NONE,
            camera,
            world,
            aspect,
            uniforms: CameraUniforms::default(),
            version: 0,
            dirty: true,
        };
        state.refresh();
        state
    }

    /// Returns `true` once the uniform buffer exists.
    pub fn is_loaded(&self) -> bool {
        self.buffer.is_valid()
    }

    /// The uniform buffer.
    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    /// The camera record.
    pub fn camera(&self) -> &Camera3D {
        &self.camera
    }

    /// The world matrix placing the camera.
    pub fn world(&self) -> &Mat4 {
        &self.world
    }

    /// The aspect ratio in use.
    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// The parameters block as last derived.
    pub fn uniforms(&self) -> &CameraUniforms {
        &self.uniforms
    }

    /// Incremented on every projection or placement change.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns `true` if the parameters changed since the last upload.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replaces the camera record.
    pub fn set_camera(&mut self, camera: Camera3D, viewport_aspect: f32) {
        self.aspect = camera.resolve_aspect(viewport_aspect);
        self.camera = camera;
        self.refresh();
    }

    /// Moves the camera.
    pub fn set_world(&mut self, world: Mat4) {
        self.world = world;
        self.refresh();
    }

    /// Follows a viewport resize. Returns `true` if the projection changed,
    /// which only happens for cameras without a fixed aspect ratio.
    pub fn resize(&mut self, viewport_aspect: f32) -> bool {
        let aspect = self.camera.resolve_aspect(viewport_aspect);
        if aspect == self.aspect {
            return false;
        }
        self.aspect = aspect;
        self.refresh();
        true
    }

    /// World-space frustum corners, near plane first.
    pub fn frustum_corners(&self) -> [Vec3; 8] {
        self.camera.frustum_corners(&self.world, self.aspect)
    }

    /// World-space bounding box of the frustum.
    pub fn bounding_box(&self) -> Aabb {
        self.camera.bounding_box(&self.world, self.aspect)
    }

    fn refresh(&mut self) {
        match self.camera.uniforms(&self.world, self.aspect) {
            Some(uniforms) => self.uniforms = uniforms,
            None => log::warn!(
                "Camera placement or projection is singular; keeping previous parameters"
            ),
        }
        self.version += 1;
        self.dirty = true;
    }

    /// Writes the parameters block if it changed, creating the buffer on
    /// first use. Returns `true` if anything was written.
    pub fn upload(&mut self, device: &dyn GraphicsDevice) -> Result<bool, RenderError> {
        if !self.dirty && self.is_loaded() {
            return Ok(false);
        }
        let bytes = bytemuck::bytes_of(&self.uniforms);
        if self.is_loaded() {
            device.write_buffer(self.buffer, 0, bytes)?;
        } else {
            self.buffer = device.create_buffer_with_data(
                &BufferDescriptor {
                    label: Some("Camera parameters".into()),
                    target: BufferTarget::Uniform,
                    usage: BufferUsage::Dynamic,
                    size: bytes.len() as u64,
                },
                bytes,
            )?;
            log::debug!("Created camera uniform buffer {}", self.buffer);
        }
        self.dirty = false;
        Ok(true)
    }

    /// Binds the uniform buffer to the camera block binding point.
    pub fn bind(&self, device: &dyn GraphicsDevice) -> Result<(), RenderError> {
        if !self.is_loaded() {
            return Err(RenderError::Internal("camera buffer bound before upload".to_owned()));
        }
        device.bind_uniform_buffer(bindings::CAMERA, self.buffer)?;
        Ok(())
    }

    /// Destroys the uniform buffer.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        if self.buffer.is_valid() {
            if let Err(e) = device.destroy_buffer(self.buffer) {
                log::error!("Failed to destroy camera buffer {}: {e}", self.buffer);
            }
            self.buffer = BufferHandle::NONE;
            self.dirty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use lumen_infra::HeadlessDevice;

    fn state() -> CameraState {
        CameraState::new(
            Camera3D::perspective(60.0, 0.1, 100.0),
            Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0)),
            16.0 / 9.0,
        )
    }

    #[test]
    fn every_change_bumps_the_version() {
        let mut camera = state();
        let v0 = camera.version();
        camera.set_world(Mat4::IDENTITY);
        assert_eq!(camera.version(), v0 + 1);
        camera.set_camera(Camera3D::perspective(45.0, 0.1, 50.0), 16.0 / 9.0);
        assert_eq!(camera.version(), v0 + 2);
        assert!(camera.resize(1.0));
        assert_eq!(camera.version(), v0 + 3);
        assert!(!camera.resize(1.0));
        assert_eq!(camera.version(), v0 + 3);
    }

    #[test]
    fn fixed_aspect_ignores_resize() {
        let mut camera = CameraState::new(
            Camera3D::perspective(60.0, 0.1, 100.0).with_aspect_ratio(2.0),
            Mat4::IDENTITY,
            1.0,
        );
        assert_eq!(camera.aspect(), 2.0);
        let version = camera.version();
        assert!(!camera.resize(4.0 / 3.0));
        assert_eq!(camera.version(), version);
    }

    #[test]
    fn upload_creates_then_writes_only_when_dirty() {
        let device = HeadlessDevice::new();
        let mut camera = state();
        assert!(!camera.is_loaded());
        assert!(camera.upload(&device).unwrap());
        assert!(camera.is_loaded());
        assert!(!camera.upload(&device).unwrap());

        camera.set_world(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        assert!(camera.upload(&device).unwrap());
        let data = device.buffer_data(camera.buffer()).unwrap();
        let uploaded: CameraUniforms = bytemuck::pod_read_unaligned(&data);
        assert_eq!(uploaded.position, Vec3::new(1.0, 2.0, 3.0));

        camera.release(&device);
        assert!(!camera.is_loaded());
    }

    #[test]
    fn frustum_queries_follow_placement() {
        let camera = state();
        let corners = camera.frustum_corners();
        assert_abs_diff_eq!(corners[0].z, 4.9, epsilon = 1e-4);
        assert_abs_diff_eq!(corners[4].z, -95.0, epsilon = 1e-3);
        assert!(camera.bounding_box().contains_point(Vec3::new(0.0, 0.0, 0.0)));
    }
}
