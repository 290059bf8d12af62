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

use super::{MaterialGpuState, ResourceManager};
use crate::context::{AssetContext, RenderContext};
use crate::mesh::InstanceGroupKey;
use crate::queue::{CommandKind, CommandStatus, RenderCommand};
use lumen_core::asset::{AssetError, AssetId, Mesh3D};
use lumen_core::math::Mat4;
use lumen_core::renderer::RenderError;
use lumen_core::EntityId;
use std::sync::Arc;

/// Where a mesh entity is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshInstanceState {
    /// The instance group.
    pub group: InstanceGroupKey,
    /// Slot of the mesh in the group.
    pub index: usize,
}

/// Removes `entity` from its group and drops its hold on the geometry.
fn leave_group(ctx: &mut RenderContext, entity: EntityId, state: MeshInstanceState) {
    let device = ctx.device.clone();
    if let Some(removal) = ctx.instances.remove(&*device, &state.group, state.index) {
        if removal.owner != entity {
            log::error!(
                "Instance slot {} held {} instead of {entity}",
                state.index,
                removal.owner
            );
        }
        if let Some(moved) = removal.moved {
            if let Some(other) = ctx.states.get_mut::<MeshInstanceState>(moved.owner) {
                other.index = moved.index;
            }
        }
    }
    ctx.mesh_data.release(&*device, state.group.mesh_data);
}

fn teardown(entity: EntityId) -> RenderCommand {
    RenderCommand::new(
        entity,
        CommandKind::Uninitialize,
        "remove mesh instance",
        move |ctx: &mut RenderContext| {
            if let Some(state) = ctx.states.remove::<MeshInstanceState>(entity) {
                leave_group(ctx, entity, state);
            }
            Ok(CommandStatus::Done)
        },
    )
}

/// Places [`Mesh3D`] entities into instance groups.
///
/// Meshes sharing a material and structurally equal geometry are drawn with
/// one instanced call; a transform change only rewrites the instance matrix.
#[derive(Debug)]
pub struct MeshManager;

impl MeshManager {
    /// Sends the new world matrix of a mesh entity to its instance slot.
    pub fn update_transform(ctx: &mut AssetContext, entity: EntityId, world: Mat4) {
        ctx.submit(RenderCommand::new(
            entity,
            CommandKind::Update,
            "update instance transform",
            move |ctx: &mut RenderContext| {
                if let Some(state) = ctx.states.get::<MeshInstanceState>(entity) {
                    ctx.instances.set_transform(&state.group, state.index, world);
                }
                Ok(CommandStatus::Done)
            },
        ));
    }
}

impl ResourceManager for MeshManager {
    type Asset = Mesh3D;
    const NAME: &'static str = "Mesh3D";

    fn initialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        mesh: &Arc<Mesh3D>,
        previous: Option<&Arc<Mesh3D>>,
    ) -> Result<(), RenderError> {
        ctx.graph.register(entity);
        if mesh.data.vertices.is_empty() {
            if previous.is_some() {
                ctx.release_all(entity);
                ctx.submit(teardown(entity));
            }
            return Err(AssetError::InvalidData(format!("mesh {entity} has no vertices")).into());
        }

        let material = ctx.acquire(entity, mesh.material.clone())?;
        ctx.release_except(entity, &[material]);

        let group = InstanceGroupKey {
            material,
            mesh_data: AssetId::of(mesh.data.as_ref())?,
        };
        let transform = ctx.world_matrix(entity);
        let data = mesh.data.clone();
        let kind = if previous.is_some() {
            CommandKind::Update
        } else {
            CommandKind::Initialize
        };

        ctx.submit(RenderCommand::new(entity, kind, "place mesh instance", move |ctx: &mut RenderContext| {
            let material_ready = ctx
                .states
                .get::<MaterialGpuState>(group.material)
                .is_some_and(|m| m.is_loaded());
            if !material_ready {
                return Ok(CommandStatus::Deferred);
            }

            let current = ctx.states.get::<MeshInstanceState>(entity).copied();
            match current {
                Some(state) if state.group == group => {
                    ctx.instances.set_transform(&group, state.index, transform);
                }
                current => {
                    let device = ctx.device.clone();
                    ctx.mesh_data.acquire(&*device, group.mesh_data, &data)?;
                    if let Some(state) = current {
                        leave_group(ctx, entity, state);
                    }
                    let index = ctx.instances.insert(group, entity, transform);
                    ctx.states.insert(entity, MeshInstanceState { group, index });
                }
            }
            Ok(CommandStatus::Done)
        })
        .superseding());
        Ok(())
    }

    fn uninitialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        _mesh: &Arc<Mesh3D>,
    ) -> Result<(), RenderError> {
        ctx.forget(entity);
        ctx.submit(teardown(entity));
        Ok(())
    }
}

pub(super) fn release_all(ctx: &mut RenderContext) {
    let device = ctx.device.clone();
    for entity in ctx.states.entities::<MeshInstanceState>() {
        if let Some(state) = ctx.states.remove::<MeshInstanceState>(entity) {
            ctx.mesh_data.release(&*device, state.group.mesh_data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::queue::{command_channel, RenderCommandQueue};
    use lumen_core::asset::{Material, MeshData};
    use lumen_core::math::{Vec3, Vec4};
    use lumen_core::renderer::PrimitiveTopology;
    use lumen_core::Transform;
    use lumen_infra::HeadlessDevice;

    struct Harness {
        assets: AssetContext,
        render: RenderContext,
        queue: RenderCommandQueue,
    }

    impl Harness {
        fn new() -> Self {
            let config = RenderConfig::default();
            let (sender, queue) = command_channel(config.deferral);
            Self {
                assets: AssetContext::new(sender, &config),
                render: RenderContext::new(Arc::new(HeadlessDevice::new()), &config),
                queue,
            }
        }

        fn settle(&mut self) {
            self.assets.sync();
            for _ in 0..8 {
                self.queue.execute(&mut self.render);
                if self.queue.pending_count() == 0 {
                    break;
                }
            }
        }

        fn spawn_mesh(&mut self, mesh: &Arc<Mesh3D>, at: Vec3) -> EntityId {
            let entity = self.assets.world.spawn();
            self.assets.world.insert(entity, Transform::from_translation(at));
            self.assets.world.insert(entity, mesh.clone());
            entity
        }

        fn instance(&self, entity: EntityId) -> MeshInstanceState {
            *self.render.states.get::<MeshInstanceState>(entity).unwrap()
        }
    }

    fn triangle() -> Arc<MeshData> {
        Arc::new(MeshData::new(
            PrimitiveTopology::Triangles,
            vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
        ))
    }

    fn tinted(r: f32) -> Arc<Material> {
        Arc::new(Material::default().with_property("Color", Vec4::new(r, 0.0, 0.0, 1.0)))
    }

    #[test]
    fn equal_meshes_share_one_group_and_geometry() {
        let mut h = Harness::new();
        let mesh = Arc::new(Mesh3D::new(triangle(), tinted(1.0)));
        let a = h.spawn_mesh(&mesh, Vec3::ZERO);
        let b = h.spawn_mesh(&mesh, Vec3::new(2.0, 0.0, 0.0));
        h.settle();

        let (sa, sb) = (h.instance(a), h.instance(b));
        assert_eq!(sa.group, sb.group);
        assert_eq!((sa.index, sb.index), (0, 1));
        assert_eq!(h.render.mesh_data.refcount(&sa.group.mesh_data), 2);
        let group = h.render.instances.get(&sa.group).unwrap();
        assert_eq!(group.transforms()[1].translation().x, 2.0);
    }

    #[test]
    fn changing_material_moves_the_instance_and_reindexes_the_rest() {
        let mut h = Harness::new();
        let red = Arc::new(Mesh3D::new(triangle(), tinted(1.0)));
        let a = h.spawn_mesh(&red, Vec3::ZERO);
        let b = h.spawn_mesh(&red, Vec3::ONE);
        h.settle();
        let old_group = h.instance(a).group;

        let green = Arc::new(Mesh3D::new(triangle(), tinted(0.5)));
        h.assets.world.insert(a, green);
        h.settle();

        let (sa, sb) = (h.instance(a), h.instance(b));
        assert_ne!(sa.group, old_group);
        assert_eq!(sa.group.mesh_data, old_group.mesh_data);
        assert_eq!(sb.group, old_group);
        assert_eq!(sb.index, 0);
        assert_eq!(h.render.instances.get(&old_group).unwrap().owners(), &[b]);
        assert_eq!(h.render.mesh_data.refcount(&old_group.mesh_data), 2);
    }

    #[test]
    fn transform_changes_only_touch_the_instance_slot() {
        let mut h = Harness::new();
        let mesh = Arc::new(Mesh3D::new(triangle(), tinted(1.0)));
        let a = h.spawn_mesh(&mesh, Vec3::ZERO);
        h.settle();
        let before = h.instance(a);

        h.assets
            .world
            .insert(a, Transform::from_translation(Vec3::new(0.0, 5.0, 0.0)));
        h.settle();
        assert_eq!(h.instance(a), before);
        let group = h.render.instances.get(&before.group).unwrap();
        assert_eq!(group.transforms()[0].translation().y, 5.0);
    }

    #[test]
    fn empty_geometry_is_rejected_without_gpu_state() {
        let mut h = Harness::new();
        let empty = Arc::new(MeshData::new(PrimitiveTopology::Triangles, Vec::<Vec3>::new()));
        let mesh = Arc::new(Mesh3D::new(empty, tinted(1.0)));
        let a = h.spawn_mesh(&mesh, Vec3::ZERO);
        h.settle();
        assert!(!h.render.states.contains::<MeshInstanceState>(a));
        assert_eq!(h.render.mesh_data.len(), 0);
    }

    fn material_of(h: &Harness, entity: EntityId) -> EntityId {
        let referred: Vec<_> = h.assets.graph.referred(entity).collect();
        assert_eq!(referred.len(), 1);
        referred[0]
    }

    #[test]
    fn switching_material_before_the_first_frame_still_places_the_mesh() {
        let mut h = Harness::new();
        let a = h.spawn_mesh(&Arc::new(Mesh3D::new(triangle(), tinted(1.0))), Vec3::ZERO);
        h.assets.sync();
        h.assets
            .world
            .insert(a, Arc::new(Mesh3D::new(triangle(), tinted(0.5))));
        h.settle();

        assert_eq!(h.queue.pending_count(), 0);
        let state = h.instance(a);
        assert_eq!(state.group.material, material_of(&h, a));
        let material = h.render.states.get::<MaterialGpuState>(state.group.material);
        assert!(material.is_some_and(|m| m.is_loaded()));
        assert_eq!(h.render.instances.len(), 1);
        assert_eq!(h.render.mesh_data.refcount(&state.group.mesh_data), 1);
        assert_eq!(h.render.states.entities::<MaterialGpuState>().len(), 1);
    }

    #[test]
    fn switching_material_twice_lands_on_the_last_one() {
        let mut h = Harness::new();
        let a = h.spawn_mesh(&Arc::new(Mesh3D::new(triangle(), tinted(1.0))), Vec3::ZERO);
        h.settle();

        h.assets
            .world
            .insert(a, Arc::new(Mesh3D::new(triangle(), tinted(0.5))));
        h.assets.sync();
        h.assets
            .world
            .insert(a, Arc::new(Mesh3D::new(triangle(), tinted(0.2))));
        h.settle();

        assert_eq!(h.queue.pending_count(), 0);
        let state = h.instance(a);
        assert_eq!(state.group.material, material_of(&h, a));
        assert_eq!(h.render.instances.len(), 1);
        assert_eq!(h.render.instances.get(&state.group).unwrap().owners(), &[a]);
        assert_eq!(h.render.mesh_data.refcount(&state.group.mesh_data), 1);
    }
}
