mod common;

use common::Engine;
use lumen_core::asset::{Camera3D, Light3D};
use lumen_core::math::{LinearRgba, Vec3};
use lumen_core::{EntityId, Transform};
use lumen_render::managers::LightState;
use std::sync::Arc;

fn spawn_light(engine: &mut Engine, light: Light3D, at: Vec3) -> EntityId {
    let entity = engine.assets.world.spawn();
    engine.assets.world.insert(entity, Transform::from_translation(at));
    engine.assets.world.insert(entity, Arc::new(light));
    entity
}

fn point(range: f32) -> Light3D {
    Light3D::point(LinearRgba::WHITE, 1.0, range)
}

#[test]
fn unchanged_camera_reuses_byte_identical_volumes() {
    let mut engine = Engine::new();
    let camera = engine.spawn_camera(Camera3D::perspective(60.0, 0.1, 100.0));
    let light = spawn_light(&mut engine, point(2.0), Vec3::new(0.0, 0.0, -8.0));
    let first = engine.settle();
    assert!(first.clusters[0].rebuilt_bounds);
    let cached: Vec<u8> =
        bytemuck::cast_slice(engine.render().clusters.get(camera).unwrap().bounds()).to_vec();

    engine
        .assets
        .world
        .insert(light, Transform::from_translation(Vec3::new(3.0, 1.0, -20.0)));
    let second = engine.settle();
    assert!(!second.clusters[0].rebuilt_bounds);
    let clusters = engine.render().clusters.get(camera).unwrap();
    assert_eq!(bytemuck::cast_slice::<_, u8>(clusters.bounds()), &cached[..]);

    engine
        .assets
        .world
        .insert(camera, Arc::new(Camera3D::perspective(45.0, 0.1, 100.0)));
    let third = engine.settle();
    assert!(third.clusters[0].rebuilt_bounds);
    let clusters = engine.render().clusters.get(camera).unwrap();
    assert_ne!(bytemuck::cast_slice::<_, u8>(clusters.bounds()), &cached[..]);
}

#[test]
fn directional_light_is_global_and_points_land_where_they_reach() {
    let mut engine = Engine::new();
    let camera = engine.spawn_camera(Camera3D::perspective(60.0, 0.1, 100.0));
    let sun = spawn_light(
        &mut engine,
        Light3D::directional(LinearRgba::WHITE, 3.0),
        Vec3::new(0.0, 50.0, 0.0),
    );
    let range = 1.5;
    let mut points = Vec::new();
    for x in [-4.0, 0.0, 4.0] {
        for y in [-2.0, 0.0, 2.0] {
            let at = Vec3::new(x, y, -10.0);
            points.push((spawn_light(&mut engine, point(range), at), at));
        }
    }
    let stats = engine.settle();

    let cluster_stats = stats.clusters[0];
    assert_eq!(cluster_stats.global_lights, 1);
    assert_eq!(cluster_stats.assigned, 9);
    assert_eq!(cluster_stats.overflow, 0);

    let render = engine.render();
    let sun_index = render.states.get::<LightState>(sun).unwrap().index as u32;
    let clusters = render.clusters.get(camera).unwrap();
    let assignment = clusters.assignment();
    assert_eq!(assignment.global_lights(), vec![sun_index]);

    // The camera sits at the origin looking down -Z, so view space is world
    // space.
    let spheres: Vec<(u32, Vec3)> = points
        .iter()
        .map(|(entity, at)| (render.states.get::<LightState>(*entity).unwrap().index as u32, *at))
        .collect();
    let mut touched = 0;
    for (cluster, bounds) in clusters.bounds().iter().enumerate() {
        let stored = assignment.lights_in(cluster);
        assert!(!stored.contains(&sun_index));
        for index in &stored {
            let (_, center) = spheres.iter().find(|(i, _)| i == index).unwrap();
            assert!(bounds.aabb.distance_to_point_squared(*center) <= range * range);
        }
        let reachable = spheres
            .iter()
            .any(|(_, center)| bounds.aabb.distance_to_point_squared(*center) <= range * range);
        if !reachable {
            assert_eq!(assignment.count(cluster), 0);
        }
        if !stored.is_empty() {
            touched += 1;
        }
    }
    assert_eq!(touched, cluster_stats.touched_clusters);
}

#[test]
fn crowded_cluster_saturates_at_capacity() {
    let mut engine = Engine::new();
    let camera = engine.spawn_camera(Camera3D::perspective(60.0, 0.1, 100.0));
    for _ in 0..1025 {
        spawn_light(&mut engine, point(0.25), Vec3::new(0.0, 0.0, -10.0));
    }
    let stats = engine.settle();
    assert_eq!(stats.lights, 1025);

    let clusters = engine.render().clusters.get(camera).unwrap();
    let assignment = clusters.assignment();
    let capacity = assignment.capacity();
    assert_eq!(capacity, 1024);

    let counts = assignment.counts();
    let full = counts.iter().filter(|&&c| c > 0).count();
    assert!(full > 0);
    assert!(counts.iter().all(|&c| c == 0 || c == capacity));
    assert_eq!(stats.clusters[0].overflow, full as u64);

    let mirrored = engine.device.buffer_data(clusters.counts_buffer()).unwrap();
    assert_eq!(mirrored, bytemuck::cast_slice::<u32, u8>(&counts));
}

#[test]
fn emptied_clusters_are_cleared_on_the_gpu() {
    let mut engine = Engine::new();
    let camera = engine.spawn_camera(Camera3D::perspective(60.0, 0.1, 100.0));
    let light = spawn_light(&mut engine, point(1.0), Vec3::new(0.0, 0.0, -5.0));
    engine.settle();
    let counts_buffer = engine.render().clusters.get(camera).unwrap().counts_buffer();
    let before = engine.device.buffer_data(counts_buffer).unwrap();
    assert!(before.iter().any(|&b| b != 0));

    engine.assets.world.despawn(light);
    engine.settle();
    let after = engine.device.buffer_data(counts_buffer).unwrap();
    assert!(after.iter().all(|&b| b == 0));
}
