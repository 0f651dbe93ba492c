//! Render-list construction: visibility, culling, bucketing and sort order.

mod common;

use common::{DrawOrder, add_mesh_at, basic_program, test_renderer, triangle};
use glint::{Camera, Deg, Node, ProgramDesc, RenderOptions, Scene};

fn camera_90() -> Camera {
    Camera::perspective(Deg(90.0), 1.0, 0.1, 100.0)
}

#[test]
fn one_opaque_and_one_transparent_node_draw_opaque_first() {
    let mut renderer = test_renderer();
    let geometry = triangle(&mut renderer);
    let opaque = basic_program(&mut renderer, false);
    let transparent = basic_program(&mut renderer, true);

    let mut scene = Scene::new();
    // Added transparent first to prove ordering comes from the buckets.
    let t = add_mesh_at(&mut scene, geometry, transparent, [0.0, 0.0, -5.0]);
    let o = add_mesh_at(&mut scene, geometry, opaque, [0.0, 0.0, -5.0]);

    let order = DrawOrder::new();
    order.track(&mut scene, t);
    order.track(&mut scene, o);

    let mut camera = camera_90();
    renderer.render(&mut scene, Some(&mut camera), RenderOptions::default());

    assert_eq!(order.take(), vec![o, t]);
    assert_eq!(
        renderer.device().count(|c| c.is_draw()),
        2,
        "both nodes survive culling and draw exactly once"
    );
}

#[test]
fn render_order_beats_depth_in_the_opaque_bucket() {
    let mut renderer = test_renderer();
    let geometry = triangle(&mut renderer);
    let program = basic_program(&mut renderer, false);

    let mut scene = Scene::new();
    let far = add_mesh_at(&mut scene, geometry, program, [0.0, 0.0, -5.0]);
    let near = add_mesh_at(&mut scene, geometry, program, [0.0, 0.0, -2.0]);
    let forced_last = add_mesh_at(&mut scene, geometry, program, [0.0, 0.0, -0.5]);
    if let Some(drawable) = scene[forced_last].drawable.as_mut() {
        drawable.render_order = 1;
    }

    let order = DrawOrder::new();
    for &key in &[far, near, forced_last] {
        order.track(&mut scene, key);
    }

    let mut camera = camera_90();
    renderer.render(&mut scene, Some(&mut camera), RenderOptions::default());

    // Front to back within render order 0; the explicit order wins overall.
    assert_eq!(order.take(), vec![near, far, forced_last]);
}

#[test]
fn transparent_bucket_draws_back_to_front() {
    let mut renderer = test_renderer();
    let geometry = triangle(&mut renderer);
    let program = basic_program(&mut renderer, true);

    let mut scene = Scene::new();
    let depth_1 = add_mesh_at(&mut scene, geometry, program, [0.0, 0.0, -1.0]);
    let depth_5 = add_mesh_at(&mut scene, geometry, program, [0.0, 0.0, -5.0]);
    let depth_3 = add_mesh_at(&mut scene, geometry, program, [0.0, 0.0, -3.0]);

    let order = DrawOrder::new();
    for &key in &[depth_1, depth_5, depth_3] {
        order.track(&mut scene, key);
    }

    let mut camera = camera_90();
    renderer.render(&mut scene, Some(&mut camera), RenderOptions::default());

    assert_eq!(order.take(), vec![depth_5, depth_3, depth_1]);
}

#[test]
fn opaque_bucket_groups_by_program() {
    let mut renderer = test_renderer();
    let geometry = triangle(&mut renderer);
    let program_a = basic_program(&mut renderer, false);
    let program_b = basic_program(&mut renderer, false);

    let mut scene = Scene::new();
    let b1 = add_mesh_at(&mut scene, geometry, program_b, [0.0, 0.0, -2.0]);
    let a1 = add_mesh_at(&mut scene, geometry, program_a, [0.0, 0.0, -3.0]);
    let b2 = add_mesh_at(&mut scene, geometry, program_b, [0.0, 0.0, -4.0]);
    let a2 = add_mesh_at(&mut scene, geometry, program_a, [0.0, 0.0, -5.0]);

    let order = DrawOrder::new();
    for &key in &[b1, a1, b2, a2] {
        order.track(&mut scene, key);
    }

    let mut camera = camera_90();
    renderer.render(&mut scene, Some(&mut camera), RenderOptions::default());

    // program_a was created first, so its draws come first, front to back
    // within each program.
    assert_eq!(order.take(), vec![a1, a2, b1, b2]);
}

#[test]
fn full_ties_break_by_descending_node_identity() {
    let mut renderer = test_renderer();
    let geometry = triangle(&mut renderer);
    let program = basic_program(&mut renderer, false);

    let mut scene = Scene::new();
    let first = add_mesh_at(&mut scene, geometry, program, [0.0, 0.0, -5.0]);
    let second = add_mesh_at(&mut scene, geometry, program, [0.0, 0.0, -5.0]);

    let order = DrawOrder::new();
    order.track(&mut scene, first);
    order.track(&mut scene, second);

    let mut camera = camera_90();
    renderer.render(&mut scene, Some(&mut camera), RenderOptions::default());

    // Most recently created first.
    assert_eq!(order.take(), vec![second, first]);
}

#[test]
fn overlay_bucket_draws_after_transparent() {
    let mut renderer = test_renderer();
    let geometry = triangle(&mut renderer);
    let opaque = basic_program(&mut renderer, false);
    let transparent = basic_program(&mut renderer, true);
    renderer.device_mut().queue_reflection(common::basic_reflection());
    let overlay = renderer.create_program(ProgramDesc {
        vertex: common::VERTEX_SRC.to_string(),
        fragment: common::FRAGMENT_SRC.to_string(),
        transparent: true,
        depth_test: false,
        ..Default::default()
    });

    let mut scene = Scene::new();
    let ui = add_mesh_at(&mut scene, geometry, overlay, [0.0, 0.0, -1.0]);
    let glass = add_mesh_at(&mut scene, geometry, transparent, [0.0, 0.0, -2.0]);
    let wall = add_mesh_at(&mut scene, geometry, opaque, [0.0, 0.0, -3.0]);

    let order = DrawOrder::new();
    for &key in &[ui, glass, wall] {
        order.track(&mut scene, key);
    }

    let mut camera = camera_90();
    renderer.render(&mut scene, Some(&mut camera), RenderOptions::default());

    assert_eq!(order.take(), vec![wall, glass, ui]);
}

#[test]
fn node_beyond_the_far_plane_is_culled() {
    let mut renderer = test_renderer();
    let geometry = triangle(&mut renderer);
    let program = basic_program(&mut renderer, false);

    let mut scene = Scene::new();
    // The triangle's bounding sphere has radius √2; 150 is far past 100.
    add_mesh_at(&mut scene, geometry, program, [0.0, 0.0, -150.0]);

    let mut camera = camera_90();
    renderer.render(&mut scene, Some(&mut camera), RenderOptions::default());

    assert_eq!(renderer.device().count(|c| c.is_draw()), 0);
}

#[test]
fn node_straddling_the_far_plane_is_kept() {
    let mut renderer = test_renderer();
    let geometry = triangle(&mut renderer);
    let program = basic_program(&mut renderer, false);

    let mut scene = Scene::new();
    // Sphere center sits exactly on the far plane; distance is within
    // [-radius, radius], so the conservative test keeps it.
    add_mesh_at(&mut scene, geometry, program, [0.0, 0.0, -100.0]);

    let mut camera = camera_90();
    renderer.render(&mut scene, Some(&mut camera), RenderOptions::default());

    assert_eq!(renderer.device().count(|c| c.is_draw()), 1);
}

#[test]
fn culling_can_be_disabled_per_node_and_per_call() {
    let mut renderer = test_renderer();
    let geometry = triangle(&mut renderer);
    let program = basic_program(&mut renderer, false);

    let mut scene = Scene::new();
    let key = add_mesh_at(&mut scene, geometry, program, [0.0, 0.0, -150.0]);
    if let Some(drawable) = scene[key].drawable.as_mut() {
        drawable.frustum_culled = false;
    }
    let mut camera = camera_90();
    renderer.render(&mut scene, Some(&mut camera), RenderOptions::default());
    assert_eq!(renderer.device().count(|c| c.is_draw()), 1);

    // Same spot, culling off for the whole call instead.
    let mut renderer = test_renderer();
    let geometry = triangle(&mut renderer);
    let program = basic_program(&mut renderer, false);
    let mut scene = Scene::new();
    add_mesh_at(&mut scene, geometry, program, [0.0, 0.0, -150.0]);
    let mut camera = camera_90();
    renderer.render(
        &mut scene,
        Some(&mut camera),
        RenderOptions {
            frustum_cull: false,
            ..Default::default()
        },
    );
    assert_eq!(renderer.device().count(|c| c.is_draw()), 1);
}

#[test]
fn invisible_ancestors_hide_whole_subtrees() {
    let mut renderer = test_renderer();
    let geometry = triangle(&mut renderer);
    let program = basic_program(&mut renderer, false);

    let mut scene = Scene::new();
    let root = scene.root();
    let group = scene.add(root, Node::new());
    let mut mesh = Node::mesh(geometry, program);
    mesh.transform.position = [0.0, 0.0, -5.0].into();
    scene.add(group, mesh);
    scene[group].visible = false;

    let mut camera = camera_90();
    renderer.render(&mut scene, Some(&mut camera), RenderOptions::default());
    assert_eq!(renderer.device().count(|c| c.is_draw()), 0);
}

#[test]
fn geometry_without_positions_is_never_culled() {
    let mut renderer = test_renderer();
    let geometry = renderer.create_geometry(vec![(
        "offset",
        glint::Attribute::f32(3, vec![0.0, 0.0, 0.0]),
    )]);
    renderer
        .device_mut()
        .queue_reflection(glint::ProgramReflection::new(
            vec![],
            vec![("offset", glint::device::VarKind::FloatVec3)],
        ));
    let program = renderer.create_program(ProgramDesc {
        vertex: common::VERTEX_SRC.to_string(),
        fragment: common::FRAGMENT_SRC.to_string(),
        ..Default::default()
    });

    let mut scene = Scene::new();
    add_mesh_at(&mut scene, geometry, program, [0.0, 0.0, -150.0]);

    let mut camera = camera_90();
    renderer.render(&mut scene, Some(&mut camera), RenderOptions::default());
    assert_eq!(renderer.device().count(|c| c.is_draw()), 1);
}
