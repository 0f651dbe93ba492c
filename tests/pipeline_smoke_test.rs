//! End-to-end pipeline smoke test: a textured opaque mesh, a transparent
//! mesh and an overlay quad rendered over several frames, asserting on the
//! shape of the whole command stream.

mod common;

use anyhow::{Context, Result, ensure};
use glint::device::VarKind;
use glint::{
    Attribute, AttributeData, Camera, Command, Deg, Node, ProgramDesc, ProgramReflection,
    RenderOptions, Scene, UniformValue, Vector3,
};

#[test]
fn three_frames_of_a_mixed_scene() -> Result<()> {
    let mut renderer = common::test_renderer();

    // An indexed quad with positions and texture coordinates.
    let quad = renderer.create_geometry(vec![
        (
            "position",
            Attribute::f32(
                3,
                vec![
                    -1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 1.0, 1.0, 0.0, -1.0, 1.0, 0.0,
                ],
            ),
        ),
        ("uv", Attribute::f32(2, vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0])),
        (
            "index",
            Attribute::new(1, AttributeData::U16(vec![0, 1, 2, 0, 2, 3])),
        ),
    ]);

    let checker = renderer.create_texture();
    renderer
        .texture_mut(checker)
        .context("texture just created")?
        .set_image(vec![0, 255, 0, 255, 255, 0, 255, 0], 2, 1);

    let textured_reflection = || {
        ProgramReflection::new(
            vec![
                ("modelViewMatrix", VarKind::Mat4),
                ("projectionMatrix", VarKind::Mat4),
                ("map", VarKind::Sampler2D),
            ],
            vec![
                ("position", VarKind::FloatVec3),
                ("uv", VarKind::FloatVec2),
            ],
        )
    };

    renderer.device_mut().queue_reflection(textured_reflection());
    let opaque = renderer.create_program(ProgramDesc {
        vertex: common::VERTEX_SRC.to_string(),
        fragment: common::FRAGMENT_SRC.to_string(),
        ..Default::default()
    });
    renderer
        .program_mut(opaque)
        .context("program just created")?
        .set_uniform("map", UniformValue::Texture(checker));

    renderer.device_mut().queue_reflection(textured_reflection());
    let glass = renderer.create_program(ProgramDesc {
        vertex: common::VERTEX_SRC.to_string(),
        fragment: common::FRAGMENT_SRC.to_string(),
        transparent: true,
        ..Default::default()
    });
    renderer
        .program_mut(glass)
        .context("program just created")?
        .set_uniform("map", UniformValue::Texture(checker));

    renderer.device_mut().queue_reflection(textured_reflection());
    let overlay = renderer.create_program(ProgramDesc {
        vertex: common::VERTEX_SRC.to_string(),
        fragment: common::FRAGMENT_SRC.to_string(),
        transparent: true,
        depth_test: false,
        ..Default::default()
    });
    renderer
        .program_mut(overlay)
        .context("program just created")?
        .set_uniform("map", UniformValue::Texture(checker));

    let mut scene = Scene::new();
    let root = scene.root();
    let group = scene.add(root, Node::new());
    for (program, z) in [(opaque, -4.0), (glass, -3.0), (overlay, -2.0)] {
        let mut node = Node::mesh(quad, program);
        node.transform.position = Vector3::new(0.0, 0.0, z);
        scene.add(group, node);
    }

    let mut camera = Camera::perspective(Deg(90.0), 1.0, 0.1, 100.0);
    for frame in 0..3 {
        // Wiggle the group so transforms propagate every frame.
        scene[group].transform.position.x = frame as f32 * 0.25;
        renderer.render(&mut scene, Some(&mut camera), RenderOptions::default());
    }

    let commands = renderer.device().commands();
    let draws = commands.iter().filter(|c| c.is_draw()).count();
    ensure!(draws == 9, "three nodes over three frames, got {draws} draws");
    ensure!(
        commands
            .iter()
            .all(|c| !matches!(c, Command::DrawArrays(..))),
        "every draw goes through the index buffer"
    );

    // Shared resources bind once, not once per draw or per frame.
    let layouts = commands
        .iter()
        .filter(|c| matches!(c, Command::CreateLayout(_)))
        .count();
    ensure!(layouts == 1, "one shared vertex layout, got {layouts}");
    let texture_uploads = commands
        .iter()
        .filter(|c| matches!(c, Command::TextureImage(..)))
        .count();
    ensure!(texture_uploads == 1, "one texture upload, got {texture_uploads}");
    let clears = commands
        .iter()
        .filter(|c| matches!(c, Command::Clear { .. }))
        .count();
    ensure!(clears == 3, "one clear per frame, got {clears}");

    // Blending toggles on between the opaque and transparent draws of each
    // frame, and off again at the start of the next frame's opaque draw.
    let blend_toggles = commands
        .iter()
        .filter(|c| {
            matches!(
                c,
                Command::Enable(glint::device::Capability::Blend)
                    | Command::Disable(glint::device::Capability::Blend)
            )
        })
        .count();
    ensure!(blend_toggles == 6, "expected 6 blend toggles, got {blend_toggles}");

    Ok(())
}
