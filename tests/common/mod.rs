//! Shared helpers for the integration tests: a renderer over a recording
//! device, plus small scene/geometry/program builders.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use glint::device::VarKind;
use glint::{
    Attribute, GeometryKey, Node, NodeKey, ProgramDesc, ProgramKey, ProgramReflection, Renderer,
    RendererDesc, Scene, TraceDevice,
};

pub const VERTEX_SRC: &str = "\
attribute vec3 position;
uniform mat4 modelViewMatrix;
uniform mat4 projectionMatrix;
void main() {
    gl_Position = projectionMatrix * modelViewMatrix * vec4(position, 1.0);
}
";

pub const FRAGMENT_SRC: &str = "\
void main() {
    gl_FragColor = vec4(1.0);
}
";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn test_renderer() -> Renderer<TraceDevice> {
    init_logger();
    Renderer::new(TraceDevice::new(), RendererDesc::default())
}

/// A single triangle around the origin, radius ~1.
pub fn triangle(renderer: &mut Renderer<TraceDevice>) -> GeometryKey {
    renderer.create_geometry(vec![(
        "position",
        Attribute::f32(
            3,
            vec![-1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 0.0, 1.0, 0.0],
        ),
    )])
}

/// The reflection every test program reports unless a test seeds its own:
/// the camera matrix uniforms plus one vec3 position attribute.
pub fn basic_reflection() -> ProgramReflection {
    ProgramReflection::new(
        vec![
            ("modelViewMatrix", VarKind::Mat4),
            ("projectionMatrix", VarKind::Mat4),
        ],
        vec![("position", VarKind::FloatVec3)],
    )
}

/// Compile a program with the basic reflection.
pub fn basic_program(renderer: &mut Renderer<TraceDevice>, transparent: bool) -> ProgramKey {
    renderer.device_mut().queue_reflection(basic_reflection());
    renderer.create_program(ProgramDesc {
        vertex: VERTEX_SRC.to_string(),
        fragment: FRAGMENT_SRC.to_string(),
        transparent,
        ..Default::default()
    })
}

/// Add a mesh node at `position` and return its key.
pub fn add_mesh_at(
    scene: &mut Scene,
    geometry: GeometryKey,
    program: ProgramKey,
    position: [f32; 3],
) -> NodeKey {
    let root = scene.root();
    let mut node = Node::mesh(geometry, program);
    node.transform.position = position.into();
    scene.add(root, node)
}

/// Record the order nodes get drawn in via their before-render observers.
#[derive(Clone, Default)]
pub struct DrawOrder(Rc<RefCell<Vec<NodeKey>>>);

impl DrawOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the recorder to a node.
    pub fn track(&self, scene: &mut Scene, key: NodeKey) {
        let log = self.0.clone();
        if let Some(drawable) = scene[key].drawable.as_mut() {
            drawable.on_before_render(move |node, _camera| log.borrow_mut().push(node));
        }
    }

    pub fn take(&self) -> Vec<NodeKey> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}
