//! The renderer: resource ownership and the per-frame pipeline.
//!
//! [`Renderer`] owns the device, its state mirror and the resource arenas,
//! and drives the frame: bind target → clear → propagate transforms →
//! update frustum → build, cull and sort the render list → issue draws.
//! Nothing survives a frame except the device state cache, which is exactly
//! what makes consecutive frames cheap: state the previous frame already
//! set is never re-sent.

use std::cmp::Ordering;

use cgmath::{Matrix, Matrix3, Matrix4, SquareMatrix};
use slotmap::SlotMap;

use crate::device::state::DeviceState;
use crate::device::{Capability, Device, TextureFilter};
use crate::resources::geometry::{Attribute, Geometry, POSITION_ATTRIBUTE};
use crate::resources::program::{Program, ProgramDesc};
use crate::resources::texture::{RenderTarget, Texture2D};
use crate::resources::uniform::UniformValue;
use crate::resources::{GeometryKey, ProgramKey, TargetKey, TextureKey};
use crate::scene::camera::{Camera, project_point};
use crate::scene::graph::{NodeKey, Scene};
use crate::scene::transform::max_scale_on_axis;

/// Construction options for a [`Renderer`].
#[derive(Debug, Clone)]
pub struct RendererDesc {
    /// Default-framebuffer size in pixels.
    pub width: u32,
    pub height: u32,
    /// Clear the frame at the start of each render unless the render call
    /// says otherwise.
    pub auto_clear: bool,
    pub clear_color: [f32; 4],
    /// Which buffers a clear touches.
    pub color: bool,
    pub depth: bool,
    pub stencil: bool,
    /// Transparent bindings default to the premultiplied blend function.
    pub premultiplied_alpha: bool,
}

impl Default for RendererDesc {
    fn default() -> Self {
        Self {
            width: 300,
            height: 150,
            auto_clear: true,
            clear_color: [0.0, 0.0, 0.0, 0.0],
            color: true,
            depth: true,
            stencil: false,
            premultiplied_alpha: false,
        }
    }
}

/// Per-call options for [`Renderer::render`]. The default renders to the
/// default framebuffer with `update`, `sort` and `frustum_cull` all on.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Draw into an offscreen target instead of the default framebuffer.
    pub target: Option<TargetKey>,
    /// Run the scene-graph matrix update. Turn off when the caller already
    /// ran it this frame.
    pub update: bool,
    /// Bucket and sort the render list; off draws in traversal order.
    pub sort: bool,
    /// Cull against the camera frustum.
    pub frustum_cull: bool,
    /// Override the renderer's `auto_clear` for this call.
    pub clear: Option<bool>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            target: None,
            update: true,
            sort: true,
            frustum_cull: true,
            clear: None,
        }
    }
}

/// The sort inputs of one render-list entry.
struct ListEntry {
    key: NodeKey,
    node_id: u64,
    render_order: i32,
    program_id: u64,
    z_depth: f32,
}

fn compare_opaque(a: &ListEntry, b: &ListEntry) -> Ordering {
    if a.render_order != b.render_order {
        a.render_order.cmp(&b.render_order)
    } else if a.program_id != b.program_id {
        // Group draws by program to cut binding switches.
        a.program_id.cmp(&b.program_id)
    } else if a.z_depth != b.z_depth {
        // Front to back for early depth rejection.
        a.z_depth.total_cmp(&b.z_depth)
    } else {
        b.node_id.cmp(&a.node_id)
    }
}

fn compare_transparent(a: &ListEntry, b: &ListEntry) -> Ordering {
    if a.render_order != b.render_order {
        a.render_order.cmp(&b.render_order)
    } else if a.z_depth != b.z_depth {
        // Back to front; blending depends on it.
        b.z_depth.total_cmp(&a.z_depth)
    } else {
        b.node_id.cmp(&a.node_id)
    }
}

fn compare_overlay(a: &ListEntry, b: &ListEntry) -> Ordering {
    if a.render_order != b.render_order {
        a.render_order.cmp(&b.render_order)
    } else if a.program_id != b.program_id {
        a.program_id.cmp(&b.program_id)
    } else {
        b.node_id.cmp(&a.node_id)
    }
}

/// Owns a device and everything allocated on it, and renders scenes.
pub struct Renderer<D: Device> {
    device: D,
    state: DeviceState,
    geometries: SlotMap<GeometryKey, Geometry>,
    programs: SlotMap<ProgramKey, Program>,
    textures: SlotMap<TextureKey, Texture2D>,
    targets: SlotMap<TargetKey, RenderTarget>,
    next_geometry_id: u64,
    next_program_id: u64,
    next_texture_id: u64,
    width: u32,
    height: u32,
    pub auto_clear: bool,
    pub clear_color: [f32; 4],
    color: bool,
    depth: bool,
    stencil: bool,
    premultiplied_alpha: bool,
}

impl<D: Device> Renderer<D> {
    pub fn new(device: D, desc: RendererDesc) -> Self {
        Self {
            device,
            state: DeviceState::new(),
            geometries: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            targets: SlotMap::with_key(),
            next_geometry_id: 0,
            next_program_id: 0,
            next_texture_id: 0,
            width: desc.width,
            height: desc.height,
            auto_clear: desc.auto_clear,
            clear_color: desc.clear_color,
            color: desc.color,
            depth: desc.depth,
            stencil: desc.stencil,
            premultiplied_alpha: desc.premultiplied_alpha,
        }
    }

    /// The device, for inspection. Issuing state commands on it directly
    /// desynchronises the state mirror; resources and render calls are the
    /// supported way in.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable device access, same caveat as [`device`](Self::device).
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Resize the default framebuffer.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    // ---- resources -------------------------------------------------------

    /// Build a geometry from named attribute descriptors. The name
    /// `"index"` supplies the index buffer.
    pub fn create_geometry<'a>(
        &mut self,
        attributes: impl IntoIterator<Item = (&'a str, Attribute)>,
    ) -> GeometryKey {
        let id = self.next_geometry_id;
        self.next_geometry_id += 1;
        let mut geometry = Geometry::new(id);
        for (name, attribute) in attributes {
            geometry.add_attribute(&mut self.device, &mut self.state, name, attribute);
        }
        self.geometries.insert(geometry)
    }

    pub fn geometry(&self, key: GeometryKey) -> Option<&Geometry> {
        self.geometries.get(key)
    }

    pub fn geometry_mut(&mut self, key: GeometryKey) -> Option<&mut Geometry> {
        self.geometries.get_mut(key)
    }

    /// Add or replace an attribute on an existing geometry.
    pub fn add_attribute(&mut self, key: GeometryKey, name: &str, attribute: Attribute) {
        match self.geometries.get_mut(key) {
            Some(geometry) => {
                geometry.add_attribute(&mut self.device, &mut self.state, name, attribute)
            }
            None => log::warn!("add_attribute on a geometry that no longer exists"),
        }
    }

    /// Destroy a geometry, releasing its buffers and cached layouts.
    pub fn delete_geometry(&mut self, key: GeometryKey) {
        if let Some(mut geometry) = self.geometries.remove(key) {
            geometry.destroy(&mut self.device, &mut self.state);
        }
    }

    /// Compile and link a program. A failed build is logged and yields a
    /// broken binding whose draws are no-ops; the key stays valid either
    /// way.
    pub fn create_program(&mut self, desc: ProgramDesc) -> ProgramKey {
        let id = self.next_program_id;
        self.next_program_id += 1;
        let program = Program::new(&mut self.device, id, desc, self.premultiplied_alpha);
        self.programs.insert(program)
    }

    pub fn program(&self, key: ProgramKey) -> Option<&Program> {
        self.programs.get(key)
    }

    pub fn program_mut(&mut self, key: ProgramKey) -> Option<&mut Program> {
        self.programs.get_mut(key)
    }

    pub fn delete_program(&mut self, key: ProgramKey) {
        if let Some(mut program) = self.programs.remove(key) {
            program.destroy(&mut self.device);
        }
    }

    pub fn create_texture(&mut self) -> TextureKey {
        let id = self.next_texture_id;
        self.next_texture_id += 1;
        let raw = self.device.create_texture();
        self.textures.insert(Texture2D::new(id, raw))
    }

    pub fn texture(&self, key: TextureKey) -> Option<&Texture2D> {
        self.textures.get(key)
    }

    pub fn texture_mut(&mut self, key: TextureKey) -> Option<&mut Texture2D> {
        self.textures.get_mut(key)
    }

    pub fn delete_texture(&mut self, key: TextureKey) {
        if let Some(mut texture) = self.textures.remove(key) {
            texture.destroy(&mut self.device, &mut self.state);
        }
    }

    /// Create an offscreen render target with a color texture and an
    /// optional depth attachment.
    pub fn create_render_target(&mut self, width: u32, height: u32, depth: bool) -> TargetKey {
        let id = self.next_texture_id;
        self.next_texture_id += 1;
        let raw = self.device.create_texture();
        let mut texture = Texture2D::new(id, raw);
        texture.width = width;
        texture.height = height;
        texture.generate_mipmaps = false;
        texture.min_filter = TextureFilter::Linear;
        let color = self.textures.insert(texture);
        let target = self.device.create_render_target(raw, width, height, depth);
        self.targets
            .insert(RenderTarget::new(target, width, height, depth, color))
    }

    pub fn render_target(&self, key: TargetKey) -> Option<&RenderTarget> {
        self.targets.get(key)
    }

    /// Delete a render target's framebuffer. Its color texture stays
    /// available until deleted separately.
    pub fn delete_render_target(&mut self, key: TargetKey) {
        if let Some(target) = self.targets.remove(key) {
            self.device.delete_render_target(target.target());
        }
    }

    // ---- frame -----------------------------------------------------------

    /// Render `scene` through `camera`.
    ///
    /// Defaults (an all-default [`RenderOptions`]): matrices are updated,
    /// the list is culled against the camera frustum and sorted, and the
    /// frame is cleared per the renderer's `auto_clear`.
    pub fn render(
        &mut self,
        scene: &mut Scene,
        mut camera: Option<&mut Camera>,
        options: RenderOptions,
    ) {
        // Bind the output and its viewport.
        let target = options.target.and_then(|key| {
            let found = self.targets.get(key);
            if found.is_none() {
                log::warn!("render target no longer exists; drawing to the default framebuffer");
            }
            found
        });
        match target {
            Some(target) => {
                let (id, w, h) = (target.target(), target.width, target.height);
                self.state.bind_framebuffer(&mut self.device, Some(id));
                self.state.set_viewport(&mut self.device, w, h);
            }
            None => {
                self.state.bind_framebuffer(&mut self.device, None);
                self.state.set_viewport(&mut self.device, self.width, self.height);
            }
        }

        if options.clear.unwrap_or(self.auto_clear) {
            // Depth writes must be on for the depth buffer to clear.
            let target_has_depth = target.is_none_or(|t| t.depth);
            if self.depth && target_has_depth {
                self.state.enable(&mut self.device, Capability::DepthTest);
                self.state.set_depth_mask(&mut self.device, true);
            }
            self.state.set_clear_color(&mut self.device, self.clear_color);
            self.device.clear(self.color, self.depth, self.stencil);
        }

        if options.update {
            scene.update_world_matrices();
        }
        // The camera updates separately; it need not live in the graph.
        if let Some(camera) = camera.as_deref_mut() {
            camera.update_world_matrix();
            if options.frustum_cull {
                camera.update_frustum();
            }
        }

        let camera = camera.as_deref();
        let list = self.build_render_list(scene, camera, options.frustum_cull, options.sort);
        for key in list {
            self.draw_node(scene, key, camera);
        }
    }

    /// Traverse, cull, bucket and sort the scene into draw order.
    fn build_render_list(
        &mut self,
        scene: &mut Scene,
        camera: Option<&Camera>,
        frustum_cull: bool,
        sort: bool,
    ) -> Vec<NodeKey> {
        let mut keys = Vec::new();
        scene.traverse(|key, node| {
            // An invisible node hides its whole subtree.
            if !node.visible {
                return true;
            }
            if node.drawable.is_some() {
                keys.push(key);
            }
            false
        });

        if frustum_cull {
            if let Some(camera) = camera {
                keys.retain(|&key| {
                    let node = &scene[key];
                    let Some(drawable) = node.drawable.as_ref() else {
                        return false;
                    };
                    if !drawable.frustum_culled {
                        return true;
                    }
                    self.node_intersects_frustum(scene, key, camera)
                });
            }
        }

        if !sort {
            return keys;
        }

        let mut opaque = Vec::new();
        let mut transparent = Vec::new();
        let mut overlay = Vec::new();

        for &key in &keys {
            let node = &mut scene[key];
            let node_id = node.id;
            let world = node.transform.world_matrix;
            let Some(drawable) = node.drawable.as_mut() else {
                continue;
            };
            let Some(program) = self.programs.get(drawable.program) else {
                log::warn!("mesh node refers to a destroyed program; skipped");
                continue;
            };

            drawable.z_depth = 0.0;
            // The depth key is only worth computing when it can influence
            // the order: default render order, a depth-tested binding and a
            // camera to project through.
            if drawable.render_order == 0 && program.depth_test {
                if let Some(camera) = camera {
                    let position = world.w.truncate();
                    drawable.z_depth = project_point(&camera.projection_view_matrix, position).z;
                }
            }

            let entry = ListEntry {
                key,
                node_id,
                render_order: drawable.render_order,
                program_id: program.id(),
                z_depth: drawable.z_depth,
            };
            if !program.transparent {
                opaque.push(entry);
            } else if program.depth_test {
                transparent.push(entry);
            } else {
                overlay.push(entry);
            }
        }

        opaque.sort_by(compare_opaque);
        transparent.sort_by(compare_transparent);
        overlay.sort_by(compare_overlay);

        opaque
            .into_iter()
            .chain(transparent)
            .chain(overlay)
            .map(|entry| entry.key)
            .collect()
    }

    /// World-space bounding-sphere test for one mesh node. Bounds are
    /// computed on first need; a node whose geometry has no usable position
    /// data is treated as visible rather than culled.
    fn node_intersects_frustum(&mut self, scene: &Scene, key: NodeKey, camera: &Camera) -> bool {
        let node = &scene[key];
        let Some(drawable) = node.drawable.as_ref() else {
            return false;
        };
        let Some(geometry) = self.geometries.get_mut(drawable.geometry) else {
            return true;
        };
        if geometry.attribute(POSITION_ATTRIBUTE).is_none() {
            return true;
        }
        if geometry.bounds().is_none_or(|b| !b.radius.is_finite()) {
            geometry.compute_bounding_sphere();
        }
        let Some(bounds) = geometry.bounds() else {
            return true;
        };
        if !bounds.radius.is_finite() {
            return true;
        }

        let world = &node.transform.world_matrix;
        let center = project_point(world, bounds.center);
        let radius = bounds.radius * max_scale_on_axis(world);
        camera.intersects_sphere(center, radius)
    }

    /// Issue one node's draw: observers, camera matrix uniforms, winding
    /// flip for mirrored transforms, program bind, geometry draw.
    fn draw_node(&mut self, scene: &mut Scene, key: NodeKey, camera: Option<&Camera>) {
        let node = &mut scene[key];
        let world = node.transform.world_matrix;
        let Some(drawable) = node.drawable.as_mut() else {
            return;
        };
        let geometry_key = drawable.geometry;
        let program_key = drawable.program;
        let mode = drawable.mode;

        let mut callbacks = std::mem::take(&mut drawable.before_render);
        for callback in &mut callbacks {
            callback(key, camera);
        }
        drawable.before_render = callbacks;

        let Self {
            device,
            state,
            geometries,
            programs,
            textures,
            ..
        } = self;
        let Some(program) = programs.get_mut(program_key) else {
            log::warn!("mesh node refers to a destroyed program; skipped");
            return;
        };
        let Some(geometry) = geometries.get_mut(geometry_key) else {
            log::warn!("mesh node refers to a destroyed geometry; skipped");
            return;
        };

        if let Some(camera) = camera {
            let model_view = camera.view_matrix * world;
            let normal = normal_matrix(&model_view);
            program.set_uniform("modelMatrix", world);
            program.set_uniform("viewMatrix", camera.view_matrix);
            program.set_uniform("modelViewMatrix", model_view);
            program.set_uniform("normalMatrix", UniformValue::Mat3(normal));
            program.set_uniform("projectionMatrix", camera.projection_matrix);
            program.set_uniform("cameraPosition", camera.world_position);
        }

        // A negative determinant means the transform mirrors; flip the
        // winding for this draw so culling still removes the right faces.
        let flip_winding = program.cull_face.is_some() && world.determinant() < 0.0;
        program.bind(device, state, textures, flip_winding);
        if !program.is_broken() {
            geometry.draw(device, state, program, mode);
        }

        let node = &mut scene[key];
        if let Some(drawable) = node.drawable.as_mut() {
            let mut callbacks = std::mem::take(&mut drawable.after_render);
            for callback in &mut callbacks {
                callback(key, camera);
            }
            drawable.after_render = callbacks;
        }
    }
}

/// Inverse-transpose of the upper 3×3 of a model-view matrix; falls back to
/// the plain rotation part when the matrix is singular.
fn normal_matrix(model_view: &Matrix4<f32>) -> Matrix3<f32> {
    let m = Matrix3::from_cols(
        model_view.x.truncate(),
        model_view.y.truncate(),
        model_view.z.truncate(),
    );
    match m.invert() {
        Some(inverse) => inverse.transpose(),
        None => m,
    }
}
