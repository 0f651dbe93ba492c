//! The device state mirror.
//!
//! [`DeviceState`] tracks what the device currently believes for every piece
//! of settable pipeline state: capability toggles, blend/cull/depth settings,
//! the active texture unit and the texture bound to each unit, the buffer
//! bound to each target, the bound framebuffer, the program in use, the
//! active (geometry, vertex-layout) pair, and the last value uploaded to
//! every uniform location.
//!
//! Every setter compares the requested value against the mirror, issues the
//! device command only on mismatch, and then records the new value. All
//! state mutation in the engine funnels through here; nothing else is
//! allowed to call the device's state commands, otherwise the mirror and the
//! device disagree and a later "redundant" command gets dropped that wasn't.

use std::collections::HashMap;

use crate::device::{
    BlendFactor, BlendOp, BufferId, BufferTarget, Capability, CullFace, DepthFunc, Device,
    LayoutId, ProgramHandle, RawTextureId, TargetId, UniformData, UniformLocation, VarKind,
    Winding,
};

/// The blend function currently believed by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendFuncState {
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub src_alpha: Option<BlendFactor>,
    pub dst_alpha: Option<BlendFactor>,
}

/// Mirror of one device's pipeline state. Create exactly one per device and
/// keep them together for the device's whole lifetime.
#[derive(Debug)]
pub struct DeviceState {
    caps: HashMap<Capability, bool>,
    blend_func: BlendFuncState,
    blend_equation: (BlendOp, Option<BlendOp>),
    cull_face: Option<CullFace>,
    front_face: Winding,
    depth_mask: bool,
    depth_func: DepthFunc,
    clear_color: Option<[f32; 4]>,
    viewport: Option<(u32, u32)>,
    framebuffer: Option<TargetId>,
    active_texture_unit: u32,
    texture_units: Vec<Option<u64>>,
    array_buffer: Option<BufferId>,
    element_array_buffer: Option<BufferId>,
    current_program: Option<u64>,
    current_geometry: Option<(u64, String)>,
    uniforms: HashMap<UniformLocation, UniformData>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceState {
    /// A fresh mirror, matching the defaults of a fresh device context.
    pub fn new() -> Self {
        Self {
            caps: HashMap::new(),
            blend_func: BlendFuncState {
                src: BlendFactor::One,
                dst: BlendFactor::Zero,
                src_alpha: None,
                dst_alpha: None,
            },
            blend_equation: (BlendOp::Add, None),
            cull_face: None,
            front_face: Winding::Ccw,
            depth_mask: true,
            depth_func: DepthFunc::Less,
            clear_color: None,
            viewport: None,
            framebuffer: None,
            active_texture_unit: 0,
            texture_units: Vec::new(),
            array_buffer: None,
            element_array_buffer: None,
            current_program: None,
            current_geometry: None,
            uniforms: HashMap::new(),
        }
    }

    pub fn enable<D: Device + ?Sized>(&mut self, device: &mut D, cap: Capability) {
        if self.caps.get(&cap) == Some(&true) {
            return;
        }
        device.enable(cap);
        self.caps.insert(cap, true);
    }

    pub fn disable<D: Device + ?Sized>(&mut self, device: &mut D, cap: Capability) {
        if self.caps.get(&cap) == Some(&false) {
            return;
        }
        device.disable(cap);
        self.caps.insert(cap, false);
    }

    pub fn set_capability<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        cap: Capability,
        on: bool,
    ) {
        if on {
            self.enable(device, cap);
        } else {
            self.disable(device, cap);
        }
    }

    pub fn set_blend_func<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        src: BlendFactor,
        dst: BlendFactor,
        src_alpha: Option<BlendFactor>,
        dst_alpha: Option<BlendFactor>,
    ) {
        let requested = BlendFuncState {
            src,
            dst,
            src_alpha,
            dst_alpha,
        };
        if self.blend_func == requested {
            return;
        }
        self.blend_func = requested;
        device.blend_func(src, dst, src_alpha, dst_alpha);
    }

    pub fn set_blend_equation<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        rgb: Option<BlendOp>,
        alpha: Option<BlendOp>,
    ) {
        let rgb = rgb.unwrap_or(BlendOp::Add);
        if self.blend_equation == (rgb, alpha) {
            return;
        }
        self.blend_equation = (rgb, alpha);
        device.blend_equation(rgb, alpha);
    }

    pub fn set_cull_face<D: Device + ?Sized>(&mut self, device: &mut D, face: CullFace) {
        if self.cull_face == Some(face) {
            return;
        }
        self.cull_face = Some(face);
        device.cull_face(face);
    }

    pub fn set_front_face<D: Device + ?Sized>(&mut self, device: &mut D, winding: Winding) {
        if self.front_face == winding {
            return;
        }
        self.front_face = winding;
        device.front_face(winding);
    }

    pub fn set_depth_mask<D: Device + ?Sized>(&mut self, device: &mut D, write: bool) {
        if self.depth_mask == write {
            return;
        }
        self.depth_mask = write;
        device.depth_mask(write);
    }

    pub fn set_depth_func<D: Device + ?Sized>(&mut self, device: &mut D, func: DepthFunc) {
        if self.depth_func == func {
            return;
        }
        self.depth_func = func;
        device.depth_func(func);
    }

    pub fn set_clear_color<D: Device + ?Sized>(&mut self, device: &mut D, rgba: [f32; 4]) {
        if self.clear_color == Some(rgba) {
            return;
        }
        self.clear_color = Some(rgba);
        device.clear_color(rgba);
    }

    pub fn set_viewport<D: Device + ?Sized>(&mut self, device: &mut D, width: u32, height: u32) {
        if self.viewport == Some((width, height)) {
            return;
        }
        self.viewport = Some((width, height));
        device.viewport(width, height);
    }

    /// Bind a render target, or the default framebuffer for `None`.
    pub fn bind_framebuffer<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        target: Option<TargetId>,
    ) {
        if self.framebuffer == target {
            return;
        }
        self.framebuffer = target;
        device.bind_framebuffer(target);
    }

    pub fn set_active_texture<D: Device + ?Sized>(&mut self, device: &mut D, unit: u32) {
        if self.active_texture_unit == unit {
            return;
        }
        self.active_texture_unit = unit;
        device.active_texture(unit);
    }

    /// The identity of the texture bound to `unit`, if any.
    pub fn texture_bound(&self, unit: u32) -> Option<u64> {
        self.texture_units.get(unit as usize).copied().flatten()
    }

    /// Make `unit` active and ensure the texture with the given identity is
    /// bound to it. Returns true when a bind command was actually issued,
    /// i.e. the unit held something else; callers use this to decide whether
    /// follow-up per-texture commands can be skipped.
    pub fn bind_texture<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        unit: u32,
        identity: u64,
        raw: RawTextureId,
    ) -> bool {
        self.set_active_texture(device, unit);
        if self.texture_bound(unit) == Some(identity) {
            return false;
        }
        device.bind_texture(raw);
        let slot = unit as usize;
        if self.texture_units.len() <= slot {
            self.texture_units.resize(slot + 1, None);
        }
        self.texture_units[slot] = Some(identity);
        true
    }

    /// Forget a texture identity everywhere it is bound (the texture is
    /// being destroyed; its id must not mask a future bind).
    pub fn forget_texture(&mut self, identity: u64) {
        for slot in &mut self.texture_units {
            if *slot == Some(identity) {
                *slot = None;
            }
        }
    }

    pub fn bind_buffer<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        target: BufferTarget,
        buffer: Option<BufferId>,
    ) {
        let slot = match target {
            BufferTarget::Array => &mut self.array_buffer,
            BufferTarget::ElementArray => &mut self.element_array_buffer,
        };
        if *slot == buffer {
            return;
        }
        *slot = buffer;
        device.bind_buffer(target, buffer);
    }

    /// Forget a buffer binding on deletion so a recycled id re-binds.
    pub fn forget_buffer(&mut self, buffer: BufferId) {
        if self.array_buffer == Some(buffer) {
            self.array_buffer = None;
        }
        if self.element_array_buffer == Some(buffer) {
            self.element_array_buffer = None;
        }
    }

    /// Activate a program by identity; idempotent while it stays current.
    pub fn use_program<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        identity: u64,
        handle: ProgramHandle,
    ) {
        if self.current_program == Some(identity) {
            return;
        }
        self.current_program = Some(identity);
        device.use_program(handle);
    }

    /// Whether the given (geometry, attribute-order signature) pair is the
    /// one whose layout is currently bound.
    pub fn layout_is_current(&self, geometry: u64, signature: &str) -> bool {
        match &self.current_geometry {
            Some((id, sig)) => *id == geometry && sig == signature,
            None => false,
        }
    }

    /// Bind a vertex-layout object and record which (geometry, signature)
    /// pair it serves. Layouts carry their own element-array binding, so
    /// the mirror stops trusting its element-array slot.
    pub fn bind_layout<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        layout: LayoutId,
        geometry: u64,
        signature: &str,
    ) {
        device.bind_layout(Some(layout));
        self.current_geometry = Some((geometry, signature.to_string()));
        self.element_array_buffer = None;
    }

    /// Unbind any vertex layout. Buffer setup for a new geometry goes
    /// through here first so it cannot leak into the layout of whatever
    /// happened to be bound.
    pub fn clear_layout<D: Device + ?Sized>(&mut self, device: &mut D) {
        if self.current_geometry.is_none() {
            return;
        }
        device.bind_layout(None);
        self.current_geometry = None;
        self.element_array_buffer = None;
    }

    /// Forget every layout record referring to `geometry` (it is being
    /// destroyed).
    pub fn forget_geometry(&mut self, geometry: u64) {
        if matches!(&self.current_geometry, Some((id, _)) if *id == geometry) {
            self.current_geometry = None;
        }
    }

    /// Upload a uniform value unless the location already holds it. Arrays
    /// are compared by length and element-wise; matrices arrive here already
    /// flattened to float arrays.
    pub fn set_uniform<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        location: UniformLocation,
        kind: VarKind,
        data: &UniformData,
    ) {
        match self.uniforms.get_mut(&location) {
            Some(prev) if prev == data => return,
            Some(prev) => *prev = data.clone(),
            None => {
                self.uniforms.insert(location, data.clone());
            }
        }
        device.set_uniform(location, kind, data);
    }
}
