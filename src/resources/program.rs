//! Shader bindings.
//!
//! A [`Program`] pairs a compiled device program with the application's
//! uniform values and a persisted render-state record. Binding it for a
//! draw activates the program (idempotent through the state cache),
//! resolves every active uniform the compiled program declares (including
//! struct members and array elements by name decomposition) and applies
//! the render state, all through diff-checked state setters.
//!
//! A program whose shaders fail to compile or link is kept in a broken
//! state: the failure is logged once at construction and every draw through
//! it is a reported no-op. A bad shader never takes the frame down.

use std::collections::HashMap;

use slotmap::SlotMap;

use crate::device::state::DeviceState;
use crate::device::{
    AttributeReflection, BlendFactor, BlendOp, Capability, CullFace, DepthFunc, Device,
    ProgramHandle, UniformData, UniformLocation, VarKind, Winding,
};
use crate::error::ProgramError;
use crate::resources::TextureKey;
use crate::resources::texture::Texture2D;
use crate::resources::uniform::UniformValue;

/// Repeated per-program warnings stop after this many messages.
const MAX_WARNINGS: u32 = 100;

/// Construction options for a [`Program`]. Defaults match an opaque,
/// back-face-culled, depth-tested binding.
pub struct ProgramDesc {
    pub vertex: String,
    pub fragment: String,
    pub uniforms: HashMap<String, UniformValue>,
    pub transparent: bool,
    /// `None` disables face culling for this binding.
    pub cull_face: Option<CullFace>,
    pub front_face: Winding,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_func: DepthFunc,
}

impl Default for ProgramDesc {
    fn default() -> Self {
        Self {
            vertex: String::new(),
            fragment: String::new(),
            uniforms: HashMap::new(),
            transparent: false,
            cull_face: Some(CullFace::Back),
            front_face: Winding::Ccw,
            depth_test: true,
            depth_write: true,
            depth_func: DepthFunc::Less,
        }
    }
}

/// How a reflected uniform name maps into the supplied value map.
#[derive(Debug, Clone, PartialEq, Eq)]
enum UniformBinding {
    /// `color` or `weights[0]`: the base name resolves directly.
    Plain,
    /// `light.intensity`: a member of a struct value.
    StructField { field: String },
    /// `lights[2].intensity`: a member of one element of a struct array.
    StructArrayField { index: usize, field: String },
}

/// One active uniform of the compiled program, with its name decomposition
/// parsed once at link time.
struct ActiveUniform {
    base: String,
    /// Full reflected name, used in warnings.
    name: String,
    binding: UniformBinding,
    kind: VarKind,
    location: UniformLocation,
}

/// Split a reflected uniform name into its base and binding. Reflected
/// names look like `color`, `weights[0]`, `light.intensity` or
/// `lights[2].intensity`.
fn parse_uniform_name(name: &str) -> (String, UniformBinding) {
    let tokens: Vec<&str> = name
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .collect();
    match tokens.as_slice() {
        [base, field] if field.parse::<usize>().is_err() => (
            base.to_string(),
            UniformBinding::StructField {
                field: field.to_string(),
            },
        ),
        [base, index, field] => match index.parse::<usize>() {
            Ok(index) => (
                base.to_string(),
                UniformBinding::StructArrayField {
                    index,
                    field: field.to_string(),
                },
            ),
            Err(_) => (base.to_string(), UniformBinding::Plain),
        },
        [base, ..] => (base.to_string(), UniformBinding::Plain),
        [] => (String::new(), UniformBinding::Plain),
    }
}

/// The blend function persisted on a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendDesc {
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub src_alpha: Option<BlendFactor>,
    pub dst_alpha: Option<BlendFactor>,
}

/// A compiled shader program plus its resolved reflection, uniform values
/// and render state.
pub struct Program {
    id: u64,
    handle: Option<ProgramHandle>,
    link_error: Option<ProgramError>,
    /// Application-supplied uniform values, resolved by name on every bind.
    pub uniforms: HashMap<String, UniformValue>,
    active_uniforms: Vec<ActiveUniform>,
    attributes: Vec<AttributeReflection>,
    attribute_signature: String,
    pub transparent: bool,
    pub cull_face: Option<CullFace>,
    pub front_face: Winding,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_func: DepthFunc,
    blend_func: Option<BlendDesc>,
    blend_equation: (Option<BlendOp>, Option<BlendOp>),
    warn_count: u32,
}

impl Program {
    pub(crate) fn new<D: Device + ?Sized>(
        device: &mut D,
        id: u64,
        desc: ProgramDesc,
        premultiplied_alpha: bool,
    ) -> Self {
        let mut program = Self {
            id,
            handle: None,
            link_error: None,
            uniforms: desc.uniforms,
            active_uniforms: Vec::new(),
            attributes: Vec::new(),
            attribute_signature: String::new(),
            transparent: desc.transparent,
            cull_face: desc.cull_face,
            front_face: desc.front_face,
            depth_test: desc.depth_test,
            depth_write: desc.depth_write,
            depth_func: desc.depth_func,
            blend_func: None,
            blend_equation: (None, None),
            warn_count: 0,
        };

        if program.transparent {
            if premultiplied_alpha {
                program.set_blend_func(BlendFactor::One, BlendFactor::OneMinusSrcAlpha, None, None);
            } else {
                program.set_blend_func(
                    BlendFactor::SrcAlpha,
                    BlendFactor::OneMinusSrcAlpha,
                    None,
                    None,
                );
            }
        }

        match device.create_program(&desc.vertex, &desc.fragment) {
            Ok(handle) => {
                program.handle = Some(handle);
                program.active_uniforms = device
                    .active_uniforms(handle)
                    .into_iter()
                    .map(|reflected| {
                        let (base, binding) = parse_uniform_name(&reflected.name);
                        ActiveUniform {
                            base,
                            name: reflected.name,
                            binding,
                            kind: reflected.kind,
                            location: reflected.location,
                        }
                    })
                    .collect();
                let mut attributes = device.active_attributes(handle);
                attributes.sort_by_key(|a| a.location);
                program.attribute_signature = attributes
                    .iter()
                    .map(|a| a.name.as_str())
                    .collect::<Vec<_>>()
                    .join(",");
                program.attributes = attributes;
            }
            Err(error) => {
                log::error!("shader program failed to build: {error}");
                program.link_error = Some(error);
            }
        }

        program
    }

    /// Identity used for render-list grouping and the program mirror.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True when construction failed; draws through the binding are no-ops.
    pub fn is_broken(&self) -> bool {
        self.handle.is_none()
    }

    /// Why construction failed, when it did.
    pub fn link_error(&self) -> Option<&ProgramError> {
        self.link_error.as_ref()
    }

    /// The active attributes in slot order.
    pub(crate) fn attributes(&self) -> &[AttributeReflection] {
        &self.attributes
    }

    /// Attribute names joined in slot order; geometries key their cached
    /// vertex layouts on this, so programs sharing an attribute order share
    /// layouts.
    pub fn attribute_signature(&self) -> &str {
        &self.attribute_signature
    }

    /// Set or replace a uniform value by name.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) {
        self.uniforms.insert(name.to_string(), value.into());
    }

    /// Persist an explicit blend function. Setting one flags the binding
    /// transparent.
    pub fn set_blend_func(
        &mut self,
        src: BlendFactor,
        dst: BlendFactor,
        src_alpha: Option<BlendFactor>,
        dst_alpha: Option<BlendFactor>,
    ) {
        self.blend_func = Some(BlendDesc {
            src,
            dst,
            src_alpha,
            dst_alpha,
        });
        self.transparent = true;
    }

    pub fn set_blend_equation(&mut self, rgb: Option<BlendOp>, alpha: Option<BlendOp>) {
        self.blend_equation = (rgb, alpha);
    }

    pub fn blend_func(&self) -> Option<&BlendDesc> {
        self.blend_func.as_ref()
    }

    fn warn(count: &mut u32, message: String) {
        if *count >= MAX_WARNINGS {
            return;
        }
        *count += 1;
        log::warn!("{message}");
        if *count == MAX_WARNINGS {
            log::warn!("further warnings from this program suppressed");
        }
    }

    /// Activate the program, resolve and upload its uniforms, and apply its
    /// render state, everything through the state cache. `flip_winding`
    /// reverses the front face for this draw only (mirrored world
    /// transforms) without touching the persisted state.
    pub(crate) fn bind<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        state: &mut DeviceState,
        textures: &mut SlotMap<TextureKey, Texture2D>,
        flip_winding: bool,
    ) {
        let Some(handle) = self.handle else {
            Self::warn(
                &mut self.warn_count,
                "draw through a broken program skipped".to_string(),
            );
            return;
        };
        state.use_program(device, self.id, handle);

        // Texture-valued uniforms consume sequential units for this draw.
        let mut next_unit: u32 = 0;

        for i in 0..self.active_uniforms.len() {
            let active = &self.active_uniforms[i];
            let value = match &active.binding {
                UniformBinding::Plain => self.uniforms.get(&active.base),
                UniformBinding::StructField { field } => {
                    self.uniforms.get(&active.base).and_then(|v| match v {
                        UniformValue::Struct(members) => members.get(field),
                        _ => None,
                    })
                }
                UniformBinding::StructArrayField { index, field } => {
                    self.uniforms.get(&active.base).and_then(|v| match v {
                        UniformValue::StructArray(elements) => {
                            elements.get(*index).and_then(|members| members.get(field))
                        }
                        _ => None,
                    })
                }
            };
            let Some(value) = value else {
                Self::warn(
                    &mut self.warn_count,
                    format!("active uniform {} has not been supplied", active.name),
                );
                continue;
            };

            match value {
                UniformValue::Texture(key) => {
                    let unit = next_unit;
                    next_unit += 1;
                    match textures.get_mut(*key) {
                        Some(texture) => texture.upload(device, state, unit),
                        None => Self::warn(
                            &mut self.warn_count,
                            format!("uniform {} refers to a destroyed texture", active.name),
                        ),
                    }
                    state.set_uniform(
                        device,
                        active.location,
                        active.kind,
                        &UniformData::Int(unit as i32),
                    );
                }
                UniformValue::Textures(keys) => {
                    let mut units = Vec::with_capacity(keys.len());
                    for key in keys {
                        let unit = next_unit;
                        next_unit += 1;
                        match textures.get_mut(*key) {
                            Some(texture) => texture.upload(device, state, unit),
                            None => Self::warn(
                                &mut self.warn_count,
                                format!("uniform {} refers to a destroyed texture", active.name),
                            ),
                        }
                        units.push(unit as i32);
                    }
                    state.set_uniform(
                        device,
                        active.location,
                        active.kind,
                        &UniformData::IntVec(units),
                    );
                }
                other => match other.data() {
                    Some(data) => state.set_uniform(device, active.location, active.kind, &data),
                    None => Self::warn(
                        &mut self.warn_count,
                        format!("uniform {} is missing a usable value", active.name),
                    ),
                },
            }
        }

        self.apply_state(device, state);
        if flip_winding {
            state.set_front_face(device, self.front_face.flipped());
        }
    }

    /// Apply the binding's persisted render state through the state cache.
    fn apply_state<D: Device + ?Sized>(&self, device: &mut D, state: &mut DeviceState) {
        state.set_capability(device, Capability::DepthTest, self.depth_test);
        state.set_capability(device, Capability::CullFace, self.cull_face.is_some());
        state.set_capability(device, Capability::Blend, self.blend_func.is_some());

        if let Some(face) = self.cull_face {
            state.set_cull_face(device, face);
        }
        state.set_front_face(device, self.front_face);
        state.set_depth_mask(device, self.depth_write);
        state.set_depth_func(device, self.depth_func);
        if let Some(blend) = &self.blend_func {
            state.set_blend_func(device, blend.src, blend.dst, blend.src_alpha, blend.dst_alpha);
        }
        state.set_blend_equation(device, self.blend_equation.0, self.blend_equation.1);
    }

    pub(crate) fn destroy<D: Device + ?Sized>(&mut self, device: &mut D) {
        if let Some(handle) = self.handle.take() {
            device.delete_program(handle);
        }
    }
}
