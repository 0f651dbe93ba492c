//! The graphics device abstraction.
//!
//! The pipeline never talks to a concrete graphics API. Everything it needs
//! from the hardware is expressed as the [`Device`] trait: a stateful command
//! sink with typed state values and opaque resource ids. Backends implement
//! the trait; the engine issues commands exclusively through
//! [`DeviceState`](state::DeviceState), which mirrors the device's pipeline
//! state and drops commands that would not change it.
//!
//! [`TraceDevice`](trace::TraceDevice) is the built-in backend: it records
//! the command stream instead of executing it, which is what the test suite
//! and headless hosts run against.

pub mod state;
pub mod trace;

use crate::error::ProgramError;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

id_type!(
    /// A device data buffer (vertex or index data).
    BufferId
);
id_type!(
    /// A compiled and linked shader program on the device.
    ProgramHandle
);
id_type!(
    /// A vertex-layout object: the device-side description of how buffers
    /// feed a particular set of attribute slots.
    LayoutId
);
id_type!(
    /// A texture allocated on the device.
    RawTextureId
);
id_type!(
    /// An offscreen render target (framebuffer).
    TargetId
);
id_type!(
    /// The location of an active uniform.
    ///
    /// Locations must be unique across the whole device, not merely within
    /// one program: the state cache keys its last-uploaded-value map by
    /// location alone.
    UniformLocation
);

/// Pipeline capabilities that can be enabled or disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Blend,
    CullFace,
    DepthTest,
}

/// Source/destination factors for the blend function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Blend equation operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Which faces get culled when face culling is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullFace {
    Front,
    Back,
    FrontAndBack,
}

/// Winding order that defines a front face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winding {
    Cw,
    Ccw,
}

impl Winding {
    /// The opposite winding, used to flip faces for mirrored transforms.
    pub fn flipped(self) -> Self {
        match self {
            Winding::Cw => Winding::Ccw,
            Winding::Ccw => Winding::Cw,
        }
    }
}

/// Depth comparison functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Primitive assembly modes for draw calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// Binding targets for data buffers. Vertex data and index data are bound
/// to independent targets and the state cache mirrors each separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

/// Element types for attribute and index data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    F32,
    I8,
    U8,
    I16,
    U16,
    U32,
}

impl DataType {
    pub fn byte_size(self) -> usize {
        match self {
            DataType::F32 | DataType::U32 => 4,
            DataType::I16 | DataType::U16 => 2,
            DataType::I8 | DataType::U8 => 1,
        }
    }
}

/// The type of a shader variable, as reported by program reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Float,
    FloatVec2,
    FloatVec3,
    FloatVec4,
    Int,
    IntVec2,
    IntVec3,
    IntVec4,
    Bool,
    Mat2,
    Mat3,
    Mat4,
    Sampler2D,
    SamplerCube,
}

impl VarKind {
    /// Number of scalar components a single value of this kind occupies.
    pub fn components(self) -> usize {
        match self {
            VarKind::Float | VarKind::Int | VarKind::Bool => 1,
            VarKind::Sampler2D | VarKind::SamplerCube => 1,
            VarKind::FloatVec2 | VarKind::IntVec2 => 2,
            VarKind::FloatVec3 | VarKind::IntVec3 => 3,
            VarKind::FloatVec4 | VarKind::IntVec4 => 4,
            VarKind::Mat2 => 4,
            VarKind::Mat3 => 9,
            VarKind::Mat4 => 16,
        }
    }

    /// For matrix attributes, how many consecutive slots the attribute
    /// occupies (one per column). Everything else takes a single slot.
    pub fn column_count(self) -> usize {
        match self {
            VarKind::Mat2 => 2,
            VarKind::Mat3 => 3,
            VarKind::Mat4 => 4,
            _ => 1,
        }
    }

    pub fn is_sampler(self) -> bool {
        matches!(self, VarKind::Sampler2D | VarKind::SamplerCube)
    }
}

/// Texture minification/magnification filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

/// Texture coordinate wrapping modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureWrap {
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// One active uniform reported by program reflection. Array uniforms and
/// struct members come back with their full shader-side name, e.g.
/// `lights[2].intensity`; the engine parses those into bindings once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformReflection {
    pub name: String,
    pub kind: VarKind,
    pub location: UniformLocation,
}

/// One active vertex attribute reported by program reflection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeReflection {
    pub name: String,
    pub kind: VarKind,
    pub location: u32,
}

/// The flattened payload of one uniform upload. Values are carried (and
/// cached by the state mirror) by value so that equality is a plain
/// element-wise comparison; matrices travel as flattened float arrays.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformData {
    Float(f32),
    Int(i32),
    FloatVec(Vec<f32>),
    IntVec(Vec<i32>),
}

/// A stateful graphics command sink.
///
/// This is the boundary of the engine: a backend maps each command onto its
/// native API. Commands are assumed to be non-trivially costly relative to a
/// comparison, which is why everything stateful is routed through
/// [`DeviceState`](state::DeviceState) rather than called here directly.
///
/// The only fallible operation is program construction; every other command
/// is fire-and-forget, matching the degradation policy of the pipeline
/// (broken resources degrade their own draws, never the frame).
pub trait Device {
    // Fixed-function pipeline state.
    fn enable(&mut self, cap: Capability);
    fn disable(&mut self, cap: Capability);
    fn blend_func(
        &mut self,
        src: BlendFactor,
        dst: BlendFactor,
        src_alpha: Option<BlendFactor>,
        dst_alpha: Option<BlendFactor>,
    );
    fn blend_equation(&mut self, rgb: BlendOp, alpha: Option<BlendOp>);
    fn cull_face(&mut self, face: CullFace);
    fn front_face(&mut self, winding: Winding);
    fn depth_mask(&mut self, write: bool);
    fn depth_func(&mut self, func: DepthFunc);
    fn clear_color(&mut self, rgba: [f32; 4]);
    fn viewport(&mut self, width: u32, height: u32);
    fn clear(&mut self, color: bool, depth: bool, stencil: bool);

    // Data buffers.
    fn create_buffer(&mut self) -> BufferId;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>);
    /// Upload `bytes` to the buffer currently bound to `target`.
    fn buffer_data(&mut self, target: BufferTarget, bytes: &[u8]);
    fn delete_buffer(&mut self, buffer: BufferId);

    // Shader programs.
    fn create_program(&mut self, vertex: &str, fragment: &str)
    -> Result<ProgramHandle, ProgramError>;
    fn use_program(&mut self, program: ProgramHandle);
    fn delete_program(&mut self, program: ProgramHandle);
    /// Reflection over the active uniforms of a linked program.
    fn active_uniforms(&mut self, program: ProgramHandle) -> Vec<UniformReflection>;
    /// Reflection over the active attributes of a linked program.
    fn active_attributes(&mut self, program: ProgramHandle) -> Vec<AttributeReflection>;
    fn set_uniform(&mut self, location: UniformLocation, kind: VarKind, data: &UniformData);

    // Vertex layouts.
    fn create_layout(&mut self) -> LayoutId;
    fn bind_layout(&mut self, layout: Option<LayoutId>);
    fn delete_layout(&mut self, layout: LayoutId);
    /// Describe the attribute at `slot` against the currently bound array
    /// buffer. `stride` and `offset` are in bytes.
    fn attribute_pointer(
        &mut self,
        slot: u32,
        components: usize,
        data_type: DataType,
        normalized: bool,
        stride: usize,
        offset: usize,
    );
    fn enable_attribute(&mut self, slot: u32);
    fn attribute_divisor(&mut self, slot: u32, divisor: u32);

    // Draws.
    fn draw_arrays(&mut self, mode: DrawMode, first: usize, count: usize);
    fn draw_elements(&mut self, mode: DrawMode, count: usize, index_type: DataType, offset: usize);
    fn draw_arrays_instanced(&mut self, mode: DrawMode, first: usize, count: usize, instances: usize);
    fn draw_elements_instanced(
        &mut self,
        mode: DrawMode,
        count: usize,
        index_type: DataType,
        offset: usize,
        instances: usize,
    );

    // Textures.
    fn create_texture(&mut self) -> RawTextureId;
    fn active_texture(&mut self, unit: u32);
    /// Bind `texture` to the currently active texture unit.
    fn bind_texture(&mut self, texture: RawTextureId);
    fn texture_filter(&mut self, min: TextureFilter, mag: TextureFilter);
    fn texture_wrap(&mut self, s: TextureWrap, t: TextureWrap);
    /// Upload image data to the currently bound texture. `None` allocates
    /// uninitialised storage (render-target attachments).
    fn texture_image(&mut self, width: u32, height: u32, pixels: Option<&[u8]>);
    fn generate_mipmaps(&mut self);
    fn delete_texture(&mut self, texture: RawTextureId);

    // Render targets.
    fn create_render_target(
        &mut self,
        color: RawTextureId,
        width: u32,
        height: u32,
        depth: bool,
    ) -> TargetId;
    /// `None` binds the default framebuffer.
    fn bind_framebuffer(&mut self, target: Option<TargetId>);
    fn delete_render_target(&mut self, target: TargetId);
}
