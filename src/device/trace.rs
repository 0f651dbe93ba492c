//! A recording device backend.
//!
//! [`TraceDevice`] executes nothing: every command is appended to an
//! in-memory command stream. That stream is the observable output the test
//! suite asserts against: issuing the same state twice must show up as one
//! recorded command, a frame must end with the expected draw sequence, and
//! so on. It also serves as a headless backend for hosts that want to run
//! the pipeline without a GPU attached.
//!
//! Program reflection is seeded: because no shading language is compiled
//! here, callers queue the uniform/attribute interface a program should
//! report before creating it, the same information a real backend would get
//! from its reflection API after linking.

use std::collections::{HashMap, VecDeque};

use crate::device::{
    AttributeReflection, BlendFactor, BlendOp, BufferId, BufferTarget, Capability, CullFace,
    DataType, DepthFunc, Device, DrawMode, LayoutId, ProgramHandle, RawTextureId, TargetId,
    TextureFilter, TextureWrap, UniformData, UniformLocation, UniformReflection, VarKind, Winding,
};
use crate::error::ProgramError;

/// One recorded device command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Enable(Capability),
    Disable(Capability),
    BlendFunc(BlendFactor, BlendFactor, Option<BlendFactor>, Option<BlendFactor>),
    BlendEquation(BlendOp, Option<BlendOp>),
    CullFace(CullFace),
    FrontFace(Winding),
    DepthMask(bool),
    DepthFunc(DepthFunc),
    ClearColor([f32; 4]),
    Viewport(u32, u32),
    Clear { color: bool, depth: bool, stencil: bool },
    CreateBuffer(BufferId),
    BindBuffer(BufferTarget, Option<BufferId>),
    BufferData(BufferTarget, usize),
    DeleteBuffer(BufferId),
    CreateProgram(ProgramHandle),
    UseProgram(ProgramHandle),
    DeleteProgram(ProgramHandle),
    SetUniform(UniformLocation, VarKind, UniformData),
    CreateLayout(LayoutId),
    BindLayout(Option<LayoutId>),
    DeleteLayout(LayoutId),
    AttributePointer {
        slot: u32,
        components: usize,
        data_type: DataType,
        normalized: bool,
        stride: usize,
        offset: usize,
    },
    EnableAttribute(u32),
    AttributeDivisor(u32, u32),
    DrawArrays(DrawMode, usize, usize),
    DrawElements(DrawMode, usize, DataType, usize),
    DrawArraysInstanced(DrawMode, usize, usize, usize),
    DrawElementsInstanced(DrawMode, usize, DataType, usize, usize),
    CreateTexture(RawTextureId),
    ActiveTexture(u32),
    BindTexture(RawTextureId),
    TextureFilter(TextureFilter, TextureFilter),
    TextureWrap(TextureWrap, TextureWrap),
    TextureImage(u32, u32, bool),
    GenerateMipmaps,
    DeleteTexture(RawTextureId),
    CreateRenderTarget(TargetId),
    BindFramebuffer(Option<TargetId>),
    DeleteRenderTarget(TargetId),
}

impl Command {
    /// True for draw-call commands, handy when a test only cares about the
    /// submitted draws.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Command::DrawArrays(..)
                | Command::DrawElements(..)
                | Command::DrawArraysInstanced(..)
                | Command::DrawElementsInstanced(..)
        )
    }
}

/// The uniform/attribute interface a [`TraceDevice`] program reports.
/// Attributes take consecutive slots in declaration order, counting one
/// slot per matrix column.
#[derive(Debug, Clone, Default)]
pub struct ProgramReflection {
    pub uniforms: Vec<(String, VarKind)>,
    pub attributes: Vec<(String, VarKind)>,
}

impl ProgramReflection {
    pub fn new(
        uniforms: Vec<(&str, VarKind)>,
        attributes: Vec<(&str, VarKind)>,
    ) -> Self {
        Self {
            uniforms: uniforms
                .into_iter()
                .map(|(name, kind)| (name.to_string(), kind))
                .collect(),
            attributes: attributes
                .into_iter()
                .map(|(name, kind)| (name.to_string(), kind))
                .collect(),
        }
    }
}

/// A [`Device`] that records its command stream instead of executing it.
#[derive(Debug, Default)]
pub struct TraceDevice {
    commands: Vec<Command>,
    next_id: u64,
    pending_reflections: VecDeque<ProgramReflection>,
    linked: HashMap<ProgramHandle, (Vec<UniformReflection>, Vec<AttributeReflection>)>,
    fail_next_link: Option<ProgramError>,
}

impl TraceDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the reflection the next created program will report. Queued
    /// reflections are consumed in creation order; a program created with
    /// none queued reports an empty interface.
    pub fn queue_reflection(&mut self, reflection: ProgramReflection) {
        self.pending_reflections.push_back(reflection);
    }

    /// Make the next program creation fail with `error`.
    pub fn fail_next_link(&mut self, error: ProgramError) {
        self.fail_next_link = Some(error);
    }

    /// The commands recorded so far.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drain the recorded commands, leaving the stream empty.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Count recorded commands matching a predicate.
    pub fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }

    fn fresh_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Device for TraceDevice {
    fn enable(&mut self, cap: Capability) {
        self.commands.push(Command::Enable(cap));
    }

    fn disable(&mut self, cap: Capability) {
        self.commands.push(Command::Disable(cap));
    }

    fn blend_func(
        &mut self,
        src: BlendFactor,
        dst: BlendFactor,
        src_alpha: Option<BlendFactor>,
        dst_alpha: Option<BlendFactor>,
    ) {
        self.commands.push(Command::BlendFunc(src, dst, src_alpha, dst_alpha));
    }

    fn blend_equation(&mut self, rgb: BlendOp, alpha: Option<BlendOp>) {
        self.commands.push(Command::BlendEquation(rgb, alpha));
    }

    fn cull_face(&mut self, face: CullFace) {
        self.commands.push(Command::CullFace(face));
    }

    fn front_face(&mut self, winding: Winding) {
        self.commands.push(Command::FrontFace(winding));
    }

    fn depth_mask(&mut self, write: bool) {
        self.commands.push(Command::DepthMask(write));
    }

    fn depth_func(&mut self, func: DepthFunc) {
        self.commands.push(Command::DepthFunc(func));
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.commands.push(Command::ClearColor(rgba));
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.commands.push(Command::Viewport(width, height));
    }

    fn clear(&mut self, color: bool, depth: bool, stencil: bool) {
        self.commands.push(Command::Clear { color, depth, stencil });
    }

    fn create_buffer(&mut self) -> BufferId {
        let id = BufferId(self.fresh_id());
        self.commands.push(Command::CreateBuffer(id));
        id
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        self.commands.push(Command::BindBuffer(target, buffer));
    }

    fn buffer_data(&mut self, target: BufferTarget, bytes: &[u8]) {
        self.commands.push(Command::BufferData(target, bytes.len()));
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.commands.push(Command::DeleteBuffer(buffer));
    }

    fn create_program(
        &mut self,
        _vertex: &str,
        _fragment: &str,
    ) -> Result<ProgramHandle, ProgramError> {
        if let Some(error) = self.fail_next_link.take() {
            return Err(error);
        }
        let handle = ProgramHandle(self.fresh_id());
        let reflection = self.pending_reflections.pop_front().unwrap_or_default();

        let mut uniforms = Vec::with_capacity(reflection.uniforms.len());
        for (name, kind) in reflection.uniforms {
            let location = UniformLocation(self.fresh_id());
            uniforms.push(UniformReflection { name, kind, location });
        }

        let mut attributes = Vec::with_capacity(reflection.attributes.len());
        let mut slot = 0u32;
        for (name, kind) in reflection.attributes {
            attributes.push(AttributeReflection { name, kind, location: slot });
            slot += kind.column_count() as u32;
        }

        self.linked.insert(handle, (uniforms, attributes));
        self.commands.push(Command::CreateProgram(handle));
        Ok(handle)
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.commands.push(Command::UseProgram(program));
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.linked.remove(&program);
        self.commands.push(Command::DeleteProgram(program));
    }

    fn active_uniforms(&mut self, program: ProgramHandle) -> Vec<UniformReflection> {
        self.linked
            .get(&program)
            .map(|(uniforms, _)| uniforms.clone())
            .unwrap_or_default()
    }

    fn active_attributes(&mut self, program: ProgramHandle) -> Vec<AttributeReflection> {
        self.linked
            .get(&program)
            .map(|(_, attributes)| attributes.clone())
            .unwrap_or_default()
    }

    fn set_uniform(&mut self, location: UniformLocation, kind: VarKind, data: &UniformData) {
        self.commands.push(Command::SetUniform(location, kind, data.clone()));
    }

    fn create_layout(&mut self) -> LayoutId {
        let id = LayoutId(self.fresh_id());
        self.commands.push(Command::CreateLayout(id));
        id
    }

    fn bind_layout(&mut self, layout: Option<LayoutId>) {
        self.commands.push(Command::BindLayout(layout));
    }

    fn delete_layout(&mut self, layout: LayoutId) {
        self.commands.push(Command::DeleteLayout(layout));
    }

    fn attribute_pointer(
        &mut self,
        slot: u32,
        components: usize,
        data_type: DataType,
        normalized: bool,
        stride: usize,
        offset: usize,
    ) {
        self.commands.push(Command::AttributePointer {
            slot,
            components,
            data_type,
            normalized,
            stride,
            offset,
        });
    }

    fn enable_attribute(&mut self, slot: u32) {
        self.commands.push(Command::EnableAttribute(slot));
    }

    fn attribute_divisor(&mut self, slot: u32, divisor: u32) {
        self.commands.push(Command::AttributeDivisor(slot, divisor));
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: usize, count: usize) {
        self.commands.push(Command::DrawArrays(mode, first, count));
    }

    fn draw_elements(&mut self, mode: DrawMode, count: usize, index_type: DataType, offset: usize) {
        self.commands.push(Command::DrawElements(mode, count, index_type, offset));
    }

    fn draw_arrays_instanced(
        &mut self,
        mode: DrawMode,
        first: usize,
        count: usize,
        instances: usize,
    ) {
        self.commands.push(Command::DrawArraysInstanced(mode, first, count, instances));
    }

    fn draw_elements_instanced(
        &mut self,
        mode: DrawMode,
        count: usize,
        index_type: DataType,
        offset: usize,
        instances: usize,
    ) {
        self.commands.push(Command::DrawElementsInstanced(mode, count, index_type, offset, instances));
    }

    fn create_texture(&mut self) -> RawTextureId {
        let id = RawTextureId(self.fresh_id());
        self.commands.push(Command::CreateTexture(id));
        id
    }

    fn active_texture(&mut self, unit: u32) {
        self.commands.push(Command::ActiveTexture(unit));
    }

    fn bind_texture(&mut self, texture: RawTextureId) {
        self.commands.push(Command::BindTexture(texture));
    }

    fn texture_filter(&mut self, min: TextureFilter, mag: TextureFilter) {
        self.commands.push(Command::TextureFilter(min, mag));
    }

    fn texture_wrap(&mut self, s: TextureWrap, t: TextureWrap) {
        self.commands.push(Command::TextureWrap(s, t));
    }

    fn texture_image(&mut self, width: u32, height: u32, pixels: Option<&[u8]>) {
        self.commands.push(Command::TextureImage(width, height, pixels.is_some()));
    }

    fn generate_mipmaps(&mut self) {
        self.commands.push(Command::GenerateMipmaps);
    }

    fn delete_texture(&mut self, texture: RawTextureId) {
        self.commands.push(Command::DeleteTexture(texture));
    }

    fn create_render_target(
        &mut self,
        _color: RawTextureId,
        _width: u32,
        _height: u32,
        _depth: bool,
    ) -> TargetId {
        let id = TargetId(self.fresh_id());
        self.commands.push(Command::CreateRenderTarget(id));
        id
    }

    fn bind_framebuffer(&mut self, target: Option<TargetId>) {
        self.commands.push(Command::BindFramebuffer(target));
    }

    fn delete_render_target(&mut self, target: TargetId) {
        self.commands.push(Command::DeleteRenderTarget(target));
    }
}
