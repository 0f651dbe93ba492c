//! Geometry: attribute buffers, vertex layouts and draw submission.
//!
//! A [`Geometry`] owns its attribute buffers and an optional index buffer,
//! and caches one device vertex-layout object per attribute-order signature
//! it has been drawn with, so any number of programs sharing an attribute
//! order share a single layout. Draw counts are derived: from the index
//! buffer when present, otherwise from the largest attribute; instance
//! counts come from attributes with a divisor.

use std::collections::HashMap;

use cgmath::{MetricSpace, Vector3};

use crate::device::state::DeviceState;
use crate::device::{BufferId, BufferTarget, DataType, Device, DrawMode, LayoutId};
use crate::resources::program::Program;

/// Typed attribute data. The element type of the buffer is inferred from
/// the variant unless overridden on the [`Attribute`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    F32(Vec<f32>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl AttributeData {
    pub fn data_type(&self) -> DataType {
        match self {
            AttributeData::F32(_) => DataType::F32,
            AttributeData::U8(_) => DataType::U8,
            AttributeData::U16(_) => DataType::U16,
            AttributeData::U32(_) => DataType::U32,
        }
    }

    /// Number of scalar elements.
    pub fn len(&self) -> usize {
        match self {
            AttributeData::F32(v) => v.len(),
            AttributeData::U8(v) => v.len(),
            AttributeData::U16(v) => v.len(),
            AttributeData::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_len(&self) -> usize {
        self.len() * self.data_type().byte_size()
    }

    /// The raw bytes uploaded to the device.
    pub fn bytes(&self) -> &[u8] {
        match self {
            AttributeData::F32(v) => bytemuck::cast_slice(v),
            AttributeData::U8(v) => v,
            AttributeData::U16(v) => bytemuck::cast_slice(v),
            AttributeData::U32(v) => bytemuck::cast_slice(v),
        }
    }
}

/// One vertex attribute: raw data plus its layout description.
#[derive(Debug, Clone)]
pub struct Attribute {
    data: AttributeData,
    /// Components per element (3 for a vec3 position, 16 for a mat4).
    pub size: usize,
    pub data_type: DataType,
    pub normalized: bool,
    /// Byte stride between elements; 0 means tightly packed.
    pub stride: usize,
    /// Byte offset of the first element.
    pub offset: usize,
    /// Instancing divisor; 0 advances per vertex, n advances every n
    /// instances.
    pub divisor: u32,
    count: usize,
    needs_update: bool,
    buffer: Option<BufferId>,
}

impl Attribute {
    /// An attribute with `size` components per element; the element type is
    /// inferred from the data variant.
    pub fn new(size: usize, data: AttributeData) -> Self {
        let data_type = data.data_type();
        let mut attribute = Self {
            data,
            size,
            data_type,
            normalized: false,
            stride: 0,
            offset: 0,
            divisor: 0,
            count: 0,
            needs_update: true,
            buffer: None,
        };
        attribute.count = attribute.derive_count();
        attribute
    }

    /// Convenience constructor for float data.
    pub fn f32(size: usize, data: Vec<f32>) -> Self {
        Self::new(size, AttributeData::F32(data))
    }

    /// Mark the attribute instanced, advancing once per `divisor` instances.
    pub fn instanced(mut self, divisor: u32) -> Self {
        self.divisor = divisor;
        self
    }

    /// Use an explicit stride/offset layout (both in bytes).
    pub fn with_layout(mut self, stride: usize, offset: usize) -> Self {
        self.stride = stride;
        self.offset = offset;
        self.count = self.derive_count();
        self
    }

    pub fn data(&self) -> &AttributeData {
        &self.data
    }

    /// Replace the data and flag the buffer for re-upload on the next draw.
    pub fn set_data(&mut self, data: AttributeData) {
        self.data_type = data.data_type();
        self.data = data;
        self.count = self.derive_count();
        self.needs_update = true;
    }

    /// Flag the buffer for re-upload (the data was mutated in place).
    pub fn mark_dirty(&mut self) {
        self.needs_update = true;
    }

    /// Derived element count.
    pub fn count(&self) -> usize {
        self.count
    }

    fn derive_count(&self) -> usize {
        if self.stride != 0 {
            self.data.byte_len() / self.stride
        } else {
            self.data.len() / self.size.max(1)
        }
    }

    fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }
}

/// Axis-aligned bounds plus a bounding sphere. The radius is infinite until
/// [`Geometry::compute_bounding_sphere`] runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
    pub center: Vector3<f32>,
    pub scale: Vector3<f32>,
    pub radius: f32,
}

/// Attribute buffers plus the cached per-layout device objects.
pub struct Geometry {
    id: u64,
    attributes: HashMap<String, Attribute>,
    index: Option<Attribute>,
    layouts: HashMap<String, LayoutId>,
    draw_start: usize,
    draw_count: usize,
    instance_count: usize,
    is_instanced: bool,
    bounds: Option<Bounds>,
    bounds_warned: bool,
}

/// Name of the attribute bounding volumes are computed from.
pub const POSITION_ATTRIBUTE: &str = "position";

/// Reserved attribute name routed to the index buffer.
const INDEX_ATTRIBUTE: &str = "index";

impl Geometry {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            attributes: HashMap::new(),
            index: None,
            layouts: HashMap::new(),
            draw_start: 0,
            draw_count: 0,
            instance_count: 0,
            is_instanced: false,
            bounds: None,
            bounds_warned: false,
        }
    }

    /// Identity used for state-cache keys; assigned by the renderer.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Register (or replace) an attribute, upload its buffer and refresh the
    /// derived counts. The name `"index"` routes to the index buffer.
    pub fn add_attribute<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        state: &mut DeviceState,
        name: &str,
        mut attribute: Attribute,
    ) {
        // New buffers must not be captured by whatever layout is bound.
        state.clear_layout(device);

        if name == INDEX_ATTRIBUTE {
            Self::upload(device, state, BufferTarget::ElementArray, &mut attribute);
            self.draw_count = attribute.count();
            self.index = Some(attribute);
            return;
        }

        Self::upload(device, state, BufferTarget::Array, &mut attribute);

        if attribute.divisor > 0 {
            self.is_instanced = true;
            let count = attribute.count() * attribute.divisor as usize;
            if self.instance_count != 0 && self.instance_count != count {
                log::warn!(
                    "geometry has instanced attributes of different lengths ({} vs {}); \
                     using the smaller",
                    self.instance_count,
                    count
                );
                self.instance_count = self.instance_count.min(count);
            } else {
                self.instance_count = count;
            }
        } else if self.index.is_none() {
            self.draw_count = self.draw_count.max(attribute.count());
        }

        self.attributes.insert(name.to_string(), attribute);
    }

    /// Register the index buffer.
    pub fn set_index<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        state: &mut DeviceState,
        attribute: Attribute,
    ) {
        self.add_attribute(device, state, INDEX_ATTRIBUTE, attribute);
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attributes.get_mut(name)
    }

    pub fn index(&self) -> Option<&Attribute> {
        self.index.as_ref()
    }

    /// Restrict draws to `count` elements starting at `start`.
    pub fn set_draw_range(&mut self, start: usize, count: usize) {
        self.draw_start = start;
        self.draw_count = count;
    }

    /// Override the derived instance count.
    pub fn set_instance_count(&mut self, count: usize) {
        self.instance_count = count;
    }

    pub fn draw_count(&self) -> usize {
        self.draw_count
    }

    pub fn instance_count(&self) -> usize {
        self.instance_count
    }

    fn upload<D: Device + ?Sized>(
        device: &mut D,
        state: &mut DeviceState,
        target: BufferTarget,
        attribute: &mut Attribute,
    ) {
        let buffer = match attribute.buffer {
            Some(buffer) => buffer,
            None => {
                let buffer = device.create_buffer();
                attribute.buffer = Some(buffer);
                buffer
            }
        };
        state.bind_buffer(device, target, Some(buffer));
        device.buffer_data(target, attribute.data.bytes());
        attribute.needs_update = false;
    }

    /// Bind the vertex-layout object matching `program`'s attribute order,
    /// building it on first use. Within the build, one buffer bind plus one
    /// layout description is issued per attribute slot; matrix attributes
    /// expand into one slot per column. A missing attribute is reported and
    /// its slots stay unbound.
    fn bind_layout_for<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        state: &mut DeviceState,
        program: &Program,
    ) {
        let signature = program.attribute_signature();
        if state.layout_is_current(self.id, signature) {
            return;
        }
        if let Some(&layout) = self.layouts.get(signature) {
            state.bind_layout(device, layout, self.id, signature);
            return;
        }
        let layout = device.create_layout();
        self.layouts.insert(signature.to_string(), layout);
        state.bind_layout(device, layout, self.id, signature);

        for reflected in program.attributes() {
            let Some(attribute) = self.attributes.get(&reflected.name) else {
                log::warn!(
                    "geometry is missing attribute \"{}\" required by its program",
                    reflected.name
                );
                continue;
            };
            let Some(buffer) = attribute.buffer() else {
                continue;
            };
            state.bind_buffer(device, BufferTarget::Array, Some(buffer));

            let columns = reflected.kind.column_count();
            let components = attribute.size / columns;
            let column_bytes = components * attribute.data_type.byte_size();
            let matrix_stride = if columns == 1 { 0 } else { columns * column_bytes };
            for column in 0..columns {
                let slot = reflected.location + column as u32;
                device.attribute_pointer(
                    slot,
                    components,
                    attribute.data_type,
                    attribute.normalized,
                    attribute.stride + matrix_stride,
                    attribute.offset + column * column_bytes,
                );
                device.enable_attribute(slot);
                device.attribute_divisor(slot, attribute.divisor);
            }
        }

        if let Some(index) = &self.index {
            if let Some(buffer) = index.buffer() {
                state.bind_buffer(device, BufferTarget::ElementArray, Some(buffer));
            }
        }
    }

    /// Issue the draw for this geometry under `program`: switch layouts only
    /// when the active one differs, re-upload dirty attributes the program
    /// consumes, then submit the indexed/instanced draw variant the
    /// geometry's state calls for.
    pub fn draw<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        state: &mut DeviceState,
        program: &Program,
        mode: DrawMode,
    ) {
        self.bind_layout_for(device, state, program);

        for reflected in program.attributes() {
            if let Some(attribute) = self.attributes.get_mut(&reflected.name) {
                if attribute.needs_update {
                    Self::upload(device, state, BufferTarget::Array, attribute);
                }
            }
        }
        if let Some(index) = &mut self.index {
            if index.needs_update {
                Self::upload(device, state, BufferTarget::ElementArray, index);
            }
        }

        match (&self.index, self.is_instanced) {
            (Some(index), false) => {
                let offset = index.offset + self.draw_start * index.data_type.byte_size();
                device.draw_elements(mode, self.draw_count, index.data_type, offset);
            }
            (None, false) => {
                device.draw_arrays(mode, self.draw_start, self.draw_count);
            }
            (Some(index), true) if self.instance_count > 0 => {
                let offset = index.offset + self.draw_start * index.data_type.byte_size();
                device.draw_elements_instanced(
                    mode,
                    self.draw_count,
                    index.data_type,
                    offset,
                    self.instance_count,
                );
            }
            (None, true) if self.instance_count > 0 => {
                device.draw_arrays_instanced(
                    mode,
                    self.draw_start,
                    self.draw_count,
                    self.instance_count,
                );
            }
            // Instanced geometry with zero instances draws nothing.
            _ => {}
        }
    }

    /// The current bounds, if they have been computed.
    pub fn bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    fn position_elements(&mut self) -> Option<Vec<Vector3<f32>>> {
        let Some(attribute) = self.attributes.get(POSITION_ATTRIBUTE) else {
            if !self.bounds_warned {
                log::warn!("no position data to compute bounds from");
                self.bounds_warned = true;
            }
            return None;
        };
        let AttributeData::F32(data) = attribute.data() else {
            if !self.bounds_warned {
                log::warn!("position data must be float to compute bounds");
                self.bounds_warned = true;
            }
            return None;
        };
        let float_size = DataType::F32.byte_size();
        let stride_floats = if attribute.stride != 0 {
            attribute.stride / float_size
        } else {
            attribute.size
        };
        let offset_floats = attribute.offset / float_size;
        let mut points = Vec::with_capacity(attribute.count());
        for element in 0..attribute.count() {
            let base = offset_floats + element * stride_floats;
            if base + 3 > data.len() {
                break;
            }
            points.push(Vector3::new(data[base], data[base + 1], data[base + 2]));
        }
        Some(points)
    }

    /// Scan the position attribute and cache min/max/center extents. The
    /// sphere radius stays infinite until
    /// [`compute_bounding_sphere`](Self::compute_bounding_sphere) runs.
    /// Recomputation is always explicit; nothing in the pipeline refreshes
    /// stale bounds behind the caller's back.
    pub fn compute_bounding_box(&mut self) {
        let Some(points) = self.position_elements() else {
            return;
        };
        let mut min = Vector3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY);
        let mut max = -min;
        for p in &points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }
        self.bounds = Some(Bounds {
            min,
            max,
            center: (min + max) / 2.0,
            scale: max - min,
            radius: f32::INFINITY,
        });
    }

    /// Compute the bounding sphere around the box center. Computes the box
    /// first when absent.
    pub fn compute_bounding_sphere(&mut self) {
        if self.bounds.is_none() {
            self.compute_bounding_box();
        }
        let Some(points) = self.position_elements() else {
            return;
        };
        let Some(bounds) = &mut self.bounds else {
            return;
        };
        let mut max_radius_sq = 0.0f32;
        for p in points {
            max_radius_sq = max_radius_sq.max(bounds.center.distance2(p));
        }
        bounds.radius = max_radius_sq.sqrt();
    }

    /// Release every owned buffer and cached layout object.
    pub(crate) fn destroy<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        state: &mut DeviceState,
    ) {
        for (_, layout) in self.layouts.drain() {
            device.delete_layout(layout);
        }
        state.forget_geometry(self.id);
        for (_, attribute) in self.attributes.drain() {
            if let Some(buffer) = attribute.buffer {
                state.forget_buffer(buffer);
                device.delete_buffer(buffer);
            }
        }
        if let Some(index) = self.index.take() {
            if let Some(buffer) = index.buffer {
                state.forget_buffer(buffer);
                device.delete_buffer(buffer);
            }
        }
    }
}
