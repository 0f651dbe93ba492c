//! Application-side uniform values.
//!
//! Programs are handed a name → [`UniformValue`] map. At draw time each
//! active uniform reported by the compiled program resolves against this
//! map (including struct members and array elements by name decomposition)
//! and is flattened into the [`UniformData`] payload the state cache
//! compares and uploads. Texture-valued uniforms resolve to texture-unit
//! indices instead and are handled by the binding itself.

use std::collections::HashMap;

use cgmath::{Matrix2, Matrix3, Matrix4, Vector2, Vector3, Vector4};

use crate::device::UniformData;
use crate::resources::TextureKey;

/// A value supplied for one shader uniform.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2(Vector2<f32>),
    Vec3(Vector3<f32>),
    Vec4(Vector4<f32>),
    IntVec2([i32; 2]),
    IntVec3([i32; 3]),
    IntVec4([i32; 4]),
    Mat2(Matrix2<f32>),
    Mat3(Matrix3<f32>),
    Mat4(Matrix4<f32>),
    /// An already-flattened float array (e.g. an array of vec3s laid out
    /// end to end).
    FloatArray(Vec<f32>),
    IntArray(Vec<i32>),
    /// A texture sampler; the binding assigns it a texture unit per draw.
    Texture(TextureKey),
    /// An array of samplers, assigned consecutive texture units per draw.
    Textures(Vec<TextureKey>),
    /// A struct uniform; members resolve by field name.
    Struct(HashMap<String, UniformValue>),
    /// An array of structs; members resolve by index and field name.
    StructArray(Vec<HashMap<String, UniformValue>>),
}

impl UniformValue {
    /// Flatten into an uploadable payload. Returns `None` for textures and
    /// aggregates, which never upload directly.
    pub fn data(&self) -> Option<UniformData> {
        Some(match self {
            UniformValue::Float(v) => UniformData::Float(*v),
            UniformValue::Int(v) => UniformData::Int(*v),
            UniformValue::Bool(v) => UniformData::Int(*v as i32),
            UniformValue::Vec2(v) => UniformData::FloatVec(vec![v.x, v.y]),
            UniformValue::Vec3(v) => UniformData::FloatVec(vec![v.x, v.y, v.z]),
            UniformValue::Vec4(v) => UniformData::FloatVec(vec![v.x, v.y, v.z, v.w]),
            UniformValue::IntVec2(v) => UniformData::IntVec(v.to_vec()),
            UniformValue::IntVec3(v) => UniformData::IntVec(v.to_vec()),
            UniformValue::IntVec4(v) => UniformData::IntVec(v.to_vec()),
            UniformValue::Mat2(m) => {
                let columns: [[f32; 2]; 2] = (*m).into();
                UniformData::FloatVec(columns.concat())
            }
            UniformValue::Mat3(m) => {
                let columns: [[f32; 3]; 3] = (*m).into();
                UniformData::FloatVec(columns.concat())
            }
            UniformValue::Mat4(m) => {
                let columns: [[f32; 4]; 4] = (*m).into();
                UniformData::FloatVec(columns.concat())
            }
            UniformValue::FloatArray(v) => UniformData::FloatVec(v.clone()),
            UniformValue::IntArray(v) => UniformData::IntVec(v.clone()),
            UniformValue::Texture(_)
            | UniformValue::Textures(_)
            | UniformValue::Struct(_)
            | UniformValue::StructArray(_) => return None,
        })
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Bool(v)
    }
}

impl From<Vector2<f32>> for UniformValue {
    fn from(v: Vector2<f32>) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<Vector3<f32>> for UniformValue {
    fn from(v: Vector3<f32>) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vector4<f32>> for UniformValue {
    fn from(v: Vector4<f32>) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Matrix3<f32>> for UniformValue {
    fn from(m: Matrix3<f32>) -> Self {
        UniformValue::Mat3(m)
    }
}

impl From<Matrix4<f32>> for UniformValue {
    fn from(m: Matrix4<f32>) -> Self {
        UniformValue::Mat4(m)
    }
}

impl From<TextureKey> for UniformValue {
    fn from(texture: TextureKey) -> Self {
        UniformValue::Texture(texture)
    }
}
