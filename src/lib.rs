//! glint
//!
//! A minimal retained-mode 3D rendering engine: a scene graph of
//! transformable nodes, cameras with frustum culling, and a render pipeline
//! that turns a scene into an ordered stream of draw calls against an
//! abstract stateful graphics device, while eliding every device command
//! that would not change device state.
//!
//! High-level modules
//! - `device`: the device command-sink trait, its state mirror and a
//!   recording backend for headless use
//! - `scene`: transform nodes, the arena-backed hierarchy and cameras
//! - `resources`: geometries, shader bindings, textures and render targets
//! - `renderer`: resource ownership and the per-frame pipeline
//!
//! The math types come from `cgmath` and are re-exported wholesale for
//! convenience in downstream code.

pub mod device;
pub mod error;
pub mod renderer;
pub mod resources;
pub mod scene;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;

pub use crate::device::state::DeviceState;
pub use crate::device::trace::{Command, ProgramReflection, TraceDevice};
pub use crate::device::{Device, DrawMode};
pub use crate::error::ProgramError;
pub use crate::renderer::{RenderOptions, Renderer, RendererDesc};
pub use crate::resources::geometry::{Attribute, AttributeData, Bounds, Geometry};
pub use crate::resources::program::{Program, ProgramDesc};
pub use crate::resources::texture::{RenderTarget, Texture2D};
pub use crate::resources::uniform::UniformValue;
pub use crate::resources::{GeometryKey, ProgramKey, TargetKey, TextureKey};
pub use crate::scene::{Camera, Drawable, Node, NodeKey, Plane, Projection, Scene, Transform};
