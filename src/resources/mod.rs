//! Device-side resources: geometry, shader bindings, textures.
//!
//! Resources live in arenas owned by the renderer and are referenced by key
//! everywhere else: a mesh node borrows its geometry and program by key and
//! owns neither, so both can be shared across any number of nodes. Each
//! resource also carries a per-kind monotonic identity used for sort
//! tiebreaks and state-cache keys.
//!
//! - `geometry` owns attribute buffers and the per-vertex-layout binding cache
//! - `program` resolves uniforms/attributes against a compiled program
//! - `texture` wraps device textures and render targets
//! - `uniform` holds the application-side uniform value model

pub mod geometry;
pub mod program;
pub mod texture;
pub mod uniform;

use slotmap::new_key_type;

new_key_type! {
    /// Key of a [`Geometry`](geometry::Geometry) in the renderer's arena.
    pub struct GeometryKey;
    /// Key of a [`Program`](program::Program) in the renderer's arena.
    pub struct ProgramKey;
    /// Key of a [`Texture2D`](texture::Texture2D) in the renderer's arena.
    pub struct TextureKey;
    /// Key of a [`RenderTarget`](texture::RenderTarget) in the renderer's arena.
    pub struct TargetKey;
}
