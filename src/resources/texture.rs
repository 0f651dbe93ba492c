//! Textures and render targets.
//!
//! Both are thin wrappers over their device objects; what matters here is
//! the state-cache contract. A texture uploads itself to an assigned unit
//! on demand, skipping the bind when the unit already holds it and
//! re-sending only the sampler parameters that changed since its last
//! upload. Render targets are bound by the renderer through the framebuffer
//! mirror.

use crate::device::state::DeviceState;
use crate::device::{Device, RawTextureId, TargetId, TextureFilter, TextureWrap};
use crate::resources::TextureKey;

/// Sampler parameters last sent to the device for one texture.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AppliedParams {
    min_filter: TextureFilter,
    mag_filter: TextureFilter,
    wrap_s: TextureWrap,
    wrap_t: TextureWrap,
}

/// A 2D texture with optional image data.
pub struct Texture2D {
    id: u64,
    raw: RawTextureId,
    image: Option<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
    pub generate_mipmaps: bool,
    needs_update: bool,
    // Fresh device textures report these parameter defaults.
    applied: AppliedParams,
}

impl Texture2D {
    pub(crate) fn new(id: u64, raw: RawTextureId) -> Self {
        Self {
            id,
            raw,
            image: None,
            width: 0,
            height: 0,
            min_filter: TextureFilter::NearestMipmapLinear,
            mag_filter: TextureFilter::Linear,
            wrap_s: TextureWrap::ClampToEdge,
            wrap_t: TextureWrap::ClampToEdge,
            generate_mipmaps: true,
            needs_update: true,
            applied: AppliedParams {
                min_filter: TextureFilter::NearestMipmapLinear,
                mag_filter: TextureFilter::Linear,
                wrap_s: TextureWrap::Repeat,
                wrap_t: TextureWrap::Repeat,
            },
        }
    }

    /// Identity used by the per-unit binding mirror.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Replace the image data; the texture re-uploads on its next use.
    pub fn set_image(&mut self, pixels: Vec<u8>, width: u32, height: u32) {
        self.image = Some(pixels);
        self.width = width;
        self.height = height;
        self.needs_update = true;
    }

    /// Flag the texture for re-upload (image or parameters were mutated).
    pub fn mark_dirty(&mut self) {
        self.needs_update = true;
    }

    /// Make sure this texture is bound to `unit` and up to date. A clean
    /// texture already bound to the unit costs nothing; a dirty one
    /// re-sends only what changed plus its image data.
    pub(crate) fn upload<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        state: &mut DeviceState,
        unit: u32,
    ) {
        if !self.needs_update && state.texture_bound(unit) == Some(self.id) {
            return;
        }
        state.bind_texture(device, unit, self.id, self.raw);
        if !self.needs_update {
            return;
        }
        self.needs_update = false;

        let requested = AppliedParams {
            min_filter: self.min_filter,
            mag_filter: self.mag_filter,
            wrap_s: self.wrap_s,
            wrap_t: self.wrap_t,
        };
        if (requested.min_filter, requested.mag_filter)
            != (self.applied.min_filter, self.applied.mag_filter)
        {
            device.texture_filter(requested.min_filter, requested.mag_filter);
        }
        if (requested.wrap_s, requested.wrap_t) != (self.applied.wrap_s, self.applied.wrap_t) {
            device.texture_wrap(requested.wrap_s, requested.wrap_t);
        }
        self.applied = requested;

        device.texture_image(self.width, self.height, self.image.as_deref());
        if self.generate_mipmaps && self.image.is_some() {
            device.generate_mipmaps();
        }
    }

    pub(crate) fn destroy<D: Device + ?Sized>(&mut self, device: &mut D, state: &mut DeviceState) {
        state.forget_texture(self.id);
        device.delete_texture(self.raw);
    }
}

/// An offscreen render target: a framebuffer with a color texture and an
/// optional depth attachment.
pub struct RenderTarget {
    target: TargetId,
    pub width: u32,
    pub height: u32,
    pub depth: bool,
    color: TextureKey,
}

impl RenderTarget {
    pub(crate) fn new(
        target: TargetId,
        width: u32,
        height: u32,
        depth: bool,
        color: TextureKey,
    ) -> Self {
        Self {
            target,
            width,
            height,
            depth,
            color,
        }
    }

    pub(crate) fn target(&self) -> TargetId {
        self.target
    }

    /// The color texture the target renders into, usable as a sampler in a
    /// later pass.
    pub fn color(&self) -> TextureKey {
        self.color
    }
}
