//! Collaborator seams: text shaping and glyph rasterization.
//!
//! The engine never shapes or rasterizes by itself. It hands text to a
//! [`Shaper`] and glyph keys to a [`Rasterizer`], and caches what comes back.
//! [`crate::cosmic::CosmicBackend`] implements both on `cosmic-text`.

use crate::engine::TextStyle;
use crate::error::{RasterError, ShapeError};
use crate::glyph::{GlyphBitmap, GlyphKey};

/// One positioned glyph of a shaped run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapedGlyph {
    pub key: GlyphKey,
    /// Pen position relative to the run origin, in logical pixels.
    pub offset: [f32; 2],
    pub advance: f32,
}

/// Turns text into an ordered glyph run.
///
/// Treated as a pure function of `(text, style, scale)`.
pub trait Shaper {
    /// Load font resources. Called once by `TextLayoutEngine::init`.
    fn prepare(&mut self) -> Result<(), ShapeError> {
        Ok(())
    }

    fn shape(
        &mut self,
        text: &str,
        style: &TextStyle,
        scale: f32,
    ) -> Result<Vec<ShapedGlyph>, ShapeError>;

    /// Drop per-glyph state kept for the rasterizer. Called on reload, after
    /// every cached layout and atlas slot is gone, so any key rasterized
    /// later has been shaped again first.
    fn release_caches(&mut self) {}
}

/// Renders the bitmap for one glyph key.
pub trait Rasterizer {
    fn rasterize(&mut self, key: &GlyphKey) -> Result<GlyphBitmap, RasterError>;
}
