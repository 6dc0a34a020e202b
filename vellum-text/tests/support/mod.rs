//! Shared fixtures for integration tests.

use vellum_text::glyph::is_emoji;
use vellum_text::{
    FontId, GlyphBitmap, GlyphKey, PixelFormat, RasterError, Rasterizer, RenderStyle, ShapeError,
    ShapedGlyph, Shaper, TextStyle,
};

/// Deterministic backend: one glyph per non-whitespace char, glyph id =
/// code point, advance = 0.6 em. Emoji come out as RGBA bitmaps.
#[derive(Default)]
pub struct CountingBackend {
    pub shaped: usize,
    pub rasterized: usize,
}

impl Shaper for CountingBackend {
    fn shape(&mut self, text: &str, style: &TextStyle, scale: f32) -> Result<Vec<ShapedGlyph>, ShapeError> {
        self.shaped += 1;
        let px = style.pixel_size(scale);
        let advance = style.font_size * 0.6;
        Ok(text
            .chars()
            .enumerate()
            .filter(|(_, ch)| !ch.is_whitespace())
            .map(|(i, ch)| {
                let mut flags = style.render_style();
                if is_emoji(ch) {
                    flags |= RenderStyle::EMOJI;
                }
                ShapedGlyph {
                    key: GlyphKey::new(FontId(0), ch as u32 as u16, px, flags),
                    offset: [i as f32 * advance, 0.0],
                    advance,
                }
            })
            .collect())
    }
}

impl Rasterizer for CountingBackend {
    fn rasterize(&mut self, key: &GlyphKey) -> Result<GlyphBitmap, RasterError> {
        self.rasterized += 1;
        let h = u32::from(key.px_size);
        let (w, format) = if key.is_emoji() {
            (h, PixelFormat::Rgba8)
        } else {
            (h / 2, PixelFormat::A8)
        };
        Ok(GlyphBitmap {
            width: w,
            height: h,
            left: 0,
            top: h as i32,
            format,
            data: vec![255; (w * h) as usize * format.bytes_per_pixel()],
        })
    }
}

pub fn sized(font_size: f32) -> TextStyle {
    TextStyle {
        font_size,
        ..Default::default()
    }
}
