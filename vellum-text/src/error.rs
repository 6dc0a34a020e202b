use std::path::PathBuf;

use thiserror::Error;

use crate::glyph::GlyphBitmap;

/// Atlas allocation failures.
#[derive(Error, Debug)]
pub enum AtlasError {
    /// Every page is in use. The bitmap is handed back so the caller can
    /// retry after a clear without rasterizing again.
    #[error("atlas full: all {pages} pages in use")]
    Full {
        pages: usize,
        bitmap: Box<GlyphBitmap>,
    },
    #[error("glyph {width}x{height} does not fit a {page_size}px page")]
    GlyphTooLarge {
        width: u32,
        height: u32,
        page_size: u32,
    },
}

#[derive(Error, Debug)]
pub enum ShapeError {
    #[error("no font available for family {0:?}")]
    NoFont(String),
    #[error("shaping failed: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("glyph {glyph_id} has no outline or image")]
    NoImage { glyph_id: u16 },
    #[error("unknown font for glyph {glyph_id}")]
    UnknownFont { glyph_id: u16 },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("text layout engine has been shut down")]
    ShutDown,
    #[error("font resources unavailable: {0}")]
    Fonts(#[from] ShapeError),
}

/// Posting a task to an engine that no longer exists.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum HandleError {
    #[error("engine task queue is closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}
