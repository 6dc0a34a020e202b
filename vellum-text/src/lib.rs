//! # vellum-text
//!
//! Text layout for a GPU renderer: shaped runs are cached, glyph bitmaps
//! live in paged texture atlases, and everything is invalidated wholesale
//! when fonts or the display scale change.
//!
//! ## Architecture
//!
//! ```text
//! TextLayoutEngine::layout(text, style)
//!     │
//!     ├── LayoutCache (LRU, entry + byte budget) ──hit──► Arc<LayoutResult>
//!     │
//!     ▼ miss
//! Shaper::shape ──► [ShapedGlyph]
//!     │
//!     ▼
//! GlyphManager ──┬── glyph Atlas (A8)     ◄── Rasterizer::rasterize
//!                └── emoji Atlas (RGBA8)
//!     │
//!     ▼
//! LayoutResult { glyphs, advance, atlas generations } ──► GlyphInstance[]
//! ```
//!
//! - **`engine`**: lifecycle, cache-first layout, tick maintenance, task queue.
//! - **`cache`**: layout fingerprints and the LRU layout cache.
//! - **`manager`**: glyph/emoji atlas routing, clear-and-retry, GPU instances.
//! - **`atlas`**: shelf-packed paged atlas with generation counters.
//! - **`cosmic`**: the `cosmic-text` shaping and rasterization backend.
//! - **`diagnostics`**: atomically published counters and the debug dump.

pub mod atlas;
pub mod backend;
pub mod cache;
pub mod config;
pub mod cosmic;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod glyph;
pub mod manager;

// Re-exports for ergonomic use.
pub use atlas::{Atlas, AtlasKind, AtlasSlot};
pub use backend::{Rasterizer, ShapedGlyph, Shaper};
pub use cache::{CacheStats, LayoutCache, LayoutFingerprint, LayoutResult, PositionedGlyph};
pub use config::{AtlasConfig, CacheConfig, EngineConfig};
pub use cosmic::CosmicBackend;
pub use diagnostics::{binary_compact, EngineStats, StatsSnapshot};
pub use engine::{EngineHandle, EngineState, EngineTask, TextDirection, TextLayoutEngine, TextStyle};
pub use error::{AtlasError, ConfigError, EngineError, HandleError, RasterError, ShapeError};
pub use glyph::{FontId, GlyphBitmap, GlyphKey, PixelFormat, RenderStyle};
pub use manager::{AtlasGenerations, AtlasMemory, GlyphInstance, GlyphManager};
