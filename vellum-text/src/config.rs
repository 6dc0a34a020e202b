//! Engine configuration.
//!
//! Every field has a default, so a partial TOML document (or none at all)
//! yields a working engine:
//!
//! ```toml
//! display_scale = 2.0
//! cache_lifespan_ticks = 200
//!
//! [cache]
//! max_entries = 1024
//!
//! [emoji_atlas]
//! max_pages = 1
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::glyph::PixelFormat;

/// Page budget for one atlas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// Page width = height in pixels. Default: 1024.
    pub page_size: u32,
    /// Maximum number of pages before the atlas reports full. Default: 4.
    pub max_pages: usize,
    /// Gutter between slots in pixels. Default: 1.
    pub padding: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            page_size: 1024,
            max_pages: 4,
            padding: 1,
        }
    }
}

impl AtlasConfig {
    /// Default page set for colour emoji.
    pub fn emoji() -> Self {
        Self {
            max_pages: 2,
            ..Self::default()
        }
    }

    /// Bytes held by one live page of the given format.
    pub fn page_bytes(&self, format: PixelFormat) -> usize {
        let edge = self.page_size as usize;
        edge * edge * format.bytes_per_pixel()
    }
}

/// Layout cache budgets. Whichever is hit first triggers eviction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default: 4096.
    pub max_entries: usize,
    /// Estimated bytes. Default: 8 MiB.
    pub max_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 4096,
            max_bytes: 8 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pixel density multiplier applied when rasterizing. Default: 1.0.
    pub display_scale: f32,
    /// Ticks between staleness sweeps. Default: 20.
    pub maintenance_interval_ticks: u64,
    /// Idle ticks after which a cached layout is dropped. Default: 120.
    pub cache_lifespan_ticks: u64,
    pub cache: CacheConfig,
    pub glyph_atlas: AtlasConfig,
    pub emoji_atlas: AtlasConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            display_scale: 1.0,
            maintenance_interval_ticks: 20,
            cache_lifespan_ticks: 120,
            cache: CacheConfig::default(),
            glyph_atlas: AtlasConfig::default(),
            emoji_atlas: AtlasConfig::emoji(),
        }
    }
}

impl EngineConfig {
    /// Config for testing (tiny pages, short lifespans).
    pub fn for_testing() -> Self {
        Self {
            display_scale: 1.0,
            maintenance_interval_ticks: 1,
            cache_lifespan_ticks: 4,
            cache: CacheConfig {
                max_entries: 16,
                max_bytes: 1024 * 1024,
            },
            glyph_atlas: AtlasConfig {
                page_size: 128,
                max_pages: 2,
                padding: 1,
            },
            emoji_atlas: AtlasConfig {
                page_size: 128,
                max_pages: 1,
                padding: 1,
            },
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.display_scale.is_finite() && self.display_scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "display_scale must be a positive number, got {}",
                self.display_scale
            )));
        }
        if self.maintenance_interval_ticks == 0 {
            return Err(ConfigError::Invalid(
                "maintenance_interval_ticks must be at least 1".into(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid("cache.max_entries must be at least 1".into()));
        }
        for (name, atlas) in [("glyph_atlas", &self.glyph_atlas), ("emoji_atlas", &self.emoji_atlas)] {
            if atlas.max_pages == 0 {
                return Err(ConfigError::Invalid(format!("{name}.max_pages must be at least 1")));
            }
            if atlas.page_size <= atlas.padding || atlas.page_size > 16384 {
                return Err(ConfigError::Invalid(format!(
                    "{name}.page_size must be in ({}, 16384], got {}",
                    atlas.padding, atlas.page_size
                )));
            }
        }
        Ok(())
    }
}
