//! Text layout engine: cache-first layout on top of a shaping backend.
//!
//! `layout()` fingerprints the request and consults the [`LayoutCache`].
//! On a miss the backend shapes the text, every glyph is resolved into the
//! atlases, and the assembled [`LayoutResult`] is cached and returned.
//!
//! ## Threading
//!
//! The engine is owned by the render thread. Other threads hold an
//! [`EngineHandle`], which can only *post* tasks (reload, tick, scale
//! change) and read the atomically published [`EngineStats`]. Posted tasks
//! run when the render thread calls [`TextLayoutEngine::process_tasks`],
//! so atlas and cache mutation stays single-writer without locks.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use log::{debug, info, warn};
use rustc_hash::FxHasher;

use crate::backend::{Rasterizer, ShapedGlyph, Shaper};
use crate::cache::{CacheStats, LayoutCache, LayoutFingerprint, LayoutResult, PositionedGlyph};
use crate::config::EngineConfig;
use crate::diagnostics::EngineStats;
use crate::error::{ConfigError, EngineError, HandleError};
use crate::glyph::{is_emoji, GlyphKey, RenderStyle};
use crate::manager::{GlyphInstance, GlyphManager};

// ── Text direction ──────────────────────────────────────────────────

/// Base paragraph direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextDirection {
    LeftToRight,
    RightToLeft,
}

impl Default for TextDirection {
    fn default() -> Self {
        Self::LeftToRight
    }
}

/// Font and spacing parameters for one text run.
#[derive(Clone, Debug, PartialEq)]
pub struct TextStyle {
    /// CSS-style font family chain (e.g. `"Arial, Helvetica, sans-serif"`).
    pub family: String,
    /// Font size in logical pixels.
    pub font_size: f32,
    /// Font weight (100–900). 400 = normal, 700 = bold.
    pub weight: u16,
    pub italic: bool,
    /// Extra letter spacing in logical pixels (can be negative).
    pub letter_spacing: f32,
    pub direction: TextDirection,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            family: String::from("sans-serif"),
            font_size: 16.0,
            weight: 400,
            italic: false,
            letter_spacing: 0.0,
            direction: TextDirection::LeftToRight,
        }
    }
}

impl TextStyle {
    /// Family names of the fallback chain, unquoted and lowercased.
    pub fn families(&self) -> impl Iterator<Item = String> + '_ {
        self.family
            .split(',')
            .map(|s| s.trim().trim_matches('"').trim_matches('\'').to_lowercase())
            .filter(|s| !s.is_empty())
    }

    /// Rasterization size for the given display scale.
    pub fn pixel_size(&self, scale: f32) -> u16 {
        (self.font_size * scale).round().clamp(1.0, f32::from(u16::MAX)) as u16
    }

    pub fn render_style(&self) -> RenderStyle {
        let mut style = RenderStyle::empty();
        if self.weight >= 600 {
            style |= RenderStyle::BOLD;
        }
        if self.italic {
            style |= RenderStyle::ITALIC;
        }
        style
    }

    /// Hash of everything except the font set and direction.
    pub fn style_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.font_size.to_bits().hash(&mut hasher);
        self.weight.hash(&mut hasher);
        self.italic.hash(&mut hasher);
        self.letter_spacing.to_bits().hash(&mut hasher);
        hasher.finish()
    }

    pub fn font_set_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        for family in self.families() {
            family.hash(&mut hasher);
        }
        hasher.finish()
    }
}

// ── Lifecycle ───────────────────────────────────────────────────────

/// Engine lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Font resources not yet prepared.
    Uninitialized,
    Ready,
    /// Terminal. Atlas storage has been released.
    ShutDown,
}

/// Work another thread can ask the render thread to do.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EngineTask {
    Reload,
    EndTick,
    ScaleChanged { new_scale: f32, old_scale: f32 },
}

/// Cloneable, `Send` handle for threads that do not own the engine.
#[derive(Clone)]
pub struct EngineHandle {
    sender: Sender<EngineTask>,
    stats: Arc<EngineStats>,
}

impl EngineHandle {
    /// Queue a task for the render thread.
    pub fn post(&self, task: EngineTask) -> Result<(), HandleError> {
        if self.stats.is_shut_down() {
            return Err(HandleError::Closed);
        }
        self.sender.send(task).map_err(|_| HandleError::Closed)
    }

    pub fn request_reload(&self) -> Result<(), HandleError> {
        self.post(EngineTask::Reload)
    }

    pub fn request_end_tick(&self) -> Result<(), HandleError> {
        self.post(EngineTask::EndTick)
    }

    /// Window resize hook. The render thread reloads only if the scale
    /// actually changed.
    pub fn notify_scale_changed(&self, new_scale: f32, old_scale: f32) -> Result<(), HandleError> {
        self.post(EngineTask::ScaleChanged { new_scale, old_scale })
    }

    /// Advisory counters; may lag the render thread slightly.
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }
}

// ── Engine ──────────────────────────────────────────────────────────

/// Cache-first text layout engine.
pub struct TextLayoutEngine<B> {
    config: EngineConfig,
    backend: B,
    glyphs: GlyphManager,
    cache: LayoutCache,
    state: EngineState,
    /// Lazy init already failed; `layout` stops retrying until `reload`.
    init_failed: bool,
    /// Current display scale used for rasterization.
    scale: f32,
    /// End-of-tick counter; cache recency is measured in ticks.
    tick: u64,
    stats: Arc<EngineStats>,
    task_sender: Sender<EngineTask>,
    tasks: Receiver<EngineTask>,
}

impl<B: Shaper + Rasterizer> TextLayoutEngine<B> {
    /// Create an engine. No font work happens until [`init`](Self::init) or
    /// the first [`layout`](Self::layout).
    ///
    /// Fails if `config` does not pass [`EngineConfig::validate`].
    pub fn new(config: EngineConfig, backend: B) -> Result<Self, ConfigError> {
        config.validate()?;
        let (task_sender, tasks) = mpsc::channel();
        Ok(Self {
            glyphs: GlyphManager::new(config.glyph_atlas.clone(), config.emoji_atlas.clone()),
            cache: LayoutCache::new(config.cache.clone()),
            scale: config.display_scale,
            config,
            backend,
            state: EngineState::Uninitialized,
            init_failed: false,
            tick: 0,
            stats: Arc::new(EngineStats::default()),
            task_sender,
            tasks,
        })
    }

    /// Prepare font resources and move to `Ready`.
    ///
    /// On failure the engine stays `Uninitialized`; layouts still work but
    /// degrade to placeholder glyphs.
    pub fn init(&mut self) -> Result<(), EngineError> {
        match self.state {
            EngineState::ShutDown => Err(EngineError::ShutDown),
            EngineState::Ready => Ok(()),
            EngineState::Uninitialized => {
                if let Err(e) = self.backend.prepare() {
                    self.init_failed = true;
                    return Err(e.into());
                }
                self.init_failed = false;
                self.state = EngineState::Ready;
                info!("Text layout engine ready (scale {})", self.scale);
                Ok(())
            }
        }
    }

    /// Release all caches and atlas storage. Terminal.
    pub fn shutdown(&mut self) {
        if self.state == EngineState::ShutDown {
            return;
        }
        self.cache.clear();
        self.glyphs.reload();
        let dropped = self.tasks.try_iter().count();
        self.state = EngineState::ShutDown;
        self.publish_stats();
        self.stats.mark_shut_down();
        info!("Text layout engine shut down ({dropped} pending tasks dropped)");
    }

    /// A handle for other threads.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            sender: self.task_sender.clone(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Lay out `text`, from cache when possible.
    ///
    /// Shaping and rasterization failures degrade to placeholder glyphs.
    /// The only error is calling this after [`shutdown`](Self::shutdown).
    pub fn layout(&mut self, text: &str, style: &TextStyle) -> Result<Arc<LayoutResult>, EngineError> {
        match self.state {
            EngineState::ShutDown => return Err(EngineError::ShutDown),
            EngineState::Uninitialized if !self.init_failed => {
                if let Err(e) = self.init() {
                    warn!("Text layout engine not ready, using placeholder glyphs until reload: {e}");
                }
            }
            EngineState::Uninitialized => {}
            EngineState::Ready => {}
        }

        let fingerprint = LayoutFingerprint::new(text, style);
        if let Some(hit) = self.cache.get(&fingerprint, self.glyphs.generations(), self.tick) {
            self.publish_stats();
            return Ok(hit);
        }

        let run = match self.backend.shape(text, style, self.scale) {
            Ok(run) => run,
            Err(e) => {
                warn!("Shaping {text:?} failed ({e}), using placeholder glyphs");
                placeholder_run(text, style, self.scale)
            }
        };

        let (layout, complete) = self.assemble(&run);
        let layout = Arc::new(layout);
        if complete {
            self.cache.put(fingerprint, Arc::clone(&layout), self.tick);
        } else {
            warn!(
                "{text:?} needs more glyphs than the atlas holds, {} not resident; layout not cached",
                layout.glyphs().iter().filter(|g| self.glyphs.lookup(&g.key).is_none()).count()
            );
        }
        self.publish_stats();
        Ok(layout)
    }

    /// Resolve every glyph of a shaped run and build the result.
    ///
    /// The flag is `false` when the run alone overflows its atlas, so some
    /// of its glyphs are not resident after the last pass.
    fn assemble(&mut self, run: &[ShapedGlyph]) -> (LayoutResult, bool) {
        let mut generations = self.glyphs.generations();
        // A full atlas is cleared mid-run, dropping glyphs resolved earlier
        // in this run. One more pass puts them back under the new generation.
        for _ in 0..2 {
            for glyph in run {
                self.glyphs.resolve(glyph.key, &mut self.backend);
            }
            let after = self.glyphs.generations();
            if after == generations {
                break;
            }
            debug!("Atlas cleared during layout, resolving {} glyphs again", run.len());
            generations = after;
        }

        let glyphs = run
            .iter()
            .map(|g| PositionedGlyph {
                key: g.key,
                offset: g.offset,
            })
            .collect();
        let advance = run.iter().map(|g| g.advance).sum();
        let complete = run.iter().all(|g| self.glyphs.lookup(&g.key).is_some());
        let layout = LayoutResult::new(glyphs, advance, self.glyphs.generations(), self.tick);
        (layout, complete)
    }

    /// Periodic maintenance; call once per host tick.
    ///
    /// Every `maintenance_interval_ticks`, layouts idle for longer than
    /// `cache_lifespan_ticks` are evicted.
    pub fn on_end_tick(&mut self) {
        if self.state == EngineState::ShutDown {
            return;
        }
        self.tick += 1;
        if self.tick % self.config.maintenance_interval_ticks != 0 {
            return;
        }
        let older_than = self.tick.saturating_sub(self.config.cache_lifespan_ticks);
        let evicted = self.cache.evict_stale(older_than);
        if evicted > 0 {
            debug!("Evicted {evicted} idle layouts, {} cached", self.cache.len());
        }
        self.publish_stats();
    }

    /// Drop every cached layout and clear both atlases.
    ///
    /// The next `layout()` of any text misses and re-rasterizes. A lazy
    /// init that failed earlier is attempted again.
    pub fn reload(&mut self) {
        if self.state == EngineState::ShutDown {
            return;
        }
        let dropped = self.cache.len();
        self.cache.clear();
        self.glyphs.reload();
        self.backend.release_caches();
        self.init_failed = false;
        self.publish_stats();
        info!("Text layout engine reloaded, {dropped} cached layouts dropped");
    }

    /// Window resize hook: reload when the display scale changed.
    pub fn on_scale_changed(&mut self, new_scale: f32, old_scale: f32) {
        if new_scale == old_scale {
            return;
        }
        if !(new_scale.is_finite() && new_scale > 0.0) {
            warn!("Ignoring invalid display scale {new_scale}");
            return;
        }
        info!("Display scale changed {old_scale} -> {new_scale}");
        self.scale = new_scale;
        self.reload();
    }

    /// Run tasks posted through [`EngineHandle`]s. Returns how many ran.
    pub fn process_tasks(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.tasks.try_recv() {
            ran += 1;
            match task {
                EngineTask::Reload => self.reload(),
                EngineTask::EndTick => self.on_end_tick(),
                EngineTask::ScaleChanged {
                    new_scale,
                    old_scale,
                } => self.on_scale_changed(new_scale, old_scale),
            }
        }
        ran
    }

    /// GPU instances for a layout, or `None` if it is stale and must be
    /// laid out again.
    pub fn glyph_instances(&self, layout: &LayoutResult, origin: [f32; 2]) -> Option<Vec<GlyphInstance>> {
        self.glyphs.build_instances(layout, origin, self.scale)
    }

    fn publish_stats(&self) {
        self.stats.publish(
            self.cache.len(),
            self.cache.memory_size(),
            self.glyphs.total_memory_usage(),
            self.glyphs.rasterized_total(),
        );
    }
}

impl<B> TextLayoutEngine<B> {
    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn glyph_manager(&self) -> &GlyphManager {
        &self.glyphs
    }

    /// Mutable access for atlas upload bookkeeping (`mark_clean`).
    pub fn glyph_manager_mut(&mut self) -> &mut GlyphManager {
        &mut self.glyphs
    }

    pub fn cache_count(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_memory_size(&self) -> usize {
        self.cache.memory_size()
    }

    pub fn glyph_atlas_memory_size(&self) -> usize {
        self.glyphs.total_memory_usage().glyph_bytes
    }

    pub fn emoji_atlas_memory_size(&self) -> usize {
        self.glyphs.total_memory_usage().emoji_bytes
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Full debug dump: the engine line followed by one line per atlas.
    pub fn dump_info(&self, out: &mut impl fmt::Write) -> fmt::Result {
        self.stats.dump(out)?;
        self.glyphs.dump_info(out)
    }
}

/// Stand-in run when the shaper fails: one placeholder per visible
/// character at half an em advance. Whitespace gets no glyph; its advance
/// is folded into the neighbouring glyph.
fn placeholder_run(text: &str, style: &TextStyle, scale: f32) -> Vec<ShapedGlyph> {
    let px_size = style.pixel_size(scale);
    let base = style.render_style();
    let advance = style.font_size * 0.5 + style.letter_spacing;

    let mut pen = 0.0;
    let mut leading = 0.0;
    let mut run: Vec<ShapedGlyph> = Vec::with_capacity(text.len());
    for ch in text.chars().filter(|c| !c.is_control()) {
        if ch.is_whitespace() {
            match run.last_mut() {
                Some(last) => last.advance += advance,
                None => leading += advance,
            }
        } else {
            let style = if is_emoji(ch) { base | RenderStyle::EMOJI } else { base };
            run.push(ShapedGlyph {
                key: GlyphKey::missing(ch, px_size, style),
                offset: [pen, 0.0],
                advance,
            });
        }
        pen += advance;
    }
    if let Some(first) = run.first_mut() {
        first.advance += leading;
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RasterError, ShapeError};
    use crate::glyph::{FontId, GlyphBitmap, PixelFormat};

    /// One glyph per char; glyph id = code point.
    #[derive(Default)]
    struct FakeBackend {
        fail_prepare: bool,
        fail_shape: bool,
        prepared: usize,
        released: usize,
        rasterized: usize,
    }

    impl Shaper for FakeBackend {
        fn prepare(&mut self) -> Result<(), ShapeError> {
            self.prepared += 1;
            if self.fail_prepare {
                return Err(ShapeError::NoFont("sans-serif".into()));
            }
            Ok(())
        }

        fn shape(&mut self, text: &str, style: &TextStyle, scale: f32) -> Result<Vec<ShapedGlyph>, ShapeError> {
            if self.fail_shape {
                return Err(ShapeError::Backend("broken font".into()));
            }
            let px = style.pixel_size(scale);
            let advance = style.font_size * 0.6;
            Ok(text
                .chars()
                .enumerate()
                .map(|(i, ch)| ShapedGlyph {
                    key: GlyphKey::new(FontId(0), ch as u16, px, style.render_style()),
                    offset: [i as f32 * advance, 0.0],
                    advance,
                })
                .collect())
        }

        fn release_caches(&mut self) {
            self.released += 1;
        }
    }

    impl Rasterizer for FakeBackend {
        fn rasterize(&mut self, key: &GlyphKey) -> Result<GlyphBitmap, RasterError> {
            if key.font.is_missing() {
                return Err(RasterError::UnknownFont { glyph_id: key.glyph_id });
            }
            self.rasterized += 1;
            let w = u32::from(key.px_size) / 2;
            let h = u32::from(key.px_size);
            Ok(GlyphBitmap {
                width: w,
                height: h,
                left: 0,
                top: h as i32,
                format: PixelFormat::A8,
                data: vec![255; (w * h) as usize],
            })
        }
    }

    fn engine(backend: FakeBackend) -> TextLayoutEngine<FakeBackend> {
        TextLayoutEngine::new(EngineConfig::for_testing(), backend).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let no_interval = EngineConfig {
            maintenance_interval_ticks: 0,
            ..Default::default()
        };
        assert!(matches!(
            TextLayoutEngine::new(no_interval, FakeBackend::default()),
            Err(ConfigError::Invalid(_))
        ));

        let mut wide_padding = EngineConfig::for_testing();
        wide_padding.glyph_atlas.padding = 200;
        assert!(matches!(
            TextLayoutEngine::new(wide_padding, FakeBackend::default()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_style_default() {
        let style = TextStyle::default();
        assert_eq!(style.font_size, 16.0);
        assert_eq!(style.weight, 400);
        assert!(!style.italic);
        assert_eq!(style.family, "sans-serif");
        assert_eq!(style.direction, TextDirection::LeftToRight);
    }

    #[test]
    fn test_style_families() {
        let style = TextStyle {
            family: "Arial, \"Helvetica Neue\", sans-serif".into(),
            ..Default::default()
        };
        let families: Vec<String> = style.families().collect();
        assert_eq!(families, vec!["arial", "helvetica neue", "sans-serif"]);
    }

    #[test]
    fn test_font_set_hash_ignores_formatting() {
        let a = TextStyle {
            family: "Arial, sans-serif".into(),
            ..Default::default()
        };
        let b = TextStyle {
            family: "arial,sans-serif".into(),
            ..Default::default()
        };
        assert_eq!(a.font_set_hash(), b.font_set_hash());
        assert_eq!(a.style_hash(), b.style_hash());
    }

    #[test]
    fn test_render_style_and_pixel_size() {
        let style = TextStyle {
            weight: 700,
            italic: true,
            font_size: 12.0,
            ..Default::default()
        };
        assert_eq!(style.render_style(), RenderStyle::BOLD | RenderStyle::ITALIC);
        assert_eq!(style.pixel_size(1.5), 18);
        assert_eq!(style.pixel_size(0.0), 1);
    }

    #[test]
    fn test_lazy_init_on_first_layout() {
        let mut engine = engine(FakeBackend::default());
        assert_eq!(engine.state(), EngineState::Uninitialized);
        engine.layout("a", &TextStyle::default()).unwrap();
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[test]
    fn test_failed_init_stays_uninitialized() {
        let mut engine = engine(FakeBackend {
            fail_prepare: true,
            ..Default::default()
        });
        assert!(matches!(engine.init(), Err(EngineError::Fonts(_))));
        assert_eq!(engine.state(), EngineState::Uninitialized);
        // Layout still answers.
        let layout = engine.layout("ab", &TextStyle::default()).unwrap();
        assert_eq!(layout.glyphs().len(), 2);
    }

    #[test]
    fn test_failed_lazy_init_waits_for_reload() {
        let mut engine = engine(FakeBackend {
            fail_prepare: true,
            ..Default::default()
        });
        let style = TextStyle::default();
        for text in ["a", "b", "c"] {
            engine.layout(text, &style).unwrap();
        }
        assert_eq!(engine.backend().prepared, 1, "one attempt, not one per layout");
        assert_eq!(engine.state(), EngineState::Uninitialized);

        engine.reload();
        engine.layout("d", &style).unwrap();
        assert_eq!(engine.backend().prepared, 2);

        // An explicit init always tries.
        assert!(engine.init().is_err());
        assert_eq!(engine.backend().prepared, 3);
    }

    #[test]
    fn test_reload_releases_backend_caches() {
        let mut engine = engine(FakeBackend::default());
        engine.layout("abc", &TextStyle::default()).unwrap();
        assert_eq!(engine.backend().released, 0);
        engine.reload();
        assert_eq!(engine.backend().released, 1);
        engine.on_scale_changed(2.0, 1.0);
        assert_eq!(engine.backend().released, 2);
    }

    #[test]
    fn test_layout_after_shutdown_errors() {
        let mut engine = engine(FakeBackend::default());
        engine.layout("abc", &TextStyle::default()).unwrap();
        let handle = engine.handle();
        engine.shutdown();

        assert_eq!(engine.state(), EngineState::ShutDown);
        assert!(matches!(engine.layout("abc", &TextStyle::default()), Err(EngineError::ShutDown)));
        assert!(matches!(engine.init(), Err(EngineError::ShutDown)));
        assert_eq!(engine.glyph_atlas_memory_size(), 0);
        assert_eq!(engine.cache_count(), 0);
        assert_eq!(handle.request_reload(), Err(HandleError::Closed));
    }

    #[test]
    fn test_shaping_failure_degrades_to_placeholders() {
        let mut engine = engine(FakeBackend {
            fail_shape: true,
            ..Default::default()
        });
        let layout = engine.layout("a b", &TextStyle::default()).unwrap();
        assert_eq!(layout.glyphs().len(), 2, "whitespace advances without a glyph");
        assert!(layout.glyphs().iter().all(|g| g.key.font.is_missing()));
        assert_eq!(layout.advance(), 24.0);
        assert_eq!(layout.glyphs()[1].offset, [16.0, 0.0]);

        let instances = engine.glyph_instances(&layout, [0.0, 0.0]).unwrap();
        assert_eq!(instances.len(), 2, "placeholders are drawable");
    }

    #[test]
    fn test_placeholder_run_trailing_space() {
        let run = placeholder_run("ab  ", &TextStyle::default(), 1.0);
        assert_eq!(run.len(), 2);
        let total: f32 = run.iter().map(|g| g.advance).sum();
        assert_eq!(total, 32.0);
    }

    #[test]
    fn test_end_tick_evicts_idle_layouts() {
        // for_testing: sweep every tick, lifespan 4 ticks.
        let mut engine = engine(FakeBackend::default());
        let style = TextStyle::default();
        engine.layout("idle", &style).unwrap();
        engine.layout("busy", &style).unwrap();

        for _ in 0..8 {
            engine.on_end_tick();
            engine.layout("busy", &style).unwrap();
        }
        assert_eq!(engine.cache_count(), 1);
        assert_eq!(engine.tick(), 8);
        assert_eq!(engine.stats().cache_count(), 1);
    }

    #[test]
    fn test_scale_change_reloads_only_when_changed() {
        let mut engine = engine(FakeBackend::default());
        let style = TextStyle::default();
        engine.layout("abc", &style).unwrap();

        engine.on_scale_changed(1.0, 1.0);
        assert_eq!(engine.cache_count(), 1);

        engine.on_scale_changed(2.0, 1.0);
        assert_eq!(engine.cache_count(), 0);
        assert_eq!(engine.scale(), 2.0);

        let layout = engine.layout("abc", &style).unwrap();
        assert_eq!(layout.glyphs()[0].key.px_size, 32);
    }

    #[test]
    fn test_invalid_scale_ignored() {
        let mut engine = engine(FakeBackend::default());
        engine.on_scale_changed(f32::NAN, 1.0);
        engine.on_scale_changed(0.0, 1.0);
        assert_eq!(engine.scale(), 1.0);
    }

    #[test]
    fn test_posted_tasks_run_on_process() {
        let mut engine = engine(FakeBackend::default());
        let style = TextStyle::default();
        engine.layout("abc", &style).unwrap();

        let handle = engine.handle();
        handle.request_end_tick().unwrap();
        handle.request_reload().unwrap();
        // Nothing happens until the owner drains the queue.
        assert_eq!(engine.cache_count(), 1);

        assert_eq!(engine.process_tasks(), 2);
        assert_eq!(engine.cache_count(), 0);
        assert_eq!(engine.tick(), 1);
        assert_eq!(engine.process_tasks(), 0);
    }

    #[test]
    fn test_dump_info() {
        let mut engine = engine(FakeBackend::default());
        engine.layout("Hi", &TextStyle::default()).unwrap();
        let mut out = String::new();
        engine.dump_info(&mut out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("TextLayoutEngine: CacheCount=1, CacheSize="));
        assert!(lines[0].contains("GlyphAtlasSize=16.00 KB (16384 bytes)"));
        assert!(lines[1].starts_with("GlyphManager: GlyphAtlas"));
    }
}
