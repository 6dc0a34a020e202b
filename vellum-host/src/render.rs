//! Render thread: owns the text layout engine and lays out a fixed set of
//! labels every frame.
//!
//! Nothing else touches the engine. The control thread talks to it only
//! through the [`EngineHandle`] returned by [`spawn`].

use std::error::Error;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use vellum_text::{
    Atlas, ConfigError, CosmicBackend, EngineConfig, EngineHandle, GlyphInstance, TextLayoutEngine, TextStyle,
};

/// Text drawn every frame, with its style and origin.
struct Label {
    text: &'static str,
    style: TextStyle,
    origin: [f32; 2],
}

fn demo_labels() -> Vec<Label> {
    let heading = TextStyle {
        family: "Inter, Helvetica, sans-serif".into(),
        font_size: 28.0,
        weight: 700,
        ..Default::default()
    };
    let body = TextStyle::default();
    let code = TextStyle {
        family: "\"Fira Code\", monospace".into(),
        font_size: 13.0,
        ..Default::default()
    };
    vec![
        Label { text: "Vellum", style: heading, origin: [24.0, 48.0] },
        Label { text: "Cached text layout over paged glyph atlases.", style: body.clone(), origin: [24.0, 88.0] },
        Label { text: "Emoji share the frame 🎨✨", style: body, origin: [24.0, 112.0] },
        Label { text: "engine.layout(text, &style)?", style: code, origin: [24.0, 140.0] },
    ]
}

/// Summary returned when the render thread exits.
#[derive(Debug, Default)]
pub struct RenderReport {
    pub frames: u64,
    pub stale_layouts: u64,
    pub last_frame_instances: usize,
    /// Final diagnostics dump, taken just before shutdown.
    pub dump: String,
}

struct RenderState {
    engine: TextLayoutEngine<CosmicBackend>,
    labels: Vec<Label>,
    report: RenderReport,
    /// Instance buffer of the last frame, as it would be uploaded.
    instances: Vec<GlyphInstance>,
}

impl RenderState {
    fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let mut engine = TextLayoutEngine::new(config, CosmicBackend::new())?;
        if let Err(e) = engine.init() {
            warn!("Fonts unavailable, text will render as placeholders: {e}");
        }
        Ok(Self {
            engine,
            labels: demo_labels(),
            report: RenderReport::default(),
            instances: Vec::new(),
        })
    }

    fn frame(&mut self) {
        let ran = self.engine.process_tasks();
        if ran > 0 {
            debug!("Frame {}: ran {ran} posted engine tasks", self.report.frames);
        }

        self.instances.clear();
        for label in &self.labels {
            let layout = match self.engine.layout(label.text, &label.style) {
                Ok(layout) => layout,
                Err(e) => {
                    warn!("Layout of {:?} failed: {e}", label.text);
                    continue;
                }
            };
            match self.engine.glyph_instances(&layout, label.origin) {
                Some(instances) => self.instances.extend(instances),
                // Only possible if an atlas filled up later in this frame.
                None => self.report.stale_layouts += 1,
            }
        }

        // Upload dirty atlas pages, then mark them clean.
        let manager = self.engine.glyph_manager_mut();
        upload_dirty_pages(manager.glyph_atlas_mut());
        upload_dirty_pages(manager.emoji_atlas_mut());

        self.report.frames += 1;
        self.report.last_frame_instances = self.instances.len();
    }

    fn finish(mut self) -> RenderReport {
        // Drain anything posted after the last frame.
        self.engine.process_tasks();
        let mut dump = String::new();
        if self.engine.dump_info(&mut dump).is_err() {
            warn!("Failed to format engine diagnostics");
        }
        self.report.dump = dump;
        info!(
            "Render thread done after {} frames ({} instance bytes last frame)",
            self.report.frames,
            GlyphInstance::as_bytes(&self.instances).len()
        );
        self.engine.shutdown();
        self.report
    }
}

fn upload_dirty_pages(atlas: &mut Atlas) {
    let dirty: Vec<usize> = atlas
        .pages()
        .iter()
        .enumerate()
        .filter(|(_, page)| page.dirty)
        .map(|(index, _)| index)
        .collect();
    for page in dirty {
        debug!("Uploading {} atlas page {page}", atlas.kind().label());
        atlas.mark_clean(page);
    }
}

/// Start the render thread. Returns once the engine exists and its handle
/// is available, or with the error that kept the engine from being built.
pub fn spawn(
    config: EngineConfig,
    frame_interval: Duration,
    running: Arc<AtomicBool>,
) -> Result<(EngineHandle, JoinHandle<RenderReport>), Box<dyn Error>> {
    let (handle_tx, handle_rx) = mpsc::channel::<Result<EngineHandle, ConfigError>>();
    let thread = thread::Builder::new()
        .name("vellum-render".into())
        .spawn(move || {
            let mut state = match RenderState::new(config) {
                Ok(state) => state,
                Err(e) => {
                    let _ = handle_tx.send(Err(e));
                    return RenderReport::default();
                }
            };
            if handle_tx.send(Ok(state.engine.handle())).is_err() {
                return state.finish();
            }
            while running.load(Ordering::Acquire) {
                state.frame();
                thread::sleep(frame_interval);
            }
            state.finish()
        })?;
    let handle = handle_rx
        .recv()
        .map_err(|_| io::Error::other("render thread exited before publishing its engine handle"))??;
    Ok((handle, thread))
}
