//! Vellum host: drives the text layout engine the way an application would.
//!
//! A render thread owns the engine and lays out labels every frame. This
//! thread plays the host: it posts end-of-tick maintenance, a display scale
//! change and a resource reload through the engine handle, and logs the
//! published counters as it goes.
//!
//! ```text
//! vellum-host [config.toml]
//! ```

mod render;

use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{info, warn};
use vellum_text::{binary_compact, EngineConfig};

const TICKS: u64 = 60;
const TICK_INTERVAL: Duration = Duration::from_millis(50);
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

fn load_config() -> Result<EngineConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let config = EngineConfig::load(&path)?;
            info!("Loaded engine config from {path}");
            Ok(config)
        }
        None => {
            info!("No config given, using defaults");
            Ok(EngineConfig::default())
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    info!("Starting Vellum host...");

    let config = load_config()?;
    let base_scale = config.display_scale;

    let running = Arc::new(AtomicBool::new(true));
    let (handle, render) = render::spawn(config, FRAME_INTERVAL, Arc::clone(&running))?;

    for tick in 1..=TICKS {
        thread::sleep(TICK_INTERVAL);
        let posted = match tick {
            20 => handle.notify_scale_changed(base_scale * 2.0, base_scale),
            40 => handle.request_reload(),
            _ => Ok(()),
        }
        .and_then(|()| handle.request_end_tick());
        if let Err(e) = posted {
            warn!("Render thread stopped early: {e}");
            break;
        }

        if tick % 10 == 0 {
            let stats = handle.stats();
            info!(
                "tick {tick}: {} layouts cached, atlases {}, {} glyphs rasterized",
                stats.cache_count(),
                binary_compact(stats.glyph_atlas_memory_size() + stats.emoji_atlas_memory_size()),
                stats.rasterized_total()
            );
        }
    }

    running.store(false, Ordering::Release);
    let report = render.join().map_err(|_| "render thread panicked")?;

    info!(
        "{} frames, {} glyph instances in the last frame, {} stale layouts",
        report.frames, report.last_frame_instances, report.stale_layouts
    );
    print!("{}", report.dump);
    info!("Engine shut down: {}", handle.stats().is_shut_down());
    Ok(())
}
