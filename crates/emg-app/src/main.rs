mod args;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use serde_json::{json, Value};

use emg_agent::{AnimationEngine, AtlasImage, Avatar, EngineSettings, Resolution, Scene};
use emg_config::{AtlasDescription, ModelDefinition, PlayerConfig};
use emg_core::logging::{self, LogLevel, LogSettings};

use crate::args::Args;

/// Write one JSON event line to stdout.
fn emit(event: Value) {
    println!("{event}");
}

fn image_event(resolution: &Resolution) -> Value {
    let source = match resolution {
        Resolution::Asset(_) => "model",
        Resolution::Legacy(_) => "legacy",
        Resolution::Empty => "none",
    };
    json!({ "event": "image", "source": source, "ref": resolution.as_str() })
}

fn load_scene(args: &Args) -> Result<Option<Scene>> {
    let Some(atlas_path) = &args.atlas else {
        return Ok(None);
    };
    let description = AtlasDescription::from_path(atlas_path)?;
    let scene = Scene::from_description(&description);
    for layer_id in scene.crops_out_of_bounds() {
        tracing::warn!(%layer_id, "layer crop reaches outside the declared atlas size");
    }

    if let Some(image_path) = &args.image {
        let atlas = AtlasImage::from_path(image_path)?;
        atlas.check_declared(&scene)?;
        let frames = atlas.crop_all(&scene)?;
        let (width, height) = atlas.dimensions();
        tracing::info!(width, height, layers = frames.len(), "atlas image sliced");
    }

    let (canvas_w, canvas_h) = scene.canvas_size();
    emit(json!({
        "event": "scene",
        "canvas": [canvas_w, canvas_h],
        "layers": scene.stacking_order().iter().map(|l| l.id.as_str()).collect::<Vec<_>>(),
        "animations": scene.animations().count(),
        "groups": scene.enabled_groups().collect::<Vec<_>>(),
    }));
    Ok(Some(scene))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(PlayerConfig::default_path);
    let config = PlayerConfig::load_or_default(&config_path)?;

    let log_buffer = logging::init(&LogSettings {
        default_filter: config.logging.filter.clone(),
        retention_days: config.logging.retention_days,
        stderr: config.logging.stderr,
        ..LogSettings::default()
    });
    tracing::info!(config = %config_path.display(), "EMG starting up");

    let mut avatar = Avatar::new(&config);
    if let Some(model_path) = &args.model {
        let model = ModelDefinition::from_path(model_path)?;
        tracing::info!(
            bundles = model.mapping.len(),
            assets = model.referenced_assets().len(),
            "model loaded"
        );
        avatar.set_model(Arc::new(model));
    }
    avatar.set_state(args.avatar_state());
    let (anchor_x, anchor_y) = avatar.anchor();
    emit(json!({ "event": "anchor", "x": anchor_x, "y": anchor_y }));
    emit(image_event(avatar.current()));

    let mut engine = load_scene(&args)?
        .map(|scene| AnimationEngine::new(scene, EngineSettings::from(&config.animation)));

    let started = Instant::now();
    let until = started + args.run_for();
    if config.animation.autostart {
        if let Some(engine) = engine.as_mut() {
            engine.start(started);
        }
    }

    loop {
        let now = Instant::now();
        if let Some(engine) = engine.as_mut() {
            engine.advance(now);
            for command in engine.drain_commands() {
                emit(json!({
                    "event": "visibility",
                    "at_ms": now.duration_since(started).as_millis() as u64,
                    "layer": command.layer_id,
                    "visible": command.visible,
                }));
            }
        }
        if let Some(resolution) = avatar.tick(now) {
            emit(image_event(&resolution));
        }
        if now >= until {
            break;
        }

        let wake = [
            engine.as_ref().and_then(|e| e.next_deadline()),
            avatar.next_blink_change(),
            Some(until),
        ]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(until);
        std::thread::sleep(wake.saturating_duration_since(Instant::now()));
    }

    if let Some(engine) = engine.as_mut() {
        engine.stop();
    }
    let warnings = log_buffer.count_at_least(LogLevel::Warn);
    tracing::info!(warnings, "EMG shutting down");
    emit(json!({ "event": "done", "warnings": warnings }));
    Ok(())
}
