//! Demo: load a scene and tick the script runtime until it settles

use scriptset::prelude::*;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    // Initialize logging
    scriptset::init_logging();

    let mut args = env::args().skip(1);
    let scene = args.next().unwrap_or_else(|| "demo".to_string());
    let max_frames = args
        .next()
        .and_then(|frames| frames.parse().ok())
        .unwrap_or(60);

    let asset_root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets");
    let mut config = AppConfig::default();
    config.assets = AssetConfig::with_root(asset_root);

    let mut app = ScriptApp::with_config(config);
    app.subscribe(|event| match event {
        RunnerEvent::Changed(changed) => info!(
            entity = ?changed.entity,
            old = ?changed.old.ids(),
            new = ?changed.new.ids(),
            "Script set changed"
        ),
        RunnerEvent::Settled { entity } => info!(entity = ?entity, "Script set settled"),
    });

    if let Err(e) = run(&mut app, &scene, max_frames) {
        error!(error = %e, "Demo failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(app: &mut ScriptApp, scene: &str, max_frames: u64) -> Result<(), AppError> {
    let scripts = app.load_assets()?;
    info!(scripts, "Scripts loaded");
    let spawned = app.load_scene(scene)?;

    // Simulate asset streaming: loading entities become ready after one frame
    app.tick();
    for entity in spawned {
        if app.world.finish_assets(entity) {
            info!(entity = ?entity, "Assets ready");
        }
    }

    match app.run_until_settled(max_frames) {
        Some(frames) => info!(frames, "All script sets settled"),
        None => info!(max_frames, "Frame limit reached before settling"),
    }

    for message in app.engine().journal_entries() {
        println!("{message}");
    }
    app.shutdown()
}
