//! Headless AR session
//!
//! Runs the full session lifecycle against the simulated platform, optionally
//! reading an `AppConfig` JSON file given as the first argument.
//! Run with: RUST_LOG=info cargo run --example headless_session [config.json]

use ar_viewer::app::{ArApp, LogPresenter, Startup};
use ar_viewer::config::AppConfig;
use ar_viewer::render::NullRenderer;
use ar_viewer::render::scene::CubeSceneProvider;
use ar_viewer::render::surface::HeadlessContextProvider;
use ar_viewer::xr::simulated::{SimulatedConfig, SimulatedPlatform, demo_frames};
use ar_viewer::xr::{Gesture, UserActivation};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    let platform = SimulatedPlatform::new(SimulatedConfig::default().with_frames(demo_frames(90)));
    let mut app = ArApp::new(
        config,
        Some(platform),
        HeadlessContextProvider::default(),
        NullRenderer::new(config.renderer),
        Box::new(CubeSceneProvider),
        LogPresenter,
    );

    pollster::block_on(async {
        if app.start().await == Startup::Unsupported {
            println!("AR is not supported by this platform");
            return Ok(());
        }
        app.enter_ar(UserActivation::from_gesture(Gesture::Click)).await?;

        let summary = app.run_until_ended(None)?;
        println!(
            "Session ended ({:?}): {} frames, {} rendered, {} waiting for tracking",
            summary.ended, summary.frames, summary.rendered, summary.skipped
        );
        println!("{}", app.controller().telemetry().to_json()?);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
