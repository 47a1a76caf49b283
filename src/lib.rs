pub mod app;
pub mod config;
pub mod render;
pub mod session;
pub mod xr;

use app::{ArApp, LogPresenter};
use config::AppConfig;
use render::NullRenderer;
use render::scene::CubeSceneProvider;
use render::surface::HeadlessContextProvider;
use xr::simulated::{SimulatedConfig, SimulatedPlatform, demo_frames};
use xr::{Gesture, UserActivation};

const DEMO_FRAMES: usize = 120;

/// Bootstraps a headless AR session against the simulated platform and runs
/// it until the scripted frames run out.
pub fn run() {
    let config = AppConfig::default();
    let platform = SimulatedPlatform::new(SimulatedConfig::default().with_frames(demo_frames(DEMO_FRAMES)));
    let mut app = ArApp::new(
        config,
        Some(platform),
        HeadlessContextProvider::default(),
        NullRenderer::new(config.renderer),
        Box::new(CubeSceneProvider),
        LogPresenter,
    );

    pollster::block_on(async {
        if app.start().await == app::Startup::Unsupported {
            return;
        }
        if let Err(err) = app.enter_ar(UserActivation::from_gesture(Gesture::Click)).await {
            log::error!("[app] could not enter ar: {err}");
            return;
        }
        match app.run_until_ended(None) {
            Ok(summary) => log::info!("[app] session finished: {summary:?}"),
            Err(err) => log::error!("[app] session aborted: {err}"),
        }
        match app.controller().telemetry().to_json() {
            Ok(json) => log::info!("[app] telemetry {json}"),
            Err(err) => log::warn!("[app] failed to serialize telemetry: {err}"),
        }
    });
}
