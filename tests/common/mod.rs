#![allow(dead_code)]

use ar_viewer::app::{ArApp, Presenter};
use ar_viewer::config::AppConfig;
use ar_viewer::render::scene::{CubeSceneProvider, Scene};
use ar_viewer::render::surface::HeadlessContextProvider;
use ar_viewer::render::{Camera, RenderResult, Renderer};
use ar_viewer::xr::simulated::{SimulatedConfig, SimulatedPlatform};
use ar_viewer::xr::{FramebufferHandle, PlatformEvent};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub entry_enabled: u32,
    pub ar_mode_entered: u32,
    pub ar_mode_exited: u32,
    pub unsupported_shown: u32,
}

impl Presenter for RecordingPresenter {
    fn enable_entry_action(&mut self) {
        self.entry_enabled += 1;
    }

    fn enter_ar_mode(&mut self) {
        self.ar_mode_entered += 1;
    }

    fn exit_ar_mode(&mut self) {
        self.ar_mode_exited += 1;
    }

    fn show_unsupported(&mut self) {
        self.unsupported_shown += 1;
    }
}

/// Renderer that checks, on every draw, that the platform already holds a
/// registration for the next frame.
pub struct TracingRenderer {
    platform: SimulatedPlatform,
    pub framebuffer: Option<FramebufferHandle>,
    pub sizes: Vec<[u32; 2]>,
    pub cameras: Vec<Camera>,
    pub renders_after_reregistration: usize,
}

impl TracingRenderer {
    pub fn new(platform: SimulatedPlatform) -> Self {
        Self {
            platform,
            framebuffer: None,
            sizes: Vec::new(),
            cameras: Vec::new(),
            renders_after_reregistration: 0,
        }
    }

    pub fn render_count(&self) -> usize {
        self.cameras.len()
    }
}

impl Renderer for TracingRenderer {
    fn label(&self) -> &'static str {
        "Tracing Renderer"
    }

    fn set_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.framebuffer = framebuffer;
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.sizes.push([width, height]);
    }

    fn render(&mut self, _scene: &Scene, camera: &Camera) -> RenderResult<()> {
        if matches!(
            self.platform.trace().last(),
            Some(PlatformEvent::AnimationFrameRequested(_))
        ) {
            self.renders_after_reregistration += 1;
        }
        self.cameras.push(*camera);
        Ok(())
    }
}

pub type TestApp =
    ArApp<SimulatedPlatform, HeadlessContextProvider, TracingRenderer, RecordingPresenter>;

pub fn build_app(config: SimulatedConfig) -> (TestApp, SimulatedPlatform) {
    init_logging();
    let platform = SimulatedPlatform::new(config);
    let app = ArApp::new(
        AppConfig::default(),
        Some(platform.clone()),
        HeadlessContextProvider::default(),
        TracingRenderer::new(platform.clone()),
        Box::new(CubeSceneProvider),
        RecordingPresenter::default(),
    );
    (app, platform)
}

pub fn position_of(trace: &[PlatformEvent], predicate: impl Fn(&PlatformEvent) -> bool) -> Option<usize> {
    trace.iter().position(predicate)
}
