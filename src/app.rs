//! The AR viewer application: an explicit instance owning every collaborator,
//! gating the entry action on the capability probe and pumping frames.

use crate::config::AppConfig;
use crate::render::Renderer;
use crate::render::scene::{Scene, SceneProvider};
use crate::render::surface::GraphicsContextProvider;
use crate::session::{
    EndReason, FramePump, SessionController, SessionError, SessionPhase, SessionResult,
};
use crate::xr::{UserActivation, XrPlatform, probe_session_support};

/// User-visible side of the application. Implementations must not fail.
pub trait Presenter {
    fn enable_entry_action(&mut self);
    fn enter_ar_mode(&mut self);
    fn exit_ar_mode(&mut self) {}
    fn show_unsupported(&mut self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPresenter;

impl Presenter for NoopPresenter {
    fn enable_entry_action(&mut self) {}
    fn enter_ar_mode(&mut self) {}
    fn show_unsupported(&mut self) {}
}

/// Presenter for headless hosts: reports UI changes through the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn enable_entry_action(&mut self) {
        log::info!("[app] entry action enabled");
    }

    fn enter_ar_mode(&mut self) {
        log::info!("[app] entered ar mode");
    }

    fn exit_ar_mode(&mut self) {
        log::info!("[app] left ar mode");
    }

    fn show_unsupported(&mut self) {
        log::warn!("[app] ar unsupported on this device");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    EntryEnabled,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub frames: u64,
    pub rendered: u64,
    pub skipped: u64,
    pub faulted: u64,
    pub ended: Option<EndReason>,
}

pub struct ArApp<P: XrPlatform, G, R, U> {
    config: AppConfig,
    platform: Option<P>,
    context_provider: G,
    renderer: R,
    scene_provider: Box<dyn SceneProvider>,
    presenter: U,
    controller: SessionController<P::Session>,
    scene: Option<Scene>,
    startup: Option<Startup>,
}

impl<P, G, R, U> ArApp<P, G, R, U>
where
    P: XrPlatform,
    G: GraphicsContextProvider,
    R: Renderer,
    U: Presenter,
{
    /// `platform` is `None` when the host exposes no XR api at all.
    pub fn new(
        config: AppConfig,
        platform: Option<P>,
        context_provider: G,
        renderer: R,
        scene_provider: Box<dyn SceneProvider>,
        presenter: U,
    ) -> Self {
        let controller = SessionController::new(config.session, config.context);
        Self {
            config,
            platform,
            context_provider,
            renderer,
            scene_provider,
            presenter,
            controller,
            scene: None,
            startup: None,
        }
    }

    /// Probes once and wires either the entry action or the fallback.
    pub async fn start(&mut self) -> Startup {
        if let Some(startup) = self.startup {
            return startup;
        }

        let mode = self.config.session.mode;
        let startup = if probe_session_support(self.platform.as_ref(), mode).await {
            self.presenter.enable_entry_action();
            Startup::EntryEnabled
        } else {
            self.presenter.show_unsupported();
            Startup::Unsupported
        };
        log::info!("[app] startup complete: {startup:?}");
        self.startup = Some(startup);
        startup
    }

    /// Entry action handler. Setup failures show the fallback presentation.
    pub async fn enter_ar(&mut self, activation: UserActivation) -> SessionResult<()> {
        let mode = self.config.session.mode;
        let platform = match (self.startup, self.platform.as_ref()) {
            (Some(Startup::EntryEnabled), Some(platform)) => platform,
            _ => return Err(SessionError::CapabilityUnavailable(mode)),
        };

        let result = self
            .controller
            .activate(
                platform,
                &mut self.context_provider,
                &mut self.presenter,
                &activation,
            )
            .await;

        match &result {
            Ok(()) => {
                if self.scene.is_none() {
                    self.scene = Some(self.scene_provider.scene());
                }
            }
            Err(err) if err.is_setup_failure() => self.presenter.show_unsupported(),
            Err(err) => log::warn!("[app] entry action ignored: {err}"),
        }
        result
    }

    /// Handles one platform frame callback.
    pub fn pump_frame(&mut self) -> SessionResult<FramePump> {
        let Some(scene) = self.scene.as_ref() else {
            return Err(SessionError::NotActive);
        };

        let result =
            self.controller
                .pump_frame(&mut self.context_provider, &mut self.renderer, scene);
        if matches!(result, Ok(FramePump::Ended(_)) | Err(SessionError::FrameFault { .. })) {
            self.presenter.exit_ar_mode();
        }
        result
    }

    /// Pumps frames until the session ends or `max_frames` callbacks have
    /// been handled.
    pub fn run_until_ended(&mut self, max_frames: Option<u64>) -> SessionResult<RunSummary> {
        let mut summary = RunSummary::default();
        while max_frames.is_none_or(|max| summary.frames < max) {
            match self.pump_frame()? {
                FramePump::Rendered(_) => summary.rendered += 1,
                FramePump::Skipped(_) => summary.skipped += 1,
                FramePump::Faulted(_) => summary.faulted += 1,
                FramePump::Idle => {
                    log::warn!("[app] no frame registered; stopping");
                    break;
                }
                FramePump::Ended(reason) => {
                    summary.ended = Some(reason);
                    break;
                }
            }
            summary.frames += 1;
        }
        Ok(summary)
    }

    pub fn end_session(&mut self) -> SessionResult<EndReason> {
        let reason = self.controller.end(&mut self.context_provider)?;
        self.presenter.exit_ar_mode();
        Ok(reason)
    }

    pub fn phase(&self) -> SessionPhase {
        self.controller.phase()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn startup(&self) -> Option<Startup> {
        self.startup
    }

    pub fn controller(&self) -> &SessionController<P::Session> {
        &self.controller
    }

    pub fn platform(&self) -> Option<&P> {
        self.platform.as_ref()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn context_provider(&self) -> &G {
        &self.context_provider
    }

    pub fn presenter(&self) -> &U {
        &self.presenter
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::NullRenderer;
    use crate::render::scene::CubeSceneProvider;
    use crate::render::surface::HeadlessContextProvider;
    use crate::xr::simulated::{SimulatedConfig, SimulatedPlatform, demo_frames, pose_at};
    use crate::xr::{Gesture, Viewport};
    use pollster::block_on;

    type TestApp = ArApp<SimulatedPlatform, HeadlessContextProvider, NullRenderer, NoopPresenter>;

    fn app(platform: Option<SimulatedPlatform>) -> TestApp {
        ArApp::new(
            AppConfig::default(),
            platform,
            HeadlessContextProvider::default(),
            NullRenderer::default(),
            Box::new(CubeSceneProvider),
            NoopPresenter,
        )
    }

    #[test]
    fn entry_requires_successful_probe() {
        let mut app = app(None);
        assert_eq!(block_on(app.start()), Startup::Unsupported);

        let err = block_on(app.enter_ar(UserActivation::from_gesture(Gesture::Click))).unwrap_err();
        assert!(matches!(err, SessionError::CapabilityUnavailable(_)));
        assert_eq!(app.phase(), SessionPhase::Idle);
    }

    #[test]
    fn start_is_idempotent() {
        let mut app = app(Some(SimulatedPlatform::default()));
        assert_eq!(block_on(app.start()), Startup::EntryEnabled);
        assert_eq!(block_on(app.start()), Startup::EntryEnabled);

        let queries = app
            .platform()
            .expect("platform")
            .trace()
            .iter()
            .filter(|event| matches!(event, crate::xr::PlatformEvent::SupportQueried(_)))
            .count();
        assert_eq!(queries, 1);
    }

    #[test]
    fn run_until_ended_stops_at_frame_budget() {
        let platform = SimulatedPlatform::new(
            SimulatedConfig::default()
                .with_frames(demo_frames(2))
                .repeat_last_frame(true),
        );
        let mut app = app(Some(platform));
        block_on(app.start());
        block_on(app.enter_ar(UserActivation::from_gesture(Gesture::Touch))).expect("enter ar");

        let summary = app.run_until_ended(Some(10)).expect("run");
        assert_eq!(summary.frames, 10);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.rendered, 9);
        assert_eq!(summary.ended, None);
        assert_eq!(app.phase(), SessionPhase::Active);
        assert_eq!(app.scene().map(Scene::len), Some(1));
    }

    #[test]
    fn zero_area_viewport_keeps_session_running() {
        let empty = Viewport::new(0, 0, 0, 0);
        let full = Viewport::new(0, 0, 640, 480);
        let platform = SimulatedPlatform::new(SimulatedConfig::default().with_frames(vec![
            Some(pose_at([0.0, 1.5, 0.0], empty)),
            Some(pose_at([0.0, 1.5, 0.0], full)),
        ]));
        let mut app = app(Some(platform));
        block_on(app.start());
        block_on(app.enter_ar(UserActivation::from_gesture(Gesture::Click))).expect("enter ar");

        assert_eq!(app.pump_frame(), Ok(FramePump::Rendered(empty)));
        assert_eq!(app.phase(), SessionPhase::Active);
        assert_eq!(app.pump_frame(), Ok(FramePump::Rendered(full)));
        assert_eq!(app.phase(), SessionPhase::Active);
        assert_eq!(app.renderer().render_count(), 1);
        assert_eq!(app.renderer().records()[0].size, [640, 480]);
    }
}
