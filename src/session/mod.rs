//! Session lifecycle: `Idle -> Requesting -> SurfaceBound -> Active -> Ended`,
//! with `Error` reachable from the setup steps. Each state carries exactly
//! the resources that exist in it.

pub mod frame_loop;
pub mod telemetry;

use crate::app::Presenter;
use crate::config::SessionConfig;
use crate::render::scene::Scene;
use crate::render::surface::{
    ContextAttributes, GraphicsContextProvider, GraphicsSurface, SurfaceError, bind_surface,
};
use crate::render::{Camera, RenderError, Renderer};
use crate::xr::{
    FramePoll, FrameRequestId, ReferenceSpace, ReferenceSpaceType, SessionMode, UserActivation,
    Viewport, XrError, XrPlatform, XrSession,
};
use frame_loop::{FrameDisposition, FrameLoopState, FrameSkip};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::mem;
use telemetry::SessionTelemetry;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameFaultPolicy {
    /// A failed render call tears the session down.
    #[default]
    EndSession,
    /// A failed render call drops that frame only.
    SkipFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    /// The device, the user, or the runtime ended the session.
    Platform,
    /// The host application called `end`.
    Host,
    FrameFault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Requesting,
    SurfaceBound,
    Active,
    Ended,
    Error,
}

impl SessionPhase {
    pub fn label(self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Requesting => "requesting",
            SessionPhase::SurfaceBound => "surface-bound",
            SessionPhase::Active => "active",
            SessionPhase::Ended => "ended",
            SessionPhase::Error => "error",
        }
    }

    pub fn accepts_activation(self) -> bool {
        matches!(
            self,
            SessionPhase::Idle | SessionPhase::Ended | SessionPhase::Error
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("{0} sessions are not supported on this platform")]
    CapabilityUnavailable(SessionMode),
    #[error("{mode} session request failed: {source}")]
    SessionDenied {
        mode: SessionMode,
        #[source]
        source: XrError,
    },
    #[error("graphics surface binding failed: {0}")]
    SurfaceBindingFailed(#[from] SurfaceError),
    #[error("{kind} reference space unavailable: {source}")]
    ReferenceSpaceUnavailable {
        kind: ReferenceSpaceType,
        #[source]
        source: XrError,
    },
    #[error("cannot start a session while {0}")]
    AlreadyActive(SessionPhase),
    #[error("no session is active")]
    NotActive,
    #[error("frame {frame} failed to render: {source}")]
    FrameFault {
        frame: u64,
        #[source]
        source: RenderError,
    },
}

impl SessionError {
    /// Errors that stop a session from ever reaching `Active`.
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            SessionError::CapabilityUnavailable(_)
                | SessionError::SessionDenied { .. }
                | SessionError::SurfaceBindingFailed(_)
                | SessionError::ReferenceSpaceUnavailable { .. }
        )
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug)]
pub struct BoundSession<S> {
    session: S,
    surface: GraphicsSurface,
}

impl<S: XrSession> BoundSession<S> {
    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn surface(&self) -> &GraphicsSurface {
        &self.surface
    }

    /// The only way into `Active`; registers the first frame callback.
    fn start(mut self, space: ReferenceSpace) -> ActiveSession<S> {
        let pending = self.session.request_animation_frame();
        ActiveSession {
            session: self.session,
            surface: self.surface,
            space,
            frame_state: FrameLoopState::new(Camera::default()),
            pending: Some(pending),
        }
    }

    fn release<G: GraphicsContextProvider + ?Sized>(mut self, provider: &mut G) {
        provider.release_surface(self.surface.surface_id());
        self.session.end();
    }
}

#[derive(Debug)]
pub struct ActiveSession<S> {
    session: S,
    surface: GraphicsSurface,
    space: ReferenceSpace,
    frame_state: FrameLoopState,
    pending: Option<FrameRequestId>,
}

impl<S: XrSession> ActiveSession<S> {
    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn surface(&self) -> &GraphicsSurface {
        &self.surface
    }

    pub fn space(&self) -> &ReferenceSpace {
        &self.space
    }

    pub fn camera(&self) -> &Camera {
        self.frame_state.camera()
    }

    pub fn frame_state(&self) -> &FrameLoopState {
        &self.frame_state
    }

    pub fn pending_request(&self) -> Option<FrameRequestId> {
        self.pending
    }

    fn teardown<G: GraphicsContextProvider + ?Sized>(mut self, provider: &mut G) {
        provider.release_surface(self.surface.surface_id());
        self.session.end();
    }
}

#[derive(Debug)]
pub enum SessionState<S> {
    Idle,
    Requesting,
    SurfaceBound(BoundSession<S>),
    Active(ActiveSession<S>),
    Ended(EndReason),
    Error(SessionError),
}

impl<S> SessionState<S> {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Requesting => SessionPhase::Requesting,
            SessionState::SurfaceBound(_) => SessionPhase::SurfaceBound,
            SessionState::Active(_) => SessionPhase::Active,
            SessionState::Ended(_) => SessionPhase::Ended,
            SessionState::Error(_) => SessionPhase::Error,
        }
    }
}

/// Result of handing one platform callback to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePump {
    Rendered(Viewport),
    Skipped(FrameSkip),
    /// Render failed but the fault policy kept the session alive.
    Faulted(SessionError),
    /// No frame was due.
    Idle,
    Ended(EndReason),
}

pub struct SessionController<S> {
    config: SessionConfig,
    context_attributes: ContextAttributes,
    state: SessionState<S>,
    telemetry: SessionTelemetry,
    attempts: u64,
}

impl<S: XrSession> SessionController<S> {
    pub fn new(config: SessionConfig, context_attributes: ContextAttributes) -> Self {
        Self {
            config,
            context_attributes,
            state: SessionState::Idle,
            telemetry: SessionTelemetry::default(),
            attempts: 0,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState<S> {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn telemetry(&self) -> &SessionTelemetry {
        &self.telemetry
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn active(&self) -> Option<&ActiveSession<S>> {
        match &self.state {
            SessionState::Active(active) => Some(active),
            _ => None,
        }
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.active().map(ActiveSession::camera)
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        match &self.state {
            SessionState::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Runs the setup chain for one user-initiated attempt. Failures are
    /// terminal for the attempt and leave the controller in `Error`.
    pub async fn activate<P, G, U>(
        &mut self,
        platform: &P,
        provider: &mut G,
        presenter: &mut U,
        activation: &UserActivation,
    ) -> SessionResult<()>
    where
        P: XrPlatform<Session = S>,
        G: GraphicsContextProvider + ?Sized,
        U: Presenter + ?Sized,
    {
        let phase = self.phase();
        if !phase.accepts_activation() {
            return Err(SessionError::AlreadyActive(phase));
        }
        self.attempts += 1;
        log::info!(
            "[session] attempt {} via {:?} on {}",
            self.attempts,
            activation.gesture(),
            platform.label()
        );
        self.transition(SessionState::Requesting);

        let mode = self.config.mode;
        let mut session = match platform.request_session(mode, activation).await {
            Ok(session) => session,
            Err(source) => return Err(self.fail(SessionError::SessionDenied { mode, source })),
        };

        let surface = match bind_surface(&mut session, provider, self.context_attributes) {
            Ok(surface) => surface,
            Err(source) => {
                session.end();
                return Err(self.fail(source.into()));
            }
        };
        let id = session.id();
        self.transition(SessionState::SurfaceBound(BoundSession { session, surface }));

        let kind = self.config.reference_space;
        let requested = match &mut self.state {
            SessionState::SurfaceBound(bound) => bound.session.request_reference_space(kind).await,
            _ => return Err(SessionError::NotActive),
        };

        let bound = match self.take_state() {
            SessionState::SurfaceBound(bound) => bound,
            other => {
                self.state = other;
                return Err(SessionError::NotActive);
            }
        };

        match requested {
            Ok(space) => {
                presenter.enter_ar_mode();
                self.telemetry.begin(id);
                self.enter(
                    SessionPhase::SurfaceBound,
                    SessionState::Active(bound.start(space)),
                );
                Ok(())
            }
            Err(source) => {
                bound.release(provider);
                Err(self.fail_from(
                    SessionPhase::SurfaceBound,
                    SessionError::ReferenceSpaceUnavailable { kind, source },
                ))
            }
        }
    }

    /// Handles at most one platform frame callback. Re-registers for the next
    /// frame before any drawing so a failing frame cannot stall the loop.
    pub fn pump_frame<G, R>(
        &mut self,
        provider: &mut G,
        renderer: &mut R,
        scene: &Scene,
    ) -> SessionResult<FramePump>
    where
        G: GraphicsContextProvider + ?Sized,
        R: Renderer + ?Sized,
    {
        let SessionState::Active(active) = &mut self.state else {
            return Err(SessionError::NotActive);
        };

        let frame = match active.session.poll_frame() {
            FramePoll::Ready(frame) => frame,
            FramePoll::Idle => return Ok(FramePump::Idle),
            FramePoll::Ended => {
                return Ok(FramePump::Ended(self.finish(provider, EndReason::Platform)));
            }
        };
        if active.session.is_ended() {
            return Ok(FramePump::Ended(self.finish(provider, EndReason::Platform)));
        }
        self.telemetry.record_delivery(frame.time());
        active.pending = Some(active.session.request_animation_frame());

        let framebuffer = active.surface.framebuffer();
        provider.bind_framebuffer(active.surface.context(), framebuffer);
        renderer.set_framebuffer(Some(framebuffer));

        let step = frame_loop::advance(active.frame_state, &frame, &active.space, framebuffer);
        active.frame_state = step.state;

        let command = match step.disposition {
            FrameDisposition::Render(command) => command,
            FrameDisposition::Skip(skip) => {
                self.telemetry.record_skip(skip);
                return Ok(FramePump::Skipped(skip));
            }
        };

        let Viewport { width, height, .. } = command.viewport;
        active.surface.resize(width, height);
        renderer.set_size(width, height);

        match renderer.render(scene, active.frame_state.camera()) {
            Ok(()) => {
                self.telemetry.record_render(command.viewport);
                Ok(FramePump::Rendered(command.viewport))
            }
            Err(source) => {
                self.telemetry.record_fault();
                let err = SessionError::FrameFault {
                    frame: active.frame_state.frames(),
                    source,
                };
                match self.config.fault_policy {
                    FrameFaultPolicy::SkipFrame => {
                        log::warn!("[frame] {err}; dropping frame");
                        Ok(FramePump::Faulted(err))
                    }
                    FrameFaultPolicy::EndSession => {
                        log::error!("[frame] {err}; ending session");
                        self.finish(provider, EndReason::FrameFault);
                        Err(err)
                    }
                }
            }
        }
    }

    /// Host-initiated end of the running session.
    pub fn end<G>(&mut self, provider: &mut G) -> SessionResult<EndReason>
    where
        G: GraphicsContextProvider + ?Sized,
    {
        match self.phase() {
            SessionPhase::Active | SessionPhase::SurfaceBound => {
                Ok(self.finish(provider, EndReason::Host))
            }
            _ => Err(SessionError::NotActive),
        }
    }

    fn finish<G>(&mut self, provider: &mut G, reason: EndReason) -> EndReason
    where
        G: GraphicsContextProvider + ?Sized,
    {
        let from = self.phase();
        match self.take_state() {
            SessionState::Active(active) => {
                log::info!(
                    "[session] {} ended ({reason:?}) after {} frames",
                    active.session.id(),
                    active.frame_state.frames()
                );
                active.teardown(provider);
            }
            SessionState::SurfaceBound(bound) => bound.release(provider),
            _ => {}
        }
        self.telemetry.record_end(reason);
        self.enter(from, SessionState::Ended(reason));
        reason
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        let from = self.phase();
        self.fail_from(from, err)
    }

    fn fail_from(&mut self, from: SessionPhase, err: SessionError) -> SessionError {
        log::warn!("[session] {err}");
        self.enter(from, SessionState::Error(err.clone()));
        err
    }

    fn take_state(&mut self) -> SessionState<S> {
        mem::replace(&mut self.state, SessionState::Idle)
    }

    fn transition(&mut self, next: SessionState<S>) {
        let from = self.phase();
        self.enter(from, next);
    }

    fn enter(&mut self, from: SessionPhase, next: SessionState<S>) {
        log::info!("[session] {from} -> {}", next.phase());
        self.state = next;
    }
}
