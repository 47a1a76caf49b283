//! Deterministic in-process XR platform. Stands in for a device runtime in the
//! bootstrap loop and in tests; every platform call is appended to a trace.

use crate::render::surface::GraphicsContext;
use crate::xr::{
    FramePoll, FrameRequestId, FrameSource, FrameTime, FramebufferHandle, Layer, ReferenceSpace,
    ReferenceSpaceType, RenderState, RigidTransform, SessionId, SessionMode, UserActivation,
    Viewport, ViewerPose, XrError, XrFrame, XrPlatform, XrResult, XrSession, XrSystem,
    perspective,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    SupportQueried(SessionMode),
    SessionRequested(SessionMode),
    SessionDenied(SessionMode),
    SessionGranted(SessionId),
    LayerCreated(FramebufferHandle),
    RenderStateUpdated(Option<FramebufferHandle>),
    ReferenceSpaceRequested(ReferenceSpaceType),
    AnimationFrameRequested(FrameRequestId),
    FrameDelivered(FrameTime),
    SessionEnded(SessionId),
}

#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    supported_modes: Vec<SessionMode>,
    supported_spaces: Vec<ReferenceSpaceType>,
    probe_failure: Option<String>,
    denial: Option<String>,
    layer_failure: Option<String>,
    frame_script: Vec<Option<ViewerPose>>,
    repeat_last_frame: bool,
    end_during_frame: Option<usize>,
    frame_interval_ms: f64,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            supported_modes: vec![SessionMode::Inline, SessionMode::ImmersiveAr],
            supported_spaces: vec![
                ReferenceSpaceType::Viewer,
                ReferenceSpaceType::Local,
                ReferenceSpaceType::LocalFloor,
            ],
            probe_failure: None,
            denial: None,
            layer_failure: None,
            frame_script: Vec::new(),
            repeat_last_frame: false,
            end_during_frame: None,
            frame_interval_ms: 1000.0 / 60.0,
        }
    }
}

impl SimulatedConfig {
    pub fn with_modes(mut self, modes: &[SessionMode]) -> Self {
        self.supported_modes = modes.to_vec();
        self
    }

    pub fn with_spaces(mut self, spaces: &[ReferenceSpaceType]) -> Self {
        self.supported_spaces = spaces.to_vec();
        self
    }

    pub fn with_probe_failure(mut self, reason: impl Into<String>) -> Self {
        self.probe_failure = Some(reason.into());
        self
    }

    pub fn deny_sessions(mut self, reason: impl Into<String>) -> Self {
        self.denial = Some(reason.into());
        self
    }

    pub fn with_layer_failure(mut self, reason: impl Into<String>) -> Self {
        self.layer_failure = Some(reason.into());
        self
    }

    /// Poses delivered frame by frame; `None` entries model tracking loss.
    /// The session ends once the script runs out unless the last entry repeats.
    pub fn with_frames(mut self, frames: Vec<Option<ViewerPose>>) -> Self {
        self.frame_script = frames;
        self
    }

    pub fn repeat_last_frame(mut self, repeat: bool) -> Self {
        self.repeat_last_frame = repeat;
        self
    }

    /// The runtime ends the session while dispatching the frame with this
    /// zero-based index, so the callback sees a frame from an ended session.
    pub fn end_during_frame(mut self, index: usize) -> Self {
        self.end_during_frame = Some(index);
        self
    }

    pub fn with_frame_interval(mut self, millis: f64) -> Self {
        self.frame_interval_ms = millis;
        self
    }
}

#[derive(Debug, Default)]
struct SharedState {
    trace: Vec<PlatformEvent>,
    next_session: u64,
    active: Option<SessionId>,
    terminate_requested: bool,
}

impl SharedState {
    fn record(&mut self, event: PlatformEvent) {
        log::trace!("[simulated] {event:?}");
        self.trace.push(event);
    }
}

/// Clones share one runtime: sessions, trace and termination requests.
#[derive(Debug, Default, Clone)]
pub struct SimulatedPlatform {
    config: SimulatedConfig,
    shared: Rc<RefCell<SharedState>>,
}

impl SimulatedPlatform {
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            shared: Rc::new(RefCell::new(SharedState::default())),
        }
    }

    pub fn trace(&self) -> Vec<PlatformEvent> {
        self.shared.borrow().trace.clone()
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.shared.borrow().active
    }

    /// Device or user exit: the active session ends before its next frame.
    pub fn terminate_active_session(&self) {
        self.shared.borrow_mut().terminate_requested = true;
    }
}

impl XrSystem for SimulatedPlatform {
    fn label(&self) -> &'static str {
        "Simulated XR"
    }

    async fn is_session_supported(&self, mode: SessionMode) -> XrResult<bool> {
        self.shared
            .borrow_mut()
            .record(PlatformEvent::SupportQueried(mode));
        if let Some(reason) = &self.config.probe_failure {
            return Err(XrError::Runtime(reason.clone()));
        }
        Ok(self.config.supported_modes.contains(&mode))
    }
}

impl XrPlatform for SimulatedPlatform {
    type Session = SimulatedSession;

    async fn request_session(
        &self,
        mode: SessionMode,
        _activation: &UserActivation,
    ) -> XrResult<SimulatedSession> {
        let mut shared = self.shared.borrow_mut();
        shared.record(PlatformEvent::SessionRequested(mode));

        let denial = if !self.config.supported_modes.contains(&mode) {
            Some(XrError::UnsupportedMode(mode))
        } else if let Some(reason) = &self.config.denial {
            Some(XrError::PlatformDenied {
                mode,
                reason: reason.clone(),
            })
        } else if let Some(active) = shared.active {
            Some(XrError::PlatformDenied {
                mode,
                reason: format!("{active} is still running"),
            })
        } else {
            None
        };

        if let Some(err) = denial {
            shared.record(PlatformEvent::SessionDenied(mode));
            return Err(err);
        }

        shared.next_session += 1;
        let id = SessionId::new(shared.next_session);
        shared.active = Some(id);
        shared.terminate_requested = false;
        shared.record(PlatformEvent::SessionGranted(id));

        Ok(SimulatedSession {
            id,
            mode,
            shared: Rc::clone(&self.shared),
            supported_spaces: self.config.supported_spaces.clone(),
            layer_failure: self.config.layer_failure.clone(),
            render_state: RenderState::default(),
            script: self.config.frame_script.iter().cloned().collect(),
            last_pose: None,
            repeat_last_frame: self.config.repeat_last_frame,
            end_during_frame: self.config.end_during_frame,
            delivered: 0,
            pending: None,
            next_request: 0,
            next_framebuffer: 0,
            clock_ms: 0.0,
            interval_ms: self.config.frame_interval_ms,
            ended: false,
        })
    }
}

#[derive(Debug)]
pub struct SimulatedSession {
    id: SessionId,
    mode: SessionMode,
    shared: Rc<RefCell<SharedState>>,
    supported_spaces: Vec<ReferenceSpaceType>,
    layer_failure: Option<String>,
    render_state: RenderState,
    script: VecDeque<Option<ViewerPose>>,
    last_pose: Option<Option<ViewerPose>>,
    repeat_last_frame: bool,
    end_during_frame: Option<usize>,
    delivered: usize,
    pending: Option<FrameRequestId>,
    next_request: u64,
    next_framebuffer: u64,
    clock_ms: f64,
    interval_ms: f64,
    ended: bool,
}

impl SimulatedSession {
    fn next_pose(&mut self) -> Option<Option<ViewerPose>> {
        if let Some(pose) = self.script.pop_front() {
            self.last_pose = Some(pose.clone());
            return Some(pose);
        }
        if self.repeat_last_frame {
            return self.last_pose.clone();
        }
        None
    }
}

impl FrameSource for SimulatedSession {
    fn request_animation_frame(&mut self) -> FrameRequestId {
        self.next_request += 1;
        let id = FrameRequestId::new(self.next_request);
        self.shared
            .borrow_mut()
            .record(PlatformEvent::AnimationFrameRequested(id));
        if !self.ended {
            self.pending = Some(id);
        }
        id
    }

    fn poll_frame(&mut self) -> FramePoll {
        if !self.ended && self.shared.borrow().terminate_requested {
            self.end();
        }
        if self.ended {
            return FramePoll::Ended;
        }
        if self.pending.take().is_none() {
            return FramePoll::Idle;
        }

        let Some(pose) = self.next_pose() else {
            self.end();
            return FramePoll::Ended;
        };

        self.clock_ms += self.interval_ms;
        let time = FrameTime::from_millis(self.clock_ms);
        self.shared
            .borrow_mut()
            .record(PlatformEvent::FrameDelivered(time));
        if self.end_during_frame == Some(self.delivered) {
            self.end();
        }
        self.delivered += 1;
        FramePoll::Ready(XrFrame::new(self.id, time, pose))
    }
}

impl XrSession for SimulatedSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn mode(&self) -> SessionMode {
        self.mode
    }

    fn create_layer(&mut self, context: &GraphicsContext) -> XrResult<Layer> {
        if self.ended {
            return Err(XrError::SessionEnded(self.id));
        }
        if let Some(reason) = &self.layer_failure {
            return Err(XrError::LayerCreation(reason.clone()));
        }
        if !context.is_xr_compatible() {
            return Err(XrError::LayerCreation(format!(
                "context {} was not created xr compatible",
                context.id().raw()
            )));
        }

        self.next_framebuffer += 1;
        let framebuffer = FramebufferHandle::new(self.id.raw() * 1000 + self.next_framebuffer);
        self.shared
            .borrow_mut()
            .record(PlatformEvent::LayerCreated(framebuffer));
        Ok(Layer { framebuffer })
    }

    fn update_render_state(&mut self, state: RenderState) -> XrResult<()> {
        if self.ended {
            return Err(XrError::SessionEnded(self.id));
        }
        self.shared
            .borrow_mut()
            .record(PlatformEvent::RenderStateUpdated(
                state.base_layer.map(|layer| layer.framebuffer),
            ));
        self.render_state = state;
        Ok(())
    }

    fn render_state(&self) -> &RenderState {
        &self.render_state
    }

    async fn request_reference_space(&mut self, kind: ReferenceSpaceType) -> XrResult<ReferenceSpace> {
        self.shared
            .borrow_mut()
            .record(PlatformEvent::ReferenceSpaceRequested(kind));
        if self.ended {
            return Err(XrError::SessionEnded(self.id));
        }
        if !self.supported_spaces.contains(&kind) {
            return Err(XrError::UnsupportedSpace(kind));
        }
        Ok(ReferenceSpace::new(self.id, kind))
    }

    fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.pending = None;
        self.render_state = RenderState::default();

        let mut shared = self.shared.borrow_mut();
        if shared.active == Some(self.id) {
            shared.active = None;
        }
        shared.terminate_requested = false;
        shared.record(PlatformEvent::SessionEnded(self.id));
    }

    fn is_ended(&self) -> bool {
        self.ended
    }
}

/// Single-view pose looking down -Z from `position`, sized to `viewport`.
pub fn pose_at(position: [f32; 3], viewport: Viewport) -> ViewerPose {
    let projection = perspective(60f32.to_radians(), viewport.aspect(), 0.1, 1000.0);
    ViewerPose::single_view(RigidTransform::from_translation(position), projection, viewport)
}

/// Frame script for the bootstrap loop: tracking resolves after the first
/// frame, then the viewer drifts sideways in front of the scene.
pub fn demo_frames(count: usize) -> Vec<Option<ViewerPose>> {
    let viewport = Viewport::new(0, 0, 1280, 720);
    (0..count)
        .map(|index| {
            (index > 0).then(|| pose_at([index as f32 * 0.01, 1.4, 2.5], viewport))
        })
        .collect()
}
