//! Platform-facing XR types: session modes, reference spaces, frames and poses,
//! plus the traits a host platform implements to drive an immersive session.

use crate::render::surface::GraphicsContext;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use thiserror::Error;

#[cfg(feature = "vr-openxr")]
pub mod openxr;
pub mod probe;
pub mod simulated;

pub use probe::{is_immersive_ar_supported, probe_session_support};
pub use simulated::{PlatformEvent, SimulatedPlatform, SimulatedSession};

/// Column-major 4x4 matrix, laid out the way XR runtimes hand them over.
pub type Matrix4 = [f32; 16];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    Inline,
    ImmersiveVr,
    #[default]
    ImmersiveAr,
}

impl SessionMode {
    pub fn label(self) -> &'static str {
        match self {
            SessionMode::Inline => "inline",
            SessionMode::ImmersiveVr => "immersive-vr",
            SessionMode::ImmersiveAr => "immersive-ar",
        }
    }

    pub fn is_immersive(self) -> bool {
        !matches!(self, SessionMode::Inline)
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceSpaceType {
    Viewer,
    /// Origin fixed near the viewer's position when the session started.
    #[default]
    Local,
    LocalFloor,
    BoundedFloor,
    Unbounded,
}

impl ReferenceSpaceType {
    pub fn label(self) -> &'static str {
        match self {
            ReferenceSpaceType::Viewer => "viewer",
            ReferenceSpaceType::Local => "local",
            ReferenceSpaceType::LocalFloor => "local-floor",
            ReferenceSpaceType::BoundedFloor => "bounded-floor",
            ReferenceSpaceType::Unbounded => "unbounded",
        }
    }
}

impl fmt::Display for ReferenceSpaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FramebufferHandle(u64);

impl FramebufferHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequestId(u64);

impl FrameRequestId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Monotonic frame timestamp in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct FrameTime(f64);

impl FrameTime {
    pub const fn from_millis(millis: f64) -> Self {
        Self(millis)
    }

    pub const fn millis(self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    matrix: Matrix4,
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            matrix: identity_matrix(),
        }
    }

    pub fn from_matrix(matrix: Matrix4) -> Self {
        Self { matrix }
    }

    pub fn from_translation(position: [f32; 3]) -> Self {
        let mut matrix = identity_matrix();
        matrix[12] = position[0];
        matrix[13] = position[1];
        matrix[14] = position[2];
        Self { matrix }
    }

    pub fn matrix(&self) -> Matrix4 {
        self.matrix
    }

    pub fn position(&self) -> [f32; 3] {
        [self.matrix[12], self.matrix[13], self.matrix[14]]
    }

    pub fn inverse_matrix(&self) -> Matrix4 {
        rigid_inverse(&self.matrix)
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Eye {
    #[default]
    None,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub eye: Eye,
    pub transform: RigidTransform,
    pub projection: Matrix4,
    pub viewport: Viewport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerPose {
    pub transform: RigidTransform,
    pub views: Vec<View>,
    pub emulated_position: bool,
}

impl ViewerPose {
    /// Pose with a single monoscopic view, the common case for handheld AR.
    pub fn single_view(transform: RigidTransform, projection: Matrix4, viewport: Viewport) -> Self {
        Self {
            transform,
            views: vec![View {
                eye: Eye::None,
                transform,
                projection,
                viewport,
            }],
            emulated_position: false,
        }
    }

    pub fn primary_view(&self) -> Option<&View> {
        self.views.first()
    }
}

/// Coordinate frame handed out by a session. Only resolves poses for frames
/// produced by the same session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceSpace {
    session: SessionId,
    kind: ReferenceSpaceType,
}

impl ReferenceSpace {
    pub const fn new(session: SessionId, kind: ReferenceSpaceType) -> Self {
        Self { session, kind }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn kind(&self) -> ReferenceSpaceType {
        self.kind
    }
}

/// One rendering opportunity. Consumed by a single loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct XrFrame {
    session: SessionId,
    time: FrameTime,
    pose: Option<ViewerPose>,
}

impl XrFrame {
    pub fn new(session: SessionId, time: FrameTime, pose: Option<ViewerPose>) -> Self {
        Self {
            session,
            time,
            pose,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn time(&self) -> FrameTime {
        self.time
    }

    pub fn viewer_pose(&self, space: &ReferenceSpace) -> Option<&ViewerPose> {
        if space.session != self.session {
            return None;
        }
        self.pose.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layer {
    pub framebuffer: FramebufferHandle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub base_layer: Option<Layer>,
    pub depth_near: f32,
    pub depth_far: f32,
}

impl RenderState {
    pub fn with_layer(layer: Layer) -> Self {
        Self {
            base_layer: Some(layer),
            ..Self::default()
        }
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            base_layer: None,
            depth_near: 0.1,
            depth_far: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Click,
    Touch,
    Key,
}

/// Proof that a session request originates from a user gesture. Platforms
/// refuse immersive sessions started programmatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserActivation {
    gesture: Gesture,
}

impl UserActivation {
    pub fn from_gesture(gesture: Gesture) -> Self {
        Self { gesture }
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FramePoll {
    Ready(XrFrame),
    /// No callback registered, nothing will be delivered.
    Idle,
    Ended,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum XrError {
    #[error("xr api unavailable")]
    ApiUnavailable,
    #[error("{0} sessions are not supported")]
    UnsupportedMode(SessionMode),
    #[error("{mode} session denied: {reason}")]
    PlatformDenied { mode: SessionMode, reason: String },
    #[error("reference space {0} is not supported")]
    UnsupportedSpace(ReferenceSpaceType),
    #[error("{0} has already ended")]
    SessionEnded(SessionId),
    #[error("layer creation failed: {0}")]
    LayerCreation(String),
    #[error("xr runtime error: {0}")]
    Runtime(String),
}

pub type XrResult<T> = Result<T, XrError>;

pub trait XrSystem {
    fn label(&self) -> &'static str;
    fn is_session_supported(&self, mode: SessionMode) -> impl Future<Output = XrResult<bool>>;
}

pub trait XrPlatform: XrSystem {
    type Session: XrSession;

    fn request_session(
        &self,
        mode: SessionMode,
        activation: &UserActivation,
    ) -> impl Future<Output = XrResult<Self::Session>>;
}

/// Display-driven source of frames. Every registration yields at most one
/// frame; a frame is only delivered while a registration is outstanding.
pub trait FrameSource {
    fn request_animation_frame(&mut self) -> FrameRequestId;
    fn poll_frame(&mut self) -> FramePoll;
}

pub trait XrSession: FrameSource {
    fn id(&self) -> SessionId;
    fn mode(&self) -> SessionMode;
    fn create_layer(&mut self, context: &GraphicsContext) -> XrResult<Layer>;
    fn update_render_state(&mut self, state: RenderState) -> XrResult<()>;
    fn render_state(&self) -> &RenderState;
    fn request_reference_space(
        &mut self,
        kind: ReferenceSpaceType,
    ) -> impl Future<Output = XrResult<ReferenceSpace>>;
    fn end(&mut self);
    fn is_ended(&self) -> bool;
}

pub fn identity_matrix() -> Matrix4 {
    [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]
}

pub fn multiply(a: &Matrix4, b: &Matrix4) -> Matrix4 {
    let mut out = [0.0; 16];
    for col in 0..4 {
        for row in 0..4 {
            out[col * 4 + row] = (0..4).map(|k| a[k * 4 + row] * b[col * 4 + k]).sum();
        }
    }
    out
}

/// Inverse of a rotation + translation matrix.
pub fn rigid_inverse(m: &Matrix4) -> Matrix4 {
    let mut out = identity_matrix();
    for row in 0..3 {
        for col in 0..3 {
            out[col * 4 + row] = m[row * 4 + col];
        }
    }
    for row in 0..3 {
        out[12 + row] = -(0..3).map(|k| out[k * 4 + row] * m[12 + k]).sum::<f32>();
    }
    out
}

pub fn perspective(fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Matrix4 {
    let f = 1.0 / (fov_y_radians / 2.0).tan();
    let range = 1.0 / (near - far);
    [
        f / aspect, 0.0, 0.0, 0.0, //
        0.0, f, 0.0, 0.0, //
        0.0, 0.0, (far + near) * range, -1.0, //
        0.0, 0.0, 2.0 * far * near * range, 0.0,
    ]
}
