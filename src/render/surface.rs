use crate::xr::{FramebufferHandle, Layer, RenderState, XrError, XrSession};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

impl SurfaceId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextAttributes {
    pub alpha: bool,
    pub antialias: bool,
    pub xr_compatible: bool,
}

impl Default for ContextAttributes {
    fn default() -> Self {
        Self {
            alpha: true,
            antialias: true,
            xr_compatible: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsContext {
    id: ContextId,
    surface: SurfaceId,
    attributes: ContextAttributes,
}

impl GraphicsContext {
    pub fn new(id: ContextId, surface: SurfaceId, attributes: ContextAttributes) -> Self {
        Self {
            id,
            surface,
            attributes,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub fn attributes(&self) -> ContextAttributes {
        self.attributes
    }

    pub fn is_xr_compatible(&self) -> bool {
        self.attributes.xr_compatible
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SurfaceError {
    #[error("surface creation failed: {0}")]
    SurfaceCreation(String),
    #[error("context creation failed: {0}")]
    ContextCreation(String),
    #[error("session rejected render target: {0}")]
    Session(#[from] XrError),
}

/// Drawable target bound to a session: the surface, its context, and the
/// session layer's framebuffer. Pixel size tracks the active view's viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsSurface {
    context: GraphicsContext,
    layer: Layer,
    size: [u32; 2],
}

impl GraphicsSurface {
    pub fn surface_id(&self) -> SurfaceId {
        self.context.surface()
    }

    pub fn context(&self) -> &GraphicsContext {
        &self.context
    }

    pub fn framebuffer(&self) -> FramebufferHandle {
        self.layer.framebuffer
    }

    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    /// Returns whether the size changed.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.size == [width, height] {
            return false;
        }
        log::debug!(
            "[surface] {} resized {:?} -> {:?}",
            self.surface_id().raw(),
            self.size,
            [width, height]
        );
        self.size = [width, height];
        true
    }
}

pub trait GraphicsContextProvider {
    fn label(&self) -> &'static str;
    fn create_surface(&mut self) -> Result<SurfaceId, SurfaceError>;
    fn create_context(
        &mut self,
        surface: SurfaceId,
        attributes: ContextAttributes,
    ) -> Result<GraphicsContext, SurfaceError>;
    fn bind_framebuffer(&mut self, context: &GraphicsContext, framebuffer: FramebufferHandle);
    fn release_surface(&mut self, surface: SurfaceId);
}

/// Creates the session's render target and registers it in a single render
/// state update. Must run once per session, before any frame is requested.
pub fn bind_surface<S, G>(
    session: &mut S,
    provider: &mut G,
    attributes: ContextAttributes,
) -> Result<GraphicsSurface, SurfaceError>
where
    S: XrSession,
    G: GraphicsContextProvider + ?Sized,
{
    if !attributes.xr_compatible {
        log::debug!("[surface] forcing xr_compatible context for {}", session.id());
    }
    let attributes = ContextAttributes {
        xr_compatible: true,
        ..attributes
    };

    let surface = provider.create_surface()?;
    let context = match provider.create_context(surface, attributes) {
        Ok(context) => context,
        Err(err) => {
            provider.release_surface(surface);
            return Err(err);
        }
    };

    let layer = match session
        .create_layer(&context)
        .and_then(|layer| session.update_render_state(RenderState::with_layer(layer)).map(|_| layer))
    {
        Ok(layer) => layer,
        Err(err) => {
            provider.release_surface(surface);
            return Err(err.into());
        }
    };

    log::info!(
        "[surface] {} bound surface {} (context {}, framebuffer {}) via {}",
        session.id(),
        surface.raw(),
        context.id().raw(),
        layer.framebuffer.raw(),
        provider.label()
    );

    Ok(GraphicsSurface {
        context,
        layer,
        size: [0, 0],
    })
}

/// Context provider without a window system. Hands out sequential ids and
/// remembers what was bound and released.
#[derive(Debug, Default)]
pub struct HeadlessContextProvider {
    next_id: u64,
    live_surfaces: Vec<SurfaceId>,
    bound_framebuffer: Option<FramebufferHandle>,
    bind_count: u64,
    context_failure: Option<String>,
}

impl HeadlessContextProvider {
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            context_failure: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn live_surfaces(&self) -> &[SurfaceId] {
        &self.live_surfaces
    }

    pub fn surfaces_created(&self) -> u64 {
        self.next_id
    }

    pub fn bound_framebuffer(&self) -> Option<FramebufferHandle> {
        self.bound_framebuffer
    }

    pub fn bind_count(&self) -> u64 {
        self.bind_count
    }
}

impl GraphicsContextProvider for HeadlessContextProvider {
    fn label(&self) -> &'static str {
        "Headless Context Provider"
    }

    fn create_surface(&mut self) -> Result<SurfaceId, SurfaceError> {
        self.next_id += 1;
        let surface = SurfaceId::new(self.next_id);
        self.live_surfaces.push(surface);
        Ok(surface)
    }

    fn create_context(
        &mut self,
        surface: SurfaceId,
        attributes: ContextAttributes,
    ) -> Result<GraphicsContext, SurfaceError> {
        if let Some(reason) = &self.context_failure {
            return Err(SurfaceError::ContextCreation(reason.clone()));
        }
        Ok(GraphicsContext::new(
            ContextId::new(surface.raw()),
            surface,
            attributes,
        ))
    }

    fn bind_framebuffer(&mut self, _context: &GraphicsContext, framebuffer: FramebufferHandle) {
        self.bound_framebuffer = Some(framebuffer);
        self.bind_count += 1;
    }

    fn release_surface(&mut self, surface: SurfaceId) {
        self.live_surfaces.retain(|live| *live != surface);
        if self.live_surfaces.is_empty() {
            self.bound_framebuffer = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xr::simulated::{SimulatedConfig, SimulatedPlatform};
    use crate::xr::{Gesture, SessionMode, UserActivation, XrPlatform};
    use pollster::block_on;

    fn session(platform: &SimulatedPlatform) -> crate::xr::SimulatedSession {
        block_on(platform.request_session(
            SessionMode::ImmersiveAr,
            &UserActivation::from_gesture(Gesture::Touch),
        ))
        .expect("session granted")
    }

    #[test]
    fn binding_registers_layer_in_render_state() {
        let platform = SimulatedPlatform::default();
        let mut session = session(&platform);
        let mut provider = HeadlessContextProvider::default();

        let surface = bind_surface(&mut session, &mut provider, ContextAttributes::default())
            .expect("surface binds");

        let layer = session.render_state().base_layer.expect("layer registered");
        assert_eq!(layer.framebuffer, surface.framebuffer());
        assert_eq!(provider.live_surfaces(), &[surface.surface_id()]);
    }

    #[test]
    fn binding_forces_xr_compatibility() {
        let platform = SimulatedPlatform::default();
        let mut session = session(&platform);
        let mut provider = HeadlessContextProvider::default();
        let attributes = ContextAttributes {
            xr_compatible: false,
            ..ContextAttributes::default()
        };

        let surface = bind_surface(&mut session, &mut provider, attributes).expect("surface binds");
        assert!(surface.context().is_xr_compatible());
    }

    #[test]
    fn failed_layer_releases_surface() {
        let platform =
            SimulatedPlatform::new(SimulatedConfig::default().with_layer_failure("no gpu"));
        let mut session = session(&platform);
        let mut provider = HeadlessContextProvider::default();

        let err = bind_surface(&mut session, &mut provider, ContextAttributes::default())
            .unwrap_err();
        assert!(matches!(err, SurfaceError::Session(XrError::LayerCreation(_))));
        assert!(provider.live_surfaces().is_empty());
    }

    #[test]
    fn resize_reports_changes_only() {
        let platform = SimulatedPlatform::default();
        let mut session = session(&platform);
        let mut provider = HeadlessContextProvider::default();
        let mut surface = bind_surface(&mut session, &mut provider, ContextAttributes::default())
            .expect("surface binds");

        assert!(surface.resize(800, 600));
        assert!(!surface.resize(800, 600));
        assert_eq!(surface.size(), [800, 600]);
    }
}
