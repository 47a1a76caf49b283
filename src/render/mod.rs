pub mod scene;
pub mod surface;

use crate::xr::{FramebufferHandle, Matrix4, View, identity_matrix, rigid_inverse};
use scene::Scene;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Transparent clear so the camera feed shows through.
    pub alpha: bool,
    pub preserve_drawing_buffer: bool,
    /// The session compositor owns clearing of the layer framebuffer.
    pub auto_clear: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            alpha: true,
            preserve_drawing_buffer: true,
            auto_clear: false,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("no framebuffer bound")]
    NoFramebuffer,
    #[error("gpu backend failure: {0}")]
    Backend(String),
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Camera driven entirely by tracking data: nothing is simulated locally and
/// every posed frame overwrites it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub matrix: Matrix4,
    pub projection: Matrix4,
    matrix_world: Matrix4,
    matrix_world_inverse: Matrix4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            matrix: identity_matrix(),
            projection: identity_matrix(),
            matrix_world: identity_matrix(),
            matrix_world_inverse: identity_matrix(),
        }
    }
}

impl Camera {
    pub fn apply_view(&mut self, view: &View) {
        self.matrix = view.transform.matrix();
        self.projection = view.projection;
        self.update_matrix_world();
    }

    pub fn update_matrix_world(&mut self) {
        self.matrix_world = self.matrix;
        self.matrix_world_inverse = rigid_inverse(&self.matrix_world);
    }

    pub fn matrix_world(&self) -> Matrix4 {
        self.matrix_world
    }

    /// World-to-camera transform used for drawing.
    pub fn view_matrix(&self) -> Matrix4 {
        self.matrix_world_inverse
    }
}

pub trait Renderer {
    fn label(&self) -> &'static str;
    fn set_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);
    fn set_size(&mut self, width: u32, height: u32);
    fn render(&mut self, scene: &Scene, camera: &Camera) -> RenderResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderRecord {
    pub framebuffer: FramebufferHandle,
    pub size: [u32; 2],
    pub camera: Camera,
    pub node_count: usize,
}

/// Renderer that draws nothing. Keeps the last bound target and a record of
/// every render call so hosts without a GPU can still run the loop.
#[derive(Debug, Default)]
pub struct NullRenderer {
    config: RendererConfig,
    framebuffer: Option<FramebufferHandle>,
    size: [u32; 2],
    records: Vec<RenderRecord>,
    fail_at: Option<usize>,
}

impl NullRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The render call with this zero-based index reports a backend failure.
    pub fn failing_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn framebuffer(&self) -> Option<FramebufferHandle> {
        self.framebuffer
    }

    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    pub fn records(&self) -> &[RenderRecord] {
        &self.records
    }

    pub fn render_count(&self) -> usize {
        self.records.len()
    }
}

impl Renderer for NullRenderer {
    fn label(&self) -> &'static str {
        "Null Renderer"
    }

    fn set_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.framebuffer = framebuffer;
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.size = [width, height];
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) -> RenderResult<()> {
        let framebuffer = self.framebuffer.ok_or(RenderError::NoFramebuffer)?;
        // Zero-area viewports show up transiently while the device resizes.
        if self.size[0] == 0 || self.size[1] == 0 {
            log::trace!("[renderer] zero-area target {:?}; nothing drawn", self.size);
            return Ok(());
        }
        if self.fail_at == Some(self.records.len()) {
            self.fail_at = None;
            return Err(RenderError::Backend("simulated device loss".to_string()));
        }

        log::trace!(
            "[renderer] {} nodes into framebuffer {} at {:?}",
            scene.len(),
            framebuffer.raw(),
            self.size
        );
        self.records.push(RenderRecord {
            framebuffer,
            size: self.size,
            camera: *camera,
            node_count: scene.len(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xr::{Eye, RigidTransform, Viewport, perspective};

    fn view_at(position: [f32; 3]) -> View {
        View {
            eye: Eye::None,
            transform: RigidTransform::from_translation(position),
            projection: perspective(1.0, 1.5, 0.1, 100.0),
            viewport: Viewport::new(0, 0, 300, 200),
        }
    }

    #[test]
    fn camera_takes_view_matrices_verbatim() {
        let mut camera = Camera::default();
        let view = view_at([0.5, 1.6, -2.0]);
        camera.apply_view(&view);

        assert_eq!(camera.matrix, view.transform.matrix());
        assert_eq!(camera.projection, view.projection);
        assert_eq!(camera.matrix_world(), view.transform.matrix());
        assert_eq!(camera.view_matrix()[12..15], [-0.5, -1.6, 2.0]);
    }

    #[test]
    fn zero_area_target_draws_nothing() {
        let mut renderer = NullRenderer::default();
        renderer.set_framebuffer(Some(FramebufferHandle::new(3)));
        renderer.set_size(0, 0);
        assert_eq!(renderer.render(&Scene::default(), &Camera::default()), Ok(()));
        assert_eq!(renderer.render_count(), 0);

        renderer.set_size(640, 480);
        assert_eq!(renderer.render(&Scene::default(), &Camera::default()), Ok(()));
        assert_eq!(renderer.render_count(), 1);
    }

    #[test]
    fn null_renderer_requires_bound_target() {
        let mut renderer = NullRenderer::default();
        let err = renderer
            .render(&Scene::default(), &Camera::default())
            .unwrap_err();
        assert_eq!(err, RenderError::NoFramebuffer);

        renderer.set_framebuffer(Some(FramebufferHandle::new(7)));
        renderer.set_size(640, 480);
        renderer
            .render(&Scene::default(), &Camera::default())
            .expect("render succeeds");
        assert_eq!(renderer.render_count(), 1);
        assert_eq!(renderer.records()[0].size, [640, 480]);
    }

    #[test]
    fn default_config_matches_passthrough_compositing() {
        let config = RendererConfig::default();
        assert!(config.alpha);
        assert!(config.preserve_drawing_buffer);
        assert!(!config.auto_clear);
    }
}
