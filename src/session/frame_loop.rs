//! The per-frame step. Side effects (re-registration, binding, drawing) are
//! applied by the controller; this module only decides what a frame does.

use crate::render::Camera;
use crate::xr::{FrameTime, FramebufferHandle, ReferenceSpace, Viewport, XrFrame};
use serde::Serialize;

/// Render-side state carried from one frame to the next.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameLoopState {
    camera: Camera,
    size: [u32; 2],
    last_time: Option<FrameTime>,
    frames: u64,
}

impl FrameLoopState {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            ..Self::default()
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    pub fn last_time(&self) -> Option<FrameTime> {
        self.last_time
    }

    /// Frames processed, posed or not.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameSkip {
    /// Tracking has not produced a pose yet. Not an error.
    TrackingUnresolved,
    NoViews,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderCommand {
    pub framebuffer: FramebufferHandle,
    pub viewport: Viewport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    Render(RenderCommand),
    Skip(FrameSkip),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStep {
    pub state: FrameLoopState,
    pub disposition: FrameDisposition,
}

/// Resolves the frame's pose against `space` and derives the next state.
/// Without a pose the camera and size are left untouched.
pub fn advance(
    state: FrameLoopState,
    frame: &XrFrame,
    space: &ReferenceSpace,
    framebuffer: FramebufferHandle,
) -> FrameStep {
    let mut next = state;
    next.frames += 1;

    if let Some(previous) = state.last_time {
        if frame.time() <= previous {
            log::warn!(
                "[frame] time went from {:.3} ms to {:.3} ms",
                previous.millis(),
                frame.time().millis()
            );
        }
    }
    next.last_time = Some(frame.time());

    let Some(pose) = frame.viewer_pose(space) else {
        log::trace!(
            "[frame] {} at {:.3} ms has no pose in {} space",
            next.frames,
            frame.time().millis(),
            space.kind()
        );
        return FrameStep {
            state: next,
            disposition: FrameDisposition::Skip(FrameSkip::TrackingUnresolved),
        };
    };

    let Some(view) = pose.primary_view() else {
        log::debug!("[frame] {} pose carried no views", next.frames);
        return FrameStep {
            state: next,
            disposition: FrameDisposition::Skip(FrameSkip::NoViews),
        };
    };

    next.size = [view.viewport.width, view.viewport.height];
    next.camera.apply_view(view);

    FrameStep {
        state: next,
        disposition: FrameDisposition::Render(RenderCommand {
            framebuffer,
            viewport: view.viewport,
        }),
    }
}
