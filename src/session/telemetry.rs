use crate::session::EndReason;
use crate::session::frame_loop::FrameSkip;
use crate::xr::{FrameTime, SessionId, Viewport};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub session: Option<u64>,
    pub frames_delivered: u64,
    pub frames_rendered: u64,
    pub frames_without_pose: u64,
    pub frames_without_views: u64,
    pub frame_faults: u64,
    pub longest_tracking_gap: u64,
    pub average_frame_interval_ms: f64,
    pub last_viewport: Option<Viewport>,
    pub end_reason: Option<EndReason>,
}

/// Per-session frame statistics. Reset whenever a new session activates.
#[derive(Debug, Default)]
pub struct SessionTelemetry {
    session: Option<SessionId>,
    frames_delivered: u64,
    frames_rendered: u64,
    frames_without_pose: u64,
    frames_without_views: u64,
    frame_faults: u64,
    tracking_gap: u64,
    longest_tracking_gap: u64,
    first_time: Option<FrameTime>,
    last_time: Option<FrameTime>,
    last_viewport: Option<Viewport>,
    end_reason: Option<EndReason>,
}

impl SessionTelemetry {
    pub fn begin(&mut self, session: SessionId) {
        *self = Self {
            session: Some(session),
            ..Self::default()
        };
    }

    pub fn record_delivery(&mut self, time: FrameTime) {
        self.frames_delivered += 1;
        self.first_time.get_or_insert(time);
        self.last_time = Some(time);
    }

    pub fn record_render(&mut self, viewport: Viewport) {
        self.frames_rendered += 1;
        self.tracking_gap = 0;
        self.last_viewport = Some(viewport);
    }

    pub fn record_skip(&mut self, skip: FrameSkip) {
        match skip {
            FrameSkip::TrackingUnresolved => {
                self.frames_without_pose += 1;
                self.tracking_gap += 1;
                self.longest_tracking_gap = self.longest_tracking_gap.max(self.tracking_gap);
            }
            FrameSkip::NoViews => self.frames_without_views += 1,
        }
    }

    pub fn record_fault(&mut self) {
        self.frame_faults += 1;
    }

    pub fn record_end(&mut self, reason: EndReason) {
        self.end_reason = Some(reason);
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn frames_without_pose(&self) -> u64 {
        self.frames_without_pose
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn average_frame_interval_ms(&self) -> f64 {
        match (self.first_time, self.last_time) {
            (Some(first), Some(last)) if self.frames_delivered > 1 => {
                (last.millis() - first.millis()) / (self.frames_delivered - 1) as f64
            }
            _ => 0.0,
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            session: self.session.map(SessionId::raw),
            frames_delivered: self.frames_delivered,
            frames_rendered: self.frames_rendered,
            frames_without_pose: self.frames_without_pose,
            frames_without_views: self.frames_without_views,
            frame_faults: self.frame_faults,
            longest_tracking_gap: self.longest_tracking_gap,
            average_frame_interval_ms: self.average_frame_interval_ms(),
            last_viewport: self.last_viewport,
            end_reason: self.end_reason,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.snapshot())
    }
}
