mod common;

use ar_viewer::session::FramePump;
use ar_viewer::xr::simulated::{SimulatedConfig, pose_at};
use ar_viewer::xr::{Gesture, PlatformEvent, UserActivation, ViewerPose, Viewport};
use common::build_app;
use pollster::block_on;
use proptest::prelude::*;

fn frame_strategy() -> impl Strategy<Value = Option<ViewerPose>> {
    prop::option::of(
        (
            -5.0f32..5.0,
            0.0f32..3.0,
            -5.0f32..5.0,
            1u32..4096,
            1u32..4096,
        )
            .prop_map(|(x, y, z, width, height)| pose_at([x, y, z], Viewport::new(0, 0, width, height))),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_frame_reregisters_before_rendering(frames in prop::collection::vec(frame_strategy(), 1..40)) {
        let posed = frames.iter().filter(|frame| frame.is_some()).count();
        let (mut app, platform) = build_app(SimulatedConfig::default().with_frames(frames.clone()));
        block_on(app.start());
        block_on(app.enter_ar(UserActivation::from_gesture(Gesture::Click))).expect("session starts");

        let summary = app.run_until_ended(None).expect("loop runs");
        prop_assert_eq!(summary.frames as usize, frames.len());
        prop_assert_eq!(summary.rendered as usize, posed);

        let trace = platform.trace();
        let delivered = trace.iter().filter(|event| matches!(event, PlatformEvent::FrameDelivered(_))).count();
        let requested = trace.iter().filter(|event| matches!(event, PlatformEvent::AnimationFrameRequested(_))).count();
        prop_assert_eq!(delivered, frames.len());
        // One registration on activation plus one per delivered frame.
        prop_assert_eq!(requested, frames.len() + 1);

        for window in trace.windows(2) {
            if let PlatformEvent::FrameDelivered(_) = window[0] {
                prop_assert!(matches!(window[1], PlatformEvent::AnimationFrameRequested(_)));
            }
        }
        prop_assert_eq!(app.renderer().renders_after_reregistration, posed);
    }

    #[test]
    fn camera_follows_posed_frames_and_holds_through_gaps(frames in prop::collection::vec(frame_strategy(), 1..40)) {
        let (mut app, _platform) = build_app(SimulatedConfig::default().with_frames(frames.clone()));
        block_on(app.start());
        block_on(app.enter_ar(UserActivation::from_gesture(Gesture::Touch))).expect("session starts");

        let mut expected = *app.controller().camera().expect("active camera");
        for frame in &frames {
            let renders_before = app.renderer().render_count();
            let pump = app.pump_frame().expect("frame pumps");
            let camera = *app.controller().camera().expect("active camera");

            match frame {
                Some(pose) => {
                    let view = &pose.views[0];
                    prop_assert_eq!(pump, FramePump::Rendered(view.viewport));
                    prop_assert_eq!(camera.matrix, view.transform.matrix());
                    prop_assert_eq!(camera.projection, view.projection);
                    prop_assert_eq!(app.renderer().render_count(), renders_before + 1);
                    prop_assert_eq!(
                        app.renderer().sizes.last().copied(),
                        Some([view.viewport.width, view.viewport.height])
                    );
                    expected = camera;
                }
                None => {
                    prop_assert!(matches!(pump, FramePump::Skipped(_)));
                    prop_assert_eq!(camera, expected);
                    prop_assert_eq!(app.renderer().render_count(), renders_before);
                }
            }
        }
    }
}
