//! End-to-end capture pipeline tests against a scripted device bridge.

use mixcap::bridge::mock::MockBridge;
use mixcap::bridge::{FeatureFlags, WireClipPlane, WireInputFrame, WirePose};
use mixcap::foundation::convert::{DeviceMatrix4, DeviceVector3};
use mixcap::prelude::*;
use mixcap::render::target::{RenderTarget, TargetKey};

/// Flat backdrop with a nearer blob of geometry in the image center.
struct BlobScene;

impl SceneSource for BlobScene {
    fn render(
        &mut self,
        view: &CaptureView,
        color: &mut RenderTarget,
        depth: &mut RenderTarget,
    ) {
        let (w, h) = color.dimensions();
        for y in 0..h {
            for x in 0..w {
                let center = x.abs_diff(w / 2) < w / 8 && y.abs_diff(h / 2) < h / 8;
                let (px_color, px_depth) = if center {
                    ([0.9, 0.3, 0.3, 1.0], 50.0)
                } else {
                    ([0.1, 0.1, 0.6, 1.0], 800.0)
                };
                if let Some(plane) = &view.clip_plane {
                    // Exclude geometry behind the plane from clipped renders
                    let camera_distance =
                        (plane.position - view.camera.position).norm();
                    if px_depth > camera_distance {
                        continue;
                    }
                }
                color.write(x, y, px_color);
                depth.write(x, y, [px_depth, 0.0, 0.0, 1.0]);
            }
        }
    }
}

fn wire_frame(width: u32, height: u32) -> WireInputFrame {
    let mut clip = DeviceMatrix4::default();
    // One meter ahead of the camera, at head height, scaled up far enough
    // to span the whole view
    clip.m[0][0] = 40.0;
    clip.m[1][1] = 40.0;
    clip.m[2][2] = 40.0;
    clip.m[1][3] = 1.7;
    clip.m[2][3] = 1.0;
    WireInputFrame {
        pose: WirePose {
            position: DeviceVector3 {
                x: 0.0,
                y: 1.7,
                z: 0.0,
            },
            vertical_fov: 59.0,
            ..WirePose::default()
        },
        width,
        height,
        camera_clip_plane: WireClipPlane {
            transform: clip,
            ..WireClipPlane::default()
        },
        features: FeatureFlags::FLOOR_CLIP_PLANE,
        ..WireInputFrame::default()
    }
}

fn session_with_frames(
    settings: CaptureSettings,
    frames: &[WireInputFrame],
) -> CaptureSession<MockBridge> {
    let mut bridge = MockBridge::new();
    bridge.set_active(true);
    for frame in frames {
        bridge.push_frame(*frame);
    }
    CaptureSession::connect(bridge, settings, ApplicationMetadata::default())
        .expect("mock runtime connects")
}

fn submissions(session: &CaptureSession<MockBridge>) -> &[SubmittedFrame] {
    session.orchestrator().pose_source().bridge().submissions()
}

#[test]
fn single_strategy_happy_path() {
    let settings = CaptureSettings {
        strategy: Strategy::Single,
        ..CaptureSettings::default()
    };
    let frames = [wire_frame(1920, 1080), wire_frame(1920, 1080)];
    let mut session = session_with_frames(settings, &frames);

    session.tick(&mut BlobScene, &CaptureContext::new());
    assert!(session.is_capturing());
    assert_eq!(
        session.orchestrator().target_dimensions(),
        Some((1920, 1080))
    );

    let submitted = submissions(&session);
    assert_eq!(submitted.len(), 1);
    assert!(submitted[0].foreground.is_some());
}

#[test]
fn multi_strategy_submits_exactly_one_pair_per_tick() {
    let settings = CaptureSettings {
        strategy: Strategy::Multi,
        ..CaptureSettings::default()
    };
    let frames = vec![wire_frame(320, 180); 6];
    let mut session = session_with_frames(settings, &frames);

    let context = CaptureContext::new();
    for _ in 0..5 {
        session.tick(&mut BlobScene, &context);
    }

    let submitted = submissions(&session);
    assert_eq!(submitted.len(), 5);
    for pair in submitted.windows(2) {
        assert!(pair[1].frame_number > pair[0].frame_number);
    }
    for frame in submitted {
        assert!(frame.foreground.is_some());
        assert_ne!(frame.foreground, Some(frame.background));
    }
}

#[test]
fn dimension_change_rebuilds_before_further_output() {
    let settings = CaptureSettings {
        strategy: Strategy::Multi,
        ..CaptureSettings::default()
    };
    let frames = [
        wire_frame(1920, 1080),
        wire_frame(1920, 1080),
        wire_frame(1280, 720),
    ];
    let mut session = session_with_frames(settings, &frames);
    let context = CaptureContext::new();

    session.tick(&mut BlobScene, &context);
    assert_eq!(
        session.orchestrator().target_dimensions(),
        Some((1920, 1080))
    );

    session.tick(&mut BlobScene, &context);
    assert_eq!(
        session.orchestrator().target_dimensions(),
        Some((1280, 720))
    );
    assert_eq!(submissions(&session).len(), 2);
}

#[test]
fn pose_failure_drops_the_tick_then_recovers() {
    let settings = CaptureSettings {
        strategy: Strategy::Multi,
        ..CaptureSettings::default()
    };
    // Activation frame plus one good capture; the third tick has nothing
    let frames = [wire_frame(320, 180), wire_frame(320, 180)];
    let mut session = session_with_frames(settings, &frames);
    let context = CaptureContext::new();

    session.tick(&mut BlobScene, &context);
    assert_eq!(submissions(&session).len(), 1);

    session.tick(&mut BlobScene, &context);
    assert_eq!(submissions(&session).len(), 1);
    assert!(session.is_capturing());

    session
        .orchestrator_mut()
        .pose_source_mut()
        .bridge_mut()
        .push_frame(wire_frame(320, 180));
    session.tick(&mut BlobScene, &context);
    assert_eq!(submissions(&session).len(), 2);
}

#[test]
fn deactivation_releases_targets_and_reactivation_starts_clean() {
    let settings = CaptureSettings {
        strategy: Strategy::Multi,
        ..CaptureSettings::default()
    };
    let frames = vec![wire_frame(320, 180); 4];
    let mut session = session_with_frames(settings, &frames);
    let context = CaptureContext::new();

    session.tick(&mut BlobScene, &context);
    assert!(session.is_capturing());

    session
        .orchestrator_mut()
        .pose_source_mut()
        .bridge_mut()
        .set_active(false);
    session.tick(&mut BlobScene, &context);
    assert!(!session.is_capturing());
    assert!(session.orchestrator().pool().is_empty());

    session
        .orchestrator_mut()
        .pose_source_mut()
        .bridge_mut()
        .set_active(true);
    session.tick(&mut BlobScene, &context);
    assert!(session.is_capturing());
    assert_eq!(submissions(&session).len(), 2);
}

#[test]
fn background_only_mode_submits_background_alone() {
    let settings = CaptureSettings {
        strategy: Strategy::Combo,
        background_only: true,
        ..CaptureSettings::default()
    };
    let frames = [wire_frame(320, 180), wire_frame(320, 180)];
    let mut session = session_with_frames(settings, &frames);

    session.tick(&mut BlobScene, &CaptureContext::new());
    let submitted = submissions(&session);
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].foreground, None);
}

#[test]
fn single_strategy_segments_foreground_from_background() {
    let settings = CaptureSettings {
        strategy: Strategy::Single,
        ..CaptureSettings::default()
    };
    let frames = [wire_frame(64, 64), wire_frame(64, 64)];
    let mut session = session_with_frames(settings, &frames);

    session.tick(&mut BlobScene, &CaptureContext::new());
    let submitted = submissions(&session).to_vec();
    assert_eq!(submitted.len(), 1);

    // The clip plane sits one meter out and spans the view. The nearer
    // center blob keeps its rendered depth and classifies foreground; the
    // plane displaces the backdrop's depth, which classifies background.
    let pool = session.orchestrator().pool();
    let foreground =
        TargetKey::from_identity(submitted[0].foreground.unwrap());
    let foreground = pool.get(foreground).expect("foreground target is live");
    assert_eq!(foreground.read(32, 32)[3], 1.0);
    assert!(foreground.read(32, 32)[0] > 0.5);
    assert_eq!(foreground.read(1, 1)[3], 0.0);

    let background =
        TargetKey::from_identity(submitted[0].background);
    let background = pool.get(background).expect("background target is live");
    // Background keeps the full scene, backdrop included
    assert!(background.read(1, 1)[2] > 0.0);
}

/// A frame whose camera plane covers only the view center while a wide
/// floor plane lies underfoot.
fn frame_with_floor(floor_enabled: bool) -> WireInputFrame {
    let mut camera_clip = DeviceMatrix4::default();
    camera_clip.m[1][3] = 1.7;
    camera_clip.m[2][3] = 1.0;

    // The floor's up axis is device +Y; the permuted host forward comes
    // out as world up
    let mut floor = DeviceMatrix4 { m: [[0.0; 4]; 4] };
    floor.m[0][0] = 40.0;
    floor.m[1][2] = 40.0;
    floor.m[2][1] = 40.0;
    floor.m[3][3] = 1.0;

    WireInputFrame {
        pose: WirePose {
            position: DeviceVector3 {
                x: 0.0,
                y: 1.7,
                z: 0.0,
            },
            vertical_fov: 59.0,
            ..WirePose::default()
        },
        width: 64,
        height: 64,
        camera_clip_plane: WireClipPlane {
            transform: camera_clip,
            ..WireClipPlane::default()
        },
        floor_clip_plane: WireClipPlane {
            transform: floor,
            ..WireClipPlane::default()
        },
        features: if floor_enabled {
            FeatureFlags::FLOOR_CLIP_PLANE
        } else {
            FeatureFlags::empty()
        },
        ..WireInputFrame::default()
    }
}

fn single_foreground_alpha_at(frame: WireInputFrame, x: u32, y: u32) -> f32 {
    let settings = CaptureSettings {
        strategy: Strategy::Single,
        ..CaptureSettings::default()
    };
    let mut session = session_with_frames(settings, &[frame, frame]);
    session.tick(&mut BlobScene, &CaptureContext::new());

    let submitted = submissions(&session).to_vec();
    assert_eq!(submitted.len(), 1);
    let pool = session.orchestrator().pool();
    let foreground =
        TargetKey::from_identity(submitted[0].foreground.unwrap());
    pool.get(foreground)
        .expect("foreground target is live")
        .read(x, y)[3]
}

#[test]
fn single_strategy_floor_plane_clips_ground_geometry() {
    // A downward pixel outside the camera plane's extents: only the floor
    // plane can displace its depth
    let with_floor = single_foreground_alpha_at(frame_with_floor(true), 32, 60);
    assert_eq!(with_floor, 0.0);

    // With the device's floor bit cleared the same pixel stays foreground
    let without_floor =
        single_foreground_alpha_at(frame_with_floor(false), 32, 60);
    assert_eq!(without_floor, 1.0);
}
