//! Capture demo application
//!
//! Drives a full capture session against a scripted device bridge and a
//! small procedural scene: a ground plane plus a sphere sitting in front
//! of the camera. Each tick the device requests a slightly different pose,
//! and the session submits paired foreground/background frames.

use mixcap::bridge::mock::MockBridge;
use mixcap::bridge::{FeatureFlags, WireClipPlane, WireInputFrame, WirePose};
use mixcap::foundation::convert::{DeviceMatrix4, DeviceQuaternion, DeviceVector3};
use mixcap::prelude::*;
use mixcap::render::target::RenderTarget;

const TICKS: u64 = 120;
const WIDTH: u32 = 320;
const HEIGHT: u32 = 180;

/// A sphere over a ground plane, rendered by ray marching per pixel.
struct ProceduralScene {
    sphere_center: Vec3,
    sphere_radius: f32,
}

impl ProceduralScene {
    fn new() -> Self {
        Self {
            sphere_center: Vec3::new(300.0, 0.0, 100.0),
            sphere_radius: 60.0,
        }
    }

    fn trace(&self, origin: Vec3, dir: Vec3) -> Option<(f32, [f32; 4])> {
        let mut hit: Option<(f32, [f32; 4])> = None;

        // Sphere
        let oc = origin - self.sphere_center;
        let b = oc.dot(&dir);
        let c = oc.dot(&oc) - self.sphere_radius * self.sphere_radius;
        let disc = b * b - c;
        if disc > 0.0 {
            let t = -b - disc.sqrt();
            if t > 0.0 {
                hit = Some((t, [0.9, 0.4, 0.2, 1.0]));
            }
        }

        // Ground plane at z = -100
        if dir.z < -1e-4 {
            let t = (-100.0 - origin.z) / dir.z;
            if t > 0.0 && hit.map_or(true, |(ht, _)| t < ht) {
                hit = Some((t, [0.2, 0.5, 0.3, 1.0]));
            }
        }
        hit
    }
}

impl SceneSource for ProceduralScene {
    fn render(
        &mut self,
        view: &CaptureView,
        color: &mut RenderTarget,
        depth: &mut RenderTarget,
    ) {
        let (w, h) = color.dimensions();
        let forward = view.camera.rotation * Vec3::x();
        let right = view.camera.rotation * Vec3::y();
        let up = view.camera.rotation * Vec3::z();
        let tan_h = (view.camera.horizontal_fov.to_radians() * 0.5).tan();
        let tan_v = tan_h * h as f32 / w as f32;

        for py in 0..h {
            for px in 0..w {
                let ndc_x = (px as f32 + 0.5) / w as f32 * 2.0 - 1.0;
                let ndc_y = (py as f32 + 0.5) / h as f32 * 2.0 - 1.0;
                let dir = (forward + right * (ndc_x * tan_h) - up * (ndc_y * tan_v))
                    .normalize();

                if let Some((t, albedo)) = self.trace(view.camera.position, dir)
                {
                    // Geometry behind the clip plane is excluded from
                    // clipped renders
                    if let Some(plane) = &view.clip_plane {
                        let normal = plane.rotation * Vec3::x();
                        let hit = view.camera.position + dir * t;
                        if (hit - plane.position).dot(&normal) > 0.0 {
                            continue;
                        }
                    }
                    color.write(px, py, albedo);
                    depth.write(px, py, [t, 0.0, 0.0, 1.0]);
                } else {
                    // Sky
                    color.write(px, py, [0.4, 0.6, 0.9, 1.0]);
                }
            }
        }
    }
}

/// The device slowly orbits its requested camera around the scene.
fn scripted_frame(tick: u64) -> WireInputFrame {
    let angle = tick as f32 * 0.02;
    let mut clip_plane_transform = DeviceMatrix4::default();
    // One meter in front of the tracked player, at head height
    clip_plane_transform.m[1][3] = 1.7;
    clip_plane_transform.m[2][3] = 1.0;

    WireInputFrame {
        pose: WirePose {
            position: DeviceVector3 {
                x: angle.sin() * 2.0,
                y: 1.7,
                z: -3.0,
            },
            rotation: DeviceQuaternion::default(),
            vertical_fov: 59.0,
            ..WirePose::default()
        },
        width: WIDTH,
        height: HEIGHT,
        camera_clip_plane: WireClipPlane {
            transform: clip_plane_transform,
            ..WireClipPlane::default()
        },
        features: FeatureFlags::FLOOR_CLIP_PLANE,
        ..WireInputFrame::default()
    }
}

fn metadata() -> ApplicationMetadata {
    ApplicationMetadata {
        name: "capture_app".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine_name: "procedural".to_string(),
        engine_version: "1".to_string(),
        graphics_api: "cpu".to_string(),
        ..ApplicationMetadata::default()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut bridge = MockBridge::new();
    for tick in 0..=TICKS {
        bridge.push_frame(scripted_frame(tick));
    }
    bridge.set_active(true);

    let settings = CaptureSettings {
        strategy: Strategy::Multi,
        injection_point: InjectionPoint::AfterTonemap,
        ..CaptureSettings::default()
    };

    let mut session = CaptureSession::connect(bridge, settings, metadata())?;
    let mut scene = ProceduralScene::new();
    let context = CaptureContext::new();

    log::info!("running {TICKS} ticks at {WIDTH}x{HEIGHT}");
    for _ in 0..TICKS {
        session.tick(&mut scene, &context);
    }

    let submitted = session
        .orchestrator()
        .pose_source()
        .bridge()
        .submissions()
        .len();
    log::info!("submitted {submitted} paired frames");

    session.shutdown();
    Ok(())
}
