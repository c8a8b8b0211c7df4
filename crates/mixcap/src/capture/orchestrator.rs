//! Capture lifecycle and per-frame scheduling
//!
//! The orchestrator owns one capture configuration end to end: pose
//! acquisition, render-target allocation, clip-plane placement, per-tick
//! capture scheduling and final submission. Every per-tick failure is
//! absorbed here; nothing on this path may stall or crash the host frame.

use crate::bridge::{
    ApplicationMetadata, BridgeError, DeviceBridge, InputFrame, PoseOverride,
    PoseSource, SubmittedFrame,
};
use crate::capture::clip_plane::ClipPlaneGeometry;
use crate::capture::context::CaptureContext;
use crate::capture::rig::CaptureRig;
use crate::foundation::math::{Quat, Transform};
use crate::render::executor::{
    CaptureRequest, CaptureView, FrameExecutor, FrameOutputs, SceneSource,
};
use crate::render::graph::{Pass, RenderGraph};
use crate::render::injector::{InjectorSnapshot, Layer, RenderGraphInjector};
use crate::render::passes::OccluderCamera;
use crate::render::target::{TargetKey, TargetPool};
use crate::settings::{CaptureSettings, InjectionPoint, Strategy};

/// Background renders ahead of foreground within one engine frame. The
/// pairing gate tolerates the opposite order, at the cost of stale-frame
/// artifacts.
const BACKGROUND_SORT_PRIORITY: i32 = 0;
const FOREGROUND_SORT_PRIORITY: i32 = 10;

/// Lifecycle of one capture instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    /// No resources allocated, no captures running
    #[default]
    Inactive,
    /// Resources live, capturing every tick
    Active,
}

/// Owns the capture lifecycle and drives per-frame parameter assignment.
pub struct CaptureOrchestrator<B: DeviceBridge> {
    settings: CaptureSettings,
    metadata: ApplicationMetadata,
    pose_source: PoseSource<B>,
    pool: TargetPool,
    injector: RenderGraphInjector,
    rig: Option<CaptureRig>,
    camera_plane: ClipPlaneGeometry,
    floor_plane: ClipPlaneGeometry,
    frame: InputFrame,
    state: CaptureState,
}

impl<B: DeviceBridge> CaptureOrchestrator<B> {
    /// Build an inactive orchestrator around a pose source.
    pub fn new(
        pose_source: PoseSource<B>,
        settings: CaptureSettings,
        metadata: ApplicationMetadata,
    ) -> Self {
        let settings = settings.normalize();
        let base_scale = settings.clip_plane_scale;
        Self {
            injector: RenderGraphInjector::new(settings.injection_point),
            camera_plane: ClipPlaneGeometry::new(base_scale),
            floor_plane: ClipPlaneGeometry::new(base_scale),
            settings,
            metadata,
            pose_source,
            pool: TargetPool::new(),
            rig: None,
            frame: InputFrame::default(),
            state: CaptureState::Inactive,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Whether the orchestrator currently holds live capture resources.
    pub fn is_active(&self) -> bool {
        self.state == CaptureState::Active
    }

    /// The normalized configuration in effect.
    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// The pose source and its bridge.
    pub fn pose_source(&self) -> &PoseSource<B> {
        &self.pose_source
    }

    /// Mutable access to the pose source and its bridge.
    pub fn pose_source_mut(&mut self) -> &mut PoseSource<B> {
        &mut self.pose_source
    }

    /// The render-target pool. Render-side code resolves keys against it.
    pub fn pool(&self) -> &TargetPool {
        &self.pool
    }

    /// Dimensions the current render targets were allocated at, when
    /// active.
    pub fn target_dimensions(&self) -> Option<(u32, u32)> {
        self.rig.as_ref().map(CaptureRig::dimensions)
    }

    /// Try to bring the capture up.
    ///
    /// Pose acquisition must succeed first; on failure nothing is
    /// allocated and the state stays inactive. Once targets exist,
    /// activation always completes.
    pub fn activate(&mut self) -> bool {
        if self.is_active() {
            return true;
        }

        match self.acquire() {
            Ok(frame) => self.frame = frame,
            Err(err) => {
                log::warn!("capture activation failed: {err}");
                return false;
            }
        }

        let Some(rig) = CaptureRig::create(
            &mut self.pool,
            &self.settings,
            self.frame.width,
            self.frame.height,
        ) else {
            log::warn!(
                "capture activation failed: no render targets at {}x{}",
                self.frame.width,
                self.frame.height
            );
            return false;
        };
        self.rig = Some(rig);

        let metadata = self.metadata.clone();
        self.pose_source
            .bridge_mut()
            .submit_application_metadata(&metadata);

        self.state = CaptureState::Active;
        log::info!(
            "capture active: {:?} strategy at {}x{}",
            self.settings.strategy,
            self.frame.width,
            self.frame.height
        );
        true
    }

    /// Tear the capture down. Idempotent; safe mid-frame.
    pub fn deactivate(&mut self) {
        if let Some(mut rig) = self.rig.take() {
            rig.release(&mut self.pool);
        }
        self.injector.clear();
        if self.is_active() {
            log::info!("capture deactivated");
        }
        self.state = CaptureState::Inactive;
    }

    /// Drop all capture state so the next activation starts fresh.
    pub fn reset(&mut self) {
        self.deactivate();
        self.frame = InputFrame::default();
    }

    /// Run one tick's capture.
    ///
    /// Acquires the frame, reconciles render-target dimensions, places
    /// clip planes, schedules the strategy's passes and submits the paired
    /// output when the gate fires. Failures skip the tick and retain the
    /// previous frame's state.
    pub fn capture<S: SceneSource>(
        &mut self,
        scene: &mut S,
        context: &CaptureContext,
        frame_number: u64,
    ) {
        if !self.is_active() {
            return;
        }

        match self.acquire() {
            Ok(frame) => self.frame = frame,
            Err(err) => {
                log::warn!("pose acquisition failed, capture skipped: {err}");
                return;
            }
        }

        if !self.reconcile_dimensions() {
            return;
        }
        self.place_clip_planes();

        let Some(schedule) = self.build_schedule(context) else {
            log::warn!("capture skipped, render targets incomplete");
            return;
        };
        let (snapshot, outputs, requests) = schedule;
        self.injector.publish(snapshot);

        let ready = FrameExecutor::execute_tick(
            scene,
            &mut self.pool,
            &mut self.injector,
            outputs,
            frame_number,
            requests,
        );

        if let Some(pair) = ready {
            self.pose_source.submit_frame(SubmittedFrame {
                foreground: pair.foreground.map(TargetKey::identity),
                background: pair.background.identity(),
                frame_number: pair.frame_number,
            });
        }
    }

    fn acquire(&mut self) -> Result<InputFrame, BridgeError> {
        if let Some(debug) = self.settings.debug_camera {
            let rotation = Quat::from_euler_angles(
                debug.rotation_euler.x.to_radians(),
                debug.rotation_euler.y.to_radians(),
                debug.rotation_euler.z.to_radians(),
            );
            let wanted = PoseOverride {
                position: debug.position,
                rotation,
                vertical_fov: debug.vertical_fov,
                near: self.settings.near_clip,
                far: self.settings.far_clip,
            };
            let (frame, _honored) = self.pose_source.update_input_frame(&wanted)?;
            Ok(frame)
        } else {
            self.pose_source.get_input_frame()
        }
    }

    /// Rebuild the rig when the device asks for a new resolution.
    fn reconcile_dimensions(&mut self) -> bool {
        let Some(rig) = self.rig.as_mut() else {
            return false;
        };
        let wanted = self.frame.dimensions();
        if rig.dimensions() == wanted {
            return true;
        }
        log::info!(
            "render targets rebuilt: {:?} -> {:?}",
            rig.dimensions(),
            wanted
        );
        if !rig.recreate(&mut self.pool, &self.settings, wanted.0, wanted.1) {
            log::warn!("render target rebuild failed at {wanted:?}");
            self.injector.clear();
            return false;
        }
        true
    }

    fn place_clip_planes(&mut self) {
        if let Some(debug) = &self.settings.debug_clip_plane {
            self.camera_plane.apply_debug_override(debug);
        } else {
            self.camera_plane
                .update_from_matrix(&self.frame.camera_clip_plane_transform);
        }
        self.floor_plane
            .update_from_matrix(&self.frame.floor_clip_plane_transform);
        self.floor_plane
            .set_visible(self.frame.floor_clip_plane_enabled);
    }

    fn camera(&self) -> OccluderCamera {
        OccluderCamera {
            position: self.frame.camera_location,
            rotation: self.frame.camera_rotation,
            horizontal_fov: self.frame.horizontal_fov,
        }
    }

    fn view(&self, context: &CaptureContext, clip: Option<Transform>) -> CaptureView {
        CaptureView {
            camera: self.camera(),
            clip_plane: clip,
            hidden_actors: context.hidden_actors().clone(),
            hidden_components: context.hidden_components().clone(),
        }
    }

    fn occluder_passes(
        &self,
        depth: TargetKey,
        color: TargetKey,
        include_floor: bool,
    ) -> Vec<Pass> {
        let mut passes = vec![Pass::RenderClipPlane {
            camera: self.camera(),
            plane: *self.camera_plane.transform(),
            depth,
            color,
        }];
        if include_floor && self.floor_plane.is_visible() {
            passes.push(Pass::RenderClipPlane {
                camera: self.camera(),
                plane: *self.floor_plane.transform(),
                depth,
                color,
            });
        }
        passes
    }

    /// Build this tick's injector snapshot, outputs and pass requests.
    ///
    /// Returns `None` when a required target is missing, in which case the
    /// tick is skipped without submission.
    #[allow(clippy::type_complexity)]
    fn build_schedule(
        &self,
        context: &CaptureContext,
    ) -> Option<(InjectorSnapshot, FrameOutputs, Vec<CaptureRequest>)> {
        let rig = self.rig.as_ref()?;
        let t = *rig.targets();

        let bg_color = t.background_scene_color?;
        let bg_depth = t.background_scene_depth?;
        let bg_render = t.background_render?;
        let bg_output = t.background_output?;

        let wants_foreground = self.settings.wants_foreground();

        match self.settings.strategy {
            Strategy::Single => {
                let mut pre = RenderGraph::new();
                let mut injected = RenderGraph::new();
                let mut foreground_output = None;

                if wants_foreground {
                    let reference_color = t.reference_color?;
                    let reference_depth = t.reference_depth?;
                    let fg_output = t.foreground_output?;
                    foreground_output = Some(fg_output);

                    // Record the untouched reference first, then let the
                    // clip planes displace depth behind them; segmentation
                    // compares the displaced buffers against the reference.
                    pre.add_pass(Pass::CopySceneColorAndDepth {
                        color: bg_color,
                        depth: bg_depth,
                        out_color: reference_color,
                        out_depth: reference_depth,
                    });
                    for pass in self.occluder_passes(bg_depth, bg_color, true) {
                        pre.add_pass(pass);
                    }
                    injected.add_pass(Pass::Segment {
                        current_color: bg_color,
                        current_depth: bg_depth,
                        reference_color,
                        reference_depth,
                        out_foreground: fg_output,
                        out_background: bg_output,
                        post_processed: self.settings.injection_point
                            != InjectionPoint::PrePostProcess,
                    });
                } else {
                    injected.add_pass(Pass::CopyFullSceneColor {
                        src: bg_color,
                        dst: bg_output,
                    });
                }

                let snapshot = InjectorSnapshot {
                    background_target: bg_render,
                    foreground_target: None,
                    expect_foreground: false,
                };
                let outputs = FrameOutputs {
                    background: bg_output,
                    foreground: foreground_output,
                };
                let request = CaptureRequest {
                    layer: Layer::Background,
                    sort_priority: BACKGROUND_SORT_PRIORITY,
                    view: self.view(context, None),
                    scene_color: bg_color,
                    scene_depth: bg_depth,
                    render_target: bg_render,
                    pre_graph: pre,
                    injected_graph: injected,
                };
                Some((snapshot, outputs, vec![request]))
            }
            Strategy::Multi | Strategy::Combo => {
                let mut background_injected = RenderGraph::new();
                background_injected.add_pass(Pass::CopyFullSceneColor {
                    src: bg_color,
                    dst: bg_output,
                });
                if self.settings.transparency {
                    background_injected.add_pass(Pass::CombineAlpha {
                        color: bg_output,
                        alpha: bg_color,
                    });
                }
                if let Some(exposure) = t.background_exposure {
                    background_injected.add_pass(Pass::EyeAdaptation {
                        src: bg_color,
                        exposure,
                    });
                }

                let mut requests = vec![CaptureRequest {
                    layer: Layer::Background,
                    sort_priority: BACKGROUND_SORT_PRIORITY,
                    view: self.view(context, None),
                    scene_color: bg_color,
                    scene_depth: bg_depth,
                    render_target: bg_render,
                    pre_graph: RenderGraph::new(),
                    injected_graph: background_injected,
                }];

                let mut foreground_render = None;
                let mut foreground_output = None;
                if wants_foreground {
                    let fg_color = t.foreground_scene_color?;
                    let fg_depth = t.foreground_scene_depth?;
                    let fg_render = t.foreground_render?;
                    let fg_output = t.foreground_output?;
                    foreground_render = Some(fg_render);
                    foreground_output = Some(fg_output);

                    // Only the multi strategy redraws the camera plane as an
                    // occluder; combo relies on the view's clip plane alone.
                    let mut pre = RenderGraph::new();
                    if self.settings.strategy == Strategy::Multi {
                        for pass in
                            self.occluder_passes(fg_depth, fg_color, false)
                        {
                            pre.add_pass(pass);
                        }
                    }

                    let mut injected = RenderGraph::new();
                    if let (Some(src), Some(dst)) =
                        (t.background_exposure, t.foreground_exposure)
                    {
                        injected.add_pass(Pass::ShareExposure { src, dst });
                    }
                    injected.add_pass(Pass::CopyFullSceneColor {
                        src: fg_color,
                        dst: fg_output,
                    });

                    requests.push(CaptureRequest {
                        layer: Layer::Foreground,
                        sort_priority: FOREGROUND_SORT_PRIORITY,
                        view: self.view(
                            context,
                            Some(*self.camera_plane.transform()),
                        ),
                        scene_color: fg_color,
                        scene_depth: fg_depth,
                        render_target: fg_render,
                        pre_graph: pre,
                        injected_graph: injected,
                    });
                }

                let snapshot = InjectorSnapshot {
                    background_target: bg_render,
                    foreground_target: foreground_render,
                    expect_foreground: wants_foreground,
                };
                let outputs = FrameOutputs {
                    background: bg_output,
                    foreground: foreground_output,
                };
                Some((snapshot, outputs, requests))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::mock::MockBridge;
    use crate::bridge::{FeatureFlags, WireInputFrame, WirePose};
    use crate::foundation::convert::DeviceVector3;
    use crate::render::executor::SceneSource;
    use crate::render::target::RenderTarget;

    struct FlatScene;

    impl SceneSource for FlatScene {
        fn render(
            &mut self,
            _view: &CaptureView,
            color: &mut RenderTarget,
            depth: &mut RenderTarget,
        ) {
            color.clear([0.5, 0.5, 0.5, 1.0]);
            depth.clear([500.0, 0.0, 0.0, 1.0]);
        }
    }

    fn wire_frame(width: u32, height: u32) -> WireInputFrame {
        WireInputFrame {
            pose: WirePose {
                position: DeviceVector3 {
                    x: 0.0,
                    y: 1.7,
                    z: -2.0,
                },
                vertical_fov: 59.0,
                ..WirePose::default()
            },
            width,
            height,
            features: FeatureFlags::FLOOR_CLIP_PLANE,
            ..WireInputFrame::default()
        }
    }

    fn orchestrator(
        strategy: Strategy,
        frames: &[WireInputFrame],
    ) -> CaptureOrchestrator<MockBridge> {
        let mut bridge = MockBridge::new();
        bridge.set_active(true);
        for frame in frames {
            bridge.push_frame(*frame);
        }
        let settings = CaptureSettings {
            strategy,
            ..CaptureSettings::default()
        };
        CaptureOrchestrator::new(
            PoseSource::new(bridge),
            settings,
            ApplicationMetadata::default(),
        )
    }

    #[test]
    fn activation_fails_without_a_pose() {
        let mut orch = orchestrator(Strategy::Multi, &[]);
        assert!(!orch.activate());
        assert!(!orch.is_active());
        assert!(orch.pool().is_empty());
    }

    #[test]
    fn activation_allocates_and_reports_metadata() {
        let mut orch = orchestrator(Strategy::Multi, &[wire_frame(1920, 1080)]);
        assert!(orch.activate());
        assert!(orch.is_active());
        assert!(!orch.pool().is_empty());
        assert!(orch.pose_source().bridge().metadata().is_some());
    }

    #[test]
    fn multi_capture_submits_one_paired_frame() {
        let mut orch = orchestrator(
            Strategy::Multi,
            &[wire_frame(640, 480), wire_frame(640, 480)],
        );
        assert!(orch.activate());
        orch.capture(&mut FlatScene, &CaptureContext::new(), 42);

        let submissions = orch.pose_source().bridge().submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].frame_number, 42);
        assert!(submissions[0].foreground.is_some());
    }

    #[test]
    fn background_only_submits_without_foreground() {
        let mut bridge = MockBridge::new();
        bridge.set_active(true);
        bridge.push_frame(wire_frame(640, 480));
        bridge.push_frame(wire_frame(640, 480));
        let settings = CaptureSettings {
            strategy: Strategy::Multi,
            background_only: true,
            ..CaptureSettings::default()
        };
        let mut orch = CaptureOrchestrator::new(
            PoseSource::new(bridge),
            settings,
            ApplicationMetadata::default(),
        );
        assert!(orch.activate());
        orch.capture(&mut FlatScene, &CaptureContext::new(), 1);

        let submissions = orch.pose_source().bridge().submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].foreground, None);
    }

    #[test]
    fn pose_failure_skips_tick_and_recovers() {
        let mut orch = orchestrator(
            Strategy::Multi,
            &[wire_frame(640, 480), wire_frame(640, 480)],
        );
        assert!(orch.activate());

        orch.capture(&mut FlatScene, &CaptureContext::new(), 2);
        assert_eq!(orch.pose_source().bridge().submissions().len(), 1);

        // Tick 2 had one queued frame; tick 3 fails, tick 4 resumes
        orch.capture(&mut FlatScene, &CaptureContext::new(), 3);
        assert_eq!(orch.pose_source().bridge().submissions().len(), 1);
        assert!(orch.is_active());

        orch.pose_source_mut()
            .bridge_mut()
            .push_frame(wire_frame(640, 480));
        orch.capture(&mut FlatScene, &CaptureContext::new(), 4);
        assert_eq!(orch.pose_source().bridge().submissions().len(), 2);
    }

    #[test]
    fn capture_recovers_after_transient_zero_dimension_frame() {
        let mut orch = orchestrator(
            Strategy::Multi,
            &[
                wire_frame(640, 480),
                wire_frame(640, 480),
                wire_frame(0, 0),
                wire_frame(640, 480),
                wire_frame(640, 480),
            ],
        );
        assert!(orch.activate());
        orch.capture(&mut FlatScene, &CaptureContext::new(), 1);
        assert_eq!(orch.pose_source().bridge().submissions().len(), 1);

        // The degenerate frame fails the rebuild and skips the tick
        orch.capture(&mut FlatScene, &CaptureContext::new(), 2);
        assert_eq!(orch.pose_source().bridge().submissions().len(), 1);
        assert!(orch.is_active());

        // The original resolution must rebuild and resume submitting
        orch.capture(&mut FlatScene, &CaptureContext::new(), 3);
        orch.capture(&mut FlatScene, &CaptureContext::new(), 4);
        assert_eq!(orch.pose_source().bridge().submissions().len(), 3);
        assert_eq!(orch.target_dimensions(), Some((640, 480)));
    }

    #[test]
    fn dimension_change_rebuilds_targets() {
        let mut orch = orchestrator(
            Strategy::Multi,
            &[wire_frame(1920, 1080), wire_frame(1280, 720)],
        );
        assert!(orch.activate());
        assert_eq!(orch.target_dimensions(), Some((1920, 1080)));
        let count = orch.pool().len();

        orch.capture(&mut FlatScene, &CaptureContext::new(), 5);
        assert_eq!(orch.target_dimensions(), Some((1280, 720)));
        assert_eq!(orch.pool().len(), count);
        assert_eq!(orch.pose_source().bridge().submissions().len(), 1);
    }

    #[test]
    fn deactivation_is_idempotent_and_releases_everything() {
        let mut orch = orchestrator(Strategy::Multi, &[wire_frame(640, 480)]);
        assert!(orch.activate());
        orch.deactivate();
        assert!(!orch.is_active());
        assert!(orch.pool().is_empty());
        orch.deactivate();
        assert!(!orch.is_active());
    }
}
