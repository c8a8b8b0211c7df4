//! Per-tick render execution
//!
//! Stands in for the host engine's render loop: takes this tick's capture
//! requests, orders them by sort priority, renders each through the scene
//! source, runs the recorded compositing graphs at the injection point,
//! and reports when the submission gate pairs a frame.

use std::collections::HashSet;

use crate::foundation::math::Transform;
use crate::render::graph::RenderGraph;
use crate::render::injector::{Layer, PostProcessContext, RenderGraphInjector};
use crate::render::passes::OccluderCamera;
use crate::render::target::{RenderTarget, TargetKey, TargetPool};

/// Parameters for one scene render.
#[derive(Debug, Clone)]
pub struct CaptureView {
    /// Camera pose and field of view
    pub camera: OccluderCamera,
    /// Host-space clip plane excluding geometry behind it, when clipping
    pub clip_plane: Option<Transform>,
    /// Actor identities excluded from this render
    pub hidden_actors: HashSet<u64>,
    /// Component identities excluded from this render
    pub hidden_components: HashSet<u64>,
}

/// Host capability for rendering one scene view into color and depth.
///
/// Implementations must honor the view's clip plane and visibility filters;
/// everything downstream of the render is this crate's responsibility.
pub trait SceneSource {
    /// Render the scene into the given pair of targets.
    fn render(
        &mut self,
        view: &CaptureView,
        color: &mut RenderTarget,
        depth: &mut RenderTarget,
    );
}

/// One scene-capture pass scheduled for this tick.
#[derive(Debug)]
pub struct CaptureRequest {
    /// Which logical layer the pass produces
    pub layer: Layer,
    /// Explicit ordering among this tick's passes; lower runs first
    pub sort_priority: i32,
    /// Scene render parameters
    pub view: CaptureView,
    /// Scratch scene-color target the render writes
    pub scene_color: TargetKey,
    /// Scratch scene-depth target the render writes
    pub scene_depth: TargetKey,
    /// The layer's capture render target; its identity is what the
    /// injector matches against
    pub render_target: TargetKey,
    /// Work applied to the scene buffers before post-processing
    pub pre_graph: RenderGraph,
    /// Compositing work recorded for the injection point
    pub injected_graph: RenderGraph,
}

/// The output pair submission should reference once the gate fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutputs {
    /// Final background texture
    pub background: TargetKey,
    /// Final foreground texture, absent in background-only mode
    pub foreground: Option<TargetKey>,
}

/// A frame pair the gate declared ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyPair {
    /// Final background texture
    pub background: TargetKey,
    /// Final foreground texture, absent in background-only mode
    pub foreground: Option<TargetKey>,
    /// Engine frame number the pair belongs to
    pub frame_number: u64,
}

/// Drives one tick's capture passes to completion.
#[derive(Debug, Default)]
pub struct FrameExecutor;

impl FrameExecutor {
    /// Run every scheduled capture pass for this engine frame.
    ///
    /// Passes run in sort-priority order. At most one [`ReadyPair`] is
    /// returned per call; a missing scratch or render target skips that
    /// pass with a warning and no submission occurs this tick.
    pub fn execute_tick<S: SceneSource>(
        scene: &mut S,
        pool: &mut TargetPool,
        injector: &mut RenderGraphInjector,
        outputs: FrameOutputs,
        frame_number: u64,
        mut requests: Vec<CaptureRequest>,
    ) -> Option<ReadyPair> {
        requests.sort_by_key(|r| r.sort_priority);

        let mut ready = None;
        for request in &requests {
            let Some([color, depth]) =
                pool.get_disjoint_mut(request.scene_color, request.scene_depth)
            else {
                log::warn!("capture pass skipped, scene scratch targets missing");
                continue;
            };
            depth.clear([f32::MAX, 0.0, 0.0, 1.0]);
            color.clear([0.0, 0.0, 0.0, 0.0]);
            scene.render(&request.view, color, depth);

            request.pre_graph.execute(pool);

            // The host's terminal post-process step writes the capture's
            // own render target; forward the scene color so the normal
            // output path stays intact around the injected work.
            if !Self::copy_through(pool, request.scene_color, request.render_target) {
                log::warn!("capture pass skipped, render target missing");
                continue;
            }

            let ctx = PostProcessContext {
                output_target: request.render_target,
                frame_number,
                stage: injector.injection_point(),
                is_final_pass: true,
            };
            let Some(layer) = injector.classify(pool, &ctx) else {
                continue;
            };

            let stats = request.injected_graph.execute(pool);
            if stats.skipped > 0 {
                continue;
            }

            if injector.observe_completion(layer, frame_number) {
                ready = Some(ReadyPair {
                    background: outputs.background,
                    foreground: outputs.foreground,
                    frame_number,
                });
            }
        }
        ready
    }

    fn copy_through(pool: &mut TargetPool, src: TargetKey, dst: TargetKey) -> bool {
        let Some(source) = pool.get(src).cloned() else {
            return false;
        };
        let Some(destination) = pool.get_mut(dst) else {
            return false;
        };
        crate::render::passes::full_scene_color_copy(&source, destination);
        true
    }
}
