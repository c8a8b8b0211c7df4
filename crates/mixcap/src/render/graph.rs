//! Recorded pass graphs
//!
//! Compositing work is recorded as a list of passes referencing targets by
//! key, then executed against the pool in one go. A stale or missing key
//! skips its pass with a warning instead of failing the frame; a skipped
//! pass means no output this tick, never corrupted output.

use crate::foundation::math::Transform;
use crate::render::passes::{self, OccluderCamera};
use crate::render::target::{TargetKey, TargetPool};

/// One recorded compositing operation.
#[derive(Debug, Clone)]
pub enum Pass {
    /// Identity copy with format conversion.
    CopyFullSceneColor {
        /// Source color
        src: TargetKey,
        /// Destination color
        dst: TargetKey,
    },
    /// Record scene color and depth as segmentation references.
    CopySceneColorAndDepth {
        /// Scene color
        color: TargetKey,
        /// Scene depth
        depth: TargetKey,
        /// Reference color destination
        out_color: TargetKey,
        /// Reference depth destination
        out_depth: TargetKey,
    },
    /// Extract foreground against a recorded background.
    Segment {
        /// Current pass color
        current_color: TargetKey,
        /// Current pass depth
        current_depth: TargetKey,
        /// Recorded background color
        reference_color: TargetKey,
        /// Recorded background depth
        reference_depth: TargetKey,
        /// Foreground destination (alpha-carrying)
        out_foreground: TargetKey,
        /// Background destination
        out_background: TargetKey,
        /// Whether inputs are already tone-mapped
        post_processed: bool,
    },
    /// Write a separate alpha buffer into a color target's alpha channel.
    CombineAlpha {
        /// Color target modified in place
        color: TargetKey,
        /// Alpha source
        alpha: TargetKey,
    },
    /// Histogram auto-exposure, reduced into a 1x1 exposure target.
    EyeAdaptation {
        /// Scene color to measure
        src: TargetKey,
        /// 1x1 exposure destination
        exposure: TargetKey,
    },
    /// Copy one exposure target onto another.
    ShareExposure {
        /// Source exposure
        src: TargetKey,
        /// Destination exposure
        dst: TargetKey,
    },
    /// Rasterize a clip plane as an occluder.
    RenderClipPlane {
        /// View parameters
        camera: OccluderCamera,
        /// Plane world transform
        plane: Transform,
        /// Depth target modified in place
        depth: TargetKey,
        /// Color target modified in place
        color: TargetKey,
    },
}

/// Outcome of executing a recorded graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphStats {
    /// Passes that ran
    pub executed: usize,
    /// Passes skipped because a target was missing
    pub skipped: usize,
}

/// An ordered list of recorded passes.
#[derive(Debug, Default)]
pub struct RenderGraph {
    passes: Vec<Pass>,
}

impl RenderGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pass.
    pub fn add_pass(&mut self, pass: Pass) {
        self.passes.push(pass);
    }

    /// Number of recorded passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Drop all recorded passes.
    pub fn clear(&mut self) {
        self.passes.clear();
    }

    /// Run every recorded pass in order against the pool.
    pub fn execute(&self, pool: &mut TargetPool) -> GraphStats {
        let mut stats = GraphStats::default();
        for pass in &self.passes {
            if Self::execute_pass(pass, pool) {
                stats.executed += 1;
            } else {
                log::warn!("compositing pass skipped, render target missing");
                stats.skipped += 1;
            }
        }
        stats
    }

    fn execute_pass(pass: &Pass, pool: &mut TargetPool) -> bool {
        match *pass {
            Pass::CopyFullSceneColor { src, dst } => {
                let Some(source) = pool.get(src).cloned() else {
                    return false;
                };
                let Some(destination) = pool.get_mut(dst) else {
                    return false;
                };
                passes::full_scene_color_copy(&source, destination);
                true
            }
            Pass::CopySceneColorAndDepth {
                color,
                depth,
                out_color,
                out_depth,
            } => {
                let (Some(color), Some(depth)) =
                    (pool.get(color).cloned(), pool.get(depth).cloned())
                else {
                    return false;
                };
                let Some([out_color, out_depth]) =
                    pool.get_disjoint_mut(out_color, out_depth)
                else {
                    return false;
                };
                passes::scene_color_and_depth_copy(
                    &color, &depth, out_color, out_depth,
                );
                true
            }
            Pass::Segment {
                current_color,
                current_depth,
                reference_color,
                reference_depth,
                out_foreground,
                out_background,
                post_processed,
            } => {
                let (Some(cur_c), Some(cur_d), Some(ref_c), Some(ref_d)) = (
                    pool.get(current_color).cloned(),
                    pool.get(current_depth).cloned(),
                    pool.get(reference_color).cloned(),
                    pool.get(reference_depth).cloned(),
                ) else {
                    return false;
                };
                let Some([fg, bg]) =
                    pool.get_disjoint_mut(out_foreground, out_background)
                else {
                    return false;
                };
                passes::segment(
                    &cur_c,
                    &cur_d,
                    &ref_c,
                    &ref_d,
                    fg,
                    bg,
                    post_processed,
                );
                true
            }
            Pass::CombineAlpha { color, alpha } => {
                let Some(alpha) = pool.get(alpha).cloned() else {
                    return false;
                };
                let Some(color) = pool.get_mut(color) else {
                    return false;
                };
                passes::combine_alpha(color, &alpha);
                true
            }
            Pass::EyeAdaptation { src, exposure } => {
                let Some(source) = pool.get(src).cloned() else {
                    return false;
                };
                let Some(destination) = pool.get_mut(exposure) else {
                    return false;
                };
                let value = passes::eye_adaptation_histogram(&source);
                passes::eye_adaptation_apply(value, destination);
                true
            }
            Pass::ShareExposure { src, dst } => {
                let Some(value) = pool.get(src).map(|t| t.read(0, 0)) else {
                    return false;
                };
                let Some(destination) = pool.get_mut(dst) else {
                    return false;
                };
                destination.write(0, 0, value);
                true
            }
            Pass::RenderClipPlane {
                ref camera,
                ref plane,
                depth,
                color,
            } => {
                let Some([depth, color]) = pool.get_disjoint_mut(depth, color)
                else {
                    return false;
                };
                passes::render_clip_plane_occluder(camera, plane, depth, color);
                true
            }
        }
    }
}
