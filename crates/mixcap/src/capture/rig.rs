//! Per-strategy render-target sets
//!
//! The rig owns the named targets one capture configuration needs, sized
//! to the current input-frame dimensions. Render targets cannot be resized
//! in place, so a dimension change releases the whole set and allocates a
//! fresh one, strictly in that order.

use crate::render::target::{PixelFormat, TargetDesc, TargetKey, TargetPool};
use crate::settings::{CaptureSettings, Strategy};

/// Named targets of one capture configuration.
///
/// Which fields are populated depends on the strategy; absent targets mean
/// the strategy never renders that layer or stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct RigTargets {
    /// Scratch HDR scene color for the background pass
    pub background_scene_color: Option<TargetKey>,
    /// Scratch scene depth for the background pass
    pub background_scene_depth: Option<TargetKey>,
    /// The background capture's render target (injector identity)
    pub background_render: Option<TargetKey>,
    /// Final 8-bit background output
    pub background_output: Option<TargetKey>,
    /// Scratch HDR scene color for the foreground pass
    pub foreground_scene_color: Option<TargetKey>,
    /// Scratch scene depth for the foreground pass
    pub foreground_scene_depth: Option<TargetKey>,
    /// The foreground capture's render target (injector identity)
    pub foreground_render: Option<TargetKey>,
    /// Final 8-bit foreground output
    pub foreground_output: Option<TargetKey>,
    /// Recorded background color for in-pass segmentation
    pub reference_color: Option<TargetKey>,
    /// Recorded background depth for in-pass segmentation
    pub reference_depth: Option<TargetKey>,
    /// 1x1 exposure computed by the background pass
    pub background_exposure: Option<TargetKey>,
    /// 1x1 exposure applied to the foreground pass
    pub foreground_exposure: Option<TargetKey>,
}

/// A capture configuration's allocated resources.
#[derive(Debug)]
pub struct CaptureRig {
    dimensions: (u32, u32),
    targets: RigTargets,
}

impl CaptureRig {
    /// Allocate the full target set for the given strategy and size.
    ///
    /// Returns `None` when the dimensions are degenerate; nothing is
    /// allocated in that case.
    pub fn create(
        pool: &mut TargetPool,
        settings: &CaptureSettings,
        width: u32,
        height: u32,
    ) -> Option<Self> {
        if width == 0 || height == 0 {
            log::warn!("rig creation skipped for {width}x{height}");
            return None;
        }

        let scene_format = match settings.capture_source {
            crate::settings::CaptureSource::SceneColorHdr => PixelFormat::Rgba32F,
            crate::settings::CaptureSource::FinalColor => PixelFormat::Rgba8,
        };
        let scene = |pool: &mut TargetPool| {
            pool.create(TargetDesc::color(width, height, scene_format))
        };
        let depth = |pool: &mut TargetPool| {
            pool.create(TargetDesc::depth(width, height))
        };
        let output = |pool: &mut TargetPool| {
            pool.create(TargetDesc::shared_output(width, height))
        };

        let wants_foreground = settings.wants_foreground();
        let mut targets = RigTargets {
            background_scene_color: scene(pool),
            background_scene_depth: depth(pool),
            background_render: output(pool),
            background_output: output(pool),
            ..RigTargets::default()
        };

        match settings.strategy {
            Strategy::Single => {
                targets.reference_color =
                    pool.create(TargetDesc::color(width, height, PixelFormat::Rgba32F));
                targets.reference_depth = depth(pool);
                if wants_foreground {
                    targets.foreground_output = output(pool);
                }
            }
            Strategy::Multi => {
                if wants_foreground {
                    targets.foreground_scene_color = scene(pool);
                    targets.foreground_scene_depth = depth(pool);
                    targets.foreground_render = output(pool);
                    targets.foreground_output = output(pool);
                }
                if settings.share_eye_adaptation && wants_foreground {
                    targets.background_exposure =
                        pool.create(TargetDesc::exposure());
                    targets.foreground_exposure =
                        pool.create(TargetDesc::exposure());
                }
            }
            Strategy::Combo => {
                if wants_foreground {
                    targets.foreground_scene_color = scene(pool);
                    targets.foreground_scene_depth = depth(pool);
                    targets.foreground_render = output(pool);
                    targets.foreground_output = output(pool);
                }
            }
        }

        Some(Self {
            dimensions: (width, height),
            targets,
        })
    }

    /// The dimensions the set was allocated at.
    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    /// The named target set.
    pub fn targets(&self) -> &RigTargets {
        &self.targets
    }

    /// Release every allocated target. Safe to call more than once.
    pub fn release(&mut self, pool: &mut TargetPool) {
        let targets = std::mem::take(&mut self.targets);
        for key in [
            targets.background_scene_color,
            targets.background_scene_depth,
            targets.background_render,
            targets.background_output,
            targets.foreground_scene_color,
            targets.foreground_scene_depth,
            targets.foreground_render,
            targets.foreground_output,
            targets.reference_color,
            targets.reference_depth,
            targets.background_exposure,
            targets.foreground_exposure,
        ]
        .into_iter()
        .flatten()
        {
            pool.release(key);
        }
    }

    /// Release then re-create at new dimensions, strictly in that order.
    pub fn recreate(
        &mut self,
        pool: &mut TargetPool,
        settings: &CaptureSettings,
        width: u32,
        height: u32,
    ) -> bool {
        self.release(pool);
        match Self::create(pool, settings, width, height) {
            Some(rig) => {
                *self = rig;
                true
            }
            None => {
                // The targets are gone; keeping the old dimensions would
                // satisfy the next dimension check and stop the retry.
                self.dimensions = (0, 0);
                false
            }
        }
    }
}
