//! Post-process injection and frame pairing
//!
//! The host runs many render passes per engine frame; only two of them
//! belong to the capture. The injector decides relevance by target
//! identity, and the submission gate pairs background and foreground
//! completions by frame number so the consumer never receives a mismatched
//! pair. Both structures are read-only for the render side of the frame;
//! the tick side publishes a fresh snapshot before any pass runs.

use crate::render::target::{TargetKey, TargetPool};
use crate::settings::InjectionPoint;

/// Which logical capture layer a render pass belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Full-scene capture with normal post-processing
    Background,
    /// Clipped capture isolating geometry in front of the clip plane
    Foreground,
}

/// What the host reports about the pass currently executing.
#[derive(Debug, Clone, Copy)]
pub struct PostProcessContext {
    /// The pass's output render target
    pub output_target: TargetKey,
    /// Host engine frame number
    pub frame_number: u64,
    /// Stage this callback fired at
    pub stage: InjectionPoint,
    /// Whether this is the terminal post-process step for the pass
    pub is_final_pass: bool,
}

/// Pairing state for one capture instance.
///
/// Sequence numbers are engine frame numbers; submission is allowed iff
/// both layers completed in the same frame, at most once for that frame.
#[derive(Debug, Default)]
pub struct SubmissionGate {
    background_seq: Option<u64>,
    foreground_seq: Option<u64>,
    last_submitted: Option<u64>,
}

impl SubmissionGate {
    /// Fresh gate with no completions observed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a layer completion for the given frame, then decide whether
    /// the pair is ready. Returns `true` exactly once per matched pair.
    pub fn record(
        &mut self,
        layer: Layer,
        frame_number: u64,
        expect_foreground: bool,
    ) -> bool {
        match layer {
            Layer::Background => self.background_seq = Some(frame_number),
            Layer::Foreground => self.foreground_seq = Some(frame_number),
        }
        self.ready(frame_number, expect_foreground)
    }

    fn ready(&mut self, frame_number: u64, expect_foreground: bool) -> bool {
        if self.last_submitted == Some(frame_number) {
            return false;
        }
        let paired = if expect_foreground {
            self.background_seq == Some(frame_number)
                && self.foreground_seq == Some(frame_number)
        } else {
            self.background_seq == Some(frame_number)
        };
        if paired {
            self.last_submitted = Some(frame_number);
        }
        paired
    }

    /// Forget all observed completions.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Immutable per-tick snapshot of the capture's layer targets.
///
/// Published by the tick side before any render pass executes; the render
/// side only ever reads it.
#[derive(Debug, Clone, Copy)]
pub struct InjectorSnapshot {
    /// Output target of the background capture pass
    pub background_target: TargetKey,
    /// Output target of the foreground capture pass, when one exists
    pub foreground_target: Option<TargetKey>,
    /// Whether a foreground completion is required before submission
    pub expect_foreground: bool,
}

/// Routes host render passes to capture layers.
#[derive(Debug, Default)]
pub struct RenderGraphInjector {
    injection_point: InjectionPoint,
    snapshot: Option<InjectorSnapshot>,
    gate: SubmissionGate,
}

impl RenderGraphInjector {
    /// An injector registered at the given post-process stage.
    pub fn new(injection_point: InjectionPoint) -> Self {
        Self {
            injection_point,
            snapshot: None,
            gate: SubmissionGate::new(),
        }
    }

    /// The stage this injector reacts to.
    pub fn injection_point(&self) -> InjectionPoint {
        self.injection_point
    }

    /// Publish this tick's layer targets. Overwrites the previous snapshot.
    pub fn publish(&mut self, snapshot: InjectorSnapshot) {
        self.snapshot = Some(snapshot);
    }

    /// Drop the published snapshot and pairing state. Subsequent passes
    /// all classify as not ours.
    pub fn clear(&mut self) {
        self.snapshot = None;
        self.gate.reset();
    }

    /// Decide whether a host pass belongs to the capture, and which layer.
    ///
    /// A pass is ours iff it is the terminal post-process step, fired at
    /// the configured stage, and its output target is one of the two
    /// published keys and that key is still live in the pool. Stale keys
    /// mean the capture released its targets while this pass was in
    /// flight; such passes are not ours.
    pub fn classify(
        &self,
        pool: &TargetPool,
        ctx: &PostProcessContext,
    ) -> Option<Layer> {
        if !ctx.is_final_pass || ctx.stage != self.injection_point {
            return None;
        }
        let snapshot = self.snapshot.as_ref()?;
        if !pool.contains(ctx.output_target) {
            return None;
        }
        if ctx.output_target == snapshot.background_target {
            return Some(Layer::Background);
        }
        if snapshot.foreground_target == Some(ctx.output_target) {
            return Some(Layer::Foreground);
        }
        None
    }

    /// Record a layer completion; `true` means both layers of this frame
    /// are done and the pair must be submitted now.
    pub fn observe_completion(&mut self, layer: Layer, frame_number: u64) -> bool {
        let expect_foreground = self
            .snapshot
            .as_ref()
            .is_some_and(|s| s.expect_foreground);
        self.gate.record(layer, frame_number, expect_foreground)
    }

    /// The published snapshot, if any.
    pub fn snapshot(&self) -> Option<&InjectorSnapshot> {
        self.snapshot.as_ref()
    }
}
