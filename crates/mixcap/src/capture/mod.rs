//! Capture orchestration
//!
//! The tick-side half of the system: visibility masks, clip-plane
//! placement, per-strategy render-target sets, and the state machine that
//! drives pose acquisition, capture scheduling and submission.

pub mod clip_plane;
pub mod context;
pub mod orchestrator;
pub mod rig;
