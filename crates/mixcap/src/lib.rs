//! # Mixcap
//!
//! A real-time mixed-reality capture and compositing engine. Each host
//! frame it acquires the external capture device's requested camera pose,
//! renders the scene as a background layer and a clip-plane-isolated
//! foreground layer, composites the two into an alpha-carrying pair and
//! submits them to the external consumer.
//!
//! ## Features
//!
//! - **Capture strategies**: single-pass segmentation, dual-pass HDR with
//!   eye-adaptation sharing, and a simpler LDR combo mode
//! - **Frame pairing**: foreground and background completions are matched
//!   by engine frame number before any submission
//! - **Clip planes**: device-driven camera and floor planes placed every
//!   tick, rendered as occluders in the foreground pass
//! - **Fault tolerance**: pose failures, resolution changes and vanished
//!   render targets all skip a tick, never a crash
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mixcap::prelude::*;
//! use mixcap::bridge::mock::MockBridge;
//! # struct MyScene;
//! # impl SceneSource for MyScene {
//! #     fn render(&mut self, _v: &CaptureView, _c: &mut mixcap::render::target::RenderTarget, _d: &mut mixcap::render::target::RenderTarget) {}
//! # }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = CaptureSettings::default();
//!     let mut session = CaptureSession::connect(
//!         MockBridge::new(),
//!         settings,
//!         ApplicationMetadata::default(),
//!     )?;
//!
//!     let mut scene = MyScene;
//!     let context = CaptureContext::new();
//!     loop {
//!         session.tick(&mut scene, &context);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

pub mod bridge;
pub mod capture;
pub mod foundation;
pub mod render;
pub mod settings;

mod session;

pub use session::CaptureSession;

/// Common imports for capture hosts
pub mod prelude {
    pub use crate::{
        bridge::{
            ApplicationMetadata, BridgeError, DeviceBridge, InputFrame,
            PoseOverride, PoseSource, SubmittedFrame,
        },
        capture::{
            context::CaptureContext,
            orchestrator::{CaptureOrchestrator, CaptureState},
        },
        foundation::math::{Mat4, Quat, Transform, Vec3},
        render::executor::{CaptureView, SceneSource},
        settings::{CaptureSettings, Config, InjectionPoint, Strategy},
        CaptureSession,
    };
}
