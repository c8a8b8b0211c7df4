//! Process-level capture session
//!
//! The single owner of the device connection. Exactly one session exists
//! per process; it polls the consumer's activity once per tick and walks
//! the orchestrator through activation, capture and deactivation. If the
//! runtime is unsupported or startup fails, the session stays permanently
//! disabled and every tick is a no-op.

use crate::bridge::{ApplicationMetadata, BridgeError, DeviceBridge, PoseSource};
use crate::capture::context::CaptureContext;
use crate::capture::orchestrator::CaptureOrchestrator;
use crate::render::executor::SceneSource;
use crate::settings::CaptureSettings;

/// Drives one capture orchestrator from the host's tick loop.
pub struct CaptureSession<B: DeviceBridge> {
    orchestrator: CaptureOrchestrator<B>,
    enabled: bool,
    frame_number: u64,
}

impl<B: DeviceBridge> CaptureSession<B> {
    /// Connect to the capture runtime and build the session.
    ///
    /// An unsupported or failing runtime yields an error; callers may
    /// either propagate it or construct the session via
    /// [`Self::disabled`] so the host keeps running without capture.
    pub fn connect(
        mut bridge: B,
        settings: CaptureSettings,
        metadata: ApplicationMetadata,
    ) -> Result<Self, BridgeError> {
        if !bridge.is_supported() {
            return Err(BridgeError::Unsupported);
        }
        bridge.start_up()?;
        log::info!("capture runtime connected");
        Ok(Self {
            orchestrator: CaptureOrchestrator::new(
                PoseSource::new(bridge),
                settings,
                metadata,
            ),
            enabled: true,
            frame_number: 0,
        })
    }

    /// A permanently inactive session around an unusable runtime.
    pub fn disabled(
        bridge: B,
        settings: CaptureSettings,
        metadata: ApplicationMetadata,
    ) -> Self {
        Self {
            orchestrator: CaptureOrchestrator::new(
                PoseSource::new(bridge),
                settings,
                metadata,
            ),
            enabled: false,
            frame_number: 0,
        }
    }

    /// Whether capture can ever run in this process.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a capture is live right now.
    pub fn is_capturing(&self) -> bool {
        self.orchestrator.is_active()
    }

    /// Engine frame number of the most recent tick.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// The orchestrator this session drives.
    pub fn orchestrator(&self) -> &CaptureOrchestrator<B> {
        &self.orchestrator
    }

    /// Mutable access to the orchestrator.
    pub fn orchestrator_mut(&mut self) -> &mut CaptureOrchestrator<B> {
        &mut self.orchestrator
    }

    /// Run one host tick.
    ///
    /// Polls the consumer: activates when it starts wanting frames,
    /// deactivates when it stops, and captures while active. Activation
    /// failure is retried next tick.
    pub fn tick<S: SceneSource>(&mut self, scene: &mut S, context: &CaptureContext) {
        self.frame_number += 1;
        if !self.enabled {
            return;
        }

        let consumer_wants_frames =
            self.orchestrator.pose_source().is_active();
        match (consumer_wants_frames, self.orchestrator.is_active()) {
            (true, false) => {
                if self.orchestrator.activate() {
                    self.orchestrator.capture(scene, context, self.frame_number);
                }
            }
            (true, true) => {
                self.orchestrator.capture(scene, context, self.frame_number);
            }
            (false, true) => self.orchestrator.deactivate(),
            (false, false) => {}
        }
    }

    /// Tear down any live capture so the next tick starts fresh.
    pub fn reset_capture(&mut self) {
        self.orchestrator.reset();
    }

    /// Close the device connection. The session is unusable afterwards.
    pub fn shutdown(&mut self) {
        self.orchestrator.deactivate();
        self.orchestrator.pose_source_mut().bridge_mut().shut_down();
        self.enabled = false;
        log::info!("capture runtime disconnected");
    }
}
