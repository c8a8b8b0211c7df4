//! Scripted in-process bridge for tests and demos
//!
//! Behaves like a capture application that hands out a queue of prepared
//! frames and records everything submitted to it.

use std::collections::VecDeque;

use super::{
    ApplicationMetadata, BridgeError, DeviceBridge, SubmittedFrame, WireInputFrame,
    POSE_PRIORITY_GAME,
};

/// A [`DeviceBridge`] whose frames are scripted ahead of time.
#[derive(Debug, Default)]
pub struct MockBridge {
    supported: bool,
    connected: bool,
    active: bool,
    echo_override: bool,
    frames: VecDeque<WireInputFrame>,
    submissions: Vec<SubmittedFrame>,
    metadata: Option<ApplicationMetadata>,
}

impl MockBridge {
    /// A supported, inactive bridge with an empty frame queue.
    pub fn new() -> Self {
        Self {
            supported: true,
            ..Self::default()
        }
    }

    /// Mark the runtime as missing; `start_up` will fail.
    pub fn set_supported(&mut self, supported: bool) {
        self.supported = supported;
    }

    /// Whether `start_up` has succeeded and `shut_down` has not been called.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Toggle whether the consumer wants frames.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// When set, override requests are echoed back verbatim instead of
    /// consuming the frame queue.
    pub fn set_echo_override(&mut self, echo: bool) {
        self.echo_override = echo;
    }

    /// Queue one frame for a future `update_input_frame` call.
    pub fn push_frame(&mut self, frame: WireInputFrame) {
        self.frames.push_back(frame);
    }

    /// Frames submitted so far, in order.
    pub fn submissions(&self) -> &[SubmittedFrame] {
        &self.submissions
    }

    /// The metadata reported on activation, if any.
    pub fn metadata(&self) -> Option<&ApplicationMetadata> {
        self.metadata.as_ref()
    }
}

impl DeviceBridge for MockBridge {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn start_up(&mut self) -> Result<(), BridgeError> {
        if !self.supported {
            return Err(BridgeError::Unsupported);
        }
        self.connected = true;
        Ok(())
    }

    fn shut_down(&mut self) {
        self.connected = false;
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn update_input_frame(
        &mut self,
        request: &WireInputFrame,
    ) -> Result<WireInputFrame, BridgeError> {
        if self.echo_override && request.pose.priority == POSE_PRIORITY_GAME {
            return Ok(*request);
        }
        self.frames
            .pop_front()
            .ok_or(BridgeError::AcquisitionFailed)
    }

    fn submit_frame(&mut self, frame: SubmittedFrame) {
        self.submissions.push(frame);
    }

    fn submit_application_metadata(&mut self, metadata: &ApplicationMetadata) {
        self.metadata = Some(metadata.clone());
    }
}
