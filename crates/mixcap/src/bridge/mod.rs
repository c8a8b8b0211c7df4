//! External capture-device boundary
//!
//! Everything the compositor knows about the external capture application
//! flows through [`DeviceBridge`]: a narrow, synchronous, non-blocking
//! RPC-style surface. Wire types carry device-space values; [`PoseSource`]
//! wraps a bridge and converts each acquired frame into host space.

pub mod mock;

use bitflags::bitflags;
use thiserror::Error;

use crate::foundation::convert::{
    self, DeviceMatrix4, DeviceQuaternion, DeviceVector3,
};
use crate::foundation::math::{Mat4, Point3, Quat, Transform, Vec3};

/// Pose priority stamped on host-initiated pose overrides.
///
/// The device echoes the priority of the pose it actually accepted. An
/// override is honored iff the returned frame carries this value.
pub const POSE_PRIORITY_GAME: i32 = 63;

/// Errors raised at the device boundary.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The capture runtime is not installed or not usable on this machine
    #[error("capture device is not supported on this system")]
    Unsupported,
    /// The runtime refused the connection handshake
    #[error("capture device startup failed: {0}")]
    StartupFailed(String),
    /// A per-tick frame query returned no data
    #[error("input frame acquisition failed")]
    AcquisitionFailed,
    /// A call was made before `start_up` succeeded
    #[error("bridge is not connected")]
    NotConnected,
}

bitflags! {
    /// Per-frame feature bits set by the device.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FeatureFlags: u32 {
        /// The ground clip plane should participate this frame
        const FLOOR_CLIP_PLANE = 1 << 0;
    }
}

/// Device-space camera pose as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WirePose {
    /// Camera position, meters
    pub position: DeviceVector3,
    /// Camera rotation
    pub rotation: DeviceQuaternion,
    /// Vertical field of view, degrees
    pub vertical_fov: f32,
    /// Projection matrix matching the pose, if one was supplied
    pub projection: DeviceMatrix4,
    /// Priority of whoever authored this pose
    pub priority: i32,
}

impl Default for WirePose {
    fn default() -> Self {
        Self {
            position: DeviceVector3::default(),
            rotation: DeviceQuaternion::default(),
            vertical_fov: 59.0,
            projection: DeviceMatrix4::default(),
            priority: 0,
        }
    }
}

/// One clip plane as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WireClipPlane {
    /// Device-space world transform of the plane
    pub transform: DeviceMatrix4,
    /// Plane width in device units
    pub width: f32,
    /// Plane height in device units
    pub height: f32,
}

impl Default for WireClipPlane {
    fn default() -> Self {
        Self {
            transform: DeviceMatrix4::default(),
            width: 1.0,
            height: 1.0,
        }
    }
}

/// The full per-tick frame structure exchanged with the device.
///
/// The host sends its current copy (optionally with an override pose
/// written into `pose`); the device returns the authoritative version.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WireInputFrame {
    /// Camera pose for this frame
    pub pose: WirePose,
    /// Requested render width, pixels
    pub width: u32,
    /// Requested render height, pixels
    pub height: u32,
    /// The near clip plane in front of the camera
    pub camera_clip_plane: WireClipPlane,
    /// The ground clip plane
    pub floor_clip_plane: WireClipPlane,
    /// Feature bits set by the device for this frame
    pub features: FeatureFlags,
}

/// Identity of the running application, reported once on activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationMetadata {
    /// Application name
    pub name: String,
    /// Application version string
    pub version: String,
    /// Host engine name
    pub engine_name: String,
    /// Host engine version string
    pub engine_version: String,
    /// Graphics API in use
    pub graphics_api: String,
    /// Opaque tracking identifier
    pub tracking_id: String,
    /// Integration version string
    pub integration_version: String,
    /// Name of the attached XR device, if any
    pub xr_device_name: String,
}

/// A completed foreground/background pair handed to the device.
///
/// Buffers are identified by opaque texture identifiers; the device reads
/// them through shared-resource machinery outside this crate's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedFrame {
    /// Foreground texture identity (alpha-carrying), if one was rendered
    pub foreground: Option<u64>,
    /// Background texture identity
    pub background: u64,
    /// Host engine frame number the pair belongs to
    pub frame_number: u64,
}

/// Connection to the external capture application.
///
/// All calls are synchronous and must return immediately; per-tick failures
/// surface as `Err`, never as blocking or panicking.
pub trait DeviceBridge {
    /// Whether the capture runtime exists on this system at all.
    fn is_supported(&self) -> bool;

    /// Open the connection. Called once; failure leaves the system
    /// permanently inactive for the process lifetime.
    fn start_up(&mut self) -> Result<(), BridgeError>;

    /// Close the connection and release device-side state.
    fn shut_down(&mut self);

    /// Whether the external consumer currently wants frames. Polled once
    /// per tick to drive activation and deactivation.
    fn is_active(&self) -> bool;

    /// Exchange the current frame structure with the device. The request
    /// carries the host's copy (and any override pose); the response is
    /// the authoritative frame for this tick.
    fn update_input_frame(
        &mut self,
        request: &WireInputFrame,
    ) -> Result<WireInputFrame, BridgeError>;

    /// Hand a completed frame pair to the consumer. Fire and forget.
    fn submit_frame(&mut self, frame: SubmittedFrame);

    /// Report application identity. Called once per activation.
    fn submit_application_metadata(&mut self, metadata: &ApplicationMetadata);
}

/// A host-supplied camera pose the device is asked to adopt for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseOverride {
    /// Camera position, host space
    pub position: Vec3,
    /// Camera rotation, host space
    pub rotation: Quat,
    /// Vertical field of view, degrees
    pub vertical_fov: f32,
    /// Near clip distance, host units
    pub near: f32,
    /// Far clip distance, host units
    pub far: f32,
}

/// The per-tick frame after conversion into host space.
///
/// Fully replaced on every successful acquisition; never partially mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputFrame {
    /// Camera position in host space
    pub camera_location: Vec3,
    /// Camera rotation in host space
    pub camera_rotation: Quat,
    /// Requested render width, pixels
    pub width: u32,
    /// Requested render height, pixels
    pub height: u32,
    /// Horizontal field of view, degrees, derived from the device's
    /// vertical FOV and the requested aspect ratio
    pub horizontal_fov: f32,
    /// Host-space world transform of the camera clip plane
    pub camera_clip_plane_transform: Mat4,
    /// Host-space world transform of the floor clip plane
    pub floor_clip_plane_transform: Mat4,
    /// Whether the floor clip plane participates this frame
    pub floor_clip_plane_enabled: bool,
}

impl Default for InputFrame {
    fn default() -> Self {
        Self {
            camera_location: Vec3::zeros(),
            camera_rotation: Quat::identity(),
            width: 0,
            height: 0,
            horizontal_fov: 90.0,
            camera_clip_plane_transform: Mat4::identity(),
            floor_clip_plane_transform: Mat4::identity(),
            floor_clip_plane_enabled: false,
        }
    }
}

impl InputFrame {
    /// Requested dimensions as a pair.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Per-tick pose acquisition on top of a [`DeviceBridge`].
///
/// Owns the wire-frame round-trip buffer and the tracking-origin transform
/// used to map device clip planes into host world space.
pub struct PoseSource<B: DeviceBridge> {
    bridge: B,
    wire: WireInputFrame,
    tracking_origin: Transform,
}

impl<B: DeviceBridge> PoseSource<B> {
    /// Wrap a bridge. The tracking origin starts at identity.
    pub fn new(bridge: B) -> Self {
        Self {
            bridge,
            wire: WireInputFrame::default(),
            tracking_origin: Transform::identity(),
        }
    }

    /// Access the underlying bridge.
    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    /// Mutable access to the underlying bridge.
    pub fn bridge_mut(&mut self) -> &mut B {
        &mut self.bridge
    }

    /// Set the host transform of the XR tracking origin. Applied to pose
    /// and clip-plane conversion on every subsequent acquisition.
    pub fn set_tracking_origin(&mut self, origin: Transform) {
        self.tracking_origin = origin;
    }

    /// The current tracking-origin transform.
    pub fn tracking_origin(&self) -> &Transform {
        &self.tracking_origin
    }

    /// Whether the external consumer wants frames right now.
    pub fn is_active(&self) -> bool {
        self.bridge.is_active()
    }

    /// Acquire this tick's frame, letting the device author the pose.
    pub fn get_input_frame(&mut self) -> Result<InputFrame, BridgeError> {
        self.exchange(None)
    }

    /// Acquire this tick's frame, asking the device to adopt a host pose.
    ///
    /// Returns the converted frame plus whether the device actually
    /// honored the override (it echoes our priority when it did).
    pub fn update_input_frame(
        &mut self,
        pose_override: &PoseOverride,
    ) -> Result<(InputFrame, bool), BridgeError> {
        let frame = self.exchange(Some(pose_override))?;
        let honored = self.wire.pose.priority == POSE_PRIORITY_GAME;
        if !honored {
            log::warn!(
                "pose override not honored by device (priority {})",
                self.wire.pose.priority
            );
        }
        debug_assert!(
            !honored
                || (self.wire.pose.position.x
                    - convert::position_to_device(pose_override.position).x)
                    .abs()
                    < 1e-3,
            "device echoed override priority but altered the pose"
        );
        Ok((frame, honored))
    }

    /// Hand a completed frame pair to the consumer.
    pub fn submit_frame(&mut self, frame: SubmittedFrame) {
        self.bridge.submit_frame(frame);
    }

    fn exchange(
        &mut self,
        pose_override: Option<&PoseOverride>,
    ) -> Result<InputFrame, BridgeError> {
        let mut request = self.wire;
        if let Some(wanted) = pose_override {
            request.pose = WirePose {
                position: convert::position_to_device(wanted.position),
                rotation: convert::quaternion_to_device(&wanted.rotation),
                vertical_fov: wanted.vertical_fov,
                projection: convert::device_projection_matrix(
                    request.width.max(1),
                    request.height.max(1),
                    convert::vertical_fov_to_horizontal(
                        wanted.vertical_fov,
                        convert::aspect_ratio(
                            request.width.max(1) as f32,
                            request.height.max(1) as f32,
                        ),
                    ),
                    wanted.near,
                    wanted.far,
                ),
                priority: POSE_PRIORITY_GAME,
            };
        }

        self.wire = self.bridge.update_input_frame(&request)?;
        Ok(self.convert_frame())
    }

    fn convert_frame(&self) -> InputFrame {
        let wire = &self.wire;
        let origin = self.tracking_origin.to_matrix();

        let local_location = convert::position_to_host(wire.pose.position);
        let local_rotation = convert::quaternion_to_host(wire.pose.rotation);
        let camera_location = self
            .tracking_origin
            .transform_point(Point3::from(local_location))
            .coords;
        let camera_rotation = self.tracking_origin.rotation * local_rotation;

        let aspect = convert::aspect_ratio(
            wire.width.max(1) as f32,
            wire.height.max(1) as f32,
        );

        InputFrame {
            camera_location,
            camera_rotation,
            width: wire.width,
            height: wire.height,
            horizontal_fov: convert::vertical_fov_to_horizontal(
                wire.pose.vertical_fov,
                aspect,
            ),
            camera_clip_plane_transform: origin
                * convert::matrix_to_host(&wire.camera_clip_plane.transform),
            floor_clip_plane_transform: origin
                * convert::matrix_to_host(&wire.floor_clip_plane.transform),
            floor_clip_plane_enabled: wire
                .features
                .contains(FeatureFlags::FLOOR_CLIP_PLANE),
        }
    }
}
