//! Device/host coordinate-space conversion
//!
//! The external capture device speaks a Unity-style space: units are meters,
//! axes ordered (x, y, z) with translation in the matrix's fourth column.
//! The host engine speaks centimeters with axes permuted so that device
//! (x, y, z) maps to host (y, z, x). All conversions here are pure and
//! bit-for-bit reproducible; both directions are provided and round-trip.

use crate::foundation::math::{Mat4, Quat, Vec3};
use nalgebra::Quaternion;

/// Scale factor between device units (meters) and host units (centimeters).
pub const DEVICE_TO_HOST_SCALE: f32 = 100.0;

/// Device-space 3D vector as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeviceVector3 {
    /// Device X component
    pub x: f32,
    /// Device Y component
    pub y: f32,
    /// Device Z component
    pub z: f32,
}

/// Device-space quaternion as carried on the wire (x, y, z, w).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceQuaternion {
    /// Device X component
    pub x: f32,
    /// Device Y component
    pub y: f32,
    /// Device Z component
    pub z: f32,
    /// Device W component
    pub w: f32,
}

impl Default for DeviceQuaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

/// Device-space 4x4 matrix, row-major storage, translation in the fourth
/// column (`m[r][3]`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceMatrix4 {
    /// Row-major elements
    pub m: [[f32; 4]; 4],
}

impl Default for DeviceMatrix4 {
    fn default() -> Self {
        let mut m = [[0.0; 4]; 4];
        for (i, row) in m.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        Self { m }
    }
}

impl DeviceMatrix4 {
    /// Flat element access in row-major order, `data[r * 4 + c]`.
    pub fn data(&self) -> [f32; 16] {
        let mut out = [0.0; 16];
        for r in 0..4 {
            for c in 0..4 {
                out[r * 4 + c] = self.m[r][c];
            }
        }
        out
    }
}

/// Axis permutation: host axis index -> device axis index.
///
/// Host X is device Z, host Y is device X, host Z is device Y.
const HOST_TO_DEVICE_AXIS: [usize; 3] = [2, 0, 1];

/// Convert a device-space position to host space.
///
/// `host = (dev.z * 100, dev.x * 100, dev.y * 100)`
pub fn position_to_host(device: DeviceVector3) -> Vec3 {
    Vec3::new(
        device.z * DEVICE_TO_HOST_SCALE,
        device.x * DEVICE_TO_HOST_SCALE,
        device.y * DEVICE_TO_HOST_SCALE,
    )
}

/// Convert a host-space position to device space.
///
/// `dev = (host.y / 100, host.z / 100, host.x / 100)`
pub fn position_to_device(host: Vec3) -> DeviceVector3 {
    let inv = 1.0 / DEVICE_TO_HOST_SCALE;
    DeviceVector3 {
        x: host.y * inv,
        y: host.z * inv,
        z: host.x * inv,
    }
}

/// Convert a device-space rotation to host space.
///
/// The quaternion axes permute the same way positions do:
/// `host = (dev.z, dev.x, dev.y, dev.w)`.
pub fn quaternion_to_host(device: DeviceQuaternion) -> Quat {
    Quat::new_normalize(Quaternion::new(device.w, device.z, device.x, device.y))
}

/// Convert a host-space rotation to device space.
pub fn quaternion_to_device(host: &Quat) -> DeviceQuaternion {
    DeviceQuaternion {
        x: host.j,
        y: host.k,
        z: host.i,
        w: host.w,
    }
}

/// Convert a device-space transform matrix to host space.
///
/// Permutes the 3x3 rotation block by the (z, x, y) axis mapping and scales
/// the translation column by 100.
pub fn matrix_to_host(device: &DeviceMatrix4) -> Mat4 {
    let mut host = Mat4::identity();
    for i in 0..3 {
        for j in 0..3 {
            host[(i, j)] = device.m[HOST_TO_DEVICE_AXIS[i]][HOST_TO_DEVICE_AXIS[j]];
        }
        host[(i, 3)] = device.m[HOST_TO_DEVICE_AXIS[i]][3] * DEVICE_TO_HOST_SCALE;
        host[(3, i)] = device.m[3][HOST_TO_DEVICE_AXIS[i]];
    }
    host[(3, 3)] = device.m[3][3];
    host
}

/// Convert a host-space transform matrix to device space.
pub fn matrix_to_device(host: &Mat4) -> DeviceMatrix4 {
    let inv = 1.0 / DEVICE_TO_HOST_SCALE;
    let mut device = DeviceMatrix4::default();
    for i in 0..3 {
        for j in 0..3 {
            device.m[HOST_TO_DEVICE_AXIS[i]][HOST_TO_DEVICE_AXIS[j]] = host[(i, j)];
        }
        device.m[HOST_TO_DEVICE_AXIS[i]][3] = host[(i, 3)] * inv;
        device.m[3][HOST_TO_DEVICE_AXIS[i]] = host[(3, i)];
    }
    device.m[3][3] = host[(3, 3)];
    device
}

/// Width over height.
pub fn aspect_ratio(width: f32, height: f32) -> f32 {
    width / height
}

/// Convert a vertical field of view to a horizontal one for a given aspect
/// ratio. Both angles in degrees.
pub fn vertical_fov_to_horizontal(vertical_fov: f32, aspect: f32) -> f32 {
    2.0 * (aspect * (vertical_fov * 0.5).to_radians().tan())
        .atan()
        .to_degrees()
}

/// Convert a horizontal field of view to a vertical one for a given aspect
/// ratio. Both angles in degrees.
pub fn horizontal_fov_to_vertical(horizontal_fov: f32, aspect: f32) -> f32 {
    2.0 * ((1.0 / aspect) * (horizontal_fov * 0.5).to_radians().tan())
        .atan()
        .to_degrees()
}

/// Build the device-space projection matrix the bridge expects when the host
/// supplies a camera-pose override.
///
/// `horizontal_fov` in degrees; `near`/`far` in host units.
pub fn device_projection_matrix(
    width: u32,
    height: u32,
    horizontal_fov: f32,
    near: f32,
    far: f32,
) -> DeviceMatrix4 {
    let half_fov = horizontal_fov * std::f32::consts::PI / 360.0;
    let inv_tan = 1.0 / half_fov.tan();
    let aspect = width as f32 / height as f32;

    let mut projection = DeviceMatrix4 { m: [[0.0; 4]; 4] };
    projection.m[0][0] = inv_tan;
    projection.m[1][1] = aspect * inv_tan;
    projection.m[2][2] = (far + near) / (near - far);
    projection.m[2][3] = 2.0 * (far + near) / (near - far);
    projection.m[3][2] = -1.0;
    projection
}
