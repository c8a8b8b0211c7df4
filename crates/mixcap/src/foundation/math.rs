//! Math utilities and types
//!
//! Provides the fundamental math types used by the capture pipeline.
//! Host-engine conventions: units are centimeters, +X is forward.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Convert to a transformation matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: Point3) -> Point3 {
        let matrix = self.to_matrix();
        matrix.transform_point(&point)
    }

    /// Apply this transform to a vector (no translation)
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        let matrix = self.to_matrix();
        matrix.transform_vector(&vector)
    }

    /// Combine this transform with another
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * (self.scale.component_mul(&other.position)),
            rotation: self.rotation * other.rotation,
            scale: self.scale.component_mul(&other.scale),
        }
    }
}

/// Build a rotation whose forward axis (+X) points along `forward`.
///
/// Used to orient clip-plane geometry from a transformed plane normal.
pub fn rotation_from_forward(forward: Vec3) -> Quat {
    let norm = forward.norm();
    if norm <= f32::EPSILON {
        return Quat::identity();
    }
    let dir = forward / norm;
    Quat::rotation_between(&Vec3::x(), &dir).unwrap_or_else(|| {
        // Antiparallel case: rotate half a turn around up
        Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::PI)
    })
}

/// Extract the per-axis scale of a 4x4 transform matrix
pub fn matrix_scale(matrix: &Mat4) -> Vec3 {
    let scale_x = Vec3::new(matrix.m11, matrix.m21, matrix.m31).magnitude();
    let scale_y = Vec3::new(matrix.m12, matrix.m22, matrix.m32).magnitude();
    let scale_z = Vec3::new(matrix.m13, matrix.m23, matrix.m33).magnitude();
    Vec3::new(scale_x, scale_y, scale_z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn transform_round_trips_points() {
        let transform = Transform {
            position: Vec3::new(10.0, -5.0, 2.0),
            rotation: Quat::from_axis_angle(&Vec3::z_axis(), 0.5),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };

        let point = Point3::new(1.0, 2.0, 3.0);
        let transformed = transform.transform_point(point);
        let expected = transform.to_matrix().transform_point(&point);

        assert_relative_eq!(transformed.x, expected.x, epsilon = 1e-5);
        assert_relative_eq!(transformed.y, expected.y, epsilon = 1e-5);
        assert_relative_eq!(transformed.z, expected.z, epsilon = 1e-5);
    }

    #[test]
    fn transform_passes_by_value_without_consuming_the_original() {
        let transform = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_axis_angle(&Vec3::z_axis(), 0.25),
            scale: Vec3::new(1.0, 50.0, 50.0),
        };
        let copied: Transform = *(&transform);
        assert_eq!(copied, transform);
    }

    #[test]
    fn rotation_from_forward_aligns_x_axis() {
        let forward = Vec3::new(0.0, 1.0, 0.0);
        let rotation = rotation_from_forward(forward);
        let rotated = rotation * Vec3::x();

        assert_relative_eq!(rotated.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(rotated.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn matrix_scale_extracts_nonuniform_scale() {
        let matrix = Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 3.0, 4.0));
        let scale = matrix_scale(&matrix);

        assert_relative_eq!(scale.x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(scale.y, 3.0, epsilon = 1e-5);
        assert_relative_eq!(scale.z, 4.0, epsilon = 1e-5);
    }
}
