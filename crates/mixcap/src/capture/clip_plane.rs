//! Clip-plane geometry placement
//!
//! A clip plane is a renderable quad excluded from the player's own view
//! but present in capture renders, where it acts both as the foreground
//! clip volume boundary and as an explicit occluder. Its world transform
//! is fully overwritten every capture tick from the device's clip-plane
//! matrix; a configured debug transform can pin it in place instead.

use crate::foundation::math::{
    matrix_scale, rotation_from_forward, Mat4, Transform, Vec3,
};
use crate::settings::DebugClipPlane;

/// One placed clip plane.
#[derive(Debug, Clone)]
pub struct ClipPlaneGeometry {
    transform: Transform,
    base_scale: Vec3,
    visible: bool,
}

impl ClipPlaneGeometry {
    /// A plane at the origin with the given base scale, initially visible.
    pub fn new(base_scale: Vec3) -> Self {
        Self {
            transform: Transform {
                scale: base_scale,
                ..Transform::identity()
            },
            base_scale,
            visible: true,
        }
    }

    /// Current world transform.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Whether the plane participates in capture renders this tick.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Show or hide the plane for this tick.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Overwrite the transform from the device's clip-plane matrix.
    ///
    /// The matrix is already in host world space (tracking origin applied).
    /// Position comes from the translation column; rotation is rebuilt from
    /// the transformed forward axis; scale is the base scale times the
    /// matrix's own scale.
    pub fn update_from_matrix(&mut self, world: &Mat4) {
        let position = Vec3::new(world[(0, 3)], world[(1, 3)], world[(2, 3)]);

        let forward = Vec3::new(world[(0, 0)], world[(1, 0)], world[(2, 0)]);
        let rotation = rotation_from_forward(forward);

        let matrix_scaling = matrix_scale(world);
        self.transform = Transform {
            position,
            rotation,
            scale: self.base_scale.component_mul(&matrix_scaling),
        };
    }

    /// Pin the plane at a fixed configured transform instead of the
    /// device-driven one.
    pub fn apply_debug_override(&mut self, debug: &DebugClipPlane) {
        let (roll, pitch, yaw) = (
            debug.rotation_euler.x.to_radians(),
            debug.rotation_euler.y.to_radians(),
            debug.rotation_euler.z.to_radians(),
        );
        self.transform = Transform {
            position: debug.position,
            rotation: crate::foundation::math::Quat::from_euler_angles(
                roll, pitch, yaw,
            ),
            scale: debug.scale,
        };
    }
}
