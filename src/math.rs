// Math utilities for the scene and mesh generators

use glam::{Mat3, Mat4, Vec3};

/// Position plus Euler rotation (radians) of a render object.
///
/// Rotations compose as `T · Rx · Ry · Rz`, so Z is applied to the vertex
/// first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Vec3,
}

impl Pose {
    /// Create a new pose
    pub fn new(position: Vec3, rotation: Vec3) -> Self {
        Self { position, rotation }
    }

    /// Create an identity pose
    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
        }
    }

    /// Generate the model matrix
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_x(self.rotation.x)
            * Mat4::from_rotation_y(self.rotation.y)
            * Mat4::from_rotation_z(self.rotation.z)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Inverse-transpose of the upper 3×3 of `model`, for transforming normals.
pub fn normal_matrix(model: &Mat4) -> Mat3 {
    Mat3::from_mat4(*model).inverse().transpose()
}

/// Transforms `x` from the range `[a1, a2]` to `[b1, b2]`.
pub fn remap(x: f32, a1: f32, a2: f32, b1: f32, b2: f32) -> f32 {
    b1 + (x - a1) * (b2 - b1) / (a2 - a1)
}

/// Spherical interpolation between two unit directions.
///
/// Falls back to a normalized lerp when the directions are almost parallel.
pub fn slerp(from: Vec3, to: Vec3, t: f32) -> Vec3 {
    let cos_theta = from.dot(to).clamp(-1.0, 1.0);
    let theta = cos_theta.acos();
    let sin_theta = theta.sin();
    if sin_theta.abs() < 1e-6 {
        return from.lerp(to, t).normalize_or_zero();
    }
    let a = ((1.0 - t) * theta).sin() / sin_theta;
    let b = (t * theta).sin() / sin_theta;
    from * a + to * b
}
