// Camera for viewing 2D or 3D space

use std::fmt;

use glam::{Mat3, Mat4, Vec3};

use crate::error::{GfxError, Result};

pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 2000.0;

/// Projection currently applied by a [`Camera`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Undefined,
    /// Vertical field of view in degrees and width / height ratio.
    Perspective { fov: f32, aspect: f32 },
    Orthographic { width: f32, height: f32 },
}

/// A "look-from" camera. Yaw and pitch are absolute orientation in degrees,
/// not accumulated deltas.
///
/// Every setter recomputes the dependent state right away, so the matrices
/// and local axes always match the last pose and projection set.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    right: Vec3,
    forward: Vec3,
    up: Vec3,
    projection: Projection,
    view: Mat4,
    proj: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    pub fn new() -> Self {
        let mut cam = Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            right: Vec3::X,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            projection: Projection::Undefined,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        };
        cam.recalc();
        cam
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn proj_matrix(&self) -> Mat4 {
        self.proj
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.recalc();
    }

    /// Stores `yaw % 360`, keeping the sign of the input.
    pub fn set_yaw(&mut self, yaw: f32) {
        self.yaw = yaw % 360.0;
        self.recalc();
    }

    /// Stores `pitch % 360`, keeping the sign of the input.
    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch % 360.0;
        self.recalc();
    }

    pub fn set_perspective(&mut self, fov: f32, aspect: f32) -> Result<()> {
        if !(fov > 0.0 && fov < 180.0) || !(aspect > 0.0) || !aspect.is_finite() {
            return Err(GfxError::InvalidProjection(format!(
                "perspective needs 0 < fov < 180 and a positive aspect ratio, got fov {fov}, aspect {aspect}"
            )));
        }
        self.projection = Projection::Perspective { fov, aspect };
        self.proj = Mat4::perspective_rh(fov.to_radians(), aspect, NEAR_PLANE, FAR_PLANE);
        Ok(())
    }

    /// Box of `width × height` centred on the camera's x/y.
    pub fn set_orthographic(&mut self, width: f32, height: f32) -> Result<()> {
        if !(width > 0.0) || !(height > 0.0) || !width.is_finite() || !height.is_finite() {
            return Err(GfxError::InvalidProjection(format!(
                "orthographic box must have a positive size, got {width} x {height}"
            )));
        }
        self.projection = Projection::Orthographic { width, height };
        self.proj = Mat4::orthographic_rh(
            self.position.x - width / 2.0,
            self.position.x + width / 2.0,
            self.position.y - height / 2.0,
            self.position.y + height / 2.0,
            NEAR_PLANE,
            FAR_PLANE,
        );
        Ok(())
    }

    /// Updates the aspect ratio of a perspective camera. Other projections
    /// are left untouched.
    pub fn set_aspect_ratio(&mut self, aspect: f32) -> Result<()> {
        match self.projection {
            Projection::Perspective { fov, .. } => self.set_perspective(fov, aspect),
            _ => Ok(()),
        }
    }

    fn recalc(&mut self) {
        // pitch first; the order matters for how the two angles interact
        let rotation = Mat4::from_rotation_x((-self.pitch).to_radians())
            * Mat4::from_rotation_y((-self.yaw).to_radians());
        self.view = rotation * Mat4::from_translation(-self.position);

        // orthonormal, so the transpose maps camera axes back to world space
        let to_world = Mat3::from_mat4(rotation).transpose();
        self.right = to_world * Vec3::X;
        self.forward = to_world * Vec3::NEG_Z;
        self.up = self.right.cross(self.forward);
    }
}

impl fmt::Display for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "camera")?;
        match self.projection {
            Projection::Undefined => writeln!(f, "undefined projection")?,
            Projection::Perspective { fov, aspect } => {
                writeln!(f, "perspective projection; fov {fov:.2}, aspect ratio {aspect:.2}")?
            }
            Projection::Orthographic { width, height } => {
                writeln!(f, "orthographic projection; width {width:.2}, height {height:.2}")?
            }
        }
        let p = self.position;
        writeln!(f, "world pos {:.2} {:.2} {:.2}", p.x, p.y, p.z)?;
        writeln!(f, "right {:.2} {:.2} {:.2}", self.right.x, self.right.y, self.right.z)?;
        writeln!(f, "forward {:.2} {:.2} {:.2}", self.forward.x, self.forward.y, self.forward.z)?;
        writeln!(f, "up {:.2} {:.2} {:.2}", self.up.x, self.up.y, self.up.z)?;
        write!(f, "yaw {:.2} pitch {:.2}", self.yaw, self.pitch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_orthonormal(cam: &Camera) {
        let (r, f, u) = (cam.right(), cam.forward(), cam.up());
        assert_abs_diff_eq!(r.length(), 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(f.length(), 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(u.length(), 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(r.dot(f), 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(r.dot(u), 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(f.dot(u), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn default_axes() {
        let cam = Camera::new();
        assert!(cam.forward().abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-6));
        assert!(cam.right().abs_diff_eq(Vec3::X, 1e-6));
        assert!(cam.up().abs_diff_eq(Vec3::Y, 1e-6));
        assert_eq!(cam.projection(), Projection::Undefined);
    }

    #[test]
    fn angles_wrap_and_axes_stay_orthonormal() {
        let mut cam = Camera::new();
        for (yaw, pitch) in [(0.0, 0.0), (370.0, -45.0), (-725.0, 89.0), (1e4, -1e4), (33.3, 181.0)] {
            cam.set_yaw(yaw);
            cam.set_pitch(pitch);
            assert_abs_diff_eq!(cam.yaw(), yaw % 360.0);
            assert_abs_diff_eq!(cam.pitch(), pitch % 360.0);
            assert_orthonormal(&cam);
        }
        cam.set_yaw(-370.0);
        assert_abs_diff_eq!(cam.yaw(), -10.0, epsilon = 1e-4);
    }

    #[test]
    fn yaw_turns_forward_about_world_y() {
        let mut cam = Camera::new();
        cam.set_yaw(90.0);
        // positive yaw looks to the left (toward -x)
        assert!(cam.forward().abs_diff_eq(Vec3::new(-1.0, 0.0, 0.0), 1e-5));
        assert!(cam.up().abs_diff_eq(Vec3::Y, 1e-5));
    }

    #[test]
    fn view_moves_world_opposite_to_camera() {
        let mut cam = Camera::new();
        cam.set_position(Vec3::new(0.0, 0.0, 5.0));
        let p = cam.view_matrix().transform_point3(Vec3::ZERO);
        assert!(p.abs_diff_eq(Vec3::new(0.0, 0.0, -5.0), 1e-5));
    }

    #[test]
    fn view_and_axes_agree() {
        let mut cam = Camera::new();
        cam.set_position(Vec3::new(3.0, -2.0, 7.0));
        cam.set_yaw(30.0);
        cam.set_pitch(-20.0);
        // a point straight ahead lands on the camera's -z axis
        let ahead = cam.position() + cam.forward() * 4.0;
        let p = cam.view_matrix().transform_point3(ahead);
        assert!(p.abs_diff_eq(Vec3::new(0.0, 0.0, -4.0), 1e-4));
    }

    #[test]
    fn perspective_is_validated() {
        let mut cam = Camera::new();
        assert!(cam.set_perspective(0.0, 1.0).is_err());
        assert!(cam.set_perspective(45.0, -1.0).is_err());
        assert_eq!(cam.projection(), Projection::Undefined);

        cam.set_perspective(45.0, 16.0 / 9.0).unwrap();
        assert_eq!(cam.projection(), Projection::Perspective { fov: 45.0, aspect: 16.0 / 9.0 });
        let expected = Mat4::perspective_rh(45f32.to_radians(), 16.0 / 9.0, NEAR_PLANE, FAR_PLANE);
        assert!(cam.proj_matrix().abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn aspect_update_only_touches_perspective() {
        let mut cam = Camera::new();
        cam.set_orthographic(10.0, 5.0).unwrap();
        let before = cam.proj_matrix();
        cam.set_aspect_ratio(2.0).unwrap();
        assert_eq!(cam.proj_matrix(), before);

        cam.set_perspective(60.0, 1.0).unwrap();
        cam.set_aspect_ratio(2.0).unwrap();
        assert_eq!(cam.projection(), Projection::Perspective { fov: 60.0, aspect: 2.0 });
    }

    #[test]
    fn orthographic_is_centred_on_position() {
        let mut cam = Camera::new();
        cam.set_position(Vec3::new(4.0, 2.0, 0.0));
        cam.set_orthographic(8.0, 4.0).unwrap();
        // the camera's own x/y maps to the centre of clip space
        let clip = cam.proj_matrix().project_point3(Vec3::new(4.0, 2.0, -1.0));
        assert_abs_diff_eq!(clip.x, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(clip.y, 0.0, epsilon = 1e-5);
    }
}
