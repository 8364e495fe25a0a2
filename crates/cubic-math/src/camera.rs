// SPDX-License-Identifier: CEPL-1.0
use glam::{Mat4, Quat, Vec3};

/// Supplies the matrices for one frame.
pub trait ViewSource {
    fn view_matrix(&self) -> Mat4;
    fn projection_matrix(&self) -> Mat4;

    fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// View-projection for a `width` x `height` target. Sources that track
    /// their own aspect ignore the size.
    fn view_projection_for(&self, _width: u32, _height: u32) -> Mat4 {
        self.view_projection()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Camera {
            position: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_deg: 45.0,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    /// Keeps the previous aspect when the size is degenerate (minimized window).
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    /// Rotate the eye around `target` about the world Y axis.
    pub fn orbit(&mut self, radians: f32) {
        let offset = self.position - self.target;
        self.position = self.target + Quat::from_rotation_y(radians) * offset;
    }
}

impl ViewSource for Camera {
    fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    fn projection_matrix(&self) -> Mat4 {
        let mut p = Mat4::perspective_rh(self.fov_y_deg.to_radians(), self.aspect, self.near, self.far);
        // clip space Y points down
        p.y_axis.y *= -1.0;
        p
    }

    fn view_projection_for(&self, width: u32, height: u32) -> Mat4 {
        let mut fitted = *self;
        fitted.set_viewport(width, height);
        fitted.view_projection()
    }
}
