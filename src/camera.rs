//! Pinhole camera producing the frustum the workers trace through.

use glam::{Quat, Vec3A};

use crate::frustum::{FrustumSource, FrustumView};

/// Pinhole camera for primary ray generation.
///
/// The image plane sits one unit in front of `lookfrom`; only its corners are
/// handed to the workers.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Point camera is looking from (camera position)
    pub lookfrom: Vec3A,
    /// Point camera is looking at (look target)
    pub lookat: Vec3A,
    /// Camera-relative "up" direction vector
    pub vup: Vec3A,
    /// Vertical field of view in degrees
    pub vfov: f32,
    /// Image width divided by image height
    pub aspect_ratio: f32,
}

impl Default for Camera {
    /// At `(0, 0, 4)` looking at the fractal's center, 60° FOV, 4:3.
    fn default() -> Self {
        Self {
            lookfrom: Vec3A::new(0.0, 0.0, 4.0),
            lookat: Vec3A::ZERO,
            vup: Vec3A::Y,
            vfov: 60.0,
            aspect_ratio: 4.0 / 3.0,
        }
    }
}

impl Camera {
    /// Default camera matched to an image size.
    pub fn for_image(width: u32, height: u32) -> Self {
        Self {
            aspect_ratio: width as f32 / height.max(1) as f32,
            ..Self::default()
        }
    }

    /// Unit view direction.
    pub fn forward(&self) -> Vec3A {
        (self.lookat - self.lookfrom).normalize()
    }

    /// Swing `lookfrom` around `lookat` by `angle` radians about `vup`.
    pub fn orbit(&mut self, angle: f32) {
        let rotation = Quat::from_axis_angle(self.vup.normalize().into(), angle);
        let offset = self.lookfrom - self.lookat;
        self.lookfrom = self.lookat + rotation * offset;
    }

    fn basis(&self) -> (Vec3A, Vec3A, Vec3A) {
        let w = (self.lookfrom - self.lookat).normalize(); // Points opposite view direction
        let u = self.vup.cross(w).normalize(); // Points to camera right
        let v = w.cross(u); // Points to camera up
        (u, v, w)
    }
}

impl FrustumSource for Camera {
    fn frustum(&self) -> FrustumView {
        let (u, v, w) = self.basis();
        let viewport_height = 2.0 * (self.vfov.to_radians() / 2.0).tan();
        let viewport_width = viewport_height * self.aspect_ratio;

        let across = viewport_width * u;
        let up = viewport_height * v;
        let top_left = self.lookfrom - w - across / 2.0 + up / 2.0;

        FrustumView::new(self.lookfrom, top_left, top_left + across, top_left - up)
    }
}
