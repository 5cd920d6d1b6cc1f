//! Camera for headless volume renders.

use glam::{DMat4, DVec3};

/// Camera projection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionMode {
    /// Perspective projection.
    #[default]
    Perspective,
    /// Orthographic projection.
    Orthographic,
}

/// A camera looking at a volume.
///
/// Projections map view depth into `[0, 1]`, which is the depth convention
/// used by the sweep and by external depth buffers.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in world space.
    pub position: DVec3,
    /// Point the camera is looking at.
    pub target: DVec3,
    /// Up vector.
    pub up: DVec3,
    /// Vertical field of view in radians.
    pub fov: f64,
    /// Aspect ratio (width / height).
    pub aspect_ratio: f64,
    /// Near clipping plane.
    pub near: f64,
    /// Far clipping plane.
    pub far: f64,
    /// Projection mode.
    pub projection_mode: ProjectionMode,
    /// Half height of the orthographic view volume.
    pub ortho_scale: f64,
}

impl Camera {
    /// Creates a camera on the +Z axis looking at the origin.
    pub fn new(aspect_ratio: f64) -> Self {
        Self {
            position: DVec3::new(0.0, 0.0, 3.0),
            target: DVec3::ZERO,
            up: DVec3::Y,
            fov: std::f64::consts::FRAC_PI_4,
            aspect_ratio,
            near: 0.01,
            far: 1000.0,
            projection_mode: ProjectionMode::Perspective,
            ortho_scale: 1.0,
        }
    }

    /// Sets the aspect ratio from an image size.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect_ratio = f64::from(width.max(1)) / f64::from(height.max(1));
    }

    pub fn view_matrix(&self) -> DMat4 {
        DMat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> DMat4 {
        match self.projection_mode {
            ProjectionMode::Perspective => {
                DMat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
            }
            ProjectionMode::Orthographic => {
                let half_height = self.ortho_scale;
                let half_width = half_height * self.aspect_ratio;
                DMat4::orthographic_rh(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    self.near,
                    self.far,
                )
            }
        }
    }

    /// Frames the axis-aligned box `[min, max]`, looking down -Z, with clip
    /// planes that enclose it.
    pub fn look_at_box(&mut self, min: DVec3, max: DVec3) {
        let center = (min + max) * 0.5;
        let extents = max - min;
        let size = extents.length().max(1e-6);
        let distance = size * 0.5 / (self.fov * 0.5).tan() * 1.2;

        self.target = center;
        self.position = center + DVec3::new(0.0, 0.0, distance.max(size));
        self.near = (distance.max(size) - size).max(size * 1e-3);
        self.far = distance.max(size) + size * 2.0;
        self.ortho_scale = (extents.y.max(extents.x / self.aspect_ratio) * 0.6).max(0.01);
    }

    /// Sets the field of view in radians.
    pub fn set_fov(&mut self, fov: f64) {
        self.fov = fov.clamp(0.1, std::f64::consts::PI - 0.1);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(1.0)
    }
}
