//! Camera and per-frame uniforms.

use glam::{Mat4, Vec3};

/// Left-handed perspective camera producing Vulkan clip space
/// (y down, depth in `[0, 1]`).
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub direction: Vec3,
    pub up: Vec3,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, -3.0),
            direction: Vec3::Z,
            up: Vec3::Y,
            fov: std::f32::consts::FRAC_PI_4,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    /// Camera at `position` looking at `target`.
    pub fn looking_at(position: Vec3, target: Vec3, aspect: f32) -> Self {
        Self {
            position,
            direction: (target - position).normalize(),
            aspect,
            ..Self::default()
        }
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.direction = (target - self.position).normalize();
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_lh(self.position, self.direction, self.up)
    }

    /// Perspective projection with the y axis flipped for Vulkan.
    pub fn projection_matrix(&self) -> Mat4 {
        let mut projection = Mat4::perspective_lh(self.fov, self.aspect, self.near, self.far);
        projection.y_axis.y = -projection.y_axis.y;
        projection
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Uniforms for drawing with `model` as the object transform.
    pub fn uniforms(&self, model: Mat4) -> FrameUniforms {
        FrameUniforms {
            mvp: (self.view_projection_matrix() * model).to_cols_array_2d(),
        }
    }
}

/// Per-frame uniform buffer contents (binding 0 of set 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub mvp: [[f32; 4]; 4],
}

/// Object transform for frame `frame_number`: a slow spin about y with a
/// fixed tilt so three faces are visible.
pub fn model_rotation(frame_number: u64) -> Mat4 {
    let angle = (frame_number % 3600) as f32 * (std::f32::consts::TAU / 3600.0);
    Mat4::from_rotation_x(0.4) * Mat4::from_rotation_y(angle)
}
