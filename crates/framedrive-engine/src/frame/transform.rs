use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Transform constant buffer contents as the vertex shader reads them.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct TransformUniform {
    pub world: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
}

/// Fixed camera used to view the quad.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, -3.0),
            target: Vec3::ZERO,
            fov_y: std::f32::consts::FRAC_PI_2,
            near: 0.1,
            far: 10.0,
        }
    }
}

impl Camera {
    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        let view = Mat4::look_at_lh(self.eye, self.target, Vec3::Y);
        let proj = Mat4::perspective_lh(self.fov_y, aspect.max(f32::EPSILON), self.near, self.far);
        proj * view
    }
}

/// Rotation advanced by a fixed step once per frame.
///
/// The angle depends only on the number of frames, never on wall time.
#[derive(Debug, Clone)]
pub struct Rotation {
    angle: f32,
    step: f32,
    frames: u64,
}

impl Rotation {
    pub fn new(step: f32) -> Self {
        Self {
            angle: 0.0,
            step,
            frames: 0,
        }
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn advance(&mut self) {
        self.angle += self.step;
        self.frames += 1;
    }

    pub fn uniform(&self, camera: &Camera, aspect: f32) -> TransformUniform {
        TransformUniform {
            world: Mat4::from_rotation_y(self.angle).to_cols_array_2d(),
            view_proj: camera.view_proj(aspect).to_cols_array_2d(),
        }
    }
}
