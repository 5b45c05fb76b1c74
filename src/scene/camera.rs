use crate::core::math::transform::TransformFactory;
use crate::pipeline::context::RenderContext;
use crate::pipeline::state::{ClearMask, MatrixMode};
use nalgebra::{Matrix4, Point3, Vector3};

pub const FOV_Y_DEG: f32 = 60.0;
pub const ASPECT_RATIO: f32 = 1.0;
pub const NEAR: f32 = 85.0;
pub const FAR: f32 = 400.0;

/// Perspective camera looking at the origin. The same frustum is used for
/// the observer and for the view from the light.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fov_y_deg: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,

    // --- Cached Matrices ---
    view_matrix: Matrix4<f32>,
    projection_matrix: Matrix4<f32>,
}

impl Camera {
    pub fn new(position: Point3<f32>, target: Point3<f32>, up: Vector3<f32>) -> Self {
        let mut cam = Self {
            position,
            target,
            up,
            fov_y_deg: FOV_Y_DEG,
            aspect_ratio: ASPECT_RATIO,
            near: NEAR,
            far: FAR,
            view_matrix: Matrix4::identity(),
            projection_matrix: Matrix4::identity(),
        };
        cam.update_matrices();
        cam
    }

    /// The viewer's camera at (0, 200, 200).
    pub fn observer() -> Self {
        Self::new(Point3::new(0.0, 200.0, 200.0), Point3::origin(), Vector3::y())
    }

    /// A camera placed at the light, looking at the origin.
    pub fn at_light(position: Point3<f32>) -> Self {
        Self::new(position, Point3::origin(), Vector3::y())
    }

    pub fn update_matrices(&mut self) {
        self.view_matrix = TransformFactory::look_at(&self.position, &self.target, &self.up);
        self.projection_matrix = TransformFactory::perspective(
            self.aspect_ratio,
            self.fov_y_deg.to_radians(),
            self.near,
            self.far,
        );
    }

    pub fn view_matrix(&self) -> &Matrix4<f32> {
        &self.view_matrix
    }

    pub fn projection_matrix(&self) -> &Matrix4<f32> {
        &self.projection_matrix
    }

    /// Loads the projection and view into the context. Leaves the viewport,
    /// the buffers and the matrix mode (model-view) otherwise untouched.
    pub fn apply(&self, ctx: &mut RenderContext) {
        ctx.matrix_mode(MatrixMode::Projection);
        ctx.load_identity();
        ctx.perspective(self.fov_y_deg, self.aspect_ratio, self.near, self.far);

        ctx.matrix_mode(MatrixMode::ModelView);
        ctx.load_identity();
        ctx.look_at(self.position, self.target, self.up);
    }

    /// Full-window setup for the observer pass: viewport, matrices, then a
    /// color and depth clear.
    pub fn setup(&self, ctx: &mut RenderContext, width: usize, height: usize) {
        ctx.viewport(0, 0, width, height);
        self.apply(ctx);
        ctx.clear(ClearMask::COLOR | ClearMask::DEPTH);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::observer()
    }
}
