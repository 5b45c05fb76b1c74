use nalgebra::{Point3, Vector3};

/// A single vertex as submitted to the fixed-function pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Position in object space.
    pub position: Point3<f32>,
    /// Normal in object space. The lighting stage renormalizes it.
    pub normal: Vector3<f32>,
}

impl Vertex {
    pub fn new(position: Point3<f32>, normal: Vector3<f32>) -> Self {
        Self { position, normal }
    }
}
