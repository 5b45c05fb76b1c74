use crate::core::geometry::Vertex;
use nalgebra::{Vector3, Vector4};
use std::ops::{Add, Mul};

/// Types that can be linearly interpolated across a triangle's surface.
///
/// - Add + Mul<f32>: the linear combination used by barycentric interpolation.
/// - Send + Sync: rows of a triangle are shaded in parallel.
pub trait Interpolatable:
    Copy + Clone + Add<Output = Self> + Mul<f32, Output = Self> + Send + Sync
{
}

/// The two per-primitive stages of the pipeline.
///
/// The fixed-function state is compiled into one implementation per draw
/// call, so implementations are snapshots and must be thread-safe.
pub trait Shader: Send + Sync {
    /// Per-vertex outputs interpolated for each fragment.
    type Varying: Interpolatable;

    /// Transforms a vertex into homogeneous clip space and produces the
    /// varying data for it.
    fn vertex(&self, vertex: &Vertex) -> (Vector4<f32>, Self::Varying);

    /// Computes the final color of a fragment from its interpolated varying.
    /// `provoking` is the varying of the triangle's last vertex, used when
    /// flat shading is requested.
    fn fragment(&self, varying: Self::Varying, provoking: &Self::Varying) -> Vector3<f32>;
}
