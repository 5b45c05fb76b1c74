use crate::core::geometry::Vertex;
use nalgebra::{Point3, Vector3};
use std::f32::consts::PI;

/// Indexed triangles. Front faces wind counter-clockwise when seen from the
/// side the normals point to.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    /// Three indices per triangle.
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    #[cfg(test)]
    fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Triangles of a strip. Odd triangles swap their first two vertices so
    /// every triangle keeps the strip's winding and its last vertex.
    pub fn triangle_strip(vertices: &[Vertex]) -> Self {
        let mut indices = Vec::with_capacity(vertices.len().saturating_sub(2) * 3);
        for i in 0..vertices.len().saturating_sub(2) {
            let i = i as u32;
            if i % 2 == 0 {
                indices.extend_from_slice(&[i, i + 1, i + 2]);
            } else {
                indices.extend_from_slice(&[i + 1, i, i + 2]);
            }
        }
        Self::new(vertices.to_vec(), indices)
    }

    /// Torus around the Z axis, centered on the origin.
    ///
    /// `inner_radius` is the radius of the tube, `outer_radius` the distance
    /// from the center to the middle of the tube. `sides` subdivides the tube
    /// cross-section, `rings` the sweep around Z.
    pub fn torus(inner_radius: f32, outer_radius: f32, sides: u32, rings: u32) -> Self {
        let sides = sides.max(3);
        let rings = rings.max(3);

        let mut vertices = Vec::with_capacity(((sides + 1) * (rings + 1)) as usize);
        for i in 0..=rings {
            let phi = 2.0 * PI * i as f32 / rings as f32;
            let (sin_phi, cos_phi) = phi.sin_cos();
            for j in 0..=sides {
                let theta = 2.0 * PI * j as f32 / sides as f32;
                let (sin_theta, cos_theta) = theta.sin_cos();
                let dist = outer_radius + inner_radius * cos_theta;
                vertices.push(Vertex::new(
                    Point3::new(cos_phi * dist, sin_phi * dist, inner_radius * sin_theta),
                    Vector3::new(cos_phi * cos_theta, sin_phi * cos_theta, sin_theta),
                ));
            }
        }

        let stride = sides + 1;
        let mut indices = Vec::with_capacity((sides * rings * 6) as usize);
        for i in 0..rings {
            for j in 0..sides {
                let a = i * stride + j;
                let b = (i + 1) * stride + j;
                let c = b + 1;
                let d = a + 1;
                indices.extend_from_slice(&[a, b, c, a, c, d]);
            }
        }

        Self::new(vertices, indices)
    }

    /// Sphere centered on the origin with its poles on the Z axis.
    pub fn sphere(radius: f32, slices: u32, stacks: u32) -> Self {
        let slices = slices.max(3);
        let stacks = stacks.max(2);

        let mut vertices = Vec::with_capacity(((slices + 1) * (stacks + 1)) as usize);
        for k in 0..=stacks {
            let theta = PI * k as f32 / stacks as f32;
            let (sin_theta, cos_theta) = theta.sin_cos();
            for l in 0..=slices {
                let phi = 2.0 * PI * l as f32 / slices as f32;
                let (sin_phi, cos_phi) = phi.sin_cos();
                let normal = Vector3::new(sin_theta * cos_phi, sin_theta * sin_phi, cos_theta);
                vertices.push(Vertex::new(Point3::from(normal * radius), normal));
            }
        }

        let stride = slices + 1;
        let mut indices = Vec::with_capacity((slices * stacks * 6) as usize);
        for k in 0..stacks {
            for l in 0..slices {
                let a = k * stride + l;
                let b = (k + 1) * stride + l;
                let c = b + 1;
                let d = a + 1;
                // The first and last stacks collapse into the poles.
                if k + 1 != stacks {
                    indices.extend_from_slice(&[a, b, c]);
                }
                if k != 0 {
                    indices.extend_from_slice(&[a, c, d]);
                }
            }
        }

        Self::new(vertices, indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_normal(mesh: &Mesh, tri: usize) -> Vector3<f32> {
        let idx = &mesh.indices[tri * 3..tri * 3 + 3];
        let p0 = mesh.vertices[idx[0] as usize].position;
        let p1 = mesh.vertices[idx[1] as usize].position;
        let p2 = mesh.vertices[idx[2] as usize].position;
        (p1 - p0).cross(&(p2 - p0))
    }

    fn assert_winding_matches_normals(mesh: &Mesh) {
        for tri in 0..mesh.triangle_count() {
            let n = face_normal(mesh, tri);
            if n.norm() < 1e-6 {
                continue;
            }
            let v = mesh.vertices[mesh.indices[tri * 3] as usize].normal;
            assert!(n.dot(&v) > 0.0, "triangle {tri} winds against its normal");
        }
    }

    #[test]
    fn strip_alternates_winding_to_stay_front_facing() {
        let up = Vector3::y();
        let strip = [
            Vertex::new(Point3::new(-100.0, 0.0, -100.0), up),
            Vertex::new(Point3::new(-100.0, 0.0, 100.0), up),
            Vertex::new(Point3::new(100.0, 0.0, -100.0), up),
            Vertex::new(Point3::new(100.0, 0.0, 100.0), up),
        ];
        let mesh = Mesh::triangle_strip(&strip);
        assert_eq!(mesh.indices, vec![0, 1, 2, 2, 1, 3]);
        assert_winding_matches_normals(&mesh);
    }

    #[test]
    fn torus_has_expected_extent_and_outward_faces() {
        let mesh = Mesh::torus(5.0, 10.0, 60, 60);
        assert_eq!(mesh.triangle_count(), 60 * 60 * 2);
        for v in &mesh.vertices {
            let radial = (v.position.x.powi(2) + v.position.y.powi(2)).sqrt();
            assert!((5.0 - 1e-3..=15.0 + 1e-3).contains(&radial));
            assert!(v.position.z.abs() <= 5.0 + 1e-3);
        }
        assert_winding_matches_normals(&mesh);
    }

    #[test]
    fn sphere_vertices_lie_on_radius_and_skip_pole_slivers() {
        let mesh = Mesh::sphere(2.0, 30, 30);
        for v in &mesh.vertices {
            assert!((v.position.coords.norm() - 2.0).abs() < 1e-4);
        }
        assert_eq!(mesh.triangle_count(), 30 * 30 * 2 - 2 * 30);
        assert_winding_matches_normals(&mesh);
    }
}
