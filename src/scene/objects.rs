use crate::core::geometry::Vertex;
use crate::pipeline::context::RenderContext;
use nalgebra::{Point3, Vector3};

pub const FLOOR_HALF_EXTENT: f32 = 100.0;
pub const FLOOR_COLOR: [f32; 3] = [0.808, 0.015, 0.024];

pub const TORUS_CENTER: [f32; 3] = [0.0, 25.0, 0.0];
pub const TORUS_COLOR: [f32; 3] = [0.308, 0.615, 0.824];
pub const TORUS_TUBE_RADIUS: f32 = 5.0;
pub const TORUS_RING_RADIUS: f32 = 10.0;
const TORUS_SIDES: u32 = 60;
const TORUS_RINGS: u32 = 60;

/// The fixed scene: a torus floating above a square floor.
///
/// Holds nothing but immutable geometry, so drawing it twice in a frame gives
/// both passes identical triangles.
#[derive(Debug, Clone)]
pub struct Scene {
    floor: [Vertex; 4],
}

impl Scene {
    pub fn new() -> Self {
        let up = Vector3::y();
        let e = FLOOR_HALF_EXTENT;
        Self {
            floor: [
                Vertex::new(Point3::new(-e, 0.0, -e), up),
                Vertex::new(Point3::new(-e, 0.0, e), up),
                Vertex::new(Point3::new(e, 0.0, -e), up),
                Vertex::new(Point3::new(e, 0.0, e), up),
            ],
        }
    }

    /// Draws the torus, then the floor.
    pub fn draw(&self, ctx: &mut RenderContext) {
        self.draw_torus(ctx);
        self.draw_floor(ctx);
    }

    fn draw_floor(&self, ctx: &mut RenderContext) {
        let [r, g, b] = FLOOR_COLOR;
        ctx.color(r, g, b);
        ctx.draw_triangle_strip(&self.floor);
    }

    fn draw_torus(&self, ctx: &mut RenderContext) {
        ctx.push_matrix();

        let [x, y, z] = TORUS_CENTER;
        ctx.translate(x, y, z);
        // Lay the ring flat, its axis along Y.
        ctx.rotate(90.0, 1.0, 0.0, 0.0);

        let [r, g, b] = TORUS_COLOR;
        ctx.color(r, g, b);
        ctx.solid_torus(TORUS_TUBE_RADIUS, TORUS_RING_RADIUS, TORUS_SIDES, TORUS_RINGS);

        ctx.pop_matrix();
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::MatrixMode;

    #[test]
    fn draw_leaves_the_model_view_untouched() {
        let mut ctx = RenderContext::new(16, 16);
        ctx.matrix_mode(MatrixMode::ModelView);
        ctx.translate(1.0, 2.0, 3.0);
        let before = ctx.current_matrix(MatrixMode::ModelView);

        Scene::new().draw(&mut ctx);

        assert_eq!(ctx.current_matrix(MatrixMode::ModelView), before);
    }

    #[test]
    fn floor_faces_up() {
        let scene = Scene::new();
        let [a, b, c, _] = &scene.floor;
        let n = (b.position - a.position).cross(&(c.position - a.position));
        assert!(n.y > 0.0);
    }
}
