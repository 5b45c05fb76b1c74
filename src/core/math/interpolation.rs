use nalgebra::{Point2, Vector3};

const EPSILON: f32 = 1e-5;

/// Barycentric weights of `p` with respect to the window-space triangle
/// (v1, v2, v3). Works for either winding.
///
/// Returns `None` for degenerate (zero-area) triangles.
pub fn barycentric_coordinates(
    p: Point2<f32>,
    v1: Point2<f32>,
    v2: Point2<f32>,
    v3: Point2<f32>,
) -> Option<Vector3<f32>> {
    let e1 = v2 - v1;
    let e2 = v3 - v1;
    let p_v1 = p - v1;

    let total_area_x2 = e1.x * e2.y - e1.y * e2.x;
    if total_area_x2.abs() < EPSILON {
        return None;
    }
    let inv_total_area_x2 = 1.0 / total_area_x2;

    let beta = (p_v1.x * e2.y - p_v1.y * e2.x) * inv_total_area_x2;
    let gamma = (e1.x * p_v1.y - e1.y * p_v1.x) * inv_total_area_x2;
    let alpha = 1.0 - beta - gamma;

    Some(Vector3::new(alpha, beta, gamma))
}

#[inline(always)]
pub fn is_inside_triangle(bary: Vector3<f32>) -> bool {
    bary.x >= -EPSILON && bary.y >= -EPSILON && bary.z >= -EPSILON
}

/// Perspective-correct weights from screen-space weights and the clip-space
/// w of each vertex: `alpha' = (alpha / w1) / sum(weight / w)`.
///
/// Returns `None` when the weighted sum collapses towards zero.
pub fn perspective_correct_barycentric(
    bary: Vector3<f32>,
    w1: f32,
    w2: f32,
    w3: f32,
) -> Option<Vector3<f32>> {
    let inv_w1 = if w1.abs() > EPSILON { 1.0 / w1 } else { 1.0 };
    let inv_w2 = if w2.abs() > EPSILON { 1.0 / w2 } else { 1.0 };
    let inv_w3 = if w3.abs() > EPSILON { 1.0 / w3 } else { 1.0 };

    let wa = bary.x * inv_w1;
    let wb = bary.y * inv_w2;
    let wc = bary.z * inv_w3;

    let sum = wa + wb + wc;
    if sum.abs() < EPSILON {
        return None;
    }
    let inv_sum = 1.0 / sum;
    Some(Vector3::new(wa * inv_sum, wb * inv_sum, wc * inv_sum))
}

/// Largest absolute slope of an attribute that is affine in window space,
/// `max(|dz/dx|, |dz/dy|)`. This is the `DZ` term of polygon offset.
pub fn max_depth_slope(points: &[Point2<f32>; 3], depths: &[f32; 3]) -> f32 {
    let e1 = points[1] - points[0];
    let e2 = points[2] - points[0];
    let det = e1.x * e2.y - e1.y * e2.x;
    if det.abs() < EPSILON {
        return 0.0;
    }
    let dz1 = depths[1] - depths[0];
    let dz2 = depths[2] - depths[0];
    let dzdx = (dz1 * e2.y - dz2 * e1.y) / det;
    let dzdy = (dz2 * e1.x - dz1 * e2.x) / det;
    dzdx.abs().max(dzdy.abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_gets_full_weight() {
        let (a, b, c) = (
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
        );
        let bary = barycentric_coordinates(b, a, b, c).unwrap();
        assert!((bary.y - 1.0).abs() < 1e-6);
        assert!(is_inside_triangle(bary));
        let outside = barycentric_coordinates(Point2::new(20.0, 20.0), a, b, c).unwrap();
        assert!(!is_inside_triangle(outside));
    }

    #[test]
    fn equal_w_leaves_weights_unchanged() {
        let bary = Vector3::new(0.2, 0.3, 0.5);
        let corrected = perspective_correct_barycentric(bary, 4.0, 4.0, 4.0).unwrap();
        assert!((corrected - bary).norm() < 1e-6);
    }

    #[test]
    fn depth_slope_of_a_ramp() {
        let points = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
        ];
        // z = 0.01 * x + 0.002 * y
        let depths = [0.0, 0.1, 0.02];
        assert!((max_depth_slope(&points, &depths) - 0.01).abs() < 1e-6);
    }
}
