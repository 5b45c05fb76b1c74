use crate::core::framebuffer::FrameBuffer;
use crate::core::math::interpolation::{
    barycentric_coordinates, is_inside_triangle, max_depth_slope, perspective_correct_barycentric,
};
use crate::core::math::transform::{apply_perspective_division, ndc_to_window};
use crate::core::pipeline::Shader;
use nalgebra::{Point2, Vector4};
use rayon::prelude::*;

/// Smallest resolvable depth difference, the `r` of polygon offset.
/// Matches a 24-bit fixed-point depth buffer.
pub const DEPTH_RESOLUTION: f32 = 1.0 / (1 << 24) as f32;

/// Which faces are discarded when culling is enabled. Front faces wind
/// counter-clockwise in window space.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum CullFace {
    Back,
    Front,
}

/// Window rectangle the NDC cube maps onto, lower-left origin.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct Viewport {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Viewport {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Per-draw raster state, resolved from the fixed-function state machine.
#[derive(Copy, Clone, Debug)]
pub struct RasterState {
    pub viewport: Viewport,
    pub cull: Option<CullFace>,
    pub depth_test: bool,
    /// `(factor, units)` when polygon offset fill is enabled.
    pub polygon_offset: Option<(f32, f32)>,
    /// False when all channels of the color mask are off.
    pub color_write: bool,
}

/// Draws clip-space triangles into a framebuffer.
#[derive(Default)]
pub struct Rasterizer;

impl Rasterizer {
    pub fn new() -> Self {
        Self
    }

    /// Rasterize a single triangle given clip-space coordinates and varyings.
    ///
    /// Performs Sutherland–Hodgman clipping against the view frustum in
    /// homogeneous clip space, then fans the resulting convex polygon.
    pub fn rasterize_triangle<S: Shader>(
        &self,
        framebuffer: &FrameBuffer,
        state: &RasterState,
        shader: &S,
        clip_coords: &[Vector4<f32>; 3],
        varyings: &[S::Varying; 3],
    ) {
        // Double-buffered vertex lists; a triangle clipped by a cube stays well under 16.
        let mut current_poly: Vec<(Vector4<f32>, S::Varying)> = Vec::with_capacity(16);
        let mut clip_buffer: Vec<(Vector4<f32>, S::Varying)> = Vec::with_capacity(16);

        for i in 0..3 {
            current_poly.push((clip_coords[i], varyings[i]));
        }

        // (axis, sign): sign * P[axis] <= P.w
        let planes = [
            (0, 1.0),
            (0, -1.0),
            (1, 1.0),
            (1, -1.0),
            (2, 1.0),
            (2, -1.0),
        ];

        for &(axis, sign) in &planes {
            if current_poly.is_empty() {
                return;
            }
            Self::clip_polygon_against_plane::<S>(&current_poly, &mut clip_buffer, axis, sign);
            std::mem::swap(&mut current_poly, &mut clip_buffer);
        }

        if current_poly.len() < 3 {
            return;
        }

        // Flat shading takes its color from the last submitted vertex.
        let provoking = varyings[2];

        let v0 = current_poly[0];
        for i in 1..(current_poly.len() - 1) {
            let v1 = current_poly[i];
            let v2 = current_poly[i + 1];

            self.rasterize_triangle_clipped(
                framebuffer,
                state,
                shader,
                &[v0.0, v1.0, v2.0],
                &[v0.1, v1.1, v2.1],
                &provoking,
            );
        }
    }

    fn clip_polygon_against_plane<S: Shader>(
        input: &[(Vector4<f32>, S::Varying)],
        output: &mut Vec<(Vector4<f32>, S::Varying)>,
        axis: usize,
        sign: f32,
    ) {
        output.clear();
        if input.is_empty() {
            return;
        }

        let is_inside = |p: &Vector4<f32>| sign * p[axis] <= p.w + 1e-6;

        let mut prev = input[input.len() - 1];
        let mut prev_inside = is_inside(&prev.0);

        for curr in input {
            let curr_inside = is_inside(&curr.0);

            if curr_inside {
                if !prev_inside {
                    if let Some(inter) = Self::intersect_edge_plane::<S>(prev, *curr, axis, sign) {
                        output.push(inter);
                    }
                }
                output.push(*curr);
            } else if prev_inside {
                if let Some(inter) = Self::intersect_edge_plane::<S>(prev, *curr, axis, sign) {
                    output.push(inter);
                }
            }

            prev = *curr;
            prev_inside = curr_inside;
        }
    }

    /// Intersection of a clip-space edge with `sign * P[axis] = P.w`,
    /// interpolating position and varying alike.
    #[inline(always)]
    fn intersect_edge_plane<S: Shader>(
        a: (Vector4<f32>, S::Varying),
        b: (Vector4<f32>, S::Varying),
        axis: usize,
        sign: f32,
    ) -> Option<(Vector4<f32>, S::Varying)> {
        let ac = a.0[axis];
        let bc = b.0[axis];
        let aw = a.0.w;
        let bw = b.0.w;

        let denom = sign * (bc - ac) - (bw - aw);
        if denom.abs() < 1e-9 {
            return None;
        }

        let t = (aw - sign * ac) / denom;
        if !t.is_finite() {
            return None;
        }

        let pos = a.0 + (b.0 - a.0) * t;
        let vary = a.1 * (1.0 - t) + b.1 * t;
        Some((pos, vary))
    }

    /// Rasterizes a triangle already inside the frustum: perspective
    /// division, viewport transform, culling, depth and shading.
    fn rasterize_triangle_clipped<S: Shader>(
        &self,
        framebuffer: &FrameBuffer,
        state: &RasterState,
        shader: &S,
        clip_coords: &[Vector4<f32>; 3],
        varyings: &[S::Varying; 3],
        provoking: &S::Varying,
    ) {
        let vp = state.viewport;
        let mut screen = [Point2::origin(); 3];
        let mut depths = [0.0f32; 3];
        let mut w_values = [0.0f32; 3];

        for i in 0..3 {
            if clip_coords[i].w.abs() < 1e-6 {
                return;
            }
            let ndc = apply_perspective_division(&clip_coords[i]);
            let win = ndc_to_window(
                &ndc,
                vp.x as f32,
                vp.y as f32,
                vp.width as f32,
                vp.height as f32,
            );
            screen[i] = Point2::new(win.x, win.y);
            depths[i] = win.z;
            w_values[i] = clip_coords[i].w;
        }

        // Counter-clockwise (positive area) is front-facing.
        let edge1 = screen[1] - screen[0];
        let edge2 = screen[2] - screen[0];
        let signed_area = edge1.x * edge2.y - edge1.y * edge2.x;
        match state.cull {
            Some(CullFace::Back) if signed_area <= 0.0 => return,
            Some(CullFace::Front) if signed_area >= 0.0 => return,
            _ => {}
        }

        let offset = match state.polygon_offset {
            Some((factor, units)) => {
                factor * max_depth_slope(&screen, &depths) + units * DEPTH_RESOLUTION
            }
            None => 0.0,
        };

        // Bounding box clamped to both the viewport and the framebuffer.
        let (min_x, min_y, max_x, max_y) = Self::compute_bounding_box(&screen);
        let x_lo = vp.x as i32;
        let y_lo = vp.y as i32;
        let x_hi = ((vp.x + vp.width).min(framebuffer.width) as i32) - 1;
        let y_hi = ((vp.y + vp.height).min(framebuffer.height) as i32) - 1;
        if max_x < x_lo || max_y < y_lo || min_x > x_hi || min_y > y_hi {
            return;
        }
        let start_x = min_x.max(x_lo) as usize;
        let end_x = max_x.min(x_hi) as usize;
        let start_y = min_y.max(y_lo) as usize;
        let end_y = max_y.min(y_hi) as usize;

        (start_y..=end_y).into_par_iter().for_each(|y| {
            for x in start_x..=end_x {
                let pixel_center = Point2::new(x as f32 + 0.5, y as f32 + 0.5);

                let Some(bary) =
                    barycentric_coordinates(pixel_center, screen[0], screen[1], screen[2])
                else {
                    continue;
                };
                if !is_inside_triangle(bary) {
                    continue;
                }

                // Window depth is affine in screen space.
                let depth = (bary.x * depths[0] + bary.y * depths[1] + bary.z * depths[2] + offset)
                    .clamp(0.0, 1.0);

                if state.depth_test && !framebuffer.depth_test_and_update(x, y, depth) {
                    continue;
                }
                if !state.color_write {
                    continue;
                }

                let Some(corrected) =
                    perspective_correct_barycentric(bary, w_values[0], w_values[1], w_values[2])
                else {
                    continue;
                };
                let interpolated = varyings[0] * corrected.x
                    + varyings[1] * corrected.y
                    + varyings[2] * corrected.z;

                let color = shader.fragment(interpolated, provoking);
                framebuffer.set_pixel_safe(x, y, color);
            }
        });
    }

    fn compute_bounding_box(points: &[Point2<f32>; 3]) -> (i32, i32, i32, i32) {
        let min_x = points[0].x.min(points[1].x).min(points[2].x).floor() as i32;
        let min_y = points[0].y.min(points[1].y).min(points[2].y).floor() as i32;
        let max_x = points[0].x.max(points[1].x).max(points[2].x).ceil() as i32;
        let max_y = points[0].y.max(points[1].y).max(points[2].y).ceil() as i32;
        (min_x, min_y, max_x, max_y)
    }
}
