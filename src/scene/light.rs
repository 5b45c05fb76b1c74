use crate::pipeline::context::RenderContext;
use crate::pipeline::state::Capability;
use nalgebra::{Point3, Vector4};
use std::f32::consts::PI;

pub const ORBIT_RADIUS: f32 = 100.0;
pub const ORBIT_HEIGHT: f32 = 100.0;
/// Ticks in one revolution.
pub const TICKS_PER_ORBIT: u32 = 360;
/// Angle advanced per tick.
pub const ORBIT_STEP: f32 = PI / 180.0;

const AMBIENT: [f32; 4] = [0.4, 0.4, 0.4, 1.0];
const DIFFUSE: [f32; 4] = [0.4, 0.4, 0.4, 1.0];
const SPECULAR: [f32; 4] = [0.2, 0.2, 0.2, 1.0];

const MARKER_RADIUS: f32 = 2.0;
const MARKER_DETAIL: u32 = 30;

/// The single point light, circling the Y axis above the scene.
#[derive(Debug, Clone)]
pub struct Light {
    /// Ticks into the current revolution, in `0..TICKS_PER_ORBIT`.
    ticks: u32,
    position: Point3<f32>,
}

impl Light {
    /// A light at angle 0, that is at (0, 100, 100).
    pub fn new() -> Self {
        Self {
            ticks: 0,
            position: orbit_position(0.0),
        }
    }

    /// One animation tick.
    pub fn update_position(&mut self) {
        self.advance(1);
    }

    pub fn advance(&mut self, ticks: u32) {
        // The angle is derived from the tick count, never accumulated.
        let total = u64::from(self.ticks) + u64::from(ticks);
        self.ticks = (total % u64::from(TICKS_PER_ORBIT)) as u32;
        self.position = orbit_position(self.angle());
    }

    /// Orbit angle in radians, in `[0, 2π)`.
    pub fn angle(&self) -> f32 {
        self.ticks as f32 * ORBIT_STEP
    }

    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    /// Turns on Light0 with this light's colors and position. The position
    /// goes through the current model-view, so call this after the camera is
    /// set up.
    pub fn enable(&self, ctx: &mut RenderContext) {
        ctx.enable(Capability::Light0);
        ctx.light_ambient(Vector4::from(AMBIENT));
        ctx.light_diffuse(Vector4::from(DIFFUSE));
        ctx.light_specular(Vector4::from(SPECULAR));
        ctx.light_position(self.position.to_homogeneous());
    }

    pub fn disable(&self, ctx: &mut RenderContext) {
        ctx.disable(Capability::Light0);
    }

    /// Draws a small white sphere where the light is.
    pub fn draw(&self, ctx: &mut RenderContext) {
        ctx.push_matrix();
        ctx.translate(self.position.x, self.position.y, self.position.z);
        ctx.color(1.0, 1.0, 1.0);
        ctx.solid_sphere(MARKER_RADIUS, MARKER_DETAIL, MARKER_DETAIL);
        ctx.pop_matrix();
    }
}

impl Default for Light {
    fn default() -> Self {
        Self::new()
    }
}

fn orbit_position(angle: f32) -> Point3<f32> {
    let (sin, cos) = angle.sin_cos();
    Point3::new(sin * ORBIT_RADIUS, ORBIT_HEIGHT, cos * ORBIT_RADIUS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::MatrixMode;

    fn assert_close(a: Point3<f32>, b: Point3<f32>) {
        assert!((a - b).norm() < 1e-3, "{a} != {b}");
    }

    #[test]
    fn starts_above_positive_z() {
        let light = Light::new();
        assert_eq!(light.angle(), 0.0);
        assert_close(light.position(), Point3::new(0.0, 100.0, 100.0));
    }

    #[test]
    fn ninety_ticks_is_a_quarter_turn() {
        let mut light = Light::new();
        light.advance(90);
        assert!((light.angle() - PI / 2.0).abs() < 1e-4);
        assert_close(light.position(), Point3::new(100.0, 100.0, 0.0));
    }

    #[test]
    fn full_revolution_returns_to_start() {
        let mut light = Light::new();
        light.advance(360);
        assert_eq!(light.angle(), 0.0);
        assert_close(light.position(), Point3::new(0.0, 100.0, 100.0));
    }

    #[test]
    fn long_runs_do_not_drift() {
        let mut light = Light::new();
        light.advance(36_000);
        assert_close(light.position(), Point3::new(0.0, 100.0, 100.0));

        // One tick at a time lands in the same place as a single jump.
        let mut stepped = Light::new();
        for _ in 0..36_090 {
            stepped.update_position();
        }
        assert!((stepped.angle() - PI / 2.0).abs() < 1e-6);
        assert_close(stepped.position(), Point3::new(100.0, 100.0, 0.0));
    }

    #[test]
    fn position_stays_on_the_orbit() {
        let mut light = Light::new();
        for _ in 0..500 {
            light.update_position();
            let p = light.position();
            assert!((p.y - ORBIT_HEIGHT).abs() < 1e-6);
            assert!(((p.x * p.x + p.z * p.z).sqrt() - ORBIT_RADIUS).abs() < 1e-3);
        }
    }

    #[test]
    fn enable_stores_position_in_eye_space() {
        let mut ctx = RenderContext::new(8, 8);
        ctx.matrix_mode(MatrixMode::ModelView);
        ctx.translate(0.0, 0.0, -10.0);

        let light = Light::new();
        light.enable(&mut ctx);
        assert!(ctx.is_enabled(Capability::Light0));
        assert_eq!(
            ctx.current_light_position(),
            Vector4::new(0.0, 100.0, 90.0, 1.0)
        );

        light.disable(&mut ctx);
        assert!(!ctx.is_enabled(Capability::Light0));
    }
}
