use nalgebra::{Matrix4, Point3, Vector3};
use shadow_mapping::Error;
use shadow_mapping::app::ShadowDemo;
use shadow_mapping::core::math::transform::{
    TransformFactory, apply_perspective_division, ndc_to_window,
};
use shadow_mapping::io::config::Config;
use shadow_mapping::pipeline::shadow::ProjectiveTextureTransform;
use shadow_mapping::scene::camera::Camera;
use shadow_mapping::scene::light::Light;
use shadow_mapping::scene::mesh::Mesh;
use shadow_mapping::scene::objects::{
    FLOOR_HALF_EXTENT, TORUS_CENTER, TORUS_RING_RADIUS, TORUS_TUBE_RADIUS,
};
use std::time::Duration;

fn config(screen: usize, shadow_map: usize) -> Config {
    let mut config = Config::default();
    config.window.size = screen;
    config.shadow.map_size = shadow_map;
    config
}

/// Torus vertices in world space, placed as the scene draws them.
fn torus_world_vertices() -> Vec<Point3<f32>> {
    let [x, y, z] = TORUS_CENTER;
    let model = TransformFactory::translation(&Vector3::new(x, y, z))
        * TransformFactory::rotation(&Vector3::x(), 90f32.to_radians());
    Mesh::torus(TORUS_TUBE_RADIUS, TORUS_RING_RADIUS, 60, 60)
        .vertices
        .iter()
        .map(|v| Point3::from_homogeneous(model * v.position.to_homogeneous()).unwrap())
        .collect()
}

/// Where the ray from `light` through `p` meets the floor plane.
fn floor_projection(light: &Point3<f32>, p: &Point3<f32>) -> Point3<f32> {
    let t = light.y / (light.y - p.y);
    light + (p - light) * t
}

fn window_pixel(view_projection: &Matrix4<f32>, world: &Point3<f32>, size: usize) -> (usize, usize) {
    let ndc = apply_perspective_division(&(view_projection * world.to_homogeneous()));
    let win = ndc_to_window(&ndc, 0.0, 0.0, size as f32, size as f32);
    (win.x as usize, win.y as usize)
}

#[test]
fn torus_shadow_stays_on_the_floor_for_a_full_orbit() {
    let torus = torus_world_vertices();
    let mut light = Light::new();

    for _ in 0..360 {
        let position = light.position();
        let camera = Camera::at_light(position);
        let transform =
            ProjectiveTextureTransform::from_light(camera.projection_matrix(), camera.view_matrix());

        for p in &torus {
            let shadow = floor_projection(&position, p);
            assert!(shadow.x.abs() <= FLOOR_HALF_EXTENT && shadow.z.abs() <= FLOOR_HALF_EXTENT);

            // The caster itself is inside the light's frustum.
            let tex = transform.project(p);
            assert!(
                tex.iter().all(|c| (0.0..=1.0).contains(c)),
                "torus vertex {p} leaves the shadow map at angle {}",
                light.angle()
            );
        }
        light.update_position();
    }
}

#[test]
fn rendered_frame_shadows_the_floor_under_the_torus() {
    let size = 600;
    let mut demo = ShadowDemo::new(&config(size, 512)).unwrap();

    // A quarter orbit puts the light at (100, 100, 0), away from the
    // observer's line of sight.
    assert_eq!(demo.tick(Duration::from_millis(900)), 90);
    demo.render_frame();
    let light = demo.light().position();
    assert!((light - Point3::new(100.0, 100.0, 0.0)).norm() < 1e-2);

    // Shadow of the tube center nearest the observer, and open floor.
    let shadowed = floor_projection(&light, &Point3::new(0.0, 25.0, 10.0));
    let lit = Point3::new(30.0, 0.0, 30.0);

    // The lookup the shadow test performs.
    let shadow = demo.shadow();
    let transform = shadow.transform().unwrap();
    let map = demo.context().texture(shadow.texture_id().unwrap()).unwrap();
    let sample = |p: &Point3<f32>| {
        let tex = transform.project(p);
        map.sample(tex.x, tex.y, tex.z)
    };
    assert!(sample(&shadowed) < 1e-6);
    assert!(sample(&lit) > 1.0 - 1e-6);

    // And the pixels it produced.
    let camera = demo.camera();
    let view_projection = camera.projection_matrix() * camera.view_matrix();
    let fb = demo.context().framebuffer();

    let (x, y) = window_pixel(&view_projection, &shadowed, size);
    let dark = fb.get_pixel(x, y).unwrap();
    assert!(dark.max() < 0.05, "shadowed floor rendered as {dark}");

    let (x, y) = window_pixel(&view_projection, &lit, size);
    let bright = fb.get_pixel(x, y).unwrap();
    assert!(bright.x > 0.5, "lit floor rendered as {bright}");
}

#[test]
fn shadow_map_may_match_but_not_exceed_the_screen() {
    assert!(ShadowDemo::new(&config(600, 600)).is_ok());
    assert!(matches!(
        ShadowDemo::new(&config(600, 601)),
        Err(Error::ShadowMapTooLarge {
            resolution: 601,
            width: 600,
            height: 600
        })
    ));
}

#[test]
fn headless_run_writes_the_last_frame() {
    let path = std::env::temp_dir().join(format!(
        "shadow-mapping-headless-{}.png",
        std::process::id()
    ));
    let mut config = config(96, 64);
    config.output.frames = 3;
    config.output.path = path.to_string_lossy().into_owned();

    shadow_mapping::app::run_headless(&config).unwrap();

    let img = image::open(&path).unwrap();
    assert_eq!((img.width(), img.height()), (96, 96));
    std::fs::remove_file(&path).unwrap();
}
