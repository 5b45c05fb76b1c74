use crate::core::rasterizer::CullFace;
use crate::error::Result;
use crate::io::config::Config;
use crate::io::image::save_buffer_to_image;
use crate::pipeline::context::RenderContext;
use crate::pipeline::shadow::{PolygonOffset, ShadowMapper};
use crate::pipeline::state::{Capability, ClearMask, ColorMaterialMode, ShadeModel};
use crate::scene::animation::TickScheduler;
use crate::scene::camera::Camera;
use crate::scene::light::Light;
use crate::scene::objects::Scene;
use log::{debug, info};
use minifb::{Key, Window, WindowOptions};
use std::time::{Duration, Instant};

/// Everything a frame needs, built once at startup.
pub struct ShadowDemo {
    ctx: RenderContext,
    scene: Scene,
    light: Light,
    camera: Camera,
    shadow: ShadowMapper,
    scheduler: TickScheduler,
    screen_size: usize,
}

impl ShadowDemo {
    pub fn new(config: &Config) -> Result<Self> {
        let size = config.window.size;

        let shadow = ShadowMapper::new(config.shadow.map_size, size, size)?.with_polygon_offset(
            PolygonOffset {
                factor: config.shadow.offset_factor,
                units: config.shadow.offset_units,
            },
        );

        let mut ctx = RenderContext::new(size, size);
        configure_pipeline(&mut ctx);

        info!(
            "Screen {size}x{size}, shadow map {0}x{0}",
            config.shadow.map_size
        );

        Ok(Self {
            ctx,
            scene: Scene::new(),
            light: Light::new(),
            camera: Camera::observer(),
            shadow,
            scheduler: TickScheduler::new(
                config.animation.tick_interval(),
                config.animation.max_ticks_per_frame,
            ),
            screen_size: size,
        })
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    pub fn light(&self) -> &Light {
        &self.light
    }

    pub fn light_mut(&mut self) -> &mut Light {
        &mut self.light
    }

    pub fn shadow(&self) -> &ShadowMapper {
        &self.shadow
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn screen_size(&self) -> usize {
        self.screen_size
    }

    /// Feeds elapsed wall time to the animation and moves the light once per
    /// tick that became due. Returns the number of ticks.
    pub fn tick(&mut self, elapsed: Duration) -> u32 {
        let due = self.scheduler.advance(elapsed);
        self.light.advance(due);
        due
    }

    fn setup_camera_in_light_position(&mut self) {
        Camera::at_light(self.light.position()).apply(&mut self.ctx);
    }

    /// Renders one frame: depth capture from the light, then the shadowed
    /// scene from the observer, then the light marker.
    pub fn render_frame(&mut self) {
        self.ctx.clear(ClearMask::COLOR | ClearMask::DEPTH);

        self.setup_camera_in_light_position();
        {
            let mut capture = self.shadow.begin_depth_capture(&mut self.ctx);
            self.scene.draw(&mut capture);
        }

        self.camera
            .setup(&mut self.ctx, self.screen_size, self.screen_size);
        {
            let mut test = self.shadow.begin_shadow_test(&mut self.ctx);
            self.light.enable(&mut test);
            self.scene.draw(&mut test);
            self.light.disable(&mut test);
        }

        self.light.draw(&mut self.ctx);
        debug!("Frame rendered, light at {:.1}°", self.light.angle().to_degrees());
    }

    /// Copies the finished frame into `buffer` (0RGB, top row first).
    pub fn present(&self, buffer: &mut [u32]) {
        self.ctx.present_to_buffer(buffer);
    }

    /// Frees the shadow map.
    pub fn shutdown(&mut self) {
        self.shadow.release(&mut self.ctx);
    }
}

/// Global state set once: depth test, back-face culling, smooth shading and
/// lighting with the current color as emission.
fn configure_pipeline(ctx: &mut RenderContext) {
    ctx.clear_depth(1.0);
    ctx.enable(Capability::DepthTest);
    ctx.enable(Capability::CullFace);
    ctx.cull_face(CullFace::Back);

    ctx.shade_model(ShadeModel::Smooth);

    ctx.enable(Capability::Lighting);
    ctx.color_material(ColorMaterialMode::Emission);
    ctx.enable(Capability::ColorMaterial);
}

/// Runs the demo in a window until it is closed or Escape is pressed.
pub fn run_gui(config: &Config) -> Result<()> {
    let mut demo = ShadowDemo::new(config)?;
    let size = demo.screen_size();

    info!("Starting GUI mode ({size}x{size})...");

    let mut window = Window::new(
        &config.window.title,
        size,
        size,
        WindowOptions {
            resize: false,
            ..WindowOptions::default()
        },
    )?;
    window.set_target_fps(config.window.target_fps);

    let mut buffer = vec![0u32; size * size];
    let mut frame_count = 0;
    let mut last_fps_update = Instant::now();
    let mut last_frame_time = Instant::now();

    while window.is_open() && !window.is_key_down(Key::Escape) {
        let now = Instant::now();
        demo.tick(now - last_frame_time);
        last_frame_time = now;

        demo.render_frame();
        demo.present(&mut buffer);
        window.update_with_buffer(&buffer, size, size)?;

        frame_count += 1;
        if last_fps_update.elapsed().as_secs_f32() >= 2.0 {
            info!(
                "Average FPS: {:.1}",
                frame_count as f32 / last_fps_update.elapsed().as_secs_f32()
            );
            frame_count = 0;
            last_fps_update = Instant::now();
        }
    }

    demo.shutdown();
    info!("Window closed.");
    Ok(())
}

/// Renders a fixed number of frames with a simulated frame time and saves
/// the last one.
pub fn run_headless(config: &Config) -> Result<()> {
    info!("Starting headless mode...");
    let mut demo = ShadowDemo::new(config)?;
    let size = demo.screen_size();
    let start_time = Instant::now();

    for _ in 0..config.output.frames {
        demo.tick(config.output.frame_time());
        demo.render_frame();
    }

    info!(
        "Rendered {} frames in {:.2?}",
        config.output.frames,
        start_time.elapsed()
    );

    info!("Saving output to '{}'...", config.output.path);
    let mut buffer = vec![0u32; size * size];
    demo.present(&mut buffer);
    save_buffer_to_image(&buffer, size, size, &config.output.path)?;

    demo.shutdown();
    info!("Done.");
    Ok(())
}
