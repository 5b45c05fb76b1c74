use crate::core::color::pack_rgb;
use crate::core::framebuffer::FrameBuffer;
use crate::core::geometry::Vertex;
use crate::core::math::transform::TransformFactory;
use crate::core::pipeline::Shader;
use crate::core::rasterizer::{CullFace, RasterState, Rasterizer, Viewport};
use crate::core::texture::{DepthTexture, TextureParameters};
use crate::pipeline::shaders::fixed_function::{FixedFunctionShader, LightingSetup};
use crate::pipeline::state::{
    AttribFrame, AttribMask, Capability, ClearMask, ColorBufferState, ColorMaterialMode, Enables,
    LightingState, MatrixMode, MatrixStack, PolygonState, ShadeModel, TexGenPlanes, TextureId,
    TextureState,
};
use crate::scene::mesh::Mesh;
use log::{debug, warn};
use nalgebra::{Matrix4, Point3, Vector3, Vector4};
use rayon::prelude::*;

/// A software fixed-function graphics state machine.
///
/// Owns the window-sized framebuffer and every piece of pipeline state:
/// matrix stacks, capability flags, lighting, texture objects, texture
/// coordinate generation and the attribute stack. Draw calls snapshot the
/// state into a [`FixedFunctionShader`] and hand triangles to the rasterizer.
pub struct RenderContext {
    framebuffer: FrameBuffer,
    rasterizer: Rasterizer,

    projection: MatrixStack,
    model_view: MatrixStack,
    texture_matrix: MatrixStack,
    matrix_mode: MatrixMode,

    enables: Enables,
    lighting: LightingState,
    texture: TextureState,
    viewport: Viewport,
    color_buffer: ColorBufferState,
    polygon: PolygonState,
    clear_depth: f32,
    current_color: Vector4<f32>,

    textures: Vec<Option<DepthTexture>>,
    texture_allocations: usize,

    attrib_stack: Vec<AttribFrame>,
}

impl RenderContext {
    /// Creates a context for a `width` x `height` window with the
    /// fixed-function defaults: everything disabled, identity matrices, the
    /// viewport covering the window.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            framebuffer: FrameBuffer::new(width, height),
            rasterizer: Rasterizer::new(),
            projection: MatrixStack::default(),
            model_view: MatrixStack::default(),
            texture_matrix: MatrixStack::default(),
            matrix_mode: MatrixMode::ModelView,
            enables: Enables::default(),
            lighting: LightingState::default(),
            texture: TextureState::default(),
            viewport: Viewport::new(0, 0, width, height),
            color_buffer: ColorBufferState::default(),
            polygon: PolygonState::default(),
            clear_depth: 1.0,
            current_color: Vector4::new(1.0, 1.0, 1.0, 1.0),
            textures: Vec::new(),
            texture_allocations: 0,
            attrib_stack: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.framebuffer.width
    }

    pub fn height(&self) -> usize {
        self.framebuffer.height
    }

    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    //=================================
    // Matrix stacks
    //=================================

    pub fn matrix_mode(&mut self, mode: MatrixMode) {
        self.matrix_mode = mode;
    }

    pub fn current_matrix_mode(&self) -> MatrixMode {
        self.matrix_mode
    }

    fn stack(&self, mode: MatrixMode) -> &MatrixStack {
        match mode {
            MatrixMode::Projection => &self.projection,
            MatrixMode::ModelView => &self.model_view,
            MatrixMode::Texture => &self.texture_matrix,
        }
    }

    fn current_stack_mut(&mut self) -> &mut MatrixStack {
        match self.matrix_mode {
            MatrixMode::Projection => &mut self.projection,
            MatrixMode::ModelView => &mut self.model_view,
            MatrixMode::Texture => &mut self.texture_matrix,
        }
    }

    /// Top of the given stack, the `glGet` of a matrix.
    pub fn current_matrix(&self, mode: MatrixMode) -> Matrix4<f32> {
        *self.stack(mode).top()
    }

    pub fn load_identity(&mut self) {
        *self.current_stack_mut().top_mut() = Matrix4::identity();
    }

    pub fn load_matrix(&mut self, m: &Matrix4<f32>) {
        *self.current_stack_mut().top_mut() = *m;
    }

    /// Post-multiplies the current matrix: `top = top * m`.
    pub fn mult_matrix(&mut self, m: &Matrix4<f32>) {
        let top = self.current_stack_mut().top_mut();
        *top = *top * m;
    }

    pub fn push_matrix(&mut self) {
        self.current_stack_mut().push();
    }

    pub fn pop_matrix(&mut self) {
        let mode = self.matrix_mode;
        if !self.current_stack_mut().pop() {
            warn!("pop_matrix on {mode:?} stack underflowed; ignored");
        }
    }

    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.mult_matrix(&TransformFactory::translation(&Vector3::new(x, y, z)));
    }

    /// Rotates by `angle_deg` degrees about the axis `(x, y, z)`.
    pub fn rotate(&mut self, angle_deg: f32, x: f32, y: f32, z: f32) {
        self.mult_matrix(&TransformFactory::rotation(
            &Vector3::new(x, y, z),
            angle_deg.to_radians(),
        ));
    }

    /// Multiplies in a perspective projection; `fov_y_deg` in degrees.
    pub fn perspective(&mut self, fov_y_deg: f32, aspect: f32, near: f32, far: f32) {
        self.mult_matrix(&TransformFactory::perspective(
            aspect,
            fov_y_deg.to_radians(),
            near,
            far,
        ));
    }

    pub fn look_at(&mut self, eye: Point3<f32>, target: Point3<f32>, up: Vector3<f32>) {
        self.mult_matrix(&TransformFactory::look_at(&eye, &target, &up));
    }

    //=================================
    // Capabilities and simple state
    //=================================

    pub fn enable(&mut self, cap: Capability) {
        self.enables.set(cap, true);
    }

    pub fn disable(&mut self, cap: Capability) {
        self.enables.set(cap, false);
    }

    pub fn is_enabled(&self, cap: Capability) -> bool {
        self.enables.get(cap)
    }

    pub fn viewport(&mut self, x: usize, y: usize, width: usize, height: usize) {
        self.viewport = Viewport::new(x, y, width, height);
    }

    pub fn current_viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn color_mask(&mut self, r: bool, g: bool, b: bool, a: bool) {
        self.color_buffer.color_mask = [r, g, b, a];
    }

    pub fn current_color_mask(&self) -> [bool; 4] {
        self.color_buffer.color_mask
    }

    pub fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.color_buffer.clear_color = Vector4::new(r, g, b, a);
    }

    pub fn clear_depth(&mut self, depth: f32) {
        self.clear_depth = depth.clamp(0.0, 1.0);
    }

    /// Clears whole buffers regardless of the viewport. An all-off color mask
    /// skips the color clear.
    pub fn clear(&mut self, mask: ClearMask) {
        if mask.contains(ClearMask::COLOR) && self.color_buffer.color_mask.iter().any(|&c| c) {
            self.framebuffer
                .clear_color(self.color_buffer.clear_color.xyz());
        }
        if mask.contains(ClearMask::DEPTH) {
            self.framebuffer.clear_depth(self.clear_depth);
        }
    }

    pub fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.polygon.offset_factor = factor;
        self.polygon.offset_units = units;
    }

    pub fn cull_face(&mut self, face: CullFace) {
        self.polygon.cull_face = face;
    }

    pub fn shade_model(&mut self, model: ShadeModel) {
        self.lighting.shade_model = model;
    }

    pub fn current_shade_model(&self) -> ShadeModel {
        self.lighting.shade_model
    }

    pub fn color(&mut self, r: f32, g: f32, b: f32) {
        self.current_color = Vector4::new(r, g, b, 1.0);
    }

    //=================================
    // Lighting
    //=================================

    pub fn light_ambient(&mut self, color: Vector4<f32>) {
        self.lighting.light0.ambient = color;
    }

    pub fn light_diffuse(&mut self, color: Vector4<f32>) {
        self.lighting.light0.diffuse = color;
    }

    pub fn light_specular(&mut self, color: Vector4<f32>) {
        self.lighting.light0.specular = color;
    }

    /// Sets the light position. Like every fixed-function light position it
    /// is transformed by the current model-view matrix and stored in eye space.
    pub fn light_position(&mut self, position: Vector4<f32>) {
        self.lighting.light0.position = self.model_view.top() * position;
    }

    /// Eye-space position of the light as currently stored.
    pub fn current_light_position(&self) -> Vector4<f32> {
        self.lighting.light0.position
    }

    pub fn color_material(&mut self, mode: ColorMaterialMode) {
        self.lighting.color_material = mode;
    }

    //=================================
    // Texture objects
    //=================================

    /// Creates an empty texture object.
    pub fn gen_texture(&mut self) -> TextureId {
        self.textures.push(Some(DepthTexture::new(0)));
        TextureId(self.textures.len() - 1)
    }

    pub fn bind_texture(&mut self, id: Option<TextureId>) {
        self.texture.bound = id;
    }

    pub fn bound_texture(&self) -> Option<TextureId> {
        self.texture.bound
    }

    fn bound_texture_mut(&mut self) -> Option<&mut DepthTexture> {
        let id = self.texture.bound?;
        self.textures.get_mut(id.0)?.as_mut()
    }

    pub fn texture(&self, id: TextureId) -> Option<&DepthTexture> {
        self.textures.get(id.0)?.as_ref()
    }

    /// Allocates `size` x `size` depth storage for the bound texture,
    /// replacing any previous contents but keeping its sampler state.
    pub fn tex_image_depth(&mut self, size: usize) {
        let Some(texture) = self.bound_texture_mut() else {
            warn!("tex_image_depth with no texture bound; ignored");
            return;
        };
        let params = texture.params;
        *texture = DepthTexture::new(size);
        texture.params = params;
        self.texture_allocations += 1;
        debug!("Allocated {size}x{size} depth texture storage");
    }

    pub fn tex_parameters(&mut self, params: TextureParameters) {
        match self.bound_texture_mut() {
            Some(texture) => texture.params = params,
            None => warn!("tex_parameters with no texture bound; ignored"),
        }
    }

    /// Copies a `width` x `height` block of the depth buffer starting at
    /// window `(x, y)` into the bound texture at `(x_offset, y_offset)`,
    /// without reallocating its storage.
    pub fn copy_tex_sub_image_depth(
        &mut self,
        x_offset: usize,
        y_offset: usize,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) {
        let depth = self.framebuffer.read_depth(x, y, width, height);
        match self.bound_texture_mut() {
            Some(texture) => texture.copy_sub_image(x_offset, y_offset, width, height, &depth),
            None => warn!("copy_tex_sub_image_depth with no texture bound; ignored"),
        }
    }

    pub fn delete_texture(&mut self, id: TextureId) {
        if let Some(slot) = self.textures.get_mut(id.0) {
            *slot = None;
        }
        if self.texture.bound == Some(id) {
            self.texture.bound = None;
        }
    }

    /// Number of times texture storage has been allocated.
    pub fn texture_allocations(&self) -> usize {
        self.texture_allocations
    }

    pub fn live_textures(&self) -> usize {
        self.textures.iter().filter(|t| t.is_some()).count()
    }

    //=================================
    // Texture coordinate generation
    //=================================

    /// Specifies eye-linear planes for S, T, R and Q (rows of `planes`).
    /// They are stored multiplied by the inverse of the current model-view,
    /// so a plane given in world space generates world-space coordinates
    /// from eye-space vertices.
    pub fn tex_gen_eye_linear(&mut self, planes: &Matrix4<f32>) {
        let inverse = self.model_view.top().try_inverse().unwrap_or_else(|| {
            warn!("Singular model-view while specifying eye planes; using identity");
            Matrix4::identity()
        });
        self.texture.eye_planes = TexGenPlanes(planes * inverse);
    }

    pub fn eye_planes(&self) -> TexGenPlanes {
        self.texture.eye_planes
    }

    //=================================
    // Attribute stack
    //=================================

    pub fn push_attrib(&mut self, mask: AttribMask) {
        let pick = |bit: AttribMask| mask.contains(bit);
        self.attrib_stack.push(AttribFrame {
            enables: pick(AttribMask::ENABLE).then_some(self.enables),
            texture: pick(AttribMask::TEXTURE).then_some(self.texture),
            lighting: pick(AttribMask::LIGHTING).then_some(self.lighting),
            viewport: pick(AttribMask::VIEWPORT).then_some(self.viewport),
            color_buffer: pick(AttribMask::COLOR_BUFFER).then_some(self.color_buffer),
            matrix_mode: pick(AttribMask::TRANSFORM).then_some(self.matrix_mode),
            polygon: pick(AttribMask::POLYGON).then_some(self.polygon),
        });
    }

    /// Restores the groups saved by the matching `push_attrib`.
    pub fn pop_attrib(&mut self) {
        let Some(frame) = self.attrib_stack.pop() else {
            warn!("pop_attrib with an empty attribute stack; ignored");
            return;
        };
        if let Some(enables) = frame.enables {
            self.enables = enables;
        }
        if let Some(texture) = frame.texture {
            self.texture = texture;
        }
        if let Some(lighting) = frame.lighting {
            self.lighting = lighting;
        }
        if let Some(viewport) = frame.viewport {
            self.viewport = viewport;
        }
        if let Some(color_buffer) = frame.color_buffer {
            self.color_buffer = color_buffer;
        }
        if let Some(mode) = frame.matrix_mode {
            self.matrix_mode = mode;
        }
        if let Some(polygon) = frame.polygon {
            self.polygon = polygon;
        }
    }

    pub fn attrib_stack_depth(&self) -> usize {
        self.attrib_stack.len()
    }

    //=================================
    // Drawing
    //=================================

    fn raster_state(&self) -> RasterState {
        RasterState {
            viewport: self.viewport,
            cull: self.enables.cull_face.then_some(self.polygon.cull_face),
            depth_test: self.enables.depth_test,
            polygon_offset: self
                .enables
                .polygon_offset_fill
                .then_some((self.polygon.offset_factor, self.polygon.offset_units)),
            color_write: self.color_buffer.color_mask[..3].iter().any(|&c| c),
        }
    }

    fn build_shader(&self) -> FixedFunctionShader<'_> {
        let mut shader = FixedFunctionShader::new(
            *self.projection.top(),
            *self.model_view.top(),
            self.current_color,
            self.lighting.shade_model,
        );

        if self.enables.lighting {
            shader.lighting = Some(LightingSetup::new(
                self.enables.light0.then_some(self.lighting.light0),
                self.lighting.global_ambient,
                self.lighting.material,
                self.enables
                    .color_material
                    .then_some(self.lighting.color_material),
                self.current_color,
            ));
        }

        if self.enables.tex_gen.iter().any(|&g| g) {
            shader.tex_gen = Some((
                self.texture_matrix.top() * self.texture.eye_planes.0,
                self.enables.tex_gen,
            ));
        }

        if self.enables.texture_2d {
            shader.texture = self
                .texture
                .bound
                .and_then(|id| self.texture(id))
                .filter(|tex| tex.size() > 0);
        }

        shader
    }

    /// Draws an indexed triangle mesh with the current state.
    pub fn draw_mesh(&mut self, mesh: &Mesh) {
        let shader = self.build_shader();
        let state = self.raster_state();

        for chunk in mesh.indices.chunks_exact(3) {
            let v0 = &mesh.vertices[chunk[0] as usize];
            let v1 = &mesh.vertices[chunk[1] as usize];
            let v2 = &mesh.vertices[chunk[2] as usize];

            let (pos0, var0) = shader.vertex(v0);
            let (pos1, var1) = shader.vertex(v1);
            let (pos2, var2) = shader.vertex(v2);

            self.rasterizer.rasterize_triangle(
                &self.framebuffer,
                &state,
                &shader,
                &[pos0, pos1, pos2],
                &[var0, var1, var2],
            );
        }
    }

    pub fn draw_triangle_strip(&mut self, vertices: &[Vertex]) {
        self.draw_mesh(&Mesh::triangle_strip(vertices));
    }

    /// Solid torus around the Z axis; see [`Mesh::torus`].
    pub fn solid_torus(&mut self, inner_radius: f32, outer_radius: f32, sides: u32, rings: u32) {
        self.draw_mesh(&Mesh::torus(inner_radius, outer_radius, sides, rings));
    }

    /// Solid sphere around the origin; see [`Mesh::sphere`].
    pub fn solid_sphere(&mut self, radius: f32, slices: u32, stacks: u32) {
        self.draw_mesh(&Mesh::sphere(radius, slices, stacks));
    }

    //=================================
    // Presentation
    //=================================

    /// Converts the color buffer into 0RGB pixels, top row first.
    pub fn present_to_buffer(&self, buffer: &mut [u32]) {
        let width = self.framebuffer.width;
        let height = self.framebuffer.height;
        buffer
            .par_chunks_mut(width)
            .take(height)
            .enumerate()
            .for_each(|(row, pixels)| {
                let y = height - 1 - row;
                for (x, pixel) in pixels.iter_mut().enumerate() {
                    *pixel = self
                        .framebuffer
                        .get_pixel(x, y)
                        .map(pack_rgb)
                        .unwrap_or(0);
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attrib_stack_restores_only_saved_groups() {
        let mut ctx = RenderContext::new(8, 8);
        ctx.enable(Capability::Lighting);
        ctx.viewport(0, 0, 8, 8);

        ctx.push_attrib(AttribMask::ENABLE | AttribMask::VIEWPORT);
        ctx.disable(Capability::Lighting);
        ctx.viewport(0, 0, 4, 4);
        ctx.shade_model(ShadeModel::Flat);
        ctx.pop_attrib();

        assert!(ctx.is_enabled(Capability::Lighting));
        assert_eq!(ctx.current_viewport(), Viewport::new(0, 0, 8, 8));
        // LIGHTING was not pushed, so the shade model change sticks.
        assert_eq!(ctx.current_shade_model(), ShadeModel::Flat);
        assert_eq!(ctx.attrib_stack_depth(), 0);
    }

    #[test]
    fn nested_attrib_frames_pop_in_order() {
        let mut ctx = RenderContext::new(8, 8);

        ctx.push_attrib(AttribMask::VIEWPORT | AttribMask::COLOR_BUFFER);
        ctx.viewport(0, 0, 4, 4);
        ctx.color_mask(false, false, false, false);

        ctx.push_attrib(AttribMask::ENABLE);
        ctx.enable(Capability::Texture2D);
        ctx.viewport(0, 0, 2, 2);
        ctx.pop_attrib();

        // The inner frame held only ENABLE.
        assert!(!ctx.is_enabled(Capability::Texture2D));
        assert_eq!(ctx.current_viewport(), Viewport::new(0, 0, 2, 2));
        assert_eq!(ctx.current_color_mask(), [false; 4]);

        ctx.pop_attrib();
        assert_eq!(ctx.current_viewport(), Viewport::new(0, 0, 8, 8));
        assert_eq!(ctx.current_color_mask(), [true; 4]);
    }

    #[test]
    fn light_position_is_stored_in_eye_space() {
        let mut ctx = RenderContext::new(8, 8);
        ctx.matrix_mode(MatrixMode::ModelView);
        ctx.translate(0.0, 0.0, -10.0);
        ctx.light_position(Vector4::new(0.0, 5.0, 0.0, 1.0));
        assert_eq!(
            ctx.current_light_position(),
            Vector4::new(0.0, 5.0, -10.0, 1.0)
        );
    }

    #[test]
    fn eye_planes_absorb_inverse_model_view() {
        let mut ctx = RenderContext::new(8, 8);
        ctx.look_at(
            Point3::new(0.0, 200.0, 200.0),
            Point3::origin(),
            Vector3::y(),
        );
        let view = ctx.current_matrix(MatrixMode::ModelView);
        ctx.tex_gen_eye_linear(&Matrix4::identity());

        // Planes applied to an eye-space point give back the world point.
        let world = Vector4::new(3.0, 4.0, 5.0, 1.0);
        let generated = ctx.eye_planes().0 * (view * world);
        assert!((generated - world).norm() < 1e-3);
    }

    #[test]
    fn matrix_modes_address_separate_stacks() {
        let mut ctx = RenderContext::new(8, 8);
        ctx.matrix_mode(MatrixMode::Projection);
        ctx.perspective(60.0, 1.0, 85.0, 400.0);
        ctx.matrix_mode(MatrixMode::ModelView);
        ctx.push_matrix();
        ctx.translate(1.0, 2.0, 3.0);
        ctx.pop_matrix();

        assert_eq!(ctx.current_matrix(MatrixMode::ModelView), Matrix4::identity());
        assert_ne!(ctx.current_matrix(MatrixMode::Projection), Matrix4::identity());
    }

    #[test]
    fn masked_depth_only_draw_leaves_color_untouched() {
        let mut ctx = RenderContext::new(16, 16);
        ctx.enable(Capability::DepthTest);
        ctx.clear(ClearMask::COLOR | ClearMask::DEPTH);
        ctx.color_mask(false, false, false, false);
        ctx.color(1.0, 1.0, 1.0);

        // A full-screen quad at NDC depth 0.
        let n = Vector3::z();
        ctx.draw_triangle_strip(&[
            Vertex::new(Point3::new(-1.0, -1.0, 0.0), n),
            Vertex::new(Point3::new(1.0, -1.0, 0.0), n),
            Vertex::new(Point3::new(-1.0, 1.0, 0.0), n),
            Vertex::new(Point3::new(1.0, 1.0, 0.0), n),
        ]);

        let fb = ctx.framebuffer();
        assert_eq!(fb.get_pixel(8, 8), Some(Vector3::zeros()));
        assert!((fb.get_depth(8, 8).unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn presentation_flips_rows() {
        let mut ctx = RenderContext::new(2, 2);
        ctx.clear_color(0.0, 0.0, 0.0, 1.0);
        ctx.clear(ClearMask::COLOR);
        ctx.color(1.0, 0.0, 0.0);
        // Bottom half only.
        ctx.viewport(0, 0, 2, 1);
        let n = Vector3::z();
        ctx.draw_triangle_strip(&[
            Vertex::new(Point3::new(-1.0, -1.0, 0.0), n),
            Vertex::new(Point3::new(1.0, -1.0, 0.0), n),
            Vertex::new(Point3::new(-1.0, 1.0, 0.0), n),
            Vertex::new(Point3::new(1.0, 1.0, 0.0), n),
        ]);

        let mut buffer = vec![0u32; 4];
        ctx.present_to_buffer(&mut buffer);
        assert_eq!(buffer, vec![0, 0, 0xFF0000, 0xFF0000]);
    }
}
