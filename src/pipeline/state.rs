use crate::core::rasterizer::{CullFace, Viewport};
use bitflags::bitflags;
use nalgebra::{Matrix4, Vector4};

bitflags! {
    /// Attribute groups for `push_attrib`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AttribMask: u32 {
        /// Every capability flag.
        const ENABLE = 1 << 0;
        /// Texture binding and texture coordinate generation.
        const TEXTURE = 1 << 1;
        /// Light parameters, color material and shade model.
        const LIGHTING = 1 << 2;
        const VIEWPORT = 1 << 3;
        /// Color write mask and clear color.
        const COLOR_BUFFER = 1 << 4;
        /// Current matrix mode.
        const TRANSFORM = 1 << 5;
        /// Polygon offset factor/units and cull face.
        const POLYGON = 1 << 6;
    }
}

bitflags! {
    /// Buffers touched by `clear`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearMask: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

/// Capabilities toggled by `enable` / `disable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Lighting,
    Light0,
    Texture2D,
    TextureGenS,
    TextureGenT,
    TextureGenR,
    TextureGenQ,
    PolygonOffsetFill,
    CullFace,
    DepthTest,
    ColorMaterial,
}

/// The ENABLE attribute group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Enables {
    pub lighting: bool,
    pub light0: bool,
    pub texture_2d: bool,
    pub tex_gen: [bool; 4],
    pub polygon_offset_fill: bool,
    pub cull_face: bool,
    pub depth_test: bool,
    pub color_material: bool,
}

impl Enables {
    pub fn get(&self, cap: Capability) -> bool {
        match cap {
            Capability::Lighting => self.lighting,
            Capability::Light0 => self.light0,
            Capability::Texture2D => self.texture_2d,
            Capability::TextureGenS => self.tex_gen[0],
            Capability::TextureGenT => self.tex_gen[1],
            Capability::TextureGenR => self.tex_gen[2],
            Capability::TextureGenQ => self.tex_gen[3],
            Capability::PolygonOffsetFill => self.polygon_offset_fill,
            Capability::CullFace => self.cull_face,
            Capability::DepthTest => self.depth_test,
            Capability::ColorMaterial => self.color_material,
        }
    }

    pub fn set(&mut self, cap: Capability, on: bool) {
        let slot = match cap {
            Capability::Lighting => &mut self.lighting,
            Capability::Light0 => &mut self.light0,
            Capability::Texture2D => &mut self.texture_2d,
            Capability::TextureGenS => &mut self.tex_gen[0],
            Capability::TextureGenT => &mut self.tex_gen[1],
            Capability::TextureGenR => &mut self.tex_gen[2],
            Capability::TextureGenQ => &mut self.tex_gen[3],
            Capability::PolygonOffsetFill => &mut self.polygon_offset_fill,
            Capability::CullFace => &mut self.cull_face,
            Capability::DepthTest => &mut self.depth_test,
            Capability::ColorMaterial => &mut self.color_material,
        };
        *slot = on;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixMode {
    Projection,
    ModelView,
    Texture,
}

/// A matrix stack whose top is the current matrix.
#[derive(Debug, Clone)]
pub struct MatrixStack {
    stack: Vec<Matrix4<f32>>,
}

impl Default for MatrixStack {
    fn default() -> Self {
        Self {
            stack: vec![Matrix4::identity()],
        }
    }
}

impl MatrixStack {
    pub fn top(&self) -> &Matrix4<f32> {
        // The stack never drops below one entry.
        &self.stack[self.stack.len() - 1]
    }

    pub fn top_mut(&mut self) -> &mut Matrix4<f32> {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    pub fn push(&mut self) {
        let top = *self.top();
        self.stack.push(top);
    }

    /// Pops the top matrix. Returns false on underflow, leaving the stack
    /// untouched.
    pub fn pop(&mut self) -> bool {
        if self.stack.len() > 1 {
            self.stack.pop();
            true
        } else {
            false
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadeModel {
    Flat,
    Smooth,
}

/// Which material property tracks the current color while
/// `ColorMaterial` is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMaterialMode {
    Emission,
    AmbientAndDiffuse,
}

/// Fixed-function material. Only the defaults are ever used; the current
/// color may replace one property through color material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub ambient: Vector4<f32>,
    pub diffuse: Vector4<f32>,
    pub specular: Vector4<f32>,
    pub emission: Vector4<f32>,
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vector4::new(0.2, 0.2, 0.2, 1.0),
            diffuse: Vector4::new(0.8, 0.8, 0.8, 1.0),
            specular: Vector4::new(0.0, 0.0, 0.0, 1.0),
            emission: Vector4::new(0.0, 0.0, 0.0, 1.0),
            shininess: 0.0,
        }
    }
}

/// Parameters of the single light source. `position` is in eye space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightParams {
    pub ambient: Vector4<f32>,
    pub diffuse: Vector4<f32>,
    pub specular: Vector4<f32>,
    pub position: Vector4<f32>,
}

impl Default for LightParams {
    fn default() -> Self {
        Self {
            ambient: Vector4::new(0.0, 0.0, 0.0, 1.0),
            diffuse: Vector4::new(1.0, 1.0, 1.0, 1.0),
            specular: Vector4::new(1.0, 1.0, 1.0, 1.0),
            position: Vector4::new(0.0, 0.0, 1.0, 0.0),
        }
    }
}

/// The LIGHTING attribute group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingState {
    pub light0: LightParams,
    pub global_ambient: Vector4<f32>,
    pub material: Material,
    pub color_material: ColorMaterialMode,
    pub shade_model: ShadeModel,
}

impl Default for LightingState {
    fn default() -> Self {
        Self {
            light0: LightParams::default(),
            global_ambient: Vector4::new(0.2, 0.2, 0.2, 1.0),
            material: Material::default(),
            color_material: ColorMaterialMode::AmbientAndDiffuse,
            shade_model: ShadeModel::Smooth,
        }
    }
}

/// Opaque handle to a texture object owned by the render context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) usize);

/// The four eye-linear generation planes, one per texture coordinate.
/// Row `i` of the matrix is the plane for S, T, R, Q respectively.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexGenPlanes(pub Matrix4<f32>);

impl Default for TexGenPlanes {
    fn default() -> Self {
        // Eye-linear defaults: S = (1,0,0,0), T = (0,1,0,0), R = Q = 0.
        let mut m = Matrix4::zeros();
        m[(0, 0)] = 1.0;
        m[(1, 1)] = 1.0;
        Self(m)
    }
}

/// The TEXTURE attribute group.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextureState {
    pub bound: Option<TextureId>,
    /// Eye planes as stored, already multiplied by the inverse model-view
    /// that was current when they were specified.
    pub eye_planes: TexGenPlanes,
}

/// The COLOR_BUFFER attribute group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorBufferState {
    pub color_mask: [bool; 4],
    pub clear_color: Vector4<f32>,
}

impl Default for ColorBufferState {
    fn default() -> Self {
        Self {
            color_mask: [true; 4],
            clear_color: Vector4::new(0.0, 0.0, 0.0, 0.0),
        }
    }
}

/// The POLYGON attribute group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonState {
    pub offset_factor: f32,
    pub offset_units: f32,
    pub cull_face: CullFace,
}

impl Default for PolygonState {
    fn default() -> Self {
        Self {
            offset_factor: 0.0,
            offset_units: 0.0,
            cull_face: CullFace::Back,
        }
    }
}

/// One entry on the attribute stack. Groups that were not pushed are `None`
/// and survive the matching pop untouched.
#[derive(Debug, Clone)]
pub struct AttribFrame {
    pub enables: Option<Enables>,
    pub texture: Option<TextureState>,
    pub lighting: Option<LightingState>,
    pub viewport: Option<Viewport>,
    pub color_buffer: Option<ColorBufferState>,
    pub matrix_mode: Option<MatrixMode>,
    pub polygon: Option<PolygonState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_stack_never_underflows() {
        let mut stack = MatrixStack::default();
        assert!(!stack.pop());
        stack.push();
        *stack.top_mut() = Matrix4::new_scaling(2.0);
        assert_eq!(stack.depth(), 2);
        assert!(stack.pop());
        assert_eq!(*stack.top(), Matrix4::identity());
    }

    #[test]
    fn enables_round_trip_each_capability() {
        let mut enables = Enables::default();
        enables.set(Capability::TextureGenR, true);
        assert!(enables.get(Capability::TextureGenR));
        assert_eq!(enables.tex_gen, [false, false, true, false]);
        enables.set(Capability::TextureGenR, false);
        assert_eq!(enables, Enables::default());
    }
}
