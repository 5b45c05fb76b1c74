use crate::core::math::transform::{TransformFactory, apply_perspective_division};
use crate::core::texture::{CompareFunc, CompareMode, TextureFilter, TextureParameters};
use crate::error::{Error, Result};
use crate::pipeline::context::RenderContext;
use crate::pipeline::state::{AttribMask, Capability, ClearMask, MatrixMode, ShadeModel, TextureId};
use log::debug;
use nalgebra::{Matrix4, Point3, Vector4};
use std::ops::{Deref, DerefMut};

pub const DEFAULT_SHADOW_MAP_SIZE: usize = 512;

/// Constant depth bias applied while capturing, against self-shadowing acne.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonOffset {
    pub factor: f32,
    pub units: f32,
}

impl Default for PolygonOffset {
    fn default() -> Self {
        Self {
            factor: 1.9,
            units: 4.0,
        }
    }
}

/// `Bias * P_light * V_light`: takes a world-space point to the light's
/// depth-texture space. Its rows are the S, T, R and Q generation planes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectiveTextureTransform {
    matrix: Matrix4<f32>,
}

impl ProjectiveTextureTransform {
    /// Builds the transform from the light's projection and view matrices.
    pub fn from_light(projection: &Matrix4<f32>, view: &Matrix4<f32>) -> Self {
        Self {
            matrix: TransformFactory::bias() * projection * view,
        }
    }

    pub fn matrix(&self) -> &Matrix4<f32> {
        &self.matrix
    }

    /// The S, T, R and Q planes.
    pub fn planes(&self) -> [Vector4<f32>; 4] {
        [0, 1, 2, 3].map(|i| self.matrix.row(i).transpose())
    }

    /// Texture-space `(s, t, r)` of a world point after the projective divide.
    pub fn project(&self, world: &Point3<f32>) -> Point3<f32> {
        apply_perspective_division(&(self.matrix * world.to_homogeneous()))
    }
}

/// Owns the shadow map and the light-space transform of the last capture.
///
/// A frame runs two passes over the same geometry:
///
/// 1. [`ShadowMapper::begin_depth_capture`] with the projection and model-view
///    set up at the light. Only depth is written; when the returned
///    [`DepthCapture`] ends, the depth buffer is copied into the shadow map.
/// 2. [`ShadowMapper::begin_shadow_test`] with the real camera. Eye-linear
///    texture generation maps every vertex into the light's texture space and
///    the depth-comparison lookup multiplies the lit color by 0 or 1.
///
/// Both passes are guards: dropping them restores the state they changed.
#[derive(Debug)]
pub struct ShadowMapper {
    resolution: usize,
    offset: PolygonOffset,
    texture: Option<TextureId>,
    transform: Option<ProjectiveTextureTransform>,
}

impl ShadowMapper {
    /// Creates a mapper for a square shadow map of `resolution` texels.
    ///
    /// The capture pass draws into the visible framebuffer, so the map cannot
    /// be larger than the surface it is captured from. A resolution equal to
    /// the smaller surface dimension is the maximum.
    pub fn new(resolution: usize, surface_width: usize, surface_height: usize) -> Result<Self> {
        if resolution == 0 {
            return Err(Error::InvalidConfig(
                "shadow map resolution must be non-zero".into(),
            ));
        }
        if resolution > surface_width || resolution > surface_height {
            return Err(Error::ShadowMapTooLarge {
                resolution,
                width: surface_width,
                height: surface_height,
            });
        }
        Ok(Self {
            resolution,
            offset: PolygonOffset::default(),
            texture: None,
            transform: None,
        })
    }

    pub fn with_polygon_offset(mut self, offset: PolygonOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn texture_id(&self) -> Option<TextureId> {
        self.texture
    }

    /// The transform computed by the most recent depth capture.
    pub fn transform(&self) -> Option<&ProjectiveTextureTransform> {
        self.transform.as_ref()
    }

    /// Creates the depth texture the first time it is needed.
    fn ensure_texture(&mut self, ctx: &mut RenderContext) -> TextureId {
        if let Some(id) = self.texture {
            return id;
        }

        let id = ctx.gen_texture();
        ctx.bind_texture(Some(id));
        ctx.tex_parameters(TextureParameters {
            filter: TextureFilter::Linear,
            compare_mode: CompareMode::CompareRefToTexture,
            compare_func: CompareFunc::LessEqual,
        });
        ctx.tex_image_depth(self.resolution);
        debug!(
            "Created {0}x{0} shadow map texture {id:?}",
            self.resolution
        );

        self.texture = Some(id);
        id
    }

    /// Starts the depth-capture pass. The current projection and model-view
    /// must already be the light's; they are captured into the projective
    /// transform here.
    pub fn begin_depth_capture<'a>(&'a mut self, ctx: &'a mut RenderContext) -> DepthCapture<'a> {
        ctx.push_attrib(
            AttribMask::ENABLE
                | AttribMask::TEXTURE
                | AttribMask::LIGHTING
                | AttribMask::VIEWPORT
                | AttribMask::COLOR_BUFFER,
        );

        let texture = self.ensure_texture(ctx);

        ctx.viewport(0, 0, self.resolution, self.resolution);

        self.transform = Some(ProjectiveTextureTransform::from_light(
            &ctx.current_matrix(MatrixMode::Projection),
            &ctx.current_matrix(MatrixMode::ModelView),
        ));

        ctx.polygon_offset(self.offset.factor, self.offset.units);
        ctx.enable(Capability::PolygonOffsetFill);

        // Only depth matters in this pass.
        ctx.shade_model(ShadeModel::Flat);
        ctx.disable(Capability::Lighting);
        ctx.color_mask(false, false, false, false);

        DepthCapture {
            ctx,
            texture,
            resolution: self.resolution,
        }
    }

    /// Starts the shadow-test pass with the transform of the last capture.
    /// Nothing is recomputed here, so matrices changed since the capture do
    /// not affect the lookup.
    pub fn begin_shadow_test<'a>(&'a self, ctx: &'a mut RenderContext) -> ShadowTest<'a> {
        ctx.push_attrib(AttribMask::TEXTURE | AttribMask::ENABLE);

        match (self.transform.as_ref(), self.texture) {
            (Some(transform), Some(texture)) => {
                ctx.tex_gen_eye_linear(transform.matrix());
                for cap in [
                    Capability::TextureGenS,
                    Capability::TextureGenT,
                    Capability::TextureGenR,
                    Capability::TextureGenQ,
                ] {
                    ctx.enable(cap);
                }
                ctx.enable(Capability::Texture2D);
                ctx.bind_texture(Some(texture));
            }
            _ => debug!("Shadow test before any depth capture; drawing unshadowed"),
        }

        ShadowTest { ctx }
    }

    /// Deletes the shadow map. A later capture would create it again.
    pub fn release(&mut self, ctx: &mut RenderContext) {
        if let Some(id) = self.texture.take() {
            ctx.delete_texture(id);
            debug!("Released shadow map texture {id:?}");
        }
    }
}

/// The depth-capture pass in progress. Derefs to the render context so the
/// scene can be drawn through it.
///
/// Ending the pass (explicitly or by drop) copies the depth buffer into the
/// shadow map, clears depth and restores the saved state.
pub struct DepthCapture<'a> {
    ctx: &'a mut RenderContext,
    texture: TextureId,
    resolution: usize,
}

impl DepthCapture<'_> {
    pub fn end(self) {}
}

impl Deref for DepthCapture<'_> {
    type Target = RenderContext;

    fn deref(&self) -> &RenderContext {
        self.ctx
    }
}

impl DerefMut for DepthCapture<'_> {
    fn deref_mut(&mut self) -> &mut RenderContext {
        self.ctx
    }
}

impl Drop for DepthCapture<'_> {
    fn drop(&mut self) {
        let size = self.resolution;
        self.ctx.bind_texture(Some(self.texture));
        // Sub-image copy into the existing storage.
        self.ctx.copy_tex_sub_image_depth(0, 0, 0, 0, size, size);
        self.ctx.clear(ClearMask::DEPTH);
        self.ctx.pop_attrib();
    }
}

/// The shadow-test pass in progress. Ending it restores the texture and
/// enable state saved when it began.
pub struct ShadowTest<'a> {
    ctx: &'a mut RenderContext,
}

impl ShadowTest<'_> {
    pub fn end(self) {}
}

impl Deref for ShadowTest<'_> {
    type Target = RenderContext;

    fn deref(&self) -> &RenderContext {
        self.ctx
    }
}

impl DerefMut for ShadowTest<'_> {
    fn deref_mut(&mut self) -> &mut RenderContext {
        self.ctx
    }
}

impl Drop for ShadowTest<'_> {
    fn drop(&mut self) {
        self.ctx.pop_attrib();
    }
}
