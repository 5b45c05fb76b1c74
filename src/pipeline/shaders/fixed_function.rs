use crate::core::color::saturate;
use crate::core::geometry::Vertex;
use crate::core::pipeline::{Interpolatable, Shader};
use crate::core::texture::DepthTexture;
use crate::pipeline::state::{ColorMaterialMode, LightParams, Material, ShadeModel};
use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};
use std::ops::{Add, Mul};

/// Data interpolated between vertex and fragment stages.
#[derive(Clone, Copy, Debug)]
pub struct FixedVarying {
    /// Lit (or unlit) vertex color, already clamped.
    pub color: Vector3<f32>,
    /// Homogeneous texture coordinate (s, t, r, q).
    pub texcoord: Vector4<f32>,
}

impl Add for FixedVarying {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            color: self.color + other.color,
            texcoord: self.texcoord + other.texcoord,
        }
    }
}

impl Mul<f32> for FixedVarying {
    type Output = Self;

    fn mul(self, scalar: f32) -> Self {
        Self {
            color: self.color * scalar,
            texcoord: self.texcoord * scalar,
        }
    }
}

impl Interpolatable for FixedVarying {}

/// Lighting inputs captured when lighting is enabled.
#[derive(Clone, Copy, Debug)]
pub struct LightingSetup {
    /// `None` when Light0 is disabled.
    pub light: Option<LightParams>,
    pub global_ambient: Vector4<f32>,
    /// Material after color material has been applied.
    pub material: Material,
}

impl LightingSetup {
    /// Resolves the material for the current color.
    pub fn new(
        light: Option<LightParams>,
        global_ambient: Vector4<f32>,
        mut material: Material,
        color_material: Option<ColorMaterialMode>,
        color: Vector4<f32>,
    ) -> Self {
        match color_material {
            Some(ColorMaterialMode::Emission) => material.emission = color,
            Some(ColorMaterialMode::AmbientAndDiffuse) => {
                material.ambient = color;
                material.diffuse = color;
            }
            None => {}
        }
        Self {
            light,
            global_ambient,
            material,
        }
    }

    /// Per-vertex lighting in eye space with a non-local viewer.
    fn shade(&self, eye_pos: &Vector4<f32>, normal: &Vector3<f32>) -> Vector3<f32> {
        let m = &self.material;
        let mut color =
            m.emission.xyz() + self.global_ambient.xyz().component_mul(&m.ambient.xyz());

        if let Some(light) = &self.light {
            let to_light = if light.position.w.abs() > f32::EPSILON {
                (light.position.xyz() / light.position.w - eye_pos.xyz() / eye_pos.w).normalize()
            } else {
                light.position.xyz().normalize()
            };

            let n_dot_l = normal.dot(&to_light).max(0.0);
            color += light.ambient.xyz().component_mul(&m.ambient.xyz());
            color += light.diffuse.xyz().component_mul(&m.diffuse.xyz()) * n_dot_l;

            if n_dot_l > 0.0 {
                let half = (to_light + Vector3::z()).normalize();
                let spec = normal.dot(&half).max(0.0).powf(m.shininess);
                color += light.specular.xyz().component_mul(&m.specular.xyz()) * spec;
            }
        }

        saturate(color)
    }
}

/// The fixed-function vertex and fragment stages compiled from a snapshot of
/// the render context state, one per draw call.
pub struct FixedFunctionShader<'a> {
    pub model_view: Matrix4<f32>,
    pub mvp: Matrix4<f32>,
    /// Inverse transpose of the model-view's linear part.
    pub normal_matrix: Matrix3<f32>,
    pub color: Vector4<f32>,
    pub lighting: Option<LightingSetup>,
    /// Texture matrix times the stored eye planes, with a flag per
    /// coordinate telling whether generation is enabled.
    pub tex_gen: Option<(Matrix4<f32>, [bool; 4])>,
    /// The bound texture when texturing is enabled.
    pub texture: Option<&'a DepthTexture>,
    pub shade_model: ShadeModel,
}

impl<'a> FixedFunctionShader<'a> {
    pub fn new(
        projection: Matrix4<f32>,
        model_view: Matrix4<f32>,
        color: Vector4<f32>,
        shade_model: ShadeModel,
    ) -> Self {
        let linear = model_view.fixed_view::<3, 3>(0, 0).into_owned();
        let normal_matrix = linear
            .try_inverse()
            .map(|inv| inv.transpose())
            .unwrap_or(linear);

        Self {
            model_view,
            mvp: projection * model_view,
            normal_matrix,
            color,
            lighting: None,
            tex_gen: None,
            texture: None,
            shade_model,
        }
    }

    fn generate_texcoord(&self, eye_pos: &Vector4<f32>) -> Vector4<f32> {
        // Coordinates without generation keep the current texcoord (0, 0, 0, 1).
        let mut coord = Vector4::new(0.0, 0.0, 0.0, 1.0);
        if let Some((planes, enabled)) = &self.tex_gen {
            let generated = planes * eye_pos;
            for i in 0..4 {
                if enabled[i] {
                    coord[i] = generated[i];
                }
            }
        }
        coord
    }
}

impl Shader for FixedFunctionShader<'_> {
    type Varying = FixedVarying;

    fn vertex(&self, vertex: &Vertex) -> (Vector4<f32>, Self::Varying) {
        let object_pos = vertex.position.to_homogeneous();
        let eye_pos = self.model_view * object_pos;
        let clip_pos = self.mvp * object_pos;

        let color = match &self.lighting {
            Some(lighting) => {
                let normal = (self.normal_matrix * vertex.normal).normalize();
                lighting.shade(&eye_pos, &normal)
            }
            None => saturate(self.color.xyz()),
        };

        let varying = FixedVarying {
            color,
            texcoord: self.generate_texcoord(&eye_pos),
        };
        (clip_pos, varying)
    }

    fn fragment(&self, varying: Self::Varying, provoking: &Self::Varying) -> Vector3<f32> {
        let color = match self.shade_model {
            ShadeModel::Smooth => varying.color,
            ShadeModel::Flat => provoking.color,
        };

        let Some(texture) = self.texture else {
            return color;
        };

        // Projective lookup; the texture environment modulates.
        let tc = varying.texcoord;
        if tc.w.abs() < 1e-8 {
            return color;
        }
        let intensity = texture.sample(tc.x / tc.w, tc.y / tc.w, tc.z / tc.w);
        color * intensity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn vertex_at(x: f32, y: f32, z: f32) -> Vertex {
        Vertex::new(Point3::new(x, y, z), Vector3::y())
    }

    #[test]
    fn unlit_vertices_take_the_current_color() {
        let color = Vector4::new(0.3, 0.6, 0.9, 1.0);
        let shader = FixedFunctionShader::new(
            Matrix4::identity(),
            Matrix4::identity(),
            color,
            ShadeModel::Smooth,
        );
        let (_, varying) = shader.vertex(&vertex_at(0.0, 0.0, 0.0));
        assert_eq!(varying.color, color.xyz());
        assert_eq!(varying.texcoord, Vector4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn emission_color_material_adds_light_contribution() {
        let color = Vector4::new(0.5, 0.0, 0.0, 1.0);
        let light = LightParams {
            ambient: Vector4::new(0.4, 0.4, 0.4, 1.0),
            diffuse: Vector4::new(0.4, 0.4, 0.4, 1.0),
            specular: Vector4::new(0.2, 0.2, 0.2, 1.0),
            position: Vector4::new(0.0, 10.0, 0.0, 1.0),
        };
        let mut shader = FixedFunctionShader::new(
            Matrix4::identity(),
            Matrix4::identity(),
            color,
            ShadeModel::Smooth,
        );
        shader.lighting = Some(LightingSetup::new(
            Some(light),
            Vector4::new(0.2, 0.2, 0.2, 1.0),
            Material::default(),
            Some(ColorMaterialMode::Emission),
            color,
        ));

        let (_, varying) = shader.vertex(&vertex_at(0.0, 0.0, 0.0));
        // emission + 0.2*0.2 + 0.4*0.2 + 0.4*0.8*1
        let expected_gray = 0.04 + 0.08 + 0.32;
        assert!((varying.color.x - (0.5 + expected_gray)).abs() < 1e-5);
        assert!((varying.color.y - expected_gray).abs() < 1e-5);
    }

    #[test]
    fn generated_texcoords_follow_the_eye_planes() {
        let mut shader = FixedFunctionShader::new(
            Matrix4::identity(),
            Matrix4::new_translation(&Vector3::new(0.0, 0.0, -5.0)),
            Vector4::new(1.0, 1.0, 1.0, 1.0),
            ShadeModel::Smooth,
        );
        shader.tex_gen = Some((Matrix4::identity(), [true; 4]));
        let (_, varying) = shader.vertex(&vertex_at(1.0, 2.0, 3.0));
        assert_eq!(varying.texcoord, Vector4::new(1.0, 2.0, -2.0, 1.0));
    }

    #[test]
    fn depth_comparison_modulates_fragment_color() {
        use crate::core::texture::{CompareFunc, CompareMode, TextureFilter, TextureParameters};

        let mut texture = DepthTexture::new(1);
        texture.params = TextureParameters {
            filter: TextureFilter::Nearest,
            compare_mode: CompareMode::CompareRefToTexture,
            compare_func: CompareFunc::LessEqual,
        };
        texture.copy_sub_image(0, 0, 1, 1, &[0.5]);

        let mut shader = FixedFunctionShader::new(
            Matrix4::identity(),
            Matrix4::identity(),
            Vector4::new(1.0, 1.0, 1.0, 1.0),
            ShadeModel::Smooth,
        );
        shader.texture = Some(&texture);

        let lit = FixedVarying {
            color: Vector3::new(0.8, 0.8, 0.8),
            texcoord: Vector4::new(1.0, 1.0, 0.8, 2.0),
        };
        let shadowed = FixedVarying {
            texcoord: Vector4::new(1.0, 1.0, 1.6, 2.0),
            ..lit
        };
        assert_eq!(shader.fragment(lit, &lit), lit.color);
        assert_eq!(shader.fragment(shadowed, &shadowed), Vector3::zeros());
    }
}
