//! Fixed-function pass description.
//!
//! [`Pass`] is the declarative input to shader generation: surface colours,
//! shading model, texture layers, fog, alpha test, skinning, plus optional
//! [`ShaderEffect`] requests that go beyond the fixed-function set. The
//! generator never mutates a pass; it reads one and emits programs.

use std::hash::{Hash, Hasher};

use bitflags::bitflags;
use glam::Vec4;
use rustc_hash::FxHasher;

/// Vertex interpolation model for lighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShadingModel {
    Flat,
    #[default]
    Gouraud,
    /// Phong requests per-pixel evaluation of the lighting equation.
    Phong,
}

/// Material surface reflectance values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceParams {
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub emissive: Vec4,
    pub shininess: f32,
}

impl Default for SurfaceParams {
    fn default() -> Self {
        Self {
            ambient: Vec4::ONE,
            diffuse: Vec4::ONE,
            specular: Vec4::new(0.0, 0.0, 0.0, 1.0),
            emissive: Vec4::new(0.0, 0.0, 0.0, 1.0),
            shininess: 0.0,
        }
    }
}

impl SurfaceParams {
    /// True when the specular term can contribute anything.
    #[must_use]
    pub fn has_specular(&self) -> bool {
        self.shininess > 0.0
            && (self.specular.x > 0.0 || self.specular.y > 0.0 || self.specular.z > 0.0)
    }
}

bitflags! {
    /// Which surface components take their value from the vertex colour
    /// stream instead of [`SurfaceParams`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ColourTracking: u8 {
        const AMBIENT  = 1 << 0;
        const DIFFUSE  = 1 << 1;
        const SPECULAR = 1 << 2;
        const EMISSIVE = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FogMode {
    #[default]
    None,
    Linear,
    Exp,
    Exp2,
}

/// Fog as resolved for one pass. `start`/`end` apply to [`FogMode::Linear`],
/// `density` to the exponential modes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogSettings {
    pub mode: FogMode,
    pub colour: Vec4,
    pub density: f32,
    pub start: f32,
    pub end: f32,
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            mode: FogMode::None,
            colour: Vec4::new(1.0, 1.0, 1.0, 1.0),
            density: 0.001,
            start: 0.0,
            end: 1.0,
        }
    }
}

/// Comparison used by the alpha test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunc {
    AlwaysFail,
    AlwaysPass,
    Less,
    LessEqual,
    Equal,
    NotEqual,
    GreaterEqual,
    Greater,
}

/// Fragment rejection against a reference alpha. The reference reaches the
/// program through an auto-bound constant, so changing it does not force a
/// rebuild.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlphaTest {
    pub func: CompareFunc,
    pub reference: f32,
}

/// Sampler dimensionality of a texture layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    TwoD,
    Cube,
}

/// How a texture layer derives its coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TexCoordGen {
    /// Mesh UV set selected by `coord_set`.
    #[default]
    Uv,
    /// Sphere-map lookup from the view-space normal.
    SphereEnv,
    /// World reflection vector, for cube maps.
    Reflection,
    /// Projected through a per-unit view-projection matrix.
    Projective,
}

/// Layer blend against the colour accumulated so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureBlend {
    Replace,
    #[default]
    Modulate,
    Add,
    Subtract,
    /// Blend by the texel alpha, leaving the base alpha untouched.
    Decal,
}

/// One fixed-function texture layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureUnit {
    pub kind: TextureKind,
    /// Mesh UV set used when `coord_gen` is [`TexCoordGen::Uv`].
    pub coord_set: u8,
    pub coord_gen: TexCoordGen,
    pub blend: TextureBlend,
    /// Whether a texture matrix is applied to the generated coordinates.
    pub has_transform: bool,
}

impl Default for TextureUnit {
    fn default() -> Self {
        Self {
            kind: TextureKind::TwoD,
            coord_set: 0,
            coord_gen: TexCoordGen::Uv,
            blend: TextureBlend::Modulate,
            has_transform: false,
        }
    }
}

/// Hardware skinning requirements of the mesh bound to this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SkinningInfo {
    pub bone_count: u16,
    /// Blend weights per vertex, 1 to 4.
    pub weight_count: u8,
}

/// Which space a normal map's texels live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NormalMapSpace {
    #[default]
    Tangent,
    Object,
}

/// Shader effects requested on top of the fixed-function pipeline. Each
/// resolves to a sub-render state during assembly; the texture units an
/// effect names are consumed by it and skipped by plain layer blending.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShaderEffect {
    NormalMap {
        unit: u8,
        space: NormalMapSpace,
    },
    /// Three world-axis projections blended by the surface normal. The three
    /// units carry the textures for the X, Y and Z planes.
    Triplanar {
        units: [u8; 3],
        scale: f32,
        sharpness: f32,
    },
}

/// Everything the shader generator needs to know about one render pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pass {
    /// Master lighting switch. When off, no lighting sub-render state is
    /// attached regardless of the scene light population.
    pub lighting: bool,
    pub shading: ShadingModel,
    pub surface: SurfaceParams,
    pub colour_tracking: ColourTracking,
    pub fog: FogSettings,
    pub alpha_test: Option<AlphaTest>,
    pub texture_units: Vec<TextureUnit>,
    pub skinning: Option<SkinningInfo>,
    pub effects: Vec<ShaderEffect>,
}

impl Pass {
    /// Stable digest of every generation-relevant field. Two passes with the
    /// same digest produce the same programs for the same scene state.
    #[must_use]
    pub fn content_digest(&self) -> u64 {
        let mut h = FxHasher::default();
        self.lighting.hash(&mut h);
        self.shading.hash(&mut h);
        hash_vec4(&mut h, self.surface.ambient);
        hash_vec4(&mut h, self.surface.diffuse);
        hash_vec4(&mut h, self.surface.specular);
        hash_vec4(&mut h, self.surface.emissive);
        self.surface.shininess.to_bits().hash(&mut h);
        self.colour_tracking.bits().hash(&mut h);
        self.fog.mode.hash(&mut h);
        hash_vec4(&mut h, self.fog.colour);
        self.fog.density.to_bits().hash(&mut h);
        self.fog.start.to_bits().hash(&mut h);
        self.fog.end.to_bits().hash(&mut h);
        match self.alpha_test {
            None => 0u8.hash(&mut h),
            Some(at) => {
                1u8.hash(&mut h);
                at.func.hash(&mut h);
                at.reference.to_bits().hash(&mut h);
            }
        }
        self.texture_units.hash(&mut h);
        self.skinning.hash(&mut h);
        for effect in &self.effects {
            match effect {
                ShaderEffect::NormalMap { unit, space } => {
                    0u8.hash(&mut h);
                    unit.hash(&mut h);
                    space.hash(&mut h);
                }
                ShaderEffect::Triplanar {
                    units,
                    scale,
                    sharpness,
                } => {
                    1u8.hash(&mut h);
                    units.hash(&mut h);
                    scale.to_bits().hash(&mut h);
                    sharpness.to_bits().hash(&mut h);
                }
            }
        }
        h.finish()
    }
}

fn hash_vec4(h: &mut FxHasher, v: Vec4) {
    v.x.to_bits().hash(h);
    v.y.to_bits().hash(h);
    v.z.to_bits().hash(h);
    v.w.to_bits().hash(h);
}
