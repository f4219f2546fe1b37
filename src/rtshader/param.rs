//! Program parameter model.
//!
//! Every value a generated program touches is a [`Parameter`] held in a
//! [`ParamPool`] and referred to by [`ParamId`]. Parameters carry a class
//! (uniform, stage input/output, local), an element type, and an optional
//! content tag that says what the value *means*; the registry uses the tag
//! to hand out one shared parameter per meaning instead of duplicates.

use crate::core::light::LightCounts;
use crate::utils::interner::Symbol;

/// Index of a parameter inside its [`ParamPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(u32);

impl ParamId {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Storage class of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamClass {
    Uniform,
    VertexInput,
    /// Vertex-stage output. Shares its name with the matching
    /// [`ParamClass::FragmentInput`] so the stages link by identifier.
    VertexOutput,
    FragmentInput,
    FragmentOutput,
    Local,
}

impl ParamClass {
    /// Whether atoms may write through parameters of this class.
    #[must_use]
    pub const fn writable(self) -> bool {
        !matches!(self, Self::Uniform | Self::VertexInput | Self::FragmentInput)
    }
}

/// Scalar, vector, matrix and sampler types the generated code works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ElementType {
    Float,
    Float2,
    Float3,
    Float4,
    Int,
    Int2,
    Int3,
    Int4,
    Bool,
    Mat3,
    Mat4,
    Sampler2D,
    SamplerCube,
}

impl ElementType {
    /// Component count for scalar and vector types, `None` otherwise.
    #[must_use]
    pub const fn width(self) -> Option<u8> {
        match self {
            Self::Float | Self::Int | Self::Bool => Some(1),
            Self::Float2 | Self::Int2 => Some(2),
            Self::Float3 | Self::Int3 => Some(3),
            Self::Float4 | Self::Int4 => Some(4),
            Self::Mat3 | Self::Mat4 | Self::Sampler2D | Self::SamplerCube => None,
        }
    }

    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Float2 | Self::Float3 | Self::Float4)
    }

    #[must_use]
    pub const fn is_int(self) -> bool {
        matches!(self, Self::Int | Self::Int2 | Self::Int3 | Self::Int4)
    }

    #[must_use]
    pub const fn is_matrix(self) -> bool {
        matches!(self, Self::Mat3 | Self::Mat4)
    }

    #[must_use]
    pub const fn is_sampler(self) -> bool {
        matches!(self, Self::Sampler2D | Self::SamplerCube)
    }

    /// Float type with the given component count.
    ///
    /// # Panics
    /// Panics if `width` is not 1 to 4.
    #[must_use]
    pub const fn float_with_width(width: u8) -> Self {
        match width {
            1 => Self::Float,
            2 => Self::Float2,
            3 => Self::Float3,
            4 => Self::Float4,
            _ => panic!("float width must be 1..=4"),
        }
    }
}

/// Semantic meaning of a stage input, output or shared local.
///
/// Two requests for the same `(class, content)` resolve to the same
/// parameter. [`Content::Generic`] is exempt: every generic local is fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Content {
    PositionObject,
    PositionWorld,
    PositionView,
    PositionProjective,
    NormalObject,
    NormalWorld,
    NormalView,
    TangentObject,
    TangentWorld,
    BinormalWorld,
    BlendWeights,
    BlendIndices,
    ColourDiffuse,
    ColourSpecular,
    /// A texture coordinate set. For generated coordinates the value is the
    /// owning texture unit index.
    TexCoord(u8),
    FogFactor,
    /// No shared meaning; never canonicalised.
    Generic,
}

impl Content {
    /// Importance rank used when ordering varyings for packing. Lower packs
    /// first. Ties fall back to first use.
    #[must_use]
    pub const fn pack_rank(self) -> u16 {
        match self {
            Self::ColourDiffuse => 0,
            Self::ColourSpecular => 1,
            Self::NormalWorld | Self::NormalView | Self::NormalObject => 10,
            Self::PositionWorld | Self::PositionView | Self::PositionObject => 11,
            Self::TangentWorld => 12,
            Self::BinormalWorld => 13,
            Self::TexCoord(set) => 20 + set as u16,
            Self::FogFactor => 200,
            _ => 300,
        }
    }
}

/// How often an auto-bound constant changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum UpdateRate {
    PerPass,
    PerObject,
}

/// Families of auto-bound constants, without per-key payloads. Used by the
/// auto-bind table and by error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoKind {
    WorldMatrix,
    ViewMatrix,
    ProjMatrix,
    ViewProjMatrix,
    WorldViewMatrix,
    WorldViewProjMatrix,
    InvTransWorldMatrix,
    CameraPositionWorld,
    AmbientLightColour,
    SurfaceAmbient,
    SurfaceDiffuse,
    SurfaceSpecular,
    SurfaceEmissive,
    SurfaceShininess,
    LightPositionArray,
    LightDirectionArray,
    LightDiffuseArray,
    LightSpecularArray,
    LightAttenuationArray,
    SpotParamsArray,
    FogColour,
    FogParams,
    TextureMatrix,
    TextureViewProj,
    BoneMatrixArray,
    AlphaRejectValue,
}

/// One auto-bound constant, including any per-key payload such as the
/// texture unit a matrix belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum AutoKey {
    WorldMatrix,
    ViewMatrix,
    ProjMatrix,
    ViewProjMatrix,
    WorldViewMatrix,
    WorldViewProjMatrix,
    /// Inverse-transpose world matrix, for transforming normals.
    InvTransWorldMatrix,
    CameraPositionWorld,
    AmbientLightColour,
    SurfaceAmbient,
    SurfaceDiffuse,
    SurfaceSpecular,
    SurfaceEmissive,
    SurfaceShininess,
    /// World-space light positions, one entry per light in packed order.
    /// Meaningful for point and spot entries.
    LightPositionArray,
    /// World-space light directions. Meaningful for directional and spot
    /// entries. `.xyz` points from the light into the scene.
    LightDirectionArray,
    LightDiffuseArray,
    LightSpecularArray,
    /// `(range, constant, linear, quadratic)` per light.
    LightAttenuationArray,
    /// `(cos inner, cos outer, falloff, 0)` per light.
    SpotParamsArray,
    FogColour,
    /// `(density, start, end, 1 / (end - start))`.
    FogParams,
    TextureMatrix(u8),
    TextureViewProj(u8),
    BoneMatrixArray,
    AlphaRejectValue,
}

impl AutoKey {
    #[must_use]
    pub const fn kind(self) -> AutoKind {
        match self {
            Self::WorldMatrix => AutoKind::WorldMatrix,
            Self::ViewMatrix => AutoKind::ViewMatrix,
            Self::ProjMatrix => AutoKind::ProjMatrix,
            Self::ViewProjMatrix => AutoKind::ViewProjMatrix,
            Self::WorldViewMatrix => AutoKind::WorldViewMatrix,
            Self::WorldViewProjMatrix => AutoKind::WorldViewProjMatrix,
            Self::InvTransWorldMatrix => AutoKind::InvTransWorldMatrix,
            Self::CameraPositionWorld => AutoKind::CameraPositionWorld,
            Self::AmbientLightColour => AutoKind::AmbientLightColour,
            Self::SurfaceAmbient => AutoKind::SurfaceAmbient,
            Self::SurfaceDiffuse => AutoKind::SurfaceDiffuse,
            Self::SurfaceSpecular => AutoKind::SurfaceSpecular,
            Self::SurfaceEmissive => AutoKind::SurfaceEmissive,
            Self::SurfaceShininess => AutoKind::SurfaceShininess,
            Self::LightPositionArray => AutoKind::LightPositionArray,
            Self::LightDirectionArray => AutoKind::LightDirectionArray,
            Self::LightDiffuseArray => AutoKind::LightDiffuseArray,
            Self::LightSpecularArray => AutoKind::LightSpecularArray,
            Self::LightAttenuationArray => AutoKind::LightAttenuationArray,
            Self::SpotParamsArray => AutoKind::SpotParamsArray,
            Self::FogColour => AutoKind::FogColour,
            Self::FogParams => AutoKind::FogParams,
            Self::TextureMatrix(_) => AutoKind::TextureMatrix,
            Self::TextureViewProj(_) => AutoKind::TextureViewProj,
            Self::BoneMatrixArray => AutoKind::BoneMatrixArray,
            Self::AlphaRejectValue => AutoKind::AlphaRejectValue,
        }
    }

    #[must_use]
    pub const fn element_type(self) -> ElementType {
        match self {
            Self::WorldMatrix
            | Self::ViewMatrix
            | Self::ProjMatrix
            | Self::ViewProjMatrix
            | Self::WorldViewMatrix
            | Self::WorldViewProjMatrix
            | Self::InvTransWorldMatrix
            | Self::TextureMatrix(_)
            | Self::TextureViewProj(_)
            | Self::BoneMatrixArray => ElementType::Mat4,
            Self::CameraPositionWorld => ElementType::Float3,
            Self::AmbientLightColour
            | Self::SurfaceAmbient
            | Self::SurfaceDiffuse
            | Self::SurfaceSpecular
            | Self::SurfaceEmissive
            | Self::LightPositionArray
            | Self::LightDirectionArray
            | Self::LightDiffuseArray
            | Self::LightSpecularArray
            | Self::LightAttenuationArray
            | Self::SpotParamsArray
            | Self::FogColour
            | Self::FogParams => ElementType::Float4,
            Self::SurfaceShininess | Self::AlphaRejectValue => ElementType::Float,
        }
    }

    #[must_use]
    pub const fn update_rate(self) -> UpdateRate {
        match self {
            Self::WorldMatrix
            | Self::WorldViewMatrix
            | Self::WorldViewProjMatrix
            | Self::InvTransWorldMatrix
            | Self::BoneMatrixArray => UpdateRate::PerObject,
            _ => UpdateRate::PerPass,
        }
    }

    /// Array length the key requires in its context, `None` for non-arrays.
    #[must_use]
    pub fn array_len(self, lights: LightCounts, bone_count: u16) -> Option<u32> {
        match self {
            Self::LightPositionArray
            | Self::LightDirectionArray
            | Self::LightDiffuseArray
            | Self::LightSpecularArray
            | Self::LightAttenuationArray
            | Self::SpotParamsArray => Some(lights.total().max(1)),
            Self::BoneMatrixArray => Some(u32::from(bone_count.max(1))),
            _ => None,
        }
    }

    /// Uniform identifier the registry declares this key under.
    #[must_use]
    pub fn uniform_name(self) -> String {
        match self {
            Self::WorldMatrix => "u_world_matrix".into(),
            Self::ViewMatrix => "u_view_matrix".into(),
            Self::ProjMatrix => "u_proj_matrix".into(),
            Self::ViewProjMatrix => "u_view_proj_matrix".into(),
            Self::WorldViewMatrix => "u_world_view_matrix".into(),
            Self::WorldViewProjMatrix => "u_world_view_proj_matrix".into(),
            Self::InvTransWorldMatrix => "u_inv_trans_world_matrix".into(),
            Self::CameraPositionWorld => "u_camera_position".into(),
            Self::AmbientLightColour => "u_ambient_light_colour".into(),
            Self::SurfaceAmbient => "u_surface_ambient".into(),
            Self::SurfaceDiffuse => "u_surface_diffuse".into(),
            Self::SurfaceSpecular => "u_surface_specular".into(),
            Self::SurfaceEmissive => "u_surface_emissive".into(),
            Self::SurfaceShininess => "u_surface_shininess".into(),
            Self::LightPositionArray => "u_light_position".into(),
            Self::LightDirectionArray => "u_light_direction".into(),
            Self::LightDiffuseArray => "u_light_diffuse".into(),
            Self::LightSpecularArray => "u_light_specular".into(),
            Self::LightAttenuationArray => "u_light_attenuation".into(),
            Self::SpotParamsArray => "u_spot_params".into(),
            Self::FogColour => "u_fog_colour".into(),
            Self::FogParams => "u_fog_params".into(),
            Self::TextureMatrix(unit) => format!("u_texture_matrix{unit}"),
            Self::TextureViewProj(unit) => format!("u_texture_viewproj{unit}"),
            Self::BoneMatrixArray => "u_bone_matrices".into(),
            Self::AlphaRejectValue => "u_alpha_reject".into(),
        }
    }
}

/// One named value in a generated program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: Symbol,
    pub class: ParamClass,
    pub ty: ElementType,
    pub content: Option<Content>,
    pub auto: Option<AutoKey>,
    pub array_len: Option<u32>,
}

impl Parameter {
    #[must_use]
    pub const fn is_array(&self) -> bool {
        self.array_len.is_some()
    }
}

/// Arena of parameters. Ids are dense indices, never reused.
#[derive(Debug, Clone, Default)]
pub struct ParamPool {
    params: Vec<Parameter>,
}

impl ParamPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, param: Parameter) -> ParamId {
        let id = ParamId(u32::try_from(self.params.len()).unwrap_or(u32::MAX));
        self.params.push(param);
        id
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: ParamId) -> &Parameter {
        &self.params[id.index()]
    }

    pub fn get_mut(&mut self, id: ParamId) -> &mut Parameter {
        &mut self.params[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParamId, &Parameter)> {
        self.params
            .iter()
            .enumerate()
            .map(|(i, p)| (ParamId(i as u32), p))
    }
}
