//! Engine-facing descriptor types consumed by the shader generator.

pub mod caps;
pub mod light;
pub mod material;
pub mod pass;

pub use caps::{DriverCaps, ShaderProfile};
pub use light::{LightCounts, LightType};
pub use material::{Material, MaterialId, MaterialSet, Technique};
pub use pass::{
    AlphaTest, ColourTracking, CompareFunc, FogMode, FogSettings, NormalMapSpace, Pass,
    ShaderEffect, ShadingModel, SkinningInfo, SurfaceParams, TexCoordGen, TextureBlend,
    TextureKind, TextureUnit,
};
