#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod core;
pub mod errors;
pub mod rtshader;
pub mod utils;

pub use crate::core::caps::{DriverCaps, ShaderProfile};
pub use crate::core::light::{LightCounts, LightType};
pub use crate::core::material::{Material, MaterialId, MaterialSet, Technique};
pub use crate::core::pass::{
    CompareFunc, FogMode, FogSettings, Pass, ShaderEffect, ShadingModel, SurfaceParams,
    TextureUnit,
};
pub use crate::errors::{LoreError, Result};
pub use crate::rtshader::{
    BindingPlan, BindingStatus, GeneratedProgram, GeneratorConfig, ProgramType, RenderState,
    ShaderGenerator, SubRenderState, TargetLanguage,
};
pub use crate::utils::interner;
