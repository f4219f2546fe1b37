//! Driver capability description.
//!
//! A [`DriverCaps`] value is captured once when the render system comes up
//! and handed to the shader generator as configuration. The generator only
//! reads from it; nothing here talks to a real driver.

use smallvec::{SmallVec, smallvec};

/// One shader profile the host driver accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderProfile {
    /// Desktop GLSL, `version` as in the `#version` directive (e.g. 330).
    Glsl { version: u16 },
    /// GLSL ES, `version` as in `#version <v> es` (e.g. 300).
    GlslEs { version: u16 },
    /// Direct3D HLSL, `model` is the shader model major (e.g. 3).
    Hlsl { model: u8 },
}

/// Capabilities of the host render system relevant to program generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverCaps {
    /// Four-wide interpolator rows available to user varyings. The clip
    /// position does not count against this.
    pub max_varying_slots: u32,
    /// Samplers addressable from one fragment program.
    pub max_samplers: u32,
    /// Profiles the driver can consume, best first.
    pub profiles: SmallVec<[ShaderProfile; 4]>,
    pub supports_32bit_index: bool,
}

impl Default for DriverCaps {
    fn default() -> Self {
        Self {
            max_varying_slots: 8,
            max_samplers: 16,
            profiles: smallvec![
                ShaderProfile::Glsl { version: 330 },
                ShaderProfile::GlslEs { version: 300 },
                ShaderProfile::Hlsl { model: 3 },
            ],
            supports_32bit_index: true,
        }
    }
}

impl DriverCaps {
    /// Best advertised desktop GLSL version, if any.
    #[must_use]
    pub fn glsl_version(&self) -> Option<u16> {
        self.profiles
            .iter()
            .filter_map(|p| match p {
                ShaderProfile::Glsl { version } => Some(*version),
                _ => None,
            })
            .max()
    }

    /// Best advertised GLSL ES version, if any.
    #[must_use]
    pub fn glsles_version(&self) -> Option<u16> {
        self.profiles
            .iter()
            .filter_map(|p| match p {
                ShaderProfile::GlslEs { version } => Some(*version),
                _ => None,
            })
            .max()
    }

    /// Best advertised HLSL shader model, if any.
    #[must_use]
    pub fn hlsl_model(&self) -> Option<u8> {
        self.profiles
            .iter()
            .filter_map(|p| match p {
                ShaderProfile::Hlsl { model } => Some(*model),
                _ => None,
            })
            .max()
    }
}
