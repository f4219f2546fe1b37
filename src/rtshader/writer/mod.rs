//! Source writers.
//!
//! A writer turns one processed [`ProgramSet`] stage into target source
//! text. Output is byte-deterministic: declaration order follows the pool
//! and the function's declaration lists, statements follow bucket order,
//! and float literals go through one shared formatter. The same set written
//! twice yields the same bytes, which the program cache relies on.

pub mod glsl;
pub mod hlsl;

use crate::core::caps::DriverCaps;
use crate::errors::{LoreError, Result};
use crate::rtshader::processor::ProcessOutput;
use crate::rtshader::program::{ProgramSet, ProgramType};

/// Output language of a generated program pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetLanguage {
    Glsl,
    GlslEs,
    Hlsl,
}

impl TargetLanguage {
    /// Resolve a host-supplied language id. `"glslang"` is accepted as an
    /// alias kept for older host configs.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "glsl" | "glslang" => Ok(Self::Glsl),
            "glsles" => Ok(Self::GlslEs),
            "hlsl" => Ok(Self::Hlsl),
            other => Err(LoreError::UnsupportedLanguage(other.to_owned())),
        }
    }

    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Glsl => "glsl",
            Self::GlslEs => "glsles",
            Self::Hlsl => "hlsl",
        }
    }
}

impl std::fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Serialise one stage of a processed set.
pub(crate) fn write_source(
    language: TargetLanguage,
    caps: &DriverCaps,
    output: &ProcessOutput,
    set: &ProgramSet,
    stage: ProgramType,
) -> String {
    match language {
        TargetLanguage::Glsl => glsl::write(
            set,
            stage,
            glsl::Dialect::Core {
                version: caps.glsl_version().unwrap_or(330),
            },
            &output.precisions,
        ),
        TargetLanguage::GlslEs => glsl::write(
            set,
            stage,
            glsl::Dialect::Es {
                version: caps.glsles_version().unwrap_or(300),
            },
            &output.precisions,
        ),
        TargetLanguage::Hlsl => {
            let registers = match stage {
                ProgramType::Vertex => &output.vertex_registers,
                ProgramType::Fragment => &output.fragment_registers,
            };
            hlsl::write(set, stage, registers)
        }
    }
}

/// Shortest decimal that parses back to the same value, always carrying a
/// decimal point so targets never read an int literal.
pub(crate) fn fmt_f32(value: f32) -> String {
    let mut text = format!("{value}");
    if !text.contains('.') && !text.contains("inf") && !text.contains("NaN") {
        text.push_str(".0");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_ids_round_trip() {
        for lang in [TargetLanguage::Glsl, TargetLanguage::GlslEs, TargetLanguage::Hlsl] {
            assert_eq!(TargetLanguage::parse(lang.id()).unwrap(), lang);
        }
        assert_eq!(
            TargetLanguage::parse("glslang").unwrap(),
            TargetLanguage::Glsl
        );
        assert!(matches!(
            TargetLanguage::parse("metal"),
            Err(LoreError::UnsupportedLanguage(name)) if name == "metal"
        ));
    }

    #[test]
    fn floats_always_carry_a_point() {
        assert_eq!(fmt_f32(1.0), "1.0");
        assert_eq!(fmt_f32(0.5), "0.5");
        assert_eq!(fmt_f32(-2.0), "-2.0");
        assert_eq!(fmt_f32(32.25), "32.25");
    }
}
