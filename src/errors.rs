//! Error Types
//!
//! The error enum [`LoreError`] is the closed set of failure modes the
//! runtime shader system can report. Generation errors are never thrown into
//! the scene traversal path; they are buffered by the shader generator and
//! surface when `validate_material` returns, bound to the fingerprint whose
//! binding entered the `Failed` state.

use thiserror::Error;

use crate::rtshader::param::AutoKind;
use crate::rtshader::program::ProgramType;
use crate::rtshader::srs::SrsCategory;

/// The main error type of the engine's shader subsystem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoreError {
    // ========================================================================
    // Target selection
    // ========================================================================
    /// No writer exists for the requested shading language id.
    #[error("No shader writer registered for target language \"{0}\"")]
    UnsupportedLanguage(String),

    // ========================================================================
    // IR construction
    // ========================================================================
    /// A parameter requested an auto-bind key the registry does not carry.
    #[error("Auto-bind key {key:?} is not present in the registry table")]
    AutoBindUnknown {
        /// The key kind that failed to resolve.
        key: AutoKind,
    },

    /// Operand types violate an opcode signature, or a parameter was
    /// re-requested under an incompatible type.
    #[error("Type mismatch at `{site}`: {detail}")]
    TypeMismatch {
        /// Opcode mnemonic or registry entry point that detected the clash.
        site: &'static str,
        /// Human-readable description of the violated rule.
        detail: String,
    },

    // ========================================================================
    // Processing
    // ========================================================================
    /// Varying compaction could not fit the vertex outputs into the target
    /// slot budget.
    #[error("Varying overflow: {needed} four-wide slots needed, target allows {budget}")]
    VaryingOverflow {
        /// Slots required after first-fit packing.
        needed: u32,
        /// Slots the capability descriptor allows.
        budget: u32,
    },

    /// Two sub-render-states claim the same exclusive category.
    #[error("Conflicting sub-render-states: `{kept}` and `{rejected}` both claim exclusive category {category:?}")]
    ConflictingSrs {
        /// The category both members declared.
        category: SrsCategory,
        /// Name of the member encountered first.
        kept: &'static str,
        /// Name of the member that collided with it.
        rejected: &'static str,
    },

    // ========================================================================
    // Host feedback
    // ========================================================================
    /// The backend compiler rejected the emitted source.
    #[error("Host compiler rejected generated {stage:?} program: {log}")]
    HostCompileFailed {
        /// Which half of the program pair failed.
        stage: ProgramType,
        /// Compiler log forwarded by the host.
        log: String,
    },
}

/// Alias for `Result<T, LoreError>`.
pub type Result<T> = std::result::Result<T, LoreError>;
