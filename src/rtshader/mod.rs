//! Runtime shader generation.
//!
//! Fixed-function style pass descriptors go in, target-language source text
//! and uniform binding plans come out. Front to back: [`assembler`] links a
//! pass into an ordered set of sub-render states, the states emit function
//! IR through a build-scoped [`registry`], [`processor`] packs varyings and
//! allocates registers for the target, [`writer`] serialises the processed
//! set, and [`generator`] drives the pipeline behind a fingerprint-keyed
//! program cache.

pub mod assembler;
pub mod atom;
pub mod builder;
pub mod cache;
pub mod fingerprint;
pub mod function;
pub mod generator;
pub mod param;
pub mod processor;
pub mod program;
pub mod registry;
pub mod srs;
pub mod writer;

pub use assembler::{RenderState, TargetRenderState};
pub use cache::CacheStats;
pub use fingerprint::Fingerprint;
pub use generator::{BindingStatus, GeneratorConfig, ShaderGenerator};
pub use program::{BindingEntry, BindingPlan, GeneratedProgram, ProgramHandles, ProgramSet, ProgramType};
pub use registry::AutoBindTable;
pub use srs::SubRenderState;
pub use writer::TargetLanguage;
