//! Program set and generated output containers.
//!
//! A [`ProgramSet`] is the linked pair of vertex and fragment functions plus
//! the pool their parameters live in. It is what the assembler produces,
//! the processor rewrites and the writer serialises. The final artefact is
//! an immutable [`GeneratedProgram`] shared by reference counting; cache
//! hits hand out the same `Arc`, which is what lets the renderer compare
//! programs by pointer.

use std::sync::OnceLock;

use rustc_hash::FxHashMap;
use serde::Serialize;
use xxhash_rust::xxh3::xxh3_64;

use crate::rtshader::fingerprint::Fingerprint;
use crate::rtshader::function::Function;
use crate::rtshader::param::{AutoKey, ElementType, ParamClass, ParamId, ParamPool, UpdateRate};
use crate::rtshader::writer::TargetLanguage;
use crate::utils::interner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProgramType {
    Vertex,
    Fragment,
}

/// The linked stage pair under construction.
#[derive(Debug, Clone, Default)]
pub struct ProgramSet {
    pub pool: ParamPool,
    pub vertex: Function,
    pub fragment: Function,
}

impl ProgramSet {
    #[must_use]
    pub fn function(&self, ty: ProgramType) -> &Function {
        match ty {
            ProgramType::Vertex => &self.vertex,
            ProgramType::Fragment => &self.fragment,
        }
    }

    pub fn function_mut(&mut self, ty: ProgramType) -> &mut Function {
        match ty {
            ProgramType::Vertex => &mut self.vertex,
            ProgramType::Fragment => &mut self.fragment,
        }
    }
}

/// One uniform the host must feed before drawing with a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindingEntry {
    pub name: String,
    pub ty: ElementType,
    /// Auto-bind key the engine updates this from, `None` for samplers.
    pub auto: Option<AutoKey>,
    pub update: Option<UpdateRate>,
    pub array_len: Option<u32>,
    /// Constant or sampler register, on targets that address by register.
    pub register: Option<u16>,
}

/// Uniform feed schedule of one stage, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BindingPlan {
    pub entries: Vec<BindingEntry>,
}

impl BindingPlan {
    /// Collect the uniforms `function` references, in pool order.
    #[must_use]
    pub fn for_stage(
        pool: &ParamPool,
        function: &Function,
        registers: &FxHashMap<ParamId, u16>,
    ) -> Self {
        let used = function.params_used();
        let mut entries = Vec::new();
        for (id, param) in pool.iter() {
            if param.class != ParamClass::Uniform || !used.contains(&id) {
                continue;
            }
            entries.push(BindingEntry {
                name: interner::resolve(param.name).to_owned(),
                ty: param.ty,
                auto: param.auto,
                update: param.auto.map(AutoKey::update_rate),
                array_len: param.array_len,
                register: registers.get(&id).copied(),
            });
        }
        Self { entries }
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&BindingEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Backend object ids the host assigns after compiling a program pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHandles {
    pub vertex: u64,
    pub fragment: u64,
}

/// Finished output of one generation: sources, binding plans and the IR
/// they came from. Immutable once built, apart from the write-once backend
/// handle slot.
#[derive(Debug)]
pub struct GeneratedProgram {
    pub fingerprint: Fingerprint,
    pub language: TargetLanguage,
    pub set: ProgramSet,
    pub vertex_source: String,
    pub fragment_source: String,
    pub vertex_bindings: BindingPlan,
    pub fragment_bindings: BindingPlan,
    /// Hash over both sources, for detecting distinct fingerprints that
    /// emitted identical text.
    pub source_hash: u64,
    pub(crate) handles: OnceLock<ProgramHandles>,
}

impl GeneratedProgram {
    #[must_use]
    pub fn source_hash_of(vertex: &str, fragment: &str) -> u64 {
        let mut buf = Vec::with_capacity(vertex.len() + fragment.len() + 1);
        buf.extend_from_slice(vertex.as_bytes());
        buf.push(0);
        buf.extend_from_slice(fragment.as_bytes());
        xxh3_64(&buf)
    }

    /// Record the backend ids after host compilation. The slot is
    /// write-once; a second attach is refused.
    pub fn attach_handles(&self, handles: ProgramHandles) -> bool {
        self.handles.set(handles).is_ok()
    }

    #[must_use]
    pub fn handles(&self) -> Option<ProgramHandles> {
        self.handles.get().copied()
    }

    #[must_use]
    pub fn source(&self, ty: ProgramType) -> &str {
        match ty {
            ProgramType::Vertex => &self.vertex_source,
            ProgramType::Fragment => &self.fragment_source,
        }
    }

    #[must_use]
    pub fn bindings(&self, ty: ProgramType) -> &BindingPlan {
        match ty {
            ProgramType::Vertex => &self.vertex_bindings,
            ProgramType::Fragment => &self.fragment_bindings,
        }
    }
}
