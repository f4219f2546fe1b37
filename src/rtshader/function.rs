//! Function container for generated entry points.
//!
//! A [`Function`] holds the statements of one stage's `main`, grouped into
//! ordered [`Bucket`]s. Sub-render states append into their bucket without
//! knowing what else is attached; emission walks buckets in order, then
//! statements in insertion order, which is what makes output deterministic.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use crate::rtshader::atom::{ArrayIndex, Atom, OperandKind};
use crate::rtshader::param::ParamId;

/// Phases of a generated entry point, emitted in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    PreProcess,
    Transform,
    Colour,
    Lighting,
    Texturing,
    Fog,
    PostProcess,
}

/// One stage entry point under construction.
#[derive(Debug, Clone, Default)]
pub struct Function {
    inputs: Vec<ParamId>,
    outputs: Vec<ParamId>,
    locals: Vec<ParamId>,
    atoms: BTreeMap<Bucket, Vec<Atom>>,
}

impl Function {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a stage input. Repeats are ignored; declaration order is
    /// first-come and stable.
    pub fn add_input(&mut self, id: ParamId) {
        if !self.inputs.contains(&id) {
            self.inputs.push(id);
        }
    }

    pub fn add_output(&mut self, id: ParamId) {
        if !self.outputs.contains(&id) {
            self.outputs.push(id);
        }
    }

    pub fn add_local(&mut self, id: ParamId) {
        if !self.locals.contains(&id) {
            self.locals.push(id);
        }
    }

    #[must_use]
    pub fn inputs(&self) -> &[ParamId] {
        &self.inputs
    }

    #[must_use]
    pub fn outputs(&self) -> &[ParamId] {
        &self.outputs
    }

    #[must_use]
    pub fn locals(&self) -> &[ParamId] {
        &self.locals
    }

    /// Append a statement to `bucket`.
    pub fn push(&mut self, bucket: Bucket, atom: Atom) {
        self.atoms.entry(bucket).or_default().push(atom);
    }

    /// Buckets in emission order with their statements.
    pub fn buckets(&self) -> impl Iterator<Item = (Bucket, &[Atom])> {
        self.atoms.iter().map(|(b, v)| (*b, v.as_slice()))
    }

    /// All statements, bucket order then insertion order.
    pub fn atoms(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.values().flatten()
    }

    pub fn atoms_mut(&mut self) -> impl Iterator<Item = &mut Atom> {
        self.atoms.values_mut().flatten()
    }

    #[must_use]
    pub fn atom_count(&self) -> usize {
        self.atoms.values().map(Vec::len).sum()
    }

    /// Every parameter any statement touches, including dynamic subscripts.
    #[must_use]
    pub fn params_used(&self) -> FxHashSet<ParamId> {
        let mut used = FxHashSet::default();
        for atom in self.atoms() {
            for operand in &atom.operands {
                if let OperandKind::Param(id) = operand.kind {
                    used.insert(id);
                }
                if let Some(ArrayIndex::Dynamic { param, .. }) = operand.index {
                    used.insert(param);
                }
            }
        }
        used
    }

    /// Rewrite every reference to `from` into `to`, in statements and in
    /// the declaration lists. Used when two parameters turn out to be the
    /// same value.
    pub fn replace_param(&mut self, from: ParamId, to: ParamId) {
        for atom in self.atoms_mut() {
            for operand in &mut atom.operands {
                if operand.kind == OperandKind::Param(from) {
                    operand.kind = OperandKind::Param(to);
                }
                if let Some(ArrayIndex::Dynamic { param, .. }) = &mut operand.index {
                    if *param == from {
                        *param = to;
                    }
                }
            }
        }
        for list in [&mut self.inputs, &mut self.outputs, &mut self.locals] {
            let has_to = list.contains(&to);
            if let Some(slot) = list.iter_mut().find(|p| **p == from) {
                if has_to {
                    list.retain(|p| *p != from);
                } else {
                    *slot = to;
                }
            }
        }
    }

    /// Drop declared parameters no statement references. Inputs tied to the
    /// vertex fetch are kept by the caller passing them in `keep`.
    pub fn prune_unused(&mut self, keep: &FxHashSet<ParamId>) {
        let used = self.params_used();
        let retain = |p: &ParamId| used.contains(p) || keep.contains(p);
        self.inputs.retain(retain);
        self.outputs.retain(retain);
        self.locals.retain(retain);
    }
}
