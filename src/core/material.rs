//! Materials, techniques and the owning set.
//!
//! Materials here are pure descriptors. Generated programs are owned by the
//! shader generator and looked up by material id, so cloning or inspecting a
//! material never touches GPU-side state.

use rustc_hash::FxHashMap;
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_64;

use crate::core::pass::Pass;
use crate::utils::interner::Symbol;

/// Stable identity of a material, independent of its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(u64);

impl MaterialId {
    fn fresh() -> Self {
        Self(xxh3_64(Uuid::new_v4().as_bytes()))
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// One scheme's rendition of a material.
#[derive(Debug, Clone)]
pub struct Technique {
    pub scheme: Symbol,
    pub passes: Vec<Pass>,
    /// Set on techniques the shader generator cloned from a source scheme.
    /// Only these are removed when the generator is asked to clean up.
    pub shader_generated: bool,
}

impl Technique {
    #[must_use]
    pub fn new(scheme: Symbol, passes: Vec<Pass>) -> Self {
        Self {
            scheme,
            passes,
            shader_generated: false,
        }
    }
}

#[derive(Debug)]
pub struct Material {
    id: MaterialId,
    pub name: String,
    pub techniques: Vec<Technique>,
}

impl Material {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: MaterialId::fresh(),
            name: name.into(),
            techniques: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> MaterialId {
        self.id
    }

    #[must_use]
    pub fn technique(&self, scheme: Symbol) -> Option<&Technique> {
        self.techniques.iter().find(|t| t.scheme == scheme)
    }

    pub fn technique_mut(&mut self, scheme: Symbol) -> Option<&mut Technique> {
        self.techniques.iter_mut().find(|t| t.scheme == scheme)
    }

    /// Remove the generated technique for `scheme`, if present. Returns
    /// whether anything was removed. Hand-authored techniques are kept.
    pub fn remove_generated_technique(&mut self, scheme: Symbol) -> bool {
        let before = self.techniques.len();
        self.techniques
            .retain(|t| !(t.shader_generated && t.scheme == scheme));
        self.techniques.len() != before
    }
}

/// All materials known to the application, keyed by id.
#[derive(Debug, Default)]
pub struct MaterialSet {
    materials: FxHashMap<MaterialId, Material>,
}

impl MaterialSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, material: Material) -> MaterialId {
        let id = material.id();
        self.materials.insert(id, material);
        id
    }

    #[must_use]
    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(&id)
    }

    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(&id)
    }

    pub fn remove(&mut self, id: MaterialId) -> Option<Material> {
        self.materials.remove(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.values()
    }
}
