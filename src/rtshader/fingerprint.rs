//! Program fingerprints.
//!
//! A [`Fingerprint`] identifies a generated program by *content*, not by
//! which material asked for it: scheme, target language, light population
//! and a digest of every generation-relevant pass field. Two materials that
//! agree on all of that share one cache entry. Driver capabilities are
//! fixed per generator and therefore not part of the key.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::core::light::LightCounts;
use crate::core::pass::Pass;
use crate::rtshader::writer::TargetLanguage;
use crate::utils::interner::Symbol;

/// Hash any value with the engine's standard hasher.
#[must_use]
pub fn fx_hash_key<T: Hash>(value: &T) -> u64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub scheme: Symbol,
    pub language: TargetLanguage,
    pub lights: LightCounts,
    pub pass_digest: u64,
}

impl Fingerprint {
    #[must_use]
    pub fn new(
        scheme: Symbol,
        language: TargetLanguage,
        lights: LightCounts,
        pass: &Pass,
    ) -> Self {
        Self {
            scheme,
            language,
            lights,
            pass_digest: pass.content_digest(),
        }
    }
}
