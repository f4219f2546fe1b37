//! Fingerprint-keyed program cache.
//!
//! The cache is the sharing point of the generator: any two passes whose
//! fingerprints agree receive clones of the same [`Arc<GeneratedProgram>`],
//! no matter which materials they belong to. Entries are reference counted
//! by the bindings that hold them and leave the cache when the last holder
//! releases, so a long-lived scene does not accumulate programs for
//! materials that were edited away.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::rtshader::fingerprint::Fingerprint;
use crate::rtshader::program::GeneratedProgram;

#[derive(Debug)]
struct CacheEntry {
    program: Arc<GeneratedProgram>,
    /// Bindings currently holding this program. Cache-internal bookkeeping,
    /// distinct from the `Arc` strong count.
    refs: u32,
}

/// Counters exposed for diagnostics overlays and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Programs currently resident.
    pub resident: usize,
    /// Distinct fingerprints observed to emit byte-identical source. A high
    /// count means the fingerprint is finer than it needs to be.
    pub duplicate_sources: u64,
}

/// Reference-counted store of generated programs.
#[derive(Debug, Default)]
pub struct ProgramCache {
    entries: FxHashMap<Fingerprint, CacheEntry>,
    /// Source-hash index used only to spot near-miss fingerprints.
    by_source: FxHashMap<u64, Fingerprint>,
    hits: u64,
    misses: u64,
    duplicate_sources: u64,
}

impl ProgramCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `fingerprint` and claim one reference on a hit.
    pub fn acquire(&mut self, fingerprint: &Fingerprint) -> Option<Arc<GeneratedProgram>> {
        match self.entries.get_mut(fingerprint) {
            Some(entry) => {
                entry.refs += 1;
                self.hits += 1;
                Some(Arc::clone(&entry.program))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store a freshly generated program and claim the first reference.
    ///
    /// Inserting over an existing fingerprint replaces the entry; holders of
    /// the old `Arc` keep it alive independently.
    pub fn insert(&mut self, program: GeneratedProgram) -> Arc<GeneratedProgram> {
        let fingerprint = program.fingerprint;
        match self.by_source.get(&program.source_hash) {
            Some(owner) if *owner != fingerprint => self.duplicate_sources += 1,
            Some(_) => {}
            None => {
                self.by_source.insert(program.source_hash, fingerprint);
            }
        }
        let program = Arc::new(program);
        self.entries.insert(
            fingerprint,
            CacheEntry {
                program: Arc::clone(&program),
                refs: 1,
            },
        );
        program
    }

    /// Drop one reference. The entry is evicted when the count reaches zero.
    pub fn release(&mut self, fingerprint: &Fingerprint) {
        let Some(entry) = self.entries.get_mut(fingerprint) else {
            return;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            return;
        }
        if let Some(entry) = self.entries.remove(fingerprint) {
            if self.by_source.get(&entry.program.source_hash) == Some(fingerprint) {
                self.by_source.remove(&entry.program.source_hash);
            }
        }
    }

    /// Peek without claiming a reference.
    #[must_use]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&Arc<GeneratedProgram>> {
        self.entries.get(fingerprint).map(|e| &e.program)
    }

    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_source.clear();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            resident: self.entries.len(),
            duplicate_sources: self.duplicate_sources,
        }
    }
}
