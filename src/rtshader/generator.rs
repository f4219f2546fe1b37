//! The shader generator.
//!
//! [`ShaderGenerator`] is the public face of the runtime shader system. The
//! host registers materials with [`create_shader_based_technique`], then at
//! render time asks [`validate_material`] (synchronous) or
//! [`queue_validation`] plus [`process_pending`] (deferred to the frame
//! boundary) to make sure generated programs exist for the scheme it is
//! about to draw with.
//!
//! Each tracked `(material, scheme)` pair owns a binding that walks
//! `Dirty -> Generating -> Ready | Failed`; absence of a binding reads as
//! `Unattached`. Builds snapshot the binding's epoch before releasing the
//! lock, and a commit is discarded when an invalidation advanced the epoch
//! underneath it, so editing a material mid-build never resurrects stale
//! programs. At most one build runs per fingerprint; concurrent requests for
//! the same programs wait on a condvar and then hit the cache.
//!
//! [`create_shader_based_technique`]: ShaderGenerator::create_shader_based_technique
//! [`validate_material`]: ShaderGenerator::validate_material
//! [`queue_validation`]: ShaderGenerator::queue_validation
//! [`process_pending`]: ShaderGenerator::process_pending

use std::sync::{Arc, OnceLock};

use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::core::caps::DriverCaps;
use crate::core::light::LightCounts;
use crate::core::material::{Material, MaterialId};
use crate::core::pass::Pass;
use crate::errors::{LoreError, Result};
use crate::rtshader::assembler::RenderState;
use crate::rtshader::builder::ProgramSetBuilder;
use crate::rtshader::cache::{CacheStats, ProgramCache};
use crate::rtshader::fingerprint::Fingerprint;
use crate::rtshader::param::AutoKind;
use crate::rtshader::processor::ProgramProcessor;
use crate::rtshader::program::{BindingPlan, GeneratedProgram, ProgramType};
use crate::rtshader::registry::AutoBindTable;
use crate::rtshader::srs::SubRenderState;
use crate::rtshader::writer::{self, TargetLanguage};
use crate::utils::interner::{self, Symbol};

/// Where a material stands for one scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingStatus {
    /// No generated technique is tracked for the scheme.
    Unattached,
    /// Tracked, but programs are missing or known stale.
    Dirty,
    /// A build is queued or in flight.
    Generating,
    /// Programs exist and match the material content.
    Ready,
    /// The last build failed; the error is buffered on the binding.
    Failed,
}

/// Startup configuration for [`ShaderGenerator`].
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Language the writers emit. Must be backed by one of the capability
    /// profiles.
    pub language: TargetLanguage,
    pub caps: DriverCaps,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            language: TargetLanguage::Glsl,
            caps: DriverCaps::default(),
        }
    }
}

type BindingKey = (MaterialId, Symbol);

#[derive(Debug)]
struct Binding {
    status: BindingStatus,
    /// Bumped by every invalidation; builds commit only against the epoch
    /// they started from.
    epoch: u64,
    /// One program per pass of the generated technique, in pass order.
    programs: Vec<Arc<GeneratedProgram>>,
    error: Option<LoreError>,
}

impl Binding {
    fn new() -> Self {
        Self {
            status: BindingStatus::Dirty,
            epoch: 0,
            programs: Vec::new(),
            error: None,
        }
    }
}

/// A deferred build captured at queue time. Carries the pass descriptors by
/// value so the material is free to change while the request waits.
struct BuildRequest {
    key: BindingKey,
    epoch: u64,
    passes: Vec<Pass>,
    lights: LightCounts,
}

#[derive(Debug)]
struct Inner {
    auto_table: AutoBindTable,
    /// Extra sub-render states attached to every pass generated under a
    /// scheme, before the fixed-function fill-in.
    schemes: FxHashMap<Symbol, RenderState>,
    bindings: FxHashMap<BindingKey, Binding>,
    cache: ProgramCache,
    /// Fingerprints with a build in flight.
    building: FxHashSet<Fingerprint>,
}

/// Generates, caches and tracks shader programs for materials.
///
/// All methods take `&self`; the generator is safe to share across the
/// render and worker threads.
#[derive(Debug)]
pub struct ShaderGenerator {
    language: TargetLanguage,
    caps: DriverCaps,
    inner: Mutex<Inner>,
    build_done: Condvar,
    queue_tx: flume::Sender<BuildRequest>,
    queue_rx: flume::Receiver<BuildRequest>,
}

impl ShaderGenerator {
    /// Scheme name hosts conventionally generate into.
    pub const DEFAULT_SCHEME: &'static str = "shader_generated";

    /// Bring the generator up against a driver capability snapshot.
    ///
    /// Fails with [`LoreError::UnsupportedLanguage`] when the requested
    /// language has no backing profile in `caps`.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let backed = match config.language {
            TargetLanguage::Glsl => config.caps.glsl_version().is_some(),
            TargetLanguage::GlslEs => config.caps.glsles_version().is_some(),
            TargetLanguage::Hlsl => config.caps.hlsl_model().is_some(),
        };
        if !backed {
            return Err(LoreError::UnsupportedLanguage(
                config.language.id().to_owned(),
            ));
        }

        interner::preload_common_names();
        let (queue_tx, queue_rx) = flume::unbounded();
        info!(
            "shader generator up: language {}, {} varying slots, {} samplers",
            config.language, config.caps.max_varying_slots, config.caps.max_samplers
        );
        Ok(Self {
            language: config.language,
            caps: config.caps,
            inner: Mutex::new(Inner {
                auto_table: AutoBindTable::new(),
                schemes: FxHashMap::default(),
                bindings: FxHashMap::default(),
                cache: ProgramCache::new(),
                building: FxHashSet::default(),
            }),
            build_done: Condvar::new(),
            queue_tx,
            queue_rx,
        })
    }

    #[inline]
    #[must_use]
    pub const fn language(&self) -> TargetLanguage {
        self.language
    }

    #[inline]
    #[must_use]
    pub const fn caps(&self) -> &DriverCaps {
        &self.caps
    }

    // ========================================================================
    // Scheme templates and auto-bind control
    // ========================================================================

    /// Replace the render-state template attached under `scheme`. Existing
    /// bindings under the scheme are marked dirty.
    pub fn set_scheme_state(&self, scheme: &str, state: RenderState) {
        let scheme = interner::intern(scheme);
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.schemes.insert(scheme, state);
        Self::mark_dirty(inner, |key| key.1 == scheme);
    }

    /// The template currently attached under `scheme`.
    #[must_use]
    pub fn scheme_state(&self, scheme: &str) -> RenderState {
        let scheme = interner::intern(scheme);
        self.inner
            .lock()
            .schemes
            .get(&scheme)
            .cloned()
            .unwrap_or_default()
    }

    /// Remove an auto-bind family from the registry table.
    ///
    /// The table is not part of the program fingerprint, so every tracked
    /// binding is dirtied; keeping programs that were generated under the
    /// old table would let a later content twin share a plan the table no
    /// longer backs.
    pub fn disable_auto_binding(&self, kind: AutoKind) {
        let mut guard = self.inner.lock();
        guard.auto_table.disable(kind);
        Self::mark_dirty(&mut guard, |_| true);
    }

    pub fn enable_auto_binding(&self, kind: AutoKind) {
        let mut guard = self.inner.lock();
        guard.auto_table.enable(kind);
        Self::mark_dirty(&mut guard, |_| true);
    }

    // ========================================================================
    // Material lifecycle
    // ========================================================================

    /// Clone the material's `source_scheme` technique into a generated
    /// technique under `target_scheme` and start tracking it.
    ///
    /// Returns `false` when no technique exists for the source scheme. A
    /// second call for the same pair is a no-op returning `true`.
    pub fn create_shader_based_technique(
        &self,
        material: &mut Material,
        source_scheme: &str,
        target_scheme: &str,
    ) -> bool {
        let source = interner::intern(source_scheme);
        let target = interner::intern(target_scheme);
        let key = (material.id(), target);

        let mut guard = self.inner.lock();
        if guard.bindings.contains_key(&key) {
            return true;
        }
        let Some(technique) = material.technique(source) else {
            return false;
        };

        let mut generated = technique.clone();
        generated.scheme = target;
        generated.shader_generated = true;
        material.techniques.push(generated);
        guard.bindings.insert(key, Binding::new());
        debug!(
            "tracking material \"{}\" under scheme {target_scheme}",
            material.name
        );
        true
    }

    /// Remove the generated technique and its binding, releasing the
    /// programs back to the cache. Returns whether a technique was removed.
    pub fn remove_shader_based_technique(
        &self,
        material: &mut Material,
        target_scheme: &str,
    ) -> bool {
        let target = interner::intern(target_scheme);
        let key = (material.id(), target);

        let mut guard = self.inner.lock();
        if let Some(binding) = guard.bindings.remove(&key) {
            for program in &binding.programs {
                guard.cache.release(&program.fingerprint);
            }
        }
        material.remove_generated_technique(target)
    }

    /// Drop every binding of a material that left the material set.
    pub fn forget_material(&self, id: MaterialId) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let keys: Vec<BindingKey> = inner
            .bindings
            .keys()
            .filter(|key| key.0 == id)
            .copied()
            .collect();
        for key in keys {
            if let Some(binding) = inner.bindings.remove(&key) {
                for program in &binding.programs {
                    inner.cache.release(&program.fingerprint);
                }
            }
        }
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Make sure programs exist for the material's generated technique under
    /// `scheme`, building synchronously when they are missing or stale.
    ///
    /// Returns `Ok(true)` when the binding is ready, `Ok(false)` when the
    /// material is not tracked under the scheme. A binding in the `Failed`
    /// state returns its buffered error without retrying; call
    /// [`invalidate_material`](Self::invalidate_material) to rebuild.
    pub fn validate_material(
        &self,
        material: &Material,
        scheme: &str,
        lights: LightCounts,
    ) -> Result<bool> {
        let scheme_sym = interner::intern(scheme);
        let key = (material.id(), scheme_sym);

        let mut guard = self.inner.lock();
        match guard.bindings.get(&key) {
            None => return Ok(false),
            Some(binding) => match binding.status {
                BindingStatus::Ready
                    if self.is_current(binding, material, scheme_sym, lights) =>
                {
                    return Ok(true);
                }
                BindingStatus::Failed => {
                    if let Some(error) = binding.error.clone() {
                        return Err(error);
                    }
                }
                _ => {}
            },
        }

        let epoch = match guard.bindings.get_mut(&key) {
            Some(binding) => {
                binding.status = BindingStatus::Generating;
                binding.epoch
            }
            None => return Ok(false),
        };
        let passes = material
            .technique(scheme_sym)
            .map(|t| t.passes.clone())
            .unwrap_or_default();

        self.build_and_commit(&mut guard, key, epoch, &passes, lights)?;
        Ok(true)
    }

    /// Queue a deferred build for the material's binding; the work runs
    /// inside the next [`process_pending`](Self::process_pending) call.
    ///
    /// Returns `false` when the material is not tracked under the scheme.
    pub fn queue_validation(
        &self,
        material: &Material,
        scheme: &str,
        lights: LightCounts,
    ) -> bool {
        let scheme_sym = interner::intern(scheme);
        let key = (material.id(), scheme_sym);

        let mut guard = self.inner.lock();
        let Some(binding) = guard.bindings.get_mut(&key) else {
            return false;
        };
        if binding.status == BindingStatus::Ready
            && self.is_current(binding, material, scheme_sym, lights)
        {
            return true;
        }

        binding.status = BindingStatus::Generating;
        let request = BuildRequest {
            key,
            epoch: binding.epoch,
            passes: material
                .technique(scheme_sym)
                .map(|t| t.passes.clone())
                .unwrap_or_default(),
            lights,
        };
        drop(guard);
        // The generator owns the receiving half, so the send cannot fail.
        self.queue_tx.send(request).ok();
        true
    }

    /// Drain the deferred-build queue. Called at a frame boundary, possibly
    /// from a worker thread.
    ///
    /// Returns the number of bindings brought to `Ready`. Requests
    /// invalidated after queueing are dropped; failures are buffered on
    /// their bindings and surface through
    /// [`validate_material`](Self::validate_material).
    pub fn process_pending(&self) -> usize {
        let mut built = 0;
        while let Ok(request) = self.queue_rx.try_recv() {
            let mut guard = self.inner.lock();
            let current = guard.bindings.get(&request.key).map(|b| b.epoch);
            if current != Some(request.epoch) {
                debug!(
                    "dropping stale build request for material {:?}",
                    request.key.0
                );
                continue;
            }
            let committed = self.build_and_commit(
                &mut guard,
                request.key,
                request.epoch,
                &request.passes,
                request.lights,
            );
            if committed.is_ok() {
                built += 1;
            }
        }
        built
    }

    /// Requests waiting for the next [`process_pending`](Self::process_pending).
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue_rx.len()
    }

    // ========================================================================
    // Invalidation and host feedback
    // ========================================================================

    /// Mark the material's binding under `scheme` dirty, bump its epoch and
    /// release its programs. A build in flight for the old content will not
    /// commit.
    pub fn invalidate_material(&self, id: MaterialId, scheme: &str) {
        let scheme = interner::intern(scheme);
        let mut guard = self.inner.lock();
        Self::mark_dirty(&mut guard, |key| *key == (id, scheme));
    }

    /// Dirty every binding generated under `scheme`.
    pub fn invalidate_scheme(&self, scheme: &str) {
        let scheme = interner::intern(scheme);
        let mut guard = self.inner.lock();
        Self::mark_dirty(&mut guard, |key| key.1 == scheme);
    }

    /// Record that the host compiler rejected a program this generator
    /// emitted. The owning binding moves to `Failed`, its programs are
    /// released, and the error surfaces on the next
    /// [`validate_material`](Self::validate_material).
    pub fn report_host_failure(
        &self,
        id: MaterialId,
        scheme: &str,
        stage: ProgramType,
        compile_log: impl Into<String>,
    ) {
        let scheme = interner::intern(scheme);
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(binding) = inner.bindings.get_mut(&(id, scheme)) else {
            return;
        };
        for program in binding.programs.drain(..) {
            inner.cache.release(&program.fingerprint);
        }
        let log = compile_log.into();
        warn!("host rejected {stage:?} program of material {id:?}: {log}");
        binding.epoch += 1;
        binding.status = BindingStatus::Failed;
        binding.error = Some(LoreError::HostCompileFailed { stage, log });
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    #[must_use]
    pub fn binding_status(&self, id: MaterialId, scheme: &str) -> BindingStatus {
        let scheme = interner::intern(scheme);
        self.inner
            .lock()
            .bindings
            .get(&(id, scheme))
            .map_or(BindingStatus::Unattached, |b| b.status)
    }

    /// The program generated for one pass of the material's technique under
    /// `scheme`, if the binding holds one.
    #[must_use]
    pub fn program_for(
        &self,
        id: MaterialId,
        scheme: &str,
        pass_index: usize,
    ) -> Option<Arc<GeneratedProgram>> {
        let scheme = interner::intern(scheme);
        let guard = self.inner.lock();
        guard
            .bindings
            .get(&(id, scheme))?
            .programs
            .get(pass_index)
            .cloned()
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.lock().cache.stats()
    }

    // ========================================================================
    // Build machinery
    // ========================================================================

    /// Whether the binding's programs still match the material content and
    /// light population.
    fn is_current(
        &self,
        binding: &Binding,
        material: &Material,
        scheme: Symbol,
        lights: LightCounts,
    ) -> bool {
        let Some(technique) = material.technique(scheme) else {
            return binding.programs.is_empty();
        };
        binding.programs.len() == technique.passes.len()
            && technique
                .passes
                .iter()
                .zip(&binding.programs)
                .all(|(pass, program)| {
                    program.fingerprint == Fingerprint::new(scheme, self.language, lights, pass)
                })
    }

    fn mark_dirty(inner: &mut Inner, select: impl Fn(&BindingKey) -> bool) {
        for (key, binding) in &mut inner.bindings {
            if !select(key) {
                continue;
            }
            binding.epoch += 1;
            binding.status = BindingStatus::Dirty;
            binding.error = None;
            for program in binding.programs.drain(..) {
                inner.cache.release(&program.fingerprint);
            }
        }
    }

    /// Build one program per pass and commit the set to the binding.
    fn build_and_commit(
        &self,
        guard: &mut MutexGuard<'_, Inner>,
        key: BindingKey,
        epoch: u64,
        passes: &[Pass],
        lights: LightCounts,
    ) -> Result<()> {
        let mut programs = Vec::with_capacity(passes.len());
        let mut failure = None;
        for pass in passes {
            let fingerprint = Fingerprint::new(key.1, self.language, lights, pass);
            match self.obtain_program(guard, fingerprint, pass, lights) {
                Ok(program) => programs.push(program),
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }
        self.commit(guard, key, epoch, programs, failure)
    }

    /// Fetch from the cache or build, with at most one build in flight per
    /// fingerprint. The lock is dropped for the duration of the build;
    /// threads after the same fingerprint wait and then hit the cache.
    fn obtain_program(
        &self,
        guard: &mut MutexGuard<'_, Inner>,
        fingerprint: Fingerprint,
        pass: &Pass,
        lights: LightCounts,
    ) -> Result<Arc<GeneratedProgram>> {
        loop {
            if let Some(program) = guard.cache.acquire(&fingerprint) {
                return Ok(program);
            }
            if guard.building.insert(fingerprint) {
                break;
            }
            self.build_done.wait(guard);
        }

        let template: Vec<SubRenderState> = guard
            .schemes
            .get(&fingerprint.scheme)
            .map(|state| state.states().to_vec())
            .unwrap_or_default();
        let auto_table = guard.auto_table.clone();

        let result = MutexGuard::unlocked(guard, || {
            self.generate(&auto_table, &template, fingerprint, pass, lights)
        });

        guard.building.remove(&fingerprint);
        self.build_done.notify_all();
        match result {
            Ok(program) => Ok(guard.cache.insert(program)),
            Err(error) => Err(error),
        }
    }

    /// Run the pipeline for one pass: link and build the IR, compact and
    /// allocate, write both stages, derive the binding plans.
    fn generate(
        &self,
        auto_table: &AutoBindTable,
        template: &[SubRenderState],
        fingerprint: Fingerprint,
        pass: &Pass,
        lights: LightCounts,
    ) -> Result<GeneratedProgram> {
        let builder = ProgramSetBuilder::new(auto_table, template);
        let mut set = builder.build(pass, lights)?;

        let processor = ProgramProcessor::new(self.language, self.caps.clone());
        let output = processor.process(&mut set)?;

        let vertex_source =
            writer::write_source(self.language, &self.caps, &output, &set, ProgramType::Vertex);
        let fragment_source = writer::write_source(
            self.language,
            &self.caps,
            &output,
            &set,
            ProgramType::Fragment,
        );
        let source_hash = GeneratedProgram::source_hash_of(&vertex_source, &fragment_source);

        let vertex_bindings =
            BindingPlan::for_stage(&set.pool, &set.vertex, &output.vertex_registers);
        let fragment_bindings =
            BindingPlan::for_stage(&set.pool, &set.fragment, &output.fragment_registers);

        debug!(
            "generated {} programs for scheme \"{}\" ({} varying slots, {}+{} uniforms)",
            self.language,
            interner::resolve(fingerprint.scheme),
            output.packed_slots,
            vertex_bindings.entries.len(),
            fragment_bindings.entries.len(),
        );
        Ok(GeneratedProgram {
            fingerprint,
            language: self.language,
            set,
            vertex_source,
            fragment_source,
            vertex_bindings,
            fragment_bindings,
            source_hash,
            handles: OnceLock::new(),
        })
    }

    /// Attach build results to the binding, unless an invalidation advanced
    /// the epoch while the build ran; stale results go back to the cache.
    fn commit(
        &self,
        guard: &mut MutexGuard<'_, Inner>,
        key: BindingKey,
        epoch: u64,
        programs: Vec<Arc<GeneratedProgram>>,
        failure: Option<LoreError>,
    ) -> Result<()> {
        let inner = &mut **guard;
        let stale = match inner.bindings.get(&key) {
            Some(binding) => binding.epoch != epoch,
            None => true,
        };
        if stale {
            debug!("discarding finished build for material {:?}", key.0);
            for program in &programs {
                inner.cache.release(&program.fingerprint);
            }
            return failure.map_or(Ok(()), Err);
        }

        let Some(binding) = inner.bindings.get_mut(&key) else {
            return failure.map_or(Ok(()), Err);
        };
        for program in binding.programs.drain(..) {
            inner.cache.release(&program.fingerprint);
        }
        match failure {
            None => {
                binding.programs = programs;
                binding.status = BindingStatus::Ready;
                binding.error = None;
                Ok(())
            }
            Some(error) => {
                for program in &programs {
                    inner.cache.release(&program.fingerprint);
                }
                binding.status = BindingStatus::Failed;
                binding.error = Some(error.clone());
                warn!("program generation failed for material {:?}: {error}", key.0);
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;
    use crate::core::caps::ShaderProfile;
    use crate::core::material::Technique;
    use crate::core::pass::{NormalMapSpace, ShadingModel, TextureUnit};

    fn material_with(pass: Pass) -> Material {
        let mut material = Material::new("test");
        material
            .techniques
            .push(Technique::new(interner::intern("main"), vec![pass]));
        material
    }

    fn lit_textured_pass() -> Pass {
        let mut pass = Pass::default();
        pass.lighting = true;
        pass.texture_units.push(TextureUnit::default());
        pass
    }

    fn generator() -> ShaderGenerator {
        ShaderGenerator::new(GeneratorConfig::default()).unwrap()
    }

    #[test]
    fn creation_rejects_languages_the_driver_lacks() {
        let config = GeneratorConfig {
            language: TargetLanguage::Glsl,
            caps: DriverCaps {
                profiles: smallvec![ShaderProfile::Hlsl { model: 3 }],
                ..DriverCaps::default()
            },
        };
        let err = ShaderGenerator::new(config).unwrap_err();
        assert_eq!(err, LoreError::UnsupportedLanguage("glsl".into()));
    }

    #[test]
    fn validate_builds_programs_and_reports_ready() {
        let generator = generator();
        let mut material = material_with(lit_textured_pass());
        let id = material.id();

        assert_eq!(
            generator.binding_status(id, "generated"),
            BindingStatus::Unattached
        );
        assert!(generator.create_shader_based_technique(&mut material, "main", "generated"));
        assert_eq!(
            generator.binding_status(id, "generated"),
            BindingStatus::Dirty
        );

        let lights = LightCounts::new(1, 0, 0);
        assert_eq!(
            generator.validate_material(&material, "generated", lights),
            Ok(true)
        );
        assert_eq!(
            generator.binding_status(id, "generated"),
            BindingStatus::Ready
        );

        let program = generator.program_for(id, "generated", 0).unwrap();
        assert!(program.vertex_source.contains("void main()"));
        assert!(program.fragment_source.contains("void main()"));
        assert!(program.vertex_bindings.find("u_world_view_proj_matrix").is_some());

        // Untracked materials validate to false, not an error.
        let other = material_with(Pass::default());
        assert_eq!(
            generator.validate_material(&other, "generated", lights),
            Ok(false)
        );
    }

    #[test]
    fn materials_with_identical_content_share_programs() {
        let generator = generator();
        let mut a = material_with(lit_textured_pass());
        let mut b = material_with(lit_textured_pass());
        generator.create_shader_based_technique(&mut a, "main", "generated");
        generator.create_shader_based_technique(&mut b, "main", "generated");

        let lights = LightCounts::new(1, 1, 0);
        generator.validate_material(&a, "generated", lights).unwrap();
        generator.validate_material(&b, "generated", lights).unwrap();

        let pa = generator.program_for(a.id(), "generated", 0).unwrap();
        let pb = generator.program_for(b.id(), "generated", 0).unwrap();
        assert!(Arc::ptr_eq(&pa, &pb));

        let stats = generator.cache_stats();
        assert_eq!(stats.resident, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn light_population_change_swaps_programs() {
        let generator = generator();
        let mut material = material_with(lit_textured_pass());
        let id = material.id();
        generator.create_shader_based_technique(&mut material, "main", "generated");

        generator
            .validate_material(&material, "generated", LightCounts::new(1, 0, 0))
            .unwrap();
        let before = generator.program_for(id, "generated", 0).unwrap();

        // Same material, one more point light: the fingerprint moves.
        generator
            .validate_material(&material, "generated", LightCounts::new(1, 1, 0))
            .unwrap();
        let after = generator.program_for(id, "generated", 0).unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
        assert_ne!(before.fingerprint, after.fingerprint);
        // The old program left the cache when the binding dropped it.
        assert_eq!(generator.cache_stats().resident, 1);
        assert_eq!(
            generator.binding_status(id, "generated"),
            BindingStatus::Ready
        );
    }

    #[test]
    fn conflicting_scheme_template_fails_then_recovers() {
        let generator = generator();
        let mut template = RenderState::new();
        template.add(SubRenderState::PerPixelLighting);
        template.add(SubRenderState::NormalMap {
            unit: 0,
            space: NormalMapSpace::Tangent,
        });
        generator.set_scheme_state("generated", template);

        let mut pass = lit_textured_pass();
        pass.shading = ShadingModel::Phong;
        let mut material = material_with(pass);
        let id = material.id();
        generator.create_shader_based_technique(&mut material, "main", "generated");

        let lights = LightCounts::new(1, 0, 0);
        let err = generator
            .validate_material(&material, "generated", lights)
            .unwrap_err();
        assert!(matches!(&err, LoreError::ConflictingSrs { .. }));
        assert_eq!(
            generator.binding_status(id, "generated"),
            BindingStatus::Failed
        );

        // Failed bindings stay failed until something invalidates them.
        assert_eq!(
            generator.validate_material(&material, "generated", lights),
            Err(err)
        );

        // Replacing the template dirties the binding and clears the error.
        generator.set_scheme_state("generated", RenderState::new());
        assert_eq!(
            generator.binding_status(id, "generated"),
            BindingStatus::Dirty
        );
        assert_eq!(
            generator.validate_material(&material, "generated", lights),
            Ok(true)
        );
    }

    #[test]
    fn host_compile_failure_surfaces_on_next_validate() {
        let generator = generator();
        let mut material = material_with(lit_textured_pass());
        let id = material.id();
        generator.create_shader_based_technique(&mut material, "main", "generated");

        let lights = LightCounts::new(1, 0, 0);
        generator.validate_material(&material, "generated", lights).unwrap();

        generator.report_host_failure(id, "generated", ProgramType::Fragment, "0(12): error");
        assert_eq!(
            generator.binding_status(id, "generated"),
            BindingStatus::Failed
        );
        assert!(generator.program_for(id, "generated", 0).is_none());

        let err = generator
            .validate_material(&material, "generated", lights)
            .unwrap_err();
        assert_eq!(
            err,
            LoreError::HostCompileFailed {
                stage: ProgramType::Fragment,
                log: "0(12): error".into(),
            }
        );

        generator.invalidate_material(id, "generated");
        assert_eq!(
            generator.validate_material(&material, "generated", lights),
            Ok(true)
        );
    }

    #[test]
    fn queued_builds_run_at_the_frame_boundary() {
        let generator = generator();
        let mut material = material_with(lit_textured_pass());
        let id = material.id();
        generator.create_shader_based_technique(&mut material, "main", "generated");

        let lights = LightCounts::new(0, 1, 0);
        assert!(generator.queue_validation(&material, "generated", lights));
        assert_eq!(
            generator.binding_status(id, "generated"),
            BindingStatus::Generating
        );
        assert_eq!(generator.pending_count(), 1);
        assert!(generator.program_for(id, "generated", 0).is_none());

        assert_eq!(generator.process_pending(), 1);
        assert_eq!(
            generator.binding_status(id, "generated"),
            BindingStatus::Ready
        );
        assert!(generator.program_for(id, "generated", 0).is_some());
        assert_eq!(generator.pending_count(), 0);
    }

    #[test]
    fn invalidation_drops_stale_queued_requests() {
        let generator = generator();
        let mut material = material_with(lit_textured_pass());
        let id = material.id();
        generator.create_shader_based_technique(&mut material, "main", "generated");

        generator.queue_validation(&material, "generated", LightCounts::new(1, 0, 0));
        generator.invalidate_material(id, "generated");

        assert_eq!(generator.process_pending(), 0);
        assert_eq!(
            generator.binding_status(id, "generated"),
            BindingStatus::Dirty
        );
        assert!(generator.program_for(id, "generated", 0).is_none());
    }

    #[test]
    fn stale_epoch_commits_are_discarded() {
        let generator = generator();
        let mut material = material_with(lit_textured_pass());
        let id = material.id();
        generator.create_shader_based_technique(&mut material, "main", "generated");
        let lights = LightCounts::new(1, 0, 0);
        generator
            .validate_material(&material, "generated", lights)
            .unwrap();
        let old = generator.program_for(id, "generated", 0).unwrap();

        // Snapshot the epoch and acquire the program the way a finished
        // build would have.
        let key = (id, interner::intern("generated"));
        let (epoch, finished) = {
            let mut guard = generator.inner.lock();
            let epoch = guard.bindings.get(&key).unwrap().epoch;
            let finished = guard.cache.acquire(&old.fingerprint).unwrap();
            (epoch, vec![finished])
        };

        // The snapshot goes stale while the lock is released.
        generator.invalidate_material(id, "generated");

        let mut guard = generator.inner.lock();
        generator.commit(&mut guard, key, epoch, finished, None).unwrap();
        drop(guard);

        assert_eq!(
            generator.binding_status(id, "generated"),
            BindingStatus::Dirty
        );
        assert_eq!(generator.cache_stats().resident, 0);
        assert!(generator.program_for(id, "generated", 0).is_none());

        // The next validate rebuilds from scratch.
        generator
            .validate_material(&material, "generated", lights)
            .unwrap();
        let fresh = generator.program_for(id, "generated", 0).unwrap();
        assert!(!Arc::ptr_eq(&old, &fresh));
    }

    #[test]
    fn varying_overflow_marks_the_binding_failed() {
        let config = GeneratorConfig {
            language: TargetLanguage::Glsl,
            caps: DriverCaps {
                max_varying_slots: 1,
                ..DriverCaps::default()
            },
        };
        let generator = ShaderGenerator::new(config).unwrap();
        let mut material = material_with(lit_textured_pass());
        let id = material.id();
        generator.create_shader_based_technique(&mut material, "main", "generated");

        let err = generator
            .validate_material(&material, "generated", LightCounts::new(1, 0, 0))
            .unwrap_err();
        assert!(matches!(err, LoreError::VaryingOverflow { budget: 1, .. }));
        assert_eq!(
            generator.binding_status(id, "generated"),
            BindingStatus::Failed
        );
        assert!(generator.cache_stats().resident == 0);
    }

    #[test]
    fn removing_the_generated_technique_releases_programs() {
        let generator = generator();
        let mut material = material_with(lit_textured_pass());
        let id = material.id();
        generator.create_shader_based_technique(&mut material, "main", "generated");
        generator
            .validate_material(&material, "generated", LightCounts::new(1, 0, 0))
            .unwrap();
        assert_eq!(generator.cache_stats().resident, 1);

        assert!(generator.remove_shader_based_technique(&mut material, "generated"));
        assert_eq!(generator.cache_stats().resident, 0);
        assert_eq!(
            generator.binding_status(id, "generated"),
            BindingStatus::Unattached
        );
        assert!(material.technique(interner::intern("generated")).is_none());
    }
}
