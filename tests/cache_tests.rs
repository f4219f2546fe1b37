//! Program Cache Tests
//!
//! Tests for:
//! - One compilation shared by materials with equal pass content,
//!   sequentially and across racing threads
//! - Pass edits moving a binding to a fresh cache entry
//! - Distinct fingerprints that emit identical text
//! - Scheme-scoped invalidation
//! - Frame-boundary queue converging on one cache entry
//! - Reference release on forget / technique removal

use std::sync::Arc;

use lore::core::pass::FogMode;
use lore::interner;
use lore::{
    BindingStatus, GeneratorConfig, LightCounts, Material, Pass, ShaderGenerator, Technique,
    TextureUnit,
};

const SCHEME: &str = "generated";
const LIGHTS: LightCounts = LightCounts::new(1, 0, 0);

fn generator() -> ShaderGenerator {
    ShaderGenerator::new(GeneratorConfig::default()).unwrap()
}

fn tracked_under(generator: &ShaderGenerator, pass: Pass, target: &str) -> Material {
    let mut material = Material::new("fixture");
    material
        .techniques
        .push(Technique::new(interner::intern("main"), vec![pass]));
    assert!(generator.create_shader_based_technique(&mut material, "main", target));
    material
}

fn tracked(generator: &ShaderGenerator, pass: Pass) -> Material {
    tracked_under(generator, pass, SCHEME)
}

fn lit_textured_pass() -> Pass {
    let mut pass = Pass::default();
    pass.lighting = true;
    pass.texture_units.push(TextureUnit::default());
    pass
}

// ============================================================================
// Sharing
// ============================================================================

#[test]
fn materials_with_equal_content_share_one_compilation() {
    let generator = generator();
    let a = tracked(&generator, lit_textured_pass());
    let b = tracked(&generator, lit_textured_pass());

    assert!(generator.validate_material(&a, SCHEME, LIGHTS).unwrap());
    assert!(generator.validate_material(&b, SCHEME, LIGHTS).unwrap());

    let pa = generator.program_for(a.id(), SCHEME, 0).unwrap();
    let pb = generator.program_for(b.id(), SCHEME, 0).unwrap();
    assert!(Arc::ptr_eq(&pa, &pb), "expected one shared program");

    let stats = generator.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.resident, 1);
}

#[test]
fn concurrent_validations_share_one_build() {
    let generator = generator();
    let a = tracked(&generator, lit_textured_pass());
    let b = tracked(&generator, lit_textured_pass());

    // Two threads race on the same fingerprint. Whichever loses the race
    // waits for the winner's build instead of starting a second one.
    let generator = &generator;
    std::thread::scope(|scope| {
        for material in [&a, &b] {
            scope.spawn(move || {
                generator
                    .validate_material(material, SCHEME, LIGHTS)
                    .unwrap();
            });
        }
    });

    let pa = generator.program_for(a.id(), SCHEME, 0).unwrap();
    let pb = generator.program_for(b.id(), SCHEME, 0).unwrap();
    assert!(Arc::ptr_eq(&pa, &pb), "expected one shared program");
    assert_eq!(generator.cache_stats().resident, 1);
}

#[test]
fn editing_the_generated_pass_swaps_the_program() {
    let generator = generator();
    let mut material = tracked(&generator, lit_textured_pass());
    assert!(generator
        .validate_material(&material, SCHEME, LIGHTS)
        .unwrap());
    let before = generator.program_for(material.id(), SCHEME, 0).unwrap();

    material
        .technique_mut(interner::intern(SCHEME))
        .unwrap()
        .passes[0]
        .fog
        .mode = FogMode::Exp;
    assert!(generator
        .validate_material(&material, SCHEME, LIGHTS)
        .unwrap());
    let after = generator.program_for(material.id(), SCHEME, 0).unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    assert_ne!(before.fingerprint, after.fingerprint);
    assert!(after.fragment_source.contains("u_fog_colour"));
    // The orphaned entry was the binding's only reference.
    assert_eq!(generator.cache_stats().resident, 1);
}

#[test]
fn unused_state_changes_emit_identical_text_under_new_keys() {
    // Shininess feeds nothing when lighting is off, so the sources come out
    // byte-identical even though the content keys differ.
    let generator = generator();
    let mut matte = Pass::default();
    matte.surface.shininess = 16.0;
    let mut glossy = Pass::default();
    glossy.surface.shininess = 64.0;

    let a = tracked(&generator, matte);
    let b = tracked(&generator, glossy);
    assert!(generator.validate_material(&a, SCHEME, LIGHTS).unwrap());
    assert!(generator.validate_material(&b, SCHEME, LIGHTS).unwrap());

    let pa = generator.program_for(a.id(), SCHEME, 0).unwrap();
    let pb = generator.program_for(b.id(), SCHEME, 0).unwrap();
    assert!(!Arc::ptr_eq(&pa, &pb));
    assert_ne!(pa.fingerprint, pb.fingerprint);
    assert_eq!(pa.vertex_source, pb.vertex_source);
    assert_eq!(pa.fragment_source, pb.fragment_source);
    assert_eq!(pa.source_hash, pb.source_hash);

    let stats = generator.cache_stats();
    assert_eq!(stats.resident, 2);
    assert_eq!(stats.duplicate_sources, 1);
}

// ============================================================================
// Invalidation scope
// ============================================================================

#[test]
fn scheme_invalidation_only_touches_its_own_bindings() {
    let generator = generator();
    let mut material = Material::new("fixture");
    material
        .techniques
        .push(Technique::new(interner::intern("main"), vec![lit_textured_pass()]));
    assert!(generator.create_shader_based_technique(&mut material, "main", "night"));
    assert!(generator.create_shader_based_technique(&mut material, "main", "day"));

    assert!(generator.validate_material(&material, "night", LIGHTS).unwrap());
    assert!(generator.validate_material(&material, "day", LIGHTS).unwrap());
    assert_eq!(generator.cache_stats().resident, 2);

    generator.invalidate_scheme("night");
    assert_eq!(
        generator.binding_status(material.id(), "night"),
        BindingStatus::Dirty
    );
    assert_eq!(
        generator.binding_status(material.id(), "day"),
        BindingStatus::Ready
    );
    assert_eq!(generator.cache_stats().resident, 1);
}

// ============================================================================
// Deferred builds
// ============================================================================

#[test]
fn queued_identical_materials_converge_on_one_entry() {
    let generator = generator();
    let a = tracked(&generator, lit_textured_pass());
    let b = tracked(&generator, lit_textured_pass());

    assert!(generator.queue_validation(&a, SCHEME, LIGHTS));
    assert!(generator.queue_validation(&b, SCHEME, LIGHTS));
    assert_eq!(generator.pending_count(), 2);
    assert_eq!(generator.binding_status(a.id(), SCHEME), BindingStatus::Generating);

    assert_eq!(generator.process_pending(), 2);
    assert_eq!(generator.binding_status(a.id(), SCHEME), BindingStatus::Ready);
    assert_eq!(generator.binding_status(b.id(), SCHEME), BindingStatus::Ready);

    let pa = generator.program_for(a.id(), SCHEME, 0).unwrap();
    let pb = generator.program_for(b.id(), SCHEME, 0).unwrap();
    assert!(Arc::ptr_eq(&pa, &pb));

    let stats = generator.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.resident, 1);
}

// ============================================================================
// Release
// ============================================================================

#[test]
fn forgetting_a_material_releases_only_its_references() {
    let generator = generator();
    let a = tracked(&generator, lit_textured_pass());
    let b = tracked(&generator, lit_textured_pass());
    assert!(generator.validate_material(&a, SCHEME, LIGHTS).unwrap());
    assert!(generator.validate_material(&b, SCHEME, LIGHTS).unwrap());

    generator.forget_material(a.id());
    assert_eq!(
        generator.binding_status(a.id(), SCHEME),
        BindingStatus::Unattached
    );
    // The other material still holds the entry alive.
    assert_eq!(generator.cache_stats().resident, 1);
    assert!(generator.program_for(b.id(), SCHEME, 0).is_some());

    generator.forget_material(b.id());
    assert_eq!(generator.cache_stats().resident, 0);
}

#[test]
fn technique_removal_strips_the_material_and_the_binding() {
    let generator = generator();
    let mut material = tracked(&generator, lit_textured_pass());
    assert!(generator
        .validate_material(&material, SCHEME, LIGHTS)
        .unwrap());

    assert!(generator.remove_shader_based_technique(&mut material, SCHEME));
    assert!(material.technique(interner::intern(SCHEME)).is_none());
    // The hand-authored technique survives.
    assert!(material.technique(interner::intern("main")).is_some());
    assert_eq!(
        generator.binding_status(material.id(), SCHEME),
        BindingStatus::Unattached
    );
    assert_eq!(generator.cache_stats().resident, 0);

    assert!(!generator.remove_shader_based_technique(&mut material, SCHEME));
}
