use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use glam::Vec4;

use lore::core::pass::{AlphaTest, FogMode};
use lore::interner;
use lore::rtshader::fingerprint::Fingerprint;
use lore::{
    CompareFunc, GeneratorConfig, LightCounts, Material, Pass, ShaderGenerator, ShadingModel,
    TargetLanguage, Technique, TextureUnit,
};

const SCHEME: &str = "generated";

/// Phong lighting, one texture layer, squared exponential fog, alpha test.
fn full_pass() -> Pass {
    let mut pass = Pass::default();
    pass.lighting = true;
    pass.shading = ShadingModel::Phong;
    pass.surface.specular = Vec4::new(1.0, 1.0, 1.0, 1.0);
    pass.surface.shininess = 32.0;
    pass.texture_units.push(TextureUnit::default());
    pass.fog.mode = FogMode::Exp2;
    pass.alpha_test = Some(AlphaTest {
        func: CompareFunc::GreaterEqual,
        reference: 0.5,
    });
    pass
}

fn tracked(generator: &ShaderGenerator, pass: Pass) -> Material {
    let mut material = Material::new("bench");
    material
        .techniques
        .push(Technique::new(interner::intern("main"), vec![pass]));
    assert!(generator.create_shader_based_technique(&mut material, "main", SCHEME));
    material
}

fn bench_generation(c: &mut Criterion) {
    let lights = LightCounts::new(1, 2, 1);
    let mut group = c.benchmark_group("Shader Generation");

    // Full pipeline: assemble, process, write both stages, fill the cache.
    group.bench_function("cold build (phong + texture + fog)", |b| {
        b.iter(|| {
            let generator = ShaderGenerator::new(GeneratorConfig::default()).unwrap();
            let material = tracked(&generator, full_pass());
            generator
                .validate_material(&material, SCHEME, lights)
                .unwrap();
            black_box(generator.program_for(material.id(), SCHEME, 0));
        });
    });

    // The per-frame steady state: binding is Ready, only the content
    // digest is recomputed.
    group.bench_function("revalidate a ready binding", |b| {
        let generator = ShaderGenerator::new(GeneratorConfig::default()).unwrap();
        let material = tracked(&generator, full_pass());
        generator
            .validate_material(&material, SCHEME, lights)
            .unwrap();
        b.iter(|| {
            black_box(
                generator
                    .validate_material(&material, SCHEME, lights)
                    .unwrap(),
            );
        });
    });

    // A new material whose content matches a resident program: no source
    // is written, the cache hands out the existing entry.
    group.bench_function("cache hit for a content twin", |b| {
        let generator = ShaderGenerator::new(GeneratorConfig::default()).unwrap();
        let warm = tracked(&generator, full_pass());
        generator.validate_material(&warm, SCHEME, lights).unwrap();
        b.iter_batched(
            || tracked(&generator, full_pass()),
            |material| {
                generator
                    .validate_material(&material, SCHEME, lights)
                    .unwrap();
                black_box(generator.program_for(material.id(), SCHEME, 0));
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("pass content digest", |b| {
        let pass = full_pass();
        let scheme = interner::intern(SCHEME);
        b.iter(|| {
            black_box(Fingerprint::new(
                scheme,
                TargetLanguage::Glsl,
                lights,
                &pass,
            ));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_generation);
criterion_main!(benches);
