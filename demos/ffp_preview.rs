use glam::Vec4;

use lore::core::pass::{AlphaTest, FogMode};
use lore::interner;
use lore::{
    CompareFunc, GeneratorConfig, LightCounts, Material, Pass, ProgramType, ShaderGenerator,
    ShadingModel, Technique, TextureUnit,
};

/// Fixed-Function Preview
///
/// Builds the program pair for a classic fixed-function pass (Phong
/// lighting, one texture layer, fog, alpha test) and prints what the host
/// render system would receive: both shader sources plus the uniform feed
/// schedule per stage. Run with `RUST_LOG=debug` to watch the generator.
fn main() -> lore::Result<()> {
    env_logger::init();

    let generator = ShaderGenerator::new(GeneratorConfig::default())?;

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

    let mut material = Material::new("preview");
    material
        .techniques
        .push(Technique::new(interner::intern("main"), vec![pass]));
    generator.create_shader_based_technique(&mut material, "main", "preview_generated");

    let lights = LightCounts::new(1, 2, 0);
    generator.validate_material(&material, "preview_generated", lights)?;
    let program = generator
        .program_for(material.id(), "preview_generated", 0)
        .expect("validated binding holds a program");

    println!("// ======== vertex ({}) ========", program.language);
    println!("{}", program.vertex_source);
    println!("// ======== fragment ({}) ========", program.language);
    println!("{}", program.fragment_source);

    for stage in [ProgramType::Vertex, ProgramType::Fragment] {
        println!("// {stage:?} uniform schedule:");
        println!(
            "{}",
            serde_json::to_string_pretty(program.bindings(stage)).expect("plans serialise")
        );
    }

    let stats = generator.cache_stats();
    println!("// cache: {} resident, {} misses", stats.resident, stats.misses);
    Ok(())
}
