//! Program set construction.
//!
//! Drives one pass from descriptor to linked IR pair: assemble the state
//! list, allocate a fresh registry, run every state's build, then prune the
//! declarations nothing ended up referencing. The returned [`ProgramSet`]
//! owns its parameter pool and is ready for target processing.

use rustc_hash::FxHashSet;

use crate::core::light::LightCounts;
use crate::core::pass::Pass;
use crate::errors::Result;
use crate::rtshader::assembler::TargetRenderState;
use crate::rtshader::program::ProgramSet;
use crate::rtshader::registry::{AutoBindTable, ParamRegistry};
use crate::rtshader::srs::SubRenderState;

/// Builds the linked IR pair for one pass under one scheme.
pub struct ProgramSetBuilder<'a> {
    auto_table: &'a AutoBindTable,
    template: &'a [SubRenderState],
}

impl<'a> ProgramSetBuilder<'a> {
    #[must_use]
    pub fn new(auto_table: &'a AutoBindTable, template: &'a [SubRenderState]) -> Self {
        Self {
            auto_table,
            template,
        }
    }

    pub fn build(&self, pass: &Pass, lights: LightCounts) -> Result<ProgramSet> {
        let target = TargetRenderState::link(self.template, pass, lights)?;
        let bone_count = pass.skinning.map_or(0, |s| s.bone_count);
        let mut registry = ParamRegistry::new(self.auto_table.clone(), lights, bone_count);

        let mut set = ProgramSet::default();
        target.build(pass, lights, &mut registry, &mut set)?;

        // States may reserve scratch they never end up writing.
        let keep = FxHashSet::default();
        set.vertex.prune_unused(&keep);
        set.fragment.prune_unused(&keep);
        set.pool = registry.into_pool();
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pass::{FogMode, ShadingModel, SkinningInfo, TextureUnit};
    use crate::rtshader::param::{Content, ParamClass};
    use crate::utils::interner;

    fn build(pass: &Pass, lights: LightCounts) -> ProgramSet {
        let table = AutoBindTable::new();
        ProgramSetBuilder::new(&table, &[])
            .build(pass, lights)
            .unwrap()
    }

    fn full_pass() -> Pass {
        let mut pass = Pass {
            lighting: true,
            shading: ShadingModel::Phong,
            ..Pass::default()
        };
        pass.surface.shininess = 32.0;
        pass.surface.specular = glam::Vec4::new(1.0, 1.0, 1.0, 1.0);
        pass.texture_units.push(TextureUnit::default());
        pass.fog.mode = FogMode::Exp2;
        pass.skinning = Some(SkinningInfo {
            bone_count: 24,
            weight_count: 4,
        });
        pass
    }

    #[test]
    fn vertex_stage_always_writes_clip_position() {
        let set = build(&Pass::default(), LightCounts::default());
        let clip = set
            .vertex
            .outputs()
            .iter()
            .find(|id| set.pool.get(**id).content == Some(Content::PositionProjective));
        assert!(clip.is_some());
        assert!(set.vertex.params_used().contains(clip.unwrap()));
    }

    #[test]
    fn fragment_inputs_all_have_a_vertex_writer() {
        let set = build(&full_pass(), LightCounts::new(1, 1, 1));
        let out_names: Vec<_> = set
            .vertex
            .outputs()
            .iter()
            .map(|id| set.pool.get(*id).name)
            .collect();
        for id in set.fragment.inputs() {
            assert!(
                out_names.contains(&set.pool.get(*id).name),
                "fragment input `{}` has no matching vertex output",
                interner::resolve(set.pool.get(*id).name)
            );
        }
    }

    #[test]
    fn no_declaration_survives_unreferenced() {
        let set = build(&full_pass(), LightCounts::new(2, 1, 0));
        for f in [&set.vertex, &set.fragment] {
            let used = f.params_used();
            for id in f
                .inputs()
                .iter()
                .chain(f.outputs())
                .chain(f.locals())
            {
                assert!(
                    used.contains(id),
                    "declared `{}` is never referenced",
                    interner::resolve(set.pool.get(*id).name)
                );
            }
        }
    }

    #[test]
    fn skinned_pass_reads_bone_uniform_array() {
        let set = build(&full_pass(), LightCounts::default());
        let used = set.vertex.params_used();
        let bones = set.pool.iter().find(|(id, p)| {
            p.class == ParamClass::Uniform
                && interner::resolve(p.name) == "u_bone_matrices"
                && used.contains(id)
        });
        assert!(bones.is_some());
        assert_eq!(bones.unwrap().1.array_len, Some(24));
    }
}
