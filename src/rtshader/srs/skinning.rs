//! Hardware skinning.
//!
//! Blends the object-space position (and, when someone downstream needs
//! lighting data, the normal) by up to four bone matrices. The results are
//! published as the canonical world position and world normal, so transform
//! and lighting pick them up without knowing skinning exists.

use crate::errors::Result;
use crate::rtshader::atom::{ArrayIndex, Comp, Opcode, Operand};
use crate::rtshader::function::Bucket;
use crate::rtshader::param::{AutoKey, Content, ElementType, ParamId};
use crate::rtshader::program::ProgramType;
use crate::rtshader::srs::BuildContext;

const WEIGHT_COMPS: [Comp; 4] = [Comp::X, Comp::Y, Comp::Z, Comp::W];

pub(crate) fn build(ctx: &mut BuildContext<'_>) -> Result<()> {
    let Some(info) = ctx.pass.skinning else {
        return Ok(());
    };
    let weight_count = usize::from(info.weight_count.clamp(1, 4));

    let bones = ctx.uniform(AutoKey::BoneMatrixArray)?;
    let pos = ctx.position_input()?;
    let weights = ctx.vs_input(Content::BlendWeights, ElementType::Float4)?;
    let indices = ctx.vs_input(Content::BlendIndices, ElementType::Float4)?;

    // Blended world position, claimed before anyone asks for it.
    let wp4 = ctx.vs_shared(Content::PositionWorld, ElementType::Float4)?;
    ctx.mark_computed(ProgramType::Vertex, Content::PositionWorld);

    let tmp = ctx.vs_local(ElementType::Float4);
    for (i, comp) in WEIGHT_COMPS.iter().take(weight_count).enumerate() {
        ctx.push_vs(
            Bucket::PreProcess,
            Opcode::Multiply,
            vec![
                Operand::param(tmp),
                Operand::param(bones).at(ArrayIndex::Dynamic {
                    param: indices,
                    comp: *comp,
                }),
                Operand::param(pos),
            ],
        )?;
        ctx.push_vs(
            Bucket::PreProcess,
            Opcode::Multiply,
            vec![
                Operand::param(tmp),
                Operand::param(tmp),
                Operand::param(weights).swiz(&[*comp]),
            ],
        )?;
        let op = if i == 0 { Opcode::Assign } else { Opcode::Add };
        let mut operands = vec![Operand::param(wp4)];
        if i != 0 {
            operands.push(Operand::param(wp4));
        }
        operands.push(Operand::param(tmp));
        ctx.push_vs(Bucket::PreProcess, op, operands)?;
    }

    if ctx.link.needs_world_normal {
        build_normal_blend(ctx, weight_count, bones, weights, indices)?;
    }
    Ok(())
}

/// Rotate and blend the normal by the same bones. The bone matrices are
/// assumed rigid, so the upper 3x3 serves as its own inverse transpose.
fn build_normal_blend(
    ctx: &mut BuildContext<'_>,
    weight_count: usize,
    bones: ParamId,
    weights: ParamId,
    indices: ParamId,
) -> Result<()> {
    let normal = ctx.vs_input(Content::NormalObject, ElementType::Float3)?;
    let wn3 = ctx.vs_shared(Content::NormalWorld, ElementType::Float3)?;
    ctx.mark_computed(ProgramType::Vertex, Content::NormalWorld);

    let n4 = ctx.vs_local(ElementType::Float4);
    ctx.push_vs(
        Bucket::PreProcess,
        Opcode::Assign,
        vec![
            Operand::param(n4).swiz(&[Comp::X, Comp::Y, Comp::Z]),
            Operand::param(normal),
        ],
    )?;
    ctx.push_vs(
        Bucket::PreProcess,
        Opcode::Assign,
        vec![Operand::param(n4).swiz(&[Comp::W]), Operand::literal(0.0)],
    )?;

    let acc = ctx.vs_local(ElementType::Float3);
    let tmp = ctx.vs_local(ElementType::Float4);
    for (i, comp) in WEIGHT_COMPS.iter().take(weight_count).enumerate() {
        ctx.push_vs(
            Bucket::PreProcess,
            Opcode::Multiply,
            vec![
                Operand::param(tmp),
                Operand::param(bones).at(ArrayIndex::Dynamic {
                    param: indices,
                    comp: *comp,
                }),
                Operand::param(n4),
            ],
        )?;
        ctx.push_vs(
            Bucket::PreProcess,
            Opcode::Multiply,
            vec![
                Operand::param(tmp),
                Operand::param(tmp),
                Operand::param(weights).swiz(&[*comp]),
            ],
        )?;
        let op = if i == 0 { Opcode::Assign } else { Opcode::Add };
        let mut operands = vec![Operand::param(acc)];
        if i != 0 {
            operands.push(Operand::param(acc));
        }
        operands.push(Operand::param(tmp).swiz(&[Comp::X, Comp::Y, Comp::Z]));
        ctx.push_vs(Bucket::PreProcess, op, operands)?;
    }

    ctx.push_vs(
        Bucket::PreProcess,
        Opcode::Normalize,
        vec![Operand::param(wn3), Operand::param(acc)],
    )
}
