//! Fixed-function fog.
//!
//! The factor is computed per vertex from view-space depth and carried to
//! the fragment stage, where the blended colour is folded towards the fog
//! colour. A factor of one means no fog, matching the classic pipeline.
//!
//! `u_fog_params` packs (density, start, end, 1 / (end - start)).

use crate::core::pass::FogMode;
use crate::errors::Result;
use crate::rtshader::atom::{Comp, Opcode, Operand};
use crate::rtshader::function::Bucket;
use crate::rtshader::param::{AutoKey, Content, ElementType};
use crate::rtshader::srs::BuildContext;

use Comp::{W, X, Y, Z};

pub(crate) fn build(ctx: &mut BuildContext<'_>) -> Result<()> {
    let mode = ctx.pass.fog.mode;
    if mode == FogMode::None {
        return Ok(());
    }

    let vp4 = ctx.ensure_view_position_vs()?;
    let params = ctx.uniform(AutoKey::FogParams)?;

    // View space looks down negative z; depth is the distance in front.
    let depth = ctx.vs_local(ElementType::Float);
    ctx.push_vs(
        Bucket::Fog,
        Opcode::Subtract,
        vec![
            Operand::param(depth),
            Operand::literal(0.0),
            Operand::param(vp4).swiz(&[Z]),
        ],
    )?;

    let factor = ctx.vs_local(ElementType::Float);
    match mode {
        FogMode::None => unreachable!(),
        FogMode::Linear => {
            ctx.push_vs(
                Bucket::Fog,
                Opcode::Subtract,
                vec![
                    Operand::param(factor),
                    Operand::param(params).swiz(&[Z]),
                    Operand::param(depth),
                ],
            )?;
            ctx.push_vs(
                Bucket::Fog,
                Opcode::Multiply,
                vec![
                    Operand::param(factor),
                    Operand::param(factor),
                    Operand::param(params).swiz(&[W]),
                ],
            )?;
        }
        FogMode::Exp | FogMode::Exp2 => {
            ctx.push_vs(
                Bucket::Fog,
                Opcode::Multiply,
                vec![
                    Operand::param(factor),
                    Operand::param(depth),
                    Operand::param(params).swiz(&[X]),
                ],
            )?;
            if mode == FogMode::Exp2 {
                ctx.push_vs(
                    Bucket::Fog,
                    Opcode::Multiply,
                    vec![
                        Operand::param(factor),
                        Operand::param(factor),
                        Operand::param(factor),
                    ],
                )?;
            }
            ctx.push_vs(
                Bucket::Fog,
                Opcode::Subtract,
                vec![
                    Operand::param(factor),
                    Operand::literal(0.0),
                    Operand::param(factor),
                ],
            )?;
            ctx.push_vs(
                Bucket::Fog,
                Opcode::Exp,
                vec![Operand::param(factor), Operand::param(factor)],
            )?;
        }
    }
    ctx.push_vs(
        Bucket::Fog,
        Opcode::Clamp,
        vec![
            Operand::param(factor),
            Operand::param(factor),
            Operand::literal(0.0),
            Operand::literal(1.0),
        ],
    )?;

    let (v_fog, v_fog_in) = ctx.varying(Content::FogFactor, ElementType::Float)?;
    ctx.push_vs(
        Bucket::Fog,
        Opcode::Assign,
        vec![Operand::param(v_fog), Operand::param(factor)],
    )?;

    // Alpha is left alone; only the colour sinks into the fog.
    let fog_colour = ctx.uniform(AutoKey::FogColour)?;
    let t_colour = ctx.fs_colour()?;
    ctx.push_fs(
        Bucket::Fog,
        Opcode::Lerp,
        vec![
            Operand::param(t_colour).swiz(&[X, Y, Z]),
            Operand::param(fog_colour).swiz(&[X, Y, Z]),
            Operand::param(t_colour).swiz(&[X, Y, Z]),
            Operand::param(v_fog_in),
        ],
    )
}
