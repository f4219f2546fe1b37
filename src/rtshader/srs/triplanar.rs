//! Triplanar texturing.
//!
//! Samples three axis-aligned projections of the world position and blends
//! them by a sharpened world-normal weight. Runs entirely in the fragment
//! stage, so steep surfaces keep their detail without mesh UVs. The result
//! modulates the colour pipe like a plain texture layer.

use crate::core::pass::TextureKind;
use crate::errors::Result;
use crate::rtshader::atom::{Comp, Opcode, Operand};
use crate::rtshader::function::Bucket;
use crate::rtshader::param::ElementType;
use crate::rtshader::srs::BuildContext;

use Comp::{X, Y, Z};

const AXES: [Comp; 3] = [X, Y, Z];

pub(crate) fn build(
    ctx: &mut BuildContext<'_>,
    units: [u8; 3],
    scale: f32,
    sharpness: f32,
) -> Result<()> {
    let n3 = ctx.ensure_world_normal_fs()?;
    let wp3 = ctx.ensure_world_position_fs()?;

    // Blend weights: pow(abs(n), sharpness), normalised to sum to one.
    let w3 = ctx.fs_local(ElementType::Float3);
    ctx.push_fs(
        Bucket::Texturing,
        Opcode::Abs,
        vec![Operand::param(w3), Operand::param(n3)],
    )?;
    ctx.push_fs(
        Bucket::Texturing,
        Opcode::Pow,
        vec![
            Operand::param(w3),
            Operand::param(w3),
            Operand::literal(sharpness),
        ],
    )?;
    let sum = ctx.fs_local(ElementType::Float);
    ctx.push_fs(
        Bucket::Texturing,
        Opcode::Add,
        vec![
            Operand::param(sum),
            Operand::param(w3).swiz(&[X]),
            Operand::param(w3).swiz(&[Y]),
        ],
    )?;
    ctx.push_fs(
        Bucket::Texturing,
        Opcode::Add,
        vec![
            Operand::param(sum),
            Operand::param(sum),
            Operand::param(w3).swiz(&[Z]),
        ],
    )?;
    ctx.push_fs(
        Bucket::Texturing,
        Opcode::Divide,
        vec![
            Operand::param(w3),
            Operand::param(w3),
            Operand::param(sum),
        ],
    )?;

    // One projection per axis; zy/xz/xy keep each plane's handedness.
    let planes: [[Comp; 2]; 3] = [[Z, Y], [X, Z], [X, Y]];
    let acc = ctx.fs_local(ElementType::Float4);
    let term = ctx.fs_local(ElementType::Float4);
    for (axis, (unit, plane)) in units.iter().zip(planes).enumerate() {
        let sampler = ctx.sampler(*unit, TextureKind::TwoD)?;
        let uv = ctx.fs_local(ElementType::Float2);
        ctx.push_fs(
            Bucket::Texturing,
            Opcode::Multiply,
            vec![
                Operand::param(uv),
                Operand::param(wp3).swiz(&plane),
                Operand::literal(scale),
            ],
        )?;

        let dst = if axis == 0 { acc } else { term };
        ctx.push_fs(
            Bucket::Texturing,
            Opcode::Sample,
            vec![
                Operand::param(dst),
                Operand::param(sampler),
                Operand::param(uv),
            ],
        )?;
        ctx.push_fs(
            Bucket::Texturing,
            Opcode::Multiply,
            vec![
                Operand::param(dst),
                Operand::param(dst),
                Operand::param(w3).swiz(&[AXES[axis]]),
            ],
        )?;
        if axis > 0 {
            ctx.push_fs(
                Bucket::Texturing,
                Opcode::Add,
                vec![
                    Operand::param(acc),
                    Operand::param(acc),
                    Operand::param(term),
                ],
            )?;
        }
    }

    let t_colour = ctx.fs_colour()?;
    ctx.push_fs(
        Bucket::Texturing,
        Opcode::Multiply,
        vec![
            Operand::param(t_colour),
            Operand::param(t_colour),
            Operand::param(acc),
        ],
    )
}
