//! Object-to-clip transform.

use crate::errors::Result;
use crate::rtshader::atom::{Opcode, Operand};
use crate::rtshader::function::Bucket;
use crate::rtshader::param::AutoKey;
use crate::rtshader::srs::BuildContext;

/// Writes the clip-space position. With skinning attached the blended world
/// position already exists, so view-projection is applied to that instead
/// of folding the world matrix into one product.
pub(crate) fn build(ctx: &mut BuildContext<'_>) -> Result<()> {
    let clip = ctx.clip_position()?;

    if ctx.link.skinned {
        let wp4 = ctx.ensure_world_position_vs()?;
        let view_proj = ctx.uniform(AutoKey::ViewProjMatrix)?;
        ctx.push_vs(
            Bucket::Transform,
            Opcode::Multiply,
            vec![
                Operand::param(clip),
                Operand::param(view_proj),
                Operand::param(wp4),
            ],
        )?;
    } else {
        let wvp = ctx.uniform(AutoKey::WorldViewProjMatrix)?;
        let pos = ctx.position_input()?;
        ctx.push_vs(
            Bucket::Transform,
            Opcode::Multiply,
            vec![
                Operand::param(clip),
                Operand::param(wvp),
                Operand::param(pos),
            ],
        )?;
    }
    Ok(())
}
