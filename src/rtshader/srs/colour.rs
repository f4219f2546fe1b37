//! Base colour plumbing.
//!
//! Feeds the fragment colour pipe: the vertex stage forwards either the
//! vertex colour stream (when any surface component tracks it) or the
//! material diffuse, the fragment stage copies it into the shared
//! `t_colour` local that lighting, texturing and fog then rework, and the
//! final value is written to the output at the end.

use crate::errors::Result;
use crate::rtshader::atom::{Opcode, Operand};
use crate::rtshader::function::Bucket;
use crate::rtshader::param::{AutoKey, Content, ElementType};
use crate::rtshader::srs::BuildContext;

pub(crate) fn build(ctx: &mut BuildContext<'_>) -> Result<()> {
    let (v_out, v_in) = ctx.varying(Content::ColourDiffuse, ElementType::Float4)?;

    if ctx.pass.colour_tracking.is_empty() {
        let diffuse = ctx.uniform(AutoKey::SurfaceDiffuse)?;
        ctx.push_vs(
            Bucket::Colour,
            Opcode::Assign,
            vec![Operand::param(v_out), Operand::param(diffuse)],
        )?;
    } else {
        let a_colour = ctx.vs_input(Content::ColourDiffuse, ElementType::Float4)?;
        ctx.push_vs(
            Bucket::Colour,
            Opcode::Assign,
            vec![Operand::param(v_out), Operand::param(a_colour)],
        )?;
    }

    let t_colour = ctx.fs_colour()?;
    ctx.push_fs(
        Bucket::Colour,
        Opcode::Assign,
        vec![Operand::param(t_colour), Operand::param(v_in)],
    )?;

    let o_color = ctx.fragment_output()?;
    ctx.push_fs(
        Bucket::PostProcess,
        Opcode::Assign,
        vec![Operand::param(o_color), Operand::param(t_colour)],
    )
}
