//! Fixed-function texture layers.
//!
//! One instance per texture unit. The vertex stage produces the layer's
//! coordinates (mesh UVs, sphere map, reflection or projection), the
//! fragment stage fetches and blends into the colour pipe in unit order.
//! Units claimed by an effect state are skipped entirely.

use crate::core::pass::{TexCoordGen, TextureBlend, TextureKind, TextureUnit};
use crate::errors::Result;
use crate::rtshader::atom::{Comp, Opcode, Operand};
use crate::rtshader::function::Bucket;
use crate::rtshader::param::{AutoKey, Content, ElementType};
use crate::rtshader::srs::BuildContext;

use Comp::{W, X, Y, Z};

const XY: [Comp; 2] = [X, Y];
const XYZ: [Comp; 3] = [X, Y, Z];

pub(crate) fn build(ctx: &mut BuildContext<'_>, unit: u8) -> Result<()> {
    if ctx.link.consumed_units.contains(&unit) {
        return Ok(());
    }
    let Some(tu) = ctx.pass.texture_units.get(usize::from(unit)).copied() else {
        return Ok(());
    };

    let sampler = ctx.sampler(unit, tu.kind)?;
    let coord = match tu.coord_gen {
        TexCoordGen::Uv => build_uv(ctx, unit, &tu)?,
        TexCoordGen::SphereEnv => build_sphere_env(ctx, unit)?,
        TexCoordGen::Reflection => build_reflection(ctx, unit, tu.kind)?,
        TexCoordGen::Projective => build_projective(ctx, unit, tu.kind)?,
    };

    let texel = ctx.fs_local(ElementType::Float4);
    ctx.push_fs(
        Bucket::Texturing,
        Opcode::Sample,
        vec![
            Operand::param(texel),
            Operand::param(sampler),
            coord,
        ],
    )?;

    let t_colour = ctx.fs_colour()?;
    let (opcode, operands) = match tu.blend {
        TextureBlend::Replace => (
            Opcode::Assign,
            vec![Operand::param(t_colour), Operand::param(texel)],
        ),
        TextureBlend::Modulate => (
            Opcode::Multiply,
            vec![
                Operand::param(t_colour),
                Operand::param(t_colour),
                Operand::param(texel),
            ],
        ),
        TextureBlend::Add => (
            Opcode::Add,
            vec![
                Operand::param(t_colour),
                Operand::param(t_colour),
                Operand::param(texel),
            ],
        ),
        TextureBlend::Subtract => (
            Opcode::Subtract,
            vec![
                Operand::param(t_colour),
                Operand::param(t_colour),
                Operand::param(texel),
            ],
        ),
        // Decal blends colour by texel alpha and leaves the base alpha.
        TextureBlend::Decal => (
            Opcode::Lerp,
            vec![
                Operand::param(t_colour).swiz(&XYZ),
                Operand::param(t_colour).swiz(&XYZ),
                Operand::param(texel).swiz(&XYZ),
                Operand::param(texel).swiz(&[W]),
            ],
        ),
    };
    ctx.push_fs(Bucket::Texturing, opcode, operands)
}

/// Mesh UV set, optionally run through the unit's texture matrix.
fn build_uv(ctx: &mut BuildContext<'_>, unit: u8, tu: &TextureUnit) -> Result<Operand> {
    let a_uv = ctx.vs_input(Content::TexCoord(tu.coord_set), ElementType::Float2)?;
    let (v_uv, v_uv_in) = ctx.varying(Content::TexCoord(unit), ElementType::Float2)?;

    if tu.has_transform {
        let matrix = ctx.uniform(AutoKey::TextureMatrix(unit))?;
        let uv4 = ctx.vs_local(ElementType::Float4);
        ctx.push_vs(
            Bucket::Texturing,
            Opcode::Assign,
            vec![Operand::param(uv4).swiz(&XY), Operand::param(a_uv)],
        )?;
        ctx.push_vs(
            Bucket::Texturing,
            Opcode::Assign,
            vec![Operand::param(uv4).swiz(&[Z]), Operand::literal(0.0)],
        )?;
        ctx.push_vs(
            Bucket::Texturing,
            Opcode::Assign,
            vec![Operand::param(uv4).swiz(&[W]), Operand::literal(1.0)],
        )?;
        ctx.push_vs(
            Bucket::Texturing,
            Opcode::Multiply,
            vec![
                Operand::param(uv4),
                Operand::param(matrix),
                Operand::param(uv4),
            ],
        )?;
        ctx.push_vs(
            Bucket::Texturing,
            Opcode::Assign,
            vec![Operand::param(v_uv), Operand::param(uv4).swiz(&XY)],
        )?;
    } else {
        ctx.push_vs(
            Bucket::Texturing,
            Opcode::Assign,
            vec![Operand::param(v_uv), Operand::param(a_uv)],
        )?;
    }
    Ok(Operand::param(v_uv_in))
}

/// Classic sphere map: view-space normal folded into [0,1].
fn build_sphere_env(ctx: &mut BuildContext<'_>, unit: u8) -> Result<Operand> {
    let wn3 = ctx.ensure_world_normal_vs()?;
    let view = ctx.uniform(AutoKey::ViewMatrix)?;

    let n4 = ctx.vs_local(ElementType::Float4);
    ctx.push_vs(
        Bucket::Texturing,
        Opcode::Assign,
        vec![Operand::param(n4).swiz(&XYZ), Operand::param(wn3)],
    )?;
    ctx.push_vs(
        Bucket::Texturing,
        Opcode::Assign,
        vec![Operand::param(n4).swiz(&[W]), Operand::literal(0.0)],
    )?;
    ctx.push_vs(
        Bucket::Texturing,
        Opcode::Multiply,
        vec![
            Operand::param(n4),
            Operand::param(view),
            Operand::param(n4),
        ],
    )?;

    let uv = ctx.vs_local(ElementType::Float2);
    ctx.push_vs(
        Bucket::Texturing,
        Opcode::Multiply,
        vec![
            Operand::param(uv),
            Operand::param(n4).swiz(&XY),
            Operand::literal(0.5),
        ],
    )?;
    ctx.push_vs(
        Bucket::Texturing,
        Opcode::Add,
        vec![
            Operand::param(uv),
            Operand::param(uv),
            Operand::literal(0.5),
        ],
    )?;

    let (v_uv, v_uv_in) = ctx.varying(Content::TexCoord(unit), ElementType::Float2)?;
    ctx.push_vs(
        Bucket::Texturing,
        Opcode::Assign,
        vec![Operand::param(v_uv), Operand::param(uv)],
    )?;
    Ok(Operand::param(v_uv_in))
}

/// World-space reflection vector. Cube maps take it whole; 2D maps fold the
/// front components into [0,1] like a sphere map.
fn build_reflection(ctx: &mut BuildContext<'_>, unit: u8, kind: TextureKind) -> Result<Operand> {
    let wn3 = ctx.ensure_world_normal_vs()?;
    let wp4 = ctx.ensure_world_position_vs()?;
    let camera = ctx.uniform(AutoKey::CameraPositionWorld)?;

    let i3 = ctx.vs_local(ElementType::Float3);
    let r3 = ctx.vs_local(ElementType::Float3);
    ctx.push_vs(
        Bucket::Texturing,
        Opcode::Subtract,
        vec![
            Operand::param(i3),
            Operand::param(wp4).swiz(&XYZ),
            Operand::param(camera),
        ],
    )?;
    ctx.push_vs(
        Bucket::Texturing,
        Opcode::Normalize,
        vec![Operand::param(i3), Operand::param(i3)],
    )?;
    ctx.push_vs(
        Bucket::Texturing,
        Opcode::Reflect,
        vec![
            Operand::param(r3),
            Operand::param(i3),
            Operand::param(wn3),
        ],
    )?;

    match kind {
        TextureKind::Cube => {
            let (v_r, v_r_in) = ctx.varying(Content::TexCoord(unit), ElementType::Float3)?;
            ctx.push_vs(
                Bucket::Texturing,
                Opcode::Assign,
                vec![Operand::param(v_r), Operand::param(r3)],
            )?;
            Ok(Operand::param(v_r_in))
        }
        TextureKind::TwoD => {
            let uv = ctx.vs_local(ElementType::Float2);
            ctx.push_vs(
                Bucket::Texturing,
                Opcode::Multiply,
                vec![
                    Operand::param(uv),
                    Operand::param(r3).swiz(&XY),
                    Operand::literal(0.5),
                ],
            )?;
            ctx.push_vs(
                Bucket::Texturing,
                Opcode::Add,
                vec![
                    Operand::param(uv),
                    Operand::param(uv),
                    Operand::literal(0.5),
                ],
            )?;
            let (v_uv, v_uv_in) = ctx.varying(Content::TexCoord(unit), ElementType::Float2)?;
            ctx.push_vs(
                Bucket::Texturing,
                Opcode::Assign,
                vec![Operand::param(v_uv), Operand::param(uv)],
            )?;
            Ok(Operand::param(v_uv_in))
        }
    }
}

/// Coordinates projected through a per-unit view-projection, divided by `w`
/// in the fragment stage.
fn build_projective(ctx: &mut BuildContext<'_>, unit: u8, kind: TextureKind) -> Result<Operand> {
    let matrix = ctx.uniform(AutoKey::TextureViewProj(unit))?;
    let wp4 = ctx.ensure_world_position_vs()?;
    let (v_p, v_p_in) = ctx.varying(Content::TexCoord(unit), ElementType::Float4)?;
    ctx.push_vs(
        Bucket::Texturing,
        Opcode::Multiply,
        vec![
            Operand::param(v_p),
            Operand::param(matrix),
            Operand::param(wp4),
        ],
    )?;

    match kind {
        TextureKind::TwoD => {
            let uv = ctx.fs_local(ElementType::Float2);
            ctx.push_fs(
                Bucket::Texturing,
                Opcode::Divide,
                vec![
                    Operand::param(uv),
                    Operand::param(v_p_in).swiz(&XY),
                    Operand::param(v_p_in).swiz(&[W]),
                ],
            )?;
            Ok(Operand::param(uv))
        }
        TextureKind::Cube => Ok(Operand::param(v_p_in).swiz(&XYZ)),
    }
}
