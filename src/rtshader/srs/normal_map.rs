//! Normal-mapped lighting.
//!
//! Replaces the interpolated surface normal with one fetched from a texture
//! before running the per-pixel lighting equation. Tangent-space maps get a
//! TBN basis built from the mesh tangent; object-space maps only need the
//! world matrix. The claimed texture unit is invisible to layer blending.

use crate::core::pass::{NormalMapSpace, TextureKind};
use crate::errors::Result;
use crate::rtshader::atom::{Comp, Opcode, Operand};
use crate::rtshader::function::Bucket;
use crate::rtshader::param::{AutoKey, Content, ElementType, ParamId};
use crate::rtshader::srs::{lighting, BuildContext};

use Comp::{W, X, Y, Z};

const XYZ: [Comp; 3] = [X, Y, Z];

pub(crate) fn build(ctx: &mut BuildContext<'_>, unit: u8, space: NormalMapSpace) -> Result<()> {
    let coord_set = ctx
        .pass
        .texture_units
        .get(usize::from(unit))
        .map_or(0, |tu| tu.coord_set);

    let sampler = ctx.sampler(unit, TextureKind::TwoD)?;
    let a_uv = ctx.vs_input(Content::TexCoord(coord_set), ElementType::Float2)?;
    let (v_uv, v_uv_in) = ctx.varying(Content::TexCoord(unit), ElementType::Float2)?;
    ctx.push_vs(
        Bucket::Texturing,
        Opcode::Assign,
        vec![Operand::param(v_uv), Operand::param(a_uv)],
    )?;

    // Decode the map: [0,1] texels to [-1,1] vectors.
    let texel = ctx.fs_local(ElementType::Float4);
    let sampled = ctx.fs_local(ElementType::Float3);
    ctx.push_fs(
        Bucket::Lighting,
        Opcode::Sample,
        vec![
            Operand::param(texel),
            Operand::param(sampler),
            Operand::param(v_uv_in),
        ],
    )?;
    ctx.push_fs(
        Bucket::Lighting,
        Opcode::Multiply,
        vec![
            Operand::param(sampled),
            Operand::param(texel).swiz(&XYZ),
            Operand::literal(2.0),
        ],
    )?;
    ctx.push_fs(
        Bucket::Lighting,
        Opcode::Subtract,
        vec![
            Operand::param(sampled),
            Operand::param(sampled),
            Operand::literal(1.0),
        ],
    )?;

    let perturbed = ctx.fs_local(ElementType::Float3);
    match space {
        NormalMapSpace::Tangent => build_tangent_basis(ctx, sampled, perturbed)?,
        NormalMapSpace::Object => build_object_rotate(ctx, sampled, perturbed)?,
    }

    lighting::build_with_normal(ctx, perturbed)
}

/// `perturbed = normalize(T*s.x + B*s.y + N*s.z)` with `B = cross(N, T)`.
fn build_tangent_basis(
    ctx: &mut BuildContext<'_>,
    sampled: ParamId,
    perturbed: ParamId,
) -> Result<()> {
    let n3 = ctx.ensure_world_normal_fs()?;

    let a_tangent = ctx.vs_input(Content::TangentObject, ElementType::Float3)?;
    let world = ctx.uniform(AutoKey::WorldMatrix)?;
    let t4 = ctx.vs_local(ElementType::Float4);
    let wt3 = ctx.vs_local(ElementType::Float3);
    ctx.push_vs(
        Bucket::PreProcess,
        Opcode::Assign,
        vec![Operand::param(t4).swiz(&XYZ), Operand::param(a_tangent)],
    )?;
    ctx.push_vs(
        Bucket::PreProcess,
        Opcode::Assign,
        vec![Operand::param(t4).swiz(&[W]), Operand::literal(0.0)],
    )?;
    ctx.push_vs(
        Bucket::PreProcess,
        Opcode::Multiply,
        vec![
            Operand::param(t4),
            Operand::param(world),
            Operand::param(t4),
        ],
    )?;
    ctx.push_vs(
        Bucket::PreProcess,
        Opcode::Normalize,
        vec![Operand::param(wt3), Operand::param(t4).swiz(&XYZ)],
    )?;
    let (v_tangent, v_tangent_in) = ctx.varying(Content::TangentWorld, ElementType::Float3)?;
    ctx.push_vs(
        Bucket::PreProcess,
        Opcode::Assign,
        vec![Operand::param(v_tangent), Operand::param(wt3)],
    )?;

    let t3 = ctx.fs_shared(Content::TangentWorld, ElementType::Float3)?;
    let b3 = ctx.fs_shared(Content::BinormalWorld, ElementType::Float3)?;
    ctx.push_fs(
        Bucket::Lighting,
        Opcode::Normalize,
        vec![Operand::param(t3), Operand::param(v_tangent_in)],
    )?;
    ctx.push_fs(
        Bucket::Lighting,
        Opcode::Cross,
        vec![
            Operand::param(b3),
            Operand::param(n3),
            Operand::param(t3),
        ],
    )?;

    let tmp = ctx.fs_local(ElementType::Float3);
    ctx.push_fs(
        Bucket::Lighting,
        Opcode::Multiply,
        vec![
            Operand::param(perturbed),
            Operand::param(t3),
            Operand::param(sampled).swiz(&[X]),
        ],
    )?;
    ctx.push_fs(
        Bucket::Lighting,
        Opcode::Multiply,
        vec![
            Operand::param(tmp),
            Operand::param(b3),
            Operand::param(sampled).swiz(&[Y]),
        ],
    )?;
    ctx.push_fs(
        Bucket::Lighting,
        Opcode::Add,
        vec![
            Operand::param(perturbed),
            Operand::param(perturbed),
            Operand::param(tmp),
        ],
    )?;
    ctx.push_fs(
        Bucket::Lighting,
        Opcode::Multiply,
        vec![
            Operand::param(tmp),
            Operand::param(n3),
            Operand::param(sampled).swiz(&[Z]),
        ],
    )?;
    ctx.push_fs(
        Bucket::Lighting,
        Opcode::Add,
        vec![
            Operand::param(perturbed),
            Operand::param(perturbed),
            Operand::param(tmp),
        ],
    )?;
    ctx.push_fs(
        Bucket::Lighting,
        Opcode::Normalize,
        vec![Operand::param(perturbed), Operand::param(perturbed)],
    )
}

/// Object-space maps carry the normal directly; rotate it into world space.
fn build_object_rotate(
    ctx: &mut BuildContext<'_>,
    sampled: ParamId,
    perturbed: ParamId,
) -> Result<()> {
    let world = ctx.uniform(AutoKey::WorldMatrix)?;
    let n4 = ctx.fs_local(ElementType::Float4);
    ctx.push_fs(
        Bucket::Lighting,
        Opcode::Assign,
        vec![Operand::param(n4).swiz(&XYZ), Operand::param(sampled)],
    )?;
    ctx.push_fs(
        Bucket::Lighting,
        Opcode::Assign,
        vec![Operand::param(n4).swiz(&[W]), Operand::literal(0.0)],
    )?;
    ctx.push_fs(
        Bucket::Lighting,
        Opcode::Multiply,
        vec![
            Operand::param(n4),
            Operand::param(world),
            Operand::param(n4),
        ],
    )?;
    ctx.push_fs(
        Bucket::Lighting,
        Opcode::Normalize,
        vec![Operand::param(perturbed), Operand::param(n4).swiz(&XYZ)],
    )
}
