//! Fixed-function lighting.
//!
//! One equation emitter serves three attachment styles: per-vertex (result
//! lands in the colour varying), per-pixel (result lands in the fragment
//! colour pipe) and normal-mapped (per-pixel with a caller-supplied normal).
//! Lights are unrolled per entry of the packed light arrays, so the emitted
//! code contains no loops and the program changes when the population does.
//!
//! The equation is classic Blinn-Phong in world space: `emissive +
//! ambient_light * ambient + sum(diffuse_i) + sum(specular_i)`, with
//! polynomial distance attenuation for point and spot lights and a smooth
//! cone falloff for spots.

use crate::core::light::LightType;
use crate::core::pass::ColourTracking;
use crate::errors::Result;
use crate::rtshader::atom::{ArrayIndex, Comp, Opcode, Operand};
use crate::rtshader::function::Bucket;
use crate::rtshader::param::{AutoKey, Content, ElementType, ParamId};
use crate::rtshader::program::ProgramType;
use crate::rtshader::srs::BuildContext;

use Comp::{W, X, Y, Z};

const XYZ: [Comp; 3] = [X, Y, Z];

/// Where the specular sum goes.
enum SpecMode {
    /// No specular term at all.
    Off,
    /// Into a dedicated varying, re-applied after texturing.
    Separate(ParamId),
    /// Folded into the diffuse accumulator before write-back.
    Inline,
}

/// Per-stage surface colour sources, honouring colour tracking.
struct Sources {
    ambient: Operand,
    diffuse: Operand,
    specular: Operand,
    emissive: Operand,
    /// Alpha for the final colour, one component.
    alpha: Operand,
}

pub(crate) fn build_per_vertex(ctx: &mut BuildContext<'_>) -> Result<()> {
    let normal = ctx.ensure_world_normal_vs()?;

    let spec = if ctx.link.separate_specular {
        let (v_spec, v_spec_in) = ctx.varying(Content::ColourSpecular, ElementType::Float4)?;
        // Re-apply after texturing, ahead of any fog blend.
        let t_colour = ctx.fs_colour()?;
        ctx.push_fs(
            Bucket::Fog,
            Opcode::Add,
            vec![
                Operand::param(t_colour).swiz(&XYZ),
                Operand::param(t_colour).swiz(&XYZ),
                Operand::param(v_spec_in).swiz(&XYZ),
            ],
        )?;
        SpecMode::Separate(v_spec)
    } else {
        SpecMode::Off
    };

    let (v_colour, _) = ctx.varying(Content::ColourDiffuse, ElementType::Float4)?;
    let sources = vertex_sources(ctx)?;
    emit_equation(ctx, ProgramType::Vertex, normal, v_colour, spec, sources)
}

pub(crate) fn build_per_pixel(ctx: &mut BuildContext<'_>) -> Result<()> {
    let normal = ctx.ensure_world_normal_fs()?;
    let target = ctx.fs_colour()?;
    let spec = if ctx.pass.surface.has_specular() {
        SpecMode::Inline
    } else {
        SpecMode::Off
    };
    let sources = fragment_sources(ctx)?;
    emit_equation(ctx, ProgramType::Fragment, normal, target, spec, sources)
}

/// Per-pixel evaluation with a normal supplied by the caller (normal
/// mapping perturbs it before lighting).
pub(crate) fn build_with_normal(ctx: &mut BuildContext<'_>, normal: ParamId) -> Result<()> {
    let target = ctx.fs_colour()?;
    let spec = if ctx.pass.surface.has_specular() {
        SpecMode::Inline
    } else {
        SpecMode::Off
    };
    let sources = fragment_sources(ctx)?;
    emit_equation(ctx, ProgramType::Fragment, normal, target, spec, sources)
}

fn vertex_sources(ctx: &mut BuildContext<'_>) -> Result<Sources> {
    let tracking = ctx.pass.colour_tracking;
    let tracked = if tracking.is_empty() {
        None
    } else {
        Some(ctx.vs_input(Content::ColourDiffuse, ElementType::Float4)?)
    };
    sources_with(ctx, tracking, tracked)
}

fn fragment_sources(ctx: &mut BuildContext<'_>) -> Result<Sources> {
    let tracking = ctx.pass.colour_tracking;
    // The colour pipe still holds the interpolated base colour here; the
    // equation reads it before overwriting.
    let tracked = if tracking.is_empty() {
        None
    } else {
        Some(ctx.fs_colour()?)
    };
    sources_with(ctx, tracking, tracked)
}

fn sources_with(
    ctx: &mut BuildContext<'_>,
    tracking: ColourTracking,
    tracked: Option<ParamId>,
) -> Result<Sources> {
    let pick = |ctx: &mut BuildContext<'_>, flag: ColourTracking, key: AutoKey| -> Result<Operand> {
        match tracked {
            Some(id) if tracking.contains(flag) => Ok(Operand::param(id)),
            _ => Ok(Operand::param(ctx.uniform(key)?)),
        }
    };
    let ambient = pick(ctx, ColourTracking::AMBIENT, AutoKey::SurfaceAmbient)?;
    let diffuse = pick(ctx, ColourTracking::DIFFUSE, AutoKey::SurfaceDiffuse)?;
    let specular = pick(ctx, ColourTracking::SPECULAR, AutoKey::SurfaceSpecular)?;
    let emissive = pick(ctx, ColourTracking::EMISSIVE, AutoKey::SurfaceEmissive)?;
    let alpha = diffuse.clone().swiz(&[W]);
    Ok(Sources {
        ambient: ambient.swiz(&XYZ),
        diffuse: diffuse.swiz(&XYZ),
        specular: specular.swiz(&XYZ),
        emissive: emissive.swiz(&XYZ),
        alpha,
    })
}

fn emit_equation(
    ctx: &mut BuildContext<'_>,
    stage: ProgramType,
    normal: ParamId,
    target: ParamId,
    spec: SpecMode,
    sources: Sources,
) -> Result<()> {
    let lights = ctx.lights;
    let spec_on = !matches!(spec, SpecMode::Off);
    let needs_pos = lights.point + lights.spot > 0 || (spec_on && !lights.is_empty());

    let world_pos: Option<Operand> = if needs_pos {
        Some(match stage {
            ProgramType::Vertex => {
                let wp4 = ctx.ensure_world_position_vs()?;
                Operand::param(wp4).swiz(&XYZ)
            }
            ProgramType::Fragment => {
                let wp3 = ctx.ensure_world_position_fs()?;
                Operand::param(wp3)
            }
        })
    } else {
        None
    };

    let mut push = |ctx: &mut BuildContext<'_>, op: Opcode, ops: Vec<Operand>| match stage {
        ProgramType::Vertex => ctx.push_vs(Bucket::Lighting, op, ops),
        ProgramType::Fragment => ctx.push_fs(Bucket::Lighting, op, ops),
    };
    let local = |ctx: &mut BuildContext<'_>, ty: ElementType| match stage {
        ProgramType::Vertex => ctx.vs_local(ty),
        ProgramType::Fragment => ctx.fs_local(ty),
    };

    // acc = ambient_light * ambient + emissive
    let ambient_light = ctx.uniform(AutoKey::AmbientLightColour)?;
    let acc = local(ctx, ElementType::Float3);
    push(
        ctx,
        Opcode::Multiply,
        vec![
            Operand::param(acc),
            Operand::param(ambient_light).swiz(&XYZ),
            sources.ambient.clone(),
        ],
    )?;
    push(
        ctx,
        Opcode::Add,
        vec![
            Operand::param(acc),
            Operand::param(acc),
            sources.emissive.clone(),
        ],
    )?;

    let spec_acc = if spec_on {
        let id = local(ctx, ElementType::Float3);
        push(
            ctx,
            Opcode::Assign,
            vec![Operand::param(id), Operand::literal(0.0)],
        )?;
        Some(id)
    } else {
        None
    };

    if !lights.is_empty() {
        let positions = if lights.point + lights.spot > 0 {
            Some(ctx.uniform(AutoKey::LightPositionArray)?)
        } else {
            None
        };
        let directions = if lights.directional + lights.spot > 0 {
            Some(ctx.uniform(AutoKey::LightDirectionArray)?)
        } else {
            None
        };
        let diffuse_arr = ctx.uniform(AutoKey::LightDiffuseArray)?;
        let specular_arr = if spec_on {
            Some(ctx.uniform(AutoKey::LightSpecularArray)?)
        } else {
            None
        };
        let atten_arr = if lights.point + lights.spot > 0 {
            Some(ctx.uniform(AutoKey::LightAttenuationArray)?)
        } else {
            None
        };
        let spot_arr = if lights.spot > 0 {
            Some(ctx.uniform(AutoKey::SpotParamsArray)?)
        } else {
            None
        };
        let view_dir = if spec_on {
            let camera = ctx.uniform(AutoKey::CameraPositionWorld)?;
            let v3 = local(ctx, ElementType::Float3);
            let pos = world_pos.clone().ok_or_else(unreachable_arrays)?;
            push(
                ctx,
                Opcode::Subtract,
                vec![Operand::param(v3), Operand::param(camera), pos],
            )?;
            push(
                ctx,
                Opcode::Normalize,
                vec![Operand::param(v3), Operand::param(v3)],
            )?;
            Some(v3)
        } else {
            None
        };

        let shininess = if spec_on {
            Some(ctx.uniform(AutoKey::SurfaceShininess)?)
        } else {
            None
        };

        // Shared scratch, reused by every unrolled light. Unused ones are
        // pruned with the rest of the dead declarations.
        let l3 = local(ctx, ElementType::Float3);
        let ndl = local(ctx, ElementType::Float);
        let term = local(ctx, ElementType::Float3);
        let dist = local(ctx, ElementType::Float);
        let atten = local(ctx, ElementType::Float);
        let scratch = local(ctx, ElementType::Float);
        let sd3 = local(ctx, ElementType::Float3);
        let rho = local(ctx, ElementType::Float);
        let h3 = local(ctx, ElementType::Float3);
        let ndh = local(ctx, ElementType::Float);

        for (index, light_type) in lights.iter() {
            let at = ArrayIndex::Literal(index);
            let has_atten = light_type != LightType::Directional;

            match light_type {
                LightType::Directional => {
                    let dir = directions.ok_or_else(unreachable_arrays)?;
                    push(
                        ctx,
                        Opcode::Normalize,
                        vec![
                            Operand::param(l3),
                            Operand::param(dir).at(at).swiz(&XYZ),
                        ],
                    )?;
                    push(
                        ctx,
                        Opcode::Subtract,
                        vec![
                            Operand::param(l3),
                            Operand::literal(0.0),
                            Operand::param(l3),
                        ],
                    )?;
                }
                LightType::Point | LightType::Spot => {
                    let posarr = positions.ok_or_else(unreachable_arrays)?;
                    let wp = world_pos.clone().ok_or_else(unreachable_arrays)?;
                    push(
                        ctx,
                        Opcode::Subtract,
                        vec![
                            Operand::param(l3),
                            Operand::param(posarr).at(at).swiz(&XYZ),
                            wp,
                        ],
                    )?;
                    push(
                        ctx,
                        Opcode::Length,
                        vec![Operand::param(dist), Operand::param(l3)],
                    )?;
                    push(
                        ctx,
                        Opcode::Normalize,
                        vec![Operand::param(l3), Operand::param(l3)],
                    )?;
                }
            }

            // ndl = max(dot(N, L), 0)
            push(
                ctx,
                Opcode::Dot,
                vec![
                    Operand::param(ndl),
                    Operand::param(normal),
                    Operand::param(l3),
                ],
            )?;
            push(
                ctx,
                Opcode::Max,
                vec![
                    Operand::param(ndl),
                    Operand::param(ndl),
                    Operand::literal(0.0),
                ],
            )?;

            if has_atten {
                let att_arr = atten_arr.ok_or_else(unreachable_arrays)?;
                // atten = 1 / (const + linear*d + quadratic*d^2)
                push(
                    ctx,
                    Opcode::Multiply,
                    vec![
                        Operand::param(atten),
                        Operand::param(att_arr).at(at).swiz(&[Z]),
                        Operand::param(dist),
                    ],
                )?;
                push(
                    ctx,
                    Opcode::Add,
                    vec![
                        Operand::param(atten),
                        Operand::param(atten),
                        Operand::param(att_arr).at(at).swiz(&[Y]),
                    ],
                )?;
                push(
                    ctx,
                    Opcode::Multiply,
                    vec![
                        Operand::param(scratch),
                        Operand::param(dist),
                        Operand::param(dist),
                    ],
                )?;
                push(
                    ctx,
                    Opcode::Multiply,
                    vec![
                        Operand::param(scratch),
                        Operand::param(scratch),
                        Operand::param(att_arr).at(at).swiz(&[W]),
                    ],
                )?;
                push(
                    ctx,
                    Opcode::Add,
                    vec![
                        Operand::param(atten),
                        Operand::param(atten),
                        Operand::param(scratch),
                    ],
                )?;
                push(
                    ctx,
                    Opcode::Divide,
                    vec![
                        Operand::param(atten),
                        Operand::literal(1.0),
                        Operand::param(atten),
                    ],
                )?;
            }

            if light_type == LightType::Spot {
                let dir = directions.ok_or_else(unreachable_arrays)?;
                let spot = spot_arr.ok_or_else(unreachable_arrays)?;
                push(
                    ctx,
                    Opcode::Normalize,
                    vec![
                        Operand::param(sd3),
                        Operand::param(dir).at(at).swiz(&XYZ),
                    ],
                )?;
                // rho = dot(-L, spot_axis); L points surface-to-light, the
                // axis points light-into-scene.
                push(
                    ctx,
                    Opcode::Dot,
                    vec![
                        Operand::param(rho),
                        Operand::param(l3),
                        Operand::param(sd3),
                    ],
                )?;
                push(
                    ctx,
                    Opcode::Subtract,
                    vec![
                        Operand::param(rho),
                        Operand::literal(0.0),
                        Operand::param(rho),
                    ],
                )?;
                // factor = pow(clamp((rho - cos_outer) / (cos_inner - cos_outer), 0, 1), falloff)
                push(
                    ctx,
                    Opcode::Subtract,
                    vec![
                        Operand::param(scratch),
                        Operand::param(spot).at(at).swiz(&[X]),
                        Operand::param(spot).at(at).swiz(&[Y]),
                    ],
                )?;
                push(
                    ctx,
                    Opcode::Subtract,
                    vec![
                        Operand::param(rho),
                        Operand::param(rho),
                        Operand::param(spot).at(at).swiz(&[Y]),
                    ],
                )?;
                push(
                    ctx,
                    Opcode::Divide,
                    vec![
                        Operand::param(rho),
                        Operand::param(rho),
                        Operand::param(scratch),
                    ],
                )?;
                push(
                    ctx,
                    Opcode::Clamp,
                    vec![
                        Operand::param(rho),
                        Operand::param(rho),
                        Operand::literal(0.0),
                        Operand::literal(1.0),
                    ],
                )?;
                push(
                    ctx,
                    Opcode::Pow,
                    vec![
                        Operand::param(rho),
                        Operand::param(rho),
                        Operand::param(spot).at(at).swiz(&[Z]),
                    ],
                )?;
                push(
                    ctx,
                    Opcode::Multiply,
                    vec![
                        Operand::param(atten),
                        Operand::param(atten),
                        Operand::param(rho),
                    ],
                )?;
            }

            // term = light_diffuse * surface_diffuse * ndl [* atten]
            push(
                ctx,
                Opcode::Multiply,
                vec![
                    Operand::param(term),
                    Operand::param(diffuse_arr).at(at).swiz(&XYZ),
                    sources.diffuse.clone(),
                ],
            )?;
            push(
                ctx,
                Opcode::Multiply,
                vec![
                    Operand::param(term),
                    Operand::param(term),
                    Operand::param(ndl),
                ],
            )?;
            if has_atten {
                push(
                    ctx,
                    Opcode::Multiply,
                    vec![
                        Operand::param(term),
                        Operand::param(term),
                        Operand::param(atten),
                    ],
                )?;
            }
            push(
                ctx,
                Opcode::Add,
                vec![
                    Operand::param(acc),
                    Operand::param(acc),
                    Operand::param(term),
                ],
            )?;

            if let (Some(spec_acc), Some(specular_arr), Some(view_dir), Some(shininess)) =
                (spec_acc, specular_arr, view_dir, shininess)
            {
                push(
                    ctx,
                    Opcode::Add,
                    vec![
                        Operand::param(h3),
                        Operand::param(l3),
                        Operand::param(view_dir),
                    ],
                )?;
                push(
                    ctx,
                    Opcode::Normalize,
                    vec![Operand::param(h3), Operand::param(h3)],
                )?;
                push(
                    ctx,
                    Opcode::Dot,
                    vec![
                        Operand::param(ndh),
                        Operand::param(normal),
                        Operand::param(h3),
                    ],
                )?;
                push(
                    ctx,
                    Opcode::Max,
                    vec![
                        Operand::param(ndh),
                        Operand::param(ndh),
                        Operand::literal(0.0),
                    ],
                )?;
                push(
                    ctx,
                    Opcode::Pow,
                    vec![
                        Operand::param(ndh),
                        Operand::param(ndh),
                        Operand::param(shininess),
                    ],
                )?;
                push(
                    ctx,
                    Opcode::Multiply,
                    vec![
                        Operand::param(h3),
                        Operand::param(specular_arr).at(at).swiz(&XYZ),
                        sources.specular.clone(),
                    ],
                )?;
                push(
                    ctx,
                    Opcode::Multiply,
                    vec![
                        Operand::param(h3),
                        Operand::param(h3),
                        Operand::param(ndh),
                    ],
                )?;
                if has_atten {
                    push(
                        ctx,
                        Opcode::Multiply,
                        vec![
                            Operand::param(h3),
                            Operand::param(h3),
                            Operand::param(atten),
                        ],
                    )?;
                }
                push(
                    ctx,
                    Opcode::Add,
                    vec![
                        Operand::param(spec_acc),
                        Operand::param(spec_acc),
                        Operand::param(h3),
                    ],
                )?;
            }
        }
    }

    // Write back: clamped colour plus the surface alpha.
    if let (SpecMode::Inline, Some(spec_acc)) = (&spec, spec_acc) {
        push(
            ctx,
            Opcode::Add,
            vec![
                Operand::param(acc),
                Operand::param(acc),
                Operand::param(spec_acc),
            ],
        )?;
    }
    push(
        ctx,
        Opcode::Clamp,
        vec![
            Operand::param(acc),
            Operand::param(acc),
            Operand::literal(0.0),
            Operand::literal(1.0),
        ],
    )?;
    push(
        ctx,
        Opcode::Assign,
        vec![Operand::param(target).swiz(&XYZ), Operand::param(acc)],
    )?;
    push(
        ctx,
        Opcode::Assign,
        vec![Operand::param(target).swiz(&[W]), sources.alpha.clone()],
    )?;

    if let (SpecMode::Separate(v_spec), Some(spec_acc)) = (&spec, spec_acc) {
        push(
            ctx,
            Opcode::Clamp,
            vec![
                Operand::param(spec_acc),
                Operand::param(spec_acc),
                Operand::literal(0.0),
                Operand::literal(1.0),
            ],
        )?;
        push(
            ctx,
            Opcode::Assign,
            vec![
                Operand::param(*v_spec).swiz(&XYZ),
                Operand::param(spec_acc),
            ],
        )?;
        push(
            ctx,
            Opcode::Assign,
            vec![Operand::param(*v_spec).swiz(&[W]), Operand::literal(0.0)],
        )?;
    }
    Ok(())
}

fn unreachable_arrays() -> crate::errors::LoreError {
    crate::errors::LoreError::TypeMismatch {
        site: "lighting",
        detail: "light array resolved inconsistently with the population".into(),
    }
}
