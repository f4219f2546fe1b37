//! Target processing.
//!
//! Runs between assembly and writing. Two jobs: fold the loose varyings
//! into four-wide interpolator rows (every target, every time, so output
//! never depends on how generous the driver is), and hand out constant and
//! sampler registers on targets that address uniforms by register.
//!
//! Packing is first-fit over a fixed importance order, not declaration
//! order. Importance comes from [`Content::pack_rank`], ties broken by
//! declaration index, which keeps the row layout stable across runs and
//! across unrelated edits to build order inside one rank.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::core::caps::DriverCaps;
use crate::errors::{LoreError, Result};
use crate::rtshader::atom::{Comp, OperandKind};
use crate::rtshader::function::Function;
use crate::rtshader::param::{AutoKey, Content, ElementType, ParamClass, ParamId, Parameter};
use crate::rtshader::program::ProgramSet;
use crate::rtshader::writer::TargetLanguage;
use crate::utils::interner;

const COMPS: [Comp; 4] = [Comp::X, Comp::Y, Comp::Z, Comp::W];

/// GLSL ES precision class of one declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precision {
    Lowp,
    Mediump,
    Highp,
}

impl Precision {
    /// Class for a parameter, `None` for types precision does not apply
    /// to. Positions and matrices need the full range, samplers feed
    /// normalised texel data, everything else interpolates fine at half
    /// precision.
    #[must_use]
    pub fn of(param: &Parameter) -> Option<Self> {
        if param.ty.is_sampler() {
            return Some(Self::Lowp);
        }
        if param.ty.is_matrix() {
            return Some(Self::Highp);
        }
        if !param.ty.is_float() {
            return None;
        }
        let positional = matches!(
            param.content,
            Some(
                Content::PositionObject
                    | Content::PositionWorld
                    | Content::PositionView
                    | Content::PositionProjective
            )
        ) || matches!(
            param.auto,
            Some(AutoKey::CameraPositionWorld | AutoKey::LightPositionArray)
        );
        Some(if positional {
            Self::Highp
        } else {
            Self::Mediump
        })
    }

    /// Declaration prefix including the trailing space.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Lowp => "lowp ",
            Self::Mediump => "mediump ",
            Self::Highp => "highp ",
        }
    }
}

/// Per-stage register assignments plus packing stats.
#[derive(Debug, Default)]
pub struct ProcessOutput {
    /// Constant and sampler registers for the vertex stage. Empty on
    /// targets that bind by name.
    pub vertex_registers: FxHashMap<ParamId, u16>,
    pub fragment_registers: FxHashMap<ParamId, u16>,
    /// Precision class per declared parameter. Filled for GLSL ES only;
    /// other targets leave declarations unqualified.
    pub precisions: FxHashMap<ParamId, Precision>,
    /// Interpolator rows in use after packing.
    pub packed_slots: u32,
}

/// Rewrites one [`ProgramSet`] for a concrete target language.
#[derive(Debug)]
pub struct ProgramProcessor {
    language: TargetLanguage,
    caps: DriverCaps,
}

impl ProgramProcessor {
    #[must_use]
    pub fn new(language: TargetLanguage, caps: DriverCaps) -> Self {
        Self { language, caps }
    }

    pub fn process(&self, set: &mut ProgramSet) -> Result<ProcessOutput> {
        let (packed_slots, row_precisions) = compact_varyings(set, self.caps.max_varying_slots)?;

        let mut out = ProcessOutput {
            packed_slots,
            ..ProcessOutput::default()
        };
        match self.language {
            TargetLanguage::Hlsl => {
                out.vertex_registers = allocate_registers(set, &set.vertex);
                out.fragment_registers = allocate_registers(set, &set.fragment);
            }
            TargetLanguage::GlslEs => {
                for (id, param) in set.pool.iter() {
                    if let Some(precision) = Precision::of(param) {
                        out.precisions.insert(id, precision);
                    }
                }
                // Packed rows take the widest class of their members, so a
                // row carrying a position window keeps the full range.
                out.precisions.extend(row_precisions);
            }
            TargetLanguage::Glsl => {}
        }
        Ok(out)
    }
}

/// First-fit packing of every user varying into `float4` rows.
///
/// The clip position is driver-owned and exempt. Each packed varying turns
/// into a component window of a `v_pack{n}` row; every reference in both
/// stages is rewritten with its swizzles composed through that window.
///
/// Returns the row count and the precision class of each pack row, the
/// widest class over the row's members.
pub(crate) fn compact_varyings(
    set: &mut ProgramSet,
    budget: u32,
) -> Result<(u32, FxHashMap<ParamId, Precision>)> {
    let mut candidates: Vec<(usize, ParamId)> = Vec::new();
    for (index, id) in set.vertex.outputs().iter().enumerate() {
        if set.pool.get(*id).content == Some(Content::PositionProjective) {
            continue;
        }
        candidates.push((index, *id));
    }
    if candidates.is_empty() {
        return Ok((0, FxHashMap::default()));
    }
    candidates.sort_by_key(|(index, id)| {
        let rank = set
            .pool
            .get(*id)
            .content
            .map_or(300, Content::pack_rank);
        (rank, *index)
    });

    // Components used per row; rows fill left to right so a window is
    // always contiguous.
    let mut rows: Vec<u8> = Vec::new();
    let mut row_class: Vec<Precision> = Vec::new();
    let mut placements: Vec<(ParamId, usize, u8, u8)> = Vec::new();
    for (_, id) in &candidates {
        let param = set.pool.get(*id);
        let width = param.ty.width().unwrap_or(4);
        let class = Precision::of(param).unwrap_or(Precision::Mediump);
        let row = match rows.iter().position(|used| used + width <= 4) {
            Some(row) => row,
            None => {
                rows.push(0);
                row_class.push(class);
                rows.len() - 1
            }
        };
        let offset = rows[row];
        rows[row] += width;
        row_class[row] = row_class[row].max(class);
        placements.push((*id, row, offset, width));
    }

    let needed = rows.len() as u32;
    if needed > budget {
        return Err(LoreError::VaryingOverflow { needed, budget });
    }

    let mut precisions = FxHashMap::default();
    let mut pack_out = Vec::with_capacity(rows.len());
    let mut pack_in = Vec::with_capacity(rows.len());
    for row in 0..rows.len() {
        let name = interner::intern(&format!("v_pack{row}"));
        let out = set.pool.alloc(Parameter {
            name,
            class: ParamClass::VertexOutput,
            ty: ElementType::Float4,
            content: None,
            auto: None,
            array_len: None,
        });
        let inp = set.pool.alloc(Parameter {
            name,
            class: ParamClass::FragmentInput,
            ty: ElementType::Float4,
            content: None,
            auto: None,
            array_len: None,
        });
        precisions.insert(out, row_class[row]);
        precisions.insert(inp, row_class[row]);
        pack_out.push(out);
        pack_in.push(inp);
    }

    for (vs_out, row, offset, width) in placements {
        let window = &COMPS[offset as usize..(offset + width) as usize];
        rewrite_stage(&mut set.vertex, vs_out, pack_out[row], window);

        let name = set.pool.get(vs_out).name;
        let fs_in = set
            .fragment
            .inputs()
            .iter()
            .copied()
            .find(|id| set.pool.get(*id).name == name);
        if let Some(fs_in) = fs_in {
            rewrite_stage(&mut set.fragment, fs_in, pack_in[row], window);
        }
    }
    Ok((needed, precisions))
}

/// Redirect every reference to `from` onto `to` seen through `window`,
/// then fix the declaration lists.
fn rewrite_stage(function: &mut Function, from: ParamId, to: ParamId, window: &[Comp]) {
    for atom in function.atoms_mut() {
        for operand in &mut atom.operands {
            if operand.kind == OperandKind::Param(from) {
                operand.kind = OperandKind::Param(to);
                operand.swizzle = compose(window, &operand.swizzle);
            }
        }
    }
    // Atoms are already rewritten; this only merges the declaration lists.
    function.replace_param(from, to);
}

fn compose(window: &[Comp], old: &SmallVec<[Comp; 4]>) -> SmallVec<[Comp; 4]> {
    if old.is_empty() {
        if window.len() == 4 {
            SmallVec::new()
        } else {
            SmallVec::from_slice(window)
        }
    } else {
        old.iter().map(|c| window[usize::from(c.index())]).collect()
    }
}

/// Shader model 3 style register assignment, pool order. Matrices take one
/// `c` register per row; samplers count in their own `s` space.
fn allocate_registers(set: &ProgramSet, function: &Function) -> FxHashMap<ParamId, u16> {
    let used = function.params_used();
    let mut map = FxHashMap::default();
    let mut next_c: u16 = 0;
    let mut next_s: u16 = 0;
    for (id, param) in set.pool.iter() {
        if param.class != ParamClass::Uniform || !used.contains(&id) {
            continue;
        }
        if param.ty.is_sampler() {
            map.insert(id, next_s);
            next_s += 1;
        } else {
            map.insert(id, next_c);
            let rows: u16 = match param.ty {
                ElementType::Mat4 => 4,
                ElementType::Mat3 => 3,
                _ => 1,
            };
            next_c += rows * param.array_len.unwrap_or(1) as u16;
        }
    }
    map
}
