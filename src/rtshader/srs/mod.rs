//! Sub-render states.
//!
//! Each sub-render state (SRS) owns one aspect of the fixed-function
//! pipeline and contributes parameters and atoms for it. Assembly sorts the
//! attached states by execution order, resolves conflicts, runs a prepare
//! pass so states can see what their neighbours need, then builds each one
//! into the shared [`ProgramSet`].
//!
//! States never call each other. They communicate through two channels: the
//! [`LinkContext`] flags written during prepare, and canonical parameters
//! (shared locals, varyings) resolved through the registry during build.

pub mod colour;
pub mod fog;
pub mod lighting;
pub mod normal_map;
pub mod skinning;
pub mod texturing;
pub mod transform;
pub mod triplanar;

use rustc_hash::FxHashSet;

use crate::core::light::LightCounts;
use crate::core::pass::{NormalMapSpace, Pass, TextureKind};
use crate::errors::Result;
use crate::rtshader::atom::{Atom, Comp, Opcode, Operand};
use crate::rtshader::function::Bucket;
use crate::rtshader::param::{AutoKey, Content, ElementType, ParamId};
use crate::rtshader::program::{ProgramSet, ProgramType};
use crate::rtshader::registry::ParamRegistry;

/// Functional category of a sub-render state. At most one member of an
/// exclusive category may survive assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SrsCategory {
    Skinning,
    Transform,
    Colour,
    Lighting,
    Texturing,
    Fog,
    AlphaTest,
}

impl SrsCategory {
    /// Texturing states stack (one per unit); everything else is exclusive.
    #[must_use]
    pub const fn exclusive(self) -> bool {
        !matches!(self, Self::Texturing)
    }
}

/// The sub-render state library. Everything the generator can attach to a
/// pass is one of these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubRenderState {
    /// Object-to-clip transform, skinning-aware.
    Transform,
    HardwareSkinning,
    /// Base colour plumbing and the final output write.
    VertexColour,
    PerVertexLighting,
    PerPixelLighting,
    NormalMap {
        unit: u8,
        space: NormalMapSpace,
    },
    /// Fixed-function blending of one texture layer.
    Texturing {
        unit: u8,
    },
    Triplanar {
        units: [u8; 3],
        scale: f32,
        sharpness: f32,
    },
    Fog,
    AlphaTest,
}

impl SubRenderState {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Transform => "ffp_transform",
            Self::HardwareSkinning => "hardware_skinning",
            Self::VertexColour => "ffp_colour",
            Self::PerVertexLighting => "ffp_lighting",
            Self::PerPixelLighting => "per_pixel_lighting",
            Self::NormalMap { .. } => "normal_map_lighting",
            Self::Texturing { .. } => "ffp_texturing",
            Self::Triplanar { .. } => "triplanar_texturing",
            Self::Fog => "ffp_fog",
            Self::AlphaTest => "alpha_test",
        }
    }

    #[must_use]
    pub const fn category(&self) -> SrsCategory {
        match self {
            Self::Transform => SrsCategory::Transform,
            Self::HardwareSkinning => SrsCategory::Skinning,
            Self::VertexColour => SrsCategory::Colour,
            Self::PerVertexLighting | Self::PerPixelLighting | Self::NormalMap { .. } => {
                SrsCategory::Lighting
            }
            Self::Texturing { .. } | Self::Triplanar { .. } => SrsCategory::Texturing,
            Self::Fog => SrsCategory::Fog,
            Self::AlphaTest => SrsCategory::AlphaTest,
        }
    }

    /// Position in the build sequence. Lower builds first; texturing units
    /// spread out so layers blend in unit order.
    #[must_use]
    pub const fn execution_order(&self) -> u32 {
        match self {
            Self::HardwareSkinning => 50,
            Self::Transform => 100,
            Self::VertexColour => 150,
            Self::PerVertexLighting | Self::PerPixelLighting | Self::NormalMap { .. } => 200,
            Self::Texturing { unit } => 300 + *unit as u32,
            Self::Triplanar { .. } => 360,
            Self::Fog => 400,
            Self::AlphaTest => 500,
        }
    }

    /// First pass over the sorted state list: publish requirements and
    /// claims before any atom is built.
    pub(crate) fn prepare(&self, pass: &Pass, link: &mut LinkContext) {
        match self {
            Self::HardwareSkinning => link.skinned = true,
            Self::PerVertexLighting => {
                link.needs_world_normal = true;
                if pass.surface.has_specular() {
                    link.separate_specular = true;
                }
            }
            Self::PerPixelLighting => link.needs_world_normal = true,
            Self::NormalMap { unit, .. } => {
                link.needs_world_normal = true;
                link.consumed_units.insert(*unit);
            }
            Self::Triplanar { units, .. } => {
                link.needs_world_normal = true;
                for unit in units {
                    link.consumed_units.insert(*unit);
                }
            }
            _ => {}
        }
    }

    /// Contribute this state's parameters and atoms.
    pub(crate) fn build(&self, ctx: &mut BuildContext<'_>) -> Result<()> {
        match self {
            Self::Transform => transform::build(ctx),
            Self::HardwareSkinning => skinning::build(ctx),
            Self::VertexColour => colour::build(ctx),
            Self::PerVertexLighting => lighting::build_per_vertex(ctx),
            Self::PerPixelLighting => lighting::build_per_pixel(ctx),
            Self::NormalMap { unit, space } => normal_map::build(ctx, *unit, *space),
            Self::Texturing { unit } => texturing::build(ctx, *unit),
            Self::Triplanar {
                units,
                scale,
                sharpness,
            } => triplanar::build(ctx, *units, *scale, *sharpness),
            Self::Fog => fog::build(ctx),
            Self::AlphaTest => alpha_test::build(ctx),
        }
    }
}

/// Cross-state requirements gathered before building.
#[derive(Debug, Clone, Default)]
pub struct LinkContext {
    /// Texture units claimed by an effect state; plain layer blending
    /// skips these.
    pub consumed_units: FxHashSet<u8>,
    pub skinned: bool,
    /// Some state wants the world-space normal in the vertex stage.
    pub needs_world_normal: bool,
    /// Per-vertex lighting routes its specular term through a second
    /// varying, re-applied after texturing.
    pub separate_specular: bool,
}

/// Everything a state needs while contributing to the program set.
pub struct BuildContext<'a> {
    pub pass: &'a Pass,
    pub lights: LightCounts,
    pub registry: &'a mut ParamRegistry,
    pub set: &'a mut ProgramSet,
    pub link: &'a LinkContext,
    computed: FxHashSet<(ProgramType, Content)>,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        pass: &'a Pass,
        lights: LightCounts,
        registry: &'a mut ParamRegistry,
        set: &'a mut ProgramSet,
        link: &'a LinkContext,
    ) -> Self {
        Self {
            pass,
            lights,
            registry,
            set,
            link,
            computed: FxHashSet::default(),
        }
    }

    /// True exactly once per `(stage, content)`; emitters use this to avoid
    /// computing a shared value twice.
    pub(crate) fn once(&mut self, stage: ProgramType, content: Content) -> bool {
        self.computed.insert((stage, content))
    }

    pub(crate) fn mark_computed(&mut self, stage: ProgramType, content: Content) {
        self.computed.insert((stage, content));
    }

    // ─── parameter plumbing ───

    pub fn vs_input(&mut self, content: Content, ty: ElementType) -> Result<ParamId> {
        let id = self.registry.vertex_input(content, ty)?;
        self.set.vertex.add_input(id);
        Ok(id)
    }

    /// The object-space position attribute, `w` fixed to 1 by the fetch.
    pub fn position_input(&mut self) -> Result<ParamId> {
        self.vs_input(Content::PositionObject, ElementType::Float4)
    }

    pub fn varying(&mut self, content: Content, ty: ElementType) -> Result<(ParamId, ParamId)> {
        let (out, inp) = self.registry.varying(content, ty)?;
        self.set.vertex.add_output(out);
        self.set.fragment.add_input(inp);
        Ok((out, inp))
    }

    pub fn clip_position(&mut self) -> Result<ParamId> {
        let id = self.registry.clip_position()?;
        self.set.vertex.add_output(id);
        Ok(id)
    }

    pub fn fragment_output(&mut self) -> Result<ParamId> {
        let id = self.registry.fragment_output()?;
        self.set.fragment.add_output(id);
        Ok(id)
    }

    pub fn uniform(&mut self, key: AutoKey) -> Result<ParamId> {
        self.registry.uniform_auto(key)
    }

    pub fn sampler(&mut self, unit: u8, kind: TextureKind) -> Result<ParamId> {
        self.registry.sampler(unit, kind)
    }

    pub fn vs_shared(&mut self, content: Content, ty: ElementType) -> Result<ParamId> {
        let id = self.registry.shared_local(ProgramType::Vertex, content, ty)?;
        self.set.vertex.add_local(id);
        Ok(id)
    }

    pub fn fs_shared(&mut self, content: Content, ty: ElementType) -> Result<ParamId> {
        let id = self
            .registry
            .shared_local(ProgramType::Fragment, content, ty)?;
        self.set.fragment.add_local(id);
        Ok(id)
    }

    /// The fragment colour pipe every blending state reads and writes.
    pub fn fs_colour(&mut self) -> Result<ParamId> {
        self.fs_shared(Content::ColourDiffuse, ElementType::Float4)
    }

    pub fn vs_local(&mut self, ty: ElementType) -> ParamId {
        let id = self.registry.local(ty);
        self.set.vertex.add_local(id);
        id
    }

    pub fn fs_local(&mut self, ty: ElementType) -> ParamId {
        let id = self.registry.local(ty);
        self.set.fragment.add_local(id);
        id
    }

    // ─── atom plumbing ───

    pub fn push_vs(&mut self, bucket: Bucket, opcode: Opcode, ops: Vec<Operand>) -> Result<()> {
        let atom = Atom::new(self.registry.pool(), opcode, ops)?;
        self.set.vertex.push(bucket, atom);
        Ok(())
    }

    pub fn push_fs(&mut self, bucket: Bucket, opcode: Opcode, ops: Vec<Operand>) -> Result<()> {
        let atom = Atom::new(self.registry.pool(), opcode, ops)?;
        self.set.fragment.push(bucket, atom);
        Ok(())
    }

    // ─── shared value emitters ───
    //
    // Each resolves the canonical parameter and, the first time it is asked
    // for, appends the atoms that compute it to the PreProcess bucket. When
    // skinning is attached it owns the world position and (on demand) the
    // world normal; it marks them computed before anyone else asks.

    /// World-space position as a `float4` vertex local.
    pub fn ensure_world_position_vs(&mut self) -> Result<ParamId> {
        let wp4 = self.vs_shared(Content::PositionWorld, ElementType::Float4)?;
        if self.once(ProgramType::Vertex, Content::PositionWorld) {
            let world = self.uniform(AutoKey::WorldMatrix)?;
            let pos = self.position_input()?;
            self.push_vs(
                Bucket::PreProcess,
                Opcode::Multiply,
                vec![
                    Operand::param(wp4),
                    Operand::param(world),
                    Operand::param(pos),
                ],
            )?;
        }
        Ok(wp4)
    }

    /// Normalised world-space normal as a `float3` vertex local.
    pub fn ensure_world_normal_vs(&mut self) -> Result<ParamId> {
        let wn3 = self.vs_shared(Content::NormalWorld, ElementType::Float3)?;
        if self.once(ProgramType::Vertex, Content::NormalWorld) {
            let itw = self.uniform(AutoKey::InvTransWorldMatrix)?;
            let normal = self.vs_input(Content::NormalObject, ElementType::Float3)?;
            let n4 = self.vs_local(ElementType::Float4);
            self.push_vs(
                Bucket::PreProcess,
                Opcode::Assign,
                vec![
                    Operand::param(n4).swiz(&[Comp::X, Comp::Y, Comp::Z]),
                    Operand::param(normal),
                ],
            )?;
            self.push_vs(
                Bucket::PreProcess,
                Opcode::Assign,
                vec![Operand::param(n4).swiz(&[Comp::W]), Operand::literal(0.0)],
            )?;
            self.push_vs(
                Bucket::PreProcess,
                Opcode::Multiply,
                vec![
                    Operand::param(n4),
                    Operand::param(itw),
                    Operand::param(n4),
                ],
            )?;
            self.push_vs(
                Bucket::PreProcess,
                Opcode::Normalize,
                vec![
                    Operand::param(wn3),
                    Operand::param(n4).swiz(&[Comp::X, Comp::Y, Comp::Z]),
                ],
            )?;
        }
        Ok(wn3)
    }

    /// View-space position as a `float4` vertex local, for depth reads.
    pub fn ensure_view_position_vs(&mut self) -> Result<ParamId> {
        let vp4 = self.vs_shared(Content::PositionView, ElementType::Float4)?;
        if self.once(ProgramType::Vertex, Content::PositionView) {
            if self.link.skinned {
                let wp4 = self.ensure_world_position_vs()?;
                let view = self.uniform(AutoKey::ViewMatrix)?;
                self.push_vs(
                    Bucket::PreProcess,
                    Opcode::Multiply,
                    vec![
                        Operand::param(vp4),
                        Operand::param(view),
                        Operand::param(wp4),
                    ],
                )?;
            } else {
                let wv = self.uniform(AutoKey::WorldViewMatrix)?;
                let pos = self.position_input()?;
                self.push_vs(
                    Bucket::PreProcess,
                    Opcode::Multiply,
                    vec![
                        Operand::param(vp4),
                        Operand::param(wv),
                        Operand::param(pos),
                    ],
                )?;
            }
        }
        Ok(vp4)
    }

    /// World-space position in the fragment stage, via a `float3` varying.
    pub fn ensure_world_position_fs(&mut self) -> Result<ParamId> {
        let (out, inp) = self.varying(Content::PositionWorld, ElementType::Float3)?;
        if self.once(ProgramType::Fragment, Content::PositionWorld) {
            let wp4 = self.ensure_world_position_vs()?;
            self.push_vs(
                Bucket::PreProcess,
                Opcode::Assign,
                vec![
                    Operand::param(out),
                    Operand::param(wp4).swiz(&[Comp::X, Comp::Y, Comp::Z]),
                ],
            )?;
        }
        Ok(inp)
    }

    /// Normalised world-space normal in the fragment stage.
    pub fn ensure_world_normal_fs(&mut self) -> Result<ParamId> {
        let n3 = self.fs_shared(Content::NormalWorld, ElementType::Float3)?;
        if self.once(ProgramType::Fragment, Content::NormalWorld) {
            let (out, inp) = self.varying(Content::NormalWorld, ElementType::Float3)?;
            let wn3 = self.ensure_world_normal_vs()?;
            self.push_vs(
                Bucket::PreProcess,
                Opcode::Assign,
                vec![Operand::param(out), Operand::param(wn3)],
            )?;
            // Interpolation denormalises; renormalise before use.
            self.push_fs(
                Bucket::PreProcess,
                Opcode::Normalize,
                vec![Operand::param(n3), Operand::param(inp)],
            )?;
        }
        Ok(n3)
    }
}
