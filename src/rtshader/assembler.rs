//! Render state assembly.
//!
//! Turns a pass descriptor, plus any scheme-level custom states, into the
//! ordered conflict-free state list one program pair is built from.
//! Explicitly requested states collide loudly when two of them claim the
//! same exclusive category; the fixed-function fill-in that follows only
//! takes categories nobody has claimed, so a custom lighting model cleanly
//! displaces the stock one.

use rustc_hash::FxHashSet;

use crate::core::light::LightCounts;
use crate::core::pass::{FogMode, Pass, ShaderEffect, ShadingModel};
use crate::errors::{LoreError, Result};
use crate::rtshader::program::ProgramSet;
use crate::rtshader::registry::ParamRegistry;
use crate::rtshader::srs::{BuildContext, LinkContext, SubRenderState};

/// Scheme-level state template. Everything added here is attached to every
/// pass generated under the scheme, ahead of the fixed-function fill-in.
#[derive(Debug, Clone, Default)]
pub struct RenderState {
    states: Vec<SubRenderState>,
}

impl RenderState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a custom state. Identical duplicates merge silently; clashes
    /// between different states surface at link time.
    pub fn add(&mut self, state: SubRenderState) {
        if !self.states.contains(&state) {
            self.states.push(state);
        }
    }

    #[must_use]
    pub fn states(&self) -> &[SubRenderState] {
        &self.states
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}

/// The assembled per-pass state list, sorted and prepared.
#[derive(Debug, Clone)]
pub struct TargetRenderState {
    states: Vec<SubRenderState>,
    link: LinkContext,
}

impl TargetRenderState {
    /// Assemble the state list for one pass.
    ///
    /// Order of attachment: scheme template, pass effects, fixed-function
    /// fill-in. The final list is sorted by execution order and run through
    /// the prepare pass so every state sees its neighbours' requirements.
    pub fn link(template: &[SubRenderState], pass: &Pass, lights: LightCounts) -> Result<Self> {
        let mut states: Vec<SubRenderState> = Vec::new();

        for state in template {
            Self::attach(&mut states, *state)?;
        }
        for effect in &pass.effects {
            let state = match *effect {
                ShaderEffect::NormalMap { unit, space } => {
                    // Perturbing the normal only matters on a lit pass.
                    if !pass.lighting {
                        continue;
                    }
                    SubRenderState::NormalMap { unit, space }
                }
                ShaderEffect::Triplanar {
                    units,
                    scale,
                    sharpness,
                } => SubRenderState::Triplanar {
                    units,
                    scale,
                    sharpness,
                },
            };
            Self::attach(&mut states, state)?;
        }

        Self::fill(&mut states, SubRenderState::Transform);
        Self::fill(&mut states, SubRenderState::VertexColour);
        if pass.skinning.is_some() {
            Self::fill(&mut states, SubRenderState::HardwareSkinning);
        }
        if pass.lighting && !lights.is_empty() {
            let stock = match pass.shading {
                ShadingModel::Phong => SubRenderState::PerPixelLighting,
                ShadingModel::Flat | ShadingModel::Gouraud => SubRenderState::PerVertexLighting,
            };
            Self::fill(&mut states, stock);
        }
        let claimed = claimed_units(&states);
        for unit in 0..pass.texture_units.len() {
            let unit = unit as u8;
            if !claimed.contains(&unit) {
                Self::fill(&mut states, SubRenderState::Texturing { unit });
            }
        }
        if pass.fog.mode != FogMode::None {
            Self::fill(&mut states, SubRenderState::Fog);
        }
        if pass.alpha_test.is_some() {
            Self::fill(&mut states, SubRenderState::AlphaTest);
        }

        // Stable, so same-order states keep their attachment sequence.
        states.sort_by_key(SubRenderState::execution_order);

        let mut link = LinkContext::default();
        for state in &states {
            state.prepare(pass, &mut link);
        }
        Ok(Self { states, link })
    }

    /// Attach an explicitly requested state. Identical duplicates merge; a
    /// different member of an exclusive category is a hard error.
    fn attach(states: &mut Vec<SubRenderState>, state: SubRenderState) -> Result<()> {
        if states.contains(&state) {
            return Ok(());
        }
        let category = state.category();
        if category.exclusive() {
            if let Some(existing) = states.iter().find(|s| s.category() == category) {
                return Err(LoreError::ConflictingSrs {
                    category,
                    kept: existing.name(),
                    rejected: state.name(),
                });
            }
        }
        states.push(state);
        Ok(())
    }

    /// Fixed-function fill-in. Never conflicts: an already claimed exclusive
    /// category means the stock state simply stays out.
    fn fill(states: &mut Vec<SubRenderState>, state: SubRenderState) {
        if states.contains(&state) {
            return;
        }
        let category = state.category();
        if category.exclusive() && states.iter().any(|s| s.category() == category) {
            return;
        }
        states.push(state);
    }

    #[must_use]
    pub fn states(&self) -> &[SubRenderState] {
        &self.states
    }

    #[must_use]
    pub fn link_context(&self) -> &LinkContext {
        &self.link
    }

    /// Run every state against the shared program set, in execution order.
    pub(crate) fn build(
        &self,
        pass: &Pass,
        lights: LightCounts,
        registry: &mut ParamRegistry,
        set: &mut ProgramSet,
    ) -> Result<()> {
        let mut ctx = BuildContext::new(pass, lights, registry, set, &self.link);
        for state in &self.states {
            state.build(&mut ctx)?;
        }
        Ok(())
    }
}

fn claimed_units(states: &[SubRenderState]) -> FxHashSet<u8> {
    let mut claimed = FxHashSet::default();
    for state in states {
        match state {
            SubRenderState::NormalMap { unit, .. } => {
                claimed.insert(*unit);
            }
            SubRenderState::Triplanar { units, .. } => claimed.extend(units.iter().copied()),
            _ => {}
        }
    }
    claimed
}
