//! Parameter registry.
//!
//! One registry lives for the duration of a single program-set build. It
//! owns the [`ParamPool`] and guarantees that every `(class, content)` pair,
//! auto-bind key and sampler unit maps to exactly one parameter, so two
//! sub-render states asking for "the world normal varying" are handed the
//! same id. Naming is fixed here and nowhere else: `a_` vertex inputs, `v_`
//! varyings, `u_` uniforms, `t_` shared locals, `o_color` for the fragment
//! output.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::core::light::LightCounts;
use crate::core::pass::TextureKind;
use crate::errors::{LoreError, Result};
use crate::rtshader::param::{
    AutoKey, AutoKind, Content, ElementType, ParamClass, ParamId, ParamPool, Parameter,
};
use crate::rtshader::program::ProgramType;
use crate::utils::interner::{self, Symbol};

/// Which auto-bind families the host can feed. All families are available
/// unless explicitly disabled.
#[derive(Debug, Clone, Default)]
pub struct AutoBindTable {
    disabled: FxHashSet<AutoKind>,
}

impl AutoBindTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disable(&mut self, kind: AutoKind) {
        self.disabled.insert(kind);
    }

    pub fn enable(&mut self, kind: AutoKind) {
        self.disabled.remove(&kind);
    }

    #[must_use]
    pub fn supports(&self, kind: AutoKind) -> bool {
        !self.disabled.contains(&kind)
    }
}

/// Build-scoped parameter store and canonicaliser.
#[derive(Debug)]
pub struct ParamRegistry {
    pool: ParamPool,
    by_content: FxHashMap<(ParamClass, Content), ParamId>,
    by_auto: FxHashMap<AutoKey, ParamId>,
    by_name: FxHashMap<Symbol, ParamId>,
    /// Shared locals are scoped per stage; the two entry points may each
    /// hold a `t_colour` without colliding.
    by_local: FxHashMap<(ProgramType, Content), ParamId>,
    auto_table: AutoBindTable,
    lights: LightCounts,
    bone_count: u16,
    next_local: u32,
}

impl ParamRegistry {
    #[must_use]
    pub fn new(auto_table: AutoBindTable, lights: LightCounts, bone_count: u16) -> Self {
        Self {
            pool: ParamPool::new(),
            by_content: FxHashMap::default(),
            by_auto: FxHashMap::default(),
            by_name: FxHashMap::default(),
            by_local: FxHashMap::default(),
            auto_table,
            lights,
            bone_count,
            next_local: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn pool(&self) -> &ParamPool {
        &self.pool
    }

    #[must_use]
    pub fn into_pool(self) -> ParamPool {
        self.pool
    }

    #[inline]
    #[must_use]
    pub const fn lights(&self) -> LightCounts {
        self.lights
    }

    /// Resolve or create the stage parameter for `(class, content)`.
    ///
    /// A second request under the same pair must carry the same type;
    /// otherwise the two callers disagree about what the value is and the
    /// request is rejected.
    pub fn stage_param(
        &mut self,
        class: ParamClass,
        content: Content,
        ty: ElementType,
    ) -> Result<ParamId> {
        debug_assert!(
            !matches!(content, Content::Generic),
            "generic content never canonicalises; use `local`"
        );
        debug_assert!(
            class != ParamClass::Local,
            "locals go through `shared_local` or `local`"
        );
        if let Some(&id) = self.by_content.get(&(class, content)) {
            let existing = self.pool.get(id).ty;
            if existing != ty {
                return Err(LoreError::TypeMismatch {
                    site: "stage_param",
                    detail: format!(
                        "{content:?} already registered as {existing:?}, re-requested as {ty:?}"
                    ),
                });
            }
            return Ok(id);
        }

        let name = interner::intern(&stage_name(class, content));
        let id = self.pool.alloc(Parameter {
            name,
            class,
            ty,
            content: Some(content),
            auto: None,
            array_len: None,
        });
        self.by_content.insert((class, content), id);
        Ok(id)
    }

    pub fn vertex_input(&mut self, content: Content, ty: ElementType) -> Result<ParamId> {
        self.stage_param(ParamClass::VertexInput, content, ty)
    }

    /// Resolve or create a varying: the vertex-output half and the
    /// fragment-input half, sharing one identifier.
    pub fn varying(&mut self, content: Content, ty: ElementType) -> Result<(ParamId, ParamId)> {
        let out = self.stage_param(ParamClass::VertexOutput, content, ty)?;
        let inp = self.stage_param(ParamClass::FragmentInput, content, ty)?;
        Ok((out, inp))
    }

    /// The clip-space position output. Always present, never compacted.
    pub fn clip_position(&mut self) -> Result<ParamId> {
        self.stage_param(
            ParamClass::VertexOutput,
            Content::PositionProjective,
            ElementType::Float4,
        )
    }

    /// The single fragment colour output.
    pub fn fragment_output(&mut self) -> Result<ParamId> {
        self.stage_param(
            ParamClass::FragmentOutput,
            Content::ColourDiffuse,
            ElementType::Float4,
        )
    }

    /// Resolve or create the uniform bound to `key`.
    ///
    /// Fails with [`LoreError::AutoBindUnknown`] when the key's family has
    /// been removed from the table.
    pub fn uniform_auto(&mut self, key: AutoKey) -> Result<ParamId> {
        if !self.auto_table.supports(key.kind()) {
            return Err(LoreError::AutoBindUnknown { key: key.kind() });
        }
        if let Some(&id) = self.by_auto.get(&key) {
            return Ok(id);
        }
        let name = interner::intern(&key.uniform_name());
        let id = self.pool.alloc(Parameter {
            name,
            class: ParamClass::Uniform,
            ty: key.element_type(),
            content: None,
            auto: Some(key),
            array_len: key.array_len(self.lights, self.bone_count),
        });
        self.by_auto.insert(key, id);
        Ok(id)
    }

    /// Resolve or create the sampler uniform for a texture unit.
    pub fn sampler(&mut self, unit: u8, kind: TextureKind) -> Result<ParamId> {
        let ty = match kind {
            TextureKind::TwoD => ElementType::Sampler2D,
            TextureKind::Cube => ElementType::SamplerCube,
        };
        let name = interner::intern(&format!("u_sampler{unit}"));
        if let Some(&id) = self.by_name.get(&name) {
            let existing = self.pool.get(id).ty;
            if existing != ty {
                return Err(LoreError::TypeMismatch {
                    site: "sampler",
                    detail: format!(
                        "texture unit {unit} already registered as {existing:?}, re-requested as {ty:?}"
                    ),
                });
            }
            return Ok(id);
        }
        let id = self.pool.alloc(Parameter {
            name,
            class: ParamClass::Uniform,
            ty,
            content: None,
            auto: None,
            array_len: None,
        });
        self.by_name.insert(name, id);
        Ok(id)
    }

    /// A shared local: one instance per `(stage, content)` pair, so the
    /// sub-render states of one stage can hand intermediate results to each
    /// other through a known name.
    pub fn shared_local(
        &mut self,
        stage: ProgramType,
        content: Content,
        ty: ElementType,
    ) -> Result<ParamId> {
        debug_assert!(!matches!(content, Content::Generic));
        if let Some(&id) = self.by_local.get(&(stage, content)) {
            let existing = self.pool.get(id).ty;
            if existing != ty {
                return Err(LoreError::TypeMismatch {
                    site: "shared_local",
                    detail: format!(
                        "{content:?} already registered as {existing:?}, re-requested as {ty:?}"
                    ),
                });
            }
            return Ok(id);
        }
        let name = interner::intern(&stage_name(ParamClass::Local, content));
        let id = self.pool.alloc(Parameter {
            name,
            class: ParamClass::Local,
            ty,
            content: Some(content),
            auto: None,
            array_len: None,
        });
        self.by_local.insert((stage, content), id);
        Ok(id)
    }

    /// A fresh private local. Never canonicalised, never shared.
    pub fn local(&mut self, ty: ElementType) -> ParamId {
        let name = interner::intern(&format!("local_{}", self.next_local));
        self.next_local += 1;
        self.pool.alloc(Parameter {
            name,
            class: ParamClass::Local,
            ty,
            content: Some(Content::Generic),
            auto: None,
            array_len: None,
        })
    }
}

fn stage_name(class: ParamClass, content: Content) -> String {
    if class == ParamClass::FragmentOutput {
        return "o_color".into();
    }
    let base: String = match content {
        Content::PositionObject => "position".into(),
        Content::PositionWorld => "world_position".into(),
        Content::PositionView => "view_position".into(),
        Content::PositionProjective => "clip_position".into(),
        Content::NormalObject => "normal".into(),
        Content::NormalWorld => "world_normal".into(),
        Content::NormalView => "view_normal".into(),
        Content::TangentObject => "tangent".into(),
        Content::TangentWorld => "world_tangent".into(),
        Content::BinormalWorld => "world_binormal".into(),
        Content::BlendWeights => "blend_weights".into(),
        Content::BlendIndices => "blend_indices".into(),
        Content::ColourDiffuse => "colour".into(),
        Content::ColourSpecular => "specular_colour".into(),
        Content::TexCoord(set) => format!("texcoord{set}"),
        Content::FogFactor => "fog_factor".into(),
        Content::Generic => "value".into(),
    };
    match class {
        ParamClass::VertexInput => format!("a_{base}"),
        ParamClass::VertexOutput | ParamClass::FragmentInput => format!("v_{base}"),
        ParamClass::Uniform => format!("u_{base}"),
        ParamClass::Local => format!("t_{base}"),
        ParamClass::FragmentOutput => unreachable!(),
    }
}
