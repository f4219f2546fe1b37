//! Function IR instructions.
//!
//! An [`Atom`] is one statement of a generated function: an opcode plus
//! operands referring into the parameter pool. The set of opcodes is closed;
//! writers translate each one to a single line of target source, and the
//! test interpreter executes the same set. Signatures are checked when the
//! atom is built, so a bucket never holds an ill-typed statement.

use smallvec::SmallVec;

use crate::core::pass::CompareFunc;
use crate::errors::{LoreError, Result};
use crate::rtshader::param::{ElementType, ParamId, ParamPool};

/// Vector component, for swizzles and write masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comp {
    X,
    Y,
    Z,
    W,
}

impl Comp {
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
            Self::W => 3,
        }
    }

    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::X => 'x',
            Self::Y => 'y',
            Self::Z => 'z',
            Self::W => 'w',
        }
    }
}

/// Subscript applied to an array parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArrayIndex {
    Literal(u32),
    /// Index taken from one component of another parameter, e.g. a blend
    /// index fetched per vertex.
    Dynamic { param: ParamId, comp: Comp },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperandKind {
    Param(ParamId),
    Literal(f32),
}

/// A value reference inside an atom: parameter or literal, with an optional
/// array subscript applied before an optional swizzle.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub kind: OperandKind,
    pub index: Option<ArrayIndex>,
    pub swizzle: SmallVec<[Comp; 4]>,
}

impl Operand {
    #[must_use]
    pub fn param(id: ParamId) -> Self {
        Self {
            kind: OperandKind::Param(id),
            index: None,
            swizzle: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn literal(value: f32) -> Self {
        Self {
            kind: OperandKind::Literal(value),
            index: None,
            swizzle: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn at(mut self, index: ArrayIndex) -> Self {
        self.index = Some(index);
        self
    }

    #[must_use]
    pub fn swiz(mut self, comps: &[Comp]) -> Self {
        self.swizzle = comps.iter().copied().collect();
        self
    }

    #[must_use]
    pub const fn param_id(&self) -> Option<ParamId> {
        match self.kind {
            OperandKind::Param(id) => Some(id),
            OperandKind::Literal(_) => None,
        }
    }

    /// Type of the value this operand denotes, after subscript and swizzle.
    pub fn effective_type(&self, pool: &ParamPool) -> Result<ElementType> {
        let base = match self.kind {
            OperandKind::Literal(_) => {
                if self.index.is_some() || !self.swizzle.is_empty() {
                    return Err(LoreError::TypeMismatch {
                        site: "operand",
                        detail: "literals take no subscript or swizzle".into(),
                    });
                }
                return Ok(ElementType::Float);
            }
            OperandKind::Param(id) => {
                let param = pool.get(id);
                if self.index.is_some() && !param.is_array() {
                    return Err(LoreError::TypeMismatch {
                        site: "operand",
                        detail: format!("subscript on non-array `{:?}`", param.name),
                    });
                }
                if self.index.is_none() && param.is_array() {
                    return Err(LoreError::TypeMismatch {
                        site: "operand",
                        detail: format!("array `{:?}` used without subscript", param.name),
                    });
                }
                param.ty
            }
        };

        if self.swizzle.is_empty() {
            return Ok(base);
        }
        let Some(width) = base.width() else {
            return Err(LoreError::TypeMismatch {
                site: "operand",
                detail: format!("swizzle on non-vector {base:?}"),
            });
        };
        if self.swizzle.len() > 4 {
            return Err(LoreError::TypeMismatch {
                site: "operand",
                detail: "swizzle longer than four components".into(),
            });
        }
        for comp in &self.swizzle {
            if comp.index() >= width {
                return Err(LoreError::TypeMismatch {
                    site: "operand",
                    detail: format!("component {:?} out of range for {base:?}", comp),
                });
            }
        }
        let len = self.swizzle.len() as u8;
        Ok(if base.is_int() {
            match len {
                1 => ElementType::Int,
                2 => ElementType::Int2,
                3 => ElementType::Int3,
                _ => ElementType::Int4,
            }
        } else {
            ElementType::float_with_width(len)
        })
    }
}

/// The closed opcode set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Opcode {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Dot,
    Cross,
    Max,
    Clamp,
    Lerp,
    Pow,
    Normalize,
    Length,
    Reflect,
    Exp,
    Abs,
    /// Texture fetch. The sampler operand's type selects 2D or cube.
    Sample,
    /// Fragment discard when `a cmp b` fails. Reads both operands.
    AlphaTest(CompareFunc),
}

impl Opcode {
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Assign => "assign",
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::Dot => "dot",
            Self::Cross => "cross",
            Self::Max => "max",
            Self::Clamp => "clamp",
            Self::Lerp => "lerp",
            Self::Pow => "pow",
            Self::Normalize => "normalize",
            Self::Length => "length",
            Self::Reflect => "reflect",
            Self::Exp => "exp",
            Self::Abs => "abs",
            Self::Sample => "sample",
            Self::AlphaTest(_) => "alpha_test",
        }
    }

    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::Assign
            | Self::Normalize
            | Self::Length
            | Self::Exp
            | Self::Abs => 2,
            Self::Add
            | Self::Subtract
            | Self::Multiply
            | Self::Divide
            | Self::Dot
            | Self::Cross
            | Self::Max
            | Self::Pow
            | Self::Reflect
            | Self::Sample => 3,
            Self::Clamp | Self::Lerp => 4,
            Self::AlphaTest(_) => 2,
        }
    }

    /// Whether operand 0 is the destination.
    #[must_use]
    pub const fn writes_dst(self) -> bool {
        !matches!(self, Self::AlphaTest(_))
    }
}

/// One validated statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub opcode: Opcode,
    pub operands: SmallVec<[Operand; 4]>,
}

impl Atom {
    /// Build and type-check an atom against the pool.
    pub fn new(pool: &ParamPool, opcode: Opcode, operands: Vec<Operand>) -> Result<Self> {
        if operands.len() != opcode.arity() {
            return Err(mismatch(
                opcode,
                format!(
                    "expects {} operands, got {}",
                    opcode.arity(),
                    operands.len()
                ),
            ));
        }

        if opcode.writes_dst() {
            check_writable(pool, opcode, &operands[0])?;
        }

        let types: Vec<ElementType> = operands
            .iter()
            .map(|op| op.effective_type(pool))
            .collect::<Result<_>>()?;
        check_signature(pool, opcode, &operands, &types)?;

        Ok(Self {
            opcode,
            operands: operands.into_iter().collect(),
        })
    }

    /// Destination operand, when the opcode has one.
    #[must_use]
    pub fn dst(&self) -> Option<&Operand> {
        self.opcode.writes_dst().then(|| &self.operands[0])
    }

    /// Operands read by this atom, including array subscript parameters.
    pub fn reads(&self) -> impl Iterator<Item = &Operand> {
        let skip = usize::from(self.opcode.writes_dst());
        self.operands.iter().skip(skip)
    }
}

fn mismatch(opcode: Opcode, detail: String) -> LoreError {
    LoreError::TypeMismatch {
        site: opcode.mnemonic(),
        detail,
    }
}

fn check_writable(pool: &ParamPool, opcode: Opcode, dst: &Operand) -> Result<()> {
    let Some(id) = dst.param_id() else {
        return Err(mismatch(opcode, "destination must be a parameter".into()));
    };
    let param = pool.get(id);
    if !param.class.writable() {
        return Err(mismatch(
            opcode,
            format!("cannot write read-only {:?} parameter", param.class),
        ));
    }
    // A write mask must not name a component twice.
    for (i, a) in dst.swizzle.iter().enumerate() {
        if dst.swizzle[i + 1..].contains(a) {
            return Err(mismatch(opcode, "write mask repeats a component".into()));
        }
    }
    Ok(())
}

/// `true` when `src` may feed a slot of type `dst`: exact match, or a float
/// scalar broadcast into a float vector.
fn feeds(dst: ElementType, src: ElementType) -> bool {
    dst == src || (src == ElementType::Float && dst.is_float())
}

fn check_signature(
    pool: &ParamPool,
    opcode: Opcode,
    operands: &[Operand],
    types: &[ElementType],
) -> Result<()> {
    use ElementType as T;
    match opcode {
        Opcode::Assign => {
            if !feeds(types[0], types[1]) {
                return Err(mismatch(
                    opcode,
                    format!("cannot assign {:?} to {:?}", types[1], types[0]),
                ));
            }
        }
        Opcode::Add | Opcode::Subtract | Opcode::Divide | Opcode::Max => {
            if !(types[0].is_float() || types[0].is_int()) {
                return Err(mismatch(opcode, format!("non-arithmetic {:?}", types[0])));
            }
            if !feeds(types[0], types[1]) || !feeds(types[0], types[2]) {
                return Err(mismatch(
                    opcode,
                    format!("operands {:?}, {:?} do not fit {:?}", types[1], types[2], types[0]),
                ));
            }
        }
        Opcode::Multiply => {
            let ok = match (types[1], types[2]) {
                (T::Mat4, T::Float4) => types[0] == T::Float4,
                (T::Mat3, T::Float3) => types[0] == T::Float3,
                (a, b) => {
                    types[0].is_float()
                        && feeds(types[0], a)
                        && feeds(types[0], b)
                }
            };
            if !ok {
                return Err(mismatch(
                    opcode,
                    format!("{:?} * {:?} -> {:?} has no rule", types[1], types[2], types[0]),
                ));
            }
        }
        Opcode::Dot => {
            if types[0] != T::Float || types[1] != types[2] || !types[1].is_float() {
                return Err(mismatch(
                    opcode,
                    format!("dot({:?}, {:?}) -> {:?}", types[1], types[2], types[0]),
                ));
            }
        }
        Opcode::Cross | Opcode::Reflect => {
            if types.iter().any(|t| *t != T::Float3) {
                return Err(mismatch(opcode, "all operands must be float3".into()));
            }
        }
        Opcode::Clamp => {
            if !types[0].is_float()
                || !feeds(types[0], types[1])
                || !feeds(types[0], types[2])
                || !feeds(types[0], types[3])
            {
                return Err(mismatch(opcode, format!("clamp over {types:?}")));
            }
        }
        Opcode::Lerp => {
            if !types[0].is_float()
                || !feeds(types[0], types[1])
                || !feeds(types[0], types[2])
                || !feeds(types[0], types[3])
            {
                return Err(mismatch(opcode, format!("lerp over {types:?}")));
            }
        }
        Opcode::Pow => {
            if !types[0].is_float() || !feeds(types[0], types[1]) || !feeds(types[0], types[2]) {
                return Err(mismatch(opcode, format!("pow over {types:?}")));
            }
        }
        Opcode::Normalize => {
            if types[0] != types[1] || !matches!(types[0], T::Float2 | T::Float3 | T::Float4) {
                return Err(mismatch(
                    opcode,
                    format!("normalize({:?}) -> {:?}", types[1], types[0]),
                ));
            }
        }
        Opcode::Length => {
            if types[0] != T::Float || !matches!(types[1], T::Float2 | T::Float3 | T::Float4) {
                return Err(mismatch(opcode, format!("length({:?})", types[1])));
            }
        }
        Opcode::Exp | Opcode::Abs => {
            if types[0] != types[1] || !types[0].is_float() {
                return Err(mismatch(
                    opcode,
                    format!("{}({:?}) -> {:?}", opcode.mnemonic(), types[1], types[0]),
                ));
            }
        }
        Opcode::Sample => {
            let coord = match types[1] {
                T::Sampler2D => T::Float2,
                T::SamplerCube => T::Float3,
                other => {
                    return Err(mismatch(opcode, format!("operand 1 is {other:?}, not a sampler")));
                }
            };
            if types[0] != T::Float4 || types[2] != coord {
                return Err(mismatch(
                    opcode,
                    format!("expects (float4, sampler, {coord:?}), got {types:?}"),
                ));
            }
            // Samplers are opaque; no swizzle or subscript applies.
            if operands[1].param_id().map(|id| pool.get(id).class)
                != Some(crate::rtshader::param::ParamClass::Uniform)
            {
                return Err(mismatch(opcode, "sampler must be a uniform".into()));
            }
        }
        Opcode::AlphaTest(_) => {
            if types[0] != T::Float || types[1] != T::Float {
                return Err(mismatch(opcode, format!("compares {:?} to {:?}", types[0], types[1])));
            }
        }
    }
    Ok(())
}
