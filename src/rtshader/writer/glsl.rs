//! GLSL and GLSL ES emission.
//!
//! One dialect value covers desktop core profiles and ES; the differences
//! are the version line, the ES fragment default-precision block and the
//! per-declaration precision qualifiers the processor assigns for ES.
//! Generated names are prefixed (`a_`, `v_`, `u_`, `t_`, `local_`, `o_`),
//! which keeps them clear of every reserved word in both dialects. The clip
//! position parameter is spelled `gl_Position` and never declared.

use rustc_hash::FxHashMap;

use crate::core::pass::CompareFunc;
use crate::rtshader::atom::{ArrayIndex, Atom, Opcode, Operand, OperandKind};
use crate::rtshader::param::{Content, ElementType, ParamClass, ParamId};
use crate::rtshader::processor::Precision;
use crate::rtshader::program::{ProgramSet, ProgramType};
use crate::rtshader::writer::fmt_f32;
use crate::utils::interner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Core { version: u16 },
    Es { version: u16 },
}

pub(crate) fn write(
    set: &ProgramSet,
    stage: ProgramType,
    dialect: Dialect,
    precisions: &FxHashMap<ParamId, Precision>,
) -> String {
    Writer {
        set,
        stage,
        dialect,
        precisions,
        out: String::new(),
    }
    .run()
}

struct Writer<'a> {
    set: &'a ProgramSet,
    stage: ProgramType,
    dialect: Dialect,
    /// Qualifier per declared parameter; empty outside the ES dialect.
    precisions: &'a FxHashMap<ParamId, Precision>,
    out: String,
}

impl Writer<'_> {
    fn run(mut self) -> String {
        let function = self.set.function(self.stage);

        match self.dialect {
            Dialect::Core { version } => {
                self.out.push_str(&format!("#version {version} core\n"));
            }
            Dialect::Es { version } => {
                self.out.push_str(&format!("#version {version} es\n"));
                if self.stage == ProgramType::Fragment {
                    self.out
                        .push_str("precision highp float;\nprecision highp int;\n");
                }
            }
        }

        let used = function.params_used();
        let mut block = String::new();
        for (id, param) in self.set.pool.iter() {
            if param.class != ParamClass::Uniform || !used.contains(&id) {
                continue;
            }
            let array = param
                .array_len
                .map(|n| format!("[{n}]"))
                .unwrap_or_default();
            block.push_str(&format!(
                "uniform {}{} {}{array};\n",
                self.precision(id),
                type_name(param.ty),
                interner::resolve(param.name)
            ));
        }
        self.section(block);

        let mut block = String::new();
        for id in function.inputs() {
            let param = self.set.pool.get(*id);
            block.push_str(&format!(
                "in {}{} {};\n",
                self.precision(*id),
                type_name(param.ty),
                interner::resolve(param.name)
            ));
        }
        self.section(block);

        let mut block = String::new();
        for id in function.outputs() {
            let param = self.set.pool.get(*id);
            if param.content == Some(Content::PositionProjective) {
                continue;
            }
            block.push_str(&format!(
                "out {}{} {};\n",
                self.precision(*id),
                type_name(param.ty),
                interner::resolve(param.name)
            ));
        }
        self.section(block);

        self.out.push_str("\nvoid main() {\n");
        for id in function.locals() {
            let param = self.set.pool.get(*id);
            self.out.push_str(&format!(
                "    {}{} {};\n",
                self.precision(*id),
                type_name(param.ty),
                interner::resolve(param.name)
            ));
        }
        let mut separated = function.locals().is_empty();
        for atom in function.atoms() {
            let line = self.statement(atom);
            if line.is_empty() {
                continue;
            }
            if !separated {
                self.out.push('\n');
                separated = true;
            }
            self.out.push_str("    ");
            self.out.push_str(&line);
            self.out.push('\n');
        }
        self.out.push_str("}\n");
        self.out
    }

    /// Append a declaration block preceded by one blank line, if non-empty.
    fn section(&mut self, block: String) {
        if !block.is_empty() {
            self.out.push('\n');
            self.out.push_str(&block);
        }
    }

    fn precision(&self, id: ParamId) -> &'static str {
        self.precisions.get(&id).map_or("", |p| p.prefix())
    }

    fn statement(&self, atom: &Atom) -> String {
        let ops = &atom.operands;
        match atom.opcode {
            Opcode::Assign => format!(
                "{} = {};",
                self.expr(&ops[0]),
                self.coerced(&ops[1], &ops[0])
            ),
            Opcode::Add => self.infix(ops, "+"),
            Opcode::Subtract => self.infix(ops, "-"),
            Opcode::Multiply => self.infix(ops, "*"),
            Opcode::Divide => self.infix(ops, "/"),
            Opcode::Dot => self.call(ops, "dot"),
            Opcode::Cross => self.call(ops, "cross"),
            Opcode::Max => self.call(ops, "max"),
            Opcode::Clamp => self.call(ops, "clamp"),
            Opcode::Lerp => self.call(ops, "mix"),
            // pow has no scalar-exponent overload in GLSL.
            Opcode::Pow => format!(
                "{} = pow({}, {});",
                self.expr(&ops[0]),
                self.expr(&ops[1]),
                self.coerced(&ops[2], &ops[0])
            ),
            Opcode::Normalize => self.call(ops, "normalize"),
            Opcode::Length => self.call(ops, "length"),
            Opcode::Reflect => self.call(ops, "reflect"),
            Opcode::Exp => self.call(ops, "exp"),
            Opcode::Abs => self.call(ops, "abs"),
            Opcode::Sample => self.call(ops, "texture"),
            Opcode::AlphaTest(func) => match compare_op(func) {
                Some(op) => format!(
                    "if (!({} {op} {})) discard;",
                    self.expr(&ops[0]),
                    self.expr(&ops[1])
                ),
                None if func == CompareFunc::AlwaysFail => "discard;".into(),
                None => String::new(),
            },
        }
    }

    fn infix(&self, ops: &[Operand], sign: &str) -> String {
        format!(
            "{} = {} {sign} {};",
            self.expr(&ops[0]),
            self.expr(&ops[1]),
            self.expr(&ops[2])
        )
    }

    fn call(&self, ops: &[Operand], name: &str) -> String {
        let args: Vec<String> = ops[1..].iter().map(|op| self.expr(op)).collect();
        format!("{} = {name}({});", self.expr(&ops[0]), args.join(", "))
    }

    /// Render `src`, wrapped in a constructor when a float scalar feeds a
    /// vector slot. GLSL has no implicit splat on assignment.
    fn coerced(&self, src: &Operand, dst: &Operand) -> String {
        let text = self.expr(src);
        let pool = &self.set.pool;
        let (Ok(s), Ok(d)) = (src.effective_type(pool), dst.effective_type(pool)) else {
            return text;
        };
        if s == ElementType::Float && d.is_float() && d != ElementType::Float {
            format!("{}({text})", type_name(d))
        } else {
            text
        }
    }

    fn expr(&self, op: &Operand) -> String {
        let mut text = match op.kind {
            OperandKind::Literal(value) => return fmt_f32(value),
            OperandKind::Param(id) => self.param_name(id),
        };
        match op.index {
            None => {}
            Some(ArrayIndex::Literal(i)) => text.push_str(&format!("[{i}]")),
            Some(ArrayIndex::Dynamic { param, comp }) => text.push_str(&format!(
                "[int({}.{})]",
                self.param_name(param),
                comp.letter()
            )),
        }
        if !op.swizzle.is_empty() {
            text.push('.');
            for comp in &op.swizzle {
                text.push(comp.letter());
            }
        }
        text
    }

    fn param_name(&self, id: ParamId) -> String {
        let param = self.set.pool.get(id);
        if self.stage == ProgramType::Vertex
            && param.class == ParamClass::VertexOutput
            && param.content == Some(Content::PositionProjective)
        {
            return "gl_Position".to_owned();
        }
        interner::resolve(param.name).to_owned()
    }
}

pub(crate) fn compare_op(func: CompareFunc) -> Option<&'static str> {
    match func {
        CompareFunc::Less => Some("<"),
        CompareFunc::LessEqual => Some("<="),
        CompareFunc::Equal => Some("=="),
        CompareFunc::NotEqual => Some("!="),
        CompareFunc::GreaterEqual => Some(">="),
        CompareFunc::Greater => Some(">"),
        CompareFunc::AlwaysFail | CompareFunc::AlwaysPass => None,
    }
}

const fn type_name(ty: ElementType) -> &'static str {
    match ty {
        ElementType::Float => "float",
        ElementType::Float2 => "vec2",
        ElementType::Float3 => "vec3",
        ElementType::Float4 => "vec4",
        ElementType::Int => "int",
        ElementType::Int2 => "ivec2",
        ElementType::Int3 => "ivec3",
        ElementType::Int4 => "ivec4",
        ElementType::Bool => "bool",
        ElementType::Mat3 => "mat3",
        ElementType::Mat4 => "mat4",
        ElementType::Sampler2D => "sampler2D",
        ElementType::SamplerCube => "samplerCube",
    }
}
