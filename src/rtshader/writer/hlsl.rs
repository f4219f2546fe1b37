//! HLSL emission, shader model 3 profile.
//!
//! Stage interfaces travel through `VS_INPUT` / `VS_OUTPUT` / `PS_INPUT` /
//! `PS_OUTPUT` structs with fixed-function semantics; interpolator rows get
//! their `TEXCOORD` number from the row index assigned during packing, so
//! both stages agree without talking to each other. Matrices multiply
//! through `mul` under `pack_matrix(column_major)`, which keeps the numbers
//! identical to the GLSL output.

use rustc_hash::FxHashMap;

use crate::core::pass::CompareFunc;
use crate::rtshader::atom::{ArrayIndex, Atom, Opcode, Operand, OperandKind};
use crate::rtshader::param::{Content, ElementType, ParamClass, ParamId, Parameter};
use crate::rtshader::program::{ProgramSet, ProgramType};
use crate::rtshader::writer::fmt_f32;
use crate::rtshader::writer::glsl::compare_op;
use crate::utils::interner::{self, Symbol};

pub(crate) fn write(
    set: &ProgramSet,
    stage: ProgramType,
    registers: &FxHashMap<ParamId, u16>,
) -> String {
    Writer {
        set,
        stage,
        registers,
        out: String::new(),
    }
    .run()
}

struct Writer<'a> {
    set: &'a ProgramSet,
    stage: ProgramType,
    registers: &'a FxHashMap<ParamId, u16>,
    out: String,
}

impl Writer<'_> {
    fn run(mut self) -> String {
        let function = self.set.function(self.stage);
        self.out.push_str("#pragma pack_matrix(column_major)\n");

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
            let register = self
                .registers
                .get(&id)
                .map(|r| {
                    let space = if param.ty.is_sampler() { 's' } else { 'c' };
                    format!(" : register({space}{r})")
                })
                .unwrap_or_default();
            block.push_str(&format!(
                "uniform {} {}{array}{register};\n",
                type_name(param.ty),
                interner::resolve(param.name)
            ));
        }
        if !block.is_empty() {
            self.out.push('\n');
            self.out.push_str(&block);
        }

        let (in_struct, out_struct) = match self.stage {
            ProgramType::Vertex => ("VS_INPUT", "VS_OUTPUT"),
            ProgramType::Fragment => ("PS_INPUT", "PS_OUTPUT"),
        };
        let has_inputs = !function.inputs().is_empty();
        if has_inputs {
            self.out.push_str(&format!("\nstruct {in_struct} {{\n"));
            for (row, id) in function.inputs().iter().enumerate() {
                self.struct_field(*id, row);
            }
            self.out.push_str("};\n");
        }
        self.out.push_str(&format!("\nstruct {out_struct} {{\n"));
        for (row, id) in function.outputs().iter().enumerate() {
            self.struct_field(*id, row);
        }
        self.out.push_str("};\n");

        let args = if has_inputs {
            format!("{in_struct} i")
        } else {
            String::new()
        };
        self.out
            .push_str(&format!("\n{out_struct} main({args}) {{\n"));
        self.out.push_str(&format!("    {out_struct} o;\n"));
        for id in function.locals() {
            let param = self.set.pool.get(*id);
            self.out.push_str(&format!(
                "    {} {};\n",
                type_name(param.ty),
                interner::resolve(param.name)
            ));
        }
        self.out.push('\n');
        for atom in function.atoms() {
            let line = self.statement(atom);
            if line.is_empty() {
                continue;
            }
            self.out.push_str("    ");
            self.out.push_str(&line);
            self.out.push('\n');
        }
        self.out.push_str("    return o;\n}\n");
        self.out
    }

    fn struct_field(&mut self, id: ParamId, row: usize) {
        let param = self.set.pool.get(id);
        let semantic = semantic_of(param, row);
        self.out.push_str(&format!(
            "    {} {} : {semantic};\n",
            type_name(param.ty),
            field_name(param.content, param.name)
        ));
    }

    fn statement(&self, atom: &Atom) -> String {
        let ops = &atom.operands;
        match atom.opcode {
            Opcode::Assign => format!("{} = {};", self.expr(&ops[0]), self.expr(&ops[1])),
            Opcode::Add => self.infix(ops, "+"),
            Opcode::Subtract => self.infix(ops, "-"),
            Opcode::Multiply => {
                if self.is_matrix(&ops[1]) {
                    self.call(ops, "mul")
                } else {
                    self.infix(ops, "*")
                }
            }
            Opcode::Divide => self.infix(ops, "/"),
            Opcode::Dot => self.call(ops, "dot"),
            Opcode::Cross => self.call(ops, "cross"),
            Opcode::Max => self.call(ops, "max"),
            Opcode::Clamp => self.call(ops, "clamp"),
            Opcode::Lerp => self.call(ops, "lerp"),
            Opcode::Pow => self.call(ops, "pow"),
            Opcode::Normalize => self.call(ops, "normalize"),
            Opcode::Length => self.call(ops, "length"),
            Opcode::Reflect => self.call(ops, "reflect"),
            Opcode::Exp => self.call(ops, "exp"),
            Opcode::Abs => self.call(ops, "abs"),
            Opcode::Sample => {
                let name = match self.sampler_kind(&ops[1]) {
                    ElementType::SamplerCube => "texCUBE",
                    _ => "tex2D",
                };
                self.call(ops, name)
            }
            Opcode::AlphaTest(func) => match compare_op(func) {
                Some(op) => format!(
                    "if (!({} {op} {})) clip(-1.0);",
                    self.expr(&ops[0]),
                    self.expr(&ops[1])
                ),
                None if func == CompareFunc::AlwaysFail => "clip(-1.0);".into(),
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

    fn is_matrix(&self, op: &Operand) -> bool {
        op.effective_type(&self.set.pool)
            .is_ok_and(ElementType::is_matrix)
    }

    fn sampler_kind(&self, op: &Operand) -> ElementType {
        op.param_id()
            .map_or(ElementType::Sampler2D, |id| self.set.pool.get(id).ty)
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
                "[(int){}.{}]",
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
        let field = || field_name(param.content, param.name);
        match param.class {
            ParamClass::VertexInput | ParamClass::FragmentInput => format!("i.{}", field()),
            ParamClass::VertexOutput | ParamClass::FragmentOutput => format!("o.{}", field()),
            ParamClass::Uniform | ParamClass::Local => interner::resolve(param.name).to_owned(),
        }
    }
}

/// Struct field spelling: the generated name minus its stage prefix, except
/// the clip position which is always `position`.
fn field_name(content: Option<Content>, name: Symbol) -> String {
    if content == Some(Content::PositionProjective) {
        return "position".to_owned();
    }
    let resolved = interner::resolve(name);
    resolved
        .split_once('_')
        .map_or(resolved, |(_, rest)| rest)
        .to_owned()
}

fn semantic_of(param: &Parameter, row: usize) -> String {
    match (param.class, param.content) {
        (_, Some(Content::PositionProjective)) => "POSITION".to_owned(),
        (ParamClass::FragmentOutput, _) => "COLOR0".to_owned(),
        (ParamClass::VertexInput, Some(content)) => match content {
            Content::PositionObject => "POSITION".to_owned(),
            Content::NormalObject => "NORMAL".to_owned(),
            Content::TangentObject => "TANGENT".to_owned(),
            Content::BlendWeights => "BLENDWEIGHT".to_owned(),
            Content::BlendIndices => "BLENDINDICES".to_owned(),
            Content::ColourDiffuse => "COLOR0".to_owned(),
            Content::TexCoord(set) => format!("TEXCOORD{set}"),
            _ => format!("TEXCOORD{row}"),
        },
        // Interpolator rows: the packed name carries its row number.
        _ => {
            let resolved = interner::resolve(param.name);
            let row = resolved
                .strip_prefix("v_pack")
                .and_then(|n| n.parse::<usize>().ok())
                .unwrap_or(row);
            format!("TEXCOORD{row}")
        }
    }
}

const fn type_name(ty: ElementType) -> &'static str {
    match ty {
        ElementType::Float => "float",
        ElementType::Float2 => "float2",
        ElementType::Float3 => "float3",
        ElementType::Float4 => "float4",
        ElementType::Int => "int",
        ElementType::Int2 => "int2",
        ElementType::Int3 => "int3",
        ElementType::Int4 => "int4",
        ElementType::Bool => "bool",
        ElementType::Mat3 => "float3x3",
        ElementType::Mat4 => "float4x4",
        ElementType::Sampler2D => "sampler2D",
        ElementType::SamplerCube => "samplerCUBE",
    }
}
