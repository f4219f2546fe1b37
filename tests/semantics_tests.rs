//! Numeric Semantics Tests
//!
//! The writers are covered by text-level tests elsewhere; these tests check
//! that the generated IR *computes* the classic fixed-function results. A
//! small interpreter executes the closed opcode set over a generated
//! program set, one vertex at a time, and the outcome is compared against
//! the same equations evaluated directly with glam:
//! - Directional, point and spot diffuse terms with attenuation and cone
//!   falloff, saturated at the end
//! - Inline specular under per-pixel lighting
//! - Texture modulation and the auto-bound alpha test reference
//! - Squared exponential fog, colour only
//! - Identity-bone skinning collapsing to the rigid transform
//!
//! Varyings are carried across the stage boundary unchanged, which models a
//! fragment sitting exactly on its vertex.

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, Vec4};

use lore::core::pass::{AlphaTest, FogMode, SkinningInfo};
use lore::interner;
use lore::rtshader::function::Function;
use lore::rtshader::param::{AutoKey, Content, ParamClass, ParamPool};
use lore::{
    CompareFunc, GeneratedProgram, GeneratorConfig, LightCounts, LightType, Material, Pass,
    ShaderGenerator, ShadingModel, SurfaceParams, Technique, TextureUnit,
};

use eval::{Machine, Value};

const SCHEME: &str = "generated";

/// Executes generated function IR over a slot map, one statement at a time.
/// Every opcode the atoms can carry has exactly one rule here, mirroring
/// what a single line of emitted source would do.
mod eval {
    use glam::{Mat4, Vec4};
    use rustc_hash::FxHashMap;

    use lore::core::pass::CompareFunc;
    use lore::interner;
    use lore::rtshader::atom::{ArrayIndex, Atom, Opcode, Operand, OperandKind};
    use lore::rtshader::function::Function;
    use lore::rtshader::param::{ParamId, ParamPool};

    /// Runtime value of one parameter slot. Vectors are padded to four
    /// components; the parameter's type says how many are meaningful.
    #[derive(Debug, Clone)]
    pub enum Value {
        Vec([f32; 4]),
        Mat(Mat4),
        VecArray(Vec<[f32; 4]>),
        MatArray(Vec<Mat4>),
        /// A sampler bound to a single flat colour; coordinates are ignored.
        Texel([f32; 4]),
    }

    /// A read result: padded components plus the width the operand has
    /// after its swizzle. Scalars broadcast on use.
    #[derive(Debug, Clone, Copy)]
    struct Read {
        comps: [f32; 4],
        width: usize,
    }

    impl Read {
        const fn scalar(v: f32) -> Self {
            Self {
                comps: [v, v, v, v],
                width: 1,
            }
        }

        fn at(&self, i: usize) -> f32 {
            self.comps[if self.width == 1 { 0 } else { i }]
        }
    }

    pub struct Machine<'a> {
        pool: &'a ParamPool,
        slots: FxHashMap<ParamId, Value>,
        discarded: bool,
    }

    impl<'a> Machine<'a> {
        pub fn new(pool: &'a ParamPool) -> Self {
            Self {
                pool,
                slots: FxHashMap::default(),
                discarded: false,
            }
        }

        pub fn set(&mut self, id: ParamId, value: Value) {
            self.slots.insert(id, value);
        }

        pub fn value(&self, id: ParamId) -> Value {
            self.slot(id).clone()
        }

        /// The padded vector held in `id`, as a `Vec4`.
        pub fn vec4(&self, id: ParamId) -> Vec4 {
            let Value::Vec(v) = self.slot(id) else {
                panic!("{} does not hold a vector", self.name(id));
            };
            Vec4::from_array(*v)
        }

        pub const fn discarded(&self) -> bool {
            self.discarded
        }

        pub fn run(&mut self, function: &Function) {
            for atom in function.atoms() {
                self.step(atom);
            }
        }

        fn name(&self, id: ParamId) -> &str {
            interner::resolve(self.pool.get(id).name)
        }

        fn slot(&self, id: ParamId) -> &Value {
            self.slots
                .get(&id)
                .unwrap_or_else(|| panic!("{} read before it was fed or written", self.name(id)))
        }

        fn subscript(&self, index: ArrayIndex) -> usize {
            match index {
                ArrayIndex::Literal(i) => i as usize,
                // The emitted `int(...)` cast truncates, as does `as usize`.
                ArrayIndex::Dynamic { param, comp } => {
                    let Value::Vec(v) = self.slot(param) else {
                        panic!("{} is not a vector subscript", self.name(param));
                    };
                    v[usize::from(comp.index())] as usize
                }
            }
        }

        fn read(&self, op: &Operand) -> Read {
            match op.kind {
                OperandKind::Literal(v) => Read::scalar(v),
                OperandKind::Param(id) => {
                    let base = match (self.slot(id), op.index) {
                        (Value::Vec(v), None) => *v,
                        (Value::VecArray(a), Some(index)) => a[self.subscript(index)],
                        (other, _) => {
                            panic!("{} holds {other:?}, expected a vector", self.name(id))
                        }
                    };
                    if op.swizzle.is_empty() {
                        let width = self
                            .pool
                            .get(id)
                            .ty
                            .width()
                            .expect("vector-typed operand");
                        Read {
                            comps: base,
                            width: usize::from(width),
                        }
                    } else {
                        let mut comps = [0.0; 4];
                        for (i, c) in op.swizzle.iter().enumerate() {
                            comps[i] = base[usize::from(c.index())];
                        }
                        Read {
                            comps,
                            width: op.swizzle.len(),
                        }
                    }
                }
            }
        }

        fn read_mat(&self, op: &Operand) -> Mat4 {
            let OperandKind::Param(id) = op.kind else {
                panic!("literal in a matrix position");
            };
            match (self.slot(id), op.index) {
                (Value::Mat(m), None) => *m,
                (Value::MatArray(a), Some(index)) => a[self.subscript(index)],
                (other, _) => panic!("{} holds {other:?}, expected a matrix", self.name(id)),
            }
        }

        fn write(&mut self, dst: &Operand, src: Read) {
            let OperandKind::Param(id) = dst.kind else {
                panic!("literal destination");
            };
            let width = usize::from(self.pool.get(id).ty.width().expect("vector destination"));
            let entry = self
                .slots
                .entry(id)
                .or_insert(Value::Vec([0.0; 4]));
            let Value::Vec(v) = entry else {
                panic!("vector write into a non-vector slot");
            };
            if dst.swizzle.is_empty() {
                for i in 0..width {
                    v[i] = src.at(i);
                }
            } else {
                for (i, c) in dst.swizzle.iter().enumerate() {
                    v[usize::from(c.index())] = src.at(i);
                }
            }
        }

        fn dst_width(&self, dst: &Operand) -> usize {
            if dst.swizzle.is_empty() {
                let OperandKind::Param(id) = dst.kind else {
                    panic!("literal destination");
                };
                usize::from(self.pool.get(id).ty.width().expect("vector destination"))
            } else {
                dst.swizzle.len()
            }
        }

        fn map2(&mut self, ops: &[Operand], f: impl Fn(f32, f32) -> f32) {
            let a = self.read(&ops[1]);
            let b = self.read(&ops[2]);
            let width = self.dst_width(&ops[0]);
            let mut comps = [0.0; 4];
            for (i, c) in comps.iter_mut().enumerate().take(width) {
                *c = f(a.at(i), b.at(i));
            }
            self.write(&ops[0], Read { comps, width });
        }

        fn map3(&mut self, ops: &[Operand], f: impl Fn(f32, f32, f32) -> f32) {
            let a = self.read(&ops[1]);
            let b = self.read(&ops[2]);
            let c = self.read(&ops[3]);
            let width = self.dst_width(&ops[0]);
            let mut comps = [0.0; 4];
            for (i, out) in comps.iter_mut().enumerate().take(width) {
                *out = f(a.at(i), b.at(i), c.at(i));
            }
            self.write(&ops[0], Read { comps, width });
        }

        fn step(&mut self, atom: &Atom) {
            let ops = &atom.operands[..];
            match atom.opcode {
                Opcode::Assign => {
                    let src_ty = ops[1].effective_type(self.pool).expect("typed operand");
                    if src_ty.is_matrix() {
                        let m = self.read_mat(&ops[1]);
                        let OperandKind::Param(id) = ops[0].kind else {
                            panic!("literal destination");
                        };
                        self.slots.insert(id, Value::Mat(m));
                    } else {
                        let v = self.read(&ops[1]);
                        self.write(&ops[0], v);
                    }
                }
                Opcode::Add => self.map2(ops, |a, b| a + b),
                Opcode::Subtract => self.map2(ops, |a, b| a - b),
                Opcode::Multiply => {
                    let lhs_ty = ops[1].effective_type(self.pool).expect("typed operand");
                    if lhs_ty.is_matrix() {
                        let m = self.read_mat(&ops[1]);
                        let v = self.read(&ops[2]);
                        let out = m * Vec4::from_array(v.comps);
                        self.write(
                            &ops[0],
                            Read {
                                comps: out.to_array(),
                                width: 4,
                            },
                        );
                    } else {
                        self.map2(ops, |a, b| a * b);
                    }
                }
                Opcode::Divide => self.map2(ops, |a, b| a / b),
                Opcode::Dot => {
                    let a = self.read(&ops[1]);
                    let b = self.read(&ops[2]);
                    let sum = (0..a.width.max(b.width)).map(|i| a.at(i) * b.at(i)).sum();
                    self.write(&ops[0], Read::scalar(sum));
                }
                Opcode::Cross => {
                    let a = self.read(&ops[1]);
                    let b = self.read(&ops[2]);
                    let comps = [
                        a.at(1) * b.at(2) - a.at(2) * b.at(1),
                        a.at(2) * b.at(0) - a.at(0) * b.at(2),
                        a.at(0) * b.at(1) - a.at(1) * b.at(0),
                        0.0,
                    ];
                    self.write(&ops[0], Read { comps, width: 3 });
                }
                Opcode::Max => self.map2(ops, f32::max),
                Opcode::Clamp => self.map3(ops, f32::clamp),
                Opcode::Lerp => self.map3(ops, |x, y, t| x + (y - x) * t),
                Opcode::Pow => self.map2(ops, f32::powf),
                Opcode::Normalize => {
                    let src = self.read(&ops[1]);
                    let len = (0..src.width)
                        .map(|i| src.at(i) * src.at(i))
                        .sum::<f32>()
                        .sqrt();
                    let mut comps = [0.0; 4];
                    for (i, c) in comps.iter_mut().enumerate().take(src.width) {
                        *c = src.at(i) / len;
                    }
                    self.write(
                        &ops[0],
                        Read {
                            comps,
                            width: src.width,
                        },
                    );
                }
                Opcode::Length => {
                    let src = self.read(&ops[1]);
                    let len = (0..src.width)
                        .map(|i| src.at(i) * src.at(i))
                        .sum::<f32>()
                        .sqrt();
                    self.write(&ops[0], Read::scalar(len));
                }
                Opcode::Reflect => {
                    let i = self.read(&ops[1]);
                    let n = self.read(&ops[2]);
                    let d = (0..3).map(|k| i.at(k) * n.at(k)).sum::<f32>();
                    let mut comps = [0.0; 4];
                    for (k, c) in comps.iter_mut().enumerate().take(3) {
                        *c = i.at(k) - 2.0 * d * n.at(k);
                    }
                    self.write(&ops[0], Read { comps, width: 3 });
                }
                Opcode::Exp => {
                    let src = self.read(&ops[1]);
                    let width = self.dst_width(&ops[0]);
                    let mut comps = [0.0; 4];
                    for (i, c) in comps.iter_mut().enumerate().take(width) {
                        *c = src.at(i).exp();
                    }
                    self.write(&ops[0], Read { comps, width });
                }
                Opcode::Abs => {
                    let src = self.read(&ops[1]);
                    let width = self.dst_width(&ops[0]);
                    let mut comps = [0.0; 4];
                    for (i, c) in comps.iter_mut().enumerate().take(width) {
                        *c = src.at(i).abs();
                    }
                    self.write(&ops[0], Read { comps, width });
                }
                Opcode::Sample => {
                    let OperandKind::Param(sampler) = ops[1].kind else {
                        panic!("sampler operand must be a parameter");
                    };
                    let Value::Texel(texel) = self.slot(sampler) else {
                        panic!("{} is not bound to a texel", self.name(sampler));
                    };
                    let comps = *texel;
                    self.write(&ops[0], Read { comps, width: 4 });
                }
                Opcode::AlphaTest(func) => {
                    let a = self.read(&ops[0]).at(0);
                    let b = self.read(&ops[1]).at(0);
                    if !passes(func, a, b) {
                        self.discarded = true;
                    }
                }
            }
        }
    }

    fn passes(func: CompareFunc, a: f32, b: f32) -> bool {
        match func {
            CompareFunc::AlwaysFail => false,
            CompareFunc::AlwaysPass => true,
            CompareFunc::Less => a < b,
            CompareFunc::LessEqual => a <= b,
            // The emitted comparisons are exact, so the interpreter's are too.
            CompareFunc::Equal => (a - b).abs() == 0.0,
            CompareFunc::NotEqual => (a - b).abs() > 0.0,
            CompareFunc::GreaterEqual => a >= b,
            CompareFunc::Greater => a > b,
        }
    }
}

// ============================================================================
// Scene and vertex fixtures
// ============================================================================

struct SceneLight {
    kind: LightType,
    position: Vec4,
    /// Points from the light into the scene, `w` zero.
    direction: Vec4,
    diffuse: Vec4,
    specular: Vec4,
    /// `(range, constant, linear, quadratic)`.
    attenuation: Vec4,
    /// `(cos inner, cos outer, falloff, 0)`.
    spot: Vec4,
}

fn directional(direction: Vec3, diffuse: Vec4) -> SceneLight {
    SceneLight {
        kind: LightType::Directional,
        position: Vec4::ZERO,
        direction: direction.extend(0.0),
        diffuse,
        specular: Vec4::ONE,
        attenuation: Vec4::new(100.0, 1.0, 0.0, 0.0),
        spot: Vec4::ZERO,
    }
}

fn point(position: Vec3, diffuse: Vec4, attenuation: Vec4) -> SceneLight {
    SceneLight {
        kind: LightType::Point,
        position: position.extend(1.0),
        direction: Vec4::ZERO,
        diffuse,
        specular: Vec4::ONE,
        attenuation,
        spot: Vec4::ZERO,
    }
}

fn spot(position: Vec3, axis: Vec3, cone: Vec4, attenuation: Vec4) -> SceneLight {
    SceneLight {
        kind: LightType::Spot,
        position: position.extend(1.0),
        direction: axis.extend(0.0),
        diffuse: Vec4::ONE,
        specular: Vec4::ONE,
        attenuation,
        spot: cone,
    }
}

/// Everything the auto-bound uniforms are fed from at "draw" time.
struct Scene {
    world: Mat4,
    view: Mat4,
    proj: Mat4,
    camera: Vec3,
    ambient_light: Vec4,
    lights: Vec<SceneLight>,
    fog_colour: Vec4,
    fog_params: Vec4,
    surface: SurfaceParams,
    alpha_reject: f32,
    texel: Vec4,
}

/// A scene whose bindable state mirrors the pass, with identity transforms
/// until a test swaps its own in.
fn scene_for(pass: &Pass) -> Scene {
    Scene {
        world: Mat4::IDENTITY,
        view: Mat4::IDENTITY,
        proj: Mat4::IDENTITY,
        camera: Vec3::new(0.25, -0.5, 3.0),
        ambient_light: Vec4::new(0.1, 0.1, 0.1, 1.0),
        lights: Vec::new(),
        fog_colour: pass.fog.colour,
        fog_params: Vec4::new(
            pass.fog.density,
            pass.fog.start,
            pass.fog.end,
            1.0 / (pass.fog.end - pass.fog.start),
        ),
        surface: pass.surface,
        alpha_reject: pass.alpha_test.map_or(0.0, |t| t.reference),
        texel: Vec4::new(0.5, 0.5, 0.5, 0.5),
    }
}

struct VertexData {
    position: Vec4,
    normal: Vec3,
    uv: Vec2,
    colour: Vec4,
}

fn vertex() -> VertexData {
    VertexData {
        position: Vec4::new(0.25, -0.5, 1.0, 1.0),
        normal: Vec3::Z,
        uv: Vec2::new(0.3, 0.7),
        colour: Vec4::ONE,
    }
}

fn auto_value(key: AutoKey, scene: &Scene, array_len: Option<u32>) -> Value {
    let pad3 = |v: Vec3| Value::Vec([v.x, v.y, v.z, 0.0]);
    let full = |v: Vec4| Value::Vec(v.to_array());
    let scalar = |v: f32| Value::Vec([v, 0.0, 0.0, 0.0]);
    let per_light = |f: &dyn Fn(&SceneLight) -> Vec4| {
        let n = array_len.unwrap_or(1) as usize;
        Value::VecArray(
            (0..n)
                .map(|i| scene.lights.get(i).map_or([0.0; 4], |l| f(l).to_array()))
                .collect(),
        )
    };
    match key {
        AutoKey::WorldMatrix => Value::Mat(scene.world),
        AutoKey::ViewMatrix => Value::Mat(scene.view),
        AutoKey::ProjMatrix => Value::Mat(scene.proj),
        AutoKey::ViewProjMatrix => Value::Mat(scene.proj * scene.view),
        AutoKey::WorldViewMatrix => Value::Mat(scene.view * scene.world),
        AutoKey::WorldViewProjMatrix => Value::Mat(scene.proj * scene.view * scene.world),
        AutoKey::InvTransWorldMatrix => Value::Mat(scene.world.inverse().transpose()),
        AutoKey::CameraPositionWorld => pad3(scene.camera),
        AutoKey::AmbientLightColour => full(scene.ambient_light),
        AutoKey::SurfaceAmbient => full(scene.surface.ambient),
        AutoKey::SurfaceDiffuse => full(scene.surface.diffuse),
        AutoKey::SurfaceSpecular => full(scene.surface.specular),
        AutoKey::SurfaceEmissive => full(scene.surface.emissive),
        AutoKey::SurfaceShininess => scalar(scene.surface.shininess),
        AutoKey::LightPositionArray => per_light(&|l| l.position),
        AutoKey::LightDirectionArray => per_light(&|l| l.direction),
        AutoKey::LightDiffuseArray => per_light(&|l| l.diffuse),
        AutoKey::LightSpecularArray => per_light(&|l| l.specular),
        AutoKey::LightAttenuationArray => per_light(&|l| l.attenuation),
        AutoKey::SpotParamsArray => per_light(&|l| l.spot),
        AutoKey::FogColour => full(scene.fog_colour),
        AutoKey::FogParams => full(scene.fog_params),
        AutoKey::TextureMatrix(_) | AutoKey::TextureViewProj(_) => Value::Mat(Mat4::IDENTITY),
        AutoKey::BoneMatrixArray => {
            Value::MatArray(vec![Mat4::IDENTITY; array_len.unwrap_or(1) as usize])
        }
        AutoKey::AlphaRejectValue => scalar(scene.alpha_reject),
    }
}

fn feed_uniforms(machine: &mut Machine<'_>, pool: &ParamPool, scene: &Scene) {
    for (id, param) in pool.iter() {
        if param.class != ParamClass::Uniform {
            continue;
        }
        let value = match param.auto {
            Some(key) => auto_value(key, scene, param.array_len),
            None => Value::Texel(scene.texel.to_array()),
        };
        machine.set(id, value);
    }
}

fn feed_vertex(machine: &mut Machine<'_>, pool: &ParamPool, function: &Function, v: &VertexData) {
    for id in function.inputs() {
        let param = pool.get(*id);
        let value = match param.content {
            Some(Content::PositionObject) => v.position.to_array(),
            Some(Content::NormalObject) => [v.normal.x, v.normal.y, v.normal.z, 0.0],
            Some(Content::TexCoord(_)) => [v.uv.x, v.uv.y, 0.0, 0.0],
            Some(Content::ColourDiffuse) => v.colour.to_array(),
            Some(Content::BlendWeights) => [1.0, 0.0, 0.0, 0.0],
            Some(Content::BlendIndices) => [0.0; 4],
            other => panic!("no fixture data for vertex input {other:?}"),
        };
        machine.set(*id, Value::Vec(value));
    }
}

struct Shaded {
    clip: Vec4,
    colour: Vec4,
    discarded: bool,
}

/// Runs both stages of a generated program over one vertex.
fn shade(program: &GeneratedProgram, scene: &Scene, v: &VertexData) -> Shaded {
    let set = &program.set;

    let mut vs = Machine::new(&set.pool);
    feed_uniforms(&mut vs, &set.pool, scene);
    feed_vertex(&mut vs, &set.pool, &set.vertex, v);
    vs.run(&set.vertex);

    let mut fs = Machine::new(&set.pool);
    feed_uniforms(&mut fs, &set.pool, scene);
    for inp in set.fragment.inputs() {
        let name = set.pool.get(*inp).name;
        let out = set
            .vertex
            .outputs()
            .iter()
            .find(|id| set.pool.get(**id).name == name)
            .unwrap_or_else(|| {
                panic!("fragment input {} has no vertex writer", interner::resolve(name))
            });
        fs.set(*inp, vs.value(*out));
    }
    fs.run(&set.fragment);

    let clip = set
        .vertex
        .outputs()
        .iter()
        .find(|id| set.pool.get(**id).content == Some(Content::PositionProjective))
        .copied()
        .expect("clip position output");
    let o_color = set
        .fragment
        .outputs()
        .iter()
        .find(|id| set.pool.get(**id).class == ParamClass::FragmentOutput)
        .copied()
        .expect("colour output");

    Shaded {
        clip: vs.vec4(clip),
        colour: fs.vec4(o_color),
        discarded: fs.discarded(),
    }
}

fn generate(pass: Pass, lights: LightCounts) -> Arc<GeneratedProgram> {
    let generator = ShaderGenerator::new(GeneratorConfig::default()).unwrap();
    let mut material = Material::new("fixture");
    material
        .techniques
        .push(Technique::new(interner::intern("main"), vec![pass]));
    assert!(generator.create_shader_based_technique(&mut material, "main", SCHEME));
    generator
        .validate_material(&material, SCHEME, lights)
        .unwrap();
    generator.program_for(material.id(), SCHEME, 0).unwrap()
}

// ============================================================================
// Reference equations
// ============================================================================

/// The classic world-space lighting sum, computed directly with glam:
/// ambient and emissive base, per-light diffuse with polynomial attenuation
/// and spot cone falloff, optional inline Blinn specular, saturated at the
/// end with the surface alpha appended.
fn lit_reference(scene: &Scene, normal: Vec3, world_pos: Vec3, with_specular: bool) -> Vec4 {
    let surface = &scene.surface;
    let mut acc =
        (scene.ambient_light * surface.ambient).truncate() + surface.emissive.truncate();
    let mut spec = Vec3::ZERO;
    for light in &scene.lights {
        let (l, atten) = match light.kind {
            LightType::Directional => (-light.direction.truncate().normalize(), 1.0),
            LightType::Point | LightType::Spot => {
                let to_light = light.position.truncate() - world_pos;
                let d = to_light.length();
                let a = light.attenuation;
                let mut atten = 1.0 / (a.y + a.z * d + a.w * d * d);
                if light.kind == LightType::Spot {
                    let axis = light.direction.truncate().normalize();
                    let rho = -(to_light / d).dot(axis);
                    let t = ((rho - light.spot.y) / (light.spot.x - light.spot.y))
                        .clamp(0.0, 1.0);
                    atten *= t.powf(light.spot.z);
                }
                (to_light / d, atten)
            }
        };
        let ndl = normal.dot(l).max(0.0);
        acc += (light.diffuse * surface.diffuse).truncate() * ndl * atten;
        if with_specular {
            let view = (scene.camera - world_pos).normalize();
            let half = (l + view).normalize();
            let ndh = normal.dot(half).max(0.0).powf(surface.shininess);
            spec += (light.specular * surface.specular).truncate() * ndh * atten;
        }
    }
    (acc + spec).clamp(Vec3::ZERO, Vec3::ONE).extend(surface.diffuse.w)
}

fn assert_close(actual: Vec4, expected: Vec4, tolerance: f32, what: &str) {
    let delta = (actual - expected).abs().max_element();
    assert!(
        delta <= tolerance,
        "{what}: got {actual}, expected {expected} (delta {delta})"
    );
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn directional_gouraud_matches_the_reference_equation() {
    let mut pass = Pass::default();
    pass.lighting = true;
    pass.surface.ambient = Vec4::new(0.3, 0.3, 0.3, 1.0);
    pass.surface.diffuse = Vec4::new(0.8, 0.6, 0.4, 0.9);
    pass.surface.emissive = Vec4::new(0.05, 0.0, 0.0, 1.0);
    let program = generate(pass.clone(), LightCounts::new(1, 0, 0));

    let mut scene = scene_for(&pass);
    scene.world = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
    scene.view = Mat4::from_translation(Vec3::new(0.0, 0.0, -8.0));
    scene.proj = Mat4::perspective_rh_gl(60_f32.to_radians(), 1.5, 0.1, 100.0);
    scene
        .lights
        .push(directional(-Vec3::Z, Vec4::new(1.0, 0.5, 0.25, 1.0)));

    let v = vertex();
    let shaded = shade(&program, &scene, &v);

    // A translated world leaves the normal alone, so the lit colour matches
    // the reference evaluated with the untransformed normal.
    let world_pos = (scene.world * v.position).truncate();
    let expected = lit_reference(&scene, v.normal, world_pos, false);
    assert_close(shaded.colour, expected, 1e-5, "gouraud colour");

    let clip = scene.proj * scene.view * scene.world * v.position;
    assert_close(shaded.clip, clip, 1e-6, "clip position");
    assert!(!shaded.discarded);
}

#[test]
fn per_pixel_point_light_attenuates_and_saturates() {
    let mut pass = Pass::default();
    pass.lighting = true;
    pass.shading = ShadingModel::Phong;
    pass.surface.ambient = Vec4::new(0.2, 0.2, 0.2, 1.0);
    pass.surface.diffuse = Vec4::new(0.8, 0.6, 0.4, 1.0);
    pass.surface.specular = Vec4::ONE;
    pass.surface.shininess = 8.0;
    let program = generate(pass.clone(), LightCounts::new(0, 1, 0));
    assert!(
        program.fragment_source.contains("u_light_position"),
        "phong shading must evaluate lights in the fragment stage"
    );

    let mut scene = scene_for(&pass);
    scene.view = Mat4::from_translation(Vec3::new(0.0, 0.0, -4.0));
    scene.proj = Mat4::perspective_rh_gl(45_f32.to_radians(), 1.0, 0.1, 50.0);
    scene.lights.push(point(
        Vec3::new(0.25, -0.5, 6.0),
        Vec4::ONE,
        Vec4::new(100.0, 1.0, 0.1, 0.01),
    ));

    let v = vertex();
    let shaded = shade(&program, &scene, &v);

    let expected = lit_reference(&scene, v.normal, v.position.truncate(), true);
    assert_close(shaded.colour, expected, 1e-5, "point light colour");
    // Diffuse plus specular overshoots on the red channel; the write-back
    // saturates it.
    assert!((shaded.colour.x - 1.0).abs() < 1e-6);
    assert!(shaded.colour.y < 1.0);
}

#[test]
fn spot_cone_scales_the_diffuse_term() {
    let mut pass = Pass::default();
    pass.lighting = true;
    pass.surface.ambient = Vec4::new(0.0, 0.0, 0.0, 1.0);
    pass.surface.diffuse = Vec4::ONE;
    let program = generate(pass.clone(), LightCounts::new(0, 0, 1));

    let mut scene = scene_for(&pass);
    // Light above and ahead of the vertex, cone axis straight down the -z
    // axis: rho lands between the cones, so the falloff curve is live.
    scene.lights.push(spot(
        Vec3::new(3.25, -0.5, 5.0),
        -Vec3::Z,
        Vec4::new(0.9, 0.5, 2.0, 0.0),
        Vec4::new(100.0, 1.0, 0.1, 0.01),
    ));

    let v = vertex();
    let shaded = shade(&program, &scene, &v);

    let expected = lit_reference(&scene, v.normal, v.position.truncate(), false);
    assert_close(shaded.colour, expected, 1e-5, "spot colour");
    // The cone term must actually bite: the same light as a plain point
    // light would be brighter.
    let mut as_point = scene;
    as_point.lights[0].kind = LightType::Point;
    let brighter = lit_reference(&as_point, v.normal, v.position.truncate(), false);
    assert!(shaded.colour.x < brighter.x);
}

#[test]
fn modulated_texture_and_alpha_test_use_bound_values() {
    let mut pass = Pass::default();
    pass.surface.diffuse = Vec4::new(1.0, 1.0, 0.5, 0.8);
    pass.texture_units.push(TextureUnit::default());
    pass.alpha_test = Some(AlphaTest {
        func: CompareFunc::GreaterEqual,
        reference: 0.5,
    });
    let program = generate(pass.clone(), LightCounts::default());

    let mut scene = scene_for(&pass);
    let v = vertex();

    let shaded = shade(&program, &scene, &v);
    let expected = scene.surface.diffuse * scene.texel;
    assert_close(shaded.colour, expected, 1e-6, "modulated colour");
    assert!(
        shaded.discarded,
        "alpha {} sits below the reference {}",
        expected.w, scene.alpha_reject
    );

    // The reference rides an auto-bound constant: lowering it flips the
    // verdict without touching the program.
    scene.alpha_reject = 0.25;
    let kept = shade(&program, &scene, &v);
    assert!(!kept.discarded);
    assert_close(kept.colour, expected, 1e-6, "modulated colour");
}

#[test]
fn exp2_fog_folds_colour_towards_the_fog_colour() {
    let mut pass = Pass::default();
    pass.surface.diffuse = Vec4::new(0.3, 0.9, 0.6, 1.0);
    pass.fog.mode = FogMode::Exp2;
    pass.fog.density = 0.2;
    pass.fog.colour = Vec4::new(0.6, 0.7, 0.8, 1.0);
    let program = generate(pass.clone(), LightCounts::default());

    let scene = scene_for(&pass);
    let mut v = vertex();
    // Two units in front of the identity camera, which looks down -z.
    v.position = Vec4::new(0.3, 0.4, -2.0, 1.0);

    let shaded = shade(&program, &scene, &v);

    let scaled = 2.0 * pass.fog.density;
    let factor = (-(scaled * scaled)).exp().clamp(0.0, 1.0);
    let expected = pass
        .fog
        .colour
        .truncate()
        .lerp(pass.surface.diffuse.truncate(), factor);
    assert_close(
        shaded.colour,
        expected.extend(1.0),
        1e-5,
        "fogged colour",
    );
    // Only the colour sinks; alpha rides through.
    assert!((shaded.colour.w - pass.surface.diffuse.w).abs() < 1e-6);
}

#[test]
fn identity_bone_skinning_reduces_to_the_rigid_transform() {
    let mut pass = Pass::default();
    pass.lighting = true;
    pass.surface.ambient = Vec4::new(0.3, 0.3, 0.3, 1.0);
    pass.surface.diffuse = Vec4::new(0.8, 0.6, 0.4, 0.9);
    pass.skinning = Some(SkinningInfo {
        bone_count: 4,
        weight_count: 4,
    });
    let program = generate(pass.clone(), LightCounts::new(1, 0, 0));

    let mut scene = scene_for(&pass);
    scene.view = Mat4::from_translation(Vec3::new(0.0, 0.0, -6.0));
    scene.proj = Mat4::perspective_rh_gl(60_f32.to_radians(), 1.0, 0.1, 100.0);
    scene
        .lights
        .push(directional(-Vec3::Z, Vec4::new(1.0, 1.0, 1.0, 1.0)));

    let v = vertex();
    let shaded = shade(&program, &scene, &v);

    // Identity bones with weights (1, 0, 0, 0) leave the position alone;
    // the skinned path then applies view-projection to it.
    let clip = scene.proj * scene.view * v.position;
    assert_close(shaded.clip, clip, 1e-6, "skinned clip position");

    let expected = lit_reference(&scene, v.normal, v.position.truncate(), false);
    assert_close(shaded.colour, expected, 1e-5, "skinned lit colour");
}
