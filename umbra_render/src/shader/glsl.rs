// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! GLSL fragment shader generation.
//!
//! The generated shader expects the effect input bound to `sampler0`, its
//! texture coordinate in `gl_TexCoord[0]`, and the effect's constant
//! bindings in the `InConstant` uniform array.

use super::{Dst, Instruction, Opcode, Program, RegisterKind, Src, SrcModifier};

const LANES: [char; 4] = ['x', 'y', 'z', 'w'];

/// Emits a GLSL fragment shader equivalent to `program`.
#[must_use]
pub fn emit(program: &Program) -> String {
    let mut out = String::new();

    for &(index, v) in &program.defs {
        out.push_str(&format!(
            "const vec4 {} = vec4({}, {}, {}, {});\n",
            def_name(index),
            float(v[0]),
            float(v[1]),
            float(v[2]),
            float(v[3]),
        ));
    }
    for &s in &program.samplers {
        out.push_str(&format!("uniform sampler2D sampler{s};\n"));
    }
    if let Some(last) = program.last_uniform_constant() {
        out.push_str(&format!("uniform vec4 InConstant[{}];\n", last + 1));
    }

    let uses = |op: Opcode| program.instructions.iter().any(|i| i.op == op);
    if uses(Opcode::SinCos) {
        out.push_str(
            "vec4 sincos(in vec4 v)\n{\n    return vec4(cos(v.w), sin(v.w), 0.0, 0.0);\n}\n",
        );
    }
    if uses(Opcode::Cmp) {
        out.push_str(
            "vec4 cmp(in vec4 src0, in vec4 src1, in vec4 src2)\n{\n    \
             return mix(src1, src2, vec4(lessThan(src0, vec4(0.0))));\n}\n",
        );
    }

    out.push_str("void main()\n{\n");
    for t in program.temps() {
        out.push_str(&format!("    vec4 tmp{t} = vec4(0.0);\n"));
    }
    for inst in &program.instructions {
        if let Some(line) = statement(program, inst) {
            out.push_str("    ");
            out.push_str(&line);
            out.push('\n');
        }
    }
    out.push_str("}\n");
    out
}

fn statement(program: &Program, inst: &Instruction) -> Option<String> {
    let s: Vec<String> = inst.sources().iter().map(|s| source(program, s)).collect();
    let expr = match inst.op {
        Opcode::Nop => return None,
        Opcode::Mov => s[0].clone(),
        Opcode::Add => format!("({} + {})", s[0], s[1]),
        Opcode::Sub => format!("({} - {})", s[0], s[1]),
        Opcode::Mul => format!("({} * {})", s[0], s[1]),
        Opcode::Mad => format!("({} * {} + {})", s[0], s[1], s[2]),
        Opcode::Rcp => format!("(1.0 / {})", s[0]),
        Opcode::Rsq => format!("inversesqrt({})", s[0]),
        Opcode::Dp4 => format!("vec4(dot({}, {}))", s[0], s[1]),
        Opcode::Min => format!("min({}, {})", s[0], s[1]),
        Opcode::Max => format!("max({}, {})", s[0], s[1]),
        Opcode::Exp => format!("exp2({})", s[0]),
        Opcode::Log => format!("log2({})", s[0]),
        Opcode::Lrp => format!("mix({}, {}, {})", s[2], s[1], s[0]),
        Opcode::Frc => format!("fract({})", s[0]),
        Opcode::Pow => format!("pow({}, {})", s[0], s[1]),
        Opcode::Abs => format!("abs({})", s[0]),
        Opcode::SinCos => format!("sincos({})", s[0]),
        Opcode::Tex => format!("texture2D({}, vec2({}))", s[1], s[0]),
        Opcode::Cmp => format!("cmp({}, {}, {})", s[0], s[1], s[2]),
    };
    Some(assignment(&inst.dst, expr))
}

fn assignment(dst: &Dst, expr: String) -> String {
    let name = match dst.reg.kind {
        RegisterKind::ColorOut => String::from("gl_FragColor"),
        _ => format!("tmp{}", dst.reg.index),
    };
    let expr = if dst.saturate {
        format!("clamp({expr}, 0.0, 1.0)")
    } else {
        expr
    };
    if dst.mask == 0xF {
        return format!("{name} = {expr};");
    }
    let lanes: String = LANES
        .iter()
        .enumerate()
        .filter(|(i, _)| dst.mask & (1 << i) != 0)
        .map(|(_, c)| *c)
        .collect();
    format!("{name}.{lanes} = ({expr}).{lanes};")
}

fn source(program: &Program, src: &Src) -> String {
    let index = src.reg.index;
    let mut base = match src.reg.kind {
        RegisterKind::Temp => format!("tmp{index}"),
        RegisterKind::Const => match program.def(index) {
            Some(_) => def_name(index),
            None => format!("InConstant[{index}]"),
        },
        RegisterKind::Texture => String::from("gl_TexCoord[0]"),
        RegisterKind::Sampler => format!("sampler{index}"),
        RegisterKind::ColorOut => String::from("gl_FragColor"),
    };
    if !src.is_identity_swizzle() {
        base.push('.');
        base.extend(src.swizzle.iter().map(|&l| LANES[usize::from(l)]));
    }
    match src.modifier {
        SrcModifier::None => base,
        SrcModifier::Negate => format!("(-{base})"),
        SrcModifier::Abs => format!("abs({base})"),
    }
}

/// Name of the immediate for constant register `index`; `2` is the
/// constant register type.
fn def_name(index: u32) -> String {
    format!("imm2_{index}")
}

fn float(v: f32) -> String {
    format!("{v:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::asm::*;
    use crate::shader::parse;

    #[test]
    fn passthrough_samples_input() {
        let glsl = emit(&parse(&passthrough()).unwrap());
        assert!(glsl.contains("uniform sampler2D sampler0;\n"), "{glsl}");
        assert!(glsl.contains("vec4 tmp0 = vec4(0.0);"), "{glsl}");
        assert!(
            glsl.contains("tmp0 = texture2D(sampler0, vec2(gl_TexCoord[0]));"),
            "{glsl}"
        );
        assert!(glsl.contains("gl_FragColor = tmp0;"), "{glsl}");
        assert!(!glsl.contains("InConstant"), "no uniforms read");
        assert!(glsl.ends_with("}\n"), "closed main");
    }

    #[test]
    fn constants_and_immediates() {
        let mut t = vec![PS_2_0];
        t.extend(def(1, [0.5, 0.25, 1.0, 2.0]));
        t.extend([
            op(OP_MAD, 4),
            dst(REG_TEMP, 2, 0xF),
            src(REG_CONST, 1),
            src(REG_CONST, 4),
            src(REG_CONST, 0),
            op(OP_MOV, 2),
            dst(REG_COLOROUT, 0, 0xF),
            src(REG_TEMP, 2),
            END,
        ]);
        let glsl = emit(&parse(&t).unwrap());
        assert!(
            glsl.contains("const vec4 imm2_1 = vec4(0.5, 0.25, 1.0, 2.0);"),
            "{glsl}"
        );
        assert!(glsl.contains("uniform vec4 InConstant[5];"), "{glsl}");
        assert!(
            glsl.contains("tmp2 = (imm2_1 * InConstant[4] + InConstant[0]);"),
            "{glsl}"
        );
    }

    #[test]
    fn select_and_interpolate_helpers() {
        let t = [
            PS_2_0,
            op(OP_CMP, 4),
            dst(REG_TEMP, 0, 0xF),
            src(REG_TEMP, 1),
            src(REG_TEMP, 2),
            src(REG_TEMP, 3),
            op(OP_LRP, 4),
            dst(REG_TEMP, 4, 0xF),
            src(REG_TEMP, 1),
            src(REG_TEMP, 2),
            src(REG_TEMP, 3),
            END,
        ];
        let glsl = emit(&parse(&t).unwrap());
        assert!(
            glsl.contains("return mix(src1, src2, vec4(lessThan(src0, vec4(0.0))));"),
            "{glsl}"
        );
        assert!(glsl.contains("tmp0 = cmp(tmp1, tmp2, tmp3);"), "{glsl}");
        assert!(glsl.contains("tmp4 = mix(tmp3, tmp2, tmp1);"), "{glsl}");
    }

    #[test]
    fn exp_and_log_are_base_two() {
        let t = [
            PS_2_0,
            op(OP_EXP, 2),
            dst(REG_TEMP, 0, 0xF),
            src(REG_TEMP, 1),
            op(OP_LOG, 2),
            dst(REG_TEMP, 1, 0xF),
            src(REG_TEMP, 0),
            END,
        ];
        let glsl = emit(&parse(&t).unwrap());
        assert!(glsl.contains("tmp0 = exp2(tmp1);"), "{glsl}");
        assert!(glsl.contains("tmp1 = log2(tmp0);"), "{glsl}");
    }

    #[test]
    fn masks_modifiers_and_saturate() {
        let t = [
            PS_2_0,
            op(OP_ADD, 3),
            sat(dst(REG_TEMP, 0, 0x5)),
            neg(swz(src(REG_TEMP, 1), [3, 3, 3, 3])),
            abs(src(REG_TEMP, 2)),
            op(OP_SINCOS, 2),
            dst(REG_TEMP, 3, 0x3),
            swz(src(REG_TEMP, 0), [0, 0, 0, 0]),
            END,
        ];
        let glsl = emit(&parse(&t).unwrap());
        assert!(
            glsl.contains("tmp0.xz = (clamp(((-tmp1.wwww) + abs(tmp2)), 0.0, 1.0)).xz;"),
            "{glsl}"
        );
        assert!(glsl.contains("vec4 sincos(in vec4 v)"), "{glsl}");
        assert!(glsl.contains("tmp3.xy = (sincos(tmp0.xxxx)).xy;"), "{glsl}");
    }
}
