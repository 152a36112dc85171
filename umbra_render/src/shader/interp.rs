// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-pixel evaluation of parsed shaders.

use super::{MAX_CONSTANTS, Opcode, Program, RegisterKind, Src, SrcModifier};
use crate::blur::Pixels;

type Vec4 = [f32; 4];

/// Evaluates a [`Program`] one pixel at a time.
///
/// Constant registers start from the effect's bindings; `def` immediates
/// override them, as on hardware.
#[derive(Clone, Debug)]
pub struct Interpreter<'a> {
    program: &'a Program,
    constants: [Vec4; MAX_CONSTANTS as usize],
}

impl<'a> Interpreter<'a> {
    /// Creates an interpreter with constant registers `c0..` taken from
    /// `constants`.
    #[must_use]
    pub fn new(program: &'a Program, constants: &[Vec4]) -> Self {
        let mut regs = [[0.0; 4]; MAX_CONSTANTS as usize];
        for (reg, value) in regs.iter_mut().zip(constants) {
            *reg = *value;
        }
        let mut interp = Self {
            program,
            constants: regs,
        };
        for &(index, value) in &program.defs {
            interp.constants[index as usize] = value;
        }
        interp
    }

    /// Binds a constant register, unless a `def` already fixes it.
    pub fn set_constant(&mut self, index: u32, value: Vec4) {
        if index < MAX_CONSTANTS && self.program.def(index).is_none() {
            self.constants[index as usize] = value;
        }
    }

    /// Runs the program for one pixel and returns `oC0`.
    ///
    /// `sample` receives a sampler number and a texture coordinate.
    pub fn run(&self, texcoord: Vec4, mut sample: impl FnMut(u32, [f32; 2]) -> Vec4) -> Vec4 {
        let mut temps = [[0.0_f32; 4]; MAX_CONSTANTS as usize];
        let mut out = [0.0_f32; 4];
        for inst in &self.program.instructions {
            if inst.op == Opcode::Nop {
                continue;
            }
            let read = |s: &Src| -> Vec4 {
                let raw = match s.reg.kind {
                    RegisterKind::Temp => temps[s.reg.index as usize],
                    RegisterKind::Const => self.constants[s.reg.index as usize],
                    RegisterKind::Texture => texcoord,
                    RegisterKind::Sampler | RegisterKind::ColorOut => [0.0; 4],
                };
                let v = s.swizzle.map(|l| raw[usize::from(l)]);
                match s.modifier {
                    SrcModifier::None => v,
                    SrcModifier::Negate => v.map(|x| -x),
                    SrcModifier::Abs => v.map(f32::abs),
                }
            };
            let srcs = inst.sources();
            let a = srcs.first().map(read).unwrap_or_default();
            let b = srcs.get(1).map(read).unwrap_or_default();
            let c = srcs.get(2).map(read).unwrap_or_default();

            let value = match inst.op {
                Opcode::Nop | Opcode::Mov => a,
                Opcode::Add => lanes2(a, b, |x, y| x + y),
                Opcode::Sub => lanes2(a, b, |x, y| x - y),
                Opcode::Mul => lanes2(a, b, |x, y| x * y),
                Opcode::Mad => lanes3(a, b, c, |x, y, z| x * y + z),
                Opcode::Rcp => a.map(|x| 1.0 / x),
                Opcode::Rsq => a.map(|x| 1.0 / x.abs().sqrt()),
                Opcode::Dp4 => [a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]; 4],
                Opcode::Min => lanes2(a, b, f32::min),
                Opcode::Max => lanes2(a, b, f32::max),
                Opcode::Exp => a.map(f32::exp2),
                Opcode::Log => a.map(|x| x.abs().log2()),
                Opcode::Lrp => lanes3(a, b, c, |t, x, y| t * x + (1.0 - t) * y),
                Opcode::Frc => a.map(|x| x - x.floor()),
                Opcode::Pow => lanes2(a, b, |x, y| x.abs().powf(y)),
                Opcode::Abs => a.map(f32::abs),
                Opcode::SinCos => [a[3].cos(), a[3].sin(), 0.0, 0.0],
                Opcode::Tex => {
                    let sampler = srcs.get(1).map_or(0, |s| s.reg.index);
                    sample(sampler, [a[0], a[1]])
                }
                Opcode::Cmp => lanes3(a, b, c, |x, y, z| if x >= 0.0 { y } else { z }),
            };

            let dst = inst.dst;
            let target = match dst.reg.kind {
                RegisterKind::ColorOut => &mut out,
                _ => &mut temps[dst.reg.index as usize],
            };
            for (lane, slot) in target.iter_mut().enumerate() {
                if dst.mask & (1 << lane) != 0 {
                    *slot = if dst.saturate {
                        value[lane].clamp(0.0, 1.0)
                    } else {
                        value[lane]
                    };
                }
            }
        }
        out
    }

    /// Runs the program over every pixel of `input`, with sampler 0 bound
    /// to `input` (nearest, clamped to the edge) and other samplers reading
    /// transparent black.
    pub(crate) fn apply(&self, input: &Pixels) -> Pixels {
        let (w, h) = (input.width, input.height);
        let mut out = Pixels::new(w, h);
        let (fw, fh) = (w as f32, h as f32);
        let sample = |sampler: u32, uv: [f32; 2]| -> Vec4 {
            if sampler != 0 {
                return [0.0; 4];
            }
            #[expect(
                clippy::cast_possible_truncation,
                reason = "coordinates are clamped into the surface"
            )]
            let (x, y) = (
                (uv[0] * fw).floor().clamp(0.0, fw - 1.0) as isize,
                (uv[1] * fh).floor().clamp(0.0, fh - 1.0) as isize,
            );
            input.get_clamped(x, y)
        };
        for y in 0..h {
            for x in 0..w {
                let tc = [(x as f32 + 0.5) / fw, (y as f32 + 0.5) / fh, 0.0, 1.0];
                let px = self.run(tc, &sample);
                out.data[y * w + x] = px.map(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) });
            }
        }
        out
    }
}

#[inline]
fn lanes2(a: Vec4, b: Vec4, f: impl Fn(f32, f32) -> f32) -> Vec4 {
    [f(a[0], b[0]), f(a[1], b[1]), f(a[2], b[2]), f(a[3], b[3])]
}

#[inline]
fn lanes3(a: Vec4, b: Vec4, c: Vec4, f: impl Fn(f32, f32, f32) -> f32) -> Vec4 {
    [
        f(a[0], b[0], c[0]),
        f(a[1], b[1], c[1]),
        f(a[2], b[2], c[2]),
        f(a[3], b[3], c[3]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::asm::*;
    use crate::shader::parse;

    fn eval(tokens: &[u32], constants: &[Vec4]) -> Vec4 {
        let program = parse(tokens).unwrap();
        Interpreter::new(&program, constants).run([0.0; 4], |_, _| [0.0; 4])
    }

    fn to_out(body: &[u32]) -> Vec<u32> {
        let mut t = vec![PS_2_0];
        t.extend_from_slice(body);
        t.push(END);
        t
    }

    #[test]
    fn arithmetic_on_constants() {
        let t = to_out(&[
            op(OP_MAD, 4),
            dst(REG_COLOROUT, 0, 0xF),
            src(REG_CONST, 0),
            src(REG_CONST, 1),
            src(REG_CONST, 2),
        ]);
        let out = eval(
            &t,
            &[[1.0, 2.0, 3.0, 4.0], [0.5, 0.5, 2.0, 0.0], [0.0, 1.0, 0.0, 1.0]],
        );
        assert_eq!(out, [0.5, 2.0, 6.0, 1.0]);
    }

    #[test]
    fn defs_override_bindings() {
        let mut body = def(0, [0.25; 4]).to_vec();
        body.extend([op(OP_MOV, 2), dst(REG_COLOROUT, 0, 0xF), src(REG_CONST, 0)]);
        let program = parse(&to_out(&body)).unwrap();
        let mut interp = Interpreter::new(&program, &[[1.0; 4]]);
        interp.set_constant(0, [0.75; 4]);
        assert_eq!(interp.run([0.0; 4], |_, _| [0.0; 4]), [0.25; 4]);
    }

    #[test]
    fn cmp_selects_per_lane() {
        let t = to_out(&[
            op(OP_CMP, 4),
            dst(REG_COLOROUT, 0, 0xF),
            src(REG_CONST, 0),
            src(REG_CONST, 1),
            src(REG_CONST, 2),
        ]);
        let out = eval(
            &t,
            &[[-1.0, 0.0, 1.0, -0.5], [1.0; 4], [2.0; 4]],
        );
        assert_eq!(out, [2.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn lrp_exp_log_and_saturate() {
        let t = to_out(&[
            op(OP_LRP, 4),
            dst(REG_TEMP, 0, 0xF),
            src(REG_CONST, 0),
            src(REG_CONST, 1),
            src(REG_CONST, 2),
            op(OP_EXP, 2),
            dst(REG_TEMP, 1, 0xF),
            src(REG_CONST, 3),
            op(OP_LOG, 2),
            dst(REG_TEMP, 2, 0xF),
            src(REG_CONST, 4),
            op(OP_ADD, 3),
            sat(dst(REG_COLOROUT, 0, 0xF)),
            src(REG_TEMP, 0),
            neg(src(REG_TEMP, 1)),
            op(OP_MOV, 2),
            dst(REG_COLOROUT, 0, 0x2),
            src(REG_TEMP, 2),
        ]);
        let out = eval(
            &t,
            &[
                [0.25; 4],
                [1.0; 4],
                [0.0; 4],
                [-2.0, 1.0, 0.0, 0.0],
                [0.0, 8.0, 0.0, 0.0],
            ],
        );
        // lrp = 0.25; exp2 = [0.25, 2, 1, 1]; saturate(0.25 - exp2).
        assert!(out[0].abs() < 1e-6, "x = {}", out[0]);
        assert!((out[1] - 3.0).abs() < 1e-6, "y overwritten by log2(8): {}", out[1]);
        assert_eq!(out[2], 0.0, "saturated");
        assert_eq!(out[3], 0.0, "saturated");
    }

    #[test]
    fn sincos_uses_w() {
        let t = to_out(&[
            op(OP_SINCOS, 2),
            dst(REG_COLOROUT, 0, 0x3),
            swz(src(REG_CONST, 0), [3, 3, 3, 3]),
        ]);
        let out = eval(&t, &[[0.0, 0.0, 0.0, core::f32::consts::FRAC_PI_2]]);
        assert!(out[0].abs() < 1e-6, "cos(pi/2) = {}", out[0]);
        assert!((out[1] - 1.0).abs() < 1e-6, "sin(pi/2) = {}", out[1]);
        assert_eq!(out[2], 0.0, "z untouched");
    }

    #[test]
    fn texld_reads_sampler() {
        let program = parse(&passthrough()).unwrap();
        let interp = Interpreter::new(&program, &[]);
        let out = interp.run([0.5, 0.25, 0.0, 1.0], |s, uv| [uv[0], uv[1], 0.0, f32::from(s == 0)]);
        assert_eq!(out, [0.5, 0.25, 0.0, 1.0]);
    }

    #[test]
    fn apply_samples_pixel_centres() {
        let program = parse(&passthrough()).unwrap();
        let interp = Interpreter::new(&program, &[]);
        let mut input = Pixels::new(2, 2);
        input.data = vec![
            [1.0, 0.0, 0.0, 1.0],
            [0.0, 1.0, 0.0, 1.0],
            [0.0, 0.0, 1.0, 1.0],
            [0.5, 0.5, 0.5, 0.5],
        ];
        assert_eq!(interp.apply(&input), input);
    }

    #[test]
    fn dp4_replicates() {
        let t = to_out(&[
            op(OP_DP4, 3),
            dst(REG_COLOROUT, 0, 0xF),
            src(REG_CONST, 0),
            abs(src(REG_CONST, 1)),
        ]);
        let out = eval(&t, &[[1.0, 2.0, 3.0, 4.0], [-1.0, 1.0, 1.0, -1.0]]);
        assert_eq!(out, [10.0; 4]);
    }
}
