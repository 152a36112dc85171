// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! ps_2_0 token stream parsing and validation.

use super::{
    Dst, Instruction, MAX_CONSTANTS, MAX_SAMPLERS, Opcode, Program, Register, RegisterKind, Src,
    SrcModifier,
};
use crate::error::ShaderError;

/// Version token for pixel shader model 2.0.
pub const PS_2_0: u32 = 0xFFFF_0200;

pub(crate) const END: u32 = 0x0000_FFFF;
const COMMENT: u32 = 0xFFFE;

// -- Raw register types --

pub(crate) const REG_TEMP: u32 = 0;
pub(crate) const REG_CONST: u32 = 2;
pub(crate) const REG_TEXTURE: u32 = 3;
pub(crate) const REG_COLOROUT: u32 = 8;
pub(crate) const REG_SAMPLER: u32 = 10;

// -- Raw opcodes --

pub(crate) const OP_NOP: u32 = 0;
pub(crate) const OP_MOV: u32 = 1;
pub(crate) const OP_ADD: u32 = 2;
pub(crate) const OP_SUB: u32 = 3;
pub(crate) const OP_MAD: u32 = 4;
pub(crate) const OP_MUL: u32 = 5;
pub(crate) const OP_RCP: u32 = 6;
pub(crate) const OP_RSQ: u32 = 7;
pub(crate) const OP_DP4: u32 = 9;
pub(crate) const OP_MIN: u32 = 10;
pub(crate) const OP_MAX: u32 = 11;
pub(crate) const OP_EXP: u32 = 14;
pub(crate) const OP_LOG: u32 = 15;
pub(crate) const OP_LRP: u32 = 18;
pub(crate) const OP_FRC: u32 = 19;
pub(crate) const OP_DCL: u32 = 31;
pub(crate) const OP_POW: u32 = 32;
pub(crate) const OP_ABS: u32 = 35;
pub(crate) const OP_SINCOS: u32 = 37;
pub(crate) const OP_TEX: u32 = 66;
pub(crate) const OP_DEF: u32 = 81;
pub(crate) const OP_CMP: u32 = 88;

fn opcode(raw: u32) -> Option<Opcode> {
    Some(match raw {
        OP_NOP => Opcode::Nop,
        OP_MOV => Opcode::Mov,
        OP_ADD => Opcode::Add,
        OP_SUB => Opcode::Sub,
        OP_MAD => Opcode::Mad,
        OP_MUL => Opcode::Mul,
        OP_RCP => Opcode::Rcp,
        OP_RSQ => Opcode::Rsq,
        OP_DP4 => Opcode::Dp4,
        OP_MIN => Opcode::Min,
        OP_MAX => Opcode::Max,
        OP_EXP => Opcode::Exp,
        OP_LOG => Opcode::Log,
        OP_LRP => Opcode::Lrp,
        OP_FRC => Opcode::Frc,
        OP_POW => Opcode::Pow,
        OP_ABS => Opcode::Abs,
        OP_SINCOS => Opcode::SinCos,
        OP_TEX => Opcode::Tex,
        OP_CMP => Opcode::Cmp,
        _ => return None,
    })
}

#[inline]
fn reg_type(t: u32) -> u32 {
    ((t >> 28) & 7) | ((t >> 8) & 0x18)
}

#[inline]
fn reg_num(t: u32) -> u32 {
    t & 0x7FF
}

/// Parses and validates a ps_2_0 token stream.
///
/// # Errors
///
/// Returns [`ShaderError`] for anything outside the supported subset:
/// another shader model, unsupported opcodes or modifiers, out-of-place
/// register types, reads of undeclared samplers or texture coordinates, and
/// streams that end before the `end` token.
pub fn parse(tokens: &[u32]) -> Result<Program, ShaderError> {
    let Some(&version) = tokens.first() else {
        return Err(ShaderError::Truncated { offset: 0 });
    };
    if version != PS_2_0 {
        return Err(ShaderError::UnsupportedVersion(version));
    }

    let mut program = Program::default();
    let mut pos = 1;
    loop {
        let Some(&token) = tokens.get(pos) else {
            return Err(ShaderError::Truncated { offset: pos });
        };
        if token == END {
            return Ok(program);
        }
        let raw = token & 0xFFFF;
        if raw == COMMENT {
            pos += 1 + ((token >> 16) & 0x7FFF) as usize;
            continue;
        }

        let len = ((token >> 24) & 0xF) as usize;
        let start = pos + 1;
        let params = tokens
            .get(start..start + len)
            .ok_or(ShaderError::Truncated {
                offset: tokens.len(),
            })?;
        #[expect(
            clippy::cast_possible_truncation,
            reason = "masked to the low 16 bits"
        )]
        let code = raw as u16;
        match raw {
            OP_DEF => parse_def(params, start, code, &mut program)?,
            OP_DCL => parse_dcl(params, start, code, &mut program)?,
            _ => {
                let op = opcode(raw).ok_or(ShaderError::UnsupportedOpcode {
                    opcode: code,
                    offset: pos,
                })?;
                let inst = parse_instruction(op, params, start, code, &program)?;
                program.instructions.push(inst);
            }
        }
        pos = start + len;
    }
}

/// Validates a destination token's modifiers, returning its register
/// type, number, write mask, and saturate flag.
fn dst_fields(t: u32, offset: usize) -> Result<(u32, u32, u8, bool), ShaderError> {
    let dstmod = (t >> 20) & 0xF;
    let shift = (t >> 24) & 0xF;
    if shift != 0 || dstmod > 1 {
        return Err(ShaderError::UnsupportedModifier { offset });
    }
    #[expect(
        clippy::cast_possible_truncation,
        reason = "write mask is four bits"
    )]
    let mask = ((t >> 16) & 0xF) as u8;
    Ok((reg_type(t), reg_num(t), mask, dstmod == 1))
}

fn check_index(index: u32, limit: u32, offset: usize) -> Result<(), ShaderError> {
    if index >= limit {
        return Err(ShaderError::RegisterOutOfRange { index, offset });
    }
    Ok(())
}

fn parse_def(
    params: &[u32],
    start: usize,
    code: u16,
    program: &mut Program,
) -> Result<(), ShaderError> {
    let [t, x, y, z, w] = params else {
        return Err(ShaderError::BadLength {
            opcode: code,
            len: params.len(),
        });
    };
    let (kind, index, mask, saturate) = dst_fields(*t, start)?;
    if saturate {
        return Err(ShaderError::UnsupportedModifier { offset: start });
    }
    if kind != REG_CONST {
        return Err(ShaderError::InvalidRegister {
            kind,
            offset: start,
        });
    }
    check_index(index, MAX_CONSTANTS, start)?;
    if mask != 0xF {
        return Err(ShaderError::InvalidWriteMask { offset: start });
    }
    program.defs.push((
        index,
        [
            f32::from_bits(*x),
            f32::from_bits(*y),
            f32::from_bits(*z),
            f32::from_bits(*w),
        ],
    ));
    Ok(())
}

fn parse_dcl(
    params: &[u32],
    start: usize,
    code: u16,
    program: &mut Program,
) -> Result<(), ShaderError> {
    let [_usage, t] = params else {
        return Err(ShaderError::BadLength {
            opcode: code,
            len: params.len(),
        });
    };
    let offset = start + 1;
    let (kind, index, _, saturate) = dst_fields(*t, offset)?;
    if saturate {
        return Err(ShaderError::UnsupportedModifier { offset });
    }
    match kind {
        REG_SAMPLER => {
            check_index(index, MAX_SAMPLERS, offset)?;
            program.samplers.push(index);
        }
        REG_TEXTURE => {
            check_index(index, MAX_CONSTANTS, offset)?;
            program.texcoords.push(index);
        }
        _ => return Err(ShaderError::InvalidRegister { kind, offset }),
    }
    Ok(())
}

fn parse_instruction(
    op: Opcode,
    params: &[u32],
    start: usize,
    code: u16,
    program: &Program,
) -> Result<Instruction, ShaderError> {
    let n = op.source_count();
    let expected = if op == Opcode::Nop { 0 } else { n + 1 };
    // ps_2_0 `sincos` also names two constant registers it no longer needs.
    let sincos_legacy = op == Opcode::SinCos && params.len() == 4;
    if params.len() != expected && !sincos_legacy {
        return Err(ShaderError::BadLength {
            opcode: code,
            len: params.len(),
        });
    }

    let placeholder = Src {
        reg: Register {
            kind: RegisterKind::Temp,
            index: 0,
        },
        swizzle: [0, 1, 2, 3],
        modifier: SrcModifier::None,
    };
    let mut dst = Dst {
        reg: placeholder.reg,
        mask: 0xF,
        saturate: false,
    };
    let mut src = [placeholder; 3];
    if op == Opcode::Nop {
        return Ok(Instruction::new(op, dst, src));
    }

    dst = parse_dst(params[0], start)?;
    if op == Opcode::SinCos && dst.mask & !0x3 != 0 {
        return Err(ShaderError::InvalidWriteMask { offset: start });
    }
    for (k, slot) in src.iter_mut().enumerate().take(n) {
        let offset = start + 1 + k;
        let s = parse_src(params[1 + k], offset, program)?;
        let is_sampler = s.reg.kind == RegisterKind::Sampler;
        let wants_sampler = op == Opcode::Tex && k == 1;
        if is_sampler != wants_sampler {
            return Err(ShaderError::InvalidRegister {
                kind: reg_type(params[1 + k]),
                offset,
            });
        }
        *slot = s;
    }
    Ok(Instruction::new(op, dst, src))
}

fn parse_dst(t: u32, offset: usize) -> Result<Dst, ShaderError> {
    let (kind, index, mask, saturate) = dst_fields(t, offset)?;
    let kind = match kind {
        REG_TEMP => {
            check_index(index, MAX_CONSTANTS, offset)?;
            RegisterKind::Temp
        }
        REG_COLOROUT => {
            check_index(index, 1, offset)?;
            RegisterKind::ColorOut
        }
        _ => return Err(ShaderError::InvalidRegister { kind, offset }),
    };
    Ok(Dst {
        reg: Register { kind, index },
        mask,
        saturate,
    })
}

fn parse_src(t: u32, offset: usize, program: &Program) -> Result<Src, ShaderError> {
    let modifier = match (t >> 24) & 0xF {
        0 => SrcModifier::None,
        1 => SrcModifier::Negate,
        0xB => SrcModifier::Abs,
        _ => return Err(ShaderError::UnsupportedModifier { offset }),
    };
    let index = reg_num(t);
    let kind = match reg_type(t) {
        REG_TEMP => RegisterKind::Temp,
        REG_CONST => RegisterKind::Const,
        REG_TEXTURE => {
            if !program.texcoords.contains(&index) {
                return Err(ShaderError::UndeclaredRegister { offset });
            }
            RegisterKind::Texture
        }
        REG_SAMPLER => {
            if !program.samplers.contains(&index) {
                return Err(ShaderError::UndeclaredRegister { offset });
            }
            RegisterKind::Sampler
        }
        kind => return Err(ShaderError::InvalidRegister { kind, offset }),
    };
    check_index(index, MAX_CONSTANTS, offset)?;
    let sw = (t >> 16) & 0xFF;
    #[expect(
        clippy::cast_possible_truncation,
        reason = "each lane selector is two bits"
    )]
    let swizzle = [0, 2, 4, 6].map(|shift| ((sw >> shift) & 3) as u8);
    Ok(Src {
        reg: Register { kind, index },
        swizzle,
        modifier,
    })
}

/// Token builders for hand-assembled test shaders.
#[cfg(test)]
pub(crate) mod asm {
    pub(crate) use super::*;

    pub(crate) const REG_INPUT: u32 = 1;
    pub(crate) const OP_DP3: u32 = 8;

    fn reg_bits(kind: u32, index: u32) -> u32 {
        0x8000_0000 | index | ((kind & 7) << 28) | ((kind & 0x18) << 8)
    }

    pub(crate) fn op(code: u32, len: u32) -> u32 {
        code | (len << 24)
    }

    pub(crate) fn comment(len: u32) -> u32 {
        super::COMMENT | (len << 16)
    }

    pub(crate) fn dst(kind: u32, index: u32, mask: u32) -> u32 {
        reg_bits(kind, index) | (mask << 16)
    }

    pub(crate) fn sat(t: u32) -> u32 {
        t | (1 << 20)
    }

    pub(crate) fn src(kind: u32, index: u32) -> u32 {
        reg_bits(kind, index) | (0xE4 << 16)
    }

    /// Replaces the swizzle; lanes are listed `x` first.
    pub(crate) fn swz(t: u32, lanes: [u32; 4]) -> u32 {
        let sw = lanes[0] | (lanes[1] << 2) | (lanes[2] << 4) | (lanes[3] << 6);
        (t & !(0xFF << 16)) | (sw << 16)
    }

    pub(crate) fn neg(t: u32) -> u32 {
        t | (1 << 24)
    }

    pub(crate) fn abs(t: u32) -> u32 {
        t | (0xB << 24)
    }

    pub(crate) fn dcl_texcoord(index: u32) -> [u32; 3] {
        [op(OP_DCL, 2), 0x8000_0000, dst(REG_TEXTURE, index, 0xF)]
    }

    pub(crate) fn dcl_sampler(index: u32) -> [u32; 3] {
        [op(OP_DCL, 2), 0x9000_0000, dst(REG_SAMPLER, index, 0xF)]
    }

    pub(crate) fn def(index: u32, v: [f32; 4]) -> [u32; 6] {
        [
            op(OP_DEF, 5),
            dst(REG_CONST, index, 0xF),
            v[0].to_bits(),
            v[1].to_bits(),
            v[2].to_bits(),
            v[3].to_bits(),
        ]
    }

    /// `texld r0, t0, s0; mov oC0, r0`, with both registers declared.
    pub(crate) fn passthrough() -> Vec<u32> {
        let mut t = vec![PS_2_0];
        t.extend(dcl_texcoord(0));
        t.extend(dcl_sampler(0));
        t.extend([
            op(OP_TEX, 3),
            dst(REG_TEMP, 0, 0xF),
            src(REG_TEXTURE, 0),
            src(REG_SAMPLER, 0),
            op(OP_MOV, 2),
            dst(REG_COLOROUT, 0, 0xF),
            src(REG_TEMP, 0),
            END,
        ]);
        t
    }
}

#[cfg(test)]
mod tests {
    use super::asm::*;
    use super::*;
    use crate::shader::{Opcode, RegisterKind, SrcModifier};

    #[test]
    fn parses_passthrough() {
        let program = parse(&passthrough()).unwrap();
        assert_eq!(program.texcoords, [0]);
        assert_eq!(program.samplers, [0]);
        assert_eq!(program.instructions.len(), 2);
        let tex = program.instructions[0];
        assert_eq!(tex.op, Opcode::Tex);
        assert_eq!(tex.sources()[0].reg.kind, RegisterKind::Texture);
        assert_eq!(tex.sources()[1].reg.kind, RegisterKind::Sampler);
        let mov = program.instructions[1];
        assert_eq!(mov.dst.reg.kind, RegisterKind::ColorOut);
        assert!(mov.sources()[0].is_identity_swizzle(), "default swizzle");
    }

    #[test]
    fn reads_defs_modifiers_and_swizzles() {
        let mut t = vec![PS_2_0];
        t.extend(def(3, [0.5, 1.0, 2.0, 4.0]));
        t.extend([
            op(OP_ADD, 3),
            sat(dst(REG_TEMP, 1, 0x3)),
            neg(swz(src(REG_CONST, 3), [3, 3, 3, 3])),
            abs(src(REG_CONST, 7)),
            END,
        ]);
        let program = parse(&t).unwrap();
        assert_eq!(program.def(3), Some([0.5, 1.0, 2.0, 4.0]));
        assert_eq!(program.def(7), None);
        let add = program.instructions[0];
        assert!(add.dst.saturate, "saturate kept");
        assert_eq!(add.dst.mask, 0x3);
        assert_eq!(add.sources()[0].swizzle, [3, 3, 3, 3]);
        assert_eq!(add.sources()[0].modifier, SrcModifier::Negate);
        assert_eq!(add.sources()[1].modifier, SrcModifier::Abs);
        assert_eq!(program.last_uniform_constant(), Some(7));
        assert_eq!(program.temps(), [1]);
    }

    #[test]
    fn skips_comments() {
        let mut t = vec![PS_2_0, comment(2), 0xDEAD_BEEF, 0xFFFF_FFFF];
        t.extend([op(OP_NOP, 0), END]);
        let program = parse(&t).unwrap();
        assert_eq!(program.instructions.len(), 1);
        assert_eq!(program.instructions[0].op, Opcode::Nop);
    }

    #[test]
    fn rejects_other_versions() {
        assert_eq!(
            parse(&[0xFFFF_0300, END]),
            Err(ShaderError::UnsupportedVersion(0xFFFF_0300))
        );
        assert_eq!(parse(&[0xFFFE_0200, END]), Err(ShaderError::UnsupportedVersion(0xFFFE_0200)));
    }

    #[test]
    fn rejects_excluded_opcodes() {
        for code in [8, 12, 13, 16, 17, 36, 80, 90, 200] {
            let t = [
                PS_2_0,
                op(code, 3),
                dst(REG_TEMP, 0, 0xF),
                src(REG_TEMP, 1),
                src(REG_TEMP, 2),
                END,
            ];
            assert!(
                matches!(parse(&t), Err(ShaderError::UnsupportedOpcode { .. })),
                "opcode {code} accepted"
            );
        }
        assert_eq!(OP_DP3, 8);
    }

    #[test]
    fn rejects_truncated_streams() {
        assert_eq!(parse(&[]), Err(ShaderError::Truncated { offset: 0 }));
        assert_eq!(parse(&[PS_2_0]), Err(ShaderError::Truncated { offset: 1 }));
        let t = [PS_2_0, op(OP_MOV, 2), dst(REG_TEMP, 0, 0xF)];
        assert!(matches!(parse(&t), Err(ShaderError::Truncated { .. })), "short params");
        let mut t = passthrough();
        t.pop();
        assert!(matches!(parse(&t), Err(ShaderError::Truncated { .. })), "missing end");
    }

    #[test]
    fn rejects_bad_modifiers() {
        // Destination modifier 2 is partial precision.
        let t = [
            PS_2_0,
            op(OP_MOV, 2),
            dst(REG_TEMP, 0, 0xF) | (2 << 20),
            src(REG_TEMP, 1),
            END,
        ];
        assert!(matches!(parse(&t), Err(ShaderError::UnsupportedModifier { .. })), "dstmod");
        // Source modifier 2 is bias.
        let t = [
            PS_2_0,
            op(OP_MOV, 2),
            dst(REG_TEMP, 0, 0xF),
            src(REG_TEMP, 1) | (2 << 24),
            END,
        ];
        assert!(matches!(parse(&t), Err(ShaderError::UnsupportedModifier { .. })), "srcmod");
    }

    #[test]
    fn rejects_bad_registers() {
        let write_input = [
            PS_2_0,
            op(OP_MOV, 2),
            dst(REG_INPUT, 0, 0xF),
            src(REG_TEMP, 1),
            END,
        ];
        assert!(matches!(parse(&write_input), Err(ShaderError::InvalidRegister { .. })), "v0 dst");
        let read_input = [
            PS_2_0,
            op(OP_MOV, 2),
            dst(REG_TEMP, 0, 0xF),
            src(REG_INPUT, 0),
            END,
        ];
        assert!(matches!(parse(&read_input), Err(ShaderError::InvalidRegister { .. })), "v0 src");
        let high = [
            PS_2_0,
            op(OP_MOV, 2),
            dst(REG_TEMP, 32, 0xF),
            src(REG_TEMP, 1),
            END,
        ];
        assert_eq!(
            parse(&high),
            Err(ShaderError::RegisterOutOfRange { index: 32, offset: 2 })
        );
        let second_output = [
            PS_2_0,
            op(OP_MOV, 2),
            dst(REG_COLOROUT, 1, 0xF),
            src(REG_TEMP, 1),
            END,
        ];
        assert!(
            matches!(
                parse(&second_output),
                Err(ShaderError::RegisterOutOfRange { .. })
            ),
            "oC1"
        );
    }

    #[test]
    fn rejects_undeclared_reads() {
        let t = [
            PS_2_0,
            op(OP_TEX, 3),
            dst(REG_TEMP, 0, 0xF),
            src(REG_TEXTURE, 0),
            src(REG_SAMPLER, 0),
            END,
        ];
        assert_eq!(parse(&t), Err(ShaderError::UndeclaredRegister { offset: 3 }));
    }

    #[test]
    fn rejects_sincos_writing_zw() {
        let t = [
            PS_2_0,
            op(OP_SINCOS, 4),
            dst(REG_TEMP, 0, 0x4),
            swz(src(REG_TEMP, 1), [0, 0, 0, 0]),
            src(REG_CONST, 0),
            src(REG_CONST, 1),
            END,
        ];
        assert_eq!(parse(&t), Err(ShaderError::InvalidWriteMask { offset: 2 }));
        let ok = [
            PS_2_0,
            op(OP_SINCOS, 4),
            dst(REG_TEMP, 0, 0x3),
            swz(src(REG_TEMP, 1), [0, 0, 0, 0]),
            src(REG_CONST, 0),
            src(REG_CONST, 1),
            END,
        ];
        assert!(parse(&ok).is_ok(), "xy sincos accepted");
    }

    #[test]
    fn def_requires_full_mask() {
        let mut t = vec![PS_2_0];
        let mut d = def(0, [1.0; 4]);
        d[1] = dst(REG_CONST, 0, 0x7);
        t.extend(d);
        t.push(END);
        assert_eq!(parse(&t), Err(ShaderError::InvalidWriteMask { offset: 2 }));
    }

    #[test]
    fn sampler_only_in_texld() {
        let mut t = vec![PS_2_0];
        t.extend(dcl_sampler(0));
        t.extend([op(OP_MOV, 2), dst(REG_TEMP, 0, 0xF), src(REG_SAMPLER, 0), END]);
        assert!(matches!(parse(&t), Err(ShaderError::InvalidRegister { .. })), "mov from s0");
    }

    #[test]
    fn wrong_length_is_rejected() {
        let t = [
            PS_2_0,
            op(OP_ADD, 2),
            dst(REG_TEMP, 0, 0xF),
            src(REG_TEMP, 1),
            END,
        ];
        assert_eq!(
            parse(&t),
            Err(ShaderError::BadLength {
                opcode: 2,
                len: 2
            })
        );
    }
}
