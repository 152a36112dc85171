// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! ps_2_0 pixel shaders.
//!
//! Shader effects carry Direct3D 9 pixel-shader token streams. [`parse`]
//! validates a stream against the supported subset and lowers it to a
//! [`Program`]; [`glsl::emit`] turns a program into a GLSL fragment shader
//! for GPU backends, and [`Interpreter`] evaluates it per pixel for the
//! software backend.
//!
//! Only straight-line arithmetic and 2D texture sampling are supported; flow
//! control, integer and boolean constants, and the instructions listed under
//! [`ShaderError::UnsupportedOpcode`](crate::ShaderError::UnsupportedOpcode)
//! are rejected.

mod bytecode;
pub mod glsl;
mod interp;

#[cfg(test)]
pub(crate) use bytecode::asm;
pub use bytecode::{PS_2_0, parse};
pub use interp::Interpreter;

/// Number of constant, temporary, and texture-coordinate registers.
pub const MAX_CONSTANTS: u32 = 32;

/// Number of sampler registers.
pub const MAX_SAMPLERS: u32 = 16;

/// A register file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegisterKind {
    /// `r#`, read-write scratch.
    Temp,
    /// `c#`, from a `def` or the effect's constant bindings.
    Const,
    /// `t#`, the interpolated texture coordinate.
    Texture,
    /// `s#`, a bound sampler.
    Sampler,
    /// `oC0`, the output colour.
    ColorOut,
}

/// A register reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Register {
    /// Register file.
    pub kind: RegisterKind,
    /// Register number within the file.
    pub index: u32,
}

/// An instruction destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dst {
    /// Written register.
    pub reg: Register,
    /// Components written; bit 0 is `x`.
    pub mask: u8,
    /// Clamp the result to `0..=1`.
    pub saturate: bool,
}

/// A source operand modifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SrcModifier {
    /// Read as-is.
    #[default]
    None,
    /// Negate every component.
    Negate,
    /// Absolute value of every component.
    Abs,
}

/// An instruction source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Src {
    /// Read register.
    pub reg: Register,
    /// Source component for each output lane, `0..4` for `x..w`.
    pub swizzle: [u8; 4],
    /// Modifier applied after swizzling.
    pub modifier: SrcModifier,
}

impl Src {
    /// Whether the swizzle is `.xyzw`.
    #[must_use]
    pub fn is_identity_swizzle(&self) -> bool {
        self.swizzle == [0, 1, 2, 3]
    }
}

/// Supported arithmetic and texture opcodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// No operation.
    Nop,
    /// `dst = a`.
    Mov,
    /// `dst = a + b`.
    Add,
    /// `dst = a - b`.
    Sub,
    /// `dst = a * b + c`.
    Mad,
    /// `dst = a * b`.
    Mul,
    /// `dst = 1 / a`.
    Rcp,
    /// `dst = 1 / sqrt(a)`.
    Rsq,
    /// Four-component dot product, replicated.
    Dp4,
    /// Component-wise minimum.
    Min,
    /// Component-wise maximum.
    Max,
    /// `dst = 2^a`.
    Exp,
    /// `dst = log2(a)`.
    Log,
    /// `dst = a * b + (1 - a) * c`.
    Lrp,
    /// Fractional part.
    Frc,
    /// `dst = a^b`.
    Pow,
    /// Absolute value.
    Abs,
    /// `dst.xy = (cos(a.w), sin(a.w))`.
    SinCos,
    /// `dst = sample(b, a.xy)`.
    Tex,
    /// `dst = a >= 0 ? b : c`, per component.
    Cmp,
}

impl Opcode {
    /// Number of source operands.
    #[must_use]
    pub fn source_count(self) -> usize {
        match self {
            Self::Nop => 0,
            Self::Mov
            | Self::Rcp
            | Self::Rsq
            | Self::Exp
            | Self::Log
            | Self::Frc
            | Self::Abs
            | Self::SinCos => 1,
            Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Dp4
            | Self::Min
            | Self::Max
            | Self::Pow
            | Self::Tex => 2,
            Self::Mad | Self::Lrp | Self::Cmp => 3,
        }
    }
}

/// One arithmetic or texture instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    /// Operation.
    pub op: Opcode,
    /// Destination; unused for [`Opcode::Nop`].
    pub dst: Dst,
    src: [Src; 3],
}

impl Instruction {
    pub(crate) fn new(op: Opcode, dst: Dst, src: [Src; 3]) -> Self {
        Self { op, dst, src }
    }

    /// The instruction's source operands.
    #[must_use]
    pub fn sources(&self) -> &[Src] {
        &self.src[..self.op.source_count()]
    }
}

/// A validated shader.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    /// Immediate constants from `def`, in declaration order.
    pub defs: Vec<(u32, [f32; 4])>,
    /// Declared sampler registers.
    pub samplers: Vec<u32>,
    /// Declared texture-coordinate registers.
    pub texcoords: Vec<u32>,
    /// Instructions in execution order.
    pub instructions: Vec<Instruction>,
}

impl Program {
    /// Returns the immediate value of `c{index}`, if a `def` sets it.
    #[must_use]
    pub fn def(&self, index: u32) -> Option<[f32; 4]> {
        self.defs
            .iter()
            .rev()
            .find(|(i, _)| *i == index)
            .map(|(_, v)| *v)
    }

    /// Highest constant register read from the effect's bindings, if any.
    #[must_use]
    pub fn last_uniform_constant(&self) -> Option<u32> {
        self.instructions
            .iter()
            .flat_map(Instruction::sources)
            .filter(|s| s.reg.kind == RegisterKind::Const && self.def(s.reg.index).is_none())
            .map(|s| s.reg.index)
            .max()
    }

    /// Temporaries written by any instruction, ascending.
    #[must_use]
    pub fn temps(&self) -> Vec<u32> {
        let mut temps: Vec<u32> = self
            .instructions
            .iter()
            .filter(|i| i.op != Opcode::Nop && i.dst.reg.kind == RegisterKind::Temp)
            .map(|i| i.dst.reg.index)
            .collect();
        temps.sort_unstable();
        temps.dedup();
        temps
    }
}
