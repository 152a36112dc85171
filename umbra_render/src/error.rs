// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resource and shader errors.
//!
//! Neither error aborts a frame: the [`Context`](crate::Context) degrades a
//! failed group to a clip-only push and the software backend replaces an
//! unsupported shader with a passthrough.

use core::fmt;

/// Errors from [`RenderBackend`](crate::RenderBackend) surface allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendError {
    /// A surface with a zero dimension was requested.
    EmptySurface,
    /// The requested surface exceeds the backend's size limit.
    SurfaceTooLarge {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
        /// Largest dimension the backend accepts.
        max: u32,
    },
    /// The pixel buffer could not be allocated.
    OutOfMemory,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySurface => write!(f, "surface has a zero dimension"),
            Self::SurfaceTooLarge { width, height, max } => {
                write!(f, "surface {width}x{height} exceeds the {max} pixel limit")
            }
            Self::OutOfMemory => write!(f, "surface allocation failed"),
        }
    }
}

impl core::error::Error for BackendError {}

/// Errors from parsing a ps_2_0 token stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderError {
    /// The stream is empty or ends before an instruction is complete.
    Truncated {
        /// Token offset where more input was expected.
        offset: usize,
    },
    /// The version token is not `ps_2_0`.
    UnsupportedVersion(u32),
    /// The opcode is unknown or outside the supported subset.
    UnsupportedOpcode {
        /// Raw opcode.
        opcode: u16,
        /// Token offset of the instruction.
        offset: usize,
    },
    /// The instruction carries the wrong number of parameter tokens.
    BadLength {
        /// Raw opcode.
        opcode: u16,
        /// Number of parameter tokens found.
        len: usize,
    },
    /// A source or destination modifier outside the supported set.
    UnsupportedModifier {
        /// Token offset of the parameter.
        offset: usize,
    },
    /// A register type not valid in this position.
    InvalidRegister {
        /// Raw register type.
        kind: u32,
        /// Token offset of the parameter.
        offset: usize,
    },
    /// A register number at or above the supported limit.
    RegisterOutOfRange {
        /// Register number.
        index: u32,
        /// Token offset of the parameter.
        offset: usize,
    },
    /// A sampler or texture-coordinate register read before its `dcl`.
    UndeclaredRegister {
        /// Token offset of the parameter.
        offset: usize,
    },
    /// A `def` or `sincos` with a write mask it may not use.
    InvalidWriteMask {
        /// Token offset of the parameter.
        offset: usize,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { offset } => write!(f, "shader truncated at token {offset}"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported shader version {v:#010x}"),
            Self::UnsupportedOpcode { opcode, offset } => {
                write!(f, "unsupported opcode {opcode} at token {offset}")
            }
            Self::BadLength { opcode, len } => {
                write!(f, "opcode {opcode} has {len} parameter tokens")
            }
            Self::UnsupportedModifier { offset } => {
                write!(f, "unsupported modifier at token {offset}")
            }
            Self::InvalidRegister { kind, offset } => {
                write!(f, "register type {kind} not allowed at token {offset}")
            }
            Self::RegisterOutOfRange { index, offset } => {
                write!(f, "register {index} out of range at token {offset}")
            }
            Self::UndeclaredRegister { offset } => {
                write!(f, "undeclared register read at token {offset}")
            }
            Self::InvalidWriteMask { offset } => {
                write!(f, "invalid write mask at token {offset}")
            }
        }
    }
}

impl core::error::Error for ShaderError {}
