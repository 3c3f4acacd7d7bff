//! x86-64 architecture-specific components.
//!
//! This module contains all x86-64 specific code:
//! - Register designators and Windows x64 calling convention data
//! - Instruction encoding using iced-x86
//! - Windows unwind metadata layout
//! - Function prolog/epilog construction

pub mod calling_convention;
pub mod encoder;
pub mod function_spec;
pub mod regs;
pub mod unwind;

// Re-export x64 components
pub use encoder::{EncodingError, X64Encoder};

pub use function_spec::{
    BaseRegisterType, FunctionSpecification, MAX_PROLOG_OR_EPILOG_SIZE, MAX_STACK_SIZE,
};

pub use regs::{Gp, Xmm};

pub use unwind::{
    UnwindCode, UnwindInfoHeader, UnwindInfoView, UnwindOp, MAX_UNWIND_CODES,
    MAX_UNWIND_INFO_BUFFER_SIZE,
};
