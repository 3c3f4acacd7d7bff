//! exprjit - expression-tree JIT code emission for Windows x64.
//!
//! This crate is the code-emission and stack-frame core of an expression
//! JIT: it compiles an expression DAG built by a front end into native code
//! with a correctly described stack frame and Windows-compatible unwind
//! metadata.
//!
//! # Primary Usage
//!
//! ```
//! use bumpalo::Bump;
//! use exprjit::{BaseRegisterType, FunctionSpecification};
//!
//! // Describe a leaf function with two local slots and no saved registers.
//! let arena = Bump::new();
//! let spec = FunctionSpecification::new(&arena, -1, 2, 0, 0, BaseRegisterType::None)?;
//!
//! // The frame end is 16-byte aligned once the return address is counted.
//! assert_eq!(spec.offset_to_original_rsp() % 16, 8);
//! assert!(!spec.prolog().is_empty() && !spec.epilog().is_empty());
//! # Ok::<(), exprjit::CompileError>(())
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Expression-tree compiler driver, register reservation,
//!   errors
//! - [`x64`] - x86-64 specific code: encoder, calling convention, unwind
//!   metadata, function prolog/epilog construction

pub mod core;
pub mod x64;

pub use crate::core::error::{CompileError, CompileResult};
pub use crate::core::expression_tree::{ExpressionTree, Node, Parameter};
pub use crate::core::register_file::RegisterFile;
pub use crate::x64::encoder::{EncodingError, X64Encoder};
pub use crate::x64::function_spec::{BaseRegisterType, FunctionSpecification};
pub use crate::x64::regs::{Gp, Xmm};
