//! Error types for the compiler core.
//!
//! Invalid inputs surface as `CompileError` values; invariant violations
//! inside the emission machinery are logic bugs and stay fatal assertions.

use thiserror::Error;

use crate::x64::encoder::EncodingError;

#[derive(Error, Debug)]
pub enum CompileError {
    /// A save mask names registers outside the writable nonvolatile set.
    #[error("saving {bank} registers outside the writable nonvolatile set: {mask:#06x}")]
    IllegalSavedRegisters { bank: &'static str, mask: u32 },

    /// The requested frame is empty or larger than a frame without a stack
    /// probe may be.
    #[error("invalid stack allocation of {bytes} bytes")]
    InvalidStackAllocation { bytes: u32 },

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
