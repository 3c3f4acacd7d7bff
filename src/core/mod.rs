//! Compiler core infrastructure.
//!
//! # Key Components
//!
//! ## Expression compilation (`expression_tree`)
//! - Topologically ordered DAG of node capabilities
//! - Three-pass driver: parameter reservation, CSE materialization, root
//!   emission
//!
//! ## Register reservation (`register_file`)
//! - Bitmask pool over the general-purpose and vector banks
//!
//! ## Errors (`error`)
//! - `CompileError` for invalid inputs; logic bugs stay fatal assertions

pub mod error;
pub mod expression_tree;
pub mod register_file;

// Re-export core components
pub use error::{CompileError, CompileResult};

pub use expression_tree::{ExpressionTree, Node, Parameter, TreeListing};

pub use register_file::{RegisterFile, MAX_REGISTERS_PER_BANK};
