//! The abstract syntax tree of the mg language
//!
//! The parser produces this representation directly; the semantic
//! analyzer consumes it. Namespaces live in an arena owned by
//! [`Program`] so that a [`NamespaceId`] doubles as the structural
//! identity the namespace resolver needs for loop detection.

pub mod ast_nodes;
mod display;

pub use ast_nodes::*;
pub use display::ProgramDisplay;
