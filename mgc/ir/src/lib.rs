//! The lowered intermediate representation and the object-model
//! lowerer
//!
//! [`lower`] turns a checked [`mgc_sema::Analysis`] into a [`Module`]:
//! a typed, block-structured program with the runtime object model
//! already laid out. The module is printable ([`std::fmt::Display`])
//! and structurally checkable ([`validate`]); a host backend links it
//! with the small C runtime that provides the extern primitives.

mod builder;
mod gen;
mod ir_nodes;
mod printer;
mod ty;
mod validate;

pub use builder::{FunctionBuilder, ModuleBuilder};
pub use gen::lower;
pub use ir_nodes::{
    BinOp, Block, BlockId, CmpOp, Const, FunctionId, GlobalDef, GlobalId, Inst, IrFunction,
    Linkage, Module, Reg, StrId, Terminator, Value,
};
pub use ty::{IrType, StructDef, StructId};
pub use validate::{validate, ValidateError};
