//! Structural validation of a lowered module, asserted by the default
//! compiler mode

use std::fmt;

use rustc_hash::FxHashSet;

use crate::ir_nodes::{Const, Inst, IrFunction, Linkage, Module, Terminator, Value};
use crate::ty::IrType;

#[derive(Debug, Eq, PartialEq)]
pub struct ValidateError {
    pub message: String,
}

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid module: {}", self.message)
    }
}

impl std::error::Error for ValidateError {}

fn fail(message: impl Into<String>) -> Result<(), ValidateError> {
    Err(ValidateError {
        message: message.into(),
    })
}

/// Checks the structural invariants the printer and any backend rely
/// on: every block terminated, all table references in range, call
/// arity matching callee signatures, unique non-extern labels.
pub fn validate(module: &Module) -> Result<(), ValidateError> {
    for strukt in &module.structs {
        for field in &strukt.fields {
            check_ty(module, field)?;
        }
    }

    let mut names = FxHashSet::default();
    for function in &module.functions {
        if function.linkage != Linkage::Extern && !names.insert(&function.name) {
            return fail(format!("duplicate function label {}", function.name));
        }
    }

    for global in &module.globals {
        check_ty(module, &global.ty)?;
        check_const(module, &global.init)?;
    }

    for function in &module.functions {
        check_function(module, function)?;
    }
    Ok(())
}

fn check_ty(module: &Module, ty: &IrType) -> Result<(), ValidateError> {
    match ty {
        IrType::Struct(id) => {
            if id.index() >= module.structs.len() {
                return fail(format!("struct reference {id} out of range"));
            }
            Ok(())
        }
        IrType::Array(elem, _) => check_ty(module, elem),
        _ => Ok(()),
    }
}

fn check_const(module: &Module, value: &Const) -> Result<(), ValidateError> {
    match value {
        Const::Array(items) => items.iter().try_for_each(|item| check_const(module, item)),
        Const::Struct(fields) => fields
            .iter()
            .try_for_each(|field| check_const(module, field)),
        Const::FuncAddr(id) => {
            if id.index() >= module.functions.len() {
                return fail(format!("function reference {id} out of range"));
            }
            Ok(())
        }
        Const::GlobalAddr(id) => {
            if id.index() >= module.globals.len() {
                return fail(format!("global reference {id} out of range"));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn check_function(module: &Module, function: &IrFunction) -> Result<(), ValidateError> {
    if function.linkage == Linkage::Extern {
        if !function.blocks.is_empty() {
            return fail(format!("extern {} has a body", function.name));
        }
        return Ok(());
    }
    if function.blocks.is_empty() {
        return fail(format!("function {} has no blocks", function.name));
    }

    // Registers are function-local; collect every definition first
    // (cross-block uses are legal without dominance analysis here)
    let mut defined: FxHashSet<u32> = (0..function.params.len() as u32).collect();
    for block in &function.blocks {
        for (reg, _) in &block.insts {
            if let Some(reg) = reg {
                if !defined.insert(reg.0) {
                    return fail(format!("{} defines {reg} twice", function.name));
                }
            }
        }
    }

    let block_count = function.blocks.len();
    for (index, block) in function.blocks.iter().enumerate() {
        if block.id.index() != index {
            return fail(format!("{}: block ids are not dense", function.name));
        }

        for (_, inst) in &block.insts {
            check_inst(module, function, inst, &defined)?;
        }

        let Some(terminator) = &block.terminator else {
            return fail(format!("{}: {} has no terminator", function.name, block.id));
        };
        match terminator {
            Terminator::Ret(value) => {
                if let Some(value) = value {
                    check_value(module, function, value, &defined)?;
                }
            }
            Terminator::Br(target) => check_targets(function, &[*target], block_count)?,
            Terminator::CondBr {
                condition,
                then_block,
                else_block,
            } => {
                check_value(module, function, condition, &defined)?;
                check_targets(function, &[*then_block, *else_block], block_count)?;
            }
            Terminator::Unreachable => {}
        }
    }
    Ok(())
}

fn check_targets(
    function: &IrFunction,
    targets: &[crate::ir_nodes::BlockId],
    block_count: usize,
) -> Result<(), ValidateError> {
    for target in targets {
        if target.index() >= block_count {
            return fail(format!("{}: branch to missing {target}", function.name));
        }
    }
    Ok(())
}

fn check_inst(
    module: &Module,
    function: &IrFunction,
    inst: &Inst,
    defined: &FxHashSet<u32>,
) -> Result<(), ValidateError> {
    let check = |value: &Value| check_value(module, function, value, defined);
    match inst {
        Inst::Alloca { ty } | Inst::HeapAlloc { ty } => check_ty(module, ty),
        Inst::Load { ty, ptr } => {
            check_ty(module, ty)?;
            check(ptr)
        }
        Inst::Store { ty, ptr, value } => {
            check_ty(module, ty)?;
            check(ptr)?;
            check(value)
        }
        Inst::FieldPtr {
            strukt,
            base,
            index,
        }
        | Inst::ContainerOf {
            strukt,
            index,
            field: base,
        } => {
            if strukt.index() >= module.structs.len() {
                return fail(format!("{}: struct {strukt} out of range", function.name));
            }
            let fields = module.struct_def(*strukt).fields.len();
            if *index as usize >= fields {
                return fail(format!(
                    "{}: field {index} out of range for {}",
                    function.name,
                    module.struct_def(*strukt).name
                ));
            }
            check(base)
        }
        Inst::ElemPtr { elem, base, index } => {
            check_ty(module, elem)?;
            check(base)?;
            check(index)
        }
        Inst::Binary { lhs, rhs, ty, .. } | Inst::Cmp { lhs, rhs, ty, .. } => {
            check_ty(module, ty)?;
            check(lhs)?;
            check(rhs)
        }
        Inst::Neg { ty, value } => {
            check_ty(module, ty)?;
            check(value)
        }
        Inst::Not { value } | Inst::IntToFloat { value } | Inst::FloatToInt { value } => {
            check(value)
        }
        Inst::Pack { ty, values } => {
            check_ty(module, ty)?;
            let expected = match ty {
                IrType::Struct(id) => Some(module.struct_def(*id).fields.len()),
                IrType::Array(_, len) => Some(*len as usize),
                _ => None,
            };
            match expected {
                Some(expected) if expected != values.len() => fail(format!(
                    "{}: pack arity {} does not match type",
                    function.name,
                    values.len()
                )),
                None => fail(format!("{}: pack of a non-aggregate", function.name)),
                _ => values.iter().try_for_each(check),
            }
        }
        Inst::Extract { ty, index, value } => {
            check_ty(module, ty)?;
            let in_range = match ty {
                IrType::Struct(id) => (*index as usize) < module.struct_def(*id).fields.len(),
                IrType::Array(_, len) => index < len,
                _ => false,
            };
            if !in_range {
                return fail(format!("{}: extract {index} out of range", function.name));
            }
            check(value)
        }
        Inst::Call { func, args } => {
            if func.index() >= module.functions.len() {
                return fail(format!("{}: call to missing {func}", function.name));
            }
            let callee = module.function(*func);
            if callee.params.len() != args.len() {
                return fail(format!(
                    "{}: call to {} with {} argument(s), expected {}",
                    function.name,
                    callee.name,
                    args.len(),
                    callee.params.len()
                ));
            }
            args.iter().try_for_each(check)
        }
        Inst::CallPtr {
            ptr, params, args, ..
        } => {
            if params.len() != args.len() {
                return fail(format!(
                    "{}: indirect call arity mismatch",
                    function.name
                ));
            }
            check(ptr)?;
            args.iter().try_for_each(check)
        }
        Inst::HeapFree { ptr } => check(ptr),
    }
}

fn check_value(
    module: &Module,
    function: &IrFunction,
    value: &Value,
    defined: &FxHashSet<u32>,
) -> Result<(), ValidateError> {
    match value {
        Value::Reg(reg) => {
            if !defined.contains(&reg.0) {
                return fail(format!("{}: use of undefined {reg}", function.name));
            }
            Ok(())
        }
        Value::Str(id) => {
            if id.index() >= module.strings.len() {
                return fail(format!("{}: string {id} out of range", function.name));
            }
            Ok(())
        }
        Value::Global(id) => {
            if id.index() >= module.globals.len() {
                return fail(format!("{}: global {id} out of range", function.name));
            }
            Ok(())
        }
        Value::Func(id) => {
            if id.index() >= module.functions.len() {
                return fail(format!("{}: function {id} out of range", function.name));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
