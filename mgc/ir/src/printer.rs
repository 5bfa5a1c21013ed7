//! Deterministic textual rendering of a module
//!
//! This is the `-l`/`-c` output. Emission order is fixed by the
//! traversal order of the lowerer, so the text is stable across runs.

use std::fmt;

use itertools::Itertools;

use crate::ir_nodes::{Block, Const, Inst, IrFunction, Linkage, Module, Terminator, Value};
use crate::ty::IrType;

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for strukt in &self.structs {
            writeln!(
                f,
                "struct {} {{ {} }}",
                strukt.name,
                strukt.fields.iter().map(|ty| ty_str(self, ty)).join(", ")
            )?;
        }
        writeln!(f)?;

        for global in &self.globals {
            writeln!(
                f,
                "global @{}: {} = {}",
                global.name,
                ty_str(self, &global.ty),
                const_str(self, &global.init)
            )?;
        }
        writeln!(f)?;

        for function in &self.functions {
            if function.linkage == Linkage::Extern {
                writeln!(
                    f,
                    "extern fn {}({}) -> {}",
                    function.name,
                    function.params.iter().map(|ty| ty_str(self, ty)).join(", "),
                    ty_str(self, &function.ret)
                )?;
            }
        }
        writeln!(f)?;

        for function in &self.functions {
            if function.linkage != Linkage::Extern {
                write_function(f, self, function)?;
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

fn write_function(f: &mut fmt::Formatter<'_>, module: &Module, function: &IrFunction) -> fmt::Result {
    let export = if function.linkage == Linkage::Export {
        "export "
    } else {
        ""
    };
    let params = function
        .params
        .iter()
        .enumerate()
        .map(|(index, ty)| format!("%r{index}: {}", ty_str(module, ty)))
        .join(", ");
    writeln!(
        f,
        "{export}fn {}({params}) -> {} {{",
        function.name,
        ty_str(module, &function.ret)
    )?;
    for block in &function.blocks {
        write_block(f, module, block)?;
    }
    writeln!(f, "}}")
}

fn write_block(f: &mut fmt::Formatter<'_>, module: &Module, block: &Block) -> fmt::Result {
    writeln!(f, "{}:", block.id)?;
    for (reg, inst) in &block.insts {
        match reg {
            Some(reg) => writeln!(f, "    {reg} = {}", inst_str(module, inst))?,
            None => writeln!(f, "    {}", inst_str(module, inst))?,
        }
    }
    match &block.terminator {
        Some(terminator) => writeln!(f, "    {}", terminator_str(module, terminator)),
        None => writeln!(f, "    <missing terminator>"),
    }
}

fn terminator_str(module: &Module, terminator: &Terminator) -> String {
    match terminator {
        Terminator::Ret(None) => "ret".to_string(),
        Terminator::Ret(Some(value)) => format!("ret {}", value_str(module, value)),
        Terminator::Br(block) => format!("br {block}"),
        Terminator::CondBr {
            condition,
            then_block,
            else_block,
        } => format!(
            "condbr {}, {then_block}, {else_block}",
            value_str(module, condition)
        ),
        Terminator::Unreachable => "unreachable".to_string(),
    }
}

fn inst_str(module: &Module, inst: &Inst) -> String {
    let value = |v: &Value| value_str(module, v);
    match inst {
        Inst::Alloca { ty } => format!("alloca {}", ty_str(module, ty)),
        Inst::Load { ty, ptr } => format!("load {}, {}", ty_str(module, ty), value(ptr)),
        Inst::Store { ty, ptr, value: v } => {
            format!("store {} {}, {}", ty_str(module, ty), value(ptr), value(v))
        }
        Inst::FieldPtr {
            strukt,
            base,
            index,
        } => format!(
            "field_ptr {}, {}, {index}",
            module.struct_def(*strukt).name,
            value(base)
        ),
        Inst::ElemPtr { elem, base, index } => format!(
            "elem_ptr {}, {}, {}",
            ty_str(module, elem),
            value(base),
            value(index)
        ),
        Inst::ContainerOf {
            strukt,
            index,
            field,
        } => format!(
            "container_of {}, {index}, {}",
            module.struct_def(*strukt).name,
            value(field)
        ),
        Inst::Binary { op, ty, lhs, rhs } => format!(
            "{} {} {}, {}",
            op.name(),
            ty_str(module, ty),
            value(lhs),
            value(rhs)
        ),
        Inst::Cmp { op, ty, lhs, rhs } => format!(
            "cmp {} {} {}, {}",
            op.name(),
            ty_str(module, ty),
            value(lhs),
            value(rhs)
        ),
        Inst::Neg { ty, value: v } => format!("neg {} {}", ty_str(module, ty), value(v)),
        Inst::Not { value: v } => format!("not {}", value(v)),
        Inst::IntToFloat { value: v } => format!("int_to_float {}", value(v)),
        Inst::FloatToInt { value: v } => format!("float_to_int {}", value(v)),
        Inst::Pack { ty, values } => format!(
            "pack {} {{ {} }}",
            ty_str(module, ty),
            values.iter().map(value).join(", ")
        ),
        Inst::Extract {
            ty,
            index,
            value: v,
        } => format!("extract {}, {index}, {}", ty_str(module, ty), value(v)),
        Inst::Call { func, args } => format!(
            "call {}({})",
            module.function(*func).name,
            args.iter().map(value).join(", ")
        ),
        Inst::CallPtr {
            ptr,
            params,
            ret,
            args,
        } => format!(
            "call_ptr {}({}) as ({}) -> {}",
            value(ptr),
            args.iter().map(value).join(", "),
            params.iter().map(|ty| ty_str(module, ty)).join(", "),
            ty_str(module, ret)
        ),
        // alloc yields zero-initialized storage
        Inst::HeapAlloc { ty } => format!("alloc {}", ty_str(module, ty)),
        Inst::HeapFree { ptr } => format!("free {}", value(ptr)),
    }
}

fn value_str(module: &Module, value: &Value) -> String {
    match value {
        Value::Reg(reg) => reg.to_string(),
        Value::I1(value) => value.to_string(),
        Value::I32(value) => value.to_string(),
        Value::I64(value) => value.to_string(),
        Value::F64(value) => format!("{value:?}"),
        Value::Null => "null".to_string(),
        Value::Str(id) => format!("{:?}", module.string(*id)),
        Value::Global(id) => format!("@{}", module.global(*id).name),
        Value::Func(id) => format!("&{}", module.function(*id).name),
    }
}

fn const_str(module: &Module, value: &Const) -> String {
    match value {
        Const::I1(value) => value.to_string(),
        Const::I32(value) => value.to_string(),
        Const::I64(value) => value.to_string(),
        Const::F64(value) => format!("{value:?}"),
        Const::Null => "null".to_string(),
        Const::Array(items) => format!(
            "[{}]",
            items.iter().map(|item| const_str(module, item)).join(", ")
        ),
        Const::Struct(fields) => format!(
            "{{ {} }}",
            fields.iter().map(|field| const_str(module, field)).join(", ")
        ),
        Const::FuncAddr(id) => format!("&{}", module.function(*id).name),
        Const::GlobalAddr(id) => format!("@{}", module.global(*id).name),
    }
}

fn ty_str(module: &Module, ty: &IrType) -> String {
    match ty {
        IrType::I1 => "i1".to_string(),
        IrType::I32 => "i32".to_string(),
        IrType::I64 => "i64".to_string(),
        IrType::F64 => "f64".to_string(),
        IrType::Ptr => "ptr".to_string(),
        IrType::Void => "void".to_string(),
        IrType::Struct(id) => module.struct_def(*id).name.to_string(),
        IrType::Array(elem, len) => format!("[{}; {len}]", ty_str(module, elem)),
    }
}
