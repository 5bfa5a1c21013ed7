//! Builders for modules and function bodies

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::ir_nodes::{
    Block, BlockId, Const, FunctionId, GlobalDef, GlobalId, Inst, IrFunction, Linkage, Module,
    Reg, StrId, Terminator, Value,
};
use crate::ty::{IrType, StructDef, StructId};

/// Accumulates structs, globals and functions into a [`Module`]
#[derive(Default)]
pub struct ModuleBuilder {
    module: Module,
    externs: FxHashMap<SmolStr, FunctionId>,
    interned: FxHashMap<Rc<str>, StrId>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_struct(&mut self, name: impl Into<SmolStr>, fields: Vec<IrType>) -> StructId {
        let id = StructId(self.module.structs.len() as u32);
        self.module.structs.push(StructDef {
            name: name.into(),
            fields,
        });
        id
    }

    pub fn struct_fields(&self, id: StructId) -> &[IrType] {
        &self.module.struct_def(id).fields
    }

    pub fn add_global(&mut self, name: impl Into<SmolStr>, ty: IrType, init: Const) -> GlobalId {
        let id = GlobalId(self.module.globals.len() as u32);
        self.module.globals.push(GlobalDef {
            id,
            name: name.into(),
            ty,
            init,
        });
        id
    }

    pub fn set_global_init(&mut self, id: GlobalId, init: Const) {
        self.module.globals[id.index()].init = init;
    }

    pub fn declare_function(
        &mut self,
        name: impl Into<SmolStr>,
        params: Vec<IrType>,
        ret: IrType,
        linkage: Linkage,
    ) -> FunctionId {
        let id = FunctionId(self.module.functions.len() as u32);
        self.module.functions.push(IrFunction {
            id,
            name: name.into(),
            params,
            ret,
            linkage,
            blocks: Vec::new(),
        });
        id
    }

    /// Declares an extern, reusing an existing declaration with the
    /// same name. The host supplies one symbol per name, so repeated
    /// declarations across files collapse.
    pub fn declare_extern(
        &mut self,
        name: impl Into<SmolStr>,
        params: Vec<IrType>,
        ret: IrType,
    ) -> FunctionId {
        let name = name.into();
        if let Some(existing) = self.externs.get(&name) {
            return *existing;
        }
        let id = self.declare_function(name.clone(), params, ret, Linkage::Extern);
        self.externs.insert(name, id);
        id
    }

    pub fn define(&mut self, id: FunctionId, blocks: Vec<Block>) {
        self.module.functions[id.index()].blocks = blocks;
    }

    pub fn intern_string(&mut self, value: Rc<str>) -> StrId {
        if let Some(existing) = self.interned.get(&value) {
            return *existing;
        }
        let id = StrId(self.module.strings.len() as u32);
        self.module.strings.push(value.clone());
        self.interned.insert(value, id);
        id
    }

    pub fn finish(self) -> Module {
        self.module
    }
}

/// Builds the control-flow graph of one function.
///
/// Keeps a current-block cursor and the stack of `break` targets; on
/// [`FunctionBuilder::finish`] orphan blocks (opened after `break` or
/// `return`, branched to by nothing) are closed with `unreachable`,
/// and every other block which still falls through receives the
/// trailing terminator (return-void for void functions, return-zero
/// of the return type otherwise).
pub struct FunctionBuilder {
    blocks: Vec<Block>,
    current: usize,
    next_reg: u32,
    break_targets: Vec<BlockId>,
}

impl FunctionBuilder {
    /// `param_count` registers are pre-defined as the parameters
    pub fn new(param_count: usize) -> Self {
        FunctionBuilder {
            blocks: vec![Block {
                id: BlockId(0),
                insts: Vec::new(),
                terminator: None,
            }],
            current: 0,
            next_reg: param_count as u32,
            break_targets: Vec::new(),
        }
    }

    pub fn param(&self, index: usize) -> Value {
        Value::Reg(Reg(index as u32))
    }

    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            id,
            insts: Vec::new(),
            terminator: None,
        });
        id
    }

    pub fn switch_to(&mut self, block: BlockId) {
        self.current = block.index();
    }

    /// Emits a value-producing instruction into the current block
    pub fn emit(&mut self, inst: Inst) -> Value {
        let reg = Reg(self.next_reg);
        self.next_reg += 1;
        self.blocks[self.current].insts.push((Some(reg), inst));
        Value::Reg(reg)
    }

    /// Emits an instruction for its effect only
    pub fn emit_void(&mut self, inst: Inst) {
        self.blocks[self.current].insts.push((None, inst));
    }

    /// Closes the current block; a no-op if it is already terminated
    /// (a `return` followed by orphan statements leaves it closed)
    pub fn terminate(&mut self, terminator: Terminator) {
        let block = &mut self.blocks[self.current];
        if block.terminator.is_none() {
            block.terminator = Some(terminator);
        }
    }

    pub fn push_break_target(&mut self, target: BlockId) {
        self.break_targets.push(target);
    }

    pub fn pop_break_target(&mut self) {
        self.break_targets.pop().expect("Unbalanced break targets");
    }

    pub fn break_target(&self) -> Option<BlockId> {
        self.break_targets.last().copied()
    }

    pub fn finish(mut self, ret: &IrType, module: &ModuleBuilder) -> Vec<Block> {
        // Blocks some terminator branches to. Only rets and
        // unreachables are added below, so the set is already complete.
        let mut targets: FxHashSet<BlockId> = FxHashSet::default();
        for block in &self.blocks {
            match &block.terminator {
                Some(Terminator::Br(target)) => {
                    targets.insert(*target);
                }
                Some(Terminator::CondBr {
                    then_block,
                    else_block,
                    ..
                }) => {
                    targets.insert(*then_block);
                    targets.insert(*else_block);
                }
                _ => {}
            }
        }

        for index in 0..self.blocks.len() {
            if self.blocks[index].terminator.is_some() {
                continue;
            }
            // The successor blocks opened after a `break` or `return`
            // hold orphan statements; nothing branches to them
            if index != 0 && !targets.contains(&BlockId(index as u32)) {
                self.blocks[index].terminator = Some(Terminator::Unreachable);
                continue;
            }
            self.current = index;
            let terminator = match ret {
                IrType::Void => Terminator::Ret(None),
                other => {
                    let zero = self.zero_value(other, module);
                    Terminator::Ret(Some(zero))
                }
            };
            self.blocks[index].terminator = Some(terminator);
        }
        self.blocks
    }

    /// The zero of a type; aggregates are packed from zeroed parts
    fn zero_value(&mut self, ty: &IrType, module: &ModuleBuilder) -> Value {
        match ty {
            IrType::I1 => Value::I1(false),
            IrType::I32 => Value::I32(0),
            IrType::I64 => Value::I64(0),
            IrType::F64 => Value::F64(0.0),
            IrType::Ptr => Value::Null,
            IrType::Struct(id) => {
                let fields: Vec<IrType> = module.struct_fields(*id).to_vec();
                let values = fields
                    .iter()
                    .map(|field| self.zero_value(field, module))
                    .collect();
                self.emit(Inst::Pack {
                    ty: ty.clone(),
                    values,
                })
            }
            IrType::Array(elem, len) => {
                let values = (0..*len)
                    .map(|_| self.zero_value(elem, module))
                    .collect();
                self.emit(Inst::Pack {
                    ty: ty.clone(),
                    values,
                })
            }
            IrType::Void => unreachable!("void has no value"),
        }
    }
}
