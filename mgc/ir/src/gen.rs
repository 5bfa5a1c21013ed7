//! Lowers a checked program into the IR module
//!
//! This is where the runtime object model is laid out: parent-first
//! record prefixes, embedded list nodes, per-type vtables, the two
//! circular sentinel lists, the create/destroy protocol and the global
//! event dispatchers.
//!
//! One pointer convention threads through everything: a reference's
//! pointer field addresses the root prefix, which sits at offset zero
//! of every record, so the same value doubles as the allocation base
//! of the concrete type.

use mgc_ast::EventKind;
use mgc_sema as sema;
use mgc_sema::tree::{TBlock, TExpr, TExprKind, TStmt};
use mgc_sema::{Analysis, FunctionKind, ObjectId, TConst, Ty, ROOT_OBJECT};
use smol_str::SmolStr;

use crate::builder::{FunctionBuilder, ModuleBuilder};
use crate::ir_nodes::{
    BinOp, CmpOp, Const, FunctionId, GlobalId, Inst, Linkage, Module, Terminator, Value,
};
use crate::ty::{IrType, StructId};

// Field indices of the synthetic root record { vtable, node, id }
const ROOT_VTABLE: u32 = 0;
const ROOT_NODE: u32 = 1;
const ROOT_ID: u32 = 2;

// Field indices of derived records { parent, node, members... }
const OBJ_NODE: u32 = 1;
const OBJ_MEMBERS: u32 = 2;

// Field indices of a list node { prev, next }
const NODE_PREV: u32 = 0;
const NODE_NEXT: u32 = 1;

// Vtable slots
const VT_STEP: u32 = 0;
const VT_DESTROY: u32 = 1;
const VT_DRAW: u32 = 2;

/// Lowers the analysis into a complete module
pub fn lower(analysis: &Analysis) -> Module {
    let mut lowerer = Lowerer::new(analysis);
    lowerer.declare();
    lowerer.emit_bodies();
    lowerer.builder.finish()
}

struct Lowerer<'a> {
    an: &'a Analysis,
    builder: ModuleBuilder,

    node_struct: StructId,
    ref_struct: StructId,
    vtable_struct: StructId,
    /// Record type per object; index 0 is the root
    object_structs: Vec<Option<StructId>>,

    counter_global: GlobalId,
    general_head: GlobalId,
    general_tail: GlobalId,
    /// `(head, tail)` sentinels of each type list; `None` for the root,
    /// whose embedded node belongs to the general list
    list_sentinels: Vec<Option<(GlobalId, GlobalId)>>,
    vtable_globals: Vec<Option<GlobalId>>,
    user_globals: Vec<GlobalId>,

    /// IR function per sema function
    func_map: Vec<FunctionId>,
    /// Each type's own destroy function: the user handler or a
    /// synthesized one carrying only the post-work
    destroy_impls: Vec<FunctionId>,
    new_fns: Vec<Option<FunctionId>>,
    root_step: FunctionId,
    root_draw: FunctionId,
    insert_fn: FunctionId,
    unlink_fn: FunctionId,
    global_create: FunctionId,
    global_step: FunctionId,
    global_draw: FunctionId,
}

impl<'a> Lowerer<'a> {
    fn new(an: &'a Analysis) -> Self {
        let mut builder = ModuleBuilder::new();

        let node_struct = builder.add_struct("node", vec![IrType::Ptr, IrType::Ptr]);
        let ref_struct = builder.add_struct("ref", vec![IrType::I64, IrType::Ptr]);
        let vtable_struct =
            builder.add_struct("vtable", vec![IrType::Ptr, IrType::Ptr, IrType::Ptr]);
        let root_struct = builder.add_struct(
            "object",
            vec![IrType::Ptr, IrType::Struct(node_struct), IrType::I64],
        );

        let mut object_structs = vec![None; an.objects.len()];
        object_structs[0] = Some(root_struct);

        let object_count = an.objects.len();
        Lowerer {
            an,
            builder,
            node_struct,
            ref_struct,
            vtable_struct,
            object_structs,
            counter_global: GlobalId(0),
            general_head: GlobalId(0),
            general_tail: GlobalId(0),
            list_sentinels: vec![None; object_count],
            vtable_globals: vec![None; object_count],
            user_globals: Vec::new(),
            func_map: Vec::new(),
            destroy_impls: Vec::new(),
            new_fns: vec![None; object_count],
            root_step: FunctionId(0),
            root_draw: FunctionId(0),
            insert_fn: FunctionId(0),
            unlink_fn: FunctionId(0),
            global_create: FunctionId(0),
            global_step: FunctionId(0),
            global_draw: FunctionId(0),
        }
    }

    fn ty_to_ir(&self, ty: &Ty) -> IrType {
        match ty {
            Ty::Int => IrType::I32,
            Ty::Bool => IrType::I1,
            Ty::Float => IrType::F64,
            Ty::Str | Ty::Sprite | Ty::Sound => IrType::Ptr,
            Ty::Object(_) | Ty::NullObject => IrType::Struct(self.ref_struct),
            Ty::Array(elem, len) => IrType::Array(Box::new(self.ty_to_ir(elem)), *len),
            Ty::Void => IrType::Void,
        }
    }

    fn object_struct(&self, object: ObjectId) -> StructId {
        self.object_structs[object.index()].expect("All structs are created up front")
    }

    fn ensure_struct(&mut self, object: ObjectId) -> StructId {
        if let Some(id) = self.object_structs[object.index()] {
            return id;
        }
        let info = &self.an[object];
        let parent = info.parent.expect("Only the root has no parent");
        let parent_struct = self.ensure_struct(parent);

        let mut fields = vec![
            IrType::Struct(parent_struct),
            IrType::Struct(self.node_struct),
        ];
        for member in &self.an[object].members {
            fields.push(self.ty_to_ir(&member.ty));
        }
        let name = SmolStr::new(&self.an[object].mangled);
        let id = self.builder.add_struct(name, fields);
        self.object_structs[object.index()] = Some(id);
        id
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn declare(&mut self) {
        for index in 1..self.an.objects.len() {
            self.ensure_struct(ObjectId(index as u32));
        }
        self.declare_runtime_globals();
        self.declare_user_globals();
        self.declare_functions();
        self.init_vtables();
    }

    fn declare_runtime_globals(&mut self) {
        self.counter_global =
            self.builder
                .add_global("object.counter", IrType::I64, Const::I64(0));

        let node_ty = IrType::Struct(self.node_struct);
        self.general_head = self
            .builder
            .add_global("object.list.head", node_ty.clone(), Const::Null);
        self.general_tail = self
            .builder
            .add_global("object.list.tail", node_ty.clone(), Const::Null);
        link_sentinels(&mut self.builder, self.general_head, self.general_tail);

        for index in 1..self.an.objects.len() {
            let mangled = &self.an.objects[index].mangled;
            let head = self.builder.add_global(
                SmolStr::new(format!("{mangled}.list.head")),
                node_ty.clone(),
                Const::Null,
            );
            let tail = self.builder.add_global(
                SmolStr::new(format!("{mangled}.list.tail")),
                node_ty.clone(),
                Const::Null,
            );
            link_sentinels(&mut self.builder, head, tail);
            self.list_sentinels[index] = Some((head, tail));

            let vtable = self.builder.add_global(
                SmolStr::new(format!("{mangled}.vtable")),
                IrType::Struct(self.vtable_struct),
                // Patched once the handlers are declared
                Const::Null,
            );
            self.vtable_globals[index] = Some(vtable);
        }
    }

    fn declare_user_globals(&mut self) {
        for global in &self.an.globals {
            let ty = self.ty_to_ir(&global.ty);
            let init = const_to_ir(&global.init);
            let id = self
                .builder
                .add_global(SmolStr::new(&global.mangled), ty, init);
            self.user_globals.push(id);
        }
    }

    fn declare_functions(&mut self) {
        let ref_ty = IrType::Struct(self.ref_struct);

        for function in &self.an.functions {
            let mut params = Vec::new();
            if matches!(
                function.kind,
                FunctionKind::Method { .. } | FunctionKind::Event { .. }
            ) {
                params.push(ref_ty.clone());
            }
            params.extend(function.params.iter().map(|param| self.ty_to_ir(&param.ty)));
            let ret = self.ty_to_ir(&function.ret);

            let id = match function.kind {
                FunctionKind::Extern => {
                    self.builder
                        .declare_extern(SmolStr::new(&function.mangled), params, ret)
                }
                _ => self.builder.declare_function(
                    SmolStr::new(&function.mangled),
                    params,
                    ret,
                    Linkage::Internal,
                ),
            };
            self.func_map.push(id);
        }

        self.root_step = self.builder.declare_function(
            "object.step",
            vec![ref_ty.clone()],
            IrType::Void,
            Linkage::Internal,
        );
        let root_destroy = self.builder.declare_function(
            "object.destroy",
            vec![ref_ty.clone()],
            IrType::Void,
            Linkage::Internal,
        );
        self.root_draw = self.builder.declare_function(
            "object.draw",
            vec![ref_ty.clone()],
            IrType::Void,
            Linkage::Internal,
        );

        self.insert_fn = self.builder.declare_function(
            "node.insert",
            vec![IrType::Ptr, IrType::Ptr],
            IrType::Void,
            Linkage::Internal,
        );
        self.unlink_fn = self.builder.declare_function(
            "node.unlink",
            vec![IrType::Ptr],
            IrType::Void,
            Linkage::Internal,
        );

        // Every type carries its own destroy function so the unlink
        // chain always runs, user handler or not
        self.destroy_impls.push(root_destroy);
        for index in 1..self.an.objects.len() {
            let object = ObjectId(index as u32);
            let id = match self.an[object].events.destroy {
                Some(func) => self.func_map[func.index()],
                None => self.builder.declare_function(
                    SmolStr::new(format!("{}.destroy", self.an[object].mangled)),
                    vec![ref_ty.clone()],
                    IrType::Void,
                    Linkage::Internal,
                ),
            };
            self.destroy_impls.push(id);
        }

        for index in 1..self.an.objects.len() {
            let object = ObjectId(index as u32);
            let params: Vec<IrType> = self
                .an
                .create_params(object)
                .iter()
                .map(|param| self.ty_to_ir(&param.ty))
                .collect();
            let id = self.builder.declare_function(
                SmolStr::new(format!("{}.new", self.an[object].mangled)),
                params,
                ref_ty.clone(),
                Linkage::Internal,
            );
            self.new_fns[index] = Some(id);
        }

        self.global_create =
            self.builder
                .declare_function("global_create", Vec::new(), IrType::Void, Linkage::Export);
        self.global_step =
            self.builder
                .declare_function("global_step", Vec::new(), IrType::Void, Linkage::Export);
        self.global_draw =
            self.builder
                .declare_function("global_draw", Vec::new(), IrType::Void, Linkage::Export);
    }

    fn init_vtables(&mut self) {
        for index in 1..self.an.objects.len() {
            let object = ObjectId(index as u32);
            let step = self
                .an
                .effective_event(object, EventKind::Step)
                .map(|(_, func)| self.func_map[func.index()])
                .unwrap_or(self.root_step);
            let draw = self
                .an
                .effective_event(object, EventKind::Draw)
                .map(|(_, func)| self.func_map[func.index()])
                .unwrap_or(self.root_draw);
            let destroy = self.destroy_impls[index];

            let vtable = self.vtable_globals[index].expect("Declared above");
            self.builder.set_global_init(
                vtable,
                Const::Struct(vec![
                    Const::FuncAddr(step),
                    Const::FuncAddr(destroy),
                    Const::FuncAddr(draw),
                ]),
            );
        }
    }

    // ------------------------------------------------------------------
    // Bodies
    // ------------------------------------------------------------------

    fn emit_bodies(&mut self) {
        self.emit_list_helpers();
        self.emit_root_handlers();

        for index in 0..self.an.functions.len() {
            self.emit_function(sema::FuncId(index as u32));
        }
        for index in 1..self.an.objects.len() {
            let object = ObjectId(index as u32);
            if self.an[object].events.destroy.is_none() {
                self.emit_synthesized_destroy(object);
            }
            self.emit_new(object);
        }

        self.emit_global_create();
        self.emit_global_event(self.global_step, VT_STEP);
        self.emit_global_event(self.global_draw, VT_DRAW);
    }

    fn emit_list_helpers(&mut self) {
        // insert(head, node): front insertion, directly after head, so
        // passes already in flight never see the new node
        let mut fb = FunctionBuilder::new(2);
        let head = fb.param(0);
        let node = fb.param(1);
        let old = self.load_node_ptr(&mut fb, head.clone(), NODE_NEXT);
        self.store_node_ptr(&mut fb, node.clone(), NODE_NEXT, old.clone());
        self.store_node_ptr(&mut fb, node.clone(), NODE_PREV, head.clone());
        self.store_node_ptr(&mut fb, head, NODE_NEXT, node.clone());
        self.store_node_ptr(&mut fb, old, NODE_PREV, node);
        fb.terminate(Terminator::Ret(None));
        let blocks = fb.finish(&IrType::Void, &self.builder);
        self.builder.define(self.insert_fn, blocks);

        // unlink(node): relinks the neighbours only. The node keeps its
        // own pointers, which is what lets a cursor standing on a dead
        // node still walk forward to the tail.
        let mut fb = FunctionBuilder::new(1);
        let node = fb.param(0);
        let prev = self.load_node_ptr(&mut fb, node.clone(), NODE_PREV);
        let next = self.load_node_ptr(&mut fb, node, NODE_NEXT);
        self.store_node_ptr(&mut fb, prev.clone(), NODE_NEXT, next.clone());
        self.store_node_ptr(&mut fb, next, NODE_PREV, prev);
        fb.terminate(Terminator::Ret(None));
        let blocks = fb.finish(&IrType::Void, &self.builder);
        self.builder.define(self.unlink_fn, blocks);
    }

    fn load_node_ptr(&self, fb: &mut FunctionBuilder, node: Value, index: u32) -> Value {
        let field = fb.emit(Inst::FieldPtr {
            strukt: self.node_struct,
            base: node,
            index,
        });
        fb.emit(Inst::Load {
            ty: IrType::Ptr,
            ptr: field,
        })
    }

    fn store_node_ptr(&self, fb: &mut FunctionBuilder, node: Value, index: u32, value: Value) {
        let field = fb.emit(Inst::FieldPtr {
            strukt: self.node_struct,
            base: node,
            index,
        });
        fb.emit_void(Inst::Store {
            ty: IrType::Ptr,
            ptr: field,
            value,
        });
    }

    fn emit_root_handlers(&mut self) {
        for id in [self.root_step, self.destroy_impls[0], self.root_draw] {
            let mut fb = FunctionBuilder::new(1);
            fb.terminate(Terminator::Ret(None));
            let blocks = fb.finish(&IrType::Void, &self.builder);
            self.builder.define(id, blocks);
        }
    }

    fn emit_function(&mut self, func: sema::FuncId) {
        let info = &self.an[func];
        let Some(body) = &info.body else {
            return;
        };

        let has_this = matches!(
            info.kind,
            FunctionKind::Method { .. } | FunctionKind::Event { .. }
        );
        let param_count = info.params.len() + usize::from(has_this);
        let destroy_object = match info.kind {
            FunctionKind::Event {
                object,
                kind: EventKind::Destroy,
            } => Some(object),
            _ => None,
        };

        let mut fb = FunctionBuilder::new(param_count);
        let mut local_ptrs = Vec::with_capacity(info.locals.len());
        for (index, local) in info.locals.iter().enumerate() {
            let ty = self.ty_to_ir(&local.ty);
            let ptr = fb.emit(Inst::Alloca { ty: ty.clone() });
            if index < param_count {
                let value = fb.param(index);
                fb.emit_void(Inst::Store {
                    ty,
                    ptr: ptr.clone(),
                    value,
                });
            }
            local_ptrs.push(ptr);
        }

        // A destroy event never returns directly: every exit funnels
        // into the post-work block which unlinks the type node and
        // chains to the parent destroy
        let ret_target = destroy_object.map(|_| fb.new_block());

        let ret = self.ty_to_ir(&info.ret);
        let mut emitter = FnEmitter {
            lw: self,
            fb,
            func,
            local_ptrs,
            ret_target,
        };
        emitter.emit_block(body);

        let FnEmitter { lw, mut fb, .. } = emitter;
        if let (Some(postlude), Some(object)) = (ret_target, destroy_object) {
            fb.terminate(Terminator::Br(postlude));
            fb.switch_to(postlude);
            lw.emit_destroy_postlude(&mut fb, object);
        }

        let blocks = fb.finish(&ret, &lw.builder);
        let id = lw.func_map[func.index()];
        lw.builder.define(id, blocks);
    }

    /// Unlinks the receiver from its type list and invokes the parent
    /// destroy. `this` is parameter 0.
    fn emit_destroy_postlude(&mut self, fb: &mut FunctionBuilder, object: ObjectId) {
        let this_ref = fb.param(0);
        let base = fb.emit(Inst::Extract {
            ty: IrType::Struct(self.ref_struct),
            index: 1,
            value: this_ref.clone(),
        });
        let node = fb.emit(Inst::FieldPtr {
            strukt: self.object_struct(object),
            base,
            index: OBJ_NODE,
        });
        fb.emit_void(Inst::Call {
            func: self.unlink_fn,
            args: vec![node],
        });

        let parent = self.an[object].parent.expect("Destroy runs on user types");
        fb.emit_void(Inst::Call {
            func: self.destroy_impls[parent.index()],
            args: vec![this_ref],
        });
        fb.terminate(Terminator::Ret(None));
    }

    fn emit_synthesized_destroy(&mut self, object: ObjectId) {
        let mut fb = FunctionBuilder::new(1);
        self.emit_destroy_postlude(&mut fb, object);
        let blocks = fb.finish(&IrType::Void, &self.builder);
        self.builder.define(self.destroy_impls[object.index()], blocks);
    }

    /// The whole create protocol of §"create expression": allocate,
    /// splice, stamp id and vtable, build the reference, run creates
    fn emit_new(&mut self, object: ObjectId) {
        let create = self.an.effective_event(object, EventKind::Create);
        let param_count = self.an.create_params(object).len();
        let mut fb = FunctionBuilder::new(param_count);

        let strukt = self.object_struct(object);
        let base = fb.emit(Inst::HeapAlloc {
            ty: IrType::Struct(strukt),
        });

        // Splice into every ancestor's type list, child to root
        let ancestry = self.an.ancestry(object);
        for &ancestor in ancestry.iter().rev() {
            if ancestor == ROOT_OBJECT {
                continue;
            }
            let ancestor_ptr = self.descend(&mut fb, base.clone(), object, ancestor);
            let node = fb.emit(Inst::FieldPtr {
                strukt: self.object_struct(ancestor),
                base: ancestor_ptr,
                index: OBJ_NODE,
            });
            let (head, _) = self.list_sentinels[ancestor.index()].expect("User type");
            fb.emit_void(Inst::Call {
                func: self.insert_fn,
                args: vec![Value::Global(head), node],
            });
        }

        // The general list via the root prefix
        let root_ptr = self.descend(&mut fb, base, object, ROOT_OBJECT);
        let root_struct = self.object_struct(ROOT_OBJECT);
        let general_node = fb.emit(Inst::FieldPtr {
            strukt: root_struct,
            base: root_ptr.clone(),
            index: ROOT_NODE,
        });
        fb.emit_void(Inst::Call {
            func: self.insert_fn,
            args: vec![Value::Global(self.general_head), general_node],
        });

        // Fresh id: pre-increment of the process-wide counter
        let old = fb.emit(Inst::Load {
            ty: IrType::I64,
            ptr: Value::Global(self.counter_global),
        });
        let id = fb.emit(Inst::Binary {
            op: BinOp::Add,
            ty: IrType::I64,
            lhs: old,
            rhs: Value::I64(1),
        });
        fb.emit_void(Inst::Store {
            ty: IrType::I64,
            ptr: Value::Global(self.counter_global),
            value: id.clone(),
        });

        let vtable_field = fb.emit(Inst::FieldPtr {
            strukt: root_struct,
            base: root_ptr.clone(),
            index: ROOT_VTABLE,
        });
        let vtable = self.vtable_globals[object.index()].expect("User type");
        fb.emit_void(Inst::Store {
            ty: IrType::Ptr,
            ptr: vtable_field,
            value: Value::Global(vtable),
        });
        let id_field = fb.emit(Inst::FieldPtr {
            strukt: root_struct,
            base: root_ptr.clone(),
            index: ROOT_ID,
        });
        fb.emit_void(Inst::Store {
            ty: IrType::I64,
            ptr: id_field,
            value: id.clone(),
        });

        let reference = fb.emit(Inst::Pack {
            ty: IrType::Struct(self.ref_struct),
            values: vec![id, root_ptr],
        });

        // Ancestor create events, eldest first. User arguments go to
        // the effective (youngest defined) create; older ones run with
        // the reference only, and are skipped if they declare formals.
        for &ancestor in &ancestry {
            let Some(create_fn) = self.an[ancestor].events.create else {
                continue;
            };
            let is_effective = matches!(create, Some((definer, _)) if definer == ancestor);
            if is_effective {
                let mut args = vec![reference.clone()];
                args.extend((0..param_count).map(|index| fb.param(index)));
                fb.emit_void(Inst::Call {
                    func: self.func_map[create_fn.index()],
                    args,
                });
            } else if self.an[create_fn].params.is_empty() {
                fb.emit_void(Inst::Call {
                    func: self.func_map[create_fn.index()],
                    args: vec![reference.clone()],
                });
            }
        }

        fb.terminate(Terminator::Ret(Some(reference)));
        let blocks = fb.finish(&IrType::Struct(self.ref_struct), &self.builder);
        let id = self.new_fns[object.index()].expect("User type");
        self.builder.define(id, blocks);
    }

    fn emit_global_create(&mut self) {
        let mut fb = FunctionBuilder::new(0);
        let main_new = self.new_fns[self.an.main_object.index()].expect("main is a user type");
        fb.emit(Inst::Call {
            func: main_new,
            args: Vec::new(),
        });
        fb.terminate(Terminator::Ret(None));
        let blocks = fb.finish(&IrType::Void, &self.builder);
        self.builder.define(self.global_create, blocks);
    }

    /// `global_step` / `global_draw`: walk the general list, reap dead
    /// objects, dispatch the event through the vtable for live ones
    fn emit_global_event(&mut self, id: FunctionId, slot: u32) {
        let root_struct = self.object_struct(ROOT_OBJECT);
        let ref_ty = IrType::Struct(self.ref_struct);
        let mut fb = FunctionBuilder::new(0);

        let cursor = fb.emit(Inst::Alloca { ty: IrType::Ptr });
        let first = self.load_node_ptr(&mut fb, Value::Global(self.general_head), NODE_NEXT);
        fb.emit_void(Inst::Store {
            ty: IrType::Ptr,
            ptr: cursor.clone(),
            value: first,
        });

        let head_bb = fb.new_block();
        let body_bb = fb.new_block();
        let dead_bb = fb.new_block();
        let live_bb = fb.new_block();
        let cont_bb = fb.new_block();
        let merge_bb = fb.new_block();

        fb.terminate(Terminator::Br(head_bb));

        fb.switch_to(head_bb);
        let current = fb.emit(Inst::Load {
            ty: IrType::Ptr,
            ptr: cursor.clone(),
        });
        let done = fb.emit(Inst::Cmp {
            op: CmpOp::Eq,
            ty: IrType::Ptr,
            lhs: current.clone(),
            rhs: Value::Global(self.general_tail),
        });
        fb.terminate(Terminator::CondBr {
            condition: done,
            then_block: merge_bb,
            else_block: body_bb,
        });

        fb.switch_to(body_bb);
        // Advance before dispatch so the body may unlink the current node
        let next = self.load_node_ptr(&mut fb, current.clone(), NODE_NEXT);
        let root_ptr = fb.emit(Inst::ContainerOf {
            strukt: root_struct,
            index: ROOT_NODE,
            field: current.clone(),
        });
        let id_field = fb.emit(Inst::FieldPtr {
            strukt: root_struct,
            base: root_ptr.clone(),
            index: ROOT_ID,
        });
        let object_id = fb.emit(Inst::Load {
            ty: IrType::I64,
            ptr: id_field,
        });
        let dead = fb.emit(Inst::Cmp {
            op: CmpOp::Eq,
            ty: IrType::I64,
            lhs: object_id.clone(),
            rhs: Value::I64(0),
        });
        fb.terminate(Terminator::CondBr {
            condition: dead,
            then_block: dead_bb,
            else_block: live_bb,
        });

        fb.switch_to(dead_bb);
        fb.emit_void(Inst::Call {
            func: self.unlink_fn,
            args: vec![current],
        });
        fb.emit_void(Inst::HeapFree {
            ptr: root_ptr.clone(),
        });
        fb.terminate(Terminator::Br(cont_bb));

        fb.switch_to(live_bb);
        let vtable_field = fb.emit(Inst::FieldPtr {
            strukt: root_struct,
            base: root_ptr.clone(),
            index: ROOT_VTABLE,
        });
        let vtable = fb.emit(Inst::Load {
            ty: IrType::Ptr,
            ptr: vtable_field,
        });
        let handler_field = fb.emit(Inst::FieldPtr {
            strukt: self.vtable_struct,
            base: vtable,
            index: slot,
        });
        let handler = fb.emit(Inst::Load {
            ty: IrType::Ptr,
            ptr: handler_field,
        });
        let reference = fb.emit(Inst::Pack {
            ty: ref_ty.clone(),
            values: vec![object_id, root_ptr],
        });
        fb.emit_void(Inst::CallPtr {
            ptr: handler,
            params: vec![ref_ty],
            ret: IrType::Void,
            args: vec![reference],
        });
        fb.terminate(Terminator::Br(cont_bb));

        fb.switch_to(cont_bb);
        fb.emit_void(Inst::Store {
            ty: IrType::Ptr,
            ptr: cursor,
            value: next,
        });
        fb.terminate(Terminator::Br(head_bb));

        fb.switch_to(merge_bb);
        fb.terminate(Terminator::Ret(None));

        let blocks = fb.finish(&IrType::Void, &self.builder);
        self.builder.define(id, blocks);
    }

    /// Walks the parent prefixes from `from` up to `to`, yielding the
    /// pointer to the `to` prefix. All prefixes share the address; the
    /// field steps keep the IR typed.
    fn descend(
        &self,
        fb: &mut FunctionBuilder,
        mut ptr: Value,
        from: ObjectId,
        to: ObjectId,
    ) -> Value {
        let mut current = from;
        while current != to {
            let strukt = self.object_struct(current);
            ptr = fb.emit(Inst::FieldPtr {
                strukt,
                base: ptr,
                index: 0,
            });
            current = self.an[current].parent.expect("`to` is an ancestor");
        }
        ptr
    }
}

fn link_sentinels(builder: &mut ModuleBuilder, head: GlobalId, tail: GlobalId) {
    builder.set_global_init(
        head,
        Const::Struct(vec![Const::GlobalAddr(tail), Const::GlobalAddr(tail)]),
    );
    builder.set_global_init(
        tail,
        Const::Struct(vec![Const::GlobalAddr(head), Const::GlobalAddr(head)]),
    );
}

fn const_to_ir(value: &TConst) -> Const {
    match value {
        TConst::Int(value) => Const::I32(*value),
        TConst::Bool(value) => Const::I1(*value),
        TConst::Float(value) => Const::F64(*value),
        TConst::Null => Const::Null,
        TConst::NullRef => Const::Struct(vec![Const::I64(0), Const::Null]),
        TConst::Array(items) => Const::Array(items.iter().map(const_to_ir).collect()),
    }
}

// ----------------------------------------------------------------------
// Function body emission
// ----------------------------------------------------------------------

struct FnEmitter<'a, 'b> {
    lw: &'b mut Lowerer<'a>,
    fb: FunctionBuilder,
    func: sema::FuncId,
    /// Alloca per local slot
    local_ptrs: Vec<Value>,
    /// Destroy events return through their post-work block
    ret_target: Option<crate::ir_nodes::BlockId>,
}

impl FnEmitter<'_, '_> {
    fn slot_ty(&self, slot: sema::LocalId) -> IrType {
        let ty = &self.lw.an[self.func].locals[slot.index()].ty;
        self.lw.ty_to_ir(ty)
    }

    fn emit_block(&mut self, block: &TBlock) {
        for statement in &block.statements {
            self.emit_stmt(statement);
        }
    }

    fn emit_stmt(&mut self, statement: &TStmt) {
        match statement {
            TStmt::Expr(expr) => {
                self.emit_expr(expr);
            }
            TStmt::Let { slot, init } => {
                if let Some(init) = init {
                    let value = self.emit_expr(init);
                    self.fb.emit_void(Inst::Store {
                        ty: self.slot_ty(*slot),
                        ptr: self.local_ptrs[slot.index()].clone(),
                        value,
                    });
                }
            }
            TStmt::Return { value } => {
                match self.ret_target {
                    Some(target) => self.fb.terminate(Terminator::Br(target)),
                    None => {
                        let value = value.as_ref().map(|value| self.emit_expr(value));
                        self.fb.terminate(Terminator::Ret(value));
                    }
                }
                // Orphan statements the parser allowed land here
                let orphan = self.fb.new_block();
                self.fb.switch_to(orphan);
            }
            TStmt::Break => {
                let target = self.fb.break_target().expect("Checked by the analyzer");
                self.fb.terminate(Terminator::Br(target));
                let orphan = self.fb.new_block();
                self.fb.switch_to(orphan);
            }
            TStmt::If {
                condition,
                then_block,
                else_block,
            } => {
                let condition = self.emit_expr(condition);
                let then_bb = self.fb.new_block();
                let merge_bb = self.fb.new_block();
                let else_bb = match else_block {
                    Some(_) => self.fb.new_block(),
                    None => merge_bb,
                };
                self.fb.terminate(Terminator::CondBr {
                    condition,
                    then_block: then_bb,
                    else_block: else_bb,
                });

                self.fb.switch_to(then_bb);
                self.emit_block(then_block);
                self.fb.terminate(Terminator::Br(merge_bb));

                if let Some(else_block) = else_block {
                    self.fb.switch_to(else_bb);
                    self.emit_block(else_block);
                    self.fb.terminate(Terminator::Br(merge_bb));
                }

                self.fb.switch_to(merge_bb);
            }
            TStmt::While { condition, body } => {
                let head_bb = self.fb.new_block();
                let body_bb = self.fb.new_block();
                let merge_bb = self.fb.new_block();

                self.fb.terminate(Terminator::Br(head_bb));
                self.fb.switch_to(head_bb);
                let condition = self.emit_expr(condition);
                self.fb.terminate(Terminator::CondBr {
                    condition,
                    then_block: body_bb,
                    else_block: merge_bb,
                });

                self.fb.switch_to(body_bb);
                self.fb.push_break_target(merge_bb);
                self.emit_block(body);
                self.fb.pop_break_target();
                self.fb.terminate(Terminator::Br(head_bb));

                self.fb.switch_to(merge_bb);
            }
            TStmt::Foreach { object, slot, body } => self.emit_foreach(*object, *slot, body),
            TStmt::Block(block) => self.emit_block(block),
        }
    }

    /// Type-list iteration with a two-cursor advance: the next node is
    /// grabbed before the body runs, dead nodes (id zero) are skipped,
    /// the walk stops at the tail sentinel
    fn emit_foreach(&mut self, object: ObjectId, slot: sema::LocalId, body: &TBlock) {
        let (head, tail) = self.lw.list_sentinels[object.index()].expect("User type");
        let strukt = self.lw.object_struct(object);
        let root_struct = self.lw.object_struct(ROOT_OBJECT);

        let cursor = self.fb.emit(Inst::Alloca { ty: IrType::Ptr });
        let first = self
            .lw
            .load_node_ptr(&mut self.fb, Value::Global(head), NODE_NEXT);
        self.fb.emit_void(Inst::Store {
            ty: IrType::Ptr,
            ptr: cursor.clone(),
            value: first,
        });

        let head_bb = self.fb.new_block();
        let check_bb = self.fb.new_block();
        let body_bb = self.fb.new_block();
        let skip_bb = self.fb.new_block();
        let merge_bb = self.fb.new_block();

        self.fb.terminate(Terminator::Br(head_bb));

        self.fb.switch_to(head_bb);
        let current = self.fb.emit(Inst::Load {
            ty: IrType::Ptr,
            ptr: cursor.clone(),
        });
        let done = self.fb.emit(Inst::Cmp {
            op: CmpOp::Eq,
            ty: IrType::Ptr,
            lhs: current.clone(),
            rhs: Value::Global(tail),
        });
        self.fb.terminate(Terminator::CondBr {
            condition: done,
            then_block: merge_bb,
            else_block: check_bb,
        });

        self.fb.switch_to(check_bb);
        let next = self
            .lw
            .load_node_ptr(&mut self.fb, current.clone(), NODE_NEXT);
        let base = self.fb.emit(Inst::ContainerOf {
            strukt,
            index: OBJ_NODE,
            field: current,
        });
        let root_ptr = self.lw.descend(&mut self.fb, base, object, ROOT_OBJECT);
        let id_field = self.fb.emit(Inst::FieldPtr {
            strukt: root_struct,
            base: root_ptr.clone(),
            index: ROOT_ID,
        });
        let object_id = self.fb.emit(Inst::Load {
            ty: IrType::I64,
            ptr: id_field,
        });
        let alive = self.fb.emit(Inst::Cmp {
            op: CmpOp::Ne,
            ty: IrType::I64,
            lhs: object_id.clone(),
            rhs: Value::I64(0),
        });
        self.fb.terminate(Terminator::CondBr {
            condition: alive,
            then_block: body_bb,
            else_block: skip_bb,
        });

        self.fb.switch_to(body_bb);
        let reference = self.fb.emit(Inst::Pack {
            ty: IrType::Struct(self.lw.ref_struct),
            values: vec![object_id, root_ptr],
        });
        self.fb.emit_void(Inst::Store {
            ty: self.slot_ty(slot),
            ptr: self.local_ptrs[slot.index()].clone(),
            value: reference,
        });
        self.fb.push_break_target(merge_bb);
        self.emit_block(body);
        self.fb.pop_break_target();
        self.fb.terminate(Terminator::Br(skip_bb));

        self.fb.switch_to(skip_bb);
        self.fb.emit_void(Inst::Store {
            ty: IrType::Ptr,
            ptr: cursor,
            value: next,
        });
        self.fb.terminate(Terminator::Br(head_bb));

        self.fb.switch_to(merge_bb);
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn emit_expr(&mut self, expr: &TExpr) -> Value {
        match &expr.kind {
            TExprKind::Int(value) => Value::I32(*value),
            TExprKind::Bool(value) => Value::I1(*value),
            TExprKind::Float(value) => Value::F64(*value),
            TExprKind::Str(value) => Value::Str(self.lw.builder.intern_string(value.clone())),
            TExprKind::Null => self.fb.emit(Inst::Pack {
                ty: IrType::Struct(self.lw.ref_struct),
                values: vec![Value::I64(0), Value::Null],
            }),
            TExprKind::Local(_)
            | TExprKind::Global(_)
            | TExprKind::Member { .. }
            | TExprKind::Index { .. } => {
                let (ptr, ty) = self.emit_place(expr);
                self.fb.emit(Inst::Load { ty, ptr })
            }
            TExprKind::ArrayLit(elements) => {
                let values = elements
                    .iter()
                    .map(|element| self.emit_expr(element))
                    .collect();
                self.fb.emit(Inst::Pack {
                    ty: self.lw.ty_to_ir(&expr.ty),
                    values,
                })
            }
            TExprKind::Conv { from, value } => {
                let inner = self.emit_expr(value);
                match (from, &expr.ty) {
                    (Ty::Int, Ty::Float) => self.fb.emit(Inst::IntToFloat { value: inner }),
                    (Ty::Float, Ty::Int) => self.fb.emit(Inst::FloatToInt { value: inner }),
                    // Object widening never changes the representation
                    _ => inner,
                }
            }
            TExprKind::Unary { op, value } => {
                let inner = self.emit_expr(value);
                match op {
                    mgc_ast::UnaryOp::Neg => self.fb.emit(Inst::Neg {
                        ty: self.lw.ty_to_ir(&expr.ty),
                        value: inner,
                    }),
                    mgc_ast::UnaryOp::Not => self.fb.emit(Inst::Not { value: inner }),
                }
            }
            TExprKind::Binary { op, lhs, rhs } => self.emit_binary(*op, lhs, rhs, &expr.ty),
            TExprKind::Assign { target, value } => {
                let (ptr, ty) = self.emit_place(target);
                let value = self.emit_expr(value);
                self.fb.emit_void(Inst::Store {
                    ty,
                    ptr,
                    value: value.clone(),
                });
                value
            }
            TExprKind::CompoundAssign { op, target, value } => {
                let (ptr, ty) = self.emit_place(target);
                let old = self.fb.emit(Inst::Load {
                    ty: ty.clone(),
                    ptr: ptr.clone(),
                });
                let rhs = self.emit_expr(value);
                let result = self.fb.emit(Inst::Binary {
                    op: arith_op(*op),
                    ty: ty.clone(),
                    lhs: old,
                    rhs,
                });
                self.fb.emit_void(Inst::Store {
                    ty,
                    ptr,
                    value: result.clone(),
                });
                result
            }
            TExprKind::Incr {
                target,
                delta,
                post,
            } => {
                let (ptr, ty) = self.emit_place(target);
                let old = self.fb.emit(Inst::Load {
                    ty: ty.clone(),
                    ptr: ptr.clone(),
                });
                let one = match ty {
                    IrType::F64 => Value::F64(1.0),
                    _ => Value::I32(1),
                };
                let op = if *delta > 0 { BinOp::Add } else { BinOp::Sub };
                let new = self.fb.emit(Inst::Binary {
                    op,
                    ty: ty.clone(),
                    lhs: old.clone(),
                    rhs: one,
                });
                self.fb.emit_void(Inst::Store {
                    ty,
                    ptr,
                    value: new.clone(),
                });
                if *post {
                    old
                } else {
                    new
                }
            }
            TExprKind::Call { func, args } => {
                let args = args.iter().map(|arg| self.emit_expr(arg)).collect();
                self.emit_call(*func, args, &expr.ty)
            }
            TExprKind::MethodCall { func, this, args } => {
                let mut values = vec![self.emit_expr(this)];
                values.extend(args.iter().map(|arg| self.emit_expr(arg)));
                self.emit_call(*func, values, &expr.ty)
            }
            TExprKind::Create { object, args } => {
                let values = args.iter().map(|arg| self.emit_expr(arg)).collect();
                let new_fn = self.lw.new_fns[object.index()].expect("User type");
                self.fb.emit(Inst::Call {
                    func: new_fn,
                    args: values,
                })
            }
            TExprKind::Destroy { value } => self.emit_destroy(value),
        }
    }

    fn emit_call(&mut self, func: sema::FuncId, args: Vec<Value>, ret: &Ty) -> Value {
        let callee = self.lw.func_map[func.index()];
        if *ret == Ty::Void {
            self.fb.emit_void(Inst::Call { func: callee, args });
            Value::Null
        } else {
            self.fb.emit(Inst::Call { func: callee, args })
        }
    }

    /// Destroy expression: dispatch the destroy event through the
    /// vtable, then store zero into the root id. Memory stays around
    /// until the global loop reaps it.
    fn emit_destroy(&mut self, value: &TExpr) -> Value {
        let Ty::Object(static_object) = value.ty.clone() else {
            unreachable!("Checked by the analyzer");
        };
        let reference = self.emit_expr(value);
        let ref_ty = IrType::Struct(self.lw.ref_struct);
        let root_struct = self.lw.object_struct(ROOT_OBJECT);

        let base = self.fb.emit(Inst::Extract {
            ty: ref_ty.clone(),
            index: 1,
            value: reference.clone(),
        });
        let root_ptr = self
            .lw
            .descend(&mut self.fb, base, static_object, ROOT_OBJECT);
        let vtable_field = self.fb.emit(Inst::FieldPtr {
            strukt: root_struct,
            base: root_ptr.clone(),
            index: ROOT_VTABLE,
        });
        let vtable = self.fb.emit(Inst::Load {
            ty: IrType::Ptr,
            ptr: vtable_field,
        });
        let handler_field = self.fb.emit(Inst::FieldPtr {
            strukt: self.lw.vtable_struct,
            base: vtable,
            index: VT_DESTROY,
        });
        let handler = self.fb.emit(Inst::Load {
            ty: IrType::Ptr,
            ptr: handler_field,
        });
        self.fb.emit_void(Inst::CallPtr {
            ptr: handler,
            params: vec![ref_ty],
            ret: IrType::Void,
            args: vec![reference],
        });

        let id_field = self.fb.emit(Inst::FieldPtr {
            strukt: root_struct,
            base: root_ptr,
            index: ROOT_ID,
        });
        self.fb.emit_void(Inst::Store {
            ty: IrType::I64,
            ptr: id_field,
            value: Value::I64(0),
        });
        Value::Null
    }

    fn emit_binary(&mut self, op: mgc_ast::BinaryOp, lhs: &TExpr, rhs: &TExpr, ty: &Ty) -> Value {
        use mgc_ast::BinaryOp as B;

        let operand_ty = lhs.ty.clone();
        let left = self.emit_expr(lhs);
        let right = self.emit_expr(rhs);

        match op {
            B::Add | B::Sub | B::Mul | B::Div | B::Mod => self.fb.emit(Inst::Binary {
                op: arith_op(op),
                ty: self.lw.ty_to_ir(ty),
                lhs: left,
                rhs: right,
            }),
            B::And | B::Or => self.fb.emit(Inst::Binary {
                op: if op == B::And { BinOp::And } else { BinOp::Or },
                ty: IrType::I1,
                lhs: left,
                rhs: right,
            }),
            B::Eq | B::Ne | B::Lt | B::Le | B::Gt | B::Ge => {
                if operand_ty.is_object() {
                    // Object equality is id equality
                    let ref_ty = IrType::Struct(self.lw.ref_struct);
                    let left_id = self.fb.emit(Inst::Extract {
                        ty: ref_ty.clone(),
                        index: 0,
                        value: left,
                    });
                    let right_id = self.fb.emit(Inst::Extract {
                        ty: ref_ty,
                        index: 0,
                        value: right,
                    });
                    self.fb.emit(Inst::Cmp {
                        op: cmp_op(op),
                        ty: IrType::I64,
                        lhs: left_id,
                        rhs: right_id,
                    })
                } else {
                    self.fb.emit(Inst::Cmp {
                        op: cmp_op(op),
                        ty: self.lw.ty_to_ir(&operand_ty),
                        lhs: left,
                        rhs: right,
                    })
                }
            }
        }
    }

    /// The address and type of a place expression. Anything else is
    /// spilled to a fresh stack slot (a subscripted array literal, for
    /// instance).
    fn emit_place(&mut self, expr: &TExpr) -> (Value, IrType) {
        match &expr.kind {
            TExprKind::Local(slot) => {
                (self.local_ptrs[slot.index()].clone(), self.slot_ty(*slot))
            }
            TExprKind::Global(global) => {
                let ty = self.lw.ty_to_ir(&self.lw.an[*global].ty);
                (Value::Global(self.lw.user_globals[global.index()]), ty)
            }
            TExprKind::Member {
                base,
                definer,
                index,
            } => {
                let Ty::Object(static_object) = base.ty.clone() else {
                    unreachable!("Checked by the analyzer");
                };
                let reference = self.emit_expr(base);
                let object_ptr = self.fb.emit(Inst::Extract {
                    ty: IrType::Struct(self.lw.ref_struct),
                    index: 1,
                    value: reference,
                });
                let definer_ptr =
                    self.lw
                        .descend(&mut self.fb, object_ptr, static_object, *definer);
                let member_ty = self
                    .lw
                    .ty_to_ir(&self.lw.an[*definer].members[*index].ty);
                let field = self.fb.emit(Inst::FieldPtr {
                    strukt: self.lw.object_struct(*definer),
                    base: definer_ptr,
                    index: OBJ_MEMBERS + *index as u32,
                });
                (field, member_ty)
            }
            TExprKind::Index { base, index } => {
                let (base_ptr, base_ty) = self.emit_place(base);
                let IrType::Array(elem, _) = base_ty else {
                    unreachable!("Checked by the analyzer");
                };
                let index = self.emit_expr(index);
                let ptr = self.fb.emit(Inst::ElemPtr {
                    elem: (*elem).clone(),
                    base: base_ptr,
                    index,
                });
                (ptr, *elem)
            }
            _ => {
                let ty = self.lw.ty_to_ir(&expr.ty);
                let value = self.emit_expr(expr);
                let slot = self.fb.emit(Inst::Alloca { ty: ty.clone() });
                self.fb.emit_void(Inst::Store {
                    ty: ty.clone(),
                    ptr: slot.clone(),
                    value,
                });
                (slot, ty)
            }
        }
    }
}

fn arith_op(op: mgc_ast::BinaryOp) -> BinOp {
    match op {
        mgc_ast::BinaryOp::Add => BinOp::Add,
        mgc_ast::BinaryOp::Sub => BinOp::Sub,
        mgc_ast::BinaryOp::Mul => BinOp::Mul,
        mgc_ast::BinaryOp::Div => BinOp::Div,
        mgc_ast::BinaryOp::Mod => BinOp::Rem,
        other => unreachable!("{other} is not arithmetic"),
    }
}

fn cmp_op(op: mgc_ast::BinaryOp) -> CmpOp {
    match op {
        mgc_ast::BinaryOp::Eq => CmpOp::Eq,
        mgc_ast::BinaryOp::Ne => CmpOp::Ne,
        mgc_ast::BinaryOp::Lt => CmpOp::Lt,
        mgc_ast::BinaryOp::Le => CmpOp::Le,
        mgc_ast::BinaryOp::Gt => CmpOp::Gt,
        mgc_ast::BinaryOp::Ge => CmpOp::Ge,
        other => unreachable!("{other} is not a comparison"),
    }
}

#[cfg(test)]
mod tests {
    use mgc_common::{Ident, Span};
    use mgc_sema::{
        Analysis, EventSet, GlobalInfo, MemberInfo, ObjectId, ObjectInfo, TConst, Ty, ROOT_OBJECT,
    };

    use super::lower;
    use crate::validate::validate;

    fn object(name: &str, parent: Option<ObjectId>, members: Vec<MemberInfo>) -> ObjectInfo {
        ObjectInfo {
            name: Ident::new(name),
            mangled: name.to_string(),
            parent,
            members,
            methods: Vec::new(),
            events: EventSet::default(),
            span: Span::EMPTY,
        }
    }

    fn minimal_analysis() -> Analysis {
        Analysis {
            objects: vec![
                object("object", None, Vec::new()),
                object(
                    "main",
                    Some(ROOT_OBJECT),
                    vec![MemberInfo {
                        name: Ident::new("score"),
                        ty: Ty::Int,
                        span: Span::EMPTY,
                    }],
                ),
            ],
            functions: Vec::new(),
            globals: vec![GlobalInfo {
                mangled: "lives".to_string(),
                ty: Ty::Int,
                init: TConst::Int(3),
                span: Span::EMPTY,
            }],
            main_object: ObjectId(1),
        }
    }

    #[test]
    fn minimal_module_is_valid() {
        let module = lower(&minimal_analysis());
        validate(&module).expect("The lowered module is structurally valid");

        for name in ["global_create", "global_step", "global_draw", "main.new"] {
            assert!(
                module.function_by_name(name).is_some(),
                "{name} is missing"
            );
        }
    }

    #[test]
    fn object_layout_is_parent_first() {
        let module = lower(&minimal_analysis());
        let main = module
            .structs
            .iter()
            .find(|strukt| strukt.name == "main")
            .expect("The main record exists");
        // { parent prefix, list node, score }
        assert_eq!(main.fields.len(), 3);

        let text = module.to_string();
        assert!(text.contains("global @main.vtable"));
        assert!(text.contains("global @main.list.head"));
        assert!(text.contains("global @object.counter: i64 = 0"));
        assert!(text.contains("global @lives: i32 = 3"));
    }
}
