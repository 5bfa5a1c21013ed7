//! The type checker: declaration collection, scope construction and
//! the expression/statement checker producing the typed tree

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};

use mgc_ast as ast;
use mgc_ast::{
    BinaryOp, EventKind, ExprKind, NamespaceId, NamespaceRef, Program, Statement, TypePath,
    TypeSpec, TypeSpecKind, UnaryOp,
};
use mgc_common::{Ident, Span};
use mgc_error::{DefinitionKind, LangError, LangErrorKind, Result};

use crate::inheritance::check_cycles;
use crate::resolver::resolve;
use crate::scope::{BlockScopes, NamespaceScope};
use crate::tree::{TBlock, TExpr, TExprKind, TStmt};
use crate::{
    Analysis, EventSet, FuncId, FunctionInfo, FunctionKind, GlobalId, GlobalInfo, LocalId,
    LocalInfo, MemberInfo, ObjectId, ObjectInfo, ParamInfo, TConst, Ty, ROOT_OBJECT,
};

pub(crate) struct Analyzer<'a> {
    program: &'a Program,
    analysis: Analysis,
    object_ids: FxHashMap<(NamespaceId, Ident), ObjectId>,
    func_ids: FxHashMap<(NamespaceId, Ident), FuncId>,
    global_ids: FxHashMap<(NamespaceId, Ident), GlobalId>,
    /// Namespaces in deterministic traversal order: the root tree
    /// first, then each loaded file's tree in load order
    ns_order: Vec<NamespaceId>,
    /// The `.`-joined mangling prefix of every traversed namespace
    ns_prefix: FxHashMap<NamespaceId, String>,
    obj_sources: Vec<Option<ObjSource<'a>>>,
    fn_sources: Vec<Option<FnSource<'a>>>,
    ns_scopes: FxHashMap<NamespaceId, NamespaceScope>,
}

#[derive(Clone, Copy)]
struct ObjSource<'a> {
    ast: &'a ast::ObjectDef,
    ns: NamespaceId,
}

#[derive(Clone, Copy)]
struct FnSource<'a> {
    ast: &'a ast::Function,
    ns: NamespaceId,
    object: Option<ObjectId>,
}

fn err(kind: LangErrorKind, span: Span) -> mgc_error::CompileError {
    LangError::new(kind, span).into()
}

/// `this` and `super` can never be introduced into any scope
fn check_reserved(name: &Ident, span: Span) -> Result<()> {
    if *name == "this" || *name == "super" {
        return Err(err(
            LangErrorKind::ReservedIdent { name: name.clone() },
            span,
        ));
    }
    Ok(())
}

impl<'a> Analyzer<'a> {
    pub fn new(program: &'a Program) -> Self {
        let root_object = ObjectInfo {
            name: Ident::new("object"),
            mangled: "object".to_string(),
            parent: None,
            members: Vec::new(),
            methods: Vec::new(),
            events: EventSet::default(),
            span: Span::EMPTY,
        };
        Analyzer {
            program,
            analysis: Analysis {
                objects: vec![root_object],
                functions: Vec::new(),
                globals: Vec::new(),
                main_object: ROOT_OBJECT,
            },
            object_ids: FxHashMap::default(),
            func_ids: FxHashMap::default(),
            global_ids: FxHashMap::default(),
            ns_order: Vec::new(),
            ns_prefix: FxHashMap::default(),
            obj_sources: vec![None],
            fn_sources: Vec::new(),
            ns_scopes: FxHashMap::default(),
        }
    }

    pub fn run(mut self) -> Result<Analysis> {
        self.collect_namespaces()?;
        self.register_objects()?;
        self.resolve_parents()?;
        check_cycles(&self.analysis.objects)?;
        self.declare_signatures()?;
        self.find_main()?;
        self.build_scopes()?;
        self.check_bodies()?;
        Ok(self.analysis)
    }

    // ------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------

    fn collect_namespaces(&mut self) -> Result<()> {
        self.visit_namespace(self.program.root, String::new())?;

        let mut used_stems = FxHashSet::default();
        for (path, id) in &self.program.files {
            let stem = Path::new(path.as_ref())
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string());
            let mut unique = stem.clone();
            let mut counter = 2;
            while !used_stems.insert(unique.clone()) {
                unique = format!("{stem}{counter}");
                counter += 1;
            }
            self.visit_namespace(*id, unique)?;
        }
        Ok(())
    }

    fn visit_namespace(&mut self, id: NamespaceId, prefix: String) -> Result<()> {
        self.ns_order.push(id);

        let mut names: FxHashMap<&Ident, Span> = FxHashMap::default();
        for inner in &self.program[id].inner {
            check_reserved(&inner.name, inner.span)?;
            if let Some(previous) = names.insert(&inner.name, inner.span) {
                return Err(err(
                    LangErrorKind::DuplicateDefinition {
                        kind: DefinitionKind::Namespace,
                        name: inner.name.clone(),
                        previous,
                    },
                    inner.span,
                ));
            }
        }

        for inner in &self.program[id].inner {
            if let NamespaceRef::Concrete(child) = inner.target {
                let child_prefix = mangle(&prefix, inner.name.as_str());
                self.visit_namespace(child, child_prefix)?;
            }
        }

        self.ns_prefix.insert(id, prefix);
        Ok(())
    }

    fn register_objects(&mut self) -> Result<()> {
        for &ns in &self.ns_order {
            let prefix = self.ns_prefix[&ns].clone();
            for object in &self.program[ns].objects {
                check_reserved(&object.name, object.span)?;
                let id = ObjectId(self.analysis.objects.len() as u32);
                if let Some(previous) = self
                    .object_ids
                    .insert((ns, object.name.clone()), id)
                {
                    return Err(err(
                        LangErrorKind::DuplicateDefinition {
                            kind: DefinitionKind::Object,
                            name: object.name.clone(),
                            previous: self.analysis[previous].span,
                        },
                        object.span,
                    ));
                }
                self.analysis.objects.push(ObjectInfo {
                    name: object.name.clone(),
                    mangled: mangle(&prefix, object.name.as_str()),
                    parent: None,
                    members: Vec::new(),
                    methods: Vec::new(),
                    events: EventSet::default(),
                    span: object.span,
                });
                self.obj_sources.push(Some(ObjSource { ast: object, ns }));
            }
        }
        Ok(())
    }

    fn resolve_parents(&mut self) -> Result<()> {
        for index in 0..self.analysis.objects.len() {
            let Some(source) = self.obj_sources[index] else {
                continue;
            };
            let parent = match &source.ast.parent {
                None => ROOT_OBJECT,
                Some(path) => {
                    let target = resolve(self.program, source.ns, &path.chain.segments, true)?;
                    self.object_ids
                        .get(&(target, path.name.clone()))
                        .copied()
                        .ok_or_else(|| {
                            err(
                                LangErrorKind::UnknownParent {
                                    name: path.name.clone(),
                                },
                                path.span,
                            )
                        })?
                }
            };
            self.analysis.objects[index].parent = Some(parent);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Signatures
    // ------------------------------------------------------------------

    fn declare_signatures(&mut self) -> Result<()> {
        for order_index in 0..self.ns_order.len() {
            let ns = self.ns_order[order_index];
            self.declare_namespace_items(ns)?;
        }
        for index in 0..self.analysis.objects.len() {
            if let Some(source) = self.obj_sources[index] {
                self.declare_object_items(ObjectId(index as u32), source)?;
            }
        }
        Ok(())
    }

    fn declare_namespace_items(&mut self, ns: NamespaceId) -> Result<()> {
        let prefix = self.ns_prefix[&ns].clone();

        for global in &self.program[ns].globals {
            check_reserved(&global.name, global.span)?;
            let ty = self.resolve_type(ns, &global.typ)?;
            if ty == Ty::Void {
                return Err(err(
                    LangErrorKind::VoidBinding {
                        name: global.name.clone(),
                    },
                    global.span,
                ));
            }
            let init = match &global.init {
                Some(expr) => self.const_eval(&ty, expr)?,
                None => TConst::zero_of(&ty),
            };
            let id = GlobalId(self.analysis.globals.len() as u32);
            if let Some(previous) = self.global_ids.insert((ns, global.name.clone()), id) {
                return Err(err(
                    LangErrorKind::DuplicateDefinition {
                        kind: DefinitionKind::Global,
                        name: global.name.clone(),
                        previous: self.analysis[previous].span,
                    },
                    global.span,
                ));
            }
            self.analysis.globals.push(GlobalInfo {
                mangled: mangle(&prefix, global.name.as_str()),
                ty,
                init,
                span: global.span,
            });
        }

        for function in &self.program[ns].functions {
            check_reserved(&function.name, function.span)?;
            let is_extern = function.function.block.is_none();
            let (params, ret) = self.resolve_signature(ns, &function.function)?;
            let mangled = if is_extern {
                function.name.to_string()
            } else {
                mangle(&prefix, function.name.as_str())
            };
            let id = FuncId(self.analysis.functions.len() as u32);
            if let Some(previous) = self.func_ids.insert((ns, function.name.clone()), id) {
                return Err(err(
                    LangErrorKind::DuplicateDefinition {
                        kind: DefinitionKind::Function,
                        name: function.name.clone(),
                        previous: self.analysis[previous].span,
                    },
                    function.span,
                ));
            }
            self.analysis.functions.push(FunctionInfo {
                mangled,
                kind: if is_extern {
                    FunctionKind::Extern
                } else {
                    FunctionKind::Free
                },
                params,
                ret,
                body: None,
                locals: Vec::new(),
                span: function.span,
            });
            self.fn_sources.push(if is_extern {
                None
            } else {
                Some(FnSource {
                    ast: &function.function,
                    ns,
                    object: None,
                })
            });
        }

        Ok(())
    }

    fn declare_object_items(&mut self, object: ObjectId, source: ObjSource<'a>) -> Result<()> {
        let ObjSource { ast: def, ns } = source;
        let object_mangled = self.analysis[object].mangled.clone();

        let mut members = Vec::new();
        for member in &def.members {
            check_reserved(&member.name, member.span)?;
            let ty = self.resolve_type(ns, &member.typ)?;
            if ty == Ty::Void {
                return Err(err(
                    LangErrorKind::VoidBinding {
                        name: member.name.clone(),
                    },
                    member.span,
                ));
            }
            if let Some(previous) = members
                .iter()
                .find(|existing: &&MemberInfo| existing.name == member.name)
            {
                return Err(err(
                    LangErrorKind::DuplicateDefinition {
                        kind: DefinitionKind::Member,
                        name: member.name.clone(),
                        previous: previous.span,
                    },
                    member.span,
                ));
            }
            members.push(MemberInfo {
                name: member.name.clone(),
                ty,
                span: member.span,
            });
        }
        self.analysis.objects[object.index()].members = members;

        for method in &def.methods {
            check_reserved(&method.name, method.span)?;
            if method.function.block.is_none() {
                return Err(err(
                    LangErrorKind::ExternMethod {
                        name: method.name.clone(),
                    },
                    method.span,
                ));
            }
            let (params, ret) = self.resolve_signature(ns, &method.function)?;
            let id = FuncId(self.analysis.functions.len() as u32);
            if let Some((_, previous)) = self.analysis.objects[object.index()]
                .methods
                .iter()
                .find(|(name, _)| *name == method.name)
            {
                return Err(err(
                    LangErrorKind::DuplicateDefinition {
                        kind: DefinitionKind::Method,
                        name: method.name.clone(),
                        previous: self.analysis[*previous].span,
                    },
                    method.span,
                ));
            }
            self.analysis.functions.push(FunctionInfo {
                mangled: format!("{object_mangled}.{}", method.name),
                kind: FunctionKind::Method { object },
                params,
                ret,
                body: None,
                locals: Vec::new(),
                span: method.span,
            });
            self.fn_sources.push(Some(FnSource {
                ast: &method.function,
                ns,
                object: Some(object),
            }));
            self.analysis.objects[object.index()]
                .methods
                .push((method.name.clone(), id));
        }

        for event in &def.events {
            if event.kind != EventKind::Create && !event.function.formals.is_empty() {
                return Err(err(
                    LangErrorKind::IllegalEventSignature {
                        event: Ident::new(event.kind.name()),
                    },
                    event.span,
                ));
            }
            let (params, ret) = self.resolve_signature(ns, &event.function)?;
            let id = FuncId(self.analysis.functions.len() as u32);
            self.analysis.functions.push(FunctionInfo {
                mangled: format!("{object_mangled}.{}", event.kind.name()),
                kind: FunctionKind::Event {
                    object,
                    kind: event.kind,
                },
                params,
                ret,
                body: None,
                locals: Vec::new(),
                span: event.span,
            });
            self.fn_sources.push(Some(FnSource {
                ast: &event.function,
                ns,
                object: Some(object),
            }));
            if let Some(previous) = self.analysis.objects[object.index()]
                .events
                .set(event.kind, id)
            {
                return Err(err(
                    LangErrorKind::DuplicateDefinition {
                        kind: DefinitionKind::Event,
                        name: Ident::new(event.kind.name()),
                        previous: self.analysis[previous].span,
                    },
                    event.span,
                ));
            }
        }

        Ok(())
    }

    fn resolve_signature(
        &self,
        ns: NamespaceId,
        function: &ast::Function,
    ) -> Result<(Vec<ParamInfo>, Ty)> {
        let ret = self.resolve_type(ns, &function.return_type)?;
        let mut params: Vec<ParamInfo> = Vec::new();
        for formal in &function.formals {
            check_reserved(&formal.name, formal.span)?;
            let ty = self.resolve_type(ns, &formal.typ)?;
            if ty == Ty::Void {
                return Err(err(
                    LangErrorKind::VoidBinding {
                        name: formal.name.clone(),
                    },
                    formal.span,
                ));
            }
            if let Some(previous) = params.iter().find(|param| param.name == formal.name) {
                return Err(err(
                    LangErrorKind::DuplicateDefinition {
                        kind: DefinitionKind::Formal,
                        name: formal.name.clone(),
                        previous: previous.span,
                    },
                    formal.span,
                ));
            }
            params.push(ParamInfo {
                name: formal.name.clone(),
                ty,
                span: formal.span,
            });
        }
        Ok((params, ret))
    }

    fn find_main(&mut self) -> Result<()> {
        let main = self
            .object_ids
            .get(&(self.program.root, Ident::new("main")))
            .copied()
            .ok_or_else(|| err(LangErrorKind::MissingMain, Span::EMPTY))?;
        self.analysis.main_object = main;

        // global_create performs `create main()`, so the effective
        // create event must take no formals
        if let Some((_, create)) = self.analysis.effective_event(main, EventKind::Create) {
            let params = self.analysis[create].params.len();
            if params != 0 {
                return Err(err(
                    LangErrorKind::ArgumentCountMismatch {
                        expected: params,
                        got: 0,
                        declared: Some(self.analysis[create].span),
                    },
                    self.analysis[main].span,
                ));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    fn resolve_type(&self, ns: NamespaceId, typ: &TypeSpec) -> Result<Ty> {
        let ty = match &typ.kind {
            TypeSpecKind::Int => Ty::Int,
            TypeSpecKind::Bool => Ty::Bool,
            TypeSpecKind::Float => Ty::Float,
            TypeSpecKind::Str => Ty::Str,
            TypeSpecKind::Void => Ty::Void,
            TypeSpecKind::Sprite => Ty::Sprite,
            TypeSpecKind::Sound => Ty::Sound,
            TypeSpecKind::Object { chain, name } => {
                let target = resolve(self.program, ns, &chain.segments, true)?;
                let id = self
                    .object_ids
                    .get(&(target, name.clone()))
                    .copied()
                    .ok_or_else(|| {
                        err(LangErrorKind::MissingObject { name: name.clone() }, typ.span)
                    })?;
                Ty::Object(id)
            }
            TypeSpecKind::Array { elem, len } => {
                let elem_ty = self.resolve_type(ns, elem)?;
                if elem_ty == Ty::Void {
                    return Err(err(
                        LangErrorKind::UnexpectedType {
                            expected: vec!["a non-void element type".to_string()],
                            got: "void".to_string(),
                        },
                        elem.span,
                    ));
                }
                Ty::Array(Box::new(elem_ty), *len)
            }
        };
        Ok(ty)
    }

    fn resolve_object(&self, ns: NamespaceId, path: &TypePath) -> Result<ObjectId> {
        let target = resolve(self.program, ns, &path.chain.segments, true)?;
        self.object_ids
            .get(&(target, path.name.clone()))
            .copied()
            .ok_or_else(|| {
                err(
                    LangErrorKind::MissingObject {
                        name: path.name.clone(),
                    },
                    path.span,
                )
            })
    }

    // ------------------------------------------------------------------
    // Constant folding for global initializers
    // ------------------------------------------------------------------

    fn const_eval(&self, expected: &Ty, expr: &ast::Expression) -> Result<TConst> {
        let illegal = || err(LangErrorKind::IllegalGlobalInitializer, expr.span);
        let mismatch = |got: &Ty| {
            err(
                LangErrorKind::IllegalAssignment {
                    expected: self.ty_name(expected),
                    got: self.ty_name(got),
                },
                expr.span,
            )
        };

        match (&expr.kind, expected) {
            (ExprKind::IntLit(value), Ty::Int) => Ok(TConst::Int(*value)),
            // Int literals fold into float globals
            (ExprKind::IntLit(value), Ty::Float) => Ok(TConst::Float(f64::from(*value))),
            (ExprKind::IntLit(_), _) => Err(mismatch(&Ty::Int)),
            (ExprKind::BoolLit(value), Ty::Bool) => Ok(TConst::Bool(*value)),
            (ExprKind::BoolLit(_), _) => Err(mismatch(&Ty::Bool)),
            (ExprKind::FloatLit(value), Ty::Float) => Ok(TConst::Float(*value)),
            (ExprKind::FloatLit(_), _) => Err(mismatch(&Ty::Float)),
            (
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    value,
                },
                _,
            ) => match self.const_eval(expected, value)? {
                TConst::Int(value) => Ok(TConst::Int(-value)),
                TConst::Float(value) => Ok(TConst::Float(-value)),
                _ => Err(illegal()),
            },
            (ExprKind::ArrayLit(elements), Ty::Array(elem, len)) => {
                if elements.is_empty() {
                    return Err(err(LangErrorKind::EmptyArrayLiteral, expr.span));
                }
                if elements.len() != *len as usize {
                    let got = Ty::Array(elem.clone(), elements.len() as u32);
                    return Err(mismatch(&got));
                }
                elements
                    .iter()
                    .map(|element| self.const_eval(elem, element))
                    .collect::<Result<Vec<_>>>()
                    .map(TConst::Array)
            }
            (ExprKind::ArrayLit(_), _) => Err(illegal()),
            _ => Err(illegal()),
        }
    }

    fn ty_name(&self, ty: &Ty) -> String {
        self.analysis.ty_name(ty)
    }

    // ------------------------------------------------------------------
    // Scopes and bodies
    // ------------------------------------------------------------------

    fn build_scopes(&mut self) -> Result<()> {
        for index in 0..self.ns_order.len() {
            let ns = self.ns_order[index];
            let scope = self.build_namespace_scope(ns)?;
            self.ns_scopes.insert(ns, scope);
        }
        Ok(())
    }

    fn build_namespace_scope(&self, ns: NamespaceId) -> Result<NamespaceScope> {
        let mut closure = Vec::new();
        let mut visited = FxHashSet::default();
        visited.insert(ns);
        self.using_closure(ns, &mut closure, &mut visited)?;

        let mut scope = NamespaceScope::default();
        for &imported in closure.iter().chain(std::iter::once(&ns)) {
            for global in &self.program[imported].globals {
                if let Some(id) = self.global_ids.get(&(imported, global.name.clone())) {
                    scope.values.insert(global.name.clone(), *id);
                }
            }
            for function in &self.program[imported].functions {
                if let Some(id) = self.func_ids.get(&(imported, function.name.clone())) {
                    scope.functions.insert(function.name.clone(), *id);
                }
            }
        }
        Ok(scope)
    }

    /// Collects the transitive closure of `using` imports in discovery
    /// order. Private imports are followed like public ones.
    fn using_closure(
        &self,
        ns: NamespaceId,
        out: &mut Vec<NamespaceId>,
        visited: &mut FxHashSet<NamespaceId>,
    ) -> Result<()> {
        for using in &self.program[ns].usings {
            let target = resolve(self.program, ns, &using.chain.segments, true)?;
            if visited.insert(target) {
                out.push(target);
                self.using_closure(target, out, visited)?;
            }
        }
        Ok(())
    }

    fn check_bodies(&mut self) -> Result<()> {
        for index in 0..self.analysis.functions.len() {
            let Some(source) = self.fn_sources[index] else {
                continue;
            };
            let Some(block) = &source.ast.block else {
                continue;
            };
            let (locals, body) = {
                let checker = FnChecker::new(self, source, FuncId(index as u32));
                checker.run(block)?
            };
            let info = &mut self.analysis.functions[index];
            info.locals = locals;
            info.body = Some(body);
        }
        Ok(())
    }
}

/// Joins a mangling prefix and a name with `.`
fn mangle(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

// ----------------------------------------------------------------------
// Function body checking
// ----------------------------------------------------------------------

struct FnChecker<'a, 'b> {
    an: &'b Analyzer<'a>,
    scope: &'b NamespaceScope,
    ns: NamespaceId,
    object: Option<ObjectId>,
    this_slot: Option<LocalId>,
    super_event: Option<FuncId>,
    ret: Ty,
    func: FuncId,
    locals: Vec<LocalInfo>,
    blocks: BlockScopes,
    loop_depth: u32,
}

impl<'a, 'b> FnChecker<'a, 'b> {
    fn new(an: &'b Analyzer<'a>, source: FnSource<'a>, func: FuncId) -> Self {
        let info = &an.analysis[func];

        let super_event = match (source.object, info.kind) {
            (Some(object), FunctionKind::Event { kind, .. }) => {
                match an.analysis[object].parent {
                    Some(parent) if parent != ROOT_OBJECT => an
                        .analysis
                        .effective_event(parent, kind)
                        .map(|(_, func)| func),
                    _ => None,
                }
            }
            _ => None,
        };

        FnChecker {
            an,
            scope: &an.ns_scopes[&source.ns],
            ns: source.ns,
            object: source.object,
            this_slot: None,
            super_event,
            ret: info.ret.clone(),
            func,
            locals: Vec::new(),
            blocks: BlockScopes::default(),
            loop_depth: 0,
        }
    }

    fn run(mut self, block: &ast::Block) -> Result<(Vec<LocalInfo>, TBlock)> {
        self.blocks.push();

        if let Some(object) = self.object {
            let slot = self.alloc_slot(Ident::new("this"), Ty::Object(object));
            self.this_slot = Some(slot);
            // `this` enters the value scope directly; check_reserved
            // keeps user declarations from ever colliding with it
            self.blocks.declare(Ident::new("this"), slot, Span::EMPTY);
        }

        let params: Vec<(Ident, Ty, Span)> = self.an.analysis[self.func]
            .params
            .iter()
            .map(|param| (param.name.clone(), param.ty.clone(), param.span))
            .collect();
        for (name, ty, span) in params {
            let slot = self.alloc_slot(name.clone(), ty);
            self.blocks.declare(name, slot, span);
        }

        let body = self.check_block(block)?;
        self.blocks.pop();
        Ok((self.locals, body))
    }

    fn alloc_slot(&mut self, name: Ident, ty: Ty) -> LocalId {
        let slot = LocalId(self.locals.len() as u32);
        self.locals.push(LocalInfo { name, ty });
        slot
    }

    fn local_ty(&self, slot: LocalId) -> Ty {
        self.locals[slot.index()].ty.clone()
    }

    fn ty_name(&self, ty: &Ty) -> String {
        self.an.analysis.ty_name(ty)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn check_block(&mut self, block: &ast::Block) -> Result<TBlock> {
        self.blocks.push();
        let statements = block
            .statements
            .iter()
            .map(|statement| self.check_statement(statement))
            .collect::<Result<Vec<_>>>();
        self.blocks.pop();
        Ok(TBlock {
            statements: statements?,
        })
    }

    fn check_statement(&mut self, statement: &Statement) -> Result<TStmt> {
        match statement {
            Statement::Block(block) => Ok(TStmt::Block(self.check_block(block)?)),
            Statement::VarDecl {
                name,
                typ,
                init,
                span,
            } => {
                check_reserved(name, *span)?;
                let ty = self.an.resolve_type(self.ns, typ)?;
                if ty == Ty::Void {
                    return Err(err(
                        LangErrorKind::VoidBinding { name: name.clone() },
                        *span,
                    ));
                }
                let init = match init {
                    Some(expr) => {
                        let value = self.check_expr(expr)?;
                        Some(self.convert(&ty, value, expr.span)?)
                    }
                    None => None,
                };
                let slot = self.alloc_slot(name.clone(), ty);
                if let Some(previous) = self.blocks.declare(name.clone(), slot, *span) {
                    return Err(err(
                        LangErrorKind::DuplicateDefinition {
                            kind: DefinitionKind::Local,
                            name: name.clone(),
                            previous,
                        },
                        *span,
                    ));
                }
                Ok(TStmt::Let { slot, init })
            }
            Statement::Expr(expr) => Ok(TStmt::Expr(self.check_expr(expr)?)),
            Statement::Return { value, span } => {
                let value = match value {
                    Some(expr) => {
                        let value = self.check_expr(expr)?;
                        Some(self.convert(&self.ret.clone(), value, expr.span)?)
                    }
                    None => {
                        if self.ret != Ty::Void {
                            return Err(err(
                                LangErrorKind::IllegalAssignment {
                                    expected: self.ty_name(&self.ret),
                                    got: "void".to_string(),
                                },
                                *span,
                            ));
                        }
                        None
                    }
                };
                Ok(TStmt::Return { value })
            }
            Statement::Break { span } => {
                if self.loop_depth == 0 {
                    return Err(err(LangErrorKind::BreakOutsideLoop, *span));
                }
                Ok(TStmt::Break)
            }
            Statement::If {
                condition,
                then_block,
                else_block,
                ..
            } => {
                let condition = self.check_condition(condition)?;
                let then_block = self.check_block(then_block)?;
                let else_block = match else_block {
                    Some(statement) => Some(TBlock {
                        statements: vec![self.check_statement(statement)?],
                    }),
                    None => None,
                };
                Ok(TStmt::If {
                    condition,
                    then_block,
                    else_block,
                })
            }
            Statement::While {
                condition, body, ..
            } => {
                let condition = self.check_condition(condition)?;
                self.loop_depth += 1;
                let body = self.check_block(body)?;
                self.loop_depth -= 1;
                Ok(TStmt::While { condition, body })
            }
            Statement::For {
                init,
                condition,
                step,
                body,
                ..
            } => {
                // for (init; cond; step) { body }
                //   ==> { init; while (cond) { { body } step; } }
                self.blocks.push();
                let init = self.check_statement(init)?;
                let condition = self.check_condition(condition)?;
                self.loop_depth += 1;
                let body = self.check_block(body)?;
                self.loop_depth -= 1;
                let step = self.check_expr(step)?;
                self.blocks.pop();

                Ok(TStmt::Block(TBlock {
                    statements: vec![
                        init,
                        TStmt::While {
                            condition,
                            body: TBlock {
                                statements: vec![TStmt::Block(body), TStmt::Expr(step)],
                            },
                        },
                    ],
                }))
            }
            Statement::Foreach {
                typ,
                name,
                name_span,
                body,
                ..
            } => {
                let object = self.an.resolve_object(self.ns, typ)?;
                check_reserved(name, *name_span)?;

                self.blocks.push();
                let slot = self.alloc_slot(name.clone(), Ty::Object(object));
                self.blocks.declare(name.clone(), slot, *name_span);
                self.loop_depth += 1;
                let body = self.check_block(body)?;
                self.loop_depth -= 1;
                self.blocks.pop();

                Ok(TStmt::Foreach { object, slot, body })
            }
        }
    }

    fn check_condition(&mut self, expr: &ast::Expression) -> Result<TExpr> {
        let condition = self.check_expr(expr)?;
        if condition.ty != Ty::Bool {
            return Err(err(
                LangErrorKind::UnexpectedType {
                    expected: vec!["bool".to_string()],
                    got: self.ty_name(&condition.ty),
                },
                expr.span,
            ));
        }
        Ok(condition)
    }

    // ------------------------------------------------------------------
    // Conversion rules
    // ------------------------------------------------------------------

    /// Implements the assignment compatibility rules; wraps the value
    /// in a `Conv` node when an implicit conversion applies
    fn convert(&self, expected: &Ty, value: TExpr, span: Span) -> Result<TExpr> {
        if *expected == value.ty {
            return Ok(value);
        }
        let convertible = match (expected, &value.ty) {
            (Ty::Float, Ty::Int) | (Ty::Int, Ty::Float) => true,
            (Ty::Object(parent), Ty::Object(child)) => {
                self.an.analysis.is_ancestor_or_equal(*parent, *child)
            }
            (Ty::Object(_), Ty::NullObject) => true,
            _ => false,
        };
        if !convertible {
            return Err(err(
                LangErrorKind::IllegalAssignment {
                    expected: self.ty_name(expected),
                    got: self.ty_name(&value.ty),
                },
                span,
            ));
        }
        Ok(conv(expected.clone(), value))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn check_expr(&mut self, expr: &ast::Expression) -> Result<TExpr> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::IntLit(value) => Ok(TExpr {
                ty: Ty::Int,
                kind: TExprKind::Int(*value),
            }),
            ExprKind::BoolLit(value) => Ok(TExpr {
                ty: Ty::Bool,
                kind: TExprKind::Bool(*value),
            }),
            ExprKind::FloatLit(value) => Ok(TExpr {
                ty: Ty::Float,
                kind: TExprKind::Float(*value),
            }),
            ExprKind::StringLit(value) => Ok(TExpr {
                ty: Ty::Str,
                kind: TExprKind::Str(value.clone()),
            }),
            ExprKind::NoneLit => Ok(TExpr {
                ty: Ty::NullObject,
                kind: TExprKind::Null,
            }),
            ExprKind::Path(chain) => self.check_path(chain),
            ExprKind::Member {
                base,
                name,
                name_span,
            } => {
                let base = self.check_expr(base)?;
                self.member_access(base, name, *name_span)
            }
            ExprKind::Call { chain, args } => self.check_call(chain, args, span),
            ExprKind::MethodCall {
                base,
                name,
                name_span,
                args,
            } => {
                let base = self.check_expr(base)?;
                let Ty::Object(object) = base.ty.clone() else {
                    return Err(err(
                        LangErrorKind::UnexpectedType {
                            expected: vec!["an object".to_string()],
                            got: self.ty_name(&base.ty),
                        },
                        *name_span,
                    ));
                };
                let func = self
                    .an
                    .analysis
                    .lookup_method(object, name)
                    .ok_or_else(|| {
                        err(
                            LangErrorKind::MissingFunction { name: name.clone() },
                            *name_span,
                        )
                    })?;
                let args = self.check_args(func, args, span)?;
                Ok(TExpr {
                    ty: self.an.analysis[func].ret.clone(),
                    kind: TExprKind::MethodCall {
                        func,
                        this: Box::new(base),
                        args,
                    },
                })
            }
            ExprKind::Index { base, index } => {
                let base = self.check_expr(base)?;
                let Ty::Array(elem, _) = base.ty.clone() else {
                    return Err(err(
                        LangErrorKind::UnexpectedType {
                            expected: vec!["an array".to_string()],
                            got: self.ty_name(&base.ty),
                        },
                        span,
                    ));
                };
                let index_expr = self.check_expr(index)?;
                if index_expr.ty != Ty::Int {
                    return Err(err(
                        LangErrorKind::UnexpectedType {
                            expected: vec!["int".to_string()],
                            got: self.ty_name(&index_expr.ty),
                        },
                        index.span,
                    ));
                }
                Ok(TExpr {
                    ty: *elem,
                    kind: TExprKind::Index {
                        base: Box::new(base),
                        index: Box::new(index_expr),
                    },
                })
            }
            ExprKind::ArrayLit(elements) => {
                if elements.is_empty() {
                    return Err(err(LangErrorKind::EmptyArrayLiteral, span));
                }
                let mut checked = Vec::with_capacity(elements.len());
                let mut elem_ty: Option<Ty> = None;
                for element in elements {
                    let value = self.check_expr(element)?;
                    match &elem_ty {
                        None => elem_ty = Some(value.ty.clone()),
                        // No implicit conversions inside literals
                        Some(expected) if *expected != value.ty => {
                            return Err(err(
                                LangErrorKind::MixedArrayLiteral {
                                    expected: self.ty_name(expected),
                                    got: self.ty_name(&value.ty),
                                },
                                element.span,
                            ));
                        }
                        Some(_) => {}
                    }
                    checked.push(value);
                }
                let elem_ty = elem_ty.expect("Checked non-empty above");
                Ok(TExpr {
                    ty: Ty::Array(Box::new(elem_ty), checked.len() as u32),
                    kind: TExprKind::ArrayLit(checked),
                })
            }
            ExprKind::Create { typ, args } => {
                let object = self.an.resolve_object(self.ns, typ)?;
                let create = self
                    .an
                    .analysis
                    .effective_event(object, EventKind::Create)
                    .map(|(_, func)| func);
                let args = match create {
                    Some(func) => self.check_args(func, args, span)?,
                    None => {
                        // The synthetic root create takes no arguments
                        if !args.is_empty() {
                            return Err(err(
                                LangErrorKind::ArgumentCountMismatch {
                                    expected: 0,
                                    got: args.len(),
                                    declared: None,
                                },
                                span,
                            ));
                        }
                        Vec::new()
                    }
                };
                Ok(TExpr {
                    ty: Ty::Object(object),
                    kind: TExprKind::Create { object, args },
                })
            }
            ExprKind::Destroy { value } => {
                let value = self.check_expr(value)?;
                if !matches!(value.ty, Ty::Object(_)) {
                    return Err(err(
                        LangErrorKind::UnexpectedType {
                            expected: vec!["an object".to_string()],
                            got: self.ty_name(&value.ty),
                        },
                        span,
                    ));
                }
                Ok(TExpr {
                    ty: Ty::Void,
                    kind: TExprKind::Destroy {
                        value: Box::new(value),
                    },
                })
            }
            ExprKind::Unary { op, value } => {
                let value = self.check_expr(value)?;
                match op {
                    UnaryOp::Neg if value.ty.is_numeric() => Ok(TExpr {
                        ty: value.ty.clone(),
                        kind: TExprKind::Unary {
                            op: *op,
                            value: Box::new(value),
                        },
                    }),
                    UnaryOp::Not if value.ty == Ty::Bool => Ok(TExpr {
                        ty: Ty::Bool,
                        kind: TExprKind::Unary {
                            op: *op,
                            value: Box::new(value),
                        },
                    }),
                    _ => Err(err(
                        LangErrorKind::InvalidOperands {
                            operator: match op {
                                UnaryOp::Neg => "-".to_string(),
                                UnaryOp::Not => "!".to_string(),
                            },
                            lhs: self.ty_name(&value.ty),
                            rhs: None,
                        },
                        span,
                    )),
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.check_expr(lhs)?;
                let rhs = self.check_expr(rhs)?;
                self.check_binary(*op, lhs, rhs, span)
            }
            ExprKind::Assign { target, value } => {
                let target = self.check_place(target)?;
                let value = self.check_expr(value)?;
                let value = self.convert(&target.ty, value, span)?;
                Ok(TExpr {
                    ty: target.ty.clone(),
                    kind: TExprKind::Assign {
                        target: Box::new(target),
                        value: Box::new(value),
                    },
                })
            }
            ExprKind::CompoundAssign { op, target, value } => {
                let target = self.check_place(target)?;
                let value = self.check_expr(value)?;
                let value = match (&target.ty, &value.ty) {
                    (Ty::Int, Ty::Int) | (Ty::Float, Ty::Float) => value,
                    // Only the rhs converts; `int += float` stays illegal
                    (Ty::Float, Ty::Int) => conv(Ty::Float, value),
                    _ => {
                        return Err(err(
                            LangErrorKind::InvalidOperands {
                                operator: format!("{op}="),
                                lhs: self.ty_name(&target.ty),
                                rhs: Some(self.ty_name(&value.ty)),
                            },
                            span,
                        ))
                    }
                };
                Ok(TExpr {
                    ty: target.ty.clone(),
                    kind: TExprKind::CompoundAssign {
                        op: *op,
                        target: Box::new(target),
                        value: Box::new(value),
                    },
                })
            }
            ExprKind::Incr {
                target,
                delta,
                post,
            } => {
                let target = self.check_place(target)?;
                if !target.ty.is_numeric() {
                    return Err(err(
                        LangErrorKind::InvalidOperands {
                            operator: if *delta > 0 { "++" } else { "--" }.to_string(),
                            lhs: self.ty_name(&target.ty),
                            rhs: None,
                        },
                        span,
                    ));
                }
                Ok(TExpr {
                    ty: target.ty.clone(),
                    kind: TExprKind::Incr {
                        target: Box::new(target),
                        delta: *delta,
                        post: *post,
                    },
                })
            }
        }
    }

    fn member_access(&self, base: TExpr, name: &Ident, name_span: Span) -> Result<TExpr> {
        let Ty::Object(object) = base.ty.clone() else {
            return Err(err(
                LangErrorKind::UnexpectedType {
                    expected: vec!["an object".to_string()],
                    got: self.ty_name(&base.ty),
                },
                name_span,
            ));
        };
        let (definer, index) = self.an.analysis.lookup_member(object, name).ok_or_else(|| {
            err(
                LangErrorKind::MissingMember {
                    member: name.clone(),
                    object: self.an.analysis[object].name.clone(),
                },
                name_span,
            )
        })?;
        let ty = self.an.analysis[definer].members[index].ty.clone();
        Ok(TExpr {
            ty,
            kind: TExprKind::Member {
                base: Box::new(base),
                definer,
                index,
            },
        })
    }

    fn check_path(&mut self, chain: &ast::Chain) -> Result<TExpr> {
        if let [single] = chain.segments.as_slice() {
            let name = &single.name;

            if let Some(slot) = self.blocks.lookup(name) {
                return Ok(TExpr {
                    ty: self.local_ty(slot),
                    kind: TExprKind::Local(slot),
                });
            }
            if let Some(object) = self.object {
                if self.an.analysis.lookup_member(object, name).is_some() {
                    let this = self.this_expr();
                    return self.member_access(this, name, single.span);
                }
            }
            if let Some(global) = self.scope.values.get(name) {
                return Ok(TExpr {
                    ty: self.an.analysis[*global].ty.clone(),
                    kind: TExprKind::Global(*global),
                });
            }
            return Err(err(
                LangErrorKind::MissingIdent { name: name.clone() },
                single.span,
            ));
        }

        let (last, namespace_chain) = chain.segments.split_last().expect("Chains are never empty");
        let target = resolve(self.an.program, self.ns, namespace_chain, true)?;
        let global = self
            .an
            .global_ids
            .get(&(target, last.name.clone()))
            .copied()
            .ok_or_else(|| {
                err(
                    LangErrorKind::MissingIdent {
                        name: last.name.clone(),
                    },
                    last.span,
                )
            })?;
        Ok(TExpr {
            ty: self.an.analysis[global].ty.clone(),
            kind: TExprKind::Global(global),
        })
    }

    fn this_expr(&self) -> TExpr {
        let slot = self.this_slot.expect("Only called in object context");
        TExpr {
            ty: self.local_ty(slot),
            kind: TExprKind::Local(slot),
        }
    }

    fn check_call(
        &mut self,
        chain: &ast::Chain,
        args: &[ast::Expression],
        span: Span,
    ) -> Result<TExpr> {
        if let [single] = chain.segments.as_slice() {
            let name = &single.name;

            if *name == "super" {
                let func = self.super_event.ok_or_else(|| {
                    err(
                        LangErrorKind::MissingFunction { name: name.clone() },
                        single.span,
                    )
                })?;
                let args = self.check_args(func, args, span)?;
                return Ok(TExpr {
                    ty: self.an.analysis[func].ret.clone(),
                    kind: TExprKind::MethodCall {
                        func,
                        this: Box::new(self.this_expr()),
                        args,
                    },
                });
            }

            if let Some(object) = self.object {
                if let Some(func) = self.an.analysis.lookup_method(object, name) {
                    let args = self.check_args(func, args, span)?;
                    return Ok(TExpr {
                        ty: self.an.analysis[func].ret.clone(),
                        kind: TExprKind::MethodCall {
                            func,
                            this: Box::new(self.this_expr()),
                            args,
                        },
                    });
                }
            }

            let func = self.scope.functions.get(name).copied().ok_or_else(|| {
                err(
                    LangErrorKind::MissingFunction { name: name.clone() },
                    single.span,
                )
            })?;
            let args = self.check_args(func, args, span)?;
            return Ok(TExpr {
                ty: self.an.analysis[func].ret.clone(),
                kind: TExprKind::Call { func, args },
            });
        }

        let (last, namespace_chain) = chain.segments.split_last().expect("Chains are never empty");
        let target = resolve(self.an.program, self.ns, namespace_chain, true)?;
        let func = self
            .an
            .func_ids
            .get(&(target, last.name.clone()))
            .copied()
            .ok_or_else(|| {
                err(
                    LangErrorKind::MissingFunction {
                        name: last.name.clone(),
                    },
                    last.span,
                )
            })?;
        let args = self.check_args(func, args, span)?;
        Ok(TExpr {
            ty: self.an.analysis[func].ret.clone(),
            kind: TExprKind::Call { func, args },
        })
    }

    fn check_args(
        &mut self,
        func: FuncId,
        args: &[ast::Expression],
        span: Span,
    ) -> Result<Vec<TExpr>> {
        let expected: Vec<Ty> = self.an.analysis[func]
            .params
            .iter()
            .map(|param| param.ty.clone())
            .collect();
        if expected.len() != args.len() {
            return Err(err(
                LangErrorKind::ArgumentCountMismatch {
                    expected: expected.len(),
                    got: args.len(),
                    declared: Some(self.an.analysis[func].span),
                },
                span,
            ));
        }
        expected
            .iter()
            .zip(args)
            .map(|(ty, arg)| {
                let value = self.check_expr(arg)?;
                self.convert(ty, value, arg.span)
            })
            .collect()
    }

    /// Validates an assignment target: an identifier path, member
    /// access, or subscription of an lvalue. `this` is rejected.
    fn check_place(&mut self, expr: &ast::Expression) -> Result<TExpr> {
        let place = match &expr.kind {
            ExprKind::Path(chain) => self.check_path(chain)?,
            ExprKind::Member {
                base,
                name,
                name_span,
            } => {
                let base = self.check_expr(base)?;
                self.member_access(base, name, *name_span)?
            }
            ExprKind::Index { base, index } => {
                let base = self.check_place(base)?;
                let Ty::Array(elem, _) = base.ty.clone() else {
                    return Err(err(
                        LangErrorKind::UnexpectedType {
                            expected: vec!["an array".to_string()],
                            got: self.ty_name(&base.ty),
                        },
                        expr.span,
                    ));
                };
                let index_expr = self.check_expr(index)?;
                if index_expr.ty != Ty::Int {
                    return Err(err(
                        LangErrorKind::UnexpectedType {
                            expected: vec!["int".to_string()],
                            got: self.ty_name(&index_expr.ty),
                        },
                        index.span,
                    ));
                }
                TExpr {
                    ty: *elem,
                    kind: TExprKind::Index {
                        base: Box::new(base),
                        index: Box::new(index_expr),
                    },
                }
            }
            _ => return Err(err(LangErrorKind::ExpectedLvalue, expr.span)),
        };

        // Writing through `this` itself is forbidden
        if let TExprKind::Local(slot) = &place.kind {
            if Some(*slot) == self.this_slot {
                return Err(err(LangErrorKind::ExpectedLvalue, expr.span));
            }
        }
        Ok(place)
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    fn check_binary(&self, op: BinaryOp, lhs: TExpr, rhs: TExpr, span: Span) -> Result<TExpr> {
        let invalid = |checker: &Self, lhs: &TExpr, rhs: &TExpr| {
            err(
                LangErrorKind::InvalidOperands {
                    operator: op.symbol().to_string(),
                    lhs: checker.ty_name(&lhs.ty),
                    rhs: Some(checker.ty_name(&rhs.ty)),
                },
                span,
            )
        };

        if op.is_arithmetic() {
            let (ty, lhs, rhs) = self
                .unify_numeric(lhs, rhs)
                .map_err(|(lhs, rhs)| invalid(self, &lhs, &rhs))?;
            if op == BinaryOp::Mod && ty == Ty::Float {
                // Modulo is only emitted for ints
                return Err(err(
                    LangErrorKind::InvalidOperands {
                        operator: "%".to_string(),
                        lhs: "float".to_string(),
                        rhs: Some("float".to_string()),
                    },
                    span,
                ));
            }
            return Ok(TExpr {
                ty,
                kind: TExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            });
        }

        if matches!(op, BinaryOp::Eq | BinaryOp::Ne) && (lhs.ty.is_object() || rhs.ty.is_object())
        {
            let (lhs, rhs) = self
                .unify_objects(lhs, rhs)
                .map_err(|(lhs, rhs)| invalid(self, &lhs, &rhs))?;
            return Ok(TExpr {
                ty: Ty::Bool,
                kind: TExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            });
        }

        if op.is_comparison() {
            let (_, lhs, rhs) = self
                .unify_numeric(lhs, rhs)
                .map_err(|(lhs, rhs)| invalid(self, &lhs, &rhs))?;
            return Ok(TExpr {
                ty: Ty::Bool,
                kind: TExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            });
        }

        // && and ||
        if lhs.ty == Ty::Bool && rhs.ty == Ty::Bool {
            return Ok(TExpr {
                ty: Ty::Bool,
                kind: TExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            });
        }
        Err(invalid(self, &lhs, &rhs))
    }

    /// The mixed-conversion rule for numeric operands: the int side is
    /// wrapped when the other side is float
    fn unify_numeric(
        &self,
        lhs: TExpr,
        rhs: TExpr,
    ) -> std::result::Result<(Ty, TExpr, TExpr), (TExpr, TExpr)> {
        match (&lhs.ty, &rhs.ty) {
            (Ty::Int, Ty::Int) => Ok((Ty::Int, lhs, rhs)),
            (Ty::Float, Ty::Float) => Ok((Ty::Float, lhs, rhs)),
            (Ty::Int, Ty::Float) => Ok((Ty::Float, conv(Ty::Float, lhs), rhs)),
            (Ty::Float, Ty::Int) => Ok((Ty::Float, lhs, conv(Ty::Float, rhs))),
            _ => Err((lhs, rhs)),
        }
    }

    /// Object equality: either side widens to the common ancestor; at
    /// least one side must be the other's ancestor or `none`
    fn unify_objects(
        &self,
        lhs: TExpr,
        rhs: TExpr,
    ) -> std::result::Result<(TExpr, TExpr), (TExpr, TExpr)> {
        match (&lhs.ty, &rhs.ty) {
            (Ty::Object(left), Ty::Object(right)) => {
                if left == right {
                    Ok((lhs, rhs))
                } else if self.an.analysis.is_ancestor_or_equal(*left, *right) {
                    let target = lhs.ty.clone();
                    Ok((lhs, conv(target, rhs)))
                } else if self.an.analysis.is_ancestor_or_equal(*right, *left) {
                    let target = rhs.ty.clone();
                    Ok((conv(target, lhs), rhs))
                } else {
                    Err((lhs, rhs))
                }
            }
            (Ty::Object(_), Ty::NullObject) => {
                let target = lhs.ty.clone();
                Ok((lhs, conv(target, rhs)))
            }
            (Ty::NullObject, Ty::Object(_)) => {
                let target = rhs.ty.clone();
                Ok((conv(target, lhs), rhs))
            }
            (Ty::NullObject, Ty::NullObject) => Ok((lhs, rhs)),
            _ => Err((lhs, rhs)),
        }
    }
}

fn conv(to: Ty, value: TExpr) -> TExpr {
    let from = value.ty.clone();
    TExpr {
        ty: to,
        kind: TExprKind::Conv {
            from,
            value: Box::new(value),
        },
    }
}
