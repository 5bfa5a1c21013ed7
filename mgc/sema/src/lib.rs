//! The semantic analyzer
//!
//! Consumes the parsed [`mgc_ast::Program`] and produces an
//! [`Analysis`]: a typed tree for every function body plus flat tables
//! of all objects, functions and globals in deterministic declaration
//! order. Every implicit conversion becomes an explicit
//! [`tree::TExprKind::Conv`] node and every name is resolved to a
//! table id, so the lowerer never looks anything up again.

use std::fmt;

use mgc_ast::{EventKind, Program};
use mgc_common::{Ident, Span};
use mgc_error::Result;

mod inheritance;
mod resolver;
mod scope;
pub mod tree;
mod typecheck;

pub use resolver::resolve;

/// Runs the full analysis over a loaded program
pub fn analyze(program: &Program) -> Result<Analysis> {
    typecheck::Analyzer::new(program).run()
}

macro_rules! table_id {
    ($(#[$attr:meta])* $name:ident, $prefix:literal) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

table_id!(
    /// Identifies a resolved object type. Doubles as the structural
    /// identity used for inheritance cycle detection.
    ObjectId,
    "obj_"
);
table_id!(
    /// Identifies a function: free, extern, method or event
    FuncId,
    "fn_"
);
table_id!(GlobalId, "global_");
table_id!(
    /// A local slot inside one function: `this`, formals, then locals
    /// in declaration order
    LocalId,
    "local_"
);

/// The synthetic root object every object type inherits from
pub const ROOT_OBJECT: ObjectId = ObjectId(0);

/// A fully resolved type
#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Int,
    Bool,
    Float,
    Str,
    Void,
    Sprite,
    Sound,
    Object(ObjectId),
    /// The type of the `none` literal, assignable to any object type
    NullObject,
    Array(Box<Ty>, u32),
}

impl Ty {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Ty::Int | Ty::Float)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Ty::Object(_) | Ty::NullObject)
    }
}

/// The output of [`analyze`]
#[derive(Debug)]
pub struct Analysis {
    /// All object types; index 0 is the synthetic root
    pub objects: Vec<ObjectInfo>,
    pub functions: Vec<FunctionInfo>,
    pub globals: Vec<GlobalInfo>,
    pub main_object: ObjectId,
}

#[derive(Debug)]
pub struct ObjectInfo {
    pub name: Ident,
    /// The `.`-joined namespace path including the object name,
    /// e.g. `a.b.helper`
    pub mangled: String,
    /// `None` only for the synthetic root
    pub parent: Option<ObjectId>,
    /// Members declared by this object itself
    pub members: Vec<MemberInfo>,
    pub methods: Vec<(Ident, FuncId)>,
    pub events: EventSet,
    pub span: Span,
}

#[derive(Debug)]
pub struct MemberInfo {
    pub name: Ident,
    pub ty: Ty,
    pub span: Span,
}

/// The event handlers one object declares itself
#[derive(Debug, Default)]
pub struct EventSet {
    pub create: Option<FuncId>,
    pub step: Option<FuncId>,
    pub draw: Option<FuncId>,
    pub destroy: Option<FuncId>,
}

impl EventSet {
    pub fn get(&self, kind: EventKind) -> Option<FuncId> {
        match kind {
            EventKind::Create => self.create,
            EventKind::Step => self.step,
            EventKind::Draw => self.draw,
            EventKind::Destroy => self.destroy,
        }
    }

    pub fn set(&mut self, kind: EventKind, func: FuncId) -> Option<FuncId> {
        let slot = match kind {
            EventKind::Create => &mut self.create,
            EventKind::Step => &mut self.step,
            EventKind::Draw => &mut self.draw,
            EventKind::Destroy => &mut self.destroy,
        };
        slot.replace(func)
    }
}

#[derive(Debug)]
pub struct FunctionInfo {
    /// The emitted label. Externs keep their source name verbatim,
    /// everything else is `.`-mangled by declaration path.
    pub mangled: String,
    pub kind: FunctionKind,
    /// Declared formals; the implicit `this` of methods and events is
    /// not part of this list
    pub params: Vec<ParamInfo>,
    pub ret: Ty,
    /// `None` for externs
    pub body: Option<tree::TBlock>,
    /// The full slot table: `this` (methods/events), formals, locals
    pub locals: Vec<LocalInfo>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Free,
    Extern,
    Method { object: ObjectId },
    Event { object: ObjectId, kind: EventKind },
}

#[derive(Debug)]
pub struct ParamInfo {
    pub name: Ident,
    pub ty: Ty,
    pub span: Span,
}

#[derive(Debug)]
pub struct LocalInfo {
    pub name: Ident,
    pub ty: Ty,
}

#[derive(Debug)]
pub struct GlobalInfo {
    pub mangled: String,
    pub ty: Ty,
    pub init: TConst,
    pub span: Span,
}

/// A folded constant, the only legal global initializer
#[derive(Debug, Clone, PartialEq)]
pub enum TConst {
    Int(i32),
    Bool(bool),
    Float(f64),
    /// A zeroed pointer-like value (string, sprite, sound)
    Null,
    /// A zeroed object reference
    NullRef,
    Array(Vec<TConst>),
}

impl TConst {
    /// The default initializer of a binding with the given type
    pub fn zero_of(ty: &Ty) -> TConst {
        match ty {
            Ty::Int => TConst::Int(0),
            Ty::Bool => TConst::Bool(false),
            Ty::Float => TConst::Float(0.0),
            Ty::Str | Ty::Sprite | Ty::Sound => TConst::Null,
            Ty::Object(_) | Ty::NullObject => TConst::NullRef,
            Ty::Array(elem, len) => {
                TConst::Array(vec![TConst::zero_of(elem); *len as usize])
            }
            Ty::Void => unreachable!("void bindings are rejected"),
        }
    }
}

impl std::ops::Index<ObjectId> for Analysis {
    type Output = ObjectInfo;

    fn index(&self, id: ObjectId) -> &Self::Output {
        &self.objects[id.index()]
    }
}

impl std::ops::Index<FuncId> for Analysis {
    type Output = FunctionInfo;

    fn index(&self, id: FuncId) -> &Self::Output {
        &self.functions[id.index()]
    }
}

impl std::ops::Index<GlobalId> for Analysis {
    type Output = GlobalInfo;

    fn index(&self, id: GlobalId) -> &Self::Output {
        &self.globals[id.index()]
    }
}

impl Analysis {
    /// The inheritance chain of `id`, from the eldest ancestor (the
    /// synthetic root) down to `id` itself
    pub fn ancestry(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self[current].parent {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Whether `ancestor` is `descendant` or one of its ancestors
    pub fn is_ancestor_or_equal(&self, ancestor: ObjectId, descendant: ObjectId) -> bool {
        let mut current = descendant;
        loop {
            if current == ancestor {
                return true;
            }
            match self[current].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Resolves a member along the inheritance chain, youngest
    /// definition first
    pub fn lookup_member(&self, object: ObjectId, name: &Ident) -> Option<(ObjectId, usize)> {
        let mut current = object;
        loop {
            let info = &self[current];
            if let Some(index) = info.members.iter().position(|member| member.name == *name) {
                return Some((current, index));
            }
            current = info.parent?;
        }
    }

    /// Resolves a method along the inheritance chain; the most derived
    /// definition wins
    pub fn lookup_method(&self, object: ObjectId, name: &Ident) -> Option<FuncId> {
        let mut current = object;
        loop {
            let info = &self[current];
            if let Some((_, func)) = info.methods.iter().find(|(method, _)| *method == *name) {
                return Some(*func);
            }
            current = info.parent?;
        }
    }

    /// The nearest ancestor (or `object` itself) defining the given
    /// event, together with its handler
    pub fn effective_event(&self, object: ObjectId, kind: EventKind) -> Option<(ObjectId, FuncId)> {
        let mut current = object;
        loop {
            let info = &self[current];
            if let Some(func) = info.events.get(kind) {
                return Some((current, func));
            }
            current = info.parent?;
        }
    }

    /// The formals `create Obj(...)` is checked against: those of the
    /// nearest create event. The synthetic root create takes none.
    pub fn create_params(&self, object: ObjectId) -> &[ParamInfo] {
        match self.effective_event(object, EventKind::Create) {
            Some((_, func)) => &self[func].params,
            None => &[],
        }
    }

    /// Renders a type for diagnostics
    pub fn ty_name(&self, ty: &Ty) -> String {
        match ty {
            Ty::Int => "int".to_string(),
            Ty::Bool => "bool".to_string(),
            Ty::Float => "float".to_string(),
            Ty::Str => "string".to_string(),
            Ty::Void => "void".to_string(),
            Ty::Sprite => "sprite".to_string(),
            Ty::Sound => "sound".to_string(),
            Ty::Object(id) => self[*id].mangled.replace('.', "::"),
            Ty::NullObject => "none".to_string(),
            Ty::Array(elem, len) => format!("{}[{len}]", self.ty_name(elem)),
        }
    }
}
