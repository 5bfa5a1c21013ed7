use std::borrow::Cow;
use std::fmt;

use annotate_snippets::snippet::AnnotationType;
use mgc_common::{CompileContext, Ident, Span};

use super::{
    snippet::{AnnotationOwned, SliceOwned, SnippetOwned, SourceAnnotationOwned},
    utils::display_expected_of_any,
    AsAnnotationSnippet,
};

/// A generic error which gets thrown while analyzing or lowering a
/// program
///
/// Contains a more specific [`LangErrorKind`]
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct LangError {
    /// The specific error
    pub kind: LangErrorKind,
    pub span: Span,
}

impl LangError {
    pub fn new(kind: LangErrorKind, span: Span) -> Self {
        LangError { kind, span }
    }
}

/// What kind of declaration a duplicate-definition error talks about
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum DefinitionKind {
    Global,
    Function,
    Object,
    Namespace,
    Member,
    Method,
    Event,
    Formal,
    Local,
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DefinitionKind::Global => "global",
            DefinitionKind::Function => "function",
            DefinitionKind::Object => "object",
            DefinitionKind::Namespace => "namespace",
            DefinitionKind::Member => "member",
            DefinitionKind::Method => "method",
            DefinitionKind::Event => "event",
            DefinitionKind::Formal => "formal",
            DefinitionKind::Local => "variable",
        };
        f.write_str(text)
    }
}

/// Specifies a specific error reason
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum LangErrorKind {
    UnknownNamespace {
        name: Ident,
    },
    PrivateNamespace {
        name: Ident,
    },
    /// An alias chain that can be expanded forever
    UnresolvedNamespace {
        chain: String,
    },
    CircularFileDependency {
        path: String,
    },
    MissingFile {
        path: String,
    },
    DuplicateDefinition {
        kind: DefinitionKind,
        name: Ident,
        previous: Span,
    },
    VoidBinding {
        name: Ident,
    },
    ReservedIdent {
        name: Ident,
    },
    ExternMethod {
        name: Ident,
    },
    BreakOutsideLoop,
    IllegalAssignment {
        expected: String,
        got: String,
    },
    UnexpectedType {
        expected: Vec<String>,
        got: String,
    },
    InvalidOperands {
        operator: String,
        lhs: String,
        rhs: Option<String>,
    },
    ArgumentCountMismatch {
        expected: usize,
        got: usize,
        declared: Option<Span>,
    },
    ExpectedLvalue,
    IllegalGlobalInitializer,
    EmptyArrayLiteral,
    MixedArrayLiteral {
        expected: String,
        got: String,
    },
    InheritanceCycle {
        name: Ident,
    },
    UnknownParent {
        name: Ident,
    },
    IllegalEventSignature {
        event: Ident,
    },
    MissingMain,
    MissingIdent {
        name: Ident,
    },
    MissingFunction {
        name: Ident,
    },
    MissingObject {
        name: Ident,
    },
    MissingMember {
        member: Ident,
        object: Ident,
    },
}

impl std::error::Error for LangErrorKind {}

impl fmt::Display for LangErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LangErrorKind::UnknownNamespace { name } => {
                write!(f, "unrecognized namespace {name}")
            }
            LangErrorKind::PrivateNamespace { name } => {
                write!(f, "attempted access to private namespace {name}")
            }
            LangErrorKind::UnresolvedNamespace { chain } => {
                write!(f, "namespace {chain} never resolves")
            }
            LangErrorKind::CircularFileDependency { path } => {
                write!(f, "circular file dependency on '{path}'")
            }
            LangErrorKind::MissingFile { path } => {
                write!(f, "cannot open file '{path}'")
            }
            LangErrorKind::DuplicateDefinition { kind, name, .. } => {
                write!(f, "duplicate {kind} {name}")
            }
            LangErrorKind::VoidBinding { name } => {
                write!(f, "{name} may not be declared with type void")
            }
            LangErrorKind::ReservedIdent { name } => {
                write!(f, "{name} is reserved and cannot be declared")
            }
            LangErrorKind::ExternMethod { name } => {
                write!(f, "object function {name} cannot be extern")
            }
            LangErrorKind::BreakOutsideLoop => {
                write!(f, "break is only legal inside a loop")
            }
            LangErrorKind::IllegalAssignment { expected, got } => {
                write!(f, "illegal assignment {expected} = {got}")
            }
            LangErrorKind::UnexpectedType { got, .. } => {
                write!(f, "received unexpected type {got}")
            }
            LangErrorKind::InvalidOperands {
                operator,
                lhs,
                rhs: Some(rhs),
            } => {
                write!(f, "operator {operator} is not defined between {lhs} and {rhs}")
            }
            LangErrorKind::InvalidOperands {
                operator,
                lhs,
                rhs: None,
            } => {
                write!(f, "operator {operator} is not defined on {lhs}")
            }
            LangErrorKind::ArgumentCountMismatch { expected, got, .. } => {
                write!(f, "expected {expected} argument(s) but got {got}")
            }
            LangErrorKind::ExpectedLvalue => {
                write!(f, "this expression is not assignable")
            }
            LangErrorKind::IllegalGlobalInitializer => {
                write!(f, "globals may only be initialized by a constant expression")
            }
            LangErrorKind::EmptyArrayLiteral => {
                write!(f, "array literals must not be empty")
            }
            LangErrorKind::MixedArrayLiteral { expected, got } => {
                write!(
                    f,
                    "array literal elements must share one type, found {expected} and {got}"
                )
            }
            LangErrorKind::InheritanceCycle { name } => {
                write!(f, "object {name} inherits from itself")
            }
            LangErrorKind::UnknownParent { name } => {
                write!(f, "unknown parent object {name}")
            }
            LangErrorKind::IllegalEventSignature { event } => {
                write!(f, "event {event} does not take formals")
            }
            LangErrorKind::MissingMain => {
                write!(f, "no object main in the root namespace")
            }
            LangErrorKind::MissingIdent { name } => {
                write!(f, "identifier {name} does not exist in this scope")
            }
            LangErrorKind::MissingFunction { name } => {
                write!(f, "function {name} does not exist in this scope")
            }
            LangErrorKind::MissingObject { name } => {
                write!(f, "object {name} does not exist")
            }
            LangErrorKind::MissingMember { member, object } => {
                write!(f, "object {object} has no member {member}")
            }
        }
    }
}

impl<'a> AsAnnotationSnippet<'a> for LangError {
    fn as_annotation_snippet(&self, ctx: &'a CompileContext) -> SnippetOwned<'a> {
        let code = ctx.input_files.get_span_code(self.span);
        let origin = code.path.as_deref();
        let source = &code.source;

        let mut annotations = vec![SourceAnnotationOwned {
            annotation_type: AnnotationType::Error,
            label: self.kind.annotation_label(),
            range: self.span,
        }];
        let mut footer = Vec::new();

        match &self.kind {
            LangErrorKind::DuplicateDefinition { previous, .. } => {
                // Only attach the note if both spans live in the same file
                if ctx.input_files.get_code_id(*previous) == ctx.input_files.get_code_id(self.span)
                {
                    annotations.push(SourceAnnotationOwned {
                        annotation_type: AnnotationType::Info,
                        label: "first defined here".to_string(),
                        range: *previous,
                    });
                }
            }
            LangErrorKind::ArgumentCountMismatch {
                declared: Some(declared),
                ..
            } => {
                if ctx.input_files.get_code_id(*declared) == ctx.input_files.get_code_id(self.span)
                {
                    annotations.push(SourceAnnotationOwned {
                        annotation_type: AnnotationType::Info,
                        label: "declared here".to_string(),
                        range: *declared,
                    });
                }
            }
            LangErrorKind::UnexpectedType { expected, .. } => {
                footer.push(AnnotationOwned {
                    annotation_type: AnnotationType::Help,
                    id: None,
                    label: Some(Cow::Owned(display_expected_of_any(expected))),
                });
            }
            _ => {}
        }

        SnippetOwned {
            title: self.kind.to_string().into(),
            id: Some("Lang".into()),
            annotation_type: AnnotationType::Error,
            slices: vec![SliceOwned {
                source,
                origin,
                annotations,
            }],
            footer,
        }
    }
}

impl LangErrorKind {
    /// The short label attached directly to the offending span
    fn annotation_label(&self) -> String {
        match self {
            LangErrorKind::UnknownNamespace { .. } => "no such namespace".to_string(),
            LangErrorKind::PrivateNamespace { .. } => "this namespace is private".to_string(),
            LangErrorKind::UnresolvedNamespace { .. } => "resolution loops here".to_string(),
            LangErrorKind::CircularFileDependency { .. } => {
                "this file is already being compiled".to_string()
            }
            LangErrorKind::MissingFile { .. } => "not found".to_string(),
            LangErrorKind::DuplicateDefinition { name, .. } => {
                format!("{name} is already defined")
            }
            LangErrorKind::VoidBinding { .. } => "void binding".to_string(),
            LangErrorKind::ReservedIdent { name } => format!("cannot shadow {name}"),
            LangErrorKind::ExternMethod { .. } => "extern is not allowed here".to_string(),
            LangErrorKind::BreakOutsideLoop => "no enclosing loop".to_string(),
            LangErrorKind::IllegalAssignment { expected, got } => {
                format!("cannot assign {got} to {expected}")
            }
            LangErrorKind::UnexpectedType { got, .. } => format!("this has type {got}"),
            LangErrorKind::InvalidOperands { operator, .. } => {
                format!("invalid operands for {operator}")
            }
            LangErrorKind::ArgumentCountMismatch { expected, got, .. } => {
                format!("expected {expected} argument(s), got {got}")
            }
            LangErrorKind::ExpectedLvalue => "not an lvalue".to_string(),
            LangErrorKind::IllegalGlobalInitializer => "not a constant expression".to_string(),
            LangErrorKind::EmptyArrayLiteral => "empty array literal".to_string(),
            LangErrorKind::MixedArrayLiteral { got, .. } => {
                format!("this element has type {got}")
            }
            LangErrorKind::InheritanceCycle { .. } => "inheritance cycle".to_string(),
            LangErrorKind::UnknownParent { name } => format!("{name} is not an object"),
            LangErrorKind::IllegalEventSignature { .. } => "unexpected formals".to_string(),
            LangErrorKind::MissingMain => "expected an object main".to_string(),
            LangErrorKind::MissingIdent { .. }
            | LangErrorKind::MissingFunction { .. }
            | LangErrorKind::MissingObject { .. } => "not found in this scope".to_string(),
            LangErrorKind::MissingMember { member, .. } => format!("no member {member}"),
        }
    }
}
