//! Compilation error handling
//!
//! Exports the default [`Result`] type used by every fallible stage of
//! the compiler, along with the rendering machinery which turns errors
//! into rustc-style annotated snippets.

use std::fmt;
use std::fmt::{Display, Formatter};

use annotate_snippets::display_list::DisplayList;
use mgc_common::CompileContext;

pub use lang_error::{DefinitionKind, LangError, LangErrorKind};
pub use parse_error::ParseError;
pub use snippet::{AnnotationOwned, SliceOwned, SnippetOwned, SourceAnnotationOwned};

mod lang_error;
mod parse_error;
mod snippet;
mod utils;

/// The result type used by most compiler functions
pub type Result<T> = std::result::Result<T, CompileError>;

/// A result type for throwing a [`LangErrorKind`] without a span.
/// The caller attaches the span when it surfaces the error.
pub type LangResult<T> = std::result::Result<T, LangErrorKind>;

pub trait AsAnnotationSnippet<'a> {
    fn as_annotation_snippet(&self, ctx: &'a CompileContext) -> SnippetOwned<'a>;

    fn to_string(&self, ctx: &'a CompileContext) -> String {
        let snippet = self.as_annotation_snippet(ctx);
        let display_list = DisplayList::from(snippet.as_snippet(&ctx.input_files));
        display_list.to_string()
    }
}

/// The error value of [`Result`].
///
/// Compatible with the `annotate_snippets` library, so nice rust-style
/// error messages can be printed.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum CompileError {
    /// An error which happens when parsing the input
    ParseError(ParseError),
    /// An error which happens when analyzing or lowering the input
    LangError(LangError),
}

impl CompileError {
    pub fn format(&self, ctx: &CompileContext) -> String {
        <Self as AsAnnotationSnippet>::to_string(self, ctx)
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::ParseError(parse_error) => {
                write!(f, "Could not parse the input: {parse_error:?}")
            }
            CompileError::LangError(lang_error) => {
                write!(f, "Could not compile the input: {}", lang_error.kind)
            }
        }
    }
}

impl From<ParseError> for CompileError {
    fn from(parse_error: ParseError) -> Self {
        CompileError::ParseError(parse_error)
    }
}

impl From<LangError> for CompileError {
    fn from(lang_error: LangError) -> Self {
        CompileError::LangError(lang_error)
    }
}

impl<'a> AsAnnotationSnippet<'a> for CompileError {
    fn as_annotation_snippet(&self, ctx: &'a CompileContext) -> SnippetOwned<'a> {
        match self {
            CompileError::ParseError(parse_error) => parse_error.as_annotation_snippet(ctx),
            CompileError::LangError(lang_error) => lang_error.as_annotation_snippet(ctx),
        }
    }
}
