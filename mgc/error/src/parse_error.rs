use std::borrow::Cow;

use annotate_snippets::snippet::AnnotationType;
use mgc_common::{CompileContext, Span};

use super::{
    snippet::{AnnotationOwned, SliceOwned, SnippetOwned, SourceAnnotationOwned},
    AsAnnotationSnippet,
};

/// Thrown when scanning or parsing bad input
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum ParseError {
    InvalidIntLiteral {
        span: Span,
    },
    InvalidFloatLiteral {
        span: Span,
    },
    /// A character sequence no token matches
    UnexpectedCharacter {
        span: Span,
    },
    UnexpectedToken {
        /// The span where this error occurred
        span: Span,
        /// Symbols which were expected instead
        expected: Vec<String>,
    },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::InvalidIntLiteral { span }
            | ParseError::InvalidFloatLiteral { span }
            | ParseError::UnexpectedCharacter { span }
            | ParseError::UnexpectedToken { span, .. } => *span,
        }
    }
}

impl<'a> AsAnnotationSnippet<'a> for ParseError {
    fn as_annotation_snippet(&self, ctx: &'a CompileContext) -> SnippetOwned<'a> {
        let code = ctx.input_files.get_span_code(self.span());
        let origin = code.path.as_deref();

        let label = match self {
            ParseError::InvalidIntLiteral { .. } => Cow::Borrowed("Invalid int literal"),
            ParseError::InvalidFloatLiteral { .. } => Cow::Borrowed("Invalid float literal"),
            ParseError::UnexpectedCharacter { .. } => Cow::Borrowed("Unexpected character"),
            ParseError::UnexpectedToken { expected, .. } => match expected.as_slice() {
                [] => Cow::Borrowed("Expected nothing"),
                [one] => Cow::Owned(format!("Expected {one}")),
                multiple => Cow::Owned(format!("Expected one of: {}", multiple.join(", "))),
            },
        };

        SnippetOwned {
            title: "Parse error".into(),
            id: Some("Parse".into()),
            annotation_type: AnnotationType::Error,
            slices: vec![SliceOwned {
                source: &code.source,
                origin,
                annotations: vec![SourceAnnotationOwned {
                    annotation_type: AnnotationType::Error,
                    label: label.into_owned(),
                    range: self.span(),
                }],
            }],
            footer: Vec::<AnnotationOwned>::new(),
        }
    }
}
