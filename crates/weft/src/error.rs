use std::{io, ops::Range};

use compact_str::CompactString;
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::value::FilterError;

/// Anything that can go wrong turning template text into a [`Template`](crate::Template).
#[derive(Debug, Diagnostic, Error)]
pub enum CompileError {
    /// The template is malformed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),

    /// The compiler produced code it could not assemble.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Internal(#[from] InternalError),
}

impl CompileError {
    pub fn as_syntax(&self) -> Option<&SyntaxError> {
        match self {
            Self::Syntax(err) => Some(err),
            Self::Internal(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display, strum_macros::EnumIter)]
#[non_exhaustive]
pub enum SyntaxErrorKind {
    #[strum(to_string = "empty tag")]
    EmptyTag,
    #[strum(to_string = "empty expression")]
    EmptyExpression,
    #[strum(to_string = "don't understand if")]
    BadIf,
    #[strum(to_string = "don't understand for")]
    BadFor,
    #[strum(to_string = "don't understand end")]
    BadEnd,
    #[strum(to_string = "too many ends")]
    TooManyEnds,
    #[strum(to_string = "mismatched end tag")]
    MismatchedEnd,
    #[strum(to_string = "don't understand tag")]
    UnknownTag,
    #[strum(to_string = "unmatched action tag")]
    Unclosed,
    #[strum(to_string = "not a valid name")]
    InvalidName,
    #[strum(to_string = "blocks nested too deeply")]
    TooDeep,
}

/// A malformed template, reported during compilation.
#[derive(Clone, Debug, Diagnostic, Error)]
#[error("{kind}: {token:?}")]
#[diagnostic(code(weft::syntax))]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,

    /// The offending part of the template.
    pub token: String,

    #[source_code]
    pub(crate) src: String,

    #[label("{kind}")]
    pub(crate) span: SourceSpan,
}

impl SyntaxError {
    pub(crate) fn new(kind: SyntaxErrorKind, src: &str, span: Range<usize>) -> Self {
        Self {
            kind,
            token: src[span.clone()].to_owned(),
            src: src.to_owned(),
            span: span.into(),
        }
    }

    /// Byte range of the offending token in the template source.
    pub fn span(&self) -> Range<usize> {
        self.span.offset()..self.span.offset() + self.span.len()
    }
}

/// A render call failed. The template itself stays usable.
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum RenderError {
    #[error("missing variable `{0}`")]
    #[diagnostic(code(weft::render::missing_variable))]
    MissingVariable(CompactString),

    #[error("cannot resolve `{segment}` in `{path}`")]
    #[diagnostic(code(weft::render::unresolved))]
    Unresolved {
        path: CompactString,
        segment: CompactString,
    },

    #[error("`{0}` is not a filter")]
    #[diagnostic(code(weft::render::not_callable))]
    NotCallable(CompactString),

    #[error("filter `{name}` failed")]
    #[diagnostic(code(weft::render::filter))]
    Filter {
        name: CompactString,
        #[source]
        source: FilterError,
    },

    #[error("cannot iterate over `{expr}` ({kind})")]
    #[diagnostic(code(weft::render::not_iterable))]
    NotIterable {
        expr: CompactString,
        kind: &'static str,
    },

    #[error(transparent)]
    #[diagnostic(code(weft::render::io))]
    Io(#[from] io::Error),
}

/// The compiler emitted code that doesn't assemble into a renderer.
///
/// This is never caused by template text and always indicates a bug.
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum InternalError {
    #[error("unbalanced indentation: expected {expected}, found {found}")]
    #[diagnostic(
        code(weft::internal::indent),
        help("this is a bug in weft, please report it with the template")
    )]
    UnbalancedIndent { expected: usize, found: usize },

    #[error("dedent without a matching indent")]
    #[diagnostic(
        code(weft::internal::indent),
        help("this is a bug in weft, please report it with the template")
    )]
    ExtraDedent,

    #[error("no section reserved at chunk {index}")]
    #[diagnostic(
        code(weft::internal::section),
        help("this is a bug in weft, please report it with the template")
    )]
    MissingSection { index: usize },

    #[error("generated code does not start with the render entry point")]
    #[diagnostic(
        code(weft::internal::entry),
        help("this is a bug in weft, please report it with the template")
    )]
    MissingEntry,

    #[error("unexpected indentation on generated line {line}")]
    #[diagnostic(
        code(weft::internal::indent),
        help("this is a bug in weft, please report it with the template")
    )]
    UnexpectedIndent { line: usize },

    #[error("generated code does not end with a return")]
    #[diagnostic(
        code(weft::internal::missing_return),
        help("this is a bug in weft, please report it with the template")
    )]
    MissingReturn,

    #[error("generated code continues after the return on line {line}")]
    #[diagnostic(
        code(weft::internal::trailing),
        help("this is a bug in weft, please report it with the template")
    )]
    TrailingCode { line: usize },
}

#[cfg(test)]
mod test {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn every_kind_has_a_message() {
        let messages: Vec<_> = SyntaxErrorKind::iter().map(|kind| kind.to_string()).collect();
        assert_eq!(messages.len(), 11);
        for (i, message) in messages.iter().enumerate() {
            assert!(!message.is_empty());
            assert!(!messages[..i].contains(message), "{message}");
        }
    }

    #[test]
    fn syntax_error_points_at_token() {
        let src = "a {% endif %} b";
        let err = SyntaxError::new(SyntaxErrorKind::TooManyEnds, src, 2..13);
        assert_eq!(err.token, "{% endif %}");
        assert_eq!(err.span(), 2..13);
        assert_eq!(err.to_string(), r#"too many ends: "{% endif %}""#);
    }
}
