//! The crate-wide error type.
//!
//! Every variant that can be traced back to a source location carries a
//! [`Span`], so the CLI can render a `line:start:end`-prefixed diagnostic
//! (see [`crate::diagnostic`]), matching the original interpreter's
//! `DebugToken` location prefix.

use thiserror::Error;

use crate::token::Span;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("{span} lex error: unexpected character '{ch}'")]
    Lex { span: Span, ch: char },

    #[error("{span} parse error: {message}")]
    Parse { span: Span, message: String, fatal: bool },

    #[error("compile error: {0}")]
    Compile(String),

    #[error("{span} type mismatch: expected {expected}, got {got}")]
    TypeMismatch { span: Span, expected: String, got: String },

    #[error("{span} name error: {message}")]
    Name { span: Span, message: String },

    #[error("{span} arity error: {message}")]
    Arity { span: Span, message: String },

    #[error("resource error: {0}")]
    Resource(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn lex(span: Span, ch: char) -> Self {
        Error::Lex { span, ch }
    }

    pub fn parse(span: Span, message: impl Into<String>, fatal: bool) -> Self {
        Error::Parse { span, message: message.into(), fatal }
    }

    pub fn name(span: Span, message: impl Into<String>) -> Self {
        Error::Name { span, message: message.into() }
    }

    pub fn arity(span: Span, message: impl Into<String>) -> Self {
        Error::Arity { span, message: message.into() }
    }

    pub fn type_mismatch(span: Span, expected: impl Into<String>, got: impl Into<String>) -> Self {
        Error::TypeMismatch { span, expected: expected.into(), got: got.into() }
    }

    /// Non-fatal parse errors may be retried by the parser after rollback;
    /// every other variant aborts its component outright.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Parse { fatal: false, .. })
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Lex { span, .. }
            | Error::Parse { span, .. }
            | Error::TypeMismatch { span, .. }
            | Error::Name { span, .. }
            | Error::Arity { span, .. } => Some(*span),
            Error::Compile(_) | Error::Resource(_) => None,
        }
    }
}
