//! Rich diagnostic error messages inspired by Rust's compiler.
//!
//! Renders a [`crate::error::Error`] with a source line excerpt and a
//! caret underline, built from the `{line, start, end}` column span every
//! error carries rather than a byte offset, since that's what the
//! tokenizer hands down to every stage.

use std::fmt;

use crate::error::Error;
use crate::token::Span;

/// A label attached to a span with a message.
#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
    pub is_primary: bool,
}

impl Label {
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self { span, message: message.into(), is_primary: true }
    }

    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Self { span, message: message.into(), is_primary: false }
    }
}

/// A rich diagnostic error with source context.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub source: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), source: String::new(), labels: Vec::new(), notes: Vec::new() }
    }

    pub fn from_error(err: &Error, source: impl Into<String>) -> Self {
        let mut diag = Diagnostic::new(err.to_string()).with_source(source);
        if let Some(span) = err.span() {
            diag = diag.with_label(span, "here");
        }
        diag
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::primary(span, message));
        self
    }

    pub fn with_secondary_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::secondary(span, message));
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    fn get_line(&self, line_num: usize) -> &str {
        self.source.lines().nth(line_num.saturating_sub(1)).unwrap_or("")
    }

    fn line_number_width(&self) -> usize {
        self.source.lines().count().to_string().len().max(1)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if self.source.is_empty() || self.labels.is_empty() {
            for note in &self.notes {
                writeln!(f, "  = note: {note}")?;
            }
            return Ok(());
        }

        let width = self.line_number_width();
        let mut by_line: std::collections::BTreeMap<usize, Vec<&Label>> = std::collections::BTreeMap::new();
        for label in &self.labels {
            by_line.entry(label.span.line).or_default().push(label);
        }

        writeln!(f, "{:width$} |", "", width = width)?;
        for (&line_num, labels) in &by_line {
            writeln!(f, "{:width$} | {}", line_num, self.get_line(line_num), width = width)?;
            for label in labels {
                let underline_len = label.span.end.saturating_sub(label.span.start).max(1);
                writeln!(
                    f,
                    "{:width$} | {}{} {}",
                    "",
                    " ".repeat(label.span.start),
                    "^".repeat(underline_len),
                    label.message,
                    width = width
                )?;
            }
        }
        for note in &self.notes {
            writeln!(f, "  = note: {note}")?;
        }
        Ok(())
    }
}
