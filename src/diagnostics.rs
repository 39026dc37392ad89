use std::fmt;

use thiserror::Error;

use crate::exception::Exception;

/// A position within a source file. All fields are zero-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl SourceLocation {
    pub const fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// Represents a run of source text starting at `start`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: SourceLocation,
    pub length: usize,
}

impl SourceSpan {
    pub const fn new(start: SourceLocation, length: usize) -> Self {
        Self { start, length }
    }

    /// Absolute offset one past the last covered byte.
    pub fn end_offset(&self) -> usize {
        self.start.offset + self.length
    }

    /// Smallest span covering both `self` and `other`, assuming `other` does not start
    /// before `self`.
    pub fn to(&self, other: SourceSpan) -> SourceSpan {
        let end = other.end_offset().max(self.end_offset());
        SourceSpan::new(self.start, end - self.start.offset)
    }
}

/// Classification of a diagnostic event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexer,
    Parser,
    Runtime,
}

/// Rich diagnostic information surfaced to end users.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    /// Renders the message followed by the offending source line with the span underlined.
    pub fn render(&self, source: &str) -> String {
        let mut out = match self.span {
            Some(span) => format!("{}: {}\n", span.start, self.message),
            None => format!("{}\n", self.message),
        };
        if let Some(span) = self.span {
            out.push_str(&render_span(source, span));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(span) = self.span {
            write!(f, " ({})", span.start)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Seeks back to the start of the line containing `span.start` and prints that line
/// with a caret underline below the spanned columns.
pub fn render_span(source: &str, span: SourceSpan) -> String {
    let offset = span.start.offset.min(source.len());
    let line_start = source[..offset].rfind('\n').map_or(0, |idx| idx + 1);
    let line_end = source[offset..]
        .find('\n')
        .map_or(source.len(), |idx| offset + idx);
    let line = &source[line_start..line_end];

    let padding = source[line_start..offset].chars().count();
    let available = line.chars().count().saturating_sub(padding);
    let carets = span.length.clamp(1, available.max(1));

    format!(
        " | {line}\n | {}{}\n",
        " ".repeat(padding),
        "^".repeat(carets)
    )
}

/// Renders a group of diagnostics the way the command-line front end prints them.
pub fn render_all(source: &str, diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|diagnostic| diagnostic.render(source))
        .collect()
}

/// Unified host-level error type for the evoscript toolchain.
#[derive(Debug, Error)]
pub enum EvoError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("syntax errors detected ({} total)", .0.len())]
    Syntax(Vec<Diagnostic>),
    #[error("uncaught exception: {0}")]
    Exception(#[from] Exception),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EvoError>;
