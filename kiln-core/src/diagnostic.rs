//! Diagnostics reported to the user.

use std::fmt;

use crate::span::{SourceMap, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// A message with an optional location and error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
    pub code: Option<&'static str>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            span: Some(span),
            code: None,
        }
    }

    pub fn warning(message: impl Into<String>, span: Option<Span>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            span,
            code: None,
        }
    }

    /// Error without a source location (I/O, configuration).
    pub fn global(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            span: None,
            code: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    /// `file:line:col: error[E0001]: message`
    pub fn render(&self, sources: &SourceMap) -> String {
        let mut out = String::new();
        if let Some(span) = self.span {
            out.push_str(&sources.location(span));
            out.push_str(": ");
        }
        out.push_str(&self.severity.to_string());
        if let Some(code) = self.code {
            out.push('[');
            out.push_str(code);
            out.push(']');
        }
        out.push_str(": ");
        out.push_str(&self.message);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_location_and_code() {
        let mut sources = SourceMap::new();
        let file = sources.add("x.kn", "int a = @");
        let diag = Diagnostic::error("unexpected character", Span::new(file, 8, 9)).with_code("E0001");
        assert_eq!(
            diag.render(&sources),
            "x.kn:1:9: error[E0001]: unexpected character"
        );
    }

    #[test]
    fn renders_without_location() {
        let sources = SourceMap::new();
        let diag = Diagnostic::warning("skipped macro", None);
        assert_eq!(diag.render(&sources), "warning: skipped macro");
    }
}
