use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostic::Diagnostic;
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated character literal")]
    UnterminatedCharacter,
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("invalid escape sequence")]
    InvalidEscape,
    #[error("unexpected character")]
    UnexpectedCharacter,
    #[error("malformed number literal")]
    InvalidNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unexpected `{found}`")]
    UnexpectedToken { found: String },
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("parameter `{parameter}` without a default follows a defaulted parameter")]
    DefaultParameterOrder { parameter: String },
    #[error("variadic parameter must be the last parameter")]
    VariadicNotLast,
    #[error("array length `{text}` is not a valid size")]
    InvalidArrayLength { text: String },
    #[error("only identifiers can be called")]
    InvalidCallee,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}{}", expected_suffix(.expected))]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
    pub expected: Vec<String>,
}

fn expected_suffix(expected: &[String]) -> String {
    match expected {
        [] => String::new(),
        [only] => format!(", expected {only}"),
        [init @ .., last] => format!(", expected {} or {last}", init.join(", ")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("header `{header}` not found")]
    HeaderNotFound { header: String, span: Span },
}

impl BridgeError {
    pub fn span(&self) -> Span {
        match self {
            BridgeError::HeaderNotFound { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AliasError {
    #[error("alias cycle: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String>, span: Span },
    #[error("unknown type `{name}`")]
    Unknown { name: String, span: Span },
    #[error("`{name}` is already defined as a type")]
    Duplicate { name: String, span: Span },
    #[error("`{name}` is a value, not a type")]
    NotAType { name: String, span: Span },
}

impl AliasError {
    pub fn span(&self) -> Span {
        match self {
            AliasError::Cycle { span, .. }
            | AliasError::Unknown { span, .. }
            | AliasError::Duplicate { span, .. }
            | AliasError::NotAType { span, .. } => *span,
        }
    }
}

/// Position of the first difference between two function signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePosition {
    /// Zero-based parameter index.
    Parameter(usize),
    Variadic,
    Return,
    Arity { expected: usize, found: usize },
}

impl fmt::Display for SignaturePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignaturePosition::Parameter(index) => write!(f, "parameter {}", index + 1),
            SignaturePosition::Variadic => f.write_str("variadic parameter"),
            SignaturePosition::Return => f.write_str("return type"),
            SignaturePosition::Arity { expected, found } => {
                write!(f, "parameter count ({expected} expected, {found} found)")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    #[error("unresolved identifier `{name}`")]
    UnresolvedIdentifier { name: String, span: Span },
    #[error("macro `{name}` takes {expected} argument{}, {found} given", plural(.expected))]
    MacroArityMismatch {
        name: String,
        expected: String,
        found: usize,
        span: Span,
    },
    #[error("function type mismatch at {position}: expected `{expected}`, found `{found}`")]
    FunctionTypeMismatch {
        position: SignaturePosition,
        expected: String,
        found: String,
        span: Span,
    },
    #[error("cannot pass {what} by reference")]
    InvalidReferenceArgument { what: String, span: Span },
    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    TypeMismatch {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("`{name}` takes {expected} argument{}, {found} given", plural(.expected))]
    ArgumentCount {
        name: String,
        expected: String,
        found: usize,
        span: Span,
    },
    #[error("`{name}` is not callable")]
    NotCallable { name: String, span: Span },
    #[error("`{name}` is already defined in this scope")]
    Redefinition { name: String, span: Span },
    #[error("`{name}` is a {what}, not a value")]
    NotAValue {
        name: String,
        what: &'static str,
        span: Span,
    },
    #[error(transparent)]
    Alias(#[from] AliasError),
}

fn plural(expected: &str) -> &'static str {
    if expected == "1" || expected.ends_with(" 1") { "" } else { "s" }
}

impl SemanticError {
    pub fn span(&self) -> Span {
        match self {
            SemanticError::UnresolvedIdentifier { span, .. }
            | SemanticError::MacroArityMismatch { span, .. }
            | SemanticError::FunctionTypeMismatch { span, .. }
            | SemanticError::InvalidReferenceArgument { span, .. }
            | SemanticError::TypeMismatch { span, .. }
            | SemanticError::ArgumentCount { span, .. }
            | SemanticError::NotCallable { span, .. }
            | SemanticError::Redefinition { span, .. }
            | SemanticError::NotAValue { span, .. } => *span,
            SemanticError::Alias(err) => err.span(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SemanticError::UnresolvedIdentifier { .. } => "E0301",
            SemanticError::MacroArityMismatch { .. } => "E0302",
            SemanticError::FunctionTypeMismatch { .. } => "E0303",
            SemanticError::InvalidReferenceArgument { .. } => "E0304",
            SemanticError::TypeMismatch { .. } => "E0305",
            SemanticError::ArgumentCount { .. } => "E0306",
            SemanticError::NotCallable { .. } => "E0307",
            SemanticError::Redefinition { .. } => "E0308",
            SemanticError::NotAValue { .. } => "E0309",
            SemanticError::Alias(AliasError::Cycle { .. }) => "E0401",
            SemanticError::Alias(AliasError::Unknown { .. }) => "E0402",
            SemanticError::Alias(AliasError::Duplicate { .. }) => "E0403",
            SemanticError::Alias(AliasError::NotAType { .. }) => "E0404",
        }
    }
}

/// Every semantic error found in one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticErrors(pub Vec<SemanticError>);

impl fmt::Display for SemanticErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, err) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read {}: {source}", .path.display())]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported emit format: {0}")]
    UnsupportedFormat(String),
    #[error("unknown data model: {0}")]
    UnknownDataModel(String),
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("{0}")]
    Semantic(SemanticErrors),
}

impl From<Vec<SemanticError>> for CoreError {
    fn from(errors: Vec<SemanticError>) -> Self {
        CoreError::Semantic(SemanticErrors(errors))
    }
}

impl CoreError {
    /// One diagnostic per underlying error.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            CoreError::SourceIo { .. }
            | CoreError::UnsupportedFormat(_)
            | CoreError::UnknownDataModel(_) => vec![Diagnostic::global(self.to_string())],
            CoreError::Lex(err) => vec![Diagnostic::error(err.to_string(), err.span).with_code("E0001")],
            CoreError::Parse(err) => {
                let code = match err.kind {
                    ParseErrorKind::DefaultParameterOrder { .. } => "E0102",
                    _ => "E0101",
                };
                vec![Diagnostic::error(err.to_string(), err.span).with_code(code)]
            }
            CoreError::Bridge(err) => {
                vec![Diagnostic::error(err.to_string(), err.span()).with_code("E0201")]
            }
            CoreError::Semantic(errors) => errors
                .0
                .iter()
                .map(|err| Diagnostic::error(err.to_string(), err.span()).with_code(err.code()))
                .collect(),
        }
    }

    /// Semantic errors, empty for every other kind.
    pub fn semantic(&self) -> &[SemanticError] {
        match self {
            CoreError::Semantic(errors) => &errors.0,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FileId;

    #[test]
    fn parse_error_lists_expected_tokens() {
        let err = ParseError {
            kind: ParseErrorKind::UnexpectedToken { found: "}".into() },
            span: Span::new(FileId(0), 0, 1),
            expected: vec!["`)`".into(), "`,`".into()],
        };
        assert_eq!(err.to_string(), "unexpected `}`, expected `)` or `,`");
    }

    #[test]
    fn macro_arity_message_is_pluralised() {
        let err = SemanticError::MacroArityMismatch {
            name: "MAX".into(),
            expected: "2".into(),
            found: 1,
            span: Span::default(),
        };
        assert_eq!(err.to_string(), "macro `MAX` takes 2 arguments, 1 given");
    }

    #[test]
    fn semantic_errors_become_diagnostics() {
        let err = CoreError::from(vec![
            SemanticError::NotCallable { name: "x".into(), span: Span::default() },
            SemanticError::Redefinition { name: "y".into(), span: Span::default() },
        ]);
        let diags = err.diagnostics();
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].code, Some("E0307"));
        assert_eq!(err.semantic().len(), 2);
    }
}
