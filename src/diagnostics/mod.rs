use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::span::Span;

/// Fatal errors. Anything that can be recovered from inside an expression is a
/// [`Diagnostic`] instead.
#[derive(Debug, Error)]
pub enum LowerError {
    #[error("Config error: {msg}")]
    Config { msg: String, path: PathBuf },

    #[error("Input error: {msg}")]
    Input { msg: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal lowering error: {msg}")]
    Internal { msg: String },
}

impl LowerError {
    pub fn config(msg: impl Into<String>, path: PathBuf) -> Self {
        Self::Config { msg: msg.into(), path }
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input { msg: msg.into() }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal { msg: msg.into() }
    }
}

/// Stable codes attached to recoverable diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    /// Callee expression shape is not callable.
    ComplexCallee,
    /// Assignment, reference or compound-assignment target is not a place.
    InvalidTarget,
    UnknownVariable,
    UnknownMethod,
    /// A numeric or byte intrinsic was called without its operand.
    MissingIntrinsicArg,
    MissingArgument,
    LambdaRequired,
    FunctionRequired,
    DefaultAndLambdaRequired,
    PointerWriteMissingValue,
    SecondArgLambdaRequired,
    LambdaOrFunctionRequired,
    AmbiguousPointerAdd,
    AmbiguousPointerAddRejected,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ComplexCallee => "C002",
            ErrorCode::InvalidTarget => "C003",
            ErrorCode::UnknownVariable => "C004",
            ErrorCode::UnknownMethod => "C006",
            ErrorCode::MissingIntrinsicArg => "C008",
            ErrorCode::MissingArgument => "C015",
            ErrorCode::LambdaRequired => "C016",
            ErrorCode::FunctionRequired => "C017",
            ErrorCode::DefaultAndLambdaRequired => "C018",
            ErrorCode::PointerWriteMissingValue => "C019",
            ErrorCode::SecondArgLambdaRequired => "C020",
            ErrorCode::LambdaOrFunctionRequired => "C021",
            ErrorCode::AmbiguousPointerAddRejected => "C030",
            ErrorCode::AmbiguousPointerAdd => "W001",
        }
    }

    pub fn default_severity(self) -> Severity {
        match self {
            ErrorCode::AmbiguousPointerAdd => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

/// A recoverable problem found while lowering one expression. Lowering keeps
/// going with a placeholder value so several can be reported per pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            severity: code.default_severity(),
            message: message.into(),
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{kind}[{}]: {}", self.code, self.message)
    }
}

/// Render a Diagnostic with ariadne for terminal output. Without source text
/// only the one-line form is printed.
pub fn render_diagnostic(source: Option<&str>, filename: &str, diag: &Diagnostic) {
    use ariadne::{Label, Report, ReportKind, Source};

    let Some(source) = source.filter(|_| !diag.span.is_dummy()) else {
        eprintln!("{diag}");
        eprintln!("  --> {filename}");
        return;
    };
    let kind = match diag.severity {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
    };
    let printed = Report::build(kind, (), diag.span.start)
        .with_code(diag.code.as_str())
        .with_message(&diag.message)
        .with_label(Label::new(diag.span.range()).with_message(&diag.message))
        .finish()
        .eprint(Source::from(source));
    if printed.is_err() {
        eprintln!("{diag}");
    }
}
