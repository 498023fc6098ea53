// Tue Oct 13 2026 - Alex

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::lexer::SourcePos;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("{pos}: unexpected character '{ch}'")]
    UnexpectedChar { ch: char, pos: SourcePos },
    #[error("{pos}: unterminated {what}")]
    Unterminated { what: &'static str, pos: SourcePos },
}

impl LexError {
    pub fn position(&self) -> &SourcePos {
        match self {
            LexError::UnexpectedChar { pos, .. } | LexError::Unterminated { pos, .. } => pos,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("{pos}: identifier '{name}' does not name a constant")]
    Unresolved { name: String, pos: SourcePos },
    #[error("{pos}: division by zero")]
    DivisionByZero { pos: SourcePos },
    #[error("{pos}: {message}")]
    Syntax { message: String, pos: SourcePos },
    #[error("empty constant expression")]
    Empty,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreprocessError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("{pos}: macro '{name}' expands recursively")]
    MacroRecursion { name: String, pos: SourcePos },
    #[error("{pos}: identifier '{name}' in conditional is not a defined macro")]
    UndefinedMacroInConditional { name: String, pos: SourcePos },
    #[error("{pos}: invalid conditional expression: {source}")]
    InvalidCondition { source: EvalError, pos: SourcePos },
    #[error("{pos}: malformed #{directive} directive")]
    MalformedDirective { directive: String, pos: SourcePos },
    #[error("{pos}: #{directive} without matching #if")]
    UnbalancedConditional { directive: String, pos: SourcePos },
    #[error("{pos}: conditional block is never closed")]
    UnterminatedConditional { pos: SourcePos },
    #[error("{pos}: unterminated invocation of macro '{name}'")]
    UnterminatedMacroCall { name: String, pos: SourcePos },
    #[error("{pos}: macro '{name}' expects {expected} arguments, got {found}")]
    MacroArity { name: String, expected: usize, found: usize, pos: SourcePos },
    #[error("{pos}: include file '{path}' not found")]
    IncludeNotFound { path: String, pos: SourcePos },
    #[error("{pos}: includes nested deeper than {limit}")]
    IncludeDepth { limit: usize, pos: SourcePos },
    #[error("{pos}: #error {message}")]
    ErrorDirective { message: String, pos: SourcePos },
}

impl PreprocessError {
    /// Errors that stop preprocessing of the whole translation unit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PreprocessError::MacroRecursion { .. })
    }

    pub fn position(&self) -> Option<&SourcePos> {
        match self {
            PreprocessError::Lex(e) => Some(e.position()),
            PreprocessError::MacroRecursion { pos, .. }
            | PreprocessError::UndefinedMacroInConditional { pos, .. }
            | PreprocessError::InvalidCondition { pos, .. }
            | PreprocessError::MalformedDirective { pos, .. }
            | PreprocessError::UnbalancedConditional { pos, .. }
            | PreprocessError::UnterminatedConditional { pos }
            | PreprocessError::UnterminatedMacroCall { pos, .. }
            | PreprocessError::MacroArity { pos, .. }
            | PreprocessError::IncludeNotFound { pos, .. }
            | PreprocessError::IncludeDepth { pos, .. }
            | PreprocessError::ErrorDirective { pos, .. } => Some(pos),
        }
    }

    pub fn kind(&self) -> DiagnosticKind {
        match self {
            PreprocessError::Lex(_) => DiagnosticKind::Lex,
            PreprocessError::MacroRecursion { .. } => DiagnosticKind::MacroRecursion,
            PreprocessError::UndefinedMacroInConditional { .. } => {
                DiagnosticKind::UndefinedMacroInConditional
            }
            PreprocessError::IncludeNotFound { .. } => DiagnosticKind::IncludeNotFound,
            _ => DiagnosticKind::Preprocess,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.kind(), self.to_string(), self.position().cloned())
    }
}
