// Wed Oct 14 2026 - Alex

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::lexer::{LexError, SourcePos};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("{position}: expected {expected}, found '{found}'")]
    Syntax {
        position: SourcePos,
        expected: String,
        found: String,
    },
    #[error("{position}: '{expr}' is not a constant expression: {message}")]
    InvalidConstant {
        position: SourcePos,
        expr: String,
        message: String,
    },
    #[error(transparent)]
    Lex(#[from] LexError),
}

impl ParseError {
    pub fn syntax(position: SourcePos, expected: impl Into<String>, found: impl Into<String>) -> Self {
        ParseError::Syntax {
            position,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn position(&self) -> &SourcePos {
        match self {
            ParseError::Syntax { position, .. } | ParseError::InvalidConstant { position, .. } => position,
            ParseError::Lex(e) => e.position(),
        }
    }

    /// Syntax errors drop the declaration they occur in; a bad constant only
    /// loses its value.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ParseError::InvalidConstant { .. } => {
                Diagnostic::warning(DiagnosticKind::Syntax, self.to_string(), Some(self.position().clone()))
            }
            ParseError::Lex(_) => Diagnostic::error(DiagnosticKind::Lex, self.to_string(), Some(self.position().clone())),
            ParseError::Syntax { .. } => {
                Diagnostic::error(DiagnosticKind::Syntax, self.to_string(), Some(self.position().clone()))
            }
        }
    }
}
