// Tue Oct 13 2026 - Alex

use crate::lexer::SourcePos;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    Lex,
    Preprocess,
    MacroRecursion,
    UndefinedMacroInConditional,
    IncludeNotFound,
    Syntax,
    Type,
    Template,
    AmbiguousSpecialization,
    Layout,
    AmbiguousBaseAccess,
    IncompleteType,
}

/// A recovered problem, reported alongside the partial results of a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub position: Option<SourcePos>,
    pub unit: Option<String>,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>, position: Option<SourcePos>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message: message.into(),
            position,
            unit: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>, position: Option<SourcePos>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, message, position)
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: {}", level, self.message)?;
        if let Some(ref unit) = self.unit {
            write!(f, " [{}]", unit)?;
        }
        Ok(())
    }
}
