// Wed Oct 14 2026 - Alex

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::template::TemplateError;
use crate::types::TypeError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("incomplete type: {0}")]
    IncompleteType(String),
    #[error("unknown class: {0}")]
    UnknownClass(String),
    #[error("{0} contains itself by value")]
    RecursiveContainment(String),
    #[error("dependent type {0} has no layout until instantiated")]
    DependentType(String),
    #[error("{0} is not an object type")]
    NotAnObject(String),
    #[error("{0} is too large to lay out")]
    ObjectTooLarge(String),
    #[error("cannot evaluate array bound [{expr}]: {message}")]
    UnresolvedBound { expr: String, message: String },
    #[error("member {member} of {class} is ambiguous: found in {}", .paths.join(", "))]
    AmbiguousBaseAccess {
        class: String,
        member: String,
        paths: Vec<String>,
    },
    #[error("{base} is an ambiguous base of {class}")]
    AmbiguousBaseConversion { class: String, base: String },
    #[error("{base} is not a base of {class}")]
    NotABase { class: String, base: String },
    #[error("no member named {member} in {class}")]
    MemberNotFound { class: String, member: String },
    #[error("type error: {0}")]
    Type(#[from] TypeError),
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
}

impl LayoutError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            LayoutError::IncompleteType(_) => DiagnosticKind::IncompleteType,
            LayoutError::AmbiguousBaseAccess { .. } | LayoutError::AmbiguousBaseConversion { .. } => {
                DiagnosticKind::AmbiguousBaseAccess
            }
            LayoutError::Template(TemplateError::AmbiguousSpecialization { .. }) => {
                DiagnosticKind::AmbiguousSpecialization
            }
            LayoutError::Template(_) => DiagnosticKind::Template,
            LayoutError::Type(_) => DiagnosticKind::Type,
            _ => DiagnosticKind::Layout,
        }
    }

    /// Layout failures only concern the record being laid out; they are
    /// reported as errors without affecting the rest of the graph.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.kind(), self.to_string(), None)
    }
}
