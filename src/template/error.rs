// Wed Oct 14 2026 - Alex

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
    #[error("ambiguous partial specialization of {template} for <{args}>: candidates {candidates:?}")]
    AmbiguousSpecialization {
        template: String,
        args: String,
        candidates: Vec<usize>,
    },
    #[error("template '{template}' expects {expected} arguments, got {found}")]
    ArityMismatch {
        template: String,
        expected: usize,
        found: usize,
    },
    #[error("template '{template}' has no definition for <{args}>")]
    NoDefinition { template: String, args: String },
    #[error("argument {index} of '{template}' has the wrong kind")]
    ArgumentKind { template: String, index: usize },
    #[error("cannot deduce the arguments of '{0}' from the call")]
    Deduction(String),
    #[error("bound '{expr}' of '{template}' is not a constant: {message}")]
    InvalidBound {
        template: String,
        expr: String,
        message: String,
    },
    #[error("'{0}' is not a class template")]
    NotAClassTemplate(String),
}
