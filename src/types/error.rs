// Wed Oct 14 2026 - Alex

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TypeError {
    #[error("redefinition of {kind} '{name}'")]
    Redefinition { name: String, kind: String },
    #[error("'{name}' redeclared as a different kind of symbol")]
    KindMismatch { name: String },
    #[error("typedef '{0}' refers to itself")]
    TypedefCycle(String),
    #[error("unknown type '{0}'")]
    UnknownType(String),
}
