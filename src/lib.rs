// Thu Oct 15 2026 - Alex

pub mod config;
pub mod diagnostic;
pub mod driver;
pub mod layout;
pub mod lexer;
pub mod parser;
pub mod query;
pub mod template;
pub mod types;
pub mod ui;

pub use config::Config;
pub use diagnostic::{Diagnostic, DiagnosticKind, Severity};
pub use driver::{Session, SourceUnit, TypeGraph};
pub use layout::{AbiConfig, LayoutPlan};
pub use parser::{CFormatter, Language};
pub use types::{Declaration, QualType, TypeTable};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Lex(#[from] lexer::LexError),
    #[error(transparent)]
    Preprocess(#[from] lexer::PreprocessError),
    #[error(transparent)]
    Parse(#[from] parser::ParseError),
    #[error(transparent)]
    Type(#[from] types::TypeError),
    #[error(transparent)]
    Template(#[from] template::TemplateError),
    #[error(transparent)]
    Layout(#[from] layout::LayoutError),
    #[error(transparent)]
    Query(#[from] query::QueryError),
}

pub type Result<T> = std::result::Result<T, Error>;
