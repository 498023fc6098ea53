// Wed Oct 14 2026 - Alex

pub mod decl;
pub mod error;
pub mod instance;
pub mod pattern;
pub mod resolver;

pub use decl::{PartialSpecialization, TemplateBody, TemplateDeclaration, TemplateParam, TemplateParamKind};
pub use error::TemplateError;
pub use instance::{instantiate_record, substitute_type, Instance, InstanceCache};
pub use pattern::{unify_args, unify_type, Bindings};
pub use resolver::{normalize_args, select, Selection, SpecializationOrdering};
