// Thu Oct 15 2026 - Alex

pub mod depends;
pub mod error;
pub mod export;
pub mod search;
pub mod select;

pub use depends::{dependencies, Dependencies};
pub use error::{parse_number, QueryError};
pub use export::{render_layout, ExportSection, JsonExporter};
pub use search::{search, SearchMatch, Searcher};
pub use select::{
    mask_expression, select_constants, select_prototypes, select_structs, ConstantMatch, PrototypeConstraint,
    StructConstraint,
};
