// Thu Oct 15 2026 - Alex

pub mod graph;
pub mod session;
pub mod unit;

pub use graph::{GraphStats, TypeGraph};
pub use session::Session;
pub use unit::{process_unit, SourceUnit, UnitContext, UnitResult, UnitSummary};
