// Wed Oct 14 2026 - Alex

pub mod abi;
pub mod access;
pub mod bitfield;
pub mod cache;
pub mod error;
pub mod hierarchy;
pub mod plan;
pub mod resolver;
pub mod vtable;

pub use abi::{align_to, AbiConfig, BitfieldPolicy, DataModel, VirtualBasePlacement};
pub use access::MemberAccess;
pub use bitfield::{BitAllocation, BitfieldPacker};
pub use cache::LayoutCache;
pub use error::LayoutError;
pub use hierarchy::{ClassHierarchy, ClassNode, HierarchyStats};
pub use plan::{BasePlacement, BitfieldPlacement, FieldPlacement, LayoutPlan, PrimaryBase, Subobject};
pub use resolver::LayoutResolver;
pub use vtable::{SecondaryVTable, VTableDescriptor, VTableSlot};
