// Wed Oct 14 2026 - Alex

use crate::layout::vtable::VTableDescriptor;
use crate::types::{QualType, RecordKind};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Where the bits of a bitfield live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BitfieldPlacement {
    /// Offset of the first bit, counted from the start of the record.
    pub bit_offset: u64,
    pub width: u32,
    /// Byte offset of the storage unit holding the first bit.
    pub storage_offset: u64,
    /// Size in bytes of the declared type's storage unit.
    pub storage_size: u64,
}

impl BitfieldPlacement {
    /// Bit position inside the storage unit.
    pub fn bit_in_unit(&self) -> u64 {
        self.bit_offset - self.storage_offset * 8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldPlacement {
    /// `None` for unnamed bitfields and anonymous aggregates.
    pub name: Option<String>,
    pub ty: QualType,
    /// Byte offset. For bitfields this is the storage unit's offset.
    pub offset: u64,
    pub size: u64,
    pub align: u64,
    /// Index in the record's member list.
    pub member_index: usize,
    pub bitfield: Option<BitfieldPlacement>,
    /// Layout of an anonymous struct or union whose fields are promoted.
    pub anonymous: Option<Arc<LayoutPlan>>,
}

impl FieldPlacement {
    pub fn is_bitfield(&self) -> bool {
        self.bitfield.is_some()
    }
}

impl fmt::Display for FieldPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.as_deref().unwrap_or("");
        write!(f, "+{:<4} {}", self.offset, self.ty.declare(name))?;
        match &self.bitfield {
            Some(bf) => write!(f, " : {} (bit {})", bf.width, bf.bit_in_unit()),
            None => write!(f, " [{}]", self.size),
        }
    }
}

/// A base class subobject placed inside the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasePlacement {
    pub name: String,
    pub offset: u64,
    pub is_virtual: bool,
    /// Shares the record's vtable pointer at offset 0.
    pub is_primary: bool,
    /// Index of the direct base edge; `None` for indirect virtual bases.
    pub edge: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryBase {
    pub name: String,
    pub is_virtual: bool,
}

/// One node of the flattened subobject graph of a complete object.
/// Virtual bases appear once and are shared by every path reaching them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subobject {
    pub class: String,
    pub offset: u64,
    pub is_virtual: bool,
    /// Arena indices of the direct bases, in declaration order.
    pub bases: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutPlan {
    pub name: String,
    pub kind: RecordKind,
    /// `sizeof`, rounded to the alignment.
    pub size: u64,
    pub align: u64,
    /// Size without tail padding; bases may reuse the rest.
    pub data_size: u64,
    /// Size of the non-virtual part, used when this record is a base.
    pub nv_size: u64,
    pub nv_align: u64,
    pub is_dynamic: bool,
    pub is_empty: bool,
    pub is_pod: bool,
    pub vptr_offset: Option<u64>,
    pub primary_base: Option<PrimaryBase>,
    /// Direct non-virtual bases, then every virtual base of the hierarchy,
    /// in placement order.
    pub bases: Vec<BasePlacement>,
    pub fields: Vec<FieldPlacement>,
    /// Index 0 is the complete object itself.
    pub subobjects: Vec<Subobject>,
    pub vtable: Option<VTableDescriptor>,
}

impl LayoutPlan {
    pub fn direct_bases(&self) -> impl Iterator<Item = &BasePlacement> {
        self.bases.iter().filter(|b| !b.is_virtual)
    }

    pub fn virtual_bases(&self) -> impl Iterator<Item = &BasePlacement> {
        self.bases.iter().filter(|b| b.is_virtual)
    }

    /// Direct base edges in declaration order, virtual ones included.
    pub fn edges(&self) -> Vec<&BasePlacement> {
        let mut edges: Vec<&BasePlacement> = self.bases.iter().filter(|b| b.edge.is_some()).collect();
        edges.sort_by_key(|b| b.edge);
        edges
    }

    pub fn vbase_offset(&self, name: &str) -> Option<u64> {
        self.virtual_bases().find(|b| b.name == name).map(|b| b.offset)
    }

    pub fn has_vbase(&self, name: &str) -> bool {
        self.virtual_bases().any(|b| b.name == name)
    }

    pub fn has_virtual_bases(&self) -> bool {
        self.bases.iter().any(|b| b.is_virtual)
    }

    /// A dynamic class whose only data is its vtable pointer.
    pub fn is_nearly_empty(&self, pointer_size: u64) -> bool {
        self.is_dynamic && self.nv_size == pointer_size
    }

    /// Looks a field up by name, descending into anonymous members.
    /// The offset returned is relative to this record.
    pub fn field(&self, name: &str) -> Option<(u64, &FieldPlacement)> {
        for field in &self.fields {
            if field.name.as_deref() == Some(name) {
                return Some((field.offset, field));
            }
            if let (None, Some(inner)) = (&field.name, &field.anonymous) {
                if let Some((offset, found)) = inner.field(name) {
                    return Some((field.offset + offset, found));
                }
            }
        }
        None
    }

    /// Number of subobjects of `class`, counting shared virtual ones once.
    pub fn subobject_count(&self, class: &str) -> usize {
        self.subobjects.iter().filter(|s| s.class == class).count()
    }
}

impl fmt::Display for LayoutPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {} (size {}, align {}, dsize {}, nvsize {})",
            self.kind.keyword(),
            self.name,
            self.size,
            self.align,
            self.data_size,
            self.nv_size
        )?;
        if let Some(offset) = self.vptr_offset {
            if self.primary_base.is_none() {
                writeln!(f, "  +{:<4} vptr", offset)?;
            }
        }
        for base in &self.bases {
            let mut tags = Vec::new();
            if base.is_virtual {
                tags.push("virtual");
            }
            if base.is_primary {
                tags.push("primary");
            }
            if tags.is_empty() {
                writeln!(f, "  +{:<4} base {}", base.offset, base.name)?;
            } else {
                writeln!(f, "  +{:<4} base {} ({})", base.offset, base.name, tags.join(", "))?;
            }
        }
        for field in &self.fields {
            writeln!(f, "  {}", field)?;
        }
        Ok(())
    }
}
