// Wed Oct 14 2026 - Alex

use crate::types::PrimitiveType;
use serde::{Deserialize, Serialize};

/// How consecutive bitfields share storage units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BitfieldPolicy {
    /// A bitfield joins the current run unless it would straddle an aligned
    /// unit of its declared type. Unnamed bitfields do not affect alignment.
    #[default]
    SystemV,
    /// A bitfield shares storage only with an immediately preceding bitfield
    /// whose declared type has the same size, and only while bits remain.
    Msvc,
    /// Bits are allocated contiguously, straddling allowed.
    Packed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VirtualBasePlacement {
    /// Virtual bases follow the class's own fields, as Itanium prescribes.
    #[default]
    AfterFields,
    /// Virtual bases sit between the non-virtual bases and the fields.
    BeforeFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataModel {
    Lp64,
    Ilp32,
    Llp64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiConfig {
    pub data_model: DataModel,
    pub bitfield_policy: BitfieldPolicy,
    pub vbase_placement: VirtualBasePlacement,
}

impl AbiConfig {
    pub fn lp64() -> Self {
        Self {
            data_model: DataModel::Lp64,
            bitfield_policy: BitfieldPolicy::SystemV,
            vbase_placement: VirtualBasePlacement::AfterFields,
        }
    }

    pub fn ilp32() -> Self {
        Self {
            data_model: DataModel::Ilp32,
            ..Self::lp64()
        }
    }

    /// 64-bit Windows data model, which goes with MSVC bitfield packing.
    pub fn llp64() -> Self {
        Self {
            data_model: DataModel::Llp64,
            bitfield_policy: BitfieldPolicy::Msvc,
            vbase_placement: VirtualBasePlacement::AfterFields,
        }
    }

    pub fn with_bitfield_policy(mut self, policy: BitfieldPolicy) -> Self {
        self.bitfield_policy = policy;
        self
    }

    pub fn with_vbase_placement(mut self, placement: VirtualBasePlacement) -> Self {
        self.vbase_placement = placement;
        self
    }

    pub fn pointer_size(&self) -> u64 {
        match self.data_model {
            DataModel::Ilp32 => 4,
            DataModel::Lp64 | DataModel::Llp64 => 8,
        }
    }

    pub fn pointer_align(&self) -> u64 {
        self.pointer_size()
    }

    /// Size and alignment in bytes of a primitive type.
    pub fn size_align(&self, prim: PrimitiveType) -> (u64, u64) {
        let ilp32 = self.data_model == DataModel::Ilp32;
        let llp64 = self.data_model == DataModel::Llp64;
        match prim {
            PrimitiveType::Void => (0, 1),
            PrimitiveType::Bool | PrimitiveType::Char | PrimitiveType::SChar | PrimitiveType::UChar => (1, 1),
            PrimitiveType::Char8 => (1, 1),
            PrimitiveType::WChar if llp64 => (2, 2),
            PrimitiveType::WChar => (4, 4),
            PrimitiveType::Char16 | PrimitiveType::Short | PrimitiveType::UShort => (2, 2),
            PrimitiveType::Char32 | PrimitiveType::Int | PrimitiveType::UInt | PrimitiveType::Float => (4, 4),
            PrimitiveType::Long | PrimitiveType::ULong if ilp32 || llp64 => (4, 4),
            PrimitiveType::Long | PrimitiveType::ULong => (8, 8),
            PrimitiveType::LongLong | PrimitiveType::ULongLong | PrimitiveType::Double if ilp32 => (8, 4),
            PrimitiveType::LongLong | PrimitiveType::ULongLong | PrimitiveType::Double => (8, 8),
            PrimitiveType::Int128 | PrimitiveType::UInt128 => (16, 16),
            PrimitiveType::LongDouble if ilp32 => (12, 4),
            PrimitiveType::LongDouble if llp64 => (8, 8),
            PrimitiveType::LongDouble => (16, 16),
            PrimitiveType::NullPtr => (self.pointer_size(), self.pointer_align()),
        }
    }

    /// Type behind `size_t`.
    pub fn size_type(&self) -> PrimitiveType {
        match self.data_model {
            DataModel::Lp64 => PrimitiveType::ULong,
            DataModel::Ilp32 => PrimitiveType::UInt,
            DataModel::Llp64 => PrimitiveType::ULongLong,
        }
    }

    /// Type behind `ptrdiff_t`.
    pub fn diff_type(&self) -> PrimitiveType {
        match self.data_model {
            DataModel::Lp64 => PrimitiveType::Long,
            DataModel::Ilp32 => PrimitiveType::Int,
            DataModel::Llp64 => PrimitiveType::LongLong,
        }
    }
}

impl Default for AbiConfig {
    fn default() -> Self {
        Self::lp64()
    }
}

pub fn align_to(offset: u64, align: u64) -> u64 {
    if align <= 1 {
        offset
    } else {
        offset.div_ceil(align) * align
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_models() {
        let lp64 = AbiConfig::lp64();
        assert_eq!(lp64.size_align(PrimitiveType::Long), (8, 8));
        assert_eq!(lp64.pointer_size(), 8);
        let ilp32 = AbiConfig::ilp32();
        assert_eq!(ilp32.size_align(PrimitiveType::Long), (4, 4));
        assert_eq!(ilp32.size_align(PrimitiveType::Double), (8, 4));
        let llp64 = AbiConfig::llp64();
        assert_eq!(llp64.size_align(PrimitiveType::Long), (4, 4));
        assert_eq!(llp64.pointer_size(), 8);
        assert_eq!(llp64.bitfield_policy, BitfieldPolicy::Msvc);
    }

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(12, 8), 16);
        assert_eq!(align_to(16, 8), 16);
        assert_eq!(align_to(3, 1), 3);
        assert_eq!(align_to(0, 4), 0);
    }
}
