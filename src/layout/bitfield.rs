// Wed Oct 14 2026 - Alex

use crate::layout::abi::{align_to, BitfieldPolicy};

/// Result of placing one bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitAllocation {
    pub bit_offset: u64,
    /// Byte offset of the storage unit holding `bit_offset`.
    pub storage_offset: u64,
    /// Data size in bits once this bitfield is placed.
    pub end_bits: u64,
    /// Alignment the record inherits from the field, if any.
    pub align: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
struct Run {
    start_bits: u64,
    unit_size: u64,
    used: u64,
}

/// Allocates bitfields of one record under a packing policy. A fresh packer
/// is used per record, so runs never continue across classes.
#[derive(Debug)]
pub struct BitfieldPacker {
    policy: BitfieldPolicy,
    run: Option<Run>,
}

impl BitfieldPacker {
    pub fn new(policy: BitfieldPolicy) -> Self {
        Self { policy, run: None }
    }

    pub fn policy(&self) -> BitfieldPolicy {
        self.policy
    }

    /// A member that is not a bitfield closes the current run.
    pub fn interrupt(&mut self) {
        self.run = None;
    }

    /// Places a bitfield of `width` bits whose declared type has the given
    /// size and alignment in bytes, with the record data ending at
    /// `data_bits`.
    pub fn place(&mut self, data_bits: u64, width: u32, unit_size: u64, unit_align: u64, named: bool) -> BitAllocation {
        let width = u64::from(width);
        let unit_bits = unit_size * 8;
        let align_bits = unit_align.max(1) * 8;
        match self.policy {
            BitfieldPolicy::SystemV => {
                let mut offset = data_bits;
                if width == 0 {
                    offset = align_to(offset, align_bits);
                } else if (offset % align_bits) + width > unit_bits {
                    offset = align_to(offset, align_bits);
                }
                BitAllocation {
                    bit_offset: offset,
                    storage_offset: (offset / align_bits) * unit_align.max(1),
                    end_bits: offset + width,
                    align: (named && width > 0).then_some(unit_align),
                }
            }
            BitfieldPolicy::Msvc => {
                if width == 0 {
                    self.run = None;
                    return BitAllocation {
                        bit_offset: data_bits,
                        storage_offset: data_bits / 8,
                        end_bits: data_bits,
                        align: None,
                    };
                }
                if let Some(run) = self.run.as_mut() {
                    if run.unit_size == unit_size && run.used + width <= unit_bits {
                        let offset = run.start_bits + run.used;
                        run.used += width;
                        return BitAllocation {
                            bit_offset: offset,
                            storage_offset: run.start_bits / 8,
                            end_bits: data_bits.max(run.start_bits + unit_bits),
                            align: Some(unit_align),
                        };
                    }
                }
                let start = align_to(align_to(data_bits, 8), align_bits);
                self.run = Some(Run {
                    start_bits: start,
                    unit_size,
                    used: width,
                });
                BitAllocation {
                    bit_offset: start,
                    storage_offset: start / 8,
                    end_bits: start + unit_bits,
                    align: Some(unit_align),
                }
            }
            BitfieldPolicy::Packed => BitAllocation {
                bit_offset: data_bits,
                storage_offset: data_bits / 8,
                end_bits: data_bits + width,
                align: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // b3:3, b4:4, b6:6 and x:1 over int, then four unsigned char fields
    const BF: [(u32, u64); 8] = [(3, 4), (4, 4), (6, 4), (1, 4), (1, 1), (1, 1), (1, 1), (4, 1)];

    fn pack(policy: BitfieldPolicy) -> (Vec<u64>, u64) {
        let mut packer = BitfieldPacker::new(policy);
        let mut data_bits = 0;
        let mut offsets = Vec::new();
        for (width, size) in BF {
            let a = packer.place(data_bits, width, size, size, true);
            offsets.push(a.bit_offset);
            data_bits = a.end_bits;
        }
        (offsets, data_bits)
    }

    #[test]
    fn test_system_v_shares_units() {
        let (offsets, end) = pack(BitfieldPolicy::SystemV);
        assert_eq!(offsets, vec![0, 3, 7, 13, 14, 15, 16, 17]);
        assert_eq!(end, 21);
    }

    #[test]
    fn test_msvc_splits_on_type_size() {
        let (offsets, end) = pack(BitfieldPolicy::Msvc);
        assert_eq!(offsets, vec![0, 3, 7, 13, 32, 33, 34, 35]);
        assert_eq!(end, 40);
    }

    #[test]
    fn test_system_v_straddle_moves_to_next_unit() {
        let mut packer = BitfieldPacker::new(BitfieldPolicy::SystemV);
        let a = packer.place(30, 4, 4, 4, true);
        assert_eq!(a.bit_offset, 32);
        assert_eq!(a.storage_offset, 4);
        let packed = BitfieldPacker::new(BitfieldPolicy::Packed).place(30, 4, 4, 4, true);
        assert_eq!(packed.bit_offset, 30);
    }

    #[test]
    fn test_zero_width_and_unnamed() {
        let mut packer = BitfieldPacker::new(BitfieldPolicy::SystemV);
        let z = packer.place(5, 0, 4, 4, false);
        assert_eq!(z.end_bits, 32);
        assert_eq!(z.align, None);
        let unnamed = packer.place(32, 3, 4, 4, false);
        assert_eq!(unnamed.align, None);
    }
}
