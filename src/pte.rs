//! Page-table entries.
//!
//! The page table holds the tagged [`PageEntry`] form. The packed 32-bit layout is kept for
//! page-table dumps and anything else that needs the raw word:
//!
//! | bits   | meaning                          |
//! |--------|----------------------------------|
//! | 31     | present                          |
//! | 30     | swapped                          |
//! | 28     | dirty                            |
//! | 0..=12 | frame number (resident)          |
//! | 0..=4  | swap type (swapped)              |
//! | 5..=25 | swap offset (swapped)            |

use bitflags::bitflags;

use crate::constants::*;
use crate::error::{MemError, MemResult};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PteFlags: u32 {
        const PRESENT = 1 << PTE_PRESENT_BIT;
        const SWAPPED = 1 << PTE_SWAPPED_BIT;
        const DIRTY = 1 << PTE_DIRTY_BIT;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageEntry {
    /// Never mapped.
    #[default]
    Absent,
    /// In RAM at `frame`.
    Resident { frame: usize, dirty: bool },
    /// On swap device `swap_type` at frame `offset`.
    Swapped { swap_type: usize, offset: usize },
}

impl PageEntry {
    #[inline]
    pub fn is_resident(&self) -> bool {
        matches!(self, PageEntry::Resident { .. })
    }

    /// Frame number when resident.
    #[inline]
    pub fn frame(&self) -> Option<usize> {
        match *self {
            PageEntry::Resident { frame, .. } => Some(frame),
            _ => None,
        }
    }

    pub fn encode(&self) -> MemResult<u32> {
        let word = match *self {
            PageEntry::Absent => 0,
            PageEntry::Resident { frame, dirty } => {
                let mut flags = PteFlags::PRESENT;
                flags.set(PteFlags::DIRTY, dirty);
                flags.bits() | set_field(frame, "fpn", PTE_FPN_MASK, PTE_FPN_LOBIT)?
            }
            PageEntry::Swapped { swap_type, offset } => {
                (PteFlags::PRESENT | PteFlags::SWAPPED).bits()
                    | set_field(swap_type, "swap type", PTE_SWPTYP_MASK, PTE_SWPTYP_LOBIT)?
                    | set_field(offset, "swap offset", PTE_SWPOFF_MASK, PTE_SWPOFF_LOBIT)?
            }
        };
        Ok(word)
    }

    pub fn decode(word: u32) -> Self {
        let flags = PteFlags::from_bits_truncate(word);
        if !flags.contains(PteFlags::PRESENT) {
            PageEntry::Absent
        } else if flags.contains(PteFlags::SWAPPED) {
            PageEntry::Swapped {
                swap_type: get_field(word, PTE_SWPTYP_MASK, PTE_SWPTYP_LOBIT),
                offset: get_field(word, PTE_SWPOFF_MASK, PTE_SWPOFF_LOBIT),
            }
        } else {
            PageEntry::Resident {
                frame: get_field(word, PTE_FPN_MASK, PTE_FPN_LOBIT),
                dirty: flags.contains(PteFlags::DIRTY),
            }
        }
    }
}

fn set_field(value: usize, field: &'static str, mask: u32, lobit: u32) -> MemResult<u32> {
    let max = (mask >> lobit) as usize;
    if value > max {
        return Err(MemError::EncodingOverflow { field, value });
    }
    Ok(((value as u32) << lobit) & mask)
}

#[inline]
fn get_field(word: u32, mask: u32, lobit: u32) -> usize {
    ((word & mask) >> lobit) as usize
}
