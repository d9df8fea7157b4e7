// Default geometry, shared by every address space built from `MemConfig::default()`.
pub const PAGE_SIZE: usize = 256;
pub const MAX_PAGES: usize = 1 << 14;
pub const MAX_SYMBOLS: usize = 30;

pub const RAM_SIZE: usize = 0x10_0000;
pub const SWAP_SIZE: usize = 0x100_0000;

// PTE layout (32-bit word)
pub const PTE_PRESENT_BIT: u32 = 31;
pub const PTE_SWAPPED_BIT: u32 = 30;
pub const PTE_DIRTY_BIT: u32 = 28;

pub const PTE_FPN_LOBIT: u32 = 0;
pub const PTE_FPN_HIBIT: u32 = 12;
pub const PTE_SWPTYP_LOBIT: u32 = 0;
pub const PTE_SWPTYP_HIBIT: u32 = 4;
pub const PTE_SWPOFF_LOBIT: u32 = 5;
pub const PTE_SWPOFF_HIBIT: u32 = 25;

pub const PTE_FPN_MASK: u32 = field_mask(PTE_FPN_LOBIT, PTE_FPN_HIBIT);
pub const PTE_SWPTYP_MASK: u32 = field_mask(PTE_SWPTYP_LOBIT, PTE_SWPTYP_HIBIT);
pub const PTE_SWPOFF_MASK: u32 = field_mask(PTE_SWPOFF_LOBIT, PTE_SWPOFF_HIBIT);

pub const MAX_FPN: usize = (PTE_FPN_MASK >> PTE_FPN_LOBIT) as usize;
pub const MAX_SWPTYP: usize = (PTE_SWPTYP_MASK >> PTE_SWPTYP_LOBIT) as usize;
pub const MAX_SWPOFF: usize = (PTE_SWPOFF_MASK >> PTE_SWPOFF_LOBIT) as usize;

/// Bits `lo..=hi` set.
pub const fn field_mask(lo: u32, hi: u32) -> u32 {
    ((u32::MAX) >> (31 - hi)) & !((1u32 << lo) - 1)
}
