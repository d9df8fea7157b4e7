use std::fmt;

use log::{trace, warn};

use crate::address_space::AddressSpace;
use crate::error::{MemError, MemResult};
use crate::syscall::SysMemOp;

/// A virtual address split into page number and in-page offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualAddress {
    pub raw: usize,
    pub page: usize,
    pub offset: usize,
}

impl VirtualAddress {
    pub fn from_raw(raw: usize, offset_bits: u32) -> Self {
        let mask = (1usize << offset_bits) - 1;
        VirtualAddress { raw, page: raw >> offset_bits, offset: raw & mask }
    }

    /// Physical address of this offset inside `frame`.
    #[inline]
    pub fn physical(&self, frame: usize, offset_bits: u32) -> usize {
        (frame << offset_bits) | self.offset
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA({}) = (pgn={}, off={})", self.raw, self.page, self.offset)
    }
}

impl AddressSpace {
    /// Translate a virtual address to a RAM address, faulting the page in if needed.
    pub fn translate(&mut self, addr: usize) -> MemResult<usize> {
        if !self.areas.iter().any(|a| a.span().contains(addr)) {
            warn!("pid={} address {} outside every area", self.pid, addr);
            return Err(MemError::access(format!("address {} is not mapped", addr)));
        }
        let bits = self.config.offset_bits();
        let va = VirtualAddress::from_raw(addr, bits);
        let frame = self.resolve(va.page)?;
        let phys = va.physical(frame, bits);
        trace!("{} -> fpn={} phys={}", va, frame, phys);
        Ok(phys)
    }

    /// Read straight from the RAM device.
    pub fn read_byte(&mut self, addr: usize) -> MemResult<u8> {
        let phys = self.translate(addr)?;
        self.devices.ram.read(phys)
    }

    /// Write through the syscall service and mark the page dirty.
    pub fn write_byte(&mut self, addr: usize, value: u8) -> MemResult<()> {
        let phys = self.translate(addr)?;
        self.sys_call(SysMemOp::IoWrite { address: phys, value })?;
        self.page_table.mark_dirty(addr >> self.config.offset_bits())
    }

    /// Virtual address of `offset` inside the live region under `handle`.
    pub fn region_address(&self, handle: usize, offset: usize) -> MemResult<usize> {
        let region = self.symbols.get(handle)?;
        if region.is_empty() {
            return Err(MemError::access(format!("region {} is not allocated", handle)));
        }
        if offset >= region.len() {
            return Err(MemError::access(format!(
                "offset {} outside region {} of {} bytes",
                offset,
                handle,
                region.len()
            )));
        }
        Ok(region.start + offset)
    }
}
