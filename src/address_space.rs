//! Per-process address space and the region/area operations on it.
//!
//! An `AddressSpace` owns everything one process's memory needs: its areas, the symbol table of
//! region handles, the page table, the FIFO victim queue, its RAM and swap devices, and the
//! syscall service that moves bytes between them. Callers that share an address space must
//! serialize whole operations on it (see [`crate::process::Process`]).

use log::{debug, trace, warn};

use crate::area::VmArea;
use crate::config::MemConfig;
use crate::error::{MemError, MemResult};
use crate::frame;
use crate::memory::PhysicalMemory;
use crate::page_table::PageTable;
use crate::pte::PageEntry;
use crate::region::{Region, SymbolTable};
use crate::swap::VictimQueue;
use crate::syscall::{DirectSysMem, Devices, SysMem, SysMemOp};

/// Outcome of a successful free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeStatus {
    Released(Region),
    AlreadyFree,
}

pub struct AddressSpace {
    pub(crate) pid: u32,
    pub(crate) config: MemConfig,
    pub(crate) areas: Vec<VmArea>,
    pub(crate) symbols: SymbolTable,
    pub(crate) page_table: PageTable,
    pub(crate) victims: VictimQueue,
    pub(crate) devices: Devices,
    pub(crate) sys: Box<dyn SysMem>,
}

impl AddressSpace {
    pub fn new(pid: u32, config: &MemConfig) -> MemResult<Self> {
        Self::with_sysmem(pid, config, Box::new(DirectSysMem))
    }

    /// Build an empty address space (one empty area at 0) that routes physical mutations
    /// through `sys`.
    pub fn with_sysmem(pid: u32, config: &MemConfig, sys: Box<dyn SysMem>) -> MemResult<Self> {
        config.validate()?;
        let ram = PhysicalMemory::new(config.ram_size, config.page_size, config.ram_access)?;
        let swap = config
            .swap_sizes
            .iter()
            .map(|&size| PhysicalMemory::new(size, config.page_size, config.swap_access))
            .collect::<MemResult<Vec<_>>>()?;

        Ok(AddressSpace {
            pid,
            config: config.clone(),
            areas: vec![VmArea::new(0, 0)],
            symbols: SymbolTable::new(config.max_symbols),
            page_table: PageTable::new(config.max_pages),
            victims: VictimQueue::new(),
            devices: Devices { ram, swap, active_swap: 0 },
            sys,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn config(&self) -> &MemConfig {
        &self.config
    }

    pub fn area(&self, id: usize) -> MemResult<&VmArea> {
        self.areas.get(id).ok_or_else(|| Self::no_area(id))
    }

    pub fn areas(&self) -> &[VmArea] {
        &self.areas
    }

    /// Bounds registered under `handle` (empty if unused).
    pub fn region(&self, handle: usize) -> MemResult<Region> {
        self.symbols.get(handle)
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn page_table(&self) -> &PageTable {
        &self.page_table
    }

    pub fn page_entry(&self, pgn: usize) -> MemResult<PageEntry> {
        self.page_table.get(pgn)
    }

    pub fn victims(&self) -> &VictimQueue {
        &self.victims
    }

    pub fn ram(&self) -> &PhysicalMemory {
        &self.devices.ram
    }

    pub fn swap(&self, swap_type: usize) -> Option<&PhysicalMemory> {
        self.devices.swap.get(swap_type)
    }

    pub fn active_swap(&self) -> usize {
        self.devices.active_swap
    }

    /// Direct evictions to another swap device.
    pub fn set_active_swap(&mut self, swap_type: usize) -> MemResult<()> {
        if swap_type >= self.devices.swap.len() {
            return Err(MemError::access(format!("no swap device {}", swap_type)));
        }
        self.devices.active_swap = swap_type;
        Ok(())
    }

    /// Register another, initially empty, area at a page-aligned `start`.
    pub fn add_area(&mut self, start: usize) -> MemResult<usize> {
        if start % self.config.page_size != 0 || start >= self.config.address_limit() {
            return Err(MemError::access(format!("area start {} is not a usable page boundary", start)));
        }
        if let Some(clash) = self
            .areas
            .iter()
            .find(|a| a.start == start || a.span().contains(start))
        {
            return Err(MemError::access(format!(
                "area start {} falls inside area {}",
                start, clash.id
            )));
        }
        let id = self.areas.len();
        self.areas.push(VmArea::new(id, start));
        debug!("pid={} new vma={} at {}", self.pid, id, start);
        Ok(id)
    }

    /// Allocate `size` bytes in `area_id` and register them under `handle`.
    ///
    /// First-fit over the area's holes; on a miss the area grows once by `size` rounded up to
    /// whole pages and the scan is retried.
    pub fn alloc(&mut self, area_id: usize, handle: usize, size: usize) -> MemResult<usize> {
        debug!(
            "alloc pid={} vma={} rgid={} size={}",
            self.pid, area_id, handle, size
        );
        let current = self.symbols.get(handle)?;
        if size == 0 {
            return Err(MemError::access("zero-size allocation"));
        }
        if !current.is_empty() {
            return Err(MemError::HandleInUse(handle));
        }

        if let Some(region) = self.area_mut(area_id)?.carve(size) {
            self.symbols.set(handle, region)?;
            return Ok(region.start);
        }

        match self.grow_area(area_id, size) {
            Ok(_) => {}
            Err(e @ (MemError::FrameExhausted | MemError::InvalidAccess(_) | MemError::FaultFailure(_))) => {
                warn!("alloc pid={} rgid={} failed to grow: {}", self.pid, handle, e);
                return Err(MemError::OutOfMemory);
            }
            Err(e) => return Err(e),
        }

        let region = self.area_mut(area_id)?.carve(size).ok_or(MemError::OutOfMemory)?;
        self.symbols.set(handle, region)?;
        Ok(region.start)
    }

    /// Release the region under `handle` back to the area's free list.
    pub fn free(&mut self, area_id: usize, handle: usize) -> MemResult<FreeStatus> {
        let region = self.symbols.get(handle)?;
        if region.is_empty() {
            debug!("free pid={} rgid={} already free", self.pid, handle);
            return Ok(FreeStatus::AlreadyFree);
        }
        if !self.area(area_id)?.span().contains(region.start) {
            return Err(MemError::access(format!(
                "region {} does not belong to area {}",
                region, area_id
            )));
        }

        self.symbols.reset(handle)?;
        self.area_mut(area_id)?.reclaim(region);
        debug!("free pid={} rgid={} {}", self.pid, handle, region);
        Ok(FreeStatus::Released(region))
    }

    /// Grow `area_id` by `increment` rounded up to whole pages.
    ///
    /// Frames are granted from RAM, zero-filled and mapped at the area's current end; the new
    /// span becomes one hole. On any failure nothing of the growth stays visible.
    pub fn grow_area(&mut self, area_id: usize, increment: usize) -> MemResult<Region> {
        let page_size = self.config.page_size;
        let amount = self.config.page_align(increment)?;
        let pages = amount / page_size;
        if pages == 0 {
            return Err(MemError::access("zero-size growth"));
        }
        debug!(
            "inc_vma_limit pid={} +{}B ({} pages)",
            self.pid, amount, pages
        );

        let map_start = self.area(area_id)?.end;
        let span = match map_start.checked_add(amount) {
            Some(end) if end <= self.config.address_limit() => Region::new(map_start, end),
            _ => {
                warn!("pid={} growth by {} from {} exceeds the page table", self.pid, amount, map_start);
                return Err(MemError::access(format!(
                    "growth by {} from {} exceeds address limit {}",
                    amount,
                    map_start,
                    self.config.address_limit()
                )));
            }
        };
        self.validate_overlap(area_id, span.start, span.end)?;

        if self.config.evict_on_grow {
            self.make_room(pages)?;
        }
        let frames = frame::alloc_frames(&mut self.devices.ram, pages)?;

        let start_pgn = map_start / page_size;
        let mapped = frames
            .iter()
            .try_for_each(|&f| self.devices.ram.fill_frame(f, 0))
            .and_then(|_| self.page_table.map_range(start_pgn, &frames));
        if let Err(e) = mapped {
            frame::release_frames(&mut self.devices.ram, frames);
            return Err(e);
        }
        for pgn in start_pgn..start_pgn + pages {
            self.victims.admit(pgn);
        }

        let area = self.area_mut(area_id)?;
        area.extend(span);
        debug!("vma={} new vm_end={}", area_id, area.end);
        Ok(span)
    }

    /// A growth span must start at or past the area's end and must not run into another area.
    pub fn validate_overlap(&self, area_id: usize, start: usize, end: usize) -> MemResult<()> {
        let proposed = Region::new(start, end);
        self.area(area_id)?.validate_overlap(proposed)?;
        for other in self.areas.iter().filter(|a| a.id != area_id) {
            let occupied = Region::new(other.start, other.end.max(other.start + 1));
            if proposed.overlaps(&occupied) {
                warn!("pid={} span {} runs into vma={}", self.pid, proposed, other.id);
                return Err(MemError::access(format!(
                    "span {} overlaps area {}",
                    proposed, other.id
                )));
            }
        }
        Ok(())
    }

    /// Hand every frame and swap slot back to its device and forget all mappings.
    pub fn release(&mut self) {
        for (_, entry) in self.page_table.mapped() {
            match entry {
                PageEntry::Resident { frame, .. } => self.devices.ram.put_free_frame(frame),
                PageEntry::Swapped { swap_type, offset } => {
                    if let Some(dev) = self.devices.swap.get_mut(swap_type) {
                        dev.put_free_frame(offset);
                    }
                }
                PageEntry::Absent => {}
            }
        }
        self.page_table.clear();
        self.victims.clear();
        self.symbols.clear();
        self.areas.truncate(1);
        self.areas[0].reset();
        debug!("pid={} released all memory", self.pid);
    }

    /// Packed page-table entries covering `[start, end)`; `end` defaults to area 0's limit.
    pub fn page_table_dump(&self, start: usize, end: Option<usize>) -> MemResult<Vec<String>> {
        let page_size = self.config.page_size;
        let end = end.unwrap_or(self.areas[0].end);
        self.page_table.dump(start / page_size, end.div_ceil(page_size))
    }

    /// Encode `op` into a register frame and hand it to the syscall service.
    pub(crate) fn sys_call(&mut self, op: SysMemOp) -> MemResult<()> {
        let regs = op.to_regs()?;
        trace!("pid={} sysmem {:?}", self.pid, regs);
        self.sys.sys_mem(&mut self.devices, regs)
    }

    pub(crate) fn area_mut(&mut self, id: usize) -> MemResult<&mut VmArea> {
        self.areas.get_mut(id).ok_or_else(|| Self::no_area(id))
    }

    fn no_area(id: usize) -> MemError {
        MemError::access(format!("no area {}", id))
    }
}

impl std::fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressSpace")
            .field("pid", &self.pid)
            .field("areas", &self.areas)
            .field("victims", &self.victims)
            .field("ram_free", &self.devices.ram.free_frame_count())
            .finish_non_exhaustive()
    }
}
