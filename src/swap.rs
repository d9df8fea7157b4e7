//! FIFO page replacement.
//!
//! Every page that becomes resident is appended to the [`VictimQueue`]; the head is always the
//! next page to evict, whatever has been accessed since. A fault on a non-resident page evicts
//! the head to the active swap device and reuses its frame for the faulting page.

use std::collections::VecDeque;

use log::{debug, warn};

use crate::address_space::AddressSpace;
use crate::error::{MemError, MemResult};
use crate::pte::PageEntry;
use crate::syscall::{FrameRef, SysMemOp};

/// Resident page numbers in admission order.
#[derive(Debug, Clone, Default)]
pub struct VictimQueue {
    pages: VecDeque<usize>,
}

impl VictimQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, pgn: usize) {
        self.pages.push_back(pgn);
    }

    /// Next eviction candidate.
    pub fn peek(&self) -> Option<usize> {
        self.pages.front().copied()
    }

    pub fn pop(&mut self) -> Option<usize> {
        self.pages.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &usize> {
        self.pages.iter()
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }
}

/// A victim already copied to swap whose page-table entry has not been switched yet.
#[derive(Debug, Clone, Copy)]
struct Eviction {
    pgn: usize,
    frame: usize,
    swap_type: usize,
    slot: usize,
}

impl AddressSpace {
    /// Make `pgn` resident and return its frame.
    ///
    /// A resident page is returned as is. Otherwise the FIFO head is swapped out and its frame
    /// takes the faulting page: swapped pages are copied back in (their slot is released),
    /// never-mapped pages get a zeroed frame. Failures leave both page tables untouched.
    pub fn resolve(&mut self, pgn: usize) -> MemResult<usize> {
        let target = self.page_table.get(pgn)?;
        debug!("pg_getpage pid={} pgn={}", self.pid, pgn);
        if let PageEntry::Resident { frame, .. } = target {
            return Ok(frame);
        }

        debug!("page fault pid={} pgn={} ({:?})", self.pid, pgn, target);
        let eviction = self.stage_eviction().map_err(|e| match e {
            MemError::FaultFailure(_) => MemError::FaultFailure(pgn),
            other => other,
        })?;

        let admitted = match target {
            PageEntry::Swapped { swap_type, offset } => self.sys_call(SysMemOp::SwapCopy {
                src: FrameRef::swap(swap_type, offset),
                dst: FrameRef::ram(eviction.frame),
            }),
            _ => self.devices.ram.fill_frame(eviction.frame, 0),
        };
        if let Err(e) = admitted {
            self.abort_eviction(&eviction);
            return Err(e);
        }

        self.commit_eviction(&eviction)?;
        if let PageEntry::Swapped { swap_type, offset } = target {
            if let Some(dev) = self.devices.swap.get_mut(swap_type) {
                dev.put_free_frame(offset);
            }
        }
        self.page_table.set_frame(pgn, eviction.frame)?;
        self.victims.admit(pgn);
        debug!("pgn={} now in fpn={}", pgn, eviction.frame);
        Ok(eviction.frame)
    }

    /// Evict FIFO victims until RAM has `pages` free frames.
    ///
    /// Checks that enough victims and swap slots exist before the first eviction.
    pub(crate) fn make_room(&mut self, pages: usize) -> MemResult<()> {
        let free = self.devices.ram.free_frame_count();
        if free >= pages {
            return Ok(());
        }
        let needed = pages - free;
        if self.victims.len() < needed
            || self.devices.active_swap_mut().free_frame_count() < needed
        {
            warn!(
                "pid={} cannot evict {} pages ({} resident)",
                self.pid,
                needed,
                self.victims.len()
            );
            return Err(MemError::FrameExhausted);
        }
        for _ in 0..needed {
            let eviction = self.stage_eviction()?;
            self.commit_eviction(&eviction)?;
            self.devices.ram.put_free_frame(eviction.frame);
        }
        Ok(())
    }

    /// Copy the FIFO head's frame into a fresh slot of the active swap device.
    fn stage_eviction(&mut self) -> MemResult<Eviction> {
        let Some(victim) = self.victims.peek() else {
            warn!("pid={} no victim page to evict", self.pid);
            return Err(MemError::FaultFailure(0));
        };
        let frame = match self.page_table.get(victim)? {
            PageEntry::Resident { frame, .. } => frame,
            other => {
                warn!("victim pgn={} is not resident: {:?}", victim, other);
                return Err(MemError::FaultFailure(victim));
            }
        };

        let swap_type = self.devices.active_swap;
        let slot = self.devices.active_swap_mut().get_free_frame()?;
        debug!(
            "swap victim pgn={} (fpn={}) -> swap{}:{}",
            victim, frame, swap_type, slot
        );
        let copied = self.sys_call(SysMemOp::SwapCopy {
            src: FrameRef::ram(frame),
            dst: FrameRef::swap(swap_type, slot),
        });
        let eviction = Eviction { pgn: victim, frame, swap_type, slot };
        if let Err(e) = copied {
            self.abort_eviction(&eviction);
            return Err(e);
        }
        Ok(eviction)
    }

    fn commit_eviction(&mut self, eviction: &Eviction) -> MemResult<()> {
        self.page_table.set_swap(eviction.pgn, eviction.swap_type, eviction.slot)?;
        self.victims.pop();
        Ok(())
    }

    fn abort_eviction(&mut self, eviction: &Eviction) {
        if let Some(dev) = self.devices.swap.get_mut(eviction.swap_type) {
            dev.put_free_frame(eviction.slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemConfig;
    use crate::syscall::{Devices, SysMem, SYSMEM_SWP_OP};

    fn small(frames: usize) -> AddressSpace {
        AddressSpace::new(1, &MemConfig::small(4, frames)).unwrap()
    }

    /// Fails every swap copy once `budget` runs out.
    struct FlakySysMem {
        budget: usize,
    }

    impl SysMem for FlakySysMem {
        fn sys_mem(&mut self, devices: &mut Devices, regs: [u32; 4]) -> MemResult<()> {
            if regs[0] == SYSMEM_SWP_OP {
                if self.budget == 0 {
                    return Err(MemError::BadSyscall("device offline".to_string()));
                }
                self.budget -= 1;
            }
            crate::syscall::DirectSysMem.sys_mem(devices, regs)
        }
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut q = VictimQueue::new();
        q.admit(4);
        q.admit(1);
        q.admit(9);
        assert_eq!(q.peek(), Some(4));
        assert_eq!(q.pop(), Some(4));
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.len(), 1);
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_resident_page_is_a_hit() {
        let mut mm = small(4);
        mm.grow_area(0, 8).unwrap();
        assert_eq!(mm.resolve(1).unwrap(), 1);
        assert_eq!(mm.swap(0).unwrap().free_frame_count(), 4);
        assert_eq!(mm.victims().iter().copied().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_fault_without_victim_fails() {
        let mut mm = small(4);
        assert_eq!(mm.resolve(3), Err(MemError::FaultFailure(3)));
        assert_eq!(mm.page_entry(3).unwrap(), PageEntry::Absent);
    }

    #[test]
    fn test_fault_on_absent_page_evicts_head() {
        let mut mm = small(2);
        mm.grow_area(0, 8).unwrap();
        mm.devices.ram.fill_frame(0, 0xaa).unwrap();

        let frame = mm.resolve(5).unwrap();
        assert_eq!(frame, 0);
        assert_eq!(mm.page_entry(0).unwrap(), PageEntry::Swapped { swap_type: 0, offset: 0 });
        assert_eq!(mm.page_entry(5).unwrap(), PageEntry::Resident { frame: 0, dirty: false });
        assert_eq!(mm.victims().iter().copied().collect::<Vec<_>>(), vec![1, 5]);
        // Evicted contents live on swap, the reused frame is zeroed.
        assert_eq!(mm.devices.swap[0].read(0).unwrap(), 0xaa);
        assert_eq!(mm.devices.ram.read(0).unwrap(), 0);
    }

    #[test]
    fn test_swap_in_restores_contents_and_frees_slot() {
        let mut mm = small(2);
        mm.grow_area(0, 8).unwrap();
        mm.devices.ram.fill_frame(0, 0x11).unwrap();
        mm.devices.ram.fill_frame(1, 0x22).unwrap();

        mm.resolve(2).unwrap(); // evicts page 0
        assert_eq!(mm.swap(0).unwrap().free_frame_count(), 1);

        let frame = mm.resolve(0).unwrap(); // evicts page 1, brings page 0 back
        assert_eq!(frame, 1);
        assert_eq!(mm.devices.ram.read(4).unwrap(), 0x11);
        assert_eq!(mm.page_entry(1).unwrap(), PageEntry::Swapped { swap_type: 0, offset: 1 });
        // Slot 0 held page 0 and is free again; slot 1 now holds page 1.
        assert_eq!(mm.swap(0).unwrap().free_frame_count(), 1);
        assert_eq!(mm.swap(0).unwrap().free_frames().next(), Some(0));
        assert_eq!(mm.victims().iter().copied().collect::<Vec<_>>(), vec![2, 0]);
    }

    #[test]
    fn test_fifo_ignores_recency() {
        let mut mm = small(3);
        mm.grow_area(0, 12).unwrap();
        // Touch page 0 repeatedly; it is still the first to go.
        for _ in 0..5 {
            mm.resolve(0).unwrap();
        }
        mm.resolve(3).unwrap();
        assert!(!mm.page_entry(0).unwrap().is_resident());
        mm.resolve(4).unwrap();
        assert!(!mm.page_entry(1).unwrap().is_resident());
        assert!(mm.page_entry(2).unwrap().is_resident());
    }

    #[test]
    fn test_evictions_go_to_active_swap() {
        let mut config = MemConfig::small(4, 1);
        config.swap_sizes = vec![4, 8];
        let mut mm = AddressSpace::new(1, &config).unwrap();
        mm.grow_area(0, 4).unwrap();
        mm.set_active_swap(1).unwrap();
        mm.resolve(1).unwrap();
        assert_eq!(mm.page_entry(0).unwrap(), PageEntry::Swapped { swap_type: 1, offset: 0 });
        // Bringing page 0 back reads from device 1 and returns its slot there.
        mm.resolve(0).unwrap();
        assert_eq!(mm.swap(1).unwrap().free_frame_count(), 1);
        assert_eq!(mm.swap(0).unwrap().free_frame_count(), 1);
    }

    #[test]
    fn test_swap_exhaustion_fails_cleanly() {
        let mut config = MemConfig::small(4, 1);
        config.swap_sizes = vec![4];
        let mut mm = AddressSpace::new(1, &config).unwrap();
        mm.grow_area(0, 4).unwrap();
        mm.resolve(1).unwrap(); // page 0 takes the only swap slot
        assert_eq!(mm.resolve(2), Err(MemError::FrameExhausted));
        assert!(mm.page_entry(1).unwrap().is_resident());
        assert_eq!(mm.page_entry(2).unwrap(), PageEntry::Absent);
        assert_eq!(mm.victims().len(), 1);
    }

    #[test]
    fn test_failed_swap_in_leaves_tables_untouched() {
        let mut config = MemConfig::small(4, 1);
        config.swap_sizes = vec![8];
        let mut mm =
            AddressSpace::with_sysmem(1, &config, Box::new(FlakySysMem { budget: 2 })).unwrap();
        mm.grow_area(0, 4).unwrap();
        mm.resolve(1).unwrap(); // one copy: page 0 out
        // Next fault: copy page 1 out succeeds, copy page 0 in fails.
        assert!(matches!(mm.resolve(0), Err(MemError::BadSyscall(_))));
        assert_eq!(mm.page_entry(0).unwrap(), PageEntry::Swapped { swap_type: 0, offset: 0 });
        assert_eq!(mm.page_entry(1).unwrap(), PageEntry::Resident { frame: 0, dirty: false });
        assert_eq!(mm.victims().iter().copied().collect::<Vec<_>>(), vec![1]);
        // The slot staged for page 1 went back.
        assert_eq!(mm.swap(0).unwrap().free_frame_count(), 1);
    }

    #[test]
    fn test_make_room_evicts_only_what_is_needed() {
        let mut config = MemConfig::small(4, 3);
        config.swap_sizes = vec![16];
        let mut mm = AddressSpace::new(1, &config).unwrap();
        mm.grow_area(0, 8).unwrap(); // frames 0, 1; frame 2 free
        mm.make_room(2).unwrap();
        assert_eq!(mm.ram().free_frame_count(), 2);
        assert!(!mm.page_entry(0).unwrap().is_resident());
        assert!(mm.page_entry(1).unwrap().is_resident());
    }

    #[test]
    fn test_make_room_checks_before_evicting() {
        let mut mm = small(2);
        mm.grow_area(0, 8).unwrap();
        assert_eq!(mm.make_room(3), Err(MemError::FrameExhausted));
        assert!(mm.page_entry(0).unwrap().is_resident());
        assert!(mm.page_entry(1).unwrap().is_resident());
    }
}
