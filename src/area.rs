use log::{trace, warn};

use crate::error::{MemError, MemResult};
use crate::region::{FreeRegionList, Region};

/// A growable virtual-address range. Grows upward only.
#[derive(Debug, Clone)]
pub struct VmArea {
    pub id: usize,
    pub start: usize,
    /// Current limit; everything in `[start, end)` is mapped.
    pub end: usize,
    /// Growth cursor.
    pub sbrk: usize,
    free_list: FreeRegionList,
}

impl VmArea {
    pub fn new(id: usize, start: usize) -> Self {
        VmArea { id, start, end: start, sbrk: start, free_list: FreeRegionList::new() }
    }

    #[inline]
    pub fn span(&self) -> Region {
        Region::new(self.start, self.end)
    }

    pub fn free_list(&self) -> &FreeRegionList {
        &self.free_list
    }

    /// First-fit carve of `size` bytes out of the free-region list.
    pub fn carve(&mut self, size: usize) -> Option<Region> {
        let carved = self.free_list.take_first_fit(size)?;
        trace!(
            "vma={} take {} remain {}",
            self.id,
            carved,
            self.free_list
        );
        Some(carved)
    }

    /// Put a released region back as a hole.
    pub fn reclaim(&mut self, region: Region) {
        self.free_list.push(region);
        trace!("vma={} freerg {}", self.id, self.free_list);
    }

    /// A proposed span is only acceptable if it begins at or past the current end.
    pub fn validate_overlap(&self, proposed: Region) -> MemResult<()> {
        if proposed.start < self.end {
            warn!(
                "vma={} rejects {}: overlaps allocated space below {}",
                self.id, proposed, self.end
            );
            return Err(MemError::access(format!(
                "span {} overlaps area {} ending at {}",
                proposed, self.id, self.end
            )));
        }
        Ok(())
    }

    /// Publish a freshly mapped span as one hole and move both cursors past it.
    pub fn extend(&mut self, mapped: Region) {
        debug_assert_eq!(mapped.start, self.end);
        self.free_list.push(mapped);
        self.end = mapped.end;
        self.sbrk = self.end;
    }

    /// Drop all space; the area becomes empty at its original start.
    pub fn reset(&mut self) {
        self.end = self.start;
        self.sbrk = self.start;
        self.free_list.clear();
    }
}
