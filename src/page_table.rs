use log::debug;

use crate::error::{MemError, MemResult};
use crate::pte::PageEntry;

/// Per-address-space page table, indexed by virtual page number.
#[derive(Debug, Clone)]
pub struct PageTable {
    entries: Vec<PageEntry>,
}

impl PageTable {
    pub fn new(max_pages: usize) -> Self {
        PageTable { entries: vec![PageEntry::Absent; max_pages] }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, pgn: usize) -> MemResult<PageEntry> {
        self.entries.get(pgn).copied().ok_or_else(|| Self::out_of_range(pgn))
    }

    pub fn set(&mut self, pgn: usize, entry: PageEntry) -> MemResult<()> {
        let slot = self.entries.get_mut(pgn).ok_or_else(|| Self::out_of_range(pgn))?;
        *slot = entry;
        Ok(())
    }

    /// Point `pgn` at a RAM frame, clean.
    pub fn set_frame(&mut self, pgn: usize, frame: usize) -> MemResult<()> {
        self.set(pgn, PageEntry::Resident { frame, dirty: false })
    }

    /// Record that `pgn` now lives on swap.
    pub fn set_swap(&mut self, pgn: usize, swap_type: usize, offset: usize) -> MemResult<()> {
        self.set(pgn, PageEntry::Swapped { swap_type, offset })
    }

    /// Set the dirty bit of a resident page. No-op for other states.
    pub fn mark_dirty(&mut self, pgn: usize) -> MemResult<()> {
        let slot = self.entries.get_mut(pgn).ok_or_else(|| Self::out_of_range(pgn))?;
        if let PageEntry::Resident { dirty, .. } = slot {
            *dirty = true;
        }
        Ok(())
    }

    /// Map consecutive pages from `start_pgn` onto `frames`.
    ///
    /// All target pages must be absent and inside the table; nothing is written otherwise.
    pub fn map_range(&mut self, start_pgn: usize, frames: &[usize]) -> MemResult<()> {
        let end_pgn = start_pgn + frames.len();
        if end_pgn > self.entries.len() {
            return Err(MemError::access(format!(
                "mapping pages {}..{} exceeds page table of {} entries",
                start_pgn,
                end_pgn,
                self.entries.len()
            )));
        }
        if let Some(pgn) = (start_pgn..end_pgn).find(|&p| self.entries[p] != PageEntry::Absent) {
            return Err(MemError::access(format!("page {} is already mapped", pgn)));
        }
        for (pgn, &frame) in (start_pgn..end_pgn).zip(frames) {
            debug!("map pgn={} -> fpn={}", pgn, frame);
            self.entries[pgn] = PageEntry::Resident { frame, dirty: false };
        }
        Ok(())
    }

    /// Every non-absent entry with its page number.
    pub fn mapped(&self) -> impl Iterator<Item = (usize, PageEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| **e != PageEntry::Absent)
            .map(|(pgn, e)| (pgn, *e))
    }

    pub fn clear(&mut self) {
        self.entries.fill(PageEntry::Absent);
    }

    /// Packed entries for pages `start_pgn..end_pgn`, one `"{offset:08}: {word:08x}"` line each,
    /// where offset is the entry's byte offset in a table of 32-bit words.
    pub fn dump(&self, start_pgn: usize, end_pgn: usize) -> MemResult<Vec<String>> {
        let end_pgn = end_pgn.min(self.entries.len());
        let mut lines = Vec::new();
        for pgn in start_pgn..end_pgn {
            let word = self.entries[pgn].encode()?;
            lines.push(format!("{:08}: {:08x}", pgn * 4, word));
        }
        Ok(lines)
    }

    fn out_of_range(pgn: usize) -> MemError {
        MemError::access(format!("page {} outside the page table", pgn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_is_absent() {
        let pt = PageTable::new(8);
        assert_eq!(pt.len(), 8);
        assert!((0..8).all(|p| pt.get(p).unwrap() == PageEntry::Absent));
        assert_eq!(pt.mapped().count(), 0);
    }

    #[test]
    fn test_out_of_range() {
        let mut pt = PageTable::new(4);
        assert!(matches!(pt.get(4), Err(MemError::InvalidAccess(_))));
        assert!(pt.set_frame(4, 0).is_err());
        assert!(pt.mark_dirty(9).is_err());
    }

    #[test]
    fn test_state_transitions() {
        let mut pt = PageTable::new(4);
        pt.set_frame(2, 7).unwrap();
        assert_eq!(pt.get(2).unwrap(), PageEntry::Resident { frame: 7, dirty: false });
        pt.mark_dirty(2).unwrap();
        assert_eq!(pt.get(2).unwrap(), PageEntry::Resident { frame: 7, dirty: true });
        pt.set_swap(2, 0, 3).unwrap();
        assert_eq!(pt.get(2).unwrap(), PageEntry::Swapped { swap_type: 0, offset: 3 });
        // Dirty only applies to resident pages.
        pt.mark_dirty(2).unwrap();
        assert_eq!(pt.get(2).unwrap(), PageEntry::Swapped { swap_type: 0, offset: 3 });
    }

    #[test]
    fn test_map_range() {
        let mut pt = PageTable::new(8);
        pt.map_range(2, &[5, 1, 4]).unwrap();
        assert_eq!(pt.get(2).unwrap().frame(), Some(5));
        assert_eq!(pt.get(3).unwrap().frame(), Some(1));
        assert_eq!(pt.get(4).unwrap().frame(), Some(4));
        assert_eq!(pt.mapped().map(|(p, _)| p).collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn test_map_range_is_all_or_nothing() {
        let mut pt = PageTable::new(4);
        assert!(pt.map_range(2, &[0, 1, 2]).is_err());
        assert_eq!(pt.mapped().count(), 0);

        pt.set_frame(1, 9).unwrap();
        assert!(pt.map_range(0, &[0, 1]).is_err());
        assert_eq!(pt.get(0).unwrap(), PageEntry::Absent);
    }

    #[test]
    fn test_dump_format() {
        let mut pt = PageTable::new(4);
        pt.set_frame(0, 1).unwrap();
        pt.set_swap(1, 0, 2).unwrap();
        let lines = pt.dump(0, 10).unwrap();
        assert_eq!(
            lines,
            vec![
                "00000000: 80000001".to_string(),
                "00000004: c0000040".to_string(),
                "00000008: 00000000".to_string(),
                "00000012: 00000000".to_string(),
            ]
        );
    }

    #[test]
    fn test_clear() {
        let mut pt = PageTable::new(4);
        pt.map_range(0, &[0, 1]).unwrap();
        pt.clear();
        assert_eq!(pt.mapped().count(), 0);
    }
}
