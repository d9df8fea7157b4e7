use std::collections::VecDeque;
use std::fmt;

use crate::error::{MemError, MemResult};

/// Half-open virtual span `[start, end)`. `start == end` means unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    pub start: usize,
    pub end: usize,
}

impl Region {
    pub fn new(start: usize, end: usize) -> Self {
        Region { start, end }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        self.start <= addr && addr < self.end
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{})", self.start, self.end)
    }
}

/// Unordered holes of an area. New holes go to the front; nothing is ever coalesced.
#[derive(Debug, Clone, Default)]
pub struct FreeRegionList {
    holes: VecDeque<Region>,
}

impl FreeRegionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a hole. Empty spans are ignored.
    pub fn push(&mut self, hole: Region) -> bool {
        if hole.is_empty() {
            return false;
        }
        self.holes.push_front(hole);
        true
    }

    /// First-fit: carve `size` bytes off the head of the first hole large enough, in list order.
    /// A hole consumed entirely is dropped from the list.
    pub fn take_first_fit(&mut self, size: usize) -> Option<Region> {
        let index = self.holes.iter().position(|hole| hole.len() >= size)?;
        let hole = &mut self.holes[index];
        let carved = Region::new(hole.start, hole.start + size);
        hole.start += size;
        if hole.is_empty() {
            self.holes.remove(index);
        }
        Some(carved)
    }

    pub fn len(&self) -> usize {
        self.holes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.holes.iter()
    }

    pub fn total_bytes(&self) -> usize {
        self.holes.iter().map(Region::len).sum()
    }

    pub fn clear(&mut self) {
        self.holes.clear();
    }
}

impl fmt::Display for FreeRegionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for hole in &self.holes {
            write!(f, "{}->", hole)?;
        }
        write!(f, "NULL")
    }
}

/// Fixed-size table mapping a region handle to its bounds.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    slots: Vec<Region>,
}

impl SymbolTable {
    pub fn new(size: usize) -> Self {
        SymbolTable { slots: vec![Region::default(); size] }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, handle: usize) -> MemResult<Region> {
        self.slots.get(handle).copied().ok_or(MemError::InvalidHandle(handle))
    }

    pub fn set(&mut self, handle: usize, region: Region) -> MemResult<()> {
        let slot = self.slots.get_mut(handle).ok_or(MemError::InvalidHandle(handle))?;
        *slot = region;
        Ok(())
    }

    /// Reset a slot to empty and hand back its old bounds.
    pub fn reset(&mut self, handle: usize) -> MemResult<Region> {
        let slot = self.slots.get_mut(handle).ok_or(MemError::InvalidHandle(handle))?;
        Ok(std::mem::take(slot))
    }

    /// Live (non-empty) regions with their handles.
    pub fn live(&self) -> impl Iterator<Item = (usize, Region)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_empty())
            .map(|(h, r)| (h, *r))
    }

    pub fn clear(&mut self) {
        self.slots.fill(Region::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_basics() {
        let r = Region::new(4, 10);
        assert_eq!(r.len(), 6);
        assert!(!r.is_empty());
        assert!(r.contains(4));
        assert!(r.contains(9));
        assert!(!r.contains(10));
        assert!(Region::new(3, 3).is_empty());
        assert_eq!(r.to_string(), "[4..10)");
    }

    #[test]
    fn test_overlap() {
        let a = Region::new(0, 4);
        assert!(a.overlaps(&Region::new(3, 8)));
        assert!(!a.overlaps(&Region::new(4, 8)));
        assert!(!a.overlaps(&Region::new(2, 2)));
    }

    #[test]
    fn test_push_prepends_and_skips_empty() {
        let mut list = FreeRegionList::new();
        assert!(list.push(Region::new(0, 4)));
        assert!(list.push(Region::new(8, 12)));
        assert!(!list.push(Region::new(5, 5)));
        let order: Vec<Region> = list.iter().copied().collect();
        assert_eq!(order, vec![Region::new(8, 12), Region::new(0, 4)]);
        assert_eq!(list.to_string(), "[8..12)->[0..4)->NULL");
    }

    #[test]
    fn test_first_fit_in_list_order() {
        let mut list = FreeRegionList::new();
        list.push(Region::new(0, 16)); // large, but later in the list
        list.push(Region::new(20, 22)); // too small
        list.push(Region::new(30, 34)); // fits, first in list

        assert_eq!(list.take_first_fit(3), Some(Region::new(30, 33)));
        // Remainder [33..34) stays where it was.
        assert_eq!(list.iter().next(), Some(&Region::new(33, 34)));

        assert_eq!(list.take_first_fit(4), Some(Region::new(0, 4)));
        assert_eq!(list.take_first_fit(64), None);
    }

    #[test]
    fn test_exact_fit_removes_hole() {
        let mut list = FreeRegionList::new();
        list.push(Region::new(0, 4));
        list.push(Region::new(8, 10));
        assert_eq!(list.take_first_fit(2), Some(Region::new(8, 10)));
        assert_eq!(list.len(), 1);
        assert_eq!(list.total_bytes(), 4);
    }

    #[test]
    fn test_no_coalescing() {
        let mut list = FreeRegionList::new();
        list.push(Region::new(0, 4));
        list.push(Region::new(4, 8));
        assert_eq!(list.len(), 2);
        // Adjacent holes are not merged, so a request spanning both misses.
        assert_eq!(list.take_first_fit(6), None);
    }

    #[test]
    fn test_symbol_table_bounds() {
        let mut table = SymbolTable::new(3);
        assert_eq!(table.get(3), Err(MemError::InvalidHandle(3)));
        assert_eq!(table.set(5, Region::new(0, 1)), Err(MemError::InvalidHandle(5)));
        assert!(table.get(2).unwrap().is_empty());
    }

    #[test]
    fn test_symbol_table_reset() {
        let mut table = SymbolTable::new(3);
        table.set(1, Region::new(4, 8)).unwrap();
        assert_eq!(table.live().collect::<Vec<_>>(), vec![(1, Region::new(4, 8))]);
        assert_eq!(table.reset(1).unwrap(), Region::new(4, 8));
        assert!(table.get(1).unwrap().is_empty());
        assert_eq!(table.live().count(), 0);
    }
}
