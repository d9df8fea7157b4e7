use std::fmt::Write as _;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::{MemError, MemResult};

/// How a device reaches a byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Direct indexing into storage.
    #[default]
    Random,
    /// A cursor walks from zero to the target before every access.
    Sequential,
}

/// A physical memory device: RAM or a swap backing store.
///
/// Storage is split into `capacity / page_size` frames. Free frames are kept on a LIFO list;
/// after formatting, frames are handed out in ascending order.
#[derive(Debug)]
pub struct PhysicalMemory {
    storage: Vec<u8>,
    page_size: usize,
    free_frames: Vec<usize>,
    access: AccessMode,
    cursor: usize,
}

impl PhysicalMemory {
    /// Create a zeroed device and format it into frames of `page_size` bytes.
    pub fn new(capacity: usize, page_size: usize, access: AccessMode) -> MemResult<Self> {
        let mut device = PhysicalMemory {
            storage: vec![0u8; capacity],
            page_size,
            free_frames: Vec::new(),
            access,
            cursor: 0,
        };
        device.format(page_size)?;
        Ok(device)
    }

    /// Partition capacity into frames and rebuild the free-frame list.
    pub fn format(&mut self, page_size: usize) -> MemResult<()> {
        if page_size == 0 || self.storage.len() / page_size == 0 {
            return Err(MemError::InvalidConfig(format!(
                "cannot format {} bytes into frames of {} bytes",
                self.storage.len(),
                page_size
            )));
        }
        self.page_size = page_size;
        let frames = self.storage.len() / page_size;
        // Stack top is the list head, so frame 0 is handed out first.
        self.free_frames = (0..frames).rev().collect();
        Ok(())
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.storage.len() / self.page_size
    }

    #[inline]
    pub fn access_mode(&self) -> AccessMode {
        self.access
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Read one byte.
    pub fn read(&mut self, address: usize) -> MemResult<u8> {
        self.check_address(address)?;
        let value = match self.access {
            AccessMode::Random => self.storage[address],
            AccessMode::Sequential => {
                self.move_cursor(address);
                self.storage[self.cursor]
            }
        };
        trace!("MEM[R] addr={} -> {}", address, value);
        Ok(value)
    }

    /// Write one byte.
    pub fn write(&mut self, address: usize, value: u8) -> MemResult<()> {
        self.check_address(address)?;
        trace!("MEM[W] addr={} val={}", address, value);
        match self.access {
            AccessMode::Random => self.storage[address] = value,
            AccessMode::Sequential => {
                self.move_cursor(address);
                self.storage[self.cursor] = value;
            }
        }
        Ok(())
    }

    /// Fill every byte of `frame` with `value`.
    pub fn fill_frame(&mut self, frame: usize, value: u8) -> MemResult<()> {
        let base = self.frame_base(frame)?;
        self.storage[base..base + self.page_size].fill(value);
        Ok(())
    }

    /// Pop a frame off the free list.
    pub fn get_free_frame(&mut self) -> MemResult<usize> {
        self.free_frames.pop().ok_or(MemError::FrameExhausted)
    }

    /// Push a frame back on the free list.
    pub fn put_free_frame(&mut self, frame: usize) {
        debug_assert!(frame < self.num_frames());
        self.free_frames.push(frame);
    }

    #[inline]
    pub fn free_frame_count(&self) -> usize {
        self.free_frames.len()
    }

    /// Free frames in the order they will be handed out.
    pub fn free_frames(&self) -> impl Iterator<Item = usize> + '_ {
        self.free_frames.iter().rev().copied()
    }

    /// Starting byte address of a frame.
    pub fn frame_base(&self, frame: usize) -> MemResult<usize> {
        if frame >= self.num_frames() {
            return Err(MemError::access(format!(
                "frame {} beyond device of {} frames",
                frame,
                self.num_frames()
            )));
        }
        Ok(frame * self.page_size)
    }

    /// Hex listing of every non-zero byte.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (addr, &byte) in self.storage.iter().enumerate() {
            if byte != 0 {
                let _ = writeln!(out, "{:08x}: {:02x}", addr, byte);
            }
        }
        out
    }

    fn check_address(&self, address: usize) -> MemResult<()> {
        if address >= self.storage.len() {
            return Err(MemError::access(format!(
                "physical address {} beyond device capacity {}",
                address,
                self.storage.len()
            )));
        }
        Ok(())
    }

    /// Walk the cursor from zero toward `offset`, one step at a time.
    fn move_cursor(&mut self, offset: usize) {
        let capacity = self.storage.len();
        self.cursor = 0;
        let mut steps = 0;
        while steps < offset && steps < capacity {
            self.cursor = (self.cursor + 1) % capacity;
            steps += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_initialization() {
        let mut dev = PhysicalMemory::new(16, 4, AccessMode::Random).unwrap();
        assert_eq!(dev.capacity(), 16);
        assert_eq!(dev.num_frames(), 4);
        assert_eq!(dev.free_frame_count(), 4);
        assert_eq!(dev.read(0).unwrap(), 0);
        assert_eq!(dev.read(15).unwrap(), 0);
    }

    #[test]
    fn test_format_rejects_tiny_device() {
        assert!(PhysicalMemory::new(3, 4, AccessMode::Random).is_err());
        assert!(PhysicalMemory::new(16, 0, AccessMode::Random).is_err());
    }

    #[test]
    fn test_read_write() {
        let mut dev = PhysicalMemory::new(16, 4, AccessMode::Random).unwrap();
        dev.write(10, 42).unwrap();
        assert_eq!(dev.read(10).unwrap(), 42);
        dev.write(10, 255).unwrap();
        assert_eq!(dev.read(10).unwrap(), 255);
    }

    #[test]
    fn test_out_of_range_access() {
        let mut dev = PhysicalMemory::new(16, 4, AccessMode::Random).unwrap();
        assert!(matches!(dev.read(16), Err(MemError::InvalidAccess(_))));
        assert!(matches!(dev.write(99, 1), Err(MemError::InvalidAccess(_))));
    }

    #[test]
    fn test_sequential_mode_moves_cursor() {
        let mut dev = PhysicalMemory::new(16, 4, AccessMode::Sequential).unwrap();
        dev.write(13, 7).unwrap();
        assert_eq!(dev.cursor(), 13);
        assert_eq!(dev.read(13).unwrap(), 7);
        assert_eq!(dev.read(2).unwrap(), 0);
        assert_eq!(dev.cursor(), 2);
    }

    #[test]
    fn test_sequential_and_random_agree() {
        let mut seq = PhysicalMemory::new(32, 8, AccessMode::Sequential).unwrap();
        let mut rnd = PhysicalMemory::new(32, 8, AccessMode::Random).unwrap();
        for addr in 0..32 {
            seq.write(addr, addr as u8 * 3).unwrap();
            rnd.write(addr, addr as u8 * 3).unwrap();
        }
        for addr in (0..32).rev() {
            assert_eq!(seq.read(addr).unwrap(), rnd.read(addr).unwrap());
        }
    }

    #[test]
    fn test_free_frames_ascending_then_lifo() {
        let mut dev = PhysicalMemory::new(16, 4, AccessMode::Random).unwrap();
        assert_eq!(dev.free_frames().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(dev.get_free_frame().unwrap(), 0);
        assert_eq!(dev.get_free_frame().unwrap(), 1);
        dev.put_free_frame(0);
        assert_eq!(dev.get_free_frame().unwrap(), 0);
        assert_eq!(dev.get_free_frame().unwrap(), 2);
    }

    #[test]
    fn test_exhaustion() {
        let mut dev = PhysicalMemory::new(8, 4, AccessMode::Random).unwrap();
        dev.get_free_frame().unwrap();
        dev.get_free_frame().unwrap();
        assert_eq!(dev.get_free_frame(), Err(MemError::FrameExhausted));
        assert_eq!(dev.free_frame_count(), 0);
    }

    #[test]
    fn test_format_resets_free_list() {
        let mut dev = PhysicalMemory::new(16, 4, AccessMode::Random).unwrap();
        dev.get_free_frame().unwrap();
        dev.format(8).unwrap();
        assert_eq!(dev.num_frames(), 2);
        assert_eq!(dev.free_frame_count(), 2);
    }

    #[test]
    fn test_fill_frame_and_frame_base() {
        let mut dev = PhysicalMemory::new(16, 4, AccessMode::Random).unwrap();
        assert_eq!(dev.frame_base(0).unwrap(), 0);
        assert_eq!(dev.frame_base(3).unwrap(), 12);
        assert!(dev.frame_base(4).is_err());

        dev.fill_frame(2, 9).unwrap();
        assert_eq!(dev.read(7).unwrap(), 0);
        assert_eq!(dev.read(8).unwrap(), 9);
        assert_eq!(dev.read(11).unwrap(), 9);
        assert_eq!(dev.read(12).unwrap(), 0);
    }

    #[test]
    fn test_dump_lists_nonzero_bytes() {
        let mut dev = PhysicalMemory::new(16, 4, AccessMode::Random).unwrap();
        assert!(dev.dump().is_empty());
        dev.write(5, 0xab).unwrap();
        assert_eq!(dev.dump(), "00000005: ab\n");
    }
}
