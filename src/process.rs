//! Public memory API used by the instruction dispatcher.

use std::fmt;

use log::debug;
use parking_lot::Mutex;

use crate::address_space::{AddressSpace, FreeStatus};
use crate::config::MemConfig;
use crate::error::MemResult;
use crate::syscall::SysMem;

/// One memory instruction of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Alloc { size: usize, handle: usize },
    Free { handle: usize },
    Read { handle: usize, offset: usize },
    Write { value: u8, handle: usize, offset: usize },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Alloc { size, handle } => write!(f, "alloc {} {}", size, handle),
            Instruction::Free { handle } => write!(f, "free {}", handle),
            Instruction::Read { handle, offset } => write!(f, "read {} {}", handle, offset),
            Instruction::Write { value, handle, offset } => {
                write!(f, "write {} {} {}", value, handle, offset)
            }
        }
    }
}

/// A process and its address space. Every operation holds the address-space lock from start to
/// finish, including any growth or fault resolution it triggers.
pub struct Process {
    pid: u32,
    mm: Mutex<AddressSpace>,
}

impl Process {
    pub fn new(pid: u32, config: &MemConfig) -> MemResult<Self> {
        Ok(Process { pid, mm: Mutex::new(AddressSpace::new(pid, config)?) })
    }

    pub fn with_sysmem(pid: u32, config: &MemConfig, sys: Box<dyn SysMem>) -> MemResult<Self> {
        Ok(Process { pid, mm: Mutex::new(AddressSpace::with_sysmem(pid, config, sys)?) })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Allocate `size` bytes in the heap area under `handle`; returns the region's start.
    pub fn alloc(&self, size: usize, handle: usize) -> MemResult<usize> {
        let mut mm = self.mm.lock();
        let addr = mm.alloc(0, handle, size)?;
        debug!("pid={} alloc rgid={} -> {}", self.pid, handle, addr);
        Ok(addr)
    }

    pub fn free(&self, handle: usize) -> MemResult<FreeStatus> {
        self.mm.lock().free(0, handle)
    }

    pub fn read(&self, handle: usize, offset: usize) -> MemResult<u8> {
        let mut mm = self.mm.lock();
        let addr = mm.region_address(handle, offset)?;
        mm.read_byte(addr)
    }

    pub fn write(&self, value: u8, handle: usize, offset: usize) -> MemResult<()> {
        let mut mm = self.mm.lock();
        let addr = mm.region_address(handle, offset)?;
        mm.write_byte(addr, value)
    }

    /// Run one instruction. Reads yield the byte read.
    pub fn execute(&self, inst: &Instruction) -> MemResult<Option<u8>> {
        match *inst {
            Instruction::Alloc { size, handle } => self.alloc(size, handle).map(|_| None),
            Instruction::Free { handle } => self.free(handle).map(|_| None),
            Instruction::Read { handle, offset } => self.read(handle, offset).map(Some),
            Instruction::Write { value, handle, offset } => {
                self.write(value, handle, offset).map(|_| None)
            }
        }
    }

    /// Run `f` with the address space locked.
    pub fn with_mm<R>(&self, f: impl FnOnce(&mut AddressSpace) -> R) -> R {
        f(&mut self.mm.lock())
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process").field("pid", &self.pid).finish_non_exhaustive()
    }
}
