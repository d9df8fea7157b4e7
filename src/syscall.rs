//! Boundary with the memory syscall service.
//!
//! The paging layer never copies frames or writes RAM on its own behalf; it hands a [`SysMem`]
//! service a register frame holding an operation selector and up to three operands.
//! [`DirectSysMem`] decodes the frame and performs the work synchronously against the address
//! space's devices.

use std::fmt;

use log::debug;

use crate::error::{MemError, MemResult};
use crate::frame;
use crate::memory::PhysicalMemory;

pub const SYSMEM_SWP_OP: u32 = 3;
pub const SYSMEM_IO_WRITE: u32 = 5;

/// Names a physical device of one address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceId {
    Ram,
    Swap(usize),
}

impl DeviceId {
    fn code(self) -> MemResult<u32> {
        match self {
            DeviceId::Ram => Ok(0),
            DeviceId::Swap(n) if n < 0xff => Ok(n as u32 + 1),
            DeviceId::Swap(n) => Err(no_swap(n)),
        }
    }

    fn from_code(code: u32) -> Self {
        match code {
            0 => DeviceId::Ram,
            n => DeviceId::Swap(n as usize - 1),
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceId::Ram => write!(f, "ram"),
            DeviceId::Swap(n) => write!(f, "swap{}", n),
        }
    }
}

/// One frame of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRef {
    pub device: DeviceId,
    pub frame: usize,
}

impl FrameRef {
    pub fn ram(frame: usize) -> Self {
        FrameRef { device: DeviceId::Ram, frame }
    }

    pub fn swap(swap_type: usize, frame: usize) -> Self {
        FrameRef { device: DeviceId::Swap(swap_type), frame }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysMemOp {
    /// Copy a whole frame between two devices.
    SwapCopy { src: FrameRef, dst: FrameRef },
    /// Write one byte of RAM at a physical address.
    IoWrite { address: usize, value: u8 },
}

impl SysMemOp {
    /// Register frame `[selector, a1, a2, a3]`.
    ///
    /// Swap copy packs both device codes into `a1` (`src << 8 | dst`) and the frames into `a2`, `a3`.
    /// Operands that do not fit their register are `BadSyscall`.
    pub fn to_regs(&self) -> MemResult<[u32; 4]> {
        match *self {
            SysMemOp::SwapCopy { src, dst } => Ok([
                SYSMEM_SWP_OP,
                (src.device.code()? << 8) | dst.device.code()?,
                register("frame", src.frame)?,
                register("frame", dst.frame)?,
            ]),
            SysMemOp::IoWrite { address, value } => {
                Ok([SYSMEM_IO_WRITE, register("address", address)?, value as u32, 0])
            }
        }
    }

    pub fn from_regs(selector: u32, a1: u32, a2: u32, a3: u32) -> MemResult<Self> {
        match selector {
            SYSMEM_SWP_OP => Ok(SysMemOp::SwapCopy {
                src: FrameRef { device: DeviceId::from_code(a1 >> 8), frame: a2 as usize },
                dst: FrameRef { device: DeviceId::from_code(a1 & 0xff), frame: a3 as usize },
            }),
            SYSMEM_IO_WRITE => {
                let value = u8::try_from(a2)
                    .map_err(|_| MemError::BadSyscall(format!("io write value {} is not a byte", a2)))?;
                Ok(SysMemOp::IoWrite { address: a1 as usize, value })
            }
            other => Err(MemError::BadSyscall(format!("unknown memory operation {}", other))),
        }
    }
}

/// The RAM device and swap devices of one address space.
#[derive(Debug)]
pub struct Devices {
    pub ram: PhysicalMemory,
    pub swap: Vec<PhysicalMemory>,
    pub active_swap: usize,
}

impl Devices {
    pub fn get_mut(&mut self, id: DeviceId) -> MemResult<&mut PhysicalMemory> {
        match id {
            DeviceId::Ram => Ok(&mut self.ram),
            DeviceId::Swap(n) => self
                .swap
                .get_mut(n)
                .ok_or_else(|| MemError::BadSyscall(format!("no swap device {}", n))),
        }
    }

    pub fn active_swap_mut(&mut self) -> &mut PhysicalMemory {
        &mut self.swap[self.active_swap]
    }

    /// Mutable access to two distinct devices at once.
    pub fn pair_mut(
        &mut self,
        a: DeviceId,
        b: DeviceId,
    ) -> MemResult<(&mut PhysicalMemory, &mut PhysicalMemory)> {
        match (a, b) {
            (DeviceId::Ram, DeviceId::Swap(n)) => {
                let swap = self.swap.get_mut(n).ok_or_else(|| no_swap(n))?;
                Ok((&mut self.ram, swap))
            }
            (DeviceId::Swap(n), DeviceId::Ram) => {
                let swap = self.swap.get_mut(n).ok_or_else(|| no_swap(n))?;
                Ok((swap, &mut self.ram))
            }
            (DeviceId::Swap(x), DeviceId::Swap(y)) if x != y => {
                if x.max(y) >= self.swap.len() {
                    return Err(no_swap(x.max(y)));
                }
                if x < y {
                    let (lo, hi) = self.swap.split_at_mut(y);
                    Ok((&mut lo[x], &mut hi[0]))
                } else {
                    let (lo, hi) = self.swap.split_at_mut(x);
                    Ok((&mut hi[0], &mut lo[y]))
                }
            }
            _ => Err(MemError::BadSyscall(format!("cannot copy {} onto itself", a))),
        }
    }
}

fn no_swap(n: usize) -> MemError {
    MemError::BadSyscall(format!("no swap device {}", n))
}

fn register(what: &str, value: usize) -> MemResult<u32> {
    u32::try_from(value)
        .map_err(|_| MemError::BadSyscall(format!("{} {} does not fit a register", what, value)))
}

/// The syscall service used by the paging layer for physical mutations.
pub trait SysMem: Send {
    /// Carry out the request in `regs` (`[selector, a1, a2, a3]`, see [`SysMemOp::to_regs`]).
    fn sys_mem(&mut self, devices: &mut Devices, regs: [u32; 4]) -> MemResult<()>;
}

/// Carries out every request immediately against the given devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectSysMem;

impl SysMem for DirectSysMem {
    fn sys_mem(&mut self, devices: &mut Devices, regs: [u32; 4]) -> MemResult<()> {
        let [selector, a1, a2, a3] = regs;
        match SysMemOp::from_regs(selector, a1, a2, a3)? {
            SysMemOp::SwapCopy { src, dst } => {
                debug!(
                    "sysmem swap {}:{} -> {}:{}",
                    src.device, src.frame, dst.device, dst.frame
                );
                let (from, to) = devices.pair_mut(src.device, dst.device)?;
                frame::copy_frame(from, src.frame, to, dst.frame)
            }
            SysMemOp::IoWrite { address, value } => {
                devices.get_mut(DeviceId::Ram)?.write(address, value)
            }
        }
    }
}
