//! Paged virtual memory for simulated processes: physical devices, a frame allocator, growable
//! areas with first-fit regions, bit-packed page tables and FIFO swapping.

pub mod address_space;
pub mod area;
pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod io;
pub mod memory;
pub mod page_table;
pub mod process;
pub mod pte;
pub mod region;
pub mod swap;
pub mod syscall;
pub mod translation;

// The address space, the process API and the types their signatures use.
pub use address_space::{AddressSpace, FreeStatus};
pub use config::{ConfigError, MemConfig};
pub use error::{status_code, MemError, MemResult};
pub use memory::{AccessMode, PhysicalMemory};
pub use process::{Instruction, Process};
pub use pte::PageEntry;
pub use region::Region;
pub use syscall::{DirectSysMem, SysMem, SysMemOp};
pub use translation::VirtualAddress;
