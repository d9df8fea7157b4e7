//! Runtime geometry of the simulated memory system.
//!
//! A `MemConfig` is fixed for the lifetime of every address space built from it. Values can be
//! loaded from TOML; any omitted key falls back to the defaults in [`crate::constants`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::*;
use crate::error::{MemError, MemResult};
use crate::memory::AccessMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] MemError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemConfig {
    pub page_size: usize,
    /// Number of page-table entries per address space.
    pub max_pages: usize,
    /// Number of region handles per address space.
    pub max_symbols: usize,
    pub ram_size: usize,
    pub ram_access: AccessMode,
    /// Capacity of each swap device; index is the PTE swap type.
    pub swap_sizes: Vec<usize>,
    pub swap_access: AccessMode,
    /// Evict FIFO victims to swap when RAM cannot satisfy an area growth.
    pub evict_on_grow: bool,
}

impl Default for MemConfig {
    fn default() -> Self {
        MemConfig {
            page_size: PAGE_SIZE,
            max_pages: MAX_PAGES,
            max_symbols: MAX_SYMBOLS,
            ram_size: RAM_SIZE,
            ram_access: AccessMode::Random,
            swap_sizes: vec![SWAP_SIZE],
            swap_access: AccessMode::Random,
            evict_on_grow: false,
        }
    }
}

impl MemConfig {
    /// Small geometry used by tests and demos: `frames` RAM frames and as many swap frames.
    pub fn small(page_size: usize, frames: usize) -> Self {
        MemConfig {
            page_size,
            max_pages: 64,
            max_symbols: MAX_SYMBOLS,
            ram_size: page_size * frames,
            ram_access: AccessMode::Random,
            swap_sizes: vec![page_size * frames],
            swap_access: AccessMode::Random,
            evict_on_grow: false,
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: MemConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Number of bits in the in-page offset.
    #[inline]
    pub fn offset_bits(&self) -> u32 {
        self.page_size.trailing_zeros()
    }

    /// Round `size` up to a whole number of pages. Sizes with no page-aligned `usize` are
    /// `InvalidAccess`.
    #[inline]
    pub fn page_align(&self, size: usize) -> MemResult<usize> {
        size.div_ceil(self.page_size)
            .checked_mul(self.page_size)
            .ok_or_else(|| MemError::access(format!("size {} cannot be page aligned", size)))
    }

    /// Size of the virtual address space covered by the page table.
    #[inline]
    pub fn address_limit(&self) -> usize {
        self.max_pages * self.page_size
    }

    pub fn validate(&self) -> Result<(), MemError> {
        let invalid = |msg: String| Err(MemError::InvalidConfig(msg));

        if self.page_size == 0 || !self.page_size.is_power_of_two() {
            return invalid(format!("page size {} is not a power of two", self.page_size));
        }
        if self.max_pages == 0 {
            return invalid("page table must have at least one entry".to_string());
        }
        if self.max_symbols == 0 {
            return invalid("symbol table must have at least one entry".to_string());
        }
        if self.max_pages.checked_mul(self.page_size).is_none() {
            return invalid(format!(
                "{} pages of {} bytes overflow the address space",
                self.max_pages, self.page_size
            ));
        }

        let ram_frames = self.device_frames("ram", self.ram_size)?;
        if ram_frames - 1 > MAX_FPN {
            return invalid(format!("ram has {} frames, PTE holds at most {}", ram_frames, MAX_FPN + 1));
        }

        if self.swap_sizes.is_empty() {
            return invalid("at least one swap device is required".to_string());
        }
        if self.swap_sizes.len() - 1 > MAX_SWPTYP {
            return invalid(format!(
                "{} swap devices configured, PTE holds at most {}",
                self.swap_sizes.len(),
                MAX_SWPTYP + 1
            ));
        }
        for (i, &size) in self.swap_sizes.iter().enumerate() {
            let frames = self.device_frames(&format!("swap{}", i), size)?;
            if frames - 1 > MAX_SWPOFF {
                return invalid(format!(
                    "swap{} has {} frames, PTE holds at most {}",
                    i,
                    frames,
                    MAX_SWPOFF + 1
                ));
            }
        }

        Ok(())
    }

    fn device_frames(&self, name: &str, size: usize) -> Result<usize, MemError> {
        if size == 0 || size % self.page_size != 0 {
            return Err(MemError::InvalidConfig(format!(
                "{} size {} is not a positive multiple of the page size {}",
                name, size, self.page_size
            )));
        }
        Ok(size / self.page_size)
    }
}
