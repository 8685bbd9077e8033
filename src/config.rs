use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::constants::*;
use crate::error::{VmError, VmResult};

/// Memory geometry for one simulated machine.
///
/// Every field has a default, so a TOML file only needs to name what it
/// overrides:
///
/// ```toml
/// page_bits = 12
/// ram_size = 16384
/// swap_sizes = [65536]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MmConfig {
    /// log2 of the page (and frame) size in bytes
    pub page_bits: u32,
    /// Number of page-table slots per address space
    pub max_pages: usize,
    /// Size of RAM in bytes
    pub ram_size: usize,
    /// Size in bytes of each swap device
    pub swap_sizes: Vec<usize>,
    /// Index into `swap_sizes` of the device new swap frames come from
    pub active_swap: usize,
}

impl Default for MmConfig {
    fn default() -> Self {
        MmConfig {
            page_bits: PAGE_BITS,
            max_pages: MAX_PAGES,
            ram_size: RAM_SIZE,
            swap_sizes: vec![SWAP_SIZE],
            active_swap: 0,
        }
    }
}

impl MmConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> VmResult<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| VmError::Config(format!("failed to read config file: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> VmResult<Self> {
        let config: MmConfig = toml::from_str(content)
            .map_err(|e| VmError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the geometry fits the PTE layout.
    pub fn validate(&self) -> VmResult<()> {
        if self.page_bits == 0 || self.page_bits > 16 {
            return Err(VmError::Config(format!(
                "page_bits {} outside 1..=16",
                self.page_bits
            )));
        }
        if self.max_pages == 0 {
            return Err(VmError::Config("max_pages must be non-zero".to_string()));
        }

        let page_size = self.page_size();
        if self.ram_size % page_size != 0 {
            return Err(VmError::Config(format!(
                "ram_size {} is not a multiple of the page size {}",
                self.ram_size, page_size
            )));
        }
        if self.ram_size / page_size > MAX_FRAMES {
            return Err(VmError::Config(format!(
                "ram_size {} exceeds {} frames",
                self.ram_size, MAX_FRAMES
            )));
        }

        if self.swap_sizes.is_empty() || self.swap_sizes.len() > MAX_SWAP_DEVICES {
            return Err(VmError::Config(format!(
                "expected 1..={} swap devices, got {}",
                MAX_SWAP_DEVICES,
                self.swap_sizes.len()
            )));
        }
        for (i, &size) in self.swap_sizes.iter().enumerate() {
            if size % page_size != 0 {
                return Err(VmError::Config(format!(
                    "swap device {} size {} is not a multiple of the page size {}",
                    i, size, page_size
                )));
            }
            if size / page_size > MAX_SWAP_FRAMES {
                return Err(VmError::Config(format!(
                    "swap device {} size {} exceeds {} frames",
                    i, size, MAX_SWAP_FRAMES
                )));
            }
        }
        if self.active_swap >= self.swap_sizes.len() {
            return Err(VmError::Config(format!(
                "active_swap {} names no swap device",
                self.active_swap
            )));
        }

        Ok(())
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        1 << self.page_bits
    }

    /// Round `size` up to a whole number of pages, `None` on overflow.
    #[inline]
    pub fn align_up(&self, size: usize) -> Option<usize> {
        let mask = self.page_size() - 1;
        size.checked_add(mask).map(|sz| sz & !mask)
    }

    #[inline]
    pub fn page_of(&self, addr: usize) -> usize {
        addr >> self.page_bits
    }

    #[inline]
    pub fn offset_of(&self, addr: usize) -> usize {
        addr & (self.page_size() - 1)
    }

    /// Physical address of byte `offset` inside frame `frame`.
    #[inline]
    pub fn physical_address(&self, frame: usize, offset: usize) -> usize {
        (frame << self.page_bits) | offset
    }
}
