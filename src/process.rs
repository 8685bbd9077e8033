use crate::config::MmConfig;
use crate::error::{VmError, VmResult};
use crate::memory::{MemPhy, SharedMemPhy};
use crate::mm::MmStruct;

/// The memory-facing half of a process descriptor.
pub struct Process {
    pub pid: u32,
    pub priority: u32,
    pub config: MmConfig,
    pub mm: MmStruct,
    pub mram: SharedMemPhy,
    /// Swap devices; a PTE's swap type indexes this list
    pub mswp: Vec<SharedMemPhy>,
    pub active_mswp: usize,
}

impl Process {
    /// Attach a new address space to pools shared with other processes.
    pub fn new(
        pid: u32,
        priority: u32,
        config: MmConfig,
        mram: SharedMemPhy,
        mswp: Vec<SharedMemPhy>,
    ) -> VmResult<Self> {
        config.validate()?;
        if mswp.len() != config.swap_sizes.len() {
            return Err(VmError::Config(format!(
                "expected {} swap devices, got {}",
                config.swap_sizes.len(),
                mswp.len()
            )));
        }

        Ok(Process {
            pid,
            priority,
            mm: MmStruct::new(&config),
            mram,
            mswp,
            active_mswp: config.active_swap,
            config,
        })
    }

    /// Build a process with private RAM and swap pools sized by `config`.
    pub fn with_pools(pid: u32, priority: u32, config: MmConfig) -> VmResult<Self> {
        config.validate()?;
        let page_size = config.page_size();
        let mram = MemPhy::shared(config.ram_size, page_size);
        let mswp = config
            .swap_sizes
            .iter()
            .map(|&size| MemPhy::shared(size, page_size))
            .collect();
        Self::new(pid, priority, config, mram, mswp)
    }

    pub fn active_swap(&self) -> &SharedMemPhy {
        &self.mswp[self.active_mswp]
    }

    pub fn swap_device(&self, swap_type: usize) -> VmResult<&SharedMemPhy> {
        self.mswp.get(swap_type).ok_or(VmError::InvalidIdentifier)
    }
}
