pub mod config;
pub mod constants;
pub mod error;
pub mod free_list;
pub mod memory;
pub mod mm;
pub mod page_table;
pub mod process;
pub mod queue;
pub mod swap;
pub mod translation;
pub mod vm;

// Re-export commonly used items for convenience
pub use config::MmConfig;
pub use error::{VmError, VmResult};
pub use free_list::RegionRange;
pub use memory::{MemPhy, SharedMemPhy};
pub use process::Process;
pub use queue::{Prioritized, ReadyQueue};
pub use vm::{alloc_region, free_region, read_region, reclaim_all, write_region};
