use crate::config::MmConfig;
use crate::error::VmResult;
use crate::process::Process;
use crate::swap::get_page;

/// Represents the decomposed components of a Virtual Address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualAddress {
    pub va: usize,
    pub pgn: usize,
    pub offset: usize,
}

impl VirtualAddress {
    /// Decompose a raw VA into page number and in-page offset
    pub fn from_raw(va: usize, config: &MmConfig) -> Self {
        VirtualAddress {
            va,
            pgn: config.page_of(va),
            offset: config.offset_of(va),
        }
    }
}

impl std::fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VA({}) = (pgn={}, off={})", self.va, self.pgn, self.offset)
    }
}

/// Translate a virtual address to a RAM address, faulting the page in if it
/// is swapped out.
pub fn translate(proc: &mut Process, va: &VirtualAddress) -> VmResult<usize> {
    let fpn = get_page(proc, va.pgn)?;
    Ok(proc.config.physical_address(fpn, va.offset))
}
