use thiserror::Error;

/// Errors reported by the virtual memory manager.
///
/// Every failure is returned to the immediate caller; nothing here is fatal to
/// the process by itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// Malformed or empty byte range handed to the free-region list.
    #[error("invalid region")]
    InvalidRegion,
    /// Unknown region or VMA id.
    #[error("invalid region or vma identifier")]
    InvalidIdentifier,
    /// Proposed VMA growth collides with another VMA.
    #[error("vma growth overlaps another area")]
    Overlap,
    /// No resident page is available to evict.
    #[error("no victim page available")]
    NoVictim,
    /// The active swap device has no free frame.
    #[error("swap space exhausted")]
    SwapExhausted,
    /// Neither the free list nor VMA growth could satisfy the request.
    #[error("out of space")]
    OutOfSpace,
    #[error("page number {pgn} out of range (max {max})")]
    PageOutOfRange { pgn: usize, max: usize },
    /// The page was never mapped by VMA growth.
    #[error("page {pgn} is not mapped")]
    Unmapped { pgn: usize },
    /// Checked access past the end of a region.
    #[error("offset {offset} outside region of {len} bytes")]
    OutOfRegion { offset: usize, len: usize },
    /// Frame or byte address outside a memory pool, or a frame released twice.
    #[error("invalid frame or physical address {0}")]
    InvalidFrame(usize),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type VmResult<T> = Result<T, VmError>;
