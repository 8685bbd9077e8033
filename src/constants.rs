// Default geometry: 256-byte pages, 2^14 pages per address space
pub const PAGE_BITS: u32 = 8;
pub const PAGE_SIZE: usize = 1 << PAGE_BITS;
pub const MAX_PAGES: usize = 1 << 14;

pub const RAM_SIZE: usize = 0x10_0000;
pub const SWAP_SIZE: usize = 0x100_0000;

pub const MAX_SYMBOLS: usize = 30;
pub const MAX_QUEUE_SIZE: usize = 10;
pub const MAX_SWAP_DEVICES: usize = 4;

// PTE layout (32 bits)
pub const PTE_PRESENT_BIT: u32 = 31;
pub const PTE_SWAPPED_BIT: u32 = 30;
pub const PTE_RESERVED_BIT: u32 = 29;
pub const PTE_DIRTY_BIT: u32 = 28;

pub const FPN_BITS: u32 = 13;
pub const FPN_MASK: u32 = (1 << FPN_BITS) - 1;

pub const SWPTYP_BITS: u32 = 5;
pub const SWPTYP_MASK: u32 = (1 << SWPTYP_BITS) - 1;

pub const SWPOFF_BITS: u32 = 21;
pub const SWPOFF_SHIFT: u32 = SWPTYP_BITS;
pub const SWPOFF_MASK: u32 = ((1 << SWPOFF_BITS) - 1) << SWPOFF_SHIFT;

pub const MAX_FRAMES: usize = 1 << FPN_BITS;
pub const MAX_SWAP_FRAMES: usize = 1 << SWPOFF_BITS;
