use std::fmt::Write as _;
use std::ops::Range;

use bitflags::bitflags;

use crate::constants::*;
use crate::error::{VmError, VmResult};

bitflags! {
    /// Control bits in the high end of a [`Pte`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PteFlags: u32 {
        const PRESENT = 1 << PTE_PRESENT_BIT;
        const SWAPPED = 1 << PTE_SWAPPED_BIT;
        const RESERVED = 1 << PTE_RESERVED_BIT;
        const DIRTY = 1 << PTE_DIRTY_BIT;
    }
}

/// Where a swapped-out page lives: which swap device and which frame on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapLocation {
    pub swap_type: usize,
    pub offset: usize,
}

/// A 32-bit page table entry.
///
/// Either PRESENT (low bits hold the RAM frame number) or SWAPPED (low bits
/// hold the swap type and swap offset). An entry with neither bit set has
/// never been mapped.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Pte(u32);

impl Pte {
    pub const UNMAPPED: Pte = Pte(0);

    pub fn present(fpn: usize) -> Self {
        let mut pte = Pte::UNMAPPED;
        pte.set_present(fpn);
        pte
    }

    pub fn swapped(swap_type: usize, offset: usize) -> Self {
        let mut pte = Pte::UNMAPPED;
        pte.set_swapped(swap_type, offset);
        pte
    }

    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn flags(self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0)
    }

    #[inline]
    pub fn is_present(self) -> bool {
        self.flags().contains(PteFlags::PRESENT)
    }

    #[inline]
    pub fn is_swapped(self) -> bool {
        self.flags().contains(PteFlags::SWAPPED)
    }

    #[inline]
    pub fn is_mapped(self) -> bool {
        self.is_present() || self.is_swapped()
    }

    #[inline]
    pub fn is_dirty(self) -> bool {
        self.flags().contains(PteFlags::DIRTY)
    }

    /// Frame number of a present entry
    pub fn frame(self) -> Option<usize> {
        self.is_present().then(|| (self.0 & FPN_MASK) as usize)
    }

    pub fn swap_location(self) -> Option<SwapLocation> {
        self.is_swapped().then(|| SwapLocation {
            swap_type: (self.0 & SWPTYP_MASK) as usize,
            offset: ((self.0 & SWPOFF_MASK) >> SWPOFF_SHIFT) as usize,
        })
    }

    /// Make the entry present in RAM frame `fpn`. Clears SWAPPED and DIRTY.
    pub fn set_present(&mut self, fpn: usize) {
        debug_assert!(fpn < MAX_FRAMES);
        self.0 = PteFlags::PRESENT.bits() | (fpn as u32 & FPN_MASK);
    }

    /// Make the entry swapped out to `offset` on swap device `swap_type`.
    pub fn set_swapped(&mut self, swap_type: usize, offset: usize) {
        debug_assert!(swap_type <= SWPTYP_MASK as usize);
        debug_assert!(offset < MAX_SWAP_FRAMES);
        self.0 = PteFlags::SWAPPED.bits()
            | (swap_type as u32 & SWPTYP_MASK)
            | (((offset as u32) << SWPOFF_SHIFT) & SWPOFF_MASK);
    }

    pub fn set_dirty(&mut self) {
        self.0 |= PteFlags::DIRTY.bits();
    }

    pub fn clear(&mut self) {
        *self = Pte::UNMAPPED;
    }
}

impl std::fmt::Debug for Pte {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(fpn) = self.frame() {
            write!(f, "Pte(present fpn={}", fpn)?;
        } else if let Some(loc) = self.swap_location() {
            write!(f, "Pte(swapped type={} off={}", loc.swap_type, loc.offset)?;
        } else {
            return write!(f, "Pte(unmapped)");
        }
        if self.is_dirty() {
            write!(f, " dirty")?;
        }
        write!(f, ")")
    }
}

/// Flat page table indexed directly by page number.
pub struct PageTable {
    entries: Vec<Pte>,
}

impl PageTable {
    pub fn new(max_pages: usize) -> Self {
        PageTable {
            entries: vec![Pte::UNMAPPED; max_pages],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, pgn: usize) -> VmResult<Pte> {
        self.entries.get(pgn).copied().ok_or(VmError::PageOutOfRange {
            pgn,
            max: self.entries.len(),
        })
    }

    pub fn entry_mut(&mut self, pgn: usize) -> VmResult<&mut Pte> {
        let max = self.entries.len();
        self.entries
            .get_mut(pgn)
            .ok_or(VmError::PageOutOfRange { pgn, max })
    }

    /// Every mapped entry with its page number
    pub fn iter_mapped(&self) -> impl Iterator<Item = (usize, Pte)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, pte)| pte.is_mapped())
            .map(|(pgn, &pte)| (pgn, pte))
    }

    /// Render the mapped entries of `pages` as `pgn: raw-bits (decoded)` lines.
    pub fn dump(&self, pages: Range<usize>) -> String {
        let end = pages.end.min(self.entries.len());
        let mut out = String::new();
        for pgn in pages.start..end {
            let pte = self.entries[pgn];
            if pte.is_mapped() {
                let _ = writeln!(out, "{:05}: {:08x} {:?}", pgn, pte.bits(), pte);
            }
        }
        out
    }
}
