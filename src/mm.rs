use std::collections::VecDeque;

use crate::config::MmConfig;
use crate::constants::MAX_SYMBOLS;
use crate::error::{VmError, VmResult};
use crate::free_list::{FreeRegionList, RegionRange};
use crate::page_table::PageTable;

/// A live variable: a byte range inside exactly one VMA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub vma_id: usize,
    pub range: RegionRange,
}

/// A contiguous virtual memory area `[vm_start, vm_end)`.
///
/// `sbrk` splits the area into space already handed out through growth
/// (below) and reserved space not yet backed by pages (above).
#[derive(Debug)]
pub struct Vma {
    pub id: usize,
    pub vm_start: usize,
    pub vm_end: usize,
    pub sbrk: usize,
    pub free_list: FreeRegionList,
}

impl Vma {
    pub fn new(id: usize, vm_start: usize, vm_end: usize) -> Self {
        Vma {
            id,
            vm_start,
            vm_end,
            sbrk: vm_start,
            free_list: FreeRegionList::new(),
        }
    }

    /// Does `addr` fall inside `[vm_start, vm_end)`?
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.vm_start && addr < self.vm_end
    }
}

/// Everything one process knows about its own memory.
pub struct MmStruct {
    pub page_table: PageTable,
    vmas: Vec<Vma>,
    symbols: [Option<Region>; MAX_SYMBOLS],
    /// Resident page numbers, oldest load first
    pub fifo: VecDeque<usize>,
}

impl MmStruct {
    /// Start with a single empty VMA 0 at address 0.
    pub fn new(config: &MmConfig) -> Self {
        MmStruct {
            page_table: PageTable::new(config.max_pages),
            vmas: vec![Vma::new(0, 0, 0)],
            symbols: [None; MAX_SYMBOLS],
            fifo: VecDeque::new(),
        }
    }

    /// Append a VMA covering `[start, end)` and return its id.
    ///
    /// Overlap with existing areas is not checked here; growth checks it.
    pub fn add_vma(&mut self, start: usize, end: usize) -> VmResult<usize> {
        if start > end {
            return Err(VmError::InvalidRegion);
        }
        let id = self.vmas.len();
        self.vmas.push(Vma::new(id, start, end));
        Ok(id)
    }

    pub fn vma(&self, id: usize) -> VmResult<&Vma> {
        self.vmas.get(id).ok_or(VmError::InvalidIdentifier)
    }

    pub fn vma_mut(&mut self, id: usize) -> VmResult<&mut Vma> {
        self.vmas.get_mut(id).ok_or(VmError::InvalidIdentifier)
    }

    pub fn vmas(&self) -> impl Iterator<Item = &Vma> {
        self.vmas.iter()
    }

    /// The live region recorded under symbol `id`
    pub fn region(&self, id: usize) -> VmResult<Region> {
        self.symbols
            .get(id)
            .copied()
            .flatten()
            .ok_or(VmError::InvalidIdentifier)
    }

    pub(crate) fn set_region(&mut self, id: usize, region: Region) -> VmResult<()> {
        let slot = self.symbols.get_mut(id).ok_or(VmError::InvalidIdentifier)?;
        *slot = Some(region);
        Ok(())
    }

    pub(crate) fn take_region(&mut self, id: usize) -> VmResult<Region> {
        self.symbols
            .get_mut(id)
            .and_then(Option::take)
            .ok_or(VmError::InvalidIdentifier)
    }

    /// Ids and ranges of every live region
    pub fn regions(&self) -> impl Iterator<Item = (usize, Region)> + '_ {
        self.symbols
            .iter()
            .enumerate()
            .filter_map(|(id, region)| region.map(|r| (id, r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_layout() {
        let mm = MmStruct::new(&MmConfig::default());
        let vma = mm.vma(0).unwrap();
        assert_eq!((vma.vm_start, vma.vm_end, vma.sbrk), (0, 0, 0));
        assert!(vma.free_list.is_empty());
        assert!(mm.fifo.is_empty());
        assert_eq!(mm.regions().count(), 0);
        assert_eq!(mm.vma(1).unwrap_err(), VmError::InvalidIdentifier);
    }

    #[test]
    fn test_add_vma() {
        let mut mm = MmStruct::new(&MmConfig::default());
        let id = mm.add_vma(0x1000, 0x2000).unwrap();
        assert_eq!(id, 1);
        let vma = mm.vma(id).unwrap();
        assert_eq!(vma.sbrk, 0x1000);
        assert!(vma.contains(0x1000));
        assert!(!vma.contains(0x2000));
        assert_eq!(mm.add_vma(5, 4), Err(VmError::InvalidRegion));
    }

    #[test]
    fn test_symbol_table() {
        let mut mm = MmStruct::new(&MmConfig::default());
        let region = Region { vma_id: 0, range: RegionRange::new(0, 100) };

        assert_eq!(mm.region(3), Err(VmError::InvalidIdentifier));
        mm.set_region(3, region).unwrap();
        assert_eq!(mm.region(3).unwrap(), region);
        assert_eq!(mm.regions().collect::<Vec<_>>(), vec![(3, region)]);

        assert_eq!(mm.take_region(3).unwrap(), region);
        assert_eq!(mm.take_region(3), Err(VmError::InvalidIdentifier));

        assert_eq!(mm.set_region(MAX_SYMBOLS, region), Err(VmError::InvalidIdentifier));
        assert_eq!(mm.region(MAX_SYMBOLS), Err(VmError::InvalidIdentifier));
    }
}
