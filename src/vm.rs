use log::{Level, debug, info, log_enabled, trace, warn};

use crate::constants::MAX_SYMBOLS;
use crate::error::{VmError, VmResult};
use crate::free_list::RegionRange;
use crate::mm::{MmStruct, Region};
use crate::process::Process;
use crate::swap::map_pages;
use crate::translation::{VirtualAddress, translate};

pub use crate::swap::reclaim_all;

/// First-fit search of a VMA's free list.
///
/// `Ok(None)` means nothing fit and the list is unchanged.
pub fn get_free_vmrg_area(
    proc: &mut Process,
    vma_id: usize,
    size: usize,
) -> VmResult<Option<RegionRange>> {
    Ok(proc.mm.vma_mut(vma_id)?.free_list.find_fit(size))
}

/// Check that growing VMA `vma_id` over `[start, end)` collides with nothing.
///
/// `start` must lie inside the VMA or sit exactly at its end. A range that
/// stays inside the VMA is always fine; one that reaches past it must not
/// overlap any other non-empty VMA.
pub fn validate_overlap_vm_area(
    mm: &MmStruct,
    vma_id: usize,
    start: usize,
    end: usize,
) -> VmResult<()> {
    let cur = mm.vma(vma_id)?;

    if start < cur.vm_start || start > cur.vm_end {
        return Err(VmError::Overlap);
    }
    if end > start && end <= cur.vm_end {
        return Ok(());
    }

    let candidate = RegionRange::new(start, end);
    for other in mm.vmas().filter(|vma| vma.id != vma_id) {
        let bounds = RegionRange::new(other.vm_start, other.vm_end);
        if !bounds.is_empty() && candidate.overlaps(&bounds) {
            return Err(VmError::Overlap);
        }
    }

    Ok(())
}

/// Grow VMA `vma_id` by `inc_sz` bytes (rounded up to whole pages) at its
/// break pointer and back the new pages.
///
/// The first `inc_sz` bytes of the new area are left for the caller; the
/// page-rounding slack after them goes onto the VMA's free list. On any
/// failure the VMA bounds are exactly as before. Returns the whole new area.
///
/// Growth that would not fit in the address space or past the last page
/// table entry fails with [`VmError::OutOfSpace`].
pub fn inc_vma_limit(proc: &mut Process, vma_id: usize, inc_sz: usize) -> VmResult<RegionRange> {
    let (old_sbrk, old_end) = {
        let vma = proc.mm.vma(vma_id)?;
        (vma.sbrk, vma.vm_end)
    };
    let area_end = proc
        .config
        .align_up(inc_sz)
        .and_then(|inc_amt| old_sbrk.checked_add(inc_amt))
        .ok_or(VmError::OutOfSpace)?;
    let area = RegionRange::new(old_sbrk, area_end);
    let inc_amt = area.len();

    if let Err(err) = validate_overlap_vm_area(&proc.mm, vma_id, area.start, area.end) {
        warn!(
            "pid {}: growing vma {} by {} at {} rejected: {}",
            proc.pid, vma_id, inc_amt, area, err
        );
        return Err(err);
    }
    if area.is_empty() {
        return Ok(area);
    }
    if proc.config.page_of(area.end - 1) >= proc.mm.page_table.len() {
        warn!(
            "pid {}: growing vma {} to {} runs past the page table ({} pages)",
            proc.pid,
            vma_id,
            area.end,
            proc.mm.page_table.len()
        );
        return Err(VmError::OutOfSpace);
    }

    {
        let vma = proc.mm.vma_mut(vma_id)?;
        vma.sbrk = vma.sbrk.max(area.end);
        vma.vm_end = vma.vm_end.max(area.end);
    }

    let first_pgn = proc.config.page_of(area.start);
    let num_pages = proc.config.page_of(area.end - 1) - first_pgn + 1;
    if let Err(err) = map_pages(proc, first_pgn, num_pages) {
        let vma = proc.mm.vma_mut(vma_id)?;
        vma.sbrk = old_sbrk;
        vma.vm_end = old_end;
        warn!(
            "pid {}: backing {} pages for vma {} failed: {}",
            proc.pid, num_pages, vma_id, err
        );
        return Err(err);
    }

    let slack = RegionRange::new(old_sbrk + inc_sz, area.end);
    let vma = proc.mm.vma_mut(vma_id)?;
    if !slack.is_empty() {
        vma.free_list.release(slack)?;
    }

    info!(
        "pid {}: vma {} grown to [{}, {}) sbrk={} (+{} pages)",
        proc.pid, vma_id, vma.vm_start, vma.vm_end, vma.sbrk, num_pages
    );
    Ok(area)
}

/// Allocate `size` bytes in VMA `vma_id` for symbol `rgid` and return the
/// start address.
///
/// The free list is tried first; otherwise the VMA grows and the region is
/// placed at the old break pointer. A symbol that already holds a region has
/// that region released once the new one is in place.
pub fn alloc(proc: &mut Process, vma_id: usize, rgid: usize, size: usize) -> VmResult<usize> {
    if size == 0 {
        return Err(VmError::InvalidRegion);
    }
    if rgid >= MAX_SYMBOLS {
        return Err(VmError::InvalidIdentifier);
    }

    let range = match get_free_vmrg_area(proc, vma_id, size)? {
        Some(range) => range,
        None => {
            let area = inc_vma_limit(proc, vma_id, size)?;
            RegionRange::new(area.start, area.start + size)
        }
    };

    let previous = proc.mm.take_region(rgid).ok();
    proc.mm.set_region(rgid, Region { vma_id, range })?;
    if let Some(old) = previous {
        debug!("pid {}: region {} reallocated, releasing {}", proc.pid, rgid, old.range);
        proc.mm.vma_mut(old.vma_id)?.free_list.release(old.range)?;
    }

    debug!("pid {}: alloc region={} size={} at {}", proc.pid, rgid, size, range);
    Ok(range.start)
}

/// Hand region `rgid` back to its VMA's free list.
///
/// Frames and page-table entries stay in place until [`reclaim_all`].
pub fn free(proc: &mut Process, rgid: usize) -> VmResult<()> {
    let region = proc.mm.take_region(rgid)?;
    if let Err(err) = proc
        .mm
        .vma_mut(region.vma_id)
        .and_then(|vma| vma.free_list.release(region.range))
    {
        proc.mm.set_region(rgid, region)?;
        return Err(err);
    }

    debug!("pid {}: free region={} {}", proc.pid, rgid, region.range);
    Ok(())
}

/// Read the byte at `offset` into region `rgid`.
///
/// `offset` is not checked against the region's length: the caller owns
/// that contract. See [`read_checked`].
pub fn read(proc: &mut Process, vma_id: usize, rgid: usize, offset: usize) -> VmResult<u8> {
    let region = proc.mm.region(rgid)?;
    proc.mm.vma(vma_id)?;

    let va = VirtualAddress::from_raw(region.range.start + offset, &proc.config);
    let phys = translate(proc, &va)?;
    let value = proc.mram.lock().read(phys)?;

    debug!("pid {}: read region={} offset={} value={}", proc.pid, rgid, offset, value);
    trace_page_table(proc);
    Ok(value)
}

/// Write `value` at `offset` into region `rgid`. Unchecked like [`read`].
pub fn write(
    proc: &mut Process,
    vma_id: usize,
    rgid: usize,
    offset: usize,
    value: u8,
) -> VmResult<()> {
    let region = proc.mm.region(rgid)?;
    proc.mm.vma(vma_id)?;

    let va = VirtualAddress::from_raw(region.range.start + offset, &proc.config);
    let phys = translate(proc, &va)?;
    proc.mram.lock().write(phys, value)?;
    proc.mm.page_table.entry_mut(va.pgn)?.set_dirty();

    debug!("pid {}: write region={} offset={} value={}", proc.pid, rgid, offset, value);
    trace_page_table(proc);
    Ok(())
}

/// [`read`], rejecting offsets past the end of the region.
pub fn read_checked(proc: &mut Process, vma_id: usize, rgid: usize, offset: usize) -> VmResult<u8> {
    check_offset(&proc.mm, rgid, offset)?;
    read(proc, vma_id, rgid, offset)
}

/// [`write`], rejecting offsets past the end of the region.
pub fn write_checked(
    proc: &mut Process,
    vma_id: usize,
    rgid: usize,
    offset: usize,
    value: u8,
) -> VmResult<()> {
    check_offset(&proc.mm, rgid, offset)?;
    write(proc, vma_id, rgid, offset, value)
}

fn check_offset(mm: &MmStruct, rgid: usize, offset: usize) -> VmResult<()> {
    let len = mm.region(rgid)?.range.len();
    if offset >= len {
        return Err(VmError::OutOfRegion { offset, len });
    }
    Ok(())
}

fn trace_page_table(proc: &Process) {
    if log_enabled!(Level::Trace) {
        trace!("pid {} state:\n{}", proc.pid, dump_state(proc));
    }
}

/// Mapped page-table entries followed by the non-zero bytes of RAM.
pub fn dump_state(proc: &Process) -> String {
    format!(
        "page table:\n{}ram:\n{}",
        proc.mm.page_table.dump(0..proc.mm.page_table.len()),
        proc.mram.lock().dump()
    )
}

// Instruction-level entry points; every region lives in VMA 0

pub fn alloc_region(proc: &mut Process, size: usize, rgid: usize) -> VmResult<usize> {
    alloc(proc, 0, rgid, size)
}

pub fn free_region(proc: &mut Process, rgid: usize) -> VmResult<()> {
    free(proc, rgid)
}

pub fn read_region(proc: &mut Process, rgid: usize, offset: usize) -> VmResult<u8> {
    read(proc, 0, rgid, offset)
}

pub fn write_region(proc: &mut Process, rgid: usize, offset: usize, value: u8) -> VmResult<()> {
    write(proc, 0, rgid, offset, value)
}
