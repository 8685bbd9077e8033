use log::{debug, info, warn};

use crate::error::{VmError, VmResult};
use crate::memory::swap_copy_page;
use crate::mm::MmStruct;
use crate::page_table::Pte;
use crate::process::Process;

/// Pop the oldest resident page.
pub fn find_victim_page(mm: &mut MmStruct) -> VmResult<usize> {
    mm.fifo.pop_front().ok_or(VmError::NoVictim)
}

/// Make page `pgn` resident and return its RAM frame.
///
/// A present page is returned as is. A swapped-out page takes over the frame
/// of the oldest resident page, which is written out to a fresh frame on the
/// active swap device. On failure nothing is changed.
pub fn get_page(proc: &mut Process, pgn: usize) -> VmResult<usize> {
    let pte = proc.mm.page_table.lookup(pgn)?;
    if let Some(fpn) = pte.frame() {
        return Ok(fpn);
    }
    let target = pte.swap_location().ok_or(VmError::Unmapped { pgn })?;
    let target_swap = proc.swap_device(target.swap_type)?.clone();

    let vicpgn = find_victim_page(&mut proc.mm)?;
    let vicfpn = match proc.mm.page_table.lookup(vicpgn)?.frame() {
        Some(fpn) => fpn,
        None => {
            warn!("pid {}: victim page {} is not resident", proc.pid, vicpgn);
            return Err(VmError::NoVictim);
        }
    };

    let active = proc.active_mswp;
    let swap = proc.active_swap().clone();
    let free_frame = swap.lock().get_free_frame();
    let swpfpn = match free_frame {
        Some(fpn) => fpn,
        None => {
            proc.mm.fifo.push_front(vicpgn);
            return Err(VmError::SwapExhausted);
        }
    };

    // Step 1: victim frame out to swap, target in from swap
    swap_copy_page(&proc.mram, vicfpn, &swap, swpfpn)?;
    swap_copy_page(&target_swap, target.offset, &proc.mram, vicfpn)?;
    target_swap.lock().put_free_frame(target.offset)?;

    // Step 2: the victim now lives in swap, the target owns the frame
    proc.mm.page_table.entry_mut(vicpgn)?.set_swapped(active, swpfpn);
    proc.mm.page_table.entry_mut(pgn)?.set_present(vicfpn);

    // Step 3: the target is the youngest resident page
    proc.mm.fifo.push_back(pgn);

    debug!(
        "pid {}: page fault pgn={} victim={} fpn={} victim->swap {}:{}",
        proc.pid, pgn, vicpgn, vicfpn, active, swpfpn
    );

    Ok(vicfpn)
}

/// Back `count` pages starting at `first_pgn` with zeroed frames.
///
/// Each page takes a free RAM frame and joins the FIFO queue; once RAM runs
/// out pages start swapped out on the active swap device. Pages already
/// mapped are left alone. If both pools run dry every page mapped by this
/// call is released again and `OutOfSpace` is returned.
pub fn map_pages(proc: &mut Process, first_pgn: usize, count: usize) -> VmResult<()> {
    let mut mapped: Vec<usize> = Vec::with_capacity(count);

    for pgn in first_pgn..first_pgn + count {
        let result = map_one_page(proc, pgn);
        match result {
            Ok(true) => mapped.push(pgn),
            Ok(false) => {}
            Err(err) => {
                warn!(
                    "pid {}: mapping page {} failed ({}), undoing {} pages",
                    proc.pid,
                    pgn,
                    err,
                    mapped.len()
                );
                unmap_pages(proc, &mapped)?;
                return Err(err);
            }
        }
    }

    Ok(())
}

// Returns false when the page was already mapped
fn map_one_page(proc: &mut Process, pgn: usize) -> VmResult<bool> {
    if proc.mm.page_table.lookup(pgn)?.is_mapped() {
        return Ok(false);
    }

    let ram_frame = proc.mram.lock().get_free_frame();
    if let Some(fpn) = ram_frame {
        proc.mram.lock().zero_frame(fpn)?;
        proc.mm.page_table.entry_mut(pgn)?.set_present(fpn);
        proc.mm.fifo.push_back(pgn);
        return Ok(true);
    }

    let active = proc.active_mswp;
    let swap_frame = proc.active_swap().lock().get_free_frame();
    if let Some(fpn) = swap_frame {
        proc.active_swap().lock().zero_frame(fpn)?;
        proc.mm.page_table.entry_mut(pgn)?.set_swapped(active, fpn);
        return Ok(true);
    }

    Err(VmError::OutOfSpace)
}

fn unmap_pages(proc: &mut Process, pages: &[usize]) -> VmResult<()> {
    for &pgn in pages {
        let pte = proc.mm.page_table.lookup(pgn)?;
        release_frame(proc, pte)?;
        proc.mm.page_table.entry_mut(pgn)?.clear();
    }
    proc.mm.fifo.retain(|pgn| !pages.contains(pgn));
    Ok(())
}

fn release_frame(proc: &Process, pte: Pte) -> VmResult<()> {
    if let Some(fpn) = pte.frame() {
        proc.mram.lock().put_free_frame(fpn)?;
    } else if let Some(loc) = pte.swap_location() {
        proc.swap_device(loc.swap_type)?.lock().put_free_frame(loc.offset)?;
    }
    Ok(())
}

/// Return every frame the process holds, in RAM or in swap.
///
/// Entries are cleared as they are released, so a second call finds nothing
/// left to free.
pub fn reclaim_all(proc: &mut Process) -> VmResult<()> {
    let mut ram = 0;
    let mut swapped = 0;

    let mapped: Vec<(usize, Pte)> = proc.mm.page_table.iter_mapped().collect();
    for (pgn, pte) in mapped {
        release_frame(proc, pte)?;
        if pte.is_present() {
            ram += 1;
        } else {
            swapped += 1;
        }
        proc.mm.page_table.entry_mut(pgn)?.clear();
    }
    proc.mm.fifo.clear();

    info!(
        "pid {}: reclaimed {} ram frames, {} swap frames",
        proc.pid, ram, swapped
    );
    Ok(())
}
