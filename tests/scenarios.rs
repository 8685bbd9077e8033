//! End-to-end behaviour of the paging VM manager through its public API.

use paging_vmm::page_table::Pte;
use paging_vmm::vm::{alloc, inc_vma_limit};
use paging_vmm::{
    MemPhy, MmConfig, Process, ReadyQueue, RegionRange, VmError, alloc_region, free_region,
    read_region, reclaim_all, write_region,
};

const PAGE: usize = 4096;

fn config(ram_frames: usize, swap_frames: usize) -> MmConfig {
    MmConfig::from_toml_str(&format!(
        "page_bits = 12\nmax_pages = 256\nram_size = {}\nswap_sizes = [{}]\n",
        ram_frames * PAGE,
        swap_frames * PAGE
    ))
    .unwrap()
}

fn pte(proc: &Process, pgn: usize) -> Pte {
    proc.mm.page_table.lookup(pgn).unwrap()
}

fn free_ranges(proc: &Process) -> Vec<RegionRange> {
    proc.mm
        .vma(0)
        .unwrap()
        .free_list
        .iter()
        .filter(|r| !r.is_empty())
        .collect()
}

#[test]
fn alloc_free_reuse_walkthrough() {
    let mut proc = Process::with_pools(1, 0, config(8, 8)).unwrap();
    proc.mm.vma_mut(0).unwrap().vm_end = PAGE;

    // Region 0 comes from growing at the break pointer
    assert_eq!(alloc_region(&mut proc, 100, 0), Ok(0));
    assert_eq!(proc.mm.region(0).unwrap().range, RegionRange::new(0, 100));
    assert_eq!(proc.mm.vma(0).unwrap().sbrk, PAGE);

    // Too big for the slack, so the VMA grows and region 1 lands at the old break
    assert_eq!(alloc_region(&mut proc, 5000, 1), Ok(PAGE));
    assert_eq!(
        proc.mm.region(1).unwrap().range,
        RegionRange::new(PAGE, PAGE + 5000)
    );
    let vma = proc.mm.vma(0).unwrap();
    assert_eq!((vma.vm_start, vma.vm_end, vma.sbrk), (0, 3 * PAGE, 3 * PAGE));

    free_region(&mut proc, 0).unwrap();
    assert!(free_ranges(&proc).contains(&RegionRange::new(0, 100)));

    // First fit takes the front of the freed range
    assert_eq!(alloc_region(&mut proc, 50, 2), Ok(0));
    assert_eq!(free_ranges(&proc)[0], RegionRange::new(50, 100));
}

#[test]
fn free_and_live_ranges_stay_disjoint() {
    let mut proc = Process::with_pools(1, 0, config(16, 16)).unwrap();
    let sizes = [100, 5000, 30, 4096, 700, 1, 9000, 250];

    for (rgid, &size) in sizes.iter().enumerate() {
        alloc_region(&mut proc, size, rgid).unwrap();
    }
    for rgid in [1, 3, 6] {
        free_region(&mut proc, rgid).unwrap();
    }
    for (rgid, size) in [(10, 4000), (11, 60), (12, 3000)] {
        alloc_region(&mut proc, size, rgid).unwrap();
    }

    let live: Vec<RegionRange> = proc.mm.regions().map(|(_, r)| r.range).collect();
    let free = free_ranges(&proc);
    let all: Vec<&RegionRange> = live.iter().chain(free.iter()).collect();
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            assert!(!a.overlaps(b), "{} overlaps {}", a, b);
        }
    }

    // Together they cover exactly the space handed out by growth
    let covered: usize = all.iter().map(|r| r.len()).sum();
    assert_eq!(covered, proc.mm.vma(0).unwrap().sbrk);
}

#[test]
fn fifo_evicts_oldest_resident_page() {
    let mut proc = Process::with_pools(1, 0, config(3, 8)).unwrap();
    alloc_region(&mut proc, 4 * PAGE, 0).unwrap();

    // Pages 0, 1, 2 were loaded in that order; page 3 did not fit in RAM
    assert_eq!(proc.mm.fifo, [0, 1, 2]);
    assert!(pte(&proc, 3).is_swapped());

    read_region(&mut proc, 0, 3 * PAGE).unwrap();
    assert!(pte(&proc, 0).is_swapped());
    assert_eq!(proc.mm.fifo, [1, 2, 3]);

    // Reloading page 0 evicts page 1 and makes page 0 the youngest
    read_region(&mut proc, 0, 0).unwrap();
    assert!(pte(&proc, 1).is_swapped());
    assert_eq!(proc.mm.fifo, [2, 3, 0]);

    read_region(&mut proc, 0, PAGE).unwrap();
    assert!(pte(&proc, 2).is_swapped());
    read_region(&mut proc, 0, 2 * PAGE).unwrap();
    assert!(pte(&proc, 3).is_swapped());
    assert!(pte(&proc, 0).is_present());

    read_region(&mut proc, 0, 3 * PAGE).unwrap();
    assert!(pte(&proc, 0).is_swapped());
}

#[test]
fn bytes_survive_eviction() {
    let mut proc = Process::with_pools(1, 0, config(2, 8)).unwrap();
    alloc_region(&mut proc, 5 * PAGE, 0).unwrap();

    for page in 0..5 {
        write_region(&mut proc, 0, page * PAGE + 17, page as u8 + 1).unwrap();
    }
    // Only two pages fit in RAM, so most of these reads fault
    for page in (0..5).rev() {
        assert_eq!(read_region(&mut proc, 0, page * PAGE + 17), Ok(page as u8 + 1));
    }
    for page in 0..5 {
        assert_eq!(read_region(&mut proc, 0, page * PAGE + 17), Ok(page as u8 + 1));
        assert_eq!(read_region(&mut proc, 0, page * PAGE + 18), Ok(0));
    }
}

#[test]
fn growth_is_page_granular_and_monotonic() {
    let mut proc = Process::with_pools(1, 0, config(16, 16)).unwrap();
    let mut last = (0, 0);

    for inc in [1, PAGE, PAGE + 1, 3 * PAGE - 7] {
        let area = inc_vma_limit(&mut proc, 0, inc).unwrap();
        assert_eq!(area.len(), inc.div_ceil(PAGE) * PAGE);

        let vma = proc.mm.vma(0).unwrap();
        assert!(vma.sbrk >= last.0 && vma.vm_end >= last.1);
        assert_eq!(vma.sbrk, area.end);
        last = (vma.sbrk, vma.vm_end);
    }

    // A failed growth leaves the bounds alone
    proc.mm.add_vma(last.0 + PAGE, last.0 + 2 * PAGE).unwrap();
    assert_eq!(inc_vma_limit(&mut proc, 0, 2 * PAGE), Err(VmError::Overlap));
    let vma = proc.mm.vma(0).unwrap();
    assert_eq!((vma.sbrk, vma.vm_end), last);
}

#[test]
fn growth_failure_surfaces_from_alloc() {
    let mut proc = Process::with_pools(1, 0, config(1, 1)).unwrap();
    alloc_region(&mut proc, PAGE, 0).unwrap();
    alloc_region(&mut proc, PAGE, 1).unwrap();
    assert_eq!(alloc_region(&mut proc, 1, 2), Err(VmError::OutOfSpace));

    let vma1 = proc.mm.add_vma(2 * PAGE, 2 * PAGE).unwrap();
    assert_eq!(alloc(&mut proc, 0, 3, 10), Err(VmError::OutOfSpace));
    assert_eq!(alloc(&mut proc, vma1, 3, 10), Err(VmError::OutOfSpace));
}

#[test]
fn reclaim_all_twice_on_shared_pools() {
    let cfg = config(4, 4);
    let ram = MemPhy::shared(4 * PAGE, PAGE);
    let swap = MemPhy::shared(4 * PAGE, PAGE);
    let mut a = Process::new(1, 0, cfg.clone(), ram.clone(), vec![swap.clone()]).unwrap();
    let mut b = Process::new(2, 0, cfg, ram.clone(), vec![swap.clone()]).unwrap();

    alloc_region(&mut a, 3 * PAGE, 0).unwrap();
    alloc_region(&mut b, 3 * PAGE, 0).unwrap();
    assert_eq!(ram.lock().free_count(), 0);
    assert_eq!(swap.lock().free_count(), 2);

    reclaim_all(&mut a).unwrap();
    assert_eq!(ram.lock().free_count(), 3);
    assert_eq!(swap.lock().free_count(), 2);
    assert_eq!(a.mm.page_table.iter_mapped().count(), 0);

    // Nothing left to return; b's frames are untouched
    reclaim_all(&mut a).unwrap();
    assert_eq!(ram.lock().free_count(), 3);
    assert_eq!(swap.lock().free_count(), 2);
    assert_eq!(read_region(&mut b, 0, 0), Ok(0));

    reclaim_all(&mut b).unwrap();
    assert_eq!(ram.lock().free_count(), 4);
    assert_eq!(swap.lock().free_count(), 4);
}

#[test]
fn ready_queue_orders_processes() {
    let mut queue = ReadyQueue::new();
    for (pid, priority) in [(1, 3), (2, 1), (3, 2), (4, 5), (5, 5)] {
        queue.insert(Process::with_pools(pid, priority, config(1, 1)).unwrap());
    }

    let order: Vec<u32> = std::iter::from_fn(|| queue.remove_highest_priority())
        .map(|proc| proc.pid)
        .collect();
    assert_eq!(order, vec![4, 5, 1, 3, 2]);
    assert!(queue.is_empty());
}
