use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{VmError, VmResult};

/// RAM and swap pools are shared by every process on the machine.
pub type SharedMemPhy = Arc<Mutex<MemPhy>>;

/// A physical byte store cut into fixed-size frames, used for both RAM and
/// swap devices.
pub struct MemPhy {
    storage: Vec<u8>,
    frame_size: usize,
    free_frames: VecDeque<usize>,
    allocated: Vec<bool>,
}

impl MemPhy {
    /// Create a zeroed pool of `size` bytes with every frame free
    pub fn new(size: usize, frame_size: usize) -> Self {
        let num_frames = size / frame_size;
        MemPhy {
            storage: vec![0u8; size],
            frame_size,
            free_frames: (0..num_frames).collect(),
            allocated: vec![false; num_frames],
        }
    }

    pub fn shared(size: usize, frame_size: usize) -> SharedMemPhy {
        Arc::new(Mutex::new(Self::new(size, frame_size)))
    }

    #[inline]
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.allocated.len()
    }

    #[inline]
    pub fn free_count(&self) -> usize {
        self.free_frames.len()
    }

    /// Take a free frame, lowest-numbered first on a fresh pool.
    pub fn get_free_frame(&mut self) -> Option<usize> {
        let fpn = self.free_frames.pop_front()?;
        self.allocated[fpn] = true;
        Some(fpn)
    }

    /// Return a frame to the head of the free list.
    pub fn put_free_frame(&mut self, fpn: usize) -> VmResult<()> {
        match self.allocated.get_mut(fpn) {
            Some(slot) if *slot => {
                *slot = false;
                self.free_frames.push_front(fpn);
                Ok(())
            }
            _ => Err(VmError::InvalidFrame(fpn)),
        }
    }

    #[inline]
    pub fn read(&self, addr: usize) -> VmResult<u8> {
        self.storage.get(addr).copied().ok_or(VmError::InvalidFrame(addr))
    }

    #[inline]
    pub fn write(&mut self, addr: usize, value: u8) -> VmResult<()> {
        let byte = self
            .storage
            .get_mut(addr)
            .ok_or(VmError::InvalidFrame(addr))?;
        *byte = value;
        Ok(())
    }

    /// Copy out the contents of one frame
    pub fn read_frame(&self, fpn: usize) -> VmResult<Vec<u8>> {
        let range = self.frame_range(fpn)?;
        Ok(self.storage[range].to_vec())
    }

    /// Overwrite one frame. `data` shorter than a frame leaves the tail as is.
    pub fn write_frame(&mut self, fpn: usize, data: &[u8]) -> VmResult<()> {
        let range = self.frame_range(fpn)?;
        let len = data.len().min(self.frame_size);
        self.storage[range][..len].copy_from_slice(&data[..len]);
        Ok(())
    }

    pub fn zero_frame(&mut self, fpn: usize) -> VmResult<()> {
        let range = self.frame_range(fpn)?;
        self.storage[range].fill(0);
        Ok(())
    }

    /// List every non-zero byte as `addr: value` lines.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (addr, &value) in self.storage.iter().enumerate() {
            if value != 0 {
                let _ = writeln!(out, "{:#010x}: {:#04x}", addr, value);
            }
        }
        out
    }

    fn frame_range(&self, fpn: usize) -> VmResult<std::ops::Range<usize>> {
        if fpn >= self.num_frames() {
            return Err(VmError::InvalidFrame(fpn));
        }
        let start = fpn * self.frame_size;
        Ok(start..start + self.frame_size)
    }
}

/// Copy frame `src_fpn` of `src` into frame `dst_fpn` of `dst`.
pub fn swap_copy_page(
    src: &SharedMemPhy,
    src_fpn: usize,
    dst: &SharedMemPhy,
    dst_fpn: usize,
) -> VmResult<()> {
    // Read into a buffer first so src and dst are never locked together
    let data = src.lock().read_frame(src_fpn)?;
    dst.lock().write_frame(dst_fpn, &data)
}
