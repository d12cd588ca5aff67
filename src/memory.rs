//! `MemInst` (Data Model §3): a page-granular linear buffer behind a lock, optionally shared,
//! with an atomics waitlist when it is.
//!
//! Wasm defines a memory's size in 64KiB pages; this module is the only place that constant
//! matters, everything above it works in bytes.

use alloc::sync::Arc;
use alloc::vec;
use core::ops::Range;
use std::sync::RwLock;

use waspvm_core::{Trap, TrapCode};

use crate::atomics::WaiterListTable;
use crate::types::MemoryType;

pub const PAGE_SIZE: u32 = 65536;

pub struct MemInst {
    ty: MemoryType,
    /// `RwLock` rather than a raw pointer: per §4.3, growing takes the write lock for the whole
    /// resize so concurrent accessors either observe the memory before or after the grow, never
    /// a torn in-between state; a cached byte *index* stays valid across a grow, a cached byte
    /// *slice* does not and must be re-derived (the Rust-idiomatic analogue of the `movedp`
    /// pointer-invalidation contract the host language this was ported from used).
    bytes: RwLock<alloc::vec::Vec<u8>>,
    waiters: Option<Arc<WaiterListTable>>,
}

impl core::fmt::Debug for MemInst {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemInst")
            .field("ty", &self.ty)
            .field("pages", &self.current_pages())
            .finish()
    }
}

impl MemInst {
    pub fn new(ty: MemoryType) -> Self {
        let initial_len = ty.limits.min as usize * PAGE_SIZE as usize;
        MemInst {
            ty,
            bytes: RwLock::new(vec![0u8; initial_len]),
            waiters: ty.shared.then(|| Arc::new(WaiterListTable::new())),
        }
    }

    pub fn ty(&self) -> MemoryType {
        self.ty
    }

    pub fn current_pages(&self) -> u32 {
        (self.bytes.read().unwrap_or_else(|e| e.into_inner()).len() / PAGE_SIZE as usize) as u32
    }

    pub fn waiters(&self) -> Option<&Arc<WaiterListTable>> {
        self.waiters.as_ref()
    }

    /// `memory.grow`: returns the previous page count on success, or `u32::MAX` (the `-1` sentinel
    /// as an unsigned `i32` result) on failure. Holds the write lock for the whole resize so a
    /// shared memory's growth is atomic with respect to concurrent accessors (§4.3).
    pub fn grow(&self, delta_pages: u32) -> u32 {
        let mut bytes = self.bytes.write().unwrap_or_else(|e| e.into_inner());
        let current_pages = (bytes.len() / PAGE_SIZE as usize) as u32;
        let new_pages = match current_pages.checked_add(delta_pages) {
            Some(n) => n,
            None => return u32::MAX,
        };
        let max = self.ty.limits.max.unwrap_or(65536); // 65536 pages = 4GiB hard ceiling for a 32-bit memory
        if new_pages > max {
            return u32::MAX;
        }
        let new_len = new_pages as usize * PAGE_SIZE as usize;
        bytes.resize(new_len, 0);
        current_pages
    }

    /// Validates `base + offset + size <= len` using 64-bit arithmetic (§3 invariant), returning
    /// the checked byte range on success or an `OutOfBoundsMemoryAccess` trap.
    fn checked_range(&self, len: usize, base: u32, offset: u64, size: u64) -> Result<Range<usize>, Trap> {
        let start = (base as u64)
            .checked_add(offset)
            .ok_or_else(|| Trap::from(TrapCode::OutOfBoundsMemoryAccess))?;
        let end = start
            .checked_add(size)
            .ok_or_else(|| Trap::from(TrapCode::OutOfBoundsMemoryAccess))?;
        if end > len as u64 {
            return Err(Trap::from(TrapCode::OutOfBoundsMemoryAccess));
        }
        Ok(start as usize..end as usize)
    }

    /// Bounds-checks `base + offset + size` against the current size without touching any
    /// bytes; used by accesses (e.g. `memory.atomic.notify`) that need the §3 bounds invariant
    /// enforced but never actually read or write memory.
    pub fn check_bounds(&self, base: u32, offset: u64, size: u64) -> Result<(), Trap> {
        let bytes = self.bytes.read().unwrap_or_else(|e| e.into_inner());
        self.checked_range(bytes.len(), base, offset, size)?;
        Ok(())
    }

    pub fn read(&self, base: u32, offset: u64, out: &mut [u8]) -> Result<(), Trap> {
        let bytes = self.bytes.read().unwrap_or_else(|e| e.into_inner());
        let range = self.checked_range(bytes.len(), base, offset, out.len() as u64)?;
        out.copy_from_slice(&bytes[range]);
        Ok(())
    }

    pub fn write(&self, base: u32, offset: u64, data: &[u8]) -> Result<(), Trap> {
        let mut bytes = self.bytes.write().unwrap_or_else(|e| e.into_inner());
        let range = self.checked_range(bytes.len(), base, offset, data.len() as u64)?;
        bytes[range].copy_from_slice(data);
        Ok(())
    }

    pub fn fill(&self, base: u32, value: u8, len: u32) -> Result<(), Trap> {
        let mut bytes = self.bytes.write().unwrap_or_else(|e| e.into_inner());
        let range = self.checked_range(bytes.len(), base, 0, len as u64)?;
        bytes[range].fill(value);
        Ok(())
    }

    pub fn copy_within(&self, dst: u32, src: u32, len: u32) -> Result<(), Trap> {
        let mut bytes = self.bytes.write().unwrap_or_else(|e| e.into_inner());
        let len_usize = len as usize;
        self.checked_range(bytes.len(), dst, 0, len as u64)?;
        self.checked_range(bytes.len(), src, 0, len as u64)?;
        bytes.copy_within(src as usize..src as usize + len_usize, dst as usize);
        Ok(())
    }

    pub fn copy_from(&self, dst: u32, src_mem: &MemInst, src: u32, len: u32) -> Result<(), Trap> {
        if core::ptr::eq(self, src_mem) {
            return self.copy_within(dst, src, len);
        }
        let src_bytes = src_mem.bytes.read().unwrap_or_else(|e| e.into_inner());
        let src_range = src_mem.checked_range(src_bytes.len(), src, 0, len as u64)?;
        let mut data = alloc::vec![0u8; len as usize];
        data.copy_from_slice(&src_bytes[src_range]);
        drop(src_bytes);
        self.write(dst, 0, &data)
    }

    pub fn init_from(&self, dst: u32, data: &[u8], src_offset: u32, len: u32) -> Result<(), Trap> {
        let src_end = (src_offset as u64)
            .checked_add(len as u64)
            .filter(|&e| e <= data.len() as u64)
            .ok_or_else(|| Trap::from(TrapCode::OutOfBoundsDataAccess))?;
        self.write(dst, 0, &data[src_offset as usize..src_end as usize])
    }

    /// Locks and reads exactly `N` little-endian bytes at a checked offset; used by the
    /// executor's atomic load/RMW/cmpxchg implementations, which need exclusive access for the
    /// whole read-modify-write even though a plain `load` only needs a read lock.
    pub fn with_exclusive<R>(
        &self,
        base: u32,
        offset: u64,
        size: u64,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, Trap> {
        let mut bytes = self.bytes.write().unwrap_or_else(|e| e.into_inner());
        let range = self.checked_range(bytes.len(), base, offset, size)?;
        Ok(f(&mut bytes[range]))
    }
}
