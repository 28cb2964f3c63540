// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! GPU virtual address space manager.
//!
//! Maps GPU virtual addresses (40-bit, 1 TiB) onto a backing guest memory
//! using a 2-level page table with 4 KB pages. Semaphore releases and
//! pushbuffer fetches go through here.
//!
//! Layout: `[L0: 14 bits][L1: 14 bits][Offset: 12 bits]` = 40 bits total.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::MemoryError;
use crate::guest_memory::GuestMemory;

const PAGE_BITS: u32 = 12;
const PAGE_SIZE: u64 = 1 << PAGE_BITS;
const L1_BITS: u32 = 14;
const L0_BITS: u32 = 14;
const L1_SIZE: usize = 1 << L1_BITS;

/// Sentinel for unmapped pages.
const INVALID_ENTRY: u64 = u64::MAX;

type PageTable = Vec<Option<Box<[u64; L1_SIZE]>>>;

/// GPU virtual memory manager with a 2-level page table.
pub struct GpuMemoryManager {
    page_table: RwLock<PageTable>,
    backing: Arc<dyn GuestMemory>,
}

impl GpuMemoryManager {
    pub fn new(backing: Arc<dyn GuestMemory>) -> Self {
        let l0_size = 1 << L0_BITS;
        let mut page_table = Vec::with_capacity(l0_size);
        page_table.resize_with(l0_size, || None);
        Self {
            page_table: RwLock::new(page_table),
            backing,
        }
    }

    /// Map a contiguous range of GPU VA to guest addresses.
    pub fn map(&self, gpu_va: u64, guest_addr: u64, size: u64) {
        let mut table = self.page_table.write();
        let mut offset = 0u64;
        while offset < size {
            set_entry(&mut table, gpu_va + offset, guest_addr + offset);
            offset += PAGE_SIZE;
        }
        log::trace!(
            "gpu_mm: map GPU 0x{:X}..0x{:X} -> 0x{:X}",
            gpu_va,
            gpu_va + size,
            guest_addr
        );
    }

    /// Translate a GPU VA to a guest address.
    pub fn translate(&self, gpu_va: u64) -> Option<u64> {
        let entry = get_entry(&self.page_table.read(), gpu_va);
        if entry == INVALID_ENTRY {
            None
        } else {
            Some(entry + (gpu_va & (PAGE_SIZE - 1)))
        }
    }

    /// Walk `[gpu_va, gpu_va + len)` page by page, handing each translated
    /// chunk to `f` as `(guest_addr, offset_in_request, chunk_len)`.
    fn for_each_chunk(
        &self,
        gpu_va: u64,
        len: usize,
        mut f: impl FnMut(u64, usize, usize) -> Result<(), MemoryError>,
    ) -> Result<(), MemoryError> {
        let mut offset = 0usize;
        while offset < len {
            let va = gpu_va + offset as u64;
            let page_off = (va & (PAGE_SIZE - 1)) as usize;
            let chunk = std::cmp::min(len - offset, PAGE_SIZE as usize - page_off);
            let guest_addr = self.translate(va).ok_or(MemoryError::Unmapped(va))?;
            f(guest_addr, offset, chunk)?;
            offset += chunk;
        }
        Ok(())
    }
}

impl GuestMemory for GpuMemoryManager {
    fn read(&self, gpu_va: u64, dst: &mut [u8]) -> Result<(), MemoryError> {
        let len = dst.len();
        self.for_each_chunk(gpu_va, len, |addr, off, chunk| {
            self.backing.read(addr, &mut dst[off..off + chunk])
        })
    }

    fn write(&self, gpu_va: u64, src: &[u8]) -> Result<(), MemoryError> {
        self.for_each_chunk(gpu_va, src.len(), |addr, off, chunk| {
            self.backing.write(addr, &src[off..off + chunk])
        })
    }
}

fn l0_index(gpu_va: u64) -> usize {
    ((gpu_va >> (L1_BITS + PAGE_BITS)) & ((1 << L0_BITS) - 1)) as usize
}

fn l1_index(gpu_va: u64) -> usize {
    ((gpu_va >> PAGE_BITS) & ((1 << L1_BITS) - 1)) as usize
}

fn set_entry(table: &mut PageTable, gpu_va: u64, guest_page_addr: u64) {
    let l1 = table[l0_index(gpu_va)].get_or_insert_with(|| Box::new([INVALID_ENTRY; L1_SIZE]));
    l1[l1_index(gpu_va)] = guest_page_addr & !(PAGE_SIZE - 1);
}

fn get_entry(table: &PageTable, gpu_va: u64) -> u64 {
    match &table[l0_index(gpu_va)] {
        Some(l1) => l1[l1_index(gpu_va)],
        None => INVALID_ENTRY,
    }
}
