// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Guest memory interface consumed by the GPU.
//!
//! The engine only ever writes semaphore results and reads pushbuffers, so
//! the trait stays small. Both methods take `&self`: implementations handle
//! their own interior locking so they can be shared between the context and
//! the engines.

use parking_lot::Mutex;

use crate::error::MemoryError;

/// Byte-addressable guest memory.
pub trait GuestMemory: Send + Sync {
    fn read(&self, addr: u64, dst: &mut [u8]) -> Result<(), MemoryError>;
    fn write(&self, addr: u64, src: &[u8]) -> Result<(), MemoryError>;
}

/// Contiguous guest RAM starting at address 0.
pub struct VecGuestMemory {
    mem: Mutex<Vec<u8>>,
}

impl VecGuestMemory {
    pub fn new(size_bytes: usize) -> Self {
        Self {
            mem: Mutex::new(vec![0u8; size_bytes]),
        }
    }

    pub fn len(&self) -> usize {
        self.mem.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy a range out of memory. Panics on out-of-range input; test helper.
    pub fn snapshot(&self, addr: u64, len: usize) -> Vec<u8> {
        let start = addr as usize;
        self.mem.lock()[start..start + len].to_vec()
    }

    fn range(&self, addr: u64, len: usize) -> Result<std::ops::Range<usize>, MemoryError> {
        let err = MemoryError::OutOfBounds { addr, len };
        let start = usize::try_from(addr).map_err(|_| err.clone())?;
        let end = start.checked_add(len).ok_or_else(|| err.clone())?;
        if end > self.len() {
            return Err(err);
        }
        Ok(start..end)
    }
}

impl GuestMemory for VecGuestMemory {
    fn read(&self, addr: u64, dst: &mut [u8]) -> Result<(), MemoryError> {
        let range = self.range(addr, dst.len())?;
        dst.copy_from_slice(&self.mem.lock()[range]);
        Ok(())
    }

    fn write(&self, addr: u64, src: &[u8]) -> Result<(), MemoryError> {
        let range = self.range(addr, src.len())?;
        self.mem.lock()[range].copy_from_slice(src);
        Ok(())
    }
}
