// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! GPU tick source for semaphore timestamps.

use std::time::Instant;

use gm20b_common::types::ns_to_gpu_ticks;

/// Converts elapsed host time to 19.2 MHz GPU ticks.
///
/// Every emitted tick is strictly greater than the one before it, even when
/// two releases land within the same host clock tick. Semaphore records
/// carry the low 32 bits, which wrap after roughly 223 seconds.
pub struct GpuTimer {
    start: Instant,
    last: Option<u64>,
}

impl GpuTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            last: None,
        }
    }

    pub fn tick(&mut self) -> u64 {
        let now = ns_to_gpu_ticks(self.start.elapsed().as_nanos() as u64);
        let tick = match self.last {
            Some(last) => now.max(last + 1),
            None => now,
        };
        self.last = Some(tick);
        tick
    }
}

impl Default for GpuTimer {
    fn default() -> Self {
        Self::new()
    }
}
