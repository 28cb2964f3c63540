// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Host1x syncpoints.
//!
//! Each syncpoint is a monotonically increasing 32-bit counter. The 3D engine
//! increments them through the `syncpointAction` register once outstanding
//! host work has been flushed, and host threads block on them until a
//! threshold is reached.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Number of hardware syncpoints on Tegra X1.
pub const NUM_SYNCPOINTS: usize = 192;

pub struct SyncpointManager {
    values: Box<[AtomicU32]>,
    /// Guards the wait/notify handshake; the counters themselves are atomic.
    wait_lock: Mutex<()>,
    changed: Condvar,
}

impl SyncpointManager {
    pub fn new() -> Self {
        Self {
            values: (0..NUM_SYNCPOINTS).map(|_| AtomicU32::new(0)).collect(),
            wait_lock: Mutex::new(()),
            changed: Condvar::new(),
        }
    }

    /// Increment a syncpoint and wake waiters. Returns the new value, or
    /// `None` for an out-of-range id.
    pub fn increment(&self, id: u32) -> Option<u32> {
        let Some(value) = self.values.get(id as usize) else {
            log::warn!("syncpoint: increment out of range id={}", id);
            return None;
        };

        let new_val = {
            let _guard = self.wait_lock.lock();
            value.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
        };
        self.changed.notify_all();
        log::trace!("syncpoint[{}] incremented to {}", id, new_val);
        Some(new_val)
    }

    /// Current value of a syncpoint (0 for out-of-range ids).
    pub fn value(&self, id: u32) -> u32 {
        self.values
            .get(id as usize)
            .map_or(0, |v| v.load(Ordering::Acquire))
    }

    /// Block until a syncpoint reaches `threshold` or `timeout` expires.
    /// Returns `true` if the threshold was reached.
    pub fn wait(&self, id: u32, threshold: u32, timeout: Duration) -> bool {
        let Some(value) = self.values.get(id as usize) else {
            return false;
        };

        let deadline = Instant::now() + timeout;
        let mut guard = self.wait_lock.lock();
        loop {
            if syncpoint_reached(value.load(Ordering::Acquire), threshold) {
                return true;
            }
            if self.changed.wait_until(&mut guard, deadline).timed_out() {
                return syncpoint_reached(value.load(Ordering::Acquire), threshold);
            }
        }
    }
}

impl Default for SyncpointManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap-aware threshold check: `(value - threshold) as i32 >= 0`.
fn syncpoint_reached(value: u32, threshold: u32) -> bool {
    (value.wrapping_sub(threshold) as i32) >= 0
}
