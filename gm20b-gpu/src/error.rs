// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! GPU error types.
//!
//! Guest-data anomalies (bad macro code, exhausted arguments, odd register
//! values) never surface here: they are logged and contained inside the
//! engine. Only host-side failures propagate.

use thiserror::Error;

/// Guest memory access error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("unmapped GPU address: 0x{0:010X}")]
    Unmapped(u64),
    #[error("guest memory access out of bounds: addr=0x{addr:X}, len=0x{len:X}")]
    OutOfBounds { addr: u64, len: usize },
}

/// Failure reported by the downstream state sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend lost: {0}")]
    DeviceLost(String),
    #[error("backend submission failed: {0}")]
    SubmitFailed(String),
}

/// Error returned from engine dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpuError {
    #[error("state sink error: {0}")]
    Backend(#[from] BackendError),
    #[error("guest memory error: {0}")]
    Memory(#[from] MemoryError),
}

pub type Result<T, E = GpuError> = std::result::Result<T, E>;
