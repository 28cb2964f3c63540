// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Downstream state sink.
//!
//! The engine decides what register state changed and when; a sink turns
//! that into host graphics work. Sinks are notified synchronously and may
//! queue heavier work internally, which `flush_pending_work` must drain.

pub mod null_backend;

use std::ops::Range;

use crate::engines::maxwell_3d::registers::RegisterFile;
use crate::engines::maxwell_3d::types::ClearBuffers;
use crate::error::BackendError;

/// Sink for Maxwell 3D state changes.
///
/// Everything except `name` has a default no-op implementation so that a
/// sink only overrides what it consumes.
pub trait StateSink: Send {
    fn name(&self) -> &str;

    /// Live register state changed within `range` (word offsets).
    fn notify_state_changed(
        &mut self,
        _regs: &RegisterFile,
        _range: Range<u32>,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    /// Drain any deferred work. Called on wait-for-idle and syncpoint actions.
    fn flush_pending_work(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Clear the selected surfaces using the current clear values.
    fn clear_buffers(
        &mut self,
        _regs: &RegisterFile,
        _clear: ClearBuffers,
    ) -> Result<(), BackendError> {
        Ok(())
    }
}
