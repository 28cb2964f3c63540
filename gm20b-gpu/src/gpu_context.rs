// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Central GPU context.
//!
//! Owns the GPU memory manager, syncpoint manager, command processor, and
//! GPFIFO submission queue. Producers push GPFIFO entries via
//! `submit_gpfifo()`, and the consumer drains the queue via `flush()`.

use std::sync::Arc;

use gm20b_common::EngineSettings;
use parking_lot::Mutex;

use crate::backend::StateSink;
use crate::command_processor::{CommandProcessor, GpEntry};
use crate::engines::maxwell_3d::Maxwell3D;
use crate::engines::Engine;
use crate::error::Result;
use crate::guest_memory::GuestMemory;
use crate::memory_manager::GpuMemoryManager;
use crate::syncpoint::SyncpointManager;

/// Subchannel the 3D engine is bound to.
pub const THREED_SUBCHANNEL: u32 = 0;

/// GPU state shared between command producers and the consumer loop.
pub struct GpuContext {
    pub memory_manager: Arc<GpuMemoryManager>,
    pub syncpoints: Arc<SyncpointManager>,
    command_processor: Mutex<CommandProcessor>,
    gpfifo_queue: Mutex<Vec<GpEntry>>,
}

impl GpuContext {
    /// Build a context over `backing` with Maxwell 3D on subchannel 0,
    /// reporting state changes to `sink`.
    pub fn new(
        settings: &EngineSettings,
        backing: Arc<dyn GuestMemory>,
        sink: Box<dyn StateSink>,
    ) -> Self {
        let memory_manager = Arc::new(GpuMemoryManager::new(backing));
        let syncpoints = Arc::new(SyncpointManager::new());

        let threed = Maxwell3D::new(settings, sink, memory_manager.clone(), syncpoints.clone());
        let engines: Vec<Option<Box<dyn Engine>>> = vec![Some(Box::new(threed))];

        Self {
            memory_manager,
            syncpoints,
            command_processor: Mutex::new(CommandProcessor::new(engines)),
            gpfifo_queue: Mutex::new(Vec::new()),
        }
    }

    /// Queue GPFIFO entries for processing.
    pub fn submit_gpfifo(&self, entries: Vec<GpEntry>) {
        log::debug!("GpuContext: submit_gpfifo {} entries", entries.len());
        self.gpfifo_queue.lock().extend(entries);
    }

    /// Number of entries waiting for `flush`.
    pub fn pending_entries(&self) -> usize {
        self.gpfifo_queue.lock().len()
    }

    /// Process all queued GPFIFO entries. Pushbuffers are read through the
    /// GPU MMU.
    pub fn flush(&self) -> Result<()> {
        let entries = std::mem::take(&mut *self.gpfifo_queue.lock());
        if entries.is_empty() {
            return Ok(());
        }

        log::debug!("GpuContext: flush {} GPFIFO entries", entries.len());
        let mut proc = self.command_processor.lock();
        proc.process_entries(&entries, self.memory_manager.as_ref())
    }

    /// Copy of the live registers of the engine on `subchannel`.
    pub fn engine_registers(&self, subchannel: u32) -> Option<Vec<u32>> {
        let proc = self.command_processor.lock();
        proc.engine(subchannel).map(|engine| engine.registers().to_vec())
    }
}
