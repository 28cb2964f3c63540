// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use gm20b_common::types::{align_up, PAGE_MASK, PAGE_SIZE_U64};
use gm20b_gpu::backend::StateSink;
use gm20b_gpu::command_processor::GpEntry;
use gm20b_gpu::engines::maxwell_3d::registers::{describe, RegisterFile};
use gm20b_gpu::engines::maxwell_3d::types::ClearBuffers;
use gm20b_gpu::error::BackendError;
use gm20b_gpu::gpu_context::{GpuContext, THREED_SUBCHANNEL};
use gm20b_gpu::guest_memory::{GuestMemory, VecGuestMemory};

/// gm20b - Maxwell 3D pushbuffer replay
#[derive(Parser, Debug)]
#[command(name = "gm20b", version, about = "Replays Maxwell 3D pushbuffers through the engine")]
struct Args {
    /// Pushbuffer to replay (little-endian 32-bit words)
    #[arg(short, long)]
    trace: PathBuf,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print every live register that differs from its reset value
    #[arg(long)]
    dump: bool,
}

/// Sink that logs what the engine reports and keeps counts for the summary.
#[derive(Default)]
struct LoggingSink {
    loud: bool,
    changes: u64,
    flushes: u64,
    clears: u64,
}

impl LoggingSink {
    fn new(loud: bool) -> Self {
        Self {
            loud,
            ..Self::default()
        }
    }

    fn report(&self, message: std::fmt::Arguments) {
        if self.loud {
            info!("{}", message);
        } else {
            log::debug!("{}", message);
        }
    }
}

impl StateSink for LoggingSink {
    fn name(&self) -> &str {
        "logging"
    }

    fn notify_state_changed(
        &mut self,
        _regs: &RegisterFile,
        range: Range<u32>,
    ) -> std::result::Result<(), BackendError> {
        self.changes += 1;
        self.report(format_args!("state: {} ({} words)", describe(range.start), range.len()));
        Ok(())
    }

    fn flush_pending_work(&mut self) -> std::result::Result<(), BackendError> {
        self.flushes += 1;
        self.report(format_args!(
            "flush #{} after {} state changes",
            self.flushes, self.changes
        ));
        Ok(())
    }

    fn clear_buffers(
        &mut self,
        regs: &RegisterFile,
        clear: ClearBuffers,
    ) -> std::result::Result<(), BackendError> {
        self.clears += 1;
        self.report(format_args!(
            "clear {:?} rt={} layer={} color={:?} depth={}",
            clear.components,
            clear.render_target,
            clear.layer,
            regs.clear_color(),
            regs.clear_depth()
        ));
        Ok(())
    }
}

impl Drop for LoggingSink {
    fn drop(&mut self) {
        info!(
            "Sink: {} state changes, {} flushes, {} clears",
            self.changes, self.flushes, self.clears
        );
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    info!("gm20b - Maxwell 3D pushbuffer replay");

    let settings = config::load_config(args.config.as_ref());
    info!(
        "Macro step limit 0x{:X}, guest memory 0x{:X} bytes",
        settings.macro_step_limit, settings.memory_size
    );

    let trace = std::fs::read(&args.trace)
        .with_context(|| format!("Failed to read trace: {}", args.trace.display()))?;
    if trace.len() % 4 != 0 {
        anyhow::bail!(
            "Trace {} is {} bytes, not a whole number of words",
            args.trace.display(),
            trace.len()
        );
    }
    let word_count = trace.len() / 4;

    // Identity-map guest memory and place the trace at the top of it.
    let top = settings.memory_size & !PAGE_MASK;
    let trace_base = top
        .checked_sub(align_up(trace.len() as u64, PAGE_SIZE_U64))
        .with_context(|| {
            format!(
                "Trace of {} bytes does not fit in 0x{:X} bytes of guest memory",
                trace.len(),
                settings.memory_size
            )
        })?;
    let memory_size = usize::try_from(top).context("Guest memory size exceeds host address space")?;

    let backing = Arc::new(VecGuestMemory::new(memory_size));
    backing
        .write(trace_base, &trace)
        .context("Failed to copy trace into guest memory")?;

    let sink = LoggingSink::new(settings.use_debug_logging);
    let ctx = GpuContext::new(&settings, backing, Box::new(sink));
    ctx.memory_manager.map(0, 0, top);

    let entries = gpfifo_entries(trace_base, word_count);
    info!(
        "Replaying {} words from {} as {} GPFIFO entries",
        word_count,
        args.trace.display(),
        entries.len()
    );
    ctx.submit_gpfifo(entries);
    ctx.flush().context("Pushbuffer replay failed")?;

    if args.dump {
        let regs = ctx
            .engine_registers(THREED_SUBCHANNEL)
            .context("No engine bound to the 3D subchannel")?;
        dump_registers(&regs);
    }

    info!("Replay finished");
    Ok(())
}

/// Split `word_count` words at `base` into GPFIFO entries of legal length.
fn gpfifo_entries(base: u64, word_count: usize) -> Vec<GpEntry> {
    let max = GpEntry::MAX_LENGTH as usize;
    (0..word_count)
        .step_by(max)
        .map(|start| {
            let len = (word_count - start).min(max);
            GpEntry::new(base + start as u64 * 4, len as u32)
        })
        .collect()
}

fn dump_registers(regs: &[u32]) {
    let defaults = RegisterFile::with_defaults();
    for (offset, (&value, &default)) in regs.iter().zip(defaults.words().iter()).enumerate() {
        if value != default {
            println!("{:<32} 0x{:08X}", describe(offset as u32), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpfifo_entries_split_long_traces() {
        let max = GpEntry::MAX_LENGTH as usize;
        let entries = gpfifo_entries(0x1000, max + 10);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].address(), 0x1000);
        assert_eq!(entries[0].length(), GpEntry::MAX_LENGTH);
        assert_eq!(entries[1].address(), 0x1000 + max as u64 * 4);
        assert_eq!(entries[1].length(), 10);
        assert!(gpfifo_entries(0, 0).is_empty());
    }
}
