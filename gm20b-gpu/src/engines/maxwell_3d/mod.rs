// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Maxwell 3D engine (NV class B197): method dispatch, shadow RAM routing,
//! macro upload and invocation, and register-triggered side effects.
//!
//! Every method write goes through [`Maxwell3D::call_method`]. Methods below
//! 0xE00 address registers; methods from 0xE00 up invoke macros. A handful
//! of registers trigger work when written:
//!
//! | Method | Register                  | Effect                               |
//! |--------|---------------------------|--------------------------------------|
//! | 0x44   | waitForIdle               | sink drains pending work             |
//! | 0x45   | mme.instructionRamPointer | moves the macro upload cursor        |
//! | 0x46   | mme.instructionRamLoad    | appends one macro instruction        |
//! | 0x47   | mme.startAddressRamPointer| moves the start-address cursor       |
//! | 0x48   | mme.startAddressRamLoad   | binds a macro slot entry             |
//! | 0xB2   | syncpointAction           | sink flush, optional increment       |
//! | 0x674  | clearBuffers              | sink clear                           |
//! | 0x6C3  | semaphore info            | semaphore operation                  |
//! | 0x8C4  | firmwareCall[4]           | acknowledges at 0xD00                |

pub mod registers;
pub mod types;

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use gm20b_common::EngineSettings;

use super::{ClassId, Engine};
use crate::backend::StateSink;
use crate::error::Result;
use crate::guest_memory::GuestMemory;
use crate::macro_interpreter::{MacroExit, MacroInterpreter, MacroProcessor};
use crate::macro_store::{MacroStore, MACRO_SLOT_COUNT};
use crate::syncpoint::SyncpointManager;
use crate::timer::GpuTimer;
use registers::{method, RegisterFile, REGISTER_COUNT};
use types::{
    ClearBuffers, CounterType, MmeShadowRamControl, SemaphoreOperation, SemaphoreStructureSize,
    SyncpointAction,
};

// ── Pending macro invocation ────────────────────────────────────────────────

/// Arguments collected for a macro across consecutive method calls.
#[derive(Debug, Default, PartialEq, Eq)]
enum MacroInvocation {
    #[default]
    Idle,
    Accumulating { slot: u32, args: Vec<u32> },
}

impl MacroInvocation {
    fn take(&mut self) -> Option<(u32, Vec<u32>)> {
        match std::mem::take(self) {
            Self::Idle => None,
            Self::Accumulating { slot, args } => Some((slot, args)),
        }
    }

    /// Append to the invocation if one is pending for `slot`.
    fn append(&mut self, slot: u32, argument: u32) -> bool {
        match self {
            Self::Accumulating { slot: pending, args } if *pending == slot => {
                args.push(argument);
                true
            }
            _ => false,
        }
    }
}

// ── Engine state ────────────────────────────────────────────────────────────

/// Everything a method write can touch. Kept apart from the interpreter so a
/// running macro can write registers through `MacroProcessor`.
struct EngineState {
    regs: RegisterFile,
    shadow: RegisterFile,
    macros: MacroStore,
    sink: Box<dyn StateSink>,
    memory: Arc<dyn GuestMemory>,
    syncpoints: Arc<SyncpointManager>,
    timer: GpuTimer,
}

impl EngineState {
    /// Handle a register method (below 0xE00).
    fn write_method(&mut self, method: u32, argument: u32) -> Result<()> {
        match method {
            method::NO_OPERATION => {
                self.regs.write(method, argument);
            }
            method::WAIT_FOR_IDLE => {
                self.regs.write(method, argument);
                log::trace!("Maxwell3D: waitForIdle");
                self.sink.flush_pending_work()?;
            }
            // The registers keep the guest's words; the cursors live in the store.
            method::INSTRUCTION_RAM_POINTER => {
                self.regs.write(method, argument);
                self.macros.set_cursor(argument);
            }
            method::INSTRUCTION_RAM_LOAD => {
                self.regs.write(method, argument);
                self.macros.upload_instruction(argument);
            }
            method::START_ADDRESS_RAM_POINTER => {
                self.regs.write(method, argument);
                self.macros.set_start_cursor(argument);
            }
            method::START_ADDRESS_RAM_LOAD => {
                self.regs.write(method, argument);
                self.macros.load_start_address(argument);
            }
            method::SHADOW_RAM_CONTROL => {
                self.regs.write(method, argument);
                log::trace!(
                    "Maxwell3D: shadow RAM control {:?}",
                    MmeShadowRamControl::from_raw(argument)
                );
            }
            _ => self.routed_write(method, argument)?,
        }
        Ok(())
    }

    /// Register write honouring the shadow RAM mode in effect before it.
    fn routed_write(&mut self, method: u32, argument: u32) -> Result<()> {
        let mode = self.regs.shadow_ram_control();
        let value = match mode {
            MmeShadowRamControl::MethodTrackWithFilter => {
                self.shadow.write(method, argument);
                log::trace!(
                    "Maxwell3D: staged {} = 0x{:X}",
                    registers::describe(method),
                    argument
                );
                return Ok(());
            }
            MmeShadowRamControl::MethodTrack => {
                self.shadow.write(method, argument);
                argument
            }
            MmeShadowRamControl::MethodPassthrough => argument,
            MmeShadowRamControl::MethodReplay => self.shadow.read(method),
        };

        let Some(previous) = self.regs.write(method, value) else {
            return Ok(());
        };
        log::trace!(
            "Maxwell3D: {} = 0x{:X}",
            registers::describe(method),
            value
        );

        if previous != value {
            self.sink
                .notify_state_changed(&self.regs, registers::notify_range(method))?;
        }

        self.trigger(method, value)
    }

    fn trigger(&mut self, method: u32, value: u32) -> Result<()> {
        match method {
            method::SYNCPOINT_ACTION => {
                let action = SyncpointAction(value);
                self.sink.flush_pending_work()?;
                if action.increment() {
                    self.syncpoints.increment(action.id());
                }
            }
            method::CLEAR_BUFFERS => {
                let clear = ClearBuffers::from_raw(value);
                log::debug!(
                    "Maxwell3D: clear {:?} rt={} layer={}",
                    clear.components,
                    clear.render_target,
                    clear.layer
                );
                self.sink.clear_buffers(&self.regs, clear)?;
            }
            method::SEMAPHORE_INFO => self.semaphore()?,
            method::FIRMWARE_CALL_4 => {
                self.regs.write(method::FIRMWARE_CALL_RESULT, 1);
            }
            _ => {}
        }
        Ok(())
    }

    /// Perform the operation in the semaphore info word.
    fn semaphore(&mut self) -> Result<()> {
        let info = self.regs.semaphore_info();
        let address = self.regs.semaphore_address();

        let result: u64 = match info.operation() {
            SemaphoreOperation::Release => self.regs.semaphore_payload() as u64,
            SemaphoreOperation::Counter => match info.counter_type() {
                CounterType::Zero => 0,
                other => {
                    log::warn!("Maxwell3D: semaphore counter {:?} not supported", other);
                    return Ok(());
                }
            },
            op => {
                log::warn!("Maxwell3D: semaphore operation {:?} not supported", op);
                return Ok(());
            }
        };

        let mut record = [0u8; 12];
        let len = match info.structure_size() {
            SemaphoreStructureSize::OneWord => {
                LittleEndian::write_u32(&mut record[..4], result as u32);
                4
            }
            SemaphoreStructureSize::TwoWords => {
                LittleEndian::write_u64(&mut record[..8], result);
                if info.timestamp() {
                    LittleEndian::write_u32(&mut record[8..], self.timer.tick() as u32);
                    12
                } else {
                    8
                }
            }
        };

        log::debug!(
            "Maxwell3D: semaphore {:?} va=0x{:X} result=0x{:X} bytes={}",
            info.operation(),
            address,
            result,
            len
        );
        self.memory.write(address, &record[..len])?;
        Ok(())
    }
}

impl MacroProcessor for EngineState {
    fn fetch_code(&self, offset: u32) -> u32 {
        self.macros.code(offset)
    }

    fn macro_read(&self, method: u32) -> u32 {
        self.regs.read(method)
    }

    fn macro_write(&mut self, method: u32, value: u32) -> Result<()> {
        if method >= method::MACRO_BASE {
            log::warn!(
                "Maxwell3D: macro send to macro method 0x{:X} dropped",
                method
            );
            return Ok(());
        }
        self.write_method(method, value)
    }
}

// ── Maxwell3D ───────────────────────────────────────────────────────────────

pub struct Maxwell3D {
    state: EngineState,
    interpreter: MacroInterpreter,
    invocation: MacroInvocation,
}

impl Maxwell3D {
    pub fn new(
        settings: &EngineSettings,
        sink: Box<dyn StateSink>,
        memory: Arc<dyn GuestMemory>,
        syncpoints: Arc<SyncpointManager>,
    ) -> Self {
        log::debug!(
            "Maxwell3D: sink={} macro_step_limit=0x{:X}",
            sink.name(),
            settings.macro_step_limit
        );
        Self {
            state: EngineState {
                regs: RegisterFile::with_defaults(),
                shadow: RegisterFile::with_defaults(),
                macros: MacroStore::new(),
                sink,
                memory,
                syncpoints,
                timer: GpuTimer::new(),
            },
            interpreter: MacroInterpreter::new(settings.macro_step_limit),
            invocation: MacroInvocation::Idle,
        }
    }

    /// Restore both register copies to their reset values and drop any
    /// pending macro invocation. Uploaded macro code is kept.
    pub fn reset(&mut self) {
        self.state.regs.reset();
        self.state.shadow.reset();
        self.invocation = MacroInvocation::Idle;
    }

    pub fn live_registers(&self) -> &RegisterFile {
        &self.state.regs
    }

    pub fn shadow_registers(&self) -> &RegisterFile {
        &self.state.shadow
    }

    pub fn macro_store(&self) -> &MacroStore {
        &self.state.macros
    }

    /// Slot and arguments of the invocation still collecting arguments.
    pub fn pending_macro(&self) -> Option<(u32, &[u32])> {
        match &self.invocation {
            MacroInvocation::Idle => None,
            MacroInvocation::Accumulating { slot, args } => Some((*slot, args.as_slice())),
        }
    }

    fn call_macro_method(&mut self, method: u32, argument: u32, last_call: bool) -> Result<()> {
        let index = method - method::MACRO_BASE;
        let slot = (index >> 1) % MACRO_SLOT_COUNT as u32;
        let is_parameter = index & 1 != 0;

        if !(is_parameter && self.invocation.append(slot, argument)) {
            self.flush_macro()?;
            self.invocation = MacroInvocation::Accumulating {
                slot,
                args: vec![argument],
            };
        }

        if last_call {
            self.flush_macro()?;
        }
        Ok(())
    }

    /// Run the pending invocation, if any.
    fn flush_macro(&mut self) -> Result<()> {
        let Some((slot, args)) = self.invocation.take() else {
            return Ok(());
        };
        let entry = self.state.macros.position(slot);
        log::debug!(
            "Maxwell3D: macro slot {} entry=0x{:X} args={}",
            slot,
            entry,
            args.len()
        );
        let exit = self.interpreter.execute(entry, &args, &mut self.state)?;
        if exit == MacroExit::StepLimitReached {
            log::warn!("Maxwell3D: macro slot {} aborted", slot);
        }
        Ok(())
    }
}

impl Engine for Maxwell3D {
    fn class_id(&self) -> ClassId {
        ClassId::Threed
    }

    fn call_method(&mut self, method: u32, argument: u32, last_call: bool) -> Result<()> {
        if method >= method::MACRO_BASE {
            return self.call_macro_method(method, argument, last_call);
        }

        // A register method ends any invocation still collecting arguments.
        self.flush_macro()?;
        debug_assert!((method as usize) < REGISTER_COUNT);
        self.state.write_method(method, argument)
    }

    fn registers(&self) -> &[u32] {
        self.state.regs.words()
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Range;
    use std::time::{Duration, Instant};

    use gm20b_common::types::ns_to_gpu_ticks;
    use parking_lot::Mutex;

    use super::registers::*;
    use super::types::*;
    use super::*;
    use crate::error::{BackendError, GpuError, MemoryError};
    use crate::guest_memory::VecGuestMemory;
    use crate::macro_interpreter::tests::{encode_add_imm, encode_branch};

    // ── Recording sink ───────────────────────────────────────────────────

    #[derive(Default)]
    struct SinkLog {
        notifications: Vec<Range<u32>>,
        flushes: usize,
        clears: Vec<ClearBuffers>,
        fail_flush: bool,
        fail_notify: bool,
    }

    struct RecordingSink(Arc<Mutex<SinkLog>>);

    impl StateSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        fn notify_state_changed(
            &mut self,
            _regs: &RegisterFile,
            range: Range<u32>,
        ) -> std::result::Result<(), BackendError> {
            let mut log = self.0.lock();
            if log.fail_notify {
                return Err(BackendError::DeviceLost("notify".into()));
            }
            log.notifications.push(range);
            Ok(())
        }

        fn flush_pending_work(&mut self) -> std::result::Result<(), BackendError> {
            let mut log = self.0.lock();
            if log.fail_flush {
                return Err(BackendError::SubmitFailed("flush".into()));
            }
            log.flushes += 1;
            Ok(())
        }

        fn clear_buffers(
            &mut self,
            _regs: &RegisterFile,
            clear: ClearBuffers,
        ) -> std::result::Result<(), BackendError> {
            self.0.lock().clears.push(clear);
            Ok(())
        }
    }

    struct Harness {
        engine: Maxwell3D,
        sink: Arc<Mutex<SinkLog>>,
        memory: Arc<VecGuestMemory>,
        syncpoints: Arc<SyncpointManager>,
    }

    fn harness_with_limit(step_limit: u32) -> Harness {
        let sink = Arc::new(Mutex::new(SinkLog::default()));
        let memory = Arc::new(VecGuestMemory::new(0x10000));
        let syncpoints = Arc::new(SyncpointManager::new());
        let engine = Maxwell3D::new(
            &EngineSettings::with_macro_step_limit(step_limit),
            Box::new(RecordingSink(sink.clone())),
            memory.clone(),
            syncpoints.clone(),
        );
        Harness {
            engine,
            sink,
            memory,
            syncpoints,
        }
    }

    fn harness() -> Harness {
        harness_with_limit(0x1000)
    }

    fn write(engine: &mut Maxwell3D, method: u32, value: u32) {
        engine.call_method(method, value, true).unwrap();
    }

    fn upload_macro(engine: &mut Maxwell3D, slot: u32, offset: u32, code: &[u32]) {
        write(engine, method::INSTRUCTION_RAM_POINTER, offset);
        for &word in code {
            write(engine, method::INSTRUCTION_RAM_LOAD, word);
        }
        write(engine, method::START_ADDRESS_RAM_POINTER, slot);
        write(engine, method::START_ADDRESS_RAM_LOAD, offset);
    }

    /// Invoke `slot` the way a pushbuffer does: first argument on the even
    /// method, the rest on the odd one, `last_call` on the final word.
    fn invoke(engine: &mut Maxwell3D, slot: u32, args: &[u32]) -> Result<()> {
        for (i, &arg) in args.iter().enumerate() {
            let method = method::MACRO_BASE + slot * 2 + (i > 0) as u32;
            engine.call_method(method, arg, i + 1 == args.len())?;
        }
        Ok(())
    }

    /// Sends each argument to consecutive methods starting at `base`.
    fn send_args_macro(base: u32, count: usize) -> Vec<u32> {
        let mut code = vec![
            encode_add_imm(2, false, 2, 0, (base | (1 << 12)) as i32), // method = base, incr 1
            encode_add_imm(4, count == 1, 3, 1, 0),                    // send r1
        ];
        for i in 1..count {
            code.push(encode_add_imm(0, false, 3, 0, 0)); // r3 = next argument
            code.push(encode_add_imm(4, i + 1 == count, 4, 3, 0)); // send r3
        }
        // Delay slot of the exit.
        code.push(encode_add_imm(1, false, 0, 0, 0));
        code
    }

    // ── Plain writes ─────────────────────────────────────────────────────

    #[test]
    fn test_plain_writes_match_offset_map() {
        let mut h = harness();
        let mut expected = RegisterFile::with_defaults();

        let mut seed = 0x1234_5678u32;
        for _ in 0..2000 {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let method = 0x200 + (seed >> 8) % 0x460;
            let value = seed.rotate_left(7);
            write(&mut h.engine, method, value);
            expected.write(method, value);
        }
        assert_eq!(h.engine.live_registers(), &expected);
    }

    #[test]
    fn test_unnamed_register_stored_verbatim() {
        let mut h = harness();
        write(&mut h.engine, 0x123, 0xFFFF_FFFF);
        assert_eq!(h.engine.live_registers().read(0x123), 0xFFFF_FFFF);
        assert_eq!(h.sink.lock().notifications, vec![0x123..0x124]);
    }

    #[test]
    fn test_notification_covers_field_element() {
        let mut h = harness();
        // renderTargets[1].width
        write(&mut h.engine, 0x212, 1280);
        assert_eq!(h.sink.lock().notifications, vec![0x210..0x220]);
    }

    #[test]
    fn test_redundant_write_not_notified() {
        let mut h = harness();
        write(&mut h.engine, 0x4C3, 2);
        write(&mut h.engine, 0x4C3, 2);
        // frontFace already resets to CCW.
        write(&mut h.engine, 0x647, FrontFace::CCW as u32);
        assert_eq!(h.sink.lock().notifications, vec![0x4C3..0x4C4]);
    }

    #[test]
    fn test_no_operation_ignored() {
        let mut h = harness();
        write(&mut h.engine, method::NO_OPERATION, 5);
        let log = h.sink.lock();
        assert!(log.notifications.is_empty());
        assert_eq!(log.flushes, 0);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut h = harness();
        write(&mut h.engine, 0x4C3, 2);
        write(&mut h.engine, method::SHADOW_RAM_CONTROL, 0);
        write(&mut h.engine, 0x300, 9);
        h.engine.reset();
        assert_eq!(h.engine.live_registers(), &RegisterFile::with_defaults());
        assert_eq!(h.engine.shadow_registers(), &RegisterFile::with_defaults());
    }

    // ── Shadow RAM ───────────────────────────────────────────────────────

    #[test]
    fn test_passthrough_leaves_shadow_at_reset() {
        let mut h = harness();
        write(&mut h.engine, 0x300, 0x1234);
        write(&mut h.engine, 0x4C3, 3);
        assert_eq!(h.engine.shadow_registers(), &RegisterFile::with_defaults());
        assert_eq!(h.engine.live_registers().read(0x300), 0x1234);
    }

    #[test]
    fn test_shadow_only_never_reaches_live() {
        let mut h = harness();
        write(
            &mut h.engine,
            method::SHADOW_RAM_CONTROL,
            MmeShadowRamControl::MethodTrackWithFilter as u32,
        );
        write(&mut h.engine, 0x300, 0x55);
        write(&mut h.engine, method::CLEAR_BUFFERS, 0x3C);

        assert_eq!(h.engine.live_registers().read(0x300), 0);
        assert_eq!(h.engine.shadow_registers().read(0x300), 0x55);
        {
            let log = h.sink.lock();
            assert!(log.notifications.is_empty());
            assert!(log.clears.is_empty());
        }

        // Leaving the mode does not propagate staged values.
        write(
            &mut h.engine,
            method::SHADOW_RAM_CONTROL,
            MmeShadowRamControl::MethodPassthrough as u32,
        );
        assert_eq!(h.engine.live_registers().read(0x300), 0);
    }

    #[test]
    fn test_track_writes_both_copies() {
        let mut h = harness();
        write(
            &mut h.engine,
            method::SHADOW_RAM_CONTROL,
            MmeShadowRamControl::MethodTrack as u32,
        );
        write(&mut h.engine, 0x301, 0x77);
        assert_eq!(h.engine.live_registers().read(0x301), 0x77);
        assert_eq!(h.engine.shadow_registers().read(0x301), 0x77);
    }

    #[test]
    fn test_replay_writes_shadow_value() {
        let mut h = harness();
        write(
            &mut h.engine,
            method::SHADOW_RAM_CONTROL,
            MmeShadowRamControl::MethodTrackWithFilter as u32,
        );
        write(&mut h.engine, 0x4C3, 2);
        write(
            &mut h.engine,
            method::SHADOW_RAM_CONTROL,
            MmeShadowRamControl::MethodReplay as u32,
        );
        write(&mut h.engine, 0x4C3, 7);
        assert_eq!(h.engine.live_registers().read(0x4C3), 2);
        assert_eq!(h.engine.live_registers().depth_test_func(), ComparisonOp::Less);
    }

    #[test]
    fn test_mme_block_bypasses_routing() {
        let mut h = harness();
        write(
            &mut h.engine,
            method::SHADOW_RAM_CONTROL,
            MmeShadowRamControl::MethodTrackWithFilter as u32,
        );
        write(&mut h.engine, method::INSTRUCTION_RAM_POINTER, 0x20);
        write(&mut h.engine, method::INSTRUCTION_RAM_LOAD, 0xABCD);
        assert_eq!(h.engine.macro_store().code(0x20), 0xABCD);
        assert_eq!(h.engine.macro_store().cursor(), 0x21);
        assert_eq!(
            h.engine.live_registers().read(method::INSTRUCTION_RAM_POINTER),
            0x20
        );
        assert_eq!(
            h.engine.live_registers().shadow_ram_control(),
            MmeShadowRamControl::MethodTrackWithFilter
        );
    }

    // ── Macros ───────────────────────────────────────────────────────────

    #[test]
    fn test_macro_upload_and_invoke() {
        let mut h = harness();
        upload_macro(&mut h.engine, 3, 0x10, &send_args_macro(0x4C3, 1));
        assert_eq!(h.engine.macro_store().position(3), 0x10);

        invoke(&mut h.engine, 3, &[4]).unwrap();
        assert_eq!(h.engine.live_registers().read(0x4C3), 4);
        assert!(h.engine.pending_macro().is_none());
        assert_eq!(h.sink.lock().notifications, vec![0x4C3..0x4C4]);
    }

    #[test]
    fn test_macro_arguments_accumulate_until_last_call() {
        let mut h = harness();
        upload_macro(&mut h.engine, 1, 0, &send_args_macro(0x360, 3));

        let base = method::MACRO_BASE + 2;
        h.engine.call_method(base, 10, false).unwrap();
        h.engine.call_method(base + 1, 20, false).unwrap();
        assert_eq!(h.engine.pending_macro(), Some((1, &[10, 20][..])));
        assert_eq!(h.engine.live_registers().read(0x360), 0);

        h.engine.call_method(base + 1, 30, true).unwrap();
        assert!(h.engine.pending_macro().is_none());
        let regs = h.engine.live_registers();
        assert_eq!((regs.read(0x360), regs.read(0x361), regs.read(0x362)), (10, 20, 30));
    }

    #[test]
    fn test_new_macro_method_flushes_pending() {
        let mut h = harness();
        upload_macro(&mut h.engine, 0, 0, &send_args_macro(0x360, 1));
        upload_macro(&mut h.engine, 1, 0x20, &send_args_macro(0x361, 1));

        h.engine.call_method(method::MACRO_BASE, 5, false).unwrap();
        // Parameter for a different slot starts a new invocation.
        h.engine.call_method(method::MACRO_BASE + 3, 6, false).unwrap();
        assert_eq!(h.engine.live_registers().read(0x360), 5);
        assert_eq!(h.engine.pending_macro(), Some((1, &[6][..])));

        // A register method also ends the pending invocation.
        write(&mut h.engine, 0x100, 1);
        assert_eq!(h.engine.live_registers().read(0x361), 6);
        assert!(h.engine.pending_macro().is_none());
    }

    #[test]
    fn test_macro_slot_wraps_at_128() {
        let mut h = harness();
        upload_macro(&mut h.engine, 2, 0x40, &send_args_macro(0x4C4, 1));
        // Slot 130 aliases slot 2.
        invoke(&mut h.engine, 130, &[9]).unwrap();
        assert_eq!(h.engine.live_registers().read(0x4C4), 9);
    }

    #[test]
    fn test_macro_round_trip_matches_direct_interpretation() {
        let code = vec![
            encode_add_imm(1, false, 2, 1, 0),            // r2 = r1
            encode_add_imm(2, false, 3, 0, 0x380),        // method = scissors[0].enable
            encode_add_imm(4, false, 4, 2, 0),            // send r2
            encode_add_imm(1, false, 2, 2, -1),           // r2 -= 1
            encode_branch(1, true, false, 2, -2),         // loop while r2 != 0
            encode_add_imm(0, false, 5, 0, 0),            // r5 = fetch
            encode_add_imm(2, false, 6, 0, (0x4C7 | (1 << 12)) as i32),
            encode_add_imm(4, true, 6, 5, 0),             // send r5
        ];
        let args = [4, 0xABCD];

        let mut via_methods = harness();
        upload_macro(&mut via_methods.engine, 7, 0x100, &code);
        invoke(&mut via_methods.engine, 7, &args).unwrap();

        let mut direct = harness();
        direct.engine.state.macros.set_cursor(0x100);
        for &word in &code {
            direct.engine.state.macros.upload_instruction(word);
        }
        let exit = direct
            .engine
            .interpreter
            .execute(0x100, &args, &mut direct.engine.state)
            .unwrap();
        assert_eq!(exit, MacroExit::Exited);

        let a = via_methods.engine.live_registers().words();
        let b = direct.engine.live_registers().words();
        for offset in 0..REGISTER_COUNT {
            if (0x45..=0x48).contains(&offset) {
                continue;
            }
            assert_eq!(a[offset], b[offset], "register 0x{:X}", offset);
        }
        assert_eq!(a[0x380], 1);
        assert_eq!(a[0x4C7], 0xABCD);
    }

    #[test]
    fn test_macro_store_wraparound_via_methods() {
        let mut h = harness();
        write(&mut h.engine, method::INSTRUCTION_RAM_POINTER, 0);
        for i in 0..0x2002u32 {
            write(&mut h.engine, method::INSTRUCTION_RAM_LOAD, i);
        }
        let store = h.engine.macro_store();
        assert_eq!(store.code(0), 0x2000);
        assert_eq!(store.code(1), 0x2001);
        assert_eq!(store.code(2), 2);
        assert_eq!(store.code(0x1FFF), 0x1FFF);
        assert_eq!(store.cursor(), 2);
        assert_eq!(
            h.engine.live_registers().read(method::INSTRUCTION_RAM_LOAD),
            0x2001
        );
    }

    #[test]
    fn test_mme_pointers_stored_verbatim() {
        let mut h = harness();
        write(&mut h.engine, method::INSTRUCTION_RAM_POINTER, 0x2005);
        write(&mut h.engine, method::START_ADDRESS_RAM_POINTER, 0x85);
        let regs = h.engine.live_registers();
        assert_eq!(regs.read(method::INSTRUCTION_RAM_POINTER), 0x2005);
        assert_eq!(regs.read(method::START_ADDRESS_RAM_POINTER), 0x85);

        // The cursors themselves wrap.
        assert_eq!(h.engine.macro_store().cursor(), 5);
        assert_eq!(h.engine.macro_store().start_cursor(), 5);
        write(&mut h.engine, method::INSTRUCTION_RAM_LOAD, 0x77);
        write(&mut h.engine, method::START_ADDRESS_RAM_LOAD, 0x40);
        assert_eq!(h.engine.macro_store().code(5), 0x77);
        assert_eq!(h.engine.macro_store().position(5), 0x40);
        assert_eq!(
            h.engine.live_registers().read(method::INSTRUCTION_RAM_POINTER),
            0x2005
        );
    }

    #[test]
    fn test_argument_exhaustion_yields_zero() {
        let mut h = harness();
        write(&mut h.engine, 0x361, 0xEE);
        write(&mut h.engine, 0x362, 0xEE);
        upload_macro(&mut h.engine, 0, 0, &send_args_macro(0x360, 3));

        invoke(&mut h.engine, 0, &[0x11]).unwrap();
        let regs = h.engine.live_registers();
        assert_eq!((regs.read(0x360), regs.read(0x361), regs.read(0x362)), (0x11, 0, 0));
    }

    #[test]
    fn test_runaway_macro_aborts() {
        let mut h = harness_with_limit(500);
        let code = vec![
            encode_add_imm(2, false, 2, 0, 0x4C4),
            encode_add_imm(4, false, 3, 1, 0), // send r1
            encode_branch(0, true, false, 0, 0),
        ];
        upload_macro(&mut h.engine, 0, 0, &code);
        invoke(&mut h.engine, 0, &[0x42]).unwrap();
        assert_eq!(h.engine.live_registers().read(0x4C4), 0x42);

        // The engine keeps accepting methods afterwards.
        write(&mut h.engine, 0x4C5, 1);
        assert_eq!(h.engine.live_registers().read(0x4C5), 1);
    }

    #[test]
    fn test_macro_read_sees_live_registers() {
        let mut h = harness();
        write(&mut h.engine, 0x4C4, 0x99);
        let code = vec![
            encode_add_imm(2, false, 2, 0, 0x4C5),
            // r3 = live[0x4C4]
            (5 | (1 << 4) | (3 << 8) | (0x4C4 << 14)) as u32,
            encode_add_imm(4, true, 4, 3, 1), // send r3 + 1
        ];
        upload_macro(&mut h.engine, 0, 0, &code);
        invoke(&mut h.engine, 0, &[0]).unwrap();
        assert_eq!(h.engine.live_registers().read(0x4C5), 0x9A);
    }

    #[test]
    fn test_macro_send_to_macro_range_dropped() {
        let mut h = harness();
        let code = vec![
            encode_add_imm(2, false, 2, 0, 0xE04),
            encode_add_imm(4, true, 3, 1, 0), // send r1 to slot 2
            encode_add_imm(1, false, 0, 0, 0),
        ];
        upload_macro(&mut h.engine, 0, 0, &code);
        upload_macro(&mut h.engine, 2, 0x10, &send_args_macro(0x4C4, 1));

        invoke(&mut h.engine, 0, &[5]).unwrap();
        assert!(h.engine.pending_macro().is_none());
        assert_eq!(h.engine.live_registers().read(0x4C4), 0);
        assert!(h.sink.lock().notifications.is_empty());
    }

    // ── Side effects ─────────────────────────────────────────────────────

    fn write_semaphore(engine: &mut Maxwell3D, address: u64, payload: u32, info: u32) {
        write(engine, method::SEMAPHORE_ADDRESS_HIGH, (address >> 32) as u32);
        write(engine, method::SEMAPHORE_ADDRESS_LOW, address as u32);
        write(engine, method::SEMAPHORE_PAYLOAD, payload);
        write(engine, method::SEMAPHORE_INFO, info);
    }

    #[test]
    fn test_semaphore_release_with_timestamp() {
        let mut h = harness();
        h.memory.write(0x1000, &[0xFF; 16]).unwrap();

        write_semaphore(&mut h.engine, 0x1000, 0x1234, SemaphoreInfo::TIMESTAMP_BIT);
        let record = h.memory.snapshot(0x1000, 16);
        assert_eq!(LittleEndian::read_u64(&record[..8]), 0x1234);
        let first_tick = LittleEndian::read_u32(&record[8..12]);
        // Exactly 12 bytes written.
        assert_eq!(&record[12..], &[0xFF; 4]);

        write_semaphore(&mut h.engine, 0x1000, 0x1234, SemaphoreInfo::TIMESTAMP_BIT);
        let second_tick = LittleEndian::read_u32(&h.memory.snapshot(0x1008, 4));
        assert!(second_tick > first_tick);
    }

    #[test]
    fn test_semaphore_ticks_follow_host_clock() {
        let mut h = harness();
        let started = Instant::now();
        write_semaphore(&mut h.engine, 0x1000, 0, SemaphoreInfo::TIMESTAMP_BIT);
        let first = LittleEndian::read_u32(&h.memory.snapshot(0x1008, 4));
        std::thread::sleep(Duration::from_millis(10));
        write_semaphore(&mut h.engine, 0x1000, 0, SemaphoreInfo::TIMESTAMP_BIT);
        let second = LittleEndian::read_u32(&h.memory.snapshot(0x1008, 4));
        let elapsed = started.elapsed().as_nanos() as u64;

        let spacing = second.wrapping_sub(first) as u64;
        // 10 ms at 19.2 MHz is 192000 ticks.
        assert!(spacing >= 191_999, "spacing {}", spacing);
        assert!(
            spacing <= ns_to_gpu_ticks(elapsed) + 2,
            "spacing {} over {} ns",
            spacing,
            elapsed
        );
    }

    #[test]
    fn test_semaphore_one_word() {
        let mut h = harness();
        h.memory.write(0x2000, &[0xFF; 8]).unwrap();
        write_semaphore(&mut h.engine, 0x2000, 0xCAFE_F00D, SemaphoreInfo::ONE_WORD_BIT);
        let record = h.memory.snapshot(0x2000, 8);
        assert_eq!(LittleEndian::read_u32(&record[..4]), 0xCAFE_F00D);
        assert_eq!(&record[4..], &[0xFF; 4]);
    }

    #[test]
    fn test_semaphore_two_words_without_timestamp() {
        let mut h = harness();
        h.memory.write(0x3000, &[0xFF; 12]).unwrap();
        write_semaphore(&mut h.engine, 0x3000, 7, 0);
        let record = h.memory.snapshot(0x3000, 12);
        assert_eq!(LittleEndian::read_u64(&record[..8]), 7);
        assert_eq!(&record[8..], &[0xFF; 4]);
    }

    #[test]
    fn test_semaphore_counter_and_acquire() {
        let mut h = harness();
        h.memory.write(0x4000, &[0xFF; 8]).unwrap();

        // Acquire is ignored.
        write_semaphore(&mut h.engine, 0x4000, 1, SemaphoreOperation::Acquire as u32);
        assert_eq!(h.memory.snapshot(0x4000, 8), vec![0xFF; 8]);

        // Counter of type Zero writes zero.
        write_semaphore(&mut h.engine, 0x4000, 1, SemaphoreOperation::Counter as u32);
        assert_eq!(h.memory.snapshot(0x4000, 8), vec![0; 8]);
    }

    #[test]
    fn test_semaphore_bad_address_propagates() {
        let mut h = harness();
        write(&mut h.engine, method::SEMAPHORE_ADDRESS_LOW, 0xFFFF_0000);
        write(&mut h.engine, method::SEMAPHORE_PAYLOAD, 1);
        let err = h
            .engine
            .call_method(method::SEMAPHORE_INFO, 0, true)
            .unwrap_err();
        assert!(matches!(
            err,
            GpuError::Memory(MemoryError::OutOfBounds { addr: 0xFFFF_0000, .. })
        ));
    }

    #[test]
    fn test_wait_for_idle_flushes_sink() {
        let mut h = harness();
        write(&mut h.engine, method::WAIT_FOR_IDLE, 0);
        assert_eq!(h.sink.lock().flushes, 1);
    }

    #[test]
    fn test_sink_errors_propagate() {
        let mut h = harness();
        h.sink.lock().fail_flush = true;
        assert_eq!(
            h.engine.call_method(method::WAIT_FOR_IDLE, 0, true),
            Err(GpuError::Backend(BackendError::SubmitFailed("flush".into())))
        );

        h.sink.lock().fail_notify = true;
        assert!(matches!(
            h.engine.call_method(0x300, 1, true),
            Err(GpuError::Backend(BackendError::DeviceLost(_)))
        ));
        // The register write itself was committed.
        assert_eq!(h.engine.live_registers().read(0x300), 1);
    }

    #[test]
    fn test_syncpoint_action() {
        let mut h = harness();
        write(&mut h.engine, method::SYNCPOINT_ACTION, 5 | (1 << 20));
        write(&mut h.engine, method::SYNCPOINT_ACTION, 5 | (1 << 20) | (1 << 16));
        write(&mut h.engine, method::SYNCPOINT_ACTION, 6);
        assert_eq!(h.syncpoints.value(5), 2);
        assert_eq!(h.syncpoints.value(6), 0);
        assert_eq!(h.sink.lock().flushes, 3);
    }

    #[test]
    fn test_clear_buffers_forwarded() {
        let mut h = harness();
        let raw = 0x3F | (2 << 6) | (1 << 10);
        write(&mut h.engine, method::CLEAR_BUFFERS, raw);
        write(&mut h.engine, method::CLEAR_BUFFERS, raw);
        let log = h.sink.lock();
        assert_eq!(log.clears.len(), 2);
        assert_eq!(log.clears[0].render_target, 2);
        assert_eq!(log.clears[0].layer, 1);
        assert!(log.clears[0].components.contains(ClearComponents::DEPTH | ClearComponents::COLOR));
    }

    #[test]
    fn test_firmware_call_acknowledged() {
        let mut h = harness();
        write(&mut h.engine, method::FIRMWARE_CALL_4, 0x1);
        assert_eq!(
            h.engine.live_registers().read(method::FIRMWARE_CALL_RESULT),
            1
        );
    }
}
