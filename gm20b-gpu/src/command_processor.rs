// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! GPFIFO command processor.
//!
//! Reads pushbuffer segments named by 64-bit GPFIFO entries, unpacks the
//! compressed method headers, and hands each method write to the engine
//! bound to the header's subchannel.
//!
//! ## GPFIFO Entry Format (64 bits)
//!
//! | Bits    | Field              |
//! |---------|--------------------|
//! | 1:0     | Fetch mode         |
//! | 39:2    | Address >> 2       |
//! | 41:40   | Unused             |
//! | 42      | Priv / no prefetch |
//! | 62:43   | Length (in dwords) |
//! | 63      | Sync               |
//!
//! ## Compressed Method Header (32 bits)
//!
//! | Bits    | Field                    |
//! |---------|--------------------------|
//! | 12:0    | Method address           |
//! | 15:13   | Subchannel               |
//! | 28:16   | Method count / Immd data |
//! | 31:29   | SecOp                    |

use byteorder::{ByteOrder, LittleEndian};

use crate::engines::Engine;
use crate::error::Result;
use crate::guest_memory::GuestMemory;

/// A 64-bit GPFIFO entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpEntry {
    pub entry0: u32,
    pub entry1: u32,
}

impl GpEntry {
    /// Largest pushbuffer length one entry can describe, in words.
    pub const MAX_LENGTH: u32 = 0x1F_FFFF;

    /// Build an entry for `length` words at GPU address `address`.
    pub fn new(address: u64, length: u32) -> Self {
        debug_assert!(length <= Self::MAX_LENGTH);
        Self {
            entry0: (address as u32) & !0x3,
            entry1: ((address >> 32) as u32 & 0xFF) | ((length & Self::MAX_LENGTH) << 10),
        }
    }

    /// GPU virtual address of the pushbuffer (word aligned).
    pub fn address(&self) -> u64 {
        let lo = (self.entry0 as u64 >> 2) << 2;
        let hi = (self.entry1 as u64 & 0xFF) << 32;
        hi | lo
    }

    /// Length of the pushbuffer in 32-bit words.
    pub fn length(&self) -> u32 {
        (self.entry1 >> 10) & Self::MAX_LENGTH
    }
}

/// Secondary operation type from compressed method header bits [31:29].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SecOp {
    Grp0UseTert = 0,
    IncMethod = 1,
    Grp2UseTert = 2,
    NonIncMethod = 3,
    ImmdDataMethod = 4,
    OneInc = 5,
    Reserved6 = 6,
    EndPbSegment = 7,
}

impl SecOp {
    fn from_raw(v: u32) -> Self {
        match v & 0x7 {
            0 => Self::Grp0UseTert,
            1 => Self::IncMethod,
            2 => Self::Grp2UseTert,
            3 => Self::NonIncMethod,
            4 => Self::ImmdDataMethod,
            5 => Self::OneInc,
            6 => Self::Reserved6,
            _ => Self::EndPbSegment,
        }
    }
}

/// A compressed method header.
#[derive(Debug, Clone, Copy)]
pub struct CompressedMethod(u32);

impl CompressedMethod {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Encode a header, for building pushbuffers by hand.
    pub fn encode(sec_op: SecOp, subchannel: u32, method: u32, count_or_data: u32) -> u32 {
        ((sec_op as u32) << 29)
            | ((count_or_data & 0x1FFF) << 16)
            | ((subchannel & 0x7) << 13)
            | (method & 0x1FFF)
    }

    pub fn method_address(&self) -> u32 {
        self.0 & 0x1FFF
    }

    pub fn subchannel(&self) -> u32 {
        (self.0 >> 13) & 0x7
    }

    /// Data word count for IncMethod, NonIncMethod and OneInc.
    pub fn method_count(&self) -> u32 {
        (self.0 >> 16) & 0x1FFF
    }

    /// Inline argument for ImmdDataMethod.
    pub fn immd_data(&self) -> u32 {
        (self.0 >> 16) & 0x1FFF
    }

    pub fn sec_op(&self) -> SecOp {
        SecOp::from_raw(self.0 >> 29)
    }
}

/// Number of engine subchannels.
const NUM_SUBCHANNELS: usize = 8;

/// Decodes pushbuffers and dispatches method writes to subchannel engines.
pub struct CommandProcessor {
    engines: Vec<Option<Box<dyn Engine>>>,
}

impl CommandProcessor {
    pub fn new(engines: Vec<Option<Box<dyn Engine>>>) -> Self {
        let mut engines = engines;
        if engines.len() > NUM_SUBCHANNELS {
            log::warn!(
                "CommandProcessor: {} engines given, only {} subchannels",
                engines.len(),
                NUM_SUBCHANNELS
            );
        }
        engines.resize_with(NUM_SUBCHANNELS, || None);
        Self { engines }
    }

    /// Engine bound to `subchannel`, if any.
    pub fn engine(&self, subchannel: u32) -> Option<&dyn Engine> {
        self.engines
            .get(subchannel as usize)
            .and_then(|slot| slot.as_deref())
    }

    /// Fetch each entry's pushbuffer from `memory` and execute it.
    pub fn process_entries(&mut self, entries: &[GpEntry], memory: &dyn GuestMemory) -> Result<()> {
        for entry in entries {
            let len = entry.length() as usize;
            if len == 0 {
                continue;
            }

            let mut buf = vec![0u8; len * 4];
            memory.read(entry.address(), &mut buf)?;

            let mut words = vec![0u32; len];
            LittleEndian::read_u32_into(&buf, &mut words);

            log::trace!(
                "CommandProcessor: pushbuffer va=0x{:X} words={}",
                entry.address(),
                len
            );
            self.process_pushbuffer(&words)?;
        }
        Ok(())
    }

    /// Execute one pushbuffer segment (method headers and data words).
    pub fn process_pushbuffer(&mut self, data: &[u32]) -> Result<()> {
        let mut pos = 0;

        while pos < data.len() {
            let header = CompressedMethod::new(data[pos]);
            pos += 1;

            let subchannel = header.subchannel();
            let method = header.method_address();
            let count = header.method_count() as usize;

            match header.sec_op() {
                SecOp::IncMethod | SecOp::NonIncMethod | SecOp::OneInc => {
                    let available = count.min(data.len() - pos);
                    if available < count {
                        log::warn!(
                            "CommandProcessor: method 0x{:X} wants {} words, {} left",
                            method,
                            count,
                            available
                        );
                    }
                    for i in 0..available {
                        let target = match header.sec_op() {
                            SecOp::IncMethod => method + i as u32,
                            SecOp::OneInc if i > 0 => method + 1,
                            _ => method,
                        };
                        self.dispatch(subchannel, target, data[pos], i + 1 == available)?;
                        pos += 1;
                    }
                }
                SecOp::ImmdDataMethod => {
                    self.dispatch(subchannel, method, header.immd_data(), true)?;
                }
                SecOp::EndPbSegment => break,
                SecOp::Grp0UseTert | SecOp::Grp2UseTert | SecOp::Reserved6 => {
                    log::warn!(
                        "CommandProcessor: unhandled SecOp {:?} at word {}",
                        header.sec_op(),
                        pos - 1
                    );
                    pos += count;
                }
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, subchannel: u32, method: u32, argument: u32, last_call: bool) -> Result<()> {
        match self.engines.get_mut(subchannel as usize) {
            Some(Some(engine)) => engine.call_method(method, argument, last_call),
            _ => {
                log::trace!(
                    "CommandProcessor: no engine on subchannel {} (method=0x{:X}, value=0x{:X})",
                    subchannel,
                    method,
                    argument
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::engines::ClassId;
    use crate::error::{GpuError, MemoryError};
    use crate::guest_memory::VecGuestMemory;

    type Writes = Arc<Mutex<Vec<(u32, u32, bool)>>>;

    /// Test engine that records method calls.
    struct RecordingEngine {
        writes: Writes,
        regs: Vec<u32>,
    }

    impl Engine for RecordingEngine {
        fn class_id(&self) -> ClassId {
            ClassId::Threed
        }

        fn call_method(&mut self, method: u32, argument: u32, last_call: bool) -> Result<()> {
            self.writes.lock().push((method, argument, last_call));
            Ok(())
        }

        fn registers(&self) -> &[u32] {
            &self.regs
        }
    }

    fn processor() -> (CommandProcessor, Writes) {
        let writes = Writes::default();
        let engine = RecordingEngine {
            writes: writes.clone(),
            regs: Vec::new(),
        };
        (CommandProcessor::new(vec![Some(Box::new(engine))]), writes)
    }

    #[test]
    fn test_gp_entry_address_and_length() {
        let entry = GpEntry {
            entry0: 0x0000_1000,
            entry1: 0x0000_0400,
        };
        assert_eq!(entry.address(), 0x1000);
        assert_eq!(entry.length(), 1);
    }

    #[test]
    fn test_gp_entry_new() {
        let entry = GpEntry::new(0x1_0000_2000, 0x30);
        assert_eq!(entry.entry0, 0x2000);
        assert_eq!(entry.address(), 0x1_0000_2000);
        assert_eq!(entry.length(), 0x30);
    }

    #[test]
    fn test_compressed_method_fields() {
        let raw = CompressedMethod::encode(SecOp::IncMethod, 2, 0x100, 3);
        let hdr = CompressedMethod::new(raw);
        assert_eq!(hdr.sec_op(), SecOp::IncMethod);
        assert_eq!(hdr.subchannel(), 2);
        assert_eq!(hdr.method_address(), 0x100);
        assert_eq!(hdr.method_count(), 3);
    }

    #[test]
    fn test_process_inc_method() {
        let (mut proc, writes) = processor();
        let header = CompressedMethod::encode(SecOp::IncMethod, 0, 0x10, 2);
        proc.process_pushbuffer(&[header, 0xAAAA, 0xBBBB]).unwrap();
        assert_eq!(
            *writes.lock(),
            vec![(0x10, 0xAAAA, false), (0x11, 0xBBBB, true)]
        );
    }

    #[test]
    fn test_process_non_inc_method() {
        let (mut proc, writes) = processor();
        let header = CompressedMethod::encode(SecOp::NonIncMethod, 0, 0xE01, 3);
        proc.process_pushbuffer(&[header, 0x11, 0x22, 0x33]).unwrap();
        assert_eq!(
            *writes.lock(),
            vec![(0xE01, 0x11, false), (0xE01, 0x22, false), (0xE01, 0x33, true)]
        );
    }

    #[test]
    fn test_process_immd_method() {
        let (mut proc, writes) = processor();
        let header = CompressedMethod::encode(SecOp::ImmdDataMethod, 0, 0x30, 0x42);
        proc.process_pushbuffer(&[header]).unwrap();
        assert_eq!(*writes.lock(), vec![(0x30, 0x42, true)]);
    }

    #[test]
    fn test_process_one_inc() {
        let (mut proc, writes) = processor();
        let header = CompressedMethod::encode(SecOp::OneInc, 0, 0x50, 3);
        proc.process_pushbuffer(&[header, 0xAA, 0xBB, 0xCC]).unwrap();
        assert_eq!(
            *writes.lock(),
            vec![(0x50, 0xAA, false), (0x51, 0xBB, false), (0x51, 0xCC, true)]
        );
    }

    #[test]
    fn test_truncated_batch_marks_last_available_word() {
        let (mut proc, writes) = processor();
        let header = CompressedMethod::encode(SecOp::IncMethod, 0, 0x10, 5);
        proc.process_pushbuffer(&[header, 1, 2]).unwrap();
        assert_eq!(*writes.lock(), vec![(0x10, 1, false), (0x11, 2, true)]);
    }

    #[test]
    fn test_end_segment_and_unbound_subchannel() {
        let (mut proc, writes) = processor();
        let data = [
            CompressedMethod::encode(SecOp::ImmdDataMethod, 3, 0x30, 1),
            CompressedMethod::encode(SecOp::ImmdDataMethod, 0, 0x31, 2),
            CompressedMethod::encode(SecOp::EndPbSegment, 0, 0, 0),
            CompressedMethod::encode(SecOp::ImmdDataMethod, 0, 0x32, 3),
        ];
        proc.process_pushbuffer(&data).unwrap();
        assert_eq!(*writes.lock(), vec![(0x31, 2, true)]);
        assert!(proc.engine(0).is_some());
        assert!(proc.engine(3).is_none());
    }

    #[test]
    fn test_process_entries_reads_memory() {
        let (mut proc, writes) = processor();
        let memory = VecGuestMemory::new(0x100);
        let mut bytes = [0u8; 8];
        LittleEndian::write_u32_into(
            &[CompressedMethod::encode(SecOp::IncMethod, 0, 0x10, 1), 0xDEAD_BEEF],
            &mut bytes,
        );
        memory.write(0x40, &bytes).unwrap();

        proc.process_entries(&[GpEntry::new(0x40, 2), GpEntry::new(0x80, 0)], &memory)
            .unwrap();
        assert_eq!(*writes.lock(), vec![(0x10, 0xDEAD_BEEF, true)]);
    }

    #[test]
    fn test_process_entries_propagates_read_errors() {
        let (mut proc, _) = processor();
        let memory = VecGuestMemory::new(0x10);
        let err = proc
            .process_entries(&[GpEntry::new(0x100, 4)], &memory)
            .unwrap_err();
        assert_eq!(
            err,
            GpuError::Memory(MemoryError::OutOfBounds { addr: 0x100, len: 16 })
        );
    }
}
