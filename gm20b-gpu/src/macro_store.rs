// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Macro instruction RAM and start-address table.
//!
//! Code is uploaded one word at a time through the `instructionRamLoad`
//! method and wraps silently at the end of the buffer, overwriting the
//! oldest words. Entry points are recorded per slot through
//! `startAddressRamLoad`; rebinding a slot replaces the old entry.

/// Size of the instruction RAM in words.
pub const MACRO_CODE_WORDS: usize = 0x2000;

/// Number of macro slots addressable by invocation methods.
pub const MACRO_SLOT_COUNT: usize = 128;

pub struct MacroStore {
    code: Box<[u32; MACRO_CODE_WORDS]>,
    positions: [u32; MACRO_SLOT_COUNT],
    cursor: u32,
    start_cursor: u32,
}

impl MacroStore {
    pub fn new() -> Self {
        Self {
            code: Box::new([0; MACRO_CODE_WORDS]),
            positions: [0; MACRO_SLOT_COUNT],
            cursor: 0,
            start_cursor: 0,
        }
    }

    /// Move the upload cursor (`instructionRamPointer`).
    pub fn set_cursor(&mut self, pointer: u32) {
        self.cursor = pointer % MACRO_CODE_WORDS as u32;
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Store `word` at the cursor and advance it, wrapping at the end.
    pub fn upload_instruction(&mut self, word: u32) {
        self.code[self.cursor as usize] = word;
        self.cursor = (self.cursor + 1) % MACRO_CODE_WORDS as u32;
    }

    /// Move the start-address cursor (`startAddressRamPointer`).
    pub fn set_start_cursor(&mut self, pointer: u32) {
        self.start_cursor = pointer % MACRO_SLOT_COUNT as u32;
    }

    pub fn start_cursor(&self) -> u32 {
        self.start_cursor
    }

    /// Bind the slot under the start cursor to `offset` and advance the cursor.
    pub fn load_start_address(&mut self, offset: u32) {
        self.bind_start(self.start_cursor, offset);
        self.start_cursor = (self.start_cursor + 1) % MACRO_SLOT_COUNT as u32;
    }

    /// Record the entry offset of `slot`, replacing any previous binding.
    pub fn bind_start(&mut self, slot: u32, offset: u32) {
        let slot = slot as usize % MACRO_SLOT_COUNT;
        log::trace!("MacroStore: slot {} -> 0x{:X}", slot, offset);
        self.positions[slot] = offset;
    }

    pub fn position(&self, slot: u32) -> u32 {
        self.positions[slot as usize % MACRO_SLOT_COUNT]
    }

    /// Instruction word at `offset`, taken modulo the RAM size.
    pub fn code(&self, offset: u32) -> u32 {
        self.code[offset as usize % MACRO_CODE_WORDS]
    }
}

impl Default for MacroStore {
    fn default() -> Self {
        Self::new()
    }
}
