// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Maxwell Macro Executor (MME) interpreter.
//!
//! Macros are small guest-uploaded programs invoked through methods at and
//! above 0xE00. They read their arguments from the invocation, compute in
//! eight scratch registers, and issue method writes back into the 3D engine.
//!
//! ## Instruction word
//!
//! | Bits  | Field                                        |
//! |-------|----------------------------------------------|
//! | 2:0   | Operation                                    |
//! | 6:4   | Result operation (bit 4 = branch condition)  |
//! | 5     | Branch annul                                 |
//! | 7     | Exit                                         |
//! | 10:8  | Destination register                         |
//! | 13:11 | Source register A                            |
//! | 16:14 | Source register B                            |
//! | 31:14 | Signed 18-bit immediate                      |
//! | 21:17 | ALU operation / bitfield source bit          |
//! | 26:22 | Bitfield size                                |
//! | 31:27 | Bitfield destination bit                     |
//!
//! Branches and the exit flag have one delay slot. Execution always ends
//! within `step_limit` instructions, so a guest program that never exits
//! cannot hang the dispatcher.

use crate::error::Result;
use crate::macro_store::MACRO_CODE_WORDS;

// ── Instruction fields ───────────────────────────────────────────────────────

/// Primary operation encoded in bits[2:0].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Operation {
    ALU = 0,
    AddImmediate = 1,
    ExtractInsert = 2,
    ExtractShiftLeftImmediate = 3,
    ExtractShiftLeftRegister = 4,
    Read = 5,
    Unused = 6,
    Branch = 7,
}

impl Operation {
    fn from_raw(v: u32) -> Self {
        match v & 0x7 {
            0 => Self::ALU,
            1 => Self::AddImmediate,
            2 => Self::ExtractInsert,
            3 => Self::ExtractShiftLeftImmediate,
            4 => Self::ExtractShiftLeftRegister,
            5 => Self::Read,
            6 => Self::Unused,
            _ => Self::Branch,
        }
    }
}

/// ALU sub-operation encoded in bits[21:17].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ALUOperation {
    Add = 0,
    AddWithCarry = 1,
    Subtract = 2,
    SubtractWithBorrow = 3,
    Xor = 8,
    Or = 9,
    And = 10,
    AndNot = 11,
    Nand = 12,
}

impl ALUOperation {
    fn from_raw(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Add),
            1 => Some(Self::AddWithCarry),
            2 => Some(Self::Subtract),
            3 => Some(Self::SubtractWithBorrow),
            8 => Some(Self::Xor),
            9 => Some(Self::Or),
            10 => Some(Self::And),
            11 => Some(Self::AndNot),
            12 => Some(Self::Nand),
            _ => None,
        }
    }
}

/// Result operation encoded in bits[6:4].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ResultOperation {
    IgnoreAndFetch = 0,
    Move = 1,
    MoveAndSetMethod = 2,
    FetchAndSend = 3,
    MoveAndSend = 4,
    FetchAndSetMethod = 5,
    MoveAndSetMethodFetchAndSend = 6,
    MoveAndSetMethodSend = 7,
}

impl ResultOperation {
    fn from_raw(v: u32) -> Self {
        match v & 0x7 {
            0 => Self::IgnoreAndFetch,
            1 => Self::Move,
            2 => Self::MoveAndSetMethod,
            3 => Self::FetchAndSend,
            4 => Self::MoveAndSend,
            5 => Self::FetchAndSetMethod,
            6 => Self::MoveAndSetMethodFetchAndSend,
            _ => Self::MoveAndSetMethodSend,
        }
    }
}

/// Branch condition encoded in bit[4].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchCondition {
    Zero,
    NotZero,
}

/// Bitfield operand of the extract/insert family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bitfield {
    pub src_bit: u32,
    pub size: u32,
    pub dst_bit: u32,
}

impl Bitfield {
    pub fn mask(&self) -> u32 {
        (1u32 << self.size).wrapping_sub(1)
    }
}

/// One decoded macro instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Alu {
        op: ALUOperation,
        result: ResultOperation,
        dst: u32,
        src_a: u32,
        src_b: u32,
    },
    AddImmediate {
        result: ResultOperation,
        dst: u32,
        src_a: u32,
        immediate: i32,
    },
    ExtractInsert {
        result: ResultOperation,
        dst: u32,
        src_a: u32,
        src_b: u32,
        bitfield: Bitfield,
    },
    ExtractShiftLeftImmediate {
        result: ResultOperation,
        dst: u32,
        src_a: u32,
        src_b: u32,
        bitfield: Bitfield,
    },
    ExtractShiftLeftRegister {
        result: ResultOperation,
        dst: u32,
        src_a: u32,
        src_b: u32,
        bitfield: Bitfield,
    },
    Read {
        result: ResultOperation,
        dst: u32,
        src_a: u32,
        immediate: i32,
    },
    Branch {
        condition: BranchCondition,
        annul: bool,
        src_a: u32,
        /// Target relative to the branch, in instruction words.
        offset: i32,
    },
    /// Unused operation or unknown ALU op; runs as a no-op.
    Invalid(u32),
}

// ── Opcode ───────────────────────────────────────────────────────────────────

/// Raw 32-bit macro instruction word with accessors for each bitfield.
#[derive(Clone, Copy, Debug)]
pub struct Opcode(pub u32);

impl Opcode {
    pub fn operation(&self) -> Operation {
        Operation::from_raw(self.0)
    }

    pub fn result_operation(&self) -> ResultOperation {
        ResultOperation::from_raw(self.0 >> 4)
    }

    pub fn branch_condition(&self) -> BranchCondition {
        if (self.0 >> 4) & 1 == 0 {
            BranchCondition::Zero
        } else {
            BranchCondition::NotZero
        }
    }

    /// If set, a taken branch has no delay slot.
    pub fn branch_annul(&self) -> bool {
        (self.0 >> 5) & 1 != 0
    }

    pub fn is_exit(&self) -> bool {
        (self.0 >> 7) & 1 != 0
    }

    pub fn dst(&self) -> u32 {
        (self.0 >> 8) & 0x7
    }

    pub fn src_a(&self) -> u32 {
        (self.0 >> 11) & 0x7
    }

    pub fn src_b(&self) -> u32 {
        (self.0 >> 14) & 0x7
    }

    /// Signed 18-bit immediate (bits[31:14]).
    pub fn immediate(&self) -> i32 {
        (self.0 as i32) >> 14
    }

    pub fn bitfield(&self) -> Bitfield {
        Bitfield {
            src_bit: (self.0 >> 17) & 0x1F,
            size: (self.0 >> 22) & 0x1F,
            dst_bit: (self.0 >> 27) & 0x1F,
        }
    }

    pub fn decode(&self) -> Instruction {
        let result = self.result_operation();
        let dst = self.dst();
        let src_a = self.src_a();
        let src_b = self.src_b();

        match self.operation() {
            Operation::ALU => match ALUOperation::from_raw((self.0 >> 17) & 0x1F) {
                Some(op) => Instruction::Alu {
                    op,
                    result,
                    dst,
                    src_a,
                    src_b,
                },
                None => Instruction::Invalid(self.0),
            },
            Operation::AddImmediate => Instruction::AddImmediate {
                result,
                dst,
                src_a,
                immediate: self.immediate(),
            },
            Operation::ExtractInsert => Instruction::ExtractInsert {
                result,
                dst,
                src_a,
                src_b,
                bitfield: self.bitfield(),
            },
            Operation::ExtractShiftLeftImmediate => Instruction::ExtractShiftLeftImmediate {
                result,
                dst,
                src_a,
                src_b,
                bitfield: self.bitfield(),
            },
            Operation::ExtractShiftLeftRegister => Instruction::ExtractShiftLeftRegister {
                result,
                dst,
                src_a,
                src_b,
                bitfield: self.bitfield(),
            },
            Operation::Read => Instruction::Read {
                result,
                dst,
                src_a,
                immediate: self.immediate(),
            },
            Operation::Branch => Instruction::Branch {
                condition: self.branch_condition(),
                annul: self.branch_annul(),
                src_a,
                offset: self.immediate(),
            },
            Operation::Unused => Instruction::Invalid(self.0),
        }
    }
}

// ── MethodAddress ────────────────────────────────────────────────────────────

/// Packed method address with auto-increment: bits[11:0] = address,
/// bits[17:12] = increment.
#[derive(Clone, Copy, Debug, Default)]
struct MethodAddress {
    raw: u32,
}

impl MethodAddress {
    fn address(&self) -> u32 {
        self.raw & 0xFFF
    }

    fn increment(&self) -> u32 {
        (self.raw >> 12) & 0x3F
    }

    fn set(&mut self, value: u32) {
        self.raw = value;
    }

    fn advance(&mut self) {
        let addr = self.address() + self.increment();
        self.raw = (self.raw & !0xFFF) | (addr & 0xFFF);
    }
}

// ── MacroProcessor trait ─────────────────────────────────────────────────────

/// The engine side of a macro invocation: code fetch, register reads, and
/// method writes. Implemented by the 3D engine state so the interpreter can
/// mutate registers while the engine keeps ownership of them.
pub trait MacroProcessor {
    /// Instruction word at `offset` in the macro store.
    fn fetch_code(&self, offset: u32) -> u32;

    /// Read a register of the live register file.
    fn macro_read(&self, method: u32) -> u32;

    /// Issue a method write, with the same side effects as a direct write.
    fn macro_write(&mut self, method: u32, value: u32) -> Result<()>;
}

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroExit {
    Exited,
    StepLimitReached,
}

// ── MacroInterpreter ─────────────────────────────────────────────────────────

/// Number of general-purpose registers ($r0..$r7).
const NUM_REGISTERS: usize = 8;

fn wrap_pc(pc: i64) -> u32 {
    pc.rem_euclid(MACRO_CODE_WORDS as i64) as u32
}

pub struct MacroInterpreter {
    step_limit: u32,
    /// $r0..$r7, $r0 hardwired to 0.
    registers: [u32; NUM_REGISTERS],
    pc: u32,
    delayed_pc: Option<u32>,
    method_address: MethodAddress,
    carry: bool,
    params: Vec<u32>,
    next_param_index: usize,
}

impl MacroInterpreter {
    pub fn new(step_limit: u32) -> Self {
        Self {
            step_limit,
            registers: [0u32; NUM_REGISTERS],
            pc: 0,
            delayed_pc: None,
            method_address: MethodAddress::default(),
            carry: false,
            params: Vec::new(),
            next_param_index: 0,
        }
    }

    /// Run the program starting at `entry` with the given arguments.
    ///
    /// Errors only come from `processor.macro_write`; guest-program anomalies
    /// are logged and contained.
    pub fn execute(
        &mut self,
        entry: u32,
        params: &[u32],
        processor: &mut dyn MacroProcessor,
    ) -> Result<MacroExit> {
        self.registers = [0u32; NUM_REGISTERS];
        self.carry = false;
        self.delayed_pc = None;
        self.method_address = MethodAddress::default();
        self.pc = wrap_pc(entry as i64);

        // $r1 receives the first parameter.
        self.params.clear();
        self.params.extend_from_slice(params);
        self.registers[1] = params.first().copied().unwrap_or(0);
        self.next_param_index = 1;

        let mut exiting = false;
        for _ in 0..self.step_limit {
            let in_delay_slot = exiting || self.delayed_pc.is_some();
            let base_pc = self.pc;

            let opcode = Opcode(processor.fetch_code(base_pc));
            self.pc = wrap_pc(base_pc as i64 + 1);
            if let Some(target) = self.delayed_pc.take() {
                self.pc = target;
            }

            let branched = self.run(opcode.decode(), base_pc, in_delay_slot, processor)?;

            if exiting {
                if self.next_param_index < self.params.len() {
                    log::warn!(
                        "Macro at 0x{:X}: consumed {} of {} parameters",
                        entry,
                        self.next_param_index,
                        self.params.len()
                    );
                }
                return Ok(MacroExit::Exited);
            }

            // Exit runs one more instruction; ignored on taken branches and
            // inside delay slots.
            if opcode.is_exit() && !in_delay_slot && !branched {
                exiting = true;
            }
        }

        log::warn!(
            "Macro at 0x{:X}: aborted after {} steps without exit",
            entry,
            self.step_limit
        );
        Ok(MacroExit::StepLimitReached)
    }

    /// Execute one instruction. Returns whether a branch was taken.
    fn run(
        &mut self,
        instruction: Instruction,
        base_pc: u32,
        in_delay_slot: bool,
        processor: &mut dyn MacroProcessor,
    ) -> Result<bool> {
        match instruction {
            Instruction::Alu {
                op,
                result,
                dst,
                src_a,
                src_b,
            } => {
                let value = self.alu(op, self.get_register(src_a), self.get_register(src_b));
                self.process_result(result, dst, value, processor)?;
            }
            Instruction::AddImmediate {
                result,
                dst,
                src_a,
                immediate,
            } => {
                let value = self.get_register(src_a).wrapping_add(immediate as u32);
                self.process_result(result, dst, value, processor)?;
            }
            Instruction::ExtractInsert {
                result,
                dst,
                src_a,
                src_b,
                bitfield,
            } => {
                let mut value = self.get_register(src_a);
                let mask = bitfield.mask();
                let extracted = (self.get_register(src_b) >> bitfield.src_bit) & mask;
                value &= !(mask << bitfield.dst_bit);
                value |= extracted << bitfield.dst_bit;
                self.process_result(result, dst, value, processor)?;
            }
            Instruction::ExtractShiftLeftImmediate {
                result,
                dst,
                src_a,
                src_b,
                bitfield,
            } => {
                let shift = self.get_register(src_a);
                let src = self.get_register(src_b);
                let value = (src.checked_shr(shift).unwrap_or(0) & bitfield.mask())
                    << bitfield.dst_bit;
                self.process_result(result, dst, value, processor)?;
            }
            Instruction::ExtractShiftLeftRegister {
                result,
                dst,
                src_a,
                src_b,
                bitfield,
            } => {
                let shift = self.get_register(src_a);
                let src = self.get_register(src_b);
                let value = ((src >> bitfield.src_bit) & bitfield.mask())
                    .checked_shl(shift)
                    .unwrap_or(0);
                self.process_result(result, dst, value, processor)?;
            }
            Instruction::Read {
                result,
                dst,
                src_a,
                immediate,
            } => {
                let method = self.get_register(src_a).wrapping_add(immediate as u32);
                let value = processor.macro_read(method);
                self.process_result(result, dst, value, processor)?;
            }
            Instruction::Branch {
                condition,
                annul,
                src_a,
                offset,
            } => {
                if in_delay_slot {
                    log::warn!("Macro: branch in delay slot at PC 0x{:X} ignored", base_pc);
                    return Ok(false);
                }
                let value = self.get_register(src_a);
                let taken = match condition {
                    BranchCondition::Zero => value == 0,
                    BranchCondition::NotZero => value != 0,
                };
                if taken {
                    let target = wrap_pc(base_pc as i64 + offset as i64);
                    if annul {
                        self.pc = target;
                    } else {
                        self.delayed_pc = Some(target);
                    }
                }
                return Ok(taken);
            }
            Instruction::Invalid(word) => {
                log::warn!(
                    "Macro: invalid instruction 0x{:08X} at PC 0x{:X}",
                    word,
                    base_pc
                );
            }
        }
        Ok(false)
    }

    fn process_result(
        &mut self,
        op: ResultOperation,
        dst_reg: u32,
        result: u32,
        processor: &mut dyn MacroProcessor,
    ) -> Result<()> {
        match op {
            ResultOperation::IgnoreAndFetch => {
                let param = self.fetch_param();
                self.set_register(dst_reg, param);
            }
            ResultOperation::Move => {
                self.set_register(dst_reg, result);
            }
            ResultOperation::MoveAndSetMethod => {
                self.set_register(dst_reg, result);
                self.method_address.set(result);
            }
            ResultOperation::FetchAndSend => {
                let param = self.fetch_param();
                self.set_register(dst_reg, param);
                self.send(result, processor)?;
            }
            ResultOperation::MoveAndSend => {
                self.set_register(dst_reg, result);
                self.send(result, processor)?;
            }
            ResultOperation::FetchAndSetMethod => {
                let param = self.fetch_param();
                self.set_register(dst_reg, param);
                self.method_address.set(result);
            }
            ResultOperation::MoveAndSetMethodFetchAndSend => {
                self.set_register(dst_reg, result);
                self.method_address.set(result);
                let param = self.fetch_param();
                self.send(param, processor)?;
            }
            ResultOperation::MoveAndSetMethodSend => {
                self.set_register(dst_reg, result);
                self.method_address.set(result);
                self.send((result >> 12) & 0x3F, processor)?;
            }
        }
        Ok(())
    }

    /// Perform an ALU operation, updating the carry flag. For subtraction the
    /// carry means "no borrow".
    fn alu(&mut self, op: ALUOperation, a: u32, b: u32) -> u32 {
        match op {
            ALUOperation::Add => {
                let (result, carry) = a.overflowing_add(b);
                self.carry = carry;
                result
            }
            ALUOperation::AddWithCarry => {
                let result = a as u64 + b as u64 + self.carry as u64;
                self.carry = result > 0xFFFF_FFFF;
                result as u32
            }
            ALUOperation::Subtract => {
                let (result, borrow) = a.overflowing_sub(b);
                self.carry = !borrow;
                result
            }
            ALUOperation::SubtractWithBorrow => {
                let result = (a as u64)
                    .wrapping_sub(b as u64)
                    .wrapping_sub((!self.carry) as u64);
                self.carry = result < 0x1_0000_0000;
                result as u32
            }
            ALUOperation::Xor => a ^ b,
            ALUOperation::Or => a | b,
            ALUOperation::And => a & b,
            ALUOperation::AndNot => a & !b,
            ALUOperation::Nand => !(a & b),
        }
    }

    /// Write `value` to the current method address and auto-increment.
    fn send(&mut self, value: u32, processor: &mut dyn MacroProcessor) -> Result<()> {
        processor.macro_write(self.method_address.address(), value)?;
        self.method_address.advance();
        Ok(())
    }

    fn get_register(&self, id: u32) -> u32 {
        if id == 0 {
            0
        } else {
            self.registers[id as usize & 0x7]
        }
    }

    fn set_register(&mut self, id: u32, value: u32) {
        if id != 0 {
            self.registers[id as usize & 0x7] = value;
        }
    }

    /// Next unconsumed argument, or 0 once the sequence is exhausted.
    fn fetch_param(&mut self) -> u32 {
        match self.params.get(self.next_param_index) {
            Some(&value) => {
                self.next_param_index += 1;
                value
            }
            None => {
                log::warn!(
                    "Macro: parameter fetch past end (index {}, {} supplied)",
                    self.next_param_index,
                    self.params.len()
                );
                0
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
