//! Register machine for executing generated verification programs.
//!
//! Implements a small interpreter over the byte-encoded instruction set:
//! eight byte-wide registers, a comparison flag, a cursor into the input
//! phrase, and a memory window written only by `STORE`. Decoding is
//! permissive; bytes that name no opcode are skipped one at a time. A
//! program counter ceiling turns runaway executions into rejections.

use shardvm_common::isa::{Decoded, INSTRUCTION_WIDTH, Instruction, Opcode, decode};
use shardvm_common::layout::PC_CEILING;
use shardvm_common::{regs, status};

/// Eight byte-wide registers. Register operands are masked to three bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterFile {
    regs: [u8; regs::COUNT],
}

impl RegisterFile {
    /// Reads register `idx & 7`.
    #[inline(always)]
    pub fn get(&self, idx: u8) -> u8 {
        self.regs[(idx & regs::INDEX_MASK) as usize]
    }

    /// Writes register `idx & 7`.
    #[inline(always)]
    pub fn set(&mut self, idx: u8, val: u8) {
        self.regs[(idx & regs::INDEX_MASK) as usize] = val;
    }
}

/// State set by `CMP` and consumed by `JNE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Comparison {
    #[default]
    Equal,
    NotEqual,
}

/// Result of dispatching a single instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// `HALT` was reached; carries the status register.
    Halted(u8),
}

/// Summary of a finished execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Result code: the status register at `HALT`, or `REJECT` when the
    /// runaway guard fired.
    pub status: u8,

    /// Program counter when execution stopped.
    pub final_pc: usize,

    /// Number of instructions dispatched, including stray bytes and the
    /// final `HALT`.
    pub steps: u64,

    /// Address of the last `JNE` that redirected control, if any.
    pub taken_branch: Option<usize>,

    /// Whether the program counter ceiling ended the execution.
    pub ceiling_hit: bool,
}

impl ExecutionOutcome {
    /// Whether the program halted with the accept status.
    pub fn accepted(&self) -> bool {
        self.status == status::ACCEPT
    }
}

/// Interpreter state for one execution.
///
/// A machine is built for a single run: registers, comparison flag, program
/// counter and input cursor all start fresh and are discarded with it.
pub struct RegisterMachine<'a> {
    /// Program bytes. Reads past the end yield zero.
    code: &'a [u8],

    /// Memory window written by `STORE`.
    memory: &'a mut [u8],

    /// Input phrase consumed by `LOAD r0`.
    input: &'a [u8],

    registers: RegisterFile,
    pc: usize,
    flag: Comparison,
    cursor: usize,
    steps: u64,
    taken_branch: Option<usize>,
}

impl<'a> RegisterMachine<'a> {
    /// Prepares a machine at program counter zero with cleared registers.
    ///
    /// `memory` is the window `STORE` writes into. It is not cleared here.
    pub fn new(code: &'a [u8], memory: &'a mut [u8], input: &'a [u8]) -> Self {
        Self {
            code,
            memory,
            input,
            registers: RegisterFile::default(),
            pc: 0,
            flag: Comparison::default(),
            cursor: 0,
            steps: 0,
            taken_branch: None,
        }
    }

    /// Address of the next instruction to dispatch.
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Current register contents.
    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn flag(&self) -> Comparison {
        self.flag
    }

    /// Number of input characters consumed so far.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn next_input(&mut self) -> u8 {
        match self.input.get(self.cursor) {
            Some(&c) => {
                self.cursor += 1;
                c
            }
            None => 0,
        }
    }

    /// Fetches, decodes and executes the instruction at the program counter.
    pub fn step(&mut self) -> Step {
        let decoded = decode(self.code, self.pc);
        self.steps += 1;
        log::trace!("{:#06x}: {}", self.pc, decoded);

        let instr = match decoded {
            Decoded::Op(instr) => instr,
            Decoded::Unknown(_) => {
                self.pc += 1;
                return Step::Continue;
            }
        };

        match instr.opcode {
            Opcode::Halt => return Step::Halted(self.registers.get(regs::STATUS)),
            Opcode::Jne => {
                if self.flag == Comparison::NotEqual {
                    self.taken_branch = Some(self.pc);
                    self.pc = instr.branch_target() as usize;
                } else {
                    self.pc += INSTRUCTION_WIDTH;
                }
                return Step::Continue;
            }
            _ => self.apply(instr),
        }

        self.pc += INSTRUCTION_WIDTH;
        Step::Continue
    }

    /// Applies a straight-line instruction. Control flow is handled by
    /// [`step`](Self::step).
    fn apply(&mut self, instr: Instruction) {
        let (a, b) = (instr.operand_1, instr.operand_2);
        match instr.opcode {
            Opcode::Load => {
                let val = if a & regs::INDEX_MASK == regs::INPUT {
                    self.next_input()
                } else {
                    b
                };
                self.registers.set(a, val);
            }
            Opcode::Xor => {
                let val = self.registers.get(a) ^ self.registers.get(b);
                self.registers.set(a, val);
            }
            Opcode::Add => {
                let val = self.registers.get(a).wrapping_add(self.registers.get(b));
                self.registers.set(a, val);
            }
            Opcode::Cmp => {
                self.flag = if self.registers.get(a) == self.registers.get(b) {
                    Comparison::Equal
                } else {
                    Comparison::NotEqual
                };
            }
            Opcode::Store => match self.memory.get_mut(b as usize) {
                Some(slot) => *slot = self.registers.get(a),
                None => log::warn!(
                    "STORE at {:#06x} outside {} byte memory window",
                    self.pc,
                    self.memory.len()
                ),
            },
            Opcode::Jne | Opcode::Halt => {}
        }
    }

    /// Runs until `HALT` or until the program counter passes the ceiling.
    pub fn run(mut self) -> ExecutionOutcome {
        loop {
            if let Step::Halted(status) = self.step() {
                log::debug!(
                    "halted at {:#06x} with status {:#04x} after {} steps",
                    self.pc,
                    status,
                    self.steps
                );
                return self.outcome(status, false);
            }
            if self.pc > PC_CEILING {
                log::warn!(
                    "runaway execution stopped at {:#06x} after {} steps",
                    self.pc,
                    self.steps
                );
                return self.outcome(status::REJECT, true);
            }
        }
    }

    fn outcome(&self, status: u8, ceiling_hit: bool) -> ExecutionOutcome {
        ExecutionOutcome {
            status,
            final_pc: self.pc,
            steps: self.steps,
            taken_branch: self.taken_branch,
            ceiling_hit,
        }
    }
}

/// Executes `code` against `input` on a fresh machine.
pub fn execute(code: &[u8], memory: &mut [u8], input: &[u8]) -> ExecutionOutcome {
    RegisterMachine::new(code, memory, input).run()
}
