//! Runtime generation of the verification program.
//!
//! The emitted program has three parts laid out back to back:
//!
//! 1. A comparison block per target position: consume one input character,
//!    deobfuscate the expected character, compare, and branch to the fail
//!    handler on mismatch.
//! 2. The success path: set the accept status, decode every flag byte into
//!    VM memory, and halt.
//! 3. The fail handler: clear the status register and halt.
//!
//! The fail handler's address is only known once the success path has been
//! emitted, so every branch is emitted with a placeholder target and
//! recorded in a pending patch list. A final relocation pass writes the
//! resolved address into each placeholder.

use crate::VmError;
use crate::vault::FlagVault;
use alloc::vec::Vec;
use shardvm_common::isa::{INSTRUCTION_WIDTH, Instruction, Opcode};
use shardvm_common::{regs, status};

/// Length of the built-in target phrase.
pub const TARGET_LEN: usize = 15;

/// Built-in target phrase, each byte XORed with its position plus one.
pub const OBFUSCATED_TARGET: [u8; TARGET_LEN] = [
    0x77 ^ 1,
    0x6d ^ 2,
    0x5f ^ 3,
    0x68 ^ 4,
    0x34 ^ 5,
    0x63 ^ 6,
    0x6b ^ 7,
    0x33 ^ 8,
    0x72 ^ 9,
    0x5f ^ 10,
    0x32 ^ 11,
    0x30 ^ 12,
    0x32 ^ 13,
    0x34 ^ 14,
    0x21 ^ 15,
];

// Scratch registers used by the emitted code.
const R_EXPECTED: u8 = 1;
const R_KEY: u8 = 2;

/// Bytes emitted per target position: LOAD, LOAD, LOAD, XOR, CMP, JNE.
const COMPARE_BLOCK_LEN: usize = 6 * INSTRUCTION_WIDTH;

/// Bytes emitted per flag byte: LOAD, LOAD, XOR, STORE.
const DECODE_BLOCK_LEN: usize = 4 * INSTRUCTION_WIDTH;

/// Bytes of the fail handler: LOAD r7, 0; HALT.
const FAIL_HANDLER_LEN: usize = INSTRUCTION_WIDTH + 1;

/// Obfuscates a plain phrase the way [`OBFUSCATED_TARGET`] is stored.
pub fn obfuscate(plain: &[u8]) -> Vec<u8> {
    plain
        .iter()
        .enumerate()
        .map(|(i, b)| b ^ position_key(i))
        .collect()
}

fn position_key(i: usize) -> u8 {
    (i + 1) as u8
}

/// Forward-referenced locations that branches may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    FailHandler,
}

/// A branch operand waiting for its label to be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingPatch {
    /// Offset of the low operand byte of the `JNE`.
    offset: usize,
    label: Label,
}

/// A resolved branch operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    /// Offset of the low operand byte that was patched.
    pub offset: usize,
    pub label: Label,
    /// Absolute address written into the operand.
    pub target: u16,
}

/// Append-only instruction buffer with a relocation list.
struct Assembler {
    code: Vec<u8>,
    pending: Vec<PendingPatch>,
    bound: Vec<(Label, usize)>,
}

impl Assembler {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            code: Vec::with_capacity(capacity),
            pending: Vec::new(),
            bound: Vec::new(),
        }
    }

    fn offset(&self) -> usize {
        self.code.len()
    }

    fn emit(&mut self, instr: Instruction) {
        let bytes = instr.to_bytes();
        self.code.extend_from_slice(&bytes[..instr.width()]);
    }

    /// Emits a `JNE` to `label` with a zero placeholder target. Returns the
    /// address of the branch instruction.
    fn emit_branch(&mut self, label: Label) -> usize {
        let at = self.offset();
        self.emit(Instruction::jne(0));
        self.pending.push(PendingPatch {
            offset: at + 1,
            label,
        });
        at
    }

    fn bind(&mut self, label: Label) -> usize {
        let at = self.offset();
        self.bound.push((label, at));
        at
    }

    fn address_of(&self, label: Label) -> Option<usize> {
        self.bound
            .iter()
            .find(|(bound, _)| *bound == label)
            .map(|&(_, at)| at)
    }

    /// Relocation pass: writes every bound label address into its pending
    /// placeholders.
    fn finish(mut self) -> Result<(Vec<u8>, Vec<Relocation>), VmError> {
        let mut relocations = Vec::with_capacity(self.pending.len());
        for patch in core::mem::take(&mut self.pending) {
            let address = self
                .address_of(patch.label)
                .ok_or(VmError::UnresolvedBranch {
                    offset: patch.offset,
                })?;
            let target = u16::try_from(address).map_err(|_| VmError::PatchOutOfRange {
                offset: patch.offset,
                target: address,
            })?;
            self.code[patch.offset..patch.offset + 2].copy_from_slice(&target.to_le_bytes());
            relocations.push(Relocation {
                offset: patch.offset,
                label: patch.label,
                target,
            });
        }
        Ok((self.code, relocations))
    }
}

/// An emitted, fully relocated verification program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedProgram {
    code: Vec<u8>,
    checkpoints: Vec<usize>,
    fail_handler: usize,
    relocations: Vec<Relocation>,
}

impl GeneratedProgram {
    /// Program bytes, starting at address zero.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Address of the `JNE` guarding each target position, in order.
    pub fn checkpoints(&self) -> &[usize] {
        &self.checkpoints
    }

    /// Address of the fail handler's first instruction.
    pub fn fail_handler(&self) -> usize {
        self.fail_handler
    }

    /// Branch operands filled in by the relocation pass, in emission order.
    pub fn relocations(&self) -> &[Relocation] {
        &self.relocations
    }
}

/// Emits verification programs for an obfuscated target and a flag vault.
///
/// The emitted code depends only on the target and the vault, never on the
/// phrase that will later be checked.
pub struct BytecodeGenerator<'a> {
    target: &'a [u8],
    vault: &'a FlagVault,
}

impl<'a> BytecodeGenerator<'a> {
    /// `target` must already be obfuscated with [`obfuscate`].
    pub fn new(target: &'a [u8], vault: &'a FlagVault) -> Self {
        Self { target, vault }
    }

    /// Generator for the built-in target phrase.
    pub fn builtin(vault: &'a FlagVault) -> Self {
        Self::new(&OBFUSCATED_TARGET, vault)
    }

    /// Exact size in bytes of the program [`generate`](Self::generate) emits.
    pub fn required_len(&self) -> usize {
        self.target.len() * COMPARE_BLOCK_LEN
            + INSTRUCTION_WIDTH
            + self.vault.combined().count() * DECODE_BLOCK_LEN
            + Opcode::Halt.width()
            + FAIL_HANDLER_LEN
    }

    /// Emits the program, failing if it would not fit in `capacity` bytes.
    pub fn generate(&self, capacity: usize) -> Result<GeneratedProgram, VmError> {
        let needed = self.required_len();
        if needed > capacity {
            return Err(VmError::GenerationOverflow { needed, capacity });
        }

        let mut asm = Assembler::with_capacity(needed);
        let mut checkpoints = Vec::with_capacity(self.target.len());

        for (i, &obfuscated) in self.target.iter().enumerate() {
            asm.emit(Instruction::load(regs::INPUT, 0));
            asm.emit(Instruction::load(R_EXPECTED, obfuscated));
            asm.emit(Instruction::load(R_KEY, position_key(i)));
            asm.emit(Instruction::xor(R_EXPECTED, R_KEY));
            asm.emit(Instruction::cmp(regs::INPUT, R_EXPECTED));
            checkpoints.push(asm.emit_branch(Label::FailHandler));
        }

        asm.emit(Instruction::load(regs::STATUS, status::ACCEPT));

        for (i, combined) in self.vault.combined().enumerate() {
            asm.emit(Instruction::load(R_EXPECTED, combined));
            asm.emit(Instruction::load(R_KEY, self.vault.key()));
            asm.emit(Instruction::xor(R_EXPECTED, R_KEY));
            asm.emit(Instruction::store(R_EXPECTED, i as u8));
        }
        asm.emit(Instruction::halt());

        let fail_handler = asm.bind(Label::FailHandler);
        asm.emit(Instruction::load(regs::STATUS, status::REJECT));
        asm.emit(Instruction::halt());

        let (code, relocations) = asm.finish()?;
        debug_assert_eq!(code.len(), needed);

        log::debug!(
            "generated {} byte program: {} checkpoints, fail handler at {:#06x}",
            code.len(),
            checkpoints.len(),
            fail_handler
        );

        Ok(GeneratedProgram {
            code,
            checkpoints,
            fail_handler,
            relocations,
        })
    }
}
