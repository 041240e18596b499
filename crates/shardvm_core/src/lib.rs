//! Core of the shard verifier: bytecode generation and interpretation.
//!
//! This crate builds the verification program at runtime and executes it on
//! a small register machine. The program compares an input phrase against
//! an obfuscated target one character at a time and, on success, decodes a
//! flag split across two shards into VM memory. All modules are `no_std`
//! with `alloc` so the same code runs inside the host binary and in tests.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use core::fmt;

/// Disassembler for generated programs.
///
/// Walks a program with the same permissive decoding the interpreter uses
/// and produces one listing line per instruction or stray byte. Used by the
/// host's `disasm` subcommand and by tests that inspect emitted code.
pub mod disasm;

/// Bytecode generator with forward-branch backpatching.
///
/// Emits the comparison loop, the success path that decodes the flag into
/// VM memory, and the fail handler. Conditional branches to the fail
/// handler are emitted with placeholder targets and resolved in a separate
/// relocation pass once the handler's address is known.
pub mod generator;

/// Code image owned by the driver.
///
/// A zero-filled buffer holding the generated program at its start and the
/// VM memory window at a fixed offset. Allocation is fallible so that an
/// exhausted heap is reported instead of aborting the process.
pub mod image;

/// Decorative runtime key derivation.
///
/// Mixes the process id and a stack address into a 32-bit value that is
/// only ever printed in the rejection diagnostics. It has no path into the
/// verification program or the interpreter.
pub mod key;

/// Shard storage and decoding for the flag.
///
/// Holds the two fixed shards whose element-wise XOR with a fixed key
/// reconstructs the flag. The generator inlines the same computation into
/// the bytecode; both paths must agree byte for byte.
pub mod vault;

/// Register machine interpreter.
///
/// Executes a generated program against an input phrase with fresh
/// registers, comparison flag and input cursor per run, bounded by a
/// program counter ceiling.
pub mod vm;

/// Error types returned by generation and image management.
///
/// Execution itself never fails: a runaway program or a rejected input is
/// reported through the execution outcome. These errors describe
/// configuration defects and resource exhaustion that the driver treats as
/// fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// The generated program does not fit the destination capacity.
    ///
    /// The program size depends only on the fixed target length and shard
    /// count, so this indicates a configuration defect rather than bad input.
    GenerationOverflow { needed: usize, capacity: usize },

    /// The code image could not be allocated.
    AllocationFailure { requested: usize },

    /// A branch target does not fit the 16-bit operand of a `JNE`.
    ///
    /// Raised by the relocation pass when the resolved address exceeds
    /// `u16::MAX`.
    PatchOutOfRange { offset: usize, target: usize },

    /// A branch was emitted to a label that was never bound.
    UnresolvedBranch { offset: usize },
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GenerationOverflow { needed, capacity } => write!(
                f,
                "generated program needs {} bytes but only {} are available",
                needed, capacity
            ),
            Self::AllocationFailure { requested } => {
                write!(f, "memory allocation failed ({} bytes)", requested)
            }
            Self::PatchOutOfRange { offset, target } => write!(
                f,
                "branch at {:#06x} cannot reach {:#x}",
                offset, target
            ),
            Self::UnresolvedBranch { offset } => {
                write!(f, "branch at {:#06x} targets an unbound label", offset)
            }
        }
    }
}

impl core::error::Error for VmError {}
