//! Code image: program bytes and VM memory in a single buffer.

use crate::VmError;
use crate::generator::GeneratedProgram;
use alloc::vec::Vec;
use shardvm_common::layout::{IMAGE_SIZE, MEMORY_OFFSET, MEMORY_SIZE, PROGRAM_CAPACITY};

/// Zero-filled buffer holding the program region and the memory window.
///
/// The program occupies `[0, MEMORY_OFFSET)`; the VM memory window is
/// `[MEMORY_OFFSET, MEMORY_OFFSET + MEMORY_SIZE)`. Unused program bytes stay
/// zero, which the interpreter decodes as `HALT`.
pub struct CodeImage {
    bytes: Vec<u8>,
}

impl CodeImage {
    /// Allocates a fresh image of [`IMAGE_SIZE`] bytes.
    pub fn allocate() -> Result<Self, VmError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(IMAGE_SIZE)
            .map_err(|_| VmError::AllocationFailure {
                requested: IMAGE_SIZE,
            })?;
        bytes.resize(IMAGE_SIZE, 0);
        Ok(Self { bytes })
    }

    /// Copies a generated program into the program region.
    pub fn load(&mut self, program: &GeneratedProgram) -> Result<(), VmError> {
        let code = program.code();
        if code.len() > PROGRAM_CAPACITY {
            return Err(VmError::GenerationOverflow {
                needed: code.len(),
                capacity: PROGRAM_CAPACITY,
            });
        }
        self.bytes[..code.len()].copy_from_slice(code);
        Ok(())
    }

    /// Whole program region, including the zero tail past the loaded code.
    pub fn program(&self) -> &[u8] {
        &self.bytes[..MEMORY_OFFSET]
    }

    pub fn memory(&self) -> &[u8] {
        &self.bytes[MEMORY_OFFSET..MEMORY_OFFSET + MEMORY_SIZE]
    }

    /// Splits the image into the read-only program region and the writable
    /// memory window, as handed to the interpreter.
    pub fn split_mut(&mut self) -> (&[u8], &mut [u8]) {
        let (program, rest) = self.bytes.split_at_mut(MEMORY_OFFSET);
        (&*program, &mut rest[..MEMORY_SIZE])
    }
}
