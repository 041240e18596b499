//! Listing of generated programs.

use alloc::vec::Vec;
use core::fmt;
use shardvm_common::isa::{Decoded, decode};

/// One decoded entry of a program listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingLine {
    pub pc: usize,
    pub decoded: Decoded,
}

impl fmt::Display for ListingLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}  {}", self.pc, self.decoded)
    }
}

/// Decodes `code` linearly from offset zero.
///
/// Each entry advances by its encoded width, so the listing follows the
/// fall-through path the interpreter would take; a trailing instruction
/// whose operands run past the end is still listed with zero operands.
pub fn disassemble(code: &[u8]) -> Vec<ListingLine> {
    let mut lines = Vec::new();
    let mut pc = 0;
    while pc < code.len() {
        let decoded = decode(code, pc);
        lines.push(ListingLine { pc, decoded });
        pc += decoded.width();
    }
    lines
}
