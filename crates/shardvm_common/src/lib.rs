//! Common definitions shared by the shard verifier crates.
//!
//! This crate provides the layout of the code image handed to the register
//! machine, the register roles and status codes the generated programs rely
//! on, and the binary encoding of the instruction set. Both the bytecode
//! generator and the interpreter depend on these definitions, so any change
//! here changes the wire format of every generated program.

#![cfg_attr(not(test), no_std)]

// Address space layout of the code image.
//
// The driver owns a single zero-filled image. The generated program is
// written at the start of the image and the VM memory window lives at a
// fixed offset past the program region, so program bytes and scratch
// memory never overlap.
pub mod layout {
    /// Total size of the code image allocated by the driver.
    pub const IMAGE_SIZE: usize = 4096;

    /// Offset of the VM memory window inside the image.
    ///
    /// Everything below this offset is reserved for program bytes, which
    /// makes it the capacity handed to the bytecode generator.
    pub const MEMORY_OFFSET: usize = 1024;

    /// Size of the VM memory window in bytes.
    ///
    /// `STORE` addresses are a single byte wide, so 256 bytes covers every
    /// address a program can name.
    pub const MEMORY_SIZE: usize = 256;

    /// Maximum number of program bytes the generator may emit.
    pub const PROGRAM_CAPACITY: usize = MEMORY_OFFSET;

    /// Program counter ceiling enforced by the runaway guard.
    ///
    /// Once the program counter moves past this value without reaching a
    /// `HALT`, execution is abandoned and reported as a rejection.
    pub const PC_CEILING: usize = 4000;
}

/// Register roles in the register machine.
///
/// The register file holds eight byte-wide registers. Two of them carry
/// meaning beyond general scratch use.
pub mod regs {
    /// Number of registers in the register file.
    pub const COUNT: usize = 8;

    /// Input register. `LOAD r0, _` consumes the next input character
    /// instead of the literal operand.
    pub const INPUT: u8 = 0;

    /// Status register. Its value is the result code returned by `HALT`.
    pub const STATUS: u8 = 7;

    /// Mask applied to register operands so they always address the file.
    pub const INDEX_MASK: u8 = (COUNT - 1) as u8;
}

/// Terminal status codes carried in the status register.
pub mod status {
    /// Result code of a program that accepted its input.
    pub const ACCEPT: u8 = 0x42;

    /// Result code of the fail handler and of aborted executions.
    pub const REJECT: u8 = 0x00;
}

/// Instruction set encoding for the register machine.
///
/// Every instruction except `HALT` is a fixed three byte tuple of opcode and
/// two byte operands. `HALT` is a lone opcode byte. Opcode values are
/// scattered across the byte range; any byte that is not one of them decodes
/// as a one byte no-op.
pub mod isa {
    use core::fmt;

    /// Width in bytes of every instruction that carries operands.
    pub const INSTRUCTION_WIDTH: usize = 3;

    /// Opcode enumeration for the register machine.
    #[repr(u8)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Opcode {
        /// `LOAD reg, val`: set a register to a literal.
        ///
        /// When the target is the input register the literal is ignored and
        /// the next input character is consumed instead.
        Load = 0x47,

        /// `XOR r1, r2`: `r1 ^= r2`.
        Xor = 0xB3,

        /// `ADD r1, r2`: `r1 = r1 + r2` modulo 256.
        Add = 0x91,

        /// `CMP r1, r2`: set the comparison flag to equal or not-equal.
        Cmp = 0x5E,

        /// `JNE lo, hi`: jump to the absolute little-endian address when
        /// the last comparison was not-equal.
        Jne = 0xC2,

        /// `STORE reg, addr`: write a register to VM memory.
        Store = 0x7A,

        /// `HALT`: stop and return the status register.
        Halt = 0x00,
    }

    impl Opcode {
        /// Maps a raw byte to its opcode, if it names one.
        pub const fn from_byte(byte: u8) -> Option<Self> {
            match byte {
                0x47 => Some(Self::Load),
                0xB3 => Some(Self::Xor),
                0x91 => Some(Self::Add),
                0x5E => Some(Self::Cmp),
                0xC2 => Some(Self::Jne),
                0x7A => Some(Self::Store),
                0x00 => Some(Self::Halt),
                _ => None,
            }
        }

        /// Encoded width of an instruction with this opcode.
        pub const fn width(self) -> usize {
            match self {
                Self::Halt => 1,
                _ => INSTRUCTION_WIDTH,
            }
        }

        /// Assembly name used by listings and traces.
        pub const fn mnemonic(self) -> &'static str {
            match self {
                Self::Load => "LOAD",
                Self::Xor => "XOR",
                Self::Add => "ADD",
                Self::Cmp => "CMP",
                Self::Jne => "JNE",
                Self::Store => "STORE",
                Self::Halt => "HALT",
            }
        }
    }

    /// A decoded instruction: opcode plus its two operand bytes.
    ///
    /// For `HALT` both operands are zero and are never encoded.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Instruction {
        pub opcode: Opcode,
        /// First operand: a register, or the low byte of a branch target.
        pub operand_1: u8,
        /// Second operand: a register, a literal, a memory address, or the
        /// high byte of a branch target.
        pub operand_2: u8,
    }

    impl Instruction {
        /// Builds an instruction from its raw parts.
        ///
        /// Operands are stored as given. Register operands are only masked
        /// when the machine reads them.
        pub const fn new(opcode: Opcode, op1: u8, op2: u8) -> Self {
            Self {
                opcode,
                operand_1: op1,
                operand_2: op2,
            }
        }

        /// `LOAD reg, val`. A `reg` of [`regs::INPUT`](crate::regs::INPUT)
        /// makes the literal irrelevant.
        pub const fn load(reg: u8, val: u8) -> Self {
            Self::new(Opcode::Load, reg, val)
        }

        /// `XOR r1, r2`, storing into `r1`.
        pub const fn xor(r1: u8, r2: u8) -> Self {
            Self::new(Opcode::Xor, r1, r2)
        }

        /// `ADD r1, r2`, storing the wrapped sum into `r1`.
        pub const fn add(r1: u8, r2: u8) -> Self {
            Self::new(Opcode::Add, r1, r2)
        }

        /// `CMP r1, r2`. Only the comparison flag changes.
        pub const fn cmp(r1: u8, r2: u8) -> Self {
            Self::new(Opcode::Cmp, r1, r2)
        }

        /// Conditional branch to an absolute 16-bit address.
        pub const fn jne(target: u16) -> Self {
            let [lo, hi] = target.to_le_bytes();
            Self::new(Opcode::Jne, lo, hi)
        }

        /// `STORE reg, addr`, writing into the memory window at `addr`.
        pub const fn store(reg: u8, addr: u8) -> Self {
            Self::new(Opcode::Store, reg, addr)
        }

        /// `HALT`. Encodes as the single opcode byte.
        pub const fn halt() -> Self {
            Self::new(Opcode::Halt, 0, 0)
        }

        /// Branch target of a `JNE`, decoded little-endian from the operands.
        pub const fn branch_target(&self) -> u16 {
            u16::from_le_bytes([self.operand_1, self.operand_2])
        }

        /// Encoded width in bytes.
        pub const fn width(&self) -> usize {
            self.opcode.width()
        }

        /// Encodes the instruction. Only the first `width()` bytes are
        /// meaningful.
        pub const fn to_bytes(&self) -> [u8; INSTRUCTION_WIDTH] {
            [self.opcode as u8, self.operand_1, self.operand_2]
        }
    }

    impl fmt::Display for Instruction {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let name = self.opcode.mnemonic();
            match self.opcode {
                Opcode::Load => {
                    write!(f, "{} r{}, {:#04x}", name, self.operand_1, self.operand_2)
                }
                Opcode::Xor | Opcode::Add | Opcode::Cmp => {
                    write!(f, "{} r{}, r{}", name, self.operand_1, self.operand_2)
                }
                Opcode::Jne => write!(f, "{} {:#06x}", name, self.branch_target()),
                Opcode::Store => {
                    write!(f, "{} r{}, [{:#04x}]", name, self.operand_1, self.operand_2)
                }
                Opcode::Halt => f.write_str(name),
            }
        }
    }

    /// Result of decoding the byte at a program counter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Decoded {
        /// A recognised instruction.
        Op(Instruction),
        /// A byte that names no opcode. Executes as a one byte no-op.
        Unknown(u8),
    }

    impl Decoded {
        /// Number of bytes the program counter advances past this entry
        /// when it falls through.
        pub const fn width(&self) -> usize {
            match self {
                Self::Op(instr) => instr.width(),
                Self::Unknown(_) => 1,
            }
        }
    }

    impl fmt::Display for Decoded {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Op(instr) => fmt::Display::fmt(instr, f),
                Self::Unknown(byte) => write!(f, "DB {:#04x}", byte),
            }
        }
    }

    /// Decodes the instruction starting at `pc`.
    ///
    /// Bytes past the end of `code` read as zero, matching a zero-filled
    /// image, so a program counter that runs off the end decodes as `HALT`.
    pub fn decode(code: &[u8], pc: usize) -> Decoded {
        let byte_at = |idx: usize| code.get(idx).copied().unwrap_or(0);
        let raw = byte_at(pc);
        match Opcode::from_byte(raw) {
            Some(Opcode::Halt) => Decoded::Op(Instruction::halt()),
            Some(opcode) => Decoded::Op(Instruction::new(
                opcode,
                byte_at(pc + 1),
                byte_at(pc + 2),
            )),
            None => Decoded::Unknown(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::isa::*;

    #[test]
    fn jne_operands_are_little_endian() {
        let instr = Instruction::jne(0x0292);
        assert_eq!(instr.to_bytes(), [0xC2, 0x92, 0x02]);
        assert_eq!(instr.branch_target(), 0x0292);
    }

    #[test]
    fn decode_is_permissive_for_unknown_bytes() {
        let code = [0xAA, 0x47, 0x01, 0x55];
        assert_eq!(decode(&code, 0), Decoded::Unknown(0xAA));
        assert_eq!(decode(&code, 0).width(), 1);
        assert_eq!(decode(&code, 1), Decoded::Op(Instruction::load(1, 0x55)));
    }

    #[test]
    fn decode_past_end_reads_halt() {
        let code = [0x5E];
        assert_eq!(decode(&code, 7), Decoded::Op(Instruction::halt()));
        // Truncated operands are zero-filled.
        assert_eq!(decode(&code, 0), Decoded::Op(Instruction::cmp(0, 0)));
    }

    #[test]
    fn every_opcode_round_trips_through_its_byte() {
        for opcode in [
            Opcode::Load,
            Opcode::Xor,
            Opcode::Add,
            Opcode::Cmp,
            Opcode::Jne,
            Opcode::Store,
            Opcode::Halt,
        ] {
            assert_eq!(Opcode::from_byte(opcode as u8), Some(opcode));
        }
        assert_eq!(Opcode::from_byte(0x01), None);
    }
}
