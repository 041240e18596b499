use anyhow::Result;
use shardvm_common::layout::PROGRAM_CAPACITY;
use shardvm_core::disasm::disassemble;
use shardvm_core::generator::BytecodeGenerator;
use shardvm_core::vault::FlagVault;
use std::io::{self, Write};

/// Prints the generated program with its relocation table.
pub fn print_listing(hex: bool) -> Result<()> {
    let vault = FlagVault::builtin();
    let program = BytecodeGenerator::builtin(&vault).generate(PROGRAM_CAPACITY)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(
        out,
        "; {} bytes, {} checkpoints, fail handler at {:#06x}",
        program.len(),
        program.checkpoints().len(),
        program.fail_handler()
    )?;
    for reloc in program.relocations() {
        writeln!(
            out,
            "; patch {:#06x} -> {:#06x} ({:?})",
            reloc.offset, reloc.target, reloc.label
        )?;
    }

    for line in disassemble(program.code()) {
        writeln!(out, "{}", line)?;
    }

    if hex {
        writeln!(out)?;
        for (row, chunk) in program.code().chunks(16).enumerate() {
            write!(out, "{:#06x} ", row * 16)?;
            for byte in chunk {
                write!(out, " {:02x}", byte)?;
            }
            writeln!(out)?;
        }
    }

    Ok(())
}
