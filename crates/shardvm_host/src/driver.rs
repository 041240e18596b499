//! Interactive challenge driver.
//!
//! Reads one phrase, builds the verification program into a fresh code
//! image, runs it, and reports the verdict. The runtime key only appears in
//! the rejection diagnostics.

use anyhow::{Context, Result, bail};
use shardvm_common::layout::{MEMORY_OFFSET, PROGRAM_CAPACITY};
use shardvm_core::generator::BytecodeGenerator;
use shardvm_core::image::CodeImage;
use shardvm_core::key;
use shardvm_core::vault::{FLAG_LEN, FlagVault};
use shardvm_core::vm;
use std::io::{self, BufRead, Read, Write};
use std::process::ExitCode;

/// Added to the final program counter to form the fake instruction count.
const FAKE_COUNT_BIAS: usize = 42;

/// Longest phrase read from the input, newline included. Anything past it
/// stays unread.
const MAX_LINE_LEN: u64 = 255;

pub fn run_check() -> Result<ExitCode> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let accepted = run_session(stdin.lock(), stdout.lock(), std::process::id())?;
    Ok(if accepted {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Runs one prompt-verify-report cycle. Returns whether the phrase was
/// accepted.
pub fn run_session<R: BufRead, W: Write>(mut input: R, mut out: W, pid: u32) -> Result<bool> {
    let mut image = CodeImage::allocate().context("Memory allocation failed")?;

    writeln!(out, "Advanced Reverse Engineering Challenge")?;
    write!(out, "Enter the secret phrase: ")?;
    out.flush()?;

    let phrase = read_phrase(&mut input).context("Input error")?;

    let stack_anchor = 0u8;
    let runtime_key = key::derive_runtime_key(pid, &stack_anchor as *const u8 as usize);

    let vault = FlagVault::builtin();
    let program = BytecodeGenerator::builtin(&vault)
        .generate(PROGRAM_CAPACITY)
        .context("Bytecode generation failed")?;
    image.load(&program)?;
    log::debug!(
        "loaded {} byte program, memory window at {:#06x}",
        program.len(),
        MEMORY_OFFSET
    );

    let (code, memory) = image.split_mut();
    let outcome = vm::execute(code, memory, &phrase);

    if outcome.accepted() {
        writeln!(out, "Congratulations! Here's your flag:")?;
        out.write_all(&image.memory()[..FLAG_LEN])?;
        writeln!(out)?;
    } else {
        writeln!(out, "Access denied. The VM rejects your input.")?;
        writeln!(
            out,
            "Debug: Runtime key was 0x{:08X}",
            key::displayed(runtime_key)
        )?;
        writeln!(
            out,
            "Debug: VM executed {} instructions",
            outcome.final_pc + FAKE_COUNT_BIAS
        )?;
    }
    out.flush()?;

    Ok(outcome.accepted())
}

/// Reads a single line of at most [`MAX_LINE_LEN`] bytes and strips its
/// trailing newline.
fn read_phrase<R: BufRead>(input: &mut R) -> Result<Vec<u8>> {
    let mut line = Vec::new();
    if input.by_ref().take(MAX_LINE_LEN).read_until(b'\n', &mut line)? == 0 {
        bail!("no input available");
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(stdin: &[u8]) -> (Result<bool>, String) {
        session_as(stdin, 4242)
    }

    fn session_as(stdin: &[u8], pid: u32) -> (Result<bool>, String) {
        let mut out = Vec::new();
        let result = run_session(stdin, &mut out, pid);
        (result, String::from_utf8_lossy(&out).into_owned())
    }

    fn without_key_line(out: &str) -> Vec<&str> {
        out.lines()
            .filter(|line| !line.starts_with("Debug: Runtime key was"))
            .collect()
    }

    #[test]
    fn correct_phrase_prints_flag() {
        let (result, out) = session(b"wm_h4ck3r_2024!\n");
        assert!(result.unwrap());
        let flag = String::from_utf8(FlagVault::builtin().decode()).unwrap();
        assert!(out.contains("Congratulations! Here's your flag:\n"));
        assert!(out.ends_with(&format!("{}\n", flag)));
    }

    #[test]
    fn phrase_without_newline_is_accepted() {
        let (result, _) = session(b"wm_h4ck3r_2024!");
        assert!(result.unwrap());
    }

    #[test]
    fn rejection_prints_diagnostics_only() {
        let (result, out) = session(b"wm_h4ck3r_2024?\n");
        assert!(!result.unwrap());
        assert!(out.contains("Access denied. The VM rejects your input.\n"));
        assert!(out.contains("Debug: Runtime key was 0x"));
        // Fail handler HALT sits at 661.
        assert!(out.contains("Debug: VM executed 703 instructions\n"));
        assert!(!out.contains("picoCTF"));
        assert!(!out.contains("wm_h4ck3r_2024!"));
    }

    #[test]
    fn empty_line_is_rejected() {
        let (result, out) = session(b"\n");
        assert!(!result.unwrap());
        assert!(out.contains("Access denied"));
    }

    #[test]
    fn closed_input_is_an_error() {
        let (result, _) = session(b"");
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Input error");
    }

    #[test]
    fn only_first_line_is_read() {
        let (result, _) = session(b"nope\nwm_h4ck3r_2024!\n");
        assert!(!result.unwrap());
    }

    #[test]
    fn verdict_and_output_do_not_depend_on_pid() {
        let inputs: [&[u8]; 4] = [
            b"wm_h4ck3r_2024!\n",
            b"\n",
            b"wm_h4ck3r_2024?\n",
            b"wm_h4ck3r_2024\n",
        ];
        for input in inputs {
            let (expected, baseline) = session_as(input, 1);
            let expected = expected.unwrap();
            for pid in [255, 256, 4242, 0xFFFF_FFFF] {
                let (result, out) = session_as(input, pid);
                assert_eq!(result.unwrap(), expected, "pid {:#x}", pid);
                assert_eq!(without_key_line(&out), without_key_line(&baseline));
            }
        }
    }

    #[test]
    fn overlong_line_is_truncated() {
        let mut line = b"wm_h4ck3r_2024!".to_vec();
        line.resize(4096, b'x');
        line.push(b'\n');

        let mut input = line.as_slice();
        let phrase = read_phrase(&mut input).unwrap();
        assert_eq!(phrase.len(), MAX_LINE_LEN as usize);
        assert_eq!(input.len(), line.len() - MAX_LINE_LEN as usize);

        let (result, _) = session(&line);
        assert!(result.unwrap());
    }
}
