//! Mutation sweep over a candidate phrase.
//!
//! Builds every single-position mutation, every proper prefix, and one
//! over-long extension of the candidate, runs each on its own machine in
//! parallel, and reports which checkpoint rejected it. Useful for checking
//! that rejection always happens at the first differing position.

use anyhow::Result;
use rayon::prelude::*;
use shardvm_common::layout::{MEMORY_SIZE, PROGRAM_CAPACITY};
use shardvm_core::generator::{BytecodeGenerator, GeneratedProgram};
use shardvm_core::vault::FlagVault;
use shardvm_core::vm::{self, ExecutionOutcome};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variant {
    Unchanged,
    Mutated(usize),
    Prefix(usize),
    Extended,
}

pub struct SweepResult {
    pub variant: Variant,
    pub outcome: ExecutionOutcome,
    /// Position whose checkpoint rejected the input.
    pub rejected_at: Option<usize>,
}

/// Flips a bit that keeps printable ASCII printable.
fn mutate(byte: u8) -> u8 {
    byte ^ 0x01
}

pub fn variants(phrase: &[u8]) -> Vec<(Variant, Vec<u8>)> {
    let mut out = Vec::with_capacity(2 * phrase.len() + 2);
    out.push((Variant::Unchanged, phrase.to_vec()));
    for k in 0..phrase.len() {
        let mut mutated = phrase.to_vec();
        mutated[k] = mutate(mutated[k]);
        out.push((Variant::Mutated(k), mutated));
    }
    for len in 0..phrase.len() {
        out.push((Variant::Prefix(len), phrase[..len].to_vec()));
    }
    let mut extended = phrase.to_vec();
    extended.push(b'!');
    out.push((Variant::Extended, extended));
    out
}

pub fn sweep(program: &GeneratedProgram, phrase: &[u8]) -> Vec<SweepResult> {
    variants(phrase)
        .into_par_iter()
        .map(|(variant, input)| {
            let mut memory = [0u8; MEMORY_SIZE];
            let outcome = vm::execute(program.code(), &mut memory, &input);
            let rejected_at = outcome
                .taken_branch
                .and_then(|pc| program.checkpoints().iter().position(|&at| at == pc));
            SweepResult {
                variant,
                outcome,
                rejected_at,
            }
        })
        .collect()
}

pub fn run_sweep(phrase: &[u8]) -> Result<()> {
    let vault = FlagVault::builtin();
    let program = BytecodeGenerator::builtin(&vault).generate(PROGRAM_CAPACITY)?;

    println!("Sweeping {} byte phrase...", phrase.len());
    let start = Instant::now();
    let results = sweep(&program, phrase);
    let elapsed = start.elapsed();

    for result in &results {
        let verdict = if result.outcome.accepted() {
            "ACCEPT"
        } else {
            "reject"
        };
        let at = match result.rejected_at {
            Some(pos) => format!("checkpoint {}", pos),
            None if result.outcome.ceiling_hit => "ceiling".to_string(),
            None => "-".to_string(),
        };
        println!(
            "{:<14} {} {:<14} pc={:#06x} steps={}",
            format!("{:?}", result.variant),
            verdict,
            at,
            result.outcome.final_pc,
            result.outcome.steps
        );
    }

    let accepted = results.iter().filter(|r| r.outcome.accepted()).count();
    println!("Variants: {}", results.len());
    println!("Accepted: {}/{}", accepted, results.len());
    println!("Time: {:?}", elapsed);
    Ok(())
}
