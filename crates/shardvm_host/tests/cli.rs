//! Drives the `shardvm` binary end to end.

use std::io::Write;
use std::process::{Command, Output, Stdio};

const PHRASE: &str = "wm_h4ck3r_2024!";
const FLAG: &str = "picoCTF{adv4nced_vm_0bfusc4ti0n}";

fn check(stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_shardvm"))
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn shardvm");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_correct_phrase_prints_flag() {
    let output = check(&format!("{}\n", PHRASE));
    assert_eq!(output.status.code(), Some(0));
    let out = stdout(&output);
    assert!(out.starts_with("Advanced Reverse Engineering Challenge\nEnter the secret phrase: "));
    assert!(out.contains(&format!("Congratulations! Here's your flag:\n{}\n", FLAG)));
}

#[test]
fn test_empty_phrase_is_denied() {
    let output = check("\n");
    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.contains("Access denied. The VM rejects your input."));
    assert!(!out.contains(FLAG));
}

#[test]
fn test_last_character_altered_is_denied() {
    let output = check("wm_h4ck3r_2024?\n");
    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.contains("Access denied"));
    assert!(out.contains("Debug: VM executed 703 instructions"));
    assert!(!out.contains(FLAG));
}

#[test]
fn test_first_character_altered_is_denied() {
    let output = check("Wm_h4ck3r_2024!\n");
    assert_eq!(output.status.code(), Some(1));
    assert!(!stdout(&output).contains(FLAG));
}

#[test]
fn test_closed_stdin_is_fatal() {
    let output = check("");
    assert_eq!(output.status.code(), Some(1));
    let err = String::from_utf8_lossy(&output.stderr);
    assert!(err.contains("Input error"));
}

#[test]
fn test_check_subcommand_matches_default() {
    let output = Command::new(env!("CARGO_BIN_EXE_shardvm"))
        .arg("check")
        .stdin(Stdio::null())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_disasm_lists_program() {
    let output = Command::new(env!("CARGO_BIN_EXE_shardvm"))
        .arg("disasm")
        .output()
        .unwrap();
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.starts_with("; 662 bytes, 15 checkpoints, fail handler at 0x0292\n"));
    assert_eq!(out.matches("JNE 0x0292").count(), 15);
    assert!(out.contains("0x0295  HALT"));
}

#[test]
fn test_sweep_reports_every_variant() {
    let output = Command::new(env!("CARGO_BIN_EXE_shardvm"))
        .args(["sweep", "--phrase", "abc"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Variants: 8"));
    assert!(out.contains("Accepted: 0/8"));
}
