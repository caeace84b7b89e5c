use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use viv_cmdstream::CmdStreamWriter;

fn cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_viv-cmd-diff"))
}

fn draw(w: &mut CmdStreamWriter) {
    w.draw_indexed_primitives(0, [0x20, 60, 0, 0, 0]);
}

fn write_stream(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn no_arguments_is_a_usage_error() {
    cmd()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn one_argument_is_a_usage_error() {
    cmd().arg("only-one.bin").assert().code(1);
}

#[test]
fn help_exits_zero() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Compare two captured GPU command streams",
        ));
}

#[test]
fn unreadable_file_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let mut w = CmdStreamWriter::new();
    draw(&mut w);
    let good = write_stream(&dir, "good.bin", w.as_bytes());
    let missing = dir.path().join("missing.bin");

    cmd()
        .arg(&missing)
        .arg(&good)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("open").and(predicate::str::contains("missing.bin")));
}

#[test]
fn identical_streams_exit_zero_with_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut w = CmdStreamWriter::new();
    w.load_state(0x10, &[5]);
    draw(&mut w);
    let a = write_stream(&dir, "a.bin", w.as_bytes());
    let b = write_stream(&dir, "b.bin", w.as_bytes());

    cmd()
        .arg(&a)
        .arg(&b)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn differences_go_to_stdout_not_the_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let mut a = CmdStreamWriter::new();
    a.load_state(0x10, &[5]);
    draw(&mut a);
    let mut b = CmdStreamWriter::new();
    b.load_state(0x10, &[7]);
    draw(&mut b);
    let a = write_stream(&dir, "a.bin", a.as_bytes());
    let b = write_stream(&dir, "b.bin", b.as_bytes());

    cmd()
        .arg(&a)
        .arg(&b)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("State differences:")
                .and(predicate::str::contains("00040: 00000005 -> 00000007")),
        );
}

#[test]
fn corrupt_stream_exits_two_and_names_the_side() {
    let dir = tempfile::tempdir().unwrap();
    let mut a = CmdStreamWriter::new();
    a.nop();
    a.raw_pair(4 << 27, 0);
    let mut b = CmdStreamWriter::new();
    draw(&mut b);
    let a = write_stream(&dir, "bad.bin", a.as_bytes());
    let b = write_stream(&dir, "ok.bin", b.as_bytes());

    cmd()
        .arg(&a)
        .arg(&b)
        .assert()
        .code(2)
        .stderr(
            predicate::str::contains("bad.bin")
                .and(predicate::str::contains("unknown opcode"))
                .and(predicate::str::contains("0x8")),
        );
}
