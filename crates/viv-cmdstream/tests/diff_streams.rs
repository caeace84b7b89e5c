//! End-to-end comparison runs over synthetic command streams.

use viv_cmdstream::{
    registers, CmdStreamWriter, DecodeError, DiffSession, DiffSummary, SessionError, STATE_WORDS,
};

fn run_session(left: &[u8], right: &[u8]) -> (DiffSummary, String) {
    let mut session = DiffSession::new("a.bin", left, "b.bin", right);
    let mut report = Vec::new();
    let summary = session.run(&mut report).expect("session should succeed");
    (summary, String::from_utf8(report).expect("report is ASCII"))
}

fn draw(w: &mut CmdStreamWriter) {
    w.draw_indexed_primitives(0, [0x20, 60, 0, 0, 0]);
}

#[test]
fn identical_streams_report_nothing() {
    let mut w = CmdStreamWriter::new();
    w.load_state(0x10, &[5]);
    draw(&mut w);
    w.load_state(0x11, &[6]);
    draw(&mut w);
    let bytes = w.finish();

    let (summary, report) = run_session(&bytes, &bytes);
    assert_eq!(
        summary,
        DiffSummary {
            draws_compared: 2,
            ..DiffSummary::default()
        }
    );
    assert!(report.is_empty(), "unexpected report:\n{report}");
}

#[test]
fn register_difference_is_reported_once_then_resynced() {
    let mut a = CmdStreamWriter::new();
    a.load_state(0x10, &[5]);
    draw(&mut a);
    draw(&mut a);

    let mut b = CmdStreamWriter::new();
    b.load_state(0x10, &[7]);
    draw(&mut b);
    draw(&mut b);

    let (summary, report) = run_session(a.as_bytes(), b.as_bytes());
    assert_eq!(summary.draws_compared, 2);
    assert_eq!(summary.draws_with_state_diffs, 1);
    assert_eq!(summary.register_mismatches, 1);
    assert_eq!(report.matches("00040: 00000005 -> 00000007").count(), 1);
}

#[test]
fn state_diff_block_names_both_streams_with_ranges() {
    let mut a = CmdStreamWriter::new();
    a.load_state(0x10, &[5]);
    draw(&mut a);

    let mut b = CmdStreamWriter::new();
    b.load_state(0x10, &[7]);
    draw(&mut b);

    let (_, report) = run_session(a.as_bytes(), b.as_bytes());
    assert_eq!(
        report,
        "State differences:\n\
         \x20  a.bin offset 0x0 - 0x20\n\
         \x20  b.bin offset 0x0 - 0x20\n\
         00040: 00000005 -> 00000007\n"
    );
}

#[test]
fn volatile_addresses_and_counters_are_masked() {
    let mut a = CmdStreamWriter::new();
    let mut b = CmdStreamWriter::new();
    for (i, addr) in registers::VOLATILE_ADDRESSES.into_iter().enumerate() {
        a.load_state(addr >> 2, &[0x8000_0000 + i as u32]);
        b.load_state(addr >> 2, &[0x9000_0000 + i as u32]);
    }
    let counter = registers::COUNTER_REGION_BASE >> 2;
    a.load_state(counter, &[1, 2, 3, 4]);
    b.load_state(counter, &[5, 6, 7, 8]);
    draw(&mut a);
    draw(&mut b);

    let (summary, report) = run_session(a.as_bytes(), b.as_bytes());
    assert_eq!(summary.draws_compared, 1);
    assert_eq!(summary.register_mismatches, 0);
    assert!(report.is_empty(), "unexpected report:\n{report}");
}

#[test]
fn shorter_stream_ends_the_run_cleanly() {
    let mut long = CmdStreamWriter::new();
    draw(&mut long);
    draw(&mut long);
    let mut short = CmdStreamWriter::new();
    draw(&mut short);

    let (summary, _) = run_session(long.as_bytes(), short.as_bytes());
    assert_eq!(summary.draws_compared, 1);

    let (summary, _) = run_session(short.as_bytes(), long.as_bytes());
    assert_eq!(summary.draws_compared, 1);
}

#[test]
fn empty_streams_compare_zero_draws() {
    let mut only_loads = CmdStreamWriter::new();
    only_loads.load_state(0x10, &[5]);

    let (summary, report) = run_session(&[], &[]);
    assert_eq!(summary.draws_compared, 0);
    assert!(report.is_empty());

    let (summary, _) = run_session(&[], only_loads.as_bytes());
    assert_eq!(summary.draws_compared, 0);
}

#[test]
fn stream_reset_diffs_the_whole_register_file() {
    let mut a = CmdStreamWriter::new();
    a.load_state(0x10, &[5]);
    draw(&mut a);
    a.end();
    draw(&mut a);

    let mut b = CmdStreamWriter::new();
    b.load_state(0x10, &[5]);
    draw(&mut b);
    draw(&mut b);

    let (summary, _) = run_session(a.as_bytes(), b.as_bytes());
    assert_eq!(summary.draws_compared, 2);
    assert_eq!(summary.draws_with_state_diffs, 1);
    // Everything except the masked slots differs: eight volatile addresses,
    // two of which sit inside the 17-word counter block.
    assert_eq!(summary.register_mismatches, (STATE_WORDS - 23) as u64);
    assert_eq!(summary.draw_op_mismatches, 0);
}

#[test]
fn vertex_element_reset_shows_up_as_state_diff() {
    let base = registers::VIVS_FE_VERTEX_ELEMENT_CONFIG0 >> 2;
    let full: Vec<u32> = (1..=16).collect();

    let mut a = CmdStreamWriter::new();
    a.load_state(base, &full);
    draw(&mut a);

    let mut b = CmdStreamWriter::new();
    b.load_state(base, &full);
    b.load_state(base, &[1]);
    draw(&mut b);

    let (summary, report) = run_session(a.as_bytes(), b.as_bytes());
    assert_eq!(summary.register_mismatches, 15);
    assert!(report.contains("00604: 00000002 -> 00000000"));
    assert!(report.contains("0063c: 00000010 -> 00000000"));
}

#[test]
fn draw_op_mismatch_prints_offset_ranges() {
    let mut a = CmdStreamWriter::new();
    a.draw_primitives(4, [32, 3, 0]);
    let mut b = CmdStreamWriter::new();
    b.draw_primitives(4, [32, 4, 0]);

    let (summary, report) = run_session(a.as_bytes(), b.as_bytes());
    assert_eq!(summary.draws_with_state_diffs, 0);
    assert_eq!(summary.draw_op_mismatches, 1);
    assert_eq!(
        report,
        "Draw op differs:\n\
         \x20  a.bin offset 0x0 - 0x10\n\
         \x20  b.bin offset 0x0 - 0x10\n"
    );
}

#[test]
fn decode_error_names_the_failing_side() {
    let mut a = CmdStreamWriter::new();
    a.nop();
    a.raw_pair(4 << 27, 0);
    let mut b = CmdStreamWriter::new();
    draw(&mut b);

    let mut session = DiffSession::new("a.bin", a.as_bytes(), "b.bin", b.as_bytes());
    let err = session.run(&mut Vec::new()).unwrap_err();
    match err {
        SessionError::Decode { stream, source } => {
            assert_eq!(stream, "a.bin");
            assert!(matches!(
                source,
                DecodeError::UnknownOpcode { offset: 8, .. }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn zero_count_load_matches_an_explicit_single_load() {
    let mut a = CmdStreamWriter::new();
    a.raw_pair(1 << 27 | 0x20, 0xabc);
    draw(&mut a);

    let mut b = CmdStreamWriter::new();
    b.load_state(0x20, &[0xabc]);
    draw(&mut b);

    let (summary, report) = run_session(a.as_bytes(), b.as_bytes());
    assert_eq!(summary.register_mismatches, 0);
    assert!(report.is_empty(), "unexpected report:\n{report}");
}
