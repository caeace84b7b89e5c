//! Normalization and comparison of two reconstructed register files.

use std::io::{self, Write};

use crate::registers;
use crate::state::{RegisterState, STATE_WORDS};

/// One register whose value differs between the two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMismatch {
    /// Register byte address (word index times four).
    pub addr: u32,
    pub left: u32,
    pub right: u32,
}

/// Cancels the differences two captures of the same workload are expected to
/// have before their register files are compared.
///
/// Buffer addresses in [`registers::VOLATILE_ADDRESSES`] are copied from
/// `right` into `left`, and the RS counter block is zeroed on both sides.
/// Running it twice is the same as running it once.
pub fn normalize_states(left: &mut RegisterState, right: &mut RegisterState) {
    for addr in registers::VOLATILE_ADDRESSES {
        let index = registers::word_index(addr);
        left.set_word(index, right.word(index));
    }

    let base = registers::word_index(registers::COUNTER_REGION_BASE);
    let words = registers::COUNTER_REGION_BYTES / 4;
    left.zero_range(base, words);
    right.zero_range(base, words);
}

/// Compares the two register files word by word, in ascending address order.
///
/// Each mismatching left word is overwritten with the right one, so a
/// register that diverges once and then stays put on both sides is reported
/// at one draw instead of every draw after it.
pub fn diff_registers(left: &mut RegisterState, right: &RegisterState) -> Vec<RegisterMismatch> {
    let mut mismatches = Vec::new();
    let left_words = left.words_mut();
    let right_words = right.words();
    for i in 0..STATE_WORDS {
        if left_words[i] != right_words[i] {
            mismatches.push(RegisterMismatch {
                addr: (i as u32) << 2,
                left: left_words[i],
                right: right_words[i],
            });
            left_words[i] = right_words[i];
        }
    }
    mismatches
}

/// Byte range one draw occupied in its stream, for report headers.
pub(crate) struct DrawSpan<'a> {
    pub name: &'a str,
    pub start: u64,
    pub end: u64,
}

pub(crate) fn write_state_diff_block<W: Write>(
    out: &mut W,
    left: &DrawSpan<'_>,
    right: &DrawSpan<'_>,
    mismatches: &[RegisterMismatch],
) -> io::Result<()> {
    writeln!(out, "State differences:")?;
    writeln!(out, "   {} offset {:#x} - {:#x}", left.name, left.start, left.end)?;
    writeln!(
        out,
        "   {} offset {:#x} - {:#x}",
        right.name, right.start, right.end
    )?;
    for m in mismatches {
        writeln!(out, "{:05x}: {:08x} -> {:08x}", m.addr, m.left, m.right)?;
    }
    Ok(())
}

pub(crate) fn write_draw_op_block<W: Write>(
    out: &mut W,
    left: &DrawSpan<'_>,
    right: &DrawSpan<'_>,
) -> io::Result<()> {
    writeln!(out, "Draw op differs:")?;
    writeln!(out, "   {} offset {:#x} - {:#x}", left.name, left.start, left.end)?;
    writeln!(
        out,
        "   {} offset {:#x} - {:#x}",
        right.name, right.start, right.end
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_copies_volatile_addresses_left() {
        let mut left = RegisterState::new();
        let mut right = RegisterState::new();
        for (i, addr) in registers::VOLATILE_ADDRESSES.iter().enumerate() {
            left.set_word(registers::word_index(*addr), 0x1000 + i as u32);
            right.set_word(registers::word_index(*addr), 0x2000 + i as u32);
        }
        normalize_states(&mut left, &mut right);
        assert!(diff_registers(&mut left, &right).is_empty());
    }

    #[test]
    fn normalize_zeroes_the_counter_block_on_both_sides() {
        let base = registers::word_index(registers::COUNTER_REGION_BASE);
        let words = registers::COUNTER_REGION_BYTES / 4;
        let mut left = RegisterState::new();
        let mut right = RegisterState::new();
        for i in 0..words {
            left.set_word(base + i, 0xdead_0000 + i as u32);
            right.set_word(base + i, 0xbeef_0000 + i as u32);
        }
        normalize_states(&mut left, &mut right);
        for i in 0..words {
            assert_eq!(left.word(base + i), 0);
            assert_eq!(right.word(base + i), 0);
        }
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut left = RegisterState::new();
        let mut right = RegisterState::new();
        left.set_word(0x10, 1);
        right.set_word(registers::word_index(registers::VIVS_FE_INDEX_STREAM_BASE_ADDR), 7);
        normalize_states(&mut left, &mut right);
        let after_one: Vec<u32> = left.words().to_vec();
        let after_one_right: Vec<u32> = right.words().to_vec();
        normalize_states(&mut left, &mut right);
        assert_eq!(left.words(), &after_one[..]);
        assert_eq!(right.words(), &after_one_right[..]);
    }

    #[test]
    fn diff_reports_and_resyncs() {
        let mut left = RegisterState::new();
        let right = {
            let mut r = RegisterState::new();
            r.set_word(0x10, 7);
            r
        };
        left.set_word(0x10, 5);

        let mismatches = diff_registers(&mut left, &right);
        assert_eq!(
            mismatches,
            vec![RegisterMismatch {
                addr: 0x10 << 2,
                left: 5,
                right: 7,
            }]
        );
        // The left side now tracks the right, so the same pair is clean.
        assert!(diff_registers(&mut left, &right).is_empty());
    }

    #[test]
    fn diff_orders_mismatches_by_address() {
        let mut left = RegisterState::new();
        let mut right = RegisterState::new();
        right.set_word(0x300, 1);
        right.set_word(0x2, 1);
        right.set_word(0x40, 1);
        let addrs: Vec<u32> = diff_registers(&mut left, &right)
            .iter()
            .map(|m| m.addr)
            .collect();
        assert_eq!(addrs, vec![0x2 << 2, 0x40 << 2, 0x300 << 2]);
    }
}
