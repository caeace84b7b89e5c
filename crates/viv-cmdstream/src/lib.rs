//! Decoding and comparison of captured Vivante FE command streams.
//!
//! A capture is the byte-for-byte command stream a driver submitted to the
//! GPU front end.  This crate replays such a stream into a register file
//! snapshot per draw ([`CmdStreamDecoder`]), and compares two captures of
//! the same workload draw by draw ([`DiffSession`]), masking the addresses
//! and counters that legitimately differ between runs.
//!
//! [`CmdStreamWriter`] builds streams in the same wire format, mainly for
//! tests.

#![forbid(unsafe_code)]

mod decode;
mod diff;
pub mod registers;
mod session;
mod state;
mod writer;

pub use decode::{CmdStreamDecoder, CountingReader, DecodeError, CMD_PAIR_BYTES, MAX_LOAD_COUNT};
pub use diff::{diff_registers, normalize_states, RegisterMismatch};
pub use session::{DiffSession, DiffSummary, SessionError};
pub use state::{DrawOp, RegisterState, DRAW_OP_WORDS, STALE_WORD, STATE_WORDS};
pub use writer::CmdStreamWriter;
