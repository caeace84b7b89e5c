//! Lockstep comparison of two command streams.

use std::io::{self, Read, Write};

use thiserror::Error;

use crate::decode::{CmdStreamDecoder, DecodeError};
use crate::diff::{self, DrawSpan};
use crate::state::{DrawOp, RegisterState};

/// Totals accumulated over one comparison run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiffSummary {
    /// Draw boundaries reached on both sides and compared.
    pub draws_compared: u64,
    /// Draws whose normalized register files differed in at least one word.
    pub draws_with_state_diffs: u64,
    /// Individual register mismatches over the whole run.
    pub register_mismatches: u64,
    /// Draws whose draw operation words differed.
    pub draw_op_mismatches: u64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("decoding {stream}")]
    Decode {
        /// Display name of the failing stream.
        stream: String,
        #[source]
        source: DecodeError,
    },

    #[error("writing report")]
    Report(#[from] io::Error),
}

struct StreamSide<R> {
    name: String,
    decoder: CmdStreamDecoder<R>,
    state: RegisterState,
}

impl<R: Read> StreamSide<R> {
    fn next_draw(&mut self) -> Result<Option<DrawOp>, SessionError> {
        self.decoder
            .next_draw(&mut self.state)
            .map_err(|source| SessionError::Decode {
                stream: self.name.clone(),
                source,
            })
    }
}

/// Drives two decoders one draw at a time, normalizes the reconstructed
/// register files, and writes a report block for every draw that differs.
///
/// A clean end of either stream ends the run: a shorter capture of the same
/// workload just stops the comparison early, it is not an error.
pub struct DiffSession<L, R> {
    left: StreamSide<L>,
    right: StreamSide<R>,
}

impl<L: Read, R: Read> DiffSession<L, R> {
    pub fn new(
        left_name: impl Into<String>,
        left: L,
        right_name: impl Into<String>,
        right: R,
    ) -> Self {
        Self {
            left: StreamSide {
                name: left_name.into(),
                decoder: CmdStreamDecoder::new(left),
                state: RegisterState::new(),
            },
            right: StreamSide {
                name: right_name.into(),
                decoder: CmdStreamDecoder::new(right),
                state: RegisterState::new(),
            },
        }
    }

    /// Runs the comparison to the end of the shorter stream, writing report
    /// blocks to `report` as draws are compared.
    pub fn run<W: Write>(&mut self, report: &mut W) -> Result<DiffSummary, SessionError> {
        let mut summary = DiffSummary::default();

        loop {
            let left_start = self.left.decoder.offset();
            let Some(left_draw) = self.left.next_draw()? else {
                break;
            };
            let left_end = self.left.decoder.offset();

            let right_start = self.right.decoder.offset();
            let Some(right_draw) = self.right.next_draw()? else {
                break;
            };
            let right_end = self.right.decoder.offset();

            diff::normalize_states(&mut self.left.state, &mut self.right.state);
            let mismatches = diff::diff_registers(&mut self.left.state, &self.right.state);

            let left_span = DrawSpan {
                name: &self.left.name,
                start: left_start,
                end: left_end,
            };
            let right_span = DrawSpan {
                name: &self.right.name,
                start: right_start,
                end: right_end,
            };

            if !mismatches.is_empty() {
                diff::write_state_diff_block(report, &left_span, &right_span, &mismatches)?;
                summary.draws_with_state_diffs += 1;
                summary.register_mismatches += mismatches.len() as u64;
            }
            if left_draw != right_draw {
                diff::write_draw_op_block(report, &left_span, &right_span)?;
                summary.draw_op_mismatches += 1;
            }

            summary.draws_compared += 1;
            tracing::debug!(
                draw = summary.draws_compared,
                left_offset = left_start,
                right_offset = right_start,
                mismatches = mismatches.len(),
                "draw compared"
            );
        }

        Ok(summary)
    }
}
