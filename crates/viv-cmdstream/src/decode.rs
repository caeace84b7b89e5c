//! Streaming decoder for captured FE command streams.
//!
//! The stream is a sequence of 8-byte records: two little-endian 32-bit
//! command words, with the opcode tag in bits 27..=31 of the first word.
//! Load-state and draw records pull additional words after the pair, always
//! padded so the stream stays aligned to whole pairs.

use std::io::{self, Read};

use thiserror::Error;

use crate::registers;
use crate::state::{DrawOp, RegisterState, STATE_WORDS};

/// Size of the atomic wire unit: one command word pair.
pub const CMD_PAIR_BYTES: usize = 8;

/// Largest register count a load-state record can encode (10-bit field).
pub const MAX_LOAD_COUNT: usize = 0x3ff;

mod opcode {
    //! Tags carried in bits 27..=31 of the first command word.
    pub const PAD: u32 = 0;
    pub const LOAD_STATE: u32 = 1;
    pub const END: u32 = 2;
    pub const NOP: u32 = 3;
    pub const DRAW_PRIMITIVES: u32 = 5;
    pub const DRAW_INDEXED_PRIMITIVES: u32 = 6;
    pub const STALL: u32 = 9;
}

/// Failure while decoding a command stream.  Offsets are byte positions in
/// the stream, counted from its start.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("read failed at offset {offset:#x}")]
    Io {
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// The stream ended partway through a record.
    #[error("stream truncated inside {what} at offset {offset:#x}")]
    Truncated { what: &'static str, offset: u64 },

    #[error("unknown opcode in command word {word:#010x} at offset {offset:#x}")]
    UnknownOpcode { word: u32, offset: u64 },

    /// A load-state record would write past the end of the register file.
    #[error("load of {count} registers at word address {addr:#x} overruns the register file (offset {offset:#x})")]
    LoadOverrun { addr: u32, count: u32, offset: u64 },
}

/// Forward-only reader that tracks the stream byte offset for diagnostics.
pub struct CountingReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads until `buf` is full or the stream ends, retrying interrupted
    /// reads.  Returns the number of bytes read; anything short of
    /// `buf.len()` means the stream ended first.
    pub fn read_full(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        self.offset += filled as u64;
        Ok(filled)
    }
}

/// Replays a command stream into a [`RegisterState`], stopping at each draw.
///
/// Load-state records write registers, end-of-stream records invalidate the
/// whole file, and padding, nop and stall records are skipped.  Any other tag
/// is fatal: the stream is either corrupt or from a newer command set, and
/// resynchronizing on a guessed record length would quietly misattribute
/// every state write after the bad pair.
pub struct CmdStreamDecoder<R> {
    reader: CountingReader<R>,
    burst: Vec<u8>,
}

impl<R: Read> CmdStreamDecoder<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: CountingReader::new(inner),
            burst: Vec::new(),
        }
    }

    /// Byte offset of the next unread record.
    pub fn offset(&self) -> u64 {
        self.reader.offset()
    }

    /// Advances to the next draw, folding every record on the way into
    /// `state`.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly on a record boundary.
    /// `state` keeps accumulating across calls; draws do not reset it.
    pub fn next_draw(&mut self, state: &mut RegisterState) -> Result<Option<DrawOp>, DecodeError> {
        loop {
            let record_start = self.reader.offset();
            let mut pair = [0u8; CMD_PAIR_BYTES];
            let got = self
                .reader
                .read_full(&mut pair)
                .map_err(|source| DecodeError::Io {
                    offset: record_start,
                    source,
                })?;
            if got == 0 {
                return Ok(None);
            }
            if got != CMD_PAIR_BYTES {
                return Err(DecodeError::Truncated {
                    what: "command word pair",
                    offset: record_start,
                });
            }

            let word0 = u32::from_le_bytes(pair[0..4].try_into().unwrap());
            let word1 = u32::from_le_bytes(pair[4..8].try_into().unwrap());

            match word0 >> 27 {
                opcode::PAD | opcode::NOP | opcode::STALL => {}
                opcode::LOAD_STATE => self.load_state(state, record_start, word0, word1)?,
                opcode::END => {
                    state.mark_all_stale();
                    tracing::debug!(offset = record_start, "end of buffer, register file stale");
                }
                opcode::DRAW_PRIMITIVES => {
                    let operands = self.read_operands::<2>(record_start)?;
                    // The direct draw path leaves the index stream control
                    // register in a don't-care state; pin it so captures that
                    // mix draw kinds still compare equal.
                    state.set_word(
                        registers::word_index(registers::VIVS_FE_INDEX_STREAM_CONTROL),
                        0,
                    );
                    return Ok(Some(DrawOp::direct([word0, word1], operands)));
                }
                opcode::DRAW_INDEXED_PRIMITIVES => {
                    let operands = self.read_operands::<4>(record_start)?;
                    return Ok(Some(DrawOp::indexed([word0, word1], operands)));
                }
                _ => {
                    return Err(DecodeError::UnknownOpcode {
                        word: word0,
                        offset: record_start,
                    });
                }
            }
        }
    }

    /// Applies one load-state record.  `word1` is the first value; `count - 1`
    /// more follow the pair, padded to a whole pair.
    fn load_state(
        &mut self,
        state: &mut RegisterState,
        record_start: u64,
        word0: u32,
        word1: u32,
    ) -> Result<(), DecodeError> {
        // A zero count is a quirk of the blob driver and means one register.
        let count = (((word0 >> 16) & 0x3ff) as usize).max(1);
        let addr = (word0 & 0xffff) as usize;

        if addr + count > STATE_WORDS {
            return Err(DecodeError::LoadOverrun {
                addr: addr as u32,
                count: count as u32,
                offset: record_start,
            });
        }

        // Writing the first vertex element config register resets the whole
        // block in hardware; mirror that before applying the new values.
        if addr == registers::word_index(registers::VIVS_FE_VERTEX_ELEMENT_CONFIG0) {
            state.zero_range(addr, registers::VERTEX_ELEMENT_CONFIG_WORDS);
        }

        state.set_word(addr, word1);

        let tail = count - 1;
        if tail > 0 {
            // Read the padded run in full before applying any of it, so a
            // truncated stream never leaves a half-written burst behind.
            let padded = (tail + 1) & !1;
            self.read_tail_words(record_start, padded)?;
            for i in 0..tail {
                let value = u32::from_le_bytes(self.burst[4 * i..4 * i + 4].try_into().unwrap());
                state.set_word(addr + 1 + i, value);
            }
        }
        Ok(())
    }

    fn read_tail_words(&mut self, record_start: u64, words: usize) -> Result<(), DecodeError> {
        let read_start = self.reader.offset();
        self.burst.clear();
        self.burst.resize(words * 4, 0);
        let got = self
            .reader
            .read_full(&mut self.burst)
            .map_err(|source| DecodeError::Io {
                offset: read_start,
                source,
            })?;
        if got != self.burst.len() {
            return Err(DecodeError::Truncated {
                what: "load state burst",
                offset: record_start,
            });
        }
        Ok(())
    }

    fn read_operands<const N: usize>(&mut self, record_start: u64) -> Result<[u32; N], DecodeError> {
        let read_start = self.reader.offset();
        let mut bytes = [0u8; 16];
        let want = N * 4;
        let got = self
            .reader
            .read_full(&mut bytes[..want])
            .map_err(|source| DecodeError::Io {
                offset: read_start,
                source,
            })?;
        if got != want {
            return Err(DecodeError::Truncated {
                what: "draw operands",
                offset: record_start,
            });
        }
        let mut operands = [0u32; N];
        for (i, word) in operands.iter_mut().enumerate() {
            *word = u32::from_le_bytes(bytes[4 * i..4 * i + 4].try_into().unwrap());
        }
        Ok(operands)
    }
}
