//! Builder for command streams in the wire format the decoder accepts.
//!
//! Meant for tests and fixtures: records are emitted with correct operand
//! counts and pair padding, so a stream built here always decodes cleanly
//! unless it is deliberately broken with [`CmdStreamWriter::raw_pair`] or
//! [`CmdStreamWriter::raw_bytes`].

use crate::decode::MAX_LOAD_COUNT;

#[derive(Debug, Default, Clone)]
pub struct CmdStreamWriter {
    buf: Vec<u8>,
}

impl CmdStreamWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_pair(&mut self, word0: u32, word1: u32) {
        self.buf.extend_from_slice(&word0.to_le_bytes());
        self.buf.extend_from_slice(&word1.to_le_bytes());
    }

    /// Zero padding pair, skipped by the decoder.
    pub fn pad(&mut self) {
        self.push_pair(0, 0);
    }

    pub fn nop(&mut self) {
        self.push_pair(3 << 27, 0);
    }

    pub fn stall(&mut self) {
        self.push_pair(9 << 27, 0);
    }

    /// End-of-buffer record: invalidates the whole tracked register file.
    pub fn end(&mut self) {
        self.push_pair(2 << 27, 0);
    }

    /// Load-state record writing `values` at consecutive word indexes
    /// starting at `addr`.  Values after the first are padded to a whole
    /// pair.
    pub fn load_state(&mut self, addr: u32, values: &[u32]) {
        assert!(!values.is_empty(), "a load needs at least one value");
        assert!(values.len() <= MAX_LOAD_COUNT, "count field is 10 bits");
        assert!(addr <= 0xffff, "address field is 16 bits");

        let word0 = 1 << 27 | (values.len() as u32) << 16 | addr;
        self.push_pair(word0, values[0]);

        let mut tail = values[1..].chunks_exact(2);
        for pair in &mut tail {
            self.push_pair(pair[0], pair[1]);
        }
        if let [last] = tail.remainder() {
            self.push_pair(*last, 0);
        }
    }

    /// Direct draw record: `rest` holds the second command word and the two
    /// operand words.
    pub fn draw_primitives(&mut self, command: u32, rest: [u32; 3]) {
        assert!(command < 1 << 27, "command bits overlap the opcode tag");
        self.push_pair(5 << 27 | command, rest[0]);
        self.push_pair(rest[1], rest[2]);
    }

    /// Indexed draw record: `rest` holds the second command word and the four
    /// operand words.
    pub fn draw_indexed_primitives(&mut self, command: u32, rest: [u32; 5]) {
        assert!(command < 1 << 27, "command bits overlap the opcode tag");
        self.push_pair(6 << 27 | command, rest[0]);
        self.push_pair(rest[1], rest[2]);
        self.push_pair(rest[3], rest[4]);
    }

    /// Arbitrary command word pair, for malformed-stream tests.
    pub fn raw_pair(&mut self, word0: u32, word1: u32) {
        self.push_pair(word0, word1);
    }

    /// Arbitrary bytes, for truncation tests.
    pub fn raw_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
