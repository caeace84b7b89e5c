//! Reconstructed GPU state: the register file and the draw operation record.

/// Number of `u32` slots in the tracked register file.
///
/// Load-state addresses are 16-bit word indexes, so 65 536 slots would cover
/// the wire format; four times that leaves the top of the file unmapped and
/// makes an out-of-range write impossible to confuse with a real register.
pub const STATE_WORDS: usize = (u16::MAX as usize + 1) * 4;

/// Fill pattern for registers invalidated by an end-of-stream record.  Every
/// byte is `0xAA`, so a stale slot can never be mistaken for a real zero
/// written by a load.
pub const STALE_WORD: u32 = 0xAAAA_AAAA;

/// Words in a draw operation record: the command word pair plus up to four
/// operand words.
pub const DRAW_OP_WORDS: usize = 6;

/// GPU register file reconstructed by replaying one command stream.
///
/// The file persists across draws; each draw boundary is a snapshot of
/// whatever the stream has loaded so far.
#[derive(Clone)]
pub struct RegisterState {
    words: Box<[u32]>,
}

impl RegisterState {
    /// A register file with every slot zeroed, the hardware reset value.
    pub fn new() -> Self {
        Self {
            words: vec![0u32; STATE_WORDS].into_boxed_slice(),
        }
    }

    /// Value at a register word index.
    pub fn word(&self, index: usize) -> u32 {
        self.words[index]
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub(crate) fn set_word(&mut self, index: usize, value: u32) {
        self.words[index] = value;
    }

    pub(crate) fn zero_range(&mut self, start: usize, len: usize) {
        self.words[start..start + len].fill(0);
    }

    /// Fills every slot with [`STALE_WORD`].
    pub(crate) fn mark_all_stale(&mut self) {
        self.words.fill(STALE_WORD);
    }

    pub(crate) fn words_mut(&mut self) -> &mut [u32] {
        &mut self.words
    }
}

impl Default for RegisterState {
    fn default() -> Self {
        Self::new()
    }
}

/// One draw operation as it appeared on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawOp {
    words: [u32; DRAW_OP_WORDS],
}

impl DrawOp {
    pub(crate) fn direct(pair: [u32; 2], operands: [u32; 2]) -> Self {
        Self {
            words: [pair[0], pair[1], operands[0], operands[1], 0, 0],
        }
    }

    pub(crate) fn indexed(pair: [u32; 2], operands: [u32; 4]) -> Self {
        Self {
            words: [
                pair[0],
                pair[1],
                operands[0],
                operands[1],
                operands[2],
                operands[3],
            ],
        }
    }

    /// The command word pair followed by the operand words.  The direct draw
    /// variant carries two operands; its last two slots are zero.
    pub fn words(&self) -> [u32; DRAW_OP_WORDS] {
        self.words
    }
}
