//! Byte addresses of the Vivante registers the decoder and the diff logic
//! interpret specially.
//!
//! Only a handful of registers need names; everything else in the register
//! file is compared as opaque words.

/// Word index of a register in the tracked register file.
pub const fn word_index(byte_addr: u32) -> usize {
    (byte_addr >> 2) as usize
}

/// HI idle status, one bit per execution unit.
pub const VIVS_HI_IDLE_STATE: u32 = 0x0004;

/// First FE vertex element configuration register.
pub const VIVS_FE_VERTEX_ELEMENT_CONFIG0: u32 = 0x0600;

/// Length of the vertex element configuration block in words.  A load that
/// starts at [`VIVS_FE_VERTEX_ELEMENT_CONFIG0`] invalidates the whole block.
pub const VERTEX_ELEMENT_CONFIG_WORDS: usize = 16;

pub const VIVS_FE_INDEX_STREAM_BASE_ADDR: u32 = 0x0644;
pub const VIVS_FE_INDEX_STREAM_CONTROL: u32 = 0x0648;
pub const VIVS_FE_VERTEX_STREAM_BASE_ADDR: u32 = 0x064c;

/// FE DMA state machine debug register.
pub const VIVS_FE_DMA_DEBUG_STATE: u32 = 0x0660;

/// Address the FE command DMA engine last fetched from.
pub const VIVS_FE_DMA_ADDRESS: u32 = 0x0664;

pub const VIVS_FE_DMA_LOW: u32 = 0x0668;
pub const VIVS_FE_DMA_HIGH: u32 = 0x066c;

/// Registers that legitimately differ between two captures of the same
/// workload: they hold GPU buffer addresses picked by the allocator at run
/// time, not pipeline configuration.
pub const VOLATILE_ADDRESSES: [u32; 8] = [
    VIVS_FE_INDEX_STREAM_BASE_ADDR,
    VIVS_FE_VERTEX_STREAM_BASE_ADDR,
    0x1410, // PE depth target address
    0x1430, // PE color target address
    0x1460, // per-pipe color address
    0x1480, // per-pipe depth address
    0x1608, // RS source address
    0x1610, // RS destination address
];

/// Start of the RS counter block.  The counters churn with every blit, so the
/// whole block is zeroed on both sides before a comparison.
pub const COUNTER_REGION_BASE: u32 = 0x1600;

/// Length of the RS counter block in bytes.
pub const COUNTER_REGION_BYTES: usize = 0x44;
