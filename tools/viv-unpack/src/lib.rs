//! Parser for etnaviv devcoredump blobs.
//!
//! A dump is a list of 32-byte object headers followed by buffer payloads.
//! The header list is terminated by an end marker; each header names the
//! buffer type, its payload range in the file, and the GPU address it was
//! mapped at when the hang was captured.

#![forbid(unsafe_code)]

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;
use viv_cmdstream::registers;

/// `ETNA` in little-endian.
pub const DUMP_MAGIC: u32 = 0x414e_5445;

/// Base of the GPU MMU window; buffer objects are mapped at or above it.
pub const MMU_BASE: u64 = 0x8000_0000;

const OBJECT_HEADER_BYTES: usize = 32;
const OBJECT_END: u32 = 6;
const PAGE_SHIFT: u32 = 12;

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("not an etnaviv dump (bad magic in object header {index})")]
    BadMagic { index: usize },

    #[error("object header {index} has unknown buffer type {kind}")]
    UnknownKind { index: usize, kind: u32 },

    #[error(
        "object {index} payload out of bounds: offset {offset:#x} size {size:#x} in a {file_len:#x} byte file"
    )]
    PayloadOutOfBounds {
        index: usize,
        offset: u64,
        size: u64,
        file_len: u64,
    },

    #[error("dump ends before the end-of-list marker")]
    MissingEndMarker,

    /// A buffer object's page range does not fit the captured MMU or BO map.
    #[error("mmu or bo map too small for buffer object {index}")]
    MapOutOfBounds { index: usize },
}

/// Buffer types a dump can carry, in their header encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Registers,
    Mmu,
    Ring,
    CmdStream,
    BoMap,
    Bo,
}

impl BufferKind {
    fn from_u32(kind: u32) -> Option<Self> {
        Some(match kind {
            0 => Self::Registers,
            1 => Self::Mmu,
            2 => Self::Ring,
            3 => Self::CmdStream,
            4 => Self::BoMap,
            5 => Self::Bo,
            _ => return None,
        })
    }

    /// Short name used in the buffer table and extraction file names.
    pub fn name(self) -> &'static str {
        match self {
            Self::Registers => "reg",
            Self::Mmu => "mmu",
            Self::Ring => "ring",
            Self::CmdStream => "cmd",
            Self::BoMap => "bomap",
            Self::Bo => "bo",
        }
    }
}

/// One captured buffer: its header fields plus the payload range.
#[derive(Debug, Clone)]
pub struct DumpBuffer {
    pub kind: BufferKind,
    /// GPU address the buffer was mapped at; zero if it was not mapped.
    pub iova: u64,
    pub file_offset: u32,
    pub file_size: u32,
    /// Type-specific words.  For buffer objects, `data[0]` is the page index
    /// into the BO map.
    pub data: [u32; 2],
}

/// One register/value pair from the register dump section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterValue {
    pub reg: u32,
    pub value: u32,
}

/// One page whose MMU entry disagrees with the BO map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmuMismatch {
    /// Index of the buffer object in the dump.
    pub buffer: usize,
    /// Byte offset of the page inside the buffer object.
    pub offset: u32,
    pub mmu_entry: u32,
    pub bomap_entry: u64,
}

/// A parsed devcoredump.
pub struct CoreDump {
    bytes: Vec<u8>,
    buffers: Vec<DumpBuffer>,
}

impl CoreDump {
    /// Parses and validates the object header list.  Every payload must fit
    /// inside the file; the list must be closed by an end marker.
    pub fn parse(bytes: Vec<u8>) -> Result<Self, DumpError> {
        let file_len = bytes.len() as u64;
        let mut buffers = Vec::new();
        let mut off = 0usize;
        loop {
            let index = buffers.len();
            let Some(header) = bytes.get(off..off + OBJECT_HEADER_BYTES) else {
                return Err(DumpError::MissingEndMarker);
            };
            if le32(header, 0) != DUMP_MAGIC {
                return Err(DumpError::BadMagic { index });
            }
            let raw_kind = le32(header, 4);
            if raw_kind == OBJECT_END {
                break;
            }
            let kind = BufferKind::from_u32(raw_kind).ok_or(DumpError::UnknownKind {
                index,
                kind: raw_kind,
            })?;
            let file_offset = le32(header, 8);
            let file_size = le32(header, 12);
            let iova = le64(header, 16);
            let data = [le32(header, 24), le32(header, 28)];

            if file_offset as u64 + file_size as u64 > file_len {
                return Err(DumpError::PayloadOutOfBounds {
                    index,
                    offset: file_offset as u64,
                    size: file_size as u64,
                    file_len,
                });
            }
            buffers.push(DumpBuffer {
                kind,
                iova,
                file_offset,
                file_size,
                data,
            });
            off += OBJECT_HEADER_BYTES;
        }
        tracing::debug!(buffers = buffers.len(), "parsed dump headers");
        Ok(Self { bytes, buffers })
    }

    pub fn buffers(&self) -> &[DumpBuffer] {
        &self.buffers
    }

    /// Payload bytes of one buffer.  The range was validated at parse time.
    pub fn payload(&self, buffer: &DumpBuffer) -> &[u8] {
        let start = buffer.file_offset as usize;
        &self.bytes[start..start + buffer.file_size as usize]
    }

    fn find(&self, kind: BufferKind) -> Option<&DumpBuffer> {
        self.buffers.iter().find(|b| b.kind == kind)
    }

    /// Entries of the register dump section, if one was captured.
    pub fn registers(&self) -> Option<Vec<RegisterValue>> {
        let payload = self.payload(self.find(BufferKind::Registers)?);
        Some(
            payload
                .chunks_exact(8)
                .map(|entry| RegisterValue {
                    reg: le32(entry, 0),
                    value: le32(entry, 4),
                })
                .collect(),
        )
    }

    /// Address the FE command DMA engine was fetching from when the dump was
    /// taken.
    pub fn dma_address(&self) -> Option<u32> {
        self.registers()?
            .iter()
            .find(|r| r.reg == registers::VIVS_FE_DMA_ADDRESS)
            .map(|r| r.value)
    }

    /// Index of the ring or command buffer the FE DMA address points into.
    pub fn active_buffer(&self) -> Option<usize> {
        let dma = self.dma_address()? as u64;
        self.buffers.iter().rposition(|b| {
            matches!(b.kind, BufferKind::Ring | BufferKind::CmdStream)
                && dma >= b.iova
                && dma < b.iova + b.file_size as u64
        })
    }

    /// Writes each payload to `dir`, named after its kind and GPU address.
    /// The register dump stays in the summary; unmapped command and BO
    /// buffers are skipped.
    pub fn extract_to(&self, dir: &Path) -> io::Result<()> {
        for buffer in &self.buffers {
            let name = match buffer.kind {
                BufferKind::Registers => continue,
                BufferKind::Mmu => "mmu.bin".to_string(),
                BufferKind::Ring => "ring.bin".to_string(),
                BufferKind::BoMap => "bomap.bin".to_string(),
                BufferKind::CmdStream | BufferKind::Bo if buffer.iova == 0 => continue,
                BufferKind::CmdStream => format!("cmd-{:08x}.bin", buffer.iova),
                BufferKind::Bo => format!("bo-{:08x}.bin", buffer.iova),
            };
            fs::write(dir.join(name), self.payload(buffer))?;
        }
        Ok(())
    }

    /// Cross-checks the MMU page table against the BO map for every buffer
    /// object mapped inside the GPU MMU window.  `None` when the dump has no
    /// MMU or BO map buffer.
    pub fn check_mmu(&self) -> Result<Option<Vec<MmuMismatch>>, DumpError> {
        let (Some(mmu), Some(bomap)) = (self.find(BufferKind::Mmu), self.find(BufferKind::BoMap))
        else {
            return Ok(None);
        };
        let mmu_entries: Vec<u32> = self
            .payload(mmu)
            .chunks_exact(4)
            .map(|c| le32(c, 0))
            .collect();
        let bomap_entries: Vec<u64> = self
            .payload(bomap)
            .chunks_exact(8)
            .map(|c| le64(c, 0))
            .collect();

        let mut mismatches = Vec::new();
        for (index, buffer) in self.buffers.iter().enumerate() {
            if buffer.kind != BufferKind::Bo || buffer.iova < MMU_BASE {
                continue;
            }
            let num_pages = (buffer.file_size >> PAGE_SHIFT) as usize;
            let mmu_ofs = ((buffer.iova - MMU_BASE) >> PAGE_SHIFT) as usize;
            let bm_ofs = buffer.data[0] as usize;
            if mmu_ofs + num_pages > mmu_entries.len() || bm_ofs + num_pages > bomap_entries.len() {
                return Err(DumpError::MapOutOfBounds { index });
            }
            for page in 0..num_pages {
                let mmu_entry = mmu_entries[mmu_ofs + page];
                let bomap_entry = bomap_entries[bm_ofs + page];
                if mmu_entry as u64 != bomap_entry {
                    mismatches.push(MmuMismatch {
                        buffer: index,
                        offset: (page as u32) << PAGE_SHIFT,
                        mmu_entry,
                        bomap_entry,
                    });
                }
            }
            tracing::debug!(buffer = index, pages = num_pages, "checked buffer object");
        }
        Ok(Some(mismatches))
    }
}

/// Symbolic annotation for the registers the summary understands.
pub fn annotate_register(reg: u32, value: u32) -> Option<String> {
    match reg {
        registers::VIVS_HI_IDLE_STATE => Some(annotate_idle(value)),
        registers::VIVS_FE_DMA_DEBUG_STATE => Some(annotate_dma_state(value)),
        registers::VIVS_FE_DMA_ADDRESS => Some("Command DMA address".to_string()),
        registers::VIVS_FE_DMA_LOW => Some("FE fetched word 0".to_string()),
        registers::VIVS_FE_DMA_HIGH => Some("FE fetched word 1".to_string()),
        _ => None,
    }
}

const IDLE_UNITS: [&str; 12] = [
    "FE", "DE", "PE", "SH", "PA", "SE", "RA", "TX", "VG", "IM", "FP", "TS",
];

fn annotate_idle(value: u32) -> String {
    let mut out = String::from("Idle:");
    for (bit, unit) in IDLE_UNITS.iter().enumerate() {
        let flag = if value & (1 << bit) != 0 { '+' } else { '-' };
        let _ = write!(out, " {unit}{flag}");
    }
    out
}

const CMD_STATES: [&str; 32] = [
    "idle", "dec", "adr0", "load0", "adr1", "load1", "3dadr", "3dcmd", "3dcntl", "3didxcntl",
    "initreqdma", "drawidx", "draw", "2drect0", "2drect1", "2ddata0", "2ddata1", "waitfifo",
    "wait", "link", "end", "stall", "", "", "", "", "", "", "", "", "", "",
];
const CMD_DMA_STATES: [&str; 4] = ["idle", "start", "req", "end"];
const CMD_FETCH_STATES: [&str; 4] = ["idle", "ramvalid", "valid", ""];
const REQ_DMA_STATES: [&str; 4] = ["idle", "waitidx", "cal", ""];
const CAL_STATES: [&str; 4] = ["idle", "ldadr", "idxcalc", ""];

fn annotate_dma_state(value: u32) -> String {
    format!(
        "Cmd: [{} DMA: {} Fetch: {}] Req {} Cal {}",
        CMD_STATES[(value & 31) as usize],
        CMD_DMA_STATES[((value >> 8) & 3) as usize],
        CMD_FETCH_STATES[((value >> 10) & 3) as usize],
        REQ_DMA_STATES[((value >> 12) & 3) as usize],
        CAL_STATES[((value >> 14) & 3) as usize],
    )
}

fn le32(bytes: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap())
}

fn le64(bytes: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(bytes[off..off + 8].try_into().unwrap())
}
