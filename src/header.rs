use crate::error::{Result, SealboxError};
use rand::{rngs::OsRng, Rng};
use std::ops::Range;

/// Magic number at the start of every store file ("SBX\0")
pub const STORE_MAGIC: u32 = 0x5342_5800;

/// Current store format version
pub const FORMAT_VERSION: u32 = 1;

/// Size of the plaintext header: magic(4) + version(4) + key_blocks(4)
pub const STORE_HEADER_SIZE: u64 = 12;

/// Size of one key-material block (digest half + random half)
pub const KEY_BLOCK_SIZE: usize = 1024;

/// Upper bound accepted when parsing a header, rejects garbage counts early
pub const MAX_KEY_BLOCKS: u32 = 1 << 20;

/// Options used when a store file has to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Range the number of key-material blocks is drawn from
    pub key_blocks: Range<u32>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            key_blocks: 2048..3072,
        }
    }
}

impl StoreOptions {
    /// Options with a fixed key block count
    pub fn with_key_blocks(count: u32) -> Self {
        Self {
            key_blocks: count..count.saturating_add(1),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let Range { start, end } = self.key_blocks;
        if start == 0 || start >= end || end > MAX_KEY_BLOCKS + 1 {
            return Err(SealboxError::InvalidKeyBlocks { start, end });
        }
        Ok(())
    }

    /// Draw a block count for a new store
    pub fn pick_key_blocks(&self) -> Result<u32> {
        self.validate()?;
        Ok(OsRng.gen_range(self.key_blocks.clone()))
    }
}

/// Plaintext file header
/// Layout: [magic: 4][version: 4][key_blocks: 4], big-endian
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHeader {
    pub magic: u32,
    pub version: u32,
    pub key_blocks: u32,
}

impl StoreHeader {
    pub fn new(key_blocks: u32) -> Self {
        Self {
            magic: STORE_MAGIC,
            version: FORMAT_VERSION,
            key_blocks,
        }
    }

    pub fn to_bytes(&self) -> [u8; STORE_HEADER_SIZE as usize] {
        let mut buf = [0u8; STORE_HEADER_SIZE as usize];
        buf[0..4].copy_from_slice(&self.magic.to_be_bytes());
        buf[4..8].copy_from_slice(&self.version.to_be_bytes());
        buf[8..12].copy_from_slice(&self.key_blocks.to_be_bytes());
        buf
    }

    /// Parse and validate a header
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < STORE_HEADER_SIZE as usize {
            return Err(SealboxError::InvalidHeader("Header too short".into()));
        }
        let read_u32 = |at: usize| {
            u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
        };
        let header = Self {
            magic: read_u32(0),
            version: read_u32(4),
            key_blocks: read_u32(8),
        };

        if header.magic != STORE_MAGIC {
            return Err(SealboxError::InvalidHeader(format!(
                "Bad magic {:#010x}",
                header.magic
            )));
        }
        if header.version != FORMAT_VERSION {
            return Err(SealboxError::InvalidHeader(format!(
                "Unsupported version {}",
                header.version
            )));
        }
        if header.key_blocks == 0 || header.key_blocks > MAX_KEY_BLOCKS {
            return Err(SealboxError::InvalidHeader(format!(
                "Key block count {} out of range",
                header.key_blocks
            )));
        }
        Ok(header)
    }

    /// Bytes occupied by the key-material region
    pub fn key_material_len(&self) -> u64 {
        self.key_blocks as u64 * KEY_BLOCK_SIZE as u64
    }

    /// Offset of the first entry header block
    pub fn entry_region_start(&self) -> u64 {
        STORE_HEADER_SIZE + self.key_material_len()
    }
}
