use crate::block::{round_up_to_block, ENTRY_HEADER_SIZE};
use crate::error::{Result, SealboxError};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Fixed part of an encoded descriptor: name_len(2) + length(8) + modified(8)
pub const ENTRY_FIXED_SIZE: usize = 18;

/// Longest name whose encoding still fits in one header block
pub const MAX_NAME_LEN: usize = ENTRY_HEADER_SIZE - ENTRY_FIXED_SIZE;

/// Metadata record for one stored blob
///
/// Encoded layout (big-endian, before encryption):
/// [name_len: 2][name: name_len][length: 8][modified_ms: 8]
/// `position` is derived from where the header block sits and is never encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDescriptor {
    pub name: String,
    /// Payload size in bytes
    pub length: u64,
    /// Absolute offset of this entry's header block
    pub position: u64,
    /// Last external sync, `None` if the entry was never synced
    pub modified: Option<DateTime<Utc>>,
}

impl EntryDescriptor {
    pub fn new(name: impl Into<String>, length: u64, position: u64) -> Self {
        Self {
            name: name.into(),
            length,
            position,
            modified: None,
        }
    }

    /// Bytes reserved for the payload region
    pub fn payload_region_len(&self) -> u64 {
        round_up_to_block(self.length)
    }

    /// Header block plus payload region
    pub fn region_len(&self) -> u64 {
        ENTRY_HEADER_SIZE as u64 + self.payload_region_len()
    }

    pub fn payload_offset(&self) -> u64 {
        self.position + ENTRY_HEADER_SIZE as u64
    }

    /// First byte after this entry's region
    pub fn end(&self) -> u64 {
        self.position + self.region_len()
    }

    /// Modification time as milliseconds since the epoch, 0 when unset
    pub fn modified_millis(&self) -> i64 {
        self.modified.map(|t| t.timestamp_millis()).unwrap_or(0)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        validate_name(&self.name)?;
        let name = self.name.as_bytes();
        let mut buf = Vec::with_capacity(ENTRY_FIXED_SIZE + name.len());
        buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
        buf.extend_from_slice(name);
        buf.extend_from_slice(&self.length.to_be_bytes());
        buf.extend_from_slice(&self.modified_millis().to_be_bytes());
        Ok(buf)
    }

    /// Parse a decrypted header block, `position` is supplied by the caller
    pub fn from_bytes(data: &[u8], position: u64) -> Result<Self> {
        if data.len() < ENTRY_FIXED_SIZE {
            return Err(SealboxError::InvalidFormat("Entry header too short".into()));
        }
        let name_len = u16::from_be_bytes([data[0], data[1]]) as usize;
        if name_len == 0 || name_len > MAX_NAME_LEN {
            return Err(SealboxError::InvalidFormat(format!(
                "Entry name length {} out of range",
                name_len
            )));
        }
        let fixed_end = 2 + name_len + 16;
        if data.len() < fixed_end {
            return Err(SealboxError::InvalidFormat("Entry header truncated".into()));
        }

        let name = std::str::from_utf8(&data[2..2 + name_len])
            .map_err(|_| SealboxError::InvalidFormat("Entry name is not UTF-8".into()))?
            .to_string();

        let mut word = [0u8; 8];
        word.copy_from_slice(&data[2 + name_len..2 + name_len + 8]);
        let length = u64::from_be_bytes(word);
        word.copy_from_slice(&data[2 + name_len + 8..fixed_end]);
        let modified_ms = i64::from_be_bytes(word);

        let modified = match modified_ms {
            0 => None,
            ms => Some(Utc.timestamp_millis_opt(ms).single().ok_or_else(|| {
                SealboxError::InvalidFormat(format!("Invalid modification time {}", ms))
            })?),
        };

        Ok(Self {
            name,
            length,
            position,
            modified,
        })
    }
}

/// Check that a name can be stored
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SealboxError::InvalidName("name must not be empty".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(SealboxError::NameTooLong {
            len: name.len(),
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::frame_header_block;

    #[test]
    fn test_descriptor_roundtrip_through_header_block() {
        let mut entry = EntryDescriptor::new("keys/primary", 1234, 9000);
        entry.modified = Some(Utc.timestamp_millis_opt(1_700_000_000_123).unwrap());

        let block = frame_header_block(&entry.to_bytes().unwrap()).unwrap();
        let restored = EntryDescriptor::from_bytes(&block, 9000).unwrap();
        assert_eq!(entry, restored);
    }

    #[test]
    fn test_unsynced_entry_has_no_modified() {
        let entry = EntryDescriptor::new("cache", 0, 0);
        assert_eq!(entry.modified_millis(), 0);
        let restored = EntryDescriptor::from_bytes(&entry.to_bytes().unwrap(), 0).unwrap();
        assert_eq!(restored.modified, None);
    }

    #[test]
    fn test_region_geometry() {
        let entry = EntryDescriptor::new("x", 600, 10_000);
        assert_eq!(entry.payload_region_len(), 1024);
        assert_eq!(entry.region_len(), 512 + 1024);
        assert_eq!(entry.payload_offset(), 10_512);
        assert_eq!(entry.end(), 10_000 + 1536);

        let empty = EntryDescriptor::new("e", 0, 0);
        assert_eq!(empty.region_len(), ENTRY_HEADER_SIZE as u64);
    }

    #[test]
    fn test_name_limits() {
        assert!(validate_name("").is_err());
        assert!(validate_name(&"n".repeat(MAX_NAME_LEN)).is_ok());
        match validate_name(&"n".repeat(MAX_NAME_LEN + 1)) {
            Err(SealboxError::NameTooLong { len, max }) => {
                assert_eq!(len, MAX_NAME_LEN + 1);
                assert_eq!(max, MAX_NAME_LEN);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let longest = EntryDescriptor::new("n".repeat(MAX_NAME_LEN), 1, 0);
        assert_eq!(longest.to_bytes().unwrap().len(), ENTRY_HEADER_SIZE);
    }

    #[test]
    fn test_garbage_rejected() {
        let mut block = [0u8; ENTRY_HEADER_SIZE];
        assert!(EntryDescriptor::from_bytes(&block, 0).is_err());

        block[0] = 0xFF;
        block[1] = 0xFF;
        assert!(EntryDescriptor::from_bytes(&block, 0).is_err());

        block[0] = 0;
        block[1] = 2;
        block[2] = 0xC3;
        block[3] = 0x28;
        assert!(EntryDescriptor::from_bytes(&block, 0).is_err());
    }
}
