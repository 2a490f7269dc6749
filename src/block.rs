use crate::error::{Result, SealboxError};
use rand::{rngs::OsRng, RngCore};

/// Granularity of every payload region
pub const BLOCK_SIZE: usize = 512;

/// Size of the encrypted header block in front of each payload
pub const ENTRY_HEADER_SIZE: usize = 512;

/// Round a payload length up to the next multiple of [`BLOCK_SIZE`]
pub fn round_up_to_block(len: u64) -> u64 {
    let block = BLOCK_SIZE as u64;
    len.div_ceil(block) * block
}

/// Fresh random bytes, used for padding and placeholders
pub fn random_padding(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// Place an encoded descriptor at the start of a header block
/// The remainder of the block is random so the block never reveals the name length
pub fn frame_header_block(encoded: &[u8]) -> Result<[u8; ENTRY_HEADER_SIZE]> {
    if encoded.len() > ENTRY_HEADER_SIZE {
        return Err(SealboxError::InvalidFormat(format!(
            "Encoded entry is {} bytes, header block holds {}",
            encoded.len(),
            ENTRY_HEADER_SIZE
        )));
    }
    let mut block = [0u8; ENTRY_HEADER_SIZE];
    OsRng.fill_bytes(&mut block[encoded.len()..]);
    block[..encoded.len()].copy_from_slice(encoded);
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_up_to_block() {
        assert_eq!(round_up_to_block(0), 0);
        assert_eq!(round_up_to_block(1), 512);
        assert_eq!(round_up_to_block(511), 512);
        assert_eq!(round_up_to_block(512), 512);
        assert_eq!(round_up_to_block(513), 1024);
        assert_eq!(round_up_to_block(600), 1024);
    }

    #[test]
    fn test_round_up_is_monotonic() {
        let mut previous = 0;
        for len in 0..4096u64 {
            let rounded = round_up_to_block(len);
            assert!(rounded >= len);
            assert!(rounded >= previous);
            assert_eq!(rounded % BLOCK_SIZE as u64, 0);
            previous = rounded;
        }
    }

    #[test]
    fn test_frame_header_block() {
        let encoded = b"descriptor bytes";
        let block = frame_header_block(encoded).unwrap();
        assert_eq!(block.len(), ENTRY_HEADER_SIZE);
        assert_eq!(&block[..encoded.len()], encoded);
    }

    #[test]
    fn test_frame_rejects_oversized() {
        let encoded = vec![0u8; ENTRY_HEADER_SIZE + 1];
        assert!(frame_header_block(&encoded).is_err());
    }

    #[test]
    fn test_random_padding() {
        let pad = random_padding(1000);
        assert_eq!(pad.len(), 1000);
        assert!(pad.iter().any(|&b| b != 0));
        assert!(random_padding(0).is_empty());
    }
}
