//! Key material generation and key derivation
//!
//! The store key is never written to disk. It is the SHA-256 digest of the
//! first half of every key-material block, taken in file order, so anyone
//! holding the file can re-derive it while a casual reader sees only
//! random bytes.

use crate::error::Result;
use crate::header::KEY_BLOCK_SIZE;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{Read, Write};

/// Length of the derived key in bytes
pub const KEY_SIZE: usize = 32;

const HALF_BLOCK: usize = KEY_BLOCK_SIZE / 2;

/// Symmetric key derived from a store's key-material region
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

// Keep the key out of debug output
impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// Write `blocks` random key-material blocks and return the key they yield
pub fn generate_key_material<W: Write>(writer: &mut W, blocks: u32) -> Result<DerivedKey> {
    let mut hasher = Sha256::new();
    let mut rng = OsRng;
    let mut block = [0u8; KEY_BLOCK_SIZE];

    for _ in 0..blocks {
        rng.fill_bytes(&mut block);
        hasher.update(&block[..HALF_BLOCK]);
        writer.write_all(&block)?;
    }

    Ok(DerivedKey(hasher.finalize().into()))
}

/// Read `blocks` key-material blocks and re-derive the key
/// Fails with an IO error if the region is shorter than announced
pub fn derive_key<R: Read>(reader: &mut R, blocks: u32) -> Result<DerivedKey> {
    let mut hasher = Sha256::new();
    let mut block = [0u8; KEY_BLOCK_SIZE];

    for _ in 0..blocks {
        reader.read_exact(&mut block)?;
        hasher.update(&block[..HALF_BLOCK]);
    }

    Ok(DerivedKey(hasher.finalize().into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_generate_then_derive() {
        let mut region = Vec::new();
        let key = generate_key_material(&mut region, 8).unwrap();
        assert_eq!(region.len(), 8 * KEY_BLOCK_SIZE);

        let derived = derive_key(&mut Cursor::new(&region), 8).unwrap();
        assert_eq!(key, derived);
        assert_eq!(key.to_hex().len(), KEY_SIZE * 2);
    }

    #[test]
    fn test_random_half_does_not_affect_key() {
        let mut region = Vec::new();
        let key = generate_key_material(&mut region, 4).unwrap();
        for block in region.chunks_mut(KEY_BLOCK_SIZE) {
            block[HALF_BLOCK..].fill(0xAA);
        }
        assert_eq!(key, derive_key(&mut Cursor::new(&region), 4).unwrap());
    }

    #[test]
    fn test_digest_half_changes_key() {
        let mut region = Vec::new();
        let key = generate_key_material(&mut region, 4).unwrap();
        region[0] ^= 0x01;
        assert_ne!(key, derive_key(&mut Cursor::new(&region), 4).unwrap());
    }

    #[test]
    fn test_short_region_fails() {
        let mut region = Vec::new();
        generate_key_material(&mut region, 2).unwrap();
        assert!(derive_key(&mut Cursor::new(&region), 3).is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let key = DerivedKey::from_bytes([7u8; KEY_SIZE]);
        assert_eq!(format!("{:?}", key), "DerivedKey(..)");
    }
}
