//! Cipher bridge between the store and the RC4 keystream
//!
//! Every call starts a fresh keystream from the store key. Header blocks and
//! payloads are therefore each encrypted from keystream offset zero, which is
//! what makes a single header block decryptable without knowing anything
//! about the bytes in front of it.
//!
//! ## Security Warning
//!
//! Restarting the keystream means every region is XORed with the same key
//! stream prefix. Two regions encrypted under one store key leak the XOR of
//! their plaintexts. The store resists casual inspection, not cryptanalysis.

use crate::error::{Result, SealboxError};
use crate::keys::DerivedKey;
use cipher::consts::U32;
use rc4::{KeyInit, Rc4, StreamCipher};
use std::io::{self, Read, Write};

/// Direction of a transform
/// RC4 is symmetric, the mode documents intent at call sites
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Encrypt,
    Decrypt,
}

type Keystream = Rc4<U32>;

/// Keyed, stateless, length-preserving transform
#[derive(Debug, Clone)]
pub struct CipherBridge {
    key: DerivedKey,
}

impl CipherBridge {
    pub fn new(key: DerivedKey) -> Self {
        Self { key }
    }

    pub fn key(&self) -> &DerivedKey {
        &self.key
    }

    fn keystream(&self) -> Result<Keystream> {
        Keystream::new_from_slice(self.key.as_bytes())
            .map_err(|_| SealboxError::Crypto("Failed to initialize RC4 keystream".into()))
    }

    /// Transform `data` in place with a fresh keystream
    pub fn apply(&self, _mode: Mode, data: &mut [u8]) -> Result<()> {
        let mut keystream = self.keystream()?;
        keystream.apply_keystream(data);
        Ok(())
    }

    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = data.to_vec();
        self.apply(Mode::Encrypt, &mut out)?;
        Ok(out)
    }

    /// Wrap a reader or writer so every byte passing through is transformed
    pub fn wrap<S>(&self, inner: S, _mode: Mode) -> Result<CipherStream<S>> {
        Ok(CipherStream {
            inner,
            keystream: self.keystream()?,
            scratch: Vec::new(),
            processed: 0,
        })
    }
}

/// Stream adapter produced by [`CipherBridge::wrap`]
pub struct CipherStream<S> {
    inner: S,
    keystream: Keystream,
    scratch: Vec<u8>,
    processed: u64,
}

impl<S> CipherStream<S> {
    /// Number of bytes transformed so far
    pub fn processed(&self) -> u64 {
        self.processed
    }
}

impl<R: Read> Read for CipherStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.keystream.apply_keystream(&mut buf[..n]);
        self.processed += n as u64;
        Ok(n)
    }
}

impl<W: Write> Write for CipherStream<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // The keystream has advanced once bytes are transformed, so they must all land
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.keystream.apply_keystream(&mut self.scratch);
        self.inner.write_all(&self.scratch)?;
        self.processed += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KEY_SIZE;
    use std::io::Cursor;

    fn bridge(fill: u8) -> CipherBridge {
        CipherBridge::new(DerivedKey::from_bytes([fill; KEY_SIZE]))
    }

    #[test]
    fn test_roundtrip() {
        let cipher = bridge(0x42);
        let plaintext = b"Hello, sealed world!";
        let ciphertext = cipher.encrypt(plaintext).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len());
        assert_ne!(&ciphertext[..], &plaintext[..]);

        let mut roundtrip = ciphertext.clone();
        cipher.apply(Mode::Decrypt, &mut roundtrip).unwrap();
        assert_eq!(roundtrip, plaintext);
    }

    #[test]
    fn test_each_call_restarts_keystream() {
        let cipher = bridge(0x01);
        let a = cipher.encrypt(b"same bytes").unwrap();
        let b = cipher.encrypt(b"same bytes").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_keys() {
        let a = bridge(0x01).encrypt(b"payload").unwrap();
        let b = bridge(0x02).encrypt(b"payload").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_data() {
        assert!(bridge(0x09).encrypt(b"").unwrap().is_empty());
    }

    #[test]
    fn test_stream_writer_matches_slice() {
        let cipher = bridge(0x33);
        let data: Vec<u8> = (0..5000).map(|i| (i % 251) as u8).collect();

        let mut streamed = Vec::new();
        let mut stream = cipher.wrap(&mut streamed, Mode::Encrypt).unwrap();
        for chunk in data.chunks(333) {
            stream.write_all(chunk).unwrap();
        }
        assert_eq!(stream.processed(), data.len() as u64);
        drop(stream);

        assert_eq!(streamed, cipher.encrypt(&data).unwrap());
    }

    #[test]
    fn test_stream_reader_decrypts() {
        let cipher = bridge(0x77);
        let data = b"streamed through a reader".to_vec();
        let encrypted = cipher.encrypt(&data).unwrap();

        let mut reader = cipher.wrap(Cursor::new(encrypted), Mode::Decrypt).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
        assert_eq!(reader.processed(), data.len() as u64);
    }
}
