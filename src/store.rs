//! The store container
//!
//! # File Structure
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  StoreHeader (12 bytes, plaintext)       │  offset 0
//! ├──────────────────────────────────────────┤
//! │  Key material: N × 1024 byte blocks      │  offset 12
//! │  [digest half 512][random half 512]      │
//! ├──────────────────────────────────────────┤
//! │  Entry header block (512, encrypted)     │  entry region start
//! │  Payload (round_up_to_block(length))     │
//! ├──────────────────────────────────────────┤
//! │  Entry header block ...                  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Entries are packed back to back. Growing an entry relocates it to the end
//! of the file; deleting one shifts everything after it left and re-derives
//! the positions of the entries that moved.
//!
//! # Locking
//!
//! File access and every mutation run under one coarse mutex. The entry
//! table has its own read/write lock so [`Store::get`] and [`Store::list`]
//! answer while a large payload is being read or written. The file lock is
//! always taken before the table lock.
//!
//! # Data loss on open
//!
//! A file that cannot be parsed (foreign format, bad magic or version,
//! truncated or corrupt entries) is treated as absent and silently replaced
//! by an empty store. Only a `warn` log line records that it happened.

use crate::block::{frame_header_block, random_padding, round_up_to_block, ENTRY_HEADER_SIZE};
use crate::cipher::{CipherBridge, Mode};
use crate::entry::{validate_name, EntryDescriptor};
use crate::error::{Result, SealboxError};
use crate::header::{StoreHeader, StoreOptions, STORE_HEADER_SIZE};
use crate::keys::{derive_key, generate_key_material};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// Chunk size used when shifting the file tail during compaction
const SHIFT_CHUNK: usize = 64 * 1024;

/// Open file plus everything needed to interpret it
struct StoreIo {
    file: File,
    header: StoreHeader,
    cipher: CipherBridge,
}

impl StoreIo {
    /// Create (or truncate) the file and write fresh key material
    fn create(path: &Path, options: &StoreOptions) -> Result<Self> {
        let key_blocks = options.pick_key_blocks()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let header = StoreHeader::new(key_blocks);
        let key = {
            let mut writer = BufWriter::new(&mut file);
            writer.write_all(&header.to_bytes())?;
            let key = generate_key_material(&mut writer, key_blocks)?;
            writer.flush()?;
            key
        };

        debug!(
            "Created store {} with {} key blocks",
            path.display(),
            key_blocks
        );

        Ok(Self {
            file,
            header,
            cipher: CipherBridge::new(key),
        })
    }

    /// Parse the header, re-derive the key and scan every entry
    fn load(path: &Path) -> Result<(Self, Vec<EntryDescriptor>)> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let file_len = file.metadata()?.len();

        let mut head = [0u8; STORE_HEADER_SIZE as usize];
        file.read_exact(&mut head)?;
        let header = StoreHeader::from_bytes(&head)?;
        if header.entry_region_start() > file_len {
            return Err(SealboxError::InvalidFormat(format!(
                "Key material needs {} bytes, file has {}",
                header.entry_region_start(),
                file_len
            )));
        }

        let key = {
            let mut reader = BufReader::with_capacity(SHIFT_CHUNK, &mut file);
            derive_key(&mut reader, header.key_blocks)?
        };

        let mut store_io = Self {
            file,
            header,
            cipher: CipherBridge::new(key),
        };
        let entries = store_io.scan(header.entry_region_start())?;
        let entries = store_io.drop_shadowed(entries)?;
        Ok((store_io, entries))
    }

    /// Reclaim the regions of entries whose name reappears later in the file
    /// Only the last copy of a name stays reachable
    fn drop_shadowed(
        &mut self,
        mut entries: Vec<EntryDescriptor>,
    ) -> Result<Vec<EntryDescriptor>> {
        loop {
            let shadowed = {
                let mut last_seen = HashMap::with_capacity(entries.len());
                for (index, entry) in entries.iter().enumerate() {
                    last_seen.insert(entry.name.as_str(), index);
                }
                entries
                    .iter()
                    .enumerate()
                    .find(|(index, entry)| last_seen[entry.name.as_str()] != *index)
                    .map(|(_, entry)| entry.clone())
            };

            let Some(stale) = shadowed else {
                return Ok(entries);
            };
            warn!(
                "Duplicate entry '{}', dropping the earlier copy at {}",
                stale.name, stale.position
            );
            self.close_gap(stale.position, stale.end())?;
            let mut rescanned = entries
                .iter()
                .take_while(|e| e.position < stale.position)
                .cloned()
                .collect::<Vec<_>>();
            rescanned.extend(self.scan(stale.position)?);
            entries = rescanned;
        }
    }

    fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Walk the entry chain from `from` to end-of-file
    /// `from` must be the offset of a header block
    fn scan(&mut self, from: u64) -> Result<Vec<EntryDescriptor>> {
        let end = self.len()?;
        let mut found = Vec::new();
        let mut position = from;
        let mut block = [0u8; ENTRY_HEADER_SIZE];

        while position < end {
            if end - position < ENTRY_HEADER_SIZE as u64 {
                return Err(SealboxError::InvalidFormat(format!(
                    "Truncated entry header at offset {}",
                    position
                )));
            }
            self.file.seek(SeekFrom::Start(position))?;
            self.file.read_exact(&mut block)?;
            self.cipher.apply(Mode::Decrypt, &mut block)?;

            let entry = EntryDescriptor::from_bytes(&block, position)?;
            if entry.length > end - entry.payload_offset() || entry.end() > end {
                return Err(SealboxError::InvalidFormat(format!(
                    "Entry '{}' at offset {} runs past end of file",
                    entry.name, position
                )));
            }

            trace!(
                "Scanned entry '{}' at {} ({} bytes)",
                entry.name,
                position,
                entry.length
            );
            position = entry.end();
            found.push(entry);
        }

        Ok(found)
    }

    /// Encrypt and write the header block for `entry` at its position
    fn write_header(&mut self, entry: &EntryDescriptor) -> Result<()> {
        let mut block = frame_header_block(&entry.to_bytes()?)?;
        self.cipher.apply(Mode::Encrypt, &mut block)?;
        self.file.seek(SeekFrom::Start(entry.position))?;
        self.file.write_all(&block)?;
        Ok(())
    }

    /// Append a new entry at end-of-file from a stream
    fn append<R: Read + ?Sized>(
        &mut self,
        start: u64,
        name: &str,
        reader: &mut R,
        modified: Option<DateTime<Utc>>,
    ) -> Result<EntryDescriptor> {
        self.file.seek(SeekFrom::Start(start))?;
        // Placeholder until the final length is known
        self.file.write_all(&random_padding(ENTRY_HEADER_SIZE))?;

        let length = {
            let mut writer = self
                .cipher
                .wrap(BufWriter::new(&mut self.file), Mode::Encrypt)?;
            io::copy(reader, &mut writer)?;
            writer.flush()?;
            writer.processed()
        };

        let padding = round_up_to_block(length) - length;
        self.file.write_all(&random_padding(padding as usize))?;

        let entry = EntryDescriptor {
            name: name.to_string(),
            length,
            position: start,
            modified,
        };
        self.write_header(&entry)?;
        Ok(entry)
    }

    /// Remove the bytes in `[start, end)` by shifting the tail left
    /// Returns the new file length
    fn close_gap(&mut self, start: u64, end: u64) -> Result<u64> {
        let file_len = self.len()?;
        let end = end.min(file_len);
        if start >= end {
            return Ok(file_len);
        }

        let mut buf = vec![0u8; SHIFT_CHUNK];
        let mut read_at = end;
        let mut write_at = start;
        while read_at < file_len {
            let n = (file_len - read_at).min(SHIFT_CHUNK as u64) as usize;
            self.file.seek(SeekFrom::Start(read_at))?;
            self.file.read_exact(&mut buf[..n])?;
            self.file.seek(SeekFrom::Start(write_at))?;
            self.file.write_all(&buf[..n])?;
            read_at += n as u64;
            write_at += n as u64;
        }

        let new_len = file_len - (end - start);
        self.file.set_len(new_len)?;
        trace!(
            "Closed gap {}..{}, shifted {} bytes",
            start,
            end,
            file_len - end
        );
        Ok(new_len)
    }
}

/// Summary of a store file
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub file_len: u64,
    pub key_blocks: u32,
    pub entry_region_start: u64,
    pub entries: usize,
    pub payload_bytes: u64,
    pub padding_bytes: u64,
}

/// Encrypted single-file blob store
pub struct Store {
    path: PathBuf,
    options: StoreOptions,
    io: Mutex<StoreIo>,
    entries: RwLock<HashMap<String, EntryDescriptor>>,
}

impl Store {
    /// Open the store at `path`, creating it if it is absent or unreadable
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();
        let (store_io, entries) = load_or_create(&path, &options)?;
        Ok(Self {
            path,
            options,
            io: Mutex::new(store_io),
            entries: RwLock::new(entries),
        })
    }

    /// Create a new empty store at `path`, discarding any existing file
    pub fn create(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();
        warn!("Creating new store at {}", path.display());
        let store_io = StoreIo::create(&path, &options)?;
        Ok(Self {
            path,
            options,
            io: Mutex::new(store_io),
            entries: RwLock::new(HashMap::new()),
        })
    }

    /// Re-read the file from scratch and replace the entry table
    /// Falls back to recreation exactly like [`Store::open`]
    pub fn reopen(&self) -> Result<()> {
        let mut store_io = self.io.lock();
        let (fresh, entries) = load_or_create(&self.path, &self.options)?;
        *store_io = fresh;
        *self.entries.write() = entries;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hex encoding of the key derived from this store's key material
    pub fn derived_key_hex(&self) -> String {
        self.io.lock().cipher.key().to_hex()
    }

    pub fn get(&self, name: &str) -> Option<EntryDescriptor> {
        self.entries.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// All entries, in no particular order
    pub fn list(&self) -> Vec<EntryDescriptor> {
        self.entries.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn file_len(&self) -> Result<u64> {
        self.io.lock().len()
    }

    pub fn entry_region_start(&self) -> u64 {
        self.io.lock().header.entry_region_start()
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let store_io = self.io.lock();
        let entries = self.entries.read();
        let payload_bytes = entries.values().map(|e| e.length).sum();
        let padding_bytes = entries
            .values()
            .map(|e| e.payload_region_len() - e.length)
            .sum();
        Ok(StoreStats {
            file_len: store_io.len()?,
            key_blocks: store_io.header.key_blocks,
            entry_region_start: store_io.header.entry_region_start(),
            entries: entries.len(),
            payload_bytes,
            padding_bytes,
        })
    }

    /// Decrypted payload of `name`, or `None` if there is no such entry
    pub fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut store_io = self.io.lock();
        let Some(entry) = self.get(name) else {
            return Ok(None);
        };

        let len = usize::try_from(entry.length).map_err(|_| {
            SealboxError::InvalidFormat(format!("Entry '{}' too large for memory", name))
        })?;
        let mut data = vec![0u8; len];
        store_io.file.seek(SeekFrom::Start(entry.payload_offset()))?;
        store_io.file.read_exact(&mut data)?;
        store_io.cipher.apply(Mode::Decrypt, &mut data)?;
        Ok(Some(data))
    }

    /// Stream the decrypted payload of `name` into `writer`
    /// Returns the number of bytes written, or `None` if there is no such entry
    pub fn read_to<W: Write>(&self, name: &str, writer: W) -> Result<Option<u64>> {
        let mut guard = self.io.lock();
        let Some(entry) = self.get(name) else {
            return Ok(None);
        };

        let store_io = &mut *guard;
        store_io.file.seek(SeekFrom::Start(entry.payload_offset()))?;
        let mut out = store_io.cipher.wrap(writer, Mode::Decrypt)?;
        io::copy(&mut (&mut store_io.file).take(entry.length), &mut out)?;
        out.flush()?;
        let copied = out.processed();

        if copied != entry.length {
            return Err(SealboxError::InvalidFormat(format!(
                "Entry '{}' truncated: expected {} bytes, read {}",
                name, entry.length, copied
            )));
        }
        Ok(Some(copied))
    }

    /// Store `data` under `name`
    ///
    /// Fits in the current region: rewritten in place, position unchanged.
    /// Needs more blocks: the old region is reclaimed and the entry is
    /// appended at end-of-file.
    pub fn write(&self, name: &str, data: &[u8]) -> Result<EntryDescriptor> {
        validate_name(name)?;
        let mut store_io = self.io.lock();
        let new_region = round_up_to_block(data.len() as u64);

        match self.get(name) {
            Some(entry) if new_region <= entry.payload_region_len() => {
                self.write_in_place(&mut store_io, entry, data)
            }
            existing => {
                let mut reader = data;
                self.relocate(&mut store_io, name, existing, &mut reader)
            }
        }
    }

    /// Store the contents of `reader` under `name`, always appending at end-of-file
    pub fn write_stream<R: Read>(&self, name: &str, mut reader: R) -> Result<EntryDescriptor> {
        validate_name(name)?;
        let mut store_io = self.io.lock();
        let existing = self.get(name);
        self.relocate(&mut store_io, name, existing, &mut reader)
    }

    /// Remove `name`, returns whether it existed
    pub fn delete(&self, name: &str) -> Result<bool> {
        let mut store_io = self.io.lock();
        match self.get(name) {
            Some(entry) => {
                self.remove(&mut store_io, &entry)?;
                debug!("Deleted entry '{}'", name);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Record a new modification time for `name`, returns whether it existed
    pub fn set_modified(&self, name: &str, modified: Option<DateTime<Utc>>) -> Result<bool> {
        let mut store_io = self.io.lock();
        let Some(mut entry) = self.get(name) else {
            return Ok(false);
        };
        entry.modified = modified;
        store_io.write_header(&entry)?;
        self.entries.write().insert(entry.name.clone(), entry);
        Ok(true)
    }

    fn write_in_place(
        &self,
        store_io: &mut StoreIo,
        entry: EntryDescriptor,
        data: &[u8],
    ) -> Result<EntryDescriptor> {
        let old_region = entry.payload_region_len();
        let len = data.len() as u64;
        let new_region = round_up_to_block(len);

        let mut payload = store_io.cipher.encrypt(data)?;
        payload.extend_from_slice(&random_padding((new_region - len) as usize));
        store_io.file.seek(SeekFrom::Start(entry.payload_offset()))?;
        store_io.file.write_all(&payload)?;

        let updated = EntryDescriptor {
            length: len,
            ..entry
        };
        store_io.write_header(&updated)?;
        self.entries
            .write()
            .insert(updated.name.clone(), updated.clone());

        if new_region < old_region {
            // Release the surplus blocks so the header matches its region
            let gap_start = updated.end();
            store_io.close_gap(gap_start, gap_start + (old_region - new_region))?;
            self.refresh_positions(store_io, gap_start)?;
        }

        trace!(
            "Rewrote '{}' in place at {} ({} bytes)",
            updated.name,
            updated.position,
            len
        );
        Ok(updated)
    }

    fn relocate<R: Read + ?Sized>(
        &self,
        store_io: &mut StoreIo,
        name: &str,
        existing: Option<EntryDescriptor>,
        reader: &mut R,
    ) -> Result<EntryDescriptor> {
        let modified = existing.as_ref().and_then(|e| e.modified);
        if let Some(entry) = existing {
            debug!(
                "Relocating '{}' from offset {} to end of file",
                entry.name, entry.position
            );
            self.remove(store_io, &entry)?;
        }

        let start = store_io.file.seek(SeekFrom::End(0))?;
        match store_io.append(start, name, reader, modified) {
            Ok(entry) => {
                self.entries
                    .write()
                    .insert(entry.name.clone(), entry.clone());
                Ok(entry)
            }
            Err(e) => {
                // Drop the partial region so the chain stays scannable
                if let Err(truncate_err) = store_io.file.set_len(start) {
                    warn!(
                        "Failed to roll back partial entry '{}' at {}: {}",
                        name, start, truncate_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Drop `entry` from the table and reclaim its region
    fn remove(&self, store_io: &mut StoreIo, entry: &EntryDescriptor) -> Result<()> {
        self.entries.write().remove(&entry.name);
        let new_len = store_io.close_gap(entry.position, entry.end())?;
        if entry.position < new_len {
            self.refresh_positions(store_io, entry.position)?;
        }
        Ok(())
    }

    /// Re-derive the positions of every entry from `from` to end-of-file
    /// Required after a shift: every following entry moved
    fn refresh_positions(&self, store_io: &mut StoreIo, from: u64) -> Result<()> {
        let moved = store_io.scan(from)?;
        let mut entries = self.entries.write();
        for found in moved {
            match entries.get_mut(&found.name) {
                Some(entry) => entry.position = found.position,
                None => {
                    return Err(SealboxError::InvalidFormat(format!(
                        "Entry '{}' found at {} is not in the table",
                        found.name, found.position
                    )))
                }
            }
        }
        Ok(())
    }
}

fn load_or_create(
    path: &Path,
    options: &StoreOptions,
) -> Result<(StoreIo, HashMap<String, EntryDescriptor>)> {
    if path.exists() {
        match StoreIo::load(path) {
            Ok((store_io, scanned)) => {
                let entries: HashMap<_, _> = scanned
                    .into_iter()
                    .map(|entry| (entry.name.clone(), entry))
                    .collect();
                info!(
                    "Opened store {} with {} entries",
                    path.display(),
                    entries.len()
                );
                return Ok((store_io, entries));
            }
            Err(e) if e.is_format() => {
                warn!("Store {} is unreadable ({}), recreating", path.display(), e);
            }
            Err(e) => {
                warn!("Failed to load store {} ({}), recreating", path.display(), e);
            }
        }
    } else {
        warn!("Creating new store at {}", path.display());
    }

    let store_io = StoreIo::create(path, options)?;
    Ok((store_io, HashMap::new()))
}
