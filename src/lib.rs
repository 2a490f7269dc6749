//! Sealbox - encrypted single-file blob store
//!
//! Named binary blobs live inside one file. Every entry header and payload
//! is RC4-encrypted with a key that is never stored: it is re-derived on
//! open from a region of random key material at the front of the file.
//!
//! ## File Layout
//!
//! ```text
//! Header (12) → Key material (N × 1024) → [Entry header (512) → Payload (k × 512)]*
//! ```
//!
//! - **Header**: magic, format version, key block count (plaintext)
//! - **Key material**: random blocks, the first half of each feeds SHA-256
//! - **Entry header**: encrypted descriptor (name, length, modification time)
//! - **Payload**: encrypted data plus random padding to the block unit
//!
//! Entries are packed with no gaps. See [`store`] for how writes and deletes
//! keep them that way, and [`cipher`] for the limits of the encryption.
//!
//! ## Example
//!
//! ```no_run
//! use sealbox::{Store, StoreOptions};
//!
//! let store = Store::open("store.sbx", StoreOptions::default()).unwrap();
//! store.write("greeting", b"hello").unwrap();
//! assert_eq!(store.read("greeting").unwrap().unwrap(), b"hello");
//! store.delete("greeting").unwrap();
//! ```

pub mod block;
pub mod cipher;
pub mod cli;
pub mod entry;
pub mod error;
pub mod header;
pub mod keys;
pub mod store;
pub mod sync;

pub use entry::EntryDescriptor;
pub use error::{Result, SealboxError};
pub use header::{StoreHeader, StoreOptions};
pub use store::{Store, StoreStats};
pub use sync::{sync_from_resource, HttpFetcher, Resource, ResourceFetcher, SyncOutcome};
