use crate::block::BLOCK_SIZE;
use crate::error::Result;
use crate::header::{FORMAT_VERSION, KEY_BLOCK_SIZE};
use crate::store::Store;

/// Display information about a store file
pub fn show_info(store: &Store) -> Result<String> {
    let stats = store.stats()?;

    let mut output = String::new();

    output.push_str("Sealbox Store Information\n");
    output.push_str("=========================\n\n");

    output.push_str(&format!("File: {}\n", store.path().display()));
    output.push_str(&format!("Format version: {}\n", FORMAT_VERSION));
    output.push_str(&format!("File size: {}\n", format_size(stats.file_len)));
    output.push('\n');

    output.push_str("Key Material:\n");
    output.push_str(&format!("  Blocks: {}\n", stats.key_blocks));
    output.push_str(&format!("  Block size: {} bytes\n", KEY_BLOCK_SIZE));
    output.push_str(&format!("  Entry region starts at: {}\n", stats.entry_region_start));
    output.push('\n');

    output.push_str("Entries:\n");
    output.push_str(&format!("  Count: {}\n", stats.entries));
    output.push_str(&format!("  Payload: {}\n", format_size(stats.payload_bytes)));
    output.push_str(&format!("  Padding: {}\n", format_size(stats.padding_bytes)));
    output.push_str(&format!("  Block unit: {} bytes\n", BLOCK_SIZE));

    Ok(output)
}

/// Hex form of the derived store key
pub fn show_key(store: &Store) -> String {
    format!("{}\n", store.derived_key_hex())
}

pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
