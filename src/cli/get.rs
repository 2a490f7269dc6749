use crate::cli::is_stdio;
use crate::error::Result;
use crate::store::Store;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Write the payload of `name` to `output`
/// Returns the number of bytes written, or `None` if there is no such entry
/// (no output file is created in that case)
pub fn get_entry(store: &Store, name: &str, output: &Path) -> Result<Option<u64>> {
    if !store.contains(name) {
        return Ok(None);
    }

    if is_stdio(output) {
        let stdout = io::stdout();
        let mut writer = stdout.lock();
        let written = store.read_to(name, &mut writer)?;
        writer.flush()?;
        return Ok(written);
    }

    let mut writer = BufWriter::new(File::create(output)?);
    let written = store.read_to(name, &mut writer)?;
    writer.flush()?;
    Ok(written)
}
