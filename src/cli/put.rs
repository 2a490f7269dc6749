use crate::cli::is_stdio;
use crate::entry::EntryDescriptor;
use crate::error::Result;
use crate::store::Store;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Store the contents of `input` under `name`
/// Files are streamed; stdin is buffered so a short overwrite can stay in place
pub fn put_entry(store: &Store, name: &str, input: &Path) -> Result<EntryDescriptor> {
    if is_stdio(input) {
        let mut data = Vec::new();
        io::stdin().lock().read_to_end(&mut data)?;
        return store.write(name, &data);
    }

    let file = File::open(input)?;
    let len = file.metadata()?.len();
    match store.get(name) {
        Some(existing) if len <= existing.payload_region_len() => {
            store.write(name, &std::fs::read(input)?)
        }
        _ => store.write_stream(name, BufReader::new(file)),
    }
}
