use crate::error::Result;
use crate::store::Store;

/// Delete `name`, returns the number of bytes reclaimed from the file
/// (`None` if there was no such entry)
pub fn remove_entry(store: &Store, name: &str) -> Result<Option<u64>> {
    let before = store.file_len()?;
    if !store.delete(name)? {
        return Ok(None);
    }
    Ok(Some(before - store.file_len()?))
}
