use crate::entry::EntryDescriptor;
use crate::error::Result;
use crate::store::Store;

/// Entries in file order
pub fn sorted_entries(store: &Store) -> Vec<EntryDescriptor> {
    let mut entries = store.list();
    entries.sort_by_key(|e| e.position);
    entries
}

/// Render the entry table, either as text columns or as a JSON array
pub fn list_entries(store: &Store, json: bool) -> Result<String> {
    let entries = sorted_entries(store);
    if json {
        let mut output = serde_json::to_string_pretty(&entries)?;
        output.push('\n');
        return Ok(output);
    }

    if entries.is_empty() {
        return Ok("No entries\n".to_string());
    }

    let width = entries
        .iter()
        .map(|e| e.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);

    let mut output = format!(
        "{:<width$}  {:>12}  {:>12}  {}\n",
        "NAME",
        "LENGTH",
        "OFFSET",
        "MODIFIED",
        width = width
    );
    for entry in &entries {
        let modified = entry
            .modified
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        output.push_str(&format!(
            "{:<width$}  {:>12}  {:>12}  {}\n",
            entry.name,
            entry.length,
            entry.position,
            modified,
            width = width
        ));
    }
    Ok(output)
}
