use crate::error::Result;
use crate::store::Store;
use crate::sync::{sync_from_resource, HttpFetcher, ResourceFetcher, SyncOutcome};
use std::time::Duration;

/// Options for the sync command
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Refresh `name` from `url` over HTTP
pub fn sync_entry(store: &Store, name: &str, url: &str, options: &SyncOptions) -> Result<String> {
    let fetcher = HttpFetcher::new(options.timeout);
    sync_entry_with(store, name, url, &fetcher)
}

/// Same as [`sync_entry`] with a caller-supplied fetcher
pub fn sync_entry_with<F: ResourceFetcher + ?Sized>(
    store: &Store,
    name: &str,
    url: &str,
    fetcher: &F,
) -> Result<String> {
    let outcome = sync_from_resource(store, name, url, fetcher)?;
    Ok(describe_outcome(name, &outcome))
}

pub fn describe_outcome(name: &str, outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Skipped => format!("{} is up to date\n", name),
        SyncOutcome::Updated { bytes } => format!("Fetched {} bytes into {}\n", bytes, name),
    }
}
