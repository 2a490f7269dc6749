use thiserror::Error;

#[derive(Error, Debug)]
pub enum SealboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Cipher error: {0}")]
    Crypto(String),

    #[error("Invalid entry name: {0}")]
    InvalidName(String),

    #[error("Entry name is {len} bytes, maximum is {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("Invalid key block range {start}..{end}: must be non-empty and start above 0")]
    InvalidKeyBlocks { start: u32, end: u32 },

    #[error("No entry named '{0}'")]
    NotFound(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),
}

impl SealboxError {
    /// True for errors that mean "this file is not a readable store"
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            SealboxError::InvalidHeader(_) | SealboxError::InvalidFormat(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SealboxError>;
