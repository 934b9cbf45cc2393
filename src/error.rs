use thiserror::Error;

/// Result alias used by the alignment core.
pub type AlignResult<T> = Result<T, AlignError>;

/// Terminal failures of an alignment or verification run.
///
/// Every variant aborts the whole run; there is no partial success.
#[derive(Debug, Error)]
pub enum AlignError {
    /// The source archive could not be opened or read.
    #[error("unable to read zip archive: {0}")]
    ArchiveOpen(String),

    /// The destination archive could not be written.
    #[error("failed writing zip archive: {0}")]
    ArchiveWrite(String),

    /// A compressed entry could not be decoded during recompression.
    #[error("{name}: corrupt compressed data: {reason}")]
    EntryDecode { name: String, reason: String },

    /// Padding would push the local extra field past 65535 bytes.
    #[error("{name}: extra field would grow to {len} bytes (limit {})", u16::MAX)]
    ExtraFieldOverflow { name: String, len: usize },

    #[error("invalid alignment: {0}")]
    InvalidAlignment(String),

    /// Malformed command input.
    #[error("{0}")]
    Argument(String),
}

impl AlignError {
    pub(crate) fn open(err: anyhow::Error) -> Self {
        AlignError::ArchiveOpen(format!("{err:#}"))
    }

    pub(crate) fn write(err: anyhow::Error) -> Self {
        AlignError::ArchiveWrite(format!("{err:#}"))
    }
}
