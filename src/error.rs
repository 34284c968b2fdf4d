use thiserror::Error;

/// Errors surfaced by the index engine.
///
/// `UnsupportedVersion` and `Corrupt` are recoverable: the caller should
/// discard the on-disk file and rebuild from source documents. `NotReady` is
/// a caller error and must never be papered over with an empty result set.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index is not ready: no build has completed yet")]
    NotReady,

    #[error("unsupported index format version {found:#010x} (expected {expected:#010x})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("corrupt index stream: {0}")]
    Corrupt(String),

    #[error("build was cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IndexError {
    /// True when the right response is to throw the file away and rebuild.
    pub fn is_rebuild_needed(&self) -> bool {
        matches!(
            self,
            IndexError::UnsupportedVersion { .. } | IndexError::Corrupt(_)
        )
    }
}
