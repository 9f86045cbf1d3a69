use thiserror::Error;

/// Failure modes of a processing pass, split the way recovery differs.
///
/// Per-candidate problems (body fetch, single ledger write) never surface
/// here — they are logged and the candidate is skipped or retried next pass.
#[derive(Debug, Error)]
pub enum SweepError {
    /// Invalid or unloadable configuration. Process-fatal: no pass runs.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The mail session could not be established. Process-fatal.
    #[error("mail session error: {0}")]
    Mail(String),

    /// One folder could not be enumerated. Aborts that folder's pass only.
    #[error("folder {folder}: {message}")]
    Folder { folder: String, message: String },

    /// The ledger could not be read or its thread is gone.
    #[error("ledger error: {0}")]
    Store(String),

    /// Feed documents could not be serialized or written. Ledger writes
    /// committed earlier in the pass are NOT rolled back; the next pass
    /// re-assembles from ledger state without re-fetching.
    #[error("feed assembly error: {0}")]
    Assembly(String),
}

impl SweepError {
    pub fn folder(folder: &str, message: impl Into<String>) -> Self {
        SweepError::Folder {
            folder: folder.to_string(),
            message: message.into(),
        }
    }
}
