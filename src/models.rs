use serde::{Deserialize, Serialize};

/// Envelope metadata for one candidate message, as listed by the mail source.
///
/// Immutable once constructed. `uid` is stable within a folder; `timestamp`
/// is the server-asserted date and is NOT guaranteed monotonic with `uid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMeta {
    pub uid: u64,
    pub subject: String,
    pub from: String,
    pub timestamp: i64,
}

/// Raw body parts as retrieved from the server. Either may be empty.
#[derive(Debug, Clone, Default)]
pub struct MessageBody {
    pub text: String,
    pub html: String,
}

/// Bounded, display-safe output of the normalization pipeline.
///
/// If the source had only one body type, the other is derived (text from
/// HTML by tag stripping, HTML from text by escape-and-wrap). Both fields
/// are empty only when the source had no body at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedContent {
    pub html: String,
    pub text: String,
    pub summary: String,
    /// True when `html` was derived from the text body rather than sourced
    /// from a real text/html part.
    pub html_derived: bool,
}

/// One persisted ledger row: a message that was fully normalized and
/// committed. Keyed by `(folder, uid)`.
#[derive(Debug, Clone)]
pub struct ProcessedRecord {
    pub folder: String,
    pub uid: u64,
    pub subject: String,
    pub sender: String,
    pub timestamp: i64,
    pub processed_at: i64,
    pub content: NormalizedContent,
}
