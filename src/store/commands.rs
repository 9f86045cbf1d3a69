use tokio::sync::oneshot;

use crate::models::ProcessedRecord;

pub(super) enum LedgerCmd {
    LastSeenTimestamp {
        folder: String,
        reply: oneshot::Sender<Result<i64, String>>,
    },
    IsProcessed {
        folder: String,
        uid: u64,
        reply: oneshot::Sender<Result<bool, String>>,
    },
    MarkProcessed {
        record: Box<ProcessedRecord>,
        reply: oneshot::Sender<Result<(), String>>,
    },
    RecentRecords {
        folder: String,
        limit: u32,
        reply: oneshot::Sender<Result<Vec<ProcessedRecord>, String>>,
    },
    ClearFolder {
        folder: String,
        reply: oneshot::Sender<Result<usize, String>>,
    },
}
