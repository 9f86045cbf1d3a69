use std::path::Path;

use rusqlite::Connection;
use tokio::sync::{mpsc, oneshot};

use super::commands::LedgerCmd;
use super::queries;
use super::schema::SCHEMA;
use crate::models::ProcessedRecord;

// ---------------------------------------------------------------------------
// LedgerHandle — Clone + Send + Sync async facade
// ---------------------------------------------------------------------------

/// The dedup ledger. One SQLite connection owned by a background thread;
/// every caller talks to it through this handle, so writes are serialized
/// without any SQLite-level locking games.
#[derive(Clone)]
pub struct LedgerHandle {
    tx: mpsc::UnboundedSender<LedgerCmd>,
}

impl LedgerHandle {
    /// Open (or create) the ledger database and spawn the background thread.
    pub fn open(path: &Path) -> Result<Self, String> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create ledger dir: {e}"))?;
            }
        }

        let conn =
            Connection::open(path).map_err(|e| format!("Failed to open ledger db: {e}"))?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| format!("Failed to init ledger schema: {e}"))?;

        let (tx, rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("mailfeed-ledger".into())
            .spawn(move || run_loop(conn, rx))
            .map_err(|e| format!("Failed to spawn ledger thread: {e}"))?;

        Ok(LedgerHandle { tx })
    }

    // -- async methods -------------------------------------------------------

    pub async fn last_seen_timestamp(&self, folder: String) -> Result<i64, String> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LedgerCmd::LastSeenTimestamp { folder, reply })
            .map_err(|_| "Ledger unavailable".to_string())?;
        rx.await.map_err(|_| "Ledger unavailable".to_string())?
    }

    pub async fn is_processed(&self, folder: String, uid: u64) -> Result<bool, String> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LedgerCmd::IsProcessed { folder, uid, reply })
            .map_err(|_| "Ledger unavailable".to_string())?;
        rx.await.map_err(|_| "Ledger unavailable".to_string())?
    }

    pub async fn mark_processed(&self, record: ProcessedRecord) -> Result<(), String> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LedgerCmd::MarkProcessed {
                record: Box::new(record),
                reply,
            })
            .map_err(|_| "Ledger unavailable".to_string())?;
        rx.await.map_err(|_| "Ledger unavailable".to_string())?
    }

    pub async fn recent_records(
        &self,
        folder: String,
        limit: u32,
    ) -> Result<Vec<ProcessedRecord>, String> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LedgerCmd::RecentRecords { folder, limit, reply })
            .map_err(|_| "Ledger unavailable".to_string())?;
        rx.await.map_err(|_| "Ledger unavailable".to_string())?
    }

    /// Forget a folder so the next pass re-ingests it. Returns rows removed.
    pub async fn clear_folder(&self, folder: String) -> Result<usize, String> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LedgerCmd::ClearFolder { folder, reply })
            .map_err(|_| "Ledger unavailable".to_string())?;
        rx.await.map_err(|_| "Ledger unavailable".to_string())?
    }
}

// -- background thread ---------------------------------------------------

fn run_loop(conn: Connection, mut rx: mpsc::UnboundedReceiver<LedgerCmd>) {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            LedgerCmd::LastSeenTimestamp { folder, reply } => {
                let _ = reply.send(queries::do_last_seen_timestamp(&conn, &folder));
            }
            LedgerCmd::IsProcessed { folder, uid, reply } => {
                let _ = reply.send(queries::do_is_processed(&conn, &folder, uid));
            }
            LedgerCmd::MarkProcessed { record, reply } => {
                let _ = reply.send(queries::do_mark_processed(&conn, &record));
            }
            LedgerCmd::RecentRecords { folder, limit, reply } => {
                let _ = reply.send(queries::do_recent_records(&conn, &folder, limit));
            }
            LedgerCmd::ClearFolder { folder, reply } => {
                let _ = reply.send(queries::do_clear_folder(&conn, &folder));
            }
        }
    }
    log::debug!("Ledger thread exiting");
}
