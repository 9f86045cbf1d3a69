use rusqlite::Connection;

use crate::models::{NormalizedContent, ProcessedRecord};

/// Shared row-to-struct mapping for `do_recent_records`.
///
/// Expects columns in this order:
///   0: folder, 1: uid, 2: subject, 3: sender, 4: timestamp,
///   5: processed_at, 6: content_html, 7: content_text, 8: summary,
///   9: html_derived
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProcessedRecord> {
    let uid: i64 = row.get(1)?;
    Ok(ProcessedRecord {
        folder: row.get(0)?,
        uid: uid as u64,
        subject: row.get(2)?,
        sender: row.get(3)?,
        timestamp: row.get(4)?,
        processed_at: row.get(5)?,
        content: NormalizedContent {
            html: row.get(6)?,
            text: row.get(7)?,
            summary: row.get(8)?,
            html_derived: row.get::<_, i32>(9)? != 0,
        },
    })
}

/// High-water mark for incremental listing. Empty folder reads as 0, which
/// makes the first pass a full sweep.
pub(super) fn do_last_seen_timestamp(conn: &Connection, folder: &str) -> Result<i64, String> {
    conn.query_row(
        "SELECT COALESCE(MAX(timestamp), 0) FROM processed_messages WHERE folder = ?1",
        [folder],
        |row| row.get(0),
    )
    .map_err(|e| format!("Ledger query error: {e}"))
}

pub(super) fn do_is_processed(conn: &Connection, folder: &str, uid: u64) -> Result<bool, String> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM processed_messages WHERE folder = ?1 AND uid = ?2",
            rusqlite::params![folder, uid as i64],
            |row| row.get(0),
        )
        .map_err(|e| format!("Ledger query error: {e}"))?;
    Ok(count > 0)
}

/// Upsert. Re-marking an already-processed message overwrites the row, so
/// a retried pass converges instead of erroring.
pub(super) fn do_mark_processed(conn: &Connection, record: &ProcessedRecord) -> Result<(), String> {
    conn.execute(
        "INSERT INTO processed_messages (
            folder, uid, subject, sender, timestamp, processed_at,
            content_html, content_text, summary, html_derived
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(folder, uid) DO UPDATE SET
             subject = excluded.subject,
             sender = excluded.sender,
             timestamp = excluded.timestamp,
             processed_at = excluded.processed_at,
             content_html = excluded.content_html,
             content_text = excluded.content_text,
             summary = excluded.summary,
             html_derived = excluded.html_derived",
        rusqlite::params![
            record.folder,
            record.uid as i64,
            record.subject,
            record.sender,
            record.timestamp,
            record.processed_at,
            record.content.html,
            record.content.text,
            record.content.summary,
            record.content.html_derived as i32,
        ],
    )
    .map_err(|e| format!("Ledger insert error: {e}"))?;
    Ok(())
}

/// Retained window, newest first. Ties on timestamp break by uid descending
/// so the ordering is total and regeneration is stable.
pub(super) fn do_recent_records(
    conn: &Connection,
    folder: &str,
    limit: u32,
) -> Result<Vec<ProcessedRecord>, String> {
    let mut stmt = conn
        .prepare(
            "SELECT folder, uid, subject, sender, timestamp, processed_at,
                    content_html, content_text, summary, html_derived
             FROM processed_messages
             WHERE folder = ?1
             ORDER BY timestamp DESC, uid DESC
             LIMIT ?2",
        )
        .map_err(|e| format!("Ledger prepare error: {e}"))?;

    let rows = stmt
        .query_map(rusqlite::params![folder, limit], row_to_record)
        .map_err(|e| format!("Ledger query error: {e}"))?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row.map_err(|e| format!("Ledger row error: {e}"))?);
    }
    Ok(records)
}

/// Forget one folder's history. Returns the number of rows removed; zero
/// for an unknown folder, which is not an error.
pub(super) fn do_clear_folder(conn: &Connection, folder: &str) -> Result<usize, String> {
    conn.execute("DELETE FROM processed_messages WHERE folder = ?1", [folder])
        .map_err(|e| format!("Ledger delete error: {e}"))
}
