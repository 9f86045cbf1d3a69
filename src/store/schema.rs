/// Schema DDL run on open. One row per processed message, keyed by
/// (folder, uid); the normalized content is stored alongside so feed
/// assembly never needs to re-fetch a body.
pub(super) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS processed_messages (
    folder TEXT NOT NULL,
    uid INTEGER NOT NULL,
    subject TEXT NOT NULL DEFAULT '',
    sender TEXT NOT NULL DEFAULT '',
    timestamp INTEGER NOT NULL DEFAULT 0,
    processed_at INTEGER NOT NULL DEFAULT 0,
    content_html TEXT NOT NULL DEFAULT '',
    content_text TEXT NOT NULL DEFAULT '',
    summary TEXT NOT NULL DEFAULT '',
    html_derived INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (folder, uid)
);

CREATE INDEX IF NOT EXISTS idx_processed_folder_time
    ON processed_messages(folder, timestamp DESC);
";
