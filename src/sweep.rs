//! Sweep orchestration: list candidates per folder, process them through a
//! bounded worker pool, commit to the ledger, regenerate feed documents.
//!
//! Failure isolation runs in layers. A failed candidate never fails its
//! folder; a failed folder never fails the pass; the pass only reports
//! total failure when every folder failed.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::stream::{self, StreamExt};
use indexmap::IndexMap;

use crate::error::SweepError;
use crate::feed::FeedAssembler;
use crate::mail::MailSource;
use crate::models::{MessageBody, MessageMeta, ProcessedRecord};
use crate::normalize::{self, Normalizer};
use crate::store::LedgerHandle;
use crate::summarize::Summarizer;

/// Outcome of one full pass over all configured folders.
#[derive(Debug, Default)]
pub struct SweepSummary {
    pub folders_swept: usize,
    pub folders_failed: usize,
    pub messages_processed: usize,
    pub messages_skipped: usize,
}

impl SweepSummary {
    /// A pass counts as failed only when no folder made it through.
    pub fn all_failed(&self) -> bool {
        self.folders_swept == 0 && self.folders_failed > 0
    }
}

#[derive(Debug, Default)]
struct FolderStats {
    processed: usize,
    skipped: usize,
}

enum Outcome {
    Processed,
    Skipped,
}

pub struct Sweeper {
    mail: Arc<dyn MailSource>,
    ledger: LedgerHandle,
    assembler: FeedAssembler,
    normalizer: Normalizer,
    summarizer: Arc<dyn Summarizer>,
    max_workers: usize,
    max_summary_len: usize,
}

impl Sweeper {
    pub fn new(
        mail: Arc<dyn MailSource>,
        ledger: LedgerHandle,
        assembler: FeedAssembler,
        normalizer: Normalizer,
        summarizer: Arc<dyn Summarizer>,
        max_workers: usize,
        max_summary_len: usize,
    ) -> Self {
        Sweeper {
            mail,
            ledger,
            assembler,
            normalizer,
            summarizer,
            max_workers,
            max_summary_len,
        }
    }

    /// One pass over every configured folder, in file order. Folder errors
    /// are logged and tallied, never propagated.
    pub async fn run(&self, folders: &IndexMap<String, String>) -> SweepSummary {
        let mut summary = SweepSummary::default();
        for (folder, feed_name) in folders {
            match self.sweep_folder(folder, feed_name).await {
                Ok(stats) => {
                    summary.folders_swept += 1;
                    summary.messages_processed += stats.processed;
                    summary.messages_skipped += stats.skipped;
                }
                Err(e) => {
                    summary.folders_failed += 1;
                    log::error!("Sweep of {folder} failed: {e}");
                }
            }
        }
        log::info!(
            "Pass complete: {} folder(s) swept, {} failed, {} message(s) processed, {} skipped",
            summary.folders_swept,
            summary.folders_failed,
            summary.messages_processed,
            summary.messages_skipped
        );
        summary
    }

    async fn sweep_folder(&self, folder: &str, feed_name: &str) -> Result<FolderStats, SweepError> {
        let since = self
            .ledger
            .last_seen_timestamp(folder.to_string())
            .await
            .map_err(SweepError::Store)?;

        let candidates = self
            .mail
            .list_candidates(folder, since)
            .await
            .map_err(|e| SweepError::folder(folder, e))?;

        log::info!(
            "{folder}: {} candidate(s) at or after watermark {since}",
            candidates.len()
        );

        let outcomes: Vec<Outcome> = stream::iter(candidates)
            .map(|meta| self.process_candidate(folder, meta))
            .buffer_unordered(self.max_workers)
            .collect()
            .await;

        let mut stats = FolderStats::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Processed => stats.processed += 1,
                Outcome::Skipped => stats.skipped += 1,
            }
        }

        let records = self
            .ledger
            .recent_records(folder.to_string(), self.assembler.max_items() as u32)
            .await
            .map_err(SweepError::Store)?;

        self.assembler.write_feeds(folder, feed_name, &records)?;
        Ok(stats)
    }

    /// One candidate, end to end. Every failure path here resolves to a
    /// logged skip; the ledger write is the commit point.
    async fn process_candidate(&self, folder: &str, meta: MessageMeta) -> Outcome {
        match self.ledger.is_processed(folder.to_string(), meta.uid).await {
            Ok(true) => {
                log::debug!("{folder}: uid {} already processed", meta.uid);
                return Outcome::Skipped;
            }
            Ok(false) => {}
            Err(e) => {
                log::warn!("{folder}: dedup check for uid {} failed: {e}", meta.uid);
                return Outcome::Skipped;
            }
        }

        // A message we cannot fetch still gets a ledger row, so a poison
        // body cannot wedge the folder on every pass.
        let body = match self.mail.fetch_body(meta.uid).await {
            Ok(body) => body,
            Err(e) => {
                log::warn!(
                    "{folder}: body fetch for uid {} failed, recording empty content: {e}",
                    meta.uid
                );
                MessageBody::default()
            }
        };

        let mut content = self.normalizer.normalize(&body);
        match self.summarizer.summarize(&meta.subject, &content.text) {
            Ok(text) => {
                content.summary = normalize::summarize_lines(&text, self.max_summary_len);
            }
            Err(e) => {
                log::warn!(
                    "{folder}: summarizer failed for uid {}, keeping line summary: {e}",
                    meta.uid
                );
            }
        }

        let record = ProcessedRecord {
            folder: folder.to_string(),
            uid: meta.uid,
            subject: meta.subject,
            sender: meta.from,
            timestamp: meta.timestamp,
            processed_at: unix_now(),
            content,
        };

        match self.ledger.mark_processed(record).await {
            Ok(()) => Outcome::Processed,
            Err(e) => {
                // Not committed; the next pass retries this uid.
                log::warn!("{folder}: ledger write for uid {} failed: {e}", meta.uid);
                Outcome::Skipped
            }
        }
    }

}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
