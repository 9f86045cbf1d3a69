use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::StreamExt;
use indexmap::IndexMap;
use tokio::sync::Mutex;

use melib::backends::{BackendEventConsumer, IsSubscribedFn, MailBackend};
use melib::conf::AccountSettings;
use melib::email::attachment_types::{ContentType, Text};
use melib::imap::ImapType;
use melib::{AccountHash, EnvelopeHash, Mail, MailboxHash};

use crate::config::Config;
use crate::models::{MessageBody, MessageMeta};

/// Upstream message source. The sweeper only needs two operations, so the
/// seam is narrow enough that tests can drive it with an in-memory stub.
pub trait MailSource: Send + Sync {
    /// Envelopes in `folder` with timestamp at or after `since`. The filter
    /// is inclusive; the ledger is the dedup authority, not the watermark.
    fn list_candidates<'a>(
        &'a self,
        folder: &'a str,
        since: i64,
    ) -> BoxFuture<'a, Result<Vec<MessageMeta>, String>>;

    /// Full body parts for one message. Both parts may be empty.
    fn fetch_body(&self, uid: u64) -> BoxFuture<'_, Result<MessageBody, String>>;
}

// ---------------------------------------------------------------------------
// ImapSession — live IMAP session backed by melib
// ---------------------------------------------------------------------------

pub struct ImapSession {
    backend: Arc<Mutex<Box<ImapType>>>,
    /// Map from folder path to mailbox hash, filled lazily from the server.
    mailbox_hashes: Mutex<HashMap<String, MailboxHash>>,
    timeout: Duration,
}

impl std::fmt::Debug for ImapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapSession").finish_non_exhaustive()
    }
}

impl ImapSession {
    /// Connect and verify the session is usable before returning it.
    pub async fn connect(config: &Config, password: &str) -> Result<Arc<Self>, String> {
        let mut extra = IndexMap::new();
        extra.insert("server_hostname".into(), config.host.clone());
        extra.insert("server_username".into(), config.username.clone());
        extra.insert("server_password".into(), password.to_string());
        extra.insert("server_port".into(), config.port.to_string());
        extra.insert("use_tls".into(), "true".into());
        extra.insert(
            "use_starttls".into(),
            if config.starttls { "true" } else { "false" }.into(),
        );
        extra.insert("danger_accept_invalid_certs".into(), "false".into());

        let account_settings = AccountSettings {
            name: config.username.clone(),
            root_mailbox: "INBOX".into(),
            format: "imap".into(),
            identity: config.username.clone(),
            extra,
            ..Default::default()
        };

        let is_subscribed: IsSubscribedFn =
            (Arc::new(|_: &str| true) as Arc<dyn Fn(&str) -> bool + Send + Sync>).into();

        let event_consumer = BackendEventConsumer::new(Arc::new(
            |_account_hash: AccountHash, event: melib::backends::BackendEvent| {
                log::debug!("IMAP backend event: {:?}", event);
            },
        ));

        let backend = ImapType::new(&account_settings, is_subscribed, event_consumer)
            .map_err(|e| format!("Failed to create IMAP backend: {}", e))?;

        let session = ImapSession {
            backend: Arc::new(Mutex::new(backend)),
            mailbox_hashes: Mutex::new(HashMap::new()),
            timeout: Duration::from_secs(config.timeout_secs),
        };

        // Verify we can connect
        {
            let backend = session.backend.lock().await;
            let online_future = backend
                .is_online()
                .map_err(|e| format!("IMAP is_online failed: {}", e))?;
            with_deadline(session.timeout, "IMAP connection", online_future)
                .await?
                .map_err(|e| format!("IMAP connection failed: {}", e))?;
        }

        Ok(Arc::new(session))
    }

    /// Resolve a folder path to its mailbox hash, refreshing the map from
    /// the server on a miss (new folders appear without a reconnect).
    async fn resolve_mailbox(&self, folder: &str) -> Result<MailboxHash, String> {
        {
            let hashes = self.mailbox_hashes.lock().await;
            if let Some(hash) = hashes.get(folder) {
                return Ok(*hash);
            }
        }

        let future = {
            let backend = self.backend.lock().await;
            backend
                .mailboxes()
                .map_err(|e| format!("Failed to request mailboxes: {}", e))?
        };
        let mailboxes = with_deadline(self.timeout, "Mailbox listing", future)
            .await?
            .map_err(|e| format!("Failed to fetch mailboxes: {}", e))?;

        let mut hashes = self.mailbox_hashes.lock().await;
        hashes.clear();
        for (hash, mailbox) in &mailboxes {
            hashes.insert(mailbox.path().to_string(), *hash);
        }

        hashes
            .get(folder)
            .copied()
            .ok_or_else(|| format!("No such folder on server: {folder}"))
    }
}

impl MailSource for ImapSession {
    fn list_candidates<'a>(
        &'a self,
        folder: &'a str,
        since: i64,
    ) -> BoxFuture<'a, Result<Vec<MessageMeta>, String>> {
        Box::pin(async move {
            let mailbox_hash = self.resolve_mailbox(folder).await?;

            let stream = {
                let mut backend = self.backend.lock().await;
                backend
                    .fetch(mailbox_hash)
                    .map_err(|e| format!("Failed to start fetch: {}", e))?
            };

            let mut stream = std::pin::pin!(stream);
            let mut candidates = Vec::new();

            // Each batch gets its own deadline; a stalled server fails the
            // folder instead of blocking the sweep.
            while let Some(batch_result) =
                with_deadline(self.timeout, "Envelope listing", stream.next()).await?
            {
                let envelopes =
                    batch_result.map_err(|e| format!("Error fetching envelopes: {}", e))?;

                for envelope in envelopes {
                    let timestamp = envelope.timestamp as i64;
                    if timestamp < since {
                        continue;
                    }
                    let from = envelope
                        .from()
                        .iter()
                        .map(|a| a.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");

                    candidates.push(MessageMeta {
                        uid: envelope.hash().0,
                        subject: envelope.subject().to_string(),
                        from,
                        timestamp,
                    });
                }
            }

            Ok(candidates)
        })
    }

    fn fetch_body(&self, uid: u64) -> BoxFuture<'_, Result<MessageBody, String>> {
        Box::pin(async move {
            let future = {
                let backend = self.backend.lock().await;
                backend
                    .envelope_bytes_by_hash(EnvelopeHash(uid))
                    .map_err(|e| format!("Failed to request message bytes: {}", e))?
            };

            let bytes = with_deadline(self.timeout, "Message fetch", future)
                .await?
                .map_err(|e| format!("Failed to fetch message bytes: {}", e))?;

            let mail =
                Mail::new(bytes, None).map_err(|e| format!("Failed to parse message: {}", e))?;

            let mut body = MessageBody::default();
            extract_parts(&mail.body(), &mut body);
            Ok(body)
        })
    }
}

/// Bound a server interaction; every await on the IMAP session goes through
/// here so no single stalled operation can hang a pass.
async fn with_deadline<T>(
    limit: Duration,
    what: &str,
    fut: impl std::future::Future<Output = T>,
) -> Result<T, String> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| format!("{what} timed out"))
}

/// Walk the MIME tree and accumulate text/plain and text/html parts.
/// Attachments and other leaf types are ignored; feeds carry text only.
fn extract_parts(att: &melib::email::attachments::Attachment, body: &mut MessageBody) {
    match &att.content_type {
        ContentType::Text {
            kind: Text::Plain, ..
        } if !att.content_disposition.kind.is_attachment() => {
            let bytes = att.decode(Default::default());
            let text = String::from_utf8_lossy(&bytes);
            if !text.trim().is_empty() {
                body.text.push_str(&text);
            }
        }
        ContentType::Text {
            kind: Text::Html, ..
        } if !att.content_disposition.kind.is_attachment() => {
            let bytes = att.decode(Default::default());
            let text = String::from_utf8_lossy(&bytes);
            if !text.trim().is_empty() {
                body.html.push_str(&text);
            }
        }
        ContentType::Multipart { parts, .. } => {
            for part in parts {
                extract_parts(part, body);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deadline_passes_through_prompt_results() {
        let value = with_deadline(Duration::from_secs(1), "prompt op", async { 7 })
            .await
            .expect("completes well before the limit");
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn deadline_cuts_off_a_stalled_future() {
        let result = with_deadline(
            Duration::from_millis(10),
            "stalled op",
            futures::future::pending::<()>(),
        )
        .await;
        assert_eq!(result.unwrap_err(), "stalled op timed out");
    }
}
