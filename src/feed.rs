//! Feed assembly: turn the ledger's retained window of processed records
//! into an RSS 2.0 document and a JSON Feed 1.1 document with the same item
//! set, ordering, and identifiers.
//!
//! Documents are regenerated in full on every pass and written with a
//! write-then-rename, so a concurrent reader always sees a complete
//! snapshot. Nothing here reaches the network or the ledger; assembly is a
//! pure function of the records handed in, which keeps output byte-stable
//! across passes.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, TimeZone, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Serialize;

use crate::error::SweepError;
use crate::models::ProcessedRecord;
use crate::normalize::{truncate_with_marker, wrap_preformatted};

const JSON_FEED_VERSION: &str = "https://jsonfeed.org/version/1.1";

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub output_dir: PathBuf,
    pub title: String,
    pub base_url: String,
    /// Character budget for an RSS item description sourced from HTML.
    pub max_rss_html_len: usize,
    /// Character budget for the inner text of a preformatted description.
    pub max_rss_text_len: usize,
    /// Size of the retained window regenerated into each document.
    pub max_items: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            output_dir: PathBuf::from("./feeds"),
            title: "Mail".to_string(),
            base_url: "http://localhost:8080".to_string(),
            max_rss_html_len: 5000,
            max_rss_text_len: 2900,
            max_items: 50,
        }
    }
}

pub struct FeedAssembler {
    config: FeedConfig,
}

impl FeedAssembler {
    pub fn new(config: FeedConfig) -> Self {
        FeedAssembler { config }
    }

    pub fn max_items(&self) -> usize {
        self.config.max_items
    }

    pub fn feed_path(&self, feed_name: &str, extension: &str) -> PathBuf {
        self.config.output_dir.join(format!("{feed_name}.{extension}"))
    }

    /// Regenerate both documents for one folder and replace the files on
    /// disk. Errors here are fatal to the folder's pass but do not undo
    /// ledger writes — the next pass re-assembles from ledger state.
    pub fn write_feeds(
        &self,
        folder: &str,
        feed_name: &str,
        records: &[ProcessedRecord],
    ) -> Result<(), SweepError> {
        let mut entries: Vec<&ProcessedRecord> = records.iter().collect();
        entries.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.uid.cmp(&a.uid))
        });
        entries.truncate(self.config.max_items);

        let rss = self
            .render_rss(folder, feed_name, &entries)
            .map_err(SweepError::Assembly)?;
        let json = self
            .render_json(folder, feed_name, &entries)
            .map_err(SweepError::Assembly)?;

        fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| SweepError::Assembly(format!("create output directory: {e}")))?;

        write_atomic(&self.feed_path(feed_name, "xml"), &rss).map_err(SweepError::Assembly)?;
        write_atomic(&self.feed_path(feed_name, "json"), &json).map_err(SweepError::Assembly)?;

        log::info!(
            "Wrote {} item(s) to {}.xml and {}.json for folder {}",
            entries.len(),
            feed_name,
            feed_name,
            folder
        );
        Ok(())
    }

    // -- RSS 2.0 -------------------------------------------------------------

    fn render_rss(
        &self,
        folder: &str,
        feed_name: &str,
        entries: &[&ProcessedRecord],
    ) -> Result<Vec<u8>, String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;

        let mut rss = BytesStart::new("rss");
        rss.push_attribute(("version", "2.0"));
        writer.write_event(Event::Start(rss)).map_err(xml_err)?;
        writer
            .write_event(Event::Start(BytesStart::new("channel")))
            .map_err(xml_err)?;

        text_element(
            &mut writer,
            "title",
            &format!("{} - {}", self.config.title, feed_name),
        )?;
        text_element(&mut writer, "link", &self.config.base_url)?;
        text_element(
            &mut writer,
            "description",
            &format!("RSS feed for email folder: {folder}"),
        )?;
        // The newest item timestamp, not the wall clock: regenerating an
        // unchanged window must produce byte-identical output.
        if let Some(newest) = entries.first() {
            text_element(&mut writer, "lastBuildDate", &rfc2822(newest.timestamp))?;
        }

        for rec in entries {
            writer
                .write_event(Event::Start(BytesStart::new("item")))
                .map_err(xml_err)?;
            text_element(&mut writer, "title", &rec.subject)?;
            text_element(
                &mut writer,
                "link",
                &format!("{}/message/{}", self.config.base_url, rec.uid),
            )?;
            let mut guid = BytesStart::new("guid");
            guid.push_attribute(("isPermaLink", "false"));
            writer.write_event(Event::Start(guid)).map_err(xml_err)?;
            writer
                .write_event(Event::Text(BytesText::new(&format!(
                    "{}_{}",
                    rec.folder, rec.uid
                ))))
                .map_err(xml_err)?;
            writer
                .write_event(Event::End(BytesEnd::new("guid")))
                .map_err(xml_err)?;
            text_element(&mut writer, "author", &rec.sender)?;
            text_element(&mut writer, "pubDate", &rfc2822(rec.timestamp))?;
            text_element(&mut writer, "description", &self.rss_description(rec))?;
            writer
                .write_event(Event::End(BytesEnd::new("item")))
                .map_err(xml_err)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("channel")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("rss")))
            .map_err(xml_err)?;

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// One description field: the HTML representation, or a preformatted
    /// wrapper around the text when the HTML was itself derived. The inner
    /// content is truncated to its limit before wrapping, same rule at both
    /// call sites.
    fn rss_description(&self, rec: &ProcessedRecord) -> String {
        let content = &rec.content;
        if content.html.is_empty() {
            return String::new();
        }
        if content.html_derived {
            let inner = truncate_with_marker(&content.text, self.config.max_rss_text_len);
            wrap_preformatted(&inner)
        } else {
            truncate_with_marker(&content.html, self.config.max_rss_html_len)
        }
    }

    // -- JSON Feed 1.1 -------------------------------------------------------

    fn render_json(
        &self,
        folder: &str,
        feed_name: &str,
        entries: &[&ProcessedRecord],
    ) -> Result<Vec<u8>, String> {
        let items = entries
            .iter()
            .map(|rec| JsonItem {
                id: format!("{}_{}", rec.folder, rec.uid),
                url: format!("{}/message/{}", self.config.base_url, rec.uid),
                title: rec.subject.clone(),
                content_html: rec.content.html.clone(),
                // JSON Feed requires at least one content field per item;
                // a body that yielded nothing is published as empty text.
                content_text: if rec.content.html.is_empty() && rec.content.text.is_empty() {
                    Some(String::new())
                } else if rec.content.text.is_empty() {
                    None
                } else {
                    Some(rec.content.text.clone())
                },
                summary: rec.content.summary.clone(),
                date_published: rfc3339(rec.timestamp),
                authors: vec![JsonAuthor {
                    name: rec.sender.clone(),
                }],
            })
            .collect();

        let feed = JsonFeed {
            version: JSON_FEED_VERSION,
            title: format!("{} - {}", self.config.title, feed_name),
            home_page_url: self.config.base_url.clone(),
            feed_url: format!("{}/{}.json", self.config.base_url, feed_name),
            description: format!("JSON feed for email folder: {folder}"),
            items,
        };

        let mut bytes =
            serde_json::to_vec_pretty(&feed).map_err(|e| format!("serialize JSON feed: {e}"))?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

#[derive(Serialize)]
struct JsonFeed {
    version: &'static str,
    title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    home_page_url: String,
    feed_url: String,
    description: String,
    items: Vec<JsonItem>,
}

#[derive(Serialize)]
struct JsonItem {
    id: String,
    url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    content_html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_text: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    summary: String,
    date_published: String,
    authors: Vec<JsonAuthor>,
}

#[derive(Serialize)]
struct JsonAuthor {
    #[serde(skip_serializing_if = "String::is_empty")]
    name: String,
}

// -- helpers ----------------------------------------------------------------

fn text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: &str,
) -> Result<(), String> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)?;
    Ok(())
}

fn xml_err(e: impl std::fmt::Display) -> String {
    format!("xml write: {e}")
}

fn rfc2822(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.to_rfc2822())
        .unwrap_or_default()
}

fn rfc3339(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Total-file replacement: write to a temp file in the target directory,
/// then rename over the destination. A concurrent reader never observes a
/// partial document, and a cancelled write is discarded before the rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), String> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| format!("create temp file in {}: {e}", dir.display()))?;
    tmp.write_all(bytes)
        .map_err(|e| format!("write feed document: {e}"))?;
    tmp.persist(path)
        .map_err(|e| format!("replace {}: {e}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::NormalizedContent;

    fn record(uid: u64, timestamp: i64, subject: &str) -> ProcessedRecord {
        ProcessedRecord {
            folder: "INBOX".to_string(),
            uid,
            subject: subject.to_string(),
            sender: "alice@example.com".to_string(),
            timestamp,
            processed_at: 1_700_000_000,
            content: NormalizedContent {
                html: format!("<p>{subject}</p>"),
                text: subject.to_string(),
                summary: subject.to_string(),
                html_derived: false,
            },
        }
    }

    fn assembler(dir: &Path) -> FeedAssembler {
        FeedAssembler::new(FeedConfig {
            output_dir: dir.to_path_buf(),
            title: "Test Mail".to_string(),
            base_url: "http://localhost:8080".to_string(),
            ..FeedConfig::default()
        })
    }

    #[test]
    fn rss_items_ordered_newest_first_ties_by_uid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let asm = assembler(dir.path());
        let records = vec![
            record(1, 100, "oldest"),
            record(3, 300, "newest"),
            record(2, 300, "tied-lower-uid"),
        ];
        asm.write_feeds("INBOX", "inbox", &records).expect("write feeds");

        let xml = fs::read_to_string(asm.feed_path("inbox", "xml")).expect("read xml");
        let newest = xml.find("newest").expect("newest present");
        let tied = xml.find("tied-lower-uid").expect("tie present");
        let oldest = xml.find("oldest").expect("oldest present");
        assert!(newest < tied && tied < oldest);
    }

    #[test]
    fn rss_guid_and_link_are_stable_synthetics() {
        let dir = tempfile::tempdir().expect("tempdir");
        let asm = assembler(dir.path());
        asm.write_feeds("INBOX", "inbox", &[record(42, 100, "subj")])
            .expect("write feeds");

        let xml = fs::read_to_string(asm.feed_path("inbox", "xml")).expect("read xml");
        assert!(xml.contains("INBOX_42"));
        assert!(xml.contains("http://localhost:8080/message/42"));
        assert!(xml.contains(r#"<guid isPermaLink="false">"#));
    }

    #[test]
    fn rss_description_html_is_escaped_into_xml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let asm = assembler(dir.path());
        asm.write_feeds("INBOX", "inbox", &[record(1, 100, "hello")])
            .expect("write feeds");

        let xml = fs::read_to_string(asm.feed_path("inbox", "xml")).expect("read xml");
        assert!(xml.contains("&lt;p&gt;hello&lt;/p&gt;"));
    }

    #[test]
    fn rss_description_wraps_derived_html_from_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let asm = assembler(dir.path());
        let mut rec = record(1, 100, "textual");
        rec.content = NormalizedContent {
            html: wrap_preformatted("textual"),
            text: "textual".to_string(),
            summary: "textual".to_string(),
            html_derived: true,
        };
        let desc = asm.rss_description(&rec);
        assert_eq!(desc, "<pre>textual</pre>");
    }

    #[test]
    fn json_feed_carries_both_representations_and_summary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let asm = assembler(dir.path());
        asm.write_feeds("INBOX", "inbox", &[record(7, 100, "body")])
            .expect("write feeds");

        let raw = fs::read_to_string(asm.feed_path("inbox", "json")).expect("read json");
        let feed: serde_json::Value = serde_json::from_str(&raw).expect("parse json");
        assert_eq!(feed["version"], JSON_FEED_VERSION);
        assert_eq!(feed["title"], "Test Mail - inbox");
        let item = &feed["items"][0];
        assert_eq!(item["id"], "INBOX_7");
        assert_eq!(item["content_html"], "<p>body</p>");
        assert_eq!(item["content_text"], "body");
        assert_eq!(item["summary"], "body");
        assert_eq!(item["authors"][0]["name"], "alice@example.com");
        assert_eq!(item["date_published"], "1970-01-01T00:01:40Z");
    }

    #[test]
    fn empty_content_item_still_carries_a_content_field() {
        let dir = tempfile::tempdir().expect("tempdir");
        let asm = assembler(dir.path());
        let mut rec = record(9, 100, "silent");
        rec.content = NormalizedContent::default();
        asm.write_feeds("INBOX", "inbox", &[rec]).expect("write feeds");

        let raw = fs::read_to_string(asm.feed_path("inbox", "json")).expect("read json");
        let feed: serde_json::Value = serde_json::from_str(&raw).expect("parse json");
        let item = &feed["items"][0];
        assert_eq!(item["content_text"], "");
        assert!(item.get("content_html").is_none());
    }

    #[test]
    fn regenerating_unchanged_window_is_byte_identical() {
        let dir = tempfile::tempdir().expect("tempdir");
        let asm = assembler(dir.path());
        let records = vec![record(1, 100, "one"), record(2, 200, "two")];

        asm.write_feeds("INBOX", "inbox", &records).expect("first write");
        let xml_first = fs::read(asm.feed_path("inbox", "xml")).expect("read xml");
        let json_first = fs::read(asm.feed_path("inbox", "json")).expect("read json");

        asm.write_feeds("INBOX", "inbox", &records).expect("second write");
        let xml_second = fs::read(asm.feed_path("inbox", "xml")).expect("read xml");
        let json_second = fs::read(asm.feed_path("inbox", "json")).expect("read json");

        assert_eq!(xml_first, xml_second);
        assert_eq!(json_first, json_second);
    }

    #[test]
    fn window_truncates_to_max_items() {
        let dir = tempfile::tempdir().expect("tempdir");
        let asm = FeedAssembler::new(FeedConfig {
            output_dir: dir.path().to_path_buf(),
            max_items: 2,
            ..FeedConfig::default()
        });
        let records = vec![
            record(1, 100, "dropped"),
            record(2, 200, "kept-two"),
            record(3, 300, "kept-three"),
        ];
        asm.write_feeds("INBOX", "inbox", &records).expect("write feeds");

        let xml = fs::read_to_string(asm.feed_path("inbox", "xml")).expect("read xml");
        assert!(xml.contains("kept-three"));
        assert!(xml.contains("kept-two"));
        assert!(!xml.contains("dropped"));
    }

    #[test]
    fn empty_window_writes_valid_empty_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let asm = assembler(dir.path());
        asm.write_feeds("INBOX", "inbox", &[]).expect("write feeds");

        let xml = fs::read_to_string(asm.feed_path("inbox", "xml")).expect("read xml");
        assert!(xml.contains("<channel>"));
        assert!(!xml.contains("<item>"));
        assert!(!xml.contains("lastBuildDate"));

        let feed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(asm.feed_path("inbox", "json")).expect("read"))
                .expect("parse json");
        assert_eq!(feed["items"].as_array().expect("items array").len(), 0);
    }

    #[test]
    fn unwritable_output_directory_is_an_assembly_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file_path = dir.path().join("not-a-dir");
        fs::write(&file_path, b"x").expect("create file");
        let asm = assembler(&file_path);
        let err = asm
            .write_feeds("INBOX", "inbox", &[record(1, 100, "x")])
            .expect_err("should fail");
        assert!(matches!(err, SweepError::Assembly(_)));
    }
}
