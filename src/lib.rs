//! mailfeed — polls IMAP folders and republishes messages as RSS 2.0 and
//! JSON Feed 1.1 documents.
//!
//! The pipeline per folder: list envelopes newer than the ledger watermark,
//! dedup against the ledger, normalize each body into bounded HTML and
//! text, commit, then regenerate both feed documents from the retained
//! window.

pub mod config;
pub mod error;
pub mod feed;
pub mod keyring;
pub mod mail;
pub mod models;
pub mod normalize;
pub mod store;
pub mod summarize;
pub mod sweep;
