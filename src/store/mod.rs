//! Persisted dedup ledger backed by SQLite.
//!
//! A single `Connection` lives on a dedicated thread; `LedgerHandle` is the
//! cloneable async facade the rest of the crate uses.

mod commands;
mod handle;
mod queries;
mod schema;

pub use handle::LedgerHandle;
