//! Core library for Prospect, a lead-tracking CRM with offline-first sync.
//!
//! Holds the shared data models, the local `SQLite` store with its change
//! tracking, the wire protocol types, and the sync engine used by every
//! client frontend.

pub mod db;
pub mod error;
pub mod models;
pub mod protocol;
pub mod sync;

pub use db::Database;
pub use error::{Error, Result};
pub use models::{Actor, CallLog, Category, CategoryType, Lead, LeadStatus, RecordId, Role};
pub use sync::{SyncEngine, SyncOutcome};
