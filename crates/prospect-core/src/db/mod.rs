//! Local database layer for Prospect

mod changes;
mod connection;
mod migrations;
mod repository;
mod session;

pub use changes::ChangeTracker;
pub use connection::Database;
pub use repository::{
    CallLogRepository, CategoryRepository, LeadRepository, SqliteCallLogRepository,
    SqliteCategoryRepository, SqliteLeadRepository, SyncStatus,
};
pub use session::{AuthSession, SessionRepository, SqliteSessionRepository};
