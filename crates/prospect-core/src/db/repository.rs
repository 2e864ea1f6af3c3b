//! Entity repositories over the local store
//!
//! The repositories double as the change tracker's write side: every local
//! mutation maintains the row's `sync_status` bucket so that
//! [`crate::db::ChangeTracker`] can snapshot pending changes for a push.

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::models::{CallLog, Category, Lead, RecordId};

/// Local lifecycle bucket of a row since the last successful push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Synced,
    Created,
    Updated,
    Deleted,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "synced" => Ok(Self::Synced),
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "deleted" => Ok(Self::Deleted),
            other => Err(Error::InvalidInput(format!("Unknown sync status: {other}"))),
        }
    }
}

pub(crate) const LEAD_COLUMNS: &str = "id, name, location, phone, whatsapp_phone, note, status, \
     category_id, created_by, closed_at, closed_by, created_at, updated_at";

pub(crate) const CALL_LOG_COLUMNS: &str =
    "id, lead_id, called_by, log_note, call_date, created_at, updated_at";

pub(crate) const CATEGORY_COLUMNS: &str = "id, name, type, created_by, created_at, updated_at";

fn conversion_failure(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("invalid column value: {value}").into(),
    )
}

fn parse_text<T: FromStr>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let value: String = row.get(idx)?;
    value.parse().map_err(|_| conversion_failure(idx, &value))
}

fn parse_opt_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<RecordId>> {
    let value: Option<String> = row.get(idx)?;
    value
        .map(|raw| raw.parse().map_err(|_| conversion_failure(idx, &raw)))
        .transpose()
}

pub(crate) fn parse_lead(row: &Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: parse_text(row, 0)?,
        name: row.get(1)?,
        location: row.get(2)?,
        phone: row.get(3)?,
        whatsapp_phone: row.get(4)?,
        note: row.get(5)?,
        status: parse_text(row, 6)?,
        category_id: parse_opt_id(row, 7)?,
        created_by: parse_text(row, 8)?,
        closed_at: row.get(9)?,
        closed_by: parse_opt_id(row, 10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

pub(crate) fn parse_call_log(row: &Row<'_>) -> rusqlite::Result<CallLog> {
    Ok(CallLog {
        id: parse_text(row, 0)?,
        lead_id: parse_text(row, 1)?,
        called_by: parse_text(row, 2)?,
        log_note: row.get(3)?,
        call_date: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub(crate) fn parse_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: parse_text(row, 0)?,
        name: row.get(1)?,
        kind: parse_text(row, 2)?,
        created_by: parse_text(row, 3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Trait for lead storage operations
pub trait LeadRepository {
    /// Insert a locally created lead (pending push)
    fn create(&self, lead: &Lead) -> Result<()>;

    /// Get a lead by ID, excluding tombstoned rows
    fn get(&self, id: RecordId) -> Result<Option<Lead>>;

    /// List leads (excluding deleted), most recently updated first
    fn list(&self) -> Result<Vec<Lead>>;

    /// Overwrite a lead's fields, bumping `updated_at` (last write wins within a batch)
    fn update(&self, lead: &Lead) -> Result<Lead>;

    /// Delete a lead: tombstone if ever pushed, drop silently otherwise
    fn delete(&self, id: RecordId) -> Result<()>;
}

/// Trait for call log storage operations
pub trait CallLogRepository {
    /// Insert a locally created call log (pending push)
    fn create(&self, log: &CallLog) -> Result<()>;

    /// List call logs for a lead, most recent call first
    fn list_for_lead(&self, lead_id: RecordId) -> Result<Vec<CallLog>>;

    /// Delete a call log: tombstone if ever pushed, drop silently otherwise
    fn delete(&self, id: RecordId) -> Result<()>;
}

/// Trait for category storage operations
pub trait CategoryRepository {
    /// Insert a locally created category (pending push)
    fn create(&self, category: &Category) -> Result<()>;

    /// Get a category by ID, excluding tombstoned rows
    fn get(&self, id: RecordId) -> Result<Option<Category>>;

    /// List categories (excluding deleted), by name
    fn list(&self) -> Result<Vec<Category>>;

    /// Delete a category: tombstone if ever pushed, drop silently otherwise
    fn delete(&self, id: RecordId) -> Result<()>;
}

/// `SQLite` implementation of the entity repositories
pub struct SqliteLeadRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteLeadRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl LeadRepository for SqliteLeadRepository<'_> {
    fn create(&self, lead: &Lead) -> Result<()> {
        lead.validate_closure()?;

        self.conn.execute(
            "INSERT INTO leads (id, name, location, phone, whatsapp_phone, note, status, \
             category_id, created_by, closed_at, closed_by, created_at, updated_at, sync_status) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'created')",
            params![
                lead.id.as_str(),
                lead.name,
                lead.location,
                lead.phone,
                lead.whatsapp_phone,
                lead.note,
                lead.status.as_str(),
                lead.category_id.map(|id| id.as_str()),
                lead.created_by.as_str(),
                lead.closed_at,
                lead.closed_by.map(|id| id.as_str()),
                lead.created_at,
                lead.updated_at,
            ],
        )?;

        Ok(())
    }

    fn get(&self, id: RecordId) -> Result<Option<Lead>> {
        let lead = self
            .conn
            .query_row(
                &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ? AND deleted_at IS NULL"),
                params![id.as_str()],
                parse_lead,
            )
            .optional()?;

        Ok(lead)
    }

    fn list(&self) -> Result<Vec<Lead>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE deleted_at IS NULL ORDER BY updated_at DESC"
        ))?;

        let leads = stmt
            .query_map([], parse_lead)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(leads)
    }

    fn update(&self, lead: &Lead) -> Result<Lead> {
        lead.validate_closure()?;
        let now = chrono::Utc::now().timestamp_millis();

        // A never-pushed row stays in the created bucket; a synced one
        // becomes pending as updated.
        let rows = self.conn.execute(
            "UPDATE leads SET name = ?, location = ?, phone = ?, whatsapp_phone = ?, note = ?, \
             status = ?, category_id = ?, closed_at = ?, closed_by = ?, updated_at = ?, \
             sync_status = CASE sync_status WHEN 'created' THEN 'created' ELSE 'updated' END \
             WHERE id = ? AND deleted_at IS NULL",
            params![
                lead.name,
                lead.location,
                lead.phone,
                lead.whatsapp_phone,
                lead.note,
                lead.status.as_str(),
                lead.category_id.map(|id| id.as_str()),
                lead.closed_at,
                lead.closed_by.map(|id| id.as_str()),
                now,
                lead.id.as_str(),
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(lead.id.to_string()));
        }

        self.get(lead.id)?
            .ok_or_else(|| Error::NotFound(lead.id.to_string()))
    }

    fn delete(&self, id: RecordId) -> Result<()> {
        delete_row(self.conn, "leads", id)
    }
}

/// `SQLite` implementation of `CallLogRepository`
pub struct SqliteCallLogRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCallLogRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl CallLogRepository for SqliteCallLogRepository<'_> {
    fn create(&self, log: &CallLog) -> Result<()> {
        // The server re-validates against its own state; locally the lead
        // must at least exist and not be tombstoned.
        let lead_exists: i32 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM leads WHERE id = ? AND deleted_at IS NULL)",
            params![log.lead_id.as_str()],
            |row| row.get(0),
        )?;
        if lead_exists == 0 {
            return Err(Error::NotFound(log.lead_id.to_string()));
        }

        self.conn.execute(
            "INSERT INTO call_logs (id, lead_id, called_by, log_note, call_date, created_at, \
             updated_at, sync_status) VALUES (?, ?, ?, ?, ?, ?, ?, 'created')",
            params![
                log.id.as_str(),
                log.lead_id.as_str(),
                log.called_by.as_str(),
                log.log_note,
                log.call_date,
                log.created_at,
                log.updated_at,
            ],
        )?;

        Ok(())
    }

    fn list_for_lead(&self, lead_id: RecordId) -> Result<Vec<CallLog>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CALL_LOG_COLUMNS} FROM call_logs \
             WHERE lead_id = ? AND deleted_at IS NULL ORDER BY call_date DESC"
        ))?;

        let logs = stmt
            .query_map(params![lead_id.as_str()], parse_call_log)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(logs)
    }

    fn delete(&self, id: RecordId) -> Result<()> {
        delete_row(self.conn, "call_logs", id)
    }
}

/// `SQLite` implementation of `CategoryRepository`
pub struct SqliteCategoryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCategoryRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl CategoryRepository for SqliteCategoryRepository<'_> {
    fn create(&self, category: &Category) -> Result<()> {
        self.conn.execute(
            "INSERT INTO categories (id, name, type, created_by, created_at, updated_at, \
             sync_status) VALUES (?, ?, ?, ?, ?, ?, 'created')",
            params![
                category.id.as_str(),
                category.name,
                category.kind.as_str(),
                category.created_by.as_str(),
                category.created_at,
                category.updated_at,
            ],
        )?;

        Ok(())
    }

    fn get(&self, id: RecordId) -> Result<Option<Category>> {
        let category = self
            .conn
            .query_row(
                &format!(
                    "SELECT {CATEGORY_COLUMNS} FROM categories \
                     WHERE id = ? AND deleted_at IS NULL"
                ),
                params![id.as_str()],
                parse_category,
            )
            .optional()?;

        Ok(category)
    }

    fn list(&self) -> Result<Vec<Category>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE deleted_at IS NULL ORDER BY name"
        ))?;

        let categories = stmt
            .query_map([], parse_category)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(categories)
    }

    fn delete(&self, id: RecordId) -> Result<()> {
        delete_row(self.conn, "categories", id)
    }
}

/// Shared delete path: a row that was never pushed is dropped outright (it
/// must not be pushed as a delete); anything else becomes a pending tombstone.
fn delete_row(conn: &Connection, table: &str, id: RecordId) -> Result<()> {
    let status: Option<String> = conn
        .query_row(
            &format!("SELECT sync_status FROM {table} WHERE id = ? AND deleted_at IS NULL"),
            params![id.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    let Some(status) = status else {
        return Err(Error::NotFound(id.to_string()));
    };

    if status == SyncStatus::Created.as_str() {
        conn.execute(
            &format!("DELETE FROM {table} WHERE id = ?"),
            params![id.as_str()],
        )?;
    } else {
        let now = chrono::Utc::now().timestamp_millis();
        conn.execute(
            &format!("UPDATE {table} SET deleted_at = ?, sync_status = 'deleted' WHERE id = ?"),
            params![now, id.as_str()],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::Database;
    use crate::models::CategoryType;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn sample_lead() -> Lead {
        Lead::new(
            "Asha Traders",
            "Mumbai",
            "9876543210",
            "9876543210",
            None,
            RecordId::new(),
        )
    }

    fn row_status(db: &Database, table: &str, id: RecordId) -> Option<String> {
        db.connection()
            .query_row(
                &format!("SELECT sync_status FROM {table} WHERE id = ?"),
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .unwrap()
    }

    #[test]
    fn test_create_and_get() {
        let db = setup();
        let repo = SqliteLeadRepository::new(db.connection());

        let lead = sample_lead();
        repo.create(&lead).unwrap();

        let fetched = repo.get(lead.id).unwrap().unwrap();
        assert_eq!(fetched, lead);
        assert_eq!(row_status(&db, "leads", lead.id), Some("created".to_string()));
    }

    #[test]
    fn test_update_keeps_created_bucket() {
        let db = setup();
        let repo = SqliteLeadRepository::new(db.connection());

        let mut lead = sample_lead();
        repo.create(&lead).unwrap();

        lead.note = Some("call back tuesday".to_string());
        let updated = repo.update(&lead).unwrap();

        assert_eq!(updated.note.as_deref(), Some("call back tuesday"));
        assert!(updated.updated_at >= lead.created_at);
        // Never-pushed rows must not migrate into the updated bucket
        assert_eq!(row_status(&db, "leads", lead.id), Some("created".to_string()));
    }

    #[test]
    fn test_update_synced_row_becomes_pending() {
        let db = setup();
        let repo = SqliteLeadRepository::new(db.connection());

        let mut lead = sample_lead();
        repo.create(&lead).unwrap();
        db.connection()
            .execute(
                "UPDATE leads SET sync_status = 'synced' WHERE id = ?",
                params![lead.id.as_str()],
            )
            .unwrap();

        lead.location = "Pune".to_string();
        repo.update(&lead).unwrap();
        assert_eq!(row_status(&db, "leads", lead.id), Some("updated".to_string()));
    }

    #[test]
    fn test_delete_never_pushed_drops_row() {
        let db = setup();
        let repo = SqliteLeadRepository::new(db.connection());

        let lead = sample_lead();
        repo.create(&lead).unwrap();
        repo.delete(lead.id).unwrap();

        assert!(repo.get(lead.id).unwrap().is_none());
        // Physically gone, not tombstoned
        assert_eq!(row_status(&db, "leads", lead.id), None);
    }

    #[test]
    fn test_delete_synced_row_tombstones() {
        let db = setup();
        let repo = SqliteLeadRepository::new(db.connection());

        let lead = sample_lead();
        repo.create(&lead).unwrap();
        db.connection()
            .execute(
                "UPDATE leads SET sync_status = 'synced' WHERE id = ?",
                params![lead.id.as_str()],
            )
            .unwrap();

        repo.delete(lead.id).unwrap();

        assert!(repo.get(lead.id).unwrap().is_none());
        assert!(repo.list().unwrap().is_empty());
        assert_eq!(row_status(&db, "leads", lead.id), Some("deleted".to_string()));
    }

    #[test]
    fn test_update_missing_lead() {
        let db = setup();
        let repo = SqliteLeadRepository::new(db.connection());

        let lead = sample_lead();
        assert!(matches!(repo.update(&lead), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_create_rejects_closure_violation() {
        let db = setup();
        let repo = SqliteLeadRepository::new(db.connection());

        let mut lead = sample_lead();
        lead.status = crate::models::LeadStatus::Closed;
        assert!(matches!(repo.create(&lead), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_call_log_requires_live_lead() {
        let db = setup();
        let leads = SqliteLeadRepository::new(db.connection());
        let logs = SqliteCallLogRepository::new(db.connection());

        let lead = sample_lead();
        leads.create(&lead).unwrap();

        let log = CallLog::new(lead.id, RecordId::new(), "no answer", None);
        logs.create(&log).unwrap();
        assert_eq!(logs.list_for_lead(lead.id).unwrap().len(), 1);

        let orphan = CallLog::new(RecordId::new(), RecordId::new(), "ghost", None);
        assert!(matches!(logs.create(&orphan), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_categories_listed_by_name() {
        let db = setup();
        let repo = SqliteCategoryRepository::new(db.connection());

        let owner = RecordId::new();
        repo.create(&Category::new("Rejected", CategoryType::Rejected, owner))
            .unwrap();
        repo.create(&Category::new("Converted", CategoryType::Converted, owner))
            .unwrap();

        let names: Vec<String> = repo.list().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Converted", "Rejected"]);
    }
}
