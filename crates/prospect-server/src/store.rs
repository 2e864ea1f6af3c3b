//! Authoritative server store
//!
//! Same entity shape as the client store, without the `sync_status` bucket
//! (the server has nothing to push) and with the user table that backs the
//! auth endpoints. Tombstones are kept forever so deletes reach every peer.

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use prospect_core::models::{CallLog, Category, Lead, RecordId, Role};

use crate::error::AppError;

const CURRENT_VERSION: i64 = 1;

const LEAD_COLUMNS: &str = "id, name, location, phone, whatsapp_phone, note, status, \
     category_id, created_by, closed_at, closed_by, created_at, updated_at";

const CALL_LOG_COLUMNS: &str =
    "id, lead_id, called_by, log_note, call_date, created_at, updated_at";

const CATEGORY_COLUMNS: &str = "id, name, type, created_by, created_at, updated_at";

/// A registered account; the source of verified [`prospect_core::models::Actor`]s
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: RecordId,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub created_at: i64,
    pub updated_at: i64,
}

impl std::fmt::Debug for User {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("name", &self.name)
            .field("role", &self.role)
            .finish()
    }
}

pub struct ServerStore {
    conn: Connection,
}

impl ServerStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, AppError> {
        conn.query_row("PRAGMA journal_mode = WAL", [], |_row| Ok(()))
            .ok();
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), AppError> {
        let version = self.schema_version()?;
        if version >= CURRENT_VERSION {
            return Ok(());
        }

        tracing::info!(from = version, to = CURRENT_VERSION, "running migrations");
        let tx = self.conn.unchecked_transaction()?;
        let statements = [
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                name TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'viewer',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS leads (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                location TEXT NOT NULL,
                phone TEXT NOT NULL,
                whatsapp_phone TEXT NOT NULL,
                note TEXT,
                status TEXT NOT NULL DEFAULT 'open',
                category_id TEXT,
                created_by TEXT NOT NULL,
                closed_at INTEGER,
                closed_by TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )",
            "CREATE TABLE IF NOT EXISTS call_logs (
                id TEXT PRIMARY KEY,
                lead_id TEXT NOT NULL,
                called_by TEXT NOT NULL,
                log_note TEXT NOT NULL,
                call_date INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )",
            "CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                created_by TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_leads_updated_at ON leads (updated_at)",
            "CREATE INDEX IF NOT EXISTS idx_call_logs_updated_at ON call_logs (updated_at)",
            "CREATE INDEX IF NOT EXISTS idx_call_logs_lead_id ON call_logs (lead_id)",
            "CREATE INDEX IF NOT EXISTS idx_categories_updated_at ON categories (updated_at)",
        ];
        for statement in statements {
            tx.execute(statement, [])?;
        }
        tx.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?, ?)",
            params![CURRENT_VERSION, chrono::Utc::now().timestamp_millis()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn schema_version(&self) -> Result<i64, AppError> {
        let exists: i32 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
            [],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Ok(0);
        }

        let version: Option<i64> =
            self.conn
                .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                    row.get(0)
                })?;
        Ok(version.unwrap_or(0))
    }

    // --- users ---

    pub fn create_user(&self, user: &User) -> Result<(), AppError> {
        self.conn.execute(
            "INSERT INTO users (id, email, password_hash, name, role, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                user.id.as_str(),
                user.email,
                user.password_hash,
                user.name,
                user.role.as_str(),
                user.created_at,
                user.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = self
            .conn
            .query_row(
                "SELECT id, email, password_hash, name, role, created_at, updated_at \
                 FROM users WHERE email = ?",
                params![email],
                parse_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn user_by_id(&self, id: RecordId) -> Result<Option<User>, AppError> {
        let user = self
            .conn
            .query_row(
                "SELECT id, email, password_hash, name, role, created_at, updated_at \
                 FROM users WHERE id = ?",
                params![id.as_str()],
                parse_user,
            )
            .optional()?;
        Ok(user)
    }

    // --- leads ---

    pub fn get_lead(&self, id: RecordId) -> Result<Option<Lead>, AppError> {
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

    pub fn lead_exists(&self, id: RecordId) -> Result<bool, AppError> {
        let exists: i32 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM leads WHERE id = ? AND deleted_at IS NULL)",
            params![id.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists != 0)
    }

    /// Insert a lead unless the id already exists (idempotent re-push)
    pub fn insert_lead_if_absent(&self, lead: &Lead) -> Result<bool, AppError> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO leads (id, name, location, phone, whatsapp_phone, note, \
             status, category_id, created_by, closed_at, closed_by, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
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
        Ok(rows > 0)
    }

    /// Overwrite a live lead's mutable fields, stamping `updated_at` with
    /// server time. `created_by` is immutable.
    pub fn update_lead(&self, lead: &Lead, now: i64) -> Result<bool, AppError> {
        let rows = self.conn.execute(
            "UPDATE leads SET name = ?, location = ?, phone = ?, whatsapp_phone = ?, note = ?, \
             status = ?, category_id = ?, closed_at = ?, closed_by = ?, updated_at = ? \
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
        Ok(rows > 0)
    }

    pub fn tombstone_lead(&self, id: RecordId, now: i64) -> Result<bool, AppError> {
        let rows = self.conn.execute(
            "UPDATE leads SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
            params![now, now, id.as_str()],
        )?;
        Ok(rows > 0)
    }

    // --- call logs ---

    pub fn insert_call_log_if_absent(&self, log: &CallLog) -> Result<bool, AppError> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO call_logs (id, lead_id, called_by, log_note, call_date, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
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
        Ok(rows > 0)
    }

    // --- categories ---

    pub fn get_category(&self, id: RecordId) -> Result<Option<Category>, AppError> {
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

    pub fn insert_category_if_absent(&self, category: &Category) -> Result<bool, AppError> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO categories (id, name, type, created_by, created_at, \
             updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                category.id.as_str(),
                category.name,
                category.kind.as_str(),
                category.created_by.as_str(),
                category.created_at,
                category.updated_at,
            ],
        )?;
        Ok(rows > 0)
    }

    pub fn tombstone_category(&self, id: RecordId, now: i64) -> Result<bool, AppError> {
        let rows = self.conn.execute(
            "UPDATE categories SET deleted_at = ?, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL",
            params![now, now, id.as_str()],
        )?;
        Ok(rows > 0)
    }

    // --- pull delta ---

    pub fn leads_changed_since(&self, watermark: i64) -> Result<Vec<Lead>, AppError> {
        self.changed_since("leads", LEAD_COLUMNS, watermark, parse_lead)
    }

    pub fn call_logs_changed_since(&self, watermark: i64) -> Result<Vec<CallLog>, AppError> {
        self.changed_since("call_logs", CALL_LOG_COLUMNS, watermark, parse_call_log)
    }

    pub fn categories_changed_since(&self, watermark: i64) -> Result<Vec<Category>, AppError> {
        self.changed_since("categories", CATEGORY_COLUMNS, watermark, parse_category)
    }

    pub fn deleted_ids_since(
        &self,
        table: &str,
        watermark: i64,
    ) -> Result<Vec<RecordId>, AppError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id FROM {table} WHERE deleted_at > ? ORDER BY deleted_at"
        ))?;

        let ids = stmt
            .query_map(params![watermark], |row| parse_id(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn changed_since<T>(
        &self,
        table: &str,
        columns: &str,
        watermark: i64,
        parse: impl Fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>, AppError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {columns} FROM {table} \
             WHERE updated_at > ? AND deleted_at IS NULL ORDER BY updated_at"
        ))?;

        let rows = stmt
            .query_map(params![watermark], |row| parse(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn conversion_failure(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("invalid column value: {value}").into(),
    )
}

fn parse_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<RecordId> {
    let value: String = row.get(idx)?;
    value.parse().map_err(|_| conversion_failure(idx, &value))
}

fn parse_opt_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<RecordId>> {
    let value: Option<String> = row.get(idx)?;
    value
        .map(|raw| raw.parse().map_err(|_| conversion_failure(idx, &raw)))
        .transpose()
}

fn parse_text<T: std::str::FromStr>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let value: String = row.get(idx)?;
    value.parse().map_err(|_| conversion_failure(idx, &value))
}

fn parse_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_id(row, 0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        name: row.get(3)?,
        role: parse_text(row, 4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn parse_lead(row: &Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: parse_id(row, 0)?,
        name: row.get(1)?,
        location: row.get(2)?,
        phone: row.get(3)?,
        whatsapp_phone: row.get(4)?,
        note: row.get(5)?,
        status: parse_text(row, 6)?,
        category_id: parse_opt_id(row, 7)?,
        created_by: parse_id(row, 8)?,
        closed_at: row.get(9)?,
        closed_by: parse_opt_id(row, 10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn parse_call_log(row: &Row<'_>) -> rusqlite::Result<CallLog> {
    Ok(CallLog {
        id: parse_id(row, 0)?,
        lead_id: parse_id(row, 1)?,
        called_by: parse_id(row, 2)?,
        log_note: row.get(3)?,
        call_date: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn parse_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: parse_id(row, 0)?,
        name: row.get(1)?,
        kind: parse_text(row, 2)?,
        created_by: parse_id(row, 3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
