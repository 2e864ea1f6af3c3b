//! Change tracker: snapshot of local mutations pending a push
//!
//! The write side lives in the repositories (they maintain `sync_status`);
//! this reads the accumulated buckets back out as wire change sets. Buffers
//! are cleared only inside the post-round-trip apply transaction, so a failed
//! cycle or a crash re-pushes the same set (at-least-once).

use rusqlite::{params, Connection, Row};

use crate::error::Result;
use crate::models::RecordId;
use crate::protocol::{ChangeSet, SyncChanges};

use super::repository::{
    parse_call_log, parse_category, parse_lead, SyncStatus, CALL_LOG_COLUMNS, CATEGORY_COLUMNS,
    LEAD_COLUMNS,
};

/// Reads pending local changes for all three collections
pub struct ChangeTracker<'a> {
    conn: &'a Connection,
}

impl<'a> ChangeTracker<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Snapshot the pending change sets without consuming them
    pub fn pending(&self) -> Result<SyncChanges> {
        Ok(SyncChanges {
            leads: self.collect("leads", LEAD_COLUMNS, parse_lead)?,
            call_logs: self.collect("call_logs", CALL_LOG_COLUMNS, parse_call_log)?,
            categories: self.collect("categories", CATEGORY_COLUMNS, parse_category)?,
        })
    }

    /// True when any collection has something to push
    pub fn has_pending(&self) -> Result<bool> {
        Ok(!self.pending()?.is_empty())
    }

    fn collect<T>(
        &self,
        table: &str,
        columns: &str,
        parse: impl Fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<ChangeSet<T>> {
        Ok(ChangeSet {
            created: self.rows(table, columns, SyncStatus::Created, &parse)?,
            updated: self.rows(table, columns, SyncStatus::Updated, &parse)?,
            deleted: self.deleted_ids(table)?,
        })
    }

    fn rows<T>(
        &self,
        table: &str,
        columns: &str,
        status: SyncStatus,
        parse: impl Fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {columns} FROM {table} \
             WHERE sync_status = ? AND deleted_at IS NULL ORDER BY updated_at"
        ))?;

        let rows = stmt
            .query_map(params![status.as_str()], |row| parse(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    fn deleted_ids(&self, table: &str) -> Result<Vec<RecordId>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT id FROM {table} WHERE sync_status = 'deleted' ORDER BY deleted_at"
            ))?;

        let ids = stmt
            .query_map([], |row| {
                let raw: String = row.get(0)?;
                raw.parse().map_err(|_| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        format!("invalid row id: {raw}").into(),
                    )
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ids)
    }
}
