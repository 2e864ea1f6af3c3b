//! Post-round-trip apply
//!
//! Everything here runs inside one transaction: settle the pushed buckets,
//! fold the pull delta into the local store, advance the watermark. A crash
//! mid-apply rolls back to the pre-cycle state and the next cycle re-pushes
//! the same snapshot.

use rusqlite::{params, Connection};

use crate::db::{SessionRepository, SqliteSessionRepository};
use crate::error::Result;
use crate::models::{CallLog, Category, Lead, RecordId};
use crate::protocol::{canonical_id, SyncChanges, SyncResponse};

pub(super) fn apply_round_trip(
    conn: &Connection,
    actor_id: RecordId,
    pushed: &SyncChanges,
    response: &SyncResponse,
) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    settle_pushed(&tx, actor_id, pushed)?;
    apply_pulled(&tx, &response.changes, response.timestamp)?;
    advance_watermark(&tx, response.timestamp)?;

    tx.commit()?;
    Ok(())
}

fn settle_pushed(conn: &Connection, actor: RecordId, pushed: &SyncChanges) -> Result<()> {
    for category in &pushed.categories.created {
        settle_created(
            conn,
            "categories",
            actor,
            category.id,
            category.updated_at,
            &[("leads", "category_id")],
        )?;
    }
    for lead in &pushed.leads.created {
        settle_created(
            conn,
            "leads",
            actor,
            lead.id,
            lead.updated_at,
            &[("call_logs", "lead_id")],
        )?;
    }
    for log in &pushed.call_logs.created {
        settle_created(conn, "call_logs", actor, log.id, log.updated_at, &[])?;
    }

    for lead in &pushed.leads.updated {
        settle_updated(conn, "leads", lead.id, lead.updated_at)?;
    }

    for id in &pushed.leads.deleted {
        settle_deleted(conn, "leads", *id)?;
    }
    for id in &pushed.call_logs.deleted {
        settle_deleted(conn, "call_logs", *id)?;
    }
    for id in &pushed.categories.deleted {
        settle_deleted(conn, "categories", *id)?;
    }

    Ok(())
}

/// Rewrite a pushed provisional id to the canonical id the server assigned,
/// then fix up rows that reference it. A row edited while the push was in
/// flight has a newer `updated_at` than the snapshot and stays pending.
fn settle_created(
    conn: &Connection,
    table: &str,
    actor: RecordId,
    provisional: RecordId,
    pushed_at: i64,
    references: &[(&str, &str)],
) -> Result<()> {
    let canonical = canonical_id(actor, provisional);

    conn.execute(
        &format!(
            "UPDATE {table} SET id = ?, \
             sync_status = CASE WHEN updated_at = ? THEN 'synced' ELSE 'updated' END \
             WHERE id = ?"
        ),
        params![canonical.as_str(), pushed_at, provisional.as_str()],
    )?;

    for (ref_table, ref_column) in references {
        conn.execute(
            &format!("UPDATE {ref_table} SET {ref_column} = ? WHERE {ref_column} = ?"),
            params![canonical.as_str(), provisional.as_str()],
        )?;
    }

    Ok(())
}

fn settle_updated(conn: &Connection, table: &str, id: RecordId, pushed_at: i64) -> Result<()> {
    conn.execute(
        &format!(
            "UPDATE {table} SET sync_status = 'synced' \
             WHERE id = ? AND sync_status = 'updated' AND updated_at = ?"
        ),
        params![id.as_str(), pushed_at],
    )?;
    Ok(())
}

fn settle_deleted(conn: &Connection, table: &str, id: RecordId) -> Result<()> {
    conn.execute(
        &format!("UPDATE {table} SET sync_status = 'synced' WHERE id = ? AND sync_status = 'deleted'"),
        params![id.as_str()],
    )?;
    Ok(())
}

fn apply_pulled(conn: &Connection, changes: &SyncChanges, timestamp: i64) -> Result<()> {
    // Categories before leads before call logs, so referenced rows exist
    for category in changes
        .categories
        .created
        .iter()
        .chain(&changes.categories.updated)
    {
        upsert_category(conn, category)?;
    }
    for lead in changes.leads.created.iter().chain(&changes.leads.updated) {
        upsert_lead(conn, lead)?;
    }
    for log in changes
        .call_logs
        .created
        .iter()
        .chain(&changes.call_logs.updated)
    {
        upsert_call_log(conn, log)?;
    }

    for id in &changes.leads.deleted {
        tombstone(conn, "leads", *id, timestamp)?;
    }
    for id in &changes.call_logs.deleted {
        tombstone(conn, "call_logs", *id, timestamp)?;
    }
    for id in &changes.categories.deleted {
        tombstone(conn, "categories", *id, timestamp)?;
    }

    Ok(())
}

/// Upsert a pulled lead. Rows with pending local changes are left alone so
/// an unpushed edit is not clobbered by a stale pull.
fn upsert_lead(conn: &Connection, lead: &Lead) -> Result<()> {
    conn.execute(
        "INSERT INTO leads (id, name, location, phone, whatsapp_phone, note, status, \
         category_id, created_by, closed_at, closed_by, created_at, updated_at, \
         deleted_at, sync_status) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, 'synced') \
         ON CONFLICT(id) DO UPDATE SET \
         name = excluded.name, location = excluded.location, phone = excluded.phone, \
         whatsapp_phone = excluded.whatsapp_phone, note = excluded.note, \
         status = excluded.status, category_id = excluded.category_id, \
         created_by = excluded.created_by, closed_at = excluded.closed_at, \
         closed_by = excluded.closed_by, created_at = excluded.created_at, \
         updated_at = excluded.updated_at, deleted_at = NULL, sync_status = 'synced' \
         WHERE leads.sync_status = 'synced'",
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

fn upsert_call_log(conn: &Connection, log: &CallLog) -> Result<()> {
    conn.execute(
        "INSERT INTO call_logs (id, lead_id, called_by, log_note, call_date, created_at, \
         updated_at, deleted_at, sync_status) \
         VALUES (?, ?, ?, ?, ?, ?, ?, NULL, 'synced') \
         ON CONFLICT(id) DO UPDATE SET \
         lead_id = excluded.lead_id, called_by = excluded.called_by, \
         log_note = excluded.log_note, call_date = excluded.call_date, \
         created_at = excluded.created_at, updated_at = excluded.updated_at, \
         deleted_at = NULL, sync_status = 'synced' \
         WHERE call_logs.sync_status = 'synced'",
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

fn upsert_category(conn: &Connection, category: &Category) -> Result<()> {
    conn.execute(
        "INSERT INTO categories (id, name, type, created_by, created_at, updated_at, \
         deleted_at, sync_status) \
         VALUES (?, ?, ?, ?, ?, ?, NULL, 'synced') \
         ON CONFLICT(id) DO UPDATE SET \
         name = excluded.name, type = excluded.type, created_by = excluded.created_by, \
         created_at = excluded.created_at, updated_at = excluded.updated_at, \
         deleted_at = NULL, sync_status = 'synced' \
         WHERE categories.sync_status = 'synced'",
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

/// A pulled delete wins over any local state except an already-tombstoned row
fn tombstone(conn: &Connection, table: &str, id: RecordId, timestamp: i64) -> Result<()> {
    conn.execute(
        &format!(
            "UPDATE {table} SET deleted_at = ?, sync_status = 'synced' \
             WHERE id = ? AND deleted_at IS NULL"
        ),
        params![timestamp, id.as_str()],
    )?;
    Ok(())
}

fn advance_watermark(conn: &Connection, timestamp: i64) -> Result<()> {
    let sessions = SqliteSessionRepository::new(conn);
    let current = sessions.last_pulled_at()?.unwrap_or(0);
    sessions.set_last_pulled_at(timestamp.max(current))
}
