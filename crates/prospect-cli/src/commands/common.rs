use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::params;
use serde::Serialize;

use prospect_core::db::{
    AuthSession, Database, LeadRepository, SessionRepository, SqliteCategoryRepository,
    SqliteLeadRepository, SqliteSessionRepository,
};
use prospect_core::db::CategoryRepository;
use prospect_core::models::{Category, Lead, RecordId};

use crate::error::CliError;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

#[derive(Debug, Serialize)]
pub struct LeadListItem {
    pub id: String,
    pub name: String,
    pub location: String,
    pub phone: String,
    pub status: String,
    pub note: Option<String>,
    pub updated_at: i64,
    pub relative_time: String,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("PROSPECT_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("prospect")
        .join("prospect.db")
}

pub fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(path)?)
}

/// The stored session, or a friendly error when there is none
pub fn require_session(db: &Database) -> Result<AuthSession, CliError> {
    SqliteSessionRepository::new(db.connection())
        .session()?
        .ok_or(CliError::NotLoggedIn)
}

/// Server URL precedence: --server flag, then the URL captured at login,
/// then the environment, then the local default.
pub fn resolve_server_url(flag: Option<&str>, db: &Database) -> Result<String, CliError> {
    if let Some(url) = flag {
        return Ok(url.to_string());
    }
    if let Some(url) = SqliteSessionRepository::new(db.connection()).server_url()? {
        return Ok(url);
    }
    Ok(env::var("PROSPECT_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string()))
}

pub fn resolve_lead(db: &Database, query: &str) -> Result<Lead, CliError> {
    let repo = SqliteLeadRepository::new(db.connection());

    if let Ok(id) = query.parse::<RecordId>() {
        if let Some(lead) = repo.get(id)? {
            return Ok(lead);
        }
    }

    let matching = ids_by_prefix(db, "leads", query)?;
    match matching.len() {
        0 => Err(CliError::LeadNotFound(query.to_string())),
        1 => repo
            .get(matching[0])?
            .ok_or_else(|| CliError::LeadNotFound(query.to_string())),
        _ => Err(ambiguous(query, &matching)),
    }
}

/// Categories resolve by exact id, then case-insensitive name, then id prefix
pub fn resolve_category(db: &Database, query: &str) -> Result<Category, CliError> {
    let repo = SqliteCategoryRepository::new(db.connection());

    if let Ok(id) = query.parse::<RecordId>() {
        if let Some(category) = repo.get(id)? {
            return Ok(category);
        }
    }

    if let Some(category) = repo
        .list()?
        .into_iter()
        .find(|category| category.name.eq_ignore_ascii_case(query))
    {
        return Ok(category);
    }

    let matching = ids_by_prefix(db, "categories", query)?;
    match matching.len() {
        0 => Err(CliError::CategoryNotFound(query.to_string())),
        1 => repo
            .get(matching[0])?
            .ok_or_else(|| CliError::CategoryNotFound(query.to_string())),
        _ => Err(ambiguous(query, &matching)),
    }
}

fn ids_by_prefix(db: &Database, table: &str, prefix: &str) -> Result<Vec<RecordId>, CliError> {
    let mut stmt = db.connection().prepare(&format!(
        "SELECT id FROM {table} \
         WHERE deleted_at IS NULL AND id LIKE ? ORDER BY updated_at DESC LIMIT 3"
    ))?;

    let ids = stmt
        .query_map(params![format!("{prefix}%")], |row| {
            let raw: String = row.get(0)?;
            raw.parse().map_err(|_| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    format!("invalid row id: {raw}").into(),
                )
            })
        })?
        .collect::<rusqlite::Result<Vec<RecordId>>>()?;

    Ok(ids)
}

fn ambiguous(query: &str, matching: &[RecordId]) -> CliError {
    let options = matching
        .iter()
        .map(|id| short_id(&id.to_string()))
        .collect::<Vec<_>>()
        .join(", ");
    CliError::AmbiguousId(format!(
        "ID prefix '{query}' is ambiguous; matches: {options}"
    ))
}

pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

pub fn format_lead_lines(leads: &[Lead]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    leads
        .iter()
        .map(|lead| {
            let id = short_id(&lead.id.to_string());
            let relative_time = format_relative_time(lead.updated_at, now_ms);
            format!(
                "{id:<8}  {:<24}  {:<14}  {:<6}  {relative_time}",
                truncate(&lead.name, 24),
                truncate(&lead.location, 14),
                lead.status.as_str(),
            )
        })
        .collect()
}

pub fn lead_to_list_item(lead: &Lead) -> LeadListItem {
    let now_ms = Utc::now().timestamp_millis();
    LeadListItem {
        id: lead.id.to_string(),
        name: lead.name.clone(),
        location: lead.location.clone(),
        phone: lead.phone.clone(),
        status: lead.status.as_str().to_string(),
        note: lead.note.clone(),
        updated_at: lead.updated_at,
        relative_time: format_relative_time(lead.updated_at, now_ms),
    }
}

pub fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = value.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}
