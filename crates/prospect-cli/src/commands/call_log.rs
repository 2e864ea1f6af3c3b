use std::path::Path;

use chrono::Utc;
use prospect_core::db::{CallLogRepository, SqliteCallLogRepository};
use prospect_core::models::CallLog;

use crate::commands::common::{
    format_relative_time, open_database, require_session, resolve_lead, short_id,
};
use crate::error::CliError;

pub fn run_add(
    lead_query: &str,
    note: &str,
    date: Option<i64>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let session = require_session(&db)?;
    let lead = resolve_lead(&db, lead_query)?;

    let log = CallLog::new(lead.id, session.user_id, note, date);
    SqliteCallLogRepository::new(db.connection()).create(&log)?;

    println!("{}", log.id);
    Ok(())
}

pub fn run_list(lead_query: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let lead = resolve_lead(&db, lead_query)?;
    let logs = SqliteCallLogRepository::new(db.connection()).list_for_lead(lead.id)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&logs)?);
    } else {
        let now_ms = Utc::now().timestamp_millis();
        for log in &logs {
            println!(
                "{:<8}  {:<10}  {}",
                short_id(&log.id.to_string()),
                format_relative_time(log.call_date, now_ms),
                log.log_note,
            );
        }
    }

    Ok(())
}
