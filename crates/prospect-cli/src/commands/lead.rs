use std::path::Path;

use prospect_core::db::{LeadRepository, SqliteLeadRepository};
use prospect_core::models::Lead;

use crate::commands::common::{
    format_lead_lines, lead_to_list_item, open_database, require_session, resolve_category,
    resolve_lead, short_id, LeadListItem,
};
use crate::error::CliError;

pub fn run_add(
    name: &str,
    location: &str,
    phone: &str,
    whatsapp: Option<&str>,
    note: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let session = require_session(&db)?;

    let lead = Lead::new(
        name,
        location,
        phone,
        whatsapp.unwrap_or(phone),
        note.map(ToString::to_string),
        session.user_id,
    );
    SqliteLeadRepository::new(db.connection()).create(&lead)?;

    println!("{}", lead.id);
    Ok(())
}

pub fn run_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let leads = SqliteLeadRepository::new(db.connection()).list()?;

    if as_json {
        let items = leads.iter().map(lead_to_list_item).collect::<Vec<LeadListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_lead_lines(&leads) {
            println!("{line}");
        }
    }

    Ok(())
}

pub fn run_close(id: &str, category: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let session = require_session(&db)?;

    let mut lead = resolve_lead(&db, id)?;
    let category = resolve_category(&db, category)?;

    lead.close(category.id, session.user_id);
    SqliteLeadRepository::new(db.connection()).update(&lead)?;

    println!("Closed {} with {}", short_id(&lead.id.to_string()), category.name);
    Ok(())
}

pub fn run_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let lead = resolve_lead(&db, id)?;

    SqliteLeadRepository::new(db.connection()).delete(lead.id)?;
    println!("{}", lead.id);
    Ok(())
}
