use std::path::Path;

use prospect_core::db::{CategoryRepository, SqliteCategoryRepository};
use prospect_core::models::{Category, CategoryType};

use crate::commands::common::{open_database, require_session, resolve_category, short_id};
use crate::error::CliError;

pub fn run_add(name: &str, kind: CategoryType, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let session = require_session(&db)?;

    let category = Category::new(name, kind, session.user_id);
    SqliteCategoryRepository::new(db.connection()).create(&category)?;

    println!("{}", category.id);
    Ok(())
}

pub fn run_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let categories = SqliteCategoryRepository::new(db.connection()).list()?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&categories)?);
    } else {
        for category in &categories {
            println!(
                "{:<8}  {:<24}  {}",
                short_id(&category.id.to_string()),
                category.name,
                category.kind,
            );
        }
    }

    Ok(())
}

pub fn run_delete(query: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let category = resolve_category(&db, query)?;

    SqliteCategoryRepository::new(db.connection()).delete(category.id)?;
    println!("{}", category.id);
    Ok(())
}
