use std::path::Path;

use prospect_core::sync::HttpSyncClient;
use prospect_core::SyncEngine;

use crate::commands::common::{open_database, require_session, resolve_server_url};
use crate::error::CliError;

pub async fn run_sync(server: Option<&str>, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    require_session(&db)?;

    let server_url = resolve_server_url(server, &db)?;
    let engine = SyncEngine::new(HttpSyncClient::new(server_url)?);
    let outcome = engine.run_sync(&db).await?;

    println!(
        "Synced: pushed {}, pulled {} (watermark {})",
        outcome.pushed, outcome.pulled, outcome.watermark
    );
    Ok(())
}
