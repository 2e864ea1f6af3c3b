use std::path::Path;

use prospect_core::db::{AuthSession, SessionRepository, SqliteSessionRepository};
use prospect_core::models::Role;
use prospect_core::protocol::{AuthResponse, RegisterRequest};
use prospect_core::sync::HttpSyncClient;

use crate::commands::common::{open_database, require_session, resolve_server_url};
use crate::error::CliError;

pub async fn run_register(
    email: &str,
    password: &str,
    name: &str,
    role: Option<Role>,
    server: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let server_url = resolve_server_url(server, &db)?;

    let client = HttpSyncClient::new(server_url.clone())?;
    let response = client
        .register(&RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            role,
        })
        .await?;

    store_login(&db, &server_url, &response)?;
    println!("Registered as {} ({})", response.user.email, response.user.role);
    Ok(())
}

pub async fn run_login(
    email: &str,
    password: &str,
    server: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let server_url = resolve_server_url(server, &db)?;

    let client = HttpSyncClient::new(server_url.clone())?;
    let response = client.login(email, password).await?;

    store_login(&db, &server_url, &response)?;
    println!("Logged in as {} ({})", response.user.email, response.user.role);
    Ok(())
}

pub fn run_logout(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    SqliteSessionRepository::new(db.connection()).clear_session()?;
    println!("Logged out");
    Ok(())
}

pub fn run_whoami(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let session = require_session(&db)?;
    println!("{} <{}> ({})", session.name, session.email, session.role);
    Ok(())
}

fn store_login(
    db: &prospect_core::db::Database,
    server_url: &str,
    response: &AuthResponse,
) -> Result<(), CliError> {
    let sessions = SqliteSessionRepository::new(db.connection());
    sessions.store_session(&AuthSession {
        user_id: response.user.id,
        email: response.user.email.clone(),
        name: response.user.name.clone(),
        role: response.user.role,
        token: response.token.clone(),
    })?;
    sessions.set_server_url(server_url)?;
    Ok(())
}
