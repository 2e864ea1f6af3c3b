use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] prospect_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
    #[error("Not logged in. Run `prospect login` first.")]
    NotLoggedIn,
    #[error("Lead not found for id/prefix: {0}")]
    LeadNotFound(String),
    #[error("Category not found for id/name/prefix: {0}")]
    CategoryNotFound(String),
    #[error("{0}")]
    AmbiguousId(String),
}
