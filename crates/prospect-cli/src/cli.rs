use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use prospect_core::models::{CategoryType, Role};

#[derive(Parser)]
#[command(name = "prospect")]
#[command(about = "Offline-first lead tracking with server sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Server base URL override (e.g. <http://localhost:3000>)
    #[arg(long, global = true, value_name = "URL")]
    pub server: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account on the server and log in
    Register {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
        /// Display name
        #[arg(long, value_name = "NAME")]
        name: String,
        /// Requested role (defaults to viewer)
        #[arg(long, value_enum)]
        role: Option<RoleArg>,
    },
    /// Log in with email and password
    Login {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Clear the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Manage leads in the local store
    Lead {
        #[command(subcommand)]
        command: LeadCommands,
    },
    /// Manage call logs
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },
    /// Manage closing categories
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Run one sync cycle against the server
    Sync,
}

#[derive(Subcommand)]
pub enum LeadCommands {
    /// Create a new lead
    Add {
        /// Lead name
        name: String,
        /// Lead location
        #[arg(long)]
        location: String,
        /// Contact phone number
        #[arg(long)]
        phone: String,
        /// WhatsApp number (defaults to the phone number)
        #[arg(long)]
        whatsapp: Option<String>,
        /// Free-form note
        #[arg(long)]
        note: Option<String>,
    },
    /// List leads, most recently updated first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Close a lead with a category
    Close {
        /// Lead ID or unique ID prefix
        id: String,
        /// Category ID, name or unique ID prefix
        #[arg(long)]
        category: String,
    },
    /// Delete a lead
    Delete {
        /// Lead ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum LogCommands {
    /// Record a call against a lead
    Add {
        /// Lead ID or unique ID prefix
        lead: String,
        /// What happened on the call
        note: String,
        /// Call date as Unix milliseconds (defaults to now)
        #[arg(long, value_name = "MS")]
        date: Option<i64>,
    },
    /// List call logs for a lead, most recent first
    List {
        /// Lead ID or unique ID prefix
        lead: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Create a closing category
    Add {
        /// Category name
        name: String,
        /// Category type
        #[arg(long, value_enum)]
        kind: CategoryKindArg,
    },
    /// List categories by name
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a category
    Delete {
        /// Category ID, name or unique ID prefix
        id: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum RoleArg {
    Admin,
    Editor,
    Viewer,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => Self::Admin,
            RoleArg::Editor => Self::Editor,
            RoleArg::Viewer => Self::Viewer,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CategoryKindArg {
    Converted,
    Rejected,
}

impl From<CategoryKindArg> for CategoryType {
    fn from(kind: CategoryKindArg) -> Self {
        match kind {
            CategoryKindArg::Converted => Self::Converted,
            CategoryKindArg::Rejected => Self::Rejected,
        }
    }
}
