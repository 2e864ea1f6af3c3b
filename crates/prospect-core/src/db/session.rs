//! Stored credential and sync cursor

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{RecordId, Role};

const LAST_PULLED_AT_KEY: &str = "last_pulled_at";
const SERVER_URL_KEY: &str = "server_url";

/// The logged-in user plus their bearer token, persisted locally
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: RecordId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub token: String,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Trait for session and sync-cursor storage
pub trait SessionRepository {
    /// Get the stored session, if logged in
    fn session(&self) -> Result<Option<AuthSession>>;

    /// Store (or replace) the session after login/register
    fn store_session(&self, session: &AuthSession) -> Result<()>;

    /// Drop the stored session on logout
    fn clear_session(&self) -> Result<()>;

    /// Watermark of the last successful pull, if any cycle completed
    fn last_pulled_at(&self) -> Result<Option<i64>>;

    /// Persist the pull watermark (called inside the sync apply transaction)
    fn set_last_pulled_at(&self, timestamp: i64) -> Result<()>;

    /// Server base URL captured at login
    fn server_url(&self) -> Result<Option<String>>;

    fn set_server_url(&self, url: &str) -> Result<()>;
}

/// `SQLite` implementation of `SessionRepository`
pub struct SqliteSessionRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSessionRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn state_value(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM sync_state WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_state_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_state (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SessionRepository for SqliteSessionRepository<'_> {
    fn session(&self) -> Result<Option<AuthSession>> {
        let session = self
            .conn
            .query_row(
                "SELECT user_id, email, name, role, token FROM auth_session WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        session
            .map(|(user_id, email, name, role, token)| {
                Ok(AuthSession {
                    user_id: user_id
                        .parse()
                        .map_err(|_| Error::InvalidInput(format!("Bad stored user id: {user_id}")))?,
                    email,
                    name,
                    role: role.parse()?,
                    token,
                })
            })
            .transpose()
    }

    fn store_session(&self, session: &AuthSession) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO auth_session (id, user_id, email, name, role, token) \
             VALUES (1, ?, ?, ?, ?, ?)",
            params![
                session.user_id.as_str(),
                session.email,
                session.name,
                session.role.as_str(),
                session.token,
            ],
        )?;
        Ok(())
    }

    fn clear_session(&self) -> Result<()> {
        self.conn.execute("DELETE FROM auth_session", [])?;
        Ok(())
    }

    fn last_pulled_at(&self) -> Result<Option<i64>> {
        let value = self.state_value(LAST_PULLED_AT_KEY)?;
        value
            .map(|raw| {
                raw.parse::<i64>()
                    .map_err(|_| Error::InvalidInput(format!("Bad stored watermark: {raw}")))
            })
            .transpose()
    }

    fn set_last_pulled_at(&self, timestamp: i64) -> Result<()> {
        self.set_state_value(LAST_PULLED_AT_KEY, &timestamp.to_string())
    }

    fn server_url(&self) -> Result<Option<String>> {
        self.state_value(SERVER_URL_KEY)
    }

    fn set_server_url(&self, url: &str) -> Result<()> {
        self.set_state_value(SERVER_URL_KEY, url)
    }
}
