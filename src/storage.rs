/// Local storage for the client session
///
/// A small key-value table in SQLite. The session is loaded once at startup
/// and saved when the user logs in or changes credentials.

use crate::config::Session;
use crate::error::{ClientError, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

const KEY_BASE_URL: &str = "base_url";
const KEY_USER_ID: &str = "user_id";
const KEY_AUTH_TOKEN: &str = "auth_token";

/// Session persistence backed by SQLite
pub struct SessionStore {
    conn: Connection,
}

impl SessionStore {
    /// Open (or create) the store at the given database path
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Open a throwaway in-memory store
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(&conn)?;
        Ok(Self { conn })
    }

    fn initialize(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let updated_at = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
            (key, value, updated_at),
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                (key,),
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?1", (key,))?;
        Ok(())
    }

    /// Persist the session, replacing whatever was stored before
    pub fn save_session(&self, session: &Session) -> Result<()> {
        self.set(KEY_BASE_URL, &session.base_url)?;
        self.set(KEY_USER_ID, &session.user_id.to_string())?;
        match &session.auth_token {
            Some(token) => self.set(KEY_AUTH_TOKEN, token)?,
            None => self.remove(KEY_AUTH_TOKEN)?,
        }
        log::debug!("Saved session for user {}", session.user_id);
        Ok(())
    }

    /// Load the stored session, if a complete one exists
    pub fn load_session(&self) -> Result<Option<Session>> {
        let (Some(base_url), Some(raw_id)) = (self.get(KEY_BASE_URL)?, self.get(KEY_USER_ID)?)
        else {
            return Ok(None);
        };

        let user_id = raw_id.parse::<i64>().map_err(|_| {
            ClientError::Config(format!("Stored user id is not an integer: {}", raw_id))
        })?;

        Ok(Some(Session {
            base_url,
            user_id,
            auth_token: self.get(KEY_AUTH_TOKEN)?,
        }))
    }

    /// Forget the session (logout)
    pub fn clear_session(&self) -> Result<()> {
        for key in [KEY_BASE_URL, KEY_USER_ID, KEY_AUTH_TOKEN] {
            self.remove(key)?;
        }
        Ok(())
    }
}
