//! CRUD operations for [`User`] records.

use rusqlite::params;

use crate::database::{format_timestamp, parse_timestamp, Database};
use crate::error::{Result, StoreError};
use crate::models::{default_settings, User, UserSettings};

impl Database {
    /// Insert a user, or overwrite every field of an existing one.
    pub fn upsert_user(&self, user: &User) -> Result<()> {
        let settings = serde_json::to_string(&user.settings)?;

        self.conn()?.execute(
            "INSERT INTO users (id, name, avatar, last_seen, registered, settings)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 avatar = excluded.avatar,
                 last_seen = excluded.last_seen,
                 settings = excluded.settings",
            params![
                user.id,
                user.name,
                user.avatar,
                format_timestamp(&user.last_seen),
                format_timestamp(&user.registered),
                settings,
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> Result<User> {
        self.conn()?
            .query_row(
                "SELECT id, name, avatar, last_seen, registered, settings FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, avatar, last_seen, registered, settings FROM users ORDER BY registered ASC",
        )?;
        let rows = stmt.query_map([], row_to_user)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let last_seen: String = row.get(3)?;
    let registered: String = row.get(4)?;
    let settings_json: String = row.get(5)?;

    // rows migrated from v1 hold an empty object
    let mut settings = default_settings();
    let stored: UserSettings = serde_json::from_str(&settings_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    settings.extend(stored);

    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        avatar: row.get(2)?,
        last_seen: parse_timestamp(3, &last_seen)?,
        registered: parse_timestamp(4, &registered)?,
        settings,
    })
}
