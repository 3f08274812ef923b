//! Identity store queries.

use rusqlite::{params, Connection, OptionalExtension};

use crate::schema::UserSummary;

/// A full user row, password hash included. Never serialized to clients.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub nickname: String,
    pub password_hash: String,
}

pub fn find_user_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<UserRecord>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, name, nickname, password_hash FROM users WHERE name = ?1",
        params![name],
        |row| {
            Ok(UserRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                nickname: row.get(2)?,
                password_hash: row.get(3)?,
            })
        },
    )
    .optional()
}

pub fn find_user_by_id(
    conn: &Connection,
    user_id: i64,
) -> Result<Option<UserRecord>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, name, nickname, password_hash FROM users WHERE id = ?1",
        params![user_id],
        |row| {
            Ok(UserRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                nickname: row.get(2)?,
                password_hash: row.get(3)?,
            })
        },
    )
    .optional()
}

pub fn all_users(conn: &Connection) -> Result<Vec<UserSummary>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT id, name, nickname FROM users ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(UserSummary {
            id: row.get(0)?,
            name: row.get(1)?,
            nickname: row.get(2)?,
        })
    })?;
    rows.collect()
}

/// Insert a user with an already-hashed password. Returns the new user id.
pub fn add_user(
    conn: &Connection,
    name: &str,
    nickname: &str,
    email: &str,
    password_hash: &str,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO users (name, nickname, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
        params![name, nickname, email, password_hash],
    )?;
    Ok(conn.last_insert_rowid())
}
