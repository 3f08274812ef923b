use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking — no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: Initial schema

CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    nickname TEXT NOT NULL,
    email TEXT NOT NULL,
    password_hash TEXT NOT NULL
);

CREATE INDEX idx_users_name ON users(name);

CREATE TABLE conversations (
    id INTEGER PRIMARY KEY,
    label TEXT NOT NULL
);

CREATE TABLE conversation_members (
    id INTEGER PRIMARY KEY,
    conversation_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    role TEXT NOT NULL DEFAULT 'member',
    UNIQUE (conversation_id, user_id),
    FOREIGN KEY (conversation_id) REFERENCES conversations(id),
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE INDEX idx_members_conversation ON conversation_members(conversation_id);
CREATE INDEX idx_members_user ON conversation_members(user_id);

CREATE TABLE messages (
    id INTEGER PRIMARY KEY,
    sender_id INTEGER NOT NULL,
    content TEXT NOT NULL,
    FOREIGN KEY (sender_id) REFERENCES users(id)
);

-- Ordering record: one row per conversation event, keyed by timestamp.
-- A posted message inserts into messages and here in one transaction.
CREATE TABLE conversation_changes (
    id INTEGER PRIMARY KEY,
    ts REAL NOT NULL,
    conversation_id INTEGER NOT NULL,
    change_type TEXT NOT NULL,
    change_id INTEGER NOT NULL,
    FOREIGN KEY (conversation_id) REFERENCES conversations(id)
);

CREATE INDEX idx_changes_conversation_ts ON conversation_changes(conversation_id, ts);
",
    )])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_valid() {
        assert!(migrations().validate().is_ok());
    }
}
