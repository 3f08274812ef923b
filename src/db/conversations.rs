//! Conversation store: membership checks and member resolution.

use rusqlite::{params, Connection};

use crate::schema::ConvSummary;

/// True iff the user has a membership row for the conversation.
pub fn is_member(
    conn: &Connection,
    user_id: i64,
    conversation_id: i64,
) -> Result<bool, rusqlite::Error> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM conversation_members
         WHERE user_id = ?1 AND conversation_id = ?2",
        params![user_id, conversation_id],
        |row| row.get(0),
    )?;
    Ok(count == 1)
}

/// All member user ids of a conversation. This is the delivery-target set
/// for fanout — resolved from membership, never from who is connected.
pub fn members_of(conn: &Connection, conversation_id: i64) -> Result<Vec<i64>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM conversation_members WHERE conversation_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![conversation_id], |row| row.get(0))?;
    rows.collect()
}

/// Conversations the user belongs to, as {id, label} summaries.
pub fn conversations_for_user(
    conn: &Connection,
    user_id: i64,
) -> Result<Vec<ConvSummary>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.label FROM conversations c
         JOIN conversation_members m ON c.id = m.conversation_id
         WHERE m.user_id = ?1
         ORDER BY c.id",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(ConvSummary {
            id: row.get(0)?,
            label: row.get(1)?,
        })
    })?;
    rows.collect()
}

/// Create a conversation and enroll the given users as members.
pub fn create_conversation(
    conn: &Connection,
    label: &str,
    member_ids: &[i64],
) -> Result<i64, rusqlite::Error> {
    conn.execute("INSERT INTO conversations (label) VALUES (?1)", params![label])?;
    let conversation_id = conn.last_insert_rowid();
    for user_id in member_ids {
        conn.execute(
            "INSERT INTO conversation_members (conversation_id, user_id, role)
             VALUES (?1, ?2, 'member')",
            params![conversation_id, user_id],
        )?;
    }
    Ok(conversation_id)
}
