//! Message store: transactional append and history reads.

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::schema::MessageRecord;

/// Current time as fractional seconds since the Unix epoch.
pub fn now_ts() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Append a message: insert the message row and its ordering record in a
/// single transaction — either both persist or neither does.
/// Returns the new message id.
pub fn append_message(
    conn: &mut Connection,
    conversation_id: i64,
    sender_id: i64,
    content: &str,
    ts: f64,
) -> Result<i64, rusqlite::Error> {
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO messages (sender_id, content) VALUES (?1, ?2)",
        params![sender_id, content],
    )?;
    let message_id = tx.last_insert_rowid();

    tx.execute(
        "INSERT INTO conversation_changes (ts, conversation_id, change_type, change_id)
         VALUES (?1, ?2, 'message', ?3)",
        params![ts, conversation_id, message_id],
    )?;

    tx.commit()?;
    Ok(message_id)
}

/// Last `limit` messages of a conversation, oldest-to-newest by timestamp.
/// Reads the newest rows from the ordering record, then reverses.
pub fn recent_messages(
    conn: &Connection,
    conversation_id: i64,
    limit: u32,
) -> Result<Vec<MessageRecord>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT ch.id, m.sender_id, m.content, ch.ts
         FROM conversation_changes ch
         JOIN messages m ON ch.change_id = m.id
         WHERE ch.conversation_id = ?1 AND ch.change_type = 'message'
         ORDER BY ch.ts DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![conversation_id, limit], |row| {
        Ok(MessageRecord {
            id: row.get(0)?,
            sender: row.get(1)?,
            content: row.get(2)?,
            ts: row.get(3)?,
        })
    })?;
    let mut records: Vec<MessageRecord> = rows.collect::<Result<_, _>>()?;
    records.reverse();
    Ok(records)
}
