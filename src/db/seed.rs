//! First-boot demo data, mirroring the shipped starting point: two demo
//! users sharing a handful of conversations.

use crate::auth::password;
use crate::db::{conversations, users, DbPool};

const DEMO_USERS: [(&str, &str); 2] = [("fanf", "fanf"), ("ted", "ted")];
const DEMO_CONVERSATIONS: [&str; 4] = ["General", "About", "Test", "Random"];

/// Seed demo users and conversations if the database has no users yet.
/// Returns true if seeding happened.
pub fn maybe_seed_demo_data(db: &DbPool) -> Result<bool, Box<dyn std::error::Error>> {
    let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;

    let user_count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    if user_count > 0 {
        return Ok(false);
    }

    let mut member_ids = Vec::new();
    for (name, pass) in DEMO_USERS {
        let hash = password::hash_password(pass)?;
        let email = format!("{}@{}", name, name);
        let id = users::add_user(&conn, name, name, &email, &hash)?;
        member_ids.push(id);
    }

    for label in DEMO_CONVERSATIONS {
        conversations::create_conversation(&conn, label, &member_ids)?;
    }

    tracing::info!(
        "First boot: seeded {} demo users and {} conversations",
        DEMO_USERS.len(),
        DEMO_CONVERSATIONS.len()
    );

    Ok(true)
}
