//! Connection registry: the process-wide table of live, authenticated
//! WebSocket connections.
//!
//! One mutex guards the whole table. Every operation is a short-held
//! critical section that never touches the network, so membership
//! operations stay bounded no matter how many sockets are slow. The
//! registry is the only shared state mutated by multiple tasks; each
//! connection's read loop is the sole remover of its own entry.

use std::sync::Mutex;

use super::ConnectionSender;

/// One live mapping from an authenticated user to one open connection.
/// `slot` is unique for the process lifetime and disambiguates a user's
/// concurrent connections, so removal can name exactly one entry.
struct RegistryEntry {
    user_id: i64,
    sender: ConnectionSender,
    slot: u64,
}

struct RegistryInner {
    entries: Vec<RegistryEntry>,
    /// Monotonically increasing slot counter, never reused.
    next_slot: u64,
}

/// Tracks which user owns which live connection, with a per-user
/// concurrency cap. Safe to share behind an `Arc`.
pub struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,
    limit: usize,
}

impl ConnectionRegistry {
    /// Create a registry allowing at most `limit` connections per user.
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                entries: Vec::new(),
                next_slot: 0,
            }),
            limit,
        }
    }

    /// Whether a new connection for `user_id` would fit under the cap.
    /// Advisory only: `add` re-checks under the same lock acquisition,
    /// so two racing handshakes cannot jointly exceed the limit.
    pub fn can_add(&self, user_id: i64) -> bool {
        let inner = self.inner.lock().expect("registry lock poisoned");
        Self::count_in(&inner, user_id) < self.limit
    }

    /// Register a connection. Check and insert happen atomically under
    /// the table lock: returns the fresh slot id, or `None` if the user
    /// is at capacity (the table is left untouched — no eviction).
    pub fn add(&self, user_id: i64, sender: ConnectionSender) -> Option<u64> {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        if Self::count_in(&inner, user_id) >= self.limit {
            return None;
        }
        inner.next_slot += 1;
        let slot = inner.next_slot;
        inner.entries.push(RegistryEntry {
            user_id,
            sender,
            slot,
        });
        Some(slot)
    }

    /// Remove the entry for {user_id, slot}. Idempotent: removing a pair
    /// that is not present is a no-op, which makes the double-teardown
    /// race between an explicit close and a read failure harmless.
    pub fn remove(&self, user_id: i64, slot: u64) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        inner
            .entries
            .retain(|e| !(e.user_id == user_id && e.slot == slot));
    }

    /// Number of live connections for one user.
    pub fn count_for(&self, user_id: i64) -> usize {
        let inner = self.inner.lock().expect("registry lock poisoned");
        Self::count_in(&inner, user_id)
    }

    /// Snapshot of the senders for one user. The clones are safe to use
    /// after the lock is released; a sender whose connection has since
    /// died just fails its send.
    pub fn connections_for(&self, user_id: i64) -> Vec<ConnectionSender> {
        let inner = self.inner.lock().expect("registry lock poisoned");
        inner
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.sender.clone())
            .collect()
    }

    /// Snapshot of the senders for a set of users, preserving input order.
    /// Users with zero live connections contribute nothing.
    pub fn connections_for_many(&self, user_ids: &[i64]) -> Vec<ConnectionSender> {
        let inner = self.inner.lock().expect("registry lock poisoned");
        let mut senders = Vec::new();
        for user_id in user_ids {
            for entry in inner.entries.iter().filter(|e| e.user_id == *user_id) {
                senders.push(entry.sender.clone());
            }
        }
        senders
    }

    fn count_in(inner: &RegistryInner, user_id: i64) -> usize {
        inner.entries.iter().filter(|e| e.user_id == user_id).count()
    }
}
