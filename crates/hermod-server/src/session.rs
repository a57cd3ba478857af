//! Server-side session table (spec §3, §4.5, §5).

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use hermod_core::{cancel_pair, AuthProvider, CancelSource, CancelToken, IdAllocator};
use tokio::sync::{mpsc, Mutex, RwLock};

/// Bound on a session's inbound queue depth. A slow handler applies
/// backpressure to the reader task rather than growing without limit.
const INBOUND_CAPACITY: usize = 64;

struct SessionEntry<H> {
    inbound: mpsc::Sender<Bytes>,
    cancel: CancelSource,
    auth: Option<Arc<AuthProvider<H>>>,
}

/// `session_id (u32) -> SessionData` for one connection (spec §3).
///
/// Insert/remove take the write lock; lookups take the read lock. `close`
/// removes the entry and signals cancellation in one critical section so a
/// racing `Data` frame can never observe a session that is half torn down
/// (spec §5).
pub struct SessionTable<H> {
    ids: Mutex<IdAllocator>,
    sessions: RwLock<HashMap<u32, SessionEntry<H>>>,
}

impl<H> Default for SessionTable<H> {
    fn default() -> Self {
        Self { ids: Mutex::new(IdAllocator::new()), sessions: RwLock::new(HashMap::new()) }
    }
}

impl<H> SessionTable<H> {
    /// Builds an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh session ID and inserts an empty row for it,
    /// returning the ID, the handler's inbound receiver, and a cancel
    /// token the handler can race against. Returns `None` if the ID space
    /// is exhausted (spec §4.5's "Tie-breaks and edge cases").
    pub async fn open(&self, auth: Option<Arc<AuthProvider<H>>>) -> Option<(u32, mpsc::Receiver<Bytes>, CancelToken)> {
        let id = {
            let mut ids = self.ids.lock().await;
            ids.allocate()?
        };
        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
        let (cancel, token) = cancel_pair();
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, SessionEntry { inbound: tx, cancel, auth });
        Some((id, rx, token))
    }

    /// Pushes `payload` onto `session_id`'s inbound queue. Returns `false`
    /// if the session is unknown (already closed, or never opened).
    pub async fn push_data(&self, session_id: u32, payload: Bytes) -> bool {
        let sender = {
            let sessions = self.sessions.read().await;
            match sessions.get(&session_id) {
                Some(entry) => entry.inbound.clone(),
                None => return false,
            }
        };
        sender.send(payload).await.is_ok()
    }

    /// Closes and removes `session_id`, cancelling its handler. Returns
    /// `true` if a session was actually removed, `false` if it was already
    /// gone — the idempotency a second `Close` (spec §4.5) or a
    /// handler-initiated close racing a peer `Close` both rely on.
    pub async fn close(&self, session_id: u32) -> bool {
        let entry = self.sessions.write().await.remove(&session_id);
        match entry {
            Some(entry) => {
                entry.cancel.cancel();
                self.ids.lock().await.release(session_id);
                true
            },
            None => false,
        }
    }

    /// The auth provider attached to `session_id` at open time, if the
    /// session is still live.
    pub async fn session_auth(&self, session_id: u32) -> Option<Option<Arc<AuthProvider<H>>>> {
        let sessions = self.sessions.read().await;
        sessions.get(&session_id).map(|entry| entry.auth.clone())
    }

    /// Whether `session_id` currently has a live row.
    pub async fn contains(&self, session_id: u32) -> bool {
        self.sessions.read().await.contains_key(&session_id)
    }
}
