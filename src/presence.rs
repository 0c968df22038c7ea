//! Process-wide presence table.
//!
//! Maps a user id to their currently registered WebSocket connection and the
//! channel that reaches it. One entry per user: registering a second
//! connection for the same user overwrites the first (last write wins), which
//! drops the old sender and thereby ends the old connection's forward stream.
//!
//! Presence is never persisted. A process restart clears the table and
//! clients simply reconnect.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

struct Connection {
    id: Uuid,
    sender: UnboundedSender<String>,
}

#[derive(Default, Clone)]
pub struct PresenceTable {
    inner: Arc<RwLock<HashMap<Uuid, Connection>>>,
}

impl PresenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection for a user, returning the connection id and
    /// the receiving end of its outbound channel. Any previous connection
    /// for the same user is displaced.
    pub async fn register(&self, user_id: Uuid) -> (Uuid, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let connection_id = Uuid::new_v4();

        let mut guard = self.inner.write().await;
        let displaced = guard.insert(
            user_id,
            Connection {
                id: connection_id,
                sender: tx,
            },
        );
        drop(guard);

        if let Some(old) = displaced {
            tracing::debug!(%user_id, old_connection = %old.id, "presence entry displaced");
        }
        tracing::debug!(%user_id, connection = %connection_id, "presence registered");

        (connection_id, rx)
    }

    /// Remove the user's mapping if present. No-op when absent.
    pub async fn unregister(&self, user_id: Uuid) {
        let mut guard = self.inner.write().await;
        if guard.remove(&user_id).is_some() {
            tracing::debug!(%user_id, "presence unregistered");
        }
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.read().await.contains_key(&user_id)
    }

    /// Connection id currently bound to the user, if any.
    pub async fn lookup(&self, user_id: Uuid) -> Option<Uuid> {
        self.inner.read().await.get(&user_id).map(|c| c.id)
    }

    /// Deliver a payload to the user's registered connection. Returns false
    /// when the user is offline or the connection has gone away; failures are
    /// isolated per recipient and never affect other deliveries.
    pub async fn send(&self, user_id: Uuid, payload: String) -> bool {
        let guard = self.inner.read().await;
        match guard.get(&user_id) {
            Some(conn) => conn.sender.send(payload).is_ok(),
            None => false,
        }
    }
}
