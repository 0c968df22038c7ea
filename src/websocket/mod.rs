use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub mod events;
pub mod message_types;

/// Conversation room subscriptions, keyed by conversation id.
///
/// Joining and leaving a room is a purely local change for one connection;
/// nothing is persisted and message delivery does not depend on it. The
/// registry exists so broadcasts can be scoped per conversation without a
/// participant lookup, which is also where cross-process fan-out would hook
/// in if this service ever ran more than one instance.
#[derive(Default, Clone)]
pub struct RoomRegistry {
    // conversation_id -> connection ids currently joined
    inner: Arc<RwLock<HashMap<Uuid, HashSet<Uuid>>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a conversation room. Idempotent.
    pub async fn join(&self, conversation_id: Uuid, connection_id: Uuid) {
        let mut guard = self.inner.write().await;
        guard
            .entry(conversation_id)
            .or_default()
            .insert(connection_id);
    }

    /// Remove a connection from a conversation room. No-op when absent.
    pub async fn leave(&self, conversation_id: Uuid, connection_id: Uuid) {
        let mut guard = self.inner.write().await;
        if let Some(members) = guard.get_mut(&conversation_id) {
            members.remove(&connection_id);
            if members.is_empty() {
                guard.remove(&conversation_id);
            }
        }
    }

    /// Drop a connection from every room it joined. Called on disconnect so
    /// closed connections never linger in the registry.
    pub async fn leave_all(&self, connection_id: Uuid) {
        let mut guard = self.inner.write().await;
        guard.retain(|_, members| {
            members.remove(&connection_id);
            !members.is_empty()
        });
    }

    pub async fn is_joined(&self, conversation_id: Uuid, connection_id: Uuid) -> bool {
        self.inner
            .read()
            .await
            .get(&conversation_id)
            .is_some_and(|members| members.contains(&connection_id))
    }

    pub async fn member_count(&self, conversation_id: Uuid) -> usize {
        self.inner
            .read()
            .await
            .get(&conversation_id)
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn join_is_idempotent() {
        let rooms = RoomRegistry::new();
        let (conv, conn) = (Uuid::new_v4(), Uuid::new_v4());

        rooms.join(conv, conn).await;
        rooms.join(conv, conn).await;

        assert!(rooms.is_joined(conv, conn).await);
        assert_eq!(rooms.member_count(conv).await, 1);
    }

    #[tokio::test]
    async fn leave_all_clears_every_room() {
        let rooms = RoomRegistry::new();
        let conn = Uuid::new_v4();
        let other_conn = Uuid::new_v4();
        let (conv_a, conv_b) = (Uuid::new_v4(), Uuid::new_v4());

        rooms.join(conv_a, conn).await;
        rooms.join(conv_b, conn).await;
        rooms.join(conv_b, other_conn).await;

        rooms.leave_all(conn).await;

        assert!(!rooms.is_joined(conv_a, conn).await);
        assert!(!rooms.is_joined(conv_b, conn).await);
        assert!(rooms.is_joined(conv_b, other_conn).await);
        // Empty rooms are removed entirely.
        assert_eq!(rooms.member_count(conv_a).await, 0);
    }

    #[tokio::test]
    async fn leave_unknown_room_is_noop() {
        let rooms = RoomRegistry::new();
        rooms.leave(Uuid::new_v4(), Uuid::new_v4()).await;
    }
}
