use crate::{config::Config, presence::PresenceTable, websocket::RoomRegistry};
use deadpool_postgres::Pool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool,
    /// Who is online and how to reach them. Owned by the gateway; the query
    /// API only reads it.
    pub presence: PresenceTable,
    /// Per-connection conversation subscriptions (local, never persisted).
    pub rooms: RoomRegistry,
    pub config: Arc<Config>,
}
