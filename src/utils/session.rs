use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::registry::auth::SessionData;

/// Key/value lookup of session records by session id.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Option<SessionData>;
}

/// Single-node in-memory session store; also backs the tests.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionData>>,
}

impl MemorySessionStore {
    pub fn new() -> MemorySessionStore {
        MemorySessionStore::default()
    }

    #[allow(dead_code)]
    pub async fn insert(&self, data: SessionData) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        self.sessions.write().await.insert(session_id.clone(), data);
        session_id
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Option<SessionData> {
        self.sessions.read().await.get(session_id).cloned()
    }
}
