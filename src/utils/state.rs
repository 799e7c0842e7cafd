use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::task::TaskTracker;

use crate::config::Config;
use crate::domain::access::AccessGate;
use crate::domain::store::{PgProjectStore, ProjectStore};
use crate::registry::ClientFactory;
use crate::registry::auth::CredentialChain;
use crate::registry::catalog::CatalogCache;
use crate::registry::client::HttpClientFactory;
use crate::replication::{HttpReplicationTrigger, ReplicationTrigger};
use crate::utils::session::{MemorySessionStore, SessionStore};

pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ProjectStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub clients: Arc<dyn ClientFactory>,
    pub catalog: Arc<CatalogCache>,
    pub replication: Arc<dyn ReplicationTrigger>,
    pub credentials: CredentialChain,
    pub gate: AccessGate,
    pub tasks: TaskTracker,
}

impl AppState {
    pub fn new(config: Config, pool: Arc<PgPool>) -> anyhow::Result<AppState> {
        let store: Arc<dyn ProjectStore> = Arc::new(PgProjectStore::new(pool));
        let factory = HttpClientFactory::new(&config)?;
        let catalog = Arc::new(CatalogCache::new(Arc::new(factory.catalog_source())));
        let replication: Arc<dyn ReplicationTrigger> = Arc::new(HttpReplicationTrigger::new(
            config.replication_url.clone(),
            reqwest::Client::new(),
        ));

        Ok(AppState {
            config: Arc::new(config),
            credentials: CredentialChain::new(store.clone()),
            gate: AccessGate::new(store.clone()),
            store,
            sessions: Arc::new(MemorySessionStore::new()),
            clients: Arc::new(factory),
            catalog,
            replication,
            tasks: TaskTracker::new(),
        })
    }

    /// Detached background work: replication triggers, audit appends, cache
    /// refreshes. Tracked so shutdown (and tests) can wait for completion;
    /// nothing is ever communicated back to the spawning request.
    pub fn spawn_background<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(fut);
    }
}
