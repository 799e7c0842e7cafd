pub mod label;
pub mod manifest;
pub mod repository;
pub mod tag;

use crate::domain::model::Project;
use crate::error::AppError;
use crate::utils::repo_identifier::project_prefix;
use crate::utils::state::AppState;

/// Required query parameter, rejected when absent or empty.
pub(crate) fn require_param(value: Option<&String>, name: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => Err(AppError::BadRequest(format!("{name} is missing"))),
    }
}

/// Owning project of a repository, looked up by its name prefix.
pub(crate) async fn owning_project(
    state: &AppState,
    repo_name: &str,
) -> Result<Project, AppError> {
    let project_name = project_prefix(repo_name);
    state
        .store
        .project_by_name(project_name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("project `{project_name}`")))
}

/// Mock collaborators and a fully wired `AppState` for handler tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use axum::http::StatusCode;
    use tokio_util::task::TaskTracker;

    use crate::config::Config;
    use crate::domain::access::AccessGate;
    use crate::domain::store::ProjectStore;
    use crate::domain::store::testing::MemoryStore;
    use crate::registry::auth::{Credential, CredentialChain};
    use crate::registry::catalog::CatalogCache;
    use crate::registry::catalog::tests::FixedSource;
    use crate::registry::{
        ClientFactory, PulledManifest, RegistryError, RegistryResult, RepositoryClient,
    };
    use crate::replication::{RepOp, ReplicationTrigger};
    use crate::utils::session::MemorySessionStore;
    use crate::utils::state::AppState;

    #[derive(Default)]
    pub(crate) struct MockRegistry {
        pub(crate) tags: Vec<String>,
        pub(crate) fail_on: Option<String>,
        pub(crate) deleted: Mutex<Vec<String>>,
    }

    impl MockRegistry {
        pub(crate) fn with_tags(tags: &[&str]) -> MockRegistry {
            MockRegistry {
                tags: tags.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            }
        }

        pub(crate) fn failing_on(mut self, tag: &str) -> MockRegistry {
            self.fail_on = Some(tag.to_string());
            self
        }

        pub(crate) fn deleted(&self) -> Vec<String> {
            self.deleted.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl RepositoryClient for MockRegistry {
        async fn list_tags(&self) -> RegistryResult<Vec<String>> {
            Ok(self.tags.clone())
        }

        async fn delete_tag(&self, tag: &str) -> RegistryResult<()> {
            if self.fail_on.as_deref() == Some(tag) {
                return Err(RegistryError::Structured {
                    status: StatusCode::NOT_FOUND,
                    detail: "MANIFEST_UNKNOWN: manifest unknown".to_string(),
                });
            }
            self.deleted.lock().unwrap().push(tag.to_string());
            Ok(())
        }

        async fn pull_manifest(
            &self,
            _tag: &str,
            _accepted: &[&str],
        ) -> RegistryResult<PulledManifest> {
            unimplemented!("not used by these tests")
        }
    }

    pub(crate) struct MockFactory(pub(crate) Arc<MockRegistry>);

    impl ClientFactory for MockFactory {
        fn scoped(&self, _repo_name: &str, _credential: &Credential) -> Arc<dyn RepositoryClient> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingReplication {
        triggers: Mutex<Vec<(String, Vec<String>, RepOp)>>,
    }

    impl RecordingReplication {
        pub(crate) fn triggers(&self) -> Vec<(String, Vec<String>, RepOp)> {
            self.triggers.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ReplicationTrigger for RecordingReplication {
        async fn trigger(&self, repo_name: &str, tags: &[String], op: RepOp) -> anyhow::Result<()> {
            self.triggers
                .lock()
                .unwrap()
                .push((repo_name.to_string(), tags.to_vec(), op));
            Ok(())
        }
    }

    pub(crate) fn test_config() -> Config {
        Config {
            host: String::new(),
            port: 0,
            registry_url: String::new(),
            token_service_url: String::new(),
            replication_url: String::new(),
            service_secret: None,
            insecure: false,
            empty_repo_not_found: true,
            db_url: String::new(),
        }
    }

    pub(crate) struct Harness {
        pub(crate) state: AppState,
        pub(crate) registry: Arc<MockRegistry>,
        pub(crate) replication: Arc<RecordingReplication>,
        pub(crate) catalog_source: Arc<FixedSource>,
        pub(crate) mem: Arc<MemoryStore>,
    }

    pub(crate) fn harness(store: MemoryStore, registry: MockRegistry) -> Harness {
        let mem = Arc::new(store);
        let store: Arc<dyn ProjectStore> = mem.clone();
        let registry = Arc::new(registry);
        let replication = Arc::new(RecordingReplication::default());
        let catalog_source = Arc::new(FixedSource::new(&["lib/app"]));
        let state = AppState {
            config: Arc::new(test_config()),
            credentials: CredentialChain::new(store.clone()),
            gate: AccessGate::new(store.clone()),
            store,
            sessions: Arc::new(MemorySessionStore::new()),
            clients: Arc::new(MockFactory(registry.clone())),
            catalog: Arc::new(CatalogCache::new(catalog_source.clone())),
            replication: replication.clone(),
            tasks: TaskTracker::new(),
        };
        Harness {
            state,
            registry,
            replication,
            catalog_source,
            mem,
        }
    }

    pub(crate) async fn drain_background(state: &AppState) {
        state.tasks.close();
        state.tasks.wait().await;
    }
}
