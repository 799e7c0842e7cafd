pub mod auth;
pub mod catalog;
pub mod client;

use axum::http::StatusCode;
use thiserror::Error;

/// Media type of the legacy schema1 signed manifest, the only format the
/// metadata extractor accepts.
pub const MANIFEST_V1_MEDIA_TYPE: &str =
    "application/vnd.docker.distribution.manifest.v1+prettyjws";

/// Media type used when resolving a tag to its manifest digest.
pub const MANIFEST_V2_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry answered with an error body it structured itself; status
    /// and detail are preserved for the caller.
    #[error("registry returned {status}: {detail}")]
    Structured { status: StatusCode, detail: String },

    /// Transport-level or otherwise shapeless failure.
    #[error(transparent)]
    Opaque(#[from] anyhow::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// A pulled manifest: media type, content digest and raw payload.
pub struct PulledManifest {
    pub media_type: String,
    #[allow(dead_code)]
    pub digest: String,
    pub payload: Vec<u8>,
}

/// Per-request registry client bound to a single repository. Created and
/// discarded within one request; never shared across requests.
#[async_trait::async_trait]
pub trait RepositoryClient: Send + Sync {
    async fn list_tags(&self) -> RegistryResult<Vec<String>>;

    async fn delete_tag(&self, tag: &str) -> RegistryResult<()>;

    async fn pull_manifest(&self, tag: &str, accepted: &[&str]) -> RegistryResult<PulledManifest>;
}

/// Builds short-lived repository-scoped clients.
pub trait ClientFactory: Send + Sync {
    fn scoped(
        &self,
        repo_name: &str,
        credential: &auth::Credential,
    ) -> std::sync::Arc<dyn RepositoryClient>;
}
