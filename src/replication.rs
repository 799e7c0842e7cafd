use serde::Serialize;

/// Mutation kinds propagated to peer registries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepOp {
    #[allow(dead_code)]
    Transfer,
    Delete,
}

/// Fire-and-forget propagation of repository mutations to peer registries.
/// Outcomes are consumed only for logging; never by the request path.
#[async_trait::async_trait]
pub trait ReplicationTrigger: Send + Sync {
    async fn trigger(&self, repo_name: &str, tags: &[String], op: RepOp) -> anyhow::Result<()>;
}

#[derive(Serialize)]
struct TriggerRequest<'a> {
    repository: &'a str,
    tags: &'a [String],
    operation: RepOp,
}

/// Posts triggers to the replication controller endpoint.
pub struct HttpReplicationTrigger {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpReplicationTrigger {
    pub fn new(endpoint: impl Into<String>, http: reqwest::Client) -> HttpReplicationTrigger {
        HttpReplicationTrigger {
            endpoint: endpoint.into(),
            http,
        }
    }
}

#[async_trait::async_trait]
impl ReplicationTrigger for HttpReplicationTrigger {
    async fn trigger(&self, repo_name: &str, tags: &[String], op: RepOp) -> anyhow::Result<()> {
        if self.endpoint.is_empty() {
            tracing::debug!("replication endpoint not configured, skipping trigger for {repo_name}");
            return Ok(());
        }
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&TriggerRequest {
                repository: repo_name,
                tags,
                operation: op,
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("replication controller answered {}", resp.status());
        }
        Ok(())
    }
}
