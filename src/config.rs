#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub registry_url: String,
    pub token_service_url: String,
    pub replication_url: String,
    /// Shared secret granting machine callers the project-agnostic bypass.
    pub service_secret: Option<String>,
    pub insecure: bool,
    /// Treat a successful but empty tag listing during delete-all as 404.
    pub empty_repo_not_found: bool,
    pub db_url: String,
}
