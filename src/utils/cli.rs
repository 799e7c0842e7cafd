use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub(crate) struct Args {
    /// API listening host
    #[arg(long, env = "CURATOR_HOST", default_value = "127.0.0.1")]
    pub(crate) host: String,

    /// API listening port
    #[arg(short, long, env = "CURATOR_PORT", default_value_t = 8083)]
    pub(crate) port: u16,

    /// Registry endpoint the coordinator fronts
    #[arg(long, env = "REGISTRY_URL", default_value = "http://127.0.0.1:5000")]
    pub(crate) registry_url: String,

    /// Token service endpoint for scoped token exchange; derived from the
    /// registry endpoint when empty
    #[arg(long, env = "TOKEN_SERVICE_URL", default_value = "")]
    pub(crate) token_service_url: String,

    /// Replication controller endpoint
    #[arg(long, env = "REPLICATION_URL", default_value = "")]
    pub(crate) replication_url: String,

    /// Shared secret that machine callers present for the elevated bypass
    #[arg(long, env = "SERVICE_SECRET")]
    pub(crate) service_secret: Option<String>,

    /// Skip TLS verification when talking to the registry
    #[arg(long, env = "REGISTRY_INSECURE", default_value_t = false)]
    pub(crate) insecure: bool,

    /// Treat an empty tag listing during delete-all as not found
    #[arg(
        long,
        env = "CURATOR_EMPTY_REPO_NOT_FOUND",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub(crate) empty_repo_not_found: bool,

    /// Database connection url
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://postgres@localhost/registry"
    )]
    pub(crate) database_url: String,
}
