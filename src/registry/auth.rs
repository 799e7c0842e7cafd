use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::domain::access::Identity;
use crate::domain::store::ProjectStore;
use crate::error::AppError;
use crate::registry::{RegistryError, RegistryResult};

/// Tokens are considered stale this many seconds before their real expiry,
/// so an in-flight request never carries a token that dies mid-call.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 10;

/// Authentication evidence carried by one request, already parsed out of
/// the transport layer.
#[derive(Clone, Debug, Default)]
pub struct AuthContext {
    /// Direct username/secret pair, e.g. from a machine-to-machine call.
    pub basic: Option<(String, String)>,
    /// Shared secret candidate for the machine bypass.
    pub service_secret: Option<String>,
    /// Session record looked up from the session collaborator.
    pub session: Option<SessionData>,
}

#[derive(Clone, Debug, Default)]
pub struct SessionData {
    pub username: Option<String>,
    pub user_id: Option<i64>,
}

/// Registry-facing credential: a username plus, for callers that already
/// hold registry-equivalent credentials, the secret itself.
#[derive(Clone, Debug, PartialEq)]
pub struct Credential {
    pub username: String,
    pub secret: Option<String>,
}

impl Credential {
    pub fn anonymous() -> Credential {
        Credential {
            username: String::new(),
            secret: None,
        }
    }
}

/// One step of the credential resolution chain.
#[async_trait::async_trait]
pub trait ResolveCredential: Send + Sync {
    async fn try_resolve(&self, ctx: &AuthContext) -> Result<Option<Credential>, AppError>;
}

/// Direct credentials are used verbatim, without any storage lookup.
struct FromBasic;

#[async_trait::async_trait]
impl ResolveCredential for FromBasic {
    async fn try_resolve(&self, ctx: &AuthContext) -> Result<Option<Credential>, AppError> {
        Ok(ctx.basic.as_ref().map(|(username, secret)| Credential {
            username: username.clone(),
            secret: Some(secret.clone()),
        }))
    }
}

struct FromSessionUsername;

#[async_trait::async_trait]
impl ResolveCredential for FromSessionUsername {
    async fn try_resolve(&self, ctx: &AuthContext) -> Result<Option<Credential>, AppError> {
        Ok(ctx
            .session
            .as_ref()
            .and_then(|s| s.username.clone())
            .map(|username| Credential {
                username,
                secret: None,
            }))
    }
}

/// A session-bound user id is resolved to a username through storage.
struct FromSessionUserId {
    store: Arc<dyn ProjectStore>,
}

#[async_trait::async_trait]
impl ResolveCredential for FromSessionUserId {
    async fn try_resolve(&self, ctx: &AuthContext) -> Result<Option<Credential>, AppError> {
        let Some(user_id) = ctx.session.as_ref().and_then(|s| s.user_id) else {
            return Ok(None);
        };
        Ok(self.store.user_by_id(user_id).await?.map(|user| Credential {
            username: user.username,
            secret: None,
        }))
    }
}

/// Ordered credential resolution: direct credential > session username >
/// session user id > anonymous. The first strategy that produces a
/// credential wins.
pub struct CredentialChain {
    strategies: Vec<Box<dyn ResolveCredential>>,
}

impl CredentialChain {
    pub fn new(store: Arc<dyn ProjectStore>) -> CredentialChain {
        CredentialChain {
            strategies: vec![
                Box::new(FromBasic),
                Box::new(FromSessionUsername),
                Box::new(FromSessionUserId { store }),
            ],
        }
    }

    pub async fn resolve(&self, ctx: &AuthContext) -> Result<Credential, AppError> {
        for strategy in &self.strategies {
            if let Some(credential) = strategy.try_resolve(ctx).await? {
                return Ok(credential);
            }
        }
        Ok(Credential::anonymous())
    }
}

/// Resolves the access-control identity for a request: the shared service
/// secret wins, then any session principal, then anonymous.
///
/// A direct basic pair never becomes a principal here. Nothing on this path
/// verifies the secret, so minting a role-bearing identity from it would let
/// a guessed username through the gates; basic pairs stay registry-facing
/// credentials that the registry itself verifies.
pub async fn resolve_identity(
    ctx: &AuthContext,
    store: &Arc<dyn ProjectStore>,
    service_secret: Option<&str>,
) -> Result<Identity, AppError> {
    if let (Some(expected), Some(given)) = (service_secret, ctx.service_secret.as_deref())
        && expected == given
    {
        return Ok(Identity::Machine);
    }
    if let Some(session) = &ctx.session {
        if let Some(user_id) = session.user_id
            && let Some(user) = store.user_by_id(user_id).await?
        {
            return Ok(Identity::User {
                user_id: user.user_id,
                username: user.username,
            });
        }
        if let Some(username) = &session.username
            && let Some(user) = store.user_by_name(username).await?
        {
            return Ok(Identity::User {
                user_id: user.user_id,
                username: user.username,
            });
        }
    }
    Ok(Identity::Anonymous)
}

/// The (type, name, actions) triple bounding what a registry token permits.
#[derive(Clone, Debug)]
pub struct Scope {
    pub resource: &'static str,
    pub name: String,
    pub actions: &'static [&'static str],
}

impl Scope {
    pub fn repository(name: impl Into<String>) -> Scope {
        Scope {
            resource: "repository",
            name: name.into(),
            actions: &["pull", "push", "*"],
        }
    }

    pub fn catalog() -> Scope {
        Scope {
            resource: "registry",
            name: "catalog".to_string(),
            actions: &["*"],
        }
    }

    fn as_param(&self) -> String {
        format!("{}:{}:{}", self.resource, self.name, self.actions.join(","))
    }
}

#[derive(Clone, Debug)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Process-wide cache of scoped registry tokens, shared across requests so
/// repeated operations by the same user against the same scope skip the
/// token-service round trip.
#[derive(Default)]
pub struct TokenCache {
    tokens: RwLock<HashMap<String, CachedToken>>,
}

impl TokenCache {
    pub fn new() -> TokenCache {
        TokenCache::default()
    }

    async fn get(&self, key: &str) -> Option<String> {
        let tokens = self.tokens.read().await;
        let cached = tokens.get(key)?;
        let remaining = cached.expires_at - Utc::now();
        (remaining > Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS)).then(|| cached.token.clone())
    }

    async fn put(&self, key: String, token: String, expires_in: i64) {
        let mut tokens = self.tokens.write().await;
        tokens.insert(
            key,
            CachedToken {
                token,
                expires_at: Utc::now() + Duration::seconds(expires_in),
            },
        );
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// How a scoped client authenticates against the registry.
pub enum Authorizer {
    /// Direct credential passthrough for callers that already hold
    /// registry-equivalent credentials.
    Basic { username: String, secret: String },
    /// Token exchange against the token service, backed by the shared cache.
    Token {
        username: String,
        token_service_url: String,
        cache: Arc<TokenCache>,
        http: reqwest::Client,
    },
}

impl Authorizer {
    /// Applies authentication to an outgoing registry request.
    pub async fn apply(
        &self,
        req: reqwest::RequestBuilder,
        scope: &Scope,
    ) -> RegistryResult<reqwest::RequestBuilder> {
        match self {
            Authorizer::Basic { username, secret } => Ok(req.basic_auth(username, Some(secret))),
            Authorizer::Token {
                username,
                token_service_url,
                cache,
                http,
            } => {
                let key = format!("{username}|{}", scope.as_param());
                if let Some(token) = cache.get(&key).await {
                    return Ok(req.bearer_auth(token));
                }

                let mut token_req = http.get(token_service_url).query(&[
                    ("service", "registry"),
                    ("scope", scope.as_param().as_str()),
                ]);
                if !username.is_empty() {
                    token_req = token_req.basic_auth(username, None::<&str>);
                }
                let resp = token_req
                    .send()
                    .await
                    .map_err(|e| RegistryError::Opaque(e.into()))?;
                if !resp.status().is_success() {
                    return Err(RegistryError::Structured {
                        status: resp.status(),
                        detail: format!("token service refused scope {}", scope.as_param()),
                    });
                }
                let body: TokenResponse = resp
                    .json()
                    .await
                    .map_err(|e| RegistryError::Opaque(e.into()))?;
                cache
                    .put(key, body.token.clone(), body.expires_in.unwrap_or(60))
                    .await;
                Ok(req.bearer_auth(body.token))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::store::testing::MemoryStore;

    fn session(username: Option<&str>, user_id: Option<i64>) -> SessionData {
        SessionData {
            username: username.map(str::to_string),
            user_id,
        }
    }

    #[tokio::test]
    async fn direct_credentials_win_over_everything() {
        let chain = CredentialChain::new(Arc::new(
            MemoryStore::default().with_user(3, "stored"),
        ));
        let ctx = AuthContext {
            basic: Some(("machine".to_string(), "s3cret".to_string())),
            session: Some(session(Some("alice"), Some(3))),
            ..Default::default()
        };
        let credential = chain.resolve(&ctx).await.unwrap();
        assert_eq!(credential.username, "machine");
        assert_eq!(credential.secret.as_deref(), Some("s3cret"));
    }

    #[tokio::test]
    async fn session_username_beats_session_user_id() {
        let chain = CredentialChain::new(Arc::new(
            MemoryStore::default().with_user(3, "stored"),
        ));
        let ctx = AuthContext {
            session: Some(session(Some("alice"), Some(3))),
            ..Default::default()
        };
        let credential = chain.resolve(&ctx).await.unwrap();
        assert_eq!(credential.username, "alice");
        assert_eq!(credential.secret, None);
    }

    #[tokio::test]
    async fn session_user_id_resolves_through_storage() {
        let chain = CredentialChain::new(Arc::new(
            MemoryStore::default().with_user(3, "stored"),
        ));
        let ctx = AuthContext {
            session: Some(session(None, Some(3))),
            ..Default::default()
        };
        let credential = chain.resolve(&ctx).await.unwrap();
        assert_eq!(credential.username, "stored");
    }

    #[tokio::test]
    async fn no_evidence_resolves_to_anonymous() {
        let chain = CredentialChain::new(Arc::new(MemoryStore::default()));
        let credential = chain.resolve(&AuthContext::default()).await.unwrap();
        assert_eq!(credential, Credential::anonymous());
    }

    #[tokio::test]
    async fn basic_evidence_alone_never_becomes_a_principal() {
        use crate::domain::access::AccessGate;
        use crate::domain::model::Project;

        let store: Arc<dyn ProjectStore> = Arc::new(
            MemoryStore::default()
                .with_user(7, "admin")
                .with_role(7, 1, crate::domain::model::ROLE_PROJECT_ADMIN),
        );
        let ctx = AuthContext {
            basic: Some(("admin".to_string(), "totally-wrong".to_string())),
            ..Default::default()
        };

        let identity = resolve_identity(&ctx, &store, None).await.unwrap();
        assert_eq!(identity, Identity::Anonymous);

        // and anonymous clears neither gate on a private project
        let gate = AccessGate::new(store.clone());
        let project = Project {
            project_id: 1,
            name: "lib".to_string(),
            public: false,
        };
        assert!(!gate.can_view(&identity, &project).await.unwrap());
        assert!(!gate.can_administer(&identity, &project).await.unwrap());
    }

    #[tokio::test]
    async fn matching_service_secret_yields_machine_identity() {
        let store: Arc<dyn ProjectStore> = Arc::new(MemoryStore::default());
        let ctx = AuthContext {
            service_secret: Some("hushhush".to_string()),
            ..Default::default()
        };
        let identity = resolve_identity(&ctx, &store, Some("hushhush")).await.unwrap();
        assert_eq!(identity, Identity::Machine);

        let identity = resolve_identity(&ctx, &store, Some("other")).await.unwrap();
        assert_eq!(identity, Identity::Anonymous);
    }

    #[tokio::test]
    async fn expired_tokens_are_not_served() {
        let cache = TokenCache::new();
        cache.put("k".to_string(), "tok".to_string(), 300).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("tok"));

        // within the safety margin counts as expired
        cache.put("k".to_string(), "tok".to_string(), TOKEN_EXPIRY_MARGIN_SECS - 1).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[test]
    fn scope_renders_as_token_service_parameter() {
        assert_eq!(
            Scope::repository("lib/app").as_param(),
            "repository:lib/app:pull,push,*"
        );
        assert_eq!(Scope::catalog().as_param(), "registry:catalog:*");
    }
}
