use std::sync::Arc;

use anyhow::anyhow;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::Config;
use crate::registry::auth::{Authorizer, Credential, Scope, TokenCache};
use crate::registry::catalog::CatalogSource;
use crate::registry::{
    ClientFactory, MANIFEST_V2_MEDIA_TYPE, PulledManifest, RegistryError, RegistryResult,
    RepositoryClient,
};

/// Structured error body the registry attaches to failed responses.
#[derive(Deserialize)]
struct RegistryErrorBody {
    errors: Vec<RegistryErrorEntry>,
}

#[derive(Deserialize)]
struct RegistryErrorEntry {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct CatalogPage {
    #[serde(default)]
    repositories: Vec<String>,
}

const CATALOG_PAGE_SIZE: u32 = 1000;

/// Maps a failed registry response to a structured error, keeping the
/// registry's own code and message when the body carries them.
fn error_from_body(status: StatusCode, body: &[u8]) -> RegistryError {
    match serde_json::from_slice::<RegistryErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => {
            let first = &parsed.errors[0];
            RegistryError::Structured {
                status,
                detail: format!("{}: {}", first.code, first.message),
            }
        }
        _ => RegistryError::Structured {
            status,
            detail: status
                .canonical_reason()
                .unwrap_or("registry error")
                .to_string(),
        },
    }
}

/// Target of the `rel="next"` entry in a Link header, if any.
fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        if !params.contains(r#"rel="next""#) {
            return None;
        }
        let target = target.trim();
        Some(target.strip_prefix('<')?.strip_suffix('>')?.to_string())
    })
}

/// Registry client over the v2 wire protocol, scoped to one repository.
pub struct HttpRepositoryClient {
    repo_name: String,
    endpoint: String,
    scope: Scope,
    authorizer: Authorizer,
    http: reqwest::Client,
}

impl HttpRepositoryClient {
    async fn send(&self, req: reqwest::RequestBuilder) -> RegistryResult<reqwest::Response> {
        let req = self.authorizer.apply(req, &self.scope).await?;
        let resp = req.send().await.map_err(|e| RegistryError::Opaque(e.into()))?;
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = resp.bytes().await.unwrap_or_default();
        Err(error_from_body(status, &body))
    }
}

#[async_trait::async_trait]
impl RepositoryClient for HttpRepositoryClient {
    async fn list_tags(&self) -> RegistryResult<Vec<String>> {
        let url = format!("{}/v2/{}/tags/list", self.endpoint, self.repo_name);
        let resp = self.send(self.http.get(&url)).await?;
        let list: TagList = resp
            .json()
            .await
            .map_err(|e| RegistryError::Opaque(e.into()))?;
        // the registry reports a null tag array for repositories it has
        // garbage-collected but still lists
        Ok(list.tags.unwrap_or_default())
    }

    async fn delete_tag(&self, tag: &str) -> RegistryResult<()> {
        // the wire protocol deletes manifests by digest, so the tag is
        // resolved through a HEAD on the manifest first
        let url = format!("{}/v2/{}/manifests/{}", self.endpoint, self.repo_name, tag);
        let resp = self
            .send(self.http.head(&url).header("Accept", MANIFEST_V2_MEDIA_TYPE))
            .await?;
        let digest = resp
            .headers()
            .get("Docker-Content-Digest")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                RegistryError::Opaque(anyhow!(
                    "manifest response for {}:{tag} carries no Docker-Content-Digest header",
                    self.repo_name
                ))
            })?;

        let url = format!("{}/v2/{}/manifests/{digest}", self.endpoint, self.repo_name);
        self.send(self.http.delete(&url)).await?;
        Ok(())
    }

    async fn pull_manifest(&self, tag: &str, accepted: &[&str]) -> RegistryResult<PulledManifest> {
        let url = format!("{}/v2/{}/manifests/{}", self.endpoint, self.repo_name, tag);
        let resp = self
            .send(self.http.get(&url).header("Accept", accepted.join(", ")))
            .await?;

        let media_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let digest = resp
            .headers()
            .get("Docker-Content-Digest")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let payload = resp
            .bytes()
            .await
            .map_err(|e| RegistryError::Opaque(e.into()))?
            .to_vec();

        Ok(PulledManifest {
            media_type,
            digest,
            payload,
        })
    }
}

/// Builds per-request clients bound to one repository, plus the catalog
/// source. All of them share one HTTP connection pool and token cache.
pub struct HttpClientFactory {
    endpoint: String,
    token_service_url: String,
    token_cache: Arc<TokenCache>,
    http: reqwest::Client,
}

impl HttpClientFactory {
    pub fn new(config: &Config) -> anyhow::Result<HttpClientFactory> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .build()?;
        Ok(HttpClientFactory {
            endpoint: config.registry_url.trim_end_matches('/').to_string(),
            token_service_url: config.token_service_url.clone(),
            token_cache: Arc::new(TokenCache::new()),
            http,
        })
    }

    /// Catalog listings run under the registry-wide catalog scope with no
    /// user identity attached.
    pub fn catalog_source(&self) -> HttpCatalogSource {
        HttpCatalogSource {
            endpoint: self.endpoint.clone(),
            scope: Scope::catalog(),
            authorizer: self.authorizer_for(&Credential::anonymous()),
            http: self.http.clone(),
        }
    }

    fn authorizer_for(&self, credential: &Credential) -> Authorizer {
        match &credential.secret {
            Some(secret) => Authorizer::Basic {
                username: credential.username.clone(),
                secret: secret.clone(),
            },
            None => Authorizer::Token {
                username: credential.username.clone(),
                token_service_url: self.token_service_url.clone(),
                cache: self.token_cache.clone(),
                http: self.http.clone(),
            },
        }
    }
}

impl ClientFactory for HttpClientFactory {
    fn scoped(&self, repo_name: &str, credential: &Credential) -> Arc<dyn RepositoryClient> {
        Arc::new(HttpRepositoryClient {
            repo_name: repo_name.to_string(),
            endpoint: self.endpoint.clone(),
            scope: Scope::repository(repo_name),
            authorizer: self.authorizer_for(credential),
            http: self.http.clone(),
        })
    }
}

pub struct HttpCatalogSource {
    endpoint: String,
    scope: Scope,
    authorizer: Authorizer,
    http: reqwest::Client,
}

#[async_trait::async_trait]
impl CatalogSource for HttpCatalogSource {
    /// Collects the full catalog, following `Link: rel="next"` pagination
    /// until the registry stops handing out a next page.
    async fn fetch(&self) -> RegistryResult<Vec<String>> {
        let mut repos = Vec::new();
        let mut url = format!("{}/v2/_catalog?n={CATALOG_PAGE_SIZE}", self.endpoint);
        loop {
            let req = self
                .authorizer
                .apply(self.http.get(&url), &self.scope)
                .await?;
            let resp = req.send().await.map_err(|e| RegistryError::Opaque(e.into()))?;
            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.bytes().await.unwrap_or_default();
                return Err(error_from_body(status, &body));
            }

            let next = resp
                .headers()
                .get(reqwest::header::LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(next_link);
            let page: CatalogPage = resp
                .json()
                .await
                .map_err(|e| RegistryError::Opaque(e.into()))?;
            repos.extend(page.repositories);

            match next {
                // next targets are server-relative paths
                Some(path) if path.starts_with('/') => {
                    url = format!("{}{path}", self.endpoint);
                }
                Some(absolute) => url = absolute,
                None => return Ok(repos),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_page_target_is_read_from_the_link_header() {
        assert_eq!(
            next_link(r#"</v2/_catalog?last=lib%2Fapp&n=1000>; rel="next""#).as_deref(),
            Some("/v2/_catalog?last=lib%2Fapp&n=1000")
        );
        assert_eq!(next_link(r#"</v2/_catalog?n=1000>; rel="prev""#), None);
        assert_eq!(next_link("garbage"), None);
    }

    #[test]
    fn structured_error_bodies_keep_code_and_message() {
        let body = br#"{"errors":[{"code":"NAME_UNKNOWN","message":"repository name not known"}]}"#;
        match error_from_body(StatusCode::NOT_FOUND, body) {
            RegistryError::Structured { status, detail } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(detail, "NAME_UNKNOWN: repository name not known");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn shapeless_error_bodies_fall_back_to_the_canonical_reason() {
        match error_from_body(StatusCode::BAD_GATEWAY, b"<html>upstream died</html>") {
            RegistryError::Structured { status, detail } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(detail, "Bad Gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
