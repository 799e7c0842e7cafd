use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::domain::model::AccessLogEntry;
use crate::error::AppError;
use crate::registry::RepositoryClient;
use crate::registry::auth::{AuthContext, resolve_identity};
use crate::replication::RepOp;
use crate::service::{owning_project, require_param};
use crate::utils::state::AppState;
use crate::utils::validation::{is_valid_repo_name, is_valid_tag};

#[derive(Debug, Deserialize)]
pub struct TagParams {
    repo_name: Option<String>,
    tag: Option<String>,
}

/// Lists the tags of a repository, always in ascending lexicographic order
/// regardless of the registry's return order.
pub async fn list_tags(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<TagParams>,
) -> Result<impl IntoResponse, AppError> {
    let repo_name = valid_repo_name(&params)?;
    let project = owning_project(&state, &repo_name).await?;

    if !project.public {
        let identity =
            resolve_identity(&auth, &state.store, state.config.service_secret.as_deref()).await?;
        if !state.gate.can_view(&identity, &project).await? {
            return Err(AppError::Forbidden("project is private".to_string()));
        }
    }

    let credential = state.credentials.resolve(&auth).await?;
    let client = state.clients.scoped(&repo_name, &credential);
    let tags = sorted_tags(client.as_ref()).await?;
    Ok(Json(tags))
}

pub(crate) async fn sorted_tags(client: &dyn RepositoryClient) -> Result<Vec<String>, AppError> {
    let mut tags = client.list_tags().await?;
    tags.sort();
    Ok(tags)
}

/// Deletes one tag, or every tag of the repository when none is given.
///
/// Deletion always requires the project-admin binding; public visibility
/// does not soften this.
pub async fn delete_tags(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<TagParams>,
) -> Result<impl IntoResponse, AppError> {
    let repo_name = valid_repo_name(&params)?;
    let project = owning_project(&state, &repo_name).await?;

    let identity =
        resolve_identity(&auth, &state.store, state.config.service_secret.as_deref()).await?;
    if !state.gate.can_administer(&identity, &project).await? {
        return Err(AppError::Forbidden("project admin role required".to_string()));
    }

    let credential = state.credentials.resolve(&auth).await?;
    let client = state.clients.scoped(&repo_name, &credential);

    let tags = match &params.tag {
        Some(tag) if !tag.is_empty() => {
            if !is_valid_tag(tag) {
                return Err(AppError::BadRequest(format!("invalid tag `{tag}`")));
            }
            vec![tag.clone()]
        }
        _ => {
            let listed = client.list_tags().await?;
            // a successful but empty listing means there is nothing to
            // delete; upstream policy reports that as not found
            if listed.is_empty() && state.config.empty_repo_not_found {
                return Err(AppError::NotFound(format!("repository `{repo_name}`")));
            }
            listed
        }
    };

    // the chain prefers direct credentials, so this is also the audit actor
    let actor = credential.username;

    delete_and_cascade(&state, &project.name, &repo_name, client, &tags, &actor).await?;
    Ok(StatusCode::OK)
}

/// Sequential per-tag deletion with detached fan-out.
///
/// The first registry failure aborts the remaining tags; side effects
/// already dispatched for earlier tags stand. Replication and audit logging
/// fire per deleted tag, the catalog refresh once after the whole loop.
/// None of them ever surfaces to the caller.
pub(crate) async fn delete_and_cascade(
    state: &AppState,
    project_name: &str,
    repo_name: &str,
    client: Arc<dyn RepositoryClient>,
    tags: &[String],
    actor: &str,
) -> Result<(), AppError> {
    for tag in tags {
        client.delete_tag(tag).await?;
        tracing::info!("deleted tag {repo_name}:{tag}");

        let replication = state.replication.clone();
        let repo = repo_name.to_string();
        let deleted = vec![tag.clone()];
        state.spawn_background(async move {
            if let Err(err) = replication.trigger(&repo, &deleted, RepOp::Delete).await {
                tracing::error!("failed to trigger replication for {repo}: {err}");
            }
        });

        let store = state.store.clone();
        let entry = AccessLogEntry {
            username: actor.to_string(),
            project_name: project_name.to_string(),
            repo_name: repo_name.to_string(),
            tag: tag.clone(),
            operation: "delete".to_string(),
        };
        state.spawn_background(async move {
            if let Err(err) = store.append_access_log(&entry).await {
                tracing::error!("failed to append access log: {err}");
            }
        });
    }

    let catalog = state.catalog.clone();
    state.spawn_background(async move {
        tracing::debug!("refreshing catalog cache");
        if let Err(err) = catalog.refresh().await {
            tracing::error!("failed to refresh catalog cache: {err}");
        }
    });

    Ok(())
}

fn valid_repo_name(params: &TagParams) -> Result<String, AppError> {
    let repo_name = require_param(params.repo_name.as_ref(), "repo_name")?;
    if !is_valid_repo_name(&repo_name) {
        return Err(AppError::BadRequest(format!(
            "invalid repository name `{repo_name}`"
        )));
    }
    Ok(repo_name)
}
