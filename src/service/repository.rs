use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::domain::store::ProjectStore;
use crate::error::AppError;
use crate::registry::auth::{AuthContext, resolve_identity};
use crate::registry::catalog::matches_project_query;
use crate::utils::repo_identifier::project_prefix;
use crate::utils::state::AppState;

const DEFAULT_TOP_COUNT: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct ListRepoQuery {
    project_id: Option<String>,
    q: Option<String>,
}

/// Lists repositories of a project from the cached catalog, optionally
/// filtered by a free-text query that also matches attached labels.
pub async fn list_repositories(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<ListRepoQuery>,
) -> Result<impl IntoResponse, AppError> {
    let project_id = params
        .project_id
        .as_deref()
        .and_then(|raw| raw.parse::<i64>().ok())
        .ok_or_else(|| AppError::BadRequest("invalid project id".to_string()))?;

    let project = state
        .store
        .project_by_id(project_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("project {project_id}")))?;

    if !project.public {
        let identity =
            resolve_identity(&auth, &state.store, state.config.service_secret.as_deref()).await?;
        if !state.gate.can_view(&identity, &project).await? {
            return Err(AppError::Forbidden("project is private".to_string()));
        }
    }

    let catalog = state.catalog.list().await?;
    let resp = search_catalog(
        &catalog,
        &project.name,
        params.q.as_deref().unwrap_or_default(),
        &state.store,
    )
    .await?;
    Ok(Json(resp))
}

/// Filters the catalog snapshot. With a query: repositories under the
/// project whose last segment contains it, plus any matching labels (the
/// response mixes repository names and label texts, as the API always has).
/// Without a query but with a project: everything under the project prefix.
/// With neither: the whole snapshot.
pub(crate) async fn search_catalog(
    catalog: &[String],
    project_name: &str,
    query: &str,
    store: &Arc<dyn ProjectStore>,
) -> Result<Vec<String>, AppError> {
    let mut resp = Vec::new();
    if !query.is_empty() {
        for repo_name in catalog {
            if matches_project_query(repo_name, project_name, query) {
                resp.push(repo_name.clone());
            }
            // label lookup failures only drop label matches, never the listing
            for label in store.repo_labels(repo_name).await.unwrap_or_default() {
                if label.contains(query) {
                    resp.push(label);
                }
            }
        }
    } else if !project_name.is_empty() {
        for repo_name in catalog {
            if repo_name.contains('/') && project_prefix(repo_name) == project_name {
                resp.push(repo_name.clone());
            }
        }
    } else {
        resp = catalog.to_vec();
    }
    Ok(resp)
}

#[derive(Debug, Deserialize)]
pub struct TopRepoQuery {
    count: Option<String>,
}

/// Most-accessed repositories, ranked by the storage collaborator.
pub async fn top_repositories(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TopRepoQuery>,
) -> Result<impl IntoResponse, AppError> {
    let count = parse_count(params.count.as_deref())?;
    let repos = state.store.top_repos(count).await?;
    Ok(Json(repos))
}

fn parse_count(raw: Option<&str>) -> Result<i64, AppError> {
    match raw {
        None | Some("") => Ok(DEFAULT_TOP_COUNT),
        Some(raw) => {
            let count: i64 = raw
                .parse()
                .map_err(|_| AppError::BadRequest("bad request of count".to_string()))?;
            if count <= 0 {
                return Err(AppError::BadRequest("count is 0 or negative".to_string()));
            }
            Ok(count)
        }
    }
}
