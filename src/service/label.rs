use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::domain::model::RepoLabel;
use crate::error::AppError;
use crate::service::require_param;
use crate::utils::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LabelParams {
    repo_name: Option<String>,
    label: Option<String>,
}

/// Attaches a label to a repository; answers the inserted id.
pub async fn add_label(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LabelParams>,
) -> Result<impl IntoResponse, AppError> {
    let label = require_both(&params)?;
    let inserted = state.store.add_label(&label).await?;
    Ok(Json(inserted))
}

/// Detaches a label; answers the number of removed rows.
pub async fn delete_label(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LabelParams>,
) -> Result<impl IntoResponse, AppError> {
    let label = require_both(&params)?;
    let affected = state.store.delete_label(&label).await?;
    Ok(Json(affected))
}

pub async fn get_labels(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LabelParams>,
) -> Result<impl IntoResponse, AppError> {
    let repo_name = require_param(params.repo_name.as_ref(), "repo_name")?;
    let labels = state.store.repo_labels(&repo_name).await?;
    Ok(Json(labels))
}

/// Repository names carrying a given label.
pub async fn repos_by_label(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LabelParams>,
) -> Result<impl IntoResponse, AppError> {
    let label = require_param(params.label.as_ref(), "label")?;
    let repos = state.store.repos_by_label(&label).await?;
    Ok(Json(repos))
}

fn require_both(params: &LabelParams) -> Result<RepoLabel, AppError> {
    Ok(RepoLabel {
        repo_name: require_param(params.repo_name.as_ref(), "repo_name")?,
        label: require_param(params.label.as_ref(), "label")?,
    })
}
