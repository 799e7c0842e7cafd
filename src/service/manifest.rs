use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::model::RepoItem;
use crate::error::AppError;
use crate::registry::MANIFEST_V1_MEDIA_TYPE;
use crate::registry::auth::{AuthContext, resolve_identity};
use crate::service::{owning_project, require_param};
use crate::utils::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ManifestParams {
    repo_name: Option<String>,
    tag: Option<String>,
}

/// Outer shape of a schema1 manifest; only the history entries are read.
#[derive(Deserialize)]
struct ManifestV1 {
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

#[derive(Deserialize)]
struct HistoryEntry {
    #[serde(rename = "v1Compatibility")]
    v1_compatibility: String,
}

/// Pulls a tag's manifest and projects its v1-compatibility blob into a
/// metadata item with a computed age, for the duration of one response.
pub async fn get_manifest_metadata(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<ManifestParams>,
) -> Result<impl IntoResponse, AppError> {
    let repo_name = require_param(params.repo_name.as_ref(), "repo_name")?;
    let tag = require_param(params.tag.as_ref(), "tag")?;

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

    let pulled = client.pull_manifest(&tag, &[MANIFEST_V1_MEDIA_TYPE]).await?;
    // no multi-format negotiation here: anything but the legacy schema1
    // manifest is an error for this extractor
    if pulled.media_type != MANIFEST_V1_MEDIA_TYPE {
        return Err(AppError::Internal(format!(
            "unexpected manifest media type `{}` for {repo_name}:{tag}",
            pulled.media_type
        )));
    }

    let item = decode_metadata(&pulled.payload)?;
    Ok(Json(item))
}

/// Decodes the first history entry's v1-compatibility blob and fills in the
/// age field from its embedded creation time.
pub(crate) fn decode_metadata(payload: &[u8]) -> Result<RepoItem, AppError> {
    let manifest: ManifestV1 = serde_json::from_slice(payload)?;
    let compat = manifest
        .history
        .first()
        .ok_or_else(|| AppError::Internal("manifest carries no history entries".to_string()))?;

    let mut item: RepoItem = serde_json::from_str(&compat.v1_compatibility)?;
    item.duration_days = format_age(item.created, Utc::now());
    Ok(item)
}

/// Whole days elapsed, rendered for display. Zero or negative elapsed time
/// is not special-cased; it just rounds toward zero.
pub(crate) fn format_age(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format!("{} days", (now - created).num_days())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;

    #[test]
    fn forty_eight_hours_renders_as_two_days() {
        let now = Utc::now();
        assert_eq!(format_age(now - Duration::hours(48), now), "2 days");
        assert_eq!(format_age(now - Duration::hours(47), now), "1 days");
        assert_eq!(format_age(now, now), "0 days");
    }

    #[test]
    fn compatibility_blob_is_decoded_from_the_first_history_entry() {
        let blob = json!({
            "id": "abc123",
            "created": "2016-01-02T03:04:05Z",
            "author": "builder",
            "architecture": "amd64",
            "docker_version": "1.10.0",
            "os": "linux",
        })
        .to_string();
        let payload = json!({
            "history": [
                { "v1Compatibility": blob },
                { "v1Compatibility": "{}" },
            ]
        })
        .to_string();

        let item = decode_metadata(payload.as_bytes()).unwrap();
        assert_eq!(item.id, "abc123");
        assert_eq!(item.architecture, "amd64");
        assert!(item.duration_days.ends_with(" days"));
    }

    #[test]
    fn malformed_outer_manifest_is_a_decode_error() {
        let err = decode_metadata(b"not json").unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }

    #[test]
    fn malformed_compatibility_blob_is_a_decode_error() {
        let payload = json!({
            "history": [ { "v1Compatibility": "{ not json" } ]
        })
        .to_string();
        let err = decode_metadata(payload.as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }

    #[test]
    fn missing_history_is_reported_not_conflated_with_not_found() {
        let err = decode_metadata(b"{\"history\":[]}").unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
