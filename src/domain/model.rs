use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Role bindings a principal can hold on a project.
pub const ROLE_PROJECT_ADMIN: i16 = 1;
#[allow(dead_code)]
pub const ROLE_DEVELOPER: i16 = 2;
#[allow(dead_code)]
pub const ROLE_GUEST: i16 = 3;

#[derive(Clone, Debug, FromRow, Serialize)]
pub struct Project {
    pub project_id: i64,
    pub name: String,
    pub public: bool,
}

#[derive(Clone, Debug, FromRow, Serialize)]
pub struct User {
    pub user_id: i64,
    pub username: String,
}

/// A free-text label attached to a repository. Uniqueness is the storage
/// collaborator's concern.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RepoLabel {
    pub repo_name: String,
    pub label: String,
}

#[derive(Clone, Debug, FromRow, Serialize)]
pub struct TopRepo {
    pub name: String,
    pub count: i64,
}

#[derive(Clone, Debug)]
pub struct AccessLogEntry {
    pub username: String,
    pub project_name: String,
    pub repo_name: String,
    pub tag: String,
    pub operation: String,
}

/// Read-only projection of a manifest's v1-compatibility blob, augmented
/// with the computed age. Never persisted.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RepoItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub parent: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub duration_days: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub docker_version: String,
    #[serde(default)]
    pub os: String,
}
