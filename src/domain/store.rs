use std::sync::Arc;

use sqlx::PgPool;

use crate::domain::model::{AccessLogEntry, Project, RepoLabel, TopRepo, User};
use crate::error::AppError;

type Result<T> = std::result::Result<T, AppError>;

/// Lookup/record-append interface over the persistence collaborator.
/// Projects, users and role bindings are only ever read here.
#[async_trait::async_trait]
pub trait ProjectStore: Send + Sync {
    async fn project_by_id(&self, id: i64) -> Result<Option<Project>>;

    async fn project_by_name(&self, name: &str) -> Result<Option<Project>>;

    async fn user_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn user_by_name(&self, name: &str) -> Result<Option<User>>;

    /// Role binding of a user on a project, if any.
    async fn project_role(&self, user_id: i64, project_id: i64) -> Result<Option<i16>>;

    async fn repo_labels(&self, repo_name: &str) -> Result<Vec<String>>;

    /// Returns the inserted label id.
    async fn add_label(&self, label: &RepoLabel) -> Result<i64>;

    /// Returns the number of removed rows.
    async fn delete_label(&self, label: &RepoLabel) -> Result<u64>;

    async fn repos_by_label(&self, label: &str) -> Result<Vec<String>>;

    async fn top_repos(&self, count: i64) -> Result<Vec<TopRepo>>;

    async fn append_access_log(&self, entry: &AccessLogEntry) -> Result<()>;
}

#[derive(Debug)]
pub struct PgProjectStore {
    pool: Arc<PgPool>,
}

impl PgProjectStore {
    pub fn new(pool: Arc<PgPool>) -> PgProjectStore {
        PgProjectStore { pool }
    }
}

#[async_trait::async_trait]
impl ProjectStore for PgProjectStore {
    async fn project_by_id(&self, id: i64) -> Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>(
            "SELECT project_id, name, public FROM project WHERE project_id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;
        Ok(project)
    }

    async fn project_by_name(&self, name: &str) -> Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>(
            "SELECT project_id, name, public FROM project WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(self.pool.as_ref())
        .await?;
        Ok(project)
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>> {
        let user =
            sqlx::query_as::<_, User>("SELECT user_id, username FROM registry_user WHERE user_id = $1")
                .bind(id)
                .fetch_optional(self.pool.as_ref())
                .await?;
        Ok(user)
    }

    async fn user_by_name(&self, name: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, username FROM registry_user WHERE username = $1",
        )
        .bind(name)
        .fetch_optional(self.pool.as_ref())
        .await?;
        Ok(user)
    }

    async fn project_role(&self, user_id: i64, project_id: i64) -> Result<Option<i16>> {
        let role = sqlx::query_scalar::<_, i16>(
            "SELECT role FROM project_member WHERE user_id = $1 AND project_id = $2",
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(self.pool.as_ref())
        .await?;
        Ok(role)
    }

    async fn repo_labels(&self, repo_name: &str) -> Result<Vec<String>> {
        let labels =
            sqlx::query_scalar::<_, String>("SELECT label FROM repo_label WHERE repo_name = $1")
                .bind(repo_name)
                .fetch_all(self.pool.as_ref())
                .await?;
        Ok(labels)
    }

    async fn add_label(&self, label: &RepoLabel) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO repo_label (repo_name, label) VALUES ($1, $2) RETURNING id",
        )
        .bind(&label.repo_name)
        .bind(&label.label)
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(id)
    }

    async fn delete_label(&self, label: &RepoLabel) -> Result<u64> {
        let result = sqlx::query("DELETE FROM repo_label WHERE repo_name = $1 AND label = $2")
            .bind(&label.repo_name)
            .bind(&label.label)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected())
    }

    async fn repos_by_label(&self, label: &str) -> Result<Vec<String>> {
        let repos =
            sqlx::query_scalar::<_, String>("SELECT repo_name FROM repo_label WHERE label = $1")
                .bind(label)
                .fetch_all(self.pool.as_ref())
                .await?;
        Ok(repos)
    }

    async fn top_repos(&self, count: i64) -> Result<Vec<TopRepo>> {
        let repos = sqlx::query_as::<_, TopRepo>(
            "SELECT repo_name AS name, COUNT(*) AS count FROM access_log \
             WHERE operation = 'pull' GROUP BY repo_name ORDER BY count DESC LIMIT $1",
        )
        .bind(count)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(repos)
    }

    async fn append_access_log(&self, entry: &AccessLogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO access_log (username, project_name, repo_name, tag, operation, op_time) \
             VALUES ($1, $2, $3, $4, $5, NOW())",
        )
        .bind(&entry.username)
        .bind(&entry.project_name)
        .bind(&entry.repo_name)
        .bind(&entry.tag)
        .bind(&entry.operation)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }
}
