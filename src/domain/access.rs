use std::sync::Arc;

use crate::domain::model::{Project, ROLE_PROJECT_ADMIN};
use crate::domain::store::ProjectStore;
use crate::error::AppError;

/// Effective caller identity, after evidence resolution.
#[derive(Clone, Debug, PartialEq)]
pub enum Identity {
    /// Machine caller that presented the recognized shared service secret.
    /// Passes both gates without any project role binding.
    Machine,
    User { user_id: i64, username: String },
    Anonymous,
}

/// Decides whether an identity may act on a project, independent of how the
/// caller authenticated.
pub struct AccessGate {
    store: Arc<dyn ProjectStore>,
}

impl AccessGate {
    pub fn new(store: Arc<dyn ProjectStore>) -> AccessGate {
        AccessGate { store }
    }

    /// Read access: public projects are visible to everyone, anonymous
    /// included. Private projects require any role binding on the project.
    pub async fn can_view(&self, identity: &Identity, project: &Project) -> Result<bool, AppError> {
        if project.public {
            return Ok(true);
        }
        match identity {
            Identity::Machine => Ok(true),
            Identity::User { user_id, .. } => Ok(self
                .store
                .project_role(*user_id, project.project_id)
                .await?
                .is_some()),
            Identity::Anonymous => Ok(false),
        }
    }

    /// Tag deletion requires the project-admin binding even on public
    /// projects; visibility never bypasses this check.
    pub async fn can_administer(
        &self,
        identity: &Identity,
        project: &Project,
    ) -> Result<bool, AppError> {
        match identity {
            Identity::Machine => Ok(true),
            Identity::User { user_id, .. } => Ok(self
                .store
                .project_role(*user_id, project.project_id)
                .await?
                == Some(ROLE_PROJECT_ADMIN)),
            Identity::Anonymous => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ROLE_DEVELOPER, ROLE_GUEST};
    use crate::domain::store::testing::MemoryStore;

    fn project(id: i64, public: bool) -> Project {
        Project {
            project_id: id,
            name: "lib".to_string(),
            public,
        }
    }

    fn user(id: i64) -> Identity {
        Identity::User {
            user_id: id,
            username: format!("user{id}"),
        }
    }

    #[tokio::test]
    async fn public_projects_are_visible_to_anonymous() {
        let gate = AccessGate::new(Arc::new(MemoryStore::default()));
        assert!(gate.can_view(&Identity::Anonymous, &project(1, true)).await.unwrap());
    }

    #[tokio::test]
    async fn private_projects_require_a_role_binding() {
        let store = MemoryStore::default().with_role(7, 1, ROLE_GUEST);
        let gate = AccessGate::new(Arc::new(store));
        let p = project(1, false);
        assert!(gate.can_view(&user(7), &p).await.unwrap());
        assert!(!gate.can_view(&user(8), &p).await.unwrap());
        assert!(!gate.can_view(&Identity::Anonymous, &p).await.unwrap());
    }

    #[tokio::test]
    async fn deletion_needs_admin_even_on_public_projects() {
        let store = MemoryStore::default()
            .with_role(7, 1, ROLE_PROJECT_ADMIN)
            .with_role(8, 1, ROLE_DEVELOPER);
        let gate = AccessGate::new(Arc::new(store));
        let p = project(1, true);
        assert!(gate.can_administer(&user(7), &p).await.unwrap());
        assert!(!gate.can_administer(&user(8), &p).await.unwrap());
        assert!(!gate.can_administer(&Identity::Anonymous, &p).await.unwrap());
    }

    #[tokio::test]
    async fn machine_identity_bypasses_both_gates() {
        let gate = AccessGate::new(Arc::new(MemoryStore::default()));
        let p = project(1, false);
        assert!(gate.can_view(&Identity::Machine, &p).await.unwrap());
        assert!(gate.can_administer(&Identity::Machine, &p).await.unwrap());
    }
}
