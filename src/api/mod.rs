pub mod middleware;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::service::{label, manifest, repository, tag};
use crate::utils::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/repositories", get(repository::list_repositories))
        .route("/api/repositories/top", get(repository::top_repositories))
        .route(
            "/api/repositories/tags",
            get(tag::list_tags).delete(tag::delete_tags),
        )
        .route(
            "/api/repositories/manifests",
            get(manifest::get_manifest_metadata),
        )
        .route(
            "/api/repositories/labels",
            post(label::add_label)
                .get(label::get_labels)
                .delete(label::delete_label),
        )
        .route("/api/repositories/names", get(label::repos_by_label))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_context,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
