use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Basic;

use crate::error::AppError;
use crate::registry::auth::AuthContext;
use crate::utils::state::AppState;

const SESSION_HEADER: &str = "X-Session-Id";
const SERVICE_SECRET_HEADER: &str = "X-Service-Secret";

/// Collects the request's authentication evidence into an `AuthContext`
/// extension. No decision is made here; resolution happens per operation.
pub async fn auth_context(
    State(state): State<Arc<AppState>>,
    basic: Option<TypedHeader<Authorization<Basic>>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AppError> {
    let session = match header_value(&req, SESSION_HEADER) {
        Some(session_id) => state.sessions.get(&session_id).await,
        None => None,
    };

    let ctx = AuthContext {
        basic: basic.map(|TypedHeader(auth)| {
            (auth.username().to_string(), auth.password().to_string())
        }),
        service_secret: header_value(&req, SERVICE_SECRET_HEADER),
        session,
    };
    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

fn header_value(req: &Request, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
