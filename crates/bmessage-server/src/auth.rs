//! Bearer authentication for the API routes.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::AppState;
use crate::error::ServerError;

/// Id of the authenticated caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

/// Resolve the `Authorization` header to a user, record the activity and
/// pass the user id on to the handler.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let credential = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(ServerError::Unauthorized)?
        .to_string();

    let user = state.run(move |m| m.authenticate(&credential)).await?;
    request.extensions_mut().insert(CurrentUser(user.id));

    Ok(next.run(request).await)
}
