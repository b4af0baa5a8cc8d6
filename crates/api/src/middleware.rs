//! Bearer token authentication for protected routes.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tickerchat_auth::extract_bearer_token;
use tickerchat_core::Identity;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Caller identity, inserted into request extensions by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_bearer_token);

    let Some(token) = token else {
        return ApiError::Unauthorized("No token provided".to_string()).into_response();
    };

    match state.auth.verify_token(token) {
        Ok(identity) => {
            request.extensions_mut().insert(AuthenticatedUser(identity));
            next.run(request).await
        }
        Err(e) => {
            debug!(error = %e, "Rejected bearer token");
            ApiError::Unauthorized("Invalid token".to_string()).into_response()
        }
    }
}
