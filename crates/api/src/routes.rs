use crate::error::{ApiError, ApiResult};
use crate::middleware::{auth_middleware, AuthenticatedUser};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tickerchat_auth::{hash_password, verify_password};
use tickerchat_core::{Identity, PersistenceError};
use tracing::info;

/// Number of messages returned by `/chat/recent`.
pub const RECENT_CHAT_LIMIT: usize = 50;

pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/protected", get(protected))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Quotes
        .route("/stock/{symbol}", get(stock_quote))
        // Accounts
        .route("/signup", post(signup))
        .route("/login", post(login))
        // Chat history
        .route("/chat/recent", get(recent_messages))
        .merge(protected)
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.hub.connection_count().await,
    }))
}

// ---------------------------------------------------------------------------
// Quotes
// ---------------------------------------------------------------------------

async fn stock_quote(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> impl IntoResponse {
    Json(state.quotes.generate(&symbol))
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    token: String,
    username: String,
}

/// A body that is missing, unparseable or has blank fields is treated alike.
fn credentials(body: Result<Json<Credentials>, JsonRejection>) -> ApiResult<Credentials> {
    match body {
        Ok(Json(creds)) if !creds.username.is_empty() && !creds.password.is_empty() => Ok(creds),
        _ => Err(ApiError::BadRequest(
            "Username and password required".to_string(),
        )),
    }
}

fn token_response(state: &AppState, identity: Identity) -> ApiResult<Json<TokenResponse>> {
    let token = state.auth.issue_token(&identity).map_err(ApiError::internal)?;
    Ok(Json(TokenResponse {
        token,
        username: identity.username,
    }))
}

async fn signup(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Json<TokenResponse>> {
    let Credentials { username, password } = credentials(body)?;

    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::internal)?;

    let user = match state.users.create_user(&username, &hash).await {
        Ok(user) => user,
        Err(PersistenceError::Conflict(_)) => {
            return Err(ApiError::BadRequest("User already exists".to_string()))
        }
        Err(e) => return Err(ApiError::internal(e)),
    };
    info!(user_id = user.id, username = %user.username, "User signed up");

    token_response(&state, user.identity())
}

async fn login(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Json<TokenResponse>> {
    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());
    let Credentials { username, password } = credentials(body).map_err(|_| invalid())?;

    let user = state
        .users
        .find_by_username(&username)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(invalid)?;

    let stored = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(ApiError::internal)?;
    if !matches {
        return Err(invalid());
    }

    token_response(&state, user.identity())
}

async fn protected(
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "message": format!("Hello {}, you are authenticated!", identity.username),
    }))
}

// ---------------------------------------------------------------------------
// Chat history
// ---------------------------------------------------------------------------

async fn recent_messages(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let messages = state
        .chats
        .recent(RECENT_CHAT_LIMIT)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(messages))
}
