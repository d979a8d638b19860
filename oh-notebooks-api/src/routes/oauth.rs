/// Open Humans login
///
/// # Endpoints
///
/// - `GET /auth/authorize` - Redirect to the Open Humans authorization page
/// - `GET /auth/complete?code=` - Exchange the code and start a session

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use oh_notebooks_shared::{
    auth::session::{create_session_token, SessionClaims},
    models::member::Member,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Query of the Open Humans redirect
#[derive(Debug, Deserialize)]
pub struct CompleteQuery {
    #[serde(default)]
    pub code: String,
}

/// Session started after login
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Bearer token for `/v1/me` routes
    pub session_token: String,

    /// Seconds until the session token expires
    pub expires_in: i64,

    pub member: Member,
}

/// Redirects to Open Humans so the member can authorize this project
///
/// # Errors
///
/// - `503 Service Unavailable`: No Open Humans client id configured
pub async fn authorize(State(state): State<AppState>) -> ApiResult<Redirect> {
    let url = state
        .identity
        .settings()
        .authorize_url()
        .ok_or_else(|| ApiError::ServiceUnavailable("Open Humans login is not configured".to_string()))?;

    Ok(Redirect::to(&url))
}

/// Completes the OAuth2 flow
///
/// # Endpoint
///
/// ```text
/// GET /auth/complete?code=abc123
/// ```
///
/// # Response
///
/// ```json
/// {
///   "session_token": "eyJ...",
///   "expires_in": 1209600,
///   "member": { "oh_id": "12345678", "username": "12345678_openhumans", ... }
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: The code could not be exchanged for a member
pub async fn complete(
    State(state): State<AppState>,
    Query(query): Query<CompleteQuery>,
) -> ApiResult<Json<SessionResponse>> {
    let member = state
        .identity
        .exchange_code_for_member(&query.code)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Open Humans login failed".to_string()))?;

    let claims = SessionClaims::new(&member.oh_id);
    let session_token = create_session_token(&claims, state.session_secret())?;

    info!(oh_id = %member.oh_id, "Member logged in");

    Ok(Json(SessionResponse {
        session_token,
        expires_in: claims.exp - claims.iat,
        member,
    }))
}
