/// Session authentication middleware for Axum
///
/// Validates the `Authorization: Bearer <session token>` header and inserts a
/// [`SessionContext`] into the request extensions for handlers to extract.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use oh_notebooks_shared::auth::middleware::{create_session_middleware, SessionContext};
///
/// async fn whoami(Extension(session): Extension<SessionContext>) -> String {
///     session.oh_id
/// }
///
/// let app: Router = Router::new()
///     .route("/me", get(whoami))
///     .layer(middleware::from_fn(create_session_middleware("secret".to_string())));
/// ```

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::session::{validate_session_token, SessionError};

/// Authenticated member for the current request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Open Humans member id
    pub oh_id: String,
}

/// Authentication failures
#[derive(Debug)]
pub enum AuthError {
    /// Missing authorization header
    MissingCredentials,

    /// Header present but not a Bearer token
    InvalidFormat(String),

    /// Token rejected
    InvalidToken(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingCredentials => {
                (StatusCode::UNAUTHORIZED, "Missing credentials").into_response()
            }
            AuthError::InvalidFormat(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AuthError::InvalidToken(msg) => (StatusCode::UNAUTHORIZED, msg).into_response(),
        }
    }
}

/// Validates the Bearer session token and adds [`SessionContext`]
pub async fn session_auth_middleware(
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    let claims = validate_session_token(token, &secret).map_err(|e| match e {
        SessionError::Expired => AuthError::InvalidToken("Session expired".to_string()),
        other => AuthError::InvalidToken(other.to_string()),
    })?;

    req.extensions_mut().insert(SessionContext { oh_id: claims.sub });

    Ok(next.run(req).await)
}

/// Captures the secret and returns a middleware function for `axum::middleware::from_fn`
pub fn create_session_middleware(
    secret: String,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>> + Clone {
    move |req, next| {
        let secret = secret.clone();
        Box::pin(session_auth_middleware(secret, req, next))
    }
}
