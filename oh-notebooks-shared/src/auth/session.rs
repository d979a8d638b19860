/// Session tokens
///
/// After the OAuth2 flow completes the service issues its own HS256 JWT whose
/// subject is the member's Open Humans id. Protected routes accept it as a
/// Bearer token. Open Humans tokens never leave the server.
///
/// # Example
///
/// ```
/// use oh_notebooks_shared::auth::session::{create_session_token, validate_session_token, SessionClaims};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-session-secret-that-is-32-bytes!";
/// let token = create_session_token(&SessionClaims::new("12345678"), secret)?;
///
/// let claims = validate_session_token(&token, secret)?;
/// assert_eq!(claims.sub, "12345678");
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const ISSUER: &str = "oh-notebooks";

/// Errors creating or validating session tokens
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to create session token: {0}")]
    Create(String),

    #[error("Session has expired")]
    Expired,

    #[error("Invalid session token: {0}")]
    Invalid(String),
}

/// Session JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Open Humans member id
    pub sub: String,

    /// Always "oh-notebooks"
    pub iss: String,

    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
}

impl SessionClaims {
    /// Default session lifetime
    pub fn default_lifetime() -> Duration {
        Duration::days(14)
    }

    /// Claims for `oh_id` valid for the default lifetime
    pub fn new(oh_id: &str) -> Self {
        Self::with_lifetime(oh_id, Self::default_lifetime())
    }

    /// Claims for `oh_id` valid for `lifetime`
    pub fn with_lifetime(oh_id: &str, lifetime: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: oh_id.to_string(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            nbf: now.timestamp(),
        }
    }
}

/// Signs claims with HS256
pub fn create_session_token(claims: &SessionClaims, secret: &str) -> Result<String, SessionError> {
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| SessionError::Create(e.to_string()))
}

/// Verifies signature, issuer, expiry and not-before
pub fn validate_session_token(token: &str, secret: &str) -> Result<SessionClaims, SessionError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let data = decode::<SessionClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
        _ => SessionError::Invalid(e.to_string()),
    })?;

    Ok(data.claims)
}
