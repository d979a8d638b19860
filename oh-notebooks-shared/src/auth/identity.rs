/// Member identity service
///
/// Owns the OAuth2 lifecycle of Open Humans members:
///
/// - exchanging an authorization code for tokens and a member record
/// - handing out a valid access token, refreshing it when it is within
///   [`REFRESH_MARGIN_SECONDS`] of expiry
/// - generating unique local usernames for new members
///
/// Remote failures never surface as errors. A failed code exchange yields
/// `None`; a failed refresh keeps the stale token, so downstream calls fail
/// with an authorization error instead. Only database errors propagate.
///
/// Refreshes of the same member are not coordinated across requests; the
/// last write wins.
///
/// # Example
///
/// ```no_run
/// use oh_notebooks_shared::auth::identity::{IdentityService, OAuthSettings};
/// use oh_notebooks_shared::clock::SystemClock;
/// use oh_notebooks_shared::openhumans::client::OpenHumansClient;
/// use std::sync::Arc;
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let settings = OAuthSettings {
///     client_id: Some("client-id".to_string()),
///     client_secret: Some("client-secret".to_string()),
///     oh_base_url: "https://www.openhumans.org".to_string(),
///     app_base_url: "https://notebooks.example.org".to_string(),
/// };
/// let api = Arc::new(OpenHumansClient::new(&settings.oh_base_url)?);
/// let identity = IdentityService::new(pool, api, Arc::new(SystemClock), settings);
///
/// if let Some(mut member) = identity.exchange_code_for_member("code-from-redirect").await? {
///     let token = identity.valid_access_token(&mut member).await?;
///     println!("{} -> {}", member.oh_id, token);
/// }
/// # Ok(())
/// # }
/// ```
///
/// [`REFRESH_MARGIN_SECONDS`]: crate::models::member::REFRESH_MARGIN_SECONDS

use crate::clock::SharedClock;
use crate::models::member::{CreateMember, Member};
use crate::openhumans::{
    ClientCredentials, MemberData, OhError, OpenHumansApi, TokenRequest,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Errors from operations that need both the database and Open Humans
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    OpenHumans(#[from] OhError),
}

/// OAuth2 client configuration
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    /// Open Humans OAuth2 client id
    pub client_id: Option<String>,

    /// Open Humans OAuth2 client secret
    pub client_secret: Option<String>,

    /// Open Humans base URL
    pub oh_base_url: String,

    /// Public base URL of this service
    pub app_base_url: String,
}

impl OAuthSettings {
    /// Client credentials, if both id and secret are set and non-empty
    pub fn credentials(&self) -> Option<ClientCredentials> {
        let client_id = self.client_id.as_deref().filter(|s| !s.is_empty())?;
        let client_secret = self.client_secret.as_deref().filter(|s| !s.is_empty())?;

        Some(ClientCredentials {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    /// Where Open Humans sends the member back after authorization
    pub fn redirect_uri(&self) -> String {
        format!("{}/auth/complete", self.app_base_url.trim_end_matches('/'))
    }

    /// Open Humans authorization page for this client
    ///
    /// None when no client id is configured.
    pub fn authorize_url(&self) -> Option<String> {
        let client_id = self.client_id.as_deref().filter(|s| !s.is_empty())?;
        let base = format!(
            "{}/direct-sharing/projects/oauth2/authorize/",
            self.oh_base_url.trim_end_matches('/')
        );
        let redirect_uri = self.redirect_uri();

        reqwest::Url::parse_with_params(
            &base,
            &[
                ("client_id", client_id),
                ("response_type", "code"),
                ("redirect_uri", redirect_uri.as_str()),
            ],
        )
        .map(String::from)
        .map_err(|e| error!(error = %e, "Invalid Open Humans base URL"))
        .ok()
    }
}

/// OAuth2 credential lifecycle for Open Humans members
#[derive(Clone)]
pub struct IdentityService {
    pool: PgPool,
    api: Arc<dyn OpenHumansApi>,
    clock: SharedClock,
    settings: OAuthSettings,
}

impl IdentityService {
    pub fn new(
        pool: PgPool,
        api: Arc<dyn OpenHumansApi>,
        clock: SharedClock,
        settings: OAuthSettings,
    ) -> Self {
        Self {
            pool,
            api,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    /// Exchanges an authorization code for a member
    ///
    /// Creates the member on first authorization and replaces the stored
    /// tokens on re-authorization. Returns `Ok(None)` when the client is not
    /// configured, the code is empty, Open Humans rejects the exchange or
    /// cannot be reached; each case is logged.
    ///
    /// # Errors
    ///
    /// Only database failures are returned.
    pub async fn exchange_code_for_member(&self, code: &str) -> Result<Option<Member>, sqlx::Error> {
        let credentials = match self.settings.credentials() {
            Some(credentials) if !code.is_empty() => credentials,
            _ => {
                error!("Open Humans client secret or code are unavailable");
                return Ok(None);
            }
        };

        let request = TokenRequest::AuthorizationCode {
            code: code.to_string(),
            redirect_uri: self.settings.redirect_uri(),
        };

        let response = match self.api.request_token(&credentials, &request).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Token exchange request failed");
                return Ok(None);
            }
        };

        let Some(tokens) = response.body.issued() else {
            if response.body.error.is_some() {
                debug!(status = response.status, body = ?response.body, "Error in token exchange");
            } else {
                warn!(status = response.status, "Neither token nor error info in Open Humans response");
            }
            return Ok(None);
        };

        let Some(token_expires) = Member::expiration(self.clock.now(), tokens.expires_in) else {
            warn!(expires_in = tokens.expires_in, "Token lifetime out of range in token exchange");
            return Ok(None);
        };

        let identity = match self.api.exchange_member(&tokens.access_token).await {
            Ok(identity) => identity,
            Err(e) => {
                error!(error = %e, "Member lookup after token exchange failed");
                return Ok(None);
            }
        };

        let oh_id = identity.project_member_id;

        if let Some(member) = Member::update_tokens(
            &self.pool,
            &oh_id,
            &tokens.access_token,
            &tokens.refresh_token,
            token_expires,
        )
        .await?
        {
            debug!(oh_id = %oh_id, "Member re-authorized");
            return Ok(Some(member));
        }

        let username = self.make_unique_username(&format!("{oh_id}_openhumans")).await?;
        let member = Member::create(
            &self.pool,
            CreateMember {
                oh_id,
                username,
                oh_username: identity.username,
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                token_expires,
            },
        )
        .await?;

        info!(oh_id = %member.oh_id, username = %member.username, "Member created");
        Ok(Some(member))
    }

    /// Returns an access token for `member`, refreshing it first if needed
    ///
    /// A token is refreshed when it expires within 60 seconds (inclusive) or
    /// already has. On a successful refresh `member` is updated in place and
    /// persisted. On failure the stale token is returned unchanged.
    pub async fn valid_access_token(&self, member: &mut Member) -> Result<String, sqlx::Error> {
        if member.needs_refresh(self.clock.now()) {
            self.refresh_tokens(member).await?;
        }

        Ok(member.access_token.clone())
    }

    /// Calls the refresh grant and stores the new tokens
    ///
    /// Returns whether the tokens were replaced.
    async fn refresh_tokens(&self, member: &mut Member) -> Result<bool, sqlx::Error> {
        let Some(credentials) = self.settings.credentials() else {
            warn!(oh_id = %member.oh_id, "Cannot refresh token: client credentials not configured");
            return Ok(false);
        };

        let request = TokenRequest::RefreshToken {
            refresh_token: member.refresh_token.clone(),
        };

        let response = match self.api.request_token(&credentials, &request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(oh_id = %member.oh_id, error = %e, "Token refresh request failed");
                return Ok(false);
            }
        };

        let tokens = match response.body.issued() {
            Some(tokens) if response.is_ok() => tokens,
            _ => {
                warn!(
                    oh_id = %member.oh_id,
                    status = response.status,
                    "Token refresh rejected, keeping stored token"
                );
                return Ok(false);
            }
        };

        let Some(token_expires) = Member::expiration(self.clock.now(), tokens.expires_in) else {
            warn!(
                oh_id = %member.oh_id,
                expires_in = tokens.expires_in,
                "Refreshed token lifetime out of range, keeping stored token"
            );
            return Ok(false);
        };

        match Member::update_tokens(
            &self.pool,
            &member.oh_id,
            &tokens.access_token,
            &tokens.refresh_token,
            token_expires,
        )
        .await?
        {
            Some(updated) => *member = updated,
            None => {
                warn!(oh_id = %member.oh_id, "Refreshed tokens for a member that no longer exists");
                member.access_token = tokens.access_token;
                member.refresh_token = tokens.refresh_token;
                member.token_expires = token_expires;
            }
        }

        debug!(oh_id = %member.oh_id, expires = %member.token_expires, "Access token refreshed");
        Ok(true)
    }

    /// Fetches the member's identity and files with a valid token
    pub async fn member_data(&self, member: &mut Member) -> Result<MemberData, IdentityError> {
        let token = self.valid_access_token(member).await?;
        Ok(self.api.exchange_member(&token).await?)
    }

    /// `base` if no member uses it, else `base2`, `base3`, ...
    ///
    /// The UNIQUE constraint on `members.username` is the final arbiter when
    /// two members with the same base are created concurrently.
    pub async fn make_unique_username(&self, base: &str) -> Result<String, sqlx::Error> {
        if !Member::username_exists(&self.pool, base).await? {
            return Ok(base.to_string());
        }

        let mut n = 2u32;
        loop {
            let candidate = format!("{base}{n}");
            if !Member::username_exists(&self.pool, &candidate).await? {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}
