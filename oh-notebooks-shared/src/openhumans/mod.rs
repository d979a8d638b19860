/// Open Humans platform API
///
/// Everything the service asks of Open Humans goes through the
/// [`OpenHumansApi`] trait:
///
/// - the OAuth2 token endpoint (`POST /oauth2/token/`, both grant types)
/// - the member identity exchange (`project_member_id`, `username`, files)
/// - the paginated public-data catalog (`{source, name}` pairs)
/// - raw file downloads
///
/// [`client::OpenHumansClient`] talks to the real platform with reqwest;
/// [`mock::MockOpenHumans`] returns canned responses and counts calls.
///
/// # Example
///
/// ```no_run
/// use oh_notebooks_shared::openhumans::{client::OpenHumansClient, OpenHumansApi};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let api = OpenHumansClient::new("https://www.openhumans.org")?;
/// let page = api.public_data_page(None).await?;
/// for entry in page.results {
///     println!("{} -> {}", entry.source, entry.name);
/// }
/// # Ok(())
/// # }
/// ```

pub mod client;
pub mod mock;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Project whose files are notebooks
pub const NOTEBOOK_SOURCE: &str = "direct-sharing-71";

/// Errors talking to Open Humans
#[derive(Debug, thiserror::Error)]
pub enum OhError {
    /// Transport or decoding failure inside reqwest
    #[error("Open Humans request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("Open Humans returned {status}: {body}")]
    Status { status: u16, body: String },

    /// A URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// OAuth2 client id and secret
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Body of a token endpoint request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRequest {
    AuthorizationCode { code: String, redirect_uri: String },
    RefreshToken { refresh_token: String },
}

impl TokenRequest {
    /// Value of the `grant_type` form field
    pub fn grant_type(&self) -> &'static str {
        match self {
            TokenRequest::AuthorizationCode { .. } => "authorization_code",
            TokenRequest::RefreshToken { .. } => "refresh_token",
        }
    }

    /// Form fields sent to the token endpoint
    pub fn form(&self) -> Vec<(&'static str, &str)> {
        match self {
            TokenRequest::AuthorizationCode { code, redirect_uri } => vec![
                ("grant_type", self.grant_type()),
                ("redirect_uri", redirect_uri.as_str()),
                ("code", code.as_str()),
            ],
            TokenRequest::RefreshToken { refresh_token } => vec![
                ("grant_type", self.grant_type()),
                ("refresh_token", refresh_token.as_str()),
            ],
        }
    }
}

/// JSON body returned by the token endpoint
///
/// Every field is optional: the endpoint answers with either a token set or
/// an `error` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBody {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenBody {
    /// The complete token set, if the body carries one
    pub fn issued(&self) -> Option<IssuedTokens> {
        Some(IssuedTokens {
            access_token: self.access_token.clone()?,
            refresh_token: self.refresh_token.clone()?,
            expires_in: self.expires_in?,
        })
    }
}

/// Token endpoint response: status plus decoded body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub status: u16,
    pub body: TokenBody,
}

impl TokenResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// A granted token pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,

    /// Lifetime of the access token in seconds
    pub expires_in: i64,
}

/// A file stored on Open Humans for the member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberFile {
    pub id: i64,
    pub basename: String,
    pub download_url: String,
    pub source: String,
}

/// Member identity and files, as returned by the exchange-member endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberData {
    pub project_member_id: String,
    pub username: String,
    #[serde(default)]
    pub data: Vec<MemberFile>,
}

impl MemberData {
    /// Files uploaded by the notebook project
    pub fn notebook_files(&self) -> Vec<&MemberFile> {
        self.data
            .iter()
            .filter(|file| file.source == NOTEBOOK_SOURCE)
            .collect()
    }

    /// File with the given id, if the member has it
    pub fn find_file(&self, file_id: i64) -> Option<&MemberFile> {
        self.data.iter().find(|file| file.id == file_id)
    }
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Data source id (`direct-sharing-<digits>`)
    pub source: String,

    /// Human readable source name
    pub name: String,
}

/// One page of the public-data catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPage {
    /// URL of the following page, absent on the last one
    #[serde(default)]
    pub next: Option<String>,

    #[serde(default)]
    pub results: Vec<CatalogEntry>,
}

/// Operations the service needs from Open Humans
#[async_trait]
pub trait OpenHumansApi: Send + Sync {
    /// Calls the OAuth2 token endpoint with HTTP basic client authentication
    ///
    /// Returns Ok for any HTTP status; callers inspect [`TokenResponse`].
    async fn request_token(
        &self,
        credentials: &ClientCredentials,
        request: &TokenRequest,
    ) -> Result<TokenResponse, OhError>;

    /// Exchanges an access token for the member's identity and files
    async fn exchange_member(&self, access_token: &str) -> Result<MemberData, OhError>;

    /// Fetches one catalog page; `None` means the first page
    async fn public_data_page(&self, url: Option<&str>) -> Result<CatalogPage, OhError>;

    /// Downloads a file
    async fn download(&self, url: &str) -> Result<Bytes, OhError>;
}
