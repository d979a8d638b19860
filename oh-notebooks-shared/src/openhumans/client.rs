/// reqwest implementation of [`OpenHumansApi`]
///
/// Endpoints are resolved against a configurable base URL
/// (`https://www.openhumans.org` in production) so the client can be pointed
/// at a staging deployment.

use super::{
    CatalogPage, ClientCredentials, MemberData, OhError, OpenHumansApi, TokenBody, TokenRequest,
    TokenResponse,
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client for the Open Humans API
#[derive(Debug, Clone)]
pub struct OpenHumansClient {
    client: Client,
    base_url: String,
}

impl OpenHumansClient {
    /// Creates a client for the platform at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, OhError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("oh-notebooks/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn token_url(&self) -> String {
        format!("{}/oauth2/token/", self.base_url)
    }

    fn exchange_member_url(&self) -> String {
        format!("{}/api/direct-sharing/project/exchange-member/", self.base_url)
    }

    fn catalog_url(&self) -> String {
        format!("{}/api/public-data/members-by-source/", self.base_url)
    }

    async fn error_for_status(resp: reqwest::Response) -> Result<reqwest::Response, OhError> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(OhError::Status { status, body })
    }
}

#[async_trait]
impl OpenHumansApi for OpenHumansClient {
    async fn request_token(
        &self,
        credentials: &ClientCredentials,
        request: &TokenRequest,
    ) -> Result<TokenResponse, OhError> {
        debug!(grant_type = request.grant_type(), "Requesting Open Humans token");

        let resp = self
            .client
            .post(self.token_url())
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&request.form())
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = serde_json::from_str::<TokenBody>(&text).unwrap_or_else(|e| {
            warn!(status, error = %e, "Token endpoint returned a non-JSON body");
            TokenBody::default()
        });

        Ok(TokenResponse { status, body })
    }

    async fn exchange_member(&self, access_token: &str) -> Result<MemberData, OhError> {
        let resp = self
            .client
            .get(self.exchange_member_url())
            .query(&[("access_token", access_token)])
            .send()
            .await?;

        let member = Self::error_for_status(resp).await?.json::<MemberData>().await?;
        Ok(member)
    }

    async fn public_data_page(&self, url: Option<&str>) -> Result<CatalogPage, OhError> {
        let url = url.map(str::to_string).unwrap_or_else(|| self.catalog_url());
        debug!(url = %url, "Fetching public data catalog page");

        let resp = self.client.get(&url).send().await?;
        let page = Self::error_for_status(resp).await?.json::<CatalogPage>().await?;
        Ok(page)
    }

    async fn download(&self, url: &str) -> Result<Bytes, OhError> {
        let resp = self.client.get(url).send().await?;
        let data = Self::error_for_status(resp).await?.bytes().await?;
        Ok(data)
    }
}
