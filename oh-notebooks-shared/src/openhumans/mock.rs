/// In-memory Open Humans for tests and local development
///
/// Responses are configured up front with the `with_*` builders; every call
/// is counted so tests can assert whether the network would have been hit.
///
/// # Example
///
/// ```
/// use oh_notebooks_shared::openhumans::mock::MockOpenHumans;
///
/// let mock = MockOpenHumans::new()
///     .with_tokens("access", "refresh", 36000)
///     .with_member("12345678", "alice");
/// assert_eq!(mock.token_calls(), 0);
/// ```

use super::{
    CatalogEntry, CatalogPage, ClientCredentials, MemberData, MemberFile, OhError, OpenHumansApi,
    TokenBody, TokenRequest, TokenResponse,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const CATALOG_URL_PREFIX: &str = "mock://catalog?page=";

/// Canned Open Humans
#[derive(Default)]
pub struct MockOpenHumans {
    token_response: Option<TokenResponse>,
    member: Option<MemberData>,
    catalog: Vec<Vec<CatalogEntry>>,
    endless_catalog: bool,
    self_linking_catalog: bool,
    files: HashMap<String, Bytes>,

    token_requests: Mutex<Vec<TokenRequest>>,
    member_calls: AtomicUsize,
    catalog_calls: AtomicUsize,
    download_calls: AtomicUsize,
}

impl MockOpenHumans {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token endpoint answers 200 with this token set
    pub fn with_tokens(mut self, access_token: &str, refresh_token: &str, expires_in: i64) -> Self {
        self.token_response = Some(TokenResponse {
            status: 200,
            body: TokenBody {
                access_token: Some(access_token.to_string()),
                refresh_token: Some(refresh_token.to_string()),
                expires_in: Some(expires_in),
                ..Default::default()
            },
        });
        self
    }

    /// Token endpoint answers `status` with an `error` field
    pub fn with_token_error(mut self, status: u16, error: &str) -> Self {
        self.token_response = Some(TokenResponse {
            status,
            body: TokenBody {
                error: Some(error.to_string()),
                ..Default::default()
            },
        });
        self
    }

    /// Token endpoint answers with an arbitrary response
    pub fn with_token_response(mut self, response: TokenResponse) -> Self {
        self.token_response = Some(response);
        self
    }

    /// Exchange-member endpoint returns this identity
    pub fn with_member(mut self, project_member_id: &str, username: &str) -> Self {
        self.member = Some(MemberData {
            project_member_id: project_member_id.to_string(),
            username: username.to_string(),
            data: Vec::new(),
        });
        self
    }

    /// Adds a file to the member and makes its download URL serve `content`
    ///
    /// Call after [`with_member`](Self::with_member).
    pub fn with_file(mut self, file: MemberFile, content: &str) -> Self {
        self.files
            .insert(file.download_url.clone(), Bytes::from(content.to_string()));
        if let Some(member) = self.member.as_mut() {
            member.data.push(file);
        }
        self
    }

    /// Catalog served as consecutive pages of `(source, name)` pairs
    pub fn with_catalog(mut self, pages: Vec<Vec<(&str, &str)>>) -> Self {
        self.catalog = pages
            .into_iter()
            .map(|page| {
                page.into_iter()
                    .map(|(source, name)| CatalogEntry {
                        source: source.to_string(),
                        name: name.to_string(),
                    })
                    .collect()
            })
            .collect();
        self
    }

    /// Catalog whose pages always announce another page
    pub fn with_endless_catalog(mut self) -> Self {
        self.endless_catalog = true;
        self
    }

    /// Last catalog page announces itself as the next page
    pub fn with_self_linking_catalog(mut self) -> Self {
        self.self_linking_catalog = true;
        self
    }

    pub fn token_calls(&self) -> usize {
        self.token_requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Token requests received so far
    pub fn token_requests(&self) -> Vec<TokenRequest> {
        self.token_requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn member_calls(&self) -> usize {
        self.member_calls.load(Ordering::SeqCst)
    }

    pub fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    fn page_index(url: Option<&str>) -> usize {
        url.and_then(|u| u.strip_prefix(CATALOG_URL_PREFIX))
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }
}

#[async_trait]
impl OpenHumansApi for MockOpenHumans {
    async fn request_token(
        &self,
        _credentials: &ClientCredentials,
        request: &TokenRequest,
    ) -> Result<TokenResponse, OhError> {
        if let Ok(mut requests) = self.token_requests.lock() {
            requests.push(request.clone());
        }

        self.token_response.clone().ok_or(OhError::Status {
            status: 503,
            body: "token endpoint unavailable".to_string(),
        })
    }

    async fn exchange_member(&self, _access_token: &str) -> Result<MemberData, OhError> {
        self.member_calls.fetch_add(1, Ordering::SeqCst);

        self.member.clone().ok_or(OhError::Status {
            status: 401,
            body: "invalid access token".to_string(),
        })
    }

    async fn public_data_page(&self, url: Option<&str>) -> Result<CatalogPage, OhError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        let index = Self::page_index(url);

        if self.endless_catalog {
            return Ok(CatalogPage {
                next: Some(format!("{CATALOG_URL_PREFIX}{}", index + 1)),
                results: Vec::new(),
            });
        }

        let results = self.catalog.get(index).cloned().unwrap_or_default();
        let next = if index + 1 < self.catalog.len() {
            Some(format!("{CATALOG_URL_PREFIX}{}", index + 1))
        } else if self.self_linking_catalog {
            Some(format!("{CATALOG_URL_PREFIX}{index}"))
        } else {
            None
        };

        Ok(CatalogPage { next, results })
    }

    async fn download(&self, url: &str) -> Result<Bytes, OhError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);

        self.files.get(url).cloned().ok_or(OhError::Status {
            status: 404,
            body: format!("no file at {url}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_catalog_pages_link_to_each_other() {
        let mock = MockOpenHumans::new().with_catalog(vec![
            vec![("direct-sharing-1", "One")],
            vec![("direct-sharing-2", "Two")],
        ]);

        let first = mock.public_data_page(None).await.unwrap();
        assert_eq!(first.results[0].name, "One");
        let next = first.next.expect("first page links to second");

        let second = mock.public_data_page(Some(&next)).await.unwrap();
        assert_eq!(second.results[0].name, "Two");
        assert!(second.next.is_none());
        assert_eq!(mock.catalog_calls(), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_token_endpoint_fails() {
        let mock = MockOpenHumans::new();
        let credentials = ClientCredentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        };
        let request = TokenRequest::RefreshToken {
            refresh_token: "r".to_string(),
        };

        assert!(mock.request_token(&credentials, &request).await.is_err());
        assert_eq!(mock.token_calls(), 1);
        assert_eq!(mock.token_requests(), vec![request]);
    }
}
