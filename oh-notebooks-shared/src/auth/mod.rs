/// Authentication
///
/// - [`identity`]: Open Humans OAuth2 code exchange and token lifecycle
/// - [`session`]: HS256 session tokens issued after login
/// - [`middleware`]: Axum middleware validating session tokens

pub mod identity;
pub mod middleware;
pub mod session;
