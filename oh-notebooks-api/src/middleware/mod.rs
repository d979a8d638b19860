/// Middleware modules for the API server
///
/// - Security headers
///
/// Session authentication lives in `oh_notebooks_shared::auth::middleware`.

pub mod security;
