/// API route handlers
///
/// Organized by resource:
///
/// - `health`: Health check endpoint
/// - `oauth`: Open Humans login (authorize, complete)
/// - `notebooks`: Public notebook listing, search, detail, export and import links
/// - `data_sources`: Data source usage across shared notebooks
/// - `me`: The logged-in member's profile and Open Humans notebook files

pub mod data_sources;
pub mod health;
pub mod me;
pub mod notebooks;
pub mod oauth;
