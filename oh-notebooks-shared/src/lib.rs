//! # Open Humans Notebooks Shared Library
//!
//! Domain logic behind the notebook sharing service, used by the API server.
//!
//! ## Module Organization
//!
//! - `auth`: Open Humans OAuth2 identity, session tokens and middleware
//! - `clock`: Injectable time source
//! - `db`: Connection pool and migrations
//! - `models`: Members and shared notebooks
//! - `openhumans`: Open Humans API client
//! - `pagination`: Page slicing for list responses
//! - `registry`: Notebook sharing, search and data source statistics

pub mod auth;
pub mod clock;
pub mod db;
pub mod models;
pub mod openhumans;
pub mod pagination;
pub mod registry;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
