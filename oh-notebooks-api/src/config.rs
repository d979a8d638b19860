/// Configuration management for the API server
///
/// Loaded from environment variables (and a `.env` file when present).
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma separated allowed origins (default: *)
/// - `PRODUCTION`: Enables HSTS (default: false)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `SESSION_SECRET`: Session token signing key, at least 32 characters (required)
/// - `OPENHUMANS_CLIENT_ID`, `OPENHUMANS_CLIENT_SECRET`: OAuth2 client; login is
///   disabled without them
/// - `OPENHUMANS_OH_BASE_URL`: Open Humans (default: https://www.openhumans.org)
/// - `OPENHUMANS_APP_BASE_URL`: Public URL of this service (default: http://localhost:8080)
/// - `JUPYTERHUB_BASE_URL`: Notebook execution service (default: https://notebooks.openhumans.org)
///
/// # Example
///
/// ```no_run
/// use oh_notebooks_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use oh_notebooks_shared::auth::identity::OAuthSettings;
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_OH_BASE_URL: &str = "https://www.openhumans.org";
pub const DEFAULT_APP_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_JUPYTERHUB_BASE_URL: &str = "https://notebooks.openhumans.org";

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub openhumans: OpenHumansConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode adds HSTS
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// Session token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// HS256 signing key
    ///
    /// Must be kept secret and at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
}

/// Open Humans and notebook execution service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenHumansConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub oh_base_url: String,
    pub app_base_url: String,
    pub jupyterhub_base_url: String,
}

impl OpenHumansConfig {
    /// Settings for the identity service
    pub fn oauth_settings(&self) -> OAuthSettings {
        OAuthSettings {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            oh_base_url: self.oh_base_url.clone(),
            app_base_url: self.app_base_url.clone(),
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn var_or(name: &str, default: &str) -> String {
    optional_var(name).unwrap_or_else(|| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` or `SESSION_SECRET` are missing
    /// - `SESSION_SECRET` is shorter than 32 characters
    /// - A numeric variable does not parse
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let api_port = var_or("API_PORT", "8080").parse::<u16>()?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = var_or("DATABASE_MAX_CONNECTIONS", "10").parse::<u32>()?;

        let session_secret = env::var("SESSION_SECRET")
            .map_err(|_| anyhow::anyhow!("SESSION_SECRET environment variable is required"))?;

        if session_secret.len() < 32 {
            anyhow::bail!("SESSION_SECRET must be at least 32 characters long");
        }

        let openhumans = OpenHumansConfig {
            client_id: optional_var("OPENHUMANS_CLIENT_ID"),
            client_secret: optional_var("OPENHUMANS_CLIENT_SECRET"),
            oh_base_url: var_or("OPENHUMANS_OH_BASE_URL", DEFAULT_OH_BASE_URL),
            app_base_url: var_or("OPENHUMANS_APP_BASE_URL", DEFAULT_APP_BASE_URL),
            jupyterhub_base_url: var_or("JUPYTERHUB_BASE_URL", DEFAULT_JUPYTERHUB_BASE_URL),
        };

        if openhumans.client_id.is_none() || openhumans.client_secret.is_none() {
            tracing::warn!("OPENHUMANS_CLIENT_ID or OPENHUMANS_CLIENT_SECRET not set, login is disabled");
        }

        Ok(Self {
            api: ApiConfig {
                host: var_or("API_HOST", "0.0.0.0"),
                port: api_port,
                cors_origins: parse_origins(&var_or("CORS_ORIGINS", "*")),
                production: parse_bool(&var_or("PRODUCTION", "false")),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            session: SessionConfig {
                secret: session_secret,
            },
            openhumans,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
