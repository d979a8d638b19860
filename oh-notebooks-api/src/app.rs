/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use oh_notebooks_api::{app::AppState, config::Config};
/// use oh_notebooks_shared::clock::SystemClock;
/// use oh_notebooks_shared::openhumans::client::OpenHumansClient;
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let api = Arc::new(OpenHumansClient::new(&config.openhumans.oh_base_url)?);
/// let state = AppState::new(pool, config, api, Arc::new(SystemClock));
/// let app = oh_notebooks_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, put},
    Router,
};
use oh_notebooks_shared::{
    auth::{identity::IdentityService, middleware::create_session_middleware},
    clock::SharedClock,
    openhumans::OpenHumansApi,
    registry::NotebookRegistry,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Open Humans API
    pub api: Arc<dyn OpenHumansApi>,

    pub identity: IdentityService,

    pub registry: NotebookRegistry,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, api: Arc<dyn OpenHumansApi>, clock: SharedClock) -> Self {
        let identity = IdentityService::new(
            db.clone(),
            api.clone(),
            clock.clone(),
            config.openhumans.oauth_settings(),
        );
        let registry = NotebookRegistry::new(db.clone(), api.clone(), clock);

        Self {
            db,
            config: Arc::new(config),
            api,
            identity,
            registry,
        }
    }

    /// Secret for session token operations
    pub fn session_secret(&self) -> &str {
        &self.config.session.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET  /health
/// ├── /auth/
/// │   ├── GET /authorize              # redirect to Open Humans
/// │   └── GET /complete?code=         # session token
/// └── /v1/
///     ├── GET /notebooks?page=
///     ├── GET /notebooks/search?search_term=&search_field=&page=
///     ├── GET /notebooks/:id
///     ├── GET /notebooks/:id/export
///     ├── GET /notebooks/:id/open?target=
///     ├── GET /data-sources
///     ├── GET /data-sources/names
///     └── /me/                        # session required
///         ├── GET  /
///         ├── PUT  /visibility
///         ├── GET  /notebooks
///         ├── POST /notebooks
///         └── GET  /notebooks/:file_id/suggest
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Security headers
/// 4. Session authentication (`/v1/me` only)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/authorize", get(routes::oauth::authorize))
        .route("/complete", get(routes::oauth::complete));

    let notebook_routes = Router::new()
        .route("/", get(routes::notebooks::list_notebooks))
        .route("/search", get(routes::notebooks::search_notebooks))
        .route("/:id", get(routes::notebooks::get_notebook))
        .route("/:id/export", get(routes::notebooks::export_notebook))
        .route("/:id/open", get(routes::notebooks::open_notebook));

    let me_routes = Router::new()
        .route("/", get(routes::me::get_me))
        .route("/visibility", put(routes::me::set_visibility))
        .route(
            "/notebooks",
            get(routes::me::list_my_notebooks).post(routes::me::share_notebook),
        )
        .route("/notebooks/:file_id/suggest", get(routes::me::suggest_data_sources))
        .layer(axum::middleware::from_fn(create_session_middleware(
            state.session_secret().to_string(),
        )));

    let v1_routes = Router::new()
        .nest("/notebooks", notebook_routes)
        .route("/data-sources", get(routes::data_sources::list_data_sources))
        .route(
            "/data-sources/names",
            get(routes::data_sources::list_data_source_names),
        )
        .nest("/me", me_routes);

    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/auth", auth_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
