/// Public notebook endpoints
///
/// # Endpoints
///
/// - `GET /v1/notebooks?page=` - Master notebooks, most recently updated first
/// - `GET /v1/notebooks/search?search_term=&search_field=&page=` - Keyword search
/// - `GET /v1/notebooks/:id` - Notebook with its derived versions
/// - `GET /v1/notebooks/:id/export` - Raw notebook document
/// - `GET /v1/notebooks/:id/open?target=` - Redirect into the notebook execution service

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Redirect},
    Json,
};
use oh_notebooks_shared::{
    models::notebook::{Notebook, SearchField},
    pagination::{paginate, Page, PER_PAGE},
    registry::links::import_link,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// `?page=` query
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Search query
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search_term: String,

    /// One of `tags`, `data_sources`, `username`; anything else searches all fields
    pub search_field: Option<String>,

    pub page: Option<String>,
}

/// Search results page
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub search_term: String,
    pub search_field: Option<SearchField>,
    #[serde(flatten)]
    pub results: Page<Notebook>,
}

/// Notebook detail
#[derive(Debug, Serialize)]
pub struct NotebookDetail {
    #[serde(flatten)]
    pub notebook: Notebook,

    /// Same-named notebooks that point at this one
    pub derived: Vec<Notebook>,

    /// Link opening the notebook in the execution service
    pub open_url: String,
}

/// `?target=` query of the open endpoint
#[derive(Debug, Deserialize)]
pub struct OpenQuery {
    pub target: Option<String>,
}

async fn find_notebook(state: &AppState, id: Uuid) -> ApiResult<Notebook> {
    Notebook::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Notebook not found".to_string()))
}

fn link_for(state: &AppState, notebook: &Notebook, target: Option<&str>) -> String {
    import_link(
        &state.config.openhumans.jupyterhub_base_url,
        &state.config.openhumans.app_base_url,
        notebook,
        target,
    )
}

/// Lists master notebooks
pub async fn list_notebooks(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<Notebook>>> {
    let notebooks = Notebook::list_masters(&state.db).await?;

    Ok(Json(paginate(notebooks, query.page.as_deref(), PER_PAGE)))
}

/// Searches master notebooks
///
/// # Response
///
/// ```json
/// {
///   "search_term": "fitbit",
///   "search_field": "tags",
///   "items": [ ... ],
///   "page": 1,
///   "num_pages": 1,
///   "total": 3,
///   "has_next": false,
///   "has_previous": false
/// }
/// ```
pub async fn search_notebooks(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let field = query
        .search_field
        .as_deref()
        .filter(|f| !f.is_empty())
        .and_then(|f| match f.parse::<SearchField>() {
            Ok(field) => Some(field),
            Err(e) => {
                debug!(error = %e, "Searching all fields");
                None
            }
        });

    let notebooks = state.registry.search(&query.search_term, field).await?;

    Ok(Json(SearchResponse {
        search_term: query.search_term,
        search_field: field,
        results: paginate(notebooks, query.page.as_deref(), PER_PAGE),
    }))
}

/// Notebook with its derived versions and an import link
pub async fn get_notebook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<NotebookDetail>> {
    let notebook = find_notebook(&state, id).await?;
    let derived = Notebook::list_derived(&state.db, notebook.id).await?;
    let open_url = link_for(&state, &notebook, None);

    Ok(Json(NotebookDetail {
        notebook,
        derived,
        open_url,
    }))
}

/// Raw notebook document, fetched back by the execution service on import
pub async fn export_notebook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let notebook = find_notebook(&state, id).await?;

    Ok((
        [(header::CONTENT_TYPE, "application/x-ipynb+json")],
        notebook.notebook_content,
    ))
}

/// Redirects into the execution service, as a dashboard with `?target=voila`
pub async fn open_notebook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<OpenQuery>,
) -> ApiResult<Redirect> {
    let notebook = find_notebook(&state, id).await?;

    Ok(Redirect::to(&link_for(&state, &notebook, query.target.as_deref())))
}
