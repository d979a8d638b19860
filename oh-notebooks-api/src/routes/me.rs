/// Endpoints for the logged-in member
///
/// All routes require `Authorization: Bearer <session token>`.
///
/// # Endpoints
///
/// - `GET /v1/me` - Member profile
/// - `PUT /v1/me/visibility` - Set the public flag
/// - `GET /v1/me/notebooks` - Notebook files on Open Humans and shared notebooks
/// - `POST /v1/me/notebooks` - Share or update a notebook from an Open Humans file
/// - `GET /v1/me/notebooks/:file_id/suggest` - Suggested data sources for a file

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use oh_notebooks_shared::{
    auth::middleware::SessionContext,
    models::{member::Member, notebook::Notebook},
    openhumans::MemberFile,
    registry::{NotebookSubmission, Upserted},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

/// Visibility update
#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub public: bool,
}

/// Member's notebooks
#[derive(Debug, Serialize)]
pub struct MyNotebooksResponse {
    /// Notebook files stored on Open Humans
    pub files: Vec<MemberFile>,

    /// Notebooks this member has shared
    pub shared: Vec<Notebook>,
}

/// Share request
///
/// Tags and data sources are comma separated; missing text fields are empty.
#[derive(Debug, Deserialize, Validate)]
pub struct ShareNotebookRequest {
    /// Open Humans file id
    pub file_id: i64,

    #[serde(default)]
    #[validate(length(max = 10000, message = "Description must be at most 10000 characters"))]
    pub description: String,

    #[serde(default)]
    #[validate(length(max = 1000, message = "Tags must be at most 1000 characters"))]
    pub tags: String,

    #[serde(default)]
    #[validate(length(max = 1000, message = "Data sources must be at most 1000 characters"))]
    pub data_sources: String,
}

/// Share response
#[derive(Debug, Serialize)]
pub struct ShareNotebookResponse {
    /// "Your notebook <name> has been shared!" or "... updated!"
    pub message: String,

    pub created: bool,

    pub notebook: Notebook,
}

/// Suggestion response
#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub file_id: i64,
    pub basename: String,

    /// Comma separated data source names, empty when none are recognized
    pub data_sources: String,
}

async fn current_member(state: &AppState, session: &SessionContext) -> ApiResult<Member> {
    Member::find_by_oh_id(&state.db, &session.oh_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown member".to_string()))
}

/// Downloads one of the member's Open Humans files
async fn fetch_file(
    state: &AppState,
    session: &SessionContext,
    file_id: i64,
) -> ApiResult<(MemberFile, String)> {
    let mut member = current_member(state, session).await?;
    let data = state.identity.member_data(&mut member).await?;

    let file = data
        .find_file(file_id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("File {file_id} not found")))?;

    let bytes = state.api.download(&file.download_url).await?;
    let content = String::from_utf8_lossy(&bytes).into_owned();

    Ok((file, content))
}

/// Member profile
pub async fn get_me(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<Member>> {
    Ok(Json(current_member(&state, &session).await?))
}

/// Sets whether the member is listed publicly
pub async fn set_visibility(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<VisibilityRequest>,
) -> ApiResult<Json<Member>> {
    let member = Member::set_public(&state.db, &session.oh_id, req.public)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown member".to_string()))?;

    Ok(Json(member))
}

/// Notebook files on Open Humans next to the notebooks already shared
pub async fn list_my_notebooks(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<MyNotebooksResponse>> {
    let mut member = current_member(&state, &session).await?;
    let data = state.identity.member_data(&mut member).await?;
    let shared = Notebook::list_by_member(&state.db, &member.oh_id).await?;

    Ok(Json(MyNotebooksResponse {
        files: data.notebook_files().into_iter().cloned().collect(),
        shared,
    }))
}

/// Suggests data sources for a notebook file from the ids in its code
pub async fn suggest_data_sources(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(file_id): Path<i64>,
) -> ApiResult<Json<SuggestResponse>> {
    let (file, content) = fetch_file(&state, &session, file_id).await?;
    let data_sources = state.registry.suggest_data_sources(&content).await?;

    Ok(Json(SuggestResponse {
        file_id,
        basename: file.basename,
        data_sources,
    }))
}

/// Shares a notebook file, or updates the member's notebook of the same name
///
/// # Endpoint
///
/// ```text
/// POST /v1/me/notebooks
/// Content-Type: application/json
///
/// {
///   "file_id": 1234,
///   "description": "Daily steps",
///   "tags": "fitbit, steps",
///   "data_sources": "Fitbit Connection"
/// }
/// ```
///
/// # Errors
///
/// - `404 Not Found`: The member has no file with that id
/// - `422 Unprocessable Entity`: Validation failed
pub async fn share_notebook(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<ShareNotebookRequest>,
) -> ApiResult<(StatusCode, Json<ShareNotebookResponse>)> {
    req.validate()?;

    let (file, content) = fetch_file(&state, &session, req.file_id).await?;

    let (notebook, outcome) = state
        .registry
        .upsert_notebook(NotebookSubmission {
            oh_member_id: session.oh_id.clone(),
            notebook_name: file.basename,
            content,
            description: req.description,
            tags: req.tags,
            data_sources: req.data_sources,
        })
        .await?;

    info!(oh_id = %session.oh_id, notebook_id = %notebook.id, "Notebook shared");

    let status = match outcome {
        Upserted::Created => StatusCode::CREATED,
        Upserted::Updated => StatusCode::OK,
    };

    Ok((
        status,
        Json(ShareNotebookResponse {
            message: outcome.message(&notebook.notebook_name),
            created: outcome == Upserted::Created,
            notebook,
        }),
    ))
}
