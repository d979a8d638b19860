/// Data source usage
///
/// # Endpoints
///
/// ```text
/// GET /v1/data-sources
/// GET /v1/data-sources/names
/// ```
///
/// # Response
///
/// ```json
/// {
///   "data_sources": [
///     { "name": "Fitbit Connection", "count": 12 },
///     { "name": "Oura Connect", "count": 4 }
///   ]
/// }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DataSourceCount {
    pub name: String,

    /// Master notebooks declaring this source
    pub count: i64,
}

/// Bare names, most used first
#[derive(Debug, Serialize)]
pub struct DataSourceNamesResponse {
    pub names: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DataSourcesResponse {
    /// Most used first
    pub data_sources: Vec<DataSourceCount>,
}

/// Lists every declared data source with its usage count
pub async fn list_data_sources(State(state): State<AppState>) -> ApiResult<Json<DataSourcesResponse>> {
    let data_sources = state
        .registry
        .aggregate_data_source_counts()
        .await?
        .into_iter()
        .map(|(name, count)| DataSourceCount { name, count })
        .collect();

    Ok(Json(DataSourcesResponse { data_sources }))
}

/// Names of every declared data source, for filter menus
pub async fn list_data_source_names(
    State(state): State<AppState>,
) -> ApiResult<Json<DataSourceNamesResponse>> {
    let names = state.registry.data_source_names().await?;

    Ok(Json(DataSourceNamesResponse { names }))
}
