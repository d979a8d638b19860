/// Links into the notebook execution service
///
/// The execution service imports a shared notebook by fetching it back from
/// this service's export endpoint.

use crate::models::notebook::Notebook;
use uuid::Uuid;

/// Target that opens the notebook as a rendered dashboard
pub const VOILA_TARGET: &str = "voila";

/// Path of the export endpoint serving a notebook's raw content
pub fn export_path(notebook_id: Uuid) -> String {
    format!("/v1/notebooks/{notebook_id}/export")
}

/// Import link for `notebook`
///
/// `target` adds `&target=voila` only when it is exactly `voila`; anything
/// else opens the plain notebook.
pub fn import_link(
    jupyterhub_base_url: &str,
    app_base_url: &str,
    notebook: &Notebook,
    target: Option<&str>,
) -> String {
    let target = match target {
        Some(VOILA_TARGET) => "&target=voila",
        _ => "",
    };

    format!(
        "{}/notebook-import?notebook_location={}{}&notebook_name={}{}",
        jupyterhub_base_url.trim_end_matches('/'),
        app_base_url.trim_end_matches('/'),
        export_path(notebook.id),
        notebook.notebook_name,
        target,
    )
}
