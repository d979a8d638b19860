/// Notebook registry
///
/// Stores shared notebooks and answers questions about them:
///
/// - [`NotebookRegistry::upsert_notebook`]: share or update a member's notebook
/// - [`NotebookRegistry::identify_master`]: which notebook represents a name
/// - [`NotebookRegistry::search`]: keyword search over master notebooks
/// - [`NotebookRegistry::suggest_data_sources`]: data source names from content
/// - [`NotebookRegistry::aggregate_data_source_counts`]: data source usage
///
/// # Example
///
/// ```no_run
/// use oh_notebooks_shared::clock::SystemClock;
/// use oh_notebooks_shared::models::notebook::SearchField;
/// use oh_notebooks_shared::openhumans::client::OpenHumansClient;
/// use oh_notebooks_shared::registry::NotebookRegistry;
/// use std::sync::Arc;
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let api = Arc::new(OpenHumansClient::new("https://www.openhumans.org")?);
/// let registry = NotebookRegistry::new(pool, api, Arc::new(SystemClock));
///
/// for notebook in registry.search("fitbit", Some(SearchField::Tags)).await? {
///     println!("{} by {}", notebook.notebook_name, notebook.oh_username);
/// }
/// # Ok(())
/// # }
/// ```

pub mod links;
pub mod parse;
pub mod sources;

use crate::clock::SharedClock;
use crate::models::notebook::{Notebook, SearchField, UpsertNotebook};
use crate::openhumans::{OhError, OpenHumansApi};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info};

pub use parse::parse_csv_list;

/// Outcome of [`NotebookRegistry::upsert_notebook`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created,
    Updated,
}

impl Upserted {
    /// Confirmation shown to the member
    pub fn message(&self, notebook_name: &str) -> String {
        match self {
            Upserted::Created => format!("Your notebook {notebook_name} has been shared!"),
            Upserted::Updated => format!("Your notebook {notebook_name} has been updated!"),
        }
    }
}

/// A notebook submitted for sharing
#[derive(Debug, Clone)]
pub struct NotebookSubmission {
    pub oh_member_id: String,
    pub notebook_name: String,

    /// Decoded notebook document
    pub content: String,

    pub description: String,

    /// Comma separated tags as typed
    pub tags: String,

    /// Comma separated data source names as typed
    pub data_sources: String,
}

#[derive(Clone)]
pub struct NotebookRegistry {
    pool: PgPool,
    api: Arc<dyn OpenHumansApi>,
    clock: SharedClock,
}

impl NotebookRegistry {
    pub fn new(pool: PgPool, api: Arc<dyn OpenHumansApi>, clock: SharedClock) -> Self {
        Self { pool, api, clock }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Shares a notebook, or updates the member's notebook of the same name
    ///
    /// Content, description, tags, data sources and `updated_at` are
    /// overwritten and the master link is recomputed; `created_at` is kept
    /// from the first submission.
    pub async fn upsert_notebook(
        &self,
        submission: NotebookSubmission,
    ) -> Result<(Notebook, Upserted), sqlx::Error> {
        let master = self
            .identify_master(&submission.notebook_name, &submission.oh_member_id)
            .await?;

        let (id, inserted) = Notebook::upsert(
            &self.pool,
            UpsertNotebook {
                oh_member_id: submission.oh_member_id,
                notebook_name: submission.notebook_name,
                notebook_content: submission.content,
                description: submission.description,
                tags: parse_csv_list(&submission.tags),
                data_sources: parse_csv_list(&submission.data_sources),
                master_notebook_id: master.map(|m| m.id),
                now: self.clock.now(),
            },
        )
        .await?;

        let notebook = Notebook::find_by_id(&self.pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        let outcome = if inserted {
            Upserted::Created
        } else {
            Upserted::Updated
        };

        info!(
            notebook_id = %notebook.id,
            oh_member_id = %notebook.oh_member_id,
            name = %notebook.notebook_name,
            master = ?notebook.master_notebook_id,
            outcome = ?outcome,
            "Notebook upserted"
        );

        Ok((notebook, outcome))
    }

    /// Master for `notebook_name` as seen by `oh_member_id`
    ///
    /// The earliest-created notebook with that name owned by someone else.
    /// None when the member's own notebook is the earliest.
    pub async fn identify_master(
        &self,
        notebook_name: &str,
        oh_member_id: &str,
    ) -> Result<Option<Notebook>, sqlx::Error> {
        Notebook::earliest_peer(&self.pool, notebook_name, oh_member_id).await
    }

    /// Master notebooks matching `term`, oldest update first
    pub async fn search(
        &self,
        term: &str,
        field: Option<SearchField>,
    ) -> Result<Vec<Notebook>, sqlx::Error> {
        let results = Notebook::search_masters(&self.pool, term, field).await?;
        debug!(term = %term, field = ?field, count = results.len(), "Notebook search");
        Ok(results)
    }

    /// Comma separated names of data sources referenced by `content`
    pub async fn suggest_data_sources(&self, content: &str) -> Result<String, OhError> {
        sources::suggest_data_sources(self.api.as_ref(), content).await
    }

    /// Usage count of every data source across master notebooks, most used first
    pub async fn aggregate_data_source_counts(&self) -> Result<Vec<(String, i64)>, sqlx::Error> {
        let declared = Notebook::master_data_sources(&self.pool).await?;
        Ok(sources::rank_data_sources(declared))
    }

    /// Data source names in the order of [`aggregate_data_source_counts`](Self::aggregate_data_source_counts)
    pub async fn data_source_names(&self) -> Result<Vec<String>, sqlx::Error> {
        Ok(self
            .aggregate_data_source_counts()
            .await?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }
}
