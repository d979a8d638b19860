/// Shared notebook model and database operations
///
/// One row per (member, notebook name). Rows sharing a name form a group in
/// which the master row has `master_notebook_id = NULL` and every derived row
/// points at a master.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE notebooks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     oh_member_id VARCHAR(16) NOT NULL REFERENCES members(oh_id),
///     notebook_name TEXT NOT NULL,
///     notebook_content TEXT NOT NULL DEFAULT '',
///     description TEXT NOT NULL DEFAULT '',
///     tags JSONB NOT NULL DEFAULT '[]',
///     data_sources JSONB NOT NULL DEFAULT '[]',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     master_notebook_id UUID REFERENCES notebooks(id),
///     UNIQUE (oh_member_id, notebook_name)
/// );
/// ```
///
/// Queries join `members` so every loaded notebook carries its owner's
/// Open Humans username.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Shared notebook
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notebook {
    pub id: Uuid,

    /// Owning member (`members.oh_id`)
    pub oh_member_id: String,

    /// Owner's Open Humans username
    pub oh_username: String,

    pub notebook_name: String,

    /// Raw notebook document, served by the export endpoint
    #[serde(skip_serializing, default)]
    pub notebook_content: String,

    pub description: String,

    /// Tags in submission order
    pub tags: Json<Vec<String>>,

    /// Declared data source names in submission order
    pub data_sources: Json<Vec<String>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Master of this notebook's name group; None when this row is the master
    pub master_notebook_id: Option<Uuid>,
}

impl Notebook {
    /// Whether this row represents its name group
    pub fn is_master(&self) -> bool {
        self.master_notebook_id.is_none()
    }
}

/// Input for [`Notebook::upsert`]
#[derive(Debug, Clone)]
pub struct UpsertNotebook {
    pub oh_member_id: String,
    pub notebook_name: String,
    pub notebook_content: String,
    pub description: String,
    pub tags: Vec<String>,
    pub data_sources: Vec<String>,
    pub master_notebook_id: Option<Uuid>,

    /// Written to `updated_at`, and to `created_at` on insert
    pub now: DateTime<Utc>,
}

/// Field a keyword search can be restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    Tags,
    DataSources,
    Username,
}

impl SearchField {
    /// SQL predicate matching `$1` as a substring of this field
    fn predicate(&self) -> &'static str {
        match self {
            SearchField::Tags => "strpos(n.tags::text, $1) > 0",
            SearchField::DataSources => "strpos(n.data_sources::text, $1) > 0",
            SearchField::Username => "strpos(m.oh_username, $1) > 0",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchField::Tags => "tags",
            SearchField::DataSources => "data_sources",
            SearchField::Username => "username",
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tags" => Ok(SearchField::Tags),
            "data_sources" => Ok(SearchField::DataSources),
            "username" => Ok(SearchField::Username),
            other => Err(format!("unknown search field: {other}")),
        }
    }
}

/// Predicate used when no field is given: any of the searchable columns
const ANY_FIELD_PREDICATE: &str = "(strpos(n.description, $1) > 0
    OR strpos(n.notebook_name, $1) > 0
    OR strpos(n.tags::text, $1) > 0
    OR strpos(n.data_sources::text, $1) > 0
    OR strpos(m.oh_username, $1) > 0)";

const NOTEBOOK_SELECT: &str = "SELECT n.id, n.oh_member_id, m.oh_username, n.notebook_name,
           n.notebook_content, n.description, n.tags, n.data_sources,
           n.created_at, n.updated_at, n.master_notebook_id
    FROM notebooks n
    JOIN members m ON m.oh_id = n.oh_member_id";

impl Notebook {
    /// Inserts or updates the row keyed by (member, name)
    ///
    /// `created_at` is only written on insert. Returns the row id and whether
    /// it was newly inserted.
    pub async fn upsert(pool: &PgPool, data: UpsertNotebook) -> Result<(Uuid, bool), sqlx::Error> {
        let (id, inserted): (Uuid, bool) = sqlx::query_as(
            r#"
            INSERT INTO notebooks (oh_member_id, notebook_name, notebook_content, description,
                                   tags, data_sources, created_at, updated_at, master_notebook_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8)
            ON CONFLICT (oh_member_id, notebook_name) DO UPDATE SET
                notebook_content = EXCLUDED.notebook_content,
                description = EXCLUDED.description,
                tags = EXCLUDED.tags,
                data_sources = EXCLUDED.data_sources,
                updated_at = EXCLUDED.updated_at,
                master_notebook_id = EXCLUDED.master_notebook_id
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(data.oh_member_id)
        .bind(data.notebook_name)
        .bind(data.notebook_content)
        .bind(data.description)
        .bind(Json(data.tags))
        .bind(Json(data.data_sources))
        .bind(data.now)
        .bind(data.master_notebook_id)
        .fetch_one(pool)
        .await?;

        Ok((id, inserted))
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("{NOTEBOOK_SELECT} WHERE n.id = $1");

        sqlx::query_as::<_, Notebook>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_member_and_name(
        pool: &PgPool,
        oh_member_id: &str,
        notebook_name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("{NOTEBOOK_SELECT} WHERE n.oh_member_id = $1 AND n.notebook_name = $2");

        sqlx::query_as::<_, Notebook>(&query)
            .bind(oh_member_id)
            .bind(notebook_name)
            .fetch_optional(pool)
            .await
    }

    /// Earliest-created notebook named `notebook_name` that `oh_member_id` does not own
    ///
    /// When the member already has a notebook with this name, only rows created
    /// before it are considered, so the first uploader of a name stays its master.
    /// Rows are ordered by `(created_at, upload_seq)`; equal creation times fall
    /// back to insertion order.
    pub async fn earliest_peer(
        pool: &PgPool,
        notebook_name: &str,
        oh_member_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "{NOTEBOOK_SELECT}
             WHERE n.notebook_name = $1
               AND n.oh_member_id <> $2
               AND NOT EXISTS (
                   SELECT 1 FROM notebooks own
                   WHERE own.notebook_name = $1
                     AND own.oh_member_id = $2
                     AND (own.created_at, own.upload_seq) <= (n.created_at, n.upload_seq))
             ORDER BY n.created_at ASC, n.upload_seq ASC
             LIMIT 1"
        );

        sqlx::query_as::<_, Notebook>(&query)
            .bind(notebook_name)
            .bind(oh_member_id)
            .fetch_optional(pool)
            .await
    }

    /// Master notebooks matching `term`, oldest update first
    ///
    /// With a field the match is restricted to it; without one any searchable
    /// column may match. Matching is a case-sensitive substring test.
    pub async fn search_masters(
        pool: &PgPool,
        term: &str,
        field: Option<SearchField>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let predicate = field.map(|f| f.predicate()).unwrap_or(ANY_FIELD_PREDICATE);
        let query = format!(
            "{NOTEBOOK_SELECT}
             WHERE n.master_notebook_id IS NULL AND {predicate}
             ORDER BY n.updated_at ASC, n.id ASC"
        );

        sqlx::query_as::<_, Notebook>(&query)
            .bind(term)
            .fetch_all(pool)
            .await
    }

    /// All master notebooks, most recently updated first
    pub async fn list_masters(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "{NOTEBOOK_SELECT} WHERE n.master_notebook_id IS NULL ORDER BY n.updated_at DESC, n.id"
        );

        sqlx::query_as::<_, Notebook>(&query).fetch_all(pool).await
    }

    /// Notebooks owned by a member, most recently updated first
    pub async fn list_by_member(pool: &PgPool, oh_member_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "{NOTEBOOK_SELECT} WHERE n.oh_member_id = $1 ORDER BY n.updated_at DESC, n.id"
        );

        sqlx::query_as::<_, Notebook>(&query)
            .bind(oh_member_id)
            .fetch_all(pool)
            .await
    }

    /// Notebooks whose master is `master_id`, oldest first
    pub async fn list_derived(pool: &PgPool, master_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "{NOTEBOOK_SELECT} WHERE n.master_notebook_id = $1 ORDER BY n.created_at ASC, n.upload_seq"
        );

        sqlx::query_as::<_, Notebook>(&query)
            .bind(master_id)
            .fetch_all(pool)
            .await
    }

    /// Declared data sources of every master notebook, oldest first
    pub async fn master_data_sources(pool: &PgPool) -> Result<Vec<Vec<String>>, sqlx::Error> {
        let rows: Vec<Json<Vec<String>>> = sqlx::query_scalar(
            "SELECT data_sources FROM notebooks
             WHERE master_notebook_id IS NULL
             ORDER BY created_at ASC, upload_seq ASC",
        )
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|Json(sources)| sources).collect())
    }
}
