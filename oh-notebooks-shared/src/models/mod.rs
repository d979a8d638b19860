/// Database models
///
/// - `member`: Open Humans members and their OAuth2 credentials
/// - `notebook`: shared notebooks grouped by name into master/derived rows
///
/// # Example
///
/// ```no_run
/// use oh_notebooks_shared::models::notebook::{Notebook, SearchField};
/// use oh_notebooks_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let fitbit = Notebook::search_masters(&pool, "fitbit", Some(SearchField::Tags)).await?;
/// println!("{} notebooks tagged fitbit", fitbit.len());
/// # Ok(())
/// # }
/// ```

pub mod member;
pub mod notebook;
