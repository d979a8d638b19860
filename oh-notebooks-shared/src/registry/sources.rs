/// Data source naming and usage
///
/// Data sources are identified in notebook code by their Open Humans id
/// (`direct-sharing-<digits>`) and shown to people by name. Names come from
/// the public-data catalog, which is paginated; [`catalog_pages`] walks it
/// as a lazy stream.

use super::parse::find_source_ids;
use crate::openhumans::{CatalogPage, OhError, OpenHumansApi};
use futures::stream::{self, Stream, TryStreamExt};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Upper bound on catalog pages fetched in one walk
pub const MAX_CATALOG_PAGES: usize = 50;

#[derive(Debug, Default)]
struct CatalogCursor {
    /// Next page to fetch; None before the first page
    url: Option<String>,
    fetched: usize,
    done: bool,
}

/// Pages of the public-data catalog, starting from the first
///
/// Ends when a page has no `next` link, when `next` points back at the page
/// just fetched, after [`MAX_CATALOG_PAGES`] pages, or after the first error
/// (which is yielded).
pub fn catalog_pages(
    api: &dyn OpenHumansApi,
) -> impl Stream<Item = Result<CatalogPage, OhError>> + Send + '_ {
    stream::unfold(CatalogCursor::default(), move |cursor| async move {
        if cursor.done {
            return None;
        }
        if cursor.fetched >= MAX_CATALOG_PAGES {
            warn!(pages = cursor.fetched, "Catalog page limit reached, stopping");
            return None;
        }

        match api.public_data_page(cursor.url.as_deref()).await {
            Ok(page) => {
                let next = match page.next.clone() {
                    Some(next) if cursor.url.as_deref() == Some(next.as_str()) => {
                        warn!(url = %next, "Catalog page links to itself, stopping");
                        None
                    }
                    next => next,
                };

                let cursor = CatalogCursor {
                    done: next.is_none(),
                    url: next,
                    fetched: cursor.fetched + 1,
                };
                Some((Ok(page), cursor))
            }
            Err(e) => Some((
                Err(e),
                CatalogCursor {
                    done: true,
                    ..cursor
                },
            )),
        }
    })
}

/// Map of data source id to name over the whole catalog
///
/// When an id is listed more than once the first name wins.
pub async fn catalog_names(api: &dyn OpenHumansApi) -> Result<HashMap<String, String>, OhError> {
    catalog_pages(api)
        .try_fold(HashMap::new(), |mut names, page| async move {
            for entry in page.results {
                names.entry(entry.source).or_insert(entry.name);
            }
            Ok(names)
        })
        .await
}

/// Comma separated names of the data sources `content` refers to
///
/// Unknown ids are dropped and names appear once, in order of first mention.
/// Content without any id returns an empty string without contacting
/// Open Humans.
pub async fn suggest_data_sources(api: &dyn OpenHumansApi, content: &str) -> Result<String, OhError> {
    let ids = find_source_ids(content);
    if ids.is_empty() {
        return Ok(String::new());
    }

    let catalog = catalog_names(api).await?;

    let mut names: Vec<&str> = Vec::new();
    for id in &ids {
        match catalog.get(id) {
            Some(name) if !names.contains(&name.as_str()) => names.push(name.as_str()),
            Some(_) => {}
            None => debug!(source = %id, "Data source not in catalog"),
        }
    }

    Ok(names.join(","))
}

/// Counts each data source across notebooks, most used first
///
/// Ties keep the order in which sources were first encountered. Blank names
/// are not counted.
pub fn rank_data_sources<I, S>(declared: I) -> Vec<(String, i64)>
where
    I: IntoIterator<Item = S>,
    S: IntoIterator<Item = String>,
{
    let mut counts: Vec<(String, i64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for sources in declared {
        for source in sources {
            if source.trim().is_empty() {
                continue;
            }
            match index.get(&source) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    index.insert(source.clone(), counts.len());
                    counts.push((source, 1));
                }
            }
        }
    }

    // sort_by is stable
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openhumans::mock::MockOpenHumans;

    fn catalog() -> MockOpenHumans {
        MockOpenHumans::new().with_catalog(vec![
            vec![("direct-sharing-71", "Notebook Upload"), ("direct-sharing-102", "Fitbit Connection")],
            vec![("direct-sharing-128", "Oura Connect"), ("direct-sharing-71", "Duplicate Listing")],
        ])
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_catalog_pages_follows_next() {
        let mock = catalog();
        let pages: Vec<CatalogPage> = catalog_pages(&mock).try_collect().await.unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(mock.catalog_calls(), 2);
    }

    #[tokio::test]
    async fn test_catalog_pages_stops_at_limit() {
        let mock = MockOpenHumans::new().with_endless_catalog();
        let pages: Vec<CatalogPage> = catalog_pages(&mock).try_collect().await.unwrap();

        assert_eq!(pages.len(), MAX_CATALOG_PAGES);
        assert_eq!(mock.catalog_calls(), MAX_CATALOG_PAGES);
    }

    #[tokio::test]
    async fn test_catalog_pages_stops_when_next_repeats_current_url() {
        let mock = catalog().with_self_linking_catalog();
        let pages: Vec<CatalogPage> = catalog_pages(&mock).try_collect().await.unwrap();

        // Second page links to itself: it is yielded once and the walk ends
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].next.as_deref(), Some("mock://catalog?page=1"));
        assert_eq!(mock.catalog_calls(), 2);
    }

    #[tokio::test]
    async fn test_catalog_pages_yields_error_and_stops() {
        struct Failing;

        #[async_trait::async_trait]
        impl OpenHumansApi for Failing {
            async fn request_token(
                &self,
                _: &crate::openhumans::ClientCredentials,
                _: &crate::openhumans::TokenRequest,
            ) -> Result<crate::openhumans::TokenResponse, OhError> {
                unreachable!()
            }
            async fn exchange_member(&self, _: &str) -> Result<crate::openhumans::MemberData, OhError> {
                unreachable!()
            }
            async fn public_data_page(&self, _: Option<&str>) -> Result<CatalogPage, OhError> {
                Err(OhError::Status {
                    status: 502,
                    body: "bad gateway".to_string(),
                })
            }
            async fn download(&self, _: &str) -> Result<bytes::Bytes, OhError> {
                unreachable!()
            }
        }

        let results: Vec<Result<CatalogPage, OhError>> =
            futures::StreamExt::collect(catalog_pages(&Failing)).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[tokio::test]
    async fn test_catalog_names_first_listing_wins() {
        let names = catalog_names(&catalog()).await.unwrap();
        assert_eq!(names["direct-sharing-71"], "Notebook Upload");
        assert_eq!(names["direct-sharing-128"], "Oura Connect");
        assert_eq!(names.len(), 3);
    }

    #[tokio::test]
    async fn test_suggest_deduplicates_repeated_id() {
        let mock = catalog();
        let content = r#"source="direct-sharing-71" ... source="direct-sharing-71""#;

        assert_eq!(suggest_data_sources(&mock, content).await.unwrap(), "Notebook Upload");
    }

    #[tokio::test]
    async fn test_suggest_unknown_id_is_empty() {
        let mock = MockOpenHumans::new().with_catalog(vec![vec![("direct-sharing-102", "Fitbit Connection")]]);
        let content = "direct-sharing-71 direct-sharing-71";

        assert_eq!(suggest_data_sources(&mock, content).await.unwrap(), "");
        assert_eq!(mock.catalog_calls(), 1);
    }

    #[tokio::test]
    async fn test_suggest_keeps_mention_order_across_pages() {
        let mock = catalog();
        let content = "direct-sharing-128, direct-sharing-999, direct-sharing-102";

        assert_eq!(
            suggest_data_sources(&mock, content).await.unwrap(),
            "Oura Connect,Fitbit Connection"
        );
    }

    #[tokio::test]
    async fn test_suggest_without_ids_skips_network() {
        let mock = catalog();

        assert_eq!(suggest_data_sources(&mock, "print('hello')").await.unwrap(), "");
        assert_eq!(mock.catalog_calls(), 0);
    }

    #[test]
    fn test_rank_data_sources() {
        let ranked = rank_data_sources(vec![strings(&["A", "B"]), strings(&["A"]), strings(&["B", "C"])]);

        assert_eq!(
            ranked,
            vec![("A".to_string(), 2), ("B".to_string(), 2), ("C".to_string(), 1)]
        );
    }

    #[test]
    fn test_rank_data_sources_skips_blank_names() {
        let ranked = rank_data_sources(vec![strings(&[""]), strings(&["A", " "])]);
        assert_eq!(ranked, vec![("A".to_string(), 1)]);

        let empty: Vec<Vec<String>> = Vec::new();
        assert!(rank_data_sources(empty).is_empty());
    }
}
