/// Parsing of free-text form input and notebook content

use regex::Regex;
use std::sync::OnceLock;

/// Splits a comma separated list, trimming each item and keeping order
///
/// No item is dropped, so an empty input yields a single empty item:
///
/// ```
/// use oh_notebooks_shared::registry::parse::parse_csv_list;
///
/// assert_eq!(parse_csv_list("a, b ,c"), vec!["a", "b", "c"]);
/// assert_eq!(parse_csv_list(""), vec![""]);
/// ```
pub fn parse_csv_list(input: &str) -> Vec<String> {
    input.split(',').map(|item| item.trim().to_string()).collect()
}

fn source_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"direct-sharing-\d+").expect("valid regex"))
}

/// Data source ids (`direct-sharing-<digits>`) mentioned in `content`
///
/// Each id appears once, in order of first mention.
pub fn find_source_ids(content: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();

    for found in source_id_pattern().find_iter(content) {
        if !ids.iter().any(|id| id == found.as_str()) {
            ids.push(found.as_str().to_string());
        }
    }

    ids
}
