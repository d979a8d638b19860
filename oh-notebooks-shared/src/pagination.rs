/// Page slicing for list responses
///
/// A requested page that is missing or not a positive number yields page 1;
/// a page past the end yields the last page. An empty list still has one
/// (empty) page.

use serde::Serialize;

/// Items shown per page
pub const PER_PAGE: usize = 10;

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,

    /// 1-based page number actually served
    pub page: usize,

    pub num_pages: usize,
    pub total: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    /// Converts the items, keeping the page position
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            num_pages: self.num_pages,
            total: self.total,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

/// Slices `items` into the requested page of `per_page` items
pub fn paginate<T>(items: Vec<T>, requested: Option<&str>, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total = items.len();
    let num_pages = total.div_ceil(per_page).max(1);

    let page = requested
        .and_then(|p| p.trim().parse::<usize>().ok())
        .filter(|&p| p >= 1)
        .unwrap_or(1)
        .min(num_pages);

    let items = items
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();

    Page {
        items,
        page,
        num_pages,
        total,
        has_next: page < num_pages,
        has_previous: page > 1,
    }
}
