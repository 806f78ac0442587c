//! Page slicing for listing results.

pub const PUPPIES_PER_PAGE: usize = 6;
pub const DOGS_PER_PAGE: usize = 4;
pub const REVIEWS_PER_PAGE: usize = 2;

/// Cut `items` down to one page and report how many pages there are.
///
/// Out-of-range page numbers are clamped to the first or last page; an empty
/// input yields zero pages and an empty page.
#[must_use]
pub fn paginate<T>(mut items: Vec<T>, page: usize, per_page: usize) -> (Vec<T>, usize) {
    let per_page = per_page.max(1);
    let total_pages = items.len().div_ceil(per_page);
    let page = page.clamp(1, total_pages.max(1));

    let start = ((page - 1) * per_page).min(items.len());
    let end = (start + per_page).min(items.len());

    items.truncate(end);
    let page_items = items.split_off(start);
    (page_items, total_pages)
}
