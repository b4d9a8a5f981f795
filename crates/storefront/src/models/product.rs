//! Catalog domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bazaar_core::{Price, ProductId};

/// Category assigned when none is given.
pub const DEFAULT_CATEGORY: &str = "general";

/// A catalog product (domain type).
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    /// Server-relative image path, empty when the product has no image.
    pub image: String,
    /// Units available for sale.
    pub stock: u32,
    /// Cumulative units sold.
    pub sales: u32,
    pub category: String,
    /// Free-form descriptive markup, stored and returned verbatim.
    pub feature_html: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: Price,
    pub image: String,
    pub stock: u32,
    pub category: String,
    pub feature_html: String,
}

/// Fields an admin may change on an existing product.
///
/// Has no `sales` field: only checkout moves it.
#[derive(Debug, Clone)]
pub struct ProductUpdate {
    pub name: String,
    pub price: Price,
    pub image: String,
    pub stock: u32,
    pub category: String,
    pub feature_html: String,
}

/// Entry of the best-seller ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopSeller {
    pub name: String,
    pub sales: u32,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_prev: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    /// Assemble a page from its items and the total number of matching rows.
    #[must_use]
    pub fn new(items: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        let total_pages = total_pages(total, per_page);
        Self {
            items,
            page,
            per_page,
            total,
            total_pages,
            has_prev: page > 1,
            has_next: page < total_pages,
        }
    }
}

/// Number of pages needed for `total` rows.
#[must_use]
pub fn total_pages(total: u64, per_page: u32) -> u32 {
    if per_page == 0 {
        return 0;
    }
    let pages = total.div_ceil(u64::from(per_page));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 8), 0);
        assert_eq!(total_pages(8, 8), 1);
        assert_eq!(total_pages(9, 8), 2);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn test_page_navigation_flags() {
        let page: Page<u8> = Page::new(vec![1, 2], 2, 2, 5);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_prev);
        assert!(page.has_next);

        let last: Page<u8> = Page::new(vec![5], 3, 2, 5);
        assert!(!last.has_next);
    }
}
