//! Product repository: catalog CRUD, listing and the guarded stock decrement.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use bazaar_core::{Price, ProductId};

use super::RepositoryError;
use crate::models::product::{NewProduct, Page, Product, ProductUpdate, TopSeller};

const PRODUCT_COLUMNS: &str =
    "id, name, price, image, stock, sales, category, feature_html, created_at, updated_at";

/// Database row for `product`.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    price: String,
    image: String,
    stock: i64,
    sales: i64,
    category: String,
    feature_html: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        let price: Price = r.price.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("product {} has bad price: {e}", r.id))
        })?;
        let stock = u32::try_from(r.stock).map_err(|_| {
            RepositoryError::DataCorruption(format!("product {} has bad stock: {}", r.id, r.stock))
        })?;
        let sales = u32::try_from(r.sales).map_err(|_| {
            RepositoryError::DataCorruption(format!("product {} has bad sales: {}", r.id, r.sales))
        })?;

        Ok(Self {
            id: ProductId::new(r.id),
            name: r.name,
            price,
            image: r.image,
            stock,
            sales,
            category: r.category,
            feature_html: r.feature_html,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TopSellerRow {
    name: String,
    sales: i64,
}

/// Optional catalog filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Exact category match.
    pub category: Option<String>,
    /// Case-insensitive substring match on the product name.
    pub search: Option<String>,
}

impl ProductFilter {
    /// `LIKE` pattern for the search term, with wildcards escaped.
    fn search_pattern(&self) -> Option<String> {
        self.search.as_deref().map(|term| {
            let mut pattern = String::with_capacity(term.len() + 2);
            pattern.push('%');
            for c in fold_case(term).chars() {
                if matches!(c, '%' | '_' | '\\') {
                    pattern.push('\\');
                }
                pattern.push(c);
            }
            pattern.push('%');
            pattern
        })
    }
}

/// Case-folded form of a product name, stored in `search_name`.
///
/// SQLite's `lower()` and `LIKE` only fold ASCII, so names are folded here
/// on write and search terms the same way on read.
fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a product with zero sales.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO product (name, search_name, price, image, stock, sales, category,
                                 feature_html, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?, ?)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&product.name)
        .bind(fold_case(&product.name))
        .bind(product.price.to_string())
        .bind(&product.image)
        .bind(i64::from(product.stock))
        .bind(&product.category)
        .bind(&product.feature_html)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the row is invalid.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::get_on(&mut conn, id).await
    }

    /// Get a product by ID on an existing connection or transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the row is invalid.
    pub async fn get_on(
        conn: &mut SqliteConnection,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?"
        ))
        .bind(id.as_i64())
        .fetch_optional(conn)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Find a product by exact name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE name = ? ORDER BY id LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Replace the editable fields of a product. Sales are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE product
            SET name = ?, search_name = ?, price = ?, image = ?, stock = ?, category = ?,
                feature_html = ?, updated_at = ?
            WHERE id = ?
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&update.name)
        .bind(fold_case(&update.name))
        .bind(update.price.to_string())
        .bind(&update.image)
        .bind(i64::from(update.stock))
        .bind(&update.category)
        .bind(&update.feature_html)
        .bind(Utc::now())
        .bind(id.as_i64())
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM product WHERE id = ?")
            .bind(id.as_i64())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete every product. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM product")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Fetch one page of products matching `filter`, ordered by ID.
    ///
    /// `page` is 1-based; callers validate it against the page count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a row is invalid.
    pub async fn list_page(
        &self,
        filter: &ProductFilter,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Product>, RepositoryError> {
        let pattern = filter.search_pattern();

        let total = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM product
            WHERE (? IS NULL OR category = ?)
              AND (? IS NULL OR search_name LIKE ? ESCAPE '\')
            ",
        )
        .bind(filter.category.as_deref())
        .bind(filter.category.as_deref())
        .bind(pattern.as_deref())
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let offset = i64::from(page.saturating_sub(1)) * i64::from(per_page);
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM product
            WHERE (? IS NULL OR category = ?)
              AND (? IS NULL OR search_name LIKE ? ESCAPE '\')
            ORDER BY id ASC
            LIMIT ? OFFSET ?
            "
        ))
        .bind(filter.category.as_deref())
        .bind(filter.category.as_deref())
        .bind(pattern.as_deref())
        .bind(pattern.as_deref())
        .bind(i64::from(per_page))
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let total = u64::try_from(total).unwrap_or_default();

        Ok(Page::new(items, page, per_page, total))
    }

    /// List every product ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a row is invalid.
    pub async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product ORDER BY id ASC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Count products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM product")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Best sellers by cumulative sales, ties broken by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_sellers(&self, limit: u32) -> Result<Vec<TopSeller>, RepositoryError> {
        let rows = sqlx::query_as::<_, TopSellerRow>(
            "SELECT name, sales FROM product ORDER BY sales DESC, id ASC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let sales = u32::try_from(r.sales).map_err(|_| {
                    RepositoryError::DataCorruption(format!("bad sales count: {}", r.sales))
                })?;
                Ok(TopSeller {
                    name: r.name,
                    sales,
                })
            })
            .collect()
    }

    /// Distinct categories in alphabetical order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let categories = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT category FROM product ORDER BY category ASC",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// Record the sale of `quantity` units if enough stock remains.
    ///
    /// The check and the decrement are one conditional `UPDATE`, so stock can
    /// never go negative. Returns `false` when the product is missing or has
    /// fewer than `quantity` units.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn apply_sale(
        conn: &mut SqliteConnection,
        id: ProductId,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        let quantity = i64::from(quantity);
        let result = sqlx::query(
            r"
            UPDATE product
            SET stock = stock - ?, sales = sales + ?, updated_at = ?
            WHERE id = ? AND stock >= ?
            ",
        )
        .bind(quantity)
        .bind(quantity)
        .bind(Utc::now())
        .bind(id.as_i64())
        .bind(quantity)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use crate::models::product::DEFAULT_CATEGORY;

    fn new_product(name: &str, category: &str, stock: u32) -> NewProduct {
        NewProduct {
            name: name.to_owned(),
            price: "9.99".parse().unwrap(),
            image: String::new(),
            stock,
            category: category.to_owned(),
            feature_html: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_product() {
        let pool = test_support::pool().await;
        let repo = ProductRepository::new(&pool);

        let created = repo
            .create(&new_product("Lamp", DEFAULT_CATEGORY, 4))
            .await
            .unwrap();
        assert_eq!(created.sales, 0);
        assert_eq!(created.stock, 4);

        let fetched = repo.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Lamp");
        assert_eq!(fetched.price.to_string(), "9.99");
        assert!(repo.get(ProductId::new(404)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_does_not_touch_sales() {
        let pool = test_support::pool().await;
        let repo = ProductRepository::new(&pool);
        let product = repo.create(&new_product("Mug", "kitchen", 10)).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        assert!(ProductRepository::apply_sale(&mut conn, product.id, 3).await.unwrap());
        drop(conn);

        let updated = repo
            .update(
                product.id,
                &ProductUpdate {
                    name: "Big Mug".to_owned(),
                    price: "12".parse().unwrap(),
                    image: "/static/uploads/mug.png".to_owned(),
                    stock: 20,
                    category: "kitchen".to_owned(),
                    feature_html: "<b>big</b>".to_owned(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Big Mug");
        assert_eq!(updated.stock, 20);
        assert_eq!(updated.sales, 3);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let pool = test_support::pool().await;
        let repo = ProductRepository::new(&pool);
        let product = repo.create(&new_product("Pen", "office", 1)).await.unwrap();

        repo.delete(product.id).await.unwrap();
        assert!(matches!(
            repo.delete(product.id).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_apply_sale_guards_stock() {
        let pool = test_support::pool().await;
        let repo = ProductRepository::new(&pool);
        let product = repo.create(&new_product("Chair", "home", 3)).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        assert!(!ProductRepository::apply_sale(&mut conn, product.id, 5).await.unwrap());
        assert!(ProductRepository::apply_sale(&mut conn, product.id, 3).await.unwrap());
        assert!(!ProductRepository::apply_sale(&mut conn, product.id, 1).await.unwrap());
        drop(conn);

        let after = repo.get(product.id).await.unwrap().unwrap();
        assert_eq!(after.stock, 0);
        assert_eq!(after.sales, 3);
    }

    #[tokio::test]
    async fn test_list_page_filters_and_paginates() {
        let pool = test_support::pool().await;
        let repo = ProductRepository::new(&pool);
        for i in 0..10 {
            let category = if i % 2 == 0 { "even" } else { "odd" };
            repo.create(&new_product(&format!("Item {i}"), category, 1))
                .await
                .unwrap();
        }

        let first = repo
            .list_page(&ProductFilter::default(), 1, 8)
            .await
            .unwrap();
        assert_eq!(first.items.len(), 8);
        assert_eq!(first.total, 10);
        assert_eq!(first.total_pages, 2);
        assert!(first.has_next);

        let second = repo
            .list_page(&ProductFilter::default(), 2, 8)
            .await
            .unwrap();
        assert_eq!(second.items.len(), 2);

        let odd = ProductFilter {
            category: Some("odd".to_owned()),
            search: None,
        };
        let page = repo.list_page(&odd, 1, 8).await.unwrap();
        assert_eq!(page.total, 5);
        assert!(page.items.iter().all(|p| p.category == "odd"));
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_escapes_wildcards() {
        let pool = test_support::pool().await;
        let repo = ProductRepository::new(&pool);
        repo.create(&new_product("Blue Widget", "general", 1))
            .await
            .unwrap();
        repo.create(&new_product("100% Cotton Shirt", "general", 1))
            .await
            .unwrap();
        repo.create(&new_product("Red_Hat", "general", 1))
            .await
            .unwrap();

        let search = |term: &str| ProductFilter {
            category: None,
            search: Some(term.to_owned()),
        };

        let page = repo.list_page(&search("WIDGET"), 1, 8).await.unwrap();
        assert_eq!(page.total, 1);

        let page = repo.list_page(&search("%"), 1, 8).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "100% Cotton Shirt");

        let page = repo.list_page(&search("_"), 1, 8).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Red_Hat");
    }

    #[tokio::test]
    async fn test_search_folds_non_ascii_names() {
        let pool = test_support::pool().await;
        let repo = ProductRepository::new(&pool);
        let created = repo
            .create(&new_product("\u{c1}o Thun", "general", 1))
            .await
            .unwrap();

        let search = |term: &str| ProductFilter {
            category: None,
            search: Some(term.to_owned()),
        };
        for term in ["\u{c1}o Thun", "\u{c1}O", "\u{e1}o", "thun"] {
            let page = repo.list_page(&search(term), 1, 8).await.unwrap();
            assert_eq!(page.total, 1, "search {term:?}");
        }

        repo.update(
            created.id,
            &ProductUpdate {
                name: "\u{d0}\u{e8}n L\u{1ed2}ng".to_owned(),
                price: created.price,
                image: String::new(),
                stock: 1,
                category: "general".to_owned(),
                feature_html: String::new(),
            },
        )
        .await
        .unwrap();
        let page = repo.list_page(&search("\u{e1}o"), 1, 8).await.unwrap();
        assert_eq!(page.total, 0);
        let page = repo.list_page(&search("l\u{1ed3}ng"), 1, 8).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_top_sellers_order_and_limit() {
        let pool = test_support::pool().await;
        let repo = ProductRepository::new(&pool);
        let mut ids = Vec::new();
        for i in 0..12 {
            let p = repo
                .create(&new_product(&format!("P{i}"), "general", 100))
                .await
                .unwrap();
            ids.push(p.id);
        }

        let mut conn = pool.acquire().await.unwrap();
        ProductRepository::apply_sale(&mut conn, ids[5], 7).await.unwrap();
        ProductRepository::apply_sale(&mut conn, ids[2], 7).await.unwrap();
        ProductRepository::apply_sale(&mut conn, ids[9], 9).await.unwrap();
        drop(conn);

        let top = repo.top_sellers(10).await.unwrap();
        assert_eq!(top.len(), 10);
        assert_eq!(top[0].name, "P9");
        assert_eq!(top[1].name, "P2");
        assert_eq!(top[2].name, "P5");
        assert_eq!(top[3].sales, 0);
    }

    #[tokio::test]
    async fn test_categories_are_distinct() {
        let pool = test_support::pool().await;
        let repo = ProductRepository::new(&pool);
        repo.create(&new_product("A", "toys", 1)).await.unwrap();
        repo.create(&new_product("B", "books", 1)).await.unwrap();
        repo.create(&new_product("C", "toys", 1)).await.unwrap();

        assert_eq!(repo.categories().await.unwrap(), vec!["books", "toys"]);
    }
}
