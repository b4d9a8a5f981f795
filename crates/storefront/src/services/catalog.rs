//! Catalog service: paginated browsing and product administration.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

use bazaar_core::ProductId;

use crate::db::RepositoryError;
use crate::db::products::{ProductFilter, ProductRepository};
use crate::models::product::{NewProduct, Page, Product, ProductUpdate, TopSeller};

/// Number of entries in the best-seller ranking.
pub const TOP_SELLER_LIMIT: u32 = 10;

/// Maximum product name length.
pub const MAX_NAME_LENGTH: usize = 120;

/// Errors that can occur in catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Page numbers start at 1.
    #[error("page must be at least 1")]
    InvalidPage,

    /// Requested page lies past the last page.
    #[error("page {0} not found")]
    PageNotFound(u32),

    /// Product does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// Product fields failed validation.
    #[error("invalid product: {0}")]
    InvalidProduct(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Catalog operations.
pub struct CatalogService<'a> {
    products: ProductRepository<'a>,
    page_size: u32,
}

impl<'a> CatalogService<'a> {
    /// Create a catalog service listing `page_size` products per page.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool, page_size: u32) -> Self {
        Self {
            products: ProductRepository::new(pool),
            page_size,
        }
    }

    /// One page of products. Blank filters are ignored.
    ///
    /// Page 1 always exists, even for an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidPage` for page 0.
    /// Returns `CatalogError::PageNotFound` for a page past the last one.
    pub async fn list(
        &self,
        page: u32,
        category: Option<&str>,
        search: Option<&str>,
    ) -> Result<Page<Product>, CatalogError> {
        if page == 0 {
            return Err(CatalogError::InvalidPage);
        }

        let filter = ProductFilter {
            category: non_blank(category),
            search: non_blank(search),
        };
        let listing = self
            .products
            .list_page(&filter, page, self.page_size)
            .await?;

        if page > 1 && page > listing.total_pages {
            return Err(CatalogError::PageNotFound(page));
        }
        Ok(listing)
    }

    /// A single product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ProductNotFound` if the product doesn't exist.
    pub async fn product(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.products
            .get(id)
            .await?
            .ok_or(CatalogError::ProductNotFound(id))
    }

    /// Every product, for the back-office listing.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn all_products(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products.list_all().await?)
    }

    /// Best sellers.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn top_sellers(&self) -> Result<Vec<TopSeller>, CatalogError> {
        Ok(self.products.top_sellers(TOP_SELLER_LIMIT).await?)
    }

    /// Distinct categories.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn categories(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.products.categories().await?)
    }

    /// Number of products.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn count(&self) -> Result<i64, CatalogError> {
        Ok(self.products.count().await?)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidProduct` if the name is empty or too long.
    pub async fn create(&self, mut product: NewProduct) -> Result<Product, CatalogError> {
        product.name = validate_name(&product.name)?;
        let product = self.products.create(&product).await?;
        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Update a product's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidProduct` if the name is empty or too long.
    /// Returns `CatalogError::ProductNotFound` if the product doesn't exist.
    pub async fn update(
        &self,
        id: ProductId,
        mut update: ProductUpdate,
    ) -> Result<Product, CatalogError> {
        update.name = validate_name(&update.name)?;
        let product = self.products.update(id, &update).await.map_err(|e| match e {
            RepositoryError::NotFound => CatalogError::ProductNotFound(id),
            other => CatalogError::Repository(other),
        })?;
        info!(product_id = %id, "Product updated");
        Ok(product)
    }

    /// Delete a product. Carts still holding it treat the line as unavailable.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ProductNotFound` if the product doesn't exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), CatalogError> {
        self.products.delete(id).await.map_err(|e| match e {
            RepositoryError::NotFound => CatalogError::ProductNotFound(id),
            other => CatalogError::Repository(other),
        })?;
        info!(product_id = %id, "Product deleted");
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn validate_name(name: &str) -> Result<String, CatalogError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CatalogError::InvalidProduct(
            "name must not be empty".to_owned(),
        ));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(CatalogError::InvalidProduct(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_owned())
}
