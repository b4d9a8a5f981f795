//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::ProductId;

use crate::error::Result;
use crate::middleware::take_flashes;
use crate::models::{Flash, Page, Product, TopSeller};
use crate::services::CatalogService;
use crate::state::AppState;

/// Query parameters for the product listing.
#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub page: Option<u32>,
    pub category: Option<String>,
    pub search: Option<String>,
}

/// Product listing page data.
#[derive(Debug, Serialize)]
pub struct ProductListPage {
    pub products: Page<Product>,
    pub current_category: Option<String>,
    pub search: String,
    pub flashes: Vec<Flash>,
}

/// Product detail page data.
#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub product: Product,
    pub flashes: Vec<Flash>,
}

/// Display the paginated product listing.
#[instrument(skip(state, session))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<ProductListPage>> {
    let catalog = CatalogService::new(state.pool(), state.config().page_size);
    let products = catalog
        .list(
            query.page.unwrap_or(1),
            query.category.as_deref(),
            query.search.as_deref(),
        )
        .await?;

    Ok(Json(ProductListPage {
        products,
        current_category: query.category.filter(|c| !c.trim().is_empty()),
        search: query.search.unwrap_or_default(),
        flashes: take_flashes(&session).await?,
    }))
}

/// Display a single product.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductPage>> {
    let product = CatalogService::new(state.pool(), state.config().page_size)
        .product(id)
        .await?;

    Ok(Json(ProductPage {
        product,
        flashes: take_flashes(&session).await?,
    }))
}

/// Best sellers as `[{name, sales}]`.
#[instrument(skip(state))]
pub async fn top_products(State(state): State<AppState>) -> Result<Json<Vec<TopSeller>>> {
    let top = CatalogService::new(state.pool(), state.config().page_size)
        .top_sellers()
        .await?;
    Ok(Json(top))
}
