//! Back-office dashboard.

use axum::{Json, extract::State};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::users::UserRepository;
use crate::error::Result;
use crate::middleware::{RequireAdmin, take_flashes};
use crate::models::{CurrentUser, Flash, TopSeller};
use crate::services::CatalogService;
use crate::state::AppState;

/// Dashboard page data.
#[derive(Debug, Serialize)]
pub struct DashboardPage {
    pub admin: CurrentUser,
    pub user_count: i64,
    pub product_count: i64,
    pub top_sellers: Vec<TopSeller>,
    pub flashes: Vec<Flash>,
}

/// Dashboard handler.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn dashboard(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<DashboardPage>> {
    let catalog = CatalogService::new(state.pool(), state.config().page_size);

    Ok(Json(DashboardPage {
        user_count: UserRepository::new(state.pool()).count().await?,
        product_count: catalog.count().await?,
        top_sellers: catalog.top_sellers().await?,
        flashes: take_flashes(&session).await?,
        admin,
    }))
}
