//! Home page route handler.

use axum::{Json, extract::State};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::{OptionalAuth, take_flashes};
use crate::models::{CurrentUser, Flash, TopSeller};
use crate::services::CatalogService;
use crate::state::AppState;

/// Home page data.
#[derive(Debug, Serialize)]
pub struct HomePage {
    pub user: Option<CurrentUser>,
    pub categories: Vec<String>,
    pub top_sellers: Vec<TopSeller>,
    pub flashes: Vec<Flash>,
}

/// Display the home page.
#[instrument(skip(state, session, user))]
pub async fn home(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<Json<HomePage>> {
    let catalog = CatalogService::new(state.pool(), state.config().page_size);

    Ok(Json(HomePage {
        user,
        categories: catalog.categories().await?,
        top_sellers: catalog.top_sellers().await?,
        flashes: take_flashes(&session).await?,
    }))
}
