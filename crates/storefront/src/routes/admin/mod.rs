//! Back-office route handlers.
//!
//! Everything except the login page requires an admin session via
//! [`RequireAdmin`](crate::middleware::RequireAdmin).

pub mod dashboard;
pub mod products;
pub mod users;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use super::auth;
use crate::state::AppState;

/// Create the back-office router, mounted under `/admin`.
///
/// `max_upload_bytes` bounds the multipart product forms.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::dashboard))
        .route(
            "/login",
            get(auth::admin_login_page).post(auth::admin_login),
        )
        // Users
        .route("/users", get(users::index))
        .route("/users/add", get(users::new_page).post(users::create))
        .route("/users/edit/{id}", get(users::edit_page).post(users::update))
        .route("/users/delete/{id}", post(users::delete))
        // Products
        .route("/products", get(products::index))
        .route(
            "/products/add",
            get(products::new_page)
                .post(products::create)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route(
            "/products/edit/{id}",
            get(products::edit_page)
                .post(products::update)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/products/delete/{id}", post(products::delete))
}
