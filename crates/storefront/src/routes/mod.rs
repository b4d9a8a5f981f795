//! HTTP route handlers for the storefront and back-office.
//!
//! Pages answer JSON with a `flashes` array; form posts queue a flash message
//! and answer `303 See Other`.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                         - Home (categories, best sellers)
//! GET  /products                 - Product listing (?page, ?category, ?search)
//! GET  /product/{id}             - Product detail
//! GET  /top-products             - Top 10 best sellers
//!
//! # Auth
//! GET  /login                    - Login page
//! POST /login                    - Login action
//! GET  /register                 - Register page
//! POST /register                 - Register action
//! GET  /logout                   - Logout
//!
//! # Cart (requires auth)
//! GET  /add-to-cart/{id}         - Add one unit, redirect back
//! GET  /cart                     - Cart view
//! GET  /remove-from-cart/{id}    - Remove a line
//! POST /update-cart              - Set quantities (qty_{id}=N)
//! GET  /checkout                 - Checkout summary
//! POST /checkout                 - Place order
//! GET  /buy/{id}                 - Buy-now summary
//! POST /buy/{id}                 - Buy one unit
//!
//! # Admin (requires admin)
//! GET  /admin/login              - Admin login page
//! POST /admin/login              - Admin login action
//! GET  /admin                    - Dashboard
//! GET  /admin/users              - User list
//! GET  /admin/users/add          - Add user page
//! POST /admin/users/add          - Create user
//! GET  /admin/users/edit/{id}    - Edit user page
//! POST /admin/users/edit/{id}    - Update user
//! POST /admin/users/delete/{id}  - Delete user
//! GET  /admin/products           - Product list
//! GET  /admin/products/add       - Add product page
//! POST /admin/products/add       - Create product (multipart)
//! GET  /admin/products/edit/{id} - Edit product page
//! POST /admin/products/edit/{id} - Update product (multipart)
//! POST /admin/products/delete/{id} - Delete product
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod home;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", get(auth::logout))
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/products", get(products::index))
        .route("/product/{id}", get(products::show))
        .route("/top-products", get(products::top_products))
}

/// Create the cart and checkout routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/add-to-cart/{id}", get(cart::add))
        .route("/cart", get(cart::show))
        .route("/remove-from-cart/{id}", get(cart::remove))
        .route("/update-cart", post(cart::update))
        .route("/checkout", get(cart::checkout_page).post(cart::checkout))
        .route("/buy/{id}", get(cart::buy_page).post(cart::buy))
}

/// Create all routes for the storefront.
///
/// `max_upload_bytes` bounds the multipart product forms.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(catalog_routes())
        .merge(auth_routes())
        .merge(cart_routes())
        .nest("/admin", admin::routes(max_upload_bytes))
}

/// Whether `next` is a local path that is safe to redirect to.
pub(crate) fn is_safe_redirect(next: &str) -> bool {
    next.starts_with('/') && !next.starts_with("//") && !next.contains('\\')
}
