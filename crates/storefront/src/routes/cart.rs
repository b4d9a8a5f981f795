//! Cart and checkout route handlers.
//!
//! Every handler here requires a logged-in user. Mutations mirror the cart
//! to the account before answering.

use axum::{
    Form, Json,
    extract::{Path, State},
    http::{HeaderMap, Uri, header},
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument};

use bazaar_core::ProductId;

use super::is_safe_redirect;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::{RequireAuth, flash_redirect, push_flash, take_flashes};
use crate::models::{Flash, FlashLevel, Product};
use crate::services::cart::parse_quantity_updates;
use crate::services::{
    CartService, CartServiceError, CartView, CatalogService, CheckoutError, CheckoutService,
    OrderConfirmation,
};
use crate::state::AppState;

// =============================================================================
// Form and Page Types
// =============================================================================

/// Checkout form data.
#[derive(Debug, Deserialize)]
pub struct AddressForm {
    #[serde(default)]
    pub address: String,
}

/// Cart and checkout summary page data.
#[derive(Debug, Serialize)]
pub struct CartPage {
    pub cart: CartView,
    pub flashes: Vec<Flash>,
}

/// Buy-now summary page data.
#[derive(Debug, Serialize)]
pub struct BuyPage {
    pub product: Product,
    pub flashes: Vec<Flash>,
}

// =============================================================================
// Cart
// =============================================================================

/// Where to send the visitor after adding to cart: the local path they came
/// from, or the product listing.
fn back_target(headers: &HeaderMap) -> String {
    headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Uri>().ok())
        .and_then(|uri| uri.path_and_query().map(ToString::to_string))
        .filter(|target| is_safe_redirect(target))
        .unwrap_or_else(|| "/products".to_owned())
}

/// Add one unit of a product to the cart.
#[instrument(skip(state, session, user, headers), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Path(id): Path<ProductId>,
    headers: HeaderMap,
) -> Result<Redirect> {
    let quantity = CartService::new(state.pool(), &session).add(&user, id).await?;
    let product_id = id.to_string();
    add_breadcrumb("cart", "Added product", Some(&[("product_id", product_id.as_str())]));
    info!(product_id = %id, quantity, "Added to cart");

    Ok(flash_redirect(
        &session,
        FlashLevel::Success,
        "Product added to cart!",
        &back_target(&headers),
    )
    .await?)
}

/// Display the cart.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
) -> Result<Json<CartPage>> {
    let cart = CartService::new(state.pool(), &session).view(&user).await?;
    Ok(Json(CartPage {
        cart,
        flashes: take_flashes(&session).await?,
    }))
}

/// Remove a product from the cart.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Path(id): Path<ProductId>,
) -> Result<Redirect> {
    CartService::new(state.pool(), &session)
        .remove(&user, id)
        .await?;

    Ok(flash_redirect(&session, FlashLevel::Info, "Item removed from cart.", "/cart").await?)
}

/// Set quantities from `qty_<id>` form fields. Zero or less removes a line.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Redirect> {
    let updates = match parse_quantity_updates(&fields) {
        Ok(updates) => updates,
        Err(CartServiceError::InvalidQuantity(reason)) => {
            return Ok(flash_redirect(
                &session,
                FlashLevel::Danger,
                format!("Cart not updated: {reason}"),
                "/cart",
            )
            .await?);
        }
        Err(e) => return Err(e.into()),
    };

    CartService::new(state.pool(), &session)
        .apply_updates(&user, &updates)
        .await?;

    Ok(flash_redirect(&session, FlashLevel::Success, "Cart updated!", "/cart").await?)
}

// =============================================================================
// Checkout
// =============================================================================

/// Display the checkout summary.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn checkout_page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
) -> Result<Json<CartPage>> {
    show(State(state), RequireAuth(user), session).await
}

/// Place an order for the whole cart.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Form(form): Form<AddressForm>,
) -> Result<Redirect> {
    let result = CheckoutService::new(state.pool(), &session)
        .checkout(&user, &form.address)
        .await;

    match result {
        Ok(order) => {
            add_breadcrumb("checkout", "Order placed", None);
            flash_unavailable(&session, &order).await?;
            Ok(flash_redirect(
                &session,
                FlashLevel::Success,
                format!(
                    "Order placed! Shipping to {}. Total: ${:.2}",
                    order.address, order.total
                ),
                "/products",
            )
            .await?)
        }
        Err(CheckoutError::MissingAddress) => Ok(flash_redirect(
            &session,
            FlashLevel::Danger,
            "Please enter a delivery address.",
            "/checkout",
        )
        .await?),
        Err(CheckoutError::EmptyCart) => Ok(flash_redirect(
            &session,
            FlashLevel::Info,
            "Your cart is empty.",
            "/cart",
        )
        .await?),
        Err(CheckoutError::InsufficientStock { name, .. }) => Ok(flash_redirect(
            &session,
            FlashLevel::Danger,
            format!("Not enough stock for {name}"),
            "/cart",
        )
        .await?),
        Err(e) => Err(e.into()),
    }
}

async fn flash_unavailable(session: &Session, order: &OrderConfirmation) -> Result<()> {
    if !order.unavailable.is_empty() {
        push_flash(
            session,
            FlashLevel::Info,
            format!(
                "{} item(s) in your cart are no longer available and were removed.",
                order.unavailable.len()
            ),
        )
        .await?;
    }
    Ok(())
}

// =============================================================================
// Buy Now
// =============================================================================

/// Display the buy-now summary for one product.
#[instrument(skip_all, fields(product_id = %id))]
pub async fn buy_page(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
    Path(id): Path<ProductId>,
) -> Result<Json<BuyPage>> {
    let product = CatalogService::new(state.pool(), state.config().page_size)
        .product(id)
        .await?;
    Ok(Json(BuyPage {
        product,
        flashes: take_flashes(&session).await?,
    }))
}

/// Buy one unit of a product, bypassing the cart.
#[instrument(skip_all, fields(user_id = %user.id, product_id = %id))]
pub async fn buy(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Path(id): Path<ProductId>,
    Form(form): Form<AddressForm>,
) -> Result<Redirect> {
    let product_page = format!("/product/{id}");
    let result = CheckoutService::new(state.pool(), &session)
        .buy_now(&user, id, &form.address)
        .await;

    match result {
        Ok(order) => Ok(flash_redirect(
            &session,
            FlashLevel::Success,
            format!(
                "Purchase complete! Shipping to {}. Total: ${:.2}",
                order.address, order.total
            ),
            &product_page,
        )
        .await?),
        Err(CheckoutError::MissingAddress) => Ok(flash_redirect(
            &session,
            FlashLevel::Danger,
            "Please enter a delivery address.",
            &format!("/buy/{id}"),
        )
        .await?),
        Err(CheckoutError::InsufficientStock { .. }) => Ok(flash_redirect(
            &session,
            FlashLevel::Danger,
            "Sorry, this product is out of stock.",
            &product_page,
        )
        .await?),
        Err(e) => Err(e.into()),
    }
}
