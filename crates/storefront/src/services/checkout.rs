//! Checkout and buy-now order processing.
//!
//! Checkout runs in a single transaction: each cart line is re-read and its
//! stock decremented with a guarded `UPDATE`. The first line that cannot be
//! satisfied rolls the whole transaction back, leaving products and cart as
//! they were. On success the emptied cart is written in the same
//! transaction.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use bazaar_core::{Cart, Price, ProductId};

use super::cart::{CartService, CartServiceError};
use crate::db::RepositoryError;
use crate::db::products::ProductRepository;
use crate::db::users::UserRepository;
use crate::models::session::CurrentUser;

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// No delivery address was given.
    #[error("a delivery address is required")]
    MissingAddress,

    /// Nothing purchasable in the cart.
    #[error("your cart is empty")]
    EmptyCart,

    /// Buy-now target does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// A line asks for more units than are in stock.
    #[error("not enough stock for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        requested: u32,
        available: u32,
    },

    /// Cart loading or persistence error.
    #[error(transparent)]
    Cart(#[from] CartServiceError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl CheckoutError {
    /// Whether this error is the customer's to fix rather than a server fault.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::MissingAddress | Self::EmptyCart | Self::InsufficientStock { .. }
        )
    }
}

/// One purchased line.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Price,
    pub subtotal: Decimal,
}

/// Result of a successful order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderConfirmation {
    pub address: String,
    pub lines: Vec<OrderLine>,
    pub total: Decimal,
    /// Cart lines dropped because their product no longer exists.
    pub unavailable: Vec<ProductId>,
}

/// Order processing for one request.
pub struct CheckoutService<'a> {
    pool: &'a SqlitePool,
    carts: CartService<'a>,
}

impl<'a> CheckoutService<'a> {
    /// Create a checkout service bound to the request's session.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool, session: &'a Session) -> Self {
        Self {
            pool,
            carts: CartService::new(pool, session),
        }
    }

    /// Purchase every line in the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::MissingAddress` if `address` is blank.
    /// Returns `CheckoutError::EmptyCart` if nothing purchasable is in the cart.
    /// Returns `CheckoutError::InsufficientStock` for the first line (by
    /// product ID) that cannot be satisfied; nothing is changed.
    #[instrument(skip(self, user, address), fields(user_id = %user.id))]
    pub async fn checkout(
        &self,
        user: &CurrentUser,
        address: &str,
    ) -> Result<OrderConfirmation, CheckoutError> {
        let address = require_address(address)?;
        let cart = self.carts.load(user).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let mut lines = Vec::with_capacity(cart.len());
        let mut unavailable = Vec::new();

        for line in cart.lines() {
            let Some(product) = ProductRepository::get_on(&mut *tx, line.product_id).await? else {
                warn!(product_id = %line.product_id, "Dropping unavailable cart line");
                unavailable.push(line.product_id);
                continue;
            };

            if !ProductRepository::apply_sale(&mut *tx, product.id, line.quantity).await? {
                tx.rollback().await.map_err(RepositoryError::from)?;
                info!(
                    product_id = %product.id,
                    requested = line.quantity,
                    available = product.stock,
                    "Checkout rejected: insufficient stock"
                );
                return Err(CheckoutError::InsufficientStock {
                    product_id: product.id,
                    name: product.name,
                    requested: line.quantity,
                    available: product.stock,
                });
            }

            lines.push(OrderLine {
                product_id: product.id,
                subtotal: product.price.times(line.quantity),
                name: product.name,
                quantity: line.quantity,
                unit_price: product.price,
            });
        }

        if lines.is_empty() {
            tx.rollback().await.map_err(RepositoryError::from)?;
            // Only unavailable lines were left; prune them.
            self.carts.persist(user, &Cart::new()).await?;
            return Err(CheckoutError::EmptyCart);
        }

        let emptied = Cart::new();
        UserRepository::update_cart_on(&mut *tx, user.id, &emptied.to_snapshot()).await?;
        tx.commit().await.map_err(RepositoryError::from)?;
        if let Err(e) = self.carts.cache(&emptied).await {
            warn!(error = %e, "Order placed but session cart not cleared");
        }

        let total: Decimal = lines.iter().map(|l| l.subtotal).sum();
        info!(lines = lines.len(), %total, "Order placed");

        Ok(OrderConfirmation {
            address: address.to_owned(),
            lines,
            total,
            unavailable,
        })
    }

    /// Purchase one unit of a single product, leaving the cart alone.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::MissingAddress` if `address` is blank.
    /// Returns `CheckoutError::ProductNotFound` if the product doesn't exist.
    /// Returns `CheckoutError::InsufficientStock` if it is out of stock.
    #[instrument(skip(self, user, address), fields(user_id = %user.id))]
    pub async fn buy_now(
        &self,
        user: &CurrentUser,
        product_id: ProductId,
        address: &str,
    ) -> Result<OrderConfirmation, CheckoutError> {
        let address = require_address(address)?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let product = ProductRepository::get_on(&mut *tx, product_id)
            .await?
            .ok_or(CheckoutError::ProductNotFound(product_id))?;

        if !ProductRepository::apply_sale(&mut *tx, product_id, 1).await? {
            tx.rollback().await.map_err(RepositoryError::from)?;
            return Err(CheckoutError::InsufficientStock {
                product_id,
                name: product.name,
                requested: 1,
                available: product.stock,
            });
        }
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(%product_id, "Buy-now order placed");
        let line = OrderLine {
            product_id,
            name: product.name,
            quantity: 1,
            unit_price: product.price,
            subtotal: product.price.amount(),
        };

        Ok(OrderConfirmation {
            address: address.to_owned(),
            total: line.subtotal,
            lines: vec![line],
            unavailable: Vec::new(),
        })
    }
}

fn require_address(address: &str) -> Result<&str, CheckoutError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(CheckoutError::MissingAddress);
    }
    Ok(address)
}
