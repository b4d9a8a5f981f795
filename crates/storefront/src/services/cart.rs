//! Session cart service.
//!
//! The cart lives in the caller's session under [`keys::CART`] and every
//! mutation is written through to the owning user's row before the session
//! is updated. If the session has no cart (fresh login, purged store) it is
//! rehydrated from the persisted snapshot.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tower_sessions::Session;
use tracing::{debug, instrument, warn};

use bazaar_core::{Cart, Price, ProductId, UserId};

use crate::db::RepositoryError;
use crate::db::products::ProductRepository;
use crate::db::users::UserRepository;
use crate::models::session::{CurrentUser, keys};
use crate::models::user::User;

/// Prefix of the quantity fields posted by the cart form.
const QUANTITY_FIELD_PREFIX: &str = "qty_";

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartServiceError {
    /// The product does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The logged-in user no longer exists.
    #[error("user not found")]
    UserNotFound,

    /// A posted quantity or product ID could not be parsed.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Session storage error.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A cart line joined with current product data.
#[derive(Debug, Clone, Serialize)]
pub struct CartViewLine {
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    pub unit_price: Price,
    pub quantity: u32,
    pub subtotal: Decimal,
}

/// Cart contents ready for display.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartViewLine>,
    pub total: Decimal,
    pub total_units: u64,
}

impl CartView {
    /// Whether there is nothing to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Cart operations for one request.
pub struct CartService<'a> {
    pool: &'a SqlitePool,
    session: &'a Session,
}

impl<'a> CartService<'a> {
    /// Create a cart service bound to the request's session.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool, session: &'a Session) -> Self {
        Self { pool, session }
    }

    /// Current cart for `user`, rehydrating from the database when the
    /// session has none.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::UserNotFound` if the user row is gone.
    /// Returns `CartServiceError::Session` or `CartServiceError::Repository`
    /// on storage failures.
    pub async fn load(&self, user: &CurrentUser) -> Result<Cart, CartServiceError> {
        match self.session.get::<Cart>(keys::CART).await {
            Ok(Some(cart)) => return Ok(cart),
            Ok(None) => {}
            Err(tower_sessions::session::Error::SerdeJson(e)) => {
                warn!(user_id = %user.id, error = %e, "Unreadable session cart, rehydrating");
            }
            Err(e) => return Err(e.into()),
        }

        let stored = UserRepository::new(self.pool)
            .get_by_id(user.id)
            .await?
            .ok_or(CartServiceError::UserNotFound)?;
        let cart = decode_snapshot(user.id, &stored.cart_snapshot);

        debug!(user_id = %user.id, lines = cart.len(), "Cart rehydrated from account");
        self.session.insert(keys::CART, &cart).await?;
        Ok(cart)
    }

    /// Replace the session cart with the snapshot stored on `user` (login).
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::Session` if the session cannot be written.
    pub async fn restore(&self, user: &User) -> Result<Cart, CartServiceError> {
        let cart = decode_snapshot(user.id, &user.cart_snapshot);
        self.session.insert(keys::CART, &cart).await?;
        Ok(cart)
    }

    /// Mirror `cart` to the user's row, then store it in the session.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::UserNotFound` if the user row is gone.
    /// Returns `CartServiceError::Repository` if the mirror write fails.
    pub async fn persist(&self, user: &CurrentUser, cart: &Cart) -> Result<(), CartServiceError> {
        UserRepository::new(self.pool)
            .update_cart(user.id, &cart.to_snapshot())
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CartServiceError::UserNotFound,
                other => CartServiceError::Repository(other),
            })?;

        self.session.insert(keys::CART, cart).await?;
        Ok(())
    }

    /// Store `cart` in the session only. Used after the row was written in a
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::Session` if the session cannot be written.
    pub async fn cache(&self, cart: &Cart) -> Result<(), CartServiceError> {
        self.session.insert(keys::CART, cart).await?;
        Ok(())
    }

    /// Add one unit of a product. Returns the new quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::ProductNotFound` if the product doesn't exist.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn add(
        &self,
        user: &CurrentUser,
        product_id: ProductId,
    ) -> Result<u32, CartServiceError> {
        let mut cart = self.load(user).await?;

        if ProductRepository::new(self.pool)
            .get(product_id)
            .await?
            .is_none()
        {
            return Err(CartServiceError::ProductNotFound(product_id));
        }

        let quantity = cart.add(product_id);
        self.persist(user, &cart).await?;
        Ok(quantity)
    }

    /// Remove a product. Returns `true` if it was in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError` on storage failures.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn remove(
        &self,
        user: &CurrentUser,
        product_id: ProductId,
    ) -> Result<bool, CartServiceError> {
        let mut cart = self.load(user).await?;
        let removed = cart.remove(product_id);
        self.persist(user, &cart).await?;
        Ok(removed)
    }

    /// Set the quantity of one product; non-positive removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError` on storage failures.
    pub async fn set_quantity(
        &self,
        user: &CurrentUser,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Cart, CartServiceError> {
        self.apply_updates(user, &[(product_id, quantity)]).await
    }

    /// Apply several quantity updates as one mutation.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError` on storage failures.
    pub async fn apply_updates(
        &self,
        user: &CurrentUser,
        updates: &[(ProductId, i64)],
    ) -> Result<Cart, CartServiceError> {
        let mut cart = self.load(user).await?;
        for &(product_id, quantity) in updates {
            cart.set_quantity(product_id, quantity);
        }
        self.persist(user, &cart).await?;
        Ok(cart)
    }

    /// Cart joined with current product data. Lines whose product was deleted
    /// are left out.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError` on storage failures.
    pub async fn view(&self, user: &CurrentUser) -> Result<CartView, CartServiceError> {
        let cart = self.load(user).await?;
        let products = ProductRepository::new(self.pool);

        let mut lines = Vec::with_capacity(cart.len());
        for line in cart.lines() {
            let Some(product) = products.get(line.product_id).await? else {
                debug!(product_id = %line.product_id, "Skipping unavailable cart line");
                continue;
            };
            lines.push(CartViewLine {
                product_id: product.id,
                subtotal: product.price.times(line.quantity),
                name: product.name,
                image: product.image,
                unit_price: product.price,
                quantity: line.quantity,
            });
        }

        let total: Decimal = lines.iter().map(|l| l.subtotal).sum();
        let total_units = lines.iter().map(|l| u64::from(l.quantity)).sum();
        Ok(CartView {
            lines,
            total,
            total_units,
        })
    }
}

/// Decode a persisted snapshot, falling back to an empty cart.
pub fn decode_snapshot(user_id: UserId, snapshot: &str) -> Cart {
    Cart::from_snapshot(snapshot).unwrap_or_else(|e| {
        warn!(user_id = %user_id, error = %e, "Corrupt cart snapshot, starting empty");
        Cart::new()
    })
}

/// Parse the `qty_<product id>=<quantity>` fields of the cart form.
///
/// Other fields are ignored. Any malformed entry rejects the whole form.
///
/// # Errors
///
/// Returns `CartServiceError::InvalidQuantity` naming the first bad field.
pub fn parse_quantity_updates(
    fields: &[(String, String)],
) -> Result<Vec<(ProductId, i64)>, CartServiceError> {
    fields
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(QUANTITY_FIELD_PREFIX)
                .map(|id| (key, id, value))
        })
        .map(|(key, id, value)| {
            let product_id = id
                .parse::<ProductId>()
                .map_err(|_| CartServiceError::InvalidQuantity(format!("bad product in {key}")))?;
            let quantity = value.trim().parse::<i64>().map_err(|_| {
                CartServiceError::InvalidQuantity(format!("'{value}' is not a whole number"))
            })?;
            Ok((product_id, quantity))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;
    use crate::db::test_support;
    use crate::models::product::NewProduct;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    async fn setup(pool: &SqlitePool) -> (CurrentUser, ProductId) {
        let user = UserRepository::new(pool)
            .create("shopper", "hash", false)
            .await
            .unwrap();
        let product = ProductRepository::new(pool)
            .create(&NewProduct {
                name: "Kettle".to_owned(),
                price: "25.50".parse().unwrap(),
                image: String::new(),
                stock: 10,
                category: "kitchen".to_owned(),
                feature_html: String::new(),
            })
            .await
            .unwrap();
        (CurrentUser::from(&user), product.id)
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[tokio::test]
    async fn test_add_mirrors_to_user_row() {
        let pool = test_support::pool().await;
        let (user, product_id) = setup(&pool).await;
        let session = session();
        let carts = CartService::new(&pool, &session);

        assert_eq!(carts.add(&user, product_id).await.unwrap(), 1);
        assert_eq!(carts.add(&user, product_id).await.unwrap(), 2);

        let stored = UserRepository::new(&pool)
            .get_by_id(user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.cart_snapshot, format!(r#"{{"{product_id}":2}}"#));
    }

    #[tokio::test]
    async fn test_failed_mirror_write_leaves_session_cart_alone() {
        let pool = test_support::pool().await;
        let (user, product_id) = setup(&pool).await;
        let session = session();
        let carts = CartService::new(&pool, &session);
        carts.add(&user, product_id).await.unwrap();

        UserRepository::new(&pool)
            .delete_non_admin(user.id)
            .await
            .unwrap();

        let result = carts.add(&user, product_id).await;
        assert!(matches!(result, Err(CartServiceError::UserNotFound)));
        let result = carts.set_quantity(&user, product_id, 7).await;
        assert!(matches!(result, Err(CartServiceError::UserNotFound)));

        let cached = session.get::<Cart>(keys::CART).await.unwrap().unwrap();
        assert_eq!(cached.quantity(product_id), Some(1));
    }

    #[tokio::test]
    async fn test_add_unknown_product_is_not_found() {
        let pool = test_support::pool().await;
        let (user, _) = setup(&pool).await;
        let session = session();
        let carts = CartService::new(&pool, &session);

        let result = carts.add(&user, ProductId::new(999)).await;
        assert!(matches!(result, Err(CartServiceError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_set_quantity_non_positive_removes() {
        let pool = test_support::pool().await;
        let (user, product_id) = setup(&pool).await;
        let session = session();
        let carts = CartService::new(&pool, &session);

        let cart = carts.set_quantity(&user, product_id, 5).await.unwrap();
        assert_eq!(cart.quantity(product_id), Some(5));
        let cart = carts.set_quantity(&user, product_id, -1).await.unwrap();
        assert_eq!(cart.quantity(product_id), None);

        let stored = UserRepository::new(&pool)
            .get_by_id(user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.cart_snapshot, "{}");
    }

    #[tokio::test]
    async fn test_load_rehydrates_from_account_when_session_is_empty() {
        let pool = test_support::pool().await;
        let (user, product_id) = setup(&pool).await;
        UserRepository::new(&pool)
            .update_cart(user.id, &format!(r#"{{"{product_id}":3}}"#))
            .await
            .unwrap();

        let session = session();
        let cart = CartService::new(&pool, &session).load(&user).await.unwrap();
        assert_eq!(cart.quantity(product_id), Some(3));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_yields_empty_cart() {
        let pool = test_support::pool().await;
        let (user, _) = setup(&pool).await;
        UserRepository::new(&pool)
            .update_cart(user.id, "{not json")
            .await
            .unwrap();

        let session = session();
        let cart = CartService::new(&pool, &session).load(&user).await.unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_view_skips_deleted_products_and_totals() {
        let pool = test_support::pool().await;
        let (user, product_id) = setup(&pool).await;
        let session = session();
        let carts = CartService::new(&pool, &session);

        carts
            .apply_updates(&user, &[(product_id, 2), (ProductId::new(777), 1)])
            .await
            .unwrap();

        let view = carts.view(&user).await.unwrap();
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.total, "51.00".parse::<Decimal>().unwrap());
        assert_eq!(view.total_units, 2);
    }

    #[test]
    fn test_parse_quantity_updates_ignores_other_fields() {
        let updates =
            parse_quantity_updates(&pairs(&[("qty_3", " 2 "), ("csrf", "x"), ("qty_7", "0")]))
                .unwrap();
        assert_eq!(
            updates,
            vec![(ProductId::new(3), 2), (ProductId::new(7), 0)]
        );
    }

    #[test]
    fn test_parse_quantity_updates_rejects_malformed() {
        assert!(parse_quantity_updates(&pairs(&[("qty_3", "two")])).is_err());
        assert!(parse_quantity_updates(&pairs(&[("qty_x", "1")])).is_err());
        assert!(parse_quantity_updates(&pairs(&[("qty_3", "1"), ("qty_4", "")])).is_err());
    }
}
