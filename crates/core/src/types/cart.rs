//! Shopping cart mapping and its persisted snapshot format.
//!
//! A [`Cart`] maps product IDs to strictly positive quantities. It lives in the
//! caller's session and is mirrored into the owning user's row as a JSON
//! snapshot (`{"<product id>": <quantity>}`) after every mutation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::ProductId;

/// Errors produced when decoding a cart snapshot.
#[derive(Debug, Error)]
pub enum CartError {
    /// The snapshot was not a JSON object of integer quantities.
    #[error("malformed cart snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One line of a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Mapping of product ID to desired quantity.
///
/// Zero and negative quantities are never stored: setting one removes the line.
/// Lines iterate in ascending product ID order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: BTreeMap<ProductId, u32>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the quantity of a product by one.
    ///
    /// Returns the new quantity.
    pub fn add(&mut self, product_id: ProductId) -> u32 {
        let quantity = self.lines.entry(product_id).or_insert(0);
        *quantity = quantity.saturating_add(1);
        *quantity
    }

    /// Remove a product from the cart.
    ///
    /// Returns `true` if the product was present.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        self.lines.remove(&product_id).is_some()
    }

    /// Set the quantity of a product. Non-positive quantities remove it.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: i64) {
        if quantity > 0 {
            let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
            self.lines.insert(product_id, quantity);
        } else {
            self.lines.remove(&product_id);
        }
    }

    /// Quantity of a product, if present.
    #[must_use]
    pub fn quantity(&self, product_id: ProductId) -> Option<u32> {
        self.lines.get(&product_id).copied()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct products in the cart.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn total_units(&self) -> u64 {
        self.lines.values().map(|&q| u64::from(q)).sum()
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Iterate lines in ascending product ID order.
    pub fn lines(&self) -> impl Iterator<Item = CartLine> + '_ {
        self.lines
            .iter()
            .map(|(&product_id, &quantity)| CartLine {
                product_id,
                quantity,
            })
    }

    /// Current mapping, for display or persistence.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<ProductId, u32> {
        self.lines.clone()
    }

    /// Encode the cart into the persisted JSON snapshot format.
    #[must_use]
    pub fn to_snapshot(&self) -> String {
        // A map of integer keys to integers always serializes.
        serde_json::to_string(&self.lines).unwrap_or_else(|_| "{}".to_owned())
    }

    /// Decode a persisted snapshot.
    ///
    /// An empty or blank snapshot is an empty cart. Non-positive quantities are
    /// dropped rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Malformed` if the snapshot is not a JSON object
    /// mapping integer product IDs to integer quantities.
    pub fn from_snapshot(snapshot: &str) -> Result<Self, CartError> {
        if snapshot.trim().is_empty() {
            return Ok(Self::new());
        }

        let raw: BTreeMap<ProductId, i64> = serde_json::from_str(snapshot)?;
        let mut cart = Self::new();
        for (product_id, quantity) in raw {
            cart.set_quantity(product_id, quantity);
        }
        Ok(cart)
    }
}

impl FromIterator<(ProductId, i64)> for Cart {
    fn from_iter<I: IntoIterator<Item = (ProductId, i64)>>(iter: I) -> Self {
        let mut cart = Self::new();
        for (product_id, quantity) in iter {
            cart.set_quantity(product_id, quantity);
        }
        cart
    }
}
