//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Registration, login, admin bootstrap and account management
//! - `cart` - Session cart with write-through mirroring to the user row
//! - `catalog` - Paginated listing, search and best sellers
//! - `checkout` - Stock validation and the all-or-nothing order
//! - `uploads` - Product image validation and storage

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod uploads;

pub use auth::{AuthError, AuthService, BootstrapOutcome};
pub use cart::{CartService, CartServiceError, CartView, CartViewLine};
pub use catalog::{CatalogError, CatalogService, MAX_NAME_LENGTH, TOP_SELLER_LIMIT};
pub use checkout::{CheckoutError, CheckoutService, OrderConfirmation, OrderLine};
pub use uploads::{UploadError, remove_image, save_image};
