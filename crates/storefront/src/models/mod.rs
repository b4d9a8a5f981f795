//! Domain models for storefront.

pub mod product;
pub mod session;
pub mod user;

pub use product::{NewProduct, Page, Product, ProductUpdate, TopSeller};
pub use session::{CurrentUser, Flash, FlashLevel, keys as session_keys};
pub use user::User;
