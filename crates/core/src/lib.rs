//! Bazaar Core - Shared domain types.
//!
//! This crate provides the types shared by every Bazaar component:
//! - `storefront` - Public shop and `/admin` back-office
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP. The cart rules (quantities, snapshot codec) live here so
//! that both the web server and the CLI agree on them.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, prices, and the shopping cart

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
