//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (recorded on the span, echoed in the response)
//! 4. Session layer (tower-sessions with `SQLite` store)
//! 5. Security headers
//!
//! Route guards ([`RequireAuth`], [`RequireAdmin`]) are extractors and run
//! before the handler body.

pub mod auth;
pub mod flash;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    OptionalAuth, RequireAdmin, RequireAuth, clear_current_user, login_redirect,
    set_current_user,
};
pub use flash::{flash_redirect, push_flash, take_flashes};
pub use request_id::{RequestId, request_id_middleware};
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
