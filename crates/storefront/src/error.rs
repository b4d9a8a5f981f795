//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. Route handlers return `Result<T, AppError>`;
//! expected user mistakes on form posts are turned into flash messages by the
//! handlers themselves and never reach this type.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{
    AuthError, CartServiceError, CatalogError, CheckoutError, UploadError,
};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication or account operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartServiceError),

    /// Order processing failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Catalog operation failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Image upload failed.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Session storage failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::UsernameTaken | AuthError::CannotDeleteAdmin => StatusCode::CONFLICT,
                AuthError::InvalidUsername(_) | AuthError::WeakPassword(_) => {
                    StatusCode::BAD_REQUEST
                }
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Cart(err) => cart_status(err),
            Self::Checkout(err) => match err {
                CheckoutError::MissingAddress | CheckoutError::EmptyCart => {
                    StatusCode::BAD_REQUEST
                }
                CheckoutError::ProductNotFound(_) => StatusCode::NOT_FOUND,
                CheckoutError::InsufficientStock { .. } => StatusCode::CONFLICT,
                CheckoutError::Cart(err) => cart_status(err),
                CheckoutError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Catalog(err) => match err {
                CatalogError::InvalidPage | CatalogError::InvalidProduct(_) => {
                    StatusCode::BAD_REQUEST
                }
                CatalogError::PageNotFound(_) | CatalogError::ProductNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                CatalogError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Upload(err) => match err {
                UploadError::DisallowedExtension(_) => StatusCode::BAD_REQUEST,
                UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

const fn cart_status(err: &CartServiceError) -> StatusCode {
    match err {
        CartServiceError::ProductNotFound(_) => StatusCode::NOT_FOUND,
        CartServiceError::UserNotFound => StatusCode::UNAUTHORIZED,
        CartServiceError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
        CartServiceError::Session(_) | CartServiceError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            match &self {
                Self::Auth(err) => err.to_string(),
                Self::Cart(err) => err.to_string(),
                Self::Checkout(err) => err.to_string(),
                Self::Catalog(err) => err.to_string(),
                Self::Upload(err) => err.to_string(),
                Self::NotFound(what) => format!("{what} not found"),
                Self::Unauthorized(msg) | Self::BadRequest(msg) => msg.clone(),
                _ => self.to_string(),
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, username: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: username.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added product", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::ProductId;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(CatalogError::InvalidPage.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CatalogError::PageNotFound(9).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CheckoutError::ProductNotFound(ProductId::new(1)).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AuthError::UsernameTaken.into()),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let response = AppError::Database(RepositoryError::DataCorruption(
            "secret table detail".to_string(),
        ))
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("Internal server error"));
        assert!(!text.contains("secret"));
    }
}
