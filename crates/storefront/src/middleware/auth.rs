//! Authentication extractors.
//!
//! Guards are extractors so a rejected request never reaches the handler
//! body: [`RequireAuth`] sends anonymous visitors to the login page and
//! [`RequireAdmin`] sends everyone without the admin flag home with a flash
//! message.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::warn;

use crate::middleware::flash::push_flash;
use crate::models::{CurrentUser, FlashLevel, session_keys};

/// Message shown to visitors turned away from the back-office.
pub const ADMIN_REQUIRED_MESSAGE: &str = "You do not have permission to access the admin area.";

/// Extractor that requires a logged-in user.
///
/// If nobody is logged in, redirects to `/login?next=<path>`.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Error returned when a guard rejects the request.
pub enum AuthRejection {
    /// Redirect to the login page, remembering where the visitor was going.
    RedirectToLogin(String),
    /// Redirect home (flash already queued).
    RedirectHome,
    /// The session layer is missing.
    NoSession,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(next) => login_redirect(&next).into_response(),
            Self::RedirectHome => Redirect::to("/").into_response(),
            Self::NoSession => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AuthRejection::NoSession)?;

        current_user(&session)
            .await
            .map(Self)
            .ok_or_else(|| AuthRejection::RedirectToLogin(parts.uri.path().to_owned()))
    }
}

/// Extractor that requires a logged-in admin.
///
/// Anyone else gets a flash message and a redirect to `/`.
pub struct RequireAdmin(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AuthRejection::NoSession)?;

        match current_user(&session).await {
            Some(user) if user.is_admin => Ok(Self(user)),
            _ => {
                if let Err(e) =
                    push_flash(&session, FlashLevel::Danger, ADMIN_REQUIRED_MESSAGE).await
                {
                    warn!(error = %e, "Failed to queue admin-required flash");
                }
                Err(AuthRejection::RedirectHome)
            }
        }
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is logged in.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => current_user(session).await,
            None => None,
        };

        Ok(Self(user))
    }
}

async fn current_user(session: &Session) -> Option<CurrentUser> {
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// Redirect to the login page with `next` set to `path`.
#[must_use]
pub fn login_redirect(path: &str) -> Redirect {
    Redirect::to(&format!("/login?next={}", urlencoding::encode(path)))
}

/// Log a user in: rotate the session ID and store their identity.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Log out: drop every session key, cart and flashes included.
///
/// # Errors
///
/// Returns an error if the session cannot be deleted from the store.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_redirect_encodes_next() {
        let response = login_redirect("/a b?c&d").into_response();
        assert_eq!(response.headers()["location"], "/login?next=%2Fa%20b%3Fc%26d");
    }

    #[test]
    fn test_login_redirect_location() {
        let response = login_redirect("/cart").into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/login?next=%2Fcart");
    }
}
