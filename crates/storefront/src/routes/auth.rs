//! Authentication route handlers.
//!
//! Handles login, registration and logout for shoppers, plus the separate
//! back-office login.

use axum::{
    Form, Json,
    extract::{Query, State},
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use super::is_safe_redirect;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{
    OptionalAuth, clear_current_user, flash_redirect, login_redirect, push_flash,
    set_current_user, take_flashes,
};
use crate::models::{CurrentUser, Flash, FlashLevel, User};
use crate::services::{AuthError, AuthService, CartService};
use crate::state::AppState;

// =============================================================================
// Form and Query Types
// =============================================================================

/// Query parameters for the login page.
#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
}

/// Login and registration page data.
#[derive(Debug, Serialize)]
pub struct AuthPage {
    pub user: Option<CurrentUser>,
    pub next: Option<String>,
    pub flashes: Vec<Flash>,
}

// =============================================================================
// Helpers
// =============================================================================

/// Store the user in the session and load their saved cart.
async fn start_session(state: &AppState, session: &Session, user: &User) -> Result<()> {
    let current = CurrentUser::from(user);
    set_current_user(session, &current).await?;
    CartService::new(state.pool(), session).restore(user).await?;
    set_sentry_user(&user.id, Some(&user.username));
    Ok(())
}

async fn auth_page(
    user: Option<CurrentUser>,
    session: &Session,
    next: Option<String>,
) -> Result<Json<AuthPage>> {
    Ok(Json(AuthPage {
        user,
        next: next.filter(|n| is_safe_redirect(n)),
        flashes: take_flashes(session).await?,
    }))
}

// =============================================================================
// Shopper Auth
// =============================================================================

/// Display the login page.
#[instrument(skip(user, session))]
pub async fn login_page(
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Query(query): Query<NextQuery>,
) -> Result<Json<AuthPage>> {
    auth_page(user, &session, query.next).await
}

/// Handle login form submission.
///
/// Redirects to `next` when it is a local path, otherwise to the back-office
/// for admins and the home page for everyone else.
#[instrument(skip_all, fields(username = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Redirect> {
    let next = form
        .next
        .or(query.next)
        .filter(|n| is_safe_redirect(n));

    match AuthService::new(state.pool())
        .login(&form.username, &form.password)
        .await
    {
        Ok(user) => {
            start_session(&state, &session, &user).await?;
            info!(user_id = %user.id, "User logged in");
            push_flash(&session, FlashLevel::Success, "Logged in successfully.").await?;

            let home = if user.is_admin { "/admin" } else { "/" };
            let target = next.unwrap_or_else(|| home.to_owned());
            Ok(Redirect::to(&target))
        }
        Err(AuthError::InvalidCredentials) => {
            push_flash(&session, FlashLevel::Danger, "Invalid username or password.").await?;
            Ok(next.map_or_else(|| Redirect::to("/login"), |n| login_redirect(&n)))
        }
        Err(e) => Err(e.into()),
    }
}

/// Display the registration page.
#[instrument(skip_all)]
pub async fn register_page(
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<Json<AuthPage>> {
    auth_page(user, &session, None).await
}

/// Handle registration form submission.
#[instrument(skip_all, fields(username = %form.username))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Redirect> {
    match AuthService::new(state.pool())
        .register(&form.username, &form.password)
        .await
    {
        Ok(user) => {
            info!(user_id = %user.id, "User registered");
            Ok(flash_redirect(
                &session,
                FlashLevel::Success,
                "Registration successful! Please log in.",
                "/login",
            )
            .await?)
        }
        Err(e) if e.is_user_error() => {
            let message = match e {
                AuthError::UsernameTaken => "Username already exists!".to_owned(),
                other => other.to_string(),
            };
            Ok(flash_redirect(&session, FlashLevel::Danger, message, "/register").await?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Log out and clear the whole session.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<Redirect> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(flash_redirect(&session, FlashLevel::Info, "You have been logged out.", "/").await?)
}

// =============================================================================
// Back-office Auth
// =============================================================================

/// Display the admin login page.
#[instrument(skip_all)]
pub async fn admin_login_page(
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<Json<AuthPage>> {
    auth_page(user, &session, None).await
}

/// Handle admin login form submission.
#[instrument(skip_all, fields(username = %form.username))]
pub async fn admin_login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Redirect> {
    match AuthService::new(state.pool())
        .login_admin(&form.username, &form.password)
        .await
    {
        Ok(user) => {
            start_session(&state, &session, &user).await?;
            info!(user_id = %user.id, "Admin logged in");
            Ok(Redirect::to("/admin"))
        }
        Err(AuthError::InvalidCredentials) => {
            warn!("Failed admin login");
            Ok(flash_redirect(
                &session,
                FlashLevel::Danger,
                "Invalid admin credentials!",
                "/admin/login",
            )
            .await?)
        }
        Err(e) => Err(e.into()),
    }
}
