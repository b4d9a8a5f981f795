//! Back-office user management.

use axum::{
    Form, Json,
    extract::{Path, State},
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::UserId;

use crate::db::users::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, flash_redirect, take_flashes};
use crate::models::{Flash, FlashLevel, User};
use crate::services::{AuthError, AuthService};
use crate::state::AppState;

/// User add/edit form data.
///
/// `is_admin` is a checkbox: present and non-empty means set.
#[derive(Deserialize)]
pub struct UserForm {
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub is_admin: Option<String>,
}

impl UserForm {
    fn is_admin(&self) -> bool {
        self.is_admin.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// User list page data.
#[derive(Debug, Serialize)]
pub struct UsersPage {
    pub users: Vec<User>,
    pub flashes: Vec<Flash>,
}

/// Single user form page data. `user` is absent on the add page.
#[derive(Debug, Serialize)]
pub struct UserFormPage {
    pub user: Option<User>,
    pub flashes: Vec<Flash>,
}

/// User list.
#[instrument(skip_all)]
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<UsersPage>> {
    Ok(Json(UsersPage {
        users: UserRepository::new(state.pool()).list_all().await?,
        flashes: take_flashes(&session).await?,
    }))
}

/// Add user page.
#[instrument(skip_all)]
pub async fn new_page(
    RequireAdmin(_admin): RequireAdmin,
    session: Session,
) -> Result<Json<UserFormPage>> {
    Ok(Json(UserFormPage {
        user: None,
        flashes: take_flashes(&session).await?,
    }))
}

/// Create a user.
#[instrument(skip_all, fields(username = %form.username))]
pub async fn create(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<UserForm>,
) -> Result<Redirect> {
    let result = AuthService::new(state.pool())
        .create_user(&form.username, &form.password, form.is_admin())
        .await;

    match result {
        Ok(_) => {
            let redirect =
                flash_redirect(&session, FlashLevel::Success, "User added!", "/admin/users");
            Ok(redirect.await?)
        }
        Err(e) if e.is_user_error() => Ok(flash_redirect(
            &session,
            FlashLevel::Danger,
            user_error_message(&e),
            "/admin/users/add",
        )
        .await?),
        Err(e) => Err(e.into()),
    }
}

/// Edit user page.
#[instrument(skip_all, fields(user_id = %id))]
pub async fn edit_page(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<UserId>,
) -> Result<Json<UserFormPage>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {id}")))?;

    Ok(Json(UserFormPage {
        user: Some(user),
        flashes: take_flashes(&session).await?,
    }))
}

/// Update a user. A blank password keeps the current one.
#[instrument(skip_all, fields(user_id = %id))]
pub async fn update(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<UserId>,
    Form(form): Form<UserForm>,
) -> Result<Redirect> {
    let result = AuthService::new(state.pool())
        .update_user(id, &form.username, Some(&form.password), form.is_admin())
        .await;

    match result {
        Ok(_) => {
            let redirect =
                flash_redirect(&session, FlashLevel::Success, "User updated!", "/admin/users");
            Ok(redirect.await?)
        }
        Err(AuthError::UserNotFound) => Err(AppError::NotFound(format!("User {id}"))),
        Err(e) if e.is_user_error() => Ok(flash_redirect(
            &session,
            FlashLevel::Danger,
            user_error_message(&e),
            &format!("/admin/users/edit/{id}"),
        )
        .await?),
        Err(e) => Err(e.into()),
    }
}

/// Delete a non-admin user.
#[instrument(skip_all, fields(user_id = %id))]
pub async fn delete(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<UserId>,
) -> Result<Redirect> {
    match AuthService::new(state.pool()).delete_user(id).await {
        Ok(()) => {
            let redirect =
                flash_redirect(&session, FlashLevel::Success, "User deleted!", "/admin/users");
            Ok(redirect.await?)
        }
        Err(AuthError::CannotDeleteAdmin) => Ok(flash_redirect(
            &session,
            FlashLevel::Danger,
            "Admin users cannot be deleted.",
            "/admin/users",
        )
        .await?),
        Err(AuthError::UserNotFound) => Err(AppError::NotFound(format!("User {id}"))),
        Err(e) => Err(e.into()),
    }
}

fn user_error_message(err: &AuthError) -> String {
    match err {
        AuthError::UsernameTaken => "Username already exists!".to_owned(),
        other => other.to_string(),
    }
}
