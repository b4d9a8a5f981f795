//! One-shot flash messages kept in the session.
//!
//! Form handlers push a message and redirect; the next JSON page drains the
//! queue into its `flashes` field.

use axum::response::Redirect;
use tower_sessions::Session;

use crate::models::session::{Flash, FlashLevel, keys};

/// Queue a flash message for the next page.
///
/// # Errors
///
/// Returns an error if the session cannot be read or modified.
pub async fn push_flash(
    session: &Session,
    level: FlashLevel,
    message: impl Into<String>,
) -> Result<(), tower_sessions::session::Error> {
    let mut flashes: Vec<Flash> = session.get(keys::FLASHES).await?.unwrap_or_default();
    flashes.push(Flash {
        level,
        message: message.into(),
    });
    session.insert(keys::FLASHES, flashes).await
}

/// Remove and return every queued flash message.
///
/// # Errors
///
/// Returns an error if the session cannot be read or modified.
pub async fn take_flashes(session: &Session) -> Result<Vec<Flash>, tower_sessions::session::Error> {
    Ok(session
        .remove::<Vec<Flash>>(keys::FLASHES)
        .await?
        .unwrap_or_default())
}

/// Queue a flash message and answer with a `303 See Other` to `to`.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn flash_redirect(
    session: &Session,
    level: FlashLevel,
    message: impl Into<String>,
    to: &str,
) -> Result<Redirect, tower_sessions::session::Error> {
    push_flash(session, level, message).await?;
    Ok(Redirect::to(to))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_flashes_are_drained_once() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        push_flash(&session, FlashLevel::Success, "saved").await.unwrap();
        push_flash(&session, FlashLevel::Danger, "but also this")
            .await
            .unwrap();

        let flashes = take_flashes(&session).await.unwrap();
        assert_eq!(flashes.len(), 2);
        assert_eq!(flashes[0].message, "saved");
        assert_eq!(flashes[1].level, FlashLevel::Danger);

        assert!(take_flashes(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flash_redirect_is_see_other() {
        use axum::response::IntoResponse;

        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let response = flash_redirect(&session, FlashLevel::Info, "hi", "/cart")
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), axum::http::StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/cart");
        assert_eq!(take_flashes(&session).await.unwrap().len(), 1);
    }
}
