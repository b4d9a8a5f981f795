//! Registration, login and logout flows.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;

use bazaar_integration_tests::{TestApp, location, messages};

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::spawn().await;

    let resp = app.get("/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");

    assert_eq!(app.get("/health/ready").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_then_login() {
    let app = TestApp::spawn().await;

    let resp = app.register("alice", "secret1").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");

    let page = app.page("/login").await;
    assert_eq!(messages(&page), ["Registration successful! Please log in."]);

    let resp = app.login("alice", "secret1").await;
    assert_eq!(location(&resp), "/");

    let home = app.page("/").await;
    assert_eq!(home["user"]["username"], "alice");
    assert_eq!(home["user"]["is_admin"], false);
}

#[tokio::test]
async fn test_duplicate_registration_is_refused() {
    let app = TestApp::spawn().await;
    app.register("bob", "secret1").await;
    app.flash_messages().await;

    let resp = app.register("bob", "another1").await;
    assert_eq!(location(&resp), "/register");
    assert_eq!(app.flash_messages().await, ["Username already exists!"]);

    // Original password still works
    assert_eq!(location(&app.login("bob", "secret1").await), "/");
}

#[tokio::test]
async fn test_short_password_is_refused() {
    let app = TestApp::spawn().await;

    let resp = app.register("carol", "12345").await;
    assert_eq!(location(&resp), "/register");
    assert_eq!(location(&app.login("carol", "12345").await), "/login");
}

#[tokio::test]
async fn test_bad_credentials_flash_and_stay_anonymous() {
    let app = TestApp::spawn().await;
    app.register("dave", "secret1").await;
    app.flash_messages().await;

    let resp = app.login("dave", "wrong-password").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");

    let home = app.page("/").await;
    assert!(home["user"].is_null());
    assert_eq!(messages(&home), ["Invalid username or password."]);
}

#[tokio::test]
async fn test_login_honours_only_local_next() {
    let app = TestApp::spawn().await;
    app.register("erin", "secret1").await;

    let resp = app
        .post_form(
            "/login",
            &[("username", "erin"), ("password", "secret1"), ("next", "/cart")],
        )
        .await;
    assert_eq!(location(&resp), "/cart");

    let other = TestApp::new_client();
    let resp = other
        .post(app.url("/login"))
        .form(&[
            ("username", "erin"),
            ("password", "secret1"),
            ("next", "//evil.example/steal"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn test_protected_page_redirects_to_login_with_next() {
    let app = TestApp::spawn().await;

    let resp = app.get("/cart").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login?next=%2Fcart");

    let page = app.page(&location(&resp)).await;
    assert_eq!(page["next"], "/cart");
}

#[tokio::test]
async fn test_logout_clears_session() {
    let app = TestApp::spawn().await;
    app.login_as_new_user("frank").await;

    let resp = app.get("/logout").await;
    assert_eq!(location(&resp), "/");

    let home = app.page("/").await;
    assert!(home["user"].is_null());
    assert_eq!(messages(&home), ["You have been logged out."]);
    assert_eq!(location(&app.get("/cart").await), "/login?next=%2Fcart");
}

#[tokio::test]
async fn test_admin_login_sends_admins_to_back_office() {
    let app = TestApp::spawn().await;

    let resp = app.login("admin", "123456").await;
    assert_eq!(location(&resp), "/admin");

    let shopper = TestApp::new_client();
    shopper
        .post(app.url("/register"))
        .form(&[("username", "gina"), ("password", "secret1")])
        .send()
        .await
        .unwrap();
    let resp = shopper
        .post(app.url("/admin/login"))
        .form(&[("username", "gina"), ("password", "secret1")])
        .send()
        .await
        .unwrap();
    assert_eq!(location(&resp), "/admin/login");
}
