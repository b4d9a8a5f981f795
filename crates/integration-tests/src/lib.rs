//! Integration test harness for Bazaar.
//!
//! [`TestApp::spawn`] serves the real router on `127.0.0.1:0` against a fresh
//! in-memory database (migrated, bootstrap admin present) and a temporary
//! static directory. The client keeps cookies and never follows redirects so
//! tests can assert on `Location`.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bazaar-integration-tests
//! ```

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::missing_panics_doc)]

use std::path::PathBuf;

use reqwest::{Client, Response, StatusCode, header, redirect};
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use bazaar_core::ProductId;
use bazaar_storefront::config::{DEFAULT_ADMIN_PASSWORD, StorefrontConfig};
use bazaar_storefront::db;
use bazaar_storefront::models::{NewProduct, Product};
use bazaar_storefront::services::{AuthService, CatalogService};
use bazaar_storefront::state::AppState;

/// Bootstrap admin credentials present in every test app.
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = DEFAULT_ADMIN_PASSWORD;

/// A running storefront with its own database and HTTP client.
pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub pool: SqlitePool,
    pub static_dir: PathBuf,
    page_size: u32,
}

impl TestApp {
    /// Start a fresh app.
    pub async fn spawn() -> Self {
        let static_dir = std::env::temp_dir().join(format!("bazaar-it-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&static_dir)
            .await
            .expect("create static dir");

        let pool = db::create_memory_pool().await.expect("in-memory pool");
        db::migrate(&pool).await.expect("migrations");

        let config = StorefrontConfig::for_database("sqlite::memory:", static_dir.clone());
        let page_size = config.page_size;
        AuthService::new(&pool)
            .bootstrap_admin(&config.admin_password)
            .await
            .expect("bootstrap admin");

        let router = bazaar_storefront::app(AppState::new(config, pool.clone()))
            .await
            .expect("build router");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let address = format!("http://{}", listener.local_addr().expect("local addr"));
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("test server");
        });

        Self {
            address,
            client: Self::new_client(),
            pool,
            static_dir,
            page_size,
        }
    }

    /// A client with its own cookie jar, for a second visitor.
    pub fn new_client() -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.address)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request")
    }

    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST request")
    }

    /// GET a page and parse its JSON body, asserting 200.
    pub async fn page(&self, path: &str) -> Value {
        let resp = self.get(path).await;
        assert_eq!(resp.status(), StatusCode::OK, "GET {path}");
        resp.json().await.expect("JSON body")
    }

    /// Messages of the flashes queued for the next page.
    pub async fn flash_messages(&self) -> Vec<String> {
        messages(&self.page("/").await)
    }

    pub async fn register(&self, username: &str, password: &str) -> Response {
        self.post_form("/register", &[("username", username), ("password", password)])
            .await
    }

    pub async fn login(&self, username: &str, password: &str) -> Response {
        self.post_form("/login", &[("username", username), ("password", password)])
            .await
    }

    /// Register and log in a shopper.
    pub async fn login_as_new_user(&self, username: &str) {
        assert_eq!(self.register(username, "secret1").await.status(), StatusCode::SEE_OTHER);
        assert_eq!(self.login(username, "secret1").await.status(), StatusCode::SEE_OTHER);
        // Drop the login flashes
        self.flash_messages().await;
    }

    pub async fn login_as_admin(&self) {
        let resp = self.login(ADMIN_USERNAME, ADMIN_PASSWORD).await;
        assert_eq!(location(&resp), "/admin");
        self.flash_messages().await;
    }

    /// Insert a product directly.
    pub async fn create_product(
        &self,
        name: &str,
        price: &str,
        stock: u32,
        category: &str,
    ) -> Product {
        CatalogService::new(&self.pool, self.page_size)
            .create(NewProduct {
                name: name.to_owned(),
                price: price.parse().expect("price"),
                image: String::new(),
                stock,
                category: category.to_owned(),
                feature_html: String::new(),
            })
            .await
            .expect("create product")
    }

    /// Product detail as JSON.
    pub async fn product(&self, id: ProductId) -> Value {
        self.page(&format!("/product/{id}")).await["product"].clone()
    }

    /// The cart page as JSON.
    pub async fn cart(&self) -> Value {
        self.page("/cart").await["cart"].clone()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.static_dir);
    }
}

/// `Location` header of a redirect.
pub fn location(resp: &Response) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

/// Flash messages in a page body.
pub fn messages(page: &Value) -> Vec<String> {
    page["flashes"]
        .as_array()
        .map(|flashes| {
            flashes
                .iter()
                .filter_map(|f| f["message"].as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

/// A JSON number field as `u64`.
pub fn as_u64(value: &Value) -> u64 {
    value.as_u64().expect("number")
}
