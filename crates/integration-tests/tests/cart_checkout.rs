//! Cart mutations, persistence across sessions, checkout and buy-now.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use reqwest::{StatusCode, header};

use bazaar_integration_tests::{TestApp, as_u64, location, messages};
use bazaar_storefront::db::users::UserRepository;

#[tokio::test]
async fn test_cart_requires_login() {
    let app = TestApp::spawn().await;
    let mug = app.create_product("Mug", "8.00", 5, "kitchen").await;

    let resp = app.get(&format!("/add-to-cart/{}", mug.id)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("/login?next=%2Fadd-to-cart%2F{}", mug.id));

    let resp = app.post_form("/checkout", &[("address", "x")]).await;
    assert_eq!(location(&resp), "/login?next=%2Fcheckout");
}

#[tokio::test]
async fn test_add_view_update_remove() {
    let app = TestApp::spawn().await;
    let mug = app.create_product("Mug", "8.00", 5, "kitchen").await;
    let pot = app.create_product("Pot", "20.50", 5, "kitchen").await;
    app.login_as_new_user("ann").await;

    let resp = app
        .client
        .get(app.url(&format!("/add-to-cart/{}", mug.id)))
        .header(header::REFERER, app.url("/products?page=1&category=kitchen"))
        .send()
        .await
        .unwrap();
    assert_eq!(location(&resp), "/products?page=1&category=kitchen");

    let resp = app.get(&format!("/add-to-cart/{}", mug.id)).await;
    assert_eq!(location(&resp), "/products");
    app.get(&format!("/add-to-cart/{}", pot.id)).await;

    let page = app.page("/cart").await;
    assert_eq!(messages(&page).len(), 3);
    let cart = &page["cart"];
    assert_eq!(cart["lines"].as_array().unwrap().len(), 2);
    assert_eq!(as_u64(&cart["total_units"]), 3);
    assert_eq!(cart["total"], "36.5");

    let field = format!("qty_{}", mug.id);
    let resp = app.post_form("/update-cart", &[(field.as_str(), "4")]).await;
    assert_eq!(location(&resp), "/cart");
    assert_eq!(as_u64(&app.cart().await["total_units"]), 5);

    let resp = app.get(&format!("/remove-from-cart/{}", pot.id)).await;
    assert_eq!(location(&resp), "/cart");
    let cart = app.cart().await;
    assert_eq!(cart["lines"].as_array().unwrap().len(), 1);
    assert_eq!(cart["lines"][0]["name"], "Mug");

    // Zero removes the line
    let resp = app.post_form("/update-cart", &[(field.as_str(), "0")]).await;
    assert_eq!(location(&resp), "/cart");
    assert!(app.cart().await["lines"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_quantity_rejects_whole_form() {
    let app = TestApp::spawn().await;
    let mug = app.create_product("Mug", "8.00", 5, "kitchen").await;
    let pot = app.create_product("Pot", "20.50", 5, "kitchen").await;
    app.login_as_new_user("ben").await;
    app.get(&format!("/add-to-cart/{}", mug.id)).await;
    app.get(&format!("/add-to-cart/{}", pot.id)).await;
    app.flash_messages().await;

    let mug_field = format!("qty_{}", mug.id);
    let pot_field = format!("qty_{}", pot.id);
    let resp = app
        .post_form(
            "/update-cart",
            &[(mug_field.as_str(), "3"), (pot_field.as_str(), "lots")],
        )
        .await;
    assert_eq!(location(&resp), "/cart");

    let page = app.page("/cart").await;
    assert!(messages(&page)[0].starts_with("Cart not updated"));
    assert_eq!(as_u64(&page["cart"]["total_units"]), 2);
}

#[tokio::test]
async fn test_adding_missing_product_is_not_found() {
    let app = TestApp::spawn().await;
    app.login_as_new_user("cal").await;

    assert_eq!(app.get("/add-to-cart/4242").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cart_survives_logout_and_login() {
    let app = TestApp::spawn().await;
    let mug = app.create_product("Mug", "8.00", 5, "kitchen").await;
    app.login_as_new_user("dee").await;
    app.get(&format!("/add-to-cart/{}", mug.id)).await;
    app.get(&format!("/add-to-cart/{}", mug.id)).await;

    // Mirrored to the account row as it changes
    let user = UserRepository::new(&app.pool)
        .get_by_username("dee")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.cart_snapshot, format!(r#"{{"{}":2}}"#, mug.id));

    app.get("/logout").await;

    // A different browser sees the same cart
    let other = TestApp::new_client();
    other
        .post(app.url("/login"))
        .form(&[("username", "dee"), ("password", "secret1")])
        .send()
        .await
        .unwrap();
    let page: serde_json::Value = other
        .get(app.url("/cart"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(as_u64(&page["cart"]["lines"][0]["quantity"]), 2);
}

#[tokio::test]
async fn test_checkout_moves_stock_and_empties_cart() {
    let app = TestApp::spawn().await;
    let mug = app.create_product("Mug", "8.00", 5, "kitchen").await;
    let pot = app.create_product("Pot", "20.50", 1, "kitchen").await;
    app.login_as_new_user("eve").await;
    app.get(&format!("/add-to-cart/{}", mug.id)).await;
    app.get(&format!("/add-to-cart/{}", mug.id)).await;
    app.get(&format!("/add-to-cart/{}", pot.id)).await;
    app.flash_messages().await;

    let summary = app.page("/checkout").await;
    assert_eq!(summary["cart"]["total"], "36.5");

    let resp = app.post_form("/checkout", &[("address", "1 Main St")]).await;
    assert_eq!(location(&resp), "/products");
    assert_eq!(
        app.flash_messages().await,
        ["Order placed! Shipping to 1 Main St. Total: $36.50"]
    );

    let mug = app.product(mug.id).await;
    assert_eq!(as_u64(&mug["stock"]), 3);
    assert_eq!(as_u64(&mug["sales"]), 2);
    let pot = app.product(pot.id).await;
    assert_eq!(as_u64(&pot["stock"]), 0);
    assert_eq!(as_u64(&pot["sales"]), 1);

    assert!(app.cart().await["lines"].as_array().unwrap().is_empty());
    let user = UserRepository::new(&app.pool)
        .get_by_username("eve")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.cart_snapshot, "{}");
}

#[tokio::test]
async fn test_insufficient_stock_changes_nothing() {
    let app = TestApp::spawn().await;
    let mug = app.create_product("Mug", "8.00", 5, "kitchen").await;
    let pot = app.create_product("Pot", "20.50", 1, "kitchen").await;
    app.login_as_new_user("fay").await;
    app.get(&format!("/add-to-cart/{}", mug.id)).await;
    app.get(&format!("/add-to-cart/{}", pot.id)).await;
    app.get(&format!("/add-to-cart/{}", pot.id)).await;
    app.flash_messages().await;

    let resp = app.post_form("/checkout", &[("address", "1 Main St")]).await;
    assert_eq!(location(&resp), "/cart");

    let page = app.page("/cart").await;
    assert_eq!(messages(&page), ["Not enough stock for Pot"]);
    assert_eq!(as_u64(&page["cart"]["total_units"]), 3);

    let mug = app.product(mug.id).await;
    assert_eq!(as_u64(&mug["stock"]), 5);
    assert_eq!(as_u64(&mug["sales"]), 0);
}

#[tokio::test]
async fn test_checkout_needs_address_and_items() {
    let app = TestApp::spawn().await;
    let mug = app.create_product("Mug", "8.00", 5, "kitchen").await;
    app.login_as_new_user("gus").await;

    let resp = app.post_form("/checkout", &[("address", "1 Main St")]).await;
    assert_eq!(location(&resp), "/cart");
    assert_eq!(app.flash_messages().await, ["Your cart is empty."]);

    app.get(&format!("/add-to-cart/{}", mug.id)).await;
    app.flash_messages().await;
    let resp = app.post_form("/checkout", &[("address", "   ")]).await;
    assert_eq!(location(&resp), "/checkout");
    assert_eq!(as_u64(&app.product(mug.id).await["stock"]), 5);
}

#[tokio::test]
async fn test_deleted_product_is_dropped_at_checkout() {
    let app = TestApp::spawn().await;
    let mug = app.create_product("Mug", "8.00", 5, "kitchen").await;
    let pot = app.create_product("Pot", "20.50", 5, "kitchen").await;
    app.login_as_new_user("hal").await;
    app.get(&format!("/add-to-cart/{}", mug.id)).await;
    app.get(&format!("/add-to-cart/{}", pot.id)).await;
    app.flash_messages().await;

    bazaar_storefront::services::CatalogService::new(&app.pool, 8)
        .delete(pot.id)
        .await
        .unwrap();

    let cart = app.cart().await;
    assert_eq!(cart["lines"].as_array().unwrap().len(), 1);

    let resp = app.post_form("/checkout", &[("address", "1 Main St")]).await;
    assert_eq!(location(&resp), "/products");
    let flashes = app.flash_messages().await;
    assert_eq!(flashes.len(), 2);
    assert!(flashes[1].ends_with("Total: $8.00"));
    assert_eq!(as_u64(&app.product(mug.id).await["sales"]), 1);
}

#[tokio::test]
async fn test_buy_now_takes_one_unit() {
    let app = TestApp::spawn().await;
    let lamp = app.create_product("Lamp", "19.99", 1, "home").await;
    app.login_as_new_user("ivy").await;

    let summary = app.page(&format!("/buy/{}", lamp.id)).await;
    assert_eq!(summary["product"]["name"], "Lamp");

    let path = format!("/buy/{}", lamp.id);
    let resp = app.post_form(&path, &[("address", "2 Side Rd")]).await;
    assert_eq!(location(&resp), format!("/product/{}", lamp.id));
    assert_eq!(
        app.flash_messages().await,
        ["Purchase complete! Shipping to 2 Side Rd. Total: $19.99"]
    );
    assert_eq!(as_u64(&app.product(lamp.id).await["stock"]), 0);

    let resp = app.post_form(&path, &[("address", "2 Side Rd")]).await;
    assert_eq!(location(&resp), format!("/product/{}", lamp.id));
    assert_eq!(
        app.flash_messages().await,
        ["Sorry, this product is out of stock."]
    );
    assert_eq!(as_u64(&app.product(lamp.id).await["sales"]), 1);

    let resp = app.post_form("/buy/777", &[("address", "2 Side Rd")]).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
