//! Cart actions driven through the router.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use zkcart_integration_tests::{BackendCall, PLAIN_PRODUCT, TEST_CART_ID, TestApp, variant_id};

#[tokio::test]
async fn test_add_without_cart_makes_no_backend_call() {
    let mut app = TestApp::new();

    let response = app
        .post_form(
            "/cart/add",
            &[("handle", PLAIN_PRODUCT), ("variant_id", &variant_id(PLAIN_PRODUCT, "S"))],
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body.contains("Error adding item to cart"));
    assert!(response.body.contains("aria-live"));
    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn test_add_by_option_selection() {
    let mut app = TestApp::new().with_cart().await;

    let response = app
        .post_form("/cart/add", &[("handle", PLAIN_PRODUCT), ("Size", "M")])
        .await;

    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.header("hx-trigger"), Some("cart-updated"));
    assert_eq!(
        app.backend.mutations(),
        vec![BackendCall::AddToCart(vec![(variant_id(PLAIN_PRODUCT, "M"), 1)])]
    );
}

#[tokio::test]
async fn test_add_without_matching_variant() {
    let mut app = TestApp::new().with_cart().await;

    let response = app
        .post_form("/cart/add", &[("handle", PLAIN_PRODUCT), ("size", "XL")])
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(app.backend.mutations().is_empty());
}

#[tokio::test]
async fn test_remove_absent_line_reports_not_found() {
    let mut app = TestApp::new().with_cart().await;

    let response = app
        .post_form(
            "/cart/remove",
            &[("merchandise_id", &variant_id(PLAIN_PRODUCT, "S"))],
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body.contains("Item not found in cart"));
    assert!(app.backend.mutations().is_empty());
}

#[tokio::test]
async fn test_remove_without_cart() {
    let mut app = TestApp::new();

    let response = app
        .post_form("/cart/remove", &[("merchandise_id", "gid://shopify/ProductVariant/1")])
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body.contains("Missing cart ID"));
}

#[tokio::test]
async fn test_quantity_zero_removes_line() {
    let mut app = TestApp::new().with_cart().await;
    let variant = variant_id(PLAIN_PRODUCT, "S");

    app.post_form("/cart/add", &[("handle", PLAIN_PRODUCT), ("variant_id", &variant)])
        .await;
    app.backend.clear_calls();

    let response = app
        .post_form("/cart/update", &[("merchandise_id", &variant), ("quantity", "0")])
        .await;

    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(
        app.backend.mutations(),
        vec![BackendCall::RemoveFromCart(vec![
            "gid://shopify/CartLine/1".to_string()
        ])]
    );
    assert!(app.backend.cart().unwrap().lines.is_empty());
}

#[tokio::test]
async fn test_quantity_update_and_add_missing_line() {
    let mut app = TestApp::new().with_cart().await;
    let small = variant_id(PLAIN_PRODUCT, "S");
    let medium = variant_id(PLAIN_PRODUCT, "M");

    app.post_form("/cart/add", &[("handle", PLAIN_PRODUCT), ("variant_id", &small)])
        .await;
    app.backend.clear_calls();

    app.post_form("/cart/update", &[("merchandise_id", &small), ("quantity", "3")])
        .await;
    app.post_form("/cart/update", &[("merchandise_id", &medium), ("quantity", "2")])
        .await;
    app.post_form("/cart/update", &[("merchandise_id", "gid://shopify/ProductVariant/none"), ("quantity", "0")])
        .await;

    assert_eq!(
        app.backend.mutations(),
        vec![
            BackendCall::UpdateCart(vec![("gid://shopify/CartLine/1".to_string(), Some(3))]),
            BackendCall::AddToCart(vec![(medium, 2)]),
        ]
    );
    assert_eq!(app.backend.cart().unwrap().total_quantity, 5);
}

#[tokio::test]
async fn test_negative_quantity() {
    let mut app = TestApp::new().with_cart().await;
    let small = variant_id(PLAIN_PRODUCT, "S");
    let medium = variant_id(PLAIN_PRODUCT, "M");

    let response = app
        .post_form("/cart/update", &[("merchandise_id", &medium), ("quantity", "-3")])
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert!(app.backend.mutations().is_empty());

    app.post_form("/cart/add", &[("handle", PLAIN_PRODUCT), ("variant_id", &small)])
        .await;
    app.backend.clear_calls();

    let response = app
        .post_form("/cart/update", &[("merchandise_id", &small), ("quantity", "-1")])
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(
        app.backend.mutations(),
        vec![BackendCall::RemoveFromCart(vec![
            "gid://shopify/CartLine/1".to_string()
        ])]
    );
}

#[tokio::test]
async fn test_apply_discount_sends_single_code() {
    let mut app = TestApp::new().with_cart().await;

    app.post_form("/cart/discount", &[("discount_code", " SPRING ")])
        .await;
    let response = app
        .post_form("/cart/discount", &[("discount_code", "SUMMER")])
        .await;

    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert!(response.body.contains("SUMMER"));
    assert_eq!(
        app.backend.mutations(),
        vec![
            BackendCall::UpdateDiscountCodes(vec!["SPRING".to_string()]),
            BackendCall::UpdateDiscountCodes(vec!["SUMMER".to_string()]),
        ]
    );
}

#[tokio::test]
async fn test_apply_blank_discount() {
    let mut app = TestApp::new().with_cart().await;

    let response = app.post_form("/cart/discount", &[("discount_code", "  ")]).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(
        response
            .body
            .contains("Error applying discount. Discount code required.")
    );
    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn test_remove_discount_sends_unique_remaining_codes() {
    let mut app = TestApp::new().with_cart().await;

    let response = app
        .post_form(
            "/cart/discount/remove",
            &[("discount", "OLD"), ("discounts", "A,OLD,B,A, ,OLD")],
        )
        .await;

    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(
        app.backend.mutations(),
        vec![BackendCall::UpdateDiscountCodes(vec![
            "A".to_string(),
            "B".to_string()
        ])]
    );
}

#[tokio::test]
async fn test_backend_failure_uses_fixed_message() {
    let mut app = TestApp::new().with_cart().await;
    app.backend.fail_mutations();

    let response = app
        .post_form(
            "/cart/add",
            &[("handle", PLAIN_PRODUCT), ("variant_id", &variant_id(PLAIN_PRODUCT, "S"))],
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert!(response.body.contains("Error adding item to cart"));
    assert!(!response.body.contains("mutation failed"));
}

#[tokio::test]
async fn test_checkout_redirects_to_checkout_url() {
    let mut app = TestApp::new().with_cart().await;

    let response = app.get("/checkout").await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(
        response.header("location"),
        Some("https://shop.example.com/cart/c/test")
    );
}

#[tokio::test]
async fn test_checkout_without_cart() {
    let mut app = TestApp::new();

    let response = app.get("/checkout").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body.contains("Missing cart ID"));
}

#[tokio::test]
async fn test_cart_page_creates_cart_once() {
    let mut app = TestApp::new();

    let first = app.get("/cart").await;
    assert_eq!(first.status, StatusCode::OK, "{}", first.body);
    let second = app.get("/cart").await;
    assert_eq!(second.status, StatusCode::OK);

    assert_eq!(
        app.backend.calls(),
        vec![
            BackendCall::CreateCart,
            BackendCall::GetCart(TEST_CART_ID.to_string()),
        ]
    );
}

#[tokio::test]
async fn test_cart_count() {
    let mut app = TestApp::new();
    assert!(app.get("/cart/count").await.body.contains('0'));

    let mut app = app.with_cart().await;
    app.post_form(
        "/cart/add",
        &[("handle", PLAIN_PRODUCT), ("variant_id", &variant_id(PLAIN_PRODUCT, "S"))],
    )
    .await;

    let response = app.get("/cart/count").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains('1'));
}

#[tokio::test]
async fn test_security_headers_present() {
    let mut app = TestApp::new();

    let response = app.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "ok");
    assert_eq!(response.header("x-frame-options"), Some("DENY"));
    assert!(
        response
            .header("content-security-policy")
            .unwrap()
            .contains("'nonce-")
    );
    assert!(response.header("x-request-id").is_some());
}
