mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;
use storefront_admin::auth::consts as perm;

#[tokio::test]
async fn status_and_health_are_public() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/status", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["service"], "storefront-admin");

    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["checks"]["database"], "healthy");

    let (status, body) = app.request(Method::GET, "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "Storefront Admin API");
}

#[tokio::test]
async fn admin_routes_need_a_token_and_permission() {
    let app = TestApp::new().await;

    let (status, _) = app.request(Method::GET, "/api/v1/orders/1", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(Method::GET, "/api/v1/orders/1", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let catalog_only = app.token(&[perm::CATALOG_MANAGE]);
    let (status, _) = app
        .request(Method::GET, "/api/v1/orders/1", Some(&catalog_only), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let orders = app.token(&[perm::ORDERS_MANAGE]);
    let (status, body) = app
        .request(Method::GET, "/api/v1/orders/1", Some(&orders), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn catalog_endpoints_round_trip() {
    let app = TestApp::new().await;
    let token = app.admin_token();

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/catalogs",
            Some(&token),
            Some(json!({ "title": "Autumn", "in_season": true })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .request(Method::POST, &format!("/api/v1/catalogs/{}/clone", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["clone_of"], id);

    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/catalogs/{}", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["product_count"], 0);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/catalogs",
            Some(&token),
            Some(json!({ "title": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "title");
}

#[tokio::test]
async fn invoice_row_errors_carry_row_indexes() {
    let app = TestApp::new().await;
    let region = app.seed_region("Canada").await;
    let locale = app.seed_locale("en_CA", region, "CAD").await;
    let account = app.seed_account("Dana Smith", "dana@example.com").await;
    let token = app.token(&[perm::ORDERS_MANAGE]);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/invoices",
            Some(&token),
            Some(json!({ "account": account, "locale": locale, "shipping_total": "5.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let invoice = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/invoices/{}/items", invoice),
            Some(&token),
            Some(json!({
                "rows": [
                    { "sku": "A-1", "description": "Tent", "quantity": 1, "price": "10.00" },
                    { "sku": "", "description": "", "quantity": null, "price": null },
                    { "sku": "B-2", "description": "Stakes", "quantity": 2, "price": null }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["row"], 2);
    assert_eq!(body["details"][0]["field"], "price");
}

#[tokio::test]
async fn expired_card_is_unprocessable() {
    let app = TestApp::new().await;
    let account = app.seed_account("Dana Smith", "dana@example.com").await;
    let token = app.token(&[perm::ACCOUNTS_MANAGE]);

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/accounts/{}/payment-methods", account),
            Some(&token),
            Some(json!({
                "payment_type": "visa",
                "card_fullname": "Dana Smith",
                "card_lastdigits": "4242",
                "card_expiry_month": 1,
                "card_expiry_year": 2001
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("expired"));
}
