use littlelemon_rs::config::RateLimitConfig;
use serde_json::{json, Value};

mod common;
use common::*;

#[tokio::test]
async fn test_health_endpoint() {
    let test_env = TestEnvironment::new().await;

    let response = test_env
        .client
        .get(test_env.url("/health/status"))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response
            .headers()
            .get("x-content-type-options")
            .and_then(|value| value.to_str().ok()),
        Some("nosniff")
    );
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_order_lifecycle() {
    let test_env = TestEnvironment::new().await;
    let salad_id = test_env.menu_item_id("Greek Salad").await;
    let rui_id = test_env.user_id("rui").await;

    // Ana fills her cart
    let response = test_env
        .post("/api/cart/menu-items", "ana")
        .json(&json!({"menuitem": salad_id, "quantity": 2}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 200);
    let entry: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(entry["unit_price"], "12.50");
    assert_eq!(entry["price"], "25.00");

    // ... and turns it into an order
    let response = test_env
        .post("/api/orders", "ana")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 200);
    let order: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(order["total"], "25.00");
    assert_eq!(order["status"], false);
    let order_id = order["id"].as_str().expect("order id").to_string();

    let cart: Vec<Value> = test_env
        .get("/api/cart/menu-items", "ana")
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert!(cart.is_empty());

    let items: Vec<Value> = test_env
        .get(&format!("/api/orders/{}", order_id), "ana")
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 2);

    // Ben cannot see Ana's order
    let response = test_env
        .get(&format!("/api/orders/{}", order_id), "ben")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 404);

    // Maria assigns Rui
    let response = test_env
        .patch(&format!("/api/orders/{}", order_id), "maria")
        .json(&json!({"delivery_crew": rui_id}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 200);

    let assigned: Vec<Value> = test_env
        .get("/api/orders", "rui")
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(assigned.len(), 1);

    // Rui delivers
    let response = test_env
        .patch(&format!("/api/orders/{}", order_id), "rui")
        .json(&json!({"status": true}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 200);
    let delivered: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(delivered["status"], true);

    // Maria removes the order
    let response = test_env
        .delete(&format!("/api/orders/{}", order_id), "maria")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 200);
    let deleted: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(deleted["deleted_order_items"], 1);
}

#[tokio::test]
async fn test_identity_is_required() {
    let test_env = TestEnvironment::new().await;

    let response = test_env
        .client
        .get(test_env.url("/api/menu-items"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(
        body["message"],
        "Authentication credentials were not provided."
    );

    let response = test_env
        .get("/api/menu-items", "nobody")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn test_menu_listing_is_ordered_and_filtered() {
    let test_env = TestEnvironment::new().await;

    let items: Vec<Value> = test_env
        .get("/api/menu-items?ordering=-price", "ana")
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(items.len(), 6);
    assert_eq!(items[0]["title"], "Grilled Fish");
    assert_eq!(items[5]["title"], "Fresh Lemonade");

    let featured: Vec<Value> = test_env
        .get("/api/menu-items?featured=true", "ana")
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(featured.len(), 3);
    assert!(featured.iter().all(|item| item["featured"] == true));

    let response = test_env
        .get("/api/menu-items?ordering=calories", "ana")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn test_catalog_changes_require_manager() {
    let test_env = TestEnvironment::new().await;

    let response = test_env
        .post("/api/categories", "ana")
        .json(&json!({"slug": "brunch", "title": "Brunch"}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 403);

    let response = test_env
        .post("/api/categories", "maria")
        .json(&json!({"slug": "brunch", "title": "Brunch"}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn test_throttling() {
    let test_env = TestEnvironment::with_rate_limit(RateLimitConfig {
        enabled: true,
        requests_per_window: 2,
        window_seconds: 60,
    })
    .await;

    for _ in 0..2 {
        let response = test_env
            .get("/api/categories", "ana")
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status().as_u16(), 200);
    }

    let response = test_env
        .get("/api/categories", "ana")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 429);
    assert!(response.headers().contains_key("retry-after"));

    // Health checks are not throttled
    let response = test_env
        .client
        .get(test_env.url("/health/status"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 200);

    let metrics = test_env
        .client
        .get(test_env.url("/metrics"))
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .expect("Failed to read metrics");
    assert!(metrics.contains("http_requests_throttled_total"));
    assert!(metrics.contains("http_requests_total"));
}

#[tokio::test]
async fn test_admin_seed_is_idempotent() {
    let test_env = TestEnvironment::new().await;

    let response = test_env
        .client
        .post(test_env.url("/api/admin/seed"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["menu_items_created"], 0);
    assert_eq!(body["users_created"], 0);
}
