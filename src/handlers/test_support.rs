use axum::{
    body::Body,
    http::{header, Method, Request, Response},
    Router,
};
use rust_decimal_macros::dec;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use super::api::{create_api_router, ApiState};
use crate::models::{Category, Group, MenuItem, User, DELIVERY_CREW_GROUP, MANAGER_GROUP};
use crate::observability::{Metrics, AUTHENTICATED_USER_HEADER};
use crate::repositories::{InMemoryStore, MenuRepository, UserRepository};
use crate::services::{CartService, GroupService, MenuService, OrderService};

/// `/api` router over an in-memory store holding ana and ben (customers),
/// maria (manager), rui (delivery crew) and a Greek Salad at 12.50
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub category_id: String,
    pub salad_id: String,
    pub maria_id: String,
    pub rui_id: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());

        store.save_group(Group::new(MANAGER_GROUP)).await.unwrap();
        store.save_group(Group::new(DELIVERY_CREW_GROUP)).await.unwrap();
        store
            .save_user(User::new("ana", "ana@littlelemon.test"))
            .await
            .unwrap();
        store
            .save_user(User::new("ben", "ben@littlelemon.test"))
            .await
            .unwrap();
        let maria = store
            .save_user(User::new("maria", "maria@littlelemon.test").with_group(MANAGER_GROUP))
            .await
            .unwrap();
        let rui = store
            .save_user(User::new("rui", "rui@littlelemon.test").with_group(DELIVERY_CREW_GROUP))
            .await
            .unwrap();

        let category = store
            .create_category(Category::new("starters", "Starters"))
            .await
            .unwrap();
        let salad = store
            .create_menu_item(MenuItem::new("Greek Salad", dec!(12.50), true, &category.id))
            .await
            .unwrap();
        store
            .create_menu_item(MenuItem::new("Bruschetta", dec!(7.99), false, &category.id))
            .await
            .unwrap();

        let metrics = Arc::new(Metrics::new().unwrap());
        let state = ApiState::new(
            Arc::new(MenuService::new(store.clone())),
            Arc::new(GroupService::new(store.clone())),
            Arc::new(CartService::new(store.clone(), store.clone())),
            Arc::new(OrderService::new(store.clone(), store.clone(), store.clone())),
            store.clone(),
            metrics,
        );

        Self {
            router: create_api_router(state),
            store,
            category_id: category.id,
            salad_id: salad.id,
            maria_id: maria.id,
            rui_id: rui.id,
        }
    }
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    username: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(username) = username {
        builder = builder.header(AUTHENTICATED_USER_HEADER, username);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
