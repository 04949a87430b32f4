#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use littlelemon_rs::{
    config::{Config, RateLimitConfig},
    create_app,
    handlers::seed_demo_data,
    repositories::{InMemoryStore, UserRepository},
    Metrics, Repositories,
};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tokio::net::TcpListener;

pub const USER_HEADER: &str = "x-authenticated-user";

/// Full application served over TCP on a random port, backed by the
/// in-memory store loaded with the demo data set
pub struct TestEnvironment {
    pub client: Client,
    pub base_url: String,
    pub store: Arc<InMemoryStore>,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        Self::with_rate_limit(RateLimitConfig {
            enabled: false,
            requests_per_window: 1000,
            window_seconds: 60,
        })
        .await
    }

    pub async fn with_rate_limit(rate_limit: RateLimitConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        seed_demo_data(store.as_ref(), store.as_ref())
            .await
            .expect("Failed to seed demo data");

        let mut config = Config::default();
        config.rate_limit = rate_limit;
        config.server.enable_admin_endpoints = true;

        let metrics = Arc::new(Metrics::new().expect("Failed to create metrics"));
        let app = create_app(&config, Repositories::in_memory(store.clone()), metrics);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to get local address");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failed to serve app");
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        Self {
            client: Client::new(),
            base_url,
            store,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, path: &str, username: &str) -> RequestBuilder {
        self.client
            .get(self.url(path))
            .header(USER_HEADER, username)
    }

    pub fn post(&self, path: &str, username: &str) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .header(USER_HEADER, username)
    }

    pub fn patch(&self, path: &str, username: &str) -> RequestBuilder {
        self.client
            .patch(self.url(path))
            .header(USER_HEADER, username)
    }

    pub fn delete(&self, path: &str, username: &str) -> RequestBuilder {
        self.client
            .delete(self.url(path))
            .header(USER_HEADER, username)
    }

    pub async fn user_id(&self, username: &str) -> String {
        self.store
            .find_by_username(username)
            .await
            .expect("Failed to look up user")
            .expect("Unknown demo user")
            .id
    }

    /// Id of a seeded menu item, looked up through the API
    pub async fn menu_item_id(&self, title: &str) -> String {
        let items: Vec<Value> = self
            .get("/api/menu-items", "ana")
            .send()
            .await
            .expect("Failed to list menu items")
            .json()
            .await
            .expect("Failed to parse menu items");

        items
            .iter()
            .find(|item| item["title"] == title)
            .and_then(|item| item["id"].as_str())
            .expect("Menu item not seeded")
            .to_string()
    }
}
