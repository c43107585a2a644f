//! Shared test helpers: a mock backend and a client wired to it.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use autopart::auth::{AuthEvent, MemoryTokenStore, TokenStore};
use autopart::client::AutoPartClient;
use autopart::config::ClientConfig;
use autopart::transport::REFRESH_PATH;

pub struct Harness {
    pub server: MockServer,
    pub store: Arc<MemoryTokenStore>,
    pub client: AutoPartClient,
    pub events: Arc<Mutex<Vec<AuthEvent>>>,
}

impl Harness {
    /// Backend plus a client holding `access` / `refresh`.
    pub async fn with_tokens(access: Option<&str>, refresh: Option<&str>) -> Self {
        Self::build(access, refresh, |config| config).await
    }

    pub async fn build(
        access: Option<&str>,
        refresh: Option<&str>,
        configure: impl FnOnce(ClientConfig) -> ClientConfig,
    ) -> Self {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryTokenStore::new());
        if let Some(access) = access {
            store.set_access_token(access).unwrap();
        }
        if let Some(refresh) = refresh {
            store.set_refresh_token(refresh).unwrap();
        }

        let config = configure(ClientConfig::new().with_base_url(server.uri()));
        let client = AutoPartClient::with_store(config, store.clone()).unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        client.on_auth_event(move |event| sink.lock().unwrap().push(event));

        Self {
            server,
            store,
            client,
            events,
        }
    }

    pub fn events(&self) -> Vec<AuthEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Mount a refresh endpoint answering `status` / `body` after `delay`,
    /// expected to be hit exactly `times` times.
    pub async fn mock_refresh(&self, status: u16, body: Value, delay: Duration, times: u64) {
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(body)
                    .set_delay(delay),
            )
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// `GET route` answers 401 for `Bearer rejected` and `body` for `Bearer accepted`.
    pub async fn mock_guarded_get(&self, route: &str, rejected: &str, accepted: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .and(header("authorization", format!("Bearer {rejected}").as_str()))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Token expired"})))
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path(route))
            .and(header("authorization", format!("Bearer {accepted}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}

pub fn warehouse_json(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "code": format!("WH-{id}"),
        "city": "Lyon",
        "active": true
    })
}

pub fn page_json(items: Vec<Value>) -> Value {
    let total = items.len();
    json!({
        "items": items,
        "total": total,
        "page": 1,
        "pageSize": 20,
        "totalPages": 1
    })
}
