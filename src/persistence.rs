//! Best-effort saving of finished simulations to an external memory store.
//!
//! A failed save never fails the caller: the adapter logs the problem and
//! hands back a `fallback` record carrying the key it generated locally.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::Settings;
use crate::core::{PersistenceRecord, PersistenceStatus, SimulationResult, StoreError};

pub const MEMORY_TYPE: &str = "episodic";
pub const MEMORY_TAGS: [&str; 3] = ["simulation", "chronos", "timeline"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMetadata {
    pub user_id: String,
    pub timestamp: i64,
    pub timelines: usize,
    pub source: String,
}

/// Arguments for the store's `store_memory` tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreRequest {
    pub key: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub tags: Vec<&'static str>,
    pub metadata: StoreMetadata,
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn store(&self, request: &StoreRequest) -> Result<Value, StoreError>;
}

/// Memory store reached through an HTTP tool bridge that accepts the request
/// as a JSON body.
pub struct HttpMemoryStore {
    client: Client,
    url: String,
}

impl HttpMemoryStore {
    pub fn new(url: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::builder()
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn post(&self, request: &StoreRequest) -> Result<Value, StoreError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Tool(format!("unreadable confirmation: {e}")))?;
        if body["isError"].as_bool() == Some(true) {
            return Err(StoreError::Tool(body["content"].to_string()));
        }
        Ok(body)
    }
}

#[async_trait]
impl MemoryStore for HttpMemoryStore {
    async fn store(&self, request: &StoreRequest) -> Result<Value, StoreError> {
        self.post(request).await
    }
}

pub struct PersistenceAdapter {
    store: Option<Arc<dyn MemoryStore>>,
    timeout: Duration,
    source: String,
    last_stamp: AtomicI64,
}

impl PersistenceAdapter {
    pub fn new(
        store: Option<Arc<dyn MemoryStore>>,
        timeout: Duration,
        source: impl Into<String>,
    ) -> Self {
        Self {
            store,
            timeout,
            source: source.into(),
            last_stamp: AtomicI64::new(0),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let store = match settings.memory_store_url.as_deref() {
            Some(url) => match HttpMemoryStore::new(url) {
                Ok(store) => Some(Arc::new(store) as Arc<dyn MemoryStore>),
                Err(e) => {
                    warn!(error = %e, "memory store unavailable, saves will fall back");
                    None
                }
            },
            None => None,
        };
        Self::new(store, settings.timeout(), settings.service_name.clone())
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Milliseconds since the epoch, strictly increasing per adapter so keys
    /// never collide.
    fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let prev = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(prev + 1)
    }

    pub async fn save(&self, user_id: &str, result: &SimulationResult) -> PersistenceRecord {
        let timestamp = self.next_timestamp();
        let key = format!("universe-{user_id}-{timestamp}");
        let record = |status| PersistenceRecord {
            key: key.clone(),
            timestamp,
            status,
        };

        let Some(store) = &self.store else {
            warn!(%key, "no memory store configured, keeping local record");
            return record(PersistenceStatus::Fallback);
        };

        let content = match serde_json::to_string(result) {
            Ok(content) => content,
            Err(e) => {
                warn!(%key, error = %e, "could not serialize simulation");
                return record(PersistenceStatus::Fallback);
            }
        };
        let request = StoreRequest {
            key: key.clone(),
            content,
            kind: MEMORY_TYPE,
            tags: MEMORY_TAGS.to_vec(),
            metadata: StoreMetadata {
                user_id: user_id.to_string(),
                timestamp,
                timelines: result.timelines.len(),
                source: self.source.clone(),
            },
        };

        let outcome = match timeout(self.timeout, store.store(&request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(StoreError::Timeout(self.timeout.as_secs())),
        };
        match outcome {
            Ok(confirmation) => {
                info!(%key, kind = MEMORY_TYPE, result = %confirmation, "stored episodic memory");
                record(PersistenceStatus::Saved)
            }
            Err(e) => {
                warn!(%key, error = %e, "memory store failed, using fallback record");
                record(PersistenceStatus::Fallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::accept_value;
    use crate::core::schema::fixtures::simulation;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::net::TcpListener;
    use tracing_test::traced_test;

    enum Behaviour {
        Confirm,
        Fail,
        Hang,
    }

    struct FakeStore {
        behaviour: Behaviour,
        requests: Mutex<Vec<StoreRequest>>,
    }

    impl FakeStore {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MemoryStore for FakeStore {
        async fn store(&self, request: &StoreRequest) -> Result<Value, StoreError> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            match self.behaviour {
                Behaviour::Confirm => {
                    Ok(json!({ "content": [{ "type": "text", "text": "stored" }] }))
                }
                Behaviour::Fail => Err(StoreError::Connection("connection refused".to_string())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3_600)).await;
                    Ok(Value::Null)
                }
            }
        }
    }

    fn result() -> SimulationResult {
        accept_value(simulation(2025), None).expect("valid fixture")
    }

    fn adapter(store: Arc<FakeStore>) -> PersistenceAdapter {
        PersistenceAdapter::new(
            Some(store as Arc<dyn MemoryStore>),
            Duration::from_secs(5),
            "chronos-test",
        )
    }

    #[tokio::test]
    async fn save_confirms_and_sends_tagged_request() {
        let store = FakeStore::new(Behaviour::Confirm);
        let record = adapter(store.clone()).save("user-1", &result()).await;

        assert_eq!(record.status, PersistenceStatus::Saved);
        assert!(record.key.starts_with("universe-user-1-"));
        assert_eq!(record.key, format!("universe-user-1-{}", record.timestamp));

        let requests = store.requests.lock().expect("lock");
        let request = &requests[0];
        assert_eq!(request.key, record.key);
        assert_eq!(request.kind, "episodic");
        assert_eq!(request.metadata.user_id, "user-1");
        assert_eq!(request.metadata.timelines, 3);
        assert_eq!(request.metadata.timestamp, record.timestamp);
        let content: SimulationResult =
            serde_json::from_str(&request.content).expect("content is the result");
        assert_eq!(content, result());

        let wire = serde_json::to_value(request).expect("serializable");
        assert_eq!(wire["type"], "episodic");
        assert_eq!(wire["metadata"]["userId"], "user-1");
    }

    #[tokio::test]
    #[traced_test]
    async fn save_falls_back_when_store_fails() {
        let record = adapter(FakeStore::new(Behaviour::Fail))
            .save("user-1", &result())
            .await;
        assert!(record.is_fallback());
        assert!(record.key.starts_with("universe-user-1-"));
        assert!(logs_contain("memory store failed, using fallback record"));
    }

    #[tokio::test(start_paused = true)]
    async fn save_falls_back_when_store_hangs() {
        let record = adapter(FakeStore::new(Behaviour::Hang))
            .save("user-1", &result())
            .await;
        assert!(record.is_fallback());
    }

    #[tokio::test]
    async fn save_without_store_is_local_fallback() {
        let adapter = PersistenceAdapter::new(None, Duration::from_secs(5), "chronos-test");
        let record = adapter.save("user-9", &result()).await;
        assert!(record.is_fallback());
        assert!(record.key.starts_with("universe-user-9-"));
        assert!(!adapter.has_store());
    }

    #[tokio::test]
    async fn repeated_saves_append_with_distinct_keys() {
        let adapter = adapter(FakeStore::new(Behaviour::Confirm));
        let data = result();
        let first = adapter.save("user-1", &data).await;
        let second = adapter.save("user-1", &data).await;
        assert_ne!(first.key, second.key);
        assert!(second.timestamp > first.timestamp);
    }

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}/store")
    }

    #[tokio::test]
    async fn http_store_posts_request_and_reads_confirmation() {
        let router = Router::new().route(
            "/store",
            post(|Json(body): Json<Value>| async move {
                Json(json!({ "content": [{ "type": "text", "text": body["key"] }] }))
            }),
        );
        let store: Arc<dyn MemoryStore> =
            Arc::new(HttpMemoryStore::new(serve(router).await).expect("client"));
        let adapter = PersistenceAdapter::new(Some(store), Duration::from_secs(5), "chronos-test");

        let record = adapter.save("user-2", &result()).await;
        assert_eq!(record.status, PersistenceStatus::Saved);
    }

    #[tokio::test]
    async fn http_store_tool_error_becomes_fallback() {
        let router = Router::new().route(
            "/store",
            post(|| async { Json(json!({ "isError": true, "content": "quota exceeded" })) }),
        );
        let store = HttpMemoryStore::new(serve(router).await).expect("client");
        let request = StoreRequest {
            key: "universe-u-1".to_string(),
            content: "{}".to_string(),
            kind: MEMORY_TYPE,
            tags: MEMORY_TAGS.to_vec(),
            metadata: StoreMetadata {
                user_id: "u".to_string(),
                timestamp: 1,
                timelines: 3,
                source: "test".to_string(),
            },
        };
        let err = store.store(&request).await.expect_err("tool error");
        assert!(matches!(err, StoreError::Tool(m) if m.contains("quota exceeded")));
    }

    #[tokio::test]
    async fn http_store_rejection_carries_status() {
        let router = Router::new().route(
            "/store",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down for maintenance") }),
        );
        let store: Arc<dyn MemoryStore> =
            Arc::new(HttpMemoryStore::new(serve(router).await).expect("client"));
        let adapter = PersistenceAdapter::new(Some(store), Duration::from_secs(5), "chronos-test");
        let record = adapter.save("user-3", &result()).await;
        assert!(record.is_fallback());
    }
}
