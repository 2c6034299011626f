//! End-to-end lifecycle scenarios (§8 "End-to-end scenarios (literal)").

use async_trait::async_trait;
use linecross::error::Error;
use linecross::interceptor::Interceptor;
use linecross::parser::DefaultParser;
use linecross::request::{CacheConfig, MockConfig, PromiseConfig, RetryConfig};
use linecross::transport::{RawResponse as TransportRawResponse, Transport};
use linecross::{BusinessConfig, Manager, ManagerConfig, Method, Request, RequestCore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fails its first `fails` calls, then returns `body` with status 200.
struct FailNTimesTransport {
    remaining_fails: AtomicU32,
    calls: AtomicU32,
    body: serde_json::Value,
}

impl FailNTimesTransport {
    fn new(fails: u32, body: serde_json::Value) -> Self {
        Self {
            remaining_fails: AtomicU32::new(fails),
            calls: AtomicU32::new(0),
            body,
        }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FailNTimesTransport {
    async fn request(&self, _request: &RequestCore, _base_url: &str) -> Result<TransportRawResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.remaining_fails.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
            return Err(Error::configuration("simulated transport failure"));
        }
        Ok(TransportRawResponse {
            status_code: 200,
            headers: HashMap::new(),
            data: Some(self.body.clone()),
            raw: Vec::new(),
        })
    }
}

#[derive(Default)]
struct RecordingInterceptor {
    loaded_cache: Mutex<Vec<serde_json::Value>>,
    allow_pass_for_tag: Option<String>,
}

#[async_trait]
impl Interceptor for RecordingInterceptor {
    async fn on_load_cache(&self, _request: &RequestCore, cached: &linecross::RawResponse) {
        if let Some(data) = &cached.data {
            self.loaded_cache.lock().unwrap().push(data.clone());
        }
    }

    async fn allow_request_pass_when_suspend(&self, request: &RequestCore) -> bool {
        self.allow_pass_for_tag.as_deref() == request.extra_tag.as_deref()
    }

    async fn need_retry(&self, _request: &RequestCore, _response: &linecross::RawResponse) -> bool {
        true
    }
}

fn noop_manager_config() -> ManagerConfig {
    ManagerConfig::default()
}

#[tokio::test]
async fn s1_cache_hit_stash_still_invokes_the_transport() {
    let transport = Arc::new(FailNTimesTransport::new(0, serde_json::json!({"id": 1})));
    let interceptor = Arc::new(RecordingInterceptor::default());
    let manager = Manager::new(noop_manager_config()).await.unwrap();
    manager
        .add_business(
            BusinessConfig::new("biz", "https://biz.example.com"),
            interceptor.clone(),
            Arc::new(DefaultParser),
            transport.clone(),
            None,
        )
        .await
        .unwrap();

    let mut core = RequestCore::new("biz", Method::Get, "/users");
    core.cache = CacheConfig {
        enable: true,
        use_lru: true,
        ..Default::default()
    };

    // First send: cache miss, network call #1, writes the cache.
    let first: Request<()> = Request::new(core.clone());
    let first_response = manager.send(first).await.unwrap();
    assert!(!first_response.from_cache);
    assert_eq!(transport.call_count(), 1);

    // Second send: cache hit is returned immediately, but the background
    // refresh still calls the transport a second time.
    let second: Request<()> = Request::new(core);
    let second_response = manager.send(second).await.unwrap();
    assert!(second_response.from_cache);
    assert_eq!(second_response.data, Some(serde_json::json!({"id": 1})));
    assert_eq!(interceptor.loaded_cache.lock().unwrap().as_slice(), &[serde_json::json!({"id": 1})]);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn s2_retry_then_succeed() {
    let transport = Arc::new(FailNTimesTransport::new(2, serde_json::json!({"ok": true})));
    let manager = Manager::new(noop_manager_config()).await.unwrap();
    manager
        .add_business(
            BusinessConfig::new("biz", "https://biz.example.com"),
            Arc::new(RecordingInterceptor::default()),
            Arc::new(DefaultParser),
            transport.clone(),
            None,
        )
        .await
        .unwrap();

    let mut core = RequestCore::new("biz", Method::Get, "/flaky");
    core.retry = RetryConfig::limit(3, 10);
    let request: Request<()> = Request::new(core);
    let response = manager.send(request).await.unwrap();

    assert_eq!(transport.call_count(), 3);
    assert!(response.is_success());
    assert_eq!(response.data, Some(serde_json::json!({"ok": true})));
}

#[tokio::test]
async fn s3_retry_budget_exhausted() {
    let transport = Arc::new(FailNTimesTransport::new(u32::MAX, serde_json::Value::Null));
    let manager = Manager::new(noop_manager_config()).await.unwrap();
    manager
        .add_business(
            BusinessConfig::new("biz", "https://biz.example.com"),
            Arc::new(RecordingInterceptor::default()),
            Arc::new(DefaultParser),
            transport.clone(),
            None,
        )
        .await
        .unwrap();

    let mut core = RequestCore::new("biz", Method::Get, "/broken");
    core.retry = RetryConfig::limit(2, 0);
    let request: Request<()> = Request::new(core);
    let response = manager.send(request).await.unwrap();

    assert_eq!(transport.call_count(), 3);
    assert!(response.error.is_some());
}

#[tokio::test]
async fn s4_promise_durability_survives_a_restart() {
    let db_file = tempfile::NamedTempFile::new().unwrap();
    let db_url = format!("sqlite://{}", db_file.path().display());

    let failing_transport = Arc::new(FailNTimesTransport::new(u32::MAX, serde_json::Value::Null));
    let config = ManagerConfig {
        cache_database_url: "sqlite::memory:".to_string(),
        promise_database_url: db_url.clone(),
        ..ManagerConfig::default()
    };
    let manager = Manager::new(config).await.unwrap();
    manager
        .add_business(
            BusinessConfig::new("biz", "https://biz.example.com"),
            Arc::new(RecordingInterceptor::default()),
            Arc::new(DefaultParser),
            failing_transport,
            None,
        )
        .await
        .unwrap();

    let mut core = RequestCore::new("biz", Method::Post, "/orders");
    core.data = linecross::Body::Json(serde_json::Map::from_iter([(
        "x".to_string(),
        serde_json::json!(1),
    )]));
    core.promise = PromiseConfig {
        enable: true,
        key: None,
    };
    core.retry = RetryConfig::never();
    let request: Request<()> = Request::new(core.clone());
    manager.send(request).await.unwrap();

    // "Restart": a brand-new Manager reading the same durable promise DB file.
    let config2 = ManagerConfig {
        cache_database_url: "sqlite::memory:".to_string(),
        promise_database_url: db_url,
        ..ManagerConfig::default()
    };
    let succeeding_transport = Arc::new(FailNTimesTransport::new(0, serde_json::json!({"ok": true})));
    let manager2 = Manager::new(config2).await.unwrap();
    manager2
        .add_business(
            BusinessConfig::new("biz", "https://biz.example.com"),
            Arc::new(RecordingInterceptor::default()),
            Arc::new(DefaultParser),
            succeeding_transport,
            None,
        )
        .await
        .unwrap();

    let queued = manager2.promise_requests("biz").await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].api_path, core.api_path);
    assert_eq!(queued[0].method, core.method);

    let mut resend_core = queued[0].clone();
    resend_core.promise.enable = true;
    let resend: Request<()> = Request::new(resend_core);
    let response = manager2.send(resend).await.unwrap();
    assert!(response.is_success());
    assert!(manager2.promise_requests("biz").await.unwrap().is_empty());
}

#[tokio::test]
async fn s5_suspend_allows_pass_through_and_blocks_others() {
    let transport = Arc::new(FailNTimesTransport::new(0, serde_json::json!({"ok": true})));
    let interceptor = Arc::new(RecordingInterceptor {
        loaded_cache: Mutex::new(Vec::new()),
        allow_pass_for_tag: Some("A".to_string()),
    });
    let manager = Arc::new(Manager::new(noop_manager_config()).await.unwrap());
    manager
        .add_business(
            BusinessConfig::new("biz", "https://biz.example.com"),
            interceptor,
            Arc::new(DefaultParser),
            transport.clone(),
            None,
        )
        .await
        .unwrap();

    manager.suspend("biz").await.unwrap();

    let mut core_a = RequestCore::new("biz", Method::Get, "/a");
    core_a.extra_tag = Some("A".to_string());
    let request_a: Request<()> = Request::new(core_a);
    let response_a = manager.send(request_a).await.unwrap();
    assert!(response_a.is_success());
    assert_eq!(transport.call_count(), 1);

    let mut core_b = RequestCore::new("biz", Method::Get, "/b");
    core_b.extra_tag = Some("B".to_string());
    let request_b: Request<()> = Request::new(core_b);
    let manager_clone = manager.clone();
    let handle = tokio::spawn(async move { manager_clone.send(request_b).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!handle.is_finished());
    assert_eq!(transport.call_count(), 1);

    manager.resume("biz").await.unwrap();
    let response_b = handle.await.unwrap().unwrap();
    assert!(response_b.is_success());
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn s6_lru_eviction_keeps_the_db_coherent() {
    let transport = Arc::new(FailNTimesTransport::new(0, serde_json::json!({"ok": true})));
    let config = ManagerConfig {
        lru_capacity: 2,
        ..ManagerConfig::default()
    };
    let manager = Manager::new(config).await.unwrap();
    manager
        .add_business(
            BusinessConfig::new("biz", "https://biz.example.com"),
            Arc::new(RecordingInterceptor::default()),
            Arc::new(DefaultParser),
            transport,
            None,
        )
        .await
        .unwrap();

    for path in ["/k1", "/k2", "/k3"] {
        let mut core = RequestCore::new("biz", Method::Get, path);
        core.cache = CacheConfig {
            enable: true,
            use_lru: true,
            ..Default::default()
        };
        let request: Request<()> = Request::new(core);
        manager.send(request).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(30)).await;

    let mut k1 = RequestCore::new("biz", Method::Get, "/k1");
    k1.cache = CacheConfig { enable: true, use_lru: true, ignore_once: true, ..Default::default() };
    let probe: Request<()> = Request::new(k1);
    let response = manager.send(probe).await.unwrap();
    // K1 was evicted, so this miss causes a fresh (non-cached) response.
    assert!(!response.from_cache);
}

#[allow(unused)]
fn unused_mock_config_reference(_m: MockConfig) {}
