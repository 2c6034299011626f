//! Requests: the non-generic, persistable [`RequestCore`] and the generic
//! [`Request`] wrapper that pairs it with a model converter and completion slot (§3, §4.7).

use crate::cancel::CancelToken;
use crate::error::Error;
use crate::response::{RawResponse, Response};
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The request body. `Stream` bodies cannot be fingerprinted for caching or
/// persisted for a promise (§4.3 "Non-serializable bodies").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Body {
    Json(serde_json::Map<String, serde_json::Value>),
    Text(String),
    #[serde(skip)]
    Stream(Arc<Vec<u8>>),
    None,
}

impl Default for Body {
    fn default() -> Self {
        Self::None
    }
}

impl Body {
    #[must_use]
    pub const fn is_serializable(&self) -> bool {
        !matches!(self, Self::Stream(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Json,
    FormUrlEncoded,
    Plain,
}

impl Default for ContentType {
    fn default() -> Self {
        Self::Json
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseType {
    Json,
    Text,
    Bytes,
}

impl Default for ResponseType {
    fn default() -> Self {
        Self::Json
    }
}

/// Retry policy for a single request (§3 "retry"). Falls back to the owning
/// business's `retry_interval_ms` when `interval_ms` is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryKind {
    Never,
    Limit,
    Forever,
}

impl Default for RetryKind {
    fn default() -> Self {
        Self::Never
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    pub kind: RetryKind,
    /// Meaningful only when `kind == Limit`: the maximum number of retry attempts.
    pub max: u32,
    pub interval_ms: Option<u64>,
    /// Number of retries already performed. Incremented by the manager, never by the caller.
    pub count: u32,
}

impl RetryConfig {
    #[must_use]
    pub fn never() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn limit(max: u32, interval_ms: u64) -> Self {
        Self {
            kind: RetryKind::Limit,
            max,
            interval_ms: Some(interval_ms),
            count: 0,
        }
    }

    #[must_use]
    pub fn forever(interval_ms: u64) -> Self {
        Self {
            kind: RetryKind::Forever,
            max: 0,
            interval_ms: Some(interval_ms),
            count: 0,
        }
    }

    /// Whether another retry attempt is permitted given attempts already made.
    #[must_use]
    pub const fn allows_another_attempt(&self) -> bool {
        match self.kind {
            RetryKind::Never => false,
            RetryKind::Forever => true,
            RetryKind::Limit => self.count < self.max,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enable: bool,
    /// `true` uses the bounded LRU tier; `false` uses the unbounded pinned tier (§4.2).
    pub use_lru: bool,
    /// Bypass a hit for this single call without disabling the write-through on response.
    pub ignore_once: bool,
    pub duration: Option<Duration>,
    /// Overrides the MD5 fingerprint computed from request identity, when set.
    pub md5_key: Option<String>,
    /// Populated by the manager once a cache hit or a fresh write has occurred,
    /// so later lifecycle steps (and interceptors) can observe it.
    #[serde(skip)]
    pub last_response: Option<RawResponse>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromiseConfig {
    pub enable: bool,
    /// UUIDv5 promise key, derived deterministically once the request is queued (§4.3).
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockConfig {
    pub enable: bool,
    pub project_id: Option<String>,
    /// `{MOCK_PATH_PREFIX}/{project_id}{api_path}`, computed lazily by the manager.
    pub origin_path: Option<String>,
}

/// Every field of a request that doesn't depend on the caller's model type `M`.
/// This is what gets hashed for a cache key and what gets persisted for a promise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestCore {
    pub business_identifier: String,
    pub method: Method,
    pub api_path: String,
    pub path_param: Option<String>,
    pub query_params: serde_json::Map<String, serde_json::Value>,
    pub data: Body,
    pub headers: HashMap<String, String>,
    pub content_type: ContentType,
    pub response_type: ResponseType,
    pub connect_timeout: Option<Duration>,
    pub send_timeout: Option<Duration>,
    pub recv_timeout: Option<Duration>,
    #[serde(skip)]
    pub cancel_token: CancelToken,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub promise: PromiseConfig,
    pub mock: MockConfig,
    pub extra_tag: Option<String>,
    pub request_start_time: Option<DateTime<Utc>>,
}

impl RequestCore {
    #[must_use]
    pub fn new(business_identifier: impl Into<String>, method: Method, api_path: impl Into<String>) -> Self {
        Self {
            business_identifier: business_identifier.into(),
            method,
            api_path: api_path.into(),
            path_param: None,
            query_params: serde_json::Map::new(),
            data: Body::None,
            headers: HashMap::new(),
            content_type: ContentType::default(),
            response_type: ResponseType::default(),
            connect_timeout: None,
            send_timeout: None,
            recv_timeout: None,
            cancel_token: CancelToken::new(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            promise: PromiseConfig::default(),
            mock: MockConfig::default(),
            extra_tag: None,
            request_start_time: None,
        }
    }

    /// The MD5 cache-key fingerprint of this request's identity (§3):
    /// `businessIdentifier || method || apiPath || pathParam || jsonEncode(queryParams) || jsonEncode(data)`.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        if let Some(key) = &self.cache.md5_key {
            return key.clone();
        }
        let mut hasher = Md5::new();
        hasher.update(self.business_identifier.as_bytes());
        hasher.update(self.method.as_str().as_bytes());
        hasher.update(self.api_path.as_bytes());
        hasher.update(self.path_param.as_deref().unwrap_or("").as_bytes());
        hasher.update(
            serde_json::to_string(&self.query_params)
                .unwrap_or_default()
                .as_bytes(),
        );
        if let Body::Json(map) = &self.data {
            hasher.update(serde_json::to_string(map).unwrap_or_default().as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Effective retry interval: the request's own, falling back to the business default.
    #[must_use]
    pub fn retry_interval_ms(&self, business_default_ms: u64) -> u64 {
        self.retry.interval_ms.unwrap_or(business_default_ms)
    }
}

/// The DB row shape for a persisted promise (§4.3). `data` is the JSON-serialized
/// [`RequestCore`]; non-serializable (`Body::Stream`) requests are rejected before
/// reaching this conversion.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PersistedRequest {
    pub id: String,
    pub business_id: String,
    pub path: String,
    pub data: String,
}

impl RequestCore {
    pub fn to_persisted(&self, promise_key: &str) -> Result<PersistedRequest, Error> {
        if !self.data.is_serializable() {
            return Err(Error::not_serializable(
                "a streaming request body cannot be persisted for a promise",
            ));
        }
        let data = serde_json::to_string(self).map_err(Error::from)?;
        Ok(PersistedRequest {
            id: promise_key.to_string(),
            business_id: self.business_identifier.clone(),
            path: self.api_path.clone(),
            data,
        })
    }

    pub fn from_persisted(row: &PersistedRequest) -> Result<Self, Error> {
        serde_json::from_str(&row.data).map_err(Error::from)
    }
}

/// A single-fire completion channel for a request's result.
///
/// A second `complete()` call is silently discarded rather than treated as an
/// error, matching the spec's "write at most once" contract for a request that
/// may be completed either by a direct response or by interception (§4.5 step G).
pub struct CompletionSlot<M> {
    sender: Arc<Mutex<Option<oneshot::Sender<Response<M>>>>>,
    receiver: Arc<Mutex<Option<oneshot::Receiver<Response<M>>>>>,
}

impl<M> Clone for CompletionSlot<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
        }
    }
}

impl<M> Default for CompletionSlot<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> CompletionSlot<M> {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            sender: Arc::new(Mutex::new(Some(tx))),
            receiver: Arc::new(Mutex::new(Some(rx))),
        }
    }

    /// Fires the slot with `response`. A second call (or a call after `wait`
    /// has already consumed the first) is a silent no-op.
    pub fn complete(&self, response: Response<M>) {
        if let Some(sender) = self.sender.lock().unwrap().take() {
            let _ = sender.send(response);
        }
    }

    /// Consumes the slot's single result. Only the first caller observes a value;
    /// later callers get `None` immediately.
    pub async fn wait(&self) -> Option<Response<M>> {
        let receiver = self.receiver.lock().unwrap().take();
        match receiver {
            Some(rx) => rx.await.ok(),
            None => None,
        }
    }
}

/// A request paired with its model converter and completion slot.
///
/// `core` carries everything that can be persisted or hashed; `converter` and
/// `completion` exist only for the duration of an in-process call and are never
/// serialized (§5's resolution of the dynamic `Request`/`Response` model onto
/// Rust generics).
pub struct Request<M> {
    pub core: RequestCore,
    pub converter: Option<Arc<dyn Fn(&serde_json::Value) -> M + Send + Sync>>,
    pub completion: CompletionSlot<M>,
}

impl<M> Request<M> {
    #[must_use]
    pub fn new(core: RequestCore) -> Self {
        Self {
            core,
            converter: None,
            completion: CompletionSlot::new(),
        }
    }

    #[must_use]
    pub fn with_converter(mut self, converter: impl Fn(&serde_json::Value) -> M + Send + Sync + 'static) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }

    /// Applies the converter (if any) to a raw response, producing the caller-visible,
    /// typed response. Used by the manager as the very last lifecycle step.
    pub fn convert(&self, raw: RawResponse) -> Response<M> {
        let model = match (&self.converter, &raw.data) {
            (Some(convert), Some(data)) if raw.error.is_none() => Some(convert(data)),
            _ => None,
        };
        raw.with_model(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_core() -> RequestCore {
        let mut core = RequestCore::new("billing", Method::Get, "/invoices");
        core.path_param = Some("42".to_string());
        core
    }

    #[test]
    fn fingerprint_is_deterministic_for_identical_requests() {
        let a = sample_core();
        let b = sample_core();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_changes_with_path_param() {
        let a = sample_core();
        let mut b = sample_core();
        b.path_param = Some("43".to_string());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn explicit_md5_key_overrides_computed_fingerprint() {
        let mut core = sample_core();
        core.cache.md5_key = Some("explicit-key".to_string());
        assert_eq!(core.fingerprint(), "explicit-key");
    }

    #[test]
    fn stream_body_is_rejected_from_persistence() {
        let mut core = sample_core();
        core.data = Body::Stream(Arc::new(vec![1, 2, 3]));
        let err = core.to_persisted("promise-key").unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
    }

    #[test]
    fn persisted_round_trips_back_to_an_equivalent_core() {
        let core = sample_core();
        let persisted = core.to_persisted("promise-key").unwrap();
        let restored = RequestCore::from_persisted(&persisted).unwrap();
        assert_eq!(restored.business_identifier, core.business_identifier);
        assert_eq!(restored.api_path, core.api_path);
    }

    #[tokio::test]
    async fn completion_slot_second_write_is_silently_discarded() {
        let slot: CompletionSlot<i32> = CompletionSlot::new();
        let now = Utc::now();
        slot.complete(Response::success(200, HashMap::new(), None, 1, now, now));
        slot.complete(Response::success(200, HashMap::new(), None, 2, now, now));
        let result = slot.wait().await.unwrap();
        assert_eq!(result.model, Some(1));
    }

    #[test]
    fn retry_limit_stops_after_max_attempts() {
        let mut retry = RetryConfig::limit(2, 100);
        assert!(retry.allows_another_attempt());
        retry.count = 2;
        assert!(!retry.allows_another_attempt());
    }

    #[test]
    fn retry_forever_always_allows_another_attempt() {
        let mut retry = RetryConfig::forever(100);
        retry.count = 1000;
        assert!(retry.allows_another_attempt());
    }
}
