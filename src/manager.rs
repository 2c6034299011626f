//! The orchestrator: resolves a business, runs it through the request lifecycle
//! state machine, and drives retry, caching, promise persistence, and
//! suspend/resume flow control (§4.5).

use crate::business::{BusinessConfig, BusinessRecord};
use crate::cache::CacheStore;
use crate::config::ManagerConfig;
use crate::constants::MOCK_PATH_PREFIX;
use crate::error::{ApiError, Error};
use crate::interceptor::Interceptor;
use crate::logging;
use crate::parser::Parser;
use crate::promise::{self, PromiseStore};
use crate::request::{Method, Request, RequestCore, RetryKind};
use crate::response::{RawResponse, Response};
use crate::transport::Transport;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

/// The client-side HTTP orchestration layer (§1 OVERVIEW).
///
/// Register one [`BusinessRecord`] per business line with [`Manager::add_business`],
/// then drive every request for that business through [`Manager::send`].
pub struct Manager {
    businesses: RwLock<HashMap<String, Arc<BusinessRecord>>>,
    cache: Arc<CacheStore>,
    promise: Arc<PromiseStore>,
    init_gate: AtomicBool,
    init_notify: Notify,
    config: ManagerConfig,
}

impl Manager {
    /// Opens the cache and promise durable stores per `config` and returns a
    /// manager ready to have businesses registered with it.
    pub async fn new(config: ManagerConfig) -> Result<Self, Error> {
        let cache_pool = SqlitePoolOptions::new().connect(&config.cache_database_url).await?;
        let promise_pool = SqlitePoolOptions::new().connect(&config.promise_database_url).await?;

        let cache = CacheStore::open(cache_pool, config.lru_capacity).await?;
        let promise = PromiseStore::open(promise_pool).await?;

        Ok(Self {
            businesses: RwLock::new(HashMap::new()),
            cache: Arc::new(cache),
            promise: Arc::new(promise),
            init_gate: AtomicBool::new(false),
            init_notify: Notify::new(),
            config,
        })
    }

    /// Registers a business line, running its interceptor's one-time
    /// initialization hooks before the business accepts any requests (§4.4).
    pub async fn add_business(
        &self,
        config: BusinessConfig,
        interceptor: Arc<dyn Interceptor>,
        parser: Arc<dyn Parser>,
        transport: Arc<dyn Transport>,
        mock_transport: Option<Arc<dyn Transport>>,
    ) -> Result<(), Error> {
        let identifier = config.identifier.clone();
        let record = Arc::new(BusinessRecord::new(config, interceptor, parser, transport, mock_transport));

        interceptor_init(&record, &identifier).await?;
        record.mark_initialized();

        self.businesses.write().await.insert(identifier, record);
        self.mark_global_init();
        Ok(())
    }

    fn mark_global_init(&self) {
        if !self.init_gate.swap(true, Ordering::SeqCst) {
            self.init_notify.notify_waiters();
        }
    }

    /// Resolves once at least one business has been registered.
    pub async fn wait_ready(&self) {
        if self.init_gate.load(Ordering::SeqCst) {
            return;
        }
        let notified = self.init_notify.notified();
        if self.init_gate.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }

    async fn business(&self, identifier: &str) -> Option<Arc<BusinessRecord>> {
        self.businesses.read().await.get(identifier).cloned()
    }

    pub async fn suspend(&self, business_identifier: &str) -> Result<(), Error> {
        let record = self
            .business(business_identifier)
            .await
            .ok_or_else(|| Error::unknown_business(business_identifier))?;
        record.suspend().await;
        Ok(())
    }

    pub async fn resume(&self, business_identifier: &str) -> Result<(), Error> {
        let record = self
            .business(business_identifier)
            .await
            .ok_or_else(|| Error::unknown_business(business_identifier))?;
        record.resume().await;
        Ok(())
    }

    /// Drops `business_identifier`'s queued promises and runs its interceptor's
    /// `on_clean_data` hook (§4.3, §4.5).
    pub async fn clean_data(&self, business_identifier: &str) -> Result<(), Error> {
        let record = self
            .business(business_identifier)
            .await
            .ok_or_else(|| Error::unknown_business(business_identifier))?;
        self.promise.clear_business(business_identifier).await?;
        record.interceptor.on_clean_data(business_identifier).await;
        Ok(())
    }

    /// All requests still durably queued for `business_identifier`, for replay
    /// after a restart (§4.3).
    pub async fn promise_requests(&self, business_identifier: &str) -> Result<Vec<RequestCore>, Error> {
        self.promise.for_business(business_identifier).await
    }

    /// Runs `request` through the full lifecycle state machine:
    /// `New → Queued → InFlight → Parsed → {Retrying → Queued | Intercepted | Completed}` (§4.5).
    ///
    /// Business-level failures (unknown business, parser-reported API errors)
    /// ride inside the returned `Response`'s `error` field rather than as an
    /// `Err`; an `Err` here means the framework itself couldn't proceed
    /// (storage failure, non-serializable promise body).
    pub async fn send<M: Clone>(&self, mut request: Request<M>) -> Result<Response<M>, Error> {
        let Some(record) = self.business(&request.core.business_identifier).await else {
            let now = Utc::now();
            let response = RawResponse::failure(ApiError::configuration(&request.core.business_identifier), now, now);
            let typed = request.convert(response.clone());
            request.completion.complete(typed.clone());
            return Ok(typed);
        };

        record.wait_initialized().await;

        // Step A: queue (promise persistence + suspend gate).
        let mut promise_key = None;
        if request.core.promise.enable {
            let key = self.promise.add(&request.core).await?;
            record.interceptor.on_add_to_promise(&request.core).await;
            promise_key = Some(key);
        }

        if !record.interceptor.allow_request_pass_when_suspend(&request.core).await {
            record.wait_until_resumed().await;
        }

        let raw = loop {
            // Step B: request mutation hook.
            if let Err(err) = record.interceptor.on_request(&mut request.core).await {
                break self.internal_error_response(err);
            }

            // Step C: cache lookup. A hit is a "stash": it's returned immediately,
            // but the network call still fires in the background to keep the
            // cache warm, since a cache hit is a preliminary value, not a promise
            // that the origin agrees with it (§4.2, §8 scenario S1).
            let cache_key = request.core.fingerprint();
            if request.core.cache.enable && !request.core.cache.ignore_once {
                if let Some(cached) = self.cache.get(&cache_key).await {
                    record.interceptor.on_load_cache(&request.core, &cached).await;
                    request.core.cache.last_response = Some(cached.clone());
                    self.spawn_background_refresh(&record, request.core.clone(), cache_key);
                    break cached.mark_from_cache();
                }
            }

            // Step C': dispatch.
            let use_mock = request.core.mock.enable;
            let base_url = if use_mock {
                format!(
                    "{}{MOCK_PATH_PREFIX}/{}",
                    record.config.base_url,
                    request.core.mock.project_id.as_deref().unwrap_or_default()
                )
            } else {
                record.config.base_url.clone()
            };
            let transport = record.transport_for(use_mock);

            let transport_result = transport.request(&request.core, &base_url).await;

            // Step D: parse.
            let mut response = match transport_result {
                Ok(raw) => record.parser.handle_response(&request.core, raw).await,
                Err(err) => record.parser.handle_error(&request.core, err).await,
            };

            // Step E: response mutation hook.
            record.interceptor.on_response(&request.core, &mut response).await;

            // Step F: retry decision. The policy caps are unconditional stops;
            // only once the request is still within them is the interceptor
            // asked whether this particular response warrants a retry.
            let should_retry = !response.is_success()
                && match request.core.retry.kind {
                    RetryKind::Never => false,
                    RetryKind::Limit if request.core.retry.count >= request.core.retry.max => false,
                    RetryKind::Limit | RetryKind::Forever => {
                        record.interceptor.need_retry(&request.core, &response).await
                    }
                };

            if should_retry {
                request.core.retry.count += 1;
                let interval = request.core.retry_interval_ms(record.config.retry_interval_ms);
                tokio::time::sleep(std::time::Duration::from_millis(interval)).await;
                continue;
            }

            break response;
        };

        self.log_exchange(&record.config.identifier, &request.core, &raw);

        // Step G: finalize.
        if raw.is_success() && raw.data.is_some() && request.core.cache.enable {
            let cache_key = request.core.fingerprint();
            self.cache
                .put(cache_key, &raw, request.core.cache.use_lru, request.core.cache.duration)
                .await?;
            record.interceptor.on_save_cache(&request.core, &raw).await;
        }

        if raw.is_success() {
            if let Some(key) = &promise_key {
                self.promise.remove(key).await?;
                record.interceptor.on_remove_from_promise(&request.core).await;
            }
        }

        // An interceptor that takes ownership of completion (returns `true`) means
        // this request may legitimately never resolve through its own completion
        // slot; only `send`'s direct return still carries the response.
        let intercepted = record.interceptor.intercept_complete(&request.core, &raw).await;

        let typed = request.convert(raw);
        if !intercepted {
            request.completion.complete(typed.clone());
        }
        Ok(typed)
    }

    /// Issues the network call a cache hit skipped, so the cache stays warm.
    /// Errors are swallowed: this is best-effort refresh, not part of the
    /// caller-visible lifecycle.
    fn spawn_background_refresh(&self, record: &Arc<BusinessRecord>, core: RequestCore, cache_key: String) {
        let cache = self.cache.clone();
        let record = record.clone();
        tokio::spawn(async move {
            let use_mock = core.mock.enable;
            let base_url = if use_mock {
                format!(
                    "{}{MOCK_PATH_PREFIX}/{}",
                    record.config.base_url,
                    core.mock.project_id.as_deref().unwrap_or_default()
                )
            } else {
                record.config.base_url.clone()
            };
            let transport = record.transport_for(use_mock);
            if let Ok(raw) = transport.request(&core, &base_url).await {
                let response = record.parser.handle_response(&core, raw).await;
                if response.is_success() && response.data.is_some() {
                    let _ = cache.put(cache_key, &response, core.cache.use_lru, core.cache.duration).await;
                }
            }
        });
    }

    fn internal_error_response(&self, err: Error) -> RawResponse {
        let now = Utc::now();
        let api_err = ApiError::new(-1, err.to_string(), "The request could not be completed.");
        RawResponse::failure(api_err, now, now)
    }

    fn log_exchange(&self, business_identifier: &str, core: &RequestCore, response: &RawResponse) {
        logging::log_request(
            business_identifier,
            core.method.as_str(),
            &core.api_path,
            &core.headers,
            None,
            None,
        );
        logging::log_response(
            business_identifier,
            response.status_code,
            (response.response_time - response.request_time)
                .num_milliseconds()
                .max(0) as u128,
            response.data.as_ref().map(ToString::to_string).as_deref(),
            logging::get_max_body_len(),
            None,
        );
    }
}

async fn interceptor_init(record: &BusinessRecord, identifier: &str) -> Result<(), Error> {
    record.interceptor.initial_data(identifier).await?;
    record.interceptor.setup_transport(identifier).await
}

/// A convenience `RequestCore` constructor for the common GET case, not part of
/// the core lifecycle (§4.7 "Convenience constructors").
#[must_use]
pub fn get(business_identifier: impl Into<String>, api_path: impl Into<String>) -> RequestCore {
    RequestCore::new(business_identifier, Method::Get, api_path)
}

/// Convenience `RequestCore` constructor for a JSON POST body (§4.7).
#[must_use]
pub fn post_json(
    business_identifier: impl Into<String>,
    api_path: impl Into<String>,
    body: serde_json::Map<String, serde_json::Value>,
) -> RequestCore {
    let mut core = RequestCore::new(business_identifier, Method::Post, api_path);
    core.data = crate::request::Body::Json(body);
    core
}

/// Convenience `RequestCore` constructor for DELETE (§4.7).
#[must_use]
pub fn delete(business_identifier: impl Into<String>, api_path: impl Into<String>) -> RequestCore {
    RequestCore::new(business_identifier, Method::Delete, api_path)
}

/// Derives the durable promise key a given core would be stored under, without
/// actually persisting it. Exposed for callers that want to pre-compute it
/// (e.g. to look up an in-flight promise before deciding to resend).
#[must_use]
pub fn promise_key_for(core: &RequestCore) -> String {
    promise::promise_key(core)
}
