//! The interceptor contract: the business-specific hooks threaded through every
//! stage of a request's lifecycle (§4.5, §2 GLOSSARY "Interceptor").
//!
//! Every method has a default no-op (or permissive) implementation so a business
//! can override only the stages it cares about.

use crate::error::Error;
use crate::request::RequestCore;
use crate::response::RawResponse;
use async_trait::async_trait;

#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Runs once, the first time a business is added, before any request is sent.
    /// Failures here keep the business's init gate from ever opening (§4.4).
    async fn initial_data(&self, _business_identifier: &str) -> Result<(), Error> {
        Ok(())
    }

    /// One-time transport configuration for this business (default headers, base
    /// options). Runs alongside `initial_data`, not per request.
    async fn setup_transport(&self, _business_identifier: &str) -> Result<(), Error> {
        Ok(())
    }

    /// Whether `request` may proceed even while its business is suspended (§4.5
    /// "suspend/resume flow control"). Most requests should wait; a small minority
    /// (token refresh, health checks) may need to pass through.
    async fn allow_request_pass_when_suspend(&self, _request: &RequestCore) -> bool {
        false
    }

    /// Runs at lifecycle step A/B, immediately before the request is dispatched.
    /// May mutate headers, query params, or body (e.g. to attach an auth token).
    async fn on_request(&self, _request: &mut RequestCore) -> Result<(), Error> {
        Ok(())
    }

    /// Notified when a promise-enabled request is queued durably (step A).
    async fn on_add_to_promise(&self, _request: &RequestCore) {}

    /// Notified when a request is served from the cache rather than the network,
    /// with the cached response that will be returned (§4.2).
    async fn on_load_cache(&self, _request: &RequestCore, _cached: &RawResponse) {}

    /// Runs at lifecycle step D/E, after the parser has produced a response.
    /// May mutate the response (e.g. to normalize an error message) before it's
    /// considered for caching, retry, or completion.
    async fn on_response(&self, _request: &RequestCore, _response: &mut RawResponse) {}

    /// Notified after a successful response has been written to the cache.
    async fn on_save_cache(&self, _request: &RequestCore, _response: &RawResponse) {}

    /// Notified once a promise-enabled request's durable record is removed,
    /// whether because it completed or was cancelled.
    async fn on_remove_from_promise(&self, _request: &RequestCore) {}

    /// Whether this response should be retried. Only consulted once the
    /// request's own [`crate::request::RetryConfig`] has already allowed
    /// another attempt — the policy's caps are unconditional stops, and this
    /// decides whether to actually use a remaining attempt.
    async fn need_retry(&self, _request: &RequestCore, _response: &RawResponse) -> bool {
        false
    }

    /// Whether this response should be gated: held back from completing the
    /// caller's future until some external condition resolves (§4.5 step G,
    /// "Intercepted" lifecycle state). Returning `true` means the interceptor
    /// takes ownership of eventually calling completion itself.
    async fn intercept_complete(&self, _request: &RequestCore, _response: &RawResponse) -> bool {
        false
    }

    /// Runs when [`crate::manager::Manager::clean_data`] is called for this business.
    async fn on_clean_data(&self, _business_identifier: &str) {}
}
