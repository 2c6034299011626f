//! The response envelope produced at the end of a request's lifecycle (§4.6, §7).

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A response whose body has been parsed by the transport layer but not yet
/// converted into a business's model type. Interceptors and parsers only ever
/// see this shape; the model conversion happens once, as the final lifecycle
/// step, inside [`crate::manager::Manager`].
pub type RawResponse = Response<()>;

/// The result of sending a [`crate::request::Request<M>`].
///
/// Exactly one of `model` or `error` is meaningful for a given response:
/// a successful response carries `model` and leaves `error` as `None`; a
/// failed one carries `error` and leaves `model` as `None`. Both can be
/// absent for an in-flight or cached-miss intermediate state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response<M> {
    pub status_code: Option<u16>,
    pub headers: HashMap<String, String>,
    /// The raw decoded body, prior to the business's model conversion.
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<M>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    /// True when this response was served from the cache rather than the network (§4.2).
    pub from_cache: bool,
    pub request_time: DateTime<Utc>,
    pub response_time: DateTime<Utc>,
}

impl<M> Response<M> {
    #[must_use]
    pub fn success(
        status_code: u16,
        headers: HashMap<String, String>,
        data: Option<serde_json::Value>,
        model: M,
        request_time: DateTime<Utc>,
        response_time: DateTime<Utc>,
    ) -> Self {
        Self {
            status_code: Some(status_code),
            headers,
            data,
            model: Some(model),
            error: None,
            from_cache: false,
            request_time,
            response_time,
        }
    }

    #[must_use]
    pub fn failure(
        error: ApiError,
        request_time: DateTime<Utc>,
        response_time: DateTime<Utc>,
    ) -> Self {
        Self {
            status_code: None,
            headers: HashMap::new(),
            data: None,
            model: None,
            error: Some(error),
            from_cache: false,
            request_time,
            response_time,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    #[must_use]
    pub fn mark_from_cache(mut self) -> Self {
        self.from_cache = true;
        self
    }

    /// Reinterprets the model payload, used by [`crate::manager::Manager`] to convert
    /// a [`RawResponse`] into the caller's typed `Response<M>` via the request's converter.
    pub fn with_model<N>(self, model: Option<N>) -> Response<N> {
        Response {
            status_code: self.status_code,
            headers: self.headers,
            data: self.data,
            model,
            error: self.error,
            from_cache: self.from_cache,
            request_time: self.request_time,
            response_time: self.response_time,
        }
    }
}
