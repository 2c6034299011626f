//! The parser contract: turns a transport-level response (or transport error)
//! into the framework's [`RawResponse`] envelope (§4.5 step D, §2 GLOSSARY "Parser").

use crate::error::{ApiError, Error};
use crate::request::RequestCore;
use crate::response::RawResponse;
use crate::transport;
use async_trait::async_trait;
use chrono::Utc;

/// Interprets a business's wire format: status-code conventions, error envelopes,
/// pagination wrappers, whatever that business's API does that a generic transport
/// can't know about.
#[async_trait]
pub trait Parser: Send + Sync {
    async fn handle_response(&self, request: &RequestCore, raw: transport::RawResponse) -> RawResponse;
    async fn handle_error(&self, request: &RequestCore, error: Error) -> RawResponse;
}

/// A parser that treats any 2xx status as success and anything else as an
/// [`ApiError`] built from the status code, with no business-specific envelope.
pub struct DefaultParser;

#[async_trait]
impl Parser for DefaultParser {
    async fn handle_response(&self, _request: &RequestCore, raw: transport::RawResponse) -> RawResponse {
        let now = Utc::now();
        if (200..300).contains(&raw.status_code) {
            RawResponse::success(raw.status_code, raw.headers, raw.data, (), now, now)
        } else {
            let err = ApiError::new(
                i64::from(raw.status_code),
                format!("HTTP {}", raw.status_code),
                format!("Request failed with status {}", raw.status_code),
            )
            .with_data(raw.data.clone().unwrap_or(serde_json::Value::Null));
            RawResponse::failure(err, now, now)
        }
    }

    async fn handle_error(&self, _request: &RequestCore, error: Error) -> RawResponse {
        let now = Utc::now();
        let err = ApiError::new(-1, error.to_string(), "The request could not be completed.")
            .with_origin_error(format!("{error:?}"));
        RawResponse::failure(err, now, now)
    }
}
