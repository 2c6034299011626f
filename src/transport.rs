//! The transport contract: the seam between the manager and whatever actually
//! moves bytes over the wire (§4.5 step C, §2 GLOSSARY "Transport").

use crate::error::Error;
use crate::request::RequestCore;
use async_trait::async_trait;
use std::collections::HashMap;

/// The raw result of a transport call, before parsing.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub data: Option<serde_json::Value>,
    pub raw: Vec<u8>,
}

/// Sends a single request over the wire and returns its raw response.
///
/// Implementations observe `request.cancel_token` and should abort the
/// in-flight call (returning an error) once it fires. A business may register
/// two transports: the real one and an optional mock one used when
/// `request.mock.enable` is set (§4.4, §2 GLOSSARY "Mock transport").
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: &RequestCore, base_url: &str) -> Result<RawResponse, Error>;
}
