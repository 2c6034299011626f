//! Request and response logging with automatic secret redaction.
//!
//! Every business's outgoing request and incoming response is logged through
//! here rather than ad hoc `tracing` calls scattered through `manager.rs`, so
//! that redaction is applied exactly once and consistently.

use crate::constants::{is_auth_header, MIN_SECRET_LENGTH_FOR_BODY_REDACTION};
use tracing::{debug, info, trace};

/// Context of extra, caller-supplied secret values to redact from logged
/// bodies on top of the static header rules (e.g. a token embedded in a
/// business's response body rather than carried in a header).
#[derive(Debug, Default, Clone)]
pub struct SecretContext {
    secrets: Vec<String>,
}

impl SecretContext {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_values(secrets: impl IntoIterator<Item = String>) -> Self {
        let mut secrets: Vec<String> = secrets.into_iter().filter(|s| !s.is_empty()).collect();
        secrets.sort();
        secrets.dedup();
        Self { secrets }
    }

    #[must_use]
    pub fn is_secret(&self, value: &str) -> bool {
        self.secrets.iter().any(|s| s == value)
    }

    #[must_use]
    pub fn redact_secrets_in_text(&self, text: &str) -> String {
        let mut result = text.to_string();
        for secret in &self.secrets {
            if secret.len() >= MIN_SECRET_LENGTH_FOR_BODY_REDACTION {
                result = result.replace(secret, "[REDACTED]");
            }
        }
        result
    }

    #[must_use]
    pub const fn has_secrets(&self) -> bool {
        !self.secrets.is_empty()
    }
}

/// Redacts a header value, honoring both the static auth-header rules and any
/// dynamic secrets in `secret_ctx`.
#[must_use]
fn redact_header_value(header_name: &str, value: &str, secret_ctx: Option<&SecretContext>) -> String {
    if is_auth_header(header_name) {
        return "[REDACTED]".to_string();
    }
    if secret_ctx.is_some_and(|ctx| ctx.is_secret(value)) {
        return "[REDACTED]".to_string();
    }
    value.to_string()
}

/// Logs an outgoing request for `business_identifier` at info/debug/trace levels.
pub fn log_request(
    business_identifier: &str,
    method: &str,
    url: &str,
    headers: &std::collections::HashMap<String, String>,
    body: Option<&str>,
    secret_ctx: Option<&SecretContext>,
) {
    info!(target: "linecross", business = business_identifier, "→ {} {}", method, url);

    debug!(target: "linecross", business = business_identifier, "request headers:");
    for (name, value) in headers {
        debug!(target: "linecross", "  {}: {}", name, redact_header_value(name, value, secret_ctx));
    }

    if let Some(body) = body {
        let redacted = secret_ctx.map_or_else(|| body.to_string(), |ctx| ctx.redact_secrets_in_text(body));
        trace!(target: "linecross", "request body: {}", redacted);
    }
}

/// Logs a response for `business_identifier`, truncating the body at `max_body_len`.
pub fn log_response(
    business_identifier: &str,
    status: Option<u16>,
    duration_ms: u128,
    body: Option<&str>,
    max_body_len: usize,
    secret_ctx: Option<&SecretContext>,
) {
    info!(
        target: "linecross",
        business = business_identifier,
        "← {} ({}ms)",
        status.map_or_else(|| "no-response".to_string(), |s| s.to_string()),
        duration_ms
    );

    let Some(body) = body else { return };
    let redacted = secret_ctx.map_or_else(|| body.to_string(), |ctx| ctx.redact_secrets_in_text(body));
    if redacted.len() > max_body_len {
        trace!(target: "linecross", "response body: {} (truncated at {max_body_len} chars)", &redacted[..max_body_len]);
    } else {
        trace!(target: "linecross", "response body: {}", redacted);
    }
}

/// Maximum response-body length to log, from `LINECROSS_LOG_MAX_BODY`. Defaults to 1000.
#[must_use]
pub fn get_max_body_len() -> usize {
    std::env::var("LINECROSS_LOG_MAX_BODY")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1000)
}
