//! Centralized string/numeric constants used across the crate.
//!
//! Keeping these in one place avoids magic values scattered through the
//! cache/promise/manager modules and matches their use in the DB schema in
//! SPEC_FULL.md §6.

// HTTP Headers
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_PROXY_AUTHORIZATION: &str = "Proxy-Authorization";
pub const HEADER_COOKIE: &str = "Cookie";
pub const HEADER_X_API_KEY: &str = "X-Api-Key";
pub const HEADER_X_AUTH_TOKEN: &str = "X-Auth-Token";

// Header prefixes for authentication detection (used by logging redaction)
pub const HEADER_PREFIX_X_AUTH: &str = "x-auth-";
pub const HEADER_PREFIX_X_API: &str = "x-api-";

// Content Types
pub const CONTENT_TYPE_JSON: &str = "application/json";

// Mock path prefix, per §3 `mock.effectivePath`
pub const MOCK_PATH_PREFIX: &str = "/mock";

// Cache store defaults (§4.2)
pub const DEFAULT_LRU_CAPACITY: usize = 100;
pub const CACHE_TABLE: &str = "cache";
pub const PROMISE_TABLE: &str = "promise";

// Both DBs carry this schema version (§6); upgrade hooks are reserved no-ops.
pub const STORE_SCHEMA_VERSION: i64 = 1000;

/// Minimum length for a secret-looking value to be redacted from a logged body.
/// Shorter values risk false positives on legitimate short strings.
pub const MIN_SECRET_LENGTH_FOR_BODY_REDACTION: usize = 8;

/// Checks whether a header name is conventionally used to carry credentials,
/// and therefore should never be written to a log line or a cached/persisted
/// request snapshot.
#[must_use]
pub fn is_auth_header(header_name: &str) -> bool {
    let lower = header_name.to_lowercase();
    lower == HEADER_AUTHORIZATION.to_lowercase()
        || lower == HEADER_PROXY_AUTHORIZATION.to_lowercase()
        || lower == HEADER_COOKIE.to_lowercase()
        || lower == HEADER_X_API_KEY.to_lowercase()
        || lower == HEADER_X_AUTH_TOKEN.to_lowercase()
        || lower.starts_with(HEADER_PREFIX_X_AUTH)
        || lower.starts_with(HEADER_PREFIX_X_API)
}
