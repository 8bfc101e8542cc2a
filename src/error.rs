//! Error types for the proxy layer.

use std::fmt;

/// Result type for proxy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the proxy layer.
///
/// All proxy operations return `Result<T>` where `Result` is defined as
/// `std::result::Result<T, Error>`. Nothing in this layer is retried
/// automatically; every variant propagates to the caller.
#[derive(Debug, Clone)]
pub enum Error {
    /// Required endpoint or credential configuration is missing.
    ///
    /// Raised at first use, not retried. Typical cause: asking a session
    /// in local-record mode (no API base URL) for a remote manager.
    ConfigError(String),

    /// A field is absent from the resource schema, or the schema itself
    /// could not be fetched.
    ///
    /// Schema fetch failures are logged and swallowed at fetch time (the
    /// schema stays unset); they surface as this error on the next field
    /// access. The message distinguishes "no such field in the schema"
    /// from "field not defined in the fetched representation".
    SchemaError(String),

    /// `get()` matched zero records.
    NotFound(String),

    /// `get()` matched more than one record.
    MultipleObjects(String),

    /// The target namespace or schema of a relation could not be inferred
    /// from a resource URI's shape.
    ///
    /// Fatal for that access; reported with the offending field or URI.
    RelationError(String),

    /// Non-2xx HTTP status on any request.
    ///
    /// Carries the URL, method and status code. Never silently retried.
    TransportError {
        /// Request URL
        url: String,
        /// HTTP method
        method: String,
        /// Response status code (0 when the transport failed before a
        /// status was available)
        status: u16,
    },

    /// Disallowed filter combination, raised before any network call.
    ///
    /// Example: an explicit `id`+`in` filter on a to-many relation
    /// manager, whose membership query owns that channel.
    UnsupportedFilter(String),

    /// Serialization failed when encoding a request body or cache payload.
    SerializationError(String),

    /// Deserialization failed when decoding a response or cache payload.
    ///
    /// **Recovery:** for cache payloads, the entry should be evicted and
    /// re-fetched.
    DeserializationError(String),

    /// Cache backend error (Redis, etc).
    ///
    /// The cache backend is unavailable or returned an error.
    BackendError(String),

    /// Generic error with custom message.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::SchemaError(msg) => write!(f, "Schema error: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::MultipleObjects(msg) => {
                write!(f, "Multiple objects returned: {}", msg)
            }
            Error::RelationError(msg) => write!(f, "Relation error: {}", msg),
            Error::TransportError {
                url,
                method,
                status,
            } => {
                write!(
                    f,
                    "Failed to fetch resource ({}, {} {})",
                    url, method, status
                )
            }
            Error::UnsupportedFilter(msg) => {
                write!(f, "Unsupported filter: {}", msg)
            }
            Error::SerializationError(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            Error::DeserializationError(msg) => {
                write!(f, "Deserialization error: {}", msg)
            }
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::BackendError(e.to_string())
        } else if e.is_syntax() || e.is_data() || e.is_eof() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::ConfigError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::BackendError(format!("Redis error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::SchemaError("Test".to_string());
        assert_eq!(err.to_string(), "Schema error: Test");
    }

    #[test]
    fn test_transport_error_display() {
        let err = Error::TransportError {
            url: "http://api.example.com/v1/item/1/".to_string(),
            method: "GET".to_string(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "Failed to fetch resource (http://api.example.com/v1/item/1/, GET 404)"
        );
    }

    #[test]
    fn test_error_from_string() {
        let err: Error = "test error".into();
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = err.into();
        assert!(matches!(err, Error::DeserializationError(_)));
    }
}
