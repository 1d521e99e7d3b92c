//! Client error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Failures from the
//! transport propagate to the caller unmodified — there is no retry, backoff,
//! or partial-result recovery layer.

use thiserror::Error;

/// Errors that can occur during a chat exchange.
#[derive(Debug, Error)]
pub enum ChatError {
    /// TCP/HTTP connection to the completion endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    Connection {
        endpoint: String,
        reason: String,
    },

    /// Non-2xx HTTP response from the completion endpoint.
    #[error("HTTP {status}: {body}")]
    Http {
        status: u16,
        body: String,
    },

    /// SSE stream parsing or chunk-level error.
    #[error("stream error: {reason}")]
    Stream {
        reason: String,
    },

    /// Configuration construction or validation error.
    #[error("config error: {reason}")]
    Config {
        reason: String,
    },
}
