//! Error types for the typograf client.
//!
//! # Design
//! `TypografError` is the failure half of `OperationOutcome`: every way a call
//! can go wrong is resolved into one of its variants and delivered to the
//! completion callback. `ClientError` covers construction only (missing
//! resources, bad patterns, no runtime, HTTP client setup) and is returned directly.

use thiserror::Error;

/// Failures delivered through `OperationOutcome::Failure`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypografError {
    /// The transport failed before an HTTP response was available.
    #[error("response error: {0}")]
    Response(String),

    /// Non-2xx status or an empty body.
    #[error("typograf service unavailable")]
    ServiceUnavailable,

    /// The body could not be decoded or did not contain the result text.
    #[error("invalid response data")]
    InvalidResponseData,
}

/// Errors raised while constructing a `TypografClient`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("missing resource string {key:?} in table {table:?}")]
    MissingResource { table: String, key: String },

    #[error("invalid resource table {table:?}: {source}")]
    InvalidResourceTable {
        table: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid response pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("no Tokio runtime to run requests on")]
    NoRuntime,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
