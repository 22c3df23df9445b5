use serde_json::Value;
use thiserror::Error;

/// Every failure an orchestrated request can end in.
///
/// Caller-input errors (`MissingQuery`, `MissingApiKey`, `EmptyQueue`,
/// `InvalidParameter`) are raised before anything is sent; the rest describe
/// what happened on the wire.
#[derive(Debug, Error)]
pub enum Error {
    #[error("No query was supplied for the request, make sure to supply a query.")]
    MissingQuery,

    #[error("An API key must be set via .api_key(...) prior to making any requests.")]
    MissingApiKey,

    #[error(
        "No features were queued up, make sure to queue up features prior to calling .request(...)"
    )]
    EmptyQueue,

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Received an error when trying to connect to {url}: {message}")]
    Transport {
        url: String,
        /// HTTP status, absent when the connection itself failed.
        status: Option<u16>,
        message: String,
    },

    /// A 200 response whose body carried `response.error`.
    #[error("An error occurred while communicating with the Weather Underground API: {payload}")]
    Provider { url: String, payload: Value },

    #[error("Rate limiter refused the request: {0}")]
    RateLimit(String),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// The provider's own error payload, for `Provider` failures.
    pub fn provider_payload(&self) -> Option<&Value> {
        match self {
            Error::Provider { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

/// The single result shape handed back by every request.
pub type Outcome = Result<Value, Error>;
