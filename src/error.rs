//! Error taxonomy shared by the configuration loader and the API client.

use crate::http::TransportError;

/// Error type returned by the library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A settings source could not be used (unreadable file, invalid JSON,
    /// malformed value). Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request could not be completed: either a fatal transport failure,
    /// or transient failures that outlasted the retry budget.
    #[error("{method} {url} failed after {attempts} attempt(s): {source}")]
    RequestFailed {
        method: String,
        url: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// Non-success HTTP status, only produced by explicit status checks.
    #[error("http error {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body is not valid JSON where JSON was requested.
    #[error("invalid JSON response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Error {
    /// Returns the transport cause for failed requests.
    pub fn transport_cause(&self) -> Option<&TransportError> {
        match self {
            Error::RequestFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
