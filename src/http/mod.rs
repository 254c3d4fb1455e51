//! HTTP API client with retry logic and error handling.

mod client;
mod request;
mod retry;
mod sleep;
mod state;
mod transport;

pub use client::{ApiClient, HEALTH_CHECK_TIMEOUT};
pub use request::{Method, RequestSpec, Response};
pub use retry::{AttemptCounters, AttemptOutcome, RetryDecision, RetryPolicy, RetryReason};
pub use sleep::{Sleeper, TokioSleeper};
pub use state::{
    ClientState, ClientStatus, DEFAULT_MAX_RATE_LIMIT_RETRIES, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT,
};
pub use transport::{PreparedRequest, ReqwestTransport, Transport, TransportError};

#[cfg(test)]
pub use sleep::MockSleeper;
#[cfg(test)]
pub use transport::MockTransport;
