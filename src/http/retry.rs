//! Retry decisions for a single attempt.
//!
//! Rules, in order:
//! 1. transport failure: retry while counted retries remain, else fail with
//!    the cause (malformed requests fail at once);
//! 2. 429: retry after `Retry-After` seconds (or the base delay), tracked
//!    against its own cap rather than `max_retries`;
//! 3. 5xx: retry while counted retries remain, else return the response;
//! 4. anything else: return the response.

use std::fmt;
use std::time::Duration;

use super::request::Response;
use super::state::ClientState;
use super::transport::TransportError;

/// What one attempt produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Any response that is final on its own (2xx, 3xx, 4xx other than 429).
    Success(Response),
    RetryableServerError(Response),
    RateLimited {
        response: Response,
        retry_after: Option<Duration>,
    },
    TransientNetworkFailure(TransportError),
    FatalFailure(TransportError),
}

impl AttemptOutcome {
    pub fn classify(result: Result<Response, TransportError>) -> Self {
        match result {
            Ok(response) if response.status() == 429 => {
                let retry_after = response.retry_after();
                AttemptOutcome::RateLimited {
                    response,
                    retry_after,
                }
            }
            Ok(response) if response.status() >= 500 => {
                AttemptOutcome::RetryableServerError(response)
            }
            Ok(response) => AttemptOutcome::Success(response),
            Err(e) if e.is_transient() => AttemptOutcome::TransientNetworkFailure(e),
            Err(e) => AttemptOutcome::FatalFailure(e),
        }
    }
}

/// Why another attempt is scheduled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryReason {
    RateLimited,
    ServerError(u16),
    Network(TransportError),
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryReason::RateLimited => write!(f, "Rate limited"),
            RetryReason::ServerError(status) => write!(f, "Server error {status}"),
            RetryReason::Network(cause) => write!(f, "Request failed ({cause})"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Stop and hand the response to the caller, whatever its status.
    Return(Response),
    Retry { delay: Duration, reason: RetryReason },
    /// Stop with the underlying transport failure.
    Fail(TransportError),
}

/// Retries consumed so far in one logical request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AttemptCounters {
    /// Retries for network and server errors, bounded by `max_retries`.
    pub retries: u32,
    /// Retries for 429 responses, bounded by `max_rate_limit_retries`.
    pub rate_limit_retries: u32,
}

impl AttemptCounters {
    pub fn record(&mut self, reason: &RetryReason) {
        match reason {
            RetryReason::RateLimited => self.rate_limit_retries += 1,
            RetryReason::ServerError(_) | RetryReason::Network(_) => self.retries += 1,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.retries + self.rate_limit_retries + 1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub max_rate_limit_retries: u32,
}

impl RetryPolicy {
    pub fn from_state(state: &ClientState) -> Self {
        Self {
            max_retries: state.max_retries(),
            retry_delay: state.retry_delay(),
            max_rate_limit_retries: state.max_rate_limit_retries(),
        }
    }

    /// Linear backoff: `retry_delay × attempt_number` (1-based).
    pub fn backoff(&self, attempt_number: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt_number)
    }

    pub fn decide(&self, outcome: AttemptOutcome, counters: &AttemptCounters) -> RetryDecision {
        let retries_left = counters.retries < self.max_retries;
        let backoff = self.backoff(counters.retries + 1);

        match outcome {
            AttemptOutcome::TransientNetworkFailure(cause) if retries_left => RetryDecision::Retry {
                delay: backoff,
                reason: RetryReason::Network(cause),
            },
            AttemptOutcome::TransientNetworkFailure(cause) | AttemptOutcome::FatalFailure(cause) => {
                RetryDecision::Fail(cause)
            }
            AttemptOutcome::RateLimited {
                response,
                retry_after,
            } => {
                if counters.rate_limit_retries < self.max_rate_limit_retries {
                    RetryDecision::Retry {
                        delay: retry_after.unwrap_or(self.retry_delay),
                        reason: RetryReason::RateLimited,
                    }
                } else {
                    RetryDecision::Return(response)
                }
            }
            AttemptOutcome::RetryableServerError(response) if retries_left => {
                RetryDecision::Retry {
                    delay: backoff,
                    reason: RetryReason::ServerError(response.status()),
                }
            }
            AttemptOutcome::RetryableServerError(response) | AttemptOutcome::Success(response) => {
                RetryDecision::Return(response)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            retry_delay: Duration::from_secs(1),
            max_rate_limit_retries: 2,
        }
    }

    fn counters(retries: u32, rate_limit_retries: u32) -> AttemptCounters {
        AttemptCounters {
            retries,
            rate_limit_retries,
        }
    }

    #[test]
    fn test_classify() {
        assert!(matches!(
            AttemptOutcome::classify(Ok(Response::new(200, ""))),
            AttemptOutcome::Success(_)
        ));
        assert!(matches!(
            AttemptOutcome::classify(Ok(Response::new(404, ""))),
            AttemptOutcome::Success(_)
        ));
        assert!(matches!(
            AttemptOutcome::classify(Ok(Response::new(502, ""))),
            AttemptOutcome::RetryableServerError(_)
        ));
        assert_eq!(
            AttemptOutcome::classify(Ok(Response::new(429, "").with_header("Retry-After", "4"))),
            AttemptOutcome::RateLimited {
                response: Response::new(429, "").with_header("Retry-After", "4"),
                retry_after: Some(Duration::from_secs(4)),
            }
        );
        assert!(matches!(
            AttemptOutcome::classify(Err(TransportError::Timeout("t".into()))),
            AttemptOutcome::TransientNetworkFailure(_)
        ));
        assert!(matches!(
            AttemptOutcome::classify(Err(TransportError::Invalid("bad".into()))),
            AttemptOutcome::FatalFailure(_)
        ));
    }

    #[test]
    fn test_success_and_client_errors_return_immediately() {
        for status in [200, 201, 204, 301, 400, 401, 404] {
            let response = Response::new(status, "body");
            let decision = policy(3).decide(
                AttemptOutcome::classify(Ok(response.clone())),
                &counters(0, 0),
            );
            assert_eq!(decision, RetryDecision::Return(response));
        }
    }

    #[test]
    fn test_network_failure_backoff_is_linear() {
        let cause = TransportError::Connect("refused".into());

        for (retries, expected) in [(0, 1), (1, 2), (2, 3)] {
            let decision = policy(3).decide(
                AttemptOutcome::TransientNetworkFailure(cause.clone()),
                &counters(retries, 0),
            );
            assert_eq!(
                decision,
                RetryDecision::Retry {
                    delay: Duration::from_secs(expected),
                    reason: RetryReason::Network(cause.clone()),
                }
            );
        }
    }

    #[test]
    fn test_network_failure_exhausted_surfaces_cause() {
        let cause = TransportError::Timeout("deadline".into());
        let decision = policy(2).decide(
            AttemptOutcome::TransientNetworkFailure(cause.clone()),
            &counters(2, 0),
        );
        assert_eq!(decision, RetryDecision::Fail(cause));
    }

    #[test]
    fn test_fatal_failure_never_retries() {
        let cause = TransportError::Invalid("bad header".into());
        let decision = policy(5).decide(AttemptOutcome::FatalFailure(cause.clone()), &counters(0, 0));
        assert_eq!(decision, RetryDecision::Fail(cause));
    }

    #[test]
    fn test_server_error_retries_then_returns_response() {
        let response = Response::new(503, "unavailable");

        let decision = policy(1).decide(
            AttemptOutcome::RetryableServerError(response.clone()),
            &counters(0, 0),
        );
        assert_eq!(
            decision,
            RetryDecision::Retry {
                delay: Duration::from_secs(1),
                reason: RetryReason::ServerError(503),
            }
        );

        let decision = policy(1).decide(
            AttemptOutcome::RetryableServerError(response.clone()),
            &counters(1, 0),
        );
        assert_eq!(decision, RetryDecision::Return(response));
    }

    #[test]
    fn test_rate_limit_honors_retry_after_and_ignores_max_retries() {
        let response = Response::new(429, "");

        // max_retries exhausted, rate-limit budget still available
        let decision = policy(0).decide(
            AttemptOutcome::RateLimited {
                response: response.clone(),
                retry_after: Some(Duration::from_secs(9)),
            },
            &counters(0, 0),
        );
        assert_eq!(
            decision,
            RetryDecision::Retry {
                delay: Duration::from_secs(9),
                reason: RetryReason::RateLimited,
            }
        );

        let decision = policy(0).decide(
            AttemptOutcome::RateLimited {
                response,
                retry_after: None,
            },
            &counters(0, 1),
        );
        assert_eq!(
            decision,
            RetryDecision::Retry {
                delay: Duration::from_secs(1),
                reason: RetryReason::RateLimited,
            }
        );
    }

    #[test]
    fn test_rate_limit_cap_returns_response() {
        let response = Response::new(429, "slow down");
        let decision = policy(3).decide(
            AttemptOutcome::RateLimited {
                response: response.clone(),
                retry_after: None,
            },
            &counters(0, 2),
        );
        assert_eq!(decision, RetryDecision::Return(response));
    }

    #[test]
    fn test_counters_record() {
        let mut c = AttemptCounters::default();
        assert_eq!(c.attempts(), 1);

        c.record(&RetryReason::RateLimited);
        c.record(&RetryReason::ServerError(500));
        c.record(&RetryReason::Network(TransportError::Network("x".into())));

        assert_eq!(c, counters(2, 1));
        assert_eq!(c.attempts(), 4);
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(RetryReason::ServerError(502).to_string(), "Server error 502");
        assert_eq!(RetryReason::RateLimited.to_string(), "Rate limited");
        assert!(
            RetryReason::Network(TransportError::Connect("refused".into()))
                .to_string()
                .contains("refused")
        );
    }
}
