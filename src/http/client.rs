//! API client: owns the settings and drives the attempt loop.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use super::request::{Method, RequestSpec, Response};
use super::retry::{AttemptCounters, AttemptOutcome, RetryDecision, RetryPolicy};
use super::sleep::{Sleeper, TokioSleeper};
use super::state::{ClientState, ClientStatus};
use super::transport::{PreparedRequest, ReqwestTransport, Transport, TransportError};
use crate::component::Component;
use crate::config::Config;
use crate::logging::Logger;
use crate::{Error, Result};

/// Timeout of the `/health` probe made by [`Component::initialize`].
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP API client with bounded retry.
///
/// Responses with any HTTP status are returned as `Ok`; only transport
/// failures surface as errors. Use [`Response::error_for_status`] or the
/// `*_json` helpers to treat error statuses as failures.
pub struct ApiClient<T: Transport = ReqwestTransport, S: Sleeper = TokioSleeper> {
    state: ClientState,
    transport: Option<T>,
    sleeper: S,
    logger: Logger,
    config: Config,
}

impl ApiClient {
    /// Creates a client backed by reqwest and the tokio timer.
    pub fn new(state: ClientState, logger: Logger) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_parts(
            state,
            ReqwestTransport::new(client),
            TokioSleeper,
            logger,
        ))
    }
}

impl<T: Transport, S: Sleeper> ApiClient<T, S> {
    pub fn with_parts(state: ClientState, transport: T, sleeper: S, logger: Logger) -> Self {
        logger.info(format!("Initialized {}", logger.component()));
        Self {
            state,
            transport: Some(transport),
            sleeper,
            logger,
            config: Config::new(),
        }
    }

    /// Attaches the settings the client was built from.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn status(&self) -> ClientStatus {
        self.state.status()
    }

    pub fn set_auth_token(&mut self, token: impl Into<String>) {
        self.state = self.state.clone().with_auth_token(token);
        self.logger.info("API key updated");
    }

    pub fn set_base_url(&mut self, base_url: &str) {
        self.state = self.state.clone().with_base_url(base_url);
        self.logger
            .info(format!("Base URL updated to: {}", self.state.base_url()));
    }

    /// Executes `spec`, retrying per [`RetryPolicy`].
    #[tracing::instrument(skip(self, spec), fields(method = %spec.method(), path = %spec.path()))]
    pub async fn request(&self, spec: &RequestSpec) -> Result<Response> {
        if !self.state.resolves(spec.path()) {
            return Err(Error::Configuration(format!(
                "no base URL configured for relative path '{}'",
                spec.path()
            )));
        }

        let prepared = self.prepare(spec, self.state.timeout());

        let Some(transport) = self.transport.as_ref() else {
            return Err(Error::RequestFailed {
                method: prepared.method.to_string(),
                url: prepared.url,
                attempts: 0,
                source: TransportError::Invalid("client has been closed".to_string()),
            });
        };

        let policy = RetryPolicy::from_state(&self.state);
        let mut counters = AttemptCounters::default();

        loop {
            let attempt = counters.attempts();
            self.logger.debug(format!(
                "Making {} request to {} (attempt {})",
                prepared.method, prepared.url, attempt
            ));

            let result = transport.send(&prepared).await;
            if let Ok(response) = &result {
                self.logger
                    .debug(format!("Response status: {}", response.status()));
            }

            match policy.decide(AttemptOutcome::classify(result), &counters) {
                RetryDecision::Return(response) => return Ok(response),
                RetryDecision::Retry { delay, reason } => {
                    self.logger.warn(format!(
                        "{reason} on attempt {attempt}, retrying in {:.1}s",
                        delay.as_secs_f64()
                    ));
                    counters.record(&reason);
                    self.sleeper.sleep(delay).await;
                }
                RetryDecision::Fail(cause) => {
                    self.logger.error(format!(
                        "Request failed after {attempt} attempt(s): {cause}"
                    ));
                    return Err(Error::RequestFailed {
                        method: prepared.method.to_string(),
                        url: prepared.url,
                        attempts: attempt,
                        source: cause,
                    });
                }
            }
        }
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        self.request(&RequestSpec::new(Method::Get, path)).await
    }

    pub async fn post(&self, path: &str, body: Option<Value>) -> Result<Response> {
        self.request(&with_optional_body(Method::Post, path, body))
            .await
    }

    pub async fn put(&self, path: &str, body: Option<Value>) -> Result<Response> {
        self.request(&with_optional_body(Method::Put, path, body))
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<Response> {
        self.request(&RequestSpec::new(Method::Delete, path)).await
    }

    pub async fn patch(&self, path: &str, body: Option<Value>) -> Result<Response> {
        self.request(&with_optional_body(Method::Patch, path, body))
            .await
    }

    /// GET that fails on error statuses and parses the body as JSON.
    pub async fn get_json<D: DeserializeOwned>(&self, path: &str) -> Result<D> {
        self.get(path).await?.error_for_status()?.json()
    }

    /// POST that fails on error statuses and parses the body as JSON.
    pub async fn post_json<D: DeserializeOwned>(&self, path: &str, body: Option<Value>) -> Result<D> {
        self.post(path, body).await?.error_for_status()?.json()
    }

    fn prepare(&self, spec: &RequestSpec, timeout: Duration) -> PreparedRequest {
        PreparedRequest {
            method: spec.method(),
            url: self.state.url_for(spec.path()),
            query: spec
                .query()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            headers: self.state.merged_headers(spec),
            body: spec.body().cloned(),
            timeout,
        }
    }
}

fn with_optional_body(method: Method, path: &str, body: Option<Value>) -> RequestSpec {
    let spec = RequestSpec::new(method, path);
    match body {
        Some(body) => spec.with_body(body),
        None => spec,
    }
}

#[async_trait]
impl<T: Transport, S: Sleeper> Component for ApiClient<T, S> {
    fn name(&self) -> &str {
        self.logger.component()
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Probes `<base>/health` once, without retries.
    async fn initialize(&mut self) -> Result<bool> {
        if self.state.base_url().is_empty() {
            self.logger.info("API client initialized (no base URL)");
            return Ok(true);
        }

        let Some(transport) = self.transport.as_ref() else {
            self.logger
                .error("Failed to initialize API client: client has been closed");
            return Ok(false);
        };

        let probe = self.prepare(&RequestSpec::new(Method::Get, "health"), HEALTH_CHECK_TIMEOUT);
        match transport.send(&probe).await {
            Ok(response) if response.status() == 200 => {
                self.logger.info("API client initialized successfully");
                Ok(true)
            }
            Ok(response) => {
                self.logger.warn(format!(
                    "Health check failed with status {}",
                    response.status()
                ));
                Ok(true)
            }
            Err(e) => {
                self.logger
                    .error(format!("Failed to initialize API client: {e}"));
                Ok(false)
            }
        }
    }

    async fn cleanup(&mut self) {
        self.transport = None;
        self.logger.info("API client cleanup completed");
    }
}
