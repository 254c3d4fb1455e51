//! Connection settings and default headers owned by one client.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use super::request::RequestSpec;
use crate::config::Config;
use crate::{Error, Result};

/// Per-attempt network timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Retries after the initial attempt for network and 5xx failures.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay, multiplied by the attempt number for backoff.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Extra attempts allowed for 429 responses, on top of `max_retries`.
pub const DEFAULT_MAX_RATE_LIMIT_RETRIES: u32 = 5;

/// Immutable client settings. Every `with_*` call yields a new value.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientState {
    base_url: String,
    auth_token: Option<String>,
    default_headers: BTreeMap<String, String>,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    max_rate_limit_retries: u32,
}

impl fmt::Debug for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: BTreeMap<&str, &str> = self
            .default_headers
            .iter()
            .map(|(k, v)| {
                if k.eq_ignore_ascii_case("authorization") {
                    (k.as_str(), "<redacted>")
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();

        f.debug_struct("ClientState")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("default_headers", &headers)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("max_rate_limit_retries", &self.max_rate_limit_retries)
            .finish()
    }
}

impl ClientState {
    /// Creates settings with JSON content type and a `<name>/1.0` user agent.
    pub fn new(name: &str, base_url: &str) -> Self {
        let mut default_headers = BTreeMap::new();
        default_headers.insert("Content-Type".to_string(), "application/json".to_string());
        default_headers.insert("User-Agent".to_string(), format!("{name}/1.0"));

        Self {
            base_url: strip_trailing_slashes(base_url),
            auth_token: None,
            default_headers,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_rate_limit_retries: DEFAULT_MAX_RATE_LIMIT_RETRIES,
        }
    }

    /// Builds settings from the `base_url`, `api_key`, `timeout` (seconds),
    /// `max_retries`, `retry_delay` (seconds) and `max_rate_limit_retries` keys.
    pub fn from_config(name: &str, config: &Config) -> Result<Self> {
        let base_url = config.get_str("base_url").unwrap_or_default();
        let mut state = Self::new(name, base_url);

        if let Some(token) = config.get_str("api_key").filter(|t| !t.is_empty()) {
            state = state.with_auth_token(token);
        }
        if let Some(secs) = config.get_parsed::<f64>("timeout")? {
            state = state.with_timeout(seconds("timeout", secs)?);
        }
        if let Some(retries) = config.get_parsed::<u32>("max_retries")? {
            state = state.with_max_retries(retries);
        }
        if let Some(secs) = config.get_parsed::<f64>("retry_delay")? {
            state = state.with_retry_delay(seconds("retry_delay", secs)?);
        }
        if let Some(retries) = config.get_parsed::<u32>("max_rate_limit_retries")? {
            state = state.with_max_rate_limit_retries(retries);
        }

        Ok(state)
    }

    /// Stores the token and sets `Authorization: Bearer <token>`. The token
    /// format is not checked.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        insert_header(
            &mut self.default_headers,
            "Authorization",
            format!("Bearer {token}"),
        );
        self.auth_token = Some(token);
        self
    }

    /// Stores the URL with trailing slashes removed. Reachability is not checked.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = strip_trailing_slashes(base_url);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        insert_header(&mut self.default_headers, name, value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_max_rate_limit_retries(mut self, max_rate_limit_retries: u32) -> Self {
        self.max_rate_limit_retries = max_rate_limit_retries;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.auth_token.is_some()
    }

    pub fn default_headers(&self) -> &BTreeMap<String, String> {
        &self.default_headers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn max_rate_limit_retries(&self) -> u32 {
        self.max_rate_limit_retries
    }

    /// Whether `path` can be turned into a full URL: it is absolute, or a
    /// base URL is set.
    pub fn resolves(&self, path: &str) -> bool {
        !self.base_url.is_empty() || is_absolute(path)
    }

    /// Joins `path` onto the base URL. Absolute `http(s)://` paths are kept.
    pub fn url_for(&self, path: &str) -> String {
        if is_absolute(path) {
            return path.to_string();
        }
        let path = path.trim_start_matches('/');
        if self.base_url.is_empty() {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path)
    }

    /// Default headers with the request's own headers layered on top.
    pub fn merged_headers(&self, spec: &RequestSpec) -> BTreeMap<String, String> {
        let mut headers = self.default_headers.clone();
        for (name, value) in spec.headers() {
            insert_header(&mut headers, name, value.clone());
        }
        headers
    }

    /// Snapshot without the token value.
    pub fn status(&self) -> ClientStatus {
        ClientStatus {
            base_url: self.base_url.clone(),
            has_token: self.has_token(),
            timeout: self.timeout,
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
        }
    }
}

/// Reportable view of a client's settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClientStatus {
    pub base_url: String,
    pub has_token: bool,
    #[serde(serialize_with = "as_secs")]
    pub timeout: Duration,
    pub max_retries: u32,
    #[serde(serialize_with = "as_secs")]
    pub retry_delay: Duration,
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

fn is_absolute(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

fn strip_trailing_slashes(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Header names are case-insensitive: replaces any entry of the same name.
fn insert_header(headers: &mut BTreeMap<String, String>, name: &str, value: String) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value);
}

fn seconds(key: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::Configuration(format!("invalid value for '{key}' ({secs}): {e}")))
}
