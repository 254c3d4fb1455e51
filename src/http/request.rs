//! Per-call request description and the response handed back to callers.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            other => Err(format!("unsupported HTTP method '{other}'")),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
        }
    }
}

/// One logical request. Built with the `with_*` methods, immutable afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSpec {
    method: Method,
    path: String,
    body: Option<Value>,
    query: BTreeMap<String, String>,
    headers: BTreeMap<String, String>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Adds a header that overrides any default header of the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

/// Final HTTP response of a request, whatever its status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: BTreeMap<String, String>,
    body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Header names are stored lower-cased.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Value of a `Retry-After` header given in whole seconds.
    ///
    /// HTTP-date values are not interpreted and yield `None`.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")?
            .trim()
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    }

    /// Turns 4xx/5xx responses into [`Error::Status`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.status >= 400 {
            return Err(Error::Status {
                status: self.status,
                body: self.body,
            });
        }
        Ok(self)
    }

    /// Parses the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parsing() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("PATCH".parse::<Method>().unwrap(), Method::Patch);
        assert!("HEAD".parse::<Method>().is_err());
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert_eq!(reqwest::Method::from(Method::Put), reqwest::Method::PUT);
    }

    #[test]
    fn test_request_spec_builder() {
        let spec = RequestSpec::new(Method::Post, "/items")
            .with_body(json!({"name": "widget"}))
            .with_query("page", "2")
            .with_header("X-Trace", "abc");

        assert_eq!(spec.method(), Method::Post);
        assert_eq!(spec.path(), "/items");
        assert_eq!(spec.body(), Some(&json!({"name": "widget"})));
        assert_eq!(spec.query().get("page").map(String::as_str), Some("2"));
        assert_eq!(spec.headers().get("X-Trace").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_response_headers_are_case_insensitive() {
        let response = Response::new(200, "").with_header("Content-Type", "application/json");
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.header("CONTENT-TYPE"), Some("application/json"));
        assert!(response.is_success());
    }

    #[test]
    fn test_retry_after_parsing() {
        let response = Response::new(429, "").with_header("Retry-After", " 7 ");
        assert_eq!(response.retry_after(), Some(Duration::from_secs(7)));

        let response =
            Response::new(429, "").with_header("Retry-After", "Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(response.retry_after(), None);

        assert_eq!(Response::new(429, "").retry_after(), None);
    }

    #[test]
    fn test_error_for_status() {
        let ok = Response::new(204, "").error_for_status().unwrap();
        assert_eq!(ok.status(), 204);

        let err = Response::new(404, "not here").error_for_status().unwrap_err();
        assert!(matches!(err, Error::Status { status: 404, ref body } if body == "not here"));

        let err = Response::new(503, "").error_for_status().unwrap_err();
        assert!(matches!(err, Error::Status { status: 503, .. }));
    }

    #[test]
    fn test_json_parsing() {
        let response = Response::new(200, r#"{"ok": true}"#);
        let value: Value = response.json().unwrap();
        assert_eq!(value, json!({"ok": true}));

        let err = Response::new(200, "<html>").json::<Value>().unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
