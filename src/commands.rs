//! Command implementations behind the `apikit` binary.

use anyhow::{Context, Result, bail};
use log::debug;
use serde_json::Value;
use std::io::Write;

use crate::component::Component;
use crate::http::{ApiClient, Method, RequestSpec, Sleeper, Transport};

/// Prints the client status as pretty JSON.
pub fn status<T: Transport, S: Sleeper>(client: &ApiClient<T, S>, out: &mut impl Write) -> Result<()> {
    let status = serde_json::to_string_pretty(&client.status())?;
    writeln!(out, "{status}")?;
    Ok(())
}

/// Runs the health probe; fails when the server is unreachable.
pub async fn health<T: Transport, S: Sleeper>(
    client: &mut ApiClient<T, S>,
    out: &mut impl Write,
) -> Result<()> {
    if !client.initialize().await? {
        bail!("API at '{}' is unreachable", client.state().base_url());
    }
    writeln!(out, "ok")?;
    Ok(())
}

/// Arguments of a single ad-hoc request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestArgs {
    pub method: Method,
    pub path: String,
    pub data: Option<String>,
    pub query: Vec<String>,
    pub headers: Vec<String>,
}

impl RequestArgs {
    /// Builds the request, parsing `KEY=VALUE` queries, `NAME:VALUE` headers
    /// and the JSON body.
    pub fn to_spec(&self) -> Result<RequestSpec> {
        let mut spec = RequestSpec::new(self.method, self.path.as_str());

        for pair in &self.query {
            let Some((key, value)) = pair.split_once('=') else {
                bail!("Invalid query parameter '{pair}', expected KEY=VALUE");
            };
            spec = spec.with_query(key, value);
        }

        for header in &self.headers {
            let Some((name, value)) = header.split_once(':') else {
                bail!("Invalid header '{header}', expected NAME:VALUE");
            };
            let name = name.trim();
            if name.is_empty() {
                bail!("Invalid header '{header}', name is empty");
            }
            spec = spec.with_header(name, value.trim());
        }

        if let Some(data) = &self.data {
            let body: Value =
                serde_json::from_str(data).context("Request data must be valid JSON")?;
            spec = spec.with_body(body);
        }

        Ok(spec)
    }
}

/// Sends one request and prints the status line and body.
pub async fn request<T: Transport, S: Sleeper>(
    client: &ApiClient<T, S>,
    args: &RequestArgs,
    out: &mut impl Write,
) -> Result<()> {
    let spec = args.to_spec()?;
    debug!("Sending {} {}", spec.method(), spec.path());

    let response = client.request(&spec).await?;

    writeln!(out, "HTTP {}", response.status())?;
    let body = response.body();
    if !body.is_empty() {
        // Pretty print JSON bodies, pass anything else through
        match serde_json::from_str::<Value>(body) {
            Ok(json) => writeln!(out, "{}", serde_json::to_string_pretty(&json)?)?,
            Err(_) => writeln!(out, "{body}")?,
        }
    }
    Ok(())
}
