//! `apikit` bundles a retrying HTTP API client with the pieces around it:
//! layered configuration, logging setup, a component lifecycle and
//! structured file helpers.
//!
//! The request path lives in [`http`]: [`http::ApiClient`] builds each
//! attempt from its [`http::ClientState`], asks [`http::RetryPolicy`] what to
//! do with the outcome and sleeps through an injected [`http::Sleeper`].

pub mod commands;
pub mod component;
pub mod config;
pub mod data;
mod error;
pub mod http;
pub mod logging;
pub mod runtime;

pub use component::Component;
pub use config::Config;
pub use error::Error;
pub use http::{ApiClient, ClientState, ClientStatus, Method, RequestSpec, Response};
pub use logging::Logger;

pub type Result<T> = std::result::Result<T, Error>;
