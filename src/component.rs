//! Lifecycle shared by the long-lived components.

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;
use crate::config::Config;

#[async_trait]
pub trait Component: Send {
    /// Name used to tag this component's log events.
    fn name(&self) -> &str;

    /// Settings handed to the component at construction.
    fn config(&self) -> &Config;

    fn config_mut(&mut self) -> &mut Config;

    /// Prepares the component. `Ok(false)` means it is usable but degraded
    /// (for example an unreachable health endpoint).
    async fn initialize(&mut self) -> Result<bool>;

    /// Releases held resources. Safe to call more than once.
    async fn cleanup(&mut self);

    fn get_config(&self, key: &str, default: Value) -> Value {
        self.config().get_or(key, default)
    }

    /// Changes only this component's copy of the settings.
    fn set_config(&mut self, key: &str, value: Value) {
        self.config_mut().set(key, value);
    }
}
