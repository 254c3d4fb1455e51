//! Flat key/value settings merged from an optional JSON file and the
//! environment.
//!
//! Load order: file first, then every `APP_*` environment variable, so the
//! environment wins. Environment keys are stored without the prefix and
//! lower-cased (`APP_BASE_URL` becomes `base_url`).

use log::debug;
use serde_json::{Map, Value};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::runtime::{Runtime, ensure_parent};
use crate::{Error, Result};

/// Prefix marking environment variables that belong to the configuration.
pub const ENV_PREFIX: &str = "APP_";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Config {
    values: Map<String, Value>,
    file: Option<PathBuf>,
}

impl Config {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the configuration file (when given and present), then overlays
    /// the environment.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, file: Option<&Path>) -> Result<Self> {
        let mut config = Self {
            values: Map::new(),
            file: file.map(Path::to_path_buf),
        };

        if let Some(path) = file {
            if runtime.exists(path) {
                config.merge_file(runtime, path)?;
            } else {
                debug!("Config file {} not found, skipping", path.display());
            }
        }

        config.merge_env(runtime);
        Ok(config)
    }

    /// Default location of the configuration file: `<config dir>/apikit/config.json`.
    pub fn default_path<R: Runtime>(runtime: &R) -> Option<PathBuf> {
        runtime
            .config_dir()
            .map(|dir| dir.join("apikit").join("config.json"))
    }

    /// Merges the top-level keys of a JSON object file over the current values.
    pub fn merge_file<R: Runtime>(&mut self, runtime: &R, path: &Path) -> Result<()> {
        let contents = runtime.read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "failed to load config file {}: {e:#}",
                path.display()
            ))
        })?;

        let parsed: Value = serde_json::from_str(&contents).map_err(|e| {
            Error::Configuration(format!(
                "failed to load config file {}: {e}",
                path.display()
            ))
        })?;

        let Value::Object(map) = parsed else {
            return Err(Error::Configuration(format!(
                "config file {} must contain a JSON object",
                path.display()
            )));
        };

        debug!("Loaded {} keys from {}", map.len(), path.display());
        self.values.extend(map);
        Ok(())
    }

    /// Overlays `APP_*` environment variables as lower-cased string values.
    pub fn merge_env<R: Runtime>(&mut self, runtime: &R) {
        for (key, value) in runtime.env_vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                if stripped.is_empty() {
                    continue;
                }
                self.values
                    .insert(stripped.to_lowercase(), Value::String(value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the value for `key`, or `default` when it is absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.values.get(key).cloned().unwrap_or(default)
    }

    /// Returns the value when it is a JSON string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Parses a value that may come either from the file (JSON number, bool)
    /// or from the environment (string).
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = match self.values.get(key) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(other) => {
                return Err(Error::Configuration(format!(
                    "invalid value for '{key}': expected a scalar, got {other}"
                )));
            }
        };

        raw.parse::<T>().map(Some).map_err(|e| {
            Error::Configuration(format!("invalid value for '{key}' ({raw}): {e}"))
        })
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Copy of all settings.
    pub fn to_map(&self) -> Map<String, Value> {
        self.values.clone()
    }

    /// File the configuration was loaded from, if any.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Writes the settings as pretty JSON to `path`, or to the file the
    /// configuration was loaded from.
    pub fn save<R: Runtime>(&self, runtime: &R, path: Option<&Path>) -> Result<()> {
        let path = path
            .or(self.file.as_deref())
            .ok_or_else(|| Error::Configuration("no config file path specified".to_string()))?;

        let contents = serde_json::to_string_pretty(&self.values).map_err(|e| {
            Error::Configuration(format!("failed to serialize configuration: {e}"))
        })?;

        ensure_parent(runtime, path)
            .and_then(|()| runtime.write(path, contents.as_bytes()))
            .map_err(|e| {
                Error::Configuration(format!(
                    "failed to save config file {}: {e:#}",
                    path.display()
                ))
            })?;

        debug!("Saved configuration to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use serde_json::json;
    use std::time::Duration;

    fn runtime_with(env: Vec<(&str, &str)>, file: Option<(&str, &str)>) -> MockRuntime {
        let mut runtime = MockRuntime::new();
        let env: Vec<(String, String)> = env
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        runtime.expect_env_vars().returning(move || env.clone());

        if let Some((path, contents)) = file {
            let contents = contents.to_string();
            runtime
                .expect_exists()
                .with(eq(PathBuf::from(path)))
                .returning(|_| true);
            runtime
                .expect_read_to_string()
                .with(eq(PathBuf::from(path)))
                .returning(move |_| Ok(contents.clone()));
        }
        runtime
    }

    #[test]
    fn test_load_env_only() {
        let runtime = runtime_with(
            vec![
                ("APP_BASE_URL", "https://api.example.com"),
                ("APP_MAX_RETRIES", "5"),
                ("HOME", "/home/user"),
            ],
            None,
        );

        let config = Config::load(&runtime, None).unwrap();

        assert_eq!(config.get_str("base_url"), Some("https://api.example.com"));
        assert_eq!(config.get_parsed::<u32>("max_retries").unwrap(), Some(5));
        assert!(!config.contains("home"));
        assert!(config.file().is_none());
    }

    #[test]
    fn test_env_overrides_file() {
        let runtime = runtime_with(
            vec![("APP_TIMEOUT", "10")],
            Some((
                "/etc/apikit.json",
                r#"{"timeout": 30, "base_url": "http://file.example"}"#,
            )),
        );

        let config = Config::load(&runtime, Some(Path::new("/etc/apikit.json"))).unwrap();

        assert_eq!(config.get("timeout"), Some(&json!("10")));
        assert_eq!(config.get_str("base_url"), Some("http://file.example"));
        assert_eq!(config.get_parsed::<u64>("timeout").unwrap(), Some(10));
    }

    #[test]
    fn test_missing_file_is_ignored() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);
        runtime.expect_env_vars().returning(Vec::new);

        let config = Config::load(&runtime, Some(Path::new("/nope.json"))).unwrap();
        assert!(config.to_map().is_empty());
        assert_eq!(config.file(), Some(Path::new("/nope.json")));
    }

    #[test]
    fn test_invalid_json_is_configuration_error() {
        let runtime = runtime_with(vec![], Some(("/bad.json", "{not json")));

        let err = Config::load(&runtime, Some(Path::new("/bad.json"))).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("/bad.json"));
    }

    #[test]
    fn test_non_object_root_is_rejected() {
        let runtime = runtime_with(vec![], Some(("/list.json", "[1, 2, 3]")));

        let err = Config::load(&runtime, Some(Path::new("/list.json"))).unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }

    #[test]
    fn test_get_or_and_set() {
        let mut config = Config::new();
        assert_eq!(config.get_or("name", json!("fallback")), json!("fallback"));

        config.set("name", "apikit");
        assert!(config.contains("name"));
        assert_eq!(config.get_or("name", json!("fallback")), json!("apikit"));
    }

    #[test]
    fn test_get_parsed_reports_bad_values() {
        let mut config = Config::new();
        config.set("max_retries", "many");
        config.set("nested", json!({"a": 1}));
        config.set("ratio", 0.5);

        let err = config.get_parsed::<u32>("max_retries").unwrap_err();
        assert!(err.to_string().contains("max_retries"));
        assert!(config.get_parsed::<u32>("nested").is_err());
        assert_eq!(config.get_parsed::<f64>("ratio").unwrap(), Some(0.5));
        assert_eq!(config.get_parsed::<u32>("absent").unwrap(), None);
    }

    #[test]
    fn test_default_path() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_config_dir()
            .returning(|| Some(PathBuf::from("/home/user/.config")));

        assert_eq!(
            Config::default_path(&runtime),
            Some(PathBuf::from("/home/user/.config/apikit/config.json"))
        );
    }

    #[test]
    fn test_save_without_path_fails() {
        let runtime = MockRuntime::new();
        let err = Config::new().save(&runtime, None).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_save_and_reload_with_real_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let runtime = RealRuntime;

        let mut config = Config::new();
        config.set("base_url", "http://localhost:8080");
        config.set("retry_delay", 0.25);
        config.save(&runtime, Some(&path)).unwrap();

        let mut reloaded = Config::new();
        reloaded.merge_file(&runtime, &path).unwrap();
        assert_eq!(reloaded.get_str("base_url"), Some("http://localhost:8080"));

        let delay: f64 = reloaded.get_parsed("retry_delay").unwrap().unwrap();
        assert_eq!(Duration::from_secs_f64(delay), Duration::from_millis(250));
    }
}
