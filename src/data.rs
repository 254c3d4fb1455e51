//! Structured file helpers: JSON, CSV and text read/write, simple string
//! transforms and shape validation.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use crate::component::Component;
use crate::config::Config;
use crate::logging::Logger;
use crate::runtime::{RealRuntime, Runtime, ensure_parent};

/// JSON value kinds accepted in a validation schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JsonType {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Bool,
            Value::Number(_) => JsonType::Number,
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }
}

/// String transformations understood by [`DataProcessor::transform`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transformation {
    Uppercase,
    Lowercase,
    Reverse,
}

impl FromStr for Transformation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uppercase" => Ok(Transformation::Uppercase),
            "lowercase" => Ok(Transformation::Lowercase),
            "reverse" => Ok(Transformation::Reverse),
            other => Err(format!("unknown transformation '{other}'")),
        }
    }
}

/// One CSV record keyed by column name.
pub type CsvRow = BTreeMap<String, String>;

pub struct DataProcessor<R: Runtime = RealRuntime> {
    runtime: R,
    logger: Logger,
    config: Config,
}

impl DataProcessor {
    pub fn new(logger: Logger) -> Self {
        Self::with_runtime(RealRuntime, logger)
    }
}

impl<R: Runtime> DataProcessor<R> {
    pub fn with_runtime(runtime: R, logger: Logger) -> Self {
        logger.info(format!("Initialized {}", logger.component()));
        Self {
            runtime,
            logger,
            config: Config::new(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Reads and deserializes a JSON file.
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let contents = self.load(path)?;
        let data = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid JSON in file {}", path.display()))
            .inspect_err(|e| self.logger.error(format!("{e:#}")))?;
        self.logger
            .info(format!("Successfully read JSON file: {}", path.display()));
        Ok(data)
    }

    /// Writes `data` as pretty JSON, creating parent directories.
    pub fn write_json<T: Serialize + ?Sized>(&self, data: &T, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(data).context("Failed to serialize JSON")?;
        self.store(contents.as_bytes(), path)?;
        self.logger
            .info(format!("Successfully wrote JSON file: {}", path.display()));
        Ok(())
    }

    /// Reads a CSV file whose first record names the columns.
    pub fn read_csv(&self, path: &Path, delimiter: u8) -> Result<Vec<CsvRow>> {
        let contents = self.load(path)?;
        let rows = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_reader(contents.as_bytes())
            .deserialize::<CsvRow>()
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Invalid CSV in file {}", path.display()))
            .inspect_err(|e| self.logger.error(format!("{e:#}")))?;
        self.logger
            .info(format!("Successfully read CSV file: {}", path.display()));
        Ok(rows)
    }

    /// Writes rows as CSV with a header taken from the first row's keys.
    ///
    /// Columns absent from a later row are written empty; columns the first
    /// row lacks are an error. Nothing is written for an empty slice.
    pub fn write_csv(&self, rows: &[CsvRow], path: &Path, delimiter: u8) -> Result<()> {
        if rows.is_empty() {
            self.logger.warn("No data to write to CSV");
            return Ok(());
        }

        let encoded = encode_csv(rows, delimiter)
            .with_context(|| format!("Failed to write CSV file {}", path.display()))
            .inspect_err(|e| self.logger.error(format!("{e:#}")))?;
        self.store(&encoded, path)?;
        self.logger
            .info(format!("Successfully wrote CSV file: {}", path.display()));
        Ok(())
    }

    pub fn read_text(&self, path: &Path) -> Result<String> {
        let contents = self.load(path)?;
        self.logger
            .info(format!("Successfully read file: {}", path.display()));
        Ok(contents)
    }

    /// Writes text, creating parent directories.
    pub fn write_text(&self, contents: &str, path: &Path) -> Result<()> {
        self.store(contents.as_bytes(), path)?;
        self.logger
            .info(format!("Successfully wrote file: {}", path.display()));
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<String> {
        self.runtime
            .read_to_string(path)
            .inspect_err(|e| self.logger.error(format!("{e:#}")))
    }

    fn store(&self, contents: &[u8], path: &Path) -> Result<()> {
        ensure_parent(&self.runtime, path)
            .and_then(|()| self.runtime.write(path, contents))
            .inspect_err(|e| self.logger.error(format!("{e:#}")))
    }

    /// Applies a named transformation to a string value. Unknown names and
    /// non-string values are returned unchanged with a warning.
    pub fn transform(&self, data: Value, kind: &str) -> Value {
        self.logger.info(format!("Applying transformation: {kind}"));

        let transformation = match kind.parse::<Transformation>() {
            Ok(t) => t,
            Err(e) => {
                self.logger.warn(e);
                return data;
            }
        };

        match data {
            Value::String(s) => Value::String(match transformation {
                Transformation::Uppercase => s.to_uppercase(),
                Transformation::Lowercase => s.to_lowercase(),
                Transformation::Reverse => s.chars().rev().collect(),
            }),
            other => {
                self.logger.warn(format!(
                    "Transformation {kind} only applies to strings, got {:?}",
                    JsonType::of(&other)
                ));
                other
            }
        }
    }

    /// Checks that `data` is present and, for objects, that every schema key
    /// exists with the expected type.
    pub fn validate(&self, data: &Value, schema: Option<&BTreeMap<String, JsonType>>) -> bool {
        if data.is_null() {
            self.logger.warn("Data is null");
            return false;
        }

        if let (Some(schema), Value::Object(object)) = (schema, data) {
            for (key, expected) in schema {
                let Some(value) = object.get(key) else {
                    self.logger.warn(format!("Missing required key: {key}"));
                    return false;
                };
                if JsonType::of(value) != *expected {
                    self.logger.warn(format!(
                        "Invalid type for key {key}: expected {expected:?}, got {:?}",
                        JsonType::of(value)
                    ));
                    return false;
                }
            }
        }

        self.logger.info("Data validation passed");
        true
    }
}

fn encode_csv(rows: &[CsvRow], delimiter: u8) -> Result<Vec<u8>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Vec<&str> = first.keys().map(String::as_str).collect();

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    writer.write_record(&columns)?;

    for (index, row) in rows.iter().enumerate() {
        if let Some(extra) = row.keys().find(|key| !first.contains_key(*key)) {
            bail!("Row {} has column '{extra}' which is not in the header", index + 1);
        }
        writer.write_record(
            columns
                .iter()
                .map(|column| row.get(*column).map(String::as_str).unwrap_or("")),
        )?;
    }

    writer.into_inner().map_err(|e| e.into_error().into())
}

#[async_trait]
impl<R: Runtime> Component for DataProcessor<R> {
    fn name(&self) -> &str {
        self.logger.component()
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    async fn initialize(&mut self) -> crate::Result<bool> {
        self.logger.info("Data processor initialized successfully");
        Ok(true)
    }

    async fn cleanup(&mut self) {
        self.logger.info("Data processor cleanup completed");
    }
}
