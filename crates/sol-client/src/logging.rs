//! Process-wide `tracing` subscriber setup.

use std::fs::File;
use std::str::FromStr;

use serde::Deserialize;
use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, writer::MakeWriterExt},
    prelude::*,
    Registry,
};

use crate::error::ClientError;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Plain,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    File,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub output: LogOutput,
    /// Required when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<String>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::Plain,
            output: LogOutput::Stdout,
            file_path: None,
        }
    }
}

/// Install the global subscriber described by `config`.
///
/// Fails if the level is unknown, if file output has no path or the file
/// cannot be created, or if a global subscriber is already installed.
pub fn init(config: &LogConfig) -> Result<(), ClientError> {
    let log_level = Level::from_str(&config.level)
        .map_err(|_| ClientError::Config(format!("unknown log level '{}'", config.level)))?;
    let level_filter = LevelFilter::from_level(log_level);
    let subscriber = Registry::default().with(level_filter);

    let installed = match config.output {
        LogOutput::File => {
            let file_path = config.file_path.as_deref().ok_or_else(|| {
                ClientError::Config("log output is 'file' but 'file_path' is not set".into())
            })?;
            let log_file = File::create(file_path)
                .map_err(|e| ClientError::Config(format!("cannot create {file_path}: {e}")))?;
            let file_writer = log_file.with_max_level(log_level);

            match config.format {
                LogFormat::Json => subscriber
                    .with(fmt::layer().with_writer(file_writer).json())
                    .try_init(),
                LogFormat::Plain => subscriber
                    .with(fmt::layer().with_writer(file_writer).with_ansi(false))
                    .try_init(),
            }
        }
        LogOutput::Stdout => {
            let stdout_writer = std::io::stdout.with_max_level(log_level);
            match config.format {
                LogFormat::Json => subscriber
                    .with(fmt::layer().with_writer(stdout_writer).json())
                    .try_init(),
                LogFormat::Plain => subscriber
                    .with(fmt::layer().with_writer(stdout_writer))
                    .try_init(),
            }
        }
    };

    installed.map_err(|e| ClientError::Config(format!("logger already initialized: {e}")))
}
