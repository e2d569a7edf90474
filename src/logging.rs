//! Logging setup
//!
//! Events go to stderr (stdout carries the MCP protocol) and optionally to
//! a daily-rotated file. `RUST_LOG` directives take precedence over the
//! configured level.

use crate::error::{HomeyError, Result};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

const DEFAULT_LOG_FILE: &str = "homey-mcp.log";

/// Logging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: Level,

    /// Also write to this file, rotated daily
    pub file_path: Option<PathBuf>,

    /// Emit JSON lines instead of text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            file_path: None,
            json: false,
        }
    }
}

impl LogConfig {
    /// Read `HOMEY_LOG_FILE` and `HOMEY_LOG_JSON`; the level comes from the
    /// server configuration
    pub fn from_env(level_name: &str) -> Self {
        Self {
            level: parse_level(level_name),
            file_path: std::env::var("HOMEY_LOG_FILE").ok().map(PathBuf::from),
            json: std::env::var("HOMEY_LOG_JSON")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }
}

/// Level from a name such as `INFO` or `warning`; unknown names mean INFO
pub fn parse_level(name: &str) -> Level {
    match name.trim().to_uppercase().as_str() {
        "TRACE" => Level::TRACE,
        "DEBUG" => Level::DEBUG,
        "WARN" | "WARNING" => Level::WARN,
        "ERROR" | "CRITICAL" => Level::ERROR,
        _ => Level::INFO,
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn output_layer<W>(writer: W, json: bool, ansi: bool) -> BoxedLayer
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    if json {
        fmt::layer().json().with_writer(writer).boxed()
    } else {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .boxed()
    }
}

/// Install the global subscriber
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.level.into())
        .from_env_lossy();

    let mut layers: Vec<BoxedLayer> = vec![output_layer(std::io::stderr, config.json, true)];

    if let Some(file_path) = &config.file_path {
        let directory = file_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(directory)?;
        let file_name = file_path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new(DEFAULT_LOG_FILE));
        let appender = tracing_appender::rolling::daily(directory, file_name);
        layers.push(output_layer(appender, config.json, false));
    }

    let subscriber = tracing_subscriber::registry().with(layers).with(env_filter);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| HomeyError::config(format!("Failed to install logger: {e}")))
}
