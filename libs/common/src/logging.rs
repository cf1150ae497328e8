//! Logging bootstrap for hosts embedding the framework
//!
//! Installs a tracing-subscriber registry with a reloadable `EnvFilter` and a
//! console layer. `RUST_LOG` takes precedence over the configured level.

use std::sync::{Mutex, OnceLock};

use repf_errors::{RepfError, Result};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    reload,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::LogSettings;

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2025-12-02T00:50:44.809123Z [INFO] rule engine chain started`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// Dynamic log level reload support
type EnvFilterReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;
static LOG_FILTER_HANDLE: OnceLock<EnvFilterReloadHandle> = OnceLock::new();
static CURRENT_LOG_LEVEL: OnceLock<Mutex<String>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// `timestamp [LEVEL] message`
    Bracketed,
    /// One JSON object per event
    Json,
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Host name used in the startup line
    pub service_name: String,
    /// Filter spec, e.g. "info" or "info,repf_core=debug"
    pub level: String,
    pub format: LogFormat,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "repf".to_string(),
            level: "info".to_string(),
            format: LogFormat::Bracketed,
            ansi: true,
        }
    }
}

impl LogConfig {
    pub fn from_settings(service_name: impl Into<String>, settings: &LogSettings) -> Self {
        Self {
            service_name: service_name.into(),
            level: settings.level.clone(),
            format: if settings.json {
                LogFormat::Json
            } else {
                LogFormat::Bracketed
            },
            ..Default::default()
        }
    }

    /// Effective filter spec: `RUST_LOG` wins over the configured level
    fn filter_spec(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.level.clone())
    }
}

/// Initialize logging with configuration
///
/// Fails if the filter spec is invalid or a global subscriber is already set.
pub fn init_with_config(config: LogConfig) -> Result<()> {
    let filter_spec = config.filter_spec();
    let env_filter = EnvFilter::try_new(&filter_spec)
        .map_err(|e| RepfError::config(format!("Invalid log level '{}': {}", filter_spec, e)))?;

    let (reload_filter, reload_handle) = reload::Layer::new(env_filter);

    let console_layer = match config.format {
        LogFormat::Bracketed => fmt::layer()
            .with_ansi(config.ansi)
            .event_format(BracketedLevelFormat)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_level(true)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(reload_filter)
        .with(console_layer)
        .try_init()
        .map_err(|e| RepfError::config(format!("Logging already initialized: {}", e)))?;

    let _ = LOG_FILTER_HANDLE.set(reload_handle);
    let _ = CURRENT_LOG_LEVEL.set(Mutex::new(filter_spec.clone()));

    tracing::info!("Logging: {} @ {}", config.service_name, filter_spec);
    Ok(())
}

/// Initialize logging with the default format at `level`
pub fn init(level: &str) -> Result<()> {
    init_with_config(LogConfig {
        level: level.to_string(),
        ..Default::default()
    })
}

/// Dynamically set log filter level at runtime
///
/// # Example
/// ```ignore
/// repf_common::logging::set_log_level("info,repf_core::pep=trace")?;
/// ```
pub fn set_log_level(level: &str) -> Result<()> {
    let handle = LOG_FILTER_HANDLE
        .get()
        .ok_or_else(|| RepfError::config("Logging not initialized with reload support"))?;

    let new_filter = EnvFilter::try_new(level)
        .map_err(|e| RepfError::config(format!("Invalid log level '{}': {}", level, e)))?;

    handle
        .reload(new_filter)
        .map_err(|e| RepfError::config(format!("Failed to reload log filter: {}", e)))?;

    if let Some(current) = CURRENT_LOG_LEVEL.get() {
        if let Ok(mut guard) = current.lock() {
            *guard = level.to_string();
        }
    }

    tracing::info!("Log level changed to: {}", level);
    Ok(())
}

/// Get current log filter level
pub fn get_log_level() -> String {
    CURRENT_LOG_LEVEL
        .get()
        .and_then(|m| m.lock().ok())
        .map(|guard| guard.clone())
        .unwrap_or_else(|| "unknown".to_string())
}
