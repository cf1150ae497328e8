//! Shared plumbing for the rule engine plugin framework
//!
//! Provides:
//! - logging bootstrap (tracing-subscriber with a reloadable filter)
//! - the configuration model and its loader (figment)

pub mod config;
pub mod logging;

pub use config::{
    load_config_from_file, load_config_from_str, ConfigFormat, DiagnosticsPolicy, LogSettings,
    PepConfig, RepfConfig, RuleEngineDescriptor, DEFAULT_MAX_CALL_DEPTH,
};
pub use logging::{LogConfig, LogFormat};
