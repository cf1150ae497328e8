//! Configuration model and loader
//!
//! The configuration names the ordered rule engine chain and the policy
//! enforcement settings. Files may be TOML, YAML or JSON; `REPF_` prefixed
//! environment variables override file values (nested keys split on `__`,
//! e.g. `REPF_LOG__LEVEL=debug`).

use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use repf_errors::codes::SYS_NO_HANDLER_REPLY_MSG;
use repf_errors::{RepfError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

// ============================================================================
// Configuration types
// ============================================================================

/// Top-level framework configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepfConfig {
    /// Rule engine descriptors in dispatch order
    #[serde(default)]
    pub rule_engines: Vec<RuleEngineDescriptor>,

    #[serde(default)]
    pub pep: PepConfig,

    /// Maximum nesting of re-entrant calls within one request
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,

    #[serde(default)]
    pub log: LogSettings,
}

impl Default for RepfConfig {
    fn default() -> Self {
        Self {
            rule_engines: Vec::new(),
            pep: PepConfig::default(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            log: LogSettings::default(),
        }
    }
}

/// One configured rule engine instance
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RuleEngineDescriptor {
    /// Unique name within the chain
    pub instance_name: String,
    /// Adapter to resolve from the plugin registry
    pub plugin_name: String,
    /// Optional handle to state shared between instances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_memory_instance: Option<String>,
    /// Adapter-specific settings, passed through untouched
    #[serde(default = "empty_object")]
    pub plugin_specific_configuration: serde_json::Value,
}

impl RuleEngineDescriptor {
    pub fn new(instance_name: impl Into<String>, plugin_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            plugin_name: plugin_name.into(),
            shared_memory_instance: None,
            plugin_specific_configuration: empty_object(),
        }
    }

    pub fn with_configuration(mut self, configuration: serde_json::Value) -> Self {
        self.plugin_specific_configuration = configuration;
        self
    }
}

/// Policy enforcement settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PepConfig {
    /// Ordered prefixes composed into hook names (`<ns>pep_<op>_<class>`)
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,

    /// Soft failures of a main operation that still proceed to post hooks
    #[serde(default = "default_acceptable_errors")]
    pub acceptable_errors: Vec<i32>,

    /// Per-operation replacement for `acceptable_errors`
    #[serde(default)]
    pub operation_acceptable_errors: BTreeMap<String, Vec<i32>>,

    /// Extra patterns for the rule-exists cache
    #[serde(default)]
    pub rule_patterns: Vec<String>,

    #[serde(default)]
    pub diagnostics: DiagnosticsPolicy,
}

impl Default for PepConfig {
    fn default() -> Self {
        Self {
            namespaces: default_namespaces(),
            acceptable_errors: default_acceptable_errors(),
            operation_acceptable_errors: BTreeMap::new(),
            rule_patterns: Vec::new(),
            diagnostics: DiagnosticsPolicy::default(),
        }
    }
}

impl PepConfig {
    /// Acceptable error codes for one operation
    pub fn acceptable_errors_for(&self, operation: &str) -> &[i32] {
        self.operation_acceptable_errors
            .get(operation)
            .unwrap_or(&self.acceptable_errors)
    }

    pub fn is_acceptable(&self, operation: &str, code: i32) -> bool {
        self.acceptable_errors_for(operation).contains(&code)
    }
}

/// What happens to accumulated error-stack entries at the rule submission boundary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticsPolicy {
    /// Keep every entry
    Retain,
    /// Drop pre-hook and declining-engine entries when no target instance was named
    #[default]
    ClearForGenericCallers,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_max_call_depth() -> usize {
    DEFAULT_MAX_CALL_DEPTH
}

fn default_namespaces() -> Vec<String> {
    vec![String::new()]
}

fn default_acceptable_errors() -> Vec<i32> {
    vec![SYS_NO_HANDLER_REPLY_MSG]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl RepfConfig {
    /// Check invariants the chain relies on
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (index, descriptor) in self.rule_engines.iter().enumerate() {
            if descriptor.instance_name.trim().is_empty() {
                return Err(RepfError::invalid_config(
                    format!("rule_engines[{}].instance_name", index),
                    "must not be empty",
                ));
            }
            if descriptor.plugin_name.trim().is_empty() {
                return Err(RepfError::invalid_config(
                    format!("rule_engines[{}].plugin_name", index),
                    "must not be empty",
                ));
            }
            if !seen.insert(descriptor.instance_name.as_str()) {
                return Err(RepfError::invalid_config(
                    format!("rule_engines[{}].instance_name", index),
                    format!("duplicate instance [{}]", descriptor.instance_name),
                ));
            }
        }

        if self.pep.namespaces.is_empty() {
            return Err(RepfError::invalid_config(
                "pep.namespaces",
                "at least one namespace is required",
            ));
        }

        if self.max_call_depth == 0 {
            return Err(RepfError::invalid_config(
                "max_call_depth",
                "must be greater than zero",
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Loading
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Load and validate configuration from a file, with `REPF_` env overrides
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> Result<RepfConfig> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| RepfError::config("Config file must have an extension"))?;

    let format = ConfigFormat::from_extension(extension).ok_or_else(|| {
        RepfError::config(format!("Unsupported config file format: {}", extension))
    })?;

    if !path.exists() {
        return Err(RepfError::config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let figment = match format {
        ConfigFormat::Toml => Figment::new().merge(Toml::file(path)),
        ConfigFormat::Yaml => Figment::new().merge(Yaml::file(path)),
        ConfigFormat::Json => Figment::new().merge(Json::file(path)),
    }
    .merge(Env::prefixed("REPF_").split("__"));

    let config: RepfConfig = figment.extract().map_err(|e| {
        RepfError::config(format!("Failed to load configuration from file: {}", e))
    })?;
    config.validate()?;

    tracing::debug!(
        "Loaded configuration from {} ({} rule engines)",
        path.display(),
        config.rule_engines.len()
    );
    Ok(config)
}

/// Load and validate configuration from an in-memory document
pub fn load_config_from_str(content: &str, format: ConfigFormat) -> Result<RepfConfig> {
    let figment = match format {
        ConfigFormat::Toml => Figment::new().merge(Toml::string(content)),
        ConfigFormat::Yaml => Figment::new().merge(Yaml::string(content)),
        ConfigFormat::Json => Figment::new().merge(Json::string(content)),
    };

    let config: RepfConfig = figment
        .extract()
        .map_err(|e| RepfError::config(format!("Failed to load configuration: {}", e)))?;
    config.validate()?;
    Ok(config)
}
