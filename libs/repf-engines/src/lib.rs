//! repf-engines - Built-in rule engines for the rule engine plugin framework
//!
//! # Engines
//!
//! | Plugin name | Engine | Description |
//! |-------------|--------|-------------|
//! | `passthrough` | [`PassthroughEngine`] | Returns configured codes for matching rule names |
//! | `static_policy` | [`StaticPolicyEngine`] | Compiled-in default `ac*` policies |
//! | `expression` | [`ExpressionEngine`] | Named rules written as `evalexpr` expressions |
//!
//! # Example
//!
//! ```rust
//! use repf_core::{Arguments, AuditMode, ContextManager, RuleExecutionContext, RuntimeContext};
//! use repf_common::{load_config_from_str, ConfigFormat};
//!
//! let config = load_config_from_str(
//!     r#"
//! [[rule_engines]]
//! instance_name = "policy"
//! plugin_name = "static_policy"
//! "#,
//!     ConfigFormat::Toml,
//! )
//! .unwrap();
//!
//! let mut runtime = RuntimeContext::from_config(
//!     &config,
//!     &repf_engines::builtin_plugins(),
//!     repf_engines::microservices::builtin(),
//! )
//! .unwrap();
//! runtime.start().unwrap();
//!
//! let manager = ContextManager::new(&runtime, RuleExecutionContext::new(), AuditMode::Audit);
//! let outcome = manager.exec_rule("acSetRescSchemeForCreate", &mut Arguments::new());
//! assert!(outcome.is_success());
//! ```

pub mod expression;
pub mod microservices;
pub mod passthrough;
pub mod static_policy;

pub use expression::ExpressionEngine;
pub use passthrough::PassthroughEngine;
pub use static_policy::StaticPolicyEngine;

use repf_core::{PluginRegistry, RuleEngine, RuleEngineDescriptor};
use repf_errors::{RepfError, Result};
use serde::de::DeserializeOwned;

/// Registry with every engine in this crate
pub fn builtin_plugins() -> PluginRegistry {
    let mut plugins = PluginRegistry::new();
    plugins.register(passthrough::PLUGIN_NAME, |descriptor| {
        Ok(Box::new(PassthroughEngine::from_descriptor(descriptor)?) as Box<dyn RuleEngine>)
    });
    plugins.register(static_policy::PLUGIN_NAME, |descriptor| {
        Ok(Box::new(StaticPolicyEngine::from_descriptor(descriptor)?) as Box<dyn RuleEngine>)
    });
    plugins.register(expression::PLUGIN_NAME, |descriptor| {
        Ok(Box::new(ExpressionEngine::from_descriptor(descriptor)?) as Box<dyn RuleEngine>)
    });
    plugins
}

/// Decode `plugin_specific_configuration` into an engine's settings
pub(crate) fn plugin_settings<T: DeserializeOwned>(descriptor: &RuleEngineDescriptor) -> Result<T> {
    serde_json::from_value(descriptor.plugin_specific_configuration.clone()).map_err(|e| {
        RepfError::invalid_config(
            format!(
                "rule_engines[{}].plugin_specific_configuration",
                descriptor.instance_name
            ),
            e.to_string(),
        )
    })
}
