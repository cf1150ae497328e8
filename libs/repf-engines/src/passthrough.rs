//! Pass-through engine: answers matching rule names with a configured code
//!
//! Used to exercise hook wiring without a rule language. Configuration:
//!
//! ```json
//! { "return_codes_for_peps": [ { "regex": "pep_.*_pre", "code": 0 } ] }
//! ```

use regex::Regex;
use serde::Deserialize;

use repf_core::codes::SYS_NOT_SUPPORTED;
use repf_core::{Arguments, Callback, Outcome, RuleEngine, RuleEngineDescriptor};
use repf_errors::{rule_error, RepfError, Result};

pub const PLUGIN_NAME: &str = "passthrough";

#[derive(Debug, Clone, Default, Deserialize)]
struct PassthroughSettings {
    #[serde(default)]
    return_codes_for_peps: Vec<ReturnCode>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReturnCode {
    regex: String,
    code: i32,
}

#[derive(Debug)]
struct CodeRule {
    pattern: String,
    regex: Regex,
    code: i32,
}

#[derive(Debug, Default)]
pub struct PassthroughEngine {
    rules: Vec<CodeRule>,
}

impl PassthroughEngine {
    pub fn from_descriptor(descriptor: &RuleEngineDescriptor) -> Result<Self> {
        let settings: PassthroughSettings = crate::plugin_settings(descriptor)?;
        let mut engine = Self::default();
        for entry in settings.return_codes_for_peps {
            engine.add_rule(&entry.regex, entry.code)?;
        }
        Ok(engine)
    }

    /// Answer names fully matching `pattern` with `code`
    pub fn add_rule(&mut self, pattern: &str, code: i32) -> Result<()> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            RepfError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;
        self.rules.push(CodeRule {
            pattern: pattern.to_string(),
            regex,
            code,
        });
        Ok(())
    }

    fn code_for(&self, name: &str) -> Option<i32> {
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(name))
            .map(|rule| rule.code)
    }
}

impl RuleEngine for PassthroughEngine {
    fn start(&mut self, instance_name: &str) -> Outcome {
        tracing::debug!(
            "passthrough instance [{}] serving {} patterns",
            instance_name,
            self.rules.len()
        );
        Outcome::ok()
    }

    fn stop(&mut self, _instance_name: &str) -> Outcome {
        Outcome::ok()
    }

    fn rule_exists(&self, name: &str) -> Result<bool> {
        Ok(self.code_for(name).is_some())
    }

    fn list_rules(&self) -> Result<Vec<String>> {
        Ok(self.rules.iter().map(|rule| rule.pattern.clone()).collect())
    }

    fn exec_rule(&self, name: &str, _args: &mut Arguments, _callback: &Callback<'_>) -> Outcome {
        match self.code_for(name) {
            Some(code) => Outcome::code(code),
            None => rule_error!(SYS_NOT_SUPPORTED, "no return code configured for [{}]", name),
        }
    }

    fn exec_rule_text(
        &self,
        _instance_name: &str,
        _text: &str,
        _params: &mut Arguments,
        _output_descriptor: &str,
        _callback: &Callback<'_>,
    ) -> Outcome {
        rule_error!(SYS_NOT_SUPPORTED, "exec_rule_text not supported by the passthrough engine")
    }

    fn exec_rule_expression(
        &self,
        _expression: &str,
        _params: &mut Arguments,
        _callback: &Callback<'_>,
    ) -> Outcome {
        rule_error!(
            SYS_NOT_SUPPORTED,
            "exec_rule_expression not supported by the passthrough engine"
        )
    }

    fn rule_patterns(&self) -> Vec<String> {
        self.rules.iter().map(|rule| rule.pattern.clone()).collect()
    }
}
