//! Expression engine - named rules written as `evalexpr` expressions
//!
//! Provides rule evaluation with:
//! - Positional arguments bound as `arg0`, `arg1`, ...
//! - Condition inputs bound as `cond_<keyword>`
//! - Integer results taken as status codes, booleans as pass/fail
//! - Any other result written to the first string slot of the call
//!
//! ```json
//! { "rules": { "acCheckQuota": "arg0 <= 1024", "acPickResc": "\"fastResc\"" } }
//! ```

use std::collections::BTreeMap;

use evalexpr::{Context, ContextWithMutableVariables, HashMapContext, Node, Value};
use serde::Deserialize;

use repf_core::codes::{RULE_FAILED_ERR, SYS_NOT_SUPPORTED};
use repf_core::{with_context, Arg, Arguments, Callback, Outcome, RuleEngine, RuleEngineDescriptor};
use repf_errors::{rule_error, RepfError, Result};

pub const PLUGIN_NAME: &str = "expression";

/// Prefix of variables bound from the context's condition inputs
pub const CONDITION_PREFIX: &str = "cond_";

#[derive(Debug, Clone, Default, Deserialize)]
struct ExpressionSettings {
    #[serde(default)]
    rules: BTreeMap<String, String>,
}

struct CompiledRule {
    source: String,
    tree: Node,
}

#[derive(Default)]
pub struct ExpressionEngine {
    rules: BTreeMap<String, CompiledRule>,
}

impl ExpressionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptor(descriptor: &RuleEngineDescriptor) -> Result<Self> {
        let settings: ExpressionSettings = crate::plugin_settings(descriptor)?;
        let mut engine = Self::new();
        for (name, source) in settings.rules {
            engine.add_rule(name, source).map_err(|e| {
                RepfError::invalid_config(
                    format!("rule_engines[{}].rules", descriptor.instance_name),
                    e.to_string(),
                )
            })?;
        }
        Ok(engine)
    }

    /// Compile `source` and register it under `name`
    pub fn add_rule(&mut self, name: impl Into<String>, source: impl Into<String>) -> Result<()> {
        let name = name.into();
        let source = source.into();
        let tree = evalexpr::build_operator_tree(&source).map_err(|e| {
            RepfError::expression(format!("Failed to compile rule '{}': {}", name, e))
        })?;
        self.rules.insert(name, CompiledRule { source, tree });
        Ok(())
    }

    pub fn source(&self, name: &str) -> Option<&str> {
        self.rules.get(name).map(|rule| rule.source.as_str())
    }

    /// Bind call arguments and condition inputs into a fresh context
    fn bind(args: &Arguments, callback: &Callback<'_>) -> Result<HashMapContext> {
        let mut context = HashMapContext::new();

        for (index, arg) in args.iter().enumerate() {
            if let Some(value) = arg_to_value(arg) {
                let name = format!("arg{}", index);
                context.set_value(name.clone(), value).map_err(|e| {
                    RepfError::expression(format!("Failed to set variable {}: {}", name, e))
                })?;
            }
        }

        let conditions: Vec<(String, String)> = with_context(callback.context(), |ctx| {
            ctx.condition_inputs
                .iter()
                .map(|(k, v)| (format!("{}{}", CONDITION_PREFIX, k), v.to_string()))
                .collect()
        })?;
        for (name, value) in conditions {
            context
                .set_value(name.clone(), Value::String(value))
                .map_err(|e| {
                    RepfError::expression(format!("Failed to set variable {}: {}", name, e))
                })?;
        }

        Ok(context)
    }
}

impl RuleEngine for ExpressionEngine {
    fn start(&mut self, instance_name: &str) -> Outcome {
        tracing::debug!(
            "expression instance [{}] compiled {} rules",
            instance_name,
            self.rules.len()
        );
        Outcome::ok()
    }

    fn stop(&mut self, _instance_name: &str) -> Outcome {
        Outcome::ok()
    }

    fn rule_exists(&self, name: &str) -> Result<bool> {
        Ok(self.rules.contains_key(name))
    }

    fn list_rules(&self) -> Result<Vec<String>> {
        Ok(self.rules.keys().cloned().collect())
    }

    fn exec_rule(&self, name: &str, args: &mut Arguments, callback: &Callback<'_>) -> Outcome {
        let Some(rule) = self.rules.get(name) else {
            return rule_error!(SYS_NOT_SUPPORTED, "rule [{}] not defined in expression engine", name);
        };
        let context = match Self::bind(args, callback) {
            Ok(context) => context,
            Err(e) => return e.into(),
        };

        let value = match rule.tree.eval_with_context(&context) {
            Ok(value) => value,
            Err(e) => {
                return RepfError::expression(format!(
                    "Failed to evaluate '{}': {}",
                    rule.source, e
                ))
                .into()
            },
        };
        tracing::trace!("rule [{}] evaluated to [{}]", name, value);

        value_to_outcome(name, value, args)
    }

    fn exec_rule_text(
        &self,
        instance_name: &str,
        text: &str,
        params: &mut Arguments,
        output_descriptor: &str,
        callback: &Callback<'_>,
    ) -> Outcome {
        // Unparseable text belongs to some other engine's language
        let tree = match evalexpr::build_operator_tree(text) {
            Ok(tree) => tree,
            Err(e) => {
                tracing::debug!("instance [{}] declined rule text: {}", instance_name, e);
                return rule_error!(SYS_NOT_SUPPORTED, "not an expression: {}", e);
            },
        };
        let mut context = match Self::bind(params, callback) {
            Ok(context) => context,
            Err(e) => return e.into(),
        };

        let value = match tree.eval_with_context_mut(&mut context) {
            Ok(value) => value,
            Err(e) => {
                return RepfError::expression(format!("Failed to evaluate '{}': {}", text, e)).into()
            },
        };

        if output_descriptor.is_empty() {
            return Outcome::ok();
        }
        // Assignments evaluate to empty; report the assigned variable instead
        let value = match value {
            Value::Empty => context
                .get_value(output_descriptor)
                .cloned()
                .unwrap_or(Value::Empty),
            other => other,
        };
        let rendered = value_to_string(&value);
        match with_context(callback.context(), |ctx| {
            ctx.set_output(output_descriptor, rendered)
        }) {
            Ok(()) => Outcome::ok(),
            Err(e) => e.into(),
        }
    }

    fn exec_rule_expression(
        &self,
        expression: &str,
        params: &mut Arguments,
        callback: &Callback<'_>,
    ) -> Outcome {
        let context = match Self::bind(params, callback) {
            Ok(context) => context,
            Err(e) => return e.into(),
        };
        let value = match evalexpr::eval_with_context(expression, &context) {
            Ok(value) => value,
            Err(e) => {
                return RepfError::expression(format!(
                    "Failed to evaluate '{}': {}",
                    expression, e
                ))
                .into()
            },
        };

        if let Some(slot) = params.first_str_slot() {
            if let Err(e) = params.set_str(slot, value_to_string(&value)) {
                return e.into();
            }
        }
        Outcome::ok()
    }

    fn rule_patterns(&self) -> Vec<String> {
        self.rules.keys().map(|name| regex::escape(name)).collect()
    }
}

fn arg_to_value(arg: &Arg) -> Option<Value> {
    match arg {
        Arg::Int(v) | Arg::IntPtr(Some(v)) => Some(Value::Int(i64::from(*v))),
        Arg::Long(v) | Arg::LongPtr(Some(v)) => Some(Value::Int(*v)),
        Arg::Size(v) => i64::try_from(*v).ok().map(Value::Int),
        Arg::FloatPtr(Some(v)) => Some(Value::Float(f64::from(*v))),
        Arg::Strings(items) => Some(Value::Tuple(
            items.iter().cloned().map(Value::String).collect(),
        )),
        Arg::StringArray(items) => Some(Value::Tuple(
            items.iter().cloned().map(Value::String).collect(),
        )),
        other => other.as_str().map(|s| Value::String(s.to_string())),
    }
}

/// Integers are status codes, booleans pass or fail, anything else is output
fn value_to_outcome(name: &str, value: Value, args: &mut Arguments) -> Outcome {
    match value {
        Value::Int(code) => match i32::try_from(code) {
            Ok(code) => Outcome::code(code),
            Err(_) => RepfError::expression(format!(
                "rule [{}] returned out-of-range code {}",
                name, code
            ))
            .into(),
        },
        Value::Boolean(true) | Value::Empty => Outcome::ok(),
        Value::Boolean(false) => rule_error!(RULE_FAILED_ERR, "rule [{}] evaluated to false", name),
        other => {
            if let Some(slot) = args.first_str_slot() {
                if let Err(e) = args.set_str(slot, value_to_string(&other)) {
                    return e.into();
                }
            }
            Outcome::ok()
        },
    }
}

/// Render without the quoting `Value`'s `Display` applies to strings
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Float(f) => f.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Tuple(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Empty => String::new(),
    }
}
