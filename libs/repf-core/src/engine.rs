//! Rule engine instance contract

use crate::args::Arguments;
use crate::callback::Callback;
use repf_errors::{Outcome, Result};

/// Pattern accepting every rule name
pub const MATCH_ALL_PATTERN: &str = ".*";

/// A named, configured rule engine adapter
///
/// `start` and `stop` run once at process start/stop with exclusive access; all
/// other operations take `&self` because the chain is shared read-only while
/// requests are served. Engines needing per-call state use interior mutability.
pub trait RuleEngine {
    /// One-time initialization; a failure aborts startup
    fn start(&mut self, instance_name: &str) -> Outcome;

    /// Best-effort teardown
    fn stop(&mut self, instance_name: &str) -> Outcome;

    /// Pure query: does this engine implement `name`?
    fn rule_exists(&self, name: &str) -> Result<bool>;

    /// Rule names the engine currently recognizes
    fn list_rules(&self) -> Result<Vec<String>>;

    /// Execute the named rule; `callback` re-enters dispatch for nested calls
    fn exec_rule(&self, name: &str, args: &mut Arguments, callback: &Callback<'_>) -> Outcome;

    /// Execute ad-hoc rule source against this engine only
    fn exec_rule_text(
        &self,
        instance_name: &str,
        text: &str,
        params: &mut Arguments,
        output_descriptor: &str,
        callback: &Callback<'_>,
    ) -> Outcome;

    /// Evaluate a single expression
    fn exec_rule_expression(
        &self,
        expression: &str,
        params: &mut Arguments,
        callback: &Callback<'_>,
    ) -> Outcome;

    /// Rule-name patterns fed into the rule-exists cache at startup
    fn rule_patterns(&self) -> Vec<String> {
        vec![MATCH_ALL_PATTERN.to_string()]
    }
}
