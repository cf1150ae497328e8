//! Per-request entry point into the rule engine chain

use std::rc::Rc;

use crate::args::Arguments;
use crate::callback::{AuditMode, Callback};
use crate::context::{with_context, RuleExecutionContext, SharedContext};
use crate::pep;
use crate::runtime::RuntimeContext;
use repf_common::DiagnosticsPolicy;
use repf_errors::codes::SYS_NOT_SUPPORTED;
use repf_errors::{rule_error, Outcome, RepfError, Result};

/// Operation name under which submitted rule text is guarded
pub const EXEC_MY_RULE: &str = "exec_my_rule";

/// Client-submitted rule text
#[derive(Debug, Clone, Default)]
pub struct RuleSubmission {
    /// Exact engine instance to run against; `None` offers the text to every engine
    pub instance_name: Option<String>,
    pub rule_text: String,
    pub params: Arguments,
    pub output_descriptor: String,
}

impl RuleSubmission {
    pub fn new(rule_text: impl Into<String>) -> Self {
        Self {
            rule_text: rule_text.into(),
            ..Default::default()
        }
    }

    pub fn with_instance(mut self, instance_name: impl Into<String>) -> Self {
        self.instance_name = Some(instance_name.into());
        self
    }

    pub fn with_params(mut self, params: Arguments) -> Self {
        self.params = params;
        self
    }

    pub fn with_output(mut self, output_descriptor: impl Into<String>) -> Self {
        self.output_descriptor = output_descriptor.into();
        self
    }
}

/// Binds one request context to the shared runtime
pub struct ContextManager<'rt> {
    callback: Callback<'rt>,
}

impl<'rt> ContextManager<'rt> {
    pub fn new(runtime: &'rt RuntimeContext, context: RuleExecutionContext, mode: AuditMode) -> Self {
        Self::with_shared(runtime, context.into_shared(), mode)
    }

    pub fn with_shared(runtime: &'rt RuntimeContext, context: SharedContext, mode: AuditMode) -> Self {
        Self {
            callback: Callback::new(runtime, context, mode),
        }
    }

    pub fn callback(&self) -> &Callback<'rt> {
        &self.callback
    }

    pub fn context(&self) -> &SharedContext {
        self.callback.context()
    }

    pub fn runtime(&self) -> &'rt RuntimeContext {
        self.callback.runtime()
    }

    /// Dispatch a named rule through the chain
    pub fn exec_rule(&self, name: &str, args: &mut Arguments) -> Outcome {
        self.callback.call(name, args)
    }

    pub fn rule_exists(&self, name: &str) -> Result<bool> {
        self.callback.rule_exists(name)
    }

    /// Rules of every engine, in chain order
    pub fn list_rules(&self) -> Result<Vec<String>> {
        let mut rules = Vec::new();
        for slot in self.runtime().chain().iter() {
            match slot.engine().list_rules() {
                Ok(mut names) => rules.append(&mut names),
                Err(e) => {
                    tracing::error!(
                        "Error in list_rules for instance [{}]: {}",
                        slot.instance_name(),
                        e
                    );
                    return Err(e);
                },
            }
        }
        Ok(rules)
    }

    /// Run rule text on exactly the named instance
    pub fn exec_rule_text(
        &self,
        instance_name: &str,
        rule_text: &str,
        params: &mut Arguments,
        output_descriptor: &str,
    ) -> Outcome {
        let Some(slot) = self.runtime().chain().find(instance_name) else {
            return RepfError::InstanceNotFound(instance_name.to_string()).into();
        };
        self.callback.audited(instance_name, || {
            slot.engine().exec_rule_text(
                instance_name,
                rule_text,
                params,
                output_descriptor,
                &self.callback,
            )
        })
    }

    /// Evaluate an expression on exactly the named instance
    pub fn exec_rule_expression(
        &self,
        instance_name: &str,
        expression: &str,
        params: &mut Arguments,
    ) -> Outcome {
        let Some(slot) = self.runtime().chain().find(instance_name) else {
            return RepfError::InstanceNotFound(instance_name.to_string()).into();
        };
        self.callback.audited(instance_name, || {
            slot.engine()
                .exec_rule_expression(expression, params, &self.callback)
        })
    }

    /// Fire a policy rule if any engine could implement it
    ///
    /// Names outside every registered pattern succeed without touching the chain.
    pub fn apply_rule(&self, name: &str, args: &mut Arguments) -> Outcome {
        if !self.runtime().is_started() {
            return RepfError::NotStarted.into();
        }
        if !self.runtime().rule_exists_helper().check_operation(name) {
            return Outcome::ok();
        }

        let outcome = self.exec_rule(name, args);
        if outcome.is_failure() {
            tracing::error!("applyRule: {}, {}", outcome.code, outcome.message);
            self.push_diagnostic(&outcome);
        }
        outcome
    }

    /// Run `op` under the pre/post/except/finally hooks of `operation`
    ///
    /// Requires a started runtime; otherwise no hook runs and `op` is not called.
    pub fn guard<F>(&self, operation: &str, instance_name: &str, args: &mut Arguments, op: F) -> Outcome
    where
        F: FnOnce(&Callback<'_>, &mut Arguments) -> Outcome,
    {
        pep::guard(&self.callback, operation, instance_name, args, op)
    }

    /// Execute client rule text under the `exec_my_rule` hooks
    ///
    /// With a target instance only that engine runs the text. Without one, each
    /// engine is offered it in chain order until one does not continue.
    pub fn submit_rule(&self, submission: &mut RuleSubmission) -> Outcome {
        let policy = self.runtime().pep().diagnostics;
        let mark = match with_context(self.context(), |ctx| ctx.error_stack.mark()) {
            Ok(mark) => mark,
            Err(e) => return e.into(),
        };

        let RuleSubmission {
            instance_name,
            rule_text,
            params,
            output_descriptor,
        } = submission;
        let label = instance_name.clone().unwrap_or_default();

        self.guard(EXEC_MY_RULE, &label, params, |_, params| match instance_name.as_deref() {
            Some(name) => self.exec_rule_text(name, rule_text, params, output_descriptor),
            None => {
                if policy == DiagnosticsPolicy::ClearForGenericCallers {
                    self.truncate_diagnostics(mark);
                }
                self.offer_rule_text(rule_text, params, output_descriptor, policy)
            },
        })
    }

    fn offer_rule_text(
        &self,
        rule_text: &str,
        params: &mut Arguments,
        output_descriptor: &str,
        policy: DiagnosticsPolicy,
    ) -> Outcome {
        for slot in self.runtime().chain().iter() {
            let mark = with_context(self.context(), |ctx| ctx.error_stack.mark()).ok();
            let outcome = self.callback.audited(slot.instance_name(), || {
                slot.engine().exec_rule_text(
                    slot.instance_name(),
                    rule_text,
                    params,
                    output_descriptor,
                    &self.callback,
                )
            });
            if !outcome.is_continuation() {
                return outcome;
            }

            tracing::debug!(
                "Instance [{}] declined rule text with [{}]",
                slot.instance_name(),
                outcome.code
            );
            if let (DiagnosticsPolicy::ClearForGenericCallers, Some(mark)) = (policy, mark) {
                self.truncate_diagnostics(mark);
            }
        }
        rule_error!(SYS_NOT_SUPPORTED, "no rule engine instance accepted the rule text")
    }

    fn push_diagnostic(&self, outcome: &Outcome) {
        if with_context(self.context(), |ctx| ctx.error_stack.push_outcome(outcome)).is_err() {
            tracing::warn!("Context busy; diagnostic [{}] not recorded", outcome.code);
        }
    }

    fn truncate_diagnostics(&self, mark: usize) {
        if with_context(self.context(), |ctx| ctx.error_stack.truncate_to(mark)).is_err() {
            tracing::warn!("Context busy; diagnostics not cleared");
        }
    }

    /// Release the request context
    ///
    /// Fails while an argument or engine still holds a handle to it.
    pub fn into_context(self) -> Result<RuleExecutionContext> {
        Rc::try_unwrap(self.callback.into_shared())
            .map(|cell| cell.into_inner())
            .map_err(|_| RepfError::ContextBusy)
    }
}
