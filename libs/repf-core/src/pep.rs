//! Policy enforcement wrapper
//!
//! Wraps an operation with hook invocation against the chain:
//!
//! ```text
//!  pre ──skip──────────────────────┐
//!   │ ok                           ▼
//!   ├──fail──▶ except      main ──▶ post ──▶ done
//!   ▼                        │ fail   │ fail
//!  main ─────────────────────┴────────┴──▶ except
//!
//!  finally runs on every exit path, exactly once
//! ```
//!
//! Hooks are named `<namespace>pep_<operation>_<class>` and receive the frame
//! `[instance_name, out_param, ...operation args]`.

use std::fmt;

use crate::args::{Arg, Arguments};
use crate::callback::Callback;
use crate::context::with_context;
use repf_errors::{Outcome, RepfError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PepClass {
    Pre,
    Post,
    Except,
    Finally,
}

impl PepClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
            Self::Except => "except",
            Self::Finally => "finally",
        }
    }
}

impl fmt::Display for PepClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn hook_rule_name(namespace: &str, operation: &str, class: PepClass) -> String {
    format!("{}pep_{}_{}", namespace, operation, class)
}

/// One guarded operation in flight; dropping it runs the finally hooks
struct PepInvocation<'a, 'rt> {
    callback: &'a Callback<'rt>,
    operation: &'a str,
    instance_name: &'a str,
    out_param: String,
    args: &'a mut Arguments,
}

impl PepInvocation<'_, '_> {
    /// Run every namespace's hook for `class`
    ///
    /// Result: the first failure, else the skip code if any hook returned it,
    /// else success.
    fn invoke(&mut self, class: PepClass) -> Outcome {
        let runtime = self.callback.runtime();
        let mut failure: Option<Outcome> = None;
        let mut skip: Option<Outcome> = None;

        for namespace in &runtime.pep().namespaces {
            let rule_name = hook_rule_name(namespace, self.operation, class);
            if !runtime.rule_exists_helper().check_operation(&rule_name) {
                continue;
            }
            if !matches!(self.callback.rule_exists(&rule_name), Ok(true)) {
                tracing::trace!("Rule [{}] passes regex test, but does not exist", rule_name);
                continue;
            }

            let outcome = self.exec_hook(&rule_name);
            if outcome.is_failure() {
                tracing::debug!(
                    "{}-pep rule [{}] failed with error code [{}]",
                    class,
                    rule_name,
                    outcome.code
                );
                failure.get_or_insert(outcome);
            } else if outcome.is_skip() {
                if class != PepClass::Pre {
                    tracing::warn!(
                        "RULE_ENGINE_SKIP_OPERATION ({}) incorrectly returned from PEP [{}]! \
                         RULE_ENGINE_SKIP_OPERATION should only be returned from pre-PEPs!",
                        outcome.code,
                        rule_name
                    );
                }
                skip.get_or_insert(outcome);
            }
        }

        failure.or(skip).unwrap_or_else(Outcome::ok)
    }

    fn exec_hook(&mut self, rule_name: &str) -> Outcome {
        let out_param = std::mem::take(&mut self.out_param);
        self.args.prepend(vec![
            Arg::Str(self.instance_name.to_string()),
            Arg::StrPtr(Some(out_param)),
        ]);

        let outcome = self.callback.call(rule_name, &mut *self.args);

        // A hook may shrink the frame; whatever follows the two frame slots is the operation's
        if let Some(Arg::StrPtr(Some(out_param))) = self.args.take_prefix(2).into_iter().nth(1) {
            self.out_param = out_param;
        }
        outcome
    }

    /// Record `outcome` in the out parameter, run the except hooks, return `outcome`
    fn fail(&mut self, outcome: Outcome) -> Outcome {
        self.out_param = outcome.to_out_param();
        let except = self.invoke(PepClass::Except);
        if except.is_failure() {
            tracing::error!("except-pep for [{}] failed: {}", self.operation, except);
        }
        outcome
    }
}

impl Drop for PepInvocation<'_, '_> {
    fn drop(&mut self) {
        let finally = self.invoke(PepClass::Finally);
        if finally.is_failure() {
            tracing::error!("finally-pep for [{}] failed: {}", self.operation, finally);
        }

        let out_param = std::mem::take(&mut self.out_param);
        if with_context(self.callback.context(), |ctx| ctx.pep_output = Some(out_param)).is_err()
        {
            tracing::warn!("Context busy; hook output of [{}] dropped", self.operation);
        }
    }
}

/// Run `op` under the pre/post/except/finally protocol
///
/// Fails with [`RepfError::NotStarted`] before any hook or `op` runs when the
/// runtime has not been started.
pub fn guard<F>(
    callback: &Callback<'_>,
    operation: &str,
    instance_name: &str,
    args: &mut Arguments,
    op: F,
) -> Outcome
where
    F: FnOnce(&Callback<'_>, &mut Arguments) -> Outcome,
{
    // Hook lookup needs the patterns collected at start
    if !callback.runtime().is_started() {
        return RepfError::NotStarted.into();
    }

    let mut invocation = PepInvocation {
        callback,
        operation,
        instance_name,
        out_param: String::new(),
        args,
    };

    let pre = invocation.invoke(PepClass::Pre);
    let mut result = Outcome::ok();

    if !pre.is_skip() {
        if pre.is_failure() {
            return invocation.fail(pre);
        }

        result = op(callback, &mut *invocation.args);
        if result.is_error() && !callback.runtime().pep().is_acceptable(operation, result.code) {
            return invocation.fail(result);
        }
    }

    let post = invocation.invoke(PepClass::Post);
    if post.is_failure() {
        return invocation.fail(post);
    }

    result
}
