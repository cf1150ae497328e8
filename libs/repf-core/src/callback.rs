//! Re-entrant callback and single-shot guard
//!
//! A [`Callback`] is handed to every engine and microservice call. Invoking it
//! re-enters the dispatch controller with the same runtime and context. In
//! audit mode each call runs inside a fresh [`SingleShotGuard`].

use crate::args::Arguments;
use crate::context::{with_context, SharedContext};
use crate::dispatch;
use crate::runtime::RuntimeContext;
use crate::serialize::ArgumentSerializer;
use repf_errors::{Outcome, RepfError, Result};

/// Whether calls run through the single-shot guard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuditMode {
    #[default]
    Audit,
    DontAudit,
}

/// Runs its captured closure at most once
///
/// Later calls return `RE_TYPE_ERROR` without touching the captured arguments.
pub struct SingleShotGuard<F> {
    operation: String,
    call: Option<F>,
}

impl<F> SingleShotGuard<F>
where
    F: FnOnce() -> Outcome,
{
    pub fn new(operation: impl Into<String>, call: F) -> Self {
        Self {
            operation: operation.into(),
            call: Some(call),
        }
    }

    pub fn call(&mut self) -> Outcome {
        match self.call.take() {
            Some(call) => call(),
            None => RepfError::AlreadyExecuted {
                operation: self.operation.clone(),
            }
            .into(),
        }
    }

    pub fn is_spent(&self) -> bool {
        self.call.is_none()
    }
}

/// A captured re-entrant call with client-supplied arguments
pub type SingleShotCall<'a> = SingleShotGuard<Box<dyn FnOnce() -> Outcome + 'a>>;

/// Re-entry handle bound to one runtime and one request context
#[derive(Clone)]
pub struct Callback<'rt> {
    runtime: &'rt RuntimeContext,
    context: SharedContext,
    mode: AuditMode,
}

impl<'rt> Callback<'rt> {
    pub fn new(runtime: &'rt RuntimeContext, context: SharedContext, mode: AuditMode) -> Self {
        Self {
            runtime,
            context,
            mode,
        }
    }

    /// Dispatch `name` through the chain, falling back to microservices
    pub fn call(&self, name: &str, args: &mut Arguments) -> Outcome {
        match self.mode {
            AuditMode::Audit => self.capture(name, args).call(),
            AuditMode::DontAudit => self.exec_op(name, args),
        }
    }

    /// Capture a call without running it
    pub fn capture<'a>(&'a self, name: &'a str, args: &'a mut Arguments) -> SingleShotCall<'a> {
        SingleShotGuard::new(name, Box::new(move || self.exec_op(name, args)))
    }

    /// Run `f` honoring the audit mode
    pub(crate) fn audited(&self, operation: &str, f: impl FnOnce() -> Outcome) -> Outcome {
        match self.mode {
            AuditMode::Audit => {
                tracing::debug!("exec_op [{}]", operation);
                SingleShotGuard::new(operation, f).call()
            },
            AuditMode::DontAudit => f(),
        }
    }

    fn exec_op(&self, name: &str, args: &mut Arguments) -> Outcome {
        if self.mode == AuditMode::Audit {
            tracing::debug!("exec_op [{}]", name);
        }

        let max_depth = self.runtime.max_call_depth();
        if let Err(e) = with_context(&self.context, |ctx| ctx.enter_call(max_depth))
            .and_then(|entered| entered)
        {
            return e.into();
        }

        let outcome = dispatch::control(self, name, args);

        if with_context(&self.context, |ctx| ctx.leave_call()).is_err() {
            tracing::warn!("Context busy while leaving [{}]; call depth not restored", name);
        }
        outcome
    }

    /// Whether any engine in the chain implements `name`
    pub fn rule_exists(&self, name: &str) -> Result<bool> {
        for slot in self.runtime.chain().iter() {
            if slot.engine().rule_exists(name)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    pub fn runtime(&self) -> &'rt RuntimeContext {
        self.runtime
    }

    pub fn serializer(&self) -> &'rt ArgumentSerializer {
        self.runtime.serializer()
    }

    pub fn mode(&self) -> AuditMode {
        self.mode
    }

    pub fn into_shared(self) -> SharedContext {
        self.context
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use repf_errors::codes::RE_TYPE_ERROR;
    use std::cell::Cell;

    #[test]
    fn test_single_shot_guard_runs_once() {
        let runs = Cell::new(0);
        let mut guard = SingleShotGuard::new("msiDataObjUnlink", || {
            runs.set(runs.get() + 1);
            Outcome::ok()
        });

        assert!(guard.call().is_success());
        assert!(guard.is_spent());

        let second = guard.call();
        assert_eq!(second.code, RE_TYPE_ERROR);
        assert!(second
            .message
            .contains("cannot execute operation more than once with client supplied arguments"));
        assert_eq!(runs.get(), 1);
    }
}
