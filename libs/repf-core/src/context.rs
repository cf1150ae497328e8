//! Per-request rule execution context
//!
//! One [`RuleExecutionContext`] exists per client request. It is threaded through
//! every hook and nested call as a [`SharedContext`]; the `Rc` keeps it confined
//! to the thread serving the request.

use std::cell::RefCell;
use std::rc::Rc;

use crate::types::{ConnectionInfo, KeyValPair, UserInfo};
use repf_errors::{Outcome, RepfError, Result};

pub type SharedContext = Rc<RefCell<RuleExecutionContext>>;

/// One accumulated diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    pub code: i32,
    pub message: String,
}

/// Diagnostics accumulated while serving a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorStack {
    entries: Vec<ErrorEntry>,
}

impl ErrorStack {
    pub fn push(&mut self, code: i32, message: impl Into<String>) {
        self.entries.push(ErrorEntry {
            code,
            message: message.into(),
        });
    }

    pub fn push_outcome(&mut self, outcome: &Outcome) {
        self.push(outcome.code, outcome.message.clone());
    }

    /// Position to truncate back to
    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    pub fn truncate_to(&mut self, mark: usize) {
        self.entries.truncate(mark);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ErrorEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&ErrorEntry> {
        self.entries.last()
    }
}

/// Per-request state: caller identity, condition inputs, output parameters
#[derive(Debug, Clone, Default)]
pub struct RuleExecutionContext {
    pub client_user: Option<UserInfo>,
    pub proxy_user: Option<UserInfo>,
    pub connection: Option<ConnectionInfo>,
    pub condition_inputs: KeyValPair,
    /// Named outputs of rule text execution, in insertion order
    pub output_params: Vec<(String, String)>,
    pub error_stack: ErrorStack,
    /// Out parameter left by the last guarded operation's hooks
    pub pep_output: Option<String>,
    call_depth: usize,
}

impl RuleExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a connected client; user fields mirror the connection
    pub fn for_connection(connection: ConnectionInfo) -> Self {
        Self {
            client_user: Some(connection.client_user.clone()),
            proxy_user: Some(connection.proxy_user.clone()),
            connection: Some(connection),
            ..Default::default()
        }
    }

    pub fn into_shared(self) -> SharedContext {
        Rc::new(RefCell::new(self))
    }

    pub fn set_output(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.output_params.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.output_params.push((name, value)),
        }
    }

    pub fn output(&self, name: &str) -> Option<&str> {
        self.output_params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    pub(crate) fn enter_call(&mut self, max_depth: usize) -> Result<()> {
        if self.call_depth >= max_depth {
            return Err(RepfError::CallDepthExceeded(max_depth));
        }
        self.call_depth += 1;
        Ok(())
    }

    pub(crate) fn leave_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }
}

/// Run `f` against the context without holding the borrow across other calls
pub fn with_context<T>(
    context: &SharedContext,
    f: impl FnOnce(&mut RuleExecutionContext) -> T,
) -> Result<T> {
    let mut guard = context.try_borrow_mut().map_err(|_| RepfError::ContextBusy)?;
    Ok(f(&mut guard))
}
