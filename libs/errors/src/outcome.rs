//! Execution outcome returned by every dispatch attempt

use crate::codes::{self, is_continuation_code};
use crate::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of one dispatch attempt: a status code and a message.
///
/// Positive codes other than the framework control codes are success values,
/// e.g. a descriptor handed back by an open call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl Outcome {
    pub fn ok() -> Self {
        Self::code(codes::SUCCESS)
    }

    /// Bare status code with no message
    pub fn code(code: i32) -> Self {
        Self {
            code,
            message: String::new(),
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn continue_chain() -> Self {
        Self::code(codes::RULE_ENGINE_CONTINUE)
    }

    pub fn skip_operation() -> Self {
        Self::code(codes::RULE_ENGINE_SKIP_OPERATION)
    }

    pub fn is_success(&self) -> bool {
        self.code == codes::SUCCESS
    }

    pub fn is_continuation(&self) -> bool {
        is_continuation_code(self.code)
    }

    pub fn is_skip(&self) -> bool {
        self.code == codes::RULE_ENGINE_SKIP_OPERATION
    }

    /// Any negative code, continuation codes included
    ///
    /// Guarded operations are not rule engines; a decline code from one is a
    /// real error.
    pub fn is_error(&self) -> bool {
        self.code < 0
    }

    /// Hard failure: negative and not a continuation code
    pub fn is_failure(&self) -> bool {
        self.code < 0 && !self.is_continuation()
    }

    pub fn category(&self) -> ErrorCategory {
        if self.is_continuation() {
            ErrorCategory::Continuation
        } else if self.is_skip() {
            ErrorCategory::Skip
        } else if self.is_failure() {
            ErrorCategory::from_code(self.code)
        } else {
            ErrorCategory::Success
        }
    }

    /// Out-parameter form handed to except hooks
    pub fn to_out_param(&self) -> String {
        format!("error={};message={}", self.code, self.message)
    }
}

impl Default for Outcome {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match codes::code_name(self.code) {
            Some(name) => write!(f, "[{}] {}", name, self.code)?,
            None => write!(f, "[{}]", self.code)?,
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}
