//! Unified error handling for the rule engine plugin framework
//!
//! Every failure in the framework is ultimately reported as a status code plus a
//! message ([`Outcome`]). [`RepfError`] is the typed form used inside the crates;
//! each variant maps onto exactly one code so errors survive the trip through
//! engines and hooks unchanged.

pub mod codes;
mod outcome;

pub use outcome::Outcome;

use codes::*;
use thiserror::Error;

/// Result type for framework operations
pub type Result<T> = std::result::Result<T, RepfError>;

// ============================================================================
// ErrorCategory - taxonomy
// ============================================================================

/// Classification of an outcome or error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Success,
    /// Engine declined a rule it matched, the chain advances
    Continuation,
    /// Pre hook vetoed the main operation
    Skip,
    /// Any other failure, propagated verbatim
    HardFailure,
    /// Startup failure resolving or starting an engine
    Configuration,
    /// Unsupported type, double execution, unknown instance
    TypeLogic,
}

impl ErrorCategory {
    /// Category of a failing status code
    pub fn from_code(code: i32) -> Self {
        match code {
            SYS_CONFIG_FILE_ERR | PLUGIN_ERROR => Self::Configuration,
            RE_TYPE_ERROR
            | INVALID_ANY_CAST
            | ACTION_ARG_COUNT_MISMATCH
            | SYS_INVALID_INPUT_PARAM
            | KEY_NOT_FOUND => Self::TypeLogic,
            _ => Self::HardFailure,
        }
    }
}

// ============================================================================
// RepfError - Main error type
// ============================================================================

/// Main error type for the framework crates
#[derive(Debug, Error)]
pub enum RepfError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("failed to resolve plugin [{plugin_name}] for instance [{instance_name}]")]
    PluginNotFound {
        plugin_name: String,
        instance_name: String,
    },

    #[error("duplicate rule engine instance [{0}]")]
    DuplicateInstance(String),

    #[error("failed to start rule engine instance [{instance_name}]: [{code}] {message}")]
    EngineStart {
        instance_name: String,
        code: i32,
        message: String,
    },

    // ======================================
    // Dispatch Errors
    // ======================================
    #[error("instance not found [{0}]")]
    InstanceNotFound(String),

    #[error("no rule or microservice found for [{0}]")]
    RuleNotFound(String),

    #[error("maximum call depth [{0}] exceeded")]
    CallDepthExceeded(usize),

    #[error("rule engine chain not started")]
    NotStarted,

    #[error("rule execution context is already borrowed")]
    ContextBusy,

    #[error("{message}")]
    Engine { code: i32, message: String },

    #[error("Expression error: {0}")]
    Expression(String),

    // ======================================
    // Type & Logic Errors
    // ======================================
    #[error("argument count mismatch for [{name}]: expected {expected}, got {actual}")]
    ArgumentCount {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("argument type mismatch: expected {expected}, got {actual}")]
    ArgumentType { expected: String, actual: String },

    #[error("cannot execute operation more than once with client supplied arguments [{operation}]")]
    AlreadyExecuted { operation: String },

    #[error("type_index exists [{0}]")]
    DuplicateSerializer(String),

    #[error("invalid rule pattern [{pattern}]: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepfError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn engine(code: i32, message: impl Into<String>) -> Self {
        Self::Engine {
            code,
            message: message.into(),
        }
    }

    pub fn expression(msg: impl Into<String>) -> Self {
        Self::Expression(msg.into())
    }

    pub fn argument_type(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ArgumentType {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Status code carried by this error
    pub fn code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::InvalidConfig { .. } => SYS_CONFIG_FILE_ERR,
            Self::PluginNotFound { .. } => PLUGIN_ERROR,
            Self::DuplicateInstance(_) => SYS_INVALID_INPUT_PARAM,
            Self::EngineStart { code, .. } => *code,
            Self::InstanceNotFound(_) => SYS_INVALID_INPUT_PARAM,
            Self::RuleNotFound(_) => NO_RULE_OR_MSI_FUNCTION_FOUND_ERR,
            Self::CallDepthExceeded(_) | Self::ContextBusy | Self::NotStarted => RULE_ENGINE_ERROR,
            Self::Engine { code, .. } => *code,
            Self::Expression(_) => RULE_FAILED_ERR,
            Self::ArgumentCount { .. } => ACTION_ARG_COUNT_MISMATCH,
            Self::ArgumentType { .. } => INVALID_ANY_CAST,
            Self::AlreadyExecuted { .. } => RE_TYPE_ERROR,
            Self::DuplicateSerializer(_) => KEY_NOT_FOUND,
            Self::InvalidPattern { .. } | Self::Serialization(_) => SYS_INVALID_INPUT_PARAM,
        }
    }

    /// Stable error code string (for logs)
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::PluginNotFound { .. } => "PLUGIN_NOT_FOUND",
            Self::DuplicateInstance(_) => "DUPLICATE_INSTANCE",
            Self::EngineStart { .. } => "ENGINE_START_FAILED",
            Self::InstanceNotFound(_) => "INSTANCE_NOT_FOUND",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::CallDepthExceeded(_) => "CALL_DEPTH_EXCEEDED",
            Self::ContextBusy => "CONTEXT_BUSY",
            Self::NotStarted => "NOT_STARTED",
            Self::Engine { .. } => "ENGINE_ERROR",
            Self::Expression(_) => "EXPRESSION_ERROR",
            Self::ArgumentCount { .. } => "ARGUMENT_COUNT_MISMATCH",
            Self::ArgumentType { .. } => "ARGUMENT_TYPE_MISMATCH",
            Self::AlreadyExecuted { .. } => "ALREADY_EXECUTED",
            Self::DuplicateSerializer(_) => "DUPLICATE_SERIALIZER",
            Self::InvalidPattern { .. } => "INVALID_PATTERN",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_)
            | Self::InvalidConfig { .. }
            | Self::PluginNotFound { .. }
            | Self::DuplicateInstance(_)
            | Self::EngineStart { .. } => ErrorCategory::Configuration,
            Self::InstanceNotFound(_)
            | Self::ArgumentCount { .. }
            | Self::ArgumentType { .. }
            | Self::AlreadyExecuted { .. }
            | Self::DuplicateSerializer(_)
            | Self::InvalidPattern { .. }
            | Self::Serialization(_) => ErrorCategory::TypeLogic,
            Self::Engine { code, .. } => Outcome::code(*code).category(),
            Self::RuleNotFound(_)
            | Self::CallDepthExceeded(_)
            | Self::ContextBusy
            | Self::NotStarted
            | Self::Expression(_) => ErrorCategory::HardFailure,
        }
    }

    /// Whether this error must abort process startup
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    /// Get log level
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Configuration => Level::ERROR,
            ErrorCategory::TypeLogic | ErrorCategory::HardFailure => Level::WARN,
            _ => Level::DEBUG,
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<RepfError> for Outcome {
    fn from(err: RepfError) -> Self {
        match err {
            RepfError::Engine { code, message } => Outcome::error(code, message),
            other => Outcome::error(other.code(), other.to_string()),
        }
    }
}

impl From<Outcome> for RepfError {
    fn from(outcome: Outcome) -> Self {
        RepfError::Engine {
            code: outcome.code,
            message: outcome.message,
        }
    }
}

impl From<serde_json::Error> for RepfError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::RepfError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::RepfError::Configuration(format!($fmt, $($arg)*))
    };
}

/// Build a failing [`Outcome`] with a formatted message
#[macro_export]
macro_rules! rule_error {
    ($code:expr, $msg:expr) => {
        $crate::Outcome::error($code, $msg.to_string())
    };
    ($code:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::Outcome::error($code, format!($fmt, $($arg)*))
    };
}
