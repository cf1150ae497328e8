//! REPF Core - Rule Engine Plugin Framework
//!
//! Routes named operations through an ordered chain of rule engine instances:
//! - Chain dispatch with continuation codes and a microservice fallback
//! - Pre/post/except/finally policy hooks around guarded operations
//! - Re-entrant callbacks with a single-shot guard for audited calls
//! - Argument serialization into flat string maps for interpreters
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │ ContextManager │────▶│   pep guard  │────▶│ dispatch control │
//! │  (per request) │     │ (4 phases)   │     │  (chain walk)    │
//! └────────────────┘     └──────────────┘     └──────────────────┘
//!         │                                      │          │
//!         ▼                                      ▼          ▼
//! ┌────────────────┐                    ┌─────────────┐ ┌──────────────┐
//! │ RuntimeContext │───────────────────▶│ RuleEngine  │ │ Microservice │
//! │ (process-wide) │                    │  instances  │ │   registry   │
//! └────────────────┘                    └─────────────┘ └──────────────┘
//!                                              │
//!                                              └── Callback re-enters control
//! ```

pub mod args;
mod callback;
mod chain;
mod context;
pub mod dispatch;
mod engine;
mod manager;
mod microservice;
pub mod pep;
mod rule_exists;
mod runtime;
pub mod serialize;
pub mod types;

// Re-export public API
pub use args::{Arg, ArgKind, Arguments};
pub use callback::{AuditMode, Callback, SingleShotCall, SingleShotGuard};
pub use chain::{EngineFactory, EngineSlot, PluginRegistry, RuleEngineChain};
pub use context::{with_context, ErrorEntry, ErrorStack, RuleExecutionContext, SharedContext};
pub use dispatch::UNSAFE_MS_CTX;
pub use engine::{RuleEngine, MATCH_ALL_PATTERN};
pub use manager::{ContextManager, RuleSubmission, EXEC_MY_RULE};
pub use microservice::{MicroserviceEntry, MicroserviceFn, MicroserviceRegistry};
pub use pep::{hook_rule_name, PepClass};
pub use rule_exists::RuleExistsHelper;
pub use runtime::RuntimeContext;
pub use serialize::{ArgumentSerializer, SerializeFn, SerializedMap};
pub use types::KeyValPair;

// Errors and configuration used across the public API
pub use repf_common::{DiagnosticsPolicy, PepConfig, RepfConfig, RuleEngineDescriptor};
pub use repf_errors::{codes, Outcome, RepfError, Result};
