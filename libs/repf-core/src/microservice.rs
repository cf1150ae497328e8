//! Microservice registry, the dispatch of last resort

use rustc_hash::FxHashMap;

use crate::args::Arguments;
use crate::callback::Callback;
use repf_errors::codes::SYS_INVALID_INPUT_PARAM;
use repf_errors::{Outcome, RepfError, Result};

pub type MicroserviceFn = Box<dyn Fn(&Callback<'_>, &mut Arguments) -> Outcome>;

/// One built-in operation
pub struct MicroserviceEntry {
    name: String,
    arity: usize,
    function: MicroserviceFn,
}

impl MicroserviceEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn check_arity(&self, args: &Arguments) -> Result<()> {
        if args.len() != self.arity {
            return Err(RepfError::ArgumentCount {
                name: self.name.clone(),
                expected: self.arity,
                actual: args.len(),
            });
        }
        Ok(())
    }

    pub fn invoke(&self, callback: &Callback<'_>, args: &mut Arguments) -> Outcome {
        if let Err(e) = self.check_arity(args) {
            return e.into();
        }
        tracing::debug!("exec_microservice [{}]", self.name);
        (self.function)(callback, args)
    }
}

impl std::fmt::Debug for MicroserviceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicroserviceEntry")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Name to native function table
///
/// Populated before the runtime is built; the runtime only reads it.
#[derive(Debug, Default)]
pub struct MicroserviceRegistry {
    entries: FxHashMap<String, MicroserviceEntry>,
}

impl MicroserviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, arity: usize, function: F) -> Result<()>
    where
        F: Fn(&Callback<'_>, &mut Arguments) -> Outcome + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(RepfError::engine(
                SYS_INVALID_INPUT_PARAM,
                "empty microservice name",
            ));
        }
        if self.entries.contains_key(&name) {
            return Err(RepfError::engine(
                SYS_INVALID_INPUT_PARAM,
                format!("microservice [{}] already registered", name),
            ));
        }
        self.entries.insert(
            name.clone(),
            MicroserviceEntry {
                name,
                arity,
                function: Box::new(function),
            },
        );
        Ok(())
    }

    /// Move every entry of `other` into this registry
    pub fn extend(&mut self, other: MicroserviceRegistry) -> Result<()> {
        for (name, entry) in other.entries {
            if self.entries.contains_key(&name) {
                return Err(RepfError::engine(
                    SYS_INVALID_INPUT_PARAM,
                    format!("microservice [{}] already registered", name),
                ));
            }
            self.entries.insert(name, entry);
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&MicroserviceEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}
