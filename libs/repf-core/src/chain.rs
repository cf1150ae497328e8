//! Rule engine chain and plugin resolution
//!
//! The chain is built once from configuration, in configuration order, and is
//! never mutated while requests are served.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::engine::RuleEngine;
use repf_common::RuleEngineDescriptor;
use repf_errors::{RepfError, Result};

/// Builds an engine from its descriptor
pub type EngineFactory = Box<dyn Fn(&RuleEngineDescriptor) -> Result<Box<dyn RuleEngine>>>;

/// Adapters selectable by `plugin_name`
#[derive(Default)]
pub struct PluginRegistry {
    factories: FxHashMap<String, EngineFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the factory for `plugin_name`
    pub fn register<F>(&mut self, plugin_name: impl Into<String>, factory: F)
    where
        F: Fn(&RuleEngineDescriptor) -> Result<Box<dyn RuleEngine>> + 'static,
    {
        self.factories.insert(plugin_name.into(), Box::new(factory));
    }

    pub fn contains(&self, plugin_name: &str) -> bool {
        self.factories.contains_key(plugin_name)
    }

    pub fn plugin_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate the engine a descriptor asks for
    pub fn resolve(&self, descriptor: &RuleEngineDescriptor) -> Result<Box<dyn RuleEngine>> {
        let factory = self
            .factories
            .get(&descriptor.plugin_name)
            .ok_or_else(|| RepfError::PluginNotFound {
                plugin_name: descriptor.plugin_name.clone(),
                instance_name: descriptor.instance_name.clone(),
            })?;
        factory(descriptor)
    }
}

/// One configured engine in the chain
pub struct EngineSlot {
    instance_name: String,
    plugin_name: String,
    shared_memory_instance: Option<String>,
    engine: Box<dyn RuleEngine>,
}

impl EngineSlot {
    pub fn new(
        instance_name: impl Into<String>,
        plugin_name: impl Into<String>,
        engine: Box<dyn RuleEngine>,
    ) -> Self {
        Self {
            instance_name: instance_name.into(),
            plugin_name: plugin_name.into(),
            shared_memory_instance: None,
            engine,
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn shared_memory_instance(&self) -> Option<&str> {
        self.shared_memory_instance.as_deref()
    }

    pub fn engine(&self) -> &dyn RuleEngine {
        self.engine.as_ref()
    }

    pub(crate) fn engine_mut(&mut self) -> &mut dyn RuleEngine {
        self.engine.as_mut()
    }
}

/// Ordered engine instances; dispatch order is configuration order
#[derive(Default)]
pub struct RuleEngineChain {
    slots: Vec<EngineSlot>,
}

impl RuleEngineChain {
    /// Build from pre-constructed slots, rejecting duplicate instance names
    pub fn new(slots: Vec<EngineSlot>) -> Result<Self> {
        let mut seen = FxHashSet::default();
        for slot in &slots {
            if !seen.insert(slot.instance_name.as_str()) {
                return Err(RepfError::DuplicateInstance(slot.instance_name.clone()));
            }
        }
        Ok(Self { slots })
    }

    /// Resolve every descriptor, in order
    pub fn from_descriptors(
        plugins: &PluginRegistry,
        descriptors: &[RuleEngineDescriptor],
    ) -> Result<Self> {
        let mut slots = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let engine = plugins.resolve(descriptor)?;
            tracing::debug!(
                "Resolved plugin [{}] for instance [{}]",
                descriptor.plugin_name,
                descriptor.instance_name
            );
            slots.push(EngineSlot {
                instance_name: descriptor.instance_name.clone(),
                plugin_name: descriptor.plugin_name.clone(),
                shared_memory_instance: descriptor.shared_memory_instance.clone(),
                engine,
            });
        }
        Self::new(slots)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EngineSlot> {
        self.slots.iter()
    }

    /// Exact-match lookup by instance name
    pub fn find(&self, instance_name: &str) -> Option<&EngineSlot> {
        self.slots
            .iter()
            .find(|slot| slot.instance_name == instance_name)
    }

    pub fn instance_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.instance_name.as_str()).collect()
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [EngineSlot] {
        &mut self.slots
    }
}
