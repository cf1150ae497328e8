//! Process-wide runtime: the chain, the registry and their settings
//!
//! Built once at process start and passed by reference to every request. After
//! [`RuntimeContext::start`] nothing in it is mutated until [`RuntimeContext::stop`].

use crate::chain::{PluginRegistry, RuleEngineChain};
use crate::microservice::MicroserviceRegistry;
use crate::rule_exists::RuleExistsHelper;
use crate::serialize::ArgumentSerializer;
use repf_common::{PepConfig, RepfConfig, DEFAULT_MAX_CALL_DEPTH};
use repf_errors::{RepfError, Result};

pub struct RuntimeContext {
    chain: RuleEngineChain,
    microservices: MicroserviceRegistry,
    serializer: ArgumentSerializer,
    pep: PepConfig,
    rule_exists: RuleExistsHelper,
    max_call_depth: usize,
    started: bool,
}

impl RuntimeContext {
    pub fn new(chain: RuleEngineChain, microservices: MicroserviceRegistry) -> Self {
        Self {
            chain,
            microservices,
            serializer: ArgumentSerializer::with_defaults(),
            pep: PepConfig::default(),
            rule_exists: RuleExistsHelper::new(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            started: false,
        }
    }

    /// Validate `config` and resolve its chain through `plugins`
    pub fn from_config(
        config: &RepfConfig,
        plugins: &PluginRegistry,
        microservices: MicroserviceRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let chain = RuleEngineChain::from_descriptors(plugins, &config.rule_engines)?;
        Ok(Self::new(chain, microservices)
            .with_pep_config(config.pep.clone())
            .with_max_call_depth(config.max_call_depth))
    }

    pub fn with_pep_config(mut self, pep: PepConfig) -> Self {
        self.pep = pep;
        self
    }

    pub fn with_serializer(mut self, serializer: ArgumentSerializer) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }

    /// Start every engine in chain order and build the rule-exists cache
    ///
    /// The first failing engine aborts startup; engines already started are
    /// stopped again in reverse order.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }

        for index in 0..self.chain.len() {
            let slot = &mut self.chain.slots_mut()[index];
            let instance_name = slot.instance_name().to_string();
            let plugin_name = slot.plugin_name().to_string();

            let outcome = slot.engine_mut().start(&instance_name);
            if outcome.is_failure() {
                tracing::error!(
                    "Failed to start rule engine instance [{}] ({}): {}",
                    instance_name,
                    plugin_name,
                    outcome
                );
                self.stop_first(index);
                return Err(RepfError::EngineStart {
                    instance_name,
                    code: outcome.code,
                    message: outcome.message,
                });
            }
            tracing::info!(
                "Started rule engine instance [{}] ({})",
                instance_name,
                plugin_name
            );
        }

        let patterns = self
            .chain
            .iter()
            .flat_map(|slot| slot.engine().rule_patterns())
            .chain(self.pep.rule_patterns.iter().cloned());
        match RuleExistsHelper::from_patterns(patterns) {
            Ok(helper) => self.rule_exists = helper,
            Err(e) => {
                tracing::error!("Failed to build rule-exists cache: {}", e);
                self.stop_first(self.chain.len());
                return Err(e);
            },
        }

        self.started = true;
        tracing::info!(
            "Rule engine chain started: [{}], {} microservices",
            self.chain.instance_names().join(", "),
            self.microservices.len()
        );
        Ok(())
    }

    /// Stop every engine in reverse chain order; failures are logged only
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        self.stop_first(self.chain.len());
        self.started = false;
    }

    fn stop_first(&mut self, count: usize) {
        for slot in self.chain.slots_mut()[..count].iter_mut().rev() {
            let instance_name = slot.instance_name().to_string();
            let outcome = slot.engine_mut().stop(&instance_name);
            if outcome.is_failure() {
                tracing::error!(
                    "Failed to stop rule engine instance [{}]: {}",
                    instance_name,
                    outcome
                );
            } else {
                tracing::info!("Stopped rule engine instance [{}]", instance_name);
            }
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn chain(&self) -> &RuleEngineChain {
        &self.chain
    }

    pub fn microservices(&self) -> &MicroserviceRegistry {
        &self.microservices
    }

    pub fn serializer(&self) -> &ArgumentSerializer {
        &self.serializer
    }

    pub fn pep(&self) -> &PepConfig {
        &self.pep
    }

    pub fn rule_exists_helper(&self) -> &RuleExistsHelper {
        &self.rule_exists
    }

    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }
}
