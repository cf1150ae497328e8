//! Shared fixtures: a scriptable rule engine and runtime builders

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use repf_core::codes::{RULE_ENGINE_ERROR, RULE_FAILED_ERR, SUCCESS};
use repf_core::{
    with_context, Arg, Arguments, Callback, EngineSlot, MicroserviceRegistry, Outcome, RepfError,
    Result, RuleEngine, RuleEngineChain, RuntimeContext,
};

/// What a scripted rule does when executed
#[derive(Debug, Clone)]
pub enum Behavior {
    Return(i32),
    /// Re-enter dispatch with another name and return its outcome
    Call(&'static str),
    /// Write into the first string slot, then succeed
    WriteFirstSlot(&'static str),
    /// Push an error-stack entry, then succeed
    Note(&'static str),
}

/// Everything the engines observed, shared across a test
#[derive(Debug, Default)]
pub struct Probe {
    pub exists_queries: RefCell<Vec<String>>,
    pub executed: RefCell<Vec<String>>,
    /// `(rule, out_param)` seen in hook frames
    pub out_params: RefCell<Vec<(String, String)>>,
    pub text_calls: RefCell<Vec<String>>,
    pub expression_calls: Cell<usize>,
    pub started: RefCell<Vec<String>>,
    pub stopped: RefCell<Vec<String>>,
}

impl Probe {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }

    pub fn record(&self, event: impl Into<String>) {
        self.executed.borrow_mut().push(event.into());
    }
}

pub struct MockEngine {
    probe: Rc<Probe>,
    rules: BTreeMap<String, Behavior>,
    patterns: Option<Vec<String>>,
    text_code: i32,
    text_note: Option<&'static str>,
    fail_start: bool,
    fail_exists: bool,
    fail_list: bool,
}

impl MockEngine {
    pub fn new(probe: &Rc<Probe>) -> Self {
        Self {
            probe: Rc::clone(probe),
            rules: BTreeMap::new(),
            patterns: None,
            text_code: SUCCESS,
            text_note: None,
            fail_start: false,
            fail_exists: false,
            fail_list: false,
        }
    }

    pub fn rule(mut self, name: &str, behavior: Behavior) -> Self {
        self.rules.insert(name.to_string(), behavior);
        self
    }

    pub fn patterns(mut self, patterns: &[&str]) -> Self {
        self.patterns = Some(patterns.iter().map(|p| p.to_string()).collect());
        self
    }

    /// Code returned from text and expression execution
    pub fn text_code(mut self, code: i32) -> Self {
        self.text_code = code;
        self
    }

    /// Error-stack entry pushed whenever rule text is executed
    pub fn text_note(mut self, note: &'static str) -> Self {
        self.text_note = Some(note);
        self
    }

    pub fn fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn fail_exists(mut self) -> Self {
        self.fail_exists = true;
        self
    }

    pub fn fail_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn boxed(self) -> Box<dyn RuleEngine> {
        Box::new(self)
    }
}

impl RuleEngine for MockEngine {
    fn start(&mut self, instance_name: &str) -> Outcome {
        if self.fail_start {
            return Outcome::error(RULE_ENGINE_ERROR, "refusing to start");
        }
        self.probe.started.borrow_mut().push(instance_name.to_string());
        Outcome::ok()
    }

    fn stop(&mut self, instance_name: &str) -> Outcome {
        self.probe.stopped.borrow_mut().push(instance_name.to_string());
        Outcome::ok()
    }

    fn rule_exists(&self, name: &str) -> Result<bool> {
        self.probe.exists_queries.borrow_mut().push(name.to_string());
        if self.fail_exists {
            return Err(RepfError::engine(RULE_ENGINE_ERROR, "rule store unavailable"));
        }
        Ok(self.rules.contains_key(name))
    }

    fn list_rules(&self) -> Result<Vec<String>> {
        if self.fail_list {
            return Err(RepfError::engine(RULE_ENGINE_ERROR, "rule store unavailable"));
        }
        Ok(self.rules.keys().cloned().collect())
    }

    fn exec_rule(&self, name: &str, args: &mut Arguments, callback: &Callback<'_>) -> Outcome {
        self.probe.record(name);
        if let Some(Arg::StrPtr(Some(out_param))) = args.get(1) {
            self.probe
                .out_params
                .borrow_mut()
                .push((name.to_string(), out_param.clone()));
        }

        match self.rules.get(name) {
            Some(Behavior::Return(code)) => Outcome::code(*code),
            Some(Behavior::Call(next)) => callback.call(next, args),
            Some(Behavior::WriteFirstSlot(value)) => match args.first_str_slot() {
                Some(index) => match args.set_str(index, *value) {
                    Ok(()) => Outcome::ok(),
                    Err(e) => e.into(),
                },
                None => Outcome::error(RULE_FAILED_ERR, "no string slot"),
            },
            Some(Behavior::Note(note)) => {
                with_context(callback.context(), |ctx| {
                    ctx.error_stack.push(RULE_FAILED_ERR, *note)
                })
                .unwrap();
                Outcome::ok()
            },
            None => Outcome::error(RULE_FAILED_ERR, "not scripted"),
        }
    }

    fn exec_rule_text(
        &self,
        instance_name: &str,
        text: &str,
        _params: &mut Arguments,
        output_descriptor: &str,
        callback: &Callback<'_>,
    ) -> Outcome {
        self.probe.text_calls.borrow_mut().push(instance_name.to_string());
        if let Some(note) = self.text_note {
            with_context(callback.context(), |ctx| {
                ctx.error_stack.push(self.text_code, note)
            })
            .unwrap();
        }
        if self.text_code == SUCCESS && !output_descriptor.is_empty() {
            with_context(callback.context(), |ctx| ctx.set_output(output_descriptor, text))
                .unwrap();
        }
        Outcome::code(self.text_code)
    }

    fn exec_rule_expression(
        &self,
        _expression: &str,
        _params: &mut Arguments,
        _callback: &Callback<'_>,
    ) -> Outcome {
        self.probe
            .expression_calls
            .set(self.probe.expression_calls.get() + 1);
        Outcome::code(self.text_code)
    }

    fn rule_patterns(&self) -> Vec<String> {
        match &self.patterns {
            Some(patterns) => patterns.clone(),
            None => vec![".*".to_string()],
        }
    }
}

/// Build and start a runtime from `(instance_name, engine)` pairs
pub fn started_runtime(
    engines: Vec<(&str, MockEngine)>,
    microservices: MicroserviceRegistry,
) -> RuntimeContext {
    let mut runtime = unstarted_runtime(engines, microservices);
    runtime.start().unwrap();
    runtime
}

pub fn unstarted_runtime(
    engines: Vec<(&str, MockEngine)>,
    microservices: MicroserviceRegistry,
) -> RuntimeContext {
    let slots = engines
        .into_iter()
        .map(|(instance, engine)| EngineSlot::new(instance, "mock", engine.boxed()))
        .collect();
    RuntimeContext::new(RuleEngineChain::new(slots).unwrap(), microservices)
}

/// Registry with one microservice that records its invocation
pub fn recording_microservice(probe: &Rc<Probe>, name: &'static str, arity: usize) -> MicroserviceRegistry {
    let mut registry = MicroserviceRegistry::new();
    let probe = Rc::clone(probe);
    registry
        .register(name, arity, move |_, _| {
            probe.record(format!("msi:{}", name));
            Outcome::ok()
        })
        .unwrap();
    registry
}
