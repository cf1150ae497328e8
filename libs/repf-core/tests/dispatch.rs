//! Integration tests for chain dispatch, the callback and the context manager

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

mod common;

use std::rc::Rc;

use common::{recording_microservice, started_runtime, unstarted_runtime, Behavior, MockEngine, Probe};
use repf_core::codes::{
    ACTION_ARG_COUNT_MISMATCH, NO_RULE_OR_MSI_FUNCTION_FOUND_ERR, PLUGIN_ERROR, RE_TYPE_ERROR,
    RULE_ENGINE_CONTINUE, RULE_ENGINE_ERROR, RULE_FAILED_ERR, SYS_INTERNAL_NULL_INPUT_ERR,
    SYS_INVALID_INPUT_PARAM, SYS_NOT_SUPPORTED,
};
use repf_core::{
    Arg, Arguments, AuditMode, ContextManager, EngineSlot, MicroserviceRegistry, PluginRegistry,
    RepfError, RuleEngineChain, RuleEngineDescriptor, RuleExecutionContext, UNSAFE_MS_CTX,
};

fn manager(runtime: &repf_core::RuntimeContext) -> ContextManager<'_> {
    ContextManager::new(runtime, RuleExecutionContext::new(), AuditMode::Audit)
}

#[test]
fn test_continuation_falls_through_to_next_engine() {
    let probe = Probe::new();
    let runtime = started_runtime(
        vec![
            ("first", MockEngine::new(&probe).rule("acCheck", Behavior::Return(RULE_ENGINE_CONTINUE))),
            ("second", MockEngine::new(&probe).rule("acCheck", Behavior::Return(0))),
        ],
        MicroserviceRegistry::new(),
    );

    let outcome = manager(&runtime).exec_rule("acCheck", &mut Arguments::new());

    assert!(outcome.is_success());
    assert_eq!(probe.executed(), vec!["acCheck", "acCheck"]);
}

#[test]
fn test_first_non_continuation_ends_walk() {
    let probe = Probe::new();
    let runtime = started_runtime(
        vec![
            ("first", MockEngine::new(&probe).rule("acCheck", Behavior::Return(RULE_FAILED_ERR))),
            ("second", MockEngine::new(&probe).rule("acCheck", Behavior::Return(0))),
        ],
        MicroserviceRegistry::new(),
    );

    let outcome = manager(&runtime).exec_rule("acCheck", &mut Arguments::new());

    assert_eq!(outcome.code, RULE_FAILED_ERR);
    assert_eq!(probe.executed().len(), 1);
}

#[test]
fn test_later_engines_are_never_queried_after_a_claim() {
    let first_probe = Probe::new();
    let later_probe = Probe::new();
    let runtime = started_runtime(
        vec![
            ("empty", MockEngine::new(&first_probe)),
            ("claims", MockEngine::new(&first_probe).rule("acCheck", Behavior::Return(RULE_FAILED_ERR))),
            ("third", MockEngine::new(&later_probe).rule("acCheck", Behavior::Return(0))),
            ("fourth", MockEngine::new(&later_probe).rule("acCheck", Behavior::Return(0))),
        ],
        MicroserviceRegistry::new(),
    );

    let outcome = manager(&runtime).exec_rule("acCheck", &mut Arguments::new());

    assert_eq!(outcome.code, RULE_FAILED_ERR);
    assert_eq!(*first_probe.exists_queries.borrow(), vec!["acCheck", "acCheck"]);
    assert!(later_probe.exists_queries.borrow().is_empty());
    assert!(later_probe.executed().is_empty());
}

#[test]
fn test_hook_claimed_by_second_engine_only() {
    let probe_a = Probe::new();
    let probe_b = Probe::new();
    let runtime = started_runtime(
        vec![
            ("A", MockEngine::new(&probe_a)),
            ("B", MockEngine::new(&probe_b).rule("pep_api_x_pre", Behavior::Return(0))),
        ],
        MicroserviceRegistry::new(),
    );

    let outcome = manager(&runtime).exec_rule("pep_api_x_pre", &mut Arguments::new());

    assert!(outcome.is_success());
    assert_eq!(*probe_a.exists_queries.borrow(), vec!["pep_api_x_pre"]);
    assert!(probe_a.executed().is_empty());
    assert_eq!(*probe_b.exists_queries.borrow(), vec!["pep_api_x_pre"]);
    assert_eq!(probe_b.executed(), vec!["pep_api_x_pre"]);
}

#[test]
fn test_positive_code_is_returned_verbatim() {
    let probe = Probe::new();
    let runtime = started_runtime(
        vec![("only", MockEngine::new(&probe).rule("acCount", Behavior::Return(42)))],
        MicroserviceRegistry::new(),
    );

    let outcome = manager(&runtime).exec_rule("acCount", &mut Arguments::new());

    assert_eq!(outcome.code, 42);
    assert!(!outcome.is_failure());
}

#[test]
fn test_all_engines_continue_returns_last_code_without_microservice() {
    let probe = Probe::new();
    let runtime = started_runtime(
        vec![
            ("first", MockEngine::new(&probe).rule("msiEcho", Behavior::Return(RULE_ENGINE_CONTINUE))),
            ("second", MockEngine::new(&probe).rule("msiEcho", Behavior::Return(SYS_NOT_SUPPORTED))),
        ],
        recording_microservice(&probe, "msiEcho", 0),
    );

    let outcome = manager(&runtime).exec_rule("msiEcho", &mut Arguments::new());

    assert_eq!(outcome.code, SYS_NOT_SUPPORTED);
    assert!(!probe.executed().iter().any(|e| e.starts_with("msi:")));
}

#[test]
fn test_unclaimed_name_falls_back_to_microservice() {
    let probe = Probe::new();
    let runtime = started_runtime(
        vec![("only", MockEngine::new(&probe))],
        recording_microservice(&probe, "msiEcho", 1),
    );
    let manager = manager(&runtime);

    let outcome = manager.exec_rule("msiEcho", &mut Arguments::from(vec![Arg::from("hello")]));
    assert!(outcome.is_success());
    assert_eq!(probe.executed(), vec!["msi:msiEcho"]);

    let outcome = manager.exec_rule("msiEcho", &mut Arguments::new());
    assert_eq!(outcome.code, ACTION_ARG_COUNT_MISMATCH);
    assert_eq!(probe.executed().len(), 1);
}

#[test]
fn test_unknown_name_reports_not_found() {
    let probe = Probe::new();
    let runtime = started_runtime(vec![("only", MockEngine::new(&probe))], MicroserviceRegistry::new());

    let outcome = manager(&runtime).exec_rule("nowhere", &mut Arguments::new());

    assert_eq!(outcome.code, NO_RULE_OR_MSI_FUNCTION_FOUND_ERR);
    assert!(outcome.message.contains("nowhere"));
}

#[test]
fn test_rule_exists_error_aborts_dispatch() {
    let probe = Probe::new();
    let runtime = started_runtime(
        vec![
            ("broken", MockEngine::new(&probe).fail_exists()),
            ("second", MockEngine::new(&probe).rule("acCheck", Behavior::Return(0))),
        ],
        MicroserviceRegistry::new(),
    );

    let outcome = manager(&runtime).exec_rule("acCheck", &mut Arguments::new());

    assert_eq!(outcome.code, RULE_ENGINE_ERROR);
    assert!(probe.executed().is_empty());
    assert_eq!(probe.exists_queries.borrow().len(), 1);
}

#[test]
fn test_nested_call_reenters_chain_and_microservices() {
    let probe = Probe::new();
    let runtime = started_runtime(
        vec![
            ("outer", MockEngine::new(&probe).rule("acOuter", Behavior::Call("acInner"))),
            (
                "inner",
                MockEngine::new(&probe)
                    .rule("acInner", Behavior::Call("msiEcho"))
                    .rule("acUnused", Behavior::Return(0)),
            ),
        ],
        recording_microservice(&probe, "msiEcho", 0),
    );
    let manager = manager(&runtime);

    let outcome = manager.exec_rule("acOuter", &mut Arguments::new());

    assert!(outcome.is_success());
    assert_eq!(probe.executed(), vec!["acOuter", "acInner", "msi:msiEcho"]);
    assert_eq!(manager.context().borrow().call_depth(), 0);
}

#[test]
fn test_runaway_recursion_hits_depth_limit() {
    let probe = Probe::new();
    let runtime = unstarted_runtime(
        vec![("only", MockEngine::new(&probe).rule("acLoop", Behavior::Call("acLoop")))],
        MicroserviceRegistry::new(),
    );
    let mut runtime = runtime.with_max_call_depth(8);
    runtime.start().unwrap();
    let manager = manager(&runtime);

    let outcome = manager.exec_rule("acLoop", &mut Arguments::new());

    assert_eq!(outcome.code, RULE_ENGINE_ERROR);
    assert!(outcome.message.contains("maximum call depth"));
    assert_eq!(probe.executed().len(), 8);
    assert_eq!(manager.context().borrow().call_depth(), 0);
}

#[test]
fn test_unsafe_ms_ctx_hands_over_context() {
    let probe = Probe::new();
    let runtime = started_runtime(vec![("only", MockEngine::new(&probe))], MicroserviceRegistry::new());
    let manager = manager(&runtime);

    let mut args = Arguments::from(vec![Arg::Context(None)]);
    let outcome = manager.exec_rule(UNSAFE_MS_CTX, &mut args);

    assert!(outcome.is_success());
    match args.get(0) {
        Some(Arg::Context(Some(ctx))) => assert!(Rc::ptr_eq(ctx, manager.context())),
        other => panic!("context slot not filled: {:?}", other.map(|arg| arg.type_name())),
    }
    // The sentinel never reaches the engines
    assert!(probe.exists_queries.borrow().is_empty());

    let outcome = manager.exec_rule(UNSAFE_MS_CTX, &mut Arguments::new());
    assert_eq!(outcome.code, SYS_INTERNAL_NULL_INPUT_ERR);
}

#[test]
fn test_captured_call_runs_once() {
    let probe = Probe::new();
    let runtime = started_runtime(
        vec![("only", MockEngine::new(&probe).rule("acCheck", Behavior::Return(0)))],
        MicroserviceRegistry::new(),
    );
    let manager = manager(&runtime);
    let mut args = Arguments::new();

    let mut call = manager.callback().capture("acCheck", &mut args);
    assert!(call.call().is_success());
    let second = call.call();

    assert_eq!(second.code, RE_TYPE_ERROR);
    assert_eq!(probe.executed().len(), 1);
}

#[test]
fn test_exec_rule_text_routes_to_exact_instance() {
    let probe = Probe::new();
    let runtime = started_runtime(
        vec![
            ("first", MockEngine::new(&probe)),
            ("second", MockEngine::new(&probe)),
        ],
        MicroserviceRegistry::new(),
    );
    let manager = manager(&runtime);

    let outcome = manager.exec_rule_text("second", "writeLine(x)", &mut Arguments::new(), "ruleExecOut");
    assert!(outcome.is_success());
    assert_eq!(*probe.text_calls.borrow(), vec!["second"]);
    assert_eq!(
        manager.context().borrow().output("ruleExecOut"),
        Some("writeLine(x)")
    );

    let outcome = manager.exec_rule_text("secon", "writeLine(x)", &mut Arguments::new(), "");
    assert_eq!(outcome.code, SYS_INVALID_INPUT_PARAM);
    assert!(outcome.message.contains("instance not found [secon]"));
    assert_eq!(probe.text_calls.borrow().len(), 1);

    let outcome = manager.exec_rule_expression("missing", "1 + 1", &mut Arguments::new());
    assert_eq!(outcome.code, SYS_INVALID_INPUT_PARAM);
    assert_eq!(probe.expression_calls.get(), 0);
}

#[test]
fn test_list_rules_aggregates_in_chain_order() {
    let probe = Probe::new();
    let runtime = started_runtime(
        vec![
            ("first", MockEngine::new(&probe).rule("b_rule", Behavior::Return(0))),
            ("second", MockEngine::new(&probe).rule("a_rule", Behavior::Return(0))),
        ],
        MicroserviceRegistry::new(),
    );

    let rules = manager(&runtime).list_rules().unwrap();
    assert_eq!(rules, vec!["b_rule", "a_rule"]);
}

#[test]
fn test_list_rules_propagates_engine_error() {
    let probe = Probe::new();
    let runtime = started_runtime(
        vec![
            ("first", MockEngine::new(&probe).rule("b_rule", Behavior::Return(0))),
            ("broken", MockEngine::new(&probe).fail_list()),
        ],
        MicroserviceRegistry::new(),
    );

    let err = manager(&runtime).list_rules().unwrap_err();
    assert_eq!(err.code(), RULE_ENGINE_ERROR);
}

#[test]
fn test_apply_rule_skips_names_outside_patterns() {
    let probe = Probe::new();
    let runtime = started_runtime(
        vec![(
            "only",
            MockEngine::new(&probe)
                .patterns(&["ac[^ ]*"])
                .rule("acPostProcForPut", Behavior::Return(RULE_FAILED_ERR)),
        )],
        MicroserviceRegistry::new(),
    );
    let manager = manager(&runtime);

    assert!(manager.apply_rule("pep_api_auth_request_pre", &mut Arguments::new()).is_success());
    assert!(probe.exists_queries.borrow().is_empty());

    let outcome = manager.apply_rule("acPostProcForPut", &mut Arguments::new());
    assert_eq!(outcome.code, RULE_FAILED_ERR);
    assert_eq!(manager.context().borrow().error_stack.len(), 1);
}

#[test]
fn test_start_failure_stops_started_engines() {
    let probe = Probe::new();
    let mut runtime = unstarted_runtime(
        vec![
            ("first", MockEngine::new(&probe)),
            ("second", MockEngine::new(&probe).fail_start()),
            ("third", MockEngine::new(&probe)),
        ],
        MicroserviceRegistry::new(),
    );

    let err = runtime.start().unwrap_err();

    assert!(matches!(err, RepfError::EngineStart { ref instance_name, .. } if instance_name == "second"));
    assert!(!runtime.is_started());
    assert_eq!(*probe.started.borrow(), vec!["first"]);
    assert_eq!(*probe.stopped.borrow(), vec!["first"]);
}

#[test]
fn test_stop_runs_in_reverse_order() {
    let probe = Probe::new();
    let mut runtime = started_runtime(
        vec![
            ("first", MockEngine::new(&probe)),
            ("second", MockEngine::new(&probe)),
        ],
        MicroserviceRegistry::new(),
    );

    runtime.stop();

    assert_eq!(*probe.started.borrow(), vec!["first", "second"]);
    assert_eq!(*probe.stopped.borrow(), vec!["second", "first"]);
}

#[test]
fn test_chain_rejects_duplicate_instances() {
    let probe = Probe::new();
    let result = RuleEngineChain::new(vec![
        EngineSlot::new("dup", "mock", MockEngine::new(&probe).boxed()),
        EngineSlot::new("dup", "mock", MockEngine::new(&probe).boxed()),
    ]);

    assert_eq!(result.err().map(|e| e.code()), Some(SYS_INVALID_INPUT_PARAM));
}

#[test]
fn test_chain_from_descriptors_resolves_plugins() {
    let probe = Probe::new();
    let mut plugins = PluginRegistry::new();
    let factory_probe = Rc::clone(&probe);
    plugins.register("mock", move |_| Ok(MockEngine::new(&factory_probe).boxed()));

    let chain = RuleEngineChain::from_descriptors(
        &plugins,
        &[
            RuleEngineDescriptor::new("policy", "mock"),
            RuleEngineDescriptor::new("fallback", "mock"),
        ],
    )
    .unwrap();
    assert_eq!(chain.instance_names(), vec!["policy", "fallback"]);
    assert_eq!(chain.find("fallback").map(|s| s.plugin_name()), Some("mock"));

    let err = RuleEngineChain::from_descriptors(
        &plugins,
        &[RuleEngineDescriptor::new("native", "irods_rule_language")],
    )
    .err()
    .unwrap();
    assert_eq!(err.code(), PLUGIN_ERROR);
    assert!(err.to_string().contains("irods_rule_language"));
}

#[test]
fn test_into_context_returns_request_state() {
    let probe = Probe::new();
    let runtime = started_runtime(vec![("only", MockEngine::new(&probe))], MicroserviceRegistry::new());
    let manager = manager(&runtime);

    let outcome = manager.exec_rule_text("only", "done", &mut Arguments::new(), "out");
    assert!(outcome.is_success());

    let ctx = manager.into_context().unwrap();
    assert_eq!(ctx.output("out"), Some("done"));
}
