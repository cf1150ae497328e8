//! Config file to guarded request, across all built-in engines

#![allow(clippy::disallowed_methods)]

use std::io::Write;

use repf_common::{load_config_from_file, load_config_from_str, ConfigFormat};
use repf_core::codes::{PLUGIN_ERROR, SYS_NOT_SUPPORTED};
use repf_core::{
    Arg, Arguments, AuditMode, ContextManager, Outcome, RuleExecutionContext, RuleSubmission,
    RuntimeContext,
};
use repf_engines::microservices::{self, DEFAULT_RESOURCE_KW};
use tracing_test::traced_test;

const CAT_NO_ACCESS_PERMISSION: i32 = -818000;

const CONFIG_TOML: &str = r#"
max_call_depth = 64

[pep]
namespaces = [""]

[[rule_engines]]
instance_name = "hooks"
plugin_name = "passthrough"

[rule_engines.plugin_specific_configuration]
return_codes_for_peps = [
    { regex = "pep_api_coll_create_pre", code = -818000 },
    { regex = "pep_api_data_obj_put_(pre|post)", code = 0 },
]

[[rule_engines]]
instance_name = "policy"
plugin_name = "static_policy"

[rule_engines.plugin_specific_configuration]
default_resource = "archiveResc"

[[rule_engines]]
instance_name = "expr"
plugin_name = "expression"

[rule_engines.plugin_specific_configuration.rules]
acCheckQuota = "arg0 <= 1024"
"#;

const CONFIG_YAML: &str = r#"
rule_engines:
  - instance_name: policy
    plugin_name: static_policy
    plugin_specific_configuration:
      num_threads: 4
pep:
  diagnostics: retain
"#;

fn write_config(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn runtime_from_file(content: &str, suffix: &str) -> RuntimeContext {
    let file = write_config(content, suffix);
    let config = load_config_from_file(file.path()).unwrap();
    let mut runtime = RuntimeContext::from_config(
        &config,
        &repf_engines::builtin_plugins(),
        microservices::builtin(),
    )
    .unwrap();
    runtime.start().unwrap();
    runtime
}

#[test]
fn test_chain_built_from_toml_file() {
    let runtime = runtime_from_file(CONFIG_TOML, ".toml");

    assert_eq!(runtime.chain().instance_names(), vec!["hooks", "policy", "expr"]);
    assert_eq!(runtime.max_call_depth(), 64);
    assert!(runtime.is_started());
}

#[test]
fn test_guarded_put_runs_policy_between_hooks() {
    let runtime = runtime_from_file(CONFIG_TOML, ".toml");
    let manager = ContextManager::new(&runtime, RuleExecutionContext::new(), AuditMode::Audit);

    let mut args = Arguments::from(vec![Arg::from("/tempZone/home/alice/file.txt")]);
    let outcome = manager.guard("api_data_obj_put", "hooks", &mut args, |callback, _| {
        callback.call("acSetRescSchemeForCreate", &mut Arguments::new())
    });

    assert!(outcome.is_success(), "{}", outcome);
    let ctx = manager.context().borrow();
    assert_eq!(ctx.condition_inputs.get(DEFAULT_RESOURCE_KW), Some("archiveResc"));
    assert_eq!(ctx.pep_output.as_deref(), Some(""));
}

#[test]
fn test_denied_pre_hook_blocks_operation() {
    let runtime = runtime_from_file(CONFIG_TOML, ".toml");
    let manager = ContextManager::new(&runtime, RuleExecutionContext::new(), AuditMode::Audit);

    let mut ran = false;
    let outcome = manager.guard("api_coll_create", "hooks", &mut Arguments::new(), |_, _| {
        ran = true;
        Outcome::ok()
    });

    assert_eq!(outcome.code, CAT_NO_ACCESS_PERMISSION);
    assert!(!ran);
}

#[test]
fn test_expression_rule_through_chain() {
    let runtime = runtime_from_file(CONFIG_TOML, ".toml");
    let manager = ContextManager::new(&runtime, RuleExecutionContext::new(), AuditMode::Audit);

    assert!(manager
        .exec_rule("acCheckQuota", &mut Arguments::from(vec![Arg::Int(100)]))
        .is_success());
    assert!(manager
        .exec_rule("acCheckQuota", &mut Arguments::from(vec![Arg::Int(2048)]))
        .is_failure());
}

#[test]
fn test_generic_submission_offered_to_each_engine() {
    let runtime = runtime_from_file(CONFIG_TOML, ".toml");
    let manager = ContextManager::new(&runtime, RuleExecutionContext::new(), AuditMode::Audit);

    let mut submission = RuleSubmission::new("answer = 6 * 7").with_output("answer");
    let outcome = manager.submit_rule(&mut submission);

    assert!(outcome.is_success(), "{}", outcome);
    let ctx = manager.context().borrow();
    assert_eq!(ctx.output("answer"), Some("42"));
    assert!(ctx.error_stack.is_empty());
}

#[test]
fn test_targeted_submission_to_declining_engine() {
    let runtime = runtime_from_file(CONFIG_TOML, ".toml");
    let manager = ContextManager::new(&runtime, RuleExecutionContext::new(), AuditMode::Audit);

    let mut submission = RuleSubmission::new("answer = 6 * 7")
        .with_instance("policy")
        .with_output("answer");
    let outcome = manager.submit_rule(&mut submission);

    assert_eq!(outcome.code, SYS_NOT_SUPPORTED);
    assert_eq!(manager.context().borrow().output("answer"), None);
}

#[test]
fn test_yaml_file_with_num_threads() {
    let runtime = runtime_from_file(CONFIG_YAML, ".yaml");
    assert_eq!(runtime.pep().diagnostics, repf_core::DiagnosticsPolicy::Retain);

    let manager = ContextManager::new(&runtime, RuleExecutionContext::new(), AuditMode::Audit);
    assert!(manager.exec_rule("acSetNumThreads", &mut Arguments::new()).is_success());
    assert_eq!(
        manager.context().borrow().condition_inputs.get(microservices::NUM_THREADS_KW),
        Some("4")
    );
}

#[test]
fn test_unknown_plugin_fails_resolution() {
    let config = load_config_from_str(
        r#"
[[rule_engines]]
instance_name = "irods_rule_language"
plugin_name = "irods_rule_engine_plugin-irods_rule_language"
"#,
        ConfigFormat::Toml,
    )
    .unwrap();

    let err = RuntimeContext::from_config(
        &config,
        &repf_engines::builtin_plugins(),
        microservices::builtin(),
    )
    .err()
    .unwrap();
    assert_eq!(err.code(), PLUGIN_ERROR);
}

#[test]
#[traced_test]
fn test_policy_writes_log_through_microservice() {
    let runtime = runtime_from_file(CONFIG_TOML, ".toml");
    let manager = ContextManager::new(&runtime, RuleExecutionContext::new(), AuditMode::Audit);

    let mut args = Arguments::from(vec![Arg::from("serverLog"), Arg::IntPtr(None)]);
    assert!(manager.exec_rule("msiWriteRodsLog", &mut args).is_success());
    assert!(logs_contain("writeLine: serverLog"));
}

