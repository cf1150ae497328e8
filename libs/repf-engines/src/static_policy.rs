//! Static policy engine: the compiled-in default `ac*` policy set
//!
//! Every rule is a native function. Policies that pick server behavior call the
//! corresponding microservice through the callback; the rest are no-ops that
//! exist so hosts can fire them unconditionally.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Deserialize;

use repf_core::codes::{SYS_INTERNAL_NULL_INPUT_ERR, SYS_NOT_SUPPORTED};
use repf_core::{
    with_context, Arg, Arguments, Callback, Outcome, RuleEngine, RuleEngineDescriptor,
    SharedContext, UNSAFE_MS_CTX,
};
use repf_errors::{rule_error, Result};

pub const PLUGIN_NAME: &str = "static_policy";

/// Every rule in this engine starts with `ac`
pub const DEFAULT_RULE_PATTERN: &str = "ac[^ ]*";

type PolicyFn = fn(&PolicySettings, &SharedContext, &Callback<'_>, &mut Arguments) -> Outcome;

#[derive(Debug, Clone, Deserialize)]
pub struct PolicySettings {
    /// Resource chosen by `acSetRescSchemeForCreate` and `acSetRescSchemeForRepl`
    #[serde(default = "default_resource")]
    pub default_resource: String,

    /// Client/server negotiation answer written by `acPreConnect`
    #[serde(default = "default_negotiation")]
    pub negotiation: String,

    /// Thread count requested by `acSetNumThreads`
    #[serde(default = "default_num_threads")]
    pub num_threads: u32,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            default_resource: default_resource(),
            negotiation: default_negotiation(),
            num_threads: default_num_threads(),
        }
    }
}

fn default_resource() -> String {
    "demoResc".to_string()
}

fn default_negotiation() -> String {
    "CS_NEG_DONT_CARE".to_string()
}

fn default_num_threads() -> u32 {
    64
}

pub struct StaticPolicyEngine {
    settings: PolicySettings,
    policies: BTreeMap<&'static str, PolicyFn>,
}

impl StaticPolicyEngine {
    pub fn new(settings: PolicySettings) -> Self {
        Self {
            settings,
            policies: BTreeMap::new(),
        }
    }

    pub fn from_descriptor(descriptor: &RuleEngineDescriptor) -> Result<Self> {
        Ok(Self::new(crate::plugin_settings(descriptor)?))
    }

    pub fn settings(&self) -> &PolicySettings {
        &self.settings
    }

    fn register_defaults(&mut self) {
        let table: [(&'static str, PolicyFn); 25] = [
            ("acPreConnect", ac_pre_connect),
            ("acSetRescSchemeForCreate", ac_set_resc_scheme),
            ("acSetRescSchemeForRepl", ac_set_resc_scheme),
            ("acSetNumThreads", ac_set_num_threads),
            ("acSetMultiReplPerResc", no_op),
            ("acPreprocForDataObjOpen", no_op),
            ("acPostProcForPut", no_op),
            ("acPostProcForCopy", no_op),
            ("acPostProcForCreate", no_op),
            ("acPostProcForOpen", no_op),
            ("acPostProcForRepl", no_op),
            ("acPostProcForPhymv", no_op),
            ("acPostProcForDelete", no_op),
            ("acPostProcForFilePathReg", no_op),
            ("acDataDeletePolicy", no_op),
            ("acTrashPolicy", no_op),
            ("acTicketPolicy", no_op),
            ("acCheckPasswordStrength", no_op),
            ("acSetPublicUserPolicy", no_op),
            ("acChkHostAccessControl", no_op),
            ("acPreprocForCollCreate", no_op),
            ("acPostProcForCollCreate", no_op),
            ("acPreprocForRmColl", no_op),
            ("acPostProcForRmColl", no_op),
            ("acCreateUserZoneCollections", ac_create_user_zone_collections),
        ];
        self.policies.extend(table);
    }
}

impl Default for StaticPolicyEngine {
    fn default() -> Self {
        Self::new(PolicySettings::default())
    }
}

impl RuleEngine for StaticPolicyEngine {
    fn start(&mut self, instance_name: &str) -> Outcome {
        self.register_defaults();
        tracing::debug!(
            "static policy instance [{}] loaded {} policies",
            instance_name,
            self.policies.len()
        );
        Outcome::ok()
    }

    fn stop(&mut self, _instance_name: &str) -> Outcome {
        self.policies.clear();
        Outcome::ok()
    }

    fn rule_exists(&self, name: &str) -> Result<bool> {
        Ok(self.policies.contains_key(name))
    }

    fn list_rules(&self) -> Result<Vec<String>> {
        Ok(self.policies.keys().map(|name| name.to_string()).collect())
    }

    fn exec_rule(&self, name: &str, args: &mut Arguments, callback: &Callback<'_>) -> Outcome {
        let ctx = match fetch_context(callback) {
            Ok(ctx) => ctx,
            Err(outcome) => return outcome,
        };

        match self.policies.get(name) {
            Some(policy) => policy(&self.settings, &ctx, callback, args),
            None => {
                tracing::error!("[{}] not defined in static policy engine", name);
                Outcome::ok()
            },
        }
    }

    fn exec_rule_text(
        &self,
        _instance_name: &str,
        _text: &str,
        _params: &mut Arguments,
        _output_descriptor: &str,
        _callback: &Callback<'_>,
    ) -> Outcome {
        tracing::debug!("exec_rule_text not supported in the static policy engine");
        rule_error!(
            SYS_NOT_SUPPORTED,
            "exec_rule_text not supported in the static policy engine"
        )
    }

    fn exec_rule_expression(
        &self,
        _expression: &str,
        _params: &mut Arguments,
        _callback: &Callback<'_>,
    ) -> Outcome {
        tracing::debug!("exec_rule_expression not supported in the static policy engine");
        rule_error!(
            SYS_NOT_SUPPORTED,
            "exec_rule_expression not supported in the static policy engine"
        )
    }

    fn rule_patterns(&self) -> Vec<String> {
        vec![DEFAULT_RULE_PATTERN.to_string()]
    }
}

/// Raw request context handed over by the `unsafe_ms_ctx` sentinel
fn fetch_context(callback: &Callback<'_>) -> std::result::Result<SharedContext, Outcome> {
    let mut handle = Arguments::from(vec![Arg::Context(None)]);
    let fetched = callback.call(UNSAFE_MS_CTX, &mut handle);
    if !fetched.is_success() {
        return Err(fetched);
    }
    match handle.get(0) {
        Some(Arg::Context(Some(ctx))) => Ok(Rc::clone(ctx)),
        _ => Err(rule_error!(SYS_INTERNAL_NULL_INPUT_ERR, "failed to get rule execution context")),
    }
}

fn no_op(
    _settings: &PolicySettings,
    _ctx: &SharedContext,
    _callback: &Callback<'_>,
    _args: &mut Arguments,
) -> Outcome {
    Outcome::ok()
}

/// Answer the negotiation query in every string slot
fn ac_pre_connect(
    settings: &PolicySettings,
    _ctx: &SharedContext,
    _callback: &Callback<'_>,
    args: &mut Arguments,
) -> Outcome {
    for index in 0..args.len() {
        if !matches!(args.get(index), Some(Arg::StrPtr(_) | Arg::CharPtrPtr(_))) {
            continue;
        }
        if let Err(e) = args.set_str(index, settings.negotiation.as_str()) {
            return e.into();
        }
    }
    Outcome::ok()
}

fn ac_set_resc_scheme(
    settings: &PolicySettings,
    _ctx: &SharedContext,
    callback: &Callback<'_>,
    _args: &mut Arguments,
) -> Outcome {
    let mut args = Arguments::from(vec![
        Arg::from(settings.default_resource.as_str()),
        Arg::from("null"),
    ]);
    callback.call("msiSetDefaultResc", &mut args)
}

fn ac_set_num_threads(
    settings: &PolicySettings,
    _ctx: &SharedContext,
    callback: &Callback<'_>,
    _args: &mut Arguments,
) -> Outcome {
    let mut args = Arguments::from(vec![
        Arg::from("default"),
        Arg::from(settings.num_threads.to_string()),
        Arg::from("default"),
    ]);
    callback.call("msiSetNumThreads", &mut args)
}

/// Create `/<proxy zone>/home` and `/<proxy zone>/trash/home` entries for the client user
fn ac_create_user_zone_collections(
    _settings: &PolicySettings,
    ctx: &SharedContext,
    callback: &Callback<'_>,
    _args: &mut Arguments,
) -> Outcome {
    let users = with_context(ctx, |ctx| {
        (
            ctx.proxy_user.as_ref().map(|u| u.rods_zone.clone()),
            ctx.client_user.as_ref().map(|u| u.user_name.clone()),
        )
    });
    let (zone, user_name) = match users {
        Ok((Some(zone), Some(user_name))) => (zone, user_name),
        Ok(_) => {
            return rule_error!(
                SYS_INTERNAL_NULL_INPUT_ERR,
                "acCreateUserZoneCollections requires proxy and client users"
            )
        },
        Err(e) => return e.into(),
    };

    let mut outcome = Outcome::ok();
    for coll in [format!("/{}/home", zone), format!("/{}/trash/home", zone)] {
        let mut args = Arguments::from(vec![Arg::from(coll), Arg::from(user_name.as_str())]);
        outcome = callback.call("acCreateCollByAdmin", &mut args);
    }
    outcome
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::microservices::{self, DEFAULT_RESOURCE_KW, NUM_THREADS_KW};
    use repf_core::types::{ConnectionInfo, UserInfo};
    use repf_core::{
        AuditMode, ContextManager, EngineSlot, RuleEngineChain, RuleExecutionContext, RuntimeContext,
    };
    use std::cell::RefCell;
    use serde_json::json;

    fn runtime(engine: StaticPolicyEngine) -> RuntimeContext {
        let chain =
            RuleEngineChain::new(vec![EngineSlot::new("policy", PLUGIN_NAME, Box::new(engine))]).unwrap();
        let mut runtime = RuntimeContext::new(chain, microservices::builtin());
        runtime.start().unwrap();
        runtime
    }

    #[test]
    fn test_policies_registered_on_start() {
        let mut engine = StaticPolicyEngine::default();
        assert!(!engine.rule_exists("acPostProcForPut").unwrap());

        assert!(engine.start("policy").is_success());
        assert!(engine.rule_exists("acPostProcForPut").unwrap());
        assert!(!engine.rule_exists("pep_api_data_obj_put_post").unwrap());

        let rules = engine.list_rules().unwrap();
        assert!(rules.contains(&"acSetNumThreads".to_string()));
        assert!(rules.iter().all(|rule| rule.starts_with("ac")));
    }

    #[test]
    fn test_pre_connect_answers_negotiation() {
        let runtime = runtime(StaticPolicyEngine::default());
        let manager = ContextManager::new(&runtime, RuleExecutionContext::new(), AuditMode::Audit);

        let mut args = Arguments::from(vec![Arg::out_str()]);
        assert!(manager.exec_rule("acPreConnect", &mut args).is_success());
        assert_eq!(args.str_at(0).unwrap(), "CS_NEG_DONT_CARE");
    }

    #[test]
    fn test_configured_resource_and_threads() {
        let descriptor = RuleEngineDescriptor::new("policy", PLUGIN_NAME).with_configuration(json!({
            "default_resource": "archiveResc",
            "num_threads": 8
        }));
        let runtime = runtime(StaticPolicyEngine::from_descriptor(&descriptor).unwrap());
        let manager = ContextManager::new(&runtime, RuleExecutionContext::new(), AuditMode::Audit);

        assert!(manager
            .exec_rule("acSetRescSchemeForCreate", &mut Arguments::new())
            .is_success());
        assert!(manager.exec_rule("acSetNumThreads", &mut Arguments::new()).is_success());

        let ctx = manager.context().borrow();
        assert_eq!(ctx.condition_inputs.get(DEFAULT_RESOURCE_KW), Some("archiveResc"));
        assert_eq!(ctx.condition_inputs.get(NUM_THREADS_KW), Some("8"));
    }

    #[test]
    fn test_zone_collections_read_users_from_request_context() {
        let created: Rc<RefCell<Vec<(String, String)>>> = Rc::default();
        let mut registry = microservices::builtin();
        let sink = Rc::clone(&created);
        registry
            .register("acCreateCollByAdmin", 2, move |_, args| {
                let coll = args.str_at(0).unwrap().to_string();
                let user = args.str_at(1).unwrap().to_string();
                sink.borrow_mut().push((coll, user));
                Outcome::ok()
            })
            .unwrap();
        let chain = RuleEngineChain::new(vec![EngineSlot::new(
            "policy",
            PLUGIN_NAME,
            Box::new(StaticPolicyEngine::default()),
        )])
        .unwrap();
        let mut runtime = RuntimeContext::new(chain, registry);
        runtime.start().unwrap();

        let connection = ConnectionInfo {
            client_addr: "10.0.0.7".to_string(),
            auth_scheme: None,
            proxy_user: UserInfo::new("rods", "tempZone"),
            client_user: UserInfo::new("alice", "tempZone"),
        };
        let manager = ContextManager::new(
            &runtime,
            RuleExecutionContext::for_connection(connection),
            AuditMode::Audit,
        );
        assert!(manager
            .exec_rule("acCreateUserZoneCollections", &mut Arguments::new())
            .is_success());
        assert_eq!(
            *created.borrow(),
            vec![
                ("/tempZone/home".to_string(), "alice".to_string()),
                ("/tempZone/trash/home".to_string(), "alice".to_string()),
            ]
        );

        // No connection, no users to read
        let manager = ContextManager::new(&runtime, RuleExecutionContext::new(), AuditMode::Audit);
        let outcome = manager.exec_rule("acCreateUserZoneCollections", &mut Arguments::new());
        assert_eq!(outcome.code, SYS_INTERNAL_NULL_INPUT_ERR);
        assert_eq!(created.borrow().len(), 2);
    }

    #[test]
    fn test_text_and_expression_continue_the_chain() {
        let runtime = runtime(StaticPolicyEngine::default());
        let manager = ContextManager::new(&runtime, RuleExecutionContext::new(), AuditMode::Audit);

        let outcome = manager.exec_rule_text("policy", "acPostProcForPut", &mut Arguments::new(), "");
        assert_eq!(outcome.code, SYS_NOT_SUPPORTED);
        assert!(outcome.is_continuation());

        let outcome = manager.exec_rule_expression("policy", "1 == 1", &mut Arguments::new());
        assert_eq!(outcome.code, SYS_NOT_SUPPORTED);
    }
}
