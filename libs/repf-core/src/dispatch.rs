//! Dispatch controller: chain walk with continuation, then microservice fallback

use crate::args::Arguments;
use crate::callback::Callback;
use repf_errors::codes::SYS_INTERNAL_NULL_INPUT_ERR;
use repf_errors::{rule_error, Outcome, RepfError};

/// Reserved name that hands the raw execution context to the caller
pub const UNSAFE_MS_CTX: &str = "unsafe_ms_ctx";

/// Dispatch `name` with `args`
///
/// Engines are asked in chain order. The first engine that claims the rule and
/// answers with a non-continuation code ends the walk. When engines claimed the
/// rule but all continued, the last continuation code is returned. Only when no
/// engine claimed the rule is the microservice registry consulted.
pub fn control(callback: &Callback<'_>, name: &str, args: &mut Arguments) -> Outcome {
    if name == UNSAFE_MS_CTX {
        return hand_over_context(callback, args);
    }

    let runtime = callback.runtime();
    let mut last_seen: Option<Outcome> = None;

    for slot in runtime.chain().iter() {
        match slot.engine().rule_exists(name) {
            Ok(true) => {},
            Ok(false) => continue,
            Err(e) => {
                tracing::debug!(
                    "rule_exists [{}] failed in instance [{}]: {}",
                    name,
                    slot.instance_name(),
                    e
                );
                return e.into();
            },
        }

        let outcome = slot.engine().exec_rule(name, args, callback);
        if !outcome.is_continuation() {
            return outcome;
        }
        tracing::trace!(
            "Instance [{}] continued rule [{}] with [{}]",
            slot.instance_name(),
            name,
            outcome.code
        );
        last_seen = Some(outcome);
    }

    if let Some(outcome) = last_seen {
        return outcome;
    }

    match runtime.microservices().lookup(name) {
        Some(entry) => entry.invoke(callback, args),
        None => RepfError::RuleNotFound(name.to_string()).into(),
    }
}

fn hand_over_context(callback: &Callback<'_>, args: &mut Arguments) -> Outcome {
    match args.context_slot_mut() {
        Some(slot) => {
            *slot = Some(callback.context().clone());
            Outcome::ok()
        },
        None => rule_error!(
            SYS_INTERNAL_NULL_INPUT_ERR,
            "[{}] requires a context argument",
            UNSAFE_MS_CTX
        ),
    }
}
