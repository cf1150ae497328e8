//! Status code table
//!
//! Negative values are failures, zero is success. The two positive framework codes
//! steer dispatch: [`RULE_ENGINE_CONTINUE`] advances the chain and
//! [`RULE_ENGINE_SKIP_OPERATION`] vetoes a guarded operation from a pre hook.

// ============================================================================
// System errors
// ============================================================================

pub const SUCCESS: i32 = 0;
pub const SYS_INTERNAL_NULL_INPUT_ERR: i32 = -24000;
pub const SYS_CONFIG_FILE_ERR: i32 = -25000;
pub const SYS_NOT_SUPPORTED: i32 = -66000;
pub const SYS_INVALID_INPUT_PARAM: i32 = -130000;
pub const SYS_RULE_NOT_FOUND: i32 = -144000;
pub const SYS_NO_HANDLER_REPLY_MSG: i32 = -99999999;

// ============================================================================
// Rule engine errors
// ============================================================================

pub const NO_RULE_FOUND_ERR: i32 = -1017000;
pub const ACTION_ARG_COUNT_MISMATCH: i32 = -1021000;
pub const NO_RULE_OR_MSI_FUNCTION_FOUND_ERR: i32 = -1097000;
pub const RULE_FAILED_ERR: i32 = -1101000;
pub const NO_MICROSERVICE_FOUND_ERR: i32 = -1102000;
pub const RE_TYPE_ERROR: i32 = -1230000;

// ============================================================================
// Plugin framework errors
// ============================================================================

pub const KEY_NOT_FOUND: i32 = -1800000;
pub const PLUGIN_ERROR: i32 = -1808000;
pub const INVALID_ANY_CAST: i32 = -1822000;
pub const RULE_ENGINE_ERROR: i32 = -1828000;

// ============================================================================
// Dispatch control codes
// ============================================================================

pub const RULE_ENGINE_CONTINUE: i32 = 5000000;
pub const RULE_ENGINE_SKIP_OPERATION: i32 = 5001000;

const CONTINUATION_CODES: [i32; 2] = [SYS_NOT_SUPPORTED, RULE_ENGINE_CONTINUE];

/// Whether `code` tells the dispatcher to try the next engine.
pub fn is_continuation_code(code: i32) -> bool {
    CONTINUATION_CODES.contains(&code)
}

/// Symbolic name of a known code.
pub fn code_name(code: i32) -> Option<&'static str> {
    let name = match code {
        SUCCESS => "SUCCESS",
        SYS_INTERNAL_NULL_INPUT_ERR => "SYS_INTERNAL_NULL_INPUT_ERR",
        SYS_CONFIG_FILE_ERR => "SYS_CONFIG_FILE_ERR",
        SYS_NOT_SUPPORTED => "SYS_NOT_SUPPORTED",
        SYS_INVALID_INPUT_PARAM => "SYS_INVALID_INPUT_PARAM",
        SYS_RULE_NOT_FOUND => "SYS_RULE_NOT_FOUND",
        SYS_NO_HANDLER_REPLY_MSG => "SYS_NO_HANDLER_REPLY_MSG",
        NO_RULE_FOUND_ERR => "NO_RULE_FOUND_ERR",
        ACTION_ARG_COUNT_MISMATCH => "ACTION_ARG_COUNT_MISMATCH",
        NO_RULE_OR_MSI_FUNCTION_FOUND_ERR => "NO_RULE_OR_MSI_FUNCTION_FOUND_ERR",
        RULE_FAILED_ERR => "RULE_FAILED_ERR",
        NO_MICROSERVICE_FOUND_ERR => "NO_MICROSERVICE_FOUND_ERR",
        RE_TYPE_ERROR => "RE_TYPE_ERROR",
        KEY_NOT_FOUND => "KEY_NOT_FOUND",
        PLUGIN_ERROR => "PLUGIN_ERROR",
        INVALID_ANY_CAST => "INVALID_ANY_CAST",
        RULE_ENGINE_ERROR => "RULE_ENGINE_ERROR",
        RULE_ENGINE_CONTINUE => "RULE_ENGINE_CONTINUE",
        RULE_ENGINE_SKIP_OPERATION => "RULE_ENGINE_SKIP_OPERATION",
        _ => return None,
    };
    Some(name)
}
