//! Built-in microservices
//!
//! | Name | Arguments | Effect |
//! |------|-----------|--------|
//! | `msiStrlen` | `str, *len` | Length in characters |
//! | `msiStrCat` | `*target, suffix` | Append in place |
//! | `msiSplitPath` | `path, *coll, *obj` | Split at the last `/` |
//! | `msiAddKeyVal` | `*kvp, key, value` | Insert or replace a pair |
//! | `msiWriteRodsLog` | `message, *status` | Write to the server log |
//! | `msiSetDefaultResc` | `resc, preference` | Pick the default resource |
//! | `msiSetNumThreads` | `size_per_thread, threads, window` | Pick the transfer thread count |
//! | `msiExit` | `code, message` | Fail with a chosen negative code |
//! | `msiGetSessionVarValue` | `name, *value` | Read a session variable |

use repf_core::codes::{KEY_NOT_FOUND, SYS_INVALID_INPUT_PARAM};
use repf_core::{with_context, Arguments, Callback, MicroserviceRegistry, Outcome};
use repf_errors::{RepfError, Result};

/// Condition-input keyword holding the selected default resource
pub const DEFAULT_RESOURCE_KW: &str = "defRescName";
/// Condition-input keyword holding the selected transfer thread count
pub const NUM_THREADS_KW: &str = "numThreads";

/// Registry holding every microservice in this module
pub fn builtin() -> MicroserviceRegistry {
    let mut registry = MicroserviceRegistry::new();
    let table: [(&str, usize, fn(&Callback<'_>, &mut Arguments) -> Result<()>); 9] = [
        ("msiStrlen", 2, msi_strlen),
        ("msiStrCat", 2, msi_str_cat),
        ("msiSplitPath", 3, msi_split_path),
        ("msiAddKeyVal", 3, msi_add_key_val),
        ("msiWriteRodsLog", 2, msi_write_rods_log),
        ("msiSetDefaultResc", 2, msi_set_default_resc),
        ("msiSetNumThreads", 3, msi_set_num_threads),
        ("msiExit", 2, msi_exit),
        ("msiGetSessionVarValue", 2, msi_get_session_var_value),
    ];

    for (name, arity, function) in table {
        let registered = registry.register(name, arity, move |callback, args| {
            match function(callback, args) {
                Ok(()) => Outcome::ok(),
                Err(e) => e.into(),
            }
        });
        // Names in the table are unique
        if let Err(e) = registered {
            tracing::error!("Failed to register microservice [{}]: {}", name, e);
        }
    }
    registry
}

fn msi_strlen(_callback: &Callback<'_>, args: &mut Arguments) -> Result<()> {
    let len = args.str_at(0)?.chars().count();
    args.set_str(1, len.to_string())
}

fn msi_str_cat(_callback: &Callback<'_>, args: &mut Arguments) -> Result<()> {
    let joined = format!("{}{}", args.str_at(0)?, args.str_at(1)?);
    args.set_str(0, joined)
}

fn msi_split_path(_callback: &Callback<'_>, args: &mut Arguments) -> Result<()> {
    let path = args.str_at(0)?.to_string();
    let (coll, obj) = match path.rfind('/') {
        Some(0) => ("/", &path[1..]),
        Some(index) => (&path[..index], &path[index + 1..]),
        None => {
            return Err(RepfError::engine(
                SYS_INVALID_INPUT_PARAM,
                format!("[{}] is not a path", path),
            ))
        },
    };
    args.set_str(1, coll)?;
    args.set_str(2, obj)
}

fn msi_add_key_val(_callback: &Callback<'_>, args: &mut Arguments) -> Result<()> {
    let key = args.str_at(1)?.to_string();
    if key.is_empty() {
        return Err(RepfError::engine(SYS_INVALID_INPUT_PARAM, "empty keyword"));
    }
    let value = args.str_at(2)?.to_string();
    args.kvp_mut(0)?.add(key, value);
    Ok(())
}

fn msi_write_rods_log(_callback: &Callback<'_>, args: &mut Arguments) -> Result<()> {
    tracing::info!("writeLine: {}", args.str_at(0)?);
    args.set_int(1, 0)
}

/// `preference` is `forced`, `preferred` or `null`; only `forced` overrides an existing choice
fn msi_set_default_resc(callback: &Callback<'_>, args: &mut Arguments) -> Result<()> {
    let resource = args.str_at(0)?.to_string();
    let forced = args.str_at(1)? == "forced";
    with_context(callback.context(), |ctx| {
        if forced || ctx.condition_inputs.get(DEFAULT_RESOURCE_KW).is_none() {
            ctx.condition_inputs.add(DEFAULT_RESOURCE_KW, resource);
        }
    })
}

fn msi_set_num_threads(callback: &Callback<'_>, args: &mut Arguments) -> Result<()> {
    let threads = match args.str_at(1)? {
        "default" => 0,
        text => text.trim().parse::<u32>().map_err(|_| {
            RepfError::engine(SYS_INVALID_INPUT_PARAM, format!("invalid thread count [{}]", text))
        })?,
    };
    with_context(callback.context(), |ctx| {
        ctx.condition_inputs.add(NUM_THREADS_KW, threads.to_string())
    })
}

fn msi_exit(_callback: &Callback<'_>, args: &mut Arguments) -> Result<()> {
    let code = args.int_at(0)?;
    if code >= 0 {
        return Err(RepfError::engine(
            SYS_INVALID_INPUT_PARAM,
            format!("msiExit requires a negative error code, got [{}]", code),
        ));
    }
    Err(RepfError::engine(code, args.str_at(1)?))
}

fn msi_get_session_var_value(callback: &Callback<'_>, args: &mut Arguments) -> Result<()> {
    let name = args.str_at(0)?.to_string();
    let value = with_context(callback.context(), |ctx| match name.as_str() {
        "userNameClient" => ctx.client_user.as_ref().map(|u| u.user_name.clone()),
        "rodsZoneClient" => ctx.client_user.as_ref().map(|u| u.rods_zone.clone()),
        "userNameProxy" => ctx.proxy_user.as_ref().map(|u| u.user_name.clone()),
        "rodsZoneProxy" => ctx.proxy_user.as_ref().map(|u| u.rods_zone.clone()),
        "clientAddr" => ctx.connection.as_ref().map(|c| c.client_addr.clone()),
        "authScheme" => ctx.connection.as_ref().and_then(|c| c.auth_scheme.clone()),
        keyword => ctx.condition_inputs.get(keyword).map(str::to_string),
    })?;

    match value {
        Some(value) => args.set_str(1, value),
        None => Err(RepfError::engine(
            KEY_NOT_FOUND,
            format!("session variable [{}] is not set", name),
        )),
    }
}
