//! Argument serializer
//!
//! Flattens an [`Arg`] into a string-keyed map for engines that cannot consume
//! native structures (textual interpreters). The table is keyed by [`ArgKind`];
//! unregistered kinds produce a single `ERROR` entry instead of failing the call.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;

use crate::args::{Arg, ArgKind, Arguments};
use crate::types::KeyValPair;
use repf_errors::{RepfError, Result};

pub type SerializedMap = BTreeMap<String, String>;

/// Serializer for one argument kind; receives only arguments of that kind
pub type SerializeFn = fn(&Arg, &mut SerializedMap) -> Result<()>;

const NULLPTR: &str = "nullptr";
const ERROR_KEY: &str = "ERROR";

pub struct ArgumentSerializer {
    operations: FxHashMap<ArgKind, SerializeFn>,
}

impl Default for ArgumentSerializer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ArgumentSerializer {
    /// Empty table, every kind unsupported
    pub fn new() -> Self {
        Self {
            operations: FxHashMap::default(),
        }
    }

    /// Table with every built-in kind except opaque values and context handles
    pub fn with_defaults() -> Self {
        let defaults: [(ArgKind, SerializeFn); 19] = [
            (ArgKind::Int, serialize_int),
            (ArgKind::IntPtr, serialize_int_ptr),
            (ArgKind::Long, serialize_long),
            (ArgKind::LongPtr, serialize_long_ptr),
            (ArgKind::Size, serialize_size),
            (ArgKind::FloatPtr, serialize_float_ptr),
            (ArgKind::Str, serialize_string),
            (ArgKind::StrPtr, serialize_string_ptr),
            (ArgKind::CharPtrPtr, serialize_char_ptr_ptr),
            (ArgKind::Strings, serialize_strings),
            (ArgKind::StringArray, serialize_string_array),
            (ArgKind::KeyValPair, serialize_key_val_pair),
            (ArgKind::DataObjInp, serialize_data_obj_inp),
            (ArgKind::DataObjInfo, serialize_data_obj_info),
            (ArgKind::UserInfo, serialize_user_info),
            (ArgKind::CollInp, serialize_coll_inp),
            (ArgKind::GenQueryInp, serialize_gen_query_inp),
            (ArgKind::GenQueryOut, serialize_gen_query_out),
            (ArgKind::Connection, serialize_connection),
        ];

        Self {
            operations: defaults.into_iter().collect(),
        }
    }

    /// Register a serializer for `kind`; an existing registration is kept
    pub fn add_operation(&mut self, kind: ArgKind, operation: SerializeFn) -> Result<()> {
        if self.operations.contains_key(&kind) {
            return Err(RepfError::DuplicateSerializer(kind.name().to_string()));
        }
        self.operations.insert(kind, operation);
        Ok(())
    }

    pub fn is_registered(&self, kind: ArgKind) -> bool {
        self.operations.contains_key(&kind)
    }

    pub fn serialize(&self, arg: &Arg) -> SerializedMap {
        let mut out = SerializedMap::new();
        match self.operations.get(&arg.kind()) {
            Some(operation) => {
                if let Err(e) = operation(arg, &mut out) {
                    out.clear();
                    out.insert(ERROR_KEY.to_string(), e.to_string());
                }
            },
            None => {
                tracing::debug!("No serializer registered for [{}]", arg.type_name());
                out.insert(
                    ERROR_KEY.to_string(),
                    format!("[{}] not supported", arg.type_name()),
                );
            },
        }
        out
    }

    pub fn serialize_arguments(&self, args: &Arguments) -> Vec<SerializedMap> {
        args.iter().map(|arg| self.serialize(arg)).collect()
    }
}

// ============================================================================
// Built-in serializers
// ============================================================================

fn mismatch(expected: ArgKind, actual: &Arg) -> RepfError {
    RepfError::argument_type(expected.name(), actual.type_name())
}

fn put(out: &mut SerializedMap, key: &str, value: impl ToString) {
    out.insert(key.to_string(), value.to_string());
}

fn put_nullable<T: fmt::Display>(out: &mut SerializedMap, key: &str, value: Option<&T>) {
    match value {
        Some(v) => put(out, key, v),
        None => put(out, key, NULLPTR),
    }
}

fn put_pairs(out: &mut SerializedMap, kvp: &KeyValPair) {
    for (keyword, value) in kvp.iter() {
        if value.is_empty() {
            put(out, keyword, "empty_value");
        } else {
            put(out, keyword, value);
        }
    }
}

fn put_sequence<'a>(out: &mut SerializedMap, values: impl ExactSizeIterator<Item = &'a String>) {
    put(out, "size", values.len());
    for (index, value) in values.enumerate() {
        out.insert(index.to_string(), value.clone());
    }
}

fn serialize_int(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::Int(v) => put(out, "int", v),
        other => return Err(mismatch(ArgKind::Int, other)),
    }
    Ok(())
}

fn serialize_int_ptr(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::IntPtr(v) => put_nullable(out, "int_ptr", v.as_ref()),
        other => return Err(mismatch(ArgKind::IntPtr, other)),
    }
    Ok(())
}

fn serialize_long(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::Long(v) => put(out, "rodslong", v),
        other => return Err(mismatch(ArgKind::Long, other)),
    }
    Ok(())
}

fn serialize_long_ptr(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::LongPtr(v) => put_nullable(out, "rodslong_ptr", v.as_ref()),
        other => return Err(mismatch(ArgKind::LongPtr, other)),
    }
    Ok(())
}

fn serialize_size(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::Size(v) => put(out, "sizet", v),
        other => return Err(mismatch(ArgKind::Size, other)),
    }
    Ok(())
}

fn serialize_float_ptr(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::FloatPtr(v) => put_nullable(out, "float_pointer", v.as_ref()),
        other => return Err(mismatch(ArgKind::FloatPtr, other)),
    }
    Ok(())
}

fn serialize_string(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::Str(s) => put(out, "std_string", s),
        other => return Err(mismatch(ArgKind::Str, other)),
    }
    Ok(())
}

fn serialize_string_ptr(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::StrPtr(s) => put_nullable(out, "std_string_ptr", s.as_ref()),
        other => return Err(mismatch(ArgKind::StrPtr, other)),
    }
    Ok(())
}

fn serialize_char_ptr_ptr(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::CharPtrPtr(Some(s)) => put(out, "value", s),
        Arg::CharPtrPtr(None) => put(out, "null_value", "null_value"),
        other => return Err(mismatch(ArgKind::CharPtrPtr, other)),
    }
    Ok(())
}

fn serialize_strings(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::Strings(values) => put_sequence(out, values.iter()),
        other => return Err(mismatch(ArgKind::Strings, other)),
    }
    Ok(())
}

fn serialize_string_array(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::StringArray(values) => put_sequence(out, values.iter()),
        other => return Err(mismatch(ArgKind::StringArray, other)),
    }
    Ok(())
}

fn serialize_key_val_pair(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::KeyValPair(kvp) if kvp.is_empty() => put(out, "keyValPair_t", NULLPTR),
        Arg::KeyValPair(kvp) => put_pairs(out, kvp),
        other => return Err(mismatch(ArgKind::KeyValPair, other)),
    }
    Ok(())
}

fn serialize_data_obj_inp(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::DataObjInp(Some(inp)) => {
            put(out, "obj_path", &inp.obj_path);
            put(out, "create_mode", inp.create_mode);
            put(out, "open_flags", inp.open_flags);
            put(out, "offset", inp.offset);
            put(out, "data_size", inp.data_size);
            put(out, "num_threads", inp.num_threads);
            put(out, "opr_type", inp.opr_type);
            put_pairs(out, &inp.cond_input);
        },
        Arg::DataObjInp(None) => put(out, "dataObjInp_ptr", NULLPTR),
        other => return Err(mismatch(ArgKind::DataObjInp, other)),
    }
    Ok(())
}

fn serialize_data_obj_info(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::DataObjInfo(Some(info)) => {
            put(out, "logical_path", &info.logical_path);
            put(out, "resc_hier", &info.resc_hier);
            put(out, "data_type", &info.data_type);
            put(out, "data_size", info.data_size);
            put(out, "checksum", &info.checksum);
            put(out, "version", &info.version);
            put(out, "physical_path", &info.physical_path);
            put(out, "data_owner_name", &info.data_owner_name);
            put(out, "data_owner_zone", &info.data_owner_zone);
            put(out, "replica_number", info.replica_number);
            put(out, "replica_status", info.replica_status);
            put(out, "data_id", info.data_id);
            put(out, "coll_id", info.coll_id);
            put(out, "data_comments", &info.data_comments);
        },
        Arg::DataObjInfo(None) => put(out, "dataObjInfo_ptr", NULLPTR),
        other => return Err(mismatch(ArgKind::DataObjInfo, other)),
    }
    Ok(())
}

fn serialize_user_info(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::UserInfo(Some(user)) => {
            put(out, "user_name", &user.user_name);
            put(out, "rods_zone", &user.rods_zone);
            put(out, "user_type", &user.user_type);
        },
        Arg::UserInfo(None) => put(out, "userInfo_ptr", NULLPTR),
        other => return Err(mismatch(ArgKind::UserInfo, other)),
    }
    Ok(())
}

fn serialize_coll_inp(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::CollInp(Some(inp)) => {
            put(out, "coll_name", &inp.coll_name);
            put(out, "flags", inp.flags);
            put(out, "opr_type", inp.opr_type);
            put_pairs(out, &inp.cond_input);
        },
        Arg::CollInp(None) => put(out, "collInp_ptr", NULLPTR),
        other => return Err(mismatch(ArgKind::CollInp, other)),
    }
    Ok(())
}

fn serialize_gen_query_inp(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::GenQueryInp(Some(inp)) => {
            put(out, "maxRows", inp.max_rows);
            put(out, "continueInx", inp.continue_inx);
            put(out, "rowOffset", inp.row_offset);
            put(out, "options", inp.options);
            put_pairs(out, &inp.cond_input);
            for (attribute, option) in &inp.select {
                put(out, &format!("select_{}", attribute), option);
            }
            for (attribute, condition) in &inp.conditions {
                put(out, &format!("where_{}", attribute), condition);
            }
        },
        Arg::GenQueryInp(None) => put(out, "null_value", "null_value"),
        other => return Err(mismatch(ArgKind::GenQueryInp, other)),
    }
    Ok(())
}

fn serialize_gen_query_out(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::GenQueryOut(Some(result)) => {
            put(out, "rowCnt", result.row_count());
            put(out, "attriCnt", result.attribute_count());
            put(out, "continueInx", result.continue_inx);
            put(out, "totalRowCount", result.total_row_count);
            for (col, column) in result.columns.iter().enumerate() {
                put(out, &format!("attriInx_{}", col), column.attribute_index);
                put(out, &format!("len_{}", col), column.len);
                for (row, value) in column.values.iter().enumerate() {
                    put(out, &format!("value_{}_{}", row, col), value);
                }
            }
        },
        Arg::GenQueryOut(None) => put(out, "null_value", "null_value"),
        other => return Err(mismatch(ArgKind::GenQueryOut, other)),
    }
    Ok(())
}

fn serialize_connection(arg: &Arg, out: &mut SerializedMap) -> Result<()> {
    match arg {
        Arg::Connection(Some(conn)) => {
            put(out, "client_addr", &conn.client_addr);
            if let Some(scheme) = &conn.auth_scheme {
                put(out, "auth_scheme", scheme);
            }
            put(out, "proxy_user_name", &conn.proxy_user.user_name);
            put(out, "proxy_rods_zone", &conn.proxy_user.rods_zone);
            put(out, "proxy_user_type", &conn.proxy_user.user_type);
            put(out, "user_user_name", &conn.client_user.user_name);
            put(out, "user_rods_zone", &conn.client_user.rods_zone);
            put(out, "user_user_type", &conn.client_user.user_type);
        },
        Arg::Connection(None) => put(out, "rsComm_ptr", NULLPTR),
        other => return Err(mismatch(ArgKind::Connection, other)),
    }
    Ok(())
}
