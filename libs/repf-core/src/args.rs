//! Invocation arguments
//!
//! A rule call carries a positional list of [`Arg`] values. The set of shapes is
//! closed: scalars, null-able scalar slots, strings and string slots, string
//! sequences, the domain structures in [`crate::types`], an opaque handle to the
//! execution context, and `Opaque` for values nothing knows how to represent.
//! Slots (`*Ptr` variants) are the in/out parameters a rule may overwrite.

use crate::context::SharedContext;
use crate::types::{
    CollInp, ConnectionInfo, DataObjInfo, DataObjInp, GenQueryInp, GenQueryOut, KeyValPair,
    UserInfo,
};
use repf_errors::{RepfError, Result};

/// Tag of an [`Arg`], the key of the serializer dispatch table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Int,
    IntPtr,
    Long,
    LongPtr,
    Size,
    FloatPtr,
    Str,
    StrPtr,
    CharPtrPtr,
    Strings,
    StringArray,
    KeyValPair,
    DataObjInp,
    DataObjInfo,
    UserInfo,
    CollInp,
    GenQueryInp,
    GenQueryOut,
    Connection,
    Context,
    Opaque,
}

impl ArgKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::IntPtr => "int_ptr",
            Self::Long => "rodslong",
            Self::LongPtr => "rodslong_ptr",
            Self::Size => "sizet",
            Self::FloatPtr => "float_pointer",
            Self::Str => "std_string",
            Self::StrPtr => "std_string_ptr",
            Self::CharPtrPtr => "char_ptr_ptr",
            Self::Strings => "string_vector",
            Self::StringArray => "string_array",
            Self::KeyValPair => "keyValPair_t",
            Self::DataObjInp => "dataObjInp_t",
            Self::DataObjInfo => "dataObjInfo_t",
            Self::UserInfo => "userInfo_t",
            Self::CollInp => "collInp_t",
            Self::GenQueryInp => "genQueryInp_t",
            Self::GenQueryOut => "genQueryOut_t",
            Self::Connection => "rsComm_t",
            Self::Context => "rule_execution_context",
            Self::Opaque => "opaque",
        }
    }
}

/// One positional argument
#[derive(Debug, Clone)]
pub enum Arg {
    Int(i32),
    IntPtr(Option<i32>),
    Long(i64),
    LongPtr(Option<i64>),
    Size(usize),
    FloatPtr(Option<f32>),
    Str(String),
    /// Mutable string slot, `None` is a null slot
    StrPtr(Option<String>),
    CharPtrPtr(Option<String>),
    /// Growable sequence
    Strings(Vec<String>),
    /// Fixed-size sequence
    StringArray(Box<[String]>),
    KeyValPair(KeyValPair),
    DataObjInp(Option<DataObjInp>),
    DataObjInfo(Option<DataObjInfo>),
    UserInfo(Option<UserInfo>),
    CollInp(Option<CollInp>),
    GenQueryInp(Option<GenQueryInp>),
    GenQueryOut(Option<GenQueryOut>),
    Connection(Option<ConnectionInfo>),
    /// Slot filled with the execution context by the `unsafe_ms_ctx` sentinel
    Context(Option<SharedContext>),
    Opaque { type_name: String },
}

impl Arg {
    pub fn kind(&self) -> ArgKind {
        match self {
            Self::Int(_) => ArgKind::Int,
            Self::IntPtr(_) => ArgKind::IntPtr,
            Self::Long(_) => ArgKind::Long,
            Self::LongPtr(_) => ArgKind::LongPtr,
            Self::Size(_) => ArgKind::Size,
            Self::FloatPtr(_) => ArgKind::FloatPtr,
            Self::Str(_) => ArgKind::Str,
            Self::StrPtr(_) => ArgKind::StrPtr,
            Self::CharPtrPtr(_) => ArgKind::CharPtrPtr,
            Self::Strings(_) => ArgKind::Strings,
            Self::StringArray(_) => ArgKind::StringArray,
            Self::KeyValPair(_) => ArgKind::KeyValPair,
            Self::DataObjInp(_) => ArgKind::DataObjInp,
            Self::DataObjInfo(_) => ArgKind::DataObjInfo,
            Self::UserInfo(_) => ArgKind::UserInfo,
            Self::CollInp(_) => ArgKind::CollInp,
            Self::GenQueryInp(_) => ArgKind::GenQueryInp,
            Self::GenQueryOut(_) => ArgKind::GenQueryOut,
            Self::Connection(_) => ArgKind::Connection,
            Self::Context(_) => ArgKind::Context,
            Self::Opaque { .. } => ArgKind::Opaque,
        }
    }

    /// Name used in diagnostics; opaque values report their own type name
    pub fn type_name(&self) -> &str {
        match self {
            Self::Opaque { type_name } => type_name,
            other => other.kind().name(),
        }
    }

    pub fn opaque(type_name: impl Into<String>) -> Self {
        Self::Opaque {
            type_name: type_name.into(),
        }
    }

    pub fn out_str() -> Self {
        Self::StrPtr(Some(String::new()))
    }

    /// String view of string-like arguments
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::StrPtr(Some(s)) | Self::CharPtrPtr(Some(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) | Self::IntPtr(Some(v)) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<KeyValPair> for Arg {
    fn from(value: KeyValPair) -> Self {
        Self::KeyValPair(value)
    }
}

/// Positional argument list of one rule call
#[derive(Debug, Clone, Default)]
pub struct Arguments(Vec<Arg>);

impl Arguments {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, arg: impl Into<Arg>) {
        self.0.push(arg.into());
    }

    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.0.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Arg> {
        self.0.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arg> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Arg] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Arg> {
        self.0
    }

    /// Prepend `prefix`, e.g. the instance name and out parameter of a hook frame
    pub fn prepend(&mut self, prefix: Vec<Arg>) {
        self.0.splice(0..0, prefix);
    }

    /// Remove and return the first `count` arguments (or all, if fewer)
    pub fn take_prefix(&mut self, count: usize) -> Vec<Arg> {
        let count = count.min(self.0.len());
        self.0.drain(..count).collect()
    }

    fn arg(&self, index: usize) -> Result<&Arg> {
        self.0.get(index).ok_or_else(|| RepfError::ArgumentCount {
            name: format!("argument {}", index),
            expected: index + 1,
            actual: self.0.len(),
        })
    }

    fn arg_mut(&mut self, index: usize) -> Result<&mut Arg> {
        let actual = self.0.len();
        self.0
            .get_mut(index)
            .ok_or_else(|| RepfError::ArgumentCount {
                name: format!("argument {}", index),
                expected: index + 1,
                actual,
            })
    }

    /// String value at `index` (plain string or non-null slot)
    pub fn str_at(&self, index: usize) -> Result<&str> {
        let arg = self.arg(index)?;
        arg.as_str()
            .ok_or_else(|| RepfError::argument_type("string", arg.type_name()))
    }

    pub fn int_at(&self, index: usize) -> Result<i32> {
        let arg = self.arg(index)?;
        if let Some(value) = arg.as_int() {
            return Ok(value);
        }
        // Textual interpreters pass numbers as strings
        arg.as_str()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| RepfError::argument_type("int", arg.type_name()))
    }

    /// Overwrite a string slot
    pub fn set_str(&mut self, index: usize, value: impl Into<String>) -> Result<()> {
        match self.arg_mut(index)? {
            Arg::StrPtr(slot) | Arg::CharPtrPtr(slot) => {
                *slot = Some(value.into());
                Ok(())
            },
            other => Err(RepfError::argument_type(
                "std_string_ptr",
                other.type_name(),
            )),
        }
    }

    pub fn set_int(&mut self, index: usize, value: i32) -> Result<()> {
        match self.arg_mut(index)? {
            Arg::IntPtr(slot) => {
                *slot = Some(value);
                Ok(())
            },
            other => Err(RepfError::argument_type("int_ptr", other.type_name())),
        }
    }

    pub fn kvp_mut(&mut self, index: usize) -> Result<&mut KeyValPair> {
        match self.arg_mut(index)? {
            Arg::KeyValPair(kvp) => Ok(kvp),
            Arg::DataObjInp(Some(inp)) => Ok(&mut inp.cond_input),
            Arg::CollInp(Some(inp)) => Ok(&mut inp.cond_input),
            other => Err(RepfError::argument_type("keyValPair_t", other.type_name())),
        }
    }

    /// First context slot in the call, if any
    pub fn context_slot_mut(&mut self) -> Option<&mut Option<SharedContext>> {
        self.0.iter_mut().find_map(|arg| match arg {
            Arg::Context(slot) => Some(slot),
            _ => None,
        })
    }

    /// Index of the first writable string slot
    pub fn first_str_slot(&self) -> Option<usize> {
        self.0
            .iter()
            .position(|arg| matches!(arg, Arg::StrPtr(_) | Arg::CharPtrPtr(_)))
    }
}

impl From<Vec<Arg>> for Arguments {
    fn from(args: Vec<Arg>) -> Self {
        Self(args)
    }
}

impl FromIterator<Arg> for Arguments {
    fn from_iter<I: IntoIterator<Item = Arg>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Arguments {
    type Item = &'a Arg;
    type IntoIter = std::slice::Iter<'a, Arg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
