//! Runtime values: the single tagged representation every argument, return value,
//! record field and array element takes, since the core never generates
//! language-specific bindings for a schema (see design note in SPEC_FULL.md §9).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::proxy::Proxy;
use crate::registry::Implementation;

/// A locally-hosted implementation object or a proxy standing in for a remote one.
///
/// Interface-typed values carry one of these (wrapped in `Option` for nullability)
/// rather than a raw object ID: the ID is purely a wire concern owned by the
/// registry.
#[derive(Clone)]
pub enum ObjectHandle {
    Local(Arc<dyn Implementation>),
    Remote(Arc<Proxy>),
}

impl ObjectHandle {
    /// Pointer identity used by the registry's bidirectional maps.
    pub fn identity(&self) -> usize {
        match self {
            ObjectHandle::Local(obj) => Arc::as_ptr(obj) as *const () as usize,
            ObjectHandle::Remote(proxy) => Arc::as_ptr(proxy) as *const () as usize,
        }
    }

    /// The local implementation behind this handle, if it isn't a proxy for a
    /// remote object. A CALL_METHOD's `this` must always resolve to one of these.
    pub fn as_local_implementation(&self) -> Option<Arc<dyn Implementation>> {
        match self {
            ObjectHandle::Local(obj) => Some(obj.clone()),
            ObjectHandle::Remote(_) => None,
        }
    }
}

impl std::fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectHandle::Local(_) => write!(f, "ObjectHandle::Local(..)"),
            ObjectHandle::Remote(p) => write!(f, "ObjectHandle::Remote({})", p.object_id()),
        }
    }
}

/// An enum value: the declaring type's name plus the selected ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub type_name: String,
    pub ordinal: u32,
}

/// The single runtime representation of any value a method argument, return value,
/// record field, or array element can hold.
#[derive(Clone)]
pub enum Value {
    Void,
    Boolean(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Enum(EnumValue),
    Array(Vec<Value>),
    Record(BTreeMap<String, Value>),
    Object(Option<ObjectHandle>),
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Void => write!(f, "Void"),
            Value::Boolean(v) => write!(f, "Boolean({v})"),
            Value::Int8(v) => write!(f, "Int8({v})"),
            Value::UInt8(v) => write!(f, "UInt8({v})"),
            Value::Int16(v) => write!(f, "Int16({v})"),
            Value::UInt16(v) => write!(f, "UInt16({v})"),
            Value::Int32(v) => write!(f, "Int32({v})"),
            Value::UInt32(v) => write!(f, "UInt32({v})"),
            Value::Int64(v) => write!(f, "Int64({v})"),
            Value::UInt64(v) => write!(f, "UInt64({v})"),
            Value::Float32(v) => write!(f, "Float32({v})"),
            Value::Float64(v) => write!(f, "Float64({v})"),
            Value::String(v) => write!(f, "String({v:?})"),
            Value::Date(v) => write!(f, "Date({v})"),
            Value::Time(v) => write!(f, "Time({v})"),
            Value::DateTime(v) => write!(f, "DateTime({v})"),
            Value::Enum(v) => write!(f, "Enum({}::{})", v.type_name, v.ordinal),
            Value::Array(v) => write!(f, "Array({v:?})"),
            Value::Record(v) => write!(f, "Record({v:?})"),
            Value::Object(v) => write!(f, "Object({v:?})"),
        }
    }
}

impl Value {
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::UInt32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectHandle> {
        match self {
            Value::Object(Some(h)) => Some(h),
            _ => None,
        }
    }
}
