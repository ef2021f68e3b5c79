//! The in-memory schema data model: primitives, arrays, enums, records, interfaces and methods.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{Result, RmcError};

/// Validates a schema identifier: non-empty, alphanumeric, first character a letter.
///
/// Used for every declared name (types, fields, methods, enum values) and on every
/// name read back off the wire.
pub fn assert_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let first = chars
        .next()
        .ok_or_else(|| RmcError::InvalidName(name.to_string()))?;
    if !first.is_ascii_alphabetic() {
        return Err(RmcError::InvalidName(name.to_string()));
    }
    if !chars.clone().all(|c| c.is_ascii_alphanumeric()) {
        return Err(RmcError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// The sixteen fixed-width/primitive wire types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    Void,
    Boolean,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    String,
    Date,
    Time,
    DateTime,
}

/// Canonical order of primitives on the wire; `Void` is always index 0.
pub const PRIMITIVE_ORDER: [Primitive; 16] = [
    Primitive::Void,
    Primitive::Boolean,
    Primitive::Int8,
    Primitive::UInt8,
    Primitive::Int16,
    Primitive::UInt16,
    Primitive::Int32,
    Primitive::UInt32,
    Primitive::Int64,
    Primitive::UInt64,
    Primitive::Float32,
    Primitive::Float64,
    Primitive::String,
    Primitive::Date,
    Primitive::Time,
    Primitive::DateTime,
];

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Primitive::Void => "void",
            Primitive::Boolean => "boolean",
            Primitive::Int8 => "int8",
            Primitive::UInt8 => "uint8",
            Primitive::Int16 => "int16",
            Primitive::UInt16 => "uint16",
            Primitive::Int32 => "int32",
            Primitive::UInt32 => "uint32",
            Primitive::Int64 => "int64",
            Primitive::UInt64 => "uint64",
            Primitive::Float32 => "float32",
            Primitive::Float64 => "float64",
            Primitive::String => "string",
            Primitive::Date => "date",
            Primitive::Time => "time",
            Primitive::DateTime => "datetime",
        };
        write!(f, "{name}")
    }
}

/// A named enum type: an ordered list of up to 256 value names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enum {
    pub name: String,
    pub values: Vec<String>,
}

impl Enum {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Result<Self> {
        let name = name.into();
        assert_name(&name)?;
        if values.len() > 256 {
            return Err(RmcError::InvalidSchema(format!(
                "enum \"{name}\" may contain at most 256 values, got {}",
                values.len()
            )));
        }
        for value in &values {
            assert_name(value)?;
        }
        Ok(Self { name, values })
    }

    pub fn ordinal_of(&self, value: &str) -> Option<u32> {
        self.values.iter().position(|v| v == value).map(|p| p as u32)
    }
}

/// A named record type: an ordered list of `(type, field name)` pairs.
///
/// Fields are declared in the given order but sorted by name when pretty-printed
/// or listed; the declared order is what's used on the wire.
#[derive(Debug, Clone)]
pub struct Record {
    pub name: String,
    pub fields: Vec<(Type, String)>,
}

impl Record {
    pub fn new(name: impl Into<String>, fields: Vec<(Type, String)>) -> Result<Self> {
        let name = name.into();
        assert_name(&name)?;
        for (typ, field_name) in &fields {
            assert_name(field_name)?;
            if matches!(typ, Type::Primitive(Primitive::Void)) {
                return Err(RmcError::InvalidSchema(format!(
                    "field \"{field_name}\" of record \"{name}\" cannot be of type void"
                )));
            }
        }
        Ok(Self { name, fields })
    }

    pub fn fields_sorted(&self) -> Vec<&(Type, String)> {
        let mut fields: Vec<&(Type, String)> = self.fields.iter().collect();
        fields.sort_by(|a, b| a.1.cmp(&b.1));
        fields
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Record {}

/// A single method signature: name, ordered arguments, return type.
#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub arguments: Vec<(Type, String)>,
    pub return_type: Type,
}

impl Method {
    pub fn new(
        name: impl Into<String>,
        arguments: Vec<(Type, String)>,
        return_type: Type,
    ) -> Result<Self> {
        let name = name.into();
        assert_name(&name)?;
        for (typ, arg_name) in &arguments {
            assert_name(arg_name)?;
            if matches!(typ, Type::Primitive(Primitive::Void)) {
                return Err(RmcError::InvalidSchema(format!(
                    "argument \"{arg_name}\" of method \"{name}\" cannot be of type void"
                )));
            }
        }
        Ok(Self {
            name,
            arguments,
            return_type,
        })
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Method {}

/// A named interface: an ordered list of methods.
///
/// Methods are held behind a [`OnceLock`] rather than a plain field so that an
/// interface can be referenced (via `Arc<Interface>`) from one of its own method
/// signatures before those signatures exist — the self- and mutually-referential
/// case the wire decoder has to handle (e.g. `User.AddFriend(user: User)`).
/// [`Interface::new`] fills it immediately for the common, non-cyclic case.
#[derive(Debug)]
pub struct Interface {
    pub name: String,
    methods: OnceLock<Vec<Method>>,
}

impl Interface {
    pub fn new(name: impl Into<String>, methods: Vec<Method>) -> Result<Self> {
        let iface = Self::new_uninit(name)?;
        iface.set_methods(methods);
        Ok(iface)
    }

    /// Creates an interface shell with no methods yet. Pair with [`Interface::set_methods`]
    /// once the method list — possibly referencing this same interface — is ready.
    pub fn new_uninit(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        assert_name(&name)?;
        Ok(Self {
            name,
            methods: OnceLock::new(),
        })
    }

    /// Fills in the method list of an interface created via [`Interface::new_uninit`].
    /// A no-op if methods were already set.
    pub fn set_methods(&self, methods: Vec<Method>) {
        let _ = self.methods.set(methods);
    }

    pub fn methods(&self) -> &[Method] {
        self.methods.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn methods_sorted(&self) -> Vec<&Method> {
        let mut methods: Vec<&Method> = self.methods().iter().collect();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        methods
    }

    pub fn method_named(&self, name: &str) -> Option<&Method> {
        self.methods().iter().find(|m| m.name == name)
    }
}

impl Clone for Interface {
    fn clone(&self) -> Self {
        let cloned = Self {
            name: self.name.clone(),
            methods: OnceLock::new(),
        };
        if let Some(methods) = self.methods.get() {
            cloned.set_methods(methods.clone());
        }
        cloned
    }
}

impl PartialEq for Interface {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Interface {}

/// A declared (named, non-primitive, non-array) schema type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declared {
    Enum(Arc<Enum>),
    Record(Arc<Record>),
    Interface(Arc<Interface>),
}

impl Declared {
    pub fn name(&self) -> &str {
        match self {
            Declared::Enum(e) => &e.name,
            Declared::Record(r) => &r.name,
            Declared::Interface(i) => &i.name,
        }
    }

    /// Sort precedence matching the canonical declared-type ordering: enums, then
    /// records, then interfaces, each ordered by name within their group.
    fn order(&self) -> u8 {
        match self {
            Declared::Enum(_) => 0,
            Declared::Record(_) => 1,
            Declared::Interface(_) => 2,
        }
    }

    pub fn sort_key(&self) -> (u8, &str) {
        (self.order(), self.name())
    }
}

/// The tagged union of every type a field, argument or return value can have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Primitive(Primitive),
    Array(Box<Type>),
    Declared(Declared),
}

impl Type {
    pub fn array_of(typ: Type) -> Type {
        Type::Array(Box::new(typ))
    }

    pub fn as_interface(&self) -> Option<&Arc<Interface>> {
        match self {
            Type::Declared(Declared::Interface(i)) => Some(i),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&Arc<Enum>> {
        match self {
            Type::Declared(Declared::Enum(e)) => Some(e),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Arc<Record>> {
        match self {
            Type::Declared(Declared::Record(r)) => Some(r),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::Void))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{p}"),
            Type::Array(t) => write!(f, "{t}[]"),
            Type::Declared(d) => write!(f, "{}", d.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_digit_led_and_non_alphanumeric_names() {
        assert!(assert_name("").is_err());
        assert!(assert_name("1User").is_err());
        assert!(assert_name("User-Name").is_err());
        assert!(assert_name("User_Name").is_err());
        assert!(assert_name("User").is_ok());
        assert!(assert_name("u").is_ok());
        assert!(assert_name("User1").is_ok());
    }

    #[test]
    fn enum_rejects_more_than_256_values() {
        let values: Vec<String> = (0..257).map(|i| format!("V{i}")).collect();
        assert!(Enum::new("Status", values).is_err());
        let values: Vec<String> = (0..256).map(|i| format!("V{i}")).collect();
        assert!(Enum::new("Status", values).is_ok());
    }

    #[test]
    fn enum_ordinal_of_is_position_in_declared_order() {
        let status = Enum::new(
            "Status",
            vec!["Registered".to_string(), "Activated".to_string(), "Locked".to_string()],
        )
        .unwrap();
        assert_eq!(status.ordinal_of("Registered"), Some(0));
        assert_eq!(status.ordinal_of("Activated"), Some(1));
        assert_eq!(status.ordinal_of("Locked"), Some(2));
        assert_eq!(status.ordinal_of("Missing"), None);
    }

    #[test]
    fn record_rejects_void_fields() {
        let fields = vec![(Type::Primitive(Primitive::Void), "age".to_string())];
        assert!(Record::new("Bad", fields).is_err());
    }

    #[test]
    fn method_rejects_void_arguments() {
        let args = vec![(Type::Primitive(Primitive::Void), "x".to_string())];
        assert!(Method::new("DoThing", args, Type::Primitive(Primitive::Void)).is_err());
    }

    #[test]
    fn interface_is_empty_until_methods_are_set() {
        let iface = Interface::new_uninit("User").unwrap();
        assert!(iface.methods().is_empty());
        assert!(iface.method_named("GetAge").is_none());

        let method = Method::new("GetAge", vec![], Type::Primitive(Primitive::UInt32)).unwrap();
        iface.set_methods(vec![method]);
        assert!(iface.method_named("GetAge").is_some());
    }

    #[test]
    fn self_referential_interface_can_be_built_via_arc() {
        let user = Arc::new(Interface::new_uninit("User").unwrap());
        let add_friend = Method::new(
            "AddFriend",
            vec![(
                Type::Declared(Declared::Interface(user.clone())),
                "user".to_string(),
            )],
            Type::Primitive(Primitive::Void),
        )
        .unwrap();
        user.set_methods(vec![add_friend]);

        let method = user.method_named("AddFriend").unwrap();
        let arg_type = &method.arguments[0].0;
        assert_eq!(arg_type.as_interface().unwrap().name, "User");
    }

    #[test]
    fn cloning_an_interface_copies_its_methods() {
        let method = Method::new("GetAge", vec![], Type::Primitive(Primitive::UInt32)).unwrap();
        let iface = Interface::new("User", vec![method]).unwrap();
        let cloned = iface.clone();
        assert_eq!(cloned.method_named("GetAge").unwrap().name, "GetAge");
    }

    #[test]
    fn array_of_void_type_is_still_constructible_but_excluded_from_the_wire_table() {
        // Array(void) is a valid `Type` value; it's the *wire* table construction in
        // `Schema::type_table` that excludes it from getting an index.
        let array = Type::array_of(Type::Primitive(Primitive::Void));
        assert_eq!(format!("{array}"), "void[]");
    }
}
