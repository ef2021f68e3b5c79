//! The whole-schema container: validation, canonical type/method index tables.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, RmcError};

use super::types::{Declared, Enum, Interface, Method, Primitive, Record, Type, PRIMITIVE_ORDER};

/// A fully validated, immutable schema: the agreed set of declared types an RPC
/// bridge may exchange, plus the wire-width parameters for method and object
/// references.
#[derive(Debug, Clone)]
pub struct Schema {
    pub label: String,
    pub bytes_method_ref: u8,
    pub bytes_object_ref: u8,
    /// SHA-256 digest captured when this schema was decoded from the wire, if any.
    pub sha256_digest: Option<[u8; 32]>,
    enums: Vec<Arc<Enum>>,
    records: Vec<Arc<Record>>,
    interfaces: Vec<Arc<Interface>>,
}

impl Schema {
    /// Builds and validates a schema from its declared types.
    ///
    /// `bytes_method_ref` and `bytes_object_ref` must each be one of 1, 2, 4, 8.
    /// Exactly one interface named `Main` must be present, and every interface must
    /// declare at least one method.
    pub fn new(
        label: impl Into<String>,
        enums: Vec<Enum>,
        records: Vec<Record>,
        interfaces: Vec<Interface>,
        bytes_method_ref: u8,
        bytes_object_ref: u8,
    ) -> Result<Self> {
        Self::from_arcs(
            label,
            enums.into_iter().map(Arc::new).collect(),
            records.into_iter().map(Arc::new).collect(),
            interfaces.into_iter().map(Arc::new).collect(),
            bytes_method_ref,
            bytes_object_ref,
        )
    }

    /// Like [`Schema::new`], but takes already-`Arc`'d declared types.
    ///
    /// Self- and mutually-referential interfaces (built via [`Interface::new_uninit`]
    /// plus [`Interface::set_methods`]) can have a strong count greater than one by
    /// the time a schema is assembled around them, so they can't be unwrapped back
    /// into an owned `Interface` the way [`Schema::new`] does for the common case.
    /// The wire decoder in `codec::reader` always goes through this constructor.
    pub fn from_arcs(
        label: impl Into<String>,
        mut enums: Vec<Arc<Enum>>,
        mut records: Vec<Arc<Record>>,
        mut interfaces: Vec<Arc<Interface>>,
        bytes_method_ref: u8,
        bytes_object_ref: u8,
    ) -> Result<Self> {
        if !matches!(bytes_method_ref, 1 | 2 | 4 | 8) {
            return Err(RmcError::InvalidSchema(format!(
                "method references have to be 1, 2, 4 or 8 bytes long, got {bytes_method_ref}"
            )));
        }
        if !matches!(bytes_object_ref, 1 | 2 | 4 | 8) {
            return Err(RmcError::InvalidSchema(format!(
                "object references have to be 1, 2, 4 or 8 bytes long, got {bytes_object_ref}"
            )));
        }
        for ifc in &interfaces {
            if ifc.methods().is_empty() {
                return Err(RmcError::InvalidSchema(format!(
                    "every interface requires at least one method, \"{}\" has none",
                    ifc.name
                )));
            }
        }
        if !interfaces.iter().any(|i| i.name == "Main") {
            return Err(RmcError::InvalidSchema(
                "every schema requires an interface called \"Main\"".to_string(),
            ));
        }

        enums.sort_by(|a, b| a.name.cmp(&b.name));
        records.sort_by(|a, b| a.name.cmp(&b.name));
        interfaces.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self {
            label: label.into(),
            bytes_method_ref,
            bytes_object_ref,
            sha256_digest: None,
            enums,
            records,
            interfaces,
        })
    }

    pub fn with_digest(mut self, digest: [u8; 32]) -> Self {
        self.sha256_digest = Some(digest);
        self
    }

    pub fn enums(&self) -> &[Arc<Enum>] {
        &self.enums
    }

    pub fn records(&self) -> &[Arc<Record>] {
        &self.records
    }

    pub fn interfaces(&self) -> &[Arc<Interface>] {
        &self.interfaces
    }

    pub fn main_interface(&self) -> &Arc<Interface> {
        self.interfaces
            .iter()
            .find(|i| i.name == "Main")
            .expect("validated at construction")
    }

    pub fn interface_named(&self, name: &str) -> Option<&Arc<Interface>> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    pub fn enum_named(&self, name: &str) -> Option<&Arc<Enum>> {
        self.enums.iter().find(|e| e.name == name)
    }

    pub fn record_named(&self, name: &str) -> Option<&Arc<Record>> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Declared types in canonical wire order: enums by name, then records by name,
    /// then interfaces by name. Each is already individually sorted at construction
    /// time, so this is a concatenation.
    pub fn declared_types(&self) -> Vec<Declared> {
        let mut out = Vec::with_capacity(self.enums.len() + self.records.len() + self.interfaces.len());
        out.extend(self.enums.iter().cloned().map(Declared::Enum));
        out.extend(self.records.iter().cloned().map(Declared::Record));
        out.extend(self.interfaces.iter().cloned().map(Declared::Interface));
        out
    }

    /// Maps every primitive and declared type (and, implicitly, every array type) to
    /// its canonical wire index. Array types occupy the negated index of their
    /// element type; `Array(void)` is never present.
    pub fn type_table(&self) -> TypeTable {
        let mut forward: HashMap<TypeKey, i32> = HashMap::new();
        let mut backward: HashMap<i32, Type> = HashMap::new();

        for (idx, prim) in PRIMITIVE_ORDER.iter().enumerate() {
            let typ = Type::Primitive(*prim);
            forward.insert(TypeKey::from(&typ), idx as i32);
            backward.insert(idx as i32, typ);
        }
        for (offset, declared) in self.declared_types().into_iter().enumerate() {
            let idx = PRIMITIVE_ORDER.len() as i32 + offset as i32;
            let typ = declared_to_type(declared);
            forward.insert(TypeKey::from(&typ), idx);
            backward.insert(idx, typ);
        }
        // Array(T) occupies -index(T) for every T except void.
        let base: Vec<(i32, Type)> = backward.iter().map(|(i, t)| (*i, t.clone())).collect();
        for (idx, typ) in base {
            if idx == 0 {
                continue; // Array(void) excluded
            }
            let array_type = Type::array_of(typ);
            forward.insert(TypeKey::from(&array_type), -idx);
            backward.insert(-idx, array_type);
        }

        TypeTable { forward, backward }
    }

    /// Methods flattened in interface-name order, then method-name order within
    /// each interface — this assignment is what "method ordinal" means on the wire.
    pub fn method_table(&self) -> Vec<(Arc<Interface>, Method)> {
        let mut out = Vec::new();
        for ifc in &self.interfaces {
            for method in ifc.methods_sorted() {
                out.push((ifc.clone(), method.clone()));
            }
        }
        out
    }

    /// Maps a method ordinal to the interface that declares it.
    pub fn method_to_interface(&self) -> HashMap<u32, Arc<Interface>> {
        self.method_table()
            .into_iter()
            .enumerate()
            .map(|(idx, (ifc, _))| (idx as u32, ifc))
            .collect()
    }

    /// Maps a method ordinal to its signature.
    pub fn method_lookup(&self) -> HashMap<u32, Method> {
        self.method_table()
            .into_iter()
            .enumerate()
            .map(|(idx, (_, m))| (idx as u32, m))
            .collect()
    }

    /// Inverse of [`Schema::method_lookup`]: method name (qualified by interface) to ordinal.
    pub fn method_ordinal(&self, interface_name: &str, method_name: &str) -> Option<u32> {
        self.method_table().into_iter().position(|(ifc, m)| {
            ifc.name == interface_name && m.name == method_name
        }).map(|p| p as u32)
    }
}

fn declared_to_type(d: Declared) -> Type {
    Type::Declared(d)
}

/// A hashable, comparable stand-in for [`Type`] used as a map key.
///
/// `Type` itself derives `PartialEq`/`Eq` structurally, which is sufficient, but we
/// funnel lookups through this newtype so the table's key type is explicit at call
/// sites and easy to extend (e.g. if `Type` grows a non-`Hash` field later).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TypeKey {
    Primitive(Primitive),
    ArrayOf(Box<TypeKey>),
    Declared(String),
}

impl From<&Type> for TypeKey {
    fn from(t: &Type) -> Self {
        match t {
            Type::Primitive(p) => TypeKey::Primitive(*p),
            Type::Array(inner) => TypeKey::ArrayOf(Box::new(TypeKey::from(inner.as_ref()))),
            Type::Declared(d) => TypeKey::Declared(d.name().to_string()),
        }
    }
}

/// Bidirectional lookup between a [`Type`] and its canonical wire index.
pub struct TypeTable {
    forward: HashMap<TypeKey, i32>,
    backward: HashMap<i32, Type>,
}

impl TypeTable {
    pub fn index_of(&self, typ: &Type) -> Option<i32> {
        self.forward.get(&TypeKey::from(typ)).copied()
    }

    pub fn type_at(&self, index: i32) -> Option<&Type> {
        self.backward.get(&index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Method;

    fn main_interface() -> Interface {
        let method = Method::new("Ping", vec![], Type::Primitive(Primitive::Void)).unwrap();
        Interface::new("Main", vec![method]).unwrap()
    }

    #[test]
    fn requires_a_main_interface() {
        let other = Interface::new(
            "Other",
            vec![Method::new("Ping", vec![], Type::Primitive(Primitive::Void)).unwrap()],
        )
        .unwrap();
        let err = Schema::new("demo", vec![], vec![], vec![other], 4, 4).unwrap_err();
        assert!(matches!(err, RmcError::InvalidSchema(_)));
    }

    #[test]
    fn rejects_interfaces_with_no_methods() {
        let empty = Interface::new_uninit("Empty").unwrap();
        let err = Schema::new("demo", vec![], vec![], vec![main_interface(), empty], 4, 4)
            .unwrap_err();
        assert!(matches!(err, RmcError::InvalidSchema(_)));
    }

    #[test]
    fn rejects_invalid_reference_widths() {
        assert!(Schema::new("demo", vec![], vec![], vec![main_interface()], 3, 4).is_err());
        assert!(Schema::new("demo", vec![], vec![], vec![main_interface()], 4, 0).is_err());
        for width in [1u8, 2, 4, 8] {
            assert!(Schema::new("demo", vec![], vec![], vec![main_interface()], width, width).is_ok());
        }
    }

    #[test]
    fn declared_types_are_sorted_enums_then_records_then_interfaces() {
        let status = Enum::new("Status", vec!["Registered".to_string()]).unwrap();
        let user = Interface::new(
            "User",
            vec![Method::new("GetAge", vec![], Type::Primitive(Primitive::UInt32)).unwrap()],
        )
        .unwrap();
        let schema = Schema::new(
            "demo",
            vec![status],
            vec![],
            vec![main_interface(), user],
            4,
            4,
        )
        .unwrap();
        let declared = schema.declared_types();
        let names: Vec<&str> = declared.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["Status", "Main", "User"]);
    }

    #[test]
    fn method_ordinals_are_assigned_by_interface_then_method_name() {
        let user = Interface::new(
            "User",
            vec![
                Method::new("GetAge", vec![], Type::Primitive(Primitive::UInt32)).unwrap(),
                Method::new("GetName", vec![], Type::Primitive(Primitive::String)).unwrap(),
            ],
        )
        .unwrap();
        let schema = Schema::new("demo", vec![], vec![], vec![main_interface(), user], 4, 4).unwrap();

        // "Main" sorts before "User"; within "User", "GetAge" sorts before "GetName".
        assert_eq!(schema.method_ordinal("Main", "Ping"), Some(0));
        assert_eq!(schema.method_ordinal("User", "GetAge"), Some(1));
        assert_eq!(schema.method_ordinal("User", "GetName"), Some(2));
        assert_eq!(schema.method_ordinal("User", "Missing"), None);

        let lookup = schema.method_lookup();
        assert_eq!(lookup.get(&1).unwrap().name, "GetAge");
    }

    #[test]
    fn array_of_t_occupies_negated_index_of_t() {
        let schema = Schema::new("demo", vec![], vec![], vec![main_interface()], 4, 4).unwrap();
        let table = schema.type_table();
        let void_idx = table.index_of(&Type::Primitive(Primitive::Void)).unwrap();
        assert_eq!(void_idx, 0);
        // Array(void) must never get an index.
        assert!(table.index_of(&Type::array_of(Type::Primitive(Primitive::Void))).is_none());

        let bool_idx = table.index_of(&Type::Primitive(Primitive::Boolean)).unwrap();
        let bool_array_idx = table
            .index_of(&Type::array_of(Type::Primitive(Primitive::Boolean)))
            .unwrap();
        assert_eq!(bool_array_idx, -bool_idx);
    }

    #[test]
    fn from_arcs_accepts_a_self_referential_interface() {
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

        let schema = Schema::from_arcs(
            "demo",
            vec![],
            vec![],
            vec![Arc::new(main_interface()), user],
            4,
            4,
        )
        .unwrap();
        assert!(schema.interface_named("User").is_some());
    }
}
