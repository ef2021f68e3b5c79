//! The schema data model: primitives, arrays, enums, records, interfaces, methods,
//! and the [`Schema`] container that ties them together with deterministic wire
//! indices.

mod schema;
mod types;

pub use schema::{Schema, TypeTable};
pub use types::{assert_name, Declared, Enum, Interface, Method, Primitive, Record, Type, PRIMITIVE_ORDER};
