//! Encodes a [`Schema`] to the wire.
//!
//! Grounded on `codec/write.py` (`WriterBase`/`SchemaWriter`): header, then one
//! block per enum and interface in canonical order, then a SHA-256 digest of
//! everything written. Records are deliberately skipped — `write_schema` in the
//! original never emits a record block either, so a record can only be used as a
//! type within a schema both peers already agree on out of band; see
//! `codec::reader` for the corresponding read-side restriction.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::schema::{Declared, Method, Schema, TypeTable};

use super::constants::{DECLARE_ENUM, DECLARE_INTERFACE, MAGIC, SCHEMA};
use super::hashing::HashingWriter;
use super::primitives::{write_constant, write_name, write_string, write_unsigned};

async fn write_type_ref(
    w: &mut HashingWriter<impl AsyncWrite + Unpin>,
    table: &TypeTable,
    typ: &crate::schema::Type,
) -> Result<()> {
    let idx = table.index_of(typ).ok_or_else(|| {
        crate::error::RmcError::InvalidSchema(format!(
            "no wire index assigned to type {typ}"
        ))
    })?;
    w.write_i32(idx).await?;
    Ok(())
}

async fn write_method(
    w: &mut HashingWriter<impl AsyncWrite + Unpin>,
    table: &TypeTable,
    bytes_method_ref: u8,
    method_idx: u32,
    method: &Method,
) -> Result<()> {
    write_unsigned(w, bytes_method_ref, method_idx as u64).await?;
    write_name(w, &method.name).await?;
    w.write_u32(method.arguments.len() as u32).await?;
    for (typ, name) in &method.arguments {
        write_type_ref(w, table, typ).await?;
        write_name(w, name).await?;
    }
    write_type_ref(w, table, &method.return_type).await?;
    Ok(())
}

/// Encodes `schema` to `stream`, returning the SHA-256 digest written at the end
/// of the frame.
pub async fn write_schema<W: AsyncWrite + Unpin>(schema: &Schema, stream: &mut W) -> Result<[u8; 32]> {
    let mut w = HashingWriter::new(stream);
    let table = schema.type_table();

    write_constant(&mut w, MAGIC).await?;
    write_constant(&mut w, SCHEMA).await?;

    write_string(&mut w, &schema.label).await?;
    w.write_u32(schema.bytes_method_ref as u32).await?;
    w.write_u32(schema.bytes_object_ref as u32).await?;
    w.write_u32(schema.enums().len() as u32).await?;
    w.write_u32(schema.records().len() as u32).await?;
    w.write_u32(schema.interfaces().len() as u32).await?;

    let mut method_idx = 0u32;
    for declared in schema.declared_types() {
        match declared {
            Declared::Enum(e) => {
                write_constant(&mut w, &[DECLARE_ENUM]).await?;
                let idx = table
                    .index_of(&crate::schema::Type::Declared(Declared::Enum(e.clone())))
                    .expect("every declared type has a wire index");
                w.write_i32(idx).await?;
                write_name(&mut w, &e.name).await?;
                w.write_u32(e.values.len() as u32).await?;
                for value in &e.values {
                    write_name(&mut w, value).await?;
                }
            }
            Declared::Record(_) => {}
            Declared::Interface(iface) => {
                write_constant(&mut w, &[DECLARE_INTERFACE]).await?;
                let idx = table
                    .index_of(&crate::schema::Type::Declared(Declared::Interface(
                        iface.clone(),
                    )))
                    .expect("every declared type has a wire index");
                w.write_i32(idx).await?;
                write_name(&mut w, &iface.name).await?;
                let methods = iface.methods_sorted();
                w.write_u32(methods.len() as u32).await?;
                for method in &methods {
                    write_method(&mut w, &table, schema.bytes_method_ref, method_idx, method).await?;
                    method_idx += 1;
                }
            }
        }
    }

    let digest = w.digest();
    if let Some(expected) = schema.sha256_digest {
        if digest != expected {
            return Err(crate::error::RmcError::SchemaMismatch);
        }
    }
    w.write_all(&digest).await?;
    Ok(digest)
}

pub async fn schema_to_bytes(schema: &Schema) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_schema(schema, &mut buf).await?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Declared, Interface, Primitive, Type};

    fn user_schema() -> Schema {
        let main = Interface::new(
            "Main",
            vec![Method::new("Ping", vec![], Type::Primitive(Primitive::Void)).unwrap()],
        )
        .unwrap();
        let user = Interface::new(
            "User",
            vec![Method::new("GetAge", vec![], Type::Primitive(Primitive::UInt32)).unwrap()],
        )
        .unwrap();
        Schema::new("demo", vec![], vec![], vec![main, user], 4, 4).unwrap()
    }

    #[tokio::test]
    async fn round_trips_through_decode() {
        let schema = user_schema();
        let bytes = schema_to_bytes(&schema).await.unwrap();
        let decoded = super::super::schema_from_bytes(&bytes).await.unwrap();
        assert_eq!(decoded.label, "demo");
        assert!(decoded.interface_named("User").is_some());
        assert_eq!(decoded.method_ordinal("User", "GetAge"), schema.method_ordinal("User", "GetAge"));
    }

    #[tokio::test]
    async fn re_encoding_a_decoded_schema_is_byte_identical() {
        let schema = user_schema();
        let first = schema_to_bytes(&schema).await.unwrap();
        let decoded = super::super::schema_from_bytes(&first).await.unwrap();
        let second = schema_to_bytes(&decoded).await.unwrap();
        assert_eq!(first, second);
    }

    fn self_referential_user_interface() -> std::sync::Arc<Interface> {
        let user = std::sync::Arc::new(Interface::new_uninit("User").unwrap());
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
        user
    }

    #[tokio::test]
    async fn self_referential_interface_round_trips() {
        let main = std::sync::Arc::new(
            Interface::new(
                "Main",
                vec![Method::new("Ping", vec![], Type::Primitive(Primitive::Void)).unwrap()],
            )
            .unwrap(),
        );
        let schema = Schema::from_arcs(
            "demo",
            vec![],
            vec![],
            vec![main, self_referential_user_interface()],
            4,
            4,
        )
        .unwrap();

        let bytes = schema_to_bytes(&schema).await.unwrap();
        let decoded = super::super::schema_from_bytes(&bytes).await.unwrap();
        let decoded_user = decoded.interface_named("User").unwrap();
        let method = decoded_user.method_named("AddFriend").unwrap();
        assert_eq!(method.arguments[0].0.as_interface().unwrap().name, "User");
    }

    #[tokio::test]
    async fn flipping_a_bit_in_the_body_breaks_the_digest_check() {
        let schema = user_schema();
        let mut bytes = schema_to_bytes(&schema).await.unwrap();
        let mutate_at = bytes.len() / 2;
        bytes[mutate_at] ^= 0x01;
        let err = super::super::schema_from_bytes(&bytes).await.unwrap_err();
        assert!(matches!(err, crate::error::RmcError::SchemaMismatch));
    }
}
