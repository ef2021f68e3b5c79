//! Decodes a [`Schema`] off the wire.
//!
//! Grounded directly on `codec/read.py` (`ReaderBase`/`SchemaReader`) from the
//! original implementation: header, then one block per enum and interface, each
//! tagged with its canonical type index, followed by a SHA-256 digest of
//! everything read so far. Record blocks are never emitted (see `codec::writer`)
//! so `records_count` must be zero.
//!
//! Interfaces are read in two passes because a method's argument or return type
//! may reference an interface — including its own — declared anywhere in the
//! block list: first every interface is shelled with [`Interface::new_uninit`],
//! then every method signature is resolved against the now-complete index, and
//! finally filled in with [`Interface::set_methods`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Result, RmcError};
use crate::schema::{Declared, Enum, Interface, Method, Schema, Type, PRIMITIVE_ORDER};

use super::constants::{DECLARE_ENUM, DECLARE_INTERFACE, MAGIC, SCHEMA};
use super::hashing::HashingReader;
use super::primitives::{read_constant, read_name, read_string, read_unsigned};

struct RawMethod {
    name: String,
    arguments: Vec<(i32, String)>,
    return_type: i32,
}

/// True if `type_ref` collides with one of the 16 primitive indices, which are
/// implicitly reserved before any declared type is read — mirrors `codec/read.py`
/// seeding its `types` dict with every primitive up front.
fn is_primitive_index(type_ref: i32) -> bool {
    type_ref >= 0 && (type_ref as usize) < PRIMITIVE_ORDER.len()
}

fn resolve_non_array(
    idx: i32,
    enums: &HashMap<i32, Arc<Enum>>,
    interfaces: &HashMap<i32, Arc<Interface>>,
) -> Result<Type> {
    if idx >= 0 && (idx as usize) < PRIMITIVE_ORDER.len() {
        return Ok(Type::Primitive(PRIMITIVE_ORDER[idx as usize]));
    }
    if let Some(e) = enums.get(&idx) {
        return Ok(Type::Declared(Declared::Enum(e.clone())));
    }
    if let Some(i) = interfaces.get(&idx) {
        return Ok(Type::Declared(Declared::Interface(i.clone())));
    }
    Err(RmcError::UnknownType(idx))
}

fn resolve_type(
    idx: i32,
    enums: &HashMap<i32, Arc<Enum>>,
    interfaces: &HashMap<i32, Arc<Interface>>,
) -> Result<Type> {
    if idx < 0 {
        Ok(Type::array_of(resolve_non_array(-idx, enums, interfaces)?))
    } else {
        resolve_non_array(idx, enums, interfaces)
    }
}

pub async fn read_schema<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Schema> {
    let mut r = HashingReader::new(stream);

    read_constant(&mut r, MAGIC).await?;
    read_constant(&mut r, SCHEMA).await?;

    let label = read_string(&mut r).await?;
    let bytes_method_ref = r.read_u32().await? as u8;
    let bytes_object_ref = r.read_u32().await? as u8;
    let enums_count = r.read_u32().await?;
    let records_count = r.read_u32().await?;
    let interfaces_count = r.read_u32().await?;

    if records_count != 0 {
        return Err(RmcError::InvalidSchema(
            "record declarations cannot be read off the wire; records may only be used as field types agreed out of band".to_string(),
        ));
    }

    let mut enums: HashMap<i32, Arc<Enum>> = HashMap::new();
    let mut interfaces: HashMap<i32, Arc<Interface>> = HashMap::new();
    let mut raw_interfaces: Vec<(i32, Vec<RawMethod>)> = Vec::new();

    for _ in 0..enums_count {
        read_constant(&mut r, &[DECLARE_ENUM]).await?;
        let type_ref = r.read_i32().await?;
        let name = read_name(&mut r).await?;
        let count = r.read_u32().await?;
        let mut values = Vec::with_capacity(count as usize);
        for _ in 0..count {
            values.push(read_name(&mut r).await?);
        }
        if is_primitive_index(type_ref) || enums.contains_key(&type_ref) {
            return Err(RmcError::InvalidSchema(format!(
                "type index {type_ref} declared twice"
            )));
        }
        enums.insert(type_ref, Arc::new(Enum::new(name, values)?));
    }

    for _ in 0..interfaces_count {
        read_constant(&mut r, &[DECLARE_INTERFACE]).await?;
        let type_ref = r.read_i32().await?;
        let name = read_name(&mut r).await?;
        let method_count = r.read_u32().await?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            let _method_ref = read_unsigned(&mut r, bytes_method_ref).await?;
            let method_name = read_name(&mut r).await?;
            let arg_count = r.read_u32().await?;
            let mut arguments = Vec::with_capacity(arg_count as usize);
            for _ in 0..arg_count {
                let arg_type_ref = r.read_i32().await?;
                let arg_name = read_name(&mut r).await?;
                arguments.push((arg_type_ref, arg_name));
            }
            let return_type = r.read_i32().await?;
            methods.push(RawMethod {
                name: method_name,
                arguments,
                return_type,
            });
        }
        if is_primitive_index(type_ref) || enums.contains_key(&type_ref) || interfaces.contains_key(&type_ref) {
            return Err(RmcError::InvalidSchema(format!(
                "type index {type_ref} declared twice"
            )));
        }
        interfaces.insert(type_ref, Arc::new(Interface::new_uninit(name)?));
        raw_interfaces.push((type_ref, methods));
    }

    for (type_ref, raw_methods) in &raw_interfaces {
        let iface = interfaces.get(type_ref).expect("shelled above");
        let mut methods = Vec::with_capacity(raw_methods.len());
        for rm in raw_methods {
            let mut arguments = Vec::with_capacity(rm.arguments.len());
            for (tref, aname) in &rm.arguments {
                arguments.push((resolve_type(*tref, &enums, &interfaces)?, aname.clone()));
            }
            let return_type = resolve_type(rm.return_type, &enums, &interfaces)?;
            methods.push(Method::new(rm.name.clone(), arguments, return_type)?);
        }
        iface.set_methods(methods);
    }

    let computed_digest = r.digest();
    let mut read_digest = [0u8; 32];
    r.read_exact(&mut read_digest).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            RmcError::ShortRead {
                expected: 32,
                actual: 0,
                offset: r.idx(),
            }
        } else {
            RmcError::Io(e)
        }
    })?;
    if computed_digest != read_digest {
        return Err(RmcError::SchemaMismatch);
    }

    Schema::from_arcs(
        label,
        enums.into_values().collect(),
        Vec::new(),
        interfaces.into_values().collect(),
        bytes_method_ref,
        bytes_object_ref,
    )
    .map(|schema| schema.with_digest(computed_digest))
}

pub async fn schema_from_bytes(bytes: &[u8]) -> Result<Schema> {
    let mut cursor = std::io::Cursor::new(bytes);
    read_schema(&mut cursor).await
}
