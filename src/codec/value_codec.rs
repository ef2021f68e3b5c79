//! Encodes and decodes [`Value`]s against the [`Type`] a method signature says they
//! should have. This is the part of the wire format `original_source` leaves
//! asymmetric — the reader resolves enum values but the writer's dispatch table
//! only ever covered primitives and interfaces — so the encodings below (enum
//! ordinal as `uint32`, array as length-prefixed elements, record fields in
//! declared order with no extra framing, date/time as fixed-width integers) are
//! this crate's own, chosen to round-trip every `Value` variant symmetrically.

use std::future::Future;
use std::pin::Pin;

use chrono::{NaiveDate, NaiveTime, Timelike};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, RmcError};
use crate::registry::SharedRegistry;
use crate::schema::{Declared, Primitive, Type};
use crate::value::{EnumValue, Value};

use super::primitives::{read_signed, write_signed};

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid date")
}

fn mismatch(typ: &Type, value: &Value) -> RmcError {
    RmcError::InvalidSchema(format!("value {value:?} does not match type {typ}"))
}

pub fn write_value<'a, W: AsyncWrite + Unpin + Send>(
    w: &'a mut W,
    registry: &'a SharedRegistry,
    bytes_object_ref: u8,
    typ: &'a Type,
    value: &'a Value,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        match (typ, value) {
            (Type::Primitive(Primitive::Void), Value::Void) => Ok(()),
            (Type::Primitive(Primitive::Boolean), Value::Boolean(v)) => {
                w.write_u8(*v as u8).await?;
                Ok(())
            }
            (Type::Primitive(Primitive::Int8), Value::Int8(v)) => Ok(w.write_i8(*v).await?),
            (Type::Primitive(Primitive::UInt8), Value::UInt8(v)) => Ok(w.write_u8(*v).await?),
            (Type::Primitive(Primitive::Int16), Value::Int16(v)) => Ok(w.write_i16(*v).await?),
            (Type::Primitive(Primitive::UInt16), Value::UInt16(v)) => Ok(w.write_u16(*v).await?),
            (Type::Primitive(Primitive::Int32), Value::Int32(v)) => Ok(w.write_i32(*v).await?),
            (Type::Primitive(Primitive::UInt32), Value::UInt32(v)) => Ok(w.write_u32(*v).await?),
            (Type::Primitive(Primitive::Int64), Value::Int64(v)) => Ok(w.write_i64(*v).await?),
            (Type::Primitive(Primitive::UInt64), Value::UInt64(v)) => Ok(w.write_u64(*v).await?),
            (Type::Primitive(Primitive::Float32), Value::Float32(v)) => Ok(w.write_f32(*v).await?),
            (Type::Primitive(Primitive::Float64), Value::Float64(v)) => Ok(w.write_f64(*v).await?),
            (Type::Primitive(Primitive::String), Value::String(v)) => {
                super::primitives::write_string(w, v).await
            }
            (Type::Primitive(Primitive::Date), Value::Date(v)) => {
                let days = (*v - epoch()).num_days();
                Ok(w.write_i32(days as i32).await?)
            }
            (Type::Primitive(Primitive::Time), Value::Time(v)) => {
                let micros = v.num_seconds_from_midnight() as i64 * 1_000_000
                    + (v.nanosecond() / 1_000) as i64;
                Ok(w.write_i64(micros).await?)
            }
            (Type::Primitive(Primitive::DateTime), Value::DateTime(v)) => {
                Ok(w.write_i64(v.and_utc().timestamp_micros()).await?)
            }
            (Type::Declared(Declared::Enum(e)), Value::Enum(ev)) => {
                if ev.type_name != e.name {
                    return Err(mismatch(typ, value));
                }
                Ok(w.write_u32(ev.ordinal).await?)
            }
            (Type::Declared(Declared::Interface(_)), Value::Object(handle)) => {
                let id = registry.lock().await.id_of(handle.as_ref())?;
                write_signed(w, bytes_object_ref, id).await
            }
            (Type::Declared(Declared::Record(rec)), Value::Record(fields)) => {
                for (field_type, field_name) in &rec.fields {
                    let field_value = fields.get(field_name).ok_or_else(|| {
                        RmcError::InvalidSchema(format!(
                            "record \"{}\" is missing field \"{field_name}\"",
                            rec.name
                        ))
                    })?;
                    write_value(w, registry, bytes_object_ref, field_type, field_value).await?;
                }
                Ok(())
            }
            (Type::Array(elem_type), Value::Array(items)) => {
                w.write_u32(items.len() as u32).await?;
                for item in items {
                    write_value(w, registry, bytes_object_ref, elem_type, item).await?;
                }
                Ok(())
            }
            _ => Err(mismatch(typ, value)),
        }
    })
}

pub fn read_value<'a, R: AsyncRead + Unpin + Send>(
    r: &'a mut R,
    registry: &'a SharedRegistry,
    bytes_object_ref: u8,
    typ: &'a Type,
) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>> {
    Box::pin(async move {
        Ok(match typ {
            Type::Primitive(Primitive::Void) => Value::Void,
            Type::Primitive(Primitive::Boolean) => Value::Boolean(r.read_u8().await? != 0),
            Type::Primitive(Primitive::Int8) => Value::Int8(r.read_i8().await?),
            Type::Primitive(Primitive::UInt8) => Value::UInt8(r.read_u8().await?),
            Type::Primitive(Primitive::Int16) => Value::Int16(r.read_i16().await?),
            Type::Primitive(Primitive::UInt16) => Value::UInt16(r.read_u16().await?),
            Type::Primitive(Primitive::Int32) => Value::Int32(r.read_i32().await?),
            Type::Primitive(Primitive::UInt32) => Value::UInt32(r.read_u32().await?),
            Type::Primitive(Primitive::Int64) => Value::Int64(r.read_i64().await?),
            Type::Primitive(Primitive::UInt64) => Value::UInt64(r.read_u64().await?),
            Type::Primitive(Primitive::Float32) => Value::Float32(r.read_f32().await?),
            Type::Primitive(Primitive::Float64) => Value::Float64(r.read_f64().await?),
            Type::Primitive(Primitive::String) => Value::String(super::primitives::read_string(r).await?),
            Type::Primitive(Primitive::Date) => {
                let days = r.read_i32().await?;
                Value::Date(epoch() + chrono::Duration::days(days as i64))
            }
            Type::Primitive(Primitive::Time) => {
                let micros = r.read_i64().await?;
                Value::Time(
                    NaiveTime::from_num_seconds_from_midnight_opt(
                        (micros / 1_000_000) as u32,
                        ((micros % 1_000_000) * 1_000) as u32,
                    )
                    .ok_or_else(|| RmcError::InvalidSchema(format!("invalid time value {micros}")))?,
                )
            }
            Type::Primitive(Primitive::DateTime) => {
                let micros = r.read_i64().await?;
                Value::DateTime(
                    chrono::DateTime::from_timestamp_micros(micros)
                        .ok_or_else(|| RmcError::InvalidSchema(format!("invalid datetime value {micros}")))?
                        .naive_utc(),
                )
            }
            Type::Declared(Declared::Enum(e)) => {
                let ordinal = r.read_u32().await?;
                if ordinal as usize >= e.values.len() {
                    return Err(RmcError::InvalidSchema(format!(
                        "ordinal {ordinal} out of range for enum \"{}\"",
                        e.name
                    )));
                }
                Value::Enum(EnumValue {
                    type_name: e.name.clone(),
                    ordinal,
                })
            }
            Type::Declared(Declared::Interface(_)) => {
                let id = read_signed(r, bytes_object_ref).await?;
                let handle = registry.lock().await.resolve_id(id, typ)?;
                Value::Object(handle)
            }
            Type::Declared(Declared::Record(rec)) => {
                let mut fields = std::collections::BTreeMap::new();
                for (field_type, field_name) in &rec.fields {
                    let value = read_value(r, registry, bytes_object_ref, field_type).await?;
                    fields.insert(field_name.clone(), value);
                }
                Value::Record(fields)
            }
            Type::Array(elem_type) => {
                let len = r.read_u32().await?;
                let mut items = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    items.push(read_value(r, registry, bytes_object_ref, elem_type).await?);
                }
                Value::Array(items)
            }
        })
    })
}
