//! Frame-writing half of a bridge: every outbound command is serialized through
//! here, behind the single `tokio::sync::Mutex` the [`crate::bridge::Bridge`] holds
//! so concurrent callers can't interleave their bytes. Grounded on
//! `communication/send.py`'s `Sender`.

use std::sync::Arc;

use log::debug;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::codec::constants::{
    ACKNOWLEDGE_DISCONNECT, CALL_METHOD, DISCONNECT, NOOP, REQUEST_SCHEMA, RETURN_ERROR_FROM_METHOD,
    RETURN_FROM_METHOD, SEND_SCHEMA,
};
use crate::codec::primitives::write_unsigned;
use crate::codec::value_codec::write_value;
use crate::error::Result;
use crate::registry::SharedRegistry;
use crate::schema::{Method, Schema, Type};
use crate::value::Value;

pub struct Sender<W> {
    schema: Arc<Schema>,
    stream: W,
    serialized_schema: Vec<u8>,
}

impl<W: AsyncWrite + Unpin + Send> Sender<W> {
    pub fn new(schema: Arc<Schema>, stream: W, serialized_schema: Vec<u8>) -> Self {
        Self {
            schema,
            stream,
            serialized_schema,
        }
    }

    pub async fn noop(&mut self) -> Result<()> {
        self.stream.write_u8(NOOP).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub async fn request_schema(&mut self) -> Result<()> {
        self.stream.write_u8(REQUEST_SCHEMA).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub async fn send_schema(&mut self) -> Result<()> {
        self.stream.write_u8(SEND_SCHEMA).await?;
        self.stream.write_all(&self.serialized_schema).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        debug!("sending DISCONNECT");
        self.stream.write_u8(DISCONNECT).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub async fn acknowledge_disconnect(&mut self) -> Result<()> {
        debug!("sending ACKNOWLEDGE_DISCONNECT");
        self.stream.write_u8(ACKNOWLEDGE_DISCONNECT).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Writes a CALL_METHOD frame under the caller-assigned `request_id`. The
    /// caller (the bridge) assigns the ID and registers a waiter for it before
    /// calling this, so that id is never observable on the wire before something
    /// is listening for its matching RETURN_FROM_METHOD.
    pub async fn call_method(
        &mut self,
        registry: &SharedRegistry,
        request_id: u32,
        method_ordinal: u32,
        method: &Method,
        this_id: i64,
        args: &[(Type, Value)],
    ) -> Result<()> {
        debug!(
            "requesting call to method {} (ordinal {method_ordinal}) on object {this_id}, request id {request_id}",
            method.name
        );
        self.stream.write_u8(CALL_METHOD).await?;
        self.stream.write_u32(request_id).await?;
        write_unsigned(&mut self.stream, self.schema.bytes_method_ref, method_ordinal as u64).await?;
        crate::codec::primitives::write_signed(&mut self.stream, self.schema.bytes_object_ref, this_id)
            .await?;
        for (typ, value) in args {
            write_value(&mut self.stream, registry, self.schema.bytes_object_ref, typ, value).await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    pub async fn return_method(
        &mut self,
        registry: &SharedRegistry,
        request_id: u32,
        return_type: &Type,
        return_value: &Value,
    ) -> Result<()> {
        debug!("returning result for request id {request_id}");
        self.stream.write_u8(RETURN_FROM_METHOD).await?;
        self.stream.write_u32(request_id).await?;
        write_value(
            &mut self.stream,
            registry,
            self.schema.bytes_object_ref,
            return_type,
            return_value,
        )
        .await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reports that a call failed on this peer's side, in place of a normal
    /// RETURN_FROM_METHOD. See [`crate::codec::constants::RETURN_ERROR_FROM_METHOD`].
    pub async fn return_error(&mut self, request_id: u32, message: &str) -> Result<()> {
        debug!("returning error for request id {request_id}: {message}");
        self.stream.write_u8(RETURN_ERROR_FROM_METHOD).await?;
        self.stream.write_u32(request_id).await?;
        crate::codec::primitives::write_string(&mut self.stream, message).await?;
        self.stream.flush().await?;
        Ok(())
    }
}
