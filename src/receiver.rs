//! Receive loop: the bridge's read half. One task, spawned by [`crate::bridge::Bridge::connect`],
//! owns the transport's read side for the bridge's whole lifetime. Grounded on
//! `communication/receive.py`'s `Receiver.mainloop`/`process_next`.
//!
//! Each CALL_METHOD is handed to its own spawned task so a re-entrant call — the
//! callee calling back into the caller before returning — doesn't deadlock this
//! loop waiting on itself.

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::bridge::Bridge;
use crate::codec::constants::{
    ACKNOWLEDGE_DISCONNECT, CALL_METHOD, DISCONNECT, NOOP, RETURN_ERROR_FROM_METHOD,
    RETURN_FROM_METHOD, SEND_SCHEMA,
};
use crate::codec::primitives::{read_signed, read_string, read_unsigned};
use crate::codec::value_codec::read_value;
use crate::error::{Result, RmcError};
use crate::schema::{Declared, Type};
use std::sync::Arc;

/// Runs until the peer disconnects or the stream errs. Returning `Ok(())` means a
/// clean DISCONNECT/ACKNOWLEDGE_DISCONNECT exchange; the bridge is unusable either
/// way once this returns.
pub(crate) async fn run<R>(bridge: Arc<Bridge>, mut stream: R) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    loop {
        let cmd = match stream.read_u8().await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                info!("transport closed without a DISCONNECT handshake");
                bridge.on_receive_loop_exit();
                return Ok(());
            }
            Err(e) => {
                bridge.on_receive_loop_exit();
                return Err(e.into());
            }
        };

        match cmd {
            NOOP => debug!("received NOOP"),
            DISCONNECT => {
                debug!("received DISCONNECT, acknowledging and exiting");
                bridge.acknowledge_disconnect().await?;
                bridge.on_receive_loop_exit();
                return Ok(());
            }
            ACKNOWLEDGE_DISCONNECT => {
                debug!("received ACKNOWLEDGE_DISCONNECT, exiting");
                bridge.on_receive_loop_exit();
                return Ok(());
            }
            crate::codec::constants::REQUEST_SCHEMA => {
                bridge.send_schema().await?;
            }
            SEND_SCHEMA => {
                receive_and_check_schema(&bridge, &mut stream).await?;
            }
            CALL_METHOD => {
                process_method_call(&bridge, &mut stream).await?;
            }
            RETURN_FROM_METHOD => {
                process_method_return(&bridge, &mut stream).await?;
            }
            RETURN_ERROR_FROM_METHOD => {
                process_method_error(&bridge, &mut stream).await?;
            }
            other => {
                bridge.on_receive_loop_exit();
                return Err(RmcError::UnknownCommand(other));
            }
        }
    }
}

async fn receive_and_check_schema<R: AsyncRead + Unpin>(bridge: &Arc<Bridge>, stream: &mut R) -> Result<()> {
    let peer_schema = crate::codec::read_schema(stream).await?;
    let theirs = crate::codec::schema_to_bytes(&peer_schema).await?;
    let ours = crate::codec::schema_to_bytes(bridge.schema()).await?;
    if ours != theirs {
        warn!("peer schema does not match ours");
        return Err(RmcError::SchemaMismatch);
    }
    Ok(())
}

async fn process_method_call<R: AsyncRead + Unpin + Send + 'static>(
    bridge: &Arc<Bridge>,
    stream: &mut R,
) -> Result<()> {
    let request_id = stream.read_u32().await?;
    let method_ordinal = read_unsigned(stream, bridge.schema().bytes_method_ref).await? as u32;
    let method = bridge
        .method_lookup(method_ordinal)
        .ok_or(RmcError::UnknownCommand(0))?;
    let interface = bridge
        .method_interface(method_ordinal)
        .ok_or(RmcError::UnknownCommand(0))?;

    let this_type = Type::Declared(Declared::Interface(interface.clone()));
    let this_id = read_signed(stream, bridge.schema().bytes_object_ref).await?;
    let this_handle = bridge.registry_resolve(this_id, &this_type).await?;

    let mut args = Vec::with_capacity(method.arguments.len());
    for (arg_type, _name) in &method.arguments {
        args.push(read_value(stream, bridge.registry(), bridge.schema().bytes_object_ref, arg_type).await?);
    }

    let bridge = bridge.clone();
    let impl_method_name = bridge.name_converter().method_name(&method.name);
    tokio::spawn(async move {
        let outcome = match this_handle.and_then(|h| h.as_local_implementation()) {
            Some(implementation) => implementation.call_method(&impl_method_name, args).await,
            None => Err(RmcError::MethodNotAvailable {
                method: method.name.clone(),
                resolved_name: impl_method_name.clone(),
            }),
        };
        let result = match outcome {
            Ok(value) => bridge.send_return(request_id, &method.return_type, &value).await,
            Err(e) => bridge.send_return_error(request_id, &e.to_string()).await,
        };
        if let Err(e) = result {
            error!("failed to deliver result for request {request_id}: {e}");
        }
    });
    Ok(())
}

async fn process_method_return<R: AsyncRead + Unpin + Send>(bridge: &Arc<Bridge>, stream: &mut R) -> Result<()> {
    let request_id = stream.read_u32().await?;
    let return_type = bridge.pending_return_type(request_id).await?;
    let value = read_value(stream, bridge.registry(), bridge.schema().bytes_object_ref, &return_type).await?;
    bridge.deliver_return(request_id, Ok(value)).await;
    Ok(())
}

async fn process_method_error<R: AsyncRead + Unpin>(bridge: &Arc<Bridge>, stream: &mut R) -> Result<()> {
    let request_id = stream.read_u32().await?;
    let message = read_string(stream).await?;
    bridge.ensure_pending(request_id).await?;
    bridge.deliver_return(request_id, Err(RmcError::RemoteMethodError(message))).await;
    Ok(())
}
