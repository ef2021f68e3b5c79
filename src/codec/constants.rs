//! Wire constants: magic bytes, schema-block tags, and communication command tags.

pub const MAGIC: &[u8] = b"REMCALL";
pub const SCHEMA: &[u8] = b"SCHEMA";

pub const DECLARE_ENUM: u8 = 0x02;
pub const DECLARE_RECORD: u8 = 0x03;
pub const DECLARE_INTERFACE: u8 = 0x04;

/// Communication command tags, sent as the first byte of every frame on an
/// established bridge. Assigned by this crate: sequential from zero, `NOOP` first
/// to double as a keepalive probe that is cheap to recognize.
pub const NOOP: u8 = 0x00;
pub const REQUEST_SCHEMA: u8 = 0x01;
pub const SEND_SCHEMA: u8 = 0x02;
pub const CALL_METHOD: u8 = 0x03;
pub const RETURN_FROM_METHOD: u8 = 0x04;
pub const DISCONNECT: u8 = 0x05;
pub const ACKNOWLEDGE_DISCONNECT: u8 = 0x06;

/// Sent instead of `RETURN_FROM_METHOD` when the callee's method implementation
/// raised an error or the requested method doesn't exist on the target object.
/// Not present in `original_source`, where a missing method crashes the receive
/// loop outright; this crate reports it to the caller instead (see DESIGN.md).
pub const RETURN_ERROR_FROM_METHOD: u8 = 0x07;
