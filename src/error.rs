//! Error taxonomy for the schema codec and the bridge runtime.
//!
//! Every reported failure kind from the protocol design funnels into a single
//! [`RmcError`] enum, following the same `thiserror`-derived, one-variant-per-failure-kind
//! shape used for client errors elsewhere in this corpus.

use thiserror::Error;

/// Any error the schema codec or the bridge runtime can report.
#[derive(Debug, Error)]
pub enum RmcError {
    /// Fewer bytes than requested were available on the stream.
    #[error("short read: expected {expected} bytes, got {actual} at offset {offset}")]
    ShortRead {
        expected: usize,
        actual: usize,
        offset: u64,
    },

    /// An unrecognized 1-byte command tag was read from the stream.
    #[error("unknown command tag 0x{0:02x}")]
    UnknownCommand(u8),

    /// A type index did not resolve against the schema's type table.
    #[error("unknown type index {0}")]
    UnknownType(i32),

    /// An outbound reference pointed at a proxy the registry has never seen.
    #[error("unknown proxy object")]
    UnknownProxyObject,

    /// An inbound object ID of the expected sign has no local implementation registered.
    #[error("unknown implementation object reference {0}")]
    UnknownImplementationObjectReference(i64),

    /// The receiving peer has no implementation of the requested method.
    #[error("method \"{method}\" (looked up as \"{resolved_name}\") is not available on the target object")]
    MethodNotAvailable {
        method: String,
        resolved_name: String,
    },

    /// Two callers registered a waiter for the same request ID.
    #[error("duplicate registration for method return, request id {0}")]
    DuplicateRegistrationForMethodReturn(u32),

    /// A second RETURN_FROM_METHOD arrived for a request ID already delivered.
    #[error("duplicate method return value for request id {0}")]
    DuplicateMethodReturnValue(u32),

    /// A RETURN_FROM_METHOD arrived with no registered waiter.
    #[error("no waiter registered for request id {0}")]
    MissingMethodReturnValueEvent(u32),

    /// The peer's schema bytes did not match the expected canonical serialization.
    #[error("schema mismatch with peer")]
    SchemaMismatch,

    /// A declared or wire-read name failed the name grammar.
    #[error("invalid name \"{0}\": names must be non-empty, alphanumeric, and start with a letter")]
    InvalidName(String),

    /// A schema failed a structural invariant (missing Main, empty interface, etc).
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// The bridge has been disconnected and can no longer be used.
    #[error("transport closed")]
    TransportClosed,

    /// The peer reported that a method call failed on its side (including the
    /// method not existing on the target object); carries its error message.
    #[error("remote method error: {0}")]
    RemoteMethodError(String),

    /// Malformed UTF-8 in a wire string.
    #[error("invalid utf-8 in wire string: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Underlying I/O failure on the byte stream.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RmcError>;
