//! The binary wire codec: schema framing (`reader`/`writer`) and the primitive
//! building blocks (`primitives`, `hashing`) shared with the post-handshake value
//! codec in `sender`/`receiver`.

pub mod constants;
mod hashing;
pub mod primitives;
mod reader;
pub mod value_codec;
mod writer;

pub use hashing::{HashingReader, HashingWriter};
pub use reader::{read_schema, schema_from_bytes};
pub use writer::{schema_to_bytes, write_schema};
