//! A cross-language remote method call runtime.
//!
//! A [`schema::Schema`] declares the interfaces, records and enums two peers agree
//! to speak; [`bridge::Bridge`] owns one connection over any `AsyncRead + AsyncWrite`
//! transport, marshaling [`value::Value`]s across the wire codec in `codec` and
//! dispatching inbound calls to a locally-hosted [`registry::Implementation`].
//!
//! ```ignore
//! let schema = Arc::new(Schema::new("demo", vec![], vec![], vec![main_interface], 4, 4)?);
//! let bridge = Bridge::connect(schema, socket, Role::Client, None, name_converter).await?;
//! let main = bridge.server_proxy().await?;
//! main.call("greet", vec![Value::String("hi".into())]).await?;
//! ```

pub mod bridge;
pub mod codec;
pub mod error;
pub mod naming;
pub mod proxy;
pub mod registry;
pub mod schema;
mod sender;
mod receiver;
pub mod value;

pub use bridge::Bridge;
pub use error::{Result, RmcError};
pub use registry::{Implementation, Role};
pub use schema::{Declared, Enum, Interface, Method, Primitive, Record, Schema, Type};
pub use value::{EnumValue, ObjectHandle, Value};
