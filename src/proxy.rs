//! The proxy factory and the generic `Proxy` type standing in for remote objects.
//!
//! Per the design note in SPEC_FULL.md §9, this crate does not generate a Rust
//! trait per schema interface (that is the out-of-scope code generator's job). A
//! single `Proxy` struct instead carries its bound interface and dispatches by
//! method name at call time.

use std::sync::{Arc, Weak};

use log::debug;

use crate::bridge::Bridge;
use crate::error::{Result, RmcError};
use crate::schema::Interface;
use crate::value::Value;

/// A local stand-in for an object living on the other peer.
///
/// Equal object IDs (for a given bridge) always yield the same `Proxy` instance;
/// the registry is responsible for that caching.
pub struct Proxy {
    interface: Arc<Interface>,
    bridge: Weak<Bridge>,
    object_id: i64,
}

impl Proxy {
    pub(crate) fn new(interface: Arc<Interface>, bridge: Weak<Bridge>, object_id: i64) -> Self {
        Self {
            interface,
            bridge,
            object_id,
        }
    }

    pub fn object_id(&self) -> i64 {
        self.object_id
    }

    pub fn interface(&self) -> &Arc<Interface> {
        &self.interface
    }

    /// Calls `method_name` on the remote object, marshaling `args` through the
    /// owning bridge and suspending until the matching RETURN_FROM_METHOD arrives.
    pub async fn call(&self, method_name: &str, args: Vec<Value>) -> Result<Value> {
        let method = self
            .interface
            .method_named(method_name)
            .cloned()
            .ok_or_else(|| {
                RmcError::MethodNotAvailable {
                    method: method_name.to_string(),
                    resolved_name: method_name.to_string(),
                }
            })?;
        let bridge = self.bridge.upgrade().ok_or(RmcError::TransportClosed)?;
        debug!(
            "proxy for interface {} (object id {}) calling method {}",
            self.interface.name, self.object_id, method_name
        );
        bridge.call_method(&self.interface, &method, self.object_id, args).await
    }
}

/// Creates proxies bound to a given bridge. Held by the [`crate::registry::Registry`]
/// so it can mint a new proxy the first time a remote object ID is seen.
#[derive(Clone)]
pub struct ProxyFactory {
    bridge: Weak<Bridge>,
}

impl ProxyFactory {
    pub(crate) fn new(bridge: Weak<Bridge>) -> Self {
        Self { bridge }
    }

    pub fn create(&self, interface: Arc<Interface>, object_id: i64) -> Proxy {
        Proxy::new(interface, self.bridge.clone(), object_id)
    }
}
