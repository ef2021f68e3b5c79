//! The identifier registry: bidirectional ID ↔ object maps, partitioned by sign
//! between locally-hosted implementation objects and proxies for remote ones.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio::sync::Mutex;

use crate::error::{Result, RmcError};
use crate::proxy::{Proxy, ProxyFactory};
use crate::schema::Type;
use crate::value::{ObjectHandle, Value};

/// A host-language object that implements one of the schema's interfaces.
///
/// This is the one piece of the runtime that is explicitly user code: the core
/// never knows the concrete Rust type behind an `Implementation`, only that it can
/// be asked to run a named method with a list of [`Value`] arguments.
#[async_trait]
pub trait Implementation: Send + Sync {
    async fn call_method(&self, method_name: &str, args: Vec<Value>) -> Result<Value>;
}

/// Which role a bridge plays in a connection. The sign used for locally minted
/// object IDs (and, symmetrically, the sign that identifies a remote ID) follows
/// directly from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initiated the connection; `main` is null; mints non-positive IDs.
    Client,
    /// Accepted the connection; hosts `main` at ID 1; mints positive IDs.
    Server,
}

impl Role {
    fn local_sign(self) -> i64 {
        match self {
            Role::Client => -1,
            Role::Server => 1,
        }
    }

    /// True if an ID of this sign (0 excluded) was minted by the *other* peer, i.e.
    /// should resolve to a proxy rather than a local implementation.
    fn is_remote_sign(self, id: i64) -> bool {
        match self {
            Role::Client => id > 0,
            Role::Server => id < 0,
        }
    }
}

struct BiMap<T> {
    by_id: HashMap<i64, T>,
    id_by_identity: HashMap<usize, i64>,
}

impl<T> BiMap<T> {
    fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            id_by_identity: HashMap::new(),
        }
    }
}

/// Tracks locally-hosted implementation objects and remote-object proxies for one
/// bridge, keeping their IDs partitioned by which peer minted them.
pub struct Registry {
    role: Role,
    next_local_id: i64,
    implementations: BiMap<Arc<dyn Implementation>>,
    proxies: BiMap<Arc<Proxy>>,
    proxy_factory: ProxyFactory,
}

/// A [`Registry`] guarded for concurrent access from the receive loop, worker
/// tasks dispatching inbound calls, and user code issuing outbound calls.
pub type SharedRegistry = Mutex<Registry>;

impl Registry {
    pub fn new(role: Role, proxy_factory: ProxyFactory) -> Self {
        Self {
            role,
            next_local_id: 0,
            implementations: BiMap::new(),
            proxies: BiMap::new(),
            proxy_factory,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    fn next_object_id(&mut self) -> i64 {
        self.next_local_id += self.role.local_sign();
        self.next_local_id
    }

    /// Registers `obj` as a locally-hosted implementation, returning its ID. If the
    /// object (by pointer identity) is already registered, returns the existing ID.
    pub fn register_local(&mut self, obj: Arc<dyn Implementation>) -> i64 {
        let identity = Arc::as_ptr(&obj) as *const () as usize;
        if let Some(&id) = self.implementations.id_by_identity.get(&identity) {
            return id;
        }
        let id = self.next_object_id();
        debug!("registering local implementation object at id {id}");
        self.implementations.by_id.insert(id, obj);
        self.implementations.id_by_identity.insert(identity, id);
        id
    }

    /// Registers `main` at a fixed ID: 1 for the server, 0 (i.e. null, nothing to
    /// register) for the client. Returns an error if the requested ID is already
    /// taken by another object, which would indicate a bridge constructed twice
    /// against the same registry.
    pub fn register_main(&mut self, main: Option<Arc<dyn Implementation>>) -> Result<i64> {
        match (self.role, main) {
            (Role::Client, None) => Ok(0),
            (Role::Client, Some(_)) => Err(RmcError::InvalidSchema(
                "client peers must have a null main object".to_string(),
            )),
            (Role::Server, None) => Err(RmcError::InvalidSchema(
                "server peers must have a non-null main object".to_string(),
            )),
            (Role::Server, Some(main)) => {
                self.next_local_id = 0;
                let id = self.register_local(main);
                if id != 1 {
                    return Err(RmcError::InvalidSchema(format!(
                        "server main object must be allocated id 1, got {id}"
                    )));
                }
                Ok(id)
            }
        }
    }

    /// Resolves an object ID read off the wire into an object handle, creating a
    /// proxy on first sight of a remote ID. ID 0 is null.
    pub fn resolve_id(&mut self, id: i64, typ: &Type) -> Result<Option<ObjectHandle>> {
        if id == 0 {
            return Ok(None);
        }
        if self.role.is_remote_sign(id) {
            if let Some(existing) = self.proxies.by_id.get(&id) {
                return Ok(Some(ObjectHandle::Remote(existing.clone())));
            }
            let interface = typ
                .as_interface()
                .ok_or_else(|| RmcError::InvalidSchema(format!("type {typ} is not an interface")))?;
            let proxy = Arc::new(self.proxy_factory.create(interface.clone(), id));
            let identity = Arc::as_ptr(&proxy) as *const () as usize;
            self.proxies.by_id.insert(id, proxy.clone());
            self.proxies.id_by_identity.insert(identity, id);
            Ok(Some(ObjectHandle::Remote(proxy)))
        } else {
            self.implementations
                .by_id
                .get(&id)
                .cloned()
                .map(ObjectHandle::Local)
                .map(Some)
                .ok_or(RmcError::UnknownImplementationObjectReference(id))
        }
    }

    /// Resolves an object handle to its wire ID, registering a never-before-seen
    /// local implementation on the fly. `None` is ID 0.
    pub fn id_of(&mut self, obj: Option<&ObjectHandle>) -> Result<i64> {
        match obj {
            None => Ok(0),
            Some(ObjectHandle::Remote(proxy)) => {
                let identity = Arc::as_ptr(proxy) as *const () as usize;
                self.proxies
                    .id_by_identity
                    .get(&identity)
                    .copied()
                    .ok_or(RmcError::UnknownProxyObject)
            }
            Some(ObjectHandle::Local(obj)) => Ok(self.register_local(obj.clone())),
        }
    }
}
