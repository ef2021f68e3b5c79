//! The bridge: owns one connection's schema, registry, sender and receive loop,
//! and is the rendezvous point request/response correlation happens through.
//! Grounded on `communication/bridge.py`'s `Bridge`, restructured around a spawned
//! receive-loop task (`receiver::run`) instead of a dedicated OS thread, and an
//! `Arc::new_cyclic` construction so the registry's [`ProxyFactory`] can hold a
//! [`Weak`] reference to the bridge before it fully exists.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};

use log::warn;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{oneshot, Mutex};

use crate::error::{Result, RmcError};
use crate::naming::NameConverter;
use crate::proxy::{Proxy, ProxyFactory};
use crate::registry::{Implementation, Registry, Role, SharedRegistry};
use crate::schema::{Declared, Interface, Method, Schema, Type};
use crate::sender::Sender;
use crate::value::{ObjectHandle, Value};

struct PendingCall {
    return_type: Type,
    tx: oneshot::Sender<Result<Value>>,
}

pub struct Bridge {
    schema: Arc<Schema>,
    registry: SharedRegistry,
    sender: Mutex<Sender<Box<dyn AsyncWrite + Unpin + Send>>>,
    pending: Mutex<HashMap<u32, PendingCall>>,
    /// Request IDs whose `RETURN_FROM_METHOD`/`RETURN_ERROR_FROM_METHOD` has already
    /// been delivered, so a second one for the same ID can be reported as
    /// [`RmcError::DuplicateMethodReturnValue`] instead of the misleading
    /// "no waiter registered" that an absent `pending` entry alone would suggest.
    delivered: Mutex<HashSet<u32>>,
    next_request_id: AtomicU32,
    method_lookup: HashMap<u32, Method>,
    method_to_interface: HashMap<u32, Arc<Interface>>,
    name_converter: Arc<dyn NameConverter>,
    role: Role,
    closed: AtomicBool,
    done_tx: StdMutex<Option<oneshot::Sender<()>>>,
    done_rx: Mutex<Option<oneshot::Receiver<()>>>,
}

impl Bridge {
    /// Splits `transport`, spins up the receive loop, registers `main` at the
    /// role-appropriate fixed ID, and sends our schema to the peer. Does not wait
    /// for the peer's schema in return; call [`Bridge::server_proxy`] once it's
    /// needed and the peer is expected to have sent theirs by then.
    pub async fn connect<T>(
        schema: Arc<Schema>,
        transport: T,
        role: Role,
        main: Option<Arc<dyn Implementation>>,
        name_converter: Arc<dyn NameConverter>,
    ) -> Result<Arc<Bridge>>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let serialized_schema = crate::codec::schema_to_bytes(&schema).await?;
        let method_lookup = schema.method_lookup();
        let method_to_interface = schema.method_to_interface();

        let (read_half, write_half) = tokio::io::split(transport);
        let sender = Sender::new(
            schema.clone(),
            Box::new(write_half) as Box<dyn AsyncWrite + Unpin + Send>,
            serialized_schema,
        );
        let (done_tx, done_rx) = oneshot::channel();

        let bridge = Arc::new_cyclic(|weak: &Weak<Bridge>| {
            let proxy_factory = ProxyFactory::new(weak.clone());
            Bridge {
                schema: schema.clone(),
                registry: Mutex::new(Registry::new(role, proxy_factory)),
                sender: Mutex::new(sender),
                pending: Mutex::new(HashMap::new()),
                delivered: Mutex::new(HashSet::new()),
                next_request_id: AtomicU32::new(0),
                method_lookup,
                method_to_interface,
                name_converter,
                role,
                closed: AtomicBool::new(false),
                done_tx: StdMutex::new(Some(done_tx)),
                done_rx: Mutex::new(Some(done_rx)),
            }
        });

        bridge.registry.lock().await.register_main(main)?;

        let loop_bridge = bridge.clone();
        tokio::spawn(async move {
            if let Err(e) = crate::receiver::run(loop_bridge.clone(), read_half).await {
                log::error!("receive loop ended with an error: {e}");
                loop_bridge.on_receive_loop_exit();
            }
        });

        bridge.send_schema().await?;
        Ok(bridge)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub(crate) fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub(crate) fn name_converter(&self) -> &Arc<dyn NameConverter> {
        &self.name_converter
    }

    pub(crate) fn method_lookup(&self, ordinal: u32) -> Option<Method> {
        self.method_lookup.get(&ordinal).cloned()
    }

    pub(crate) fn method_interface(&self, ordinal: u32) -> Option<Arc<Interface>> {
        self.method_to_interface.get(&ordinal).cloned()
    }

    pub(crate) async fn registry_resolve(&self, id: i64, typ: &Type) -> Result<Option<ObjectHandle>> {
        self.registry.lock().await.resolve_id(id, typ)
    }

    pub(crate) async fn send_schema(&self) -> Result<()> {
        self.sender.lock().await.send_schema().await
    }

    pub(crate) async fn acknowledge_disconnect(&self) -> Result<()> {
        self.sender.lock().await.acknowledge_disconnect().await
    }

    pub(crate) async fn send_return(&self, request_id: u32, return_type: &Type, value: &Value) -> Result<()> {
        self.sender
            .lock()
            .await
            .return_method(&self.registry, request_id, return_type, value)
            .await
    }

    pub(crate) async fn send_return_error(&self, request_id: u32, message: &str) -> Result<()> {
        self.sender.lock().await.return_error(request_id, message).await
    }

    /// Returns the expected return type for an outstanding call, distinguishing a
    /// request ID that never had a waiter from one whose reply already arrived.
    pub(crate) async fn pending_return_type(&self, request_id: u32) -> Result<Type> {
        if let Some(p) = self.pending.lock().await.get(&request_id) {
            return Ok(p.return_type.clone());
        }
        self.fail_as_missing_or_duplicate(request_id).await
    }

    /// Like [`Bridge::pending_return_type`], but for callers (RETURN_ERROR_FROM_METHOD)
    /// that don't need the return type, only that a waiter is actually there.
    pub(crate) async fn ensure_pending(&self, request_id: u32) -> Result<()> {
        if self.pending.lock().await.contains_key(&request_id) {
            return Ok(());
        }
        self.fail_as_missing_or_duplicate::<()>(request_id).await.map(|_| ())
    }

    async fn fail_as_missing_or_duplicate<T>(&self, request_id: u32) -> Result<T> {
        if self.delivered.lock().await.contains(&request_id) {
            Err(RmcError::DuplicateMethodReturnValue(request_id))
        } else {
            Err(RmcError::MissingMethodReturnValueEvent(request_id))
        }
    }

    pub(crate) async fn deliver_return(&self, request_id: u32, result: Result<Value>) {
        match self.pending.lock().await.remove(&request_id) {
            Some(pending) => {
                self.delivered.lock().await.insert(request_id);
                let _ = pending.tx.send(result);
            }
            None => warn!("no waiter registered for request id {request_id}"),
        }
    }

    /// Marks the bridge closed, wakes every outstanding call waiter with
    /// [`RmcError::TransportClosed`], and signals anyone blocked in [`Bridge::disconnect`].
    /// Called once by the receive loop on any exit path — clean or errored.
    pub(crate) fn on_receive_loop_exit(self: &Arc<Self>) {
        self.closed.store(true, Ordering::SeqCst);
        let bridge = self.clone();
        tokio::spawn(async move {
            let mut pending = bridge.pending.lock().await;
            for (_, call) in pending.drain() {
                let _ = call.tx.send(Err(RmcError::TransportClosed));
            }
        });
        if let Some(tx) = self.done_tx.lock().expect("not poisoned").take() {
            let _ = tx.send(());
        }
    }

    /// Calls `method` on the object `this_id` identifies, on the other side of the
    /// bridge, and waits for its result. Invoked by [`Proxy::call`]; never call
    /// this directly unless you're implementing an alternate proxy mechanism.
    pub(crate) async fn call_method(
        &self,
        interface: &Arc<Interface>,
        method: &Method,
        this_id: i64,
        args: Vec<Value>,
    ) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RmcError::TransportClosed);
        }
        if args.len() != method.arguments.len() {
            return Err(RmcError::InvalidSchema(format!(
                "method \"{}\" expects {} arguments, got {}",
                method.name,
                method.arguments.len(),
                args.len()
            )));
        }
        let ordinal = self
            .schema
            .method_ordinal(&interface.name, &method.name)
            .ok_or_else(|| RmcError::MethodNotAvailable {
                method: method.name.clone(),
                resolved_name: method.name.clone(),
            })?;
        let typed_args: Vec<(Type, Value)> = method
            .arguments
            .iter()
            .map(|(t, _)| t.clone())
            .zip(args)
            .collect();

        let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if pending.contains_key(&request_id) {
                return Err(RmcError::DuplicateRegistrationForMethodReturn(request_id));
            }
            pending.insert(
                request_id,
                PendingCall {
                    return_type: method.return_type.clone(),
                    tx,
                },
            );
        }

        let write_result = self
            .sender
            .lock()
            .await
            .call_method(&self.registry, request_id, ordinal, method, this_id, &typed_args)
            .await;
        if let Err(e) = write_result {
            self.pending.lock().await.remove(&request_id);
            return Err(e);
        }

        rx.await.map_err(|_| RmcError::TransportClosed)?
    }

    /// A client-role bridge's handle to the server's `main` object, ID 1.
    pub async fn server_proxy(&self) -> Result<Arc<Proxy>> {
        if self.role != Role::Client {
            return Err(RmcError::InvalidSchema(
                "server_proxy is only meaningful on a client-role bridge".to_string(),
            ));
        }
        let main_type = Type::Declared(Declared::Interface(self.schema.main_interface().clone()));
        match self.registry.lock().await.resolve_id(1, &main_type)? {
            Some(ObjectHandle::Remote(proxy)) => Ok(proxy),
            _ => Err(RmcError::InvalidSchema(
                "could not resolve the server's main object".to_string(),
            )),
        }
    }

    /// Sends DISCONNECT and waits for the receive loop to exit, whether that's
    /// because the peer acknowledged it or the transport closed underneath it.
    pub async fn disconnect(&self) -> Result<()> {
        self.sender.lock().await.disconnect().await?;
        let rx = self.done_rx.lock().await.take();
        if let Some(rx) = rx {
            let _ = rx.await;
        }
        Ok(())
    }
}
