use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use evlog_protocol::{
    error_names, InterfaceMap, MethodCall, MethodError, Signal, Value,
};
use evlog_types::names::{method, OBJECT_MANAGER_INTERFACE, PROPERTIES_INTERFACE};
use evlog_types::ObjectPath;

use crate::client::BusClient;
use crate::dispatch::{CallResult, Dispatch, IncomingCall, ManagedObject, Request, Responder};
use crate::error::{BusError, BusResult};
use crate::table::{ObjectTable, Slot};

/// Configuration for a [`Bus`] endpoint.
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Maximum number of calls queued for the owner.
    pub queue_capacity: usize,
    /// Capacity of the signal broadcast channel.
    pub signal_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            signal_capacity: 1024,
        }
    }
}

/// The owner side of the message bus.
///
/// A `Bus` holds the registered objects, the queue of inbound calls, and the
/// signal broadcaster. It is driven by a single owner, which alternates
/// between [`process`](Self::process) (take one queued call) and
/// [`wait`](Self::wait) (block until a call arrives). Clients reach the bus
/// through [`BusConnector`] handles; once every connector is gone the bus
/// reports [`BusError::Disconnected`].
///
/// `B` is the binding type: the tag registered with each interface and
/// returned to the owner with every request addressed to it.
pub struct Bus<B> {
    table: Arc<RwLock<ObjectTable<B>>>,
    managers: BTreeSet<ObjectPath>,
    names: Arc<RwLock<BTreeSet<String>>>,
    inbound: mpsc::Receiver<IncomingCall>,
    pending: Option<IncomingCall>,
    signals: broadcast::Sender<Signal>,
}

impl<B: Clone> Bus<B> {
    /// Create a bus endpoint and the first connector to it.
    pub fn new(config: BusConfig) -> (Self, BusConnector) {
        let (calls, inbound) = mpsc::channel(config.queue_capacity);
        let (signals, _) = broadcast::channel(config.signal_capacity);
        let names = Arc::new(RwLock::new(BTreeSet::new()));

        let bus = Self {
            table: Arc::new(RwLock::new(ObjectTable::new())),
            managers: BTreeSet::new(),
            names: names.clone(),
            inbound,
            pending: None,
            signals: signals.clone(),
        };
        let connector = BusConnector {
            calls,
            signals,
            names,
        };
        (bus, connector)
    }

    /// Claim a well-known name. Calls addressed to a name the bus does not
    /// own are rejected.
    pub fn request_name(&mut self, name: &str) -> BusResult<()> {
        let mut names = self.names.write().expect("name lock poisoned");
        names.insert(name.to_string());
        info!(name, "acquired bus name");
        Ok(())
    }

    /// Register `interface` at `path`, answering requests for it with
    /// `binding`.
    ///
    /// Fails with [`BusError::ObjectExists`] if the interface is already
    /// registered there. The registration lasts as long as the returned
    /// [`Slot`].
    pub fn add_object(&mut self, path: &ObjectPath, interface: &str, binding: B) -> BusResult<Slot<B>> {
        self.table
            .write()
            .expect("object table lock poisoned")
            .insert(path, interface, binding)?;
        debug!(path = %path, interface, "interface registered");
        Ok(Slot::new(&self.table, path.clone(), interface.to_string()))
    }

    /// Serve `org.freedesktop.DBus.ObjectManager` at `path`.
    pub fn add_object_manager(&mut self, path: &ObjectPath) -> BusResult<()> {
        self.managers.insert(path.clone());
        debug!(path = %path, "object manager installed");
        Ok(())
    }

    /// Returns `true` if any interface is registered at `path`.
    pub fn has_object(&self, path: &ObjectPath) -> bool {
        self.table
            .read()
            .expect("object table lock poisoned")
            .has_object(path)
    }

    /// Number of objects with at least one registered interface.
    pub fn object_count(&self) -> usize {
        self.table
            .read()
            .expect("object table lock poisoned")
            .object_count()
    }

    /// Announce a new object. Returns the number of subscribers reached.
    pub fn emit_interfaces_added(&self, path: &ObjectPath, interfaces: InterfaceMap) -> usize {
        self.emit(Signal::InterfacesAdded {
            path: path.clone(),
            interfaces,
        })
    }

    /// Announce that interfaces of an object went away. Returns the number
    /// of subscribers reached.
    pub fn emit_interfaces_removed(&self, path: &ObjectPath, interfaces: Vec<String>) -> usize {
        self.emit(Signal::InterfacesRemoved {
            path: path.clone(),
            interfaces,
        })
    }

    fn emit(&self, signal: Signal) -> usize {
        // Sending fails only when nobody is subscribed.
        let reached = self.signals.send(signal.clone()).unwrap_or(0);
        debug!(signal = signal.type_name(), path = %signal.path(), reached, "signal emitted");
        reached
    }

    /// Take one queued call and resolve it.
    ///
    /// Returns `Ok(None)` when the queue is empty. Calls the bus can answer
    /// on its own (unknown object, interface, or destination, malformed
    /// property requests) are answered here and never reach the owner.
    pub fn process(&mut self) -> BusResult<Option<Dispatch<B>>> {
        loop {
            let incoming = match self.pending.take() {
                Some(incoming) => incoming,
                None => match self.inbound.try_recv() {
                    Ok(incoming) => incoming,
                    Err(TryRecvError::Empty) => return Ok(None),
                    Err(TryRecvError::Disconnected) => return Err(BusError::Disconnected),
                },
            };

            let IncomingCall { call, reply } = incoming;
            let responder = Responder::new(reply, call.member.clone());
            match self.resolve(&call) {
                Ok(request) => {
                    return Ok(Some(Dispatch {
                        path: call.path,
                        request,
                        responder,
                    }))
                }
                Err(error) => {
                    debug!(
                        path = %call.path,
                        interface = %call.interface,
                        member = %call.member,
                        error = %error,
                        "call rejected by bus"
                    );
                    responder.send(Err(error));
                }
            }
        }
    }

    /// Block until a call is queued or `timeout` elapses.
    pub async fn wait(&mut self, timeout: Duration) -> BusResult<()> {
        if self.pending.is_some() {
            return Ok(());
        }
        match tokio::time::timeout(timeout, self.inbound.recv()).await {
            Ok(Some(incoming)) => {
                self.pending = Some(incoming);
                Ok(())
            }
            Ok(None) => Err(BusError::Disconnected),
            Err(_elapsed) => Ok(()),
        }
    }

    fn resolve(&self, call: &MethodCall) -> Result<Request<B>, MethodError> {
        if let Some(destination) = &call.destination {
            let names = self.names.read().expect("name lock poisoned");
            if !names.contains(destination) {
                return Err(MethodError::new(
                    error_names::SERVICE_UNKNOWN,
                    format!("name {destination} is not owned by this bus"),
                ));
            }
        }

        let table = self.table.read().expect("object table lock poisoned");

        if call.interface == OBJECT_MANAGER_INTERFACE {
            if !self.managers.contains(&call.path) {
                return Err(MethodError::unknown_interface(&call.path, &call.interface));
            }
            if call.member != method::GET_MANAGED_OBJECTS {
                return Err(MethodError::unknown_method(&call.interface, &call.member));
            }
            let objects = table
                .descendants(&call.path)
                .into_iter()
                .map(|(path, interfaces)| ManagedObject { path, interfaces })
                .collect();
            return Ok(Request::ManagedObjects { objects });
        }

        if !table.has_object(&call.path) {
            return Err(MethodError::unknown_object(&call.path));
        }

        if call.interface == PROPERTIES_INTERFACE {
            return match (call.member.as_str(), call.args.as_slice()) {
                (method::GET, [Value::Str(interface), Value::Str(property)]) => {
                    let binding = table
                        .binding(&call.path, interface)
                        .ok_or_else(|| MethodError::unknown_interface(&call.path, interface))?;
                    Ok(Request::GetProperty {
                        binding,
                        interface: interface.clone(),
                        property: property.clone(),
                    })
                }
                (method::GET_ALL, [Value::Str(interface)]) => {
                    let binding = table
                        .binding(&call.path, interface)
                        .ok_or_else(|| MethodError::unknown_interface(&call.path, interface))?;
                    Ok(Request::GetAllProperties {
                        binding,
                        interface: interface.clone(),
                    })
                }
                (method::GET, _) | (method::GET_ALL, _) => Err(MethodError::invalid_args(format!(
                    "{} expects interface and property names",
                    call.member
                ))),
                _ => Err(MethodError::unknown_method(&call.interface, &call.member)),
            };
        }

        let binding = table
            .binding(&call.path, &call.interface)
            .ok_or_else(|| MethodError::unknown_interface(&call.path, &call.interface))?;
        Ok(Request::Method {
            binding,
            interface: call.interface.clone(),
            member: call.member.clone(),
            args: call.args.clone(),
        })
    }
}

/// Cloneable handle through which clients reach a [`Bus`].
#[derive(Clone)]
pub struct BusConnector {
    calls: mpsc::Sender<IncomingCall>,
    signals: broadcast::Sender<Signal>,
    names: Arc<RwLock<BTreeSet<String>>>,
}

impl BusConnector {
    /// Create an in-process client.
    pub fn client(&self) -> BusClient {
        BusClient::new(self.clone())
    }

    /// Receive every signal emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.signals.subscribe()
    }

    /// Well-known names owned by the bus.
    pub fn names(&self) -> Vec<String> {
        self.names
            .read()
            .expect("name lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Queue a call for the owner and return the channel its reply will
    /// arrive on.
    ///
    /// Calls queued from one task are processed in the order they were
    /// submitted.
    pub async fn submit(&self, call: MethodCall) -> BusResult<oneshot::Receiver<CallResult>> {
        let (reply, rx) = oneshot::channel();
        self.calls
            .send(IncomingCall { call, reply })
            .await
            .map_err(|_| BusError::Disconnected)?;
        Ok(rx)
    }

    /// Queue a call and wait for its reply.
    pub async fn call(&self, call: MethodCall) -> BusResult<Vec<Value>> {
        let rx = self.submit(call).await?;
        match rx.await {
            Ok(Ok(values)) => Ok(values),
            Ok(Err(error)) => Err(BusError::Method(error)),
            Err(_) => Err(BusError::Disconnected),
        }
    }
}

impl std::fmt::Debug for BusConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusConnector")
            .field("subscribers", &self.signals.receiver_count())
            .finish()
    }
}
