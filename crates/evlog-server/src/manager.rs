use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use evlog_bus::{values, Bus, Dispatch, ManagedObject, Request, Slot};
use evlog_protocol::{error_names, InterfaceMap, MethodError, PropertyMap, Value};
use evlog_store::RecordStore;
use evlog_types::names::{method, origin, property, DELETE_INTERFACE, RECORDLOG_INTERFACE, RECORD_INTERFACE};
use evlog_types::{format_timestamp, EventRecord, LogId, ObjectPath};

use crate::cache::RecordCache;
use crate::error::{ServerError, ServerResult};
use crate::registry::{PublishedLogEntry, Registry, Target};

/// Journal target for accepted submissions.
pub const JOURNAL_TARGET: &str = "evlog::journal";

const TEST_MESSAGE: &str = "A Test event log just happened";
const TEST_SEVERITY: &str = "Info";
const TEST_ASSOCIATION: &str = "/org/openbmc/inventory/system/chassis/motherboard/dimm3 \
                                /org/openbmc/inventory/system/chassis/motherboard/dimm2";
const TEST_DEBUG_DATA: [u8; 6] = [0x30, 0x00, 0x13, 0x7F, 0x88, 0xFF];

/// The draft submitted by `acceptTestMessage`.
pub fn test_record() -> EventRecord {
    EventRecord::draft(
        TEST_MESSAGE,
        TEST_SEVERITY,
        TEST_ASSOCIATION,
        origin::TEST,
        TEST_DEBUG_DATA.to_vec(),
    )
}

/// Owns everything the request loop touches: the bus endpoint, the store,
/// the record cache, and the registry of published logs.
pub struct EventManager {
    bus: Bus<Target>,
    store: Arc<dyn RecordStore>,
    cache: RecordCache,
    registry: Registry,
    root: ObjectPath,
    root_slot: Option<Slot<Target>>,
}

impl EventManager {
    pub fn new(bus: Bus<Target>, store: Arc<dyn RecordStore>, root: ObjectPath) -> Self {
        Self {
            bus,
            cache: RecordCache::new(store.clone()),
            store,
            registry: Registry::new(),
            root,
            root_slot: None,
        }
    }

    /// Register the records root and the object manager serving it.
    pub fn register_root(&mut self) -> ServerResult<()> {
        if self.root_slot.is_none() {
            let slot = self.bus.add_object(&self.root, RECORDLOG_INTERFACE, Target::Root)?;
            self.bus.add_object_manager(&self.root)?;
            self.root_slot = Some(slot);
        }
        Ok(())
    }

    pub fn bus(&self) -> &Bus<Target> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus<Target> {
        &mut self.bus
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn cached_id(&self) -> Option<LogId> {
        self.cache.cached_id()
    }

    pub fn root(&self) -> &ObjectPath {
        &self.root
    }

    /// Object path of a log: `<records-root>/<log_id>`.
    pub fn record_path(&self, log_id: LogId) -> ServerResult<ObjectPath> {
        Ok(self.root.child(log_id)?)
    }

    /// Make a stored log visible on the bus and announce it.
    ///
    /// Either both interfaces are registered and the log is in the
    /// registry, or nothing changed.
    pub fn publish(&mut self, log_id: LogId) -> ServerResult<()> {
        if self.registry.contains(log_id) {
            return Err(ServerError::AlreadyPublished(log_id));
        }
        let path = self.record_path(log_id)?;
        let record = self.bus.add_object(&path, RECORD_INTERFACE, Target::Record(log_id))?;
        let delete = self.bus.add_object(&path, DELETE_INTERFACE, Target::Delete(log_id))?;
        self.registry
            .insert(PublishedLogEntry::new(log_id, path.clone(), record, delete))?;

        let mut interfaces = InterfaceMap::new();
        let properties = match self.record_properties(log_id) {
            Ok(properties) => properties,
            Err(e) => {
                warn!(%log_id, error = %e, "published log has no readable record");
                PropertyMap::new()
            }
        };
        interfaces.insert(RECORD_INTERFACE.to_string(), properties);
        interfaces.insert(DELETE_INTERFACE.to_string(), PropertyMap::new());
        self.bus.emit_interfaces_added(&path, interfaces);
        debug!(%log_id, path = %path, "log published");
        Ok(())
    }

    /// Withdraw a log from the bus and announce its removal.
    pub fn unpublish(&mut self, log_id: LogId) -> ServerResult<()> {
        let entry = self.registry.remove(log_id).ok_or(ServerError::NotFound(log_id))?;
        let path = entry.path().clone();
        drop(entry);
        self.cache.invalidate(log_id);
        self.bus.emit_interfaces_removed(
            &path,
            vec![RECORD_INTERFACE.to_string(), DELETE_INTERFACE.to_string()],
        );
        debug!(%log_id, path = %path, "log unpublished");
        Ok(())
    }

    /// Read one attribute of a log.
    ///
    /// Unknown attribute names read as an empty string. Reads for a log
    /// that is not published fail without touching the cache.
    pub fn property(&mut self, log_id: LogId, name: &str) -> ServerResult<Value> {
        if !self.registry.contains(log_id) {
            return Err(ServerError::NotFound(log_id));
        }
        let record = self.cache.resolve(log_id)?;
        let value = match name {
            property::MESSAGE => Value::from(record.message.as_str()),
            property::SEVERITY => Value::from(record.severity.as_str()),
            property::ASSOCIATION => Value::from(record.association.as_str()),
            property::REPORTED_BY => Value::from(record.reported_by.as_str()),
            property::TIME => Value::from(format_timestamp(&record.timestamp)),
            property::DEBUG_DATA => Value::Bytes(record.debug_data.clone()),
            _ => Value::from(""),
        };
        Ok(value)
    }

    /// Every attribute of a log.
    pub fn record_properties(&mut self, log_id: LogId) -> ServerResult<PropertyMap> {
        let mut properties = PropertyMap::new();
        for name in property::TEXT.into_iter().chain([property::DEBUG_DATA]) {
            properties.insert(name.to_string(), self.property(log_id, name)?);
        }
        Ok(properties)
    }

    /// Store a draft and publish it. Returns the assigned id, or
    /// [`LogId::UNASSIGNED`] if the store could not assign one.
    pub fn submit(&mut self, draft: EventRecord) -> ServerResult<LogId> {
        info!(target: JOURNAL_TARGET, "{}", draft.summary());
        let log_id = match self.store.create(&draft) {
            Ok(log_id) => log_id,
            Err(e) => {
                warn!(error = %e, "failed to store event log");
                LogId::UNASSIGNED
            }
        };
        if log_id.is_assigned() {
            self.publish(log_id).map_err(|e| ServerError::Publish {
                log_id,
                source: Box::new(e),
            })?;
        }
        Ok(log_id)
    }

    /// `acceptHostMessage(s message, s severity, s association, ay debug_data)`.
    pub fn accept_host_message(&mut self, args: &[Value]) -> ServerResult<LogId> {
        let draft = match args {
            [Value::Str(message), Value::Str(severity), Value::Str(association), Value::Bytes(data)] => {
                EventRecord::draft(
                    message.as_str(),
                    severity.as_str(),
                    association.as_str(),
                    origin::HOST,
                    data.clone(),
                )
            }
            _ => {
                let signature: String = args.iter().map(Value::signature).collect();
                return Err(ServerError::InvalidArgs(format!(
                    "expected (sssay), got ({signature})"
                )));
            }
        };
        self.submit(draft)
    }

    pub fn accept_test_message(&mut self) -> ServerResult<LogId> {
        self.submit(test_record())
    }

    /// Delete a log from the store, then withdraw it from the bus.
    ///
    /// A store failure leaves the log published. A log the store no longer
    /// has is still withdrawn.
    pub fn delete_one(&mut self, log_id: LogId) -> ServerResult<()> {
        if !self.registry.contains(log_id) {
            return Err(ServerError::NotFound(log_id));
        }
        if !self.store.delete(log_id)? {
            warn!(%log_id, "log was already gone from the store");
        }
        self.unpublish(log_id)
    }

    /// Delete every published log.
    ///
    /// Works on a snapshot of the ids taken at call time; failures are
    /// logged and the remaining logs are still deleted.
    pub fn delete_all(&mut self) -> ServerResult<()> {
        let ids = self.registry.ids();
        let total = ids.len();
        let mut failed = 0;
        for log_id in ids {
            if let Err(e) = self.delete_one(log_id) {
                warn!(%log_id, error = %e, "failed to delete log");
                failed += 1;
            }
        }
        info!(deleted = total - failed, failed, "logs cleared");
        if failed > 0 {
            return Err(ServerError::ClearIncomplete { failed, total });
        }
        Ok(())
    }

    /// Re-publish every log the store holds. Failures are logged and
    /// skipped. Returns the number of logs published.
    pub fn publish_stored(&mut self) -> ServerResult<usize> {
        let mut published = 0;
        for log_id in self.store.log_ids()? {
            match self.publish(log_id) {
                Ok(()) => published += 1,
                Err(e) => warn!(%log_id, error = %e, "failed to publish stored log"),
            }
        }
        info!(published, "stored logs published");
        Ok(published)
    }

    /// Answer one request taken from the bus.
    pub fn handle(&mut self, dispatch: Dispatch<Target>) {
        let Dispatch {
            path,
            request,
            responder,
        } = dispatch;
        let result = self.answer(request).map_err(|e| {
            warn!(path = %path, error = %e, "request failed");
            e
        });
        responder.send(result);
    }

    fn answer(&mut self, request: Request<Target>) -> Result<Vec<Value>, MethodError> {
        match request {
            Request::Method {
                binding,
                interface,
                member,
                args,
            } => self.call_method(binding, &interface, &member, &args),
            Request::GetProperty {
                binding: Target::Record(log_id),
                property,
                ..
            } => self
                .property(log_id, &property)
                .map(|value| vec![value])
                .map_err(|e| e.to_method_error()),
            Request::GetProperty { interface, property, .. } => Err(MethodError::new(
                error_names::UNKNOWN_PROPERTY,
                format!("interface {interface} has no property {property}"),
            )),
            Request::GetAllProperties {
                binding: Target::Record(log_id),
                ..
            } => self
                .record_properties(log_id)
                .map(|properties| vec![values::property_map_to_value(properties)])
                .map_err(|e| e.to_method_error()),
            Request::GetAllProperties { .. } => Ok(vec![values::property_map_to_value(PropertyMap::new())]),
            Request::ManagedObjects { objects } => Ok(vec![values::managed_objects_to_value(
                self.managed_objects(objects),
            )]),
        }
    }

    fn call_method(
        &mut self,
        binding: Target,
        interface: &str,
        member: &str,
        args: &[Value],
    ) -> Result<Vec<Value>, MethodError> {
        let result = match (binding, member) {
            (Target::Root, method::ACCEPT_HOST_MESSAGE) => self.accept_host_message(args).map(id_reply),
            (Target::Root, method::ACCEPT_TEST_MESSAGE) => self.accept_test_message().map(id_reply),
            (Target::Root, method::CLEAR) => self.delete_all().map(|()| zero_reply()),
            (Target::Delete(log_id), method::DELETE) => self.delete_one(log_id).map(|()| zero_reply()),
            _ => return Err(MethodError::unknown_method(interface, member)),
        };
        result.map_err(|e| e.to_method_error())
    }

    fn managed_objects(&mut self, objects: Vec<ManagedObject<Target>>) -> BTreeMap<ObjectPath, InterfaceMap> {
        let mut reply = BTreeMap::new();
        for object in objects {
            let mut interfaces = InterfaceMap::new();
            for (name, binding) in object.interfaces {
                let properties = match binding {
                    Target::Record(log_id) => self.record_properties(log_id).unwrap_or_else(|e| {
                        warn!(%log_id, error = %e, "managed log has no readable record");
                        PropertyMap::new()
                    }),
                    Target::Root | Target::Delete(_) => PropertyMap::new(),
                };
                interfaces.insert(name, properties);
            }
            reply.insert(object.path, interfaces);
        }
        reply
    }
}

fn id_reply(log_id: LogId) -> Vec<Value> {
    vec![Value::U16(log_id.get())]
}

fn zero_reply() -> Vec<Value> {
    vec![Value::U16(0)]
}

impl std::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventManager")
            .field("root", &self.root)
            .field("published", &self.registry.len())
            .field("cache", &self.cache)
            .finish()
    }
}
