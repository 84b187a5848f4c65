use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, Weak};

use tracing::debug;

use evlog_types::ObjectPath;

use crate::error::{BusError, BusResult};

/// Registered interfaces, keyed by object path and then interface name.
///
/// Each registration carries a binding of type `B`: an opaque tag the bus
/// hands back to the owner with every request addressed to it.
pub(crate) struct ObjectTable<B> {
    objects: BTreeMap<ObjectPath, BTreeMap<String, B>>,
}

impl<B> ObjectTable<B> {
    pub(crate) fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
        }
    }

    /// Remove one registration. Objects with no interfaces left disappear.
    pub(crate) fn remove(&mut self, path: &ObjectPath, interface: &str) -> bool {
        let Some(interfaces) = self.objects.get_mut(path) else {
            return false;
        };
        let removed = interfaces.remove(interface).is_some();
        if interfaces.is_empty() {
            self.objects.remove(path);
        }
        removed
    }
}

impl<B: Clone> ObjectTable<B> {
    pub(crate) fn insert(&mut self, path: &ObjectPath, interface: &str, binding: B) -> BusResult<()> {
        let interfaces = self.objects.entry(path.clone()).or_default();
        if interfaces.contains_key(interface) {
            return Err(BusError::ObjectExists {
                path: path.clone(),
                interface: interface.to_string(),
            });
        }
        interfaces.insert(interface.to_string(), binding);
        Ok(())
    }

    pub(crate) fn has_object(&self, path: &ObjectPath) -> bool {
        self.objects.contains_key(path)
    }

    pub(crate) fn binding(&self, path: &ObjectPath, interface: &str) -> Option<B> {
        self.objects.get(path)?.get(interface).cloned()
    }

    /// Every object strictly below `root`, with its interfaces, in path order.
    pub(crate) fn descendants(&self, root: &ObjectPath) -> Vec<(ObjectPath, Vec<(String, B)>)> {
        self.objects
            .iter()
            .filter(|(path, _)| path.is_descendant_of(root))
            .map(|(path, interfaces)| {
                let interfaces = interfaces
                    .iter()
                    .map(|(name, binding)| (name.clone(), binding.clone()))
                    .collect();
                (path.clone(), interfaces)
            })
            .collect()
    }

    pub(crate) fn object_count(&self) -> usize {
        self.objects.len()
    }
}

/// Registration guard for one `(path, interface)` binding.
///
/// The registration lives exactly as long as the slot: dropping it removes
/// the interface from the bus.
pub struct Slot<B> {
    table: Weak<RwLock<ObjectTable<B>>>,
    path: ObjectPath,
    interface: String,
}

impl<B> Slot<B> {
    pub(crate) fn new(table: &Arc<RwLock<ObjectTable<B>>>, path: ObjectPath, interface: String) -> Self {
        Self {
            table: Arc::downgrade(table),
            path,
            interface,
        }
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl<B> Drop for Slot<B> {
    fn drop(&mut self) {
        let Some(table) = self.table.upgrade() else {
            return;
        };
        // A poisoned table belongs to a bus that is already going down.
        if let Ok(mut table) = table.write() {
            table.remove(&self.path, &self.interface);
            debug!(path = %self.path, interface = %self.interface, "slot released");
        };
    }
}

impl<B> std::fmt::Debug for Slot<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("path", &self.path)
            .field("interface", &self.interface)
            .finish()
    }
}
