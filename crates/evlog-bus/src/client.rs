use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use evlog_protocol::{InterfaceMap, MethodCall, PropertyMap, Signal, Value};
use evlog_types::names::{method, OBJECT_MANAGER_INTERFACE, PROPERTIES_INTERFACE};
use evlog_types::ObjectPath;

use crate::bus::BusConnector;
use crate::error::{BusError, BusResult};
use crate::values;

/// The caller's view of the bus, in-process or over a socket.
#[async_trait]
pub trait BusCaller: Send {
    /// Invoke a method and wait for its reply.
    async fn call(&mut self, call: MethodCall) -> BusResult<Vec<Value>>;

    /// Start receiving signals. Signals emitted before this call are not seen.
    async fn subscribe(&mut self) -> BusResult<()>;

    /// Wait for the next signal. Returns `Ok(None)` once the bus is gone.
    async fn next_signal(&mut self) -> BusResult<Option<Signal>>;

    async fn get_property(&mut self, path: &ObjectPath, interface: &str, property: &str) -> BusResult<Value> {
        let call = MethodCall::new(path.clone(), PROPERTIES_INTERFACE, method::GET)
            .with_args(vec![interface.into(), property.into()]);
        values::single(self.call(call).await?)
    }

    async fn get_all_properties(&mut self, path: &ObjectPath, interface: &str) -> BusResult<PropertyMap> {
        let call = MethodCall::new(path.clone(), PROPERTIES_INTERFACE, method::GET_ALL)
            .with_args(vec![interface.into()]);
        values::value_to_property_map(values::single(self.call(call).await?)?)
    }

    async fn managed_objects(&mut self, path: &ObjectPath) -> BusResult<BTreeMap<ObjectPath, InterfaceMap>> {
        let call = MethodCall::new(path.clone(), OBJECT_MANAGER_INTERFACE, method::GET_MANAGED_OBJECTS);
        values::value_to_managed_objects(values::single(self.call(call).await?)?)
    }
}

/// An in-process client holding a [`BusConnector`].
#[derive(Debug)]
pub struct BusClient {
    connector: BusConnector,
    signals: Option<broadcast::Receiver<Signal>>,
}

impl BusClient {
    pub fn new(connector: BusConnector) -> Self {
        Self {
            connector,
            signals: None,
        }
    }
}

#[async_trait]
impl BusCaller for BusClient {
    async fn call(&mut self, call: MethodCall) -> BusResult<Vec<Value>> {
        self.connector.call(call).await
    }

    async fn subscribe(&mut self) -> BusResult<()> {
        if self.signals.is_none() {
            self.signals = Some(self.connector.subscribe());
        }
        Ok(())
    }

    async fn next_signal(&mut self) -> BusResult<Option<Signal>> {
        let signals = self.signals.as_mut().ok_or(BusError::NotSubscribed)?;
        match signals.recv().await {
            Ok(signal) => Ok(Some(signal)),
            Err(RecvError::Closed) => Ok(None),
            Err(RecvError::Lagged(missed)) => Err(BusError::Lagged(missed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{Bus, BusConfig};

    #[tokio::test]
    async fn next_signal_requires_subscription() {
        let (_bus, connector) = Bus::<()>::new(BusConfig::default());
        let mut client = connector.client();
        assert!(matches!(client.next_signal().await, Err(BusError::NotSubscribed)));
    }

    #[tokio::test]
    async fn subscribed_client_sees_signals() {
        let (bus, connector) = Bus::<()>::new(BusConfig::default());
        let mut client = connector.client();
        client.subscribe().await.unwrap();

        let path = ObjectPath::new("/r/4").unwrap();
        bus.emit_interfaces_removed(&path, vec!["x.Item".into()]);
        match client.next_signal().await.unwrap() {
            Some(Signal::InterfacesRemoved { path: p, interfaces }) => {
                assert_eq!(p, path);
                assert_eq!(interfaces, vec!["x.Item".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn lagging_subscriber_is_reported() {
        let (bus, connector) = Bus::<()>::new(BusConfig {
            queue_capacity: 4,
            signal_capacity: 2,
        });
        let mut client = connector.client();
        client.subscribe().await.unwrap();
        let path = ObjectPath::new("/r/1").unwrap();
        for _ in 0..5 {
            bus.emit_interfaces_removed(&path, vec![]);
        }
        assert!(matches!(client.next_signal().await, Err(BusError::Lagged(_))));
    }
}
