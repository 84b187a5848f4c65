use std::sync::Arc;

use tracing::info;

use evlog_bus::{Bus, BusClient, BusConnector};
use evlog_store::RecordStore;

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::manager::EventManager;
use crate::monitor::EventMonitor;

/// A started event log daemon: its request loop and a connector to its bus.
#[derive(Debug)]
pub struct EventServer {
    monitor: EventMonitor,
    connector: BusConnector,
}

impl EventServer {
    /// Bring the daemon up on a fresh bus.
    ///
    /// Claims the service name, registers the records root with its object
    /// manager, and publishes every log already in `store`.
    pub fn start(config: &ServerConfig, store: Arc<dyn RecordStore>) -> ServerResult<Self> {
        config.validate()?;
        let (mut bus, connector) = Bus::new(config.bus_config());
        bus.request_name(&config.service_name)?;

        let mut manager = EventManager::new(bus, store, config.records_root.clone());
        manager.register_root()?;
        let published = manager.publish_stored()?;
        info!(
            service = %config.service_name,
            root = %config.records_root,
            published,
            "event log service started"
        );

        Ok(Self {
            monitor: EventMonitor::new(manager, config.idle_timeout()),
            connector,
        })
    }

    pub fn connector(&self) -> BusConnector {
        self.connector.clone()
    }

    pub fn client(&self) -> BusClient {
        self.connector.client()
    }

    pub fn monitor(&self) -> &EventMonitor {
        &self.monitor
    }

    /// Split into the request loop and the bus connector.
    pub fn into_parts(self) -> (EventMonitor, BusConnector) {
        (self.monitor, self.connector)
    }

    /// Run the request loop until the bus fails.
    ///
    /// The server's own connector is released first, so the loop ends once
    /// every client and listener holding a connector is gone.
    pub async fn run(self) -> ServerResult<()> {
        let (mut monitor, connector) = self.into_parts();
        drop(connector);
        monitor.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use evlog_store::InMemoryRecordStore;
    use evlog_types::EventRecord;

    #[test]
    fn start_publishes_stored_logs() {
        let store = Arc::new(InMemoryRecordStore::new());
        for i in 0..2 {
            store
                .create(&EventRecord::draft(format!("m{i}"), "Info", "/a", "Test", vec![]))
                .unwrap();
        }
        let server = EventServer::start(&ServerConfig::default(), store).unwrap();
        let manager = server.monitor().manager();
        assert_eq!(manager.registry().len(), 2);
        // Root plus one object per log.
        assert_eq!(manager.bus().object_count(), 3);
        assert_eq!(server.connector().names(), vec!["org.openbmc.records.events".to_string()]);
    }

    #[test]
    fn start_rejects_invalid_config() {
        let config = ServerConfig {
            queue_capacity: 0,
            ..ServerConfig::default()
        };
        let err = EventServer::start(&config, Arc::new(InMemoryRecordStore::new())).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
