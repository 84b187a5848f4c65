//! Well-known names of the published object surface.

/// Bus name claimed by the event log daemon.
pub const SERVICE_NAME: &str = "org.openbmc.records.events";

/// Default object path under which every log object is published.
pub const RECORDS_ROOT: &str = "/org/openbmc/records/events";

/// Root-object interface: ingestion and bulk deletion.
pub const RECORDLOG_INTERFACE: &str = "org.openbmc.recordlog";

/// Per-log read-only attributes interface.
pub const RECORD_INTERFACE: &str = "org.openbmc.record";

/// Per-log delete capability.
pub const DELETE_INTERFACE: &str = "org.openbmc.Object.Delete";

/// Standard property access interface served by the bus for every object.
pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Standard object-manager interface served at manager paths.
pub const OBJECT_MANAGER_INTERFACE: &str = "org.freedesktop.DBus.ObjectManager";

/// Members of the root `recordlog` interface.
pub mod method {
    pub const ACCEPT_HOST_MESSAGE: &str = "acceptHostMessage";
    pub const ACCEPT_TEST_MESSAGE: &str = "acceptTestMessage";
    pub const CLEAR: &str = "clear";
    pub const DELETE: &str = "delete";
    pub const GET: &str = "Get";
    pub const GET_ALL: &str = "GetAll";
    pub const GET_MANAGED_OBJECTS: &str = "GetManagedObjects";
}

/// Properties of the per-log `record` interface.
pub mod property {
    pub const MESSAGE: &str = "message";
    pub const SEVERITY: &str = "severity";
    pub const ASSOCIATION: &str = "association";
    pub const REPORTED_BY: &str = "reported_by";
    pub const TIME: &str = "time";
    pub const DEBUG_DATA: &str = "debug_data";

    /// Text-valued properties, in the order they are listed by `GetAll`.
    pub const TEXT: [&str; 5] = [ASSOCIATION, MESSAGE, SEVERITY, REPORTED_BY, TIME];
}

/// Origin labels stamped into `reported_by`.
pub mod origin {
    pub const HOST: &str = "Host";
    pub const TEST: &str = "Test";
}
