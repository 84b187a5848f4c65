use std::sync::Arc;
use std::time::Duration;

use evlog_bus::{BusCaller, BusClient, BusError, RemoteClient, SocketListener};
use evlog_protocol::{error_names, MethodCall, Signal, Value};
use evlog_server::{EventServer, ServerConfig};
use evlog_store::{FileRecordStore, InMemoryRecordStore, RecordStore};
use evlog_types::names::{method, property, DELETE_INTERFACE, RECORDLOG_INTERFACE, RECORD_INTERFACE, SERVICE_NAME};
use evlog_types::{EventRecord, LogId, ObjectPath};

fn config() -> ServerConfig {
    ServerConfig {
        idle_timeout_ms: 20,
        ..ServerConfig::default()
    }
}

fn root() -> ObjectPath {
    config().records_root
}

/// Start a server on `store` with its loop on a background task.
fn spawn(store: Arc<dyn RecordStore>) -> BusClient {
    let server = EventServer::start(&config(), store).unwrap();
    let client = server.client();
    tokio::spawn(server.run());
    client
}

async fn submit(client: &mut impl BusCaller, message: &str, severity: &str, association: &str, data: &[u8]) -> LogId {
    let call = MethodCall::new(root(), RECORDLOG_INTERFACE, method::ACCEPT_HOST_MESSAGE)
        .with_destination(SERVICE_NAME)
        .with_args(vec![
            message.into(),
            severity.into(),
            association.into(),
            Value::Bytes(data.to_vec()),
        ]);
    let reply = client.call(call).await.unwrap();
    LogId::new(reply[0].as_u16().unwrap())
}

async fn test_message(client: &mut impl BusCaller) -> LogId {
    let call = MethodCall::new(root(), RECORDLOG_INTERFACE, method::ACCEPT_TEST_MESSAGE);
    let reply = client.call(call).await.unwrap();
    LogId::new(reply[0].as_u16().unwrap())
}

async fn delete(client: &mut impl BusCaller, log_id: LogId) -> Result<Vec<Value>, BusError> {
    let path = root().child(log_id).unwrap();
    client.call(MethodCall::new(path, DELETE_INTERFACE, method::DELETE)).await
}

async fn get(client: &mut impl BusCaller, path: &ObjectPath, name: &str) -> Value {
    client.get_property(path, RECORD_INTERFACE, name).await.unwrap()
}

fn not_found(result: Result<impl std::fmt::Debug, BusError>) -> bool {
    matches!(result, Err(BusError::Method(e)) if e.is_not_found())
}

#[tokio::test]
async fn submitted_log_is_readable_over_the_bus() {
    let mut client = spawn(Arc::new(InMemoryRecordStore::new()));
    let log_id = submit(&mut client, "disk fault", "Critical", "/sensors/temp0", &[0xAA, 0xBB]).await;
    assert!(log_id.is_assigned());

    let path = root().child(log_id).unwrap();
    assert_eq!(get(&mut client, &path, property::MESSAGE).await, Value::from("disk fault"));
    assert_eq!(get(&mut client, &path, property::SEVERITY).await, Value::from("Critical"));
    assert_eq!(get(&mut client, &path, property::ASSOCIATION).await, Value::from("/sensors/temp0"));
    assert_eq!(get(&mut client, &path, property::REPORTED_BY).await, Value::from("Host"));
    assert_eq!(get(&mut client, &path, property::DEBUG_DATA).await, Value::Bytes(vec![0xAA, 0xBB]));
    assert_eq!(get(&mut client, &path, "no_such_attribute").await, Value::from(""));

    let all = client.get_all_properties(&path, RECORD_INTERFACE).await.unwrap();
    assert_eq!(all.len(), 6);
    assert!(all.contains_key(property::TIME));
}

#[tokio::test]
async fn test_messages_are_independently_deletable() {
    let mut client = spawn(Arc::new(InMemoryRecordStore::new()));
    let a = test_message(&mut client).await;
    let b = test_message(&mut client).await;
    assert!(a.is_assigned() && b.is_assigned());
    assert_ne!(a, b);

    assert_eq!(delete(&mut client, a).await.unwrap(), vec![Value::U16(0)]);
    let path_b = root().child(b).unwrap();
    let message = client.get_property(&path_b, RECORD_INTERFACE, property::MESSAGE).await.unwrap();
    assert_eq!(message, Value::from("A Test event log just happened"));

    delete(&mut client, b).await.unwrap();
    assert!(not_found(delete(&mut client, b).await));
}

#[tokio::test]
async fn reading_unpublished_log_is_not_found() {
    let mut client = spawn(Arc::new(InMemoryRecordStore::new()));
    let never = root().child(LogId::new(77)).unwrap();
    assert!(not_found(client.get_property(&never, RECORD_INTERFACE, property::MESSAGE).await));

    let log_id = test_message(&mut client).await;
    delete(&mut client, log_id).await.unwrap();
    let gone = root().child(log_id).unwrap();
    assert!(not_found(client.get_property(&gone, RECORD_INTERFACE, property::MESSAGE).await));
}

#[tokio::test]
async fn unpublished_reads_keep_the_cached_record() {
    let store = Arc::new(InMemoryRecordStore::new());
    let mut client = spawn(store.clone());
    let live = test_message(&mut client).await;
    let path = root().child(live).unwrap();
    get(&mut client, &path, property::MESSAGE).await;
    let loads = store.load_count();

    let never = root().child(LogId::new(77)).unwrap();
    assert!(not_found(client.get_property(&never, RECORD_INTERFACE, property::MESSAGE).await));
    get(&mut client, &path, property::SEVERITY).await;

    assert_eq!(store.load_count(), loads);
    assert_eq!(client.managed_objects(&root()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_submission_is_invalid_args() {
    let mut client = spawn(Arc::new(InMemoryRecordStore::new()));
    let call = MethodCall::new(root(), RECORDLOG_INTERFACE, method::ACCEPT_HOST_MESSAGE)
        .with_args(vec!["only a message".into()]);
    match client.call(call).await {
        Err(BusError::Method(e)) => assert_eq!(e.name, error_names::INVALID_ARGS),
        other => panic!("unexpected {other:?}"),
    }
    assert!(client.managed_objects(&root()).await.unwrap().is_empty());
}

#[tokio::test]
async fn clear_removes_every_log_and_announces_each() {
    let mut client = spawn(Arc::new(InMemoryRecordStore::new()));
    let mut ids = Vec::new();
    for i in 0..4 {
        ids.push(submit(&mut client, &format!("event {i}"), "Warning", "/a", &[]).await);
    }
    assert_eq!(client.managed_objects(&root()).await.unwrap().len(), 4);

    client.subscribe().await.unwrap();
    let reply = client
        .call(MethodCall::new(root(), RECORDLOG_INTERFACE, method::CLEAR))
        .await
        .unwrap();
    assert_eq!(reply, vec![Value::U16(0)]);

    let mut removed = Vec::new();
    for _ in 0..4 {
        match tokio::time::timeout(Duration::from_secs(5), client.next_signal()).await {
            Ok(Ok(Some(Signal::InterfacesRemoved { path, .. }))) => removed.push(path),
            other => panic!("unexpected {other:?}"),
        }
    }
    removed.sort();
    let mut expected: Vec<ObjectPath> = ids.iter().map(|id| root().child(*id).unwrap()).collect();
    expected.sort();
    assert_eq!(removed, expected);
    assert!(client.managed_objects(&root()).await.unwrap().is_empty());
}

#[tokio::test]
async fn managed_objects_carry_record_properties() {
    let mut client = spawn(Arc::new(InMemoryRecordStore::new()));
    let log_id = submit(&mut client, "fan stalled", "Critical", "/fans/0", &[1]).await;
    let objects = client.managed_objects(&root()).await.unwrap();
    let interfaces = &objects[&root().child(log_id).unwrap()];
    assert_eq!(interfaces[RECORD_INTERFACE][property::MESSAGE], Value::from("fan stalled"));
    assert!(interfaces[DELETE_INTERFACE].is_empty());
}

#[tokio::test]
async fn logs_survive_restart_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let log_id = {
        let store = Arc::new(FileRecordStore::open(dir.path()).unwrap());
        let mut client = spawn(store);
        submit(&mut client, "psu lost", "Critical", "/psu/1", &[9, 9]).await
    };

    let store = Arc::new(FileRecordStore::open(dir.path()).unwrap());
    let mut client = spawn(store);
    let path = root().child(log_id).unwrap();
    let data = client.get_property(&path, RECORD_INTERFACE, property::DEBUG_DATA).await.unwrap();
    assert_eq!(data, Value::Bytes(vec![9, 9]));
}

#[tokio::test]
async fn socket_clients_see_the_same_surface() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("bus.sock");
    let server = EventServer::start(&config(), Arc::new(InMemoryRecordStore::new())).unwrap();
    let listener = SocketListener::bind(&socket, server.connector()).unwrap();
    tokio::spawn(listener.serve());
    tokio::spawn(server.run());

    let mut remote = RemoteClient::connect(&socket).await.unwrap();
    assert_eq!(remote.names(), [SERVICE_NAME.to_string()]);
    remote.subscribe().await.unwrap();

    let log_id = submit(&mut remote, "remote", "Info", "/r", &[]).await;
    match remote.next_signal().await.unwrap() {
        Some(Signal::InterfacesAdded { path, interfaces }) => {
            assert_eq!(path, root().child(log_id).unwrap());
            assert!(interfaces.contains_key(RECORD_INTERFACE));
        }
        other => panic!("unexpected {other:?}"),
    }

    let record = EventRecord::draft("remote", "Info", "/r", "Host", vec![]);
    let path = root().child(log_id).unwrap();
    let summary = format!(
        "{} {} ({})",
        remote.get_property(&path, RECORD_INTERFACE, property::SEVERITY).await.unwrap().as_str().unwrap(),
        remote.get_property(&path, RECORD_INTERFACE, property::MESSAGE).await.unwrap().as_str().unwrap(),
        remote.get_property(&path, RECORD_INTERFACE, property::ASSOCIATION).await.unwrap().as_str().unwrap(),
    );
    assert_eq!(summary, record.summary());
}
