use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use evlog_bus::{BusCaller, RemoteClient, SocketListener};
use evlog_protocol::{MethodCall, PropertyMap, Signal, Value};
use evlog_server::{EventServer, ServerConfig};
use evlog_store::FileRecordStore;
use evlog_types::names::{method, property, DELETE_INTERFACE, RECORDLOG_INTERFACE, RECORD_INTERFACE};
use evlog_types::{LogId, ObjectPath};

use crate::cli::*;

/// Where the daemon publishes its logs.
struct Service {
    root: ObjectPath,
    name: String,
}

impl Service {
    fn from_config(config: &ServerConfig) -> Self {
        Self {
            root: config.records_root.clone(),
            name: config.service_name.clone(),
        }
    }

    fn call(&self, path: ObjectPath, interface: &str, member: &str) -> MethodCall {
        MethodCall::new(path, interface, member).with_destination(self.name.as_str())
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let Cli { command, verbose, format, config, socket } = cli;
    let config = load_config(config.as_deref(), socket)?;
    if let Command::Serve(args) = command {
        return cmd_serve(args, config, verbose).await;
    }

    init_tracing(if verbose { "debug" } else { "warn" });
    let socket = &config.socket_path;
    let mut client = RemoteClient::connect(socket)
        .await
        .with_context(|| format!("cannot reach event log service at {}", socket.display()))?;
    let service = Service::from_config(&config);

    match command {
        Command::Serve(_) => Ok(()),
        Command::Submit(args) => cmd_submit(&mut client, &service, args, format).await,
        Command::Test => cmd_test(&mut client, &service, format).await,
        Command::List => cmd_list(&mut client, &service, format).await,
        Command::Show(args) => cmd_show(&mut client, &service, args.log_id, format).await,
        Command::Delete(args) => cmd_delete(&mut client, &service, args.log_id, format).await,
        Command::Clear => cmd_clear(&mut client, &service, format).await,
        Command::Watch => cmd_watch(&mut client, format).await,
    }
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// The configuration file if one was given, with `--socket` applied on top.
fn load_config(path: Option<&Path>, socket: Option<PathBuf>) -> anyhow::Result<ServerConfig> {
    let mut config = match path {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("cannot load configuration {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(socket) = socket {
        config.socket_path = socket;
    }
    Ok(config)
}

async fn cmd_serve(args: ServeArgs, mut config: ServerConfig, verbose: bool) -> anyhow::Result<()> {
    if let Some(storage) = args.storage {
        config.storage_dir = storage;
    }
    init_tracing(if verbose { "debug" } else { config.log_level.as_str() });

    let store = FileRecordStore::open(&config.storage_dir)
        .with_context(|| format!("cannot open log storage {}", config.storage_dir.display()))?;
    let server = EventServer::start(&config, Arc::new(store))?;
    let listener = SocketListener::bind(&config.socket_path, server.connector())
        .with_context(|| format!("cannot listen on {}", config.socket_path.display()))?;
    let (mut monitor, _connector) = server.into_parts();

    tokio::select! {
        result = monitor.run() => result.context("request loop stopped")?,
        result = listener.serve() => result.context("bus listener stopped")?,
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }
    Ok(())
}

async fn cmd_submit(client: &mut RemoteClient, service: &Service, args: SubmitArgs, format: OutputFormat) -> anyhow::Result<()> {
    let data = match &args.data {
        Some(text) => hex::decode(text).context("--data must be hex")?,
        None => Vec::new(),
    };
    let call = service
        .call(service.root.clone(), RECORDLOG_INTERFACE, method::ACCEPT_HOST_MESSAGE)
        .with_args(vec![
            args.message.into(),
            args.severity.into(),
            args.association.into(),
            Value::Bytes(data),
        ]);
    let log_id = id_of(client.call(call).await?)?;
    print_submitted(log_id, format)
}

async fn cmd_test(client: &mut RemoteClient, service: &Service, format: OutputFormat) -> anyhow::Result<()> {
    let call = service.call(service.root.clone(), RECORDLOG_INTERFACE, method::ACCEPT_TEST_MESSAGE);
    let log_id = id_of(client.call(call).await?)?;
    print_submitted(log_id, format)
}

async fn cmd_list(client: &mut RemoteClient, service: &Service, format: OutputFormat) -> anyhow::Result<()> {
    let objects = client.managed_objects(&service.root).await?;
    let mut logs: Vec<(LogId, PropertyMap)> = objects
        .into_iter()
        .filter_map(|(path, mut interfaces)| {
            let log_id: LogId = path.last_element()?.parse().ok()?;
            Some((log_id, interfaces.remove(RECORD_INTERFACE)?))
        })
        .collect();
    logs.sort_by_key(|(log_id, _)| *log_id);

    match format {
        OutputFormat::Json => {
            let items: Vec<serde_json::Value> = logs
                .iter()
                .map(|(log_id, props)| log_json(*log_id, props))
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Text if logs.is_empty() => println!("No event logs."),
        OutputFormat::Text => {
            for (log_id, props) in &logs {
                println!(
                    "{:>5}  {}  {:<8}  {} ({})",
                    log_id.to_string().yellow(),
                    text(props, property::TIME).dimmed(),
                    severity(&text(props, property::SEVERITY)),
                    text(props, property::MESSAGE),
                    text(props, property::ASSOCIATION).cyan(),
                );
            }
        }
    }
    Ok(())
}

async fn cmd_show(client: &mut RemoteClient, service: &Service, log_id: LogId, format: OutputFormat) -> anyhow::Result<()> {
    let path = service.root.child(log_id)?;
    let props = client
        .get_all_properties(&path, RECORD_INTERFACE)
        .await
        .with_context(|| format!("event log {log_id}"))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&log_json(log_id, &props))?),
        OutputFormat::Text => {
            println!("Event log {}", log_id.to_string().yellow().bold());
            println!("  Path:        {}", path.as_str().dimmed());
            println!("  Time:        {}", text(&props, property::TIME));
            println!("  Severity:    {}", severity(&text(&props, property::SEVERITY)));
            println!("  Message:     {}", text(&props, property::MESSAGE));
            println!("  Association: {}", text(&props, property::ASSOCIATION).cyan());
            println!("  Reported by: {}", text(&props, property::REPORTED_BY));
            if let Some(Value::Bytes(data)) = props.get(property::DEBUG_DATA) {
                println!("  Debug data:  {}", hex::encode(data).dimmed());
            }
        }
    }
    Ok(())
}

async fn cmd_delete(client: &mut RemoteClient, service: &Service, log_id: LogId, format: OutputFormat) -> anyhow::Result<()> {
    let call = service.call(service.root.child(log_id)?, DELETE_INTERFACE, method::DELETE);
    client.call(call).await.with_context(|| format!("event log {log_id}"))?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "deleted": log_id.get() })),
        OutputFormat::Text => println!("{} Deleted event log {}", "✓".green().bold(), log_id.to_string().yellow()),
    }
    Ok(())
}

async fn cmd_clear(client: &mut RemoteClient, service: &Service, format: OutputFormat) -> anyhow::Result<()> {
    let call = service.call(service.root.clone(), RECORDLOG_INTERFACE, method::CLEAR);
    client.call(call).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "cleared": true })),
        OutputFormat::Text => println!("{} Cleared all event logs", "✓".green().bold()),
    }
    Ok(())
}

async fn cmd_watch(client: &mut RemoteClient, format: OutputFormat) -> anyhow::Result<()> {
    client.subscribe().await?;
    if format == OutputFormat::Text {
        println!("Watching for event logs (Ctrl-C to stop)...");
    }
    while let Some(signal) = client.next_signal().await? {
        match (format, signal) {
            (OutputFormat::Json, Signal::InterfacesAdded { path, interfaces }) => {
                let props = interfaces.get(RECORD_INTERFACE).cloned().unwrap_or_default();
                println!("{}", serde_json::json!({ "added": path.as_str(), "properties": props_json(&props) }));
            }
            (OutputFormat::Json, Signal::InterfacesRemoved { path, .. }) => {
                println!("{}", serde_json::json!({ "removed": path.as_str() }));
            }
            (OutputFormat::Text, Signal::InterfacesAdded { path, interfaces }) => {
                let props = interfaces.get(RECORD_INTERFACE).cloned().unwrap_or_default();
                println!(
                    "{} {}  {} {}",
                    "+".green().bold(),
                    path.as_str(),
                    severity(&text(&props, property::SEVERITY)),
                    text(&props, property::MESSAGE),
                );
            }
            (OutputFormat::Text, Signal::InterfacesRemoved { path, .. }) => {
                println!("{} {}", "-".red().bold(), path.as_str());
            }
        }
    }
    Ok(())
}

fn id_of(values: Vec<Value>) -> anyhow::Result<LogId> {
    match values.as_slice() {
        [Value::U16(raw)] => Ok(LogId::new(*raw)),
        other => anyhow::bail!("unexpected reply {other:?}"),
    }
}

fn print_submitted(log_id: LogId, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "log_id": log_id.get() })),
        OutputFormat::Text if log_id.is_assigned() => {
            println!("{} Logged event {}", "✓".green().bold(), log_id.to_string().yellow());
        }
        OutputFormat::Text => anyhow::bail!("the service could not store the event log"),
    }
    Ok(())
}

fn text(props: &PropertyMap, name: &str) -> String {
    props.get(name).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn severity(level: &str) -> colored::ColoredString {
    match level.to_ascii_lowercase().as_str() {
        "critical" | "error" | "emergency" | "alert" => level.red().bold(),
        "warning" | "warn" => level.yellow(),
        "debug" => level.dimmed(),
        _ => level.green(),
    }
}

fn value_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Str(s) => s.clone().into(),
        Value::Bytes(b) => hex::encode(b).into(),
        Value::U16(v) => (*v).into(),
        Value::U32(v) => (*v).into(),
        Value::Bool(v) => (*v).into(),
        Value::Array(items) => items.iter().map(value_json).collect::<Vec<_>>().into(),
        Value::Dict(map) => props_json(map),
    }
}

fn props_json(props: &PropertyMap) -> serde_json::Value {
    props
        .iter()
        .map(|(k, v)| (k.clone(), value_json(v)))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

fn log_json(log_id: LogId, props: &PropertyMap) -> serde_json::Value {
    let mut json = props_json(props);
    if let Some(map) = json.as_object_mut() {
        map.insert("log_id".into(), log_id.get().into());
    }
    json
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert(property::MESSAGE.into(), "disk fault".into());
        props.insert(property::DEBUG_DATA.into(), Value::Bytes(vec![0x30, 0xFF]));
        props
    }

    #[test]
    fn reply_must_be_one_id() {
        assert_eq!(id_of(vec![Value::U16(4)]).unwrap(), LogId::new(4));
        assert!(id_of(vec![]).is_err());
        assert!(id_of(vec!["4".into()]).is_err());
    }

    #[test]
    fn json_renders_bytes_as_hex() {
        let json = log_json(LogId::new(3), &props());
        assert_eq!(json["log_id"], 3);
        assert_eq!(json["message"], "disk fault");
        assert_eq!(json["debug_data"], "30ff");
    }

    #[test]
    fn missing_text_property_is_empty() {
        assert_eq!(text(&props(), property::SEVERITY), "");
        assert_eq!(text(&props(), property::MESSAGE), "disk fault");
    }

    #[test]
    fn client_calls_follow_the_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("evlog.toml");
        std::fs::write(
            &path,
            "records_root = \"/site/events\"\nservice_name = \"org.example.events\"\nsocket_path = \"/tmp/a.sock\"\n",
        )
        .unwrap();

        let config = load_config(Some(&path), Some(PathBuf::from("/tmp/b.sock"))).unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/b.sock"));
        let service = Service::from_config(&config);
        let call = service.call(service.root.child(LogId::new(5)).unwrap(), DELETE_INTERFACE, method::DELETE);
        assert_eq!(call.path.as_str(), "/site/events/5");
        assert_eq!(call.destination.as_deref(), Some("org.example.events"));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/evlog.toml")), None).is_err());
        assert_eq!(load_config(None, None).unwrap().records_root, ServerConfig::default().records_root);
    }

    #[test]
    fn unassigned_id_is_an_error_in_text_mode() {
        assert!(print_submitted(LogId::UNASSIGNED, OutputFormat::Text).is_err());
        assert!(print_submitted(LogId::new(1), OutputFormat::Json).is_ok());
    }
}
