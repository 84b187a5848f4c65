use std::path::{Path, PathBuf};

use tokio::net::unix::OwnedReadHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use evlog_protocol::{BusMessage, EvlogCodec, MethodError, ProtocolError, PROTOCOL_VERSION};

use crate::bus::BusConnector;
use crate::error::{BusError, BusResult};

/// Outbound frames buffered per connection before the reader stalls.
const OUTBOUND_CAPACITY: usize = 64;

/// Exposes a bus on a Unix domain socket.
///
/// Each connection opens with a `Hello`/`HelloAck` exchange, after which the
/// client may send `Call` frames (answered with `Return` or `Error` carrying
/// the same serial) and a single `Subscribe` to receive signals.
pub struct SocketListener {
    path: PathBuf,
    listener: UnixListener,
    connector: BusConnector,
}

impl SocketListener {
    /// Bind to `path`, replacing a stale socket file left by a previous run.
    pub fn bind(path: impl AsRef<Path>, connector: BusConnector) -> BusResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed stale socket"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let listener = UnixListener::bind(&path)?;
        info!(path = %path.display(), "bus listening");
        Ok(Self {
            path,
            listener,
            connector,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections until the listener fails.
    pub async fn serve(self) -> BusResult<()> {
        loop {
            let (stream, _) = self.listener.accept().await?;
            let connector = self.connector.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, connector).await {
                    warn!(error = %e, "connection closed with error");
                }
            });
        }
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn handle_connection(stream: UnixStream, connector: BusConnector) -> BusResult<()> {
    let (mut reader, mut writer) = stream.into_split();
    let (out_tx, mut out_rx) = mpsc::channel::<BusMessage>(OUTBOUND_CAPACITY);

    let writer_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = EvlogCodec::write_message(&mut writer, &msg).await {
                debug!(error = %e, "connection writer stopped");
                break;
            }
        }
    });

    let mut forwarder = None;
    let result = read_loop(&mut reader, &connector, &out_tx, &mut forwarder).await;
    if let Some(forwarder) = forwarder {
        forwarder.abort();
    }
    drop(out_tx);
    // In-flight replies hold their own sender; the writer ends after the last.
    let _ = writer_task.await;
    result
}

async fn read_loop(
    reader: &mut OwnedReadHalf,
    connector: &BusConnector,
    out: &mpsc::Sender<BusMessage>,
    forwarder: &mut Option<JoinHandle<()>>,
) -> BusResult<()> {
    match EvlogCodec::read_message(reader).await? {
        Some(BusMessage::Hello { version }) if version == PROTOCOL_VERSION => {
            send(
                out,
                BusMessage::HelloAck {
                    version: PROTOCOL_VERSION,
                    names: connector.names(),
                },
            )
            .await?;
        }
        Some(BusMessage::Hello { version }) => {
            return Err(ProtocolError::VersionMismatch {
                local: PROTOCOL_VERSION,
                remote: version,
            }
            .into())
        }
        Some(other) => return Err(ProtocolError::UnexpectedMessage(other.type_name()).into()),
        None => return Ok(()),
    }
    debug!("client connected");

    while let Some(msg) = EvlogCodec::read_message(reader).await? {
        match msg {
            BusMessage::Call { serial, call } => {
                // Submitted here so calls reach the bus in arrival order.
                let reply = connector.submit(call).await?;
                let out = out.clone();
                tokio::spawn(async move {
                    let msg = match reply.await {
                        Ok(Ok(values)) => BusMessage::Return { serial, values },
                        Ok(Err(error)) => BusMessage::Error { serial, error },
                        Err(_) => BusMessage::Error {
                            serial,
                            error: MethodError::failed("bus went away before replying"),
                        },
                    };
                    let _ = out.send(msg).await;
                });
            }
            BusMessage::Subscribe if forwarder.is_none() => {
                let mut signals = connector.subscribe();
                let out = out.clone();
                *forwarder = Some(tokio::spawn(async move {
                    loop {
                        match signals.recv().await {
                            Ok(signal) => {
                                if out.send(BusMessage::Signal(signal)).await.is_err() {
                                    break;
                                }
                            }
                            Err(RecvError::Lagged(missed)) => {
                                warn!(missed, "subscriber lagged, signals dropped");
                            }
                            Err(RecvError::Closed) => break,
                        }
                    }
                }));
            }
            BusMessage::Subscribe => {}
            other => return Err(ProtocolError::UnexpectedMessage(other.type_name()).into()),
        }
    }
    debug!("client disconnected");
    Ok(())
}

async fn send(out: &mpsc::Sender<BusMessage>, msg: BusMessage) -> BusResult<()> {
    out.send(msg).await.map_err(|_| BusError::Disconnected)
}
