use std::collections::VecDeque;
use std::path::Path;

use async_trait::async_trait;
use tokio::net::UnixStream;
use tracing::debug;

use evlog_protocol::{BusMessage, EvlogCodec, MethodCall, ProtocolError, Signal, Value, PROTOCOL_VERSION};

use crate::client::BusCaller;
use crate::error::{BusError, BusResult};

/// A client connected to a [`SocketListener`](crate::SocketListener).
///
/// Calls are sequential: each waits for the reply with its serial. Signals
/// that arrive meanwhile are queued for [`next_signal`](BusCaller::next_signal).
pub struct RemoteClient {
    stream: UnixStream,
    next_serial: u32,
    names: Vec<String>,
    subscribed: bool,
    queued: VecDeque<Signal>,
}

impl RemoteClient {
    /// Connect and perform the `Hello` handshake.
    pub async fn connect(path: impl AsRef<Path>) -> BusResult<Self> {
        let mut stream = UnixStream::connect(path.as_ref()).await?;
        EvlogCodec::write_message(&mut stream, &BusMessage::Hello { version: PROTOCOL_VERSION }).await?;
        let names = match EvlogCodec::read_message(&mut stream).await? {
            Some(BusMessage::HelloAck { version, names }) if version == PROTOCOL_VERSION => names,
            Some(BusMessage::HelloAck { version, .. }) => {
                return Err(ProtocolError::VersionMismatch {
                    local: PROTOCOL_VERSION,
                    remote: version,
                }
                .into())
            }
            Some(other) => return Err(ProtocolError::UnexpectedMessage(other.type_name()).into()),
            None => return Err(BusError::Disconnected),
        };
        debug!(path = %path.as_ref().display(), ?names, "connected to bus");
        Ok(Self {
            stream,
            next_serial: 1,
            names,
            subscribed: false,
            queued: VecDeque::new(),
        })
    }

    /// Well-known names the bus owned at connect time.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    async fn read(&mut self) -> BusResult<BusMessage> {
        EvlogCodec::read_message(&mut self.stream)
            .await?
            .ok_or(BusError::Disconnected)
    }
}

#[async_trait]
impl BusCaller for RemoteClient {
    async fn call(&mut self, call: MethodCall) -> BusResult<Vec<Value>> {
        let serial = self.next_serial;
        self.next_serial = self.next_serial.wrapping_add(1).max(1);
        EvlogCodec::write_message(&mut self.stream, &BusMessage::Call { serial, call }).await?;

        loop {
            match self.read().await? {
                BusMessage::Return { serial: s, values } if s == serial => return Ok(values),
                BusMessage::Error { serial: s, error } if s == serial => return Err(BusError::Method(error)),
                BusMessage::Signal(signal) => self.queued.push_back(signal),
                other => {
                    return Err(BusError::UnexpectedReply(format!(
                        "{} while waiting for reply {serial}",
                        other.type_name()
                    )))
                }
            }
        }
    }

    async fn subscribe(&mut self) -> BusResult<()> {
        if !self.subscribed {
            EvlogCodec::write_message(&mut self.stream, &BusMessage::Subscribe).await?;
            self.subscribed = true;
        }
        Ok(())
    }

    async fn next_signal(&mut self) -> BusResult<Option<Signal>> {
        if !self.subscribed {
            return Err(BusError::NotSubscribed);
        }
        if let Some(signal) = self.queued.pop_front() {
            return Ok(Some(signal));
        }
        match EvlogCodec::read_message(&mut self.stream).await? {
            Some(BusMessage::Signal(signal)) => Ok(Some(signal)),
            Some(other) => Err(BusError::UnexpectedReply(other.type_name().to_string())),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("names", &self.names)
            .field("subscribed", &self.subscribed)
            .field("queued", &self.queued.len())
            .finish()
    }
}
