use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{BusMessage, MAX_MESSAGE_SIZE};

/// Codec for encoding/decoding bus messages.
pub struct EvlogCodec;

impl EvlogCodec {
    /// Encode a message with framing: [4 bytes len][1 byte tag][payload]
    pub fn encode(msg: &BusMessage) -> ProtocolResult<Vec<u8>> {
        let payload = bincode::serialize(msg)
            .map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let len = (payload.len() + 1) as u32;
        let mut buf = Vec::with_capacity(4 + 1 + payload.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.push(msg.type_tag());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Decode a framed message. Returns (message, bytes_consumed).
    pub fn decode(data: &[u8]) -> ProtocolResult<(BusMessage, usize)> {
        if data.len() < 5 {
            return Err(ProtocolError::FramingError("too short".into()));
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        Self::check_length(len)?;
        let total = 4 + len;
        if data.len() < total {
            return Err(ProtocolError::FramingError(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }
        let msg = Self::decode_body(&data[4..total])?;
        Ok((msg, total))
    }

    /// Read one framed message from an async stream.
    ///
    /// Returns `Ok(None)` if the stream ends cleanly before a frame starts.
    pub async fn read_message<R>(reader: &mut R) -> ProtocolResult<Option<BusMessage>>
    where
        R: AsyncRead + Unpin,
    {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        Self::check_length(len)?;

        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        Self::decode_body(&body).map(Some)
    }

    /// Write one framed message to an async stream and flush it.
    pub async fn write_message<W>(writer: &mut W, msg: &BusMessage) -> ProtocolResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = Self::encode(msg)?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    fn check_length(len: usize) -> ProtocolResult<()> {
        if len < 1 {
            return Err(ProtocolError::FramingError("zero-length frame".into()));
        }
        if len - 1 > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: len - 1,
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(())
    }

    /// Decode `[tag][payload]`, checking the tag against the decoded message.
    fn decode_body(body: &[u8]) -> ProtocolResult<BusMessage> {
        let tag = body[0];
        let msg: BusMessage = bincode::deserialize(&body[1..])
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
        if msg.type_tag() != tag {
            return Err(ProtocolError::InvalidMessageType(tag));
        }
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::*;
    use evlog_types::ObjectPath;

    fn call() -> BusMessage {
        BusMessage::Call {
            serial: 7,
            call: MethodCall::new(
                ObjectPath::new("/org/openbmc/records/events").unwrap(),
                "org.openbmc.recordlog",
                "acceptHostMessage",
            )
            .with_args(vec![
                "disk fault".into(),
                "Critical".into(),
                "/sensors/temp0".into(),
                vec![0xAAu8, 0xBB].into(),
            ]),
        }
    }

    #[test]
    fn call_survives_framing() {
        let msg = call();
        let encoded = EvlogCodec::encode(&msg).unwrap();
        let (decoded, consumed) = EvlogCodec::decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, msg);
    }

    #[test]
    fn decode_consumes_one_frame_of_many() {
        let mut data = EvlogCodec::encode(&BusMessage::Subscribe).unwrap();
        let first_len = data.len();
        data.extend(EvlogCodec::encode(&call()).unwrap());
        let (first, consumed) = EvlogCodec::decode(&data).unwrap();
        assert_eq!(first, BusMessage::Subscribe);
        assert_eq!(consumed, first_len);
        let (second, _) = EvlogCodec::decode(&data[consumed..]).unwrap();
        assert_eq!(second.type_name(), "Call");
    }

    #[test]
    fn decode_truncated() {
        let err = EvlogCodec::decode(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));

        let encoded = EvlogCodec::encode(&call()).unwrap();
        let err = EvlogCodec::decode(&encoded[..encoded.len() - 2]).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn decode_zero_length() {
        let data = [0u8, 0, 0, 0, 0];
        let err = EvlogCodec::decode(&data).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn decode_oversized_length() {
        let len = (MAX_MESSAGE_SIZE as u32 + 2).to_be_bytes();
        let data = [len[0], len[1], len[2], len[3], 3];
        let err = EvlogCodec::decode(&data).unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooLarge { .. }));
    }

    #[test]
    fn decode_rejects_mismatched_tag() {
        let mut encoded = EvlogCodec::encode(&BusMessage::Subscribe).unwrap();
        encoded[4] = 1;
        let err = EvlogCodec::decode(&encoded).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessageType(1)));
    }

    #[tokio::test]
    async fn stream_read_write() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        EvlogCodec::write_message(&mut client, &call()).await.unwrap();
        EvlogCodec::write_message(&mut client, &BusMessage::Subscribe).await.unwrap();
        drop(client);

        let first = EvlogCodec::read_message(&mut server).await.unwrap();
        assert_eq!(first, Some(call()));
        let second = EvlogCodec::read_message(&mut server).await.unwrap();
        assert_eq!(second, Some(BusMessage::Subscribe));
        let end = EvlogCodec::read_message(&mut server).await.unwrap();
        assert_eq!(end, None);
    }
}
