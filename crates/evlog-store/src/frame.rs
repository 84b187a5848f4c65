//! On-disk framing of a single record.
//!
//! ```text
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode-serialized EventRecord)]
//! ```

use evlog_types::{EventRecord, LogId};

use crate::error::{StoreError, StoreResult};

/// Header size: 4 bytes length + 4 bytes CRC.
pub const HEADER_SIZE: usize = 8;

/// Serialize and frame a record.
pub fn encode_record(record: &EventRecord) -> StoreResult<Vec<u8>> {
    let payload =
        bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| StoreError::Serialization(format!("record too large: {} bytes", payload.len())))?;
    let crc = crc32fast::hash(&payload);

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&length.to_le_bytes());
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Verify and decode a framed record stored under `log_id`.
///
/// The decoded record must carry the identifier it was stored under.
pub fn decode_record(log_id: LogId, data: &[u8]) -> StoreResult<EventRecord> {
    let corrupt = |reason: String| StoreError::Corrupt { log_id, reason };

    if data.len() < HEADER_SIZE {
        return Err(corrupt(format!("truncated header: {} bytes", data.len())));
    }
    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let expected_crc = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);

    let payload = &data[HEADER_SIZE..];
    if payload.len() != length {
        return Err(corrupt(format!(
            "length mismatch: header says {length}, found {}",
            payload.len()
        )));
    }

    let actual_crc = crc32fast::hash(payload);
    if actual_crc != expected_crc {
        return Err(corrupt(format!(
            "CRC mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"
        )));
    }

    let record: EventRecord =
        bincode::deserialize(payload).map_err(|e| corrupt(e.to_string()))?;
    if record.log_id != log_id {
        return Err(corrupt(format!("file holds log {}", record.log_id)));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(id: u16) -> EventRecord {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        EventRecord::draft("fan failure", "Warning", "/sensors/fan1", "Host", vec![1, 2, 3])
            .assigned(LogId::new(id), ts)
    }

    #[test]
    fn decodes_what_it_encodes() {
        let rec = record(4);
        let bytes = encode_record(&rec).unwrap();
        assert_eq!(decode_record(LogId::new(4), &bytes).unwrap(), rec);
    }

    #[test]
    fn detects_flipped_payload_byte() {
        let mut bytes = encode_record(&record(4)).unwrap();
        bytes[HEADER_SIZE] ^= 0xFF;
        let err = decode_record(LogId::new(4), &bytes).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn detects_truncation() {
        let bytes = encode_record(&record(4)).unwrap();
        let err = decode_record(LogId::new(4), &bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        let err = decode_record(LogId::new(4), &bytes[..3]).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn rejects_record_under_wrong_id() {
        let bytes = encode_record(&record(4)).unwrap();
        let err = decode_record(LogId::new(5), &bytes).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
