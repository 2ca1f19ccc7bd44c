//! Session log record framing
//!
//! Each record on disk:
//!
//! ```text
//! +------------------+
//! | Record Length    | (u32 LE, whole record including this field)
//! +------------------+
//! | Message Kind     | (u8)
//! +------------------+
//! | Sequence Number  | (u64 LE)
//! +------------------+
//! | Timestamp        | (i64 LE, ms)
//! +------------------+
//! | Payload          | (u32 LE length + JSON bytes)
//! +------------------+
//! | Checksum         | (u32 LE, CRC32 of all preceding bytes)
//! +------------------+
//! ```

use std::io::{self, Cursor, Read};

use super::checksum::{compute_checksum, verify_checksum};
use super::entry::{LogEntry, MessageKind, Payload};
use super::errors::{SessionLogError, SessionLogResult};

/// Smallest possible record: header, empty payload, checksum
pub const MIN_RECORD_SIZE: usize = 4 + 1 + 8 + 8 + 4 + 4;

/// A framed record whose payload has not been decoded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Kind tag
    pub kind: MessageKind,
    /// Sequence number
    pub sequence_number: u64,
    /// Timestamp in ms
    pub timestamp: i64,
    /// Encoded payload bytes
    pub payload: Vec<u8>,
}

impl SessionRecord {
    /// Frames an entry.
    pub fn from_entry(entry: &LogEntry) -> SessionLogResult<Self> {
        Ok(Self {
            kind: entry.kind(),
            sequence_number: entry.sequence(),
            timestamp: entry.timestamp(),
            payload: entry.payload().encode()?,
        })
    }

    /// Decodes the payload back into an entry.
    pub fn into_entry(self) -> SessionLogResult<LogEntry> {
        let payload = Payload::decode(self.kind, self.sequence_number, &self.payload)?;
        LogEntry::new(self.sequence_number, self.timestamp, self.kind, payload)
    }

    /// Serializes the record with its trailing checksum.
    pub fn serialize(&self) -> Vec<u8> {
        let total = MIN_RECORD_SIZE + self.payload.len();
        let mut buf = Vec::with_capacity(total);

        buf.extend_from_slice(&(total as u32).to_le_bytes());
        buf.push(self.kind.as_u8());
        buf.extend_from_slice(&self.sequence_number.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);

        let checksum = compute_checksum(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Deserializes one record from the start of `data`.
    ///
    /// Returns the record and the number of bytes consumed.
    pub fn deserialize(data: &[u8]) -> SessionLogResult<(Self, usize)> {
        if data.len() < MIN_RECORD_SIZE {
            return Err(SessionLogError::corruption(format!(
                "Record too short: {} bytes",
                data.len()
            )));
        }

        let mut cursor = Cursor::new(data);
        let total = read_u32(&mut cursor)? as usize;
        if total < MIN_RECORD_SIZE || total > data.len() {
            return Err(SessionLogError::corruption(format!(
                "Invalid record length {} (available {})",
                total,
                data.len()
            )));
        }

        let checksum_offset = total - 4;
        let stored_checksum = u32::from_le_bytes([
            data[checksum_offset],
            data[checksum_offset + 1],
            data[checksum_offset + 2],
            data[checksum_offset + 3],
        ]);
        if !verify_checksum(&data[..checksum_offset], stored_checksum) {
            return Err(SessionLogError::corruption("Checksum mismatch"));
        }

        let mut kind_buf = [0u8; 1];
        cursor.read_exact(&mut kind_buf).map_err(truncated)?;
        let kind = MessageKind::from_u8(kind_buf[0]).ok_or_else(|| {
            SessionLogError::corruption(format!("Unknown message kind {}", kind_buf[0]))
        })?;

        let mut u64_buf = [0u8; 8];
        cursor.read_exact(&mut u64_buf).map_err(truncated)?;
        let sequence_number = u64::from_le_bytes(u64_buf);
        cursor.read_exact(&mut u64_buf).map_err(truncated)?;
        let timestamp = i64::from_le_bytes(u64_buf);

        let payload_len = read_u32(&mut cursor)? as usize;
        if payload_len != total - MIN_RECORD_SIZE {
            return Err(SessionLogError::corruption_at_sequence(
                sequence_number,
                format!(
                    "Payload length {} disagrees with record length {}",
                    payload_len, total
                ),
            ));
        }
        let mut payload = vec![0u8; payload_len];
        cursor.read_exact(&mut payload).map_err(truncated)?;

        Ok((
            Self {
                kind,
                sequence_number,
                timestamp,
                payload,
            },
            total,
        ))
    }
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> SessionLogResult<u32> {
    let mut buf = [0u8; 4];
    cursor.read_exact(&mut buf).map_err(truncated)?;
    Ok(u32::from_le_bytes(buf))
}

fn truncated(e: io::Error) -> SessionLogError {
    SessionLogError::corruption(format!("Truncated record: {}", e))
}
