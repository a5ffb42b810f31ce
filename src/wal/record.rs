//! WAL record format
//!
//! ```text
//! +------------------+
//! | Record Length    | (u32 LE, whole record including this field)
//! +------------------+
//! | Record Type      | (u8)
//! +------------------+
//! | Sequence Number  | (u64 LE)
//! +------------------+
//! | Episode ID       | (length-prefixed string)
//! +------------------+
//! | Episode Body     | (length-prefixed bytes, JSON)
//! +------------------+
//! | Checksum         | (u32 LE)
//! +------------------+
//! ```
//!
//! Checksum covers all bytes except the checksum itself.

use std::io::{self, Cursor, Read};

use super::checksum::compute_checksum;
use crate::model::Episode;

/// Minimum encoded size: len + type + seq + id len + body len + checksum.
pub(crate) const MIN_RECORD_SIZE: u64 = 4 + 1 + 8 + 4 + 4 + 4;

/// WAL record types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// A complete episode with all of its steps
    EpisodeCommit = 1,
}

impl RecordType {
    /// Convert from u8, returns None for invalid values
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(RecordType::EpisodeCommit),
            _ => None,
        }
    }
}

/// Payload of a commit record: the stored episode, fully assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalPayload {
    pub episode_id: String,
    pub episode_body: Vec<u8>,
}

impl WalPayload {
    pub fn new(episode_id: impl Into<String>, episode_body: Vec<u8>) -> Self {
        Self {
            episode_id: episode_id.into(),
            episode_body,
        }
    }

    /// Encodes a stored episode.
    pub fn from_episode(episode: &Episode) -> serde_json::Result<Self> {
        Ok(Self::new(episode.id.as_str(), serde_json::to_vec(episode)?))
    }

    /// Decodes the episode carried by this payload.
    pub fn decode_episode(&self) -> serde_json::Result<Episode> {
        serde_json::from_slice(&self.episode_body)
    }
}

/// A complete WAL record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    pub record_type: RecordType,
    pub sequence_number: u64,
    pub payload: WalPayload,
}

impl WalRecord {
    pub fn new(record_type: RecordType, sequence_number: u64, payload: WalPayload) -> Self {
        Self {
            record_type,
            sequence_number,
            payload,
        }
    }

    /// Serializes the record, length prefix and checksum included.
    pub fn serialize(&self) -> Vec<u8> {
        let id = self.payload.episode_id.as_bytes();
        let body = &self.payload.episode_body;
        let total = MIN_RECORD_SIZE as usize + id.len() + body.len();

        let mut buf = Vec::with_capacity(total);
        buf.extend_from_slice(&(total as u32).to_le_bytes());
        buf.push(self.record_type as u8);
        buf.extend_from_slice(&self.sequence_number.to_le_bytes());
        buf.extend_from_slice(&(id.len() as u32).to_le_bytes());
        buf.extend_from_slice(id);
        buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
        buf.extend_from_slice(body);

        let checksum = compute_checksum(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Parses one record from the start of `data`.
    ///
    /// Returns the record and the number of bytes consumed. Fails on a
    /// checksum mismatch, an unknown record type, or a malformed body.
    pub fn deserialize(data: &[u8]) -> io::Result<(Self, usize)> {
        if (data.len() as u64) < MIN_RECORD_SIZE {
            return Err(invalid(format!("record too short: {} bytes", data.len())));
        }

        let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if length < MIN_RECORD_SIZE as usize || length > data.len() {
            return Err(invalid(format!("invalid record length {}", length)));
        }

        let (content, checksum_bytes) = data[..length].split_at(length - 4);
        let stored = u32::from_le_bytes([
            checksum_bytes[0],
            checksum_bytes[1],
            checksum_bytes[2],
            checksum_bytes[3],
        ]);
        let computed = compute_checksum(content);
        if stored != computed {
            return Err(invalid(format!(
                "checksum mismatch: stored {:#010x}, computed {:#010x}",
                stored, computed
            )));
        }

        let mut cursor = Cursor::new(&content[4..]);

        let mut type_buf = [0u8; 1];
        cursor.read_exact(&mut type_buf)?;
        let record_type = RecordType::from_u8(type_buf[0])
            .ok_or_else(|| invalid(format!("unknown record type {}", type_buf[0])))?;

        let mut seq_buf = [0u8; 8];
        cursor.read_exact(&mut seq_buf)?;
        let sequence_number = u64::from_le_bytes(seq_buf);

        let id_bytes = read_prefixed(&mut cursor)?;
        let episode_id = String::from_utf8(id_bytes)
            .map_err(|e| invalid(format!("episode id is not UTF-8: {}", e)))?;
        let episode_body = read_prefixed(&mut cursor)?;

        if cursor.position() as usize != content.len() - 4 {
            return Err(invalid("trailing bytes inside record"));
        }

        Ok((
            Self::new(
                record_type,
                sequence_number,
                WalPayload::new(episode_id, episode_body),
            ),
            length,
        ))
    }
}

fn read_prefixed(cursor: &mut Cursor<&[u8]>) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    cursor.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    Ok(buf)
}

fn invalid(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WalRecord {
        WalRecord::new(
            RecordType::EpisodeCommit,
            7,
            WalPayload::new("ep-1", br#"{"id":"ep-1"}"#.to_vec()),
        )
    }

    #[test]
    fn test_length_prefix_matches_encoding() {
        let bytes = sample().serialize();
        let length = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(length, bytes.len());

        let (decoded, consumed) = WalRecord::deserialize(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_corrupted_body_fails_checksum() {
        let mut bytes = sample().serialize();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        let err = WalRecord::deserialize(&bytes).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_unknown_record_type_rejected() {
        let mut bytes = sample().serialize();
        bytes[4] = 9;
        // Re-seal so only the type is wrong
        let len = bytes.len();
        let checksum = compute_checksum(&bytes[..len - 4]);
        bytes[len - 4..].copy_from_slice(&checksum.to_le_bytes());
        let err = WalRecord::deserialize(&bytes).unwrap_err();
        assert!(err.to_string().contains("unknown record type"));
    }

    #[test]
    fn test_truncated_record_rejected() {
        let bytes = sample().serialize();
        assert!(WalRecord::deserialize(&bytes[..bytes.len() - 1]).is_err());
    }
}
