//! Data file record formats
//!
//! Both data files use the same frame:
//!
//! ```text
//! +------------------+
//! | Record Length    | (u32 LE, whole frame including this field)
//! +------------------+
//! | Body             | (record specific)
//! +------------------+
//! | Checksum         | (u32 LE, over length + body)
//! +------------------+
//! ```
//!
//! Step body: `step_index` (u64 LE), episode id (length-prefixed string),
//! step JSON (length-prefixed bytes).
//!
//! Episode body: commit sequence (u64 LE), header JSON (length-prefixed bytes).

use std::io::{self, Cursor, Read};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::index::{EpisodeKey, IndexEntry, IndexRecord};
use crate::model::{Episode, EpisodeId, EpisodeStatus, EpisodeSummary, Step, Totals};
use crate::mvcc::CommitId;
use crate::wal::compute_checksum;

/// Frame overhead: length prefix + checksum.
pub(crate) const FRAME_OVERHEAD: u64 = 8;

/// One step, as stored in the step data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub episode_id: String,
    pub step_index: u64,
    pub body: Vec<u8>,
}

impl StepRecord {
    pub fn from_step(episode_id: &EpisodeId, step: &Step) -> serde_json::Result<Self> {
        Ok(Self {
            episode_id: episode_id.as_str().to_string(),
            step_index: step.step_index,
            body: serde_json::to_vec(step)?,
        })
    }

    pub fn decode_step(&self) -> serde_json::Result<Step> {
        serde_json::from_slice(&self.body)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(16 + self.episode_id.len() + self.body.len());
        body.extend_from_slice(&self.step_index.to_le_bytes());
        put_prefixed(&mut body, self.episode_id.as_bytes());
        put_prefixed(&mut body, &self.body);
        frame(&body)
    }

    /// Parses a complete frame.
    pub fn deserialize(data: &[u8]) -> io::Result<Self> {
        let mut cursor = Cursor::new(unframe(data)?);
        let step_index = read_u64(&mut cursor)?;
        let episode_id = read_string(&mut cursor)?;
        let body = read_prefixed(&mut cursor)?;
        expect_consumed(&cursor)?;
        Ok(Self {
            episode_id,
            step_index,
            body,
        })
    }
}

/// One episode header, as stored in the episode data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeRecord {
    pub commit_sequence: u64,
    pub header: Vec<u8>,
}

impl EpisodeRecord {
    pub fn new(commit_sequence: u64, header: &EpisodeHeader) -> serde_json::Result<Self> {
        Ok(Self {
            commit_sequence,
            header: serde_json::to_vec(header)?,
        })
    }

    pub fn decode_header(&self) -> serde_json::Result<EpisodeHeader> {
        serde_json::from_slice(&self.header)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(12 + self.header.len());
        body.extend_from_slice(&self.commit_sequence.to_le_bytes());
        put_prefixed(&mut body, &self.header);
        frame(&body)
    }

    /// Parses a complete frame.
    pub fn deserialize(data: &[u8]) -> io::Result<Self> {
        let mut cursor = Cursor::new(unframe(data)?);
        let commit_sequence = read_u64(&mut cursor)?;
        let header = read_prefixed(&mut cursor)?;
        expect_consumed(&cursor)?;
        Ok(Self {
            commit_sequence,
            header,
        })
    }
}

/// Everything about an episode except its step bodies.
///
/// Listing and index rebuild read only headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeHeader {
    pub id: EpisodeId,
    pub agent_id: String,
    pub status: EpisodeStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub totals: Totals,
    /// Distinct step models, first-use order
    #[serde(default)]
    pub models: Vec<String>,
    /// Distinct step providers, first-use order
    #[serde(default)]
    pub providers: Vec<String>,
    /// Offsets of the step records in the step data file, in `step_index` order
    pub step_offsets: Vec<u64>,
}

impl EpisodeHeader {
    pub fn new(episode: &Episode, step_offsets: Vec<u64>) -> Self {
        let mut models: Vec<String> = Vec::new();
        let mut providers: Vec<String> = Vec::new();
        for step in &episode.steps {
            push_distinct(&mut models, step.model.as_deref());
            push_distinct(&mut providers, step.provider.as_deref());
        }

        Self {
            id: episode.id.clone(),
            agent_id: episode.agent_id.clone(),
            status: episode.status,
            created_at: episode.created_at,
            metadata: episode.metadata.clone(),
            totals: episode.totals(),
            models,
            providers,
            step_offsets,
        }
    }

    pub fn summary(&self) -> EpisodeSummary {
        EpisodeSummary {
            id: self.id.clone(),
            agent_id: self.agent_id.clone(),
            status: self.status,
            created_at: self.created_at,
            metadata: self.metadata.clone(),
            totals: self.totals.clone(),
        }
    }

    pub fn key(&self) -> EpisodeKey {
        EpisodeKey::new(self.created_at, self.id.clone())
    }

    /// Builds the index record for this header stored at `offset`.
    pub fn index_record(&self, offset: u64, commit: CommitId) -> IndexRecord {
        IndexRecord {
            key: self.key(),
            entry: IndexEntry { offset, commit },
            agent_id: self.agent_id.clone(),
            status: self.status,
            models: self.models.clone(),
            providers: self.providers.clone(),
            tools: self.totals.tools_used.clone(),
        }
    }

    /// Reassembles the episode from its header and decoded steps.
    pub fn into_episode(self, steps: Vec<Step>) -> Episode {
        Episode {
            id: self.id,
            agent_id: self.agent_id,
            status: self.status,
            created_at: self.created_at,
            steps,
            metadata: self.metadata,
        }
    }
}

fn push_distinct(values: &mut Vec<String>, value: Option<&str>) {
    if let Some(v) = value {
        if !values.iter().any(|existing| existing == v) {
            values.push(v.to_string());
        }
    }
}

fn frame(body: &[u8]) -> Vec<u8> {
    let total = body.len() + FRAME_OVERHEAD as usize;
    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&(total as u32).to_le_bytes());
    buf.extend_from_slice(body);
    let checksum = compute_checksum(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    buf
}

/// Verifies a complete frame and returns its body.
fn unframe(data: &[u8]) -> io::Result<&[u8]> {
    if (data.len() as u64) < FRAME_OVERHEAD {
        return Err(invalid(format!("record too short: {} bytes", data.len())));
    }
    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if length != data.len() {
        return Err(invalid(format!(
            "record length {} does not match frame size {}",
            length,
            data.len()
        )));
    }
    let (content, checksum_bytes) = data.split_at(length - 4);
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
    Ok(&content[4..])
}

fn put_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn read_u64(cursor: &mut Cursor<&[u8]>) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    cursor.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_prefixed(cursor: &mut Cursor<&[u8]>) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    cursor.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let remaining = cursor.get_ref().len() - cursor.position() as usize;
    if len > remaining {
        return Err(invalid(format!("field length {} exceeds record", len)));
    }
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> io::Result<String> {
    String::from_utf8(read_prefixed(cursor)?)
        .map_err(|e| invalid(format!("invalid UTF-8: {}", e)))
}

fn expect_consumed(cursor: &Cursor<&[u8]>) -> io::Result<()> {
    if cursor.position() as usize == cursor.get_ref().len() {
        Ok(())
    } else {
        Err(invalid("trailing bytes inside record"))
    }
}

fn invalid(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EpisodeDraft, StepKind};

    fn episode() -> Episode {
        EpisodeDraft::new("a1", EpisodeStatus::Success)
            .with_step(Step::llm_call(0, "gpt-4", Some("openai")).with_tokens(150))
            .with_step(Step::tool_call(1, "web_search").with_tokens(200))
            .with_step(Step::llm_call(2, "gpt-4", Some("openai")))
            .with_step(Step::new(3, StepKind::Decision))
            .into_episode(EpisodeId::new("e1"), Utc::now())
    }

    #[test]
    fn test_step_record_frame() {
        let ep = episode();
        let record = StepRecord::from_step(&ep.id, &ep.steps[1]).unwrap();
        let bytes = record.serialize();
        let decoded = StepRecord::deserialize(&bytes).unwrap();
        assert_eq!(decoded.episode_id, "e1");
        assert_eq!(decoded.step_index, 1);
        assert_eq!(decoded.decode_step().unwrap(), ep.steps[1]);
    }

    #[test]
    fn test_episode_record_detects_bit_flip() {
        let header = EpisodeHeader::new(&episode(), vec![0, 64, 128, 192]);
        let mut bytes = EpisodeRecord::new(9, &header).unwrap().serialize();
        let last_body_byte = bytes.len() - 5;
        bytes[last_body_byte] ^= 0x01;
        let err = EpisodeRecord::deserialize(&bytes).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_header_collects_distinct_step_fields() {
        let header = EpisodeHeader::new(&episode(), vec![]);
        assert_eq!(header.models, vec!["gpt-4"]);
        assert_eq!(header.providers, vec!["openai"]);
        assert_eq!(header.totals.tools_used, vec!["web_search"]);
        assert_eq!(header.totals.total_tokens, 350);

        let record = header.index_record(42, CommitId::new(3));
        assert_eq!(record.entry.offset, 42);
        assert_eq!(record.tools, vec!["web_search"]);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let header = EpisodeHeader::new(&episode(), vec![]);
        let bytes = EpisodeRecord::new(1, &header).unwrap().serialize();
        assert!(EpisodeRecord::deserialize(&bytes[..bytes.len() - 2]).is_err());
    }
}
