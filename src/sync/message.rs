//! Peer wire messages and local notifications.
//!
//! Messages travel as one JSON object per line.

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::error::{CacheError, Result};
use crate::sync::{Operation, PeerRecord};

/// Upper bound on one line. A `cache-sync` frame carries the whole store, so
/// this is well above the single value limit.
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

// == Payloads ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_id: Uuid,
    pub advertised_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEntry {
    pub key: String,
    pub value: Value,
}

/// Full snapshot of a node's store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSync {
    pub origin_node_id: Uuid,
    pub timestamp: u64,
    /// In snapshot order (most relevant first)
    pub entries: Vec<SyncEntry>,
}

// == Peer Message ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum PeerMessage {
    RegisterNode(NodeInfo),
    CacheSync(CacheSync),
    CacheOperation(Operation),
    /// Ask the receiver for a `cache-sync` on this connection.
    RequestSync,
}

impl PeerMessage {
    pub fn name(&self) -> &'static str {
        match self {
            PeerMessage::RegisterNode(_) => "register-node",
            PeerMessage::CacheSync(_) => "cache-sync",
            PeerMessage::CacheOperation(_) => "cache-operation",
            PeerMessage::RequestSync => "request-sync",
        }
    }
}

// == Notification ==
/// Events published to local subscribers (dashboards, tests).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum Notification {
    NodeListUpdate {
        peers: Vec<PeerRecord>,
        /// Connected peers plus this node
        total_count: usize,
        self_id: Uuid,
    },
    SyncStatusChange {
        enabled: bool,
        node_id: Uuid,
    },
}

// == Framing ==
/// One line read off a peer connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Line(Vec<u8>),
    /// A line longer than [`MAX_FRAME_BYTES`]. Its bytes were discarded.
    Oversized(usize),
}

impl Frame {
    pub fn decode(&self) -> Result<PeerMessage> {
        match self {
            Frame::Line(bytes) => decode(bytes),
            Frame::Oversized(len) => Err(CacheError::RemoteOperation(format!(
                "frame of {len} bytes exceeds {MAX_FRAME_BYTES}"
            ))),
        }
    }
}

/// Reads the next non-empty line. `Ok(None)` on a clean end of stream.
///
/// Never buffers more than [`MAX_FRAME_BYTES`] of a line: the rest of an
/// oversized line is skipped up to its newline.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Frame>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let mut discarded = 0usize;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if discarded > 0 {
                return Ok(Some(Frame::Oversized(discarded)));
            }
            let trimmed = trim_line_end(&line);
            return Ok((!trimmed.is_empty()).then(|| Frame::Line(trimmed.to_vec())));
        }

        let (chunk, used, complete) = match available.iter().position(|b| *b == b'\n') {
            Some(i) => (&available[..i], i + 1, true),
            None => (available, available.len(), false),
        };
        if discarded > 0 || line.len() + chunk.len() > MAX_FRAME_BYTES {
            discarded += line.len() + chunk.len();
            line.clear();
        } else {
            line.extend_from_slice(chunk);
        }
        reader.consume(used);

        if complete {
            if discarded > 0 {
                return Ok(Some(Frame::Oversized(discarded)));
            }
            let trimmed = trim_line_end(&line);
            if !trimmed.is_empty() {
                return Ok(Some(Frame::Line(trimmed.to_vec())));
            }
            line.clear();
        }
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| *b != b'\r' && *b != b'\n')
        .map_or(0, |i| i + 1);
    &line[..end]
}

/// Parses one frame. A bad frame, including one that is not UTF-8, is a
/// rejected remote operation, not a connection failure.
pub fn decode(frame: &[u8]) -> Result<PeerMessage> {
    serde_json::from_slice(frame).map_err(|e| CacheError::RemoteOperation(e.to_string()))
}

pub async fn write_message<W>(writer: &mut W, message: &PeerMessage) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded = serde_json::to_vec(message)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::OperationKind;
    use serde_json::json;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_frames_over_duplex() {
        let (mut writer, reader) = tokio::io::duplex(4096);
        let mut reader = BufReader::new(reader);
        let sent = PeerMessage::CacheOperation(Operation::new(
            OperationKind::Set {
                key: "k".into(),
                value: json!([1, 2]),
            },
            Uuid::new_v4(),
        ));

        write_message(&mut writer, &sent).await.unwrap();
        write_message(&mut writer, &PeerMessage::RequestSync).await.unwrap();
        drop(writer);

        let first = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(first.decode().unwrap(), sent);
        let second = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(second.decode().unwrap(), PeerMessage::RequestSync);
        assert_eq!(read_frame(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blank_lines_skipped() {
        let data: &[u8] = b"\n\r\n{\"event\":\"request-sync\"}\n";
        let mut reader = BufReader::new(data);

        let frame = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(frame.decode().unwrap(), PeerMessage::RequestSync);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_a_frame_not_an_io_error() {
        let data: &[u8] = b"\xff\xfe garbage\r\n{\"event\":\"request-sync\"}";
        let mut reader = BufReader::new(data);

        let bad = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(bad, Frame::Line(b"\xff\xfe garbage".to_vec()));
        assert!(matches!(bad.decode(), Err(CacheError::RemoteOperation(_))));

        // Last line without a trailing newline is still delivered.
        let next = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(next.decode().unwrap(), PeerMessage::RequestSync);
        assert_eq!(read_frame(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_line_is_skipped() {
        let mut data = vec![b'x'; MAX_FRAME_BYTES + 10];
        data.extend_from_slice(b"\n{\"event\":\"request-sync\"}\n");
        // Small buffer so the long line arrives in many chunks.
        let mut reader = BufReader::with_capacity(8192, data.as_slice());

        let frame = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(frame, Frame::Oversized(MAX_FRAME_BYTES + 10));
        assert!(matches!(frame.decode(), Err(CacheError::RemoteOperation(_))));

        let next = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(next.decode().unwrap(), PeerMessage::RequestSync);
    }

    #[test]
    fn test_message_tags() {
        let msg = PeerMessage::RegisterNode(NodeInfo {
            node_id: Uuid::nil(),
            advertised_address: "127.0.0.1:6000".into(),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "register-node");
        assert_eq!(json["data"]["advertised_address"], "127.0.0.1:6000");
        assert_eq!(msg.name(), "register-node");
    }

    #[test]
    fn test_decode_garbage_is_remote_operation_error() {
        assert!(matches!(decode(b"not json"), Err(CacheError::RemoteOperation(_))));
        assert!(matches!(
            decode(br#"{"event":"cache-operation","data":{"type":"nope"}}"#),
            Err(CacheError::RemoteOperation(_))
        ));
    }

    #[test]
    fn test_notification_shape() {
        let note = Notification::SyncStatusChange {
            enabled: false,
            node_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["event"], "sync-status-change");
        assert_eq!(json["data"]["enabled"], false);
    }
}
