//! Peer transport
//!
//! Accepts inbound peer connections and drives one session per connection:
//! a writer task drains an outbound queue while the caller's task reads and
//! dispatches frames to the [`ReplicationManager`].

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};
use crate::sync::{read_frame, write_message, PeerKey, PeerMessage, ReplicationManager};

// == Connector ==
/// Opens outbound peer connections. Tests swap in connectors that fail or
/// count attempts.
pub trait PeerConnector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    fn connect(&self, address: &str) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl PeerConnector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self, address: &str) -> impl Future<Output = io::Result<TcpStream>> + Send {
        let address = address.to_string();
        async move {
            let stream = TcpStream::connect(address).await?;
            stream.set_nodelay(true)?;
            Ok(stream)
        }
    }
}

// == Listener ==
/// Spawns the accept loop for inbound peers. Abort the handle to stop
/// accepting; live sessions are closed by [`ReplicationManager::shutdown`].
pub fn serve_peers(listener: TcpListener, manager: Arc<ReplicationManager>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match listener.local_addr() {
            Ok(addr) => info!(%addr, "Peer listener started"),
            Err(err) => warn!(error = ?err, "Peer listener started on unknown address"),
        }

        loop {
            handle_accept_result(listener.accept().await, &manager);
        }
    })
}

fn handle_accept_result(
    result: io::Result<(TcpStream, SocketAddr)>,
    manager: &Arc<ReplicationManager>,
) {
    match result {
        Ok((stream, peer)) => {
            if let Err(err) = stream.set_nodelay(true) {
                debug!(%peer, error = ?err, "Failed to set TCP_NODELAY");
            }
            let manager = Arc::clone(manager);
            tokio::spawn(async move {
                if let Err(err) = run_session(manager, PeerKey::incoming(peer.to_string()), stream).await {
                    warn!(%peer, error = %err, "Inbound peer connection closed with error");
                }
            });
        }
        Err(err) => warn!(error = ?err, "Failed to accept peer connection"),
    }
}

// == Session ==
/// Runs one peer connection to completion. Malformed frames (bad JSON, bad
/// UTF-8, oversized lines) are logged and skipped; a read failure ends the
/// session with [`CacheError::Transport`].
/// The peer is detached from the manager either way.
pub async fn run_session<S>(manager: Arc<ReplicationManager>, key: PeerKey, stream: S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let (tx, rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_loop(writer, rx, key.clone()));
    manager.attach(key.clone(), tx, writer_task).await;

    let result = loop {
        match read_frame(&mut reader).await {
            Ok(Some(frame)) => match frame.decode() {
                Ok(message) => manager.handle_message(&key, message).await,
                Err(err) => warn!(peer = %key, error = %err, "Dropping malformed peer message"),
            },
            Ok(None) => break Ok(()),
            Err(err) => break Err(CacheError::Transport(err)),
        }
    };

    manager.detach(&key).await;
    result
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<PeerMessage>, key: PeerKey)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        if let Err(err) = write_message(&mut writer, &message).await {
            debug!(peer = %key, message = message.name(), error = ?err, "Peer write failed");
            break;
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, Strategy};
    use crate::config::ReplicationConfig;
    use crate::sync::{decode, NodeInfo, Operation, OperationKind, PeerStatus};
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
    use uuid::Uuid;

    fn manager() -> Arc<ReplicationManager> {
        let cache = CacheStore::new(Strategy::Lru, 8).unwrap().into_shared();
        Arc::new(ReplicationManager::new(cache, ReplicationConfig::default()))
    }

    #[tokio::test]
    async fn test_session_handshake_and_malformed_frames() {
        let manager = manager();
        let (local, remote) = tokio::io::duplex(64 * 1024);
        let session = tokio::spawn(run_session(
            Arc::clone(&manager),
            PeerKey::incoming("duplex:1"),
            local,
        ));

        let (remote_read, mut remote_write) = tokio::io::split(remote);
        let mut remote_read = BufReader::new(remote_read);

        remote_write.write_all(b"garbage\n").await.unwrap();
        let hello = PeerMessage::RegisterNode(NodeInfo {
            node_id: Uuid::new_v4(),
            advertised_address: "duplex:6000".into(),
        });
        write_message(&mut remote_write, &hello).await.unwrap();

        // The malformed line is skipped and the handshake still completes.
        let mut line = String::new();
        remote_read.read_line(&mut line).await.unwrap();
        assert_eq!(decode(line.as_bytes()).unwrap().name(), "register-node");
        line.clear();
        remote_read.read_line(&mut line).await.unwrap();
        assert_eq!(decode(line.as_bytes()).unwrap().name(), "cache-sync");

        let peers = manager.peers().await;
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].status, PeerStatus::Connected);

        drop(remote_write);
        drop(remote_read);
        tokio::time::timeout(Duration::from_secs(2), session)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(manager.peers().await.is_empty());
    }

    #[tokio::test]
    async fn test_session_survives_invalid_utf8_frame() {
        let manager = manager();
        let (local, mut remote) = tokio::io::duplex(64 * 1024);
        let session = tokio::spawn(run_session(
            Arc::clone(&manager),
            PeerKey::incoming("duplex:2"),
            local,
        ));

        remote.write_all(b"\xff\xfe garbage\n").await.unwrap();
        let op = Operation::new(
            OperationKind::Set {
                key: "after".into(),
                value: json!(1),
            },
            Uuid::new_v4(),
        );
        write_message(&mut remote, &PeerMessage::CacheOperation(op))
            .await
            .unwrap();

        let mut applied = None;
        for _ in 0..50 {
            applied = manager.cache().write().await.get("after");
            if applied.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(applied, Some(json!(1)));
        assert!(!session.is_finished());
        assert_eq!(manager.peers().await.len(), 1);

        drop(remote);
        tokio::time::timeout(Duration::from_secs(2), session)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_tcp_connector_reports_refusal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(TcpConnector.connect(&addr.to_string()).await.is_err());
    }
}
