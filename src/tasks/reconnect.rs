//! Peer Connect Task
//!
//! Dials one configured peer with exponential backoff. A connection that is
//! later lost re-enters the same retry path; once every attempt fails the
//! peer is left `Disconnected` and the task ends.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

use crate::config::ReplicationConfig;
use crate::error::CacheError;
use crate::sync::{run_session, PeerConnector, PeerKey, ReplicationManager};

/// Upper bound on the delay between two connection attempts.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Spawns the connect loop for `address`.
pub fn spawn_connect_task<C: PeerConnector>(
    manager: Arc<ReplicationManager>,
    connector: Arc<C>,
    address: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let config = manager.config().clone();

        loop {
            let Some(stream) = connect_with_retry(&manager, connector.as_ref(), &address, &config).await
            else {
                manager.mark_exhausted(&address).await;
                return;
            };

            let key = PeerKey::outgoing(address.clone());
            match run_session(Arc::clone(&manager), key, stream).await {
                Ok(()) => info!(peer = %address, "Peer closed connection; reconnecting"),
                Err(err) => warn!(peer = %address, error = %err, "Peer connection lost; reconnecting"),
            }
            sleep(config.reconnect_delay).await;
        }
    })
}

/// Attempts up to `reconnect_attempts` connections, each bounded by
/// `connect_timeout`, doubling the delay between attempts.
async fn connect_with_retry<C: PeerConnector>(
    manager: &ReplicationManager,
    connector: &C,
    address: &str,
    config: &ReplicationConfig,
) -> Option<C::Stream> {
    let mut delay = config.reconnect_delay;

    for attempt in 1..=config.reconnect_attempts {
        manager.mark_connecting(address).await;

        let reason = match timeout(config.connect_timeout, connector.connect(address)).await {
            Ok(Ok(stream)) => {
                info!(peer = %address, attempt, "Connected to peer");
                return Some(stream);
            }
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!("timed out after {}ms", config.connect_timeout.as_millis()),
        };

        let err = CacheError::PeerConnect {
            address: address.to_string(),
            reason,
        };
        warn!(attempt, max_attempts = config.reconnect_attempts, error = %err, "Peer connection attempt failed");

        if attempt < config.reconnect_attempts {
            sleep(delay).await;
            delay = (delay * 2).min(MAX_RECONNECT_DELAY);
        }
    }

    error!(peer = %address, attempts = config.reconnect_attempts, "Giving up on peer");
    None
}
