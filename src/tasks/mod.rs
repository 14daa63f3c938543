//! Background Tasks Module
//!
//! Long-running tasks spawned by the replication manager.
//!
//! # Tasks
//! - Peer connect: dials a configured peer with bounded, backed-off retries
//! - Recovery: re-enables replication after a simulated failure

mod reconnect;
mod recovery;

pub use reconnect::{spawn_connect_task, MAX_RECONNECT_DELAY};
pub use recovery::spawn_recovery_task;
