//! Publisher session runner
//!
//! One task per publisher connection. The task loops on slot acquisition
//! (each failed attempt re-signals preemption to the current holder), runs
//! the broadcast loop once it wins, and releases the slot when the loop
//! ends. A superseded session closes its own connection; it is never
//! closed from another task.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::time::sleep;

use crate::protocol::handshake::Greeting;
use crate::registry::SubscriberRegistry;
use crate::server::config::RelayConfig;
use crate::session::broadcast::{run_broadcast_loop, SessionEnd};
use crate::session::slot::PublisherSlot;

/// Run one publisher connection to completion
pub(crate) async fn run_publisher_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    greeting: Greeting,
    session_id: u64,
    slot: Arc<PublisherSlot>,
    registry: Arc<SubscriberRegistry>,
    config: RelayConfig,
    terminate: Arc<AtomicBool>,
) {
    // Cooperative hand-off: keep knocking until the current holder yields.
    let guard = loop {
        if terminate.load(Ordering::Acquire) {
            tracing::debug!(session_id = session_id, "Shutdown before session start");
            return;
        }

        match slot.acquire(session_id) {
            Ok(guard) => break guard,
            Err(rejected) => {
                tracing::debug!(
                    session_id = session_id,
                    holder = rejected.holder,
                    "Waiting for active publisher to yield"
                );
                sleep(config.handoff_retry_interval).await;
            }
        }
    };

    tracing::info!(
        session_id = session_id,
        peer = %peer_addr,
        client_id = %greeting.client_id,
        "Publisher session active"
    );

    let (mut reader, mut writer) = stream.into_split();
    let end = run_broadcast_loop(
        &mut reader,
        &mut writer,
        &guard,
        &registry,
        &config,
        &terminate,
    )
    .await;

    match end {
        SessionEnd::EndOfStream => {
            tracing::info!(session_id = session_id, "Publisher closed its stream")
        }
        SessionEnd::Preempted => {
            tracing::info!(session_id = session_id, "Publisher session preempted")
        }
        SessionEnd::Terminated => {
            tracing::info!(session_id = session_id, "Publisher session shut down")
        }
        SessionEnd::PublisherGone => {
            tracing::info!(session_id = session_id, "Publisher connection lost")
        }
        SessionEnd::Protocol(e) => tracing::warn!(
            session_id = session_id,
            error = %e,
            "Publisher session ended on protocol error"
        ),
    }

    // Guard drops here, returning the slot to idle; the connection halves
    // drop with it, closing the socket.
}
