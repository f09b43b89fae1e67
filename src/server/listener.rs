//! Relay server listener
//!
//! Owns the TCP accept loop and the connection dispatcher: every accepted
//! connection sends one greeting line, then is routed by role: publishers
//! into a session task that competes for the publisher slot, subscribers
//! into the registry.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, timeout, Instant};

use crate::error::Result;
use crate::protocol::handshake::{read_greeting, Role};
use crate::registry::{Subscriber, SubscriberRegistry};
use crate::server::config::RelayConfig;
use crate::session::publisher::run_publisher_session;
use crate::session::slot::PublisherSlot;

/// One-to-many message relay server
///
/// One active publisher feeds frames; every registered subscriber receives
/// them. See the crate docs for the wire protocol.
pub struct RelayServer {
    config: RelayConfig,
    registry: Arc<SubscriberRegistry>,
    slot: Arc<PublisherSlot>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    terminate: Arc<AtomicBool>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: RelayConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            registry: Arc::new(SubscriberRegistry::new()),
            slot: Arc::new(PublisherSlot::new()),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            terminate: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a reference to the subscriber registry
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Get a reference to the publisher slot
    pub fn publisher_slot(&self) -> &Arc<PublisherSlot> {
        &self.slot
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// Binds to the configured address and blocks until the accept loop
    /// fails.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run the server with graceful shutdown
    ///
    /// When `shutdown` resolves, the accept loop stops, all subscriber
    /// connections are closed, and the active publisher session (if any)
    /// is signalled and given time to exit.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve connections from an already-bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "Relay listening");
        self.accept_loop(&listener).await
    }

    /// Serve connections from an already-bound listener, with shutdown
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tracing::info!(addr = %listener.local_addr()?, "Relay listening");

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        self.shutdown().await;
        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(session_id = session_id, peer = %peer_addr, "New connection");

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(session_id = session_id, error = %e, "set_nodelay failed");
            }
        }

        let config = self.config.clone();
        let registry = Arc::clone(&self.registry);
        let slot = Arc::clone(&self.slot);
        let terminate = Arc::clone(&self.terminate);

        tokio::spawn(dispatch(
            socket, peer_addr, session_id, config, registry, slot, terminate, permit,
        ));
    }

    /// Stop all sessions and close all connections
    async fn shutdown(&self) {
        self.terminate.store(true, Ordering::Release);
        self.registry.clear().await;

        // Sessions poll the terminate flag at their read timeout; give the
        // active one that long (plus slack) to release the slot.
        let deadline = Instant::now() + self.config.poll_interval * 2;
        while self.slot.holder().is_some() && Instant::now() < deadline {
            sleep(Duration::from_millis(10)).await;
        }

        // Connections already past accept when the flag was set may have
        // registered in the meantime; sweep them out too.
        self.registry.clear().await;

        if let Some(holder) = self.slot.holder() {
            tracing::warn!(session_id = holder, "Publisher session still live at shutdown");
        } else {
            tracing::info!("Relay shut down");
        }
    }
}

/// Route one accepted connection by its greeting
#[allow(clippy::too_many_arguments)]
async fn dispatch(
    mut socket: TcpStream,
    peer_addr: SocketAddr,
    session_id: u64,
    config: RelayConfig,
    registry: Arc<SubscriberRegistry>,
    slot: Arc<PublisherSlot>,
    terminate: Arc<AtomicBool>,
    permit: Option<OwnedSemaphorePermit>,
) {
    let greeting = match timeout(config.handshake_timeout, read_greeting(&mut socket)).await {
        Ok(Ok(greeting)) => greeting,
        Ok(Err(e)) => {
            tracing::warn!(
                session_id = session_id,
                peer = %peer_addr,
                error = %e,
                "Handshake failed"
            );
            return;
        }
        Err(_elapsed) => {
            tracing::warn!(session_id = session_id, peer = %peer_addr, "Handshake timed out");
            return;
        }
    };

    tracing::info!(
        session_id = session_id,
        peer = %peer_addr,
        client_id = %greeting.client_id,
        role = %greeting.role,
        "Client connected"
    );

    match greeting.role {
        Role::Publisher => {
            // The permit rides with the session task
            let _permit = permit;
            run_publisher_session(
                socket, peer_addr, greeting, session_id, slot, registry, config, terminate,
            )
            .await;
        }
        Role::Subscriber => {
            // A connection accepted just before shutdown may reach this
            // point after the registry has been cleared.
            if terminate.load(Ordering::Acquire) {
                tracing::debug!(session_id = session_id, "Shutting down, subscriber not admitted");
                return;
            }

            // Only the write half is kept; a dead subscriber is discovered
            // by the next broadcast write, not by reading from it.
            let (_read_half, write_half) = socket.into_split();
            registry
                .add(Arc::new(Subscriber::new(
                    session_id,
                    peer_addr,
                    greeting.client_id,
                    Box::new(write_half),
                    permit,
                )))
                .await;

            // Shutdown may have cleared the registry between the check
            // above and the add; take the entry back out.
            if terminate.load(Ordering::Acquire) {
                registry.remove(session_id).await;
            }
        }
    }
}
