//! `PalisadeServer` builder and accept loop.
//!
//! This is the entry point for running a Palisade server. It ties the
//! layers together: transport → protocol → session → room.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use palisade_protocol::JsonCodec;
use palisade_room::{RoomConfig, RoomManager};
use palisade_session::IdentityProvider;
use palisade_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::PalisadeError;
use crate::handler::{WsSocket, handle_connection};

/// Address the server binds to when none is configured.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Shared server state passed to each connection handler task.
///
/// The room manager sits behind a `Mutex`; handlers hold it only to look
/// up or create rooms, never across a round trip to a room actor.
pub(crate) struct ServerState<P: IdentityProvider> {
    pub(crate) rooms: Mutex<RoomManager<WsSocket>>,
    pub(crate) provider: P,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a Palisade server.
///
/// # Example
///
/// ```rust,no_run
/// use palisade::prelude::*;
///
/// # async fn start() -> Result<(), PalisadeError> {
/// let server = PalisadeServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(SessionTokenProvider)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PalisadeServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
}

impl PalisadeServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            room_config: RoomConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the policy every room runs with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Binds the listener and builds the server around `provider`.
    pub async fn build<P: IdentityProvider>(
        self,
        provider: P,
    ) -> Result<PalisadeServer<P>, PalisadeError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            rooms: Mutex::new(RoomManager::new(self.room_config)),
            provider,
            codec: JsonCodec,
        });

        Ok(PalisadeServer { transport, state })
    }
}

impl Default for PalisadeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Palisade server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PalisadeServer<P: IdentityProvider> {
    transport: WebSocketTransport,
    state: Arc<ServerState<P>>,
}

impl<P: IdentityProvider> PalisadeServer<P> {
    /// Creates a new builder.
    pub fn builder() -> PalisadeServerBuilder {
        PalisadeServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, PalisadeError> {
        Ok(self.transport.local_addr()?)
    }

    /// Accepts connections until the process is terminated.
    pub async fn run(self) -> Result<(), PalisadeError> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves, then closes every
    /// room so that seated players get a `roomClosed` frame.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), PalisadeError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "palisade server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
                () = &mut shutdown => break,
            }
        }

        let mut rooms = self.state.rooms.lock().await;
        tracing::info!(rooms = rooms.room_count(), "palisade server shutting down");
        rooms.shutdown_all("server shutting down").await;
        Ok(())
    }
}
