//! `TradehandServer` builder and server loop.
//!
//! This is the entry point for running a table. It ties the layers
//! together: transport → handler → table, and table → hub → transport.

use std::net::SocketAddr;
use std::sync::Arc;

use tradehand_protocol::{Codec, JsonCodec};
use tradehand_table::{
    MemoryRepository, Repository, TableConfig, TableHandle, TableStatus, spawn_table,
};
use tradehand_transport::{Transport, TransportError, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{Hub, ServerConfig, TradehandError};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) table: TableHandle,
    pub(crate) hub: Arc<Hub<C>>,
}

/// Builder for configuring and starting a Tradehand server.
///
/// # Example
///
/// ```rust,no_run
/// use tradehand::TradehandServer;
///
/// # async fn run() -> Result<(), tradehand::TradehandError> {
/// let server = TradehandServer::builder()
///     .bind("0.0.0.0:8080")
///     .rounds_limit(3)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct TradehandServerBuilder {
    config: ServerConfig,
}

impl TradehandServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration, e.g. with [`ServerConfig::from_env`].
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn table_config(mut self, table: TableConfig) -> Self {
        self.config.table = table;
        self
    }

    pub fn rounds_limit(mut self, rounds: u32) -> Self {
        self.config.table.rounds_limit = Some(rounds);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.table.seed = Some(seed);
        self
    }

    /// Binds the listener and starts a table backed by a [`MemoryRepository`].
    pub async fn build(self) -> Result<TradehandServer, TradehandError> {
        let repo = Arc::new(MemoryRepository::new(self.config.table.max_players));
        self.build_with_repository(repo).await
    }

    /// Like [`build`](Self::build), with a caller-supplied repository.
    pub async fn build_with_repository<R: Repository>(
        self,
        repo: Arc<R>,
    ) -> Result<TradehandServer, TradehandError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        let hub = Arc::new(Hub::new(JsonCodec));
        let table = spawn_table(self.config.table, repo, Arc::clone(&hub));
        tracing::info!(table_id = %table.table_id(), "table ready");

        Ok(TradehandServer {
            transport,
            state: Arc::new(ServerState { table, hub }),
        })
    }
}

impl Default for TradehandServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Tradehand server with its table running.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TradehandServer<C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl TradehandServer {
    pub fn builder() -> TradehandServerBuilder {
        TradehandServerBuilder::new()
    }
}

impl<C: Codec> TradehandServer<C> {
    /// The address actually bound, including an OS-assigned port.
    pub fn local_addr(&self) -> Result<SocketAddr, TradehandError> {
        Ok(self.transport.local_addr()?)
    }

    pub fn table(&self) -> &TableHandle {
        &self.state.table
    }

    /// Accepts connections until the table stops.
    ///
    /// A table that finished its round limit or was shut down ends the loop
    /// with `Ok`. A failed table ends it with
    /// [`TradehandError::TableStopped`].
    pub async fn run(mut self) -> Result<(), TradehandError> {
        tracing::info!(table_id = %self.state.table.table_id(), "Tradehand server running");
        let table = self.state.table.clone();

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
                    Err(e @ TransportError::Handshake { .. }) => {
                        tracing::warn!(error = %e, "rejected client");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                status = table.stopped() => {
                    return match status {
                        TableStatus::Finished | TableStatus::Stopped => {
                            tracing::info!(%status, "table stopped, server exiting");
                            Ok(())
                        }
                        status => Err(TradehandError::TableStopped(status)),
                    };
                }
            }
        }
    }
}
