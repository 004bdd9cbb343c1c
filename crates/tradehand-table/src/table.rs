//! Table actor: owns registration and the running game.
//!
//! The table runs in its own task and is reached only through a
//! [`TableHandle`]. Commands arrive over a bounded mpsc channel and
//! replies go back over oneshot channels. The actor also supervises the
//! orchestrator task: when a game ends it either reopens the table or,
//! on error, marks the table failed and stops.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tradehand_cards::SEATS;
use tradehand_protocol::{PlayerId, TableId};

use crate::decision::DecisionDesk;
use crate::orchestrator::Orchestrator;
use crate::{
    Broadcaster, Decision, DecisionRejected, GameOutcome, Phase, Repository, TableConfig,
    TableError, TableStatus,
};

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

type GameTask = JoinHandle<Result<GameOutcome, TableError>>;

pub(crate) enum TableCommand {
    Register {
        name: String,
        reply: oneshot::Sender<Result<PlayerId, TableError>>,
    },
    TakeSeat {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<bool, TableError>>,
    },
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), TableError>>,
    },
    Info {
        reply: oneshot::Sender<Result<TableInfo, TableError>>,
    },
    Shutdown,
}

/// A snapshot of the table for status reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub table_id: TableId,
    pub phase: Phase,
    pub status: TableStatus,
    pub active_players: usize,
}

/// Handle to a running table. Cheap to clone.
#[derive(Clone)]
pub struct TableHandle {
    table_id: TableId,
    sender: mpsc::Sender<TableCommand>,
    desk: Arc<DecisionDesk>,
    phase: watch::Receiver<Phase>,
    status: watch::Receiver<TableStatus>,
}

impl TableHandle {
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<T, TableError>>) -> TableCommand,
    ) -> Result<T, TableError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| TableError::Unavailable(self.table_id))?;
        reply_rx
            .await
            .map_err(|_| TableError::Unavailable(self.table_id))?
    }

    /// Registers a player by name.
    pub async fn register(&self, name: impl Into<String>) -> Result<PlayerId, TableError> {
        let name = name.into();
        self.request(|reply| TableCommand::Register { name, reply })
            .await
    }

    /// Called once a registered player's connection can receive events.
    /// Starts a game if this makes four active players. Returns whether a
    /// game was started.
    pub async fn take_seat(&self, player_id: PlayerId) -> Result<bool, TableError> {
        self.request(|reply| TableCommand::TakeSeat { player_id, reply })
            .await
    }

    /// Marks a player inactive after their connection closed.
    pub async fn leave(&self, player_id: PlayerId) -> Result<(), TableError> {
        self.request(|reply| TableCommand::Leave { player_id, reply })
            .await
    }

    pub async fn info(&self) -> Result<TableInfo, TableError> {
        self.request(|reply| TableCommand::Info { reply }).await
    }

    /// Forwards a player decision to the phase currently collecting one.
    pub fn submit(&self, decision: Decision) -> Result<u64, DecisionRejected> {
        self.desk.submit(decision)
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// A receiver that observes every phase change.
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase.clone()
    }

    pub fn status(&self) -> TableStatus {
        self.status.borrow().clone()
    }

    /// Resolves once the table has stopped for good.
    pub async fn stopped(&self) -> TableStatus {
        let mut status = self.status.clone();
        match status.wait_for(TableStatus::is_terminal).await {
            Ok(status) => status.clone(),
            Err(_) => TableStatus::Stopped,
        }
    }

    pub async fn shutdown(&self) -> Result<(), TableError> {
        self.sender
            .send(TableCommand::Shutdown)
            .await
            .map_err(|_| TableError::Unavailable(self.table_id))
    }
}

struct TableActor<R, B> {
    table_id: TableId,
    config: TableConfig,
    repo: Arc<R>,
    broadcaster: Arc<B>,
    desk: Arc<DecisionDesk>,
    phase: Arc<watch::Sender<Phase>>,
    status: watch::Sender<TableStatus>,
    rng: ChaCha8Rng,
    game: Option<GameTask>,
    receiver: mpsc::Receiver<TableCommand>,
}

async fn wait_game(game: &mut Option<GameTask>) -> Result<Result<GameOutcome, TableError>, JoinError> {
    match game {
        Some(task) => task.await,
        None => std::future::pending().await,
    }
}

impl<R: Repository, B: Broadcaster> TableActor<R, B> {
    async fn run(mut self) {
        tracing::info!(table_id = %self.table_id, "table actor started");

        loop {
            tokio::select! {
                command = self.receiver.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle(command).await {
                        break;
                    }
                }
                result = wait_game(&mut self.game) => {
                    self.game = None;
                    if !self.on_game_end(result).await {
                        break;
                    }
                }
            }
        }

        if let Some(game) = self.game.take() {
            game.abort();
        }
        self.status.send_if_modified(|status| {
            if status.is_terminal() {
                false
            } else {
                *status = TableStatus::Stopped;
                true
            }
        });
        let status = self.status.borrow().clone();
        tracing::info!(table_id = %self.table_id, %status, "table actor stopped");
    }

    /// Returns `false` when the actor should stop.
    async fn handle(&mut self, command: TableCommand) -> bool {
        match command {
            TableCommand::Register { name, reply } => {
                let result = self.repo.register_player(&name).await.map_err(TableError::from);
                match &result {
                    Ok(player_id) => {
                        tracing::info!(table_id = %self.table_id, %player_id, player_name = %name, "player registered")
                    }
                    Err(e) => {
                        tracing::info!(table_id = %self.table_id, player_name = %name, error = %e, "registration refused")
                    }
                }
                let _ = reply.send(result);
            }
            TableCommand::TakeSeat { player_id, reply } => {
                let result = self.maybe_start().await;
                tracing::debug!(table_id = %self.table_id, %player_id, started = ?result.as_ref().ok(), "seat taken");
                let _ = reply.send(result);
            }
            TableCommand::Leave { player_id, reply } => {
                let result = self.repo.deactivate_player(player_id).await.map_err(TableError::from);
                let phase = *self.phase.borrow();
                tracing::info!(
                    table_id = %self.table_id,
                    %player_id,
                    mid_round = phase.in_round(),
                    "player left"
                );
                let _ = reply.send(result);
            }
            TableCommand::Info { reply } => {
                let _ = reply.send(self.info().await);
            }
            TableCommand::Shutdown => {
                tracing::info!(table_id = %self.table_id, "table shutting down");
                self.status.send_replace(TableStatus::Stopped);
                return false;
            }
        }
        true
    }

    /// Returns `false` when the actor should stop.
    async fn on_game_end(&mut self, result: Result<Result<GameOutcome, TableError>, JoinError>) -> bool {
        match result {
            Ok(Ok(GameOutcome::AwaitingPlayers)) => {
                tracing::info!(table_id = %self.table_id, "game paused, waiting for players");
                self.status.send_replace(TableStatus::Open);
                // Players may have joined while the last game wound down.
                if let Err(e) = self.maybe_start().await {
                    return self.fail(e.to_string());
                }
                true
            }
            Ok(Ok(GameOutcome::Finished)) => {
                tracing::info!(table_id = %self.table_id, "game finished");
                self.status.send_replace(TableStatus::Finished);
                false
            }
            Ok(Err(e)) => self.fail(e.to_string()),
            Err(e) => self.fail(TableError::Aborted(e.to_string()).to_string()),
        }
    }

    fn fail(&mut self, reason: String) -> bool {
        tracing::error!(table_id = %self.table_id, error = %reason, "game failed, stopping table");
        self.status.send_replace(TableStatus::Failed(reason));
        false
    }

    async fn maybe_start(&mut self) -> Result<bool, TableError> {
        if self.game.is_some() || self.status.borrow().is_terminal() {
            return Ok(false);
        }
        let active = self.repo.active_player_count().await?;
        if active != SEATS {
            return Ok(false);
        }

        let orchestrator = Orchestrator::new(
            self.table_id,
            &self.config,
            Arc::clone(&self.repo),
            Arc::clone(&self.broadcaster),
            Arc::clone(&self.desk),
            Arc::clone(&self.phase),
            ChaCha8Rng::seed_from_u64(self.rng.random()),
        );
        self.game = Some(tokio::spawn(orchestrator.run()));
        self.status.send_replace(TableStatus::Playing);
        tracing::info!(table_id = %self.table_id, "game started");
        Ok(true)
    }

    async fn info(&self) -> Result<TableInfo, TableError> {
        let active_players = self.repo.active_player_count().await?;
        let phase = *self.phase.borrow();
        let status = self.status.borrow().clone();
        Ok(TableInfo {
            table_id: self.table_id,
            phase,
            status,
            active_players,
        })
    }
}

/// Spawns a table actor and returns a handle to it.
pub fn spawn_table<R: Repository, B: Broadcaster>(
    config: TableConfig,
    repo: Arc<R>,
    broadcaster: Arc<B>,
) -> TableHandle {
    let table_id = TableId(NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed));
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
    let (phase_tx, phase_rx) = watch::channel(Phase::AwaitingPlayers);
    let (status_tx, status_rx) = watch::channel(TableStatus::Open);
    let desk = Arc::new(DecisionDesk::default());
    let rng = match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_rng(&mut rand::rng()),
    };

    let actor = TableActor {
        table_id,
        config,
        repo,
        broadcaster,
        desk: Arc::clone(&desk),
        phase: Arc::new(phase_tx),
        status: status_tx,
        rng,
        game: None,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    TableHandle {
        table_id,
        sender: tx,
        desk,
        phase: phase_rx,
        status: status_rx,
    }
}
