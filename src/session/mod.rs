//! The game session orchestrator.
//!
//! # Architecture
//!
//! ```text
//!   transport callbacks ──push_event──┐
//!                                     ▼
//!   presentation ──commands──▶ ┌─────────────────┐      ┌──────────────────────────┐
//!                              │ SessionInput    │─────▶│ GameSessionOrchestrator  │──notices──▶ presentation
//!   spawned server calls ────▶ │ queue (mpsc)    │      │  board, tokens, statuses │
//!        (completions)         └─────────────────┘      │  turn, timer, watchdog   │──controls──▶ SessionHandle
//!                                     ▲                 │  inventory, guard flags  │   (watch)
//!                                     └──── tick ───────└──────────────────────────┘
//! ```
//!
//! All state lives in the orchestrator and changes only while it applies one
//! input at a time. Server calls run as spawned tasks and report back through
//! the same queue, so the loop keeps draining events while a request is out
//! and the in-flight flags keep conflicting commands away.

mod commands;
pub mod handle;
pub mod notice;
mod router;
mod sync;


use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::{SessionConfig, SessionContext};
use crate::error::{CommandKind, RpcError, SessionError};
use crate::protocol::{GameServicePort, Participant};
use crate::state::board::{BoardDefinition, BoardGeometryBuilder, BoardLayout};
use crate::state::guard::{ActionGuard, ActionInFlightFlags};
use crate::state::inventory::Inventory;
use crate::state::status::PlayerStatusTracker;
use crate::state::timer::{TimerTick, TurnTimer};
use crate::state::token::TokenAnimationCoordinator;
use crate::state::turn::{PendingItemAction, SessionPhase, TurnState};
use crate::state::watchdog::{InactivityWatchdog, WatchdogStatus};

pub(crate) use handle::{Completion, SessionInput};
pub use handle::{ControlSnapshot, PlayerCommand, SessionHandle};
pub use notice::{SessionNotice, TimeoutPenalty};

/// Bookkeeping for `GetGameState` requests.
#[derive(Debug, Default)]
struct SyncTracker {
    next_request_id: u64,
    in_flight: bool,
    /// Force flag for a sync requested while another one was out
    queued: Option<bool>,
    /// Set by a turn change: results of earlier requests cannot confirm it
    turn_confirmation_from: Option<u64>,
    /// Departed user → first request id issued after the departure. Earlier
    /// snapshots may still list the player and are ignored for them.
    departed: HashMap<i64, u64>,
    last_requested: Option<Instant>,
}

/// Root of a game session.
pub struct GameSessionOrchestrator {
    context: SessionContext,
    config: SessionConfig,
    service: Arc<dyn GameServicePort>,

    tokens: TokenAnimationCoordinator,
    statuses: PlayerStatusTracker,
    turn: TurnState,
    timer: TurnTimer,
    watchdog: InactivityWatchdog,

    flags: ActionInFlightFlags,
    pending_item: Option<PendingItemAction>,
    selected_dice_slot: Option<u8>,
    inventory: Inventory,
    roster: Vec<Participant>,
    pending_bonus: HashSet<i64>,

    joined: bool,
    join_in_flight: bool,
    inventory_in_flight: bool,
    inventory_queued: bool,
    timeout_in_flight: bool,
    sync: SyncTracker,

    inputs_tx: mpsc::UnboundedSender<SessionInput>,
    inputs_rx: mpsc::UnboundedReceiver<SessionInput>,
    notices: mpsc::Sender<SessionNotice>,
    controls: watch::Sender<ControlSnapshot>,

    started_at: DateTime<Utc>,
    last_tick: Instant,
    closed: bool,
}

impl GameSessionOrchestrator {
    /// Build the board and wire up the channels.
    ///
    /// Returns the orchestrator, a handle for the presentation layer and
    /// transport callbacks, and the receiving end of the notice channel.
    pub fn new(
        context: SessionContext,
        config: SessionConfig,
        board: &BoardDefinition,
        service: Arc<dyn GameServicePort>,
    ) -> Result<(Self, SessionHandle, mpsc::Receiver<SessionNotice>), SessionError> {
        let layout = BoardGeometryBuilder::new()
            .with_vertical_adjust(config.vertical_adjust)
            .build(board)?;
        let layout = Arc::new(layout);

        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let (notices_tx, notices_rx) = mpsc::channel(config.notice_channel_capacity.max(1));
        let (controls_tx, controls_rx) = watch::channel(ControlSnapshot::default());

        let now = Instant::now();
        tracing::info!(
            game_id = %context.game_id,
            user_id = context.user_id,
            cells = layout.cell_count(),
            links = layout.link_count(),
            "Game session created"
        );

        let orchestrator = Self {
            tokens: TokenAnimationCoordinator::new(Arc::clone(&layout), &config),
            statuses: PlayerStatusTracker::new(config.shield_turns, config.freeze_turns),
            turn: TurnState::new(),
            timer: TurnTimer::new(config.turn_duration()),
            watchdog: InactivityWatchdog::new(config.inactivity_threshold(), now),
            flags: ActionInFlightFlags::default(),
            pending_item: None,
            selected_dice_slot: None,
            inventory: Inventory::default(),
            roster: Vec::new(),
            pending_bonus: HashSet::new(),
            joined: false,
            join_in_flight: false,
            inventory_in_flight: false,
            inventory_queued: false,
            timeout_in_flight: false,
            sync: SyncTracker::default(),
            inputs_tx: inputs_tx.clone(),
            inputs_rx,
            notices: notices_tx,
            controls: controls_tx,
            started_at: Utc::now(),
            last_tick: now,
            closed: false,
            context,
            config,
            service,
        };

        Ok((orchestrator, SessionHandle::new(inputs_tx, controls_rx), notices_rx))
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn layout(&self) -> &Arc<BoardLayout> {
        self.tokens.layout()
    }

    pub fn tokens(&self) -> &TokenAnimationCoordinator {
        &self.tokens
    }

    pub fn statuses(&self) -> &PlayerStatusTracker {
        &self.statuses
    }

    pub fn turn(&self) -> &TurnState {
        &self.turn
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn roster(&self) -> &[Participant] {
        &self.roster
    }

    pub fn flags(&self) -> &ActionInFlightFlags {
        &self.flags
    }

    pub fn pending_item(&self) -> Option<&PendingItemAction> {
        self.pending_item.as_ref()
    }

    pub fn selected_dice_slot(&self) -> Option<u8> {
        self.selected_dice_slot
    }

    pub fn has_pending_bonus(&self, user_id: i64) -> bool {
        self.pending_bonus.contains(&user_id)
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The local player owns the turn and the last turn change has been
    /// confirmed by a snapshot.
    pub fn is_my_turn(&self) -> bool {
        self.turn.is_turn_of(self.context.user_id) && !self.is_turn_sync_pending()
    }

    /// A turn change was pushed and the follow-up sync has not landed yet.
    pub fn is_turn_sync_pending(&self) -> bool {
        self.sync.turn_confirmation_from.is_some()
    }

    pub fn phase(&self) -> SessionPhase {
        SessionPhase::derive(self.is_my_turn(), &self.flags, self.pending_item.as_ref())
    }

    pub fn control_snapshot(&self) -> ControlSnapshot {
        let is_my_turn = self.is_my_turn();
        ControlSnapshot {
            phase: self.phase(),
            controls: ActionGuard::controls(is_my_turn, &self.flags),
            is_my_turn,
        }
    }

    /// Apply one input. Every state change goes through here or [`tick`].
    ///
    /// [`tick`]: Self::tick
    pub(crate) fn apply(&mut self, input: SessionInput, now: Instant) {
        match input {
            SessionInput::Server(event) => self.handle_server_event(event, now),
            SessionInput::Command(command) => {
                if let Err(rejected) = self.execute(command, now) {
                    tracing::debug!(%rejected, "Command dropped");
                }
            }
            SessionInput::Completed(completion) => self.complete(completion, now),
            SessionInput::Shutdown => {
                tracing::info!(game_id = %self.context.game_id, "Session shutdown requested");
                self.closed = true;
            }
        }
        self.publish_controls();
    }

    fn complete(&mut self, completion: Completion, now: Instant) {
        match completion {
            Completion::Joined(result) => self.on_joined(result, now),
            Completion::Rolled { epoch, result } => self.on_rolled(epoch, result, now),
            Completion::ItemUsed {
                epoch,
                slot,
                target_user_id,
                result,
            } => self.on_item_used(epoch, slot, target_user_id, result, now),
            Completion::Synced {
                request_id,
                force,
                result,
            } => self.on_synced(request_id, force, result, now),
            Completion::InventoryLoaded(result) => self.on_inventory_loaded(result),
            Completion::TimeoutRegistered { user_id, result } => {
                self.on_timeout_registered(user_id, result)
            }
        }
    }

    /// Advance animations, the turn timer, the watchdog and periodic sync.
    pub fn tick(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;

        for finished in self.tokens.advance(dt) {
            tracing::trace!(
                user_id = finished.user_id,
                cell_index = finished.cell_index,
                "Token animation finished"
            );
            if self.tokens.layout().is_final(finished.cell_index) {
                tracing::info!(user_id = finished.user_id, "Token reached the final cell");
                self.emit(SessionNotice::ReachedFinalCell {
                    user_id: finished.user_id,
                });
            }
        }

        match self.timer.tick(now) {
            TimerTick::Running { remaining_secs } => {
                if remaining_secs != self.turn.remaining_seconds {
                    self.turn.remaining_seconds = remaining_secs;
                    self.emit(SessionNotice::TimerUpdated {
                        remaining_seconds: remaining_secs,
                    });
                }
            }
            TimerTick::Expired => {
                self.turn.remaining_seconds = 0;
                self.on_turn_timer_expired();
            }
            TimerTick::Stopped => {}
        }

        if self.watchdog.check(now) == WatchdogStatus::ConnectionLost {
            self.emit(SessionNotice::ConnectionLost);
        }

        if let Some(interval) = self.config.sync_interval() {
            // Periodic reconciliation starts once the first sync went out.
            let due = self
                .sync
                .last_requested
                .is_some_and(|at| now.saturating_duration_since(at) >= interval);
            if due {
                tracing::debug!("Periodic reconciliation");
                self.sync_game_state(false, now);
            }
        }

        self.publish_controls();
    }

    /// Wait for the next queued input and apply it.
    ///
    /// Returns `false` once the session is closed.
    pub async fn step(&mut self) -> bool {
        if self.closed {
            return false;
        }
        match self.inputs_rx.recv().await {
            Some(input) => {
                self.apply(input, Instant::now());
                !self.closed
            }
            None => false,
        }
    }

    /// Drain inputs and tick until shutdown.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(game_id = %self.context.game_id, "Session loop started");

        while !self.closed {
            tokio::select! {
                input = self.inputs_rx.recv() => match input {
                    Some(input) => self.apply(input, Instant::now()),
                    None => break,
                },
                _ = ticker.tick() => self.tick(Instant::now()),
            }
        }

        tracing::info!(game_id = %self.context.game_id, "Session loop stopped");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run a server call on its own task and queue its completion.
    ///
    /// A panicking call still produces a completion, so the flag guarding
    /// it is always released.
    fn spawn_request<T, Fut, F>(&self, call: Fut, wrap: F)
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, RpcError>> + Send + 'static,
        F: FnOnce(Result<T, RpcError>) -> Completion + Send + 'static,
    {
        let inputs = self.inputs_tx.clone();
        tokio::spawn(async move {
            let result = match tokio::spawn(call).await {
                Ok(result) => result,
                Err(err) => Err(RpcError::Unexpected(err.to_string())),
            };
            if inputs.send(SessionInput::Completed(wrap(result))).is_err() {
                tracing::debug!("Session closed before a completion was delivered");
            }
        });
    }

    /// Surface a failed request to the player.
    fn report_failure(&mut self, command: CommandKind, err: RpcError) {
        match err {
            RpcError::Business { reason } => {
                tracing::info!(command = command.as_str(), %reason, "Request refused by server");
                self.emit(SessionNotice::RequestRefused { command, reason });
            }
            RpcError::Transport(detail) => {
                tracing::warn!(command = command.as_str(), %detail, "Request failed to reach server");
                self.emit(SessionNotice::ConnectivityFailure {
                    command: Some(command),
                });
            }
            RpcError::Unexpected(detail) => {
                tracing::error!(command = command.as_str(), %detail, "Request failed unexpectedly");
                self.emit(SessionNotice::UnexpectedError { message: detail });
            }
        }
    }

    /// Queue a notice for the presentation layer. Drops it if the channel
    /// is full so the session never blocks on a slow consumer.
    fn emit(&self, notice: SessionNotice) {
        match self.notices.try_send(notice) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::warn!(notice = dropped.as_str(), "Notice channel full, dropping notice");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::trace!("Notice channel closed");
            }
        }
    }

    fn publish_controls(&mut self) {
        self.flags.animating = self.tokens.is_animating();
        let snapshot = self.control_snapshot();
        self.controls.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "game_id": self.context.game_id,
            "user_id": self.context.user_id,
            "joined": self.joined,
            "started_at": self.started_at.to_rfc3339(),
            "last_server_activity_at": self.watchdog.last_activity_at().to_rfc3339(),
            "connection_lost": self.watchdog.is_lost(),
            "turn": self.turn.to_json(),
            "turn_sync_pending": self.is_turn_sync_pending(),
            "control": self.control_snapshot().to_json(),
            "selected_dice_slot": self.selected_dice_slot,
            "pending_item_slot": self.pending_item.map(|p| p.slot_number),
            "tokens": self.tokens.to_json(),
            "statuses": self.statuses.to_json(),
            "inventory": self.inventory.to_json(),
            "board": self.layout().to_json()
        })
    }
}
