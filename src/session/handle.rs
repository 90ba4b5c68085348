//! Cloneable front door to a running session.
//!
//! Transport callbacks and the presentation layer never touch session state
//! directly. They enqueue onto the orchestrator's input queue, which is the
//! only place state changes. The handle also reads the published control
//! snapshot so a command the guard would refuse is rejected here, before it
//! is even queued. The orchestrator checks again when it applies it.

use tokio::sync::{mpsc, watch};

use crate::error::{CommandKind, CommandRejected, RpcError, SessionError};
use crate::protocol::{GameStateSnapshot, JoinGameResponse, RollOutcome, ServerEvent};
use crate::state::guard::ControlState;
use crate::state::inventory::Inventory;
use crate::state::turn::SessionPhase;

/// What the presentation layer needs to enable or disable its controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlSnapshot {
    pub phase: SessionPhase,
    pub controls: ControlState,
    pub is_my_turn: bool,
}

impl ControlSnapshot {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "phase": self.phase.as_str(),
            "is_my_turn": self.is_my_turn,
            "controls": self.controls.to_json()
        })
    }
}

/// Commands issued by the local player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    Join,
    /// `None` rolls with the currently selected dice slot, if any
    RollDice { dice_slot: Option<u8> },
    /// `None` clears the selection
    SelectDiceSlot { slot: Option<u8> },
    UseItem { slot: u8 },
    PrepareItemTarget { slot: u8 },
    SelectTarget { target_user_id: i64 },
    CancelTargetSelection,
    SyncGameState { force: bool },
    RefreshInventory,
}

/// Result of a spawned server call, posted back onto the queue.
#[derive(Debug)]
pub(crate) enum Completion {
    Joined(Result<JoinGameResponse, RpcError>),
    Rolled {
        epoch: u64,
        result: Result<RollOutcome, RpcError>,
    },
    ItemUsed {
        epoch: u64,
        slot: u8,
        target_user_id: Option<i64>,
        result: Result<(), RpcError>,
    },
    Synced {
        request_id: u64,
        force: bool,
        result: Result<GameStateSnapshot, RpcError>,
    },
    InventoryLoaded(Result<Inventory, RpcError>),
    TimeoutRegistered {
        user_id: i64,
        result: Result<(), RpcError>,
    },
}

/// Everything the orchestrator consumes.
#[derive(Debug)]
pub(crate) enum SessionInput {
    Server(ServerEvent),
    Command(PlayerCommand),
    Completed(Completion),
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct SessionHandle {
    inputs: mpsc::UnboundedSender<SessionInput>,
    controls: watch::Receiver<ControlSnapshot>,
}

impl SessionHandle {
    pub(crate) fn new(
        inputs: mpsc::UnboundedSender<SessionInput>,
        controls: watch::Receiver<ControlSnapshot>,
    ) -> Self {
        Self { inputs, controls }
    }

    /// Current control state as last published by the orchestrator.
    pub fn controls(&self) -> ControlSnapshot {
        *self.controls.borrow()
    }

    /// Watch control changes, e.g. to re-render buttons.
    pub fn subscribe_controls(&self) -> watch::Receiver<ControlSnapshot> {
        self.controls.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inputs.is_closed()
    }

    /// Hand a push notification to the session. Safe to call from any task.
    pub fn push_event(&self, event: ServerEvent) -> Result<(), SessionError> {
        self.send(SessionInput::Server(event))
    }

    /// Decode and hand over a raw JSON push notification.
    pub fn push_raw_event(&self, raw: &str) -> Result<(), SessionError> {
        let event = ServerEvent::from_json_str(raw).map_err(SessionError::MalformedEvent)?;
        self.push_event(event)
    }

    pub fn join(&self) -> Result<(), SessionError> {
        self.send(SessionInput::Command(PlayerCommand::Join))
    }

    pub fn roll_dice(&self, dice_slot: Option<u8>) -> Result<(), SessionError> {
        self.check(CommandKind::RollDice, |c| c.can_roll_dice)?;
        self.send(SessionInput::Command(PlayerCommand::RollDice { dice_slot }))
    }

    pub fn select_dice_slot(&self, slot: Option<u8>) -> Result<(), SessionError> {
        if slot.is_some() {
            self.check(CommandKind::SelectDiceSlot, |c| c.can_roll_dice)?;
        }
        self.send(SessionInput::Command(PlayerCommand::SelectDiceSlot { slot }))
    }

    pub fn use_item(&self, slot: u8) -> Result<(), SessionError> {
        self.check(CommandKind::UseItem, |c| c.can_use_item)?;
        self.send(SessionInput::Command(PlayerCommand::UseItem { slot }))
    }

    pub fn prepare_item_target(&self, slot: u8) -> Result<(), SessionError> {
        self.check(CommandKind::PrepareItemTarget, |c| c.can_use_item)?;
        self.send(SessionInput::Command(PlayerCommand::PrepareItemTarget { slot }))
    }

    pub fn select_target(&self, target_user_id: i64) -> Result<(), SessionError> {
        self.check(CommandKind::SelectTarget, |c| c.can_select_target)?;
        self.send(SessionInput::Command(PlayerCommand::SelectTarget { target_user_id }))
    }

    pub fn cancel_target_selection(&self) -> Result<(), SessionError> {
        self.check(CommandKind::CancelTargetSelection, |c| c.can_cancel_target)?;
        self.send(SessionInput::Command(PlayerCommand::CancelTargetSelection))
    }

    pub fn sync_game_state(&self, force: bool) -> Result<(), SessionError> {
        self.send(SessionInput::Command(PlayerCommand::SyncGameState { force }))
    }

    pub fn refresh_inventory(&self) -> Result<(), SessionError> {
        self.send(SessionInput::Command(PlayerCommand::RefreshInventory))
    }

    /// Ask the run loop to stop. Requests already in flight are abandoned.
    pub fn shutdown(&self) -> Result<(), SessionError> {
        self.send(SessionInput::Shutdown)
    }

    fn check(
        &self,
        command: CommandKind,
        allowed: impl FnOnce(&ControlState) -> bool,
    ) -> Result<(), CommandRejected> {
        let snapshot = self.controls();
        if allowed(&snapshot.controls) {
            Ok(())
        } else {
            tracing::debug!(
                command = command.as_str(),
                phase = snapshot.phase.as_str(),
                "Command rejected at handle"
            );
            Err(CommandRejected {
                command,
                phase: snapshot.phase,
                reason: "not permitted by current controls",
            })
        }
    }

    fn send(&self, input: SessionInput) -> Result<(), SessionError> {
        self.inputs.send(input).map_err(|_| SessionError::Closed)
    }
}
