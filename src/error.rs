//! Error types shared across the session.
//!
//! Expected failures (a server saying "no", a board missing a cell) are typed
//! values. Nothing in this crate panics on bad server input.

use std::fmt;

use crate::state::SessionPhase;

/// Errors raised while building a board layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("malformed board definition: {0}")]
    Malformed(String),

    #[error("board definition has no cell with index {0}")]
    MissingCell(u32),
}

/// Errors returned by every call through the game service port.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// The server processed the request and refused it.
    #[error("request refused: {reason}")]
    Business { reason: String },

    /// Timeout, unreachable endpoint or a broken channel.
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl RpcError {
    pub fn business(reason: impl Into<String>) -> Self {
        Self::Business {
            reason: reason.into(),
        }
    }

    pub fn is_business(&self) -> bool {
        matches!(self, Self::Business { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Player commands, used to label rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Join,
    RollDice,
    SelectDiceSlot,
    UseItem,
    PrepareItemTarget,
    SelectTarget,
    CancelTargetSelection,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::RollDice => "roll_dice",
            Self::SelectDiceSlot => "select_dice_slot",
            Self::UseItem => "use_item",
            Self::PrepareItemTarget => "prepare_item_target",
            Self::SelectTarget => "select_target",
            Self::CancelTargetSelection => "cancel_target_selection",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command that is not permitted in the current phase.
///
/// Rejections never reach the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{command} rejected in phase {phase}: {reason}")]
pub struct CommandRejected {
    pub command: CommandKind,
    pub phase: SessionPhase,
    pub reason: &'static str,
}

/// Crate-level error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Board(#[from] BoardError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Rejected(#[from] CommandRejected),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("malformed server event: {0}")]
    MalformedEvent(serde_json::Error),

    #[error("session channel closed")]
    Closed,
}
