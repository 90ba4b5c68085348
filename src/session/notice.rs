//! Notifications for the presentation layer.

use crate::error::CommandKind;
use crate::state::inventory::ItemKind;
use crate::state::status::EffectResult;

/// How a timed-out player was dealt with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPenalty {
    Skipped,
    Kicked,
}

/// Something the player should see or hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    Joined {
        player_count: usize,
    },
    TurnChanged {
        user_id: i64,
        is_mine: bool,
    },
    /// The previous owner lost the turn to a timeout
    TurnTimedOut {
        user_id: i64,
        penalty: TimeoutPenalty,
    },
    TimerUpdated {
        remaining_seconds: u32,
    },
    DiceRolled {
        dice_value: u32,
        from_cell: u32,
        to_cell: u32,
        granted_item: Option<ItemKind>,
        granted_dice_code: Option<String>,
    },
    /// A landed-on cell carries a message
    CellMessage {
        user_id: i64,
        message_index: u32,
    },
    ItemUsed {
        item: ItemKind,
        user_id: i64,
        target_user_id: Option<i64>,
        effect: EffectResult,
    },
    AwaitingTarget {
        slot: u8,
        item: ItemKind,
    },
    TargetSelectionCancelled,
    InventoryChanged,
    PlayerLeft {
        user_id: i64,
        reason: String,
    },
    LocalPlayerRemoved {
        reason: String,
    },
    ReachedFinalCell {
        user_id: i64,
    },
    /// The server refused a request
    RequestRefused {
        command: CommandKind,
        reason: String,
    },
    ConnectivityFailure {
        command: Option<CommandKind>,
    },
    UnexpectedError {
        message: String,
    },
    ConnectionLost,
}

impl SessionNotice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Joined { .. } => "joined",
            Self::TurnChanged { .. } => "turn_changed",
            Self::TurnTimedOut { .. } => "turn_timed_out",
            Self::TimerUpdated { .. } => "timer_updated",
            Self::DiceRolled { .. } => "dice_rolled",
            Self::CellMessage { .. } => "cell_message",
            Self::ItemUsed { .. } => "item_used",
            Self::AwaitingTarget { .. } => "awaiting_target",
            Self::TargetSelectionCancelled => "target_selection_cancelled",
            Self::InventoryChanged => "inventory_changed",
            Self::PlayerLeft { .. } => "player_left",
            Self::LocalPlayerRemoved { .. } => "local_player_removed",
            Self::ReachedFinalCell { .. } => "reached_final_cell",
            Self::RequestRefused { .. } => "request_refused",
            Self::ConnectivityFailure { .. } => "connectivity_failure",
            Self::UnexpectedError { .. } => "unexpected_error",
            Self::ConnectionLost => "connection_lost",
        }
    }

    /// Failures the player should be alerted about.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::RequestRefused { .. }
                | Self::ConnectivityFailure { .. }
                | Self::UnexpectedError { .. }
                | Self::ConnectionLost
        )
    }
}
