//! Turn ownership and the local player's action phase.
//!
//! # Phase Diagram
//!
//! ```text
//!                 turn gained
//! ┌──────┐ ─────────────────────▶ ┌────────────┐  roll   ┌─────────────────────┐
//! │ Idle │                        │ MyTurnIdle │────────▶│ RollRequestInFlight │
//! └──────┘ ◀───────────────────── └────────────┘◀────────└─────────────────────┘
//!                 turn lost         │   ▲   ▲  response
//!                                   │   │   │
//!                     prepare target│   │   └───────────────────────┐
//!                                   ▼   │ cancel                    │ response
//!                       ┌────────────────────┐ select target ┌────────────────────────┐
//!                       │ AwaitingItemTarget │──────────────▶│ UseItemRequestInFlight │
//!                       └────────────────────┘               └────────────────────────┘
//! ```
//!
//! The phase is derived from turn ownership and the in-flight flags rather
//! than stored, so it can never disagree with what the guard sees.

use std::fmt;

use crate::state::guard::ActionInFlightFlags;

/// Whose turn it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TurnState {
    /// 0 until the first turn is known
    pub current_turn_user_id: i64,
    pub remaining_seconds: u32,
    /// Bumped on every real owner change
    epoch: u64,
}

impl TurnState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_turn_of(&self, user_id: i64) -> bool {
        self.current_turn_user_id != 0 && self.current_turn_user_id == user_id
    }

    /// Record the turn owner; returns the previous owner on a real change.
    pub fn set_owner(&mut self, user_id: i64) -> Option<i64> {
        if self.current_turn_user_id == user_id {
            return None;
        }
        let previous = self.current_turn_user_id;
        self.current_turn_user_id = user_id;
        self.epoch += 1;
        Some(previous)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "current_turn_user_id": self.current_turn_user_id,
            "remaining_seconds": self.remaining_seconds
        })
    }
}

/// An item that has been chosen but still needs a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingItemAction {
    pub slot_number: u8,
    pub awaiting_target: bool,
}

/// The local player's action phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Not the local player's turn
    #[default]
    Idle,
    MyTurnIdle,
    RollRequestInFlight,
    AwaitingItemTarget { slot: u8 },
    UseItemRequestInFlight,
}

impl SessionPhase {
    pub fn derive(
        is_my_turn: bool,
        flags: &ActionInFlightFlags,
        pending: Option<&PendingItemAction>,
    ) -> Self {
        if flags.roll_in_progress {
            return Self::RollRequestInFlight;
        }
        if flags.use_item_in_progress {
            return Self::UseItemRequestInFlight;
        }
        // An open selection outlives an unconfirmed turn until it is
        // cancelled or the turn is lost.
        if let Some(p) = pending.filter(|p| p.awaiting_target) {
            return Self::AwaitingItemTarget {
                slot: p.slot_number,
            };
        }
        if is_my_turn {
            Self::MyTurnIdle
        } else {
            Self::Idle
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::MyTurnIdle => "my_turn_idle",
            Self::RollRequestInFlight => "roll_request_in_flight",
            Self::AwaitingItemTarget { .. } => "awaiting_item_target",
            Self::UseItemRequestInFlight => "use_item_request_in_flight",
        }
    }

    pub fn is_request_in_flight(&self) -> bool {
        matches!(self, Self::RollRequestInFlight | Self::UseItemRequestInFlight)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::MyTurnIdle => write!(f, "MyTurnIdle"),
            Self::RollRequestInFlight => write!(f, "RollRequestInFlight"),
            Self::AwaitingItemTarget { slot } => write!(f, "AwaitingItemTarget({})", slot),
            Self::UseItemRequestInFlight => write!(f, "UseItemRequestInFlight"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_change_bumps_epoch() {
        let mut turn = TurnState::new();
        assert_eq!(turn.set_owner(5), Some(0));
        assert_eq!(turn.epoch(), 1);

        // Same owner again is not a transition.
        assert_eq!(turn.set_owner(5), None);
        assert_eq!(turn.epoch(), 1);

        assert_eq!(turn.set_owner(6), Some(5));
        assert_eq!(turn.epoch(), 2);
        assert!(turn.is_turn_of(6));
        assert!(!turn.is_turn_of(5));
    }

    #[test]
    fn test_nobody_owns_turn_initially() {
        let turn = TurnState::new();
        assert!(!turn.is_turn_of(0));
    }

    #[test]
    fn test_phase_derivation() {
        let idle = ActionInFlightFlags::default();
        assert_eq!(SessionPhase::derive(false, &idle, None), SessionPhase::Idle);
        assert_eq!(SessionPhase::derive(true, &idle, None), SessionPhase::MyTurnIdle);

        let rolling = ActionInFlightFlags {
            roll_in_progress: true,
            ..idle
        };
        // A request stays in flight even if the turn moved on.
        assert_eq!(
            SessionPhase::derive(false, &rolling, None),
            SessionPhase::RollRequestInFlight
        );

        let pending = PendingItemAction {
            slot_number: 2,
            awaiting_target: true,
        };
        let targeting = ActionInFlightFlags {
            target_selection_active: true,
            ..idle
        };
        assert_eq!(
            SessionPhase::derive(true, &targeting, Some(&pending)),
            SessionPhase::AwaitingItemTarget { slot: 2 }
        );
        assert_eq!(
            SessionPhase::derive(false, &targeting, Some(&pending)),
            SessionPhase::AwaitingItemTarget { slot: 2 }
        );

        let using = ActionInFlightFlags {
            use_item_in_progress: true,
            ..idle
        };
        assert_eq!(
            SessionPhase::derive(true, &using, None),
            SessionPhase::UseItemRequestInFlight
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            SessionPhase::AwaitingItemTarget { slot: 3 }.to_string(),
            "AwaitingItemTarget(3)"
        );
        assert_eq!(SessionPhase::MyTurnIdle.as_str(), "my_turn_idle");
    }
}
