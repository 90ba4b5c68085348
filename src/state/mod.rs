//! Session state components.
//!
//! Everything here is synchronous and free of I/O. The orchestrator in
//! [`crate::session`] owns one of each and drives them from server events,
//! player commands and the tick.
//!
//! - `board` - Board definition to cell grid, visual centers and link index
//! - `token` - Token positions and move animation
//! - `status` - Shield and freeze countdowns
//! - `guard` - Which actions are currently permitted
//! - `turn` - Turn ownership and the local action phase
//! - `timer` - Local turn countdown
//! - `watchdog` - Server silence detection
//! - `inventory` - Items and dice held by the local player
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                     GameSessionOrchestrator                          │
//! │                                                                      │
//! │  ┌──────────────────┐   ┌──────────────────────────────────────┐     │
//! │  │ BoardLayout      │◀──│ TokenAnimationCoordinator            │     │
//! │  │ index → center   │   │ user_id → PlayerToken                │     │
//! │  │ start → link     │   │ user_id → queued Walk/Jump/Snap steps │     │
//! │  └──────────────────┘   └──────────────────────────────────────┘     │
//! │                                                                      │
//! │  ┌──────────────────┐   ┌──────────────┐   ┌─────────────────────┐   │
//! │  │ PlayerStatus-    │   │ TurnState    │   │ TurnTimer           │   │
//! │  │ Tracker          │   │ owner, epoch │   │ InactivityWatchdog  │   │
//! │  │ user_id → effect │   └──────────────┘   └─────────────────────┘   │
//! │  └──────────────────┘                                                │
//! │                                                                      │
//! │  ActionInFlightFlags ──▶ ActionGuard ──▶ ControlState / SessionPhase │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use ladder_session::state::board::{BoardDefinition, BoardGeometryBuilder};
//!
//! let definition = BoardDefinition::from_json_str(
//!     r#"{"rows": 2, "columns": 2, "cells": [
//!         {"index": 1, "row": 1, "col": 0}, {"index": 2, "row": 1, "col": 1},
//!         {"index": 3, "row": 0, "col": 1}, {"index": 4, "row": 0, "col": 0}
//!     ], "links": [{"startIndex": 2, "endIndex": 4, "isLadder": true}]}"#,
//! )
//! .unwrap();
//! let layout = BoardGeometryBuilder::new().build(&definition).unwrap();
//! assert_eq!(layout.link_from(2).map(|l| l.end_index), Some(4));
//! ```

pub mod board;
pub mod guard;
pub mod inventory;
pub mod status;
pub mod timer;
pub mod token;
pub mod turn;
pub mod watchdog;

// Re-export commonly used types
pub use board::{
    BoardCell, BoardDefinition, BoardGeometryBuilder, BoardLayout, BoardLink, CellDefinition,
    LinkDefinition, SpecialType, VisualPoint,
};
pub use guard::{ActionGuard, ActionInFlightFlags, ControlState};
pub use inventory::{DiceSlot, Inventory, ItemKind, ItemSlot};
pub use status::{EffectResult, PlayerStatusEffect, PlayerStatusTracker, StatusEffect};
pub use timer::{TimerTick, TurnTimer};
pub use token::{AnimationFinished, MoveOutcome, PlayerToken, StepKind, TokenAnimationCoordinator};
pub use turn::{PendingItemAction, SessionPhase, TurnState};
pub use watchdog::{InactivityWatchdog, WatchdogStatus};
