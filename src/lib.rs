//! Ladder Session Library
//!
//! Client-side session logic for a networked snakes-and-ladders style board
//! game.
//!
//! # Overview
//!
//! - **Board geometry** - Turns a server board definition into a cell grid
//!   with visual centers and a ladder/snake index.
//!
//! - **Token animation** - Walks tokens cell by cell and resolves ladders and
//!   snakes with a single jump.
//!
//! - **Status effects** - Shield and freeze countdowns, advanced once per turn
//!   and overwritten by authoritative snapshots.
//!
//! - **Action guard** - One pure policy deciding which player actions are
//!   allowed, so at most one mutating request is ever in flight.
//!
//! - **Session orchestration** - Routes server push events, runs player
//!   commands against the game service and reconciles with the server's
//!   full state when pushes alone cannot be trusted.
//!
//! # Design Principles
//!
//! 1. **The server is authoritative** - Local state is a view. Turn changes
//!    are confirmed by a snapshot before the local player may act.
//!
//! 2. **One owner, one queue** - All session state lives in the orchestrator
//!    and changes only while it drains its input queue.
//!
//! 3. **Typed failures** - Business refusals, transport errors and rejected
//!    commands are values, never panics.
//!
//! 4. **Serialization-ready** - State types render to JSON for presentation.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ladder_session::{BoardDefinition, GameSessionOrchestrator, SessionConfig, SessionContext};
//!
//! let board = BoardDefinition::from_json_str(&board_json)?;
//! let context = SessionContext::new("game-42", 7, "Alice");
//! let (session, handle, mut notices) = GameSessionOrchestrator::new(
//!     context,
//!     SessionConfig::default(),
//!     &board,
//!     Arc::new(transport),
//! )?;
//! session.spawn();
//!
//! handle.join()?;
//! // Transport callback:
//! handle.push_raw_event(&frame)?;
//! // Button press, refused locally if a roll is already in flight:
//! handle.roll_dice(None)?;
//!
//! while let Some(notice) = notices.recv().await {
//!     render(notice, handle.controls());
//! }
//! ```

pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod state;

pub use config::{SessionConfig, SessionContext};
pub use error::{BoardError, CommandKind, CommandRejected, RpcError, SessionError};
pub use protocol::{GameServicePort, ServerEvent, TurnChangeReason};
pub use session::{
    ControlSnapshot, GameSessionOrchestrator, PlayerCommand, SessionHandle, SessionNotice,
    TimeoutPenalty,
};

// Re-export everything from state module at crate root
pub use state::*;
