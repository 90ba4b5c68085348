//! Token positions and move animation.
//!
//! The coordinator owns every [`PlayerToken`]. A move becomes a queue of
//! steps (walk cell by cell, then at most one ladder/snake jump) which
//! [`TokenAnimationCoordinator::advance`] plays frame by frame.
//!
//! Tokens animate independently of each other. The orchestrator only asks
//! whether *anything* is animating before it lets the local player act.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SessionConfig;
use crate::state::board::{BoardLayout, VisualPoint};

/// A player's piece on the board.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerToken {
    pub user_id: i64,
    pub display_name: String,
    pub skin_id: Option<i64>,
    /// Visual cell index (never 0)
    pub current_cell_index: u32,
    /// Vertical hop offset in grid units, 0 when resting
    pub visual_offset: f32,
    /// Current center in grid units
    pub position: VisualPoint,
}

impl PlayerToken {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "user_id": self.user_id,
            "display_name": self.display_name,
            "skin_id": self.skin_id,
            "cell_index": self.current_cell_index,
            "x": self.position.x,
            "y": self.position.y - self.visual_offset
        })
    }
}

/// How a single step moves the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// One cell along the track, with a hop
    Walk,
    /// Ladder or snake, resolved on the spot
    Jump,
    /// Correction to where the server says the move starts
    Snap,
}

#[derive(Debug, Clone, Copy)]
struct Step {
    to_index: u32,
    kind: StepKind,
    duration: Duration,
}

#[derive(Debug, Clone, Copy)]
struct ActiveStep {
    from: VisualPoint,
    to: VisualPoint,
    to_index: u32,
    kind: StepKind,
    elapsed: Duration,
    duration: Duration,
}

impl ActiveStep {
    fn progress(&self) -> f32 {
        if self.duration.is_zero() {
            1.0
        } else {
            (self.elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
        }
    }
}

/// A token finished its whole queued sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationFinished {
    pub user_id: i64,
    pub cell_index: u32,
}

/// Why a move request was not animated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Steps queued
    Animating,
    /// Origin and destination coincide and there is no link
    NoMovement,
    /// Destination not on the board; token left at its last valid cell
    SnappedToLastValid,
    UnknownToken,
}

/// Owns token positions and plays move sequences.
#[derive(Debug, Clone)]
pub struct TokenAnimationCoordinator {
    layout: Arc<BoardLayout>,
    tokens: HashMap<i64, PlayerToken>,
    /// Roster order
    order: Vec<i64>,
    queues: HashMap<i64, VecDeque<Step>>,
    active: HashMap<i64, ActiveStep>,
    step_duration: Duration,
    hop_height: f32,
}

impl TokenAnimationCoordinator {
    pub fn new(layout: Arc<BoardLayout>, config: &SessionConfig) -> Self {
        Self {
            layout,
            tokens: HashMap::new(),
            order: Vec::new(),
            queues: HashMap::new(),
            active: HashMap::new(),
            step_duration: config.step_duration(),
            hop_height: config.hop_height,
        }
    }

    pub fn layout(&self) -> &Arc<BoardLayout> {
        &self.layout
    }

    /// Map a server cell index to the cell the token is drawn on.
    ///
    /// The server reports 0 for a player who has not been placed yet; such a
    /// token is drawn on the start cell.
    pub fn visual_index(&self, server_index: u32) -> u32 {
        if server_index == 0 {
            self.layout.start_cell_index()
        } else {
            server_index
        }
    }

    fn point_for(&self, index: u32) -> VisualPoint {
        self.layout
            .center(index)
            .or_else(|| self.layout.center(self.layout.start_cell_index()))
            .unwrap_or_default()
    }

    /// Place a new token, or update the identity of an existing one.
    pub fn add_token(
        &mut self,
        user_id: i64,
        display_name: impl Into<String>,
        skin_id: Option<i64>,
        server_cell_index: u32,
    ) {
        let display_name = display_name.into();
        if let Some(token) = self.tokens.get_mut(&user_id) {
            token.display_name = display_name;
            token.skin_id = skin_id;
            return;
        }

        let mut cell = self.visual_index(server_cell_index);
        if !self.layout.contains(cell) {
            tracing::warn!(user_id, cell_index = cell, "Token placed off the board, using start cell");
            cell = self.layout.start_cell_index();
        }

        let position = self.point_for(cell);
        self.tokens.insert(
            user_id,
            PlayerToken {
                user_id,
                display_name,
                skin_id,
                current_cell_index: cell,
                visual_offset: 0.0,
                position,
            },
        );
        self.order.push(user_id);
    }

    pub fn remove_token(&mut self, user_id: i64) -> Option<PlayerToken> {
        self.queues.remove(&user_id);
        self.active.remove(&user_id);
        self.order.retain(|id| *id != user_id);
        self.tokens.remove(&user_id)
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
        self.order.clear();
        self.queues.clear();
        self.active.clear();
    }

    pub fn token(&self, user_id: i64) -> Option<&PlayerToken> {
        self.tokens.get(&user_id)
    }

    /// Tokens in roster order.
    pub fn tokens(&self) -> impl Iterator<Item = &PlayerToken> {
        self.order.iter().filter_map(|id| self.tokens.get(id))
    }

    pub fn has_tokens(&self) -> bool {
        !self.tokens.is_empty()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_animating(&self) -> bool {
        !self.active.is_empty() || self.queues.values().any(|q| !q.is_empty())
    }

    pub fn is_token_animating(&self, user_id: i64) -> bool {
        self.active.contains_key(&user_id)
            || self.queues.get(&user_id).is_some_and(|q| !q.is_empty())
    }

    /// Where the token will rest once its queued steps are played.
    fn planned_cell(&self, user_id: i64) -> Option<u32> {
        if let Some(last) = self.queues.get(&user_id).and_then(|q| q.back()) {
            return Some(last.to_index);
        }
        if let Some(active) = self.active.get(&user_id) {
            return Some(active.to_index);
        }
        self.tokens.get(&user_id).map(|t| t.current_cell_index)
    }

    /// Queue a move from `from_cell` to `to_cell` (server indices).
    ///
    /// Walks one cell at a time, then resolves a ladder or snake starting at
    /// the destination with a single jump.
    pub fn begin_move(&mut self, user_id: i64, from_cell: u32, to_cell: u32) -> MoveOutcome {
        let Some(planned) = self.planned_cell(user_id) else {
            tracing::warn!(user_id, "Move for unknown token ignored");
            return MoveOutcome::UnknownToken;
        };

        let to = self.visual_index(to_cell);
        if !self.layout.contains(to) {
            tracing::warn!(
                user_id,
                to_cell,
                last_valid = planned,
                "Move destination not on the board, snapping to last valid cell"
            );
            self.snap_to(user_id, planned);
            return MoveOutcome::SnappedToLastValid;
        }

        let from = self.visual_index(from_cell);
        let from = if self.layout.contains(from) { from } else { planned };

        let mut steps = Vec::new();
        if from != planned {
            tracing::debug!(user_id, from, planned, "Move origin differs from token position");
            steps.push(Step {
                to_index: from,
                kind: StepKind::Snap,
                duration: Duration::ZERO,
            });
        }

        let walk: Vec<u32> = if to >= from {
            (from + 1..=to).collect()
        } else {
            (to..from).rev().collect()
        };
        steps.extend(walk.into_iter().map(|index| Step {
            to_index: index,
            kind: StepKind::Walk,
            duration: self.step_duration,
        }));

        if let Some(link) = self.layout.link_from(to) {
            tracing::debug!(
                user_id,
                start_index = link.start_index,
                end_index = link.end_index,
                is_ladder = link.is_ladder,
                "Resolving link"
            );
            steps.push(Step {
                to_index: link.end_index,
                kind: StepKind::Jump,
                duration: Duration::ZERO,
            });
        }

        if steps.is_empty() {
            return MoveOutcome::NoMovement;
        }

        self.queues.entry(user_id).or_default().extend(steps);
        MoveOutcome::Animating
    }

    /// Place a token immediately, dropping any queued animation.
    pub fn snap_to(&mut self, user_id: i64, server_cell_index: u32) {
        let mut cell = self.visual_index(server_cell_index);
        let Some(current) = self.tokens.get(&user_id).map(|t| t.current_cell_index) else {
            return;
        };
        if !self.layout.contains(cell) {
            tracing::warn!(user_id, cell_index = cell, "Snap target not on the board, keeping last valid cell");
            cell = current;
        }

        self.queues.remove(&user_id);
        self.active.remove(&user_id);
        let position = self.point_for(cell);
        if let Some(token) = self.tokens.get_mut(&user_id) {
            token.current_cell_index = cell;
            token.position = position;
            token.visual_offset = 0.0;
        }
    }

    /// Advance every animation by `dt`.
    ///
    /// Returns the tokens whose whole sequence finished during this frame.
    pub fn advance(&mut self, dt: Duration) -> Vec<AnimationFinished> {
        let mut finished = Vec::new();

        for user_id in self.order.clone() {
            let mut budget = dt;
            loop {
                if !self.active.contains_key(&user_id) {
                    let Some(step) = self.queues.get_mut(&user_id).and_then(|q| q.pop_front())
                    else {
                        break;
                    };
                    let Some(from) = self.tokens.get(&user_id).map(|t| t.position) else {
                        break;
                    };
                    let to = self.point_for(step.to_index);
                    self.active.insert(
                        user_id,
                        ActiveStep {
                            from,
                            to,
                            to_index: step.to_index,
                            kind: step.kind,
                            elapsed: Duration::ZERO,
                            duration: step.duration,
                        },
                    );
                }

                let Some(active) = self.active.get_mut(&user_id) else {
                    break;
                };
                let remaining = active.duration.saturating_sub(active.elapsed);

                if budget >= remaining {
                    budget -= remaining;
                    let done = *active;
                    self.active.remove(&user_id);
                    if let Some(token) = self.tokens.get_mut(&user_id) {
                        token.current_cell_index = done.to_index;
                        token.position = done.to;
                        token.visual_offset = 0.0;
                    }

                    let drained = self.queues.get(&user_id).map_or(true, |q| q.is_empty());
                    if drained {
                        self.queues.remove(&user_id);
                        finished.push(AnimationFinished {
                            user_id,
                            cell_index: done.to_index,
                        });
                        break;
                    }
                } else {
                    active.elapsed += budget;
                    let frame = *active;
                    if let Some(token) = self.tokens.get_mut(&user_id) {
                        let t = frame.progress();
                        token.position = frame.from.lerp(frame.to, t);
                        token.visual_offset = match frame.kind {
                            StepKind::Walk => self.hop_height * (std::f32::consts::PI * t).sin(),
                            StepKind::Jump | StepKind::Snap => 0.0,
                        };
                    }
                    break;
                }
            }
        }

        finished
    }

    /// Play every queued step to completion.
    pub fn finish_all(&mut self) -> Vec<AnimationFinished> {
        let mut finished = Vec::new();
        while self.is_animating() {
            let total: Duration = self
                .queues
                .values()
                .flat_map(|q| q.iter().map(|s| s.duration))
                .sum::<Duration>()
                + self
                    .active
                    .values()
                    .map(|a| a.duration.saturating_sub(a.elapsed))
                    .sum::<Duration>();
            finished.extend(self.advance(total));
        }
        finished
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.tokens().map(|t| t.to_json()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::board::tests::{ladder, snake, square_definition};
    use crate::state::board::BoardGeometryBuilder;

    fn coordinator(links: Vec<crate::state::board::LinkDefinition>) -> TokenAnimationCoordinator {
        let layout = BoardGeometryBuilder::new()
            .build(&square_definition(10, 10, links))
            .unwrap();
        TokenAnimationCoordinator::new(Arc::new(layout), &SessionConfig::default())
    }

    const STEP: Duration = Duration::from_millis(250);

    #[test]
    fn test_zero_maps_to_start_cell() {
        let mut coord = coordinator(vec![]);
        assert_eq!(coord.visual_index(0), 1);
        assert_eq!(coord.visual_index(37), 37);

        coord.add_token(7, "Newcomer", None, 0);
        let token = coord.token(7).unwrap();
        assert_eq!(token.current_cell_index, 1);
        assert_eq!(token.position, coord.layout().center(1).unwrap());
    }

    #[test]
    fn test_walk_step_by_step() {
        let mut coord = coordinator(vec![]);
        coord.add_token(1, "Alice", None, 3);

        assert_eq!(coord.begin_move(1, 3, 6), MoveOutcome::Animating);
        assert!(coord.is_animating());

        assert!(coord.advance(STEP).is_empty());
        assert_eq!(coord.token(1).unwrap().current_cell_index, 4);

        // Halfway through the next step the token is in the air.
        coord.advance(STEP / 2);
        let token = coord.token(1).unwrap();
        assert_eq!(token.current_cell_index, 4);
        assert!(token.visual_offset > 0.0);

        let finished = coord.advance(STEP * 2);
        assert_eq!(
            finished,
            vec![AnimationFinished {
                user_id: 1,
                cell_index: 6
            }]
        );
        assert!(!coord.is_animating());
        assert_eq!(coord.token(1).unwrap().visual_offset, 0.0);
    }

    #[test]
    fn test_snake_resolves_after_walk() {
        let mut coord = coordinator(vec![snake(17, 4)]);
        coord.add_token(1, "Alice", None, 14);

        coord.begin_move(1, 14, 17);
        let finished = coord.finish_all();

        assert_eq!(finished.last().unwrap().cell_index, 4);
        let token = coord.token(1).unwrap();
        assert_eq!(token.current_cell_index, 4);
        assert_eq!(token.position, coord.layout().center(4).unwrap());
    }

    #[test]
    fn test_ladder_resolves_after_walk() {
        let mut coord = coordinator(vec![ladder(8, 31)]);
        coord.add_token(1, "Alice", None, 5);

        coord.begin_move(1, 5, 8);
        coord.finish_all();
        assert_eq!(coord.token(1).unwrap().current_cell_index, 31);
    }

    #[test]
    fn test_backward_walk() {
        let mut coord = coordinator(vec![]);
        coord.add_token(1, "Alice", None, 20);

        coord.begin_move(1, 20, 17);
        coord.advance(STEP);
        assert_eq!(coord.token(1).unwrap().current_cell_index, 19);
        coord.finish_all();
        assert_eq!(coord.token(1).unwrap().current_cell_index, 17);
    }

    #[test]
    fn test_invalid_destination_snaps_to_last_valid() {
        let mut coord = coordinator(vec![]);
        coord.add_token(1, "Alice", None, 42);

        assert_eq!(coord.begin_move(1, 42, 250), MoveOutcome::SnappedToLastValid);
        assert!(!coord.is_animating());
        assert_eq!(coord.token(1).unwrap().current_cell_index, 42);
    }

    #[test]
    fn test_unknown_token() {
        let mut coord = coordinator(vec![]);
        assert_eq!(coord.begin_move(9, 1, 5), MoveOutcome::UnknownToken);
        assert!(!coord.is_animating());
    }

    #[test]
    fn test_moves_queue_per_token() {
        let mut coord = coordinator(vec![]);
        coord.add_token(1, "Alice", None, 1);
        coord.add_token(2, "Bob", None, 1);

        coord.begin_move(1, 1, 3);
        coord.begin_move(1, 3, 5);
        coord.begin_move(2, 1, 2);

        let finished = coord.advance(STEP);
        // Bob's single step completes, Alice still has three to go.
        assert_eq!(finished, vec![AnimationFinished { user_id: 2, cell_index: 2 }]);
        assert!(coord.is_token_animating(1));
        assert!(!coord.is_token_animating(2));

        coord.finish_all();
        assert_eq!(coord.token(1).unwrap().current_cell_index, 5);
    }

    #[test]
    fn test_mismatched_origin_snaps_first() {
        let mut coord = coordinator(vec![]);
        coord.add_token(1, "Alice", None, 10);

        coord.begin_move(1, 12, 14);
        coord.advance(Duration::ZERO);
        assert_eq!(coord.token(1).unwrap().current_cell_index, 12);
        coord.finish_all();
        assert_eq!(coord.token(1).unwrap().current_cell_index, 14);
    }

    #[test]
    fn test_snap_cancels_animation() {
        let mut coord = coordinator(vec![]);
        coord.add_token(1, "Alice", None, 1);
        coord.begin_move(1, 1, 6);
        coord.advance(STEP);

        coord.snap_to(1, 50);
        assert!(!coord.is_animating());
        assert_eq!(coord.token(1).unwrap().current_cell_index, 50);
    }

    #[test]
    fn test_remove_token() {
        let mut coord = coordinator(vec![]);
        coord.add_token(1, "Alice", None, 1);
        coord.add_token(2, "Bob", None, 1);
        coord.begin_move(2, 1, 4);

        assert!(coord.remove_token(2).is_some());
        assert!(!coord.is_animating());
        assert_eq!(coord.tokens().map(|t| t.user_id).collect::<Vec<_>>(), vec![1]);
    }
}
