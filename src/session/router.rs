//! Routing of server push events.
//!
//! One `match` over [`ServerEvent`]. Each event first counts as server
//! activity, then updates the components it concerns and schedules a
//! reconciling sync where the push alone is not trusted.

use std::time::Instant;

use super::{GameSessionOrchestrator, SessionNotice, TimeoutPenalty};
use crate::protocol::{ServerEvent, TurnChangeReason};
use crate::state::inventory::ItemKind;
use crate::state::status::{EffectResult, StatusEffect};
use crate::state::token::MoveOutcome;

impl GameSessionOrchestrator {
    pub fn handle_server_event(&mut self, event: ServerEvent, now: Instant) {
        self.watchdog.observe(now);
        tracing::debug!(event = event.kind(), "Server event");

        match event {
            ServerEvent::PlayerMoved {
                from_cell,
                to_cell,
                message_index,
                user_id,
            } => self.on_player_moved(user_id, from_cell, to_cell, message_index, now),
            ServerEvent::TurnChanged {
                current_turn_user_id,
                reason,
            } => self.on_turn_changed(current_turn_user_id, reason, now),
            ServerEvent::PlayerLeft { user_id, reason } => self.on_player_left(user_id, reason, now),
            ServerEvent::ItemUsed {
                item_code,
                user_id,
                target_user_id,
                effect_result,
            } => self.on_item_effect(item_code, user_id, target_user_id, effect_result, now),
            ServerEvent::TurnTimerUpdated { remaining_seconds } => {
                self.turn.remaining_seconds = remaining_seconds;
                self.emit(SessionNotice::TimerUpdated { remaining_seconds });
            }
        }

        self.flags.animating = self.tokens.is_animating();
    }

    fn on_player_moved(
        &mut self,
        user_id: Option<i64>,
        from_cell: u32,
        to_cell: u32,
        message_index: Option<u32>,
        now: Instant,
    ) {
        let Some(user_id) = user_id.or_else(|| {
            let owner = self.turn.current_turn_user_id;
            (owner != 0).then_some(owner)
        }) else {
            tracing::warn!(from_cell, to_cell, "Move without a player or turn owner ignored");
            return;
        };

        match self.tokens.begin_move(user_id, from_cell, to_cell) {
            MoveOutcome::Animating | MoveOutcome::NoMovement => {}
            MoveOutcome::SnappedToLastValid => {
                tracing::warn!(user_id, to_cell, "Invalid move destination, reconciling");
                self.sync_game_state(true, now);
            }
            MoveOutcome::UnknownToken => self.sync_game_state(false, now),
        }

        if let Some(message_index) = message_index {
            self.emit(SessionNotice::CellMessage {
                user_id,
                message_index,
            });
        }
    }

    fn on_turn_changed(&mut self, owner: i64, reason: Option<TurnChangeReason>, now: Instant) {
        match self.change_turn_owner(owner, now) {
            Some(previous) => {
                if previous != 0 {
                    self.statuses.on_turn_advanced(previous);
                }
                let penalty = match reason {
                    Some(TurnChangeReason::TimeoutSkip) => Some(TimeoutPenalty::Skipped),
                    Some(TurnChangeReason::TimeoutKick) => Some(TimeoutPenalty::Kicked),
                    Some(TurnChangeReason::Other(_)) | None => None,
                };
                if let Some(penalty) = penalty.filter(|_| previous != 0) {
                    tracing::info!(user_id = previous, ?penalty, "Previous player timed out");
                    self.emit(SessionNotice::TurnTimedOut {
                        user_id: previous,
                        penalty,
                    });
                }
            }
            None => tracing::debug!(owner, "Duplicate turn change, statuses left as they are"),
        }

        // Until a later snapshot confirms this owner the guard treats the
        // turn as not ours.
        self.sync.turn_confirmation_from = Some(self.sync.next_request_id);
        self.sync_game_state(false, now);
    }

    /// Record a new turn owner. Returns the previous owner on a real change.
    pub(super) fn change_turn_owner(&mut self, owner: i64, now: Instant) -> Option<i64> {
        let previous = self.turn.set_owner(owner)?;
        let is_mine = owner == self.context.user_id;

        if is_mine {
            self.timer.start(now);
            self.turn.remaining_seconds = self.timer.remaining_secs(now);
        } else {
            self.timer.stop();
            self.turn.remaining_seconds = 0;
            if self.pending_item.is_some() {
                tracing::debug!("Turn lost during target selection");
            }
            self.clear_target_selection();
            self.selected_dice_slot = None;
        }

        tracing::info!(
            previous_user_id = previous,
            user_id = owner,
            is_mine,
            epoch = self.turn.epoch(),
            "Turn changed"
        );
        self.emit(SessionNotice::TurnChanged {
            user_id: owner,
            is_mine,
        });
        Some(previous)
    }

    fn on_player_left(&mut self, user_id: i64, reason: String, now: Instant) {
        self.tokens.remove_token(user_id);
        self.statuses.remove(user_id);
        self.pending_bonus.remove(&user_id);
        self.roster.retain(|p| p.user_id != user_id);
        self.sync.departed.insert(user_id, self.sync.next_request_id);

        if user_id == self.context.user_id {
            tracing::warn!(user_id, %reason, "Local player removed from game");
            self.timer.stop();
            self.turn.remaining_seconds = 0;
            self.clear_target_selection();
            self.selected_dice_slot = None;
            self.emit(SessionNotice::LocalPlayerRemoved { reason });
        } else {
            tracing::info!(user_id, %reason, "Player left");
            self.emit(SessionNotice::PlayerLeft { user_id, reason });
        }

        self.sync_game_state(false, now);
    }

    fn on_item_effect(
        &mut self,
        item: ItemKind,
        user_id: i64,
        target_user_id: Option<i64>,
        effect: EffectResult,
        now: Instant,
    ) {
        match (&item, target_user_id) {
            (ItemKind::Shield, _) => {
                self.statuses.apply_item_effect(StatusEffect::Shield { user_id });
            }
            (ItemKind::Freeze, Some(target_id)) => {
                self.statuses.apply_item_effect(StatusEffect::Freeze {
                    actor_id: user_id,
                    target_id,
                    result: effect,
                });
            }
            (ItemKind::Freeze, None) => {
                tracing::warn!(user_id, "Freeze without a target, waiting for snapshot");
            }
            (ItemKind::Rocket | ItemKind::Anchor | ItemKind::Unknown(_), _) => {}
        }

        tracing::info!(
            item = item.code(),
            user_id,
            target_user_id,
            effect = ?effect,
            "Item effect applied"
        );
        self.emit(SessionNotice::ItemUsed {
            item,
            user_id,
            target_user_id,
            effect,
        });

        self.refresh_inventory();
        // Item effects can move tokens without a move event.
        self.sync_game_state(true, now);
    }
}
