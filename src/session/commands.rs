//! Player command surface and the completions of the requests it starts.

use std::sync::Arc;
use std::time::Instant;

use super::{GameSessionOrchestrator, PlayerCommand, SessionNotice};
use crate::error::{CommandKind, CommandRejected, RpcError};
use crate::protocol::{JoinGameResponse, RollDiceResponse, RollOutcome, UseItemResponse};
use crate::session::Completion;
use crate::state::guard::ActionGuard;
use crate::state::turn::PendingItemAction;

impl GameSessionOrchestrator {
    /// Run one player command. A rejection never reaches the network.
    pub fn execute(&mut self, command: PlayerCommand, now: Instant) -> Result<(), CommandRejected> {
        match command {
            PlayerCommand::Join => self.join(),
            PlayerCommand::RollDice { dice_slot } => self.roll_dice(dice_slot),
            PlayerCommand::SelectDiceSlot { slot } => self.select_dice_slot(slot),
            PlayerCommand::UseItem { slot } => self.use_item(slot),
            PlayerCommand::PrepareItemTarget { slot } => self.prepare_item_target(slot),
            PlayerCommand::SelectTarget { target_user_id } => self.select_target(target_user_id),
            PlayerCommand::CancelTargetSelection => self.cancel_target_selection(),
            PlayerCommand::SyncGameState { force } => {
                self.sync_game_state(force, now);
                Ok(())
            }
            PlayerCommand::RefreshInventory => {
                self.refresh_inventory();
                Ok(())
            }
        }
    }

    fn reject(&self, command: CommandKind, reason: &'static str) -> CommandRejected {
        let rejected = CommandRejected {
            command,
            phase: self.phase(),
            reason,
        };
        tracing::debug!(
            command = command.as_str(),
            phase = rejected.phase.as_str(),
            reason,
            "Command rejected"
        );
        rejected
    }

    /// Why the guard refuses a mutating command right now.
    fn refusal_reason(&self) -> &'static str {
        if !self.turn.is_turn_of(self.context.user_id) {
            "not your turn"
        } else if self.is_turn_sync_pending() {
            "turn change not yet confirmed"
        } else if self.flags.roll_in_progress {
            "a roll is already in flight"
        } else if self.flags.use_item_in_progress {
            "an item request is already in flight"
        } else if self.flags.target_selection_active {
            "target selection is open"
        } else if self.flags.animating {
            "tokens are still moving"
        } else {
            "not permitted"
        }
    }

    pub fn join(&mut self) -> Result<(), CommandRejected> {
        if self.join_in_flight {
            return Err(self.reject(CommandKind::Join, "join already in flight"));
        }
        if self.joined {
            return Err(self.reject(CommandKind::Join, "already joined"));
        }

        self.join_in_flight = true;
        tracing::info!(
            game_id = %self.context.game_id,
            user_id = self.context.user_id,
            "Joining game"
        );

        let service = Arc::clone(&self.service);
        let context = self.context.clone();
        self.spawn_request(
            async move {
                service
                    .join_game(&context.game_id, context.user_id, &context.display_name)
                    .await
            },
            Completion::Joined,
        );
        Ok(())
    }

    pub(super) fn on_joined(&mut self, result: Result<JoinGameResponse, RpcError>, now: Instant) {
        self.join_in_flight = false;
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                self.report_failure(CommandKind::Join, err);
                return;
            }
        };

        self.joined = true;
        for player in &response.players {
            self.tokens
                .add_token(player.user_id, player.display_name.clone(), player.skin_id, 0);
        }
        if self.tokens.token(self.context.user_id).is_none() {
            self.tokens.add_token(
                self.context.user_id,
                self.context.display_name.clone(),
                self.context.skin_id,
                0,
            );
        }
        self.roster = response.players;

        tracing::info!(
            game_id = %self.context.game_id,
            players = self.roster.len(),
            "Joined game"
        );
        self.emit(SessionNotice::Joined {
            player_count: self.tokens.token_count(),
        });

        self.sync_game_state(true, now);
        self.refresh_inventory();
    }

    /// Roll with `dice_slot`, or the selected dice slot when `None`.
    pub fn roll_dice(&mut self, dice_slot: Option<u8>) -> Result<(), CommandRejected> {
        if !ActionGuard::permits_roll(self.is_my_turn(), &self.flags) {
            return Err(self.reject(CommandKind::RollDice, self.refusal_reason()));
        }

        // Set before anything can yield so a second roll is refused.
        self.flags.roll_in_progress = true;
        let dice_slot = dice_slot.or(self.selected_dice_slot);
        let epoch = self.turn.epoch();
        tracing::info!(
            game_id = %self.context.game_id,
            user_id = self.context.user_id,
            dice_slot,
            "Rolling dice"
        );

        let service = Arc::clone(&self.service);
        let game_id = self.context.game_id.clone();
        let user_id = self.context.user_id;
        self.spawn_request(
            async move {
                service
                    .get_roll_dice(&game_id, user_id, dice_slot)
                    .await
                    .and_then(RollDiceResponse::into_result)
            },
            move |result| Completion::Rolled { epoch, result },
        );
        Ok(())
    }

    pub(super) fn on_rolled(&mut self, epoch: u64, result: Result<RollOutcome, RpcError>, now: Instant) {
        self.flags.roll_in_progress = false;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                self.report_failure(CommandKind::RollDice, err);
                return;
            }
        };

        self.selected_dice_slot = None;
        if epoch == self.turn.epoch() {
            tracing::info!(
                dice_value = outcome.dice_value,
                from_cell = outcome.from_cell,
                to_cell = outcome.to_cell,
                "Dice rolled"
            );
            self.emit(SessionNotice::DiceRolled {
                dice_value: outcome.dice_value,
                from_cell: outcome.from_cell,
                to_cell: outcome.to_cell,
                granted_item: outcome.granted_item,
                granted_dice_code: outcome.granted_dice_code,
            });
        } else {
            tracing::debug!(
                request_epoch = epoch,
                current_epoch = self.turn.epoch(),
                "Roll response arrived after the turn moved on"
            );
        }

        self.sync_game_state(false, now);
        self.refresh_inventory();
    }

    /// Pick a dice slot for the next roll; `None` clears the selection.
    pub fn select_dice_slot(&mut self, slot: Option<u8>) -> Result<(), CommandRejected> {
        let Some(slot) = slot else {
            self.selected_dice_slot = None;
            return Ok(());
        };

        let holds_die = self.inventory.has_usable_die(slot);
        if !ActionGuard::permits_dice_slot(self.is_my_turn(), &self.flags, holds_die) {
            let reason = if holds_die {
                self.refusal_reason()
            } else {
                "no usable die in slot"
            };
            return Err(self.reject(CommandKind::SelectDiceSlot, reason));
        }

        tracing::debug!(slot, "Dice slot selected");
        self.selected_dice_slot = Some(slot);
        Ok(())
    }

    /// Use the item in `slot`. Items that need a target open target selection.
    pub fn use_item(&mut self, slot: u8) -> Result<(), CommandRejected> {
        if !ActionGuard::permits_item(self.is_my_turn(), &self.flags) {
            return Err(self.reject(CommandKind::UseItem, self.refusal_reason()));
        }
        let Some(item) = self.inventory.usable_item(slot) else {
            return Err(self.reject(CommandKind::UseItem, "no usable item in slot"));
        };

        if item.requires_target() {
            return self.prepare_item_target(slot);
        }
        self.send_use_item(slot, None);
        Ok(())
    }

    pub fn prepare_item_target(&mut self, slot: u8) -> Result<(), CommandRejected> {
        if !ActionGuard::permits_item(self.is_my_turn(), &self.flags) {
            return Err(self.reject(CommandKind::PrepareItemTarget, self.refusal_reason()));
        }
        let Some(item) = self.inventory.usable_item(slot).cloned() else {
            return Err(self.reject(CommandKind::PrepareItemTarget, "no usable item in slot"));
        };

        self.pending_item = Some(PendingItemAction {
            slot_number: slot,
            awaiting_target: true,
        });
        self.flags.target_selection_active = true;
        tracing::debug!(slot, item = item.code(), "Awaiting item target");
        self.emit(SessionNotice::AwaitingTarget { slot, item });
        Ok(())
    }

    /// Complete target selection and send the pending item.
    pub fn select_target(&mut self, target_user_id: i64) -> Result<(), CommandRejected> {
        let Some(pending) = self.pending_item.filter(|p| p.awaiting_target) else {
            return Err(self.reject(CommandKind::SelectTarget, "no item awaiting a target"));
        };
        if !ActionGuard::controls(self.is_my_turn(), &self.flags).can_select_target {
            return Err(self.reject(CommandKind::SelectTarget, self.refusal_reason()));
        }
        if self.tokens.token(target_user_id).is_none() {
            return Err(self.reject(CommandKind::SelectTarget, "unknown target player"));
        }

        // Clear first so a repeated selection cannot send the item twice.
        self.pending_item = None;
        self.flags.target_selection_active = false;
        self.send_use_item(pending.slot_number, Some(target_user_id));
        Ok(())
    }

    pub fn cancel_target_selection(&mut self) -> Result<(), CommandRejected> {
        if !self.pending_item.is_some_and(|p| p.awaiting_target) {
            return Err(self.reject(CommandKind::CancelTargetSelection, "no item awaiting a target"));
        }
        self.clear_target_selection();
        tracing::debug!("Target selection cancelled");
        self.emit(SessionNotice::TargetSelectionCancelled);
        Ok(())
    }

    pub(super) fn clear_target_selection(&mut self) {
        self.pending_item = None;
        self.flags.target_selection_active = false;
    }

    fn send_use_item(&mut self, slot: u8, target_user_id: Option<i64>) {
        self.flags.use_item_in_progress = true;
        let epoch = self.turn.epoch();
        tracing::info!(
            game_id = %self.context.game_id,
            user_id = self.context.user_id,
            slot,
            target_user_id,
            "Using item"
        );

        let service = Arc::clone(&self.service);
        let game_id = self.context.game_id.clone();
        let user_id = self.context.user_id;
        self.spawn_request(
            async move {
                service
                    .use_item(&game_id, user_id, slot, target_user_id)
                    .await
                    .and_then(UseItemResponse::into_result)
            },
            move |result| Completion::ItemUsed {
                epoch,
                slot,
                target_user_id,
                result,
            },
        );
    }

    pub(super) fn on_item_used(
        &mut self,
        epoch: u64,
        slot: u8,
        target_user_id: Option<i64>,
        result: Result<(), RpcError>,
        now: Instant,
    ) {
        self.flags.use_item_in_progress = false;
        if let Err(err) = result {
            self.report_failure(CommandKind::UseItem, err);
            return;
        }

        if epoch != self.turn.epoch() {
            tracing::debug!(slot, "Item response arrived after the turn moved on");
        } else {
            tracing::info!(slot, target_user_id, "Item used");
        }
        self.refresh_inventory();
        self.sync_game_state(false, now);
    }

    /// Report a timeout when the local countdown runs out.
    ///
    /// Only while the turn is confirmed ours and nothing is in flight;
    /// the server decides what actually happens.
    pub(super) fn on_turn_timer_expired(&mut self) {
        let user_id = self.context.user_id;
        if !self.is_my_turn() {
            tracing::debug!(
                turn_sync_pending = self.is_turn_sync_pending(),
                "Turn timer expired while the turn is not confirmed ours"
            );
            return;
        }
        if self.flags.request_in_flight() || self.timeout_in_flight {
            tracing::debug!("Turn timer expired while a request is in flight, not reporting");
            return;
        }

        tracing::info!(game_id = %self.context.game_id, user_id, "Turn timer expired, reporting timeout");
        self.timeout_in_flight = true;
        let service = Arc::clone(&self.service);
        let game_id = self.context.game_id.clone();
        self.spawn_request(
            async move { service.register_turn_timeout(&game_id, user_id).await },
            move |result| Completion::TimeoutRegistered { user_id, result },
        );
    }

    pub(super) fn on_timeout_registered(&mut self, user_id: i64, result: Result<(), RpcError>) {
        self.timeout_in_flight = false;
        match result {
            Ok(()) => tracing::info!(user_id, "Turn timeout registered"),
            // The server may already have moved the turn on.
            Err(RpcError::Business { reason }) => {
                tracing::debug!(user_id, %reason, "Turn timeout not accepted")
            }
            Err(RpcError::Transport(detail)) => {
                tracing::warn!(user_id, %detail, "Could not report turn timeout");
                self.emit(SessionNotice::ConnectivityFailure { command: None });
            }
            Err(RpcError::Unexpected(detail)) => {
                tracing::error!(user_id, %detail, "Turn timeout report failed");
                self.emit(SessionNotice::UnexpectedError { message: detail });
            }
        }
    }
}
