//! Reconciliation with the server's authoritative state.

use std::sync::Arc;
use std::time::Instant;

use super::{GameSessionOrchestrator, SessionNotice};
use crate::error::RpcError;
use crate::protocol::{GameStateSnapshot, TokenState};
use crate::session::Completion;
use crate::state::inventory::Inventory;

impl GameSessionOrchestrator {
    /// Fetch the authoritative game state.
    ///
    /// Turn and statuses are always taken from the snapshot. Token positions
    /// only when `force_token_positions` is set or no tokens exist yet, so an
    /// in-progress move animation is not cut short. Requests made while one
    /// is out are coalesced into a single follow-up.
    pub fn sync_game_state(&mut self, force_token_positions: bool, now: Instant) {
        self.sync.last_requested = Some(now);
        if self.sync.in_flight {
            let force = self.sync.queued.unwrap_or(false) || force_token_positions;
            self.sync.queued = Some(force);
            tracing::trace!(force, "Sync already in flight, queued");
            return;
        }
        self.issue_sync(force_token_positions);
    }

    fn issue_sync(&mut self, force: bool) {
        let request_id = self.sync.next_request_id;
        self.sync.next_request_id += 1;
        self.sync.in_flight = true;
        tracing::debug!(request_id, force, "Requesting game state");

        let service = Arc::clone(&self.service);
        let game_id = self.context.game_id.clone();
        self.spawn_request(
            async move { service.get_game_state(&game_id).await },
            move |result| Completion::Synced {
                request_id,
                force,
                result,
            },
        );
    }

    pub(super) fn on_synced(
        &mut self,
        request_id: u64,
        force: bool,
        result: Result<GameStateSnapshot, RpcError>,
        now: Instant,
    ) {
        self.sync.in_flight = false;
        // A request sent before the last turn change may describe the old turn.
        let predates_turn_change = self
            .sync
            .turn_confirmation_from
            .is_some_and(|from| request_id < from);

        match result {
            Ok(snapshot) => {
                self.apply_game_state(request_id, &snapshot, force, !predates_turn_change, now);
                if predates_turn_change {
                    tracing::debug!(request_id, "Snapshot predates turn change, turn left as pushed");
                } else {
                    self.sync.turn_confirmation_from = None;
                }
            }
            Err(RpcError::Unexpected(detail)) => {
                tracing::error!(request_id, %detail, "Game state sync failed unexpectedly");
                self.emit(SessionNotice::UnexpectedError { message: detail });
            }
            Err(err) => {
                tracing::warn!(request_id, error = %err, "Game state sync failed");
            }
        }

        if let Some(force) = self.sync.queued.take() {
            self.issue_sync(force);
        }
    }

    fn apply_game_state(
        &mut self,
        request_id: u64,
        snapshot: &GameStateSnapshot,
        force_token_positions: bool,
        update_turn: bool,
        now: Instant,
    ) {
        if update_turn && snapshot.current_turn_user_id != 0 {
            if let Some(previous) = self.change_turn_owner(snapshot.current_turn_user_id, now) {
                tracing::info!(
                    previous_user_id = previous,
                    user_id = snapshot.current_turn_user_id,
                    "Turn owner corrected from snapshot"
                );
            }
        }

        // Players who left after this request went out stay gone.
        let departed = &self.sync.departed;
        let current: Vec<&TokenState> = snapshot
            .tokens
            .iter()
            .filter(|s| !departed.get(&s.user_id).is_some_and(|&from| request_id < from))
            .collect();
        if current.len() < snapshot.tokens.len() {
            tracing::debug!(
                request_id,
                skipped = snapshot.tokens.len() - current.len(),
                "Snapshot lists departed players, skipping them"
            );
        }
        self.sync.departed.retain(|_, from| request_id < *from);

        for state in &current {
            self.statuses.apply_snapshot(
                state.user_id,
                state.has_shield,
                state.shield_turns_remaining,
                state.frozen_turns_remaining,
            );
            if state.has_pending_bonus {
                self.pending_bonus.insert(state.user_id);
            } else {
                self.pending_bonus.remove(&state.user_id);
            }
        }

        let place_tokens = force_token_positions || !self.tokens.has_tokens();
        for state in &current {
            if self.tokens.token(state.user_id).is_none() {
                let (display_name, skin_id) = self.identity_of(state.user_id);
                self.tokens
                    .add_token(state.user_id, display_name, skin_id, state.cell_index);
            } else if place_tokens {
                self.tokens.snap_to(state.user_id, state.cell_index);
            }
        }

        if force_token_positions {
            let gone: Vec<i64> = self
                .tokens
                .tokens()
                .map(|t| t.user_id)
                .filter(|id| !snapshot.tokens.iter().any(|s| s.user_id == *id))
                .collect();
            for user_id in gone {
                tracing::debug!(user_id, "Token missing from snapshot, removing");
                self.tokens.remove_token(user_id);
                self.statuses.remove(user_id);
            }
        }

        tracing::debug!(
            current_turn_user_id = self.turn.current_turn_user_id,
            tokens = snapshot.tokens.len(),
            force_token_positions,
            "Game state applied"
        );
    }

    fn identity_of(&self, user_id: i64) -> (String, Option<i64>) {
        if let Some(player) = self.roster.iter().find(|p| p.user_id == user_id) {
            return (player.display_name.clone(), player.skin_id);
        }
        if user_id == self.context.user_id {
            return (self.context.display_name.clone(), self.context.skin_id);
        }
        (format!("Player {}", user_id), None)
    }

    /// Replace the local inventory with the server's.
    pub fn refresh_inventory(&mut self) {
        if self.inventory_in_flight {
            self.inventory_queued = true;
            return;
        }
        self.inventory_in_flight = true;

        let service = Arc::clone(&self.service);
        let game_id = self.context.game_id.clone();
        let user_id = self.context.user_id;
        self.spawn_request(
            async move { service.get_inventory(&game_id, user_id).await },
            Completion::InventoryLoaded,
        );
    }

    pub(super) fn on_inventory_loaded(&mut self, result: Result<Inventory, RpcError>) {
        self.inventory_in_flight = false;
        match result {
            Ok(inventory) => {
                if inventory != self.inventory {
                    self.inventory = inventory;
                    if let Some(slot) = self.selected_dice_slot {
                        if !self.inventory.has_usable_die(slot) {
                            tracing::debug!(slot, "Selected die no longer held");
                            self.selected_dice_slot = None;
                        }
                    }
                    self.emit(SessionNotice::InventoryChanged);
                }
            }
            Err(RpcError::Unexpected(detail)) => {
                tracing::error!(%detail, "Inventory refresh failed unexpectedly");
                self.emit(SessionNotice::UnexpectedError { message: detail });
            }
            Err(err) => tracing::warn!(error = %err, "Inventory refresh failed"),
        }

        if std::mem::take(&mut self.inventory_queued) {
            self.refresh_inventory();
        }
    }
}
