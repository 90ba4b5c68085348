//! Per-player status effects (shield and freeze).
//!
//! Counters tick down once per turn boundary, for the player whose turn
//! just ended. The caller is responsible for calling
//! [`PlayerStatusTracker::on_turn_advanced`] exactly once per transition.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::{FREEZE_DURATION_TURNS, SHIELD_DURATION_TURNS};

/// Effects currently on one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerStatusEffect {
    pub has_shield: bool,
    pub shield_turns_remaining: u32,
    pub is_frozen: bool,
    pub frozen_turns_remaining: u32,
}

impl PlayerStatusEffect {
    pub fn is_clear(&self) -> bool {
        !self.has_shield && !self.is_frozen
    }

    fn tick(&mut self) {
        self.shield_turns_remaining = self.shield_turns_remaining.saturating_sub(1);
        if self.shield_turns_remaining == 0 {
            self.has_shield = false;
        }
        self.frozen_turns_remaining = self.frozen_turns_remaining.saturating_sub(1);
        if self.frozen_turns_remaining == 0 {
            self.is_frozen = false;
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "has_shield": self.has_shield,
            "shield_turns_remaining": self.shield_turns_remaining,
            "is_frozen": self.is_frozen,
            "frozen_turns_remaining": self.frozen_turns_remaining
        })
    }
}

/// What the server says happened when an item was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectResult {
    #[default]
    Applied,
    /// The target's shield absorbed the effect
    Blocked,
    NoEffect,
}

/// An item effect to apply to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEffect {
    /// Actor raises a shield
    Shield { user_id: i64 },
    /// Actor freezes the target
    Freeze {
        actor_id: i64,
        target_id: i64,
        result: EffectResult,
    },
}

/// Tracks shields and freezes for every player in the session.
#[derive(Debug, Clone)]
pub struct PlayerStatusTracker {
    effects: HashMap<i64, PlayerStatusEffect>,
    shield_turns: u32,
    freeze_turns: u32,
}

impl Default for PlayerStatusTracker {
    fn default() -> Self {
        Self::new(SHIELD_DURATION_TURNS, FREEZE_DURATION_TURNS)
    }
}

impl PlayerStatusTracker {
    pub fn new(shield_turns: u32, freeze_turns: u32) -> Self {
        Self {
            effects: HashMap::new(),
            shield_turns,
            freeze_turns,
        }
    }

    /// Effect for a player; players never seen are clear.
    pub fn get(&self, user_id: i64) -> PlayerStatusEffect {
        self.effects.get(&user_id).copied().unwrap_or_default()
    }

    pub fn is_frozen(&self, user_id: i64) -> bool {
        self.get(user_id).is_frozen
    }

    pub fn has_shield(&self, user_id: i64) -> bool {
        self.get(user_id).has_shield
    }

    pub fn apply_item_effect(&mut self, effect: StatusEffect) {
        match effect {
            StatusEffect::Shield { user_id } => {
                let entry = self.effects.entry(user_id).or_default();
                entry.has_shield = self.shield_turns > 0;
                entry.shield_turns_remaining = self.shield_turns;
                tracing::debug!(user_id, turns = self.shield_turns, "Shield raised");
            }
            StatusEffect::Freeze {
                actor_id,
                target_id,
                result,
            } => match result {
                EffectResult::Applied => {
                    let entry = self.effects.entry(target_id).or_default();
                    entry.is_frozen = self.freeze_turns > 0;
                    entry.frozen_turns_remaining = self.freeze_turns;
                    tracing::debug!(actor_id, target_id, turns = self.freeze_turns, "Player frozen");
                }
                EffectResult::Blocked => {
                    let entry = self.effects.entry(target_id).or_default();
                    entry.has_shield = false;
                    entry.shield_turns_remaining = 0;
                    tracing::debug!(actor_id, target_id, "Freeze blocked, shield consumed");
                }
                EffectResult::NoEffect => {}
            },
        }
    }

    /// Count down the effects of the player whose turn just ended.
    pub fn on_turn_advanced(&mut self, previous_turn_user_id: i64) {
        if let Some(effect) = self.effects.get_mut(&previous_turn_user_id) {
            effect.tick();
            if effect.is_clear() {
                self.effects.remove(&previous_turn_user_id);
            }
        }
    }

    /// Overwrite a player's effect with authoritative values.
    pub fn apply_snapshot(
        &mut self,
        user_id: i64,
        has_shield: bool,
        shield_turns_remaining: u32,
        frozen_turns_remaining: u32,
    ) {
        let effect = PlayerStatusEffect {
            has_shield: has_shield && shield_turns_remaining > 0,
            shield_turns_remaining: if has_shield { shield_turns_remaining } else { 0 },
            is_frozen: frozen_turns_remaining > 0,
            frozen_turns_remaining,
        };
        if effect.is_clear() {
            self.effects.remove(&user_id);
        } else {
            self.effects.insert(user_id, effect);
        }
    }

    pub fn remove(&mut self, user_id: i64) {
        self.effects.remove(&user_id);
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut ids: Vec<&i64> = self.effects.keys().collect();
        ids.sort();
        let map: serde_json::Map<String, serde_json::Value> = ids
            .into_iter()
            .map(|id| (id.to_string(), self.get(*id).to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shield_duration() {
        let mut tracker = PlayerStatusTracker::default();
        tracker.apply_item_effect(StatusEffect::Shield { user_id: 1 });

        let effect = tracker.get(1);
        assert!(effect.has_shield);
        assert_eq!(effect.shield_turns_remaining, 3);
    }

    #[test]
    fn test_freeze_lands_on_target() {
        let mut tracker = PlayerStatusTracker::default();
        tracker.apply_item_effect(StatusEffect::Freeze {
            actor_id: 1,
            target_id: 2,
            result: EffectResult::Applied,
        });

        assert!(!tracker.is_frozen(1));
        assert!(tracker.is_frozen(2));
        assert_eq!(tracker.get(2).frozen_turns_remaining, 2);
    }

    #[test]
    fn test_blocked_freeze_consumes_shield() {
        let mut tracker = PlayerStatusTracker::default();
        tracker.apply_item_effect(StatusEffect::Shield { user_id: 2 });
        tracker.apply_item_effect(StatusEffect::Freeze {
            actor_id: 1,
            target_id: 2,
            result: EffectResult::Blocked,
        });

        assert!(!tracker.has_shield(2));
        assert!(!tracker.is_frozen(2));
    }

    #[test]
    fn test_turn_advance_decrements_once() {
        let mut tracker = PlayerStatusTracker::default();
        tracker.apply_item_effect(StatusEffect::Shield { user_id: 1 });
        tracker.apply_item_effect(StatusEffect::Freeze {
            actor_id: 2,
            target_id: 1,
            result: EffectResult::Applied,
        });

        tracker.on_turn_advanced(1);
        let effect = tracker.get(1);
        assert_eq!(effect.shield_turns_remaining, 2);
        assert_eq!(effect.frozen_turns_remaining, 1);
        assert!(effect.has_shield);
        assert!(effect.is_frozen);

        tracker.on_turn_advanced(1);
        let effect = tracker.get(1);
        assert_eq!(effect.shield_turns_remaining, 1);
        assert_eq!(effect.frozen_turns_remaining, 0);
        assert!(!effect.is_frozen);
    }

    #[test]
    fn test_double_advance_double_decrements() {
        let mut tracker = PlayerStatusTracker::default();
        tracker.apply_item_effect(StatusEffect::Shield { user_id: 1 });

        tracker.on_turn_advanced(1);
        tracker.on_turn_advanced(1);
        assert_eq!(tracker.get(1).shield_turns_remaining, 1);
    }

    #[test]
    fn test_counters_never_negative() {
        let mut tracker = PlayerStatusTracker::default();
        tracker.apply_snapshot(1, true, 1, 0);

        tracker.on_turn_advanced(1);
        tracker.on_turn_advanced(1);
        tracker.on_turn_advanced(3);
        assert_eq!(tracker.get(1), PlayerStatusEffect::default());
        assert_eq!(tracker.get(3), PlayerStatusEffect::default());
    }

    #[test]
    fn test_other_players_untouched() {
        let mut tracker = PlayerStatusTracker::default();
        tracker.apply_item_effect(StatusEffect::Shield { user_id: 1 });
        tracker.apply_item_effect(StatusEffect::Shield { user_id: 2 });

        tracker.on_turn_advanced(1);
        assert_eq!(tracker.get(2).shield_turns_remaining, 3);
    }

    #[test]
    fn test_snapshot_overwrites() {
        let mut tracker = PlayerStatusTracker::default();
        tracker.apply_item_effect(StatusEffect::Shield { user_id: 1 });

        tracker.apply_snapshot(1, false, 0, 2);
        let effect = tracker.get(1);
        assert!(!effect.has_shield);
        assert!(effect.is_frozen);
        assert_eq!(effect.frozen_turns_remaining, 2);

        tracker.apply_snapshot(1, false, 0, 0);
        assert!(tracker.get(1).is_clear());
    }
}
