//! Wire contract with the game server.
//!
//! Request/response DTOs, push notifications and the [`GameServicePort`]
//! the transport layer implements. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::error::RpcError;
use crate::state::inventory::{Inventory, ItemKind};
use crate::state::status::EffectResult;

/// A participant as reported when joining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: i64,
    pub display_name: String,
    #[serde(default)]
    pub skin_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameResponse {
    #[serde(default)]
    pub players: Vec<Participant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollDiceResponse {
    pub success: bool,
    #[serde(default)]
    pub from_cell: u32,
    #[serde(default)]
    pub to_cell: u32,
    #[serde(default)]
    pub dice_value: u32,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub granted_item_code: Option<String>,
    #[serde(default)]
    pub granted_dice_code: Option<String>,
}

/// A successful roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollOutcome {
    pub from_cell: u32,
    pub to_cell: u32,
    pub dice_value: u32,
    pub granted_item: Option<ItemKind>,
    pub granted_dice_code: Option<String>,
}

impl RollDiceResponse {
    /// `success = false` becomes [`RpcError::Business`].
    pub fn into_result(self) -> Result<RollOutcome, RpcError> {
        if !self.success {
            return Err(RpcError::business(
                self.failure_reason.unwrap_or_else(|| "roll refused".to_string()),
            ));
        }
        Ok(RollOutcome {
            from_cell: self.from_cell,
            to_cell: self.to_cell,
            dice_value: self.dice_value,
            granted_item: self.granted_item_code.as_deref().map(ItemKind::from_code),
            granted_dice_code: self.granted_dice_code,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseItemResponse {
    pub success: bool,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl UseItemResponse {
    pub fn into_result(self) -> Result<(), RpcError> {
        if self.success {
            Ok(())
        } else {
            Err(RpcError::business(
                self.failure_reason
                    .unwrap_or_else(|| "item use refused".to_string()),
            ))
        }
    }
}

/// One player's authoritative state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenState {
    pub user_id: i64,
    /// 0 means not placed yet
    #[serde(default)]
    pub cell_index: u32,
    #[serde(default)]
    pub has_shield: bool,
    #[serde(default)]
    pub shield_turns_remaining: u32,
    #[serde(default)]
    pub frozen_turns_remaining: u32,
    #[serde(default)]
    pub has_pending_bonus: bool,
}

/// Full authoritative game state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateSnapshot {
    pub current_turn_user_id: i64,
    #[serde(default)]
    pub tokens: Vec<TokenState>,
}

/// Why the turn moved on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TurnChangeReason {
    /// The previous player timed out and lost the turn
    TimeoutSkip,
    /// The previous player timed out too often and was removed
    TimeoutKick,
    Other(String),
}

impl TurnChangeReason {
    pub fn code(&self) -> &str {
        match self {
            Self::TimeoutSkip => "TIMEOUT_SKIP",
            Self::TimeoutKick => "TIMEOUT_KICK",
            Self::Other(code) => code,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimeoutSkip | Self::TimeoutKick)
    }
}

impl From<String> for TurnChangeReason {
    fn from(code: String) -> Self {
        match code.as_str() {
            "TIMEOUT_SKIP" => Self::TimeoutSkip,
            "TIMEOUT_KICK" => Self::TimeoutKick,
            _ => Self::Other(code),
        }
    }
}

impl From<TurnChangeReason> for String {
    fn from(reason: TurnChangeReason) -> Self {
        reason.code().to_string()
    }
}

/// Push notifications from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    PlayerMoved {
        from_cell: u32,
        to_cell: u32,
        #[serde(default)]
        message_index: Option<u32>,
        /// Defaults to the current turn owner
        #[serde(default)]
        user_id: Option<i64>,
    },
    TurnChanged {
        current_turn_user_id: i64,
        #[serde(default)]
        reason: Option<TurnChangeReason>,
    },
    PlayerLeft {
        user_id: i64,
        #[serde(default)]
        reason: String,
    },
    ItemUsed {
        item_code: ItemKind,
        user_id: i64,
        #[serde(default)]
        target_user_id: Option<i64>,
        #[serde(default)]
        effect_result: EffectResult,
    },
    TurnTimerUpdated {
        remaining_seconds: u32,
    },
}

impl ServerEvent {
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlayerMoved { .. } => "PlayerMoved",
            Self::TurnChanged { .. } => "TurnChanged",
            Self::PlayerLeft { .. } => "PlayerLeft",
            Self::ItemUsed { .. } => "ItemUsed",
            Self::TurnTimerUpdated { .. } => "TurnTimerUpdated",
        }
    }
}

/// Operations the session needs from the game server.
///
/// Implemented by the transport layer. Every call returns a typed result;
/// business refusals are [`RpcError::Business`], never panics.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait::async_trait]
pub trait GameServicePort: Send + Sync {
    async fn join_game(
        &self,
        game_id: &str,
        user_id: i64,
        display_name: &str,
    ) -> Result<JoinGameResponse, RpcError>;

    async fn get_roll_dice(
        &self,
        game_id: &str,
        user_id: i64,
        dice_slot: Option<u8>,
    ) -> Result<RollDiceResponse, RpcError>;

    async fn use_item(
        &self,
        game_id: &str,
        user_id: i64,
        slot: u8,
        target_user_id: Option<i64>,
    ) -> Result<UseItemResponse, RpcError>;

    async fn get_game_state(&self, game_id: &str) -> Result<GameStateSnapshot, RpcError>;

    async fn register_turn_timeout(&self, game_id: &str, user_id: i64) -> Result<(), RpcError>;

    async fn get_inventory(&self, game_id: &str, user_id: i64) -> Result<Inventory, RpcError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_roll_response_conversion() {
        let ok = RollDiceResponse {
            success: true,
            from_cell: 3,
            to_cell: 8,
            dice_value: 5,
            granted_item_code: Some("SHIELD".to_string()),
            ..Default::default()
        };
        let outcome = ok.into_result().unwrap();
        assert_eq!(outcome.to_cell, 8);
        assert_eq!(outcome.granted_item, Some(ItemKind::Shield));

        let refused = RollDiceResponse {
            success: false,
            failure_reason: Some("NOT_YOUR_TURN".to_string()),
            ..Default::default()
        };
        assert_eq!(
            refused.into_result().unwrap_err(),
            RpcError::business("NOT_YOUR_TURN")
        );
    }

    #[test]
    fn test_use_item_response_conversion() {
        assert!(UseItemResponse {
            success: true,
            failure_reason: None
        }
        .into_result()
        .is_ok());

        let err = UseItemResponse::default().into_result().unwrap_err();
        assert!(err.is_business());
    }

    #[test]
    fn test_server_event_parsing() {
        let moved = ServerEvent::from_json_str(
            r#"{"type": "PlayerMoved", "fromCell": 14, "toCell": 17, "messageIndex": 2}"#,
        )
        .unwrap();
        assert_eq!(
            moved,
            ServerEvent::PlayerMoved {
                from_cell: 14,
                to_cell: 17,
                message_index: Some(2),
                user_id: None
            }
        );

        let turn = ServerEvent::from_json_str(
            r#"{"type": "TurnChanged", "currentTurnUserId": 9, "reason": "TIMEOUT_SKIP"}"#,
        )
        .unwrap();
        assert_eq!(
            turn,
            ServerEvent::TurnChanged {
                current_turn_user_id: 9,
                reason: Some(TurnChangeReason::TimeoutSkip)
            }
        );

        let item = ServerEvent::from_json_str(
            r#"{"type": "ItemUsed", "itemCode": "FREEZE", "userId": 1, "targetUserId": 2, "effectResult": "BLOCKED"}"#,
        )
        .unwrap();
        assert_eq!(item.kind(), "ItemUsed");
        assert!(matches!(
            item,
            ServerEvent::ItemUsed {
                item_code: ItemKind::Freeze,
                effect_result: EffectResult::Blocked,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_reason_kept() {
        let reason = TurnChangeReason::from("NORMAL".to_string());
        assert_eq!(reason, TurnChangeReason::Other("NORMAL".to_string()));
        assert!(!reason.is_timeout());
        assert!(TurnChangeReason::TimeoutKick.is_timeout());
    }

    #[test]
    fn test_snapshot_parsing() {
        let snapshot: GameStateSnapshot = serde_json::from_str(
            r#"{"currentTurnUserId": 4, "tokens": [{"userId": 4, "cellIndex": 0, "hasShield": true, "shieldTurnsRemaining": 2, "frozenTurnsRemaining": 0, "hasPendingBonus": false}]}"#,
        )
        .unwrap();
        assert_eq!(snapshot.tokens[0].cell_index, 0);
        assert_eq!(snapshot.tokens[0].shield_turns_remaining, 2);
    }
}
