//! The local player's items and dice.

use serde::{Deserialize, Serialize};

/// Items a player can hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemKind {
    /// Blocks the next freeze for a few turns
    Shield,
    /// Makes the target skip turns
    Freeze,
    /// Moves the user forward
    Rocket,
    /// Pulls the target back
    Anchor,
    Unknown(String),
}

impl ItemKind {
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "SHIELD" => Self::Shield,
            "FREEZE" => Self::Freeze,
            "ROCKET" => Self::Rocket,
            "ANCHOR" => Self::Anchor,
            _ => Self::Unknown(code.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Shield => "SHIELD",
            Self::Freeze => "FREEZE",
            Self::Rocket => "ROCKET",
            Self::Anchor => "ANCHOR",
            Self::Unknown(code) => code,
        }
    }

    /// Whether using this item needs another player picked as target.
    pub fn requires_target(&self) -> bool {
        matches!(self, Self::Freeze | Self::Anchor)
    }

    /// Whether the effect can move tokens without a move event.
    pub fn moves_tokens(&self) -> bool {
        matches!(self, Self::Rocket | Self::Anchor)
    }
}

impl From<String> for ItemKind {
    fn from(code: String) -> Self {
        Self::from_code(&code)
    }
}

impl From<ItemKind> for String {
    fn from(kind: ItemKind) -> Self {
        kind.code().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSlot {
    pub slot: u8,
    #[serde(default)]
    pub item: Option<ItemKind>,
    #[serde(default)]
    pub quantity: u32,
}

impl ItemSlot {
    pub fn is_usable(&self) -> bool {
        self.item.is_some() && self.quantity > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceSlot {
    pub slot: u8,
    #[serde(default)]
    pub dice_code: Option<String>,
    #[serde(default)]
    pub quantity: u32,
}

impl DiceSlot {
    pub fn is_usable(&self) -> bool {
        self.dice_code.is_some() && self.quantity > 0
    }
}

/// Canonical inventory for the local player, replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    #[serde(default)]
    pub item_slots: Vec<ItemSlot>,
    #[serde(default)]
    pub dice_slots: Vec<DiceSlot>,
}

impl Inventory {
    pub fn item_slot(&self, slot: u8) -> Option<&ItemSlot> {
        self.item_slots.iter().find(|s| s.slot == slot)
    }

    pub fn dice_slot(&self, slot: u8) -> Option<&DiceSlot> {
        self.dice_slots.iter().find(|s| s.slot == slot)
    }

    /// The item in `slot` if it can be used now.
    pub fn usable_item(&self, slot: u8) -> Option<&ItemKind> {
        self.item_slot(slot)
            .filter(|s| s.is_usable())
            .and_then(|s| s.item.as_ref())
    }

    pub fn has_usable_die(&self, slot: u8) -> bool {
        self.dice_slot(slot).is_some_and(|s| s.is_usable())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> Inventory {
        Inventory {
            item_slots: vec![
                ItemSlot {
                    slot: 1,
                    item: Some(ItemKind::Freeze),
                    quantity: 1,
                },
                ItemSlot {
                    slot: 2,
                    item: Some(ItemKind::Shield),
                    quantity: 0,
                },
                ItemSlot {
                    slot: 3,
                    item: None,
                    quantity: 4,
                },
            ],
            dice_slots: vec![DiceSlot {
                slot: 1,
                dice_code: Some("GOLDEN".to_string()),
                quantity: 2,
            }],
        }
    }

    #[test]
    fn test_item_codes() {
        assert_eq!(ItemKind::from_code("freeze"), ItemKind::Freeze);
        assert_eq!(ItemKind::from_code("ANCHOR").code(), "ANCHOR");
        assert_eq!(
            ItemKind::from_code("TELEPORT"),
            ItemKind::Unknown("TELEPORT".to_string())
        );
        assert!(ItemKind::Freeze.requires_target());
        assert!(!ItemKind::Shield.requires_target());
        assert!(ItemKind::Rocket.moves_tokens());
    }

    #[test]
    fn test_usable_slots() {
        let inv = inventory();
        assert_eq!(inv.usable_item(1), Some(&ItemKind::Freeze));
        assert_eq!(inv.usable_item(2), None);
        assert_eq!(inv.usable_item(3), None);
        assert_eq!(inv.usable_item(9), None);

        assert!(inv.has_usable_die(1));
        assert!(!inv.has_usable_die(2));
    }

    #[test]
    fn test_inventory_from_json() {
        let raw = r#"{
            "itemSlots": [{"slot": 1, "item": "ROCKET", "quantity": 1}],
            "diceSlots": [{"slot": 2, "diceCode": "EVEN", "quantity": 1}]
        }"#;
        let inv: Inventory = serde_json::from_str(raw).unwrap();
        assert_eq!(inv.usable_item(1), Some(&ItemKind::Rocket));
        assert!(inv.has_usable_die(2));
        assert_eq!(inv.to_json()["itemSlots"][0]["item"], "ROCKET");
    }
}
