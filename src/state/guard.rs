//! Mutual-exclusion policy for player actions.
//!
//! Everything here is pure. The orchestrator owns the flags and asks the
//! guard before starting a command and again when the command is applied.

/// Bits that block new mutating commands while set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionInFlightFlags {
    pub roll_in_progress: bool,
    pub use_item_in_progress: bool,
    pub animating: bool,
    pub target_selection_active: bool,
}

impl ActionInFlightFlags {
    /// A roll or item request is waiting for the server.
    pub fn request_in_flight(&self) -> bool {
        self.roll_in_progress || self.use_item_in_progress
    }

    pub fn any(&self) -> bool {
        self.roll_in_progress
            || self.use_item_in_progress
            || self.animating
            || self.target_selection_active
    }
}

/// Which actions the local player may start right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlState {
    pub can_roll_dice: bool,
    pub can_use_item: bool,
    /// Target selection is open and a target can be picked
    pub can_select_target: bool,
    /// Target selection is open and nothing has been sent yet
    pub can_cancel_target: bool,
}

impl ControlState {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "can_roll_dice": self.can_roll_dice,
            "can_use_item": self.can_use_item,
            "can_select_target": self.can_select_target,
            "can_cancel_target": self.can_cancel_target
        })
    }
}

/// Stateless action policy.
pub struct ActionGuard;

impl ActionGuard {
    pub fn can_roll_dice(
        is_my_turn: bool,
        is_animating: bool,
        roll_in_progress: bool,
        use_item_in_progress: bool,
        target_selection_active: bool,
    ) -> bool {
        is_my_turn
            && !is_animating
            && !roll_in_progress
            && !use_item_in_progress
            && !target_selection_active
    }

    /// Same predicate as rolling; only one mutating request at a time.
    pub fn can_use_item(
        is_my_turn: bool,
        is_animating: bool,
        roll_in_progress: bool,
        use_item_in_progress: bool,
        target_selection_active: bool,
    ) -> bool {
        Self::can_roll_dice(
            is_my_turn,
            is_animating,
            roll_in_progress,
            use_item_in_progress,
            target_selection_active,
        )
    }

    pub fn can_select_dice_slot(
        is_my_turn: bool,
        is_animating: bool,
        roll_in_progress: bool,
        use_item_in_progress: bool,
        target_selection_active: bool,
        holds_usable_die: bool,
    ) -> bool {
        holds_usable_die
            && Self::can_roll_dice(
                is_my_turn,
                is_animating,
                roll_in_progress,
                use_item_in_progress,
                target_selection_active,
            )
    }

    pub fn permits_roll(is_my_turn: bool, flags: &ActionInFlightFlags) -> bool {
        Self::can_roll_dice(
            is_my_turn,
            flags.animating,
            flags.roll_in_progress,
            flags.use_item_in_progress,
            flags.target_selection_active,
        )
    }

    pub fn permits_item(is_my_turn: bool, flags: &ActionInFlightFlags) -> bool {
        Self::can_use_item(
            is_my_turn,
            flags.animating,
            flags.roll_in_progress,
            flags.use_item_in_progress,
            flags.target_selection_active,
        )
    }

    pub fn permits_dice_slot(
        is_my_turn: bool,
        flags: &ActionInFlightFlags,
        holds_usable_die: bool,
    ) -> bool {
        Self::can_select_dice_slot(
            is_my_turn,
            flags.animating,
            flags.roll_in_progress,
            flags.use_item_in_progress,
            flags.target_selection_active,
            holds_usable_die,
        )
    }

    pub fn controls(is_my_turn: bool, flags: &ActionInFlightFlags) -> ControlState {
        ControlState {
            can_roll_dice: Self::permits_roll(is_my_turn, flags),
            can_use_item: Self::permits_item(is_my_turn, flags),
            can_select_target: is_my_turn
                && flags.target_selection_active
                && !flags.request_in_flight(),
            // Local only, so turn ownership does not matter.
            can_cancel_target: flags.target_selection_active && !flags.request_in_flight(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(n: u8) -> [bool; 5] {
        [0, 1, 2, 3, 4].map(|i| n & (1 << i) != 0)
    }

    #[test]
    fn test_all_combinations() {
        for n in 0u8..32 {
            let [mine, animating, rolling, using, targeting] = bits(n);
            let expected = mine && !animating && !rolling && !using && !targeting;

            assert_eq!(
                ActionGuard::can_roll_dice(mine, animating, rolling, using, targeting),
                expected,
                "roll, combination {n:05b}"
            );
            assert_eq!(
                ActionGuard::can_use_item(mine, animating, rolling, using, targeting),
                expected,
                "item, combination {n:05b}"
            );
        }
    }

    #[test]
    fn test_only_all_clear_passes() {
        let passing: Vec<u8> = (0u8..32)
            .filter(|n| {
                let [mine, animating, rolling, using, targeting] = bits(*n);
                ActionGuard::can_roll_dice(mine, animating, rolling, using, targeting)
            })
            .collect();
        assert_eq!(passing, vec![0b00001]);
    }

    #[test]
    fn test_dice_slot_requires_usable_die() {
        for n in 0u8..32 {
            let [mine, animating, rolling, using, targeting] = bits(n);
            assert!(!ActionGuard::can_select_dice_slot(
                mine, animating, rolling, using, targeting, false
            ));
            assert_eq!(
                ActionGuard::can_select_dice_slot(mine, animating, rolling, using, targeting, true),
                ActionGuard::can_roll_dice(mine, animating, rolling, using, targeting)
            );
        }
    }

    #[test]
    fn test_flags_helpers() {
        let idle = ActionInFlightFlags::default();
        assert!(ActionGuard::permits_roll(true, &idle));
        assert!(!ActionGuard::permits_roll(false, &idle));

        let rolling = ActionInFlightFlags {
            roll_in_progress: true,
            ..idle
        };
        assert!(rolling.request_in_flight());
        assert!(!ActionGuard::permits_item(true, &rolling));
    }

    #[test]
    fn test_controls() {
        let targeting = ActionInFlightFlags {
            target_selection_active: true,
            ..Default::default()
        };
        let controls = ActionGuard::controls(true, &targeting);
        assert!(!controls.can_roll_dice);
        assert!(!controls.can_use_item);
        assert!(controls.can_select_target);
        assert!(controls.can_cancel_target);

        // While the turn is unconfirmed the selection can only be cancelled.
        let unconfirmed = ActionGuard::controls(false, &targeting);
        assert!(!unconfirmed.can_select_target);
        assert!(unconfirmed.can_cancel_target);

        assert_eq!(
            ActionGuard::controls(false, &ActionInFlightFlags::default()),
            ControlState::default()
        );
    }
}
