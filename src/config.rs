//! Session configuration and the explicit session context.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Length of a turn before the local client reports a timeout (120 seconds).
pub const DEFAULT_TURN_DURATION: Duration = Duration::from_secs(120);

/// Server silence tolerated before the connection is considered lost (45 seconds).
pub const DEFAULT_INACTIVITY_THRESHOLD: Duration = Duration::from_secs(45);

/// Tick driving timers and animation frames.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Time spent walking a token across one cell.
pub const DEFAULT_STEP_DURATION: Duration = Duration::from_millis(250);

/// Background reconciliation period; also retries a failed post-turn sync.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(15);

/// Outbound notices buffered before new ones are dropped.
pub const DEFAULT_NOTICE_CHANNEL_CAPACITY: usize = 256;

/// Turns a shield lasts.
pub const SHIELD_DURATION_TURNS: u32 = 3;

/// Turns a freeze lasts.
pub const FREEZE_DURATION_TURNS: u32 = 2;

/// Tunables for one game session.
///
/// Deserializes from JSON with every field optional:
///
/// ```rust
/// use ladder_session::SessionConfig;
///
/// let config = SessionConfig::from_json_str(r#"{"turn_duration_secs": 90}"#).unwrap();
/// assert_eq!(config.turn_duration().as_secs(), 90);
/// assert_eq!(config.shield_turns, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub turn_duration_secs: u64,
    pub inactivity_threshold_secs: u64,
    pub tick_interval_ms: u64,
    pub step_duration_ms: u64,
    /// 0 disables periodic reconciliation
    pub sync_interval_secs: u64,
    pub notice_channel_capacity: usize,
    pub shield_turns: u32,
    pub freeze_turns: u32,
    /// Subtracted from a cell's vertical center, in grid units.
    pub vertical_adjust: f32,
    /// Peak height of the hop arc while walking, in grid units.
    pub hop_height: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            turn_duration_secs: DEFAULT_TURN_DURATION.as_secs(),
            inactivity_threshold_secs: DEFAULT_INACTIVITY_THRESHOLD.as_secs(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
            step_duration_ms: DEFAULT_STEP_DURATION.as_millis() as u64,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL.as_secs(),
            notice_channel_capacity: DEFAULT_NOTICE_CHANNEL_CAPACITY,
            shield_turns: SHIELD_DURATION_TURNS,
            freeze_turns: FREEZE_DURATION_TURNS,
            vertical_adjust: 0.0,
            hop_height: 0.3,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn turn_duration(&self) -> Duration {
        Duration::from_secs(self.turn_duration_secs)
    }

    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_secs(self.inactivity_threshold_secs)
    }

    /// Never zero; `tokio::time::interval` panics on a zero period.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn step_duration(&self) -> Duration {
        Duration::from_millis(self.step_duration_ms)
    }

    pub fn sync_interval(&self) -> Option<Duration> {
        (self.sync_interval_secs > 0).then(|| Duration::from_secs(self.sync_interval_secs))
    }

    #[must_use]
    pub fn with_turn_duration(mut self, duration: Duration) -> Self {
        self.turn_duration_secs = duration.as_secs();
        self
    }

    #[must_use]
    pub fn with_inactivity_threshold(mut self, threshold: Duration) -> Self {
        self.inactivity_threshold_secs = threshold.as_secs();
        self
    }

    #[must_use]
    pub fn with_sync_interval(mut self, interval: Option<Duration>) -> Self {
        self.sync_interval_secs = interval.map_or(0, |i| i.as_secs());
        self
    }

    #[must_use]
    pub fn with_vertical_adjust(mut self, adjust: f32) -> Self {
        self.vertical_adjust = adjust;
        self
    }

    /// A zero step duration makes every move resolve on the next frame.
    #[must_use]
    pub fn with_instant_animations(mut self) -> Self {
        self.step_duration_ms = 0;
        self
    }
}

/// Who is playing which game on this client.
///
/// Passed explicitly into the orchestrator; there is no ambient "current user".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub game_id: String,
    pub user_id: i64,
    pub display_name: String,
    pub skin_id: Option<i64>,
}

impl SessionContext {
    pub fn new(game_id: impl Into<String>, user_id: i64, display_name: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            user_id,
            display_name: display_name.into(),
            skin_id: None,
        }
    }

    #[must_use]
    pub fn with_skin(mut self, skin_id: i64) -> Self {
        self.skin_id = Some(skin_id);
        self
    }
}
