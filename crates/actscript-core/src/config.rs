use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ActscriptError, Result};

/// Top-level configuration for actscript.
///
/// Loaded from `~/.actscript/config.toml` by default. Each section corresponds
/// to one collaborator of the action engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActscriptConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub keys: KeyConfig,
}

impl ActscriptConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// engine limits are out of range.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ActscriptConfig = toml::from_str(&content)?;
        config.engine.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Render the configuration as pretty TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ActscriptError::Config(e.to_string()))
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// How a freshly submitted script is reconciled with work already queued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    /// Interrupt everything, drop pending work, enqueue the new script.
    #[default]
    Replace,
    /// Interrupt only conflicting actions, drop pending work, enqueue the new script.
    Merge,
}

impl fmt::Display for QueueMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueMode::Replace => write!(f, "replace"),
            QueueMode::Merge => write!(f, "merge"),
        }
    }
}

impl std::str::FromStr for QueueMode {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "replace" => Ok(QueueMode::Replace),
            "merge" => Ok(QueueMode::Merge),
            _ => Err(format!("Unknown queue mode: {}", s)),
        }
    }
}

/// Action engine limits and timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Longest duration a single action may request, in seconds.
    pub max_action_duration_secs: f64,
    /// Queueing policy applied to every `add_commands` call.
    pub queue_mode: QueueMode,
    /// Promote per-action lifecycle logging from debug to info.
    pub debug: bool,
    /// Consecutive failed submissions before the circuit breaker trips.
    pub max_error_count: u32,
    /// Sleep between polls of an empty queue, in milliseconds.
    pub poll_interval_ms: u64,
    /// Backoff after a fault in the execution loop, in milliseconds.
    pub error_backoff_ms: u64,
    /// How long `stop` waits for the execution loop to exit, in milliseconds.
    pub stop_timeout_ms: u64,
    /// How long a cancelled group may spend releasing inputs, in milliseconds.
    pub cleanup_timeout_ms: u64,
    /// Number of finished groups kept for status reporting.
    pub history_limit: usize,
    /// Spacing between repeated attack presses, in milliseconds.
    pub attack_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_action_duration_secs: 10.0,
            queue_mode: QueueMode::Replace,
            debug: false,
            max_error_count: 5,
            poll_interval_ms: 50,
            error_backoff_ms: 1000,
            stop_timeout_ms: 5000,
            cleanup_timeout_ms: 1000,
            history_limit: 5,
            attack_interval_ms: 200,
        }
    }
}

impl EngineConfig {
    /// Reject limits that would make the engine unusable.
    pub fn validate(&self) -> Result<()> {
        if !self.max_action_duration_secs.is_finite() || self.max_action_duration_secs <= 0.0 {
            return Err(ActscriptError::Config(format!(
                "engine.max_action_duration_secs must be positive, got {}",
                self.max_action_duration_secs
            )));
        }
        if self.max_error_count == 0 {
            return Err(ActscriptError::Config(
                "engine.max_error_count must be at least 1".to_string(),
            ));
        }
        if self.attack_interval_ms == 0 {
            return Err(ActscriptError::Config(
                "engine.attack_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_millis(self.cleanup_timeout_ms)
    }

    pub fn attack_interval(&self) -> Duration {
        Duration::from_millis(self.attack_interval_ms)
    }
}

/// Target window configuration for focus control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Substring of the game window title.
    pub window_title: String,
    /// Delay after re-activating the window before input is sent, in milliseconds.
    pub focus_settle_ms: u64,
    /// Whether to check and restore focus before dispatching a group.
    pub require_focus: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            window_title: "Genshin Impact".to_string(),
            focus_settle_ms: 200,
            require_focus: true,
        }
    }
}

impl TargetConfig {
    pub fn focus_settle(&self) -> Duration {
        Duration::from_millis(self.focus_settle_ms)
    }
}

/// Key names bound to each symbolic game input.
///
/// Names are resolved by the input driver: single letters and digits, `space`,
/// `shift`, `ctrl`, `alt`, `tab`, `esc`, `enter`, `f1`..`f12`, `mouse_left`,
/// `mouse_right`, `mouse_middle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    pub forward: String,
    pub left: String,
    pub back: String,
    pub right: String,
    pub skill: String,
    pub burst: String,
    pub attack: String,
    pub sprint: String,
    pub jump: String,
    pub interact: String,
    pub alt_interact: String,
    pub member_1: String,
    pub member_2: String,
    pub member_3: String,
    pub member_4: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            forward: "w".to_string(),
            left: "a".to_string(),
            back: "s".to_string(),
            right: "d".to_string(),
            skill: "e".to_string(),
            burst: "q".to_string(),
            attack: "mouse_left".to_string(),
            sprint: "shift".to_string(),
            jump: "space".to_string(),
            interact: "f".to_string(),
            alt_interact: "t".to_string(),
            member_1: "1".to_string(),
            member_2: "2".to_string(),
            member_3: "3".to_string(),
            member_4: "4".to_string(),
        }
    }
}
