//! Core types and value objects for the action engine.
//!
//! Defines action types, actions, action groups, per-action outcomes and the
//! queue status snapshot.

use std::fmt;

use actscript_input::GameInput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Every action a script may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// `w`
    MoveForward,
    /// `a`
    MoveLeft,
    /// `s`
    MoveBack,
    /// `d`
    MoveRight,
    /// `e`
    Skill,
    /// `q`
    Burst,
    Attack,
    Charge,
    /// `sw`
    Switch,
    Dash,
    Jump,
    /// `f`
    Interact,
    /// `t`
    AltInteract,
    Wait,
    MoveBy,
}

impl ActionType {
    pub const ALL: [ActionType; 15] = [
        ActionType::MoveForward,
        ActionType::MoveLeft,
        ActionType::MoveBack,
        ActionType::MoveRight,
        ActionType::Skill,
        ActionType::Burst,
        ActionType::Attack,
        ActionType::Charge,
        ActionType::Switch,
        ActionType::Dash,
        ActionType::Jump,
        ActionType::Interact,
        ActionType::AltInteract,
        ActionType::Wait,
        ActionType::MoveBy,
    ];

    /// The script token for this type.
    pub fn token(&self) -> &'static str {
        match self {
            ActionType::MoveForward => "w",
            ActionType::MoveLeft => "a",
            ActionType::MoveBack => "s",
            ActionType::MoveRight => "d",
            ActionType::Skill => "e",
            ActionType::Burst => "q",
            ActionType::Attack => "attack",
            ActionType::Charge => "charge",
            ActionType::Switch => "sw",
            ActionType::Dash => "dash",
            ActionType::Jump => "jump",
            ActionType::Interact => "f",
            ActionType::AltInteract => "t",
            ActionType::Wait => "wait",
            ActionType::MoveBy => "moveby",
        }
    }

    /// The game input driven by this type, if it is a fixed one.
    ///
    /// `Switch` depends on its parameter and `Wait` / `MoveBy` press nothing.
    pub fn input(&self) -> Option<GameInput> {
        match self {
            ActionType::MoveForward => Some(GameInput::Forward),
            ActionType::MoveLeft => Some(GameInput::Left),
            ActionType::MoveBack => Some(GameInput::Back),
            ActionType::MoveRight => Some(GameInput::Right),
            ActionType::Skill => Some(GameInput::Skill),
            ActionType::Burst => Some(GameInput::Burst),
            ActionType::Attack | ActionType::Charge => Some(GameInput::Attack),
            ActionType::Dash => Some(GameInput::Sprint),
            ActionType::Jump => Some(GameInput::Jump),
            ActionType::Interact => Some(GameInput::Interact),
            ActionType::AltInteract => Some(GameInput::AltInteract),
            ActionType::Switch | ActionType::Wait | ActionType::MoveBy => None,
        }
    }

    /// Whether executing this type sends anything to the game window.
    pub fn needs_focus(&self) -> bool {
        !matches!(self, ActionType::Wait)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .iter()
            .copied()
            .find(|t| t.token() == s)
            .ok_or_else(|| format!("Unknown action type: {}", s))
    }
}

/// How an `attack` action repeats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttackMode {
    /// No parameter: one press.
    Single,
    /// Integer parameter: that many presses.
    Count(u32),
    /// Decimal parameter: presses spread over that many seconds.
    Timed(f64),
}

/// Lifecycle of one action inside the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    Pending,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl ActionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionState::Completed | ActionState::Cancelled | ActionState::Failed
        )
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionState::Pending => write!(f, "pending"),
            ActionState::Running => write!(f, "running"),
            ActionState::Completed => write!(f, "completed"),
            ActionState::Cancelled => write!(f, "cancelled"),
            ActionState::Failed => write!(f, "failed"),
        }
    }
}

// =============================================================================
// Domain Structs
// =============================================================================

/// One symbolic command from a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameAction {
    pub action_type: ActionType,
    pub parameter: Option<String>,
    /// How long the input stays held, or how long a timed loop repeats.
    pub duration_secs: f64,
}

impl GameAction {
    /// Key identifying this action in the executor's running map.
    pub fn key(&self) -> String {
        format!(
            "{}_{}",
            self.action_type,
            self.parameter.as_deref().unwrap_or("")
        )
    }

    /// Whether the parameter is the literal `hold`.
    pub fn is_hold(&self) -> bool {
        self.parameter.as_deref() == Some("hold")
    }

    /// Parameter as a number, if it is one.
    pub fn numeric_parameter(&self) -> Option<f64> {
        self.parameter.as_deref().and_then(|p| p.parse::<f64>().ok())
    }

    /// Party slot for `sw`, only when it is an integer in 1..=4.
    pub fn switch_slot(&self) -> Option<u8> {
        self.parameter
            .as_deref()
            .and_then(|p| p.parse::<u8>().ok())
            .filter(|n| (1..=4).contains(n))
    }

    /// `(dx, dy)` for `moveby`, only when the parameter is `int,int`.
    pub fn mouse_delta(&self) -> Option<(i32, i32)> {
        let (x, y) = self.parameter.as_deref()?.split_once(',')?;
        Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
    }

    /// Repeat mode of an `attack`; `None` for other types or a bad parameter.
    pub fn attack_mode(&self) -> Option<AttackMode> {
        if self.action_type != ActionType::Attack {
            return None;
        }
        match self.parameter.as_deref() {
            None => Some(AttackMode::Single),
            Some(p) if p.contains('.') => p.parse::<f64>().ok().map(AttackMode::Timed),
            Some(p) => p.parse::<u32>().ok().map(|n| AttackMode::Count(n.max(1))),
        }
    }
}

impl fmt::Display for GameAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parameter {
            Some(p) => write!(f, "{}({})", self.action_type, p),
            None => write!(f, "{}", self.action_type),
        }
    }
}

/// Actions meant to run at the same time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionGroup {
    pub id: Uuid,
    pub actions: Vec<GameAction>,
    /// Longest member duration; only used for ETA reporting.
    pub estimated_duration_secs: f64,
}

impl ActionGroup {
    pub fn new(actions: Vec<GameAction>) -> Self {
        let estimated_duration_secs = actions
            .iter()
            .map(|a| a.duration_secs)
            .fold(0.0_f64, f64::max);
        Self {
            id: Uuid::new_v4(),
            actions,
            estimated_duration_secs,
        }
    }

    pub fn types(&self) -> impl Iterator<Item = ActionType> + '_ {
        self.actions.iter().map(|a| a.action_type)
    }

    pub fn contains(&self, action_type: ActionType) -> bool {
        self.types().any(|t| t == action_type)
    }
}

impl fmt::Display for ActionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, action) in self.actions.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{}", action)?;
        }
        Ok(())
    }
}

/// Terminal result of one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action: GameAction,
    pub state: ActionState,
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn completed(action: GameAction) -> Self {
        Self {
            action,
            state: ActionState::Completed,
            error: None,
        }
    }

    pub fn cancelled(action: GameAction) -> Self {
        Self {
            action,
            state: ActionState::Cancelled,
            error: None,
        }
    }

    pub fn failed(action: GameAction, error: impl Into<String>) -> Self {
        Self {
            action,
            state: ActionState::Failed,
            error: Some(error.into()),
        }
    }
}

/// What the executor reports back when a group is done or abandoned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupReport {
    pub group: ActionGroup,
    pub outcomes: Vec<ActionOutcome>,
    pub interrupted: bool,
}

impl GroupReport {
    pub fn count(&self, state: ActionState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }
}

/// A group in the finished history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishedGroup {
    pub report: GroupReport,
    pub finished_at: DateTime<Utc>,
}

/// Point-in-time view of the queue, consumed by observation reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pending_actions_text: String,
    pub pending_count: usize,
    pub estimated_completion_ms: u64,
    pub last_input_text: String,
    pub finished_count: usize,
    pub finished_sample_text: String,
    pub running_count: usize,
    pub running_text: String,
    pub error_count: u32,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn action(action_type: ActionType, parameter: Option<&str>, duration_secs: f64) -> GameAction {
        GameAction {
            action_type,
            parameter: parameter.map(str::to_string),
            duration_secs,
        }
    }

    #[test]
    fn test_action_type_tokens_round_trip() {
        for t in ActionType::ALL {
            assert_eq!(t.token().parse::<ActionType>().unwrap(), t);
            assert_eq!(t.to_string(), t.token());
        }
        assert!("exit".parse::<ActionType>().is_err());
        assert!("W".parse::<ActionType>().is_err());
    }

    #[test]
    fn test_action_type_inputs() {
        assert_eq!(ActionType::MoveForward.input(), Some(GameInput::Forward));
        assert_eq!(ActionType::Charge.input(), Some(GameInput::Attack));
        assert_eq!(ActionType::Dash.input(), Some(GameInput::Sprint));
        assert_eq!(ActionType::Switch.input(), None);
        assert_eq!(ActionType::Wait.input(), None);
        assert!(!ActionType::Wait.needs_focus());
        assert!(ActionType::MoveBy.needs_focus());
    }

    #[test]
    fn test_action_key() {
        assert_eq!(action(ActionType::MoveForward, Some("5"), 5.0).key(), "w_5");
        assert_eq!(action(ActionType::Skill, None, 0.0).key(), "e_");
    }

    #[test]
    fn test_switch_slot() {
        assert_eq!(action(ActionType::Switch, Some("2"), 0.0).switch_slot(), Some(2));
        assert_eq!(action(ActionType::Switch, Some("5"), 0.0).switch_slot(), None);
        assert_eq!(action(ActionType::Switch, Some("0"), 0.0).switch_slot(), None);
        assert_eq!(action(ActionType::Switch, None, 0.0).switch_slot(), None);
    }

    #[test]
    fn test_mouse_delta() {
        assert_eq!(
            action(ActionType::MoveBy, Some("10,-20"), 0.0).mouse_delta(),
            Some((10, -20))
        );
        assert_eq!(
            action(ActionType::MoveBy, Some(" 3 , 4 "), 0.0).mouse_delta(),
            Some((3, 4))
        );
        assert_eq!(action(ActionType::MoveBy, Some("10"), 0.0).mouse_delta(), None);
        assert_eq!(action(ActionType::MoveBy, Some("1.5,2"), 0.0).mouse_delta(), None);
    }

    #[test]
    fn test_attack_mode() {
        assert_eq!(
            action(ActionType::Attack, None, 0.0).attack_mode(),
            Some(AttackMode::Single)
        );
        assert_eq!(
            action(ActionType::Attack, Some("3"), 0.6).attack_mode(),
            Some(AttackMode::Count(3))
        );
        assert_eq!(
            action(ActionType::Attack, Some("25"), 2.0).attack_mode(),
            Some(AttackMode::Count(25))
        );
        assert_eq!(
            action(ActionType::Attack, Some("0.6"), 0.6).attack_mode(),
            Some(AttackMode::Timed(0.6))
        );
        assert_eq!(action(ActionType::Attack, Some("-2"), 0.0).attack_mode(), None);
        assert_eq!(action(ActionType::Charge, Some("1"), 1.0).attack_mode(), None);
    }

    #[test]
    fn test_group_estimate_is_max_duration() {
        let group = ActionGroup::new(vec![
            action(ActionType::MoveForward, Some("5"), 5.0),
            action(ActionType::Skill, None, 0.0),
        ]);
        assert_eq!(group.estimated_duration_secs, 5.0);
        assert!(group.contains(ActionType::Skill));
        assert!(!group.contains(ActionType::Burst));

        let empty = ActionGroup::new(Vec::new());
        assert_eq!(empty.estimated_duration_secs, 0.0);
    }

    #[test]
    fn test_group_display() {
        let group = ActionGroup::new(vec![
            action(ActionType::MoveForward, Some("5"), 5.0),
            action(ActionType::Skill, Some("hold"), 0.5),
        ]);
        assert_eq!(group.to_string(), "w(5)&e(hold)");
    }

    #[test]
    fn test_action_state_terminal() {
        assert!(!ActionState::Pending.is_terminal());
        assert!(!ActionState::Running.is_terminal());
        assert!(ActionState::Completed.is_terminal());
        assert!(ActionState::Cancelled.is_terminal());
        assert!(ActionState::Failed.is_terminal());
        assert_eq!(ActionState::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_group_report_counts() {
        let w = action(ActionType::MoveForward, Some("1"), 1.0);
        let e = action(ActionType::Skill, None, 0.0);
        let report = GroupReport {
            group: ActionGroup::new(vec![w.clone(), e.clone()]),
            outcomes: vec![
                ActionOutcome::cancelled(w),
                ActionOutcome::failed(e, "device"),
            ],
            interrupted: true,
        };
        assert_eq!(report.count(ActionState::Cancelled), 1);
        assert_eq!(report.count(ActionState::Failed), 1);
        assert_eq!(report.count(ActionState::Completed), 0);
    }

    #[test]
    fn test_queue_status_serializes() {
        let status = QueueStatus {
            pending_actions_text: "s(1)".to_string(),
            pending_count: 1,
            estimated_completion_ms: 1000,
            ..QueueStatus::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["pending_actions_text"], "s(1)");
        assert_eq!(json["estimated_completion_ms"], 1000);
    }
}
