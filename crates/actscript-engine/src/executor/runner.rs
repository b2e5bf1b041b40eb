//! Execution of a single action against the input driver.
//!
//! Every held input goes through [`HeldInput`], whose `Drop` issues the
//! key-up if the explicit release never ran. A cancelled hold therefore
//! still releases, and so does a task that is aborted mid-hold.

use std::time::Duration;

use actscript_input::{GameInput, InputDriver, InputError};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::ExecutionError;
use crate::types::{ActionOutcome, ActionType, AttackMode, GameAction};

/// Dash durations above this are held instead of tapped.
const DASH_HOLD_THRESHOLD_SECS: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
pub(crate) struct RunSettings {
    pub attack_interval: Duration,
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    Completed,
    Cancelled,
}

/// An input pushed down and owed a release.
struct HeldInput<'a> {
    driver: &'a dyn InputDriver,
    input: GameInput,
    released: bool,
}

impl<'a> HeldInput<'a> {
    fn acquire(driver: &'a dyn InputDriver, input: GameInput) -> Result<Self, InputError> {
        driver.hold_down(input)?;
        Ok(Self {
            driver,
            input,
            released: false,
        })
    }

    fn release(mut self) -> Result<(), InputError> {
        self.released = true;
        self.driver.release(self.input)
    }
}

impl Drop for HeldInput<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.driver.release(self.input) {
                warn!(input = %self.input, error = %e, "Failed to release held input");
            }
        }
    }
}

/// Run one action to a terminal outcome. Never returns an error: faults end
/// the action in `Failed` and are logged.
pub(crate) async fn run_action(
    driver: &dyn InputDriver,
    action: &GameAction,
    token: &CancellationToken,
    settings: &RunSettings,
) -> ActionOutcome {
    lifecycle!(
        settings.verbose,
        action = %action,
        duration_secs = action.duration_secs,
        "Action started"
    );

    let result = if token.is_cancelled() {
        Ok(Finish::Cancelled)
    } else {
        execute(driver, action, token, settings).await
    };

    match result {
        Ok(Finish::Completed) => {
            lifecycle!(settings.verbose, action = %action, "Action completed");
            ActionOutcome::completed(action.clone())
        }
        Ok(Finish::Cancelled) => {
            lifecycle!(settings.verbose, action = %action, "Action cancelled");
            ActionOutcome::cancelled(action.clone())
        }
        Err(e) => {
            warn!(action = %action, error = %e, "Action failed");
            ActionOutcome::failed(action.clone(), e.to_string())
        }
    }
}

async fn execute(
    driver: &dyn InputDriver,
    action: &GameAction,
    token: &CancellationToken,
    settings: &RunSettings,
) -> Result<Finish, ExecutionError> {
    let duration = secs(action.duration_secs);

    match action.action_type {
        ActionType::MoveForward
        | ActionType::MoveLeft
        | ActionType::MoveBack
        | ActionType::MoveRight
        | ActionType::Charge => hold(driver, input_of(action)?, duration, token).await,
        ActionType::Skill if action.is_hold() || action.duration_secs > 0.0 => {
            hold(driver, GameInput::Skill, duration, token).await
        }
        ActionType::Dash if action.duration_secs > DASH_HOLD_THRESHOLD_SECS => {
            hold(driver, GameInput::Sprint, duration, token).await
        }
        ActionType::Skill
        | ActionType::Burst
        | ActionType::Dash
        | ActionType::Jump
        | ActionType::Interact
        | ActionType::AltInteract => {
            driver.press(input_of(action)?)?;
            Ok(Finish::Completed)
        }
        ActionType::Switch => {
            let slot = action
                .switch_slot()
                .ok_or_else(|| ExecutionError::InvalidAction(action.to_string()))?;
            driver.press(GameInput::Member(slot))?;
            Ok(Finish::Completed)
        }
        ActionType::Attack if action.is_hold() => {
            hold(driver, GameInput::Attack, duration, token).await
        }
        ActionType::Attack => {
            let presses = match action.attack_mode() {
                Some(AttackMode::Single) => 1,
                Some(AttackMode::Count(n)) => n,
                Some(AttackMode::Timed(secs)) => {
                    let interval = settings.attack_interval.as_secs_f64();
                    (secs / interval).round().max(1.0) as u32
                }
                None => return Err(ExecutionError::InvalidAction(action.to_string())),
            };
            repeat_press(driver, GameInput::Attack, presses, settings.attack_interval, token).await
        }
        ActionType::Wait => Ok(pause(duration, token).await),
        ActionType::MoveBy => {
            let (dx, dy) = action
                .mouse_delta()
                .ok_or_else(|| ExecutionError::InvalidAction(action.to_string()))?;
            driver.move_mouse_by(dx, dy)?;
            Ok(Finish::Completed)
        }
    }
}

fn input_of(action: &GameAction) -> Result<GameInput, ExecutionError> {
    action
        .action_type
        .input()
        .ok_or_else(|| ExecutionError::InvalidAction(action.to_string()))
}

async fn hold(
    driver: &dyn InputDriver,
    input: GameInput,
    duration: Duration,
    token: &CancellationToken,
) -> Result<Finish, ExecutionError> {
    let held = HeldInput::acquire(driver, input)?;
    let finish = pause(duration, token).await;
    held.release()?;
    Ok(finish)
}

/// Press `count` times, one interval apart, stopping early on cancellation.
async fn repeat_press(
    driver: &dyn InputDriver,
    input: GameInput,
    count: u32,
    interval: Duration,
    token: &CancellationToken,
) -> Result<Finish, ExecutionError> {
    for _ in 0..count {
        if token.is_cancelled() {
            return Ok(Finish::Cancelled);
        }
        driver.press(input)?;
        if pause(interval, token).await == Finish::Cancelled {
            return Ok(Finish::Cancelled);
        }
    }
    Ok(Finish::Completed)
}

async fn pause(duration: Duration, token: &CancellationToken) -> Finish {
    tokio::select! {
        biased;
        _ = token.cancelled() => Finish::Cancelled,
        _ = tokio::time::sleep(duration) => Finish::Completed,
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use actscript_input::{InputEvent, MockInputDriver};

    use super::*;
    use crate::types::ActionState;

    fn settings() -> RunSettings {
        RunSettings {
            attack_interval: Duration::from_millis(10),
            verbose: false,
        }
    }

    fn action(action_type: ActionType, parameter: Option<&str>, duration_secs: f64) -> GameAction {
        GameAction {
            action_type,
            parameter: parameter.map(str::to_string),
            duration_secs,
        }
    }

    #[tokio::test]
    async fn test_hold_completes_with_down_and_up() {
        let driver = MockInputDriver::new();
        let token = CancellationToken::new();
        let w = action(ActionType::MoveForward, Some("0.02"), 0.02);

        let outcome = run_action(&driver, &w, &token, &settings()).await;
        assert_eq!(outcome.state, ActionState::Completed);
        assert_eq!(
            driver.events(),
            vec![
                InputEvent::Down(GameInput::Forward),
                InputEvent::Up(GameInput::Forward)
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_hold_still_releases() {
        let driver = MockInputDriver::new();
        let token = CancellationToken::new();
        let w = action(ActionType::MoveForward, Some("10"), 10.0);

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            run_action(&driver, &w, &token, &settings()),
        )
        .await
        .expect("cancelled hold should return promptly");
        assert_eq!(outcome.state, ActionState::Cancelled);
        assert_eq!(driver.count(&InputEvent::Down(GameInput::Forward)), 1);
        assert_eq!(driver.count(&InputEvent::Up(GameInput::Forward)), 1);
        assert!(driver.held().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_hold_releases() {
        let driver = MockInputDriver::new();
        let token = CancellationToken::new();
        let charge = action(ActionType::Charge, Some("10"), 10.0);

        // Dropping the future mid-hold is what an aborted task does.
        let _ = tokio::time::timeout(
            Duration::from_millis(20),
            run_action(&driver, &charge, &token, &settings()),
        )
        .await;
        assert_eq!(
            driver.events(),
            vec![
                InputEvent::Down(GameInput::Attack),
                InputEvent::Up(GameInput::Attack)
            ]
        );
    }

    #[tokio::test]
    async fn test_already_cancelled_does_nothing() {
        let driver = MockInputDriver::new();
        let token = CancellationToken::new();
        token.cancel();
        let outcome = run_action(&driver, &action(ActionType::Burst, None, 0.0), &token, &settings()).await;
        assert_eq!(outcome.state, ActionState::Cancelled);
        assert!(driver.events().is_empty());
    }

    #[tokio::test]
    async fn test_taps() {
        let driver = MockInputDriver::new();
        let token = CancellationToken::new();
        for a in [
            action(ActionType::Skill, None, 0.0),
            action(ActionType::Burst, None, 0.0),
            action(ActionType::Jump, None, 0.0),
            action(ActionType::Interact, None, 0.0),
            action(ActionType::AltInteract, None, 0.0),
            action(ActionType::Dash, None, 0.0),
            action(ActionType::Switch, Some("3"), 0.0),
        ] {
            let outcome = run_action(&driver, &a, &token, &settings()).await;
            assert_eq!(outcome.state, ActionState::Completed, "{}", a);
        }
        assert_eq!(
            driver.events(),
            vec![
                InputEvent::Press(GameInput::Skill),
                InputEvent::Press(GameInput::Burst),
                InputEvent::Press(GameInput::Jump),
                InputEvent::Press(GameInput::Interact),
                InputEvent::Press(GameInput::AltInteract),
                InputEvent::Press(GameInput::Sprint),
                InputEvent::Press(GameInput::Member(3)),
            ]
        );
    }

    #[tokio::test]
    async fn test_skill_hold_and_long_dash_are_held() {
        let driver = MockInputDriver::new();
        let token = CancellationToken::new();
        run_action(&driver, &action(ActionType::Skill, Some("hold"), 0.01), &token, &settings()).await;
        run_action(&driver, &action(ActionType::Dash, Some("0.2"), 0.2), &token, &settings()).await;
        assert_eq!(
            driver.events(),
            vec![
                InputEvent::Down(GameInput::Skill),
                InputEvent::Up(GameInput::Skill),
                InputEvent::Down(GameInput::Sprint),
                InputEvent::Up(GameInput::Sprint),
            ]
        );
    }

    #[tokio::test]
    async fn test_attack_count_and_timed() {
        let driver = MockInputDriver::new();
        let token = CancellationToken::new();
        let press = InputEvent::Press(GameInput::Attack);

        run_action(&driver, &action(ActionType::Attack, None, 0.0), &token, &settings()).await;
        assert_eq!(driver.count(&press), 1);

        driver.clear();
        run_action(&driver, &action(ActionType::Attack, Some("3"), 0.6), &token, &settings()).await;
        assert_eq!(driver.count(&press), 3);

        driver.clear();
        // 0.05s at a 10ms interval is five presses.
        run_action(&driver, &action(ActionType::Attack, Some("0.05"), 0.05), &token, &settings()).await;
        assert_eq!(driver.count(&press), 5);
    }

    #[tokio::test]
    async fn test_attack_count_above_estimate_cap_presses_every_time() {
        let driver = MockInputDriver::new();
        let token = CancellationToken::new();
        // The estimate caps at ten presses; execution does not.
        let outcome = run_action(&driver, &action(ActionType::Attack, Some("25"), 2.0), &token, &settings()).await;
        assert_eq!(outcome.state, ActionState::Completed);
        assert_eq!(driver.count(&InputEvent::Press(GameInput::Attack)), 25);
    }

    #[tokio::test]
    async fn test_attack_stops_early_when_cancelled() {
        let driver = MockInputDriver::new();
        let token = CancellationToken::new();
        let slow = RunSettings {
            attack_interval: Duration::from_millis(100),
            verbose: true,
        };

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            cancel.cancel();
        });

        let outcome = run_action(&driver, &action(ActionType::Attack, Some("10"), 2.0), &token, &slow).await;
        assert_eq!(outcome.state, ActionState::Cancelled);
        let presses = driver.count(&InputEvent::Press(GameInput::Attack));
        assert!(presses >= 1 && presses < 10, "got {} presses", presses);
    }

    #[tokio::test]
    async fn test_wait_and_moveby() {
        let driver = MockInputDriver::new();
        let token = CancellationToken::new();
        let outcome = run_action(&driver, &action(ActionType::Wait, Some("0.01"), 0.01), &token, &settings()).await;
        assert_eq!(outcome.state, ActionState::Completed);
        assert!(driver.events().is_empty());

        run_action(&driver, &action(ActionType::MoveBy, Some("5,-7"), 0.0), &token, &settings()).await;
        assert_eq!(driver.events(), vec![InputEvent::MouseMove(5, -7)]);
    }

    #[tokio::test]
    async fn test_device_failure_is_reported_not_raised() {
        let driver = MockInputDriver::new();
        driver.fail_on(GameInput::Burst);
        let token = CancellationToken::new();
        let outcome = run_action(&driver, &action(ActionType::Burst, None, 0.0), &token, &settings()).await;
        assert_eq!(outcome.state, ActionState::Failed);
        assert!(outcome.error.unwrap().contains("mock failure"));
    }

    #[tokio::test]
    async fn test_invalid_switch_fails() {
        let driver = MockInputDriver::new();
        let token = CancellationToken::new();
        let outcome = run_action(&driver, &action(ActionType::Switch, Some("7"), 0.0), &token, &settings()).await;
        assert_eq!(outcome.state, ActionState::Failed);
        assert!(driver.events().is_empty());
    }
}
