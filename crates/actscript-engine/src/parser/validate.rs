//! Whole-script validation. Any failure rejects the entire script.

use super::ParsedScript;
use crate::error::ValidationError;
use crate::types::{ActionType, GameAction};

/// Scheduler-level commands that must never reach the engine.
pub const RESERVED_COMMANDS: [&str; 7] =
    ["exit", "stop", "pause", "resume", "restart", "quit", "end"];

/// Check a parsed script against the duration limit and per-type rules.
pub fn validate(parsed: &ParsedScript, max_duration_secs: f64) -> Result<(), ValidationError> {
    if let Some(name) = parsed.rejected.first() {
        return Err(if RESERVED_COMMANDS.contains(&name.as_str()) {
            ValidationError::ReservedCommand(name.clone())
        } else {
            ValidationError::UnsupportedType(name.clone())
        });
    }

    if parsed.groups.is_empty() {
        return Err(ValidationError::EmptyScript);
    }

    for action in parsed.groups.iter().flat_map(|g| g.actions.iter()) {
        validate_parameter(action)?;
        validate_duration(action, max_duration_secs)?;
    }
    Ok(())
}

fn validate_duration(action: &GameAction, max: f64) -> Result<(), ValidationError> {
    let duration = action.duration_secs;
    if !duration.is_finite() {
        return Err(invalid(action, "duration is not a finite number"));
    }
    if duration < 0.0 {
        return Err(ValidationError::NegativeDuration {
            action: action.to_string(),
            duration,
        });
    }
    if duration > max {
        return Err(ValidationError::DurationExceeded {
            action: action.to_string(),
            duration,
            max,
        });
    }
    Ok(())
}

fn validate_parameter(action: &GameAction) -> Result<(), ValidationError> {
    match action.action_type {
        ActionType::Switch => {
            if action.switch_slot().is_none() {
                return Err(invalid(action, "expected a character index from 1 to 4"));
            }
        }
        ActionType::MoveBy => {
            if action.mouse_delta().is_none() {
                return Err(invalid(action, "expected integer offsets 'dx,dy'"));
            }
        }
        ActionType::Attack => {
            if action.parameter.is_some() && !action.is_hold() && action.attack_mode().is_none() {
                return Err(invalid(action, "expected a press count or a duration"));
            }
        }
        ActionType::MoveForward
        | ActionType::MoveLeft
        | ActionType::MoveBack
        | ActionType::MoveRight
        | ActionType::Charge
        | ActionType::Wait
        | ActionType::Skill
        | ActionType::Dash => {
            if action.parameter.is_some()
                && !action.is_hold()
                && action.numeric_parameter().is_none()
            {
                return Err(invalid(action, "expected a duration in seconds or 'hold'"));
            }
        }
        ActionType::Burst | ActionType::Jump | ActionType::Interact | ActionType::AltInteract => {
            if action.parameter.is_some() {
                return Err(invalid(action, "takes no parameter"));
            }
        }
    }
    Ok(())
}

fn invalid(action: &GameAction, reason: &str) -> ValidationError {
    ValidationError::InvalidParameter {
        action: action.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::{parse_and_validate, parse_script};
    use super::*;

    const MAX: f64 = 10.0;

    fn check(script: &str) -> Result<(), ValidationError> {
        validate(&parse_script(script), MAX)
    }

    #[test]
    fn test_valid_scripts() {
        for script in [
            "w(2)&e",
            "sw(2),e,q,attack(3)",
            "attack(0.6)",
            "attack",
            "e(hold)",
            "moveby(10,-20)",
            "dash(0.3)&jump",
            "f,t,wait(1)",
            "charge(1.5)",
            "w(10)",
        ] {
            assert!(check(script).is_ok(), "{} should be valid", script);
        }
    }

    #[test]
    fn test_reserved_commands_rejected() {
        for name in RESERVED_COMMANDS {
            let script = format!("w(1),{}", name);
            assert_eq!(
                check(&script).unwrap_err(),
                ValidationError::ReservedCommand(name.to_string())
            );
        }
        assert_eq!(
            check("STOP").unwrap_err(),
            ValidationError::ReservedCommand("stop".to_string())
        );
    }

    #[test]
    fn test_unsupported_type_rejected() {
        assert_eq!(
            check("w(1)&fly").unwrap_err(),
            ValidationError::UnsupportedType("fly".to_string())
        );
    }

    #[test]
    fn test_empty_script_rejected() {
        assert_eq!(check("").unwrap_err(), ValidationError::EmptyScript);
        assert_eq!(check("(((").unwrap_err(), ValidationError::EmptyScript);
    }

    #[test]
    fn test_duration_bounds() {
        assert!(matches!(
            check("w(10.5)").unwrap_err(),
            ValidationError::DurationExceeded { .. }
        ));
        assert!(matches!(
            check("wait(-1)").unwrap_err(),
            ValidationError::NegativeDuration { .. }
        ));
        assert!(matches!(
            check("w(inf)").unwrap_err(),
            ValidationError::InvalidParameter { .. }
        ));
    }

    #[test]
    fn test_switch_parameter() {
        assert!(check("sw(1)").is_ok());
        assert!(check("sw(4)").is_ok());
        for bad in ["sw", "sw(0)", "sw(5)", "sw(1.5)", "sw(x)"] {
            assert!(
                matches!(check(bad).unwrap_err(), ValidationError::InvalidParameter { .. }),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_moveby_parameter() {
        for bad in ["moveby", "moveby(10)", "moveby(1.5,2)", "moveby(a,b)"] {
            assert!(
                matches!(check(bad).unwrap_err(), ValidationError::InvalidParameter { .. }),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_non_numeric_parameters() {
        assert!(matches!(
            check("w(fast)").unwrap_err(),
            ValidationError::InvalidParameter { .. }
        ));
        assert!(matches!(
            check("attack(-3)").unwrap_err(),
            ValidationError::InvalidParameter { .. }
        ));
        assert!(matches!(
            check("attack(many)").unwrap_err(),
            ValidationError::InvalidParameter { .. }
        ));
    }

    #[test]
    fn test_tap_only_types_take_no_parameter() {
        for bad in ["q(banana)", "jump(1)", "f(hold)", "t(2)"] {
            assert_eq!(
                check(bad).unwrap_err(),
                ValidationError::InvalidParameter {
                    action: bad.to_string(),
                    reason: "takes no parameter".to_string(),
                },
            );
        }
        assert!(check("q&jump&f&t").is_ok());
    }

    #[test]
    fn test_large_attack_count_is_valid() {
        assert!(check("attack(25)").is_ok());
    }

    #[test]
    fn test_one_bad_action_rejects_everything() {
        let err = parse_and_validate("w(1),e,q,sw(9)", MAX).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidParameter { .. }));
    }

    #[test]
    fn test_parse_and_validate_returns_groups() {
        let groups = parse_and_validate("w(1)&e,q", MAX).unwrap();
        assert_eq!(groups.len(), 2);
    }
}
