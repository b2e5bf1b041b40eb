//! Action script parser.
//!
//! ```text
//! script := group (',' group)*
//! group  := action ('&' action)*
//! action := TYPE ['(' PARAM ')']
//! ```
//!
//! Commas and ampersands inside parentheses do not split, so
//! `moveby(10,20),w(1)` is two groups. Malformed actions are logged and
//! skipped; a group left with no actions is dropped.

mod validate;

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{ParseError, ValidationError};
use crate::types::{ActionGroup, ActionType, GameAction};

pub use validate::{validate, RESERVED_COMMANDS};

/// Fixed duration for the literal `hold` parameter.
pub const HOLD_DURATION_SECS: f64 = 0.5;

/// Estimated spacing between count-based attack presses.
pub const ATTACK_PRESS_SECS: f64 = 0.2;

/// Upper bound on presses for a count-based attack.
pub const MAX_ATTACK_COUNT: i64 = 10;

/// Duration assumed for movement, `charge` and `wait` without a parameter.
pub const DEFAULT_HOLD_SECS: f64 = 1.0;

/// Result of parsing a script before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedScript {
    pub groups: Vec<ActionGroup>,
    /// Grammatical action names that are not supported action types.
    pub rejected: Vec<String>,
}

impl ParsedScript {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Sum of every group's estimated duration, in seconds.
    pub fn estimated_duration_secs(&self) -> f64 {
        self.groups.iter().map(|g| g.estimated_duration_secs).sum()
    }
}

enum Token {
    Action(GameAction),
    Unknown(String),
}

fn action_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9_]+)(?:\(([^)]*)\))?$").expect("Invalid action regex")
    })
}

/// Parse a script into groups, keeping unknown action names for validation.
pub fn parse_script(script: &str) -> ParsedScript {
    let mut parsed = ParsedScript::default();

    for group_text in split_top_level(script, ',') {
        let mut actions = Vec::new();
        for action_text in split_top_level(group_text, '&') {
            match parse_action(action_text) {
                Ok(Token::Action(action)) => actions.push(action),
                Ok(Token::Unknown(name)) => {
                    debug!(name = %name, "Unsupported action name");
                    parsed.rejected.push(name);
                }
                Err(e) => warn!(error = %e, "Skipping malformed action"),
            }
        }
        if !actions.is_empty() {
            parsed.groups.push(ActionGroup::new(actions));
        }
    }

    parsed
}

/// Parse a script into action groups in script order.
///
/// An empty or fully unparseable script yields an empty list.
pub fn parse(script: &str) -> Vec<ActionGroup> {
    parse_script(script).groups
}

/// Parse then validate against the configured duration limit.
pub fn parse_and_validate(
    script: &str,
    max_duration_secs: f64,
) -> Result<Vec<ActionGroup>, ValidationError> {
    let parsed = parse_script(script);
    validate(&parsed, max_duration_secs)?;
    Ok(parsed.groups)
}

/// Render groups back into canonical script text.
pub fn format_script(groups: &[ActionGroup]) -> String {
    groups
        .iter()
        .map(|g| g.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_action(text: &str) -> Result<Token, ParseError> {
    let caps = action_regex()
        .captures(text)
        .ok_or_else(|| ParseError::MalformedAction(text.to_string()))?;

    let name = caps[1].to_ascii_lowercase();
    let parameter = caps
        .get(2)
        .map(|m| m.as_str().trim().to_string())
        .filter(|p| !p.is_empty());

    let Ok(action_type) = name.parse::<ActionType>() else {
        return Ok(Token::Unknown(name));
    };

    let duration_secs = infer_duration(action_type, parameter.as_deref());
    Ok(Token::Action(GameAction {
        action_type,
        parameter,
        duration_secs,
    }))
}

/// Duration implied by an action's type and parameter.
///
/// A parameter that should be numeric but is not yields 0 and is left for
/// validation to reject.
pub fn infer_duration(action_type: ActionType, parameter: Option<&str>) -> f64 {
    if parameter == Some("hold") {
        return HOLD_DURATION_SECS;
    }
    let numeric = || parameter.and_then(|p| p.parse::<f64>().ok());

    match action_type {
        ActionType::Attack => match parameter {
            None => 0.0,
            Some(p) if p.contains('.') => numeric().unwrap_or(0.0),
            Some(p) => p
                .parse::<i64>()
                .map(|n| n.clamp(1, MAX_ATTACK_COUNT) as f64 * ATTACK_PRESS_SECS)
                .unwrap_or(0.0),
        },
        ActionType::MoveForward
        | ActionType::MoveLeft
        | ActionType::MoveBack
        | ActionType::MoveRight
        | ActionType::Charge
        | ActionType::Wait => match parameter {
            None => DEFAULT_HOLD_SECS,
            Some(_) => numeric().unwrap_or(0.0),
        },
        ActionType::Skill | ActionType::Dash => numeric().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Split on `sep` outside parentheses, trimming and dropping empty pieces.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_split_respects_parentheses() {
        assert_eq!(
            split_top_level("moveby(10,20),w(1)", ','),
            vec!["moveby(10,20)", "w(1)"]
        );
        assert_eq!(split_top_level(" a , , b ", ','), vec!["a", "b"]);
        assert_eq!(split_top_level("w&e", '&'), vec!["w", "e"]);
        assert!(split_top_level("", ',').is_empty());
    }

    #[test]
    fn test_parse_groups_and_simultaneous_actions() {
        let groups = parse("w(2)&e, q");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].actions.len(), 2);
        assert_eq!(groups[0].actions[0].action_type, ActionType::MoveForward);
        assert_eq!(groups[0].actions[0].parameter.as_deref(), Some("2"));
        assert_eq!(groups[0].actions[1].action_type, ActionType::Skill);
        assert_eq!(groups[1].actions[0].action_type, ActionType::Burst);
    }

    #[test]
    fn test_parse_comma_inside_parameter() {
        let groups = parse("moveby(10,20),w(1)");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].actions[0].mouse_delta(), Some((10, 20)));
    }

    #[test]
    fn test_names_are_case_insensitive() {
        let groups = parse("W(1)&Attack");
        assert_eq!(groups[0].actions[0].action_type, ActionType::MoveForward);
        assert_eq!(groups[0].actions[1].action_type, ActionType::Attack);
    }

    #[test]
    fn test_malformed_actions_are_skipped() {
        let parsed = parse_script("w(1)&e(,q");
        // "e(" swallows the comma, leaving one malformed token in group one.
        assert_eq!(parsed.groups.len(), 1);
        assert_eq!(parsed.groups[0].actions.len(), 1);

        let parsed = parse_script("w(1),!!,q");
        assert_eq!(parsed.groups.len(), 2);
        assert!(parsed.rejected.is_empty());
    }

    #[test]
    fn test_empty_and_unparseable_scripts() {
        assert!(parse("").is_empty());
        assert!(parse("  ,  ,").is_empty());
        assert!(parse("???").is_empty());
    }

    #[test]
    fn test_unknown_names_are_rejected_not_dropped() {
        let parsed = parse_script("w(1),exit,fly(2)");
        assert_eq!(parsed.groups.len(), 1);
        assert_eq!(parsed.rejected, vec!["exit".to_string(), "fly".to_string()]);
    }

    #[test]
    fn test_duration_inference() {
        assert!(approx(infer_duration(ActionType::MoveForward, None), 1.0));
        assert!(approx(infer_duration(ActionType::MoveForward, Some("2.5")), 2.5));
        assert!(approx(infer_duration(ActionType::Skill, None), 0.0));
        assert!(approx(infer_duration(ActionType::Skill, Some("hold")), 0.5));
        assert!(approx(infer_duration(ActionType::Burst, None), 0.0));
        assert!(approx(infer_duration(ActionType::Dash, None), 0.0));
        assert!(approx(infer_duration(ActionType::Dash, Some("0.3")), 0.3));
        assert!(approx(infer_duration(ActionType::Wait, Some("2")), 2.0));
        assert!(approx(infer_duration(ActionType::Switch, Some("2")), 0.0));
        assert!(approx(infer_duration(ActionType::MoveBy, Some("1,2")), 0.0));
        assert!(approx(infer_duration(ActionType::MoveForward, Some("fast")), 0.0));
        assert!(infer_duration(ActionType::MoveForward, Some("-1")) < 0.0);
    }

    #[test]
    fn test_attack_durations() {
        assert!(approx(infer_duration(ActionType::Attack, None), 0.0));
        assert!(approx(infer_duration(ActionType::Attack, Some("3")), 0.6));
        assert!(approx(infer_duration(ActionType::Attack, Some("0.6")), 0.6));
        assert!(approx(infer_duration(ActionType::Attack, Some("0")), 0.2));
        assert!(approx(infer_duration(ActionType::Attack, Some("50")), 2.0));
        assert!(approx(infer_duration(ActionType::Attack, Some("hold")), 0.5));
    }

    #[test]
    fn test_format_round_trip() {
        let script = "w(2)&e,sw(3),moveby(10,-5),attack(0.6),q";
        let groups = parse(script);
        assert_eq!(format_script(&groups), script);
        assert_eq!(format_script(&parse(&format_script(&groups))), script);
    }

    #[test]
    fn test_format_normalizes_whitespace_and_case() {
        let groups = parse(" W ( 2 ) & E , q ");
        // "W ( 2 )" contains a space before the parenthesis and is malformed.
        assert_eq!(format_script(&groups), "e,q");

        let groups = parse(" W(2) & E , Q ");
        assert_eq!(format_script(&groups), "w(2)&e,q");
    }

    #[test]
    fn test_estimated_total() {
        let parsed = parse_script("w(2)&e,wait(1.5),q");
        assert!(approx(parsed.estimated_duration_secs(), 3.5));
    }
}
