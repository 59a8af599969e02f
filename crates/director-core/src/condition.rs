//! Typed condition evaluation. Every report carries the evaluated left-hand
//! value so rejection traces stay useful.

use std::cmp::Ordering;

use contracts::{ConditionOp, TypedCondition, Value};
use serde::{Deserialize, Serialize};

use crate::path::StatePath;
use crate::state::StoryState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionReport {
    pub satisfied: bool,
    pub reason: String,
}

impl ConditionReport {
    fn fail(reason: impl Into<String>) -> Self {
        Self {
            satisfied: false,
            reason: reason.into(),
        }
    }
}

pub fn evaluate_typed(condition: &TypedCondition, state: &StoryState) -> ConditionReport {
    let path = match StatePath::parse(&condition.path) {
        Ok(path) => path,
        Err(err) => return ConditionReport::fail(err.to_string()),
    };
    let display = path.to_string();

    let Some(actual) = state.lookup(&path) else {
        // Absence-tolerant operators treat a missing set or list as empty.
        return match condition.op {
            ConditionOp::LacksTag | ConditionOp::NotIn => ConditionReport {
                satisfied: true,
                reason: format!(
                    "{display} not present, treated as empty (satisfies {} {})",
                    condition.op, condition.value
                ),
            },
            _ => ConditionReport::fail(format!("path {display} not present")),
        };
    };

    match compare(&actual, condition.op, &condition.value) {
        Ok(true) => ConditionReport {
            satisfied: true,
            reason: format!(
                "{display} = {actual} (satisfies {} {})",
                condition.op, condition.value
            ),
        },
        Ok(false) => ConditionReport::fail(format!(
            "{display} = {actual} (fails {} {})",
            condition.op, condition.value
        )),
        Err(detail) => ConditionReport::fail(format!("{display} = {actual} ({detail})")),
    }
}

/// The natural-language form of a typed condition, as submitted to the judge
/// in ai_primary mode.
pub fn typed_condition_text(condition: &TypedCondition) -> String {
    format!("{} {} {}", condition.path, condition.op, condition.value)
}

fn compare(actual: &Value, op: ConditionOp, expected: &Value) -> Result<bool, String> {
    match op {
        ConditionOp::Eq => Ok(actual == expected),
        ConditionOp::Ne => Ok(actual != expected),
        ConditionOp::Lt | ConditionOp::Le | ConditionOp::Gt | ConditionOp::Ge => {
            let left = actual
                .as_number()
                .ok_or_else(|| format!("left side is a {}, number required", actual.type_name()))?;
            let right = expected.as_number().ok_or_else(|| {
                format!("right side is a {}, number required", expected.type_name())
            })?;
            let Some(ordering) = left.partial_cmp(&right) else {
                return Err("values are not comparable".to_string());
            };
            Ok(match op {
                ConditionOp::Lt => ordering == Ordering::Less,
                ConditionOp::Le => ordering != Ordering::Greater,
                ConditionOp::Gt => ordering == Ordering::Greater,
                ConditionOp::Ge => ordering != Ordering::Less,
                _ => unreachable!(),
            })
        }
        ConditionOp::In | ConditionOp::NotIn => {
            let list = expected.as_list().ok_or_else(|| {
                format!("right side is a {}, list required", expected.type_name())
            })?;
            let member = list.contains(actual);
            Ok(if op == ConditionOp::In { member } else { !member })
        }
        ConditionOp::Contains | ConditionOp::HasTag | ConditionOp::LacksTag => {
            let items = actual.as_list().ok_or_else(|| {
                format!("left side is a {}, collection required", actual.type_name())
            })?;
            let member = items.contains(expected);
            Ok(if op == ConditionOp::LacksTag {
                !member
            } else {
                member
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::CharacterState;

    fn condition(path: &str, op: ConditionOp, value: Value) -> TypedCondition {
        TypedCondition {
            scope: None,
            path: path.to_string(),
            op,
            value,
        }
    }

    fn state_with_tension(tension: f64) -> StoryState {
        let mut state = StoryState::default();
        state
            .world
            .vars
            .insert("tension".to_string(), Value::Number(tension));
        state
    }

    #[test]
    fn numeric_comparisons_report_the_left_hand_value() {
        let state = state_with_tension(45.0);
        let report = evaluate_typed(
            &condition("world.vars.tension", ConditionOp::Ge, Value::Number(70.0)),
            &state,
        );
        assert!(!report.satisfied);
        assert_eq!(report.reason, "world.vars.tension = 45 (fails >= 70)");

        let report = evaluate_typed(
            &condition("world.vars.tension", ConditionOp::Lt, Value::Number(70.0)),
            &state,
        );
        assert!(report.satisfied);
        assert_eq!(report.reason, "world.vars.tension = 45 (satisfies < 70)");
    }

    #[test]
    fn equality_never_coerces_across_types() {
        let mut state = StoryState::default();
        state
            .world
            .vars
            .insert("flag".to_string(), Value::Bool(true));
        let report = evaluate_typed(
            &condition("world.vars.flag", ConditionOp::Eq, Value::Number(1.0)),
            &state,
        );
        assert!(!report.satisfied);

        let report = evaluate_typed(
            &condition("world.vars.flag", ConditionOp::Eq, Value::Bool(true)),
            &state,
        );
        assert!(report.satisfied);
    }

    #[test]
    fn missing_paths_fail_without_erroring() {
        let state = StoryState::default();
        let report = evaluate_typed(
            &condition("world.vars.tension", ConditionOp::Ge, Value::Number(70.0)),
            &state,
        );
        assert!(!report.satisfied);
        assert_eq!(report.reason, "path world.vars.tension not present");
    }

    #[test]
    fn absence_tolerant_operators_treat_missing_as_empty() {
        let state = StoryState::default();
        let report = evaluate_typed(
            &condition(
                "world.vars.banned",
                ConditionOp::NotIn,
                Value::List(vec![Value::Text("alice".to_string())]),
            ),
            &state,
        );
        assert!(report.satisfied);

        let mut with_alice = StoryState::default();
        with_alice
            .characters
            .insert("alice".to_string(), CharacterState::default());
        let report = evaluate_typed(
            &condition(
                "characters.alice.traits",
                ConditionOp::LacksTag,
                Value::Text("coward".to_string()),
            ),
            &with_alice,
        );
        assert!(report.satisfied);
    }

    #[test]
    fn membership_operators_check_the_right_direction() {
        let mut state = StoryState::default();
        state.world.vars.insert(
            "factions".to_string(),
            Value::List(vec![
                Value::Text("guild".to_string()),
                Value::Text("court".to_string()),
            ]),
        );
        state.world.tags.insert("festival".to_string());

        let report = evaluate_typed(
            &condition(
                "world.vars.factions",
                ConditionOp::Contains,
                Value::Text("guild".to_string()),
            ),
            &state,
        );
        assert!(report.satisfied);

        let report = evaluate_typed(
            &condition(
                "world.tags",
                ConditionOp::HasTag,
                Value::Text("festival".to_string()),
            ),
            &state,
        );
        assert!(report.satisfied);

        let mut mood_state = StoryState::default();
        mood_state.characters.insert(
            "alice".to_string(),
            CharacterState {
                mood: "angry".to_string(),
                ..CharacterState::default()
            },
        );
        let report = evaluate_typed(
            &condition(
                "characters.alice.mood",
                ConditionOp::In,
                Value::List(vec![
                    Value::Text("angry".to_string()),
                    Value::Text("furious".to_string()),
                ]),
            ),
            &mood_state,
        );
        assert!(report.satisfied);
    }

    #[test]
    fn type_mismatches_fail_with_a_reason_instead_of_erroring() {
        let mut state = StoryState::default();
        state
            .world
            .vars
            .insert("name".to_string(), Value::Text("greywall".to_string()));
        let report = evaluate_typed(
            &condition("world.vars.name", ConditionOp::Ge, Value::Number(3.0)),
            &state,
        );
        assert!(!report.satisfied);
        assert!(report.reason.contains("number required"));
    }

    #[test]
    fn typed_conditions_serialize_to_readable_text() {
        let text = typed_condition_text(&condition(
            "world.vars.tension",
            ConditionOp::Ge,
            Value::Number(70.0),
        ));
        assert_eq!(text, "world.vars.tension >= 70");
    }
}
