//! Effect application against a cloned state. Effects are ordered mutations;
//! the first failure aborts the whole tick, so callers only ever observe a
//! state where every prior effect landed.

use contracts::{Effect, EffectOp, StateDiffEntry, Value};

use crate::error::EffectError;
use crate::path::{CharacterField, RelationField, StatePath, WorldPath};
use crate::state::StoryState;

/// Apply one effect, returning the before/after observation at its path.
pub fn apply_effect(effect: &Effect, state: &mut StoryState) -> Result<StateDiffEntry, EffectError> {
    let path = StatePath::for_effect(effect)
        .map_err(|err| EffectError::PathNotFound(err.to_string()))?;
    let display = path.to_string();
    let before = state.lookup(&path);

    match effect.op {
        EffectOp::Set => apply_set(state, &path, &display, &effect.value)?,
        EffectOp::Add | EffectOp::Multiply => {
            apply_arithmetic(state, &path, &display, effect.op, &effect.value)?
        }
        EffectOp::Append => apply_append(state, &path, &display, &effect.value)?,
        EffectOp::Remove => apply_remove(state, &path, &display, &effect.value)?,
    }

    Ok(StateDiffEntry {
        path: display,
        before,
        after: state.lookup(&path),
    })
}

fn mismatch(path: &str, detail: impl Into<String>) -> EffectError {
    EffectError::TypeMismatch {
        path: path.to_string(),
        detail: detail.into(),
    }
}

fn require_text(path: &str, value: &Value) -> Result<String, EffectError> {
    value
        .as_text()
        .map(str::to_string)
        .ok_or_else(|| mismatch(path, format!("expected a string, got a {}", value.type_name())))
}

fn require_number(path: &str, value: &Value) -> Result<f64, EffectError> {
    value
        .as_number()
        .ok_or_else(|| mismatch(path, format!("expected a number, got a {}", value.type_name())))
}

fn require_string_list(path: &str, value: &Value) -> Result<Vec<String>, EffectError> {
    let items = value
        .as_list()
        .ok_or_else(|| mismatch(path, format!("expected a list, got a {}", value.type_name())))?;
    items
        .iter()
        .map(|item| require_text(path, item))
        .collect::<Result<Vec<_>, _>>()
}

fn apply_set(
    state: &mut StoryState,
    path: &StatePath,
    display: &str,
    value: &Value,
) -> Result<(), EffectError> {
    match path {
        StatePath::World(WorldPath::Var(key)) => {
            state.world.vars.insert(key.clone(), value.clone());
        }
        StatePath::World(WorldPath::Tags) => {
            state.world.tags = require_string_list(display, value)?.into_iter().collect();
        }
        StatePath::World(WorldPath::Fact { category, key }) => {
            let fact = require_text(display, value)?;
            state
                .world
                .facts
                .entry(category.clone())
                .or_default()
                .insert(key.clone(), fact);
        }
        StatePath::World(WorldPath::Intensity) => {
            state.world.intensity = require_number(display, value)?.clamp(0.0, 1.0);
        }
        StatePath::Character { id, field } => {
            let character = state
                .characters
                .get_mut(id)
                .ok_or_else(|| EffectError::PathNotFound(format!("characters.{id}")))?;
            match field {
                CharacterField::Mood => character.mood = require_text(display, value)?,
                CharacterField::Status => character.status = require_text(display, value)?,
                CharacterField::Traits => {
                    character.traits = require_string_list(display, value)?.into_iter().collect();
                }
                CharacterField::Goals => {
                    character.goals = require_string_list(display, value)?.into_iter().collect();
                }
                CharacterField::Fears => {
                    character.fears = require_string_list(display, value)?.into_iter().collect();
                }
                CharacterField::Var(key) => {
                    character.vars.insert(key.clone(), value.clone());
                }
            }
        }
        StatePath::Relationship { pair, field } => {
            // Relationship entries spring into being on first write.
            let relationship = state.relationships.entry(pair.clone()).or_default();
            match field {
                RelationField::Status => relationship.status = require_text(display, value)?,
                RelationField::Metric(metric) => {
                    relationship
                        .metrics
                        .insert(metric.clone(), require_number(display, value)?);
                }
                RelationField::Var(key) => {
                    relationship.vars.insert(key.clone(), value.clone());
                }
            }
        }
    }
    Ok(())
}

fn arithmetic(op: EffectOp, current: f64, operand: f64) -> f64 {
    match op {
        EffectOp::Add => current + operand,
        EffectOp::Multiply => current * operand,
        _ => current,
    }
}

fn numeric_var_update(
    vars: &mut std::collections::BTreeMap<String, Value>,
    key: &str,
    display: &str,
    op: EffectOp,
    operand: f64,
) -> Result<(), EffectError> {
    // Absent vars start from zero and are created by the update.
    let current = match vars.get(key) {
        None => 0.0,
        Some(Value::Number(value)) => *value,
        Some(other) => {
            return Err(mismatch(
                display,
                format!("cannot {op} a {}", other.type_name()),
            ))
        }
    };
    vars.insert(key.to_string(), Value::Number(arithmetic(op, current, operand)));
    Ok(())
}

fn apply_arithmetic(
    state: &mut StoryState,
    path: &StatePath,
    display: &str,
    op: EffectOp,
    value: &Value,
) -> Result<(), EffectError> {
    let operand = require_number(display, value)?;
    match path {
        StatePath::World(WorldPath::Var(key)) => {
            numeric_var_update(&mut state.world.vars, key, display, op, operand)?;
        }
        StatePath::World(WorldPath::Intensity) => {
            state.world.intensity =
                arithmetic(op, state.world.intensity, operand).clamp(0.0, 1.0);
        }
        StatePath::Character { id, field } => {
            let character = state
                .characters
                .get_mut(id)
                .ok_or_else(|| EffectError::PathNotFound(format!("characters.{id}")))?;
            match field {
                CharacterField::Var(key) => {
                    numeric_var_update(&mut character.vars, key, display, op, operand)?;
                }
                _ => return Err(mismatch(display, format!("cannot {op} a non-numeric field"))),
            }
        }
        StatePath::Relationship { pair, field } => {
            let relationship = state.relationships.entry(pair.clone()).or_default();
            match field {
                RelationField::Metric(metric) => {
                    let current = relationship.metrics.get(metric).copied().unwrap_or(0.0);
                    relationship
                        .metrics
                        .insert(metric.clone(), arithmetic(op, current, operand));
                }
                RelationField::Var(key) => {
                    numeric_var_update(&mut relationship.vars, key, display, op, operand)?;
                }
                RelationField::Status => {
                    return Err(mismatch(display, format!("cannot {op} a string status")))
                }
            }
        }
        StatePath::World(WorldPath::Tags) | StatePath::World(WorldPath::Fact { .. }) => {
            return Err(mismatch(display, format!("cannot {op} a non-numeric target")))
        }
    }
    Ok(())
}

fn apply_append(
    state: &mut StoryState,
    path: &StatePath,
    display: &str,
    value: &Value,
) -> Result<(), EffectError> {
    match path {
        StatePath::World(WorldPath::Var(key)) => {
            append_var(&mut state.world.vars, key, display, value)?;
        }
        StatePath::World(WorldPath::Tags) => {
            state.world.tags.insert(require_text(display, value)?);
        }
        StatePath::Character { id, field } => {
            let character = state
                .characters
                .get_mut(id)
                .ok_or_else(|| EffectError::PathNotFound(format!("characters.{id}")))?;
            match field {
                CharacterField::Traits => {
                    character.traits.insert(require_text(display, value)?);
                }
                CharacterField::Goals => {
                    character.goals.insert(require_text(display, value)?);
                }
                CharacterField::Fears => {
                    character.fears.insert(require_text(display, value)?);
                }
                CharacterField::Var(key) => {
                    append_var(&mut character.vars, key, display, value)?;
                }
                CharacterField::Mood | CharacterField::Status => {
                    return Err(mismatch(display, "cannot append to a string field"))
                }
            }
        }
        StatePath::Relationship { pair, field } => {
            let relationship = state.relationships.entry(pair.clone()).or_default();
            match field {
                RelationField::Var(key) => {
                    append_var(&mut relationship.vars, key, display, value)?;
                }
                RelationField::Metric(_) | RelationField::Status => {
                    return Err(mismatch(display, "cannot append to a non-list field"))
                }
            }
        }
        StatePath::World(WorldPath::Fact { .. }) | StatePath::World(WorldPath::Intensity) => {
            return Err(mismatch(display, "cannot append to a non-list target"))
        }
    }
    Ok(())
}

fn append_var(
    vars: &mut std::collections::BTreeMap<String, Value>,
    key: &str,
    display: &str,
    value: &Value,
) -> Result<(), EffectError> {
    // Append on a missing path creates the list first. No dedup.
    let entry = vars
        .entry(key.to_string())
        .or_insert_with(|| Value::List(Vec::new()));
    match entry {
        Value::List(items) => {
            items.push(value.clone());
            Ok(())
        }
        other => Err(mismatch(
            display,
            format!("cannot append to a {}", other.type_name()),
        )),
    }
}

fn apply_remove(
    state: &mut StoryState,
    path: &StatePath,
    display: &str,
    value: &Value,
) -> Result<(), EffectError> {
    match path {
        StatePath::World(WorldPath::Var(key)) => {
            remove_from_var(&mut state.world.vars, key, display, value)?;
        }
        StatePath::World(WorldPath::Tags) => {
            state.world.tags.remove(&require_text(display, value)?);
        }
        StatePath::Character { id, field } => {
            let character = state
                .characters
                .get_mut(id)
                .ok_or_else(|| EffectError::PathNotFound(format!("characters.{id}")))?;
            match field {
                CharacterField::Traits => {
                    character.traits.remove(&require_text(display, value)?);
                }
                CharacterField::Goals => {
                    character.goals.remove(&require_text(display, value)?);
                }
                CharacterField::Fears => {
                    character.fears.remove(&require_text(display, value)?);
                }
                CharacterField::Var(key) => {
                    remove_from_var(&mut character.vars, key, display, value)?;
                }
                CharacterField::Mood | CharacterField::Status => {
                    return Err(mismatch(display, "cannot remove from a string field"))
                }
            }
        }
        StatePath::Relationship { pair, field } => {
            let Some(relationship) = state.relationships.get_mut(pair) else {
                return Ok(());
            };
            match field {
                RelationField::Var(key) => {
                    remove_from_var(&mut relationship.vars, key, display, value)?;
                }
                RelationField::Metric(_) | RelationField::Status => {
                    return Err(mismatch(display, "cannot remove from a non-list field"))
                }
            }
        }
        StatePath::World(WorldPath::Fact { .. }) | StatePath::World(WorldPath::Intensity) => {
            return Err(mismatch(display, "cannot remove from a non-list target"))
        }
    }
    Ok(())
}

fn remove_from_var(
    vars: &mut std::collections::BTreeMap<String, Value>,
    key: &str,
    display: &str,
    value: &Value,
) -> Result<(), EffectError> {
    match vars.get_mut(key) {
        None => Ok(()),
        Some(Value::List(items)) => {
            // First equal value only; absent values are a no-op.
            if let Some(position) = items.iter().position(|item| item == value) {
                items.remove(position);
            }
            Ok(())
        }
        Some(other) => Err(mismatch(
            display,
            format!("cannot remove from a {}", other.type_name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CharacterState, EffectScope};

    fn world_effect(op: EffectOp, path: &str, value: Value) -> Effect {
        Effect {
            scope: EffectScope::World,
            target: String::new(),
            op,
            path: path.to_string(),
            value,
            reason: None,
        }
    }

    fn character_effect(target: &str, op: EffectOp, path: &str, value: Value) -> Effect {
        Effect {
            scope: EffectScope::Character,
            target: target.to_string(),
            op,
            path: path.to_string(),
            value,
            reason: None,
        }
    }

    fn relationship_effect(target: &str, op: EffectOp, path: &str, value: Value) -> Effect {
        Effect {
            scope: EffectScope::Relationship,
            target: target.to_string(),
            op,
            path: path.to_string(),
            value,
            reason: None,
        }
    }

    #[test]
    fn set_creates_and_overwrites_world_vars() {
        let mut state = StoryState::default();
        let diff = apply_effect(
            &world_effect(EffectOp::Set, "vars.tension", Value::Number(70.0)),
            &mut state,
        )
        .expect("set");
        assert_eq!(diff.before, None);
        assert_eq!(diff.after, Some(Value::Number(70.0)));

        let diff = apply_effect(
            &world_effect(EffectOp::Set, "vars.tension", Value::Number(40.0)),
            &mut state,
        )
        .expect("overwrite");
        assert_eq!(diff.before, Some(Value::Number(70.0)));
        assert_eq!(diff.after, Some(Value::Number(40.0)));
    }

    #[test]
    fn add_starts_absent_vars_from_zero() {
        let mut state = StoryState::default();
        apply_effect(
            &world_effect(EffectOp::Add, "vars.unrest", Value::Number(3.0)),
            &mut state,
        )
        .expect("add");
        assert_eq!(
            state.world.vars.get("unrest"),
            Some(&Value::Number(3.0))
        );
        apply_effect(
            &world_effect(EffectOp::Multiply, "vars.unrest", Value::Number(2.0)),
            &mut state,
        )
        .expect("multiply");
        assert_eq!(
            state.world.vars.get("unrest"),
            Some(&Value::Number(6.0))
        );
    }

    #[test]
    fn arithmetic_on_a_string_var_is_a_type_mismatch() {
        let mut state = StoryState::default();
        state
            .world
            .vars
            .insert("name".to_string(), Value::Text("greywall".to_string()));
        let err = apply_effect(
            &world_effect(EffectOp::Add, "vars.name", Value::Number(1.0)),
            &mut state,
        )
        .expect_err("mismatch");
        assert!(matches!(err, EffectError::TypeMismatch { .. }));
    }

    #[test]
    fn append_creates_the_list_then_pushes_without_dedup() {
        let mut state = StoryState::default();
        for _ in 0..2 {
            apply_effect(
                &world_effect(
                    EffectOp::Append,
                    "vars.rumors",
                    Value::Text("heir missing".to_string()),
                ),
                &mut state,
            )
            .expect("append");
        }
        assert_eq!(
            state.world.vars.get("rumors"),
            Some(&Value::List(vec![
                Value::Text("heir missing".to_string()),
                Value::Text("heir missing".to_string()),
            ]))
        );
    }

    #[test]
    fn remove_takes_the_first_equal_value_and_tolerates_absence() {
        let mut state = StoryState::default();
        state.world.vars.insert(
            "queue".to_string(),
            Value::List(vec![
                Value::Text("a".to_string()),
                Value::Text("b".to_string()),
                Value::Text("a".to_string()),
            ]),
        );
        apply_effect(
            &world_effect(EffectOp::Remove, "vars.queue", Value::Text("a".to_string())),
            &mut state,
        )
        .expect("remove");
        assert_eq!(
            state.world.vars.get("queue"),
            Some(&Value::List(vec![
                Value::Text("b".to_string()),
                Value::Text("a".to_string()),
            ]))
        );
        // Absent value and absent path are both no-ops.
        apply_effect(
            &world_effect(EffectOp::Remove, "vars.queue", Value::Text("z".to_string())),
            &mut state,
        )
        .expect("no-op remove");
        apply_effect(
            &world_effect(EffectOp::Remove, "vars.ghost", Value::Text("z".to_string())),
            &mut state,
        )
        .expect("no-op on missing path");
    }

    #[test]
    fn unknown_character_is_path_not_found() {
        let mut state = StoryState::default();
        let err = apply_effect(
            &character_effect("bob", EffectOp::Set, "mood", Value::Text("angry".to_string())),
            &mut state,
        )
        .expect_err("missing character");
        assert!(matches!(err, EffectError::PathNotFound(_)));
    }

    #[test]
    fn character_sets_and_tag_edits_apply() {
        let mut state = StoryState::default();
        state
            .characters
            .insert("alice".to_string(), CharacterState::default());
        apply_effect(
            &character_effect("alice", EffectOp::Set, "mood", Value::Text("angry".to_string())),
            &mut state,
        )
        .expect("set mood");
        apply_effect(
            &character_effect(
                "alice",
                EffectOp::Append,
                "traits",
                Value::Text("vengeful".to_string()),
            ),
            &mut state,
        )
        .expect("append trait");
        let alice = state.characters.get("alice").expect("alice");
        assert_eq!(alice.mood, "angry");
        assert!(alice.traits.contains("vengeful"));
    }

    #[test]
    fn relationship_entries_spring_into_being_on_write() {
        let mut state = StoryState::default();
        apply_effect(
            &relationship_effect("bob|alice", EffectOp::Add, "trust", Value::Number(10.0)),
            &mut state,
        )
        .expect("add trust");
        let relationship = state.relationships.get("alice|bob").expect("created");
        assert_eq!(relationship.metrics.get("trust"), Some(&10.0));
    }

    #[test]
    fn intensity_writes_clamp_into_unit_range() {
        let mut state = StoryState::default();
        apply_effect(
            &world_effect(EffectOp::Add, "intensity", Value::Number(9.0)),
            &mut state,
        )
        .expect("add intensity");
        assert_eq!(state.world.intensity, 1.0);
    }

    #[test]
    fn per_effect_diff_agrees_with_the_state_diff() {
        let mut state = StoryState::default();
        state
            .world
            .vars
            .insert("tension".to_string(), Value::Number(40.0));
        let before = state.clone();
        let entry = apply_effect(
            &world_effect(EffectOp::Add, "vars.tension", Value::Number(5.0)),
            &mut state,
        )
        .expect("apply");
        assert_eq!(StoryState::diff(&before, &state), vec![entry]);
    }

    #[test]
    fn facts_are_strings_only() {
        let mut state = StoryState::default();
        apply_effect(
            &world_effect(
                EffectOp::Set,
                "facts.court.heir",
                Value::Text("disputed".to_string()),
            ),
            &mut state,
        )
        .expect("set fact");
        let err = apply_effect(
            &world_effect(EffectOp::Set, "facts.court.heir", Value::Number(4.0)),
            &mut state,
        )
        .expect_err("non-string fact");
        assert!(matches!(err, EffectError::TypeMismatch { .. }));
    }
}
