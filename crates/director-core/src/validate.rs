//! Load-time validation. Everything here surfaces before the first tick;
//! tick time only ever sees well-formed projects and configs.

use std::collections::BTreeSet;
use std::fmt;

use contracts::world::{canonical_pair, split_pair};
use contracts::{ConditionScope, DirectorConfig, Precondition, Project, Storylet};

use crate::path::StatePath;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub issues: Vec<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed: {}", self.issues.join("; "))
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    let mut issues = Vec::new();

    let mut seen = BTreeSet::new();
    for storylet in &project.storylets {
        if storylet.id.trim().is_empty() {
            issues.push("storylet with an empty id".to_string());
        }
        if !seen.insert(storylet.id.as_str()) {
            issues.push(format!("duplicate storylet id {}", storylet.id));
        }
    }
    let known = seen;

    for storylet in &project.storylets {
        validate_storylet(storylet, &known, &mut issues);
    }

    for key in project.relationships.keys() {
        match split_pair(key) {
            None => issues.push(format!("relationship key {key} is not of the form a|b")),
            Some((a, b)) => {
                if canonical_pair(a, b) != *key {
                    issues.push(format!(
                        "relationship key {key} is not canonical (expected {})",
                        canonical_pair(a, b)
                    ));
                }
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { issues })
    }
}

fn validate_storylet(storylet: &Storylet, known: &BTreeSet<&str>, issues: &mut Vec<String>) {
    let id = &storylet.id;
    if !(storylet.weight.is_finite() && storylet.weight >= 0.0) {
        issues.push(format!(
            "storylet {id}: weight must be a finite non-negative number"
        ));
    }
    if !(storylet.intensity_delta.is_finite()
        && (-1.0..=1.0).contains(&storylet.intensity_delta))
    {
        issues.push(format!(
            "storylet {id}: intensity_delta must lie in [-1, 1]"
        ));
    }
    for required in &storylet.requires_fired {
        if !known.contains(required.as_str()) {
            issues.push(format!(
                "storylet {id}: requires_fired references unknown storylet {required}"
            ));
        }
    }
    for forbidden in &storylet.forbids_fired {
        if !known.contains(forbidden.as_str()) {
            issues.push(format!(
                "storylet {id}: forbids_fired references unknown storylet {forbidden}"
            ));
        }
    }

    for (index, precondition) in storylet.preconditions.iter().enumerate() {
        match precondition {
            Precondition::Typed(typed) => match StatePath::parse(&typed.path) {
                Ok(path) => {
                    if let Some(scope) = typed.scope {
                        if !scope_matches(scope, &path) {
                            issues.push(format!(
                                "storylet {id}: precondition {index} scope does not match path {}",
                                typed.path
                            ));
                        }
                    }
                }
                Err(err) => {
                    issues.push(format!("storylet {id}: precondition {index}: {err}"));
                }
            },
            Precondition::Natural(natural) => {
                if natural.nl_text.trim().is_empty() {
                    issues.push(format!(
                        "storylet {id}: precondition {index} has empty nl_text"
                    ));
                }
            }
        }
    }

    for (index, effect) in storylet.effects.iter().enumerate() {
        if let Err(err) = StatePath::for_effect(effect) {
            issues.push(format!("storylet {id}: effect {index}: {err}"));
        }
    }
}

fn scope_matches(scope: ConditionScope, path: &StatePath) -> bool {
    matches!(
        (scope, path),
        (ConditionScope::World, StatePath::World(_))
            | (ConditionScope::Characters, StatePath::Character { .. })
            | (ConditionScope::Relationships, StatePath::Relationship { .. })
    )
}

pub fn validate_config(config: &DirectorConfig) -> Result<(), ValidationError> {
    let mut issues = Vec::new();
    let unit_ranged = [
        ("diversity_penalty", config.diversity_penalty),
        ("pacing_scale", config.pacing_scale),
        ("intensity_decay", config.intensity_decay),
    ];
    for (field, value) in unit_ranged {
        if !(value.is_finite() && (0.0..=1.0).contains(&value)) {
            issues.push(format!("{field} must lie in [0, 1]"));
        }
    }
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { issues })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        ConditionOp, Effect, EffectOp, EffectScope, TypedCondition, Value, SCHEMA_VERSION_V1,
    };

    fn project_with(storylets: Vec<Storylet>) -> Project {
        Project {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            project_id: "proj-test".to_string(),
            title: String::new(),
            world: Default::default(),
            characters: Default::default(),
            relationships: Default::default(),
            storylets,
        }
    }

    fn storylet(id: &str) -> Storylet {
        Storylet {
            id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            tags: Vec::new(),
            preconditions: Vec::new(),
            effects: Vec::new(),
            weight: 1.0,
            once: false,
            cooldown: 0,
            intensity_delta: 0.0,
            is_fallback: false,
            requires_fired: Vec::new(),
            forbids_fired: Vec::new(),
        }
    }

    #[test]
    fn valid_projects_pass() {
        let mut gated = storylet("gated");
        gated.preconditions = vec![Precondition::Typed(TypedCondition {
            scope: Some(ConditionScope::World),
            path: "world.vars.tension".to_string(),
            op: ConditionOp::Ge,
            value: Value::Number(70.0),
        })];
        gated.effects = vec![Effect {
            scope: EffectScope::World,
            target: String::new(),
            op: EffectOp::Add,
            path: "vars.tension".to_string(),
            value: Value::Number(5.0),
            reason: None,
        }];
        assert!(validate_project(&project_with(vec![gated])).is_ok());
    }

    #[test]
    fn duplicate_ids_and_bad_references_are_reported_together() {
        let mut second = storylet("twin");
        second.requires_fired = vec!["phantom".to_string()];
        let err = validate_project(&project_with(vec![storylet("twin"), second]))
            .expect_err("invalid");
        assert!(err
            .issues
            .iter()
            .any(|issue| issue.contains("duplicate storylet id twin")));
        assert!(err
            .issues
            .iter()
            .any(|issue| issue.contains("unknown storylet phantom")));
    }

    #[test]
    fn out_of_range_numbers_fail() {
        let mut heavy = storylet("heavy");
        heavy.weight = -1.0;
        heavy.intensity_delta = 2.0;
        let err = validate_project(&project_with(vec![heavy])).expect_err("invalid");
        assert_eq!(err.issues.len(), 2);
    }

    #[test]
    fn mismatched_scope_is_an_issue() {
        let mut confused = storylet("confused");
        confused.preconditions = vec![Precondition::Typed(TypedCondition {
            scope: Some(ConditionScope::Characters),
            path: "world.vars.tension".to_string(),
            op: ConditionOp::Ge,
            value: Value::Number(1.0),
        })];
        let err = validate_project(&project_with(vec![confused])).expect_err("invalid");
        assert!(err.issues[0].contains("scope does not match path"));
    }

    #[test]
    fn non_canonical_relationship_keys_fail_at_load() {
        let mut project = project_with(vec![storylet("lone")]);
        project.relationships.insert(
            "bob|alice".to_string(),
            contracts::RelationshipState::default(),
        );
        let err = validate_project(&project).expect_err("invalid");
        assert!(err.issues[0].contains("is not canonical (expected alice|bob)"));

        let mut canonical = project_with(vec![storylet("lone")]);
        canonical.relationships.insert(
            "alice|bob".to_string(),
            contracts::RelationshipState::default(),
        );
        assert!(validate_project(&canonical).is_ok());
    }

    #[test]
    fn malformed_effect_paths_fail_at_load() {
        let mut broken = storylet("broken");
        broken.effects = vec![Effect {
            scope: EffectScope::Character,
            target: String::new(),
            op: EffectOp::Set,
            path: "mood".to_string(),
            value: Value::Text("angry".to_string()),
            reason: None,
        }];
        let err = validate_project(&project_with(vec![broken])).expect_err("invalid");
        assert!(err.issues[0].contains("effect 0"));
    }

    #[test]
    fn config_ranges_are_enforced() {
        let config = DirectorConfig {
            diversity_penalty: 1.5,
            ..DirectorConfig::default()
        };
        let err = validate_config(&config).expect_err("invalid");
        assert!(err.issues[0].contains("diversity_penalty"));
        assert!(validate_config(&DirectorConfig::default()).is_ok());
    }
}
