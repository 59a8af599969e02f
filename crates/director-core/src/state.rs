use std::collections::BTreeMap;

use contracts::world::{canonical_pair, split_pair};
use contracts::{canon, CharacterState, Project, RelationshipState, StateDiffEntry, Value, WorldState};
use serde::{Deserialize, Serialize};

use crate::path::{CharacterField, RelationField, StatePath, WorldPath};
use crate::rng::content_hash64;

/// The full mutable snapshot a story thread owns: world, characters, and
/// relationships. Cloned once per tick for diffing; never mutated in place by
/// the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StoryState {
    pub world: WorldState,
    pub characters: BTreeMap<String, CharacterState>,
    pub relationships: BTreeMap<String, RelationshipState>,
}

impl StoryState {
    pub fn from_project(project: &Project) -> Self {
        let mut relationships = BTreeMap::new();
        for (key, relationship) in &project.relationships {
            let canonical = match split_pair(key) {
                Some((a, b)) => canonical_pair(a, b),
                None => key.clone(),
            };
            relationships.insert(canonical, relationship.clone());
        }
        Self {
            world: project.world.clone(),
            characters: project.characters.clone(),
            relationships,
        }
    }

    /// Resolve a path to its current value. `None` means some segment is
    /// absent; condition evaluation and effect application interpret that
    /// according to their own rules.
    pub fn lookup(&self, path: &StatePath) -> Option<Value> {
        match path {
            StatePath::World(WorldPath::Var(key)) => self.world.vars.get(key).cloned(),
            StatePath::World(WorldPath::Tags) => Some(string_set_value(
                self.world.tags.iter().map(String::as_str),
            )),
            StatePath::World(WorldPath::Fact { category, key }) => self
                .world
                .facts
                .get(category)
                .and_then(|facts| facts.get(key))
                .map(|fact| Value::Text(fact.clone())),
            StatePath::World(WorldPath::Intensity) => Some(Value::Number(self.world.intensity)),
            StatePath::Character { id, field } => {
                let character = self.characters.get(id)?;
                match field {
                    CharacterField::Mood => Some(Value::Text(character.mood.clone())),
                    CharacterField::Status => Some(Value::Text(character.status.clone())),
                    CharacterField::Traits => Some(string_set_value(
                        character.traits.iter().map(String::as_str),
                    )),
                    CharacterField::Goals => Some(string_set_value(
                        character.goals.iter().map(String::as_str),
                    )),
                    CharacterField::Fears => Some(string_set_value(
                        character.fears.iter().map(String::as_str),
                    )),
                    CharacterField::Var(key) => character.vars.get(key).cloned(),
                }
            }
            StatePath::Relationship { pair, field } => {
                let relationship = self.relationships.get(pair)?;
                match field {
                    RelationField::Status => Some(Value::Text(relationship.status.clone())),
                    RelationField::Metric(metric) => relationship
                        .metrics
                        .get(metric)
                        .map(|value| Value::Number(*value)),
                    RelationField::Var(key) => relationship.vars.get(key).cloned(),
                }
            }
        }
    }

    /// Canonical-JSON hash of the whole snapshot, rendered as 16 hex digits.
    pub fn canonical_hash(&self) -> String {
        let value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        let canonical = canon::to_canonical_string(&value);
        format!("{:016x}", content_hash64(&[&canonical]))
    }

    /// All addressable leaf paths with their current values, in sorted path
    /// order.
    fn leaves(&self) -> BTreeMap<String, Value> {
        let mut leaves = BTreeMap::new();
        for (key, value) in &self.world.vars {
            leaves.insert(format!("world.vars.{key}"), value.clone());
        }
        leaves.insert(
            "world.tags".to_string(),
            string_set_value(self.world.tags.iter().map(String::as_str)),
        );
        for (category, facts) in &self.world.facts {
            for (key, fact) in facts {
                leaves.insert(
                    format!("world.facts.{category}.{key}"),
                    Value::Text(fact.clone()),
                );
            }
        }
        leaves.insert(
            "world.intensity".to_string(),
            Value::Number(self.world.intensity),
        );
        for (id, character) in &self.characters {
            leaves.insert(
                format!("characters.{id}.mood"),
                Value::Text(character.mood.clone()),
            );
            leaves.insert(
                format!("characters.{id}.status"),
                Value::Text(character.status.clone()),
            );
            leaves.insert(
                format!("characters.{id}.traits"),
                string_set_value(character.traits.iter().map(String::as_str)),
            );
            leaves.insert(
                format!("characters.{id}.goals"),
                string_set_value(character.goals.iter().map(String::as_str)),
            );
            leaves.insert(
                format!("characters.{id}.fears"),
                string_set_value(character.fears.iter().map(String::as_str)),
            );
            for (key, value) in &character.vars {
                leaves.insert(format!("characters.{id}.vars.{key}"), value.clone());
            }
        }
        for (pair, relationship) in &self.relationships {
            leaves.insert(
                format!("relationships.{pair}.status"),
                Value::Text(relationship.status.clone()),
            );
            for (metric, value) in &relationship.metrics {
                leaves.insert(
                    format!("relationships.{pair}.{metric}"),
                    Value::Number(*value),
                );
            }
            for (key, value) in &relationship.vars {
                leaves.insert(format!("relationships.{pair}.vars.{key}"), value.clone());
            }
        }
        leaves
    }

    /// Path-level diff between two snapshots, sorted by path.
    pub fn diff(before: &Self, after: &Self) -> Vec<StateDiffEntry> {
        let before_leaves = before.leaves();
        let after_leaves = after.leaves();
        let mut paths = before_leaves.keys().collect::<Vec<_>>();
        for path in after_leaves.keys() {
            if !before_leaves.contains_key(path) {
                paths.push(path);
            }
        }
        paths.sort();
        paths
            .into_iter()
            .filter_map(|path| {
                let old = before_leaves.get(path);
                let new = after_leaves.get(path);
                if old == new {
                    return None;
                }
                Some(StateDiffEntry {
                    path: path.clone(),
                    before: old.cloned(),
                    after: new.cloned(),
                })
            })
            .collect()
    }
}

fn string_set_value<'a>(items: impl Iterator<Item = &'a str>) -> Value {
    Value::List(items.map(|item| Value::Text(item.to_string())).collect())
}
