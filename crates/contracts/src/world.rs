use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::storylet::Storylet;
use crate::value::Value;

/// World snapshot: a value object cloned once per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    #[serde(default)]
    pub vars: BTreeMap<String, Value>,
    #[serde(default)]
    pub facts: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default = "default_intensity")]
    pub intensity: f64,
}

impl Default for WorldState {
    fn default() -> Self {
        Self {
            vars: BTreeMap::new(),
            facts: BTreeMap::new(),
            tags: BTreeSet::new(),
            intensity: default_intensity(),
        }
    }
}

fn default_intensity() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CharacterState {
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub traits: BTreeSet<String>,
    #[serde(default)]
    pub goals: BTreeSet<String>,
    #[serde(default)]
    pub fears: BTreeSet<String>,
    #[serde(default)]
    pub vars: BTreeMap<String, Value>,
}

/// Relationship state for an unordered character pair. `trust`, `affection`
/// and any other numeric gauges live in `metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RelationshipState {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub vars: BTreeMap<String, Value>,
}

/// Storage key for an unordered pair: lexicographically smaller id first.
pub fn canonical_pair(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}|{b}")
    } else {
        format!("{b}|{a}")
    }
}

pub fn split_pair(key: &str) -> Option<(&str, &str)> {
    let (a, b) = key.split_once('|')?;
    if a.is_empty() || b.is_empty() || b.contains('|') {
        return None;
    }
    Some((a, b))
}

/// Authored project snapshot consumed by the director. Immutable during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub schema_version: String,
    pub project_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub world: WorldState,
    #[serde(default)]
    pub characters: BTreeMap<String, CharacterState>,
    #[serde(default)]
    pub relationships: BTreeMap<String, RelationshipState>,
    #[serde(default)]
    pub storylets: Vec<Storylet>,
}

impl Project {
    pub fn storylet(&self, storylet_id: &str) -> Option<&Storylet> {
        self.storylets
            .iter()
            .find(|storylet| storylet.id == storylet_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pair_sorts_ids() {
        assert_eq!(canonical_pair("bob", "alice"), "alice|bob");
        assert_eq!(canonical_pair("alice", "bob"), "alice|bob");
    }

    #[test]
    fn split_pair_rejects_malformed_keys() {
        assert_eq!(split_pair("alice|bob"), Some(("alice", "bob")));
        assert_eq!(split_pair("alice"), None);
        assert_eq!(split_pair("alice|"), None);
        assert_eq!(split_pair("a|b|c"), None);
    }

    #[test]
    fn world_state_defaults_to_neutral_intensity() {
        let world: WorldState = serde_json::from_str("{}").expect("empty world");
        assert_eq!(world.intensity, 0.5);
        assert!(world.vars.is_empty());
    }
}
