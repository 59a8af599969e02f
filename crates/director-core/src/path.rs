//! Dotted state paths as tagged variants. Every downstream consumer matches
//! exhaustively, so a path that parses is a path that resolves or misses; it
//! never hits an unhandled shape at tick time.

use std::fmt;

use contracts::world::canonical_pair;
use contracts::{Effect, EffectScope};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatePath {
    World(WorldPath),
    Character { id: String, field: CharacterField },
    Relationship { pair: String, field: RelationField },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldPath {
    Var(String),
    Tags,
    Fact { category: String, key: String },
    Intensity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacterField {
    Mood,
    Status,
    Traits,
    Goals,
    Fears,
    Var(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationField {
    Status,
    Metric(String),
    Var(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParseError {
    pub path: String,
    pub reason: String,
}

impl fmt::Display for PathParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid path {}: {}", self.path, self.reason)
    }
}

impl std::error::Error for PathParseError {}

fn parse_error(path: &str, reason: impl Into<String>) -> PathParseError {
    PathParseError {
        path: path.to_string(),
        reason: reason.into(),
    }
}

impl StatePath {
    pub fn parse(raw: &str) -> Result<Self, PathParseError> {
        let segments = raw.split('.').collect::<Vec<_>>();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(parse_error(raw, "empty path segment"));
        }
        match segments[0] {
            "world" => parse_world(raw, &segments[1..]),
            "characters" => parse_character(raw, &segments[1..]),
            "relationships" => parse_relationship(raw, &segments[1..]),
            other => Err(parse_error(
                raw,
                format!("unknown root {other} (expected world, characters, or relationships)"),
            )),
        }
    }

    /// Resolve an effect's (scope, target, relative path) triple into a full
    /// state path. Relationship pairs are canonicalized here.
    pub fn for_effect(effect: &Effect) -> Result<Self, PathParseError> {
        match effect.scope {
            EffectScope::World => Self::parse(&format!("world.{}", effect.path)),
            EffectScope::Character => {
                if effect.target.is_empty() {
                    return Err(parse_error(&effect.path, "character effect without target"));
                }
                Self::parse(&format!("characters.{}.{}", effect.target, effect.path))
            }
            EffectScope::Relationship => {
                if effect.target.is_empty() {
                    return Err(parse_error(
                        &effect.path,
                        "relationship effect without target pair",
                    ));
                }
                Self::parse(&format!("relationships.{}.{}", effect.target, effect.path))
            }
        }
    }
}

fn parse_world(raw: &str, rest: &[&str]) -> Result<StatePath, PathParseError> {
    match rest {
        ["vars", key @ ..] if !key.is_empty() => {
            Ok(StatePath::World(WorldPath::Var(key.join("."))))
        }
        ["tags"] => Ok(StatePath::World(WorldPath::Tags)),
        ["facts", category, key @ ..] if !key.is_empty() => Ok(StatePath::World(WorldPath::Fact {
            category: (*category).to_string(),
            key: key.join("."),
        })),
        ["intensity"] => Ok(StatePath::World(WorldPath::Intensity)),
        _ => Err(parse_error(
            raw,
            "world paths are vars.<key>, tags, facts.<category>.<key>, or intensity",
        )),
    }
}

fn parse_character(raw: &str, rest: &[&str]) -> Result<StatePath, PathParseError> {
    let [id, field, key @ ..] = rest else {
        return Err(parse_error(raw, "expected characters.<id>.<field>"));
    };
    let field = match (*field, key) {
        ("mood", []) => CharacterField::Mood,
        ("status", []) => CharacterField::Status,
        ("traits", []) => CharacterField::Traits,
        ("goals", []) => CharacterField::Goals,
        ("fears", []) => CharacterField::Fears,
        ("vars", key) if !key.is_empty() => CharacterField::Var(key.join(".")),
        _ => {
            return Err(parse_error(
                raw,
                "character fields are mood, status, traits, goals, fears, or vars.<key>",
            ))
        }
    };
    Ok(StatePath::Character {
        id: (*id).to_string(),
        field,
    })
}

fn parse_relationship(raw: &str, rest: &[&str]) -> Result<StatePath, PathParseError> {
    let [pair, field, key @ ..] = rest else {
        return Err(parse_error(raw, "expected relationships.<a>|<b>.<field>"));
    };
    let Some((a, b)) = contracts::world::split_pair(pair) else {
        return Err(parse_error(raw, "relationship key must be <a>|<b>"));
    };
    let field = match (*field, key) {
        ("status", []) => RelationField::Status,
        ("vars", key) if !key.is_empty() => RelationField::Var(key.join(".")),
        ("vars", []) => {
            return Err(parse_error(raw, "relationship vars path needs a key"));
        }
        (metric, []) => RelationField::Metric(metric.to_string()),
        _ => {
            return Err(parse_error(
                raw,
                "relationship fields are status, vars.<key>, or a single metric name",
            ))
        }
    };
    Ok(StatePath::Relationship {
        pair: canonical_pair(a, b),
        field,
    })
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::World(WorldPath::Var(key)) => write!(f, "world.vars.{key}"),
            Self::World(WorldPath::Tags) => write!(f, "world.tags"),
            Self::World(WorldPath::Fact { category, key }) => {
                write!(f, "world.facts.{category}.{key}")
            }
            Self::World(WorldPath::Intensity) => write!(f, "world.intensity"),
            Self::Character { id, field } => match field {
                CharacterField::Mood => write!(f, "characters.{id}.mood"),
                CharacterField::Status => write!(f, "characters.{id}.status"),
                CharacterField::Traits => write!(f, "characters.{id}.traits"),
                CharacterField::Goals => write!(f, "characters.{id}.goals"),
                CharacterField::Fears => write!(f, "characters.{id}.fears"),
                CharacterField::Var(key) => write!(f, "characters.{id}.vars.{key}"),
            },
            Self::Relationship { pair, field } => match field {
                RelationField::Status => write!(f, "relationships.{pair}.status"),
                RelationField::Metric(metric) => write!(f, "relationships.{pair}.{metric}"),
                RelationField::Var(key) => write!(f, "relationships.{pair}.vars.{key}"),
            },
        }
    }
}
