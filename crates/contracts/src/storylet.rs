use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    In,
    NotIn,
    Contains,
    HasTag,
    LacksTag,
}

impl fmt::Display for ConditionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Contains => "contains",
            Self::HasTag => "has_tag",
            Self::LacksTag => "lacks_tag",
        };
        write!(f, "{token}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionScope {
    World,
    Characters,
    Relationships,
}

/// Operator-based precondition addressing the state through a dotted path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypedCondition {
    /// Optional redundant scope; when present it must agree with the path
    /// root (checked at load).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ConditionScope>,
    pub path: String,
    pub op: ConditionOp,
    pub value: Value,
}

/// Free-text precondition delegated to the NL judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NaturalCondition {
    pub nl_text: String,
}

/// Exactly one form per entry; mixed entries fail to deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Precondition {
    Natural(NaturalCondition),
    Typed(TypedCondition),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectScope {
    World,
    Character,
    Relationship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectOp {
    Set,
    Add,
    Multiply,
    Append,
    Remove,
}

impl fmt::Display for EffectOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Set => "set",
            Self::Add => "add",
            Self::Multiply => "multiply",
            Self::Append => "append",
            Self::Remove => "remove",
        };
        write!(f, "{token}")
    }
}

/// One ordered mutation. `target` names a character id or an `a|b` pair and
/// stays empty for world effects; `path` is scope-relative (`vars.tension`,
/// `mood`, `trust`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub scope: EffectScope,
    #[serde(default)]
    pub target: String,
    pub op: EffectOp,
    pub path: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// An authored narrative fragment that may fire at most once per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storylet {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub preconditions: Vec<Precondition>,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub once: bool,
    #[serde(default)]
    pub cooldown: u64,
    #[serde(default)]
    pub intensity_delta: f64,
    #[serde(default)]
    pub is_fallback: bool,
    #[serde(default)]
    pub requires_fired: Vec<String>,
    #[serde(default)]
    pub forbids_fired: Vec<String>,
}

fn default_weight() -> f64 {
    0.3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_forms_are_mutually_exclusive() {
        let typed: Precondition =
            serde_json::from_str(r#"{"path":"world.vars.tension","op":">=","value":70}"#)
                .expect("typed form");
        assert!(matches!(typed, Precondition::Typed(_)));

        let natural: Precondition =
            serde_json::from_str(r#"{"nl_text":"the tension is unbearable"}"#).expect("nl form");
        assert!(matches!(natural, Precondition::Natural(_)));

        let mixed = serde_json::from_str::<Precondition>(
            r#"{"path":"world.vars.tension","op":">=","value":70,"nl_text":"also this"}"#,
        );
        assert!(mixed.is_err());
    }

    #[test]
    fn operator_tokens_round_trip() {
        for op in [
            ConditionOp::Eq,
            ConditionOp::Ne,
            ConditionOp::Lt,
            ConditionOp::Le,
            ConditionOp::Gt,
            ConditionOp::Ge,
            ConditionOp::In,
            ConditionOp::NotIn,
            ConditionOp::Contains,
            ConditionOp::HasTag,
            ConditionOp::LacksTag,
        ] {
            let encoded = serde_json::to_string(&op).expect("serialize");
            assert_eq!(encoded.trim_matches('"'), op.to_string());
            let decoded: ConditionOp = serde_json::from_str(&encoded).expect("deserialize");
            assert_eq!(decoded, op);
        }
    }

    #[test]
    fn storylet_defaults_match_authoring_contract() {
        let storylet: Storylet =
            serde_json::from_str(r#"{"id":"st-001","title":"A quiet morning"}"#).expect("minimal");
        assert_eq!(storylet.weight, 0.3);
        assert_eq!(storylet.cooldown, 0);
        assert!(!storylet.once);
        assert!(!storylet.is_fallback);
        assert!(storylet.requires_fired.is_empty());
    }
}
