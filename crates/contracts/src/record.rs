use serde::{Deserialize, Serialize};

use crate::storylet::Effect;
use crate::value::Value;

/// One before/after observation at a dotted path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDiffEntry {
    pub path: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

/// Verdict returned by the NL judge for one (condition, state summary) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    pub satisfied: bool,
    pub confidence: f64,
    pub reason: String,
}

/// Audit entry for one judge consultation during a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NlEvaluation {
    pub condition_text: String,
    pub satisfied: bool,
    pub confidence: f64,
    pub reason: String,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedStorylet {
    pub storylet_id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub is_fallback: bool,
    pub rationale: String,
    pub effects_applied: Vec<Effect>,
    pub per_effect_diff: Vec<StateDiffEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedStorylet {
    pub storylet_id: String,
    pub reason: String,
}

/// The reproducible, rationale-annotated record of one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub schema_version: String,
    pub tick_index: u64,
    /// Synthetic stamp derived from the tick index so replays are
    /// byte-identical.
    pub timestamp: String,
    pub selected: Vec<SelectedStorylet>,
    pub rejected: Vec<RejectedStorylet>,
    pub state_before_hash: String,
    pub state_after_hash: String,
    pub diffs: Vec<StateDiffEntry>,
    pub intensity_before: f64,
    pub intensity_after: f64,
    pub idle_tick_count_after: u64,
    #[serde(default)]
    pub nl_evaluations: Vec<NlEvaluation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SCHEMA_VERSION_V1;

    #[test]
    fn tick_record_round_trips_through_json() {
        let record = TickRecord {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            tick_index: 3,
            timestamp: "tick-000003".to_string(),
            selected: vec![SelectedStorylet {
                storylet_id: "st-001".to_string(),
                title: "Market day".to_string(),
                tags: vec!["economic".to_string()],
                is_fallback: false,
                rationale: "stage 7: drawn with key 0.120000 at weight 1.0000".to_string(),
                effects_applied: Vec::new(),
                per_effect_diff: vec![StateDiffEntry {
                    path: "world.vars.coin".to_string(),
                    before: Some(Value::Number(4.0)),
                    after: Some(Value::Number(5.0)),
                }],
            }],
            rejected: vec![RejectedStorylet {
                storylet_id: "st-002".to_string(),
                reason: "stage 3: once-only storylet has already fired".to_string(),
            }],
            state_before_hash: "00000000000000aa".to_string(),
            state_after_hash: "00000000000000ab".to_string(),
            diffs: Vec::new(),
            intensity_before: 0.5,
            intensity_after: 0.55,
            idle_tick_count_after: 0,
            nl_evaluations: Vec::new(),
        };
        let encoded = serde_json::to_string(&record).expect("serialize");
        let decoded: TickRecord = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(record, decoded);
    }
}
