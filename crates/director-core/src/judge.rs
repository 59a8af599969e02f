//! Natural-language judge contract. The core never imports a concrete LLM
//! client; anything that can answer `(condition, state summary)` with a
//! verdict plugs in here. Verdicts are memoized by content hash.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use contracts::JudgeVerdict;

use crate::rng::content_hash64;
use crate::state::StoryState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeFailure {
    pub reason: String,
}

impl fmt::Display for JudgeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "judge failure: {}", self.reason)
    }
}

impl std::error::Error for JudgeFailure {}

/// One blocking synchronous call per (condition, summary) pair. A judge must
/// be deterministic with respect to its input bytes for caching to be sound.
pub trait NlJudge: Send + Sync {
    fn judge(&self, condition_text: &str, state_summary: &str) -> Result<JudgeVerdict, JudgeFailure>;
}

/// Read-mostly verdict cache shared across ticks (and threads, if desired).
#[derive(Debug, Default)]
pub struct JudgeCache {
    entries: Mutex<BTreeMap<u64, JudgeVerdict>>,
}

impl JudgeCache {
    pub fn lookup(&self, key: u64) -> Option<JudgeVerdict> {
        self.entries
            .lock()
            .map(|entries| entries.get(&key).cloned())
            .unwrap_or(None)
    }

    pub fn store(&self, key: u64, verdict: JudgeVerdict) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, verdict);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache key over the serialized tuple, not any prompt template, so template
/// churn does not invalidate entries.
pub fn cache_key(condition_text: &str, state_summary: &str) -> u64 {
    content_hash64(&[condition_text, state_summary])
}

/// Stable serialization of the substates that could plausibly affect a
/// judgment: world vars/tags/intensity, character mood/status/traits, and
/// relationship status/metrics.
pub fn state_summary(state: &StoryState) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "world.intensity = {}",
        contracts::value::format_number(state.world.intensity)
    ));
    if !state.world.tags.is_empty() {
        let tags = state.world.tags.iter().cloned().collect::<Vec<_>>();
        lines.push(format!("world.tags = [{}]", tags.join(", ")));
    }
    for (key, value) in &state.world.vars {
        lines.push(format!("world.vars.{key} = {value}"));
    }
    for (id, character) in &state.characters {
        if !character.mood.is_empty() {
            lines.push(format!("characters.{id}.mood = {}", character.mood));
        }
        if !character.status.is_empty() {
            lines.push(format!("characters.{id}.status = {}", character.status));
        }
        if !character.traits.is_empty() {
            let traits = character.traits.iter().cloned().collect::<Vec<_>>();
            lines.push(format!("characters.{id}.traits = [{}]", traits.join(", ")));
        }
    }
    for (pair, relationship) in &state.relationships {
        if !relationship.status.is_empty() {
            lines.push(format!(
                "relationships.{pair}.status = {}",
                relationship.status
            ));
        }
        for (metric, value) in &relationship.metrics {
            lines.push(format!(
                "relationships.{pair}.{metric} = {}",
                contracts::value::format_number(*value)
            ));
        }
    }
    lines.join("\n")
}

/// Canned-answer judge: the primary testing vehicle. Unknown conditions get a
/// deterministic "unsatisfied" verdict.
#[derive(Debug, Default)]
pub struct StubJudge {
    answers: BTreeMap<String, JudgeVerdict>,
}

impl StubJudge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answer(
        mut self,
        condition_text: impl Into<String>,
        satisfied: bool,
        confidence: f64,
        reason: impl Into<String>,
    ) -> Self {
        self.answers.insert(
            condition_text.into(),
            JudgeVerdict {
                satisfied,
                confidence,
                reason: reason.into(),
            },
        );
        self
    }
}

impl NlJudge for StubJudge {
    fn judge(
        &self,
        condition_text: &str,
        _state_summary: &str,
    ) -> Result<JudgeVerdict, JudgeFailure> {
        Ok(self
            .answers
            .get(condition_text)
            .cloned()
            .unwrap_or_else(|| JudgeVerdict {
                satisfied: false,
                confidence: 0.0,
                reason: "no canned verdict for this condition".to_string(),
            }))
    }
}
