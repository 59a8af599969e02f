//! The public façade. One tick is the atomic unit of progress: either it
//! completes and appends exactly one record, or it aborts with no visible
//! state change.

use contracts::{
    DirectorConfig, Project, SelectedStorylet, TickRecord, SCHEMA_VERSION_V1,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::condition::ConditionReport;
use crate::effect::apply_effect;
use crate::error::{TickAborted, TickError};
use crate::history::TickHistory;
use crate::hybrid::HybridEvaluator;
use crate::judge::{JudgeCache, NlJudge, StubJudge};
use crate::pipeline::{self, SelectedCandidate, SelectionOutcome};
use crate::state::StoryState;

/// A story thread owns its state, its history, and nothing shared: threads
/// advance independently and may do so in parallel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryThread {
    pub thread_id: String,
    pub state: StoryState,
    pub history: TickHistory,
}

impl StoryThread {
    pub fn new(thread_id: impl Into<String>, project: &Project) -> Self {
        Self {
            thread_id: thread_id.into(),
            state: StoryState::from_project(project),
            history: TickHistory::new(),
        }
    }
}

pub struct Director {
    judge: Box<dyn NlJudge>,
    judge_cache: JudgeCache,
}

impl std::fmt::Debug for Director {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Director")
            .field("judge", &"<dyn NlJudge>")
            .field("judge_cache", &self.judge_cache)
            .finish()
    }
}

impl Director {
    pub fn new(judge: Box<dyn NlJudge>) -> Self {
        Self {
            judge,
            judge_cache: JudgeCache::default(),
        }
    }

    /// Director wired to the canned-answer judge; deterministic-mode callers
    /// never consult it.
    pub fn with_stub_judge() -> Self {
        Self::new(Box::new(StubJudge::new()))
    }

    pub fn judge_cache(&self) -> &JudgeCache {
        &self.judge_cache
    }

    /// Run one tick: select, apply, record. Appends at most one record.
    pub fn tick(
        &self,
        project: &Project,
        thread: &mut StoryThread,
        config: &DirectorConfig,
    ) -> Result<TickRecord, TickError> {
        let tick_index = thread.history.next_tick_index();
        let evaluator = HybridEvaluator::new(self.judge.as_ref(), &self.judge_cache, config.mode);
        let outcome = pipeline::select(
            project,
            &thread.state,
            &thread.history,
            config,
            &evaluator,
            tick_index,
        );
        self.commit(project, thread, config, tick_index, outcome)
    }

    pub fn tick_n(
        &self,
        project: &Project,
        thread: &mut StoryThread,
        config: &DirectorConfig,
        count: u64,
    ) -> Result<Vec<TickRecord>, TickError> {
        let mut records = Vec::new();
        for _ in 0..count {
            records.push(self.tick(project, thread, config)?);
        }
        Ok(records)
    }

    /// Advance many independent threads concurrently. Each thread owns its
    /// state, history, and per-tick generator, so results match sequential
    /// ticking thread by thread.
    pub fn tick_threads(
        &self,
        project: &Project,
        threads: &mut [&mut StoryThread],
        config: &DirectorConfig,
    ) -> Vec<Result<TickRecord, TickError>> {
        threads
            .par_iter_mut()
            .map(|thread| self.tick(project, thread, config))
            .collect()
    }

    /// Re-run ticks `0..=to_tick` from the project's initial state and return
    /// records `from_tick..=to_tick`. With identical inputs and seed this is
    /// bit-for-bit identical to the original run.
    pub fn replay(
        &self,
        project: &Project,
        config: &DirectorConfig,
        from_tick: u64,
        to_tick: u64,
    ) -> Result<Vec<TickRecord>, TickError> {
        if from_tick > to_tick {
            return Err(TickError::TickRangeInvalid { from_tick, to_tick });
        }
        let mut thread = StoryThread::new("replay", project);
        let mut records = Vec::new();
        for _ in 0..=to_tick {
            records.push(self.tick(project, &mut thread, config)?);
        }
        Ok(records.split_off(from_tick as usize))
    }

    /// Per-condition pass/fail reasons for one storylet, without mutating
    /// anything.
    pub fn explain(
        &self,
        project: &Project,
        storylet_id: &str,
        state: &StoryState,
        config: &DirectorConfig,
    ) -> Result<Vec<ConditionReport>, TickError> {
        let storylet = project
            .storylet(storylet_id)
            .ok_or_else(|| TickError::UnknownStorylet(storylet_id.to_string()))?;
        let evaluator = HybridEvaluator::new(self.judge.as_ref(), &self.judge_cache, config.mode);
        Ok(evaluator.explain(&storylet.preconditions, state))
    }

    /// Force-fire one storylet outside the pipeline. `once` and ordering
    /// constraints still bind and surface as violations.
    pub fn inject(
        &self,
        project: &Project,
        thread: &mut StoryThread,
        config: &DirectorConfig,
        storylet_id: &str,
    ) -> Result<TickRecord, TickError> {
        let (index, storylet) = project
            .storylets
            .iter()
            .enumerate()
            .find(|(_, storylet)| storylet.id == storylet_id)
            .ok_or_else(|| TickError::UnknownStorylet(storylet_id.to_string()))?;
        if storylet.once && thread.history.has_fired(&storylet.id) {
            return Err(TickError::OnceViolation(storylet.id.clone()));
        }
        if let Some(missing) = storylet
            .requires_fired
            .iter()
            .find(|required| !thread.history.has_fired(required))
        {
            return Err(TickError::OrderingViolation {
                storylet_id: storylet.id.clone(),
                detail: format!("requires_fired not met ({missing} has not fired)"),
            });
        }
        if let Some(blocking) = storylet
            .forbids_fired
            .iter()
            .find(|forbidden| thread.history.has_fired(forbidden))
        {
            return Err(TickError::OrderingViolation {
                storylet_id: storylet.id.clone(),
                detail: format!("forbids_fired violated ({blocking} has fired)"),
            });
        }

        let tick_index = thread.history.next_tick_index();
        let outcome = SelectionOutcome {
            selected: vec![SelectedCandidate {
                index,
                rationale: "injected by caller outside the selection pipeline".to_string(),
            }],
            ..SelectionOutcome::default()
        };
        self.commit(project, thread, config, tick_index, outcome)
    }

    /// Stages 8 and 9: apply effects to a cloned state, compute the new
    /// intensity, diff, and record. History mutates only after everything
    /// else succeeded.
    fn commit(
        &self,
        project: &Project,
        thread: &mut StoryThread,
        config: &DirectorConfig,
        tick_index: u64,
        outcome: SelectionOutcome,
    ) -> Result<TickRecord, TickError> {
        let before = &thread.state;
        let state_before_hash = before.canonical_hash();
        let mut working = before.clone();

        let mut selected = Vec::new();
        let mut intensity_delta_sum = 0.0;
        for candidate in &outcome.selected {
            let storylet = &project.storylets[candidate.index];
            let mut per_effect_diff = Vec::new();
            for (effect_index, effect) in storylet.effects.iter().enumerate() {
                match apply_effect(effect, &mut working) {
                    Ok(entry) => per_effect_diff.push(entry),
                    Err(err) => {
                        // Discard the clone; no record, no history movement.
                        return Err(TickError::Aborted(TickAborted {
                            storylet_id: storylet.id.clone(),
                            effect_index,
                            reason: err.to_string(),
                        }));
                    }
                }
            }
            intensity_delta_sum += storylet.intensity_delta;
            selected.push(SelectedStorylet {
                storylet_id: storylet.id.clone(),
                title: storylet.title.clone(),
                tags: storylet.tags.clone(),
                is_fallback: storylet.is_fallback,
                rationale: candidate.rationale.clone(),
                effects_applied: storylet.effects.clone(),
                per_effect_diff,
            });
        }

        let intensity_before = before.world.intensity;
        let decay_adjustment = config.intensity_decay * (intensity_before - 0.5);
        let intensity_after =
            (intensity_before + intensity_delta_sum - decay_adjustment).clamp(0.0, 1.0);
        working.world.intensity = intensity_after;

        let diffs = StoryState::diff(before, &working);
        let idle_tick_count_after = if selected.iter().any(|entry| !entry.is_fallback) {
            0
        } else {
            thread.history.idle_tick_count() + 1
        };

        let record = TickRecord {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            tick_index,
            timestamp: tick_stamp(tick_index),
            selected,
            rejected: outcome.rejected,
            state_before_hash,
            state_after_hash: working.canonical_hash(),
            diffs,
            intensity_before,
            intensity_after,
            idle_tick_count_after,
            nl_evaluations: outcome.nl_evaluations,
        };

        thread.state = working;
        thread.history.append(record.clone());
        Ok(record)
    }
}

fn tick_stamp(tick_index: u64) -> String {
    format!("tick-{tick_index:06}")
}
