//! Stages 1-7 of the selection pipeline. Every storylet that drops out
//! contributes a stage-cited reason; every survivor carries a rationale
//! naming the stages that decided its inclusion. Stage order is fixed and
//! every stage preserves author order.

use std::cmp::Ordering;

use contracts::{DirectorConfig, NlEvaluation, Project, RejectedStorylet, Storylet};

use crate::history::TickHistory;
use crate::hybrid::HybridEvaluator;
use crate::rng::{exponential_key, TickRng};
use crate::state::StoryState;

/// Penalized weights never drop below this, so a diversity-hammered
/// candidate stays sampleable.
const MIN_SAMPLEABLE_WEIGHT: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedCandidate {
    /// Position in `project.storylets`.
    pub index: usize,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionOutcome {
    /// In ascending sampling-key order; this is the order effects apply in.
    pub selected: Vec<SelectedCandidate>,
    pub rejected: Vec<RejectedStorylet>,
    pub nl_evaluations: Vec<NlEvaluation>,
    pub fallback_used: bool,
}

struct Candidate<'p> {
    index: usize,
    storylet: &'p Storylet,
    condition_reasons: Vec<String>,
    weight: f64,
    stage_notes: Vec<String>,
}

pub fn select(
    project: &Project,
    state: &StoryState,
    history: &TickHistory,
    config: &DirectorConfig,
    evaluator: &HybridEvaluator<'_>,
    tick_index: u64,
) -> SelectionOutcome {
    let mut outcome = SelectionOutcome::default();

    // Stages 1-3 over the regular pool.
    let regular = screen_pool(
        project,
        state,
        history,
        evaluator,
        tick_index,
        false,
        &mut outcome,
    );

    // Stage 4: the fallback pool replaces an empty regular pool once the idle
    // threshold is crossed; otherwise fallbacks sit this tick out.
    let regular_survived = !regular.is_empty();
    let mut candidates = if !regular_survived
        && history.idle_tick_count() >= config.fallback_after_idle_ticks
    {
        outcome.fallback_used = true;
        screen_pool(
            project,
            state,
            history,
            evaluator,
            tick_index,
            true,
            &mut outcome,
        )
    } else {
        for (_, storylet) in fallback_pool(project) {
            let reason = if regular_survived {
                "stage 4: fallback excluded (regular candidates available)".to_string()
            } else {
                format!(
                    "stage 4: fallback excluded (idle {} below threshold {})",
                    history.idle_tick_count(),
                    config.fallback_after_idle_ticks
                )
            };
            outcome.rejected.push(RejectedStorylet {
                storylet_id: storylet.id.clone(),
                reason,
            });
        }
        regular
    };

    // Stage 5: diversity penalty against the recent tag window.
    for candidate in &mut candidates {
        let hits = history.tag_hits(&candidate.storylet.tags, config.diversity_window);
        if hits > 0 && candidate.weight > 0.0 {
            let mut adjusted =
                candidate.weight * (1.0 - config.diversity_penalty).powi(hits as i32);
            if adjusted < MIN_SAMPLEABLE_WEIGHT {
                adjusted = MIN_SAMPLEABLE_WEIGHT;
            }
            candidate.weight = adjusted;
            candidate.stage_notes.push(format!(
                "stage 5: diversity {:.4} after {hits} recent tag hits",
                adjusted
            ));
        }
    }

    // Stage 6: pacing adjustment toward the preferred intensity.
    let target = config.pacing_preference.target();
    let drive = target - state.world.intensity;
    let drive_sign = if drive > 0.0 {
        1.0
    } else if drive < 0.0 {
        -1.0
    } else {
        0.0
    };
    for candidate in &mut candidates {
        let factor = 1.0 + config.pacing_scale * drive_sign * candidate.storylet.intensity_delta;
        if factor != 1.0 {
            candidate.weight = (candidate.weight * factor).max(0.0);
            candidate.stage_notes.push(format!(
                "stage 6: pacing x{factor:.4} (drive {drive:+.2} toward target {target:.1})"
            ));
        }
    }

    // Stage 7: weighted sampling without replacement by exponential keys.
    // One uniform draw per positive-weight candidate, in author order.
    let mut rng = TickRng::for_tick(config.rng_seed, tick_index);
    let mut keyed = Vec::new();
    for (position, candidate) in candidates.iter().enumerate() {
        if candidate.weight > 0.0 {
            let key = exponential_key(rng.next_unit(), candidate.weight);
            keyed.push((key, position));
        } else {
            outcome.rejected.push(RejectedStorylet {
                storylet_id: candidate.storylet.id.clone(),
                reason: "stage 7: zero weight after adjustments".to_string(),
            });
        }
    }
    keyed.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
    let draw_count = (config.events_per_tick as usize).min(keyed.len());
    for (key, position) in &keyed[draw_count..] {
        outcome.rejected.push(RejectedStorylet {
            storylet_id: candidates[*position].storylet.id.clone(),
            reason: format!(
                "stage 7: not drawn (key {key:.6} outside the {draw_count} smallest)"
            ),
        });
    }
    for (key, position) in &keyed[..draw_count] {
        let candidate = &candidates[*position];
        let mut parts = vec![format!(
            "stage 1: preconditions satisfied ({})",
            candidate.condition_reasons.join("; ")
        )];
        if outcome.fallback_used {
            parts.push(format!(
                "stage 4: fallback pool engaged after {} idle ticks",
                history.idle_tick_count()
            ));
        }
        parts.extend(candidate.stage_notes.iter().cloned());
        parts.push(format!(
            "stage 7: drawn with key {key:.6} at weight {:.4}",
            candidate.weight
        ));
        outcome.selected.push(SelectedCandidate {
            index: candidate.index,
            rationale: parts.join("; "),
        });
    }

    outcome
}

fn fallback_pool(project: &Project) -> impl Iterator<Item = (usize, &Storylet)> {
    project
        .storylets
        .iter()
        .enumerate()
        .filter(|(_, storylet)| storylet.is_fallback)
}

/// Stages 1-3 for one pool (regular or fallback), in author order. Rejections
/// are captured per storylet; nothing short-circuits the pipeline.
fn screen_pool<'p>(
    project: &'p Project,
    state: &StoryState,
    history: &TickHistory,
    evaluator: &HybridEvaluator<'_>,
    tick_index: u64,
    from_fallback_pool: bool,
    outcome: &mut SelectionOutcome,
) -> Vec<Candidate<'p>> {
    let mut survivors = Vec::new();
    for (index, storylet) in project.storylets.iter().enumerate() {
        if storylet.is_fallback != from_fallback_pool {
            continue;
        }

        // Stage 1: precondition filtering.
        let report = evaluator.evaluate(&storylet.preconditions, state);
        outcome.nl_evaluations.extend(report.nl_evaluations);
        if !report.satisfied {
            outcome.rejected.push(RejectedStorylet {
                storylet_id: storylet.id.clone(),
                reason: format!("stage 1: {}", report.reasons.join("; ")),
            });
            continue;
        }

        // Stage 2: ordering constraints against fired_ever.
        if let Some(missing) = storylet
            .requires_fired
            .iter()
            .find(|required| !history.has_fired(required))
        {
            outcome.rejected.push(RejectedStorylet {
                storylet_id: storylet.id.clone(),
                reason: format!("stage 2: requires_fired not met ({missing} has not fired)"),
            });
            continue;
        }
        if let Some(blocking) = storylet
            .forbids_fired
            .iter()
            .find(|forbidden| history.has_fired(forbidden))
        {
            outcome.rejected.push(RejectedStorylet {
                storylet_id: storylet.id.clone(),
                reason: format!("stage 2: forbids_fired violated ({blocking} has fired)"),
            });
            continue;
        }

        // Stage 3: once and cooldown.
        if storylet.once && history.has_fired(&storylet.id) {
            outcome.rejected.push(RejectedStorylet {
                storylet_id: storylet.id.clone(),
                reason: "stage 3: once-only storylet has already fired".to_string(),
            });
            continue;
        }
        if let Some(last) = history.last_triggered(&storylet.id) {
            // Cooldown counts full cooling ticks: fired at t, eligible at
            // t + cooldown + 1.
            if tick_index.saturating_sub(last) <= storylet.cooldown {
                outcome.rejected.push(RejectedStorylet {
                    storylet_id: storylet.id.clone(),
                    reason: format!(
                        "stage 3: cooling down (fired at tick {last}, cooldown {})",
                        storylet.cooldown
                    ),
                });
                continue;
            }
        }

        survivors.push(Candidate {
            index,
            storylet,
            condition_reasons: report.reasons,
            weight: storylet.weight,
            stage_notes: Vec::new(),
        });
    }
    survivors
}
