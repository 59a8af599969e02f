//! Mode-aware precondition evaluation. All three modes produce the same
//! `(satisfied, reasons)` shape; the mode only changes who produced each
//! reason.

use contracts::{EvaluationMode, JudgeVerdict, NlEvaluation, Precondition};

use crate::condition::{evaluate_typed, typed_condition_text, ConditionReport};
use crate::judge::{cache_key, state_summary, JudgeCache, NlJudge};
use crate::state::StoryState;

pub struct HybridEvaluator<'a> {
    judge: &'a dyn NlJudge,
    cache: &'a JudgeCache,
    mode: EvaluationMode,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvalReport {
    pub satisfied: bool,
    pub reasons: Vec<String>,
    pub nl_evaluations: Vec<NlEvaluation>,
}

impl<'a> HybridEvaluator<'a> {
    pub fn new(judge: &'a dyn NlJudge, cache: &'a JudgeCache, mode: EvaluationMode) -> Self {
        Self { judge, cache, mode }
    }

    pub fn evaluate(&self, preconditions: &[Precondition], state: &StoryState) -> EvalReport {
        if preconditions.is_empty() {
            return EvalReport {
                satisfied: true,
                reasons: vec!["no preconditions".to_string()],
                nl_evaluations: Vec::new(),
            };
        }
        match self.mode {
            EvaluationMode::Deterministic => self.evaluate_deterministic(preconditions, state),
            EvaluationMode::AiAssisted => self.evaluate_assisted(preconditions, state),
            EvaluationMode::AiPrimary => self.evaluate_primary(preconditions, state),
        }
    }

    /// Per-condition reports for `explain`: every precondition is evaluated,
    /// with no short-circuiting and no state mutation.
    pub fn explain(&self, preconditions: &[Precondition], state: &StoryState) -> Vec<ConditionReport> {
        let summary = state_summary(state);
        preconditions
            .iter()
            .map(|precondition| match (self.mode, precondition) {
                (EvaluationMode::AiPrimary, Precondition::Typed(typed)) => {
                    let (verdict, _) = self.consult(&typed_condition_text(typed), &summary);
                    verdict_report(&verdict)
                }
                (_, Precondition::Typed(typed)) => evaluate_typed(typed, state),
                (EvaluationMode::Deterministic, Precondition::Natural(_)) => ConditionReport {
                    satisfied: false,
                    reason: "skipped: nl condition in deterministic mode".to_string(),
                },
                (_, Precondition::Natural(natural)) => {
                    let (verdict, _) = self.consult(&natural.nl_text, &summary);
                    verdict_report(&verdict)
                }
            })
            .collect()
    }

    fn evaluate_deterministic(
        &self,
        preconditions: &[Precondition],
        state: &StoryState,
    ) -> EvalReport {
        let mut report = EvalReport {
            satisfied: true,
            ..EvalReport::default()
        };
        for precondition in preconditions {
            match precondition {
                Precondition::Typed(typed) => {
                    let outcome = evaluate_typed(typed, state);
                    report.satisfied &= outcome.satisfied;
                    report.reasons.push(outcome.reason);
                }
                Precondition::Natural(_) => {
                    report.satisfied = false;
                    report
                        .reasons
                        .push("skipped: nl condition in deterministic mode".to_string());
                }
            }
        }
        report
    }

    fn evaluate_assisted(&self, preconditions: &[Precondition], state: &StoryState) -> EvalReport {
        let mut report = EvalReport {
            satisfied: true,
            ..EvalReport::default()
        };
        // Typed conditions first, in author order; the judge is never invoked
        // for a storylet whose typed conditions already reject it.
        for precondition in preconditions {
            if let Precondition::Typed(typed) = precondition {
                let outcome = evaluate_typed(typed, state);
                let satisfied = outcome.satisfied;
                report.reasons.push(outcome.reason);
                if !satisfied {
                    report.satisfied = false;
                    return report;
                }
            }
        }
        let summary = state_summary(state);
        for precondition in preconditions {
            if let Precondition::Natural(natural) = precondition {
                if !self.consult_into(&natural.nl_text, &summary, &mut report) {
                    report.satisfied = false;
                    return report;
                }
            }
        }
        report
    }

    fn evaluate_primary(&self, preconditions: &[Precondition], state: &StoryState) -> EvalReport {
        let mut report = EvalReport {
            satisfied: true,
            ..EvalReport::default()
        };
        let summary = state_summary(state);
        for precondition in preconditions {
            let condition_text = match precondition {
                Precondition::Typed(typed) => typed_condition_text(typed),
                Precondition::Natural(natural) => natural.nl_text.clone(),
            };
            if !self.consult_into(&condition_text, &summary, &mut report) {
                report.satisfied = false;
                return report;
            }
        }
        report
    }

    /// One judge consultation, memoized. Failures are reported as unsatisfied
    /// and are not cached, so a transient judge outage heals on a later tick.
    fn consult(&self, condition_text: &str, summary: &str) -> (JudgeVerdict, bool) {
        let key = cache_key(condition_text, summary);
        if let Some(verdict) = self.cache.lookup(key) {
            return (verdict, true);
        }
        match self.judge.judge(condition_text, summary) {
            Ok(mut verdict) => {
                verdict.confidence = verdict.confidence.clamp(0.0, 1.0);
                self.cache.store(key, verdict.clone());
                (verdict, false)
            }
            Err(failure) => (
                JudgeVerdict {
                    satisfied: false,
                    confidence: 0.0,
                    reason: failure.to_string(),
                },
                false,
            ),
        }
    }

    fn consult_into(&self, condition_text: &str, summary: &str, report: &mut EvalReport) -> bool {
        let (verdict, cache_hit) = self.consult(condition_text, summary);
        report.reasons.push(format!(
            "nl \"{condition_text}\": {} (confidence {:.2}; {})",
            if verdict.satisfied {
                "satisfied"
            } else {
                "unsatisfied"
            },
            verdict.confidence,
            verdict.reason
        ));
        report.nl_evaluations.push(NlEvaluation {
            condition_text: condition_text.to_string(),
            satisfied: verdict.satisfied,
            confidence: verdict.confidence,
            reason: verdict.reason,
            cache_hit,
        });
        verdict.satisfied
    }
}

fn verdict_report(verdict: &JudgeVerdict) -> ConditionReport {
    ConditionReport {
        satisfied: verdict.satisfied,
        reason: format!(
            "judge: {} (confidence {:.2}; {})",
            if verdict.satisfied {
                "satisfied"
            } else {
                "unsatisfied"
            },
            verdict.confidence,
            verdict.reason
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::{JudgeFailure, StubJudge};
    use contracts::{ConditionOp, NaturalCondition, TypedCondition, Value};

    struct PanickyJudge;

    impl NlJudge for PanickyJudge {
        fn judge(&self, _: &str, _: &str) -> Result<JudgeVerdict, JudgeFailure> {
            panic!("judge must not be consulted");
        }
    }

    struct FailingJudge;

    impl NlJudge for FailingJudge {
        fn judge(&self, _: &str, _: &str) -> Result<JudgeVerdict, JudgeFailure> {
            Err(JudgeFailure {
                reason: "timeout".to_string(),
            })
        }
    }

    fn typed(path: &str, op: ConditionOp, value: Value) -> Precondition {
        Precondition::Typed(TypedCondition {
            scope: None,
            path: path.to_string(),
            op,
            value,
        })
    }

    fn natural(text: &str) -> Precondition {
        Precondition::Natural(NaturalCondition {
            nl_text: text.to_string(),
        })
    }

    fn tension_state(tension: f64) -> StoryState {
        let mut state = StoryState::default();
        state
            .world
            .vars
            .insert("tension".to_string(), Value::Number(tension));
        state
    }

    #[test]
    fn deterministic_mode_rejects_nl_conditions_without_the_judge() {
        let judge = PanickyJudge;
        let cache = JudgeCache::default();
        let evaluator = HybridEvaluator::new(&judge, &cache, EvaluationMode::Deterministic);
        let report = evaluator.evaluate(
            &[
                typed("world.vars.tension", ConditionOp::Ge, Value::Number(10.0)),
                natural("the mood feels heavy"),
            ],
            &tension_state(50.0),
        );
        assert!(!report.satisfied);
        assert_eq!(report.reasons.len(), 2);
        assert_eq!(
            report.reasons[1],
            "skipped: nl condition in deterministic mode"
        );
    }

    #[test]
    fn assisted_mode_short_circuits_before_invoking_the_judge() {
        let judge = PanickyJudge;
        let cache = JudgeCache::default();
        let evaluator = HybridEvaluator::new(&judge, &cache, EvaluationMode::AiAssisted);
        let report = evaluator.evaluate(
            &[
                typed("world.vars.tension", ConditionOp::Ge, Value::Number(99.0)),
                natural("the mood feels heavy"),
            ],
            &tension_state(50.0),
        );
        assert!(!report.satisfied);
        assert_eq!(report.reasons.len(), 1);
        assert!(report.nl_evaluations.is_empty());
    }

    #[test]
    fn assisted_mode_consults_the_judge_after_typed_conditions_pass() {
        let judge =
            StubJudge::new().with_answer("the mood feels heavy", true, 0.75, "storm tags present");
        let cache = JudgeCache::default();
        let evaluator = HybridEvaluator::new(&judge, &cache, EvaluationMode::AiAssisted);
        let state = tension_state(50.0);
        let report = evaluator.evaluate(
            &[
                typed("world.vars.tension", ConditionOp::Ge, Value::Number(10.0)),
                natural("the mood feels heavy"),
            ],
            &state,
        );
        assert!(report.satisfied);
        assert_eq!(report.nl_evaluations.len(), 1);
        assert!(!report.nl_evaluations[0].cache_hit);

        // Second evaluation against the same state hits the cache.
        let report = evaluator.evaluate(&[natural("the mood feels heavy")], &state);
        assert!(report.nl_evaluations[0].cache_hit);
    }

    #[test]
    fn primary_mode_serializes_typed_conditions_for_the_judge() {
        let judge = StubJudge::new().with_answer(
            "world.vars.tension >= 10",
            true,
            1.0,
            "tension well above ten",
        );
        let cache = JudgeCache::default();
        let evaluator = HybridEvaluator::new(&judge, &cache, EvaluationMode::AiPrimary);
        let report = evaluator.evaluate(
            &[typed(
                "world.vars.tension",
                ConditionOp::Ge,
                Value::Number(10.0),
            )],
            &tension_state(50.0),
        );
        assert!(report.satisfied);
        assert_eq!(
            report.nl_evaluations[0].condition_text,
            "world.vars.tension >= 10"
        );
    }

    #[test]
    fn judge_failures_reject_without_aborting_and_are_not_cached() {
        let judge = FailingJudge;
        let cache = JudgeCache::default();
        let evaluator = HybridEvaluator::new(&judge, &cache, EvaluationMode::AiAssisted);
        let report = evaluator.evaluate(&[natural("anything")], &StoryState::default());
        assert!(!report.satisfied);
        assert!(report.reasons[0].contains("judge failure: timeout"));
        assert!(cache.is_empty());
    }

    #[test]
    fn explain_reports_every_condition_without_short_circuiting() {
        let judge = StubJudge::new();
        let cache = JudgeCache::default();
        let evaluator = HybridEvaluator::new(&judge, &cache, EvaluationMode::Deterministic);
        let reports = evaluator.explain(
            &[
                typed("world.vars.tension", ConditionOp::Ge, Value::Number(99.0)),
                typed("world.vars.tension", ConditionOp::Ge, Value::Number(10.0)),
                natural("the mood feels heavy"),
            ],
            &tension_state(50.0),
        );
        assert_eq!(reports.len(), 3);
        assert!(!reports[0].satisfied);
        assert!(reports[1].satisfied);
        assert!(!reports[2].satisfied);
    }
}
