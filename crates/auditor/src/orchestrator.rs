//! Classification state machine.
//!
//! Flow:
//! 1. PLAN -> RETRIEVE_CLASSIFY -> REVIEW_EVIDENCE
//! 2. REVIEW_EVIDENCE approved -> AGGREGATE -> VERIFY_AGGREGATE
//! 3. VERIFY_AGGREGATE approved -> AUDIT_FAITHFULNESS
//! 4. AUDIT_FAITHFULNESS approved -> DONE
//! 5. Any REVISE -> PACE -> PLAN, unless `step_count` has reached `max_steps`,
//!    in which case the run stops with the best available answer
//!
//! The run state is owned here; stages only return deltas.

use audit_shared::{
    review_evidence, verify_final_code, AuditError, GateOutcome, Report, RunState, Stage,
    StateDelta, Status, Termination, Transition,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::backend::Backends;
use crate::config::AuditConfig;
use crate::pipeline::{Aggregator, ClassifierWorker, FaithfulnessAuditor, Pacer, Planner};
use crate::prompts::PromptSet;

/// Result of a finished run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: RunState,
    pub termination: Termination,
    /// Every edge taken, in order
    pub transitions: Vec<Transition>,
    /// Decision of the last gate that ran
    pub last_gate: Option<GateOutcome>,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn is_verified(&self) -> bool {
        self.termination == Termination::Approved
    }

    /// Stages visited, in order, starting with PLAN
    pub fn path(&self) -> Vec<Stage> {
        let mut path: Vec<Stage> = self.transitions.iter().take(1).map(|t| t.from).collect();
        path.extend(self.transitions.iter().map(|t| t.to));
        path
    }

    pub fn report(&self, run_id: &str, cost_per_1k_tokens: f64) -> Report {
        Report::from_state(
            run_id,
            &self.state,
            self.termination,
            self.elapsed.as_secs_f64(),
            cost_per_1k_tokens,
        )
    }
}

pub struct Orchestrator {
    planner: Planner,
    worker: ClassifierWorker,
    aggregator: Aggregator,
    auditor: FaithfulnessAuditor,
    pacer: Pacer,
    max_steps: u32,
}

impl Orchestrator {
    /// Build from config with prompts loaded from `run.prompts_dir`
    pub fn new(config: &AuditConfig, backends: Backends) -> Self {
        let prompts = PromptSet::load(config.run.prompts_dir.as_deref());
        Self::with_prompts(config, backends, prompts)
    }

    pub fn with_prompts(config: &AuditConfig, backends: Backends, prompts: PromptSet) -> Self {
        let prompts = Arc::new(prompts);
        let run = &config.run;

        Self {
            planner: Planner::new(backends.planner, prompts.clone()),
            worker: ClassifierWorker::new(
                backends.evidence,
                backends.worker,
                prompts.clone(),
                run.evidence_char_limit,
            ),
            aggregator: Aggregator::new(backends.aggregator, prompts),
            auditor: FaithfulnessAuditor::new(
                backends.scorer,
                run.scorer_attempts,
                run.faithfulness_threshold,
            ),
            pacer: Pacer::new(config.cooldown()),
            max_steps: run.max_steps,
        }
    }

    /// Classify one query. Errors only for planner or aggregator failures.
    pub async fn run(&self, query: &str) -> Result<RunOutcome, AuditError> {
        let start = Instant::now();
        let mut state = RunState::new(query);
        let mut transitions = Vec::new();
        let mut last_gate: Option<GateOutcome> = None;
        let mut aggregated_this_cycle = false;
        let mut stage = Stage::Plan;

        info!(
            max_steps = self.max_steps,
            cooldown_secs = self.pacer.cooldown().as_secs(),
            "starting classification of '{}'",
            query
        );

        let termination = loop {
            let next = match stage {
                Stage::Plan => {
                    aggregated_this_cycle = false;
                    let delta = self.planner.plan(&state).await.inspect_err(|e| {
                        warn!(step = state.step_count(), "planner aborted the run: {}", e)
                    })?;
                    state.apply(delta);
                    Stage::RetrieveClassify
                }
                Stage::RetrieveClassify => {
                    let delta = self.worker.classify(&state).await;
                    state.apply(delta);
                    Stage::ReviewEvidence
                }
                Stage::ReviewEvidence => {
                    let outcome =
                        review_evidence(state.latest_worker_result(), state.latest_evidence());
                    self.gate(&mut state, &mut last_gate, outcome, Stage::Aggregate)
                }
                Stage::Aggregate => {
                    let delta = self.aggregator.aggregate(&state).await.inspect_err(|e| {
                        warn!(step = state.step_count(), "aggregator aborted the run: {}", e)
                    })?;
                    state.apply(delta);
                    aggregated_this_cycle = true;
                    Stage::VerifyAggregate
                }
                Stage::VerifyAggregate => {
                    let outcome = verify_final_code(state.final_hscode(), state.latest_evidence());
                    self.gate(&mut state, &mut last_gate, outcome, Stage::AuditFaithfulness)
                }
                Stage::AuditFaithfulness => {
                    let (delta, outcome) = self.auditor.audit(&state).await;
                    state.apply(StateDelta {
                        status: None,
                        critique: None,
                        ..delta
                    });
                    self.gate(&mut state, &mut last_gate, outcome, Stage::Done)
                }
                Stage::Pace => {
                    let delta = self.pacer.pace(&state).await;
                    state.apply(delta);
                    Stage::Plan
                }
                Stage::Done => {
                    if state.status() == Status::Approved {
                        break Termination::Approved;
                    }
                    if !aggregated_this_cycle {
                        warn!("Retry ceiling reached before synthesis, falling back to consensus");
                        state.apply(Aggregator::fallback(&state));
                    }
                    break Termination::CeilingReached;
                }
            };

            info!(step = state.step_count(), "{} -> {}", stage, next);
            transitions.push(Transition {
                from: stage,
                to: next,
                step: state.step_count(),
            });
            stage = next;
        };

        let elapsed = start.elapsed();
        match termination {
            Termination::Approved => info!(
                steps = state.step_count(),
                tokens = state.total_tokens(),
                "run approved in {:.2}s",
                elapsed.as_secs_f64()
            ),
            Termination::CeilingReached => warn!(
                steps = state.step_count(),
                "retry ceiling reached, reporting unverified answer: {}",
                state.critique()
            ),
        }

        Ok(RunOutcome {
            state,
            termination,
            transitions,
            last_gate,
            elapsed,
        })
    }

    /// Apply a gate decision and pick the next stage.
    /// REVISE goes to PACE, or straight to DONE once the ceiling is reached.
    fn gate(
        &self,
        state: &mut RunState,
        last_gate: &mut Option<GateOutcome>,
        outcome: GateOutcome,
        on_approve: Stage,
    ) -> Stage {
        state.apply(outcome.to_delta());

        let next = if outcome.is_approved() {
            info!("{}", outcome.critique);
            on_approve
        } else {
            let kind = outcome
                .failure
                .map(|k| k.to_string())
                .unwrap_or_default();
            if state.step_count() >= self.max_steps {
                warn!(failure = %kind, "REVISE at retry ceiling: {}", outcome.critique);
                Stage::Done
            } else {
                info!(failure = %kind, "REVISE: {}", outcome.critique);
                Stage::Pace
            }
        };

        *last_gate = Some(outcome);
        next
    }
}
