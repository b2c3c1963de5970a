//! Goal-driven search loop.
//!
//! The controller owns one assignment for the duration of a run. Each
//! iteration takes the next candidate from the driver's move sequence, prices
//! it with the cost model and decides whether to commit. First improvement
//! wins, so a fixed move order gives a deterministic run. With annealing
//! configured, strictly worse candidates may also be committed while the
//! temperature is above its floor.
//!
//! A run ends in one of two terminal states. `GoalReached` means every soft
//! term and penalty is zero. `BudgetExhausted` means the iteration or time
//! budget ran out, or a full pass found nothing to commit; the best state
//! seen is still returned.

use crate::data::{AnnealingConfig, SearchConfig};
use crate::driver::{MoveLog, SearchDriver};
use crate::state::AssignmentState;
use log::{debug, trace};
use rand::Rng;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Where the controller's state machine stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchStatus {
    Exploring,
    GoalReached,
    BudgetExhausted,
}

/// Cooperative limits, checked once per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_iterations: u64,
    pub time_limit: Option<Duration>,
}

impl From<&SearchConfig> for SearchLimits {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            time_limit: config.time_limit_ms.map(Duration::from_millis),
        }
    }
}

/// Geometric cooling schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Annealing {
    temperature: f64,
    cooling_rate: f64,
    min_temperature: f64,
}

impl Annealing {
    pub fn new(config: &AnnealingConfig) -> Self {
        Self {
            temperature: config.initial_temperature,
            cooling_rate: config.cooling_rate,
            min_temperature: config.min_temperature,
        }
    }
}

/// Rule for committing a candidate that does not improve the cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Acceptance {
    HillClimbing,
    Annealing(Annealing),
}

impl Acceptance {
    pub fn from_config(annealing: Option<&AnnealingConfig>) -> Self {
        match annealing {
            Some(config) => Acceptance::Annealing(Annealing::new(config)),
            None => Acceptance::HillClimbing,
        }
    }

    /// True once worsening moves can no longer be accepted.
    pub fn is_frozen(&self) -> bool {
        match self {
            Acceptance::HillClimbing => true,
            Acceptance::Annealing(a) => a.temperature <= a.min_temperature,
        }
    }

    /// Metropolis test for a strictly positive cost change.
    fn accepts_worsening<R: Rng + ?Sized>(&self, change: i64, rng: &mut R) -> bool {
        if change <= 0 || self.is_frozen() {
            return false;
        }
        let Acceptance::Annealing(a) = self else {
            return false;
        };
        let probability = (-(change as f64) / a.temperature).exp();
        probability.is_finite() && rng.gen_range(0.0..1.0) < probability
    }

    fn cool(&mut self) {
        if let Acceptance::Annealing(a) = self {
            a.temperature *= a.cooling_rate;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStatistics {
    pub iterations: u64,
    pub passes: u64,
    pub accepted: u64,
    pub improving: u64,
    pub elapsed: Duration,
}

/// What a finished run hands back.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub status: SearchStatus,
    /// Best state seen during the run.
    pub state: AssignmentState,
    pub statistics: SearchStatistics,
    /// Total cost at the start and after every committed move.
    pub cost_history: Vec<i64>,
}

/// Drives one search run from a seeded state to a terminal status.
#[derive(Debug, Clone)]
pub struct GoalController<'a> {
    driver: SearchDriver<'a>,
    limits: SearchLimits,
    acceptance: Acceptance,
    status: SearchStatus,
}

impl<'a> GoalController<'a> {
    pub fn new(driver: SearchDriver<'a>, limits: SearchLimits, acceptance: Acceptance) -> Self {
        Self {
            driver,
            limits,
            acceptance,
            status: SearchStatus::Exploring,
        }
    }

    #[inline]
    pub fn status(&self) -> SearchStatus {
        self.status
    }

    fn budget_spent(&self, stats: &SearchStatistics, start: Instant) -> bool {
        stats.iterations >= self.limits.max_iterations
            || self
                .limits
                .time_limit
                .is_some_and(|limit| start.elapsed() >= limit)
    }

    /// Searches from `state` until the goal is reached or the budget runs out.
    pub fn run<R>(&mut self, mut state: AssignmentState, rng: &mut R) -> SearchOutcome
    where
        R: Rng + ?Sized,
    {
        let start = Instant::now();
        let mut stats = SearchStatistics::default();
        let mut cost_history = vec![state.cost().total()];
        let mut best_total = state.cost().total();
        // moves committed since the best state was last seen
        let mut since_best = MoveLog::default();
        self.status = SearchStatus::Exploring;

        while self.status == SearchStatus::Exploring {
            if state.cost().is_zero() {
                self.status = SearchStatus::GoalReached;
                break;
            }
            if self.budget_spent(&stats, start) {
                self.status = SearchStatus::BudgetExhausted;
                break;
            }

            stats.passes += 1;
            let mut proposed = 0u64;
            let mut out_of_budget = false;
            let committed = {
                let mut moves = self.driver.propose_moves(&state, rng);
                loop {
                    let Some(mv) = moves.next() else {
                        break None;
                    };
                    if self.budget_spent(&stats, start) {
                        out_of_budget = true;
                        break None;
                    }
                    stats.iterations += 1;
                    proposed += 1;

                    let change = self.driver.cost_model().delta_cost(&state, &mv).total();
                    let accept = change < 0 || self.acceptance.accepts_worsening(change, rng);
                    self.acceptance.cool();
                    if accept {
                        break Some((mv, change));
                    }
                }
            };

            match committed {
                Some((mv, change)) => {
                    trace!("Committing {:?} with cost change {}", mv, change);
                    self.driver.apply_move(&mut state, &mv);
                    stats.accepted += 1;
                    if change < 0 {
                        stats.improving += 1;
                    }
                    let total = state.cost().total();
                    cost_history.push(total);
                    if total < best_total {
                        best_total = total;
                        since_best.clear();
                    } else {
                        since_best.record(mv);
                    }
                }
                None if out_of_budget || proposed == 0 || self.acceptance.is_frozen() => {
                    self.status = SearchStatus::BudgetExhausted;
                }
                None => {}
            }
        }

        if !since_best.is_empty() {
            debug!(
                "Walking back {} moves to the best state (cost {})",
                since_best.len(),
                best_total
            );
            since_best.rollback(&self.driver, &mut state);
        }

        stats.elapsed = start.elapsed();
        debug!(
            "Run finished with status {:?}: cost {} after {} iterations in {} passes ({} accepted)",
            self.status,
            state.cost().total(),
            stats.iterations,
            stats.passes,
            stats.accepted
        );

        SearchOutcome {
            status: self.status,
            state,
            statistics: stats,
            cost_history,
        }
    }
}
