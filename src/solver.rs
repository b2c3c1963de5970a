use crate::cost::CostModel;
use crate::data::{ParticipantAssignment, SolveRequest, SolveResponse};
use crate::driver::SearchDriver;
use crate::error::{ConfigurationError, SolveError};
use crate::feasibility::FeasibilityRules;
use crate::goal::{Acceptance, GoalController, SearchLimits, SearchOutcome};
use crate::problem::ProblemIndex;
use crate::state::AssignmentState;
use log::{debug, info, trace};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::time::Instant;

/// Assigns every participant to a slot, minimising the weighted cost.
///
/// Configuration and structural problems are reported before any search
/// starts. Once searching, the call always produces an assignment.
pub fn solve(request: &SolveRequest) -> Result<SolveResponse, SolveError> {
    let start_time = Instant::now();
    request.costs.validate()?;
    request.search.validate()?;

    trace!("Problem structure:\n{}", request.problem);
    info!(
        "Indexing problem with {} slots, {} participants and {} pre-assignments...",
        request.problem.slots.len(),
        request.problem.participants.len(),
        request.problem.pre_assignments.len()
    );
    let index = ProblemIndex::new(&request.problem)?;
    let rules = FeasibilityRules::new(&index)?;
    let cost_model = CostModel::new(&index, request.costs);
    cost_model.validate()?;

    let seed = AssignmentState::seed(&index, &rules, &cost_model)?;
    info!(
        "Seeded assignment with cost {} ({} pairing groups, {} section slots)",
        seed.cost().total(),
        index.num_groups(),
        index.section_slots().len()
    );

    let search = &request.search;
    let limits = SearchLimits::from(search);
    info!(
        "Starting {} search run(s) with {:?} move order, {} acceptance...",
        search.restarts,
        search.move_order,
        if search.annealing.is_some() {
            "annealing"
        } else {
            "hill-climbing"
        }
    );

    let outcomes: Vec<SearchOutcome> = (0..search.restarts)
        .into_par_iter()
        .map(|run| {
            let mut rng = StdRng::seed_from_u64(search.seed.wrapping_add(run as u64));
            let driver = SearchDriver::new(&rules, cost_model, search.move_order);
            let acceptance = Acceptance::from_config(search.annealing.as_ref());
            let mut controller = GoalController::new(driver, limits, acceptance);
            let outcome = controller.run(seed.clone(), &mut rng);
            debug!(
                "Run {} ended {:?} with cost {} ({} of {} accepted moves improving, {:.2?})",
                run,
                controller.status(),
                outcome.state.cost().total(),
                outcome.statistics.improving,
                outcome.statistics.accepted,
                outcome.statistics.elapsed
            );
            outcome
        })
        .collect();

    let iterations = outcomes.iter().map(|o| o.statistics.iterations).sum();
    // earliest run wins ties
    let best = outcomes
        .into_iter()
        .reduce(|best, next| {
            if next.state.cost().total() < best.state.cost().total() {
                next
            } else {
                best
            }
        })
        .ok_or(ConfigurationError::InvalidSearchParameter {
            field: "restarts",
            reason: "at least one run is required",
        })?;

    debug_assert!(
        best.state.is_consistent(&cost_model),
        "incrementally maintained cost drifted from a full evaluation"
    );

    let mut assignments: Vec<ParticipantAssignment> = (0..index.num_participants())
        .map(|p| ParticipantAssignment {
            participant_id: index.participant_id(p),
            slot_id: index.slot_id(best.state.slot_of(p)),
            locked: rules.is_locked(p),
        })
        .collect();
    assignments.sort();

    let unmet_soft_constraints = cost_model.unmet_constraints(&best.state);
    let duration = start_time.elapsed();
    info!(
        "Search finished with status {:?} and cost {} in {:.2?}",
        best.status,
        best.state.cost().total(),
        duration
    );

    Ok(SolveResponse {
        status: best.status,
        assignments,
        cost: *best.state.cost(),
        total_cost: best.state.cost().total(),
        iterations,
        elapsed_ms: duration.as_millis(),
        unmet_soft_constraints,
    })
}
