use argmin::{
    core::{CostFunction, Error, Executor, State, TerminationReason, TerminationStatus},
    solver::neldermead::NelderMead,
};
use rayon::prelude::*;

use crate::error::DceError;
use crate::pk::Constraints;

use super::FitOptions;

/// Result of one local minimization
#[derive(Debug, Clone, PartialEq)]
pub struct LocalMinimum {
    /// Minimizer, projected onto the bounds
    pub param: Vec<f64>,
    pub cost: f64,
    pub iterations: u64,
    /// Index of the initial guess this minimum was reached from
    pub start: usize,
}

/// Cost evaluated at the bound-projected point plus a quadratic penalty on any violation
struct Constrained<'a, C> {
    cost: &'a C,
    constraints: &'a Constraints,
    penalty: f64,
}

impl<C> CostFunction for Constrained<'_, C>
where
    C: CostFunction<Param = Vec<f64>, Output = f64>,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, Error> {
        let projected = self.constraints.project(x);
        let f = self.cost.cost(&projected)?;
        let f = if f.is_finite() { f } else { f64::INFINITY };
        Ok(f + self.penalty * self.constraints.violation(x))
    }
}

fn create_initial_simplex(initial_point: &[f64], perturbation: f64) -> Vec<Vec<f64>> {
    let mut vertices = Vec::with_capacity(initial_point.len() + 1);
    vertices.push(initial_point.to_vec());

    for i in 0..initial_point.len() {
        let step = if initial_point[i] == 0.0 {
            perturbation
        } else {
            perturbation * initial_point[i]
        };
        let mut perturbed_point = initial_point.to_vec();
        perturbed_point[i] += step;
        vertices.push(perturbed_point);
    }

    vertices
}

fn minimize_local<C>(
    cost: &C,
    constraints: &Constraints,
    start: usize,
    x0: &[f64],
    options: &FitOptions,
) -> Result<LocalMinimum, DceError>
where
    C: CostFunction<Param = Vec<f64>, Output = f64>,
{
    let not_converged = |reason: String| DceError::NotConverged { start, reason };

    let problem = Constrained {
        cost,
        constraints,
        penalty: options.penalty,
    };
    let simplex = create_initial_simplex(x0, options.simplex_perturbation);
    // the solver does not propagate cost errors while setting up the simplex
    for vertex in &simplex {
        problem
            .cost(vertex)
            .map_err(|e| not_converged(e.to_string()))?;
    }
    let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(simplex)
        .with_sd_tolerance(options.sd_tolerance)
        .map_err(|e| DceError::Optimizer(e.to_string()))?;
    let res = Executor::new(problem, solver)
        .configure(|state| state.max_iters(options.max_iters))
        .run()
        .map_err(|e| not_converged(e.to_string()))?;

    let state = res.state();
    match state.get_termination_status() {
        TerminationStatus::Terminated(TerminationReason::SolverConverged) => {}
        status => return Err(not_converged(format!("{status:?}"))),
    }
    let param = state
        .get_best_param()
        .map(|p| constraints.project(p))
        .ok_or_else(|| not_converged("solver returned no parameter".into()))?;
    let cost = cost
        .cost(&param)
        .map_err(|e| not_converged(e.to_string()))?;

    Ok(LocalMinimum {
        param,
        cost,
        iterations: state.get_iter(),
        start,
    })
}

/// Run a constrained local minimization from every initial guess and keep the lowest cost.
///
/// Starts are independent and run in parallel unless [`FitOptions::parallel`] is off. Ties go
/// to the earliest start. A start that fails to converge is skipped; the call only fails when
/// every start fails.
pub fn minimize_global<C>(
    cost: &C,
    starts: &[Vec<f64>],
    constraints: &Constraints,
    options: &FitOptions,
) -> Result<LocalMinimum, DceError>
where
    C: CostFunction<Param = Vec<f64>, Output = f64> + Sync,
{
    if starts.is_empty() {
        return Err(DceError::NoInitialGuesses);
    }
    if let Some(bad) = starts.iter().find(|x| x.len() != constraints.len()) {
        return Err(DceError::LengthMismatch {
            what: "initial guess",
            expected: constraints.len(),
            found: bad.len(),
        });
    }

    let run = |(start, x0): (usize, &Vec<f64>)| {
        minimize_local(cost, constraints, start, x0, options)
    };
    let results: Vec<Result<LocalMinimum, DceError>> = if options.parallel {
        starts.par_iter().enumerate().map(run).collect()
    } else {
        starts.iter().enumerate().map(run).collect()
    };

    let mut best: Option<LocalMinimum> = None;
    for result in results {
        match result {
            Ok(minimum) => {
                tracing::debug!(
                    start = minimum.start,
                    cost = minimum.cost,
                    iterations = minimum.iterations,
                    "local minimization converged"
                );
                if best.as_ref().map_or(true, |b| minimum.cost < b.cost) {
                    best = Some(minimum);
                }
            }
            Err(e) => tracing::warn!(error = %e, "local minimization failed"),
        }
    }

    best.ok_or(DceError::AllStartsFailed {
        starts: starts.len(),
    })
}
