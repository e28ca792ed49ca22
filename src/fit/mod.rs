//! Estimation of PK parameters from concentration or enhancement curves
//!
//! Both fits minimize a weighted sum of squared residuals over parameters normalized by the
//! model's typical values, from one or more initial guesses, and keep the best local minimum.
//! Samples with zero weight do not contribute to the cost and are reported as NaN in the
//! fitted curve.

pub mod global;

use argmin::core::{CostFunction, Error};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::DceError;
use crate::pk::{PkModel, PkParams};
use crate::tissue::{pk_params_to_enhancement, EnhancementModel};

pub use global::{minimize_global, LocalMinimum};

/// Options for the multi-start optimizer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// Iteration budget of each local minimization
    pub max_iters: u64,
    /// Convergence threshold on the standard deviation of the simplex costs
    pub sd_tolerance: f64,
    /// Relative size of the initial simplex around each normalized start
    pub simplex_perturbation: f64,
    /// Weight of the quadratic constraint-violation penalty
    pub penalty: f64,
    /// Run the initial guesses on the rayon thread pool
    pub parallel: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iters: 10_000,
            sd_tolerance: 1e-12,
            simplex_perturbation: 0.05,
            penalty: 1e6,
            parallel: true,
        }
    }
}

impl FitOptions {
    pub fn with_max_iters(mut self, max_iters: u64) -> Self {
        self.max_iters = max_iters;
        self
    }

    pub fn with_sd_tolerance(mut self, sd_tolerance: f64) -> Self {
        self.sd_tolerance = sd_tolerance;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Best-fit parameters and the matching model curve
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub params: PkParams,
    /// Model curve at `params`, NaN where the weight is zero
    pub fitted: Array1<f64>,
    /// Weighted sum of squares at `params`
    pub cost: f64,
    /// Index of the initial guess that produced the best fit
    pub start: usize,
    pub iterations: u64,
}

fn weighted_ssq(predicted: &Array1<f64>, observed: &Array1<f64>, weights: &Array1<f64>) -> f64 {
    predicted
        .iter()
        .zip(observed.iter())
        .zip(weights.iter())
        .filter(|(_, &w)| w != 0.0)
        .map(|((p, o), w)| w * (p - o).powi(2))
        .sum()
}

fn check_series(what: &'static str, series: &Array1<f64>, n: usize) -> Result<(), DceError> {
    if series.len() != n {
        return Err(DceError::LengthMismatch {
            what,
            expected: n,
            found: series.len(),
        });
    }
    Ok(())
}

/// Normalized starting vectors, weights and scale shared by both fits
struct Setup {
    starts: Vec<Vec<f64>>,
    weights: Array1<f64>,
    scale: Vec<f64>,
}

impl Setup {
    fn new(
        model: &dyn PkModel,
        n_samples: usize,
        initial_guesses: Option<&[PkParams]>,
        weights: Option<&Array1<f64>>,
    ) -> Result<Self, DceError> {
        let scale = model.typical_values();
        if scale.len() != model.n_params() {
            return Err(DceError::LengthMismatch {
                what: "typical values",
                expected: model.n_params(),
                found: scale.len(),
            });
        }
        if scale.iter().any(|&s| s == 0.0 || !s.is_finite()) {
            return Err(DceError::InvalidModel(
                "typical values must be finite and non-zero to normalize parameters".into(),
            ));
        }

        let starts = match initial_guesses {
            Some(guesses) => guesses
                .iter()
                .map(|g| model.params_to_vector(g))
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![scale.clone()],
        }
        .into_iter()
        .map(|x| x.iter().zip(&scale).map(|(v, s)| v / s).collect())
        .collect();

        let weights = match weights {
            Some(w) => {
                check_series("weights", w, n_samples)?;
                w.clone()
            }
            None => Array1::ones(n_samples),
        };

        Ok(Self {
            starts,
            weights,
            scale,
        })
    }

    fn denormalize(&self, x_norm: &[f64]) -> Vec<f64> {
        x_norm.iter().zip(&self.scale).map(|(v, s)| v * s).collect()
    }

    fn minimize<C>(
        &self,
        cost: &C,
        model: &dyn PkModel,
        options: &FitOptions,
    ) -> Result<LocalMinimum, DceError>
    where
        C: CostFunction<Param = Vec<f64>, Output = f64> + Sync,
    {
        let constraints = model.constraints();
        if constraints.len() != model.n_params() {
            return Err(DceError::LengthMismatch {
                what: "constraint bounds",
                expected: model.n_params(),
                found: constraints.len(),
            });
        }
        minimize_global(cost, &self.starts, &constraints.scaled(&self.scale), options)
    }

    fn mask(&self, mut fitted: Array1<f64>) -> Array1<f64> {
        fitted.zip_mut_with(&self.weights, |f, &w| {
            if w == 0.0 {
                *f = f64::NAN;
            }
        });
        fitted
    }
}

struct ConcentrationCost<'a> {
    model: &'a dyn PkModel,
    observed: &'a Array1<f64>,
    setup: &'a Setup,
}

impl CostFunction for ConcentrationCost<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x_norm: &Self::Param) -> Result<Self::Output, Error> {
        let x = self.setup.denormalize(x_norm);
        let c = self.model.concentration(&x)?;
        check_series("model concentration", &c.tissue, self.observed.len())?;
        Ok(weighted_ssq(&c.tissue, self.observed, &self.setup.weights))
    }
}

struct EnhancementCost<'a> {
    model: &'a EnhancementModel<'a>,
    observed: &'a Array1<f64>,
    setup: &'a Setup,
}

impl CostFunction for EnhancementCost<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x_norm: &Self::Param) -> Result<Self::Output, Error> {
        let params = self
            .model
            .pk_model
            .vector_to_params(&self.setup.denormalize(x_norm))?;
        let enhancement = pk_params_to_enhancement(&params, self.model)?;
        check_series("model enhancement", &enhancement, self.observed.len())?;
        Ok(weighted_ssq(&enhancement, self.observed, &self.setup.weights))
    }
}

/// Fit a tissue concentration curve (mM) with a PK model.
///
/// `initial_guesses` defaults to the model's typical values and `weights` to uniform weights.
pub fn fit_concentration(
    concentration: &Array1<f64>,
    model: &dyn PkModel,
    initial_guesses: Option<&[PkParams]>,
    weights: Option<&Array1<f64>>,
    options: &FitOptions,
) -> Result<FitResult, DceError> {
    let setup = Setup::new(model, concentration.len(), initial_guesses, weights)?;
    let cost = ConcentrationCost {
        model,
        observed: concentration,
        setup: &setup,
    };
    let best = setup.minimize(&cost, model, options)?;

    let x_opt = setup.denormalize(&best.param);
    let fitted = model.concentration(&x_opt)?.tissue;
    Ok(FitResult {
        params: model.vector_to_params(&x_opt)?,
        fitted: setup.mask(fitted),
        cost: best.cost,
        start: best.start,
        iterations: best.iterations,
    })
}

/// Fit an enhancement curve (%) through the full multi-compartment forward model.
///
/// `initial_guesses` defaults to the PK model's typical values and `weights` to uniform
/// weights.
pub fn fit_enhancement(
    enhancement: &Array1<f64>,
    model: &EnhancementModel<'_>,
    initial_guesses: Option<&[PkParams]>,
    weights: Option<&Array1<f64>>,
    options: &FitOptions,
) -> Result<FitResult, DceError> {
    let setup = Setup::new(model.pk_model, enhancement.len(), initial_guesses, weights)?;
    let cost = EnhancementCost {
        model,
        observed: enhancement,
        setup: &setup,
    };
    let best = setup.minimize(&cost, model.pk_model, options)?;

    let params = model
        .pk_model
        .vector_to_params(&setup.denormalize(&best.param))?;
    let fitted = pk_params_to_enhancement(&params, model)?;
    Ok(FitResult {
        params,
        fitted: setup.mask(fitted),
        cost: best.cost,
        start: best.start,
        iterations: best.iterations,
    })
}
