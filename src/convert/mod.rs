//! Conversion between signal, enhancement and concentration
//!
//! Concentration and enhancement are related through a relaxation model and a signal model in
//! the fast water exchange limit. The forward direction is closed form; the inverse is solved
//! independently for every sample by one-dimensional root finding.
//!
//! Assumptions:
//! - pre-contrast R2 and R2* are zero
//! - R2* is not modelled separately, post-contrast R2* is taken equal to R2

use argmin::{
    core::{CostFunction, Error, Executor, State, TerminationReason, TerminationStatus},
    solver::brent::BrentRoot,
};
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::DceError;
use crate::relaxation::RelaxationModel;
use crate::signal::{Relaxation, SignalModel};

/// Largest accepted enhancement residual at a converged root, relative to `1 + |enhancement|`
const RESIDUAL_LIMIT: f64 = 1e-3;

/// Options for the enhancement-to-concentration root finder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootOptions {
    /// Absolute concentration tolerance (mM)
    pub tolerance: f64,
    /// Iteration budget of the root finder, per sample
    pub max_iters: u64,
    /// First step of the outward bracket search from zero (mM)
    pub initial_step: f64,
    /// Largest concentration magnitude searched for a bracket (mM)
    pub max_concentration: f64,
}

impl Default for RootOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-7,
            max_iters: 1000,
            initial_step: 1e-3,
            max_concentration: 1e3,
        }
    }
}

impl RootOptions {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iters(mut self, max_iters: u64) -> Self {
        self.max_iters = max_iters;
        self
    }
}

/// Convert a signal time series to enhancement (%).
///
/// The reference signal is the mean over `baseline`.
pub fn signal_to_enhancement(
    signal: &Array1<f64>,
    baseline: &[usize],
) -> Result<Array1<f64>, DceError> {
    if baseline.is_empty() {
        return Err(DceError::EmptyBaseline);
    }
    if let Some(&index) = baseline.iter().find(|&&i| i >= signal.len()) {
        return Err(DceError::BaselineOutOfRange {
            index,
            len: signal.len(),
        });
    }
    let s_pre = baseline.iter().map(|&i| signal[i]).sum::<f64>() / baseline.len() as f64;
    if s_pre == 0.0 {
        return Err(DceError::ZeroReference);
    }
    Ok(signal.mapv(|s| 100.0 * ((s - s_pre) / s_pre)))
}

fn enhancement_at(
    concentration: f64,
    k_fa: f64,
    r10: f64,
    relaxation_model: &dyn RelaxationModel,
    signal_model: &dyn SignalModel,
) -> f64 {
    let r1 = relaxation_model.r1(r10, concentration);
    let r2 = relaxation_model.r2(0.0, concentration);
    let s_pre = signal_model.relaxation_to_signal(1.0, &Relaxation::longitudinal(r10), k_fa);
    let s_post = signal_model.relaxation_to_signal(
        1.0,
        &Relaxation {
            r1,
            r2,
            r2s: r2,
        },
        k_fa,
    );
    100.0 * ((s_post - s_pre) / s_pre)
}

/// Forward model from tissue concentration (mM) to enhancement (%).
///
/// `k_fa` is the flip angle correction factor and `r10` the pre-contrast R1 (s^-1).
pub fn concentration_to_enhancement(
    concentration: &Array1<f64>,
    k_fa: f64,
    r10: f64,
    relaxation_model: &dyn RelaxationModel,
    signal_model: &dyn SignalModel,
) -> Array1<f64> {
    concentration.mapv(|c| enhancement_at(c, k_fa, r10, relaxation_model, signal_model))
}

/// Measured minus predicted enhancement at a trial concentration
#[derive(Clone, Copy)]
struct EnhancementResidual<'a> {
    enhancement: f64,
    k_fa: f64,
    r10: f64,
    relaxation_model: &'a dyn RelaxationModel,
    signal_model: &'a dyn SignalModel,
}

impl CostFunction for EnhancementResidual<'_> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, c: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.enhancement
            - enhancement_at(
                *c,
                self.k_fa,
                self.r10,
                self.relaxation_model,
                self.signal_model,
            ))
    }
}

impl EnhancementResidual<'_> {
    fn eval(&self, c: f64) -> Result<f64, Error> {
        self.cost(&c)
    }

    /// Search outward from zero for an interval with a sign change.
    ///
    /// The side along which the residual shrinks is searched first, with geometrically growing
    /// steps, so the root closest to zero on that side is bracketed. The opposite side is only
    /// searched when the first one yields nothing.
    fn bracket(&self, f0: f64, options: &RootOptions) -> Result<Option<(f64, f64)>, Error> {
        let h = options.initial_step;
        let slope = (self.eval(h)? - self.eval(-h)?) / (2.0 * h);
        let toward = if f0 * slope > 0.0 { -1.0 } else { 1.0 };
        for direction in [toward, -toward] {
            if let Some(interval) = self.bracket_along(direction, f0, options)? {
                return Ok(Some(interval));
            }
        }
        Ok(None)
    }

    fn bracket_along(
        &self,
        direction: f64,
        f0: f64,
        options: &RootOptions,
    ) -> Result<Option<(f64, f64)>, Error> {
        let (mut prev, mut f_prev) = (0.0, f0);
        let mut step = options.initial_step;
        while step <= options.max_concentration {
            let x = direction * step;
            let f = self.eval(x)?;
            let interval = if f.signum() != f_prev.signum() {
                Some((prev, x))
            } else {
                self.refine(prev, f_prev, x, f, options.initial_step)?
            };
            if let Some((a, b)) = interval {
                return Ok(Some(if a < b { (a, b) } else { (b, a) }));
            }
            (prev, f_prev) = (x, f);
            step *= 2.0;
        }
        Ok(None)
    }

    /// Look for a sign change hidden inside `[a, b]` when both ends share a sign.
    ///
    /// The interval is bisected wherever the residual dips below both ends, down to
    /// `min_width`. The half nearest `a` is searched first.
    fn refine(
        &self,
        a: f64,
        fa: f64,
        b: f64,
        fb: f64,
        min_width: f64,
    ) -> Result<Option<(f64, f64)>, Error> {
        if (b - a).abs() < 2.0 * min_width {
            return Ok(None);
        }
        let m = 0.5 * (a + b);
        let fm = self.eval(m)?;
        if fm.signum() != fa.signum() {
            return Ok(Some((a, m)));
        }
        if fm.abs() >= fa.abs().min(fb.abs()) {
            return Ok(None);
        }
        match self.refine(a, fa, m, fm, min_width)? {
            Some(interval) => Ok(Some(interval)),
            None => self.refine(m, fm, b, fb, min_width),
        }
    }
}

fn solve_sample(
    sample: usize,
    residual: EnhancementResidual<'_>,
    options: &RootOptions,
) -> Result<f64, DceError> {
    let enhancement = residual.enhancement;
    let failure = |reason: String| DceError::RootNotFound {
        sample,
        enhancement,
        reason,
    };

    let f0 = residual.eval(0.0).map_err(|e| failure(e.to_string()))?;
    if f0 == 0.0 {
        return Ok(0.0);
    }
    let (lo, hi) = residual
        .bracket(f0, options)
        .map_err(|e| failure(e.to_string()))?
        .ok_or_else(|| {
            failure(format!(
                "no sign change within ±{} mM",
                options.max_concentration
            ))
        })?;
    tracing::trace!(sample, lo, hi, "bracketed concentration root");

    let solver = BrentRoot::new(lo, hi, options.tolerance);
    let res = Executor::new(residual, solver)
        .configure(|state| state.max_iters(options.max_iters))
        .run()
        .map_err(|e| failure(e.to_string()))?;

    let state = res.state();
    let root = match state.get_termination_status() {
        TerminationStatus::Terminated(TerminationReason::SolverConverged) => state
            .get_param()
            .copied()
            .ok_or_else(|| failure("solver returned no parameter".into()))?,
        status => return Err(failure(format!("{status:?}"))),
    };

    // a sign change across a pole of the signal equation is not a root
    let remaining = residual.eval(root).map_err(|e| failure(e.to_string()))?;
    if !remaining.is_finite() || remaining.abs() > RESIDUAL_LIMIT * (1.0 + enhancement.abs()) {
        return Err(failure(format!(
            "residual {remaining} at c = {root} mM"
        )));
    }
    Ok(root)
}

/// Inverse of [`concentration_to_enhancement`], solved per sample.
///
/// Each sample is solved independently; any sample that fails aborts the whole conversion and
/// the lowest failing sample index is reported. Where the conversion is not monotonic the root
/// closest to zero concentration is returned.
pub fn enhancement_to_concentration(
    enhancement: &Array1<f64>,
    k_fa: f64,
    r10: f64,
    relaxation_model: &dyn RelaxationModel,
    signal_model: &dyn SignalModel,
    options: &RootOptions,
) -> Result<Array1<f64>, DceError> {
    let concentration = (0..enhancement.len())
        .into_par_iter()
        .map(|sample| {
            let residual = EnhancementResidual {
                enhancement: enhancement[sample],
                k_fa,
                r10,
                relaxation_model,
                signal_model,
            };
            solve_sample(sample, residual, options)
        })
        .collect::<Vec<Result<f64, DceError>>>()
        .into_iter()
        .collect::<Result<Vec<f64>, DceError>>()?;
    Ok(Array1::from(concentration))
}
