//! Pharmacokinetic model interface
//!
//! The fitting engine treats a PK model as an opaque strategy: it knows the model's parameter
//! names, their typical values and constraints, and can ask for the compartmental tracer
//! concentrations produced by a parameter vector. Two reference models driven by an arterial
//! input function are provided, [`Patlak`] and [`ExtendedTofts`].

pub mod aif;
mod patlak;
mod tofts;

use std::collections::BTreeMap;

use ndarray::Array1;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::DceError;

pub use aif::Aif;
pub use patlak::Patlak;
pub use tofts::ExtendedTofts;

/// Plasma volume fraction
pub const VP: &str = "vp";
/// Permeability-surface area product (min^-1)
pub const PS: &str = "ps";
/// Extravascular-extracellular volume fraction
pub const VE: &str = "ve";
/// Volume transfer constant (min^-1)
pub const KTRANS: &str = "ktrans";

/// Named PK parameter values
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PkParams(BTreeMap<String, f64>);

impl PkParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<const N: usize> From<[(&str, f64); N]> for PkParams {
    fn from(pairs: [(&str, f64); N]) -> Self {
        Self(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }
}

/// Linear inequality `coefficients · x <= upper`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearInequality {
    pub coefficients: Vec<f64>,
    pub upper: f64,
}

impl LinearInequality {
    pub fn new(coefficients: Vec<f64>, upper: f64) -> Self {
        Self {
            coefficients,
            upper,
        }
    }

    fn excess(&self, x: &[f64]) -> f64 {
        let lhs: f64 = self.coefficients.iter().zip(x).map(|(c, v)| c * v).sum();
        (lhs - self.upper).max(0.0)
    }
}

/// Feasible region of a parameter vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Lower and upper bound per parameter
    pub bounds: Vec<(f64, f64)>,
    pub linear: Vec<LinearInequality>,
}

impl Constraints {
    pub fn new(bounds: Vec<(f64, f64)>) -> Self {
        Self {
            bounds,
            linear: Vec::new(),
        }
    }

    pub fn unbounded(n: usize) -> Self {
        Self::new(vec![(f64::NEG_INFINITY, f64::INFINITY); n])
    }

    pub fn with_linear(mut self, inequality: LinearInequality) -> Self {
        self.linear.push(inequality);
        self
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Clamp `x` into the bounds
    pub fn project(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(&self.bounds)
            .map(|(&v, &(lo, hi))| v.clamp(lo, hi))
            .collect()
    }

    /// Sum of squared bound and inequality violations, zero inside the feasible region
    pub fn violation(&self, x: &[f64]) -> f64 {
        let bounds: f64 = x
            .iter()
            .zip(&self.bounds)
            .map(|(&v, &(lo, hi))| (lo - v).max(0.0).powi(2) + (v - hi).max(0.0).powi(2))
            .sum();
        let linear: f64 = self.linear.iter().map(|l| l.excess(x).powi(2)).sum();
        bounds + linear
    }

    /// The same region expressed in coordinates `x / scale`
    pub fn scaled(&self, scale: &[f64]) -> Constraints {
        let bounds = self
            .bounds
            .iter()
            .zip(scale)
            .map(|(&(lo, hi), &s)| {
                if s < 0.0 {
                    (hi / s, lo / s)
                } else {
                    (lo / s, hi / s)
                }
            })
            .collect();
        let linear = self
            .linear
            .iter()
            .map(|l| LinearInequality {
                coefficients: l.coefficients.iter().zip(scale).map(|(c, s)| c * s).collect(),
                upper: l.upper,
            })
            .collect();
        Constraints { bounds, linear }
    }
}

/// Tracer concentration time series (mM per unit tissue volume) produced by a PK model
#[derive(Debug, Clone, PartialEq)]
pub struct CompartmentConcentrations {
    /// Whole tissue
    pub tissue: Array1<f64>,
    /// Capillary plasma
    pub plasma: Array1<f64>,
    /// Extravascular-extracellular space
    pub extravascular: Array1<f64>,
}

/// A pharmacokinetic compartment model
pub trait PkModel: Send + Sync {
    /// Parameter names, in vector order
    fn parameter_names(&self) -> &[&'static str];

    /// Typical parameter values, used as default initial guess and as normalization scale
    fn typical_values(&self) -> Vec<f64>;

    fn constraints(&self) -> Constraints;

    /// Compartmental concentrations for the parameter vector `x`
    fn concentration(&self, x: &[f64]) -> Result<CompartmentConcentrations, DceError>;

    fn n_params(&self) -> usize {
        self.parameter_names().len()
    }

    fn params_to_vector(&self, params: &PkParams) -> Result<Vec<f64>, DceError> {
        self.parameter_names()
            .iter()
            .map(|&name| {
                params
                    .get(name)
                    .ok_or_else(|| DceError::MissingParameter(name.to_string()))
            })
            .collect()
    }

    fn vector_to_params(&self, x: &[f64]) -> Result<PkParams, DceError> {
        let names = self.parameter_names();
        if x.len() != names.len() {
            return Err(DceError::LengthMismatch {
                what: "PK parameter vector",
                expected: names.len(),
                found: x.len(),
            });
        }
        Ok(names
            .iter()
            .zip(x)
            .fold(PkParams::new(), |p, (&name, &v)| p.with(name, v)))
    }

    fn typical_params(&self) -> Result<PkParams, DceError> {
        self.vector_to_params(&self.typical_values())
    }
}

/// Check that `x` has one entry per model parameter
pub(crate) fn check_len(model: &dyn PkModel, x: &[f64]) -> Result<(), DceError> {
    if x.len() != model.n_params() {
        return Err(DceError::LengthMismatch {
            what: "PK parameter vector",
            expected: model.n_params(),
            found: x.len(),
        });
    }
    Ok(())
}

/// Draw `n` initial guesses uniformly within the model's bounds.
///
/// Infinite bounds are replaced by the typical value scaled down or up by a factor of ten.
pub fn random_initial_guesses<R: Rng + ?Sized>(
    model: &dyn PkModel,
    n: usize,
    rng: &mut R,
) -> Result<Vec<PkParams>, DceError> {
    let typical = model.typical_values();
    let constraints = model.constraints();
    if constraints.len() != typical.len() {
        return Err(DceError::LengthMismatch {
            what: "constraint bounds",
            expected: typical.len(),
            found: constraints.len(),
        });
    }
    let ranges: Vec<(f64, f64)> = typical
        .iter()
        .zip(&constraints.bounds)
        .map(|(&t, &(lo, hi))| {
            let lo = if lo.is_finite() { lo } else { t - 10.0 * t.abs() };
            let hi = if hi.is_finite() { hi } else { t + 10.0 * t.abs() };
            (lo, hi)
        })
        .collect();

    (0..n)
        .map(|_| {
            let x: Vec<f64> = ranges
                .iter()
                .map(|&(lo, hi)| if hi > lo { rng.random_range(lo..hi) } else { lo })
                .collect();
            model.vector_to_params(&x)
        })
        .collect()
}

/// Cumulative trapezoidal integral of `y` over `t`, starting at zero
pub(crate) fn cumulative_trapezoid(t: &Array1<f64>, y: &Array1<f64>) -> Array1<f64> {
    let mut out = Array1::zeros(y.len());
    for n in 1..y.len() {
        out[n] = out[n - 1] + 0.5 * (t[n] - t[n - 1]) * (y[n] + y[n - 1]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn patlak() -> Patlak {
        let t = Array1::linspace(0.0, 300.0, 61);
        Patlak::new(Aif::parker(&t, 0.42, 30.0))
    }

    #[test]
    fn params_round_trip_through_vector() {
        let model = patlak();
        let params = PkParams::from([(VP, 0.1), (PS, 0.02)]);
        let x = model.params_to_vector(&params).unwrap();
        assert_eq!(x, vec![0.1, 0.02]);
        assert_eq!(model.vector_to_params(&x).unwrap(), params);
    }

    #[test]
    fn missing_parameter_is_reported() {
        let model = patlak();
        let err = model
            .params_to_vector(&PkParams::from([(VP, 0.1)]))
            .unwrap_err();
        assert!(matches!(err, DceError::MissingParameter(ref name) if name == PS));
    }

    #[test]
    fn wrong_vector_length_is_reported() {
        let model = patlak();
        assert!(matches!(
            model.vector_to_params(&[0.1]),
            Err(DceError::LengthMismatch { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn constraints_violation_and_projection() {
        let c = Constraints::new(vec![(0.0, 1.0), (0.0, 1.0)])
            .with_linear(LinearInequality::new(vec![1.0, 1.0], 1.0));
        assert_eq!(c.violation(&[0.2, 0.3]), 0.0);
        assert_relative_eq!(c.violation(&[1.5, 0.0]), 0.25 + 0.25, epsilon = 1e-12);
        assert_eq!(c.project(&[1.5, -0.5]), vec![1.0, 0.0]);
    }

    #[test]
    fn scaled_constraints_follow_normalization() {
        let c = Constraints::new(vec![(0.0, 1.0), (0.0, 2.0)])
            .with_linear(LinearInequality::new(vec![1.0, 1.0], 1.0));
        let scaled = c.scaled(&[0.5, 0.1]);
        assert_eq!(scaled.bounds[0], (0.0, 2.0));
        assert_relative_eq!(scaled.bounds[1].1, 20.0, epsilon = 1e-12);
        // x_norm = (1, 4) maps to x = (0.5, 0.4)
        assert_eq!(scaled.violation(&[1.0, 4.0]), 0.0);
        assert!(scaled.violation(&[1.0, 6.0]) > 0.0);
    }

    #[test]
    fn random_guesses_stay_within_bounds() {
        let model = ExtendedTofts::new(Aif::parker(&Array1::linspace(0.0, 300.0, 61), 0.42, 30.0));
        let mut rng = StdRng::seed_from_u64(7);
        let guesses = random_initial_guesses(&model, 20, &mut rng).unwrap();
        assert_eq!(guesses.len(), 20);
        for g in &guesses {
            let vp = g.get(VP).unwrap();
            let ve = g.get(VE).unwrap();
            assert!((0.0..=1.0).contains(&vp));
            assert!(ve > 0.0 && ve <= 1.0);
            assert!(g.get(KTRANS).unwrap() >= 0.0);
        }
    }

    #[test]
    fn trapezoid_integrates_linear_function_exactly() {
        let t = array![0.0, 1.0, 3.0, 4.0];
        let y = t.mapv(|v| 2.0 * v);
        let integral = cumulative_trapezoid(&t, &y);
        assert_eq!(integral, array![0.0, 1.0, 9.0, 16.0]);
    }

    #[test]
    fn pk_params_serialize_as_a_map() {
        let params = PkParams::from([(VP, 0.1), (PS, 0.02)]);
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"ps":0.02,"vp":0.1}"#);
    }
}
