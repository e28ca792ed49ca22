use ndarray::Array1;

use crate::error::DceError;

use super::{
    check_len, Aif, CompartmentConcentrations, Constraints, LinearInequality, PkModel, KTRANS,
    VE, VP,
};

/// Extended Tofts model.
///
/// # Assumptions
/// - parameters are `vp`, `ktrans` (min^-1) and `ve`, in that order
/// - the convolution of the plasma input with the extravascular impulse response is evaluated
///   with a recursive trapezoidal rule on the AIF sample grid
#[derive(Debug, Clone)]
pub struct ExtendedTofts {
    aif: Aif,
}

impl ExtendedTofts {
    pub fn new(aif: Aif) -> Self {
        Self { aif }
    }

    pub fn aif(&self) -> &Aif {
        &self.aif
    }
}

impl PkModel for ExtendedTofts {
    fn parameter_names(&self) -> &[&'static str] {
        &[VP, KTRANS, VE]
    }

    fn typical_values(&self) -> Vec<f64> {
        vec![0.02, 0.1, 0.2]
    }

    fn constraints(&self) -> Constraints {
        Constraints::new(vec![(0.0, 1.0), (0.0, f64::INFINITY), (1e-6, 1.0)])
            .with_linear(LinearInequality::new(vec![1.0, 0.0, 1.0], 1.0))
    }

    fn concentration(&self, x: &[f64]) -> Result<CompartmentConcentrations, DceError> {
        check_len(self, x)?;
        let (vp, ktrans, ve) = (x[0], x[1], x[2]);
        let kep = ktrans / ve;
        let t = self.aif.times_min();
        let cp = self.aif.plasma();

        let mut conv = Array1::zeros(cp.len());
        for n in 1..cp.len() {
            let dt = t[n] - t[n - 1];
            let decay = (-kep * dt).exp();
            conv[n] = conv[n - 1] * decay + 0.5 * dt * (cp[n - 1] * decay + cp[n]);
        }

        let plasma = cp.mapv(|c| vp * c);
        let extravascular = conv * ktrans;
        Ok(CompartmentConcentrations {
            tissue: &plasma + &extravascular,
            plasma,
            extravascular,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn extravascular_approaches_ve_times_plasma_for_constant_input() {
        let t = Array1::linspace(0.0, 3600.0, 3601);
        let aif = Aif::new(t, Array1::from_elem(3601, 1.5)).unwrap();
        let model = ExtendedTofts::new(aif);
        let c = model.concentration(&[0.05, 0.5, 0.25]).unwrap();
        let last = c.extravascular.len() - 1;
        assert_relative_eq!(c.extravascular[last], 0.25 * 1.5, epsilon = 1e-4);
        assert_relative_eq!(c.plasma[last], 0.075, epsilon = 1e-12);
    }

    #[test]
    fn zero_ktrans_leaves_only_the_vascular_term() {
        let t = Array1::linspace(0.0, 300.0, 61);
        let model = ExtendedTofts::new(Aif::parker(&t, 0.42, 20.0));
        let c = model.concentration(&[0.1, 0.0, 0.3]).unwrap();
        assert!(c.extravascular.iter().all(|&v| v == 0.0));
        assert_eq!(c.tissue, c.plasma);
    }

    #[test]
    fn declares_vp_plus_ve_constraint() {
        let t = Array1::linspace(0.0, 10.0, 3);
        let model = ExtendedTofts::new(Aif::parker(&t, 0.42, 0.0));
        let constraints = model.constraints();
        assert_eq!(constraints.violation(&[0.3, 0.1, 0.6]), 0.0);
        assert!(constraints.violation(&[0.5, 0.1, 0.6]) > 0.0);
    }
}
